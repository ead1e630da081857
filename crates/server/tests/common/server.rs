//! Server test utilities.

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use folio_core::config::{
    AppConfig, AuthConfig, MetadataConfig, ServerConfig, StaticToken, StorageConfig,
};
use folio_metadata::{ChapterStore, SqliteStore};
use folio_server::{create_router, AppState};
use folio_storage::{FilesystemBackend, ObjectStore};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

/// Raw token with admin scope, hashed into the test auth config.
pub const ADMIN_TOKEN: &str = "test-admin-token";
/// Raw token with upload scope only.
pub const UPLOAD_TOKEN: &str = "test-upload-token";
/// Raw token with editor scope.
pub const EDITOR_TOKEN: &str = "test-editor-token";

fn test_auth_config() -> AuthConfig {
    AuthConfig {
        bypass_enabled: false,
        bypass_scopes: vec!["admin".to_string()],
        tokens: vec![
            StaticToken {
                // SHA256 of "test-admin-token"
                token_hash: "17d6bfe05d1b1fb7bc499f8e3f639c7b3eda4c40f321eef8887a0c04c89a99c5"
                    .to_string(),
                scopes: vec!["admin".to_string()],
                description: Some("test admin".to_string()),
            },
            StaticToken {
                // SHA256 of "test-upload-token"
                token_hash: "38d3354f54fb6756e59f735cc2ef6f71e5b4d3f85382190722ca28b328352b3c"
                    .to_string(),
                scopes: vec!["upload".to_string()],
                description: Some("test uploader".to_string()),
            },
            StaticToken {
                // SHA256 of "test-editor-token"
                token_hash: "d2f693d29061c5e22e1776e7c8b4f2f8c5453cee346d087db1c19522bf56c829"
                    .to_string(),
                scopes: vec!["editor".to_string()],
                description: Some("test editor".to_string()),
            },
        ],
    }
}

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    /// Concrete store handle for tests that need raw SQL fixtures.
    pub sqlite: Arc<SqliteStore>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_path = temp_dir.path().join("storage");
        let db_path = temp_dir.path().join("metadata.db");

        let mut config = AppConfig {
            server: ServerConfig::default(),
            storage: StorageConfig::Filesystem {
                path: storage_path.clone(),
            },
            metadata: MetadataConfig::Sqlite {
                path: db_path.clone(),
            },
            auth: test_auth_config(),
            cdn: None,
        };
        modifier(&mut config);
        config.validate().expect("test config must be valid");

        let storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(&storage_path, &config.server.public_base_url)
                .await
                .expect("Failed to create storage backend"),
        );

        let sqlite = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .expect("Failed to create chapter store"),
        );
        let chapters: Arc<dyn ChapterStore> = sqlite.clone();

        let state = AppState::new(config, storage, chapters);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            sqlite,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying chapter store.
    pub fn chapters(&self) -> Arc<dyn ChapterStore> {
        self.state.chapters.clone()
    }

    /// Get access to the underlying object store.
    pub fn storage(&self) -> Arc<dyn ObjectStore> {
        self.state.storage.clone()
    }

    /// Send a request and return the raw response.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed")
    }

    /// Make a JSON request, returning status and parsed body.
    pub async fn json_request(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        auth_token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(token) = auth_token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }

        let body = match body {
            Some(v) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };

        let response = self.send(builder.body(body).unwrap()).await;
        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let json: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        (status, json)
    }

    /// Upload a file via the multipart endpoint, returning status and body.
    pub async fn upload(
        &self,
        book_id: &str,
        chapter_title: Option<&str>,
        file_name: &str,
        data: &[u8],
        auth_token: Option<&str>,
    ) -> (StatusCode, Value) {
        let boundary = "folio-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\n\
                 Content-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\n\
                 Content-Type: audio/mp4\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let mut uri = format!(
            "/api/v1/files/upload/audio?book_id={}",
            urlencode(book_id)
        );
        if let Some(title) = chapter_title {
            uri.push_str("&chapter_title=");
            uri.push_str(&urlencode(title));
        }

        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={boundary}"),
            );
        if let Some(token) = auth_token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }

        let response = self.send(builder.body(Body::from(body)).unwrap()).await;
        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);
        (status, json)
    }
}

fn urlencode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{b:02X}"),
        })
        .collect()
}
