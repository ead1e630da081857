//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Public origin for locally served file URLs (e.g., "http://localhost:8080").
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Maximum accepted upload size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Allowed upload file extensions (lowercase, with leading dot).
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    /// Streaming URL lifetime in seconds.
    #[serde(default = "default_stream_ttl_secs")]
    pub stream_ttl_secs: u64,
    /// Whether uploads are handed to an encoding job (false serves the
    /// source file as-is).
    #[serde(default)]
    pub encoding_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_max_upload_bytes() -> u64 {
    crate::DEFAULT_MAX_UPLOAD_BYTES
}

fn default_allowed_extensions() -> Vec<String> {
    vec![".mp4".to_string(), ".m4a".to_string()]
}

fn default_stream_ttl_secs() -> u64 {
    crate::DEFAULT_STREAM_TTL_SECS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_base_url: default_public_base_url(),
            max_upload_bytes: default_max_upload_bytes(),
            allowed_extensions: default_allowed_extensions(),
            stream_ttl_secs: default_stream_ttl_secs(),
            encoding_enabled: false,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_upload_bytes == 0 {
            return Err("server.max_upload_bytes must be greater than 0".to_string());
        }
        if self.allowed_extensions.is_empty() {
            return Err("server.allowed_extensions must not be empty".to_string());
        }
        for ext in &self.allowed_extensions {
            if !ext.starts_with('.') {
                return Err(format!(
                    "server.allowed_extensions entry {ext:?} must start with '.'"
                ));
            }
        }
        if !(crate::MIN_STREAM_TTL_SECS..=crate::MAX_STREAM_TTL_SECS)
            .contains(&self.stream_ttl_secs)
        {
            return Err(format!(
                "server.stream_ttl_secs {} must be between {} and {}",
                self.stream_ttl_secs,
                crate::MIN_STREAM_TTL_SECS,
                crate::MAX_STREAM_TTL_SECS
            ));
        }
        Ok(())
    }

    /// Get the stream TTL as a Duration.
    pub fn stream_ttl(&self) -> time::Duration {
        let secs = i64::try_from(self.stream_ttl_secs).unwrap_or(i64::MAX);
        time::Duration::seconds(secs)
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to AWS_ACCESS_KEY_ID env var if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        access_key_id: Option<String>,
        /// AWS secret access key. Falls back to AWS_SECRET_ACCESS_KEY env var if not set.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        secret_access_key: Option<String>,
        /// Force path-style URLs (e.g., `endpoint/bucket/key`).
        /// Required for MinIO and some S3-compatible services.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/storage"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
            _ => Ok(()),
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
        }
    }
}

/// CDN URL signing configuration.
///
/// When present, S3-backed streaming URLs are signed for the CDN
/// distribution instead of presigned against the bucket.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CdnConfig {
    /// CDN distribution domain (e.g., "media.example.com").
    pub domain: String,
    /// Key pair ID registered with the distribution.
    pub key_pair_id: String,
    /// Private key source.
    pub private_key: PrivateKeyConfig,
}

/// Private key source configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PrivateKeyConfig {
    /// Key stored in a PEM file.
    File {
        /// Path to the private key file.
        path: PathBuf,
    },
    /// Key stored in an environment variable.
    Env {
        /// Environment variable name.
        var: String,
    },
    /// Key provided directly as a value (NOT recommended for production).
    Value {
        /// PEM-encoded private key.
        key: String,
    },
    /// Generate a new key (for development only).
    Generate,
}

/// A pre-shared access token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StaticToken {
    /// Pre-computed hash of the token (SHA256 hex, 64 characters).
    /// Generate with: `echo -n "your-secret-token" | sha256sum`
    pub token_hash: String,
    /// Scopes granted to this token.
    pub scopes: Vec<String>,
    /// Description for logs.
    pub description: Option<String>,
}

/// Authentication configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Accept unauthenticated requests with the bypass scopes.
    /// Local development only.
    #[serde(default)]
    pub bypass_enabled: bool,
    /// Scopes granted when bypass is enabled (default: ["admin"]).
    #[serde(default = "default_bypass_scopes")]
    pub bypass_scopes: Vec<String>,
    /// Known tokens.
    #[serde(default)]
    pub tokens: Vec<StaticToken>,
}

fn default_bypass_scopes() -> Vec<String> {
    vec!["admin".to_string()]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bypass_enabled: false,
            bypass_scopes: default_bypass_scopes(),
            tokens: Vec::new(),
        }
    }
}

impl AuthConfig {
    /// Validate auth configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if !self.bypass_enabled && self.tokens.is_empty() {
            return Err(
                "auth requires at least one token unless bypass_enabled is set".to_string(),
            );
        }
        for token in &self.tokens {
            if token.token_hash.len() != 64
                || !token.token_hash.chars().all(|c| c.is_ascii_hexdigit())
            {
                return Err(format!(
                    "auth token hash {:?} is not a 64-character SHA256 hex digest",
                    token.token_hash
                ));
            }
        }
        Ok(())
    }

    /// Create a test configuration with a dummy token.
    ///
    /// **For testing only.** The hash is deterministic but not a real token.
    pub fn for_testing() -> Self {
        Self {
            bypass_enabled: false,
            bypass_scopes: default_bypass_scopes(),
            tokens: vec![StaticToken {
                // SHA256 of "test-admin-token"
                token_hash: "17d6bfe05d1b1fb7bc499f8e3f639c7b3eda4c40f321eef8887a0c04c89a99c5"
                    .to_string(),
                scopes: vec!["admin".to_string()],
                description: Some("Test admin token".to_string()),
            }],
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// CDN signing configuration (optional).
    pub cdn: Option<CdnConfig>,
}

impl AppConfig {
    /// Validate the full configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.storage.validate()?;
        self.auth.validate()?;
        Ok(())
    }

    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses filesystem storage, SQLite metadata,
    /// and a dummy admin token.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            metadata: MetadataConfig::default(),
            auth: AuthConfig::for_testing(),
            cdn: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.max_upload_bytes, 100 * 1024 * 1024);
        assert_eq!(config.allowed_extensions, vec![".mp4", ".m4a"]);
        assert_eq!(config.stream_ttl_secs, 90);
        assert!(!config.encoding_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_config_rejects_ttl_out_of_range() {
        let mut config = ServerConfig::default();
        config.stream_ttl_secs = 30;
        assert!(config.validate().is_err());
        config.stream_ttl_secs = 3600;
        assert!(config.validate().is_err());
        config.stream_ttl_secs = 60;
        assert!(config.validate().is_ok());
        config.stream_ttl_secs = 120;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_config_rejects_bad_extension() {
        let mut config = ServerConfig::default();
        config.allowed_extensions = vec!["mp4".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_storage_config_s3_validate_partial_credentials() {
        let invalid = StorageConfig::S3 {
            bucket: "bucket".to_string(),
            endpoint: None,
            region: None,
            prefix: None,
            access_key_id: Some("access-key".to_string()),
            secret_access_key: None,
            force_path_style: false,
        };
        assert!(invalid.validate().is_err());

        let valid = StorageConfig::S3 {
            bucket: "bucket".to_string(),
            endpoint: None,
            region: None,
            prefix: None,
            access_key_id: Some("access-key".to_string()),
            secret_access_key: Some("secret-key".to_string()),
            force_path_style: false,
        };
        assert!(valid.validate().is_ok());
    }

    #[test]
    fn test_storage_config_s3_force_path_style_defaults_to_false() {
        let json = r#"{"type":"s3","bucket":"test","endpoint":"https://s3.amazonaws.com"}"#;
        let config: StorageConfig = serde_json::from_str(json).unwrap();
        match config {
            StorageConfig::S3 {
                force_path_style, ..
            } => assert!(!force_path_style),
            _ => panic!("expected S3 config"),
        }
    }

    #[test]
    fn test_auth_config_requires_tokens_or_bypass() {
        let empty = AuthConfig {
            bypass_enabled: false,
            bypass_scopes: vec![],
            tokens: vec![],
        };
        assert!(empty.validate().is_err());

        let bypass = AuthConfig {
            bypass_enabled: true,
            bypass_scopes: vec!["admin".to_string()],
            tokens: vec![],
        };
        assert!(bypass.validate().is_ok());

        assert!(AuthConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn test_auth_config_rejects_bad_hash() {
        let config = AuthConfig {
            bypass_enabled: false,
            bypass_scopes: vec![],
            tokens: vec![StaticToken {
                token_hash: "not-a-hash".to_string(),
                scopes: vec!["upload".to_string()],
                description: None,
            }],
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_app_config_for_testing_is_valid() {
        assert!(AppConfig::for_testing().validate().is_ok());
    }
}
