//! Integration tests for upload and chapter management endpoints.

mod common;

use axum::http::StatusCode;
use common::{TestServer, ADMIN_TOKEN, EDITOR_TOKEN, UPLOAD_TOKEN};
use serde_json::json;

const AUDIO: &[u8] = b"not really aac but good enough for transport tests";

#[tokio::test]
async fn health_check_is_unauthenticated() {
    let server = TestServer::new().await;

    let (status, body) = server
        .json_request("GET", "/api/v1/health", None, None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["storage"], "filesystem");
}

#[tokio::test]
async fn upload_requires_authentication() {
    let server = TestServer::new().await;

    let (status, _) = server
        .upload("b1", None, "chapter.m4a", AUDIO, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = server
        .upload("b1", None, "chapter.m4a", AUDIO, Some("wrong-token"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthorized");
}

#[tokio::test]
async fn upload_rejects_disallowed_extension() {
    let server = TestServer::new().await;

    for name in ["chapter.wav", "chapter.mp3", "chapter", "chapter.m4a.txt"] {
        let (status, body) = server
            .upload("b1", None, name, AUDIO, Some(UPLOAD_TOKEN))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "file {name}");
        assert_eq!(body["message"], "Only .mp4/.m4a files are allowed");
    }

    // Extension matching is case-insensitive.
    let (status, _) = server
        .upload("b1", None, "chapter.M4A", AUDIO, Some(UPLOAD_TOKEN))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn upload_rejects_oversized_file() {
    let server = TestServer::with_config(|config| {
        config.server.max_upload_bytes = 16;
    })
    .await;

    let (status, body) = server
        .upload("b1", None, "chapter.m4a", AUDIO, Some(UPLOAD_TOKEN))
        .await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["message"], "File size exceeds limit");
}

#[tokio::test]
async fn upload_requires_book_id() {
    let server = TestServer::new().await;

    let (status, _) = server
        .upload("", None, "chapter.m4a", AUDIO, Some(UPLOAD_TOKEN))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_without_encoding_is_immediately_ready() {
    let server = TestServer::new().await;

    let (status, body) = server
        .upload(
            "b1",
            Some("Introduction"),
            "001 Intro.m4a",
            AUDIO,
            Some(UPLOAD_TOKEN),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["chapter_number"], 1);
    assert_eq!(body["title"], "Introduction");
    assert_eq!(body["status"], "ready");

    // Whitespace in the filename maps to underscores in the key.
    let source_key = "book/b1/uploads/001_Intro.m4a";
    assert!(server.storage().exists(source_key).await.unwrap());

    // Without an encoding step, the source is the deliverable.
    let chapter_id = body["chapter_id"].as_str().unwrap().parse().unwrap();
    let row = server.chapters().get_chapter(chapter_id).await.unwrap();
    assert_eq!(row.file_key.as_deref(), Some(source_key));
    assert_eq!(row.file_name, "001 Intro.m4a");
}

#[tokio::test]
async fn upload_title_defaults_to_file_stem() {
    let server = TestServer::new().await;

    let (status, body) = server
        .upload("b1", None, "Chapter One.m4a", AUDIO, Some(UPLOAD_TOKEN))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Chapter One");
}

#[tokio::test]
async fn chapters_list_in_play_order() {
    let server = TestServer::new().await;

    for name in ["one.m4a", "two.m4a", "three.m4a"] {
        let (status, _) = server
            .upload("b1", None, name, AUDIO, Some(UPLOAD_TOKEN))
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    // A second book must not leak into the listing.
    server
        .upload("b2", None, "other.m4a", AUDIO, Some(UPLOAD_TOKEN))
        .await;

    let (status, body) = server
        .json_request("GET", "/api/v1/audio/b1/chapters", None, Some(UPLOAD_TOKEN))
        .await;

    assert_eq!(status, StatusCode::OK);
    let chapters = body.as_array().unwrap();
    assert_eq!(chapters.len(), 3);
    for (i, chapter) in chapters.iter().enumerate() {
        assert_eq!(chapter["chapter_number"], (i + 1) as i64);
        assert_eq!(chapter["status"], "ready");
    }

    // Status filter.
    let (status, body) = server
        .json_request(
            "GET",
            "/api/v1/audio/b1/chapters?status=processing",
            None,
            Some(UPLOAD_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 0);

    // Unknown status filter is a validation error.
    let (status, _) = server
        .json_request(
            "GET",
            "/api/v1/audio/b1/chapters?status=bogus",
            None,
            Some(UPLOAD_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn get_chapter_is_scoped_to_book() {
    let server = TestServer::new().await;

    let (_, body) = server
        .upload("b1", None, "one.m4a", AUDIO, Some(UPLOAD_TOKEN))
        .await;
    let chapter_id = body["chapter_id"].as_str().unwrap().to_string();

    let (status, body) = server
        .json_request(
            "GET",
            &format!("/api/v1/audio/b1/chapters/{chapter_id}"),
            None,
            Some(UPLOAD_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["file_name"], "one.m4a");

    // The same chapter under another book is not found.
    let (status, _) = server
        .json_request(
            "GET",
            &format!("/api/v1/audio/b2/chapters/{chapter_id}"),
            None,
            Some(UPLOAD_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rename_requires_editor_scope() {
    let server = TestServer::new().await;

    let (_, body) = server
        .upload("b1", None, "one.m4a", AUDIO, Some(UPLOAD_TOKEN))
        .await;
    let chapter_id = body["chapter_id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/audio/b1/chapters/{chapter_id}");

    let (status, body) = server
        .json_request(
            "PUT",
            &uri,
            Some(json!({"title": "Renamed"})),
            Some(UPLOAD_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "forbidden");

    let (status, body) = server
        .json_request(
            "PUT",
            &uri,
            Some(json!({"title": "Renamed"})),
            Some(EDITOR_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Renamed");
}

#[tokio::test]
async fn update_with_empty_body_is_rejected() {
    let server = TestServer::new().await;

    let (_, body) = server
        .upload("b1", None, "one.m4a", AUDIO, Some(UPLOAD_TOKEN))
        .await;
    let chapter_id = body["chapter_id"].as_str().unwrap().to_string();

    let (status, _) = server
        .json_request(
            "PUT",
            &format!("/api/v1/audio/b1/chapters/{chapter_id}"),
            Some(json!({})),
            Some(EDITOR_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn reorder_swaps_with_adjacent_chapter() {
    let server = TestServer::new().await;

    let (_, first) = server
        .upload("b1", None, "one.m4a", AUDIO, Some(UPLOAD_TOKEN))
        .await;
    let (_, second) = server
        .upload("b1", None, "two.m4a", AUDIO, Some(UPLOAD_TOKEN))
        .await;
    let second_id = second["chapter_id"].as_str().unwrap().to_string();

    let (status, body) = server
        .json_request(
            "PUT",
            &format!("/api/v1/audio/b1/chapters/{second_id}"),
            Some(json!({"move": "up"})),
            Some(EDITOR_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["chapter_number"], 1);

    // The displaced chapter moved down.
    let first_id = first["chapter_id"].as_str().unwrap().to_string();
    let (_, body) = server
        .json_request(
            "GET",
            &format!("/api/v1/audio/b1/chapters/{first_id}"),
            None,
            Some(EDITOR_TOKEN),
        )
        .await;
    assert_eq!(body["chapter_number"], 2);
}

#[tokio::test]
async fn reorder_at_boundary_is_noop() {
    let server = TestServer::new().await;

    let (_, body) = server
        .upload("b1", None, "only.m4a", AUDIO, Some(UPLOAD_TOKEN))
        .await;
    let chapter_id = body["chapter_id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/audio/b1/chapters/{chapter_id}");

    for direction in ["up", "down"] {
        let (status, body) = server
            .json_request(
                "PUT",
                &uri,
                Some(json!({"move": direction})),
                Some(EDITOR_TOKEN),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["chapter_number"], 1);
    }

    let (status, _) = server
        .json_request(
            "PUT",
            &uri,
            Some(json!({"move": "sideways"})),
            Some(EDITOR_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_removes_record_and_objects() {
    let server = TestServer::new().await;

    let (_, body) = server
        .upload("b1", None, "one.m4a", AUDIO, Some(UPLOAD_TOKEN))
        .await;
    let chapter_id = body["chapter_id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/audio/b1/chapters/{chapter_id}");
    let source_key = "book/b1/uploads/one.m4a";
    assert!(server.storage().exists(source_key).await.unwrap());

    // Upload scope cannot delete.
    let (status, _) = server
        .json_request("DELETE", &uri, None, Some(UPLOAD_TOKEN))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = server
        .json_request("DELETE", &uri, None, Some(EDITOR_TOKEN))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    assert!(!server.storage().exists(source_key).await.unwrap());
    let (status, _) = server
        .json_request("GET", &uri, None, Some(EDITOR_TOKEN))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A second delete reports the missing record.
    let (status, _) = server
        .json_request("DELETE", &uri, None, Some(ADMIN_TOKEN))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_succeeds_when_objects_already_removed() {
    let server = TestServer::new().await;

    let (_, body) = server
        .upload("b1", None, "gone.m4a", AUDIO, Some(UPLOAD_TOKEN))
        .await;
    let chapter_id = body["chapter_id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/audio/b1/chapters/{chapter_id}");

    // The objects vanish out-of-band before the chapter is deleted.
    let source_key = "book/b1/uploads/gone.m4a";
    server.storage().delete(source_key).await.unwrap();
    assert!(!server.storage().exists(source_key).await.unwrap());

    let (status, body) = server
        .json_request("DELETE", &uri, None, Some(EDITOR_TOKEN))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = server
        .json_request("GET", &uri, None, Some(EDITOR_TOKEN))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deletion_does_not_compact_chapter_numbers() {
    let server = TestServer::new().await;

    let mut ids = Vec::new();
    for name in ["one.m4a", "two.m4a", "three.m4a"] {
        let (_, body) = server
            .upload("b1", None, name, AUDIO, Some(UPLOAD_TOKEN))
            .await;
        ids.push(body["chapter_id"].as_str().unwrap().to_string());
    }

    let (status, _) = server
        .json_request(
            "DELETE",
            &format!("/api/v1/audio/b1/chapters/{}", ids[1]),
            None,
            Some(EDITOR_TOKEN),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = server
        .json_request("GET", "/api/v1/audio/b1/chapters", None, Some(EDITOR_TOKEN))
        .await;
    let numbers: Vec<i64> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["chapter_number"].as_i64().unwrap())
        .collect();
    assert_eq!(numbers, vec![1, 3]);

    // The next upload extends past the highest number ever used.
    let (_, body) = server
        .upload("b1", None, "four.m4a", AUDIO, Some(UPLOAD_TOKEN))
        .await;
    assert_eq!(body["chapter_number"], 4);
}
