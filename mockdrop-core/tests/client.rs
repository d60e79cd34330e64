use mockdrop_core::{
    ApiErrorClass, ByteSpan, CommitInfo, DropboxClient, MetadataTag, UploadSessionCursor,
    WriteMode,
};
use serde_json::json;
use wiremock::matchers::{body_json, body_string, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn api_arg(expected: serde_json::Value) -> impl Fn(&Request) -> bool + Send + Sync + 'static {
    move |request: &Request| {
        request
            .headers
            .get("dropbox-api-arg")
            .and_then(|value| serde_json::from_slice::<serde_json::Value>(value.as_bytes()).ok())
            .is_some_and(|value| value == expected)
    }
}

#[tokio::test]
async fn get_space_usage_includes_bearer_header() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2/users/get_space_usage"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "used": 256,
            "allocation": {".tag": "individual", "allocated": 1024}
        })))
        .mount(&server)
        .await;

    let client = DropboxClient::with_base_url(&server.uri(), "test-token").unwrap();
    let usage = client.get_space_usage().await.unwrap();

    assert_eq!(usage.used, 256);
    assert_eq!(usage.allocation.allocated, 1024);
}

#[tokio::test]
async fn get_metadata_posts_json_argument() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2/files/get_metadata"))
        .and(body_json(json!({"path": "/Docs/Hello World.txt"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            ".tag": "file",
            "name": "Hello World.txt",
            "id": "id:abc",
            "path_lower": "/docs/hello world.txt",
            "path_display": "/Docs/Hello World.txt",
            "rev": "r1",
            "size": 12,
            "server_modified": "2024-01-01T00:00:00Z"
        })))
        .mount(&server)
        .await;

    let client = DropboxClient::with_base_url(&server.uri(), "test-token").unwrap();
    let md = client.get_metadata("/Docs/Hello World.txt").await.unwrap();

    assert_eq!(md.tag, Some(MetadataTag::File));
    assert_eq!(md.size, Some(12));
    assert_eq!(md.path_lower, "/docs/hello world.txt");
}

#[tokio::test]
async fn list_folder_continue_returns_entries_and_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2/files/list_folder/continue"))
        .and(body_json(json!({"cursor": "abc"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [
                {".tag": "deleted", "name": "A.txt", "path_lower": "/docs/a.txt", "path_display": "/Docs/A.txt"},
                {".tag": "folder", "name": "B", "id": "id:b", "path_lower": "/docs/b", "path_display": "/Docs/B"}
            ],
            "cursor": "def",
            "has_more": false
        })))
        .mount(&server)
        .await;

    let client = DropboxClient::with_base_url(&server.uri(), "test-token").unwrap();
    let page = client.list_folder_continue("abc").await.unwrap();

    assert_eq!(page.cursor, "def");
    assert!(!page.has_more);
    assert!(page.entries[0].is_deleted());
    assert!(page.entries[1].is_folder());
}

#[tokio::test]
async fn structured_errors_are_decoded() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2/files/delete"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error_summary": "path_lookup/not_found/",
            "error": {".tag": "path_lookup", "path_lookup": {".tag": "not_found"}}
        })))
        .mount(&server)
        .await;

    let client = DropboxClient::with_base_url(&server.uri(), "test-token").unwrap();
    let err = client.delete("/missing").await.unwrap_err();

    assert_eq!(err.tag(), Some("path_lookup"));
    assert_eq!(err.path_tag(), Some("not_found"));
    assert_eq!(err.classification(), Some(ApiErrorClass::Permanent));
}

#[tokio::test]
async fn plain_text_errors_keep_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2/files/create_folder"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal server error"))
        .mount(&server)
        .await;

    let client = DropboxClient::with_base_url(&server.uri(), "test-token").unwrap();
    let err = client.create_folder("/x").await.unwrap_err();

    assert!(err.api_error().is_none());
    assert!(err.is_retryable());
    assert!(err.to_string().contains("Internal server error"));
}

#[tokio::test]
async fn move_item_sends_relocation_arg() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2/files/move"))
        .and(body_json(json!({"from_path": "/Docs/A.txt", "to_path": "/Docs/B.txt"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            ".tag": "file",
            "name": "B.txt",
            "id": "id:a",
            "path_lower": "/docs/b.txt",
            "path_display": "/Docs/B.txt"
        })))
        .mount(&server)
        .await;

    let client = DropboxClient::with_base_url(&server.uri(), "test-token").unwrap();
    let md = client.move_item("/Docs/A.txt", "/Docs/B.txt").await.unwrap();

    assert_eq!(md.name, "B.txt");
}

#[tokio::test]
async fn upload_session_calls_use_header_argument() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2/files/upload_session/start"))
        .and(body_string("123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"session_id": "s1"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/files/upload_session/append"))
        .and(api_arg(json!({"session_id": "s1", "offset": 3})))
        .and(body_string("45"))
        .respond_with(ResponseTemplate::new(200).set_body_string("null"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/files/upload_session/finish"))
        .and(api_arg(json!({
            "cursor": {"session_id": "s1", "offset": 5},
            "commit": {
                "path": "/a.txt",
                "mode": {".tag": "overwrite"},
                "autorename": false,
                "mute": false
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "a.txt",
            "id": "id:a",
            "path_lower": "/a.txt",
            "path_display": "/a.txt",
            "size": 5
        })))
        .mount(&server)
        .await;

    let client = DropboxClient::with_base_url(&server.uri(), "test-token").unwrap();
    let session = client.upload_session_start(b"123".to_vec()).await.unwrap();
    assert_eq!(session.session_id, "s1");

    let cursor = UploadSessionCursor {
        session_id: session.session_id.clone(),
        offset: 3,
    };
    client
        .upload_session_append(&cursor, b"45".to_vec())
        .await
        .unwrap();

    let mut commit = CommitInfo::add("/a.txt");
    commit.mode = WriteMode::Overwrite;
    let md = client
        .upload_session_finish(
            UploadSessionCursor {
                session_id: session.session_id,
                offset: 5,
            },
            commit,
            Vec::new(),
        )
        .await
        .unwrap();

    assert_eq!(md.tag, None);
    assert_eq!(md.size, Some(5));
}

#[tokio::test]
async fn download_reads_result_header_and_range() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2/files/download"))
        .and(api_arg(json!({"path": "/a.txt"})))
        .and(header("range", "bytes=2-3"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header(
                    "Dropbox-API-Result",
                    r#"{".tag":"file","name":"a.txt","id":"id:a","path_lower":"/a.txt","path_display":"/a.txt","rev":"r1","size":5}"#,
                )
                .insert_header("ETag", "W/\"r1\"")
                .insert_header("Content-Range", "bytes 2-3/5")
                .set_body_bytes(b"34".to_vec()),
        )
        .mount(&server)
        .await;

    let client = DropboxClient::with_base_url(&server.uri(), "test-token").unwrap();
    let download = client
        .download("/a.txt", Some(ByteSpan::new(2, 3)))
        .await
        .unwrap();

    assert_eq!(download.data, b"34");
    assert_eq!(download.metadata.rev.as_deref(), Some("r1"));
    assert_eq!(download.etag.as_deref(), Some("W/\"r1\""));
    assert_eq!(download.content_range.as_deref(), Some("bytes 2-3/5"));
}

#[tokio::test]
async fn upload_sends_commit_info_in_header() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/2/files/upload"))
        .and(header("authorization", "Bearer test-token"))
        .and(api_arg(json!({
            "path": "/Übersicht.txt",
            "mode": {".tag": "update", "update": "r1"},
            "autorename": true,
            "mute": false
        })))
        .and(body_string("hello"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "Übersicht.txt",
            "id": "id:u",
            "path_lower": "/übersicht.txt",
            "path_display": "/Übersicht.txt",
            "rev": "r2",
            "size": 5
        })))
        .mount(&server)
        .await;

    let client = DropboxClient::with_base_url(&server.uri(), "test-token").unwrap();
    let mut commit = CommitInfo::add("/Übersicht.txt");
    commit.mode = WriteMode::Update {
        update: "r1".to_string(),
    };
    commit.autorename = true;
    let md = client.upload(commit, b"hello".to_vec()).await.unwrap();

    assert_eq!(md.rev.as_deref(), Some("r2"));
    assert_eq!(md.size, Some(5));
}
