use pianola_infra_storage_supabase::{SupabaseConfig, SupabaseStorage};
use pianola_ports::storage::{AnimationStorePort, AnimationUpload, StorageError};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn storage_for(uri: &str) -> SupabaseStorage {
    SupabaseStorage::new(SupabaseConfig::new(format!("{uri}/"), "anon-key")).expect("configured")
}

// The blocking client must live and die off the async executor.
async fn store(server: &MockServer) -> Result<String, StorageError> {
    let uri = server.uri();
    tokio::task::spawn_blocking(move || {
        let storage = storage_for(&uri);
        let payload = json!({"notes": [], "tempo": 120});
        storage.store_animation(&AnimationUpload {
            job_id: "job-9",
            title: "Etude",
            user_id: None,
            payload: &payload,
        })
    })
    .await
    .expect("join")
}

#[tokio::test]
async fn successful_upload_returns_public_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path_regex(r"^/storage/v1/object/animation-data/\d{8}_\d{6}_job-9\.json$"))
        .and(header("authorization", "Bearer anon-key"))
        .and(header("apikey", "anon-key"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"notes": [], "tempo": 120})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let url = store(&server).await.expect("upload ok");
    let prefix = format!("{}/storage/v1/object/public/animation-data/", server.uri());
    assert!(url.starts_with(&prefix), "{url}");
    assert!(url.ends_with("_job-9.json"), "{url}");
}

#[tokio::test]
async fn rejected_upload_is_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("bad key"))
        .mount(&server)
        .await;

    let err = store(&server).await.unwrap_err();
    match err {
        StorageError::Remote(msg) => assert!(msg.contains("bad key"), "{msg}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn connection_check_lists_buckets() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/bucket"))
        .and(header("apikey", "anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let uri = server.uri();
    let result = tokio::task::spawn_blocking(move || storage_for(&uri).check_connection())
        .await
        .expect("join");
    assert!(result.is_ok());
}

#[test]
fn missing_credentials_are_not_configured() {
    let result = SupabaseStorage::new(SupabaseConfig::new("", "key"));
    assert!(matches!(result, Err(StorageError::NotConfigured(_))));
}
