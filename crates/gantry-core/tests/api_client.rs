use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{basic_auth, body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gantry_core::api::{ApiClient, ScheduleRequest};
use gantry_core::config::Target;
use gantry_core::error::ApiError;

fn client() -> ApiClient {
    ApiClient::new(Duration::from_secs(5)).unwrap()
}

fn target_for(server: &MockServer) -> Target {
    Target {
        name: "test".to_string(),
        url: Url::parse(&server.uri()).unwrap(),
        username: None,
        password: None,
        project: None,
    }
}

#[tokio::test]
async fn schedule_posts_the_full_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/schedule.json"))
        .and(body_string_contains("project=crawler"))
        .and(body_string_contains("spider=quotes"))
        .and(body_string_contains("_version=r5-main"))
        .and(body_string_contains("setting=DOWNLOAD_DELAY%3D1.5"))
        .and(body_string_contains("depth=2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "jobid": "abc123"})),
        )
        .mount(&server)
        .await;

    let request = ScheduleRequest {
        version: Some("r5-main".to_string()),
        settings: vec!["DOWNLOAD_DELAY=1.5".to_string()],
        args: vec![("depth".to_string(), "2".to_string())],
    };
    let scheduled = client()
        .schedule(&target_for(&server), "crawler", "quotes", &request)
        .await
        .unwrap();

    assert_eq!(scheduled.jobid, "abc123");
}

#[tokio::test]
async fn remote_error_is_surfaced_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/schedule.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"status": "error", "message": "spider 'nope' not found"}),
        ))
        .mount(&server)
        .await;

    let err = client()
        .schedule(
            &target_for(&server),
            "crawler",
            "nope",
            &ScheduleRequest::default(),
        )
        .await
        .unwrap_err();

    match err {
        ApiError::Remote { message } => assert_eq!(message, "spider 'nope' not found"),
        other => panic!("expected remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn error_envelope_wins_over_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/addversion.json"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            json!({"status": "error", "message": "version already exists"}),
        ))
        .mount(&server)
        .await;

    let err = client()
        .add_version(&target_for(&server), "crawler", "1.0.0", b"zip".to_vec())
        .await
        .unwrap_err();

    match err {
        ApiError::Remote { message } => assert_eq!(message, "version already exists"),
        other => panic!("expected remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn status_without_envelope_maps_to_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listprojects.json"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let err = client()
        .list_projects(&target_for(&server))
        .await
        .unwrap_err();

    assert!(
        matches!(err, ApiError::HttpStatus { status: 502, .. }),
        "got: {err:?}"
    );
    assert!(err.is_transport());
}

#[tokio::test]
async fn malformed_success_body_is_a_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listprojects.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
        .mount(&server)
        .await;

    let err = client()
        .list_projects(&target_for(&server))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Protocol { .. }), "got: {err:?}");
}

#[tokio::test]
async fn add_version_sends_a_multipart_upload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/addversion.json"))
        .and(body_string_contains("name=\"project\""))
        .and(body_string_contains("name=\"version\""))
        .and(body_string_contains(
            "name=\"egg\"; filename=\"crawler-1.0.0.zip\"",
        ))
        .and(body_string_contains("application/octet-stream"))
        .and(body_string_contains("fake archive bytes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"status": "ok", "project": "crawler", "version": "1.0.0", "spiders": 3}),
        ))
        .mount(&server)
        .await;

    let deployed = client()
        .add_version(
            &target_for(&server),
            "crawler",
            "1.0.0",
            b"fake archive bytes".to_vec(),
        )
        .await
        .unwrap();

    assert_eq!(deployed.spiders, 3);
    assert_eq!(deployed.version, "1.0.0");
}

#[tokio::test]
async fn credentials_become_basic_auth() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listprojects.json"))
        .and(basic_auth("alice", "s3cret"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "ok", "projects": ["crawler"]})),
        )
        .mount(&server)
        .await;

    let mut target = target_for(&server);
    target.username = Some("alice".to_string());
    target.password = Some("s3cret".to_string());

    let list = client().list_projects(&target).await.unwrap();
    assert_eq!(list.projects, vec!["crawler"]);
}

#[tokio::test]
async fn listing_queries_carry_project_and_version() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listspiders.json"))
        .and(query_param("project", "crawler"))
        .and(query_param("_version", "r5-main"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "ok", "spiders": ["quotes", "authors"]})),
        )
        .mount(&server)
        .await;

    let list = client()
        .list_spiders(&target_for(&server), "crawler", Some("r5-main"))
        .await
        .unwrap();

    assert_eq!(list.spiders, vec!["quotes", "authors"]);
}

#[tokio::test]
async fn job_listing_tolerates_extra_fields() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listjobs.json"))
        .and(query_param("project", "crawler"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "pending": [{"id": "p1", "spider": "quotes"}],
            "running": [{
                "id": "r1",
                "spider": "quotes",
                "start_time": "2026-01-01 10:00:00",
                "pid": 4242,
                "log_url": "/logs/crawler/quotes/r1.log",
            }],
            "finished": [],
        })))
        .mount(&server)
        .await;

    let jobs = client()
        .list_jobs(&target_for(&server), "crawler")
        .await
        .unwrap();

    assert_eq!(jobs.total(), 2);
    assert_eq!(jobs.running[0].id, "r1");
    assert_eq!(
        jobs.running[0].start_time.as_deref(),
        Some("2026-01-01 10:00:00")
    );
    assert!(jobs.finished.is_empty());
}

#[tokio::test]
async fn slow_responses_time_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listprojects.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "ok", "projects": []}))
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let client = ApiClient::new(Duration::from_millis(200)).unwrap();
    let err = client
        .list_projects(&target_for(&server))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Timeout { .. }), "got: {err:?}");
}

#[tokio::test]
async fn refused_connections_are_transport_errors() {
    // Bind then drop to find a port with nothing listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let target = Target {
        name: "gone".to_string(),
        url: Url::parse(&format!("http://{addr}/")).unwrap(),
        username: None,
        password: None,
        project: None,
    };

    let err = client().list_projects(&target).await.unwrap_err();

    assert!(matches!(err, ApiError::Connection { .. }), "got: {err:?}");
    assert!(err.is_transport());
}
