//! Client behaviour against a mocked pose server.

use pose_wire::{PoseClientError, PoseServerClient, SessionResult};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_get_result_variants() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/result"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"status":"completed","average_pose_score":88.12}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let client = PoseServerClient::new(&server.uri());
    let result = client.get_result().await.unwrap();
    assert_eq!(
        result,
        SessionResult::Completed {
            average_pose_score: 88.12
        }
    );
}

#[tokio::test]
async fn test_no_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/result"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"status":"no_session"}"#, "application/json"),
        )
        .mount(&server)
        .await;

    let client = PoseServerClient::new(&server.uri());
    assert_eq!(client.get_result().await.unwrap(), SessionResult::NoSession);
}

#[tokio::test]
async fn test_server_error_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/stop"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let client = PoseServerClient::new(&server.uri());
    match client.stop_session().await {
        Err(PoseClientError::ServerError { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unparseable_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/result"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"status":"paused"}"#, "application/json"))
        .mount(&server)
        .await;

    let client = PoseServerClient::new(&server.uri());
    assert!(matches!(
        client.get_result().await,
        Err(PoseClientError::Parse(_))
    ));
}
