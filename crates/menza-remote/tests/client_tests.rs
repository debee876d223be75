use std::time::Duration;

use menza_remote::{MenzaClient, MenzaClientConfig};
use menza_sync::{FetchError, Fingerprint};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> MenzaClient {
    MenzaClient::new(MenzaClientConfig {
        api_base_url: Some(server.uri()),
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

#[tokio::test]
async fn fingerprint_is_scoped_by_subsystem() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/cs/hash/dishes"))
        .and(query_param("subsystem", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"hash":"a1b2"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let fingerprint = client_for(&server)
        .fingerprint("cs", "dishes", Some(3))
        .await
        .unwrap();

    assert_eq!(fingerprint, Fingerprint::new("a1b2"));
}

#[tokio::test]
async fn empty_hash_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/en/hash/pictograms"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"hash":"  "}"#))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .fingerprint("en", "pictograms", None)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Malformed(_)));
}

#[tokio::test]
async fn decodes_subsystems() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/cs/subsystems"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"[
                {"id": 1, "name": "Menza Strahov", "kind": "menza", "open": true},
                {"id": 2, "name": "Technická menza"}
            ]"#,
        ))
        .mount(&server)
        .await;

    let subsystems = client_for(&server).subsystems("cs").await.unwrap();

    assert_eq!(subsystems.len(), 2);
    assert_eq!(subsystems[0].kind.as_deref(), Some("menza"));
    assert!(subsystems[0].open);
    assert!(!subsystems[1].open);
}

#[tokio::test]
async fn not_found_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/cs/subsystems/9/info"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .cafeteria_info("cs", 9)
        .await
        .unwrap_err();

    assert!(err.is_unavailable());
}

#[tokio::test]
async fn rejected_credentials_are_unauthorized() {
    let server = MockServer::start().await;

    for (status, lang) in [(401, "cs"), (403, "en")] {
        Mock::given(method("GET"))
            .and(path(format!("/v1/{lang}/pictograms")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
    }

    let client = client_for(&server);
    for lang in ["cs", "en"] {
        let err = client.pictograms(lang).await.unwrap_err();
        assert!(err.is_batch_fatal(), "{lang}: {err}");
    }
}

#[tokio::test]
async fn server_error_is_network() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/cs/subsystems"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client_for(&server).subsystems("cs").await.unwrap_err();

    match err {
        FetchError::Network(message) => assert!(message.contains("503")),
        other => panic!("expected network error, got {other:?}"),
    }
}

#[tokio::test]
async fn undecodable_body_is_malformed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/cs/subsystems/1/weeks"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = client_for(&server).weeks("cs", 1).await.unwrap_err();

    assert!(matches!(err, FetchError::Malformed(_)));
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/cs/subsystems"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[]")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let client = MenzaClient::new(MenzaClientConfig {
        api_base_url: Some(server.uri()),
        timeout: Duration::from_millis(100),
    })
    .unwrap();

    let err = client.subsystems("cs").await.unwrap_err();
    assert_eq!(err, FetchError::Timeout);
}

#[tokio::test]
async fn trailing_slash_in_base_url_is_ignored() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/cs/pictograms"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(1)
        .mount(&server)
        .await;

    let client = MenzaClient::new(MenzaClientConfig {
        api_base_url: Some(format!("{}/", server.uri())),
        timeout: Duration::from_secs(5),
    })
    .unwrap();

    assert!(client.pictograms("cs").await.unwrap().is_empty());
}
