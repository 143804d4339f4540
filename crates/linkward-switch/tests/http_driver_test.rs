#![allow(clippy::unwrap_used)]
// Integration tests for the REST switch driver using wiremock.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{basic_auth, body_string, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use linkward_switch::{
    Credentials, Error, HttpClient, HttpSwitch, Switch, SwitchDriver, TlsMode, TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn credentials() -> Credentials {
    Credentials::new("admin", SecretString::from("hunter2".to_owned()))
}

async fn setup() -> (MockServer, HttpSwitch) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/api/", server.uri())).unwrap();
    let client = HttpClient::with_client(reqwest::Client::new(), base_url, credentials()).unwrap();
    (server, HttpSwitch::from_client("sw0", client))
}

// ── Mutating primitives ─────────────────────────────────────────────

#[tokio::test]
async fn test_set_native_vlan_sends_form_with_basic_auth() {
    let (server, switch) = setup().await;

    Mock::given(method("PUT"))
        .and(path("/api/interfaces/eth4/native-vlan"))
        .and(basic_auth("admin", "hunter2"))
        .and(body_string("vlan=100"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    switch.session().set_native_vlan("eth4", 100).await.unwrap();
}

#[tokio::test]
async fn test_add_vlan_to_trunk_posts_vlan() {
    let (server, switch) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/interfaces/eth4/trunk"))
        .and(body_string("vlan=42"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    switch.session().add_vlan_to_trunk("eth4", 42).await.unwrap();
}

#[tokio::test]
async fn test_interface_label_is_one_encoded_segment() {
    let (server, switch) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/interfaces/gi1%2F0%2F4/shutdown"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    switch.session().shutdown_port("gi1/0/4").await.unwrap();
}

#[tokio::test]
async fn test_removals_tolerate_not_found() {
    let (server, switch) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/interfaces/eth4/native-vlan"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no native vlan"))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/interfaces/eth4/trunk/42"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let session = switch.session();
    session.remove_native_vlan("eth4").await.unwrap();
    session.remove_vlan_from_trunk("eth4", 42).await.unwrap();
}

#[tokio::test]
async fn test_rejection_carries_body_and_reason() {
    let (server, switch) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/interfaces/eth4/trunk"))
        .respond_with(ResponseTemplate::new(500).set_body_string("vlan 42 is not defined"))
        .mount(&server)
        .await;

    let result = switch.session().add_vlan_to_trunk("eth4", 42).await;

    match result {
        Err(Error::Switch {
            status,
            reason,
            body,
        }) => {
            assert_eq!(status, 500);
            assert_eq!(reason, "Internal Server Error");
            assert_eq!(body, "vlan 42 is not defined");
        }
        other => panic!("expected Switch error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_remove_all_does_not_tolerate_not_found() {
    let (server, switch) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/interfaces/eth9/trunk"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such interface"))
        .mount(&server)
        .await;

    let err = switch
        .session()
        .remove_all_vlans_from_trunk("eth9")
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_switch_wide_acceptable_codes() {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/api/", server.uri())).unwrap();
    let client = HttpClient::with_client(reqwest::Client::new(), base_url, credentials()).unwrap();
    let switch = HttpSwitch::from_client("sw0", client).with_acceptable_error_codes(vec![409]);

    Mock::given(method("POST"))
        .and(path("/api/interfaces/eth4/trunk"))
        .respond_with(ResponseTemplate::new(409).set_body_string("already a member"))
        .mount(&server)
        .await;

    switch.session().add_vlan_to_trunk("eth4", 42).await.unwrap();
}

// ── Queries ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_native_vlan() {
    let (server, switch) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/interfaces/eth4/native-vlan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "vlan": 100 })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/interfaces/eth5/native-vlan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "vlan": null })))
        .mount(&server)
        .await;

    let session = switch.session();
    assert_eq!(session.get_native_vlan("eth4").await.unwrap(), Some(100));
    assert_eq!(session.get_native_vlan("eth5").await.unwrap(), None);
}

#[tokio::test]
async fn test_get_vlans_preserves_switch_order() {
    let (server, switch) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/interfaces/eth4/trunk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "vlans": [120, 101, 150] })))
        .mount(&server)
        .await;

    let vlans = switch.session().get_vlans("eth4").await.unwrap();
    assert_eq!(vlans, vec![120, 101, 150]);
}

#[tokio::test]
async fn test_out_of_range_vlan_is_malformed() {
    let (server, switch) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/interfaces/eth4/trunk"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "vlans": [100, 0] })))
        .mount(&server)
        .await;

    let result = switch.session().get_vlans("eth4").await;
    assert!(
        matches!(result, Err(Error::Malformed { .. })),
        "expected Malformed error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_garbage_body_is_deserialization_error() {
    let (server, switch) = setup().await;

    Mock::given(method("GET"))
        .and(path("/api/interfaces/eth4/native-vlan"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let result = switch.session().get_native_vlan("eth4").await;
    match result {
        Err(Error::Deserialization { body, .. }) => assert_eq!(body, "<html>login</html>"),
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}

// ── Transport ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_slow_switch_times_out_as_transient() {
    let server = MockServer::start().await;
    let base_url = Url::parse(&format!("{}/api/", server.uri())).unwrap();
    let transport = TransportConfig {
        tls: TlsMode::System,
        timeout: Duration::from_millis(200),
    };
    let switch = HttpSwitch::new("sw0", base_url, credentials(), &transport).unwrap();

    Mock::given(method("POST"))
        .and(path("/api/interfaces/eth4/shutdown"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let err = switch.session().shutdown_port("eth4").await.unwrap_err();
    assert!(matches!(err, Error::Timeout { .. }), "got: {err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_open_returns_boxed_driver() {
    let (server, switch) = setup().await;

    Mock::given(method("DELETE"))
        .and(path("/api/interfaces/eth4/trunk"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let driver = switch.open().await.unwrap();
    driver.remove_all_vlans_from_trunk("eth4").await.unwrap();
    driver.disconnect().await.unwrap();
    assert_eq!(switch.name(), "sw0");
}
