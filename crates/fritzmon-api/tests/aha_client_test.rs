#![allow(clippy::unwrap_used)]
// Integration tests for `AhaClient` using wiremock.

use secrecy::SecretString;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use fritzmon_api::{AhaClient, Credentials, Error, SessionId};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, AhaClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = AhaClient::with_client(reqwest::Client::new(), base_url);
    (server, client)
}

fn session_info(sid: &str, challenge: &str, block_time: u32) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?><SessionInfo><SID>{sid}</SID>\
         <Challenge>{challenge}</Challenge><BlockTime>{block_time}</BlockTime><Rights></Rights></SessionInfo>"
    )
}

fn credentials(password: &str) -> Credentials {
    Credentials::new("admin", SecretString::from(password.to_owned()))
}

fn sid() -> SessionId {
    SessionId::new("b2e2c1c0a6f3d4e5")
}

const WEBSERVICE: &str = "/webservices/homeautoswitch.lua";

// ── Authentication tests ────────────────────────────────────────────

#[tokio::test]
async fn test_login_success() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/login_sid.lua"))
        .and(query_param("username", "admin"))
        .and(query_param(
            "response",
            "1234567z-9e224a41eeefa284df7bb0f26c2913e2",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(session_info(
            "b2e2c1c0a6f3d4e5",
            "1234567z",
            0,
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/login_sid.lua"))
        .respond_with(ResponseTemplate::new(200).set_body_string(session_info(
            "0000000000000000",
            "1234567z",
            0,
        )))
        .mount(&server)
        .await;

    let sid = client.login(&credentials("äbc")).await.unwrap();
    assert!(sid.is_valid());
    assert_eq!(sid.as_str(), "b2e2c1c0a6f3d4e5");
}

#[tokio::test]
async fn test_login_wrong_password() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/login_sid.lua"))
        .respond_with(ResponseTemplate::new(200).set_body_string(session_info(
            "0000000000000000",
            "deadbeef",
            0,
        )))
        .mount(&server)
        .await;

    let result = client.login(&credentials("wrong")).await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_login_blocked() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/login_sid.lua"))
        .respond_with(ResponseTemplate::new(200).set_body_string(session_info(
            "0000000000000000",
            "deadbeef",
            32,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.login(&credentials("whatever")).await.unwrap_err();
    assert!(err.is_auth_expired());
    assert!(err.to_string().contains("32s"), "{err}");
}

#[tokio::test]
async fn test_login_unavailable_is_not_an_auth_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/login_sid.lua"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client.login(&credentials("secret")).await.unwrap_err();
    assert!(
        matches!(err, Error::Api { status: 503, .. }),
        "expected Api error, got: {err:?}"
    );
    assert!(!err.is_auth_expired());
}

#[tokio::test]
async fn test_check_session() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/login_sid.lua"))
        .and(query_param("sid", "b2e2c1c0a6f3d4e5"))
        .respond_with(ResponseTemplate::new(200).set_body_string(session_info(
            "b2e2c1c0a6f3d4e5",
            "x",
            0,
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/login_sid.lua"))
        .and(query_param("sid", "ffffffffffffffff"))
        .respond_with(ResponseTemplate::new(200).set_body_string(session_info(
            "0000000000000000",
            "x",
            0,
        )))
        .mount(&server)
        .await;

    assert!(client.check_session(&sid()).await.unwrap());
    assert!(
        !client
            .check_session(&SessionId::new("ffffffffffffffff"))
            .await
            .unwrap()
    );
    // Zero SID never reaches the router.
    assert!(!client.check_session(&SessionId::invalid()).await.unwrap());
}

// ── Webservice tests ────────────────────────────────────────────────

#[tokio::test]
async fn test_get_switch_list() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(WEBSERVICE))
        .and(query_param("switchcmd", "getswitchlist"))
        .and(query_param("sid", "b2e2c1c0a6f3d4e5"))
        .respond_with(ResponseTemplate::new(200).set_body_string("087610000434,087610000435\n"))
        .mount(&server)
        .await;

    let ains = client.get_switch_list(&sid()).await.unwrap();
    assert_eq!(ains, vec!["087610000434", "087610000435"]);
}

#[tokio::test]
async fn test_empty_switch_list() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(WEBSERVICE))
        .and(query_param("switchcmd", "getswitchlist"))
        .respond_with(ResponseTemplate::new(200).set_body_string("\n"))
        .mount(&server)
        .await;

    assert!(client.get_switch_list(&sid()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_forbidden_is_session_expired() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(WEBSERVICE))
        .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
        .mount(&server)
        .await;

    let result = client.get_switch_list(&sid()).await;
    assert!(
        matches!(result, Err(Error::SessionExpired)),
        "expected SessionExpired, got: {result:?}"
    );
}

#[tokio::test]
async fn test_server_error_is_api_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(WEBSERVICE))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = client.get_device_infos(&sid(), "087610000434").await;
    assert!(
        matches!(result, Err(Error::Api { status: 500, .. })),
        "expected Api error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_get_device_infos() {
    let (server, client) = setup().await;

    let xml = r#"<device identifier="08761 0000434" id="17" functionbitmask="35712" fwversion="03.83" manufacturer="AVM" productname="FRITZ!DECT 210"><present>1</present><name>Terrasse</name><switch><state>0</state><mode>auto</mode><lock>0</lock></switch><powermeter><voltage>229000</voltage><power>0</power><energy>12345</energy></powermeter><temperature><celsius>175</celsius><offset>0</offset></temperature></device>"#;

    Mock::given(method("GET"))
        .and(path(WEBSERVICE))
        .and(query_param("switchcmd", "getdeviceinfos"))
        .and(query_param("ain", "087610000434"))
        .respond_with(ResponseTemplate::new(200).set_body_string(xml))
        .mount(&server)
        .await;

    let device = client
        .get_device_infos(&sid(), "08761 0000434")
        .await
        .unwrap();
    assert_eq!(device.identifier, "08761 0000434");
    assert_eq!(device.name.as_deref(), Some("Terrasse"));
    assert_eq!(device.product_name.as_deref(), Some("FRITZ!DECT 210"));
    assert_eq!(
        device.temperature.unwrap().celsius.as_deref(),
        Some("175")
    );
}

#[tokio::test]
async fn test_get_thermostat_list_filters_hkr_devices() {
    let (server, client) = setup().await;

    let xml = r#"<devicelist version="1">
<device identifier="08761 0000434" functionbitmask="35712" productname="FRITZ!DECT 200"><present>1</present><name>Plug</name><switch><state>1</state></switch></device>
<device identifier="11960 0089208" functionbitmask="320" productname="Comet DECT"><present>1</present><name>Bad</name><hkr><tist>40</tist><tsoll>44</tsoll></hkr></device>
</devicelist>"#;

    Mock::given(method("GET"))
        .and(path(WEBSERVICE))
        .and(query_param("switchcmd", "getdevicelistinfos"))
        .respond_with(ResponseTemplate::new(200).set_body_string(xml))
        .mount(&server)
        .await;

    let ains = client.get_thermostat_list(&sid()).await.unwrap();
    assert_eq!(ains, vec!["11960 0089208"]);
}

#[tokio::test]
async fn test_set_switch() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(WEBSERVICE))
        .and(query_param("switchcmd", "setswitchon"))
        .and(query_param("ain", "087610000434"))
        .respond_with(ResponseTemplate::new(200).set_body_string("1\n"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(WEBSERVICE))
        .and(query_param("switchcmd", "setswitchoff"))
        .respond_with(ResponseTemplate::new(200).set_body_string("0\n"))
        .expect(1)
        .mount(&server)
        .await;

    tokio_test::assert_ok!(client.set_switch(&sid(), "087610000434", true).await);
    assert!(!client.set_switch(&sid(), "087610000434", false).await.unwrap());
}

#[tokio::test]
async fn test_set_switch_rejects_garbage() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(WEBSERVICE))
        .respond_with(ResponseTemplate::new(200).set_body_string("inval\n"))
        .mount(&server)
        .await;

    let result = client.set_switch(&sid(), "087610000434", true).await;
    assert!(matches!(result, Err(Error::Api { .. })), "{result:?}");
}
