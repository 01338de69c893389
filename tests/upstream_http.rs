use serde_json::{json, Map, Value};
use tushare_mcp::config::Config;
use tushare_mcp::dispatcher::Dispatcher;
use tushare_mcp::upstream::{TushareClient, Upstream, UpstreamError};
use url::Url;
use wiremock::matchers::{any, body_json, header, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, token: Option<&str>) -> TushareClient {
    let config = Config {
        tushare_token: token.map(str::to_string),
        api_url: Url::parse(&server.uri()).unwrap(),
        ..Config::default()
    };
    TushareClient::new(&config).unwrap()
}

fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => panic!("params must be an object"),
    }
}

#[tokio::test]
async fn test_posts_request_body_and_returns_data() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "api_name": "daily",
            "token": "test-token",
            "params": {"ts_code": "000001.SZ", "trade_date": "20240102"},
            "fields": null
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "request_id": "a1b2",
            "code": 0,
            "msg": "",
            "data": {
                "fields": ["ts_code", "trade_date", "close"],
                "items": [["000001.SZ", "20240102", 9.39]],
                "has_more": false
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("test-token"));
    let response = client
        .call(
            "daily",
            params(json!({"ts_code": "000001.SZ", "trade_date": "20240102"})),
            None,
        )
        .await
        .unwrap();

    let data = Value::Object(response.data.unwrap());
    assert_eq!(
        data,
        json!({
            "fields": ["ts_code", "trade_date", "close"],
            "items": [["000001.SZ", "20240102", 9.39]],
            "has_more": false
        })
    );
}

#[tokio::test]
async fn test_fields_are_sent_when_given() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!({
            "api_name": "stock_basic",
            "token": "test-token",
            "params": {},
            "fields": "ts_code,name"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "",
            "data": {"fields": ["ts_code", "name"], "items": []}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, Some("test-token"));
    let response = client
        .call("stock_basic", Map::new(), Some("ts_code,name"))
        .await
        .unwrap();

    assert_eq!(response.data.unwrap()["items"], json!([]));
}

#[tokio::test]
async fn test_nonzero_code_is_application_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 40101,
            "msg": "token不对，请确认",
            "data": null
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("wrong"));
    let err = client.call("daily", Map::new(), None).await.unwrap_err();

    match err {
        UpstreamError::Application { code, message } => {
            assert_eq!(code, 40101);
            assert_eq!(message, "token不对，请确认");
        }
        other => panic!("expected application error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_error_status_is_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("test-token"));
    let err = client.call("daily", Map::new(), None).await.unwrap_err();

    assert!(matches!(err, UpstreamError::Transport(_)), "got {err:?}");
    assert!(err.to_string().starts_with("Request failed: "));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_transport_error() {
    let server = MockServer::start().await;
    let client = client_for(&server, Some("test-token"));
    drop(server);

    let err = client.call("daily", Map::new(), None).await.unwrap_err();

    assert!(matches!(err, UpstreamError::Transport(_)), "got {err:?}");
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server, Some("test-token"));
    let err = client.call("daily", Map::new(), None).await.unwrap_err();

    assert!(matches!(err, UpstreamError::Decode(_)), "got {err:?}");
}

#[tokio::test]
async fn test_missing_token_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    for token in [None, Some("")] {
        let client = client_for(&server, token);
        let err = client.call("daily", Map::new(), None).await.unwrap_err();
        assert!(matches!(err, UpstreamError::Configuration), "got {err:?}");
    }

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_tool_call_through_http_client() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!({
            "api_name": "index_weight",
            "token": "test-token",
            "params": {"index_code": "399300.SZ", "trade_date": "20240131"},
            "fields": null
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "",
            "data": {
                "fields": ["index_code", "con_code", "trade_date", "weight"],
                "items": [["399300.SZ", "600519.SH", "20240131", 5.87]]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new(client_for(&server, Some("test-token")));
    let response = dispatcher
        .invoke(
            "index_weight",
            params(json!({
                "index_code": "399300.SZ",
                "trade_date": "20240131",
                "start_date": null
            }))
            .into(),
        )
        .await;

    assert_eq!(response.is_error, None);
    let parsed: Value = serde_json::from_str(&response.text()).unwrap();
    assert_eq!(
        parsed,
        json!({
            "fields": ["index_code", "con_code", "trade_date", "weight"],
            "items": [["399300.SZ", "600519.SH", "20240131", 5.87]]
        })
    );
}

#[tokio::test]
async fn test_tool_call_reports_upstream_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 10001,
            "msg": "invalid token",
            "data": null
        })))
        .mount(&server)
        .await;

    let dispatcher = Dispatcher::new(client_for(&server, Some("expired")));
    let response = dispatcher.invoke("daily", None).await;

    assert_eq!(response.is_error, Some(true));
    assert!(response.text().contains("invalid token"));
}
