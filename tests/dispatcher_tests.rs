mod common;

use std::sync::Arc;

use common::{args, success, EchoUpstream, RecordingUpstream, SharedUpstream};
use serde_json::{json, Value};
use tushare_mcp::dispatcher::{Dispatcher, NO_DATA_MESSAGE};
use tushare_mcp::tools::{Tools, TushareTool};
use tushare_mcp::upstream::{UpstreamError, UpstreamResponse};

#[tokio::test]
async fn test_unknown_tool_is_reported_in_envelope() {
    let upstream = Arc::new(RecordingUpstream::with_data(json!({})));
    let dispatcher = Dispatcher::new(SharedUpstream(upstream.clone()));

    let response = dispatcher.invoke("minute_bars", None).await;

    assert_eq!(response.is_error, Some(true));
    assert_eq!(response.text(), "Error: Unknown tool: minute_bars");
    assert!(upstream.calls().is_empty());
}

#[tokio::test]
async fn test_null_arguments_are_not_forwarded() {
    let upstream = Arc::new(RecordingUpstream::with_data(json!({
        "fields": ["ts_code"],
        "items": [["000001.SZ"]]
    })));
    let dispatcher = Dispatcher::new(SharedUpstream(upstream.clone()));

    dispatcher
        .invoke(
            "daily",
            args(json!({
                "ts_code": "000001.SZ",
                "trade_date": null,
                "start_date": null,
                "end_date": null
            })),
        )
        .await;

    let calls = upstream.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "daily");
    assert_eq!(Value::Object(calls[0].1.clone()), json!({"ts_code": "000001.SZ"}));
}

#[tokio::test]
async fn test_undeclared_arguments_are_forwarded() {
    let upstream = Arc::new(RecordingUpstream::with_data(json!({
        "fields": ["ts_code"],
        "items": [["000001.SZ"]]
    })));
    let dispatcher = Dispatcher::new(SharedUpstream(upstream.clone()));

    let response = dispatcher
        .invoke(
            "daily",
            args(json!({"ts_code": "000001.SZ", "adj": "qfq", "offset": 10, "ma": null})),
        )
        .await;

    assert_eq!(response.is_error, None);
    let calls = upstream.calls();
    assert_eq!(calls[0].0, "daily");
    assert_eq!(
        Value::Object(calls[0].1.clone()),
        json!({"ts_code": "000001.SZ", "adj": "qfq", "offset": 10})
    );
}

#[tokio::test]
async fn test_data_is_returned_unchanged() {
    let data = json!({
        "fields": ["ts_code", "trade_date", "close"],
        "items": [
            ["000001.SZ", "20240102", 9.39],
            ["000001.SZ", "20240103", 9.41]
        ]
    });
    let dispatcher = Dispatcher::new(RecordingUpstream::with_data(data.clone()));

    let response = dispatcher
        .invoke(
            "daily",
            args(json!({"ts_code": "000001.SZ", "start_date": "20240101", "end_date": "20240105"})),
        )
        .await;

    assert_eq!(response.is_error, None);
    assert_eq!(response.content.len(), 1);
    let text = response.text();
    assert!(text.starts_with("{\n  \"fields\""));
    let parsed: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, data);
}

#[tokio::test]
async fn test_stock_names_are_not_escaped() {
    let dispatcher = Dispatcher::new(RecordingUpstream::with_data(json!({
        "fields": ["ts_code", "name"],
        "items": [["000001.SZ", "平安银行"]]
    })));

    let response = dispatcher
        .invoke("stock_basic", args(json!({"ts_code": "000001.SZ"})))
        .await;

    assert!(response.text().contains("平安银行"));
}

#[tokio::test]
async fn test_missing_data_yields_no_data_message() {
    let dispatcher = Dispatcher::new(RecordingUpstream::new(|_, _| {
        Ok(UpstreamResponse {
            code: 0,
            msg: None,
            data: None,
        })
    }));

    let response = dispatcher
        .invoke("weekly", args(json!({"ts_code": "000001.SZ"})))
        .await;

    assert_eq!(response.text(), NO_DATA_MESSAGE);
    assert_eq!(response.is_error, None);
}

#[tokio::test]
async fn test_empty_data_yields_no_data_message() {
    let dispatcher = Dispatcher::new(RecordingUpstream::with_data(json!({})));

    let response = dispatcher.invoke("monthly", None).await;

    assert_eq!(response.text(), NO_DATA_MESSAGE);
}

#[tokio::test]
async fn test_empty_table_is_still_data() {
    let dispatcher = Dispatcher::new(RecordingUpstream::with_data(json!({
        "fields": [],
        "items": []
    })));

    let response = dispatcher
        .invoke("index_daily", args(json!({"ts_code": "399300.SZ", "trade_date": "20240106"})))
        .await;

    assert_eq!(response.text(), "{\n  \"fields\": [],\n  \"items\": []\n}");
}

#[tokio::test]
async fn test_data_keys_are_not_added_or_reordered() {
    let dispatcher = Dispatcher::new(RecordingUpstream::with_data(json!({
        "has_more": false,
        "items": [[1]]
    })));

    let response = dispatcher.invoke("index_weekly", None).await;

    assert_eq!(
        response.text(),
        "{\n  \"has_more\": false,\n  \"items\": [\n    [\n      1\n    ]\n  ]\n}"
    );
}

#[tokio::test]
async fn test_application_error_is_reported_in_envelope() {
    let dispatcher = Dispatcher::new(RecordingUpstream::new(|_, _| {
        Err(UpstreamError::Application {
            code: 10001,
            message: "invalid token".to_string(),
        })
    }));

    let response = dispatcher
        .invoke("daily", args(json!({"ts_code": "000001.SZ"})))
        .await;

    assert_eq!(response.is_error, Some(true));
    assert_eq!(
        response.text(),
        "Error: Tushare API error: invalid token (code: 10001)"
    );
}

#[tokio::test]
async fn test_missing_token_is_reported_in_envelope() {
    let dispatcher = Dispatcher::new(RecordingUpstream::new(|_, _| {
        Err(UpstreamError::Configuration)
    }));

    let response = dispatcher.invoke("stock_basic", None).await;

    assert_eq!(response.is_error, Some(true));
    assert_eq!(response.text(), "Error: Tushare token is required");
}

#[tokio::test]
async fn test_argument_of_wrong_type_is_reported_in_envelope() {
    let upstream = Arc::new(RecordingUpstream::with_data(json!({})));
    let dispatcher = Dispatcher::new(SharedUpstream(upstream.clone()));

    let response = dispatcher
        .invoke("stock_basic", args(json!({"limit": "many"})))
        .await;

    assert_eq!(response.is_error, Some(true));
    assert!(response.text().starts_with("Error: Invalid arguments for stock_basic"));
    assert!(upstream.calls().is_empty());
}

#[tokio::test]
async fn test_restricted_registry_rejects_other_tools() {
    let dispatcher = Dispatcher::with_tools(
        Tools::with_tools(&[TushareTool::Daily]),
        RecordingUpstream::new(|_, _| Ok(success(json!({"fields": ["a"], "items": [[1]]})))),
    );

    assert_eq!(dispatcher.list_tools().len(), 1);
    let response = dispatcher.invoke("weekly", None).await;
    assert_eq!(response.text(), "Error: Unknown tool: weekly");
}

#[tokio::test]
async fn test_concurrent_invocations_are_independent() {
    let dispatcher = Dispatcher::new(EchoUpstream {
        delays: vec![("000001.SZ", 200), ("600000.SH", 50)],
    });

    let calls = [
        ("daily", "000001.SZ"),
        ("weekly", "600000.SH"),
        ("index_daily", "399300.SZ"),
        ("monthly", "000002.SZ"),
    ];
    let handles: Vec<_> = calls
        .iter()
        .map(|(tool, ts_code)| {
            let dispatcher = dispatcher.clone();
            let (tool, ts_code) = (*tool, *ts_code);
            tokio::spawn(async move {
                dispatcher
                    .invoke(tool, args(json!({"ts_code": ts_code})))
                    .await
            })
        })
        .collect();

    for ((tool, ts_code), handle) in calls.iter().zip(handles) {
        let response = handle.await.unwrap();
        let parsed: Value = serde_json::from_str(&response.text()).unwrap();
        assert_eq!(
            parsed,
            json!({"fields": ["api_name", "ts_code"], "items": [[tool, ts_code]]})
        );
    }
}
