#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tushare_mcp::upstream::{Upstream, UpstreamError, UpstreamResponse};

type Reply = Box<dyn Fn(&str, &Map<String, Value>) -> Result<UpstreamResponse, UpstreamError> + Send + Sync>;

/// An upstream that records every call and answers with a canned reply.
pub struct RecordingUpstream {
    calls: Mutex<Vec<(String, Map<String, Value>)>>,
    reply: Reply,
}

impl RecordingUpstream {
    pub fn new(
        reply: impl Fn(&str, &Map<String, Value>) -> Result<UpstreamResponse, UpstreamError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            reply: Box::new(reply),
        }
    }

    /// Answers every call with `data`.
    pub fn with_data(data: Value) -> Self {
        Self::new(move |_, _| Ok(success(data.clone())))
    }

    pub fn calls(&self) -> Vec<(String, Map<String, Value>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Upstream for RecordingUpstream {
    async fn call(
        &self,
        api_name: &str,
        params: Map<String, Value>,
        _fields: Option<&str>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let reply = (self.reply)(api_name, &params);
        self.calls
            .lock()
            .unwrap()
            .push((api_name.to_string(), params));
        reply
    }
}

/// Lets a test keep a handle on an upstream it gave to a dispatcher.
pub struct SharedUpstream<U>(pub Arc<U>);

#[async_trait]
impl<U: Upstream> Upstream for SharedUpstream<U> {
    async fn call(
        &self,
        api_name: &str,
        params: Map<String, Value>,
        fields: Option<&str>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        self.0.call(api_name, params, fields).await
    }
}

/// An upstream that echoes the request back as a one-row table. Calls for a
/// `ts_code` listed in `delays` sleep for that many milliseconds first.
pub struct EchoUpstream {
    pub delays: Vec<(&'static str, u64)>,
}

#[async_trait]
impl Upstream for EchoUpstream {
    async fn call(
        &self,
        api_name: &str,
        params: Map<String, Value>,
        _fields: Option<&str>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let code = params
            .get("ts_code")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let delay = self
            .delays
            .iter()
            .find(|(ts_code, _)| *ts_code == code)
            .map(|(_, ms)| *ms)
            .unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(delay)).await;

        Ok(success(json!({
            "fields": ["api_name", "ts_code"],
            "items": [[api_name, code]]
        })))
    }
}

/// An upstream whose calls never complete.
pub struct PendingUpstream;

#[async_trait]
impl Upstream for PendingUpstream {
    async fn call(
        &self,
        _api_name: &str,
        _params: Map<String, Value>,
        _fields: Option<&str>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        std::future::pending().await
    }
}

pub fn success(data: Value) -> UpstreamResponse {
    UpstreamResponse {
        code: 0,
        msg: Some(String::new()),
        data: match data {
            Value::Object(data) => Some(data),
            Value::Null => None,
            other => panic!("data must be an object, got {other}"),
        },
    }
}

pub fn args(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => panic!("arguments must be an object"),
    }
}
