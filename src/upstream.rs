//! # Upstream Client
//!
//! A single-endpoint JSON client for the Tushare Pro API. Every dataset is
//! reached through the same POST; the body names the dataset (`api_name`),
//! carries the token and a free-form `params` mapping, and the reply is a
//! uniform `{code, msg, data}` envelope.
//!
//! One call is one HTTP exchange. There is no retry and no caching.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error};
use url::Url;

use crate::config::Config;

/// Default Tushare Pro endpoint
pub const DEFAULT_API_URL: &str = "https://api.tushare.pro";

/// Upper bound on a single upstream exchange, in seconds
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Failure classes of an upstream call.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// No token is configured; nothing was sent.
    #[error("Tushare token is required")]
    Configuration,
    /// The exchange did not complete or returned a non-success status.
    #[error("Request failed: {0}")]
    Transport(#[source] reqwest::Error),
    /// The upstream answered with a nonzero code.
    #[error("Tushare API error: {message} (code: {code})")]
    Application { code: i64, message: String },
    /// A success status whose body is not a valid envelope.
    #[error("Malformed response from Tushare API: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Body of an upstream request.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UpstreamRequest<'a> {
    pub api_name: &'a str,
    pub token: &'a str,
    pub params: &'a Map<String, Value>,
    pub fields: Option<&'a str>,
}

/// The uniform upstream envelope.
///
/// `data` is kept as the upstream sent it, usually `{fields, items}` where
/// `items[i]` is positionally aligned with `fields`, plus keys such as
/// `has_more`. Key order is preserved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpstreamResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
}

impl UpstreamResponse {
    /// Converts an envelope with a nonzero code into an application error.
    pub fn into_result(self) -> Result<Self, UpstreamError> {
        if self.code == 0 {
            return Ok(self);
        }
        Err(UpstreamError::Application {
            code: self.code,
            message: self.msg.unwrap_or_default(),
        })
    }
}

/// The operation the dispatcher needs from an upstream.
#[async_trait]
pub trait Upstream: Send + Sync + 'static {
    /// Queries `api_name` with `params`, optionally restricting the
    /// returned columns to the comma-separated `fields`.
    async fn call(
        &self,
        api_name: &str,
        params: Map<String, Value>,
        fields: Option<&str>,
    ) -> Result<UpstreamResponse, UpstreamError>;
}

/// HTTP implementation of [`Upstream`] for the Tushare Pro API.
///
/// The underlying `reqwest::Client` is shared between calls for connection
/// reuse; request and response values are per call.
#[derive(Clone)]
pub struct TushareClient {
    client: reqwest::Client,
    api_url: Url,
    token: Option<String>,
}

impl TushareClient {
    /// Creates a client from the process configuration.
    pub fn new(config: &Config) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(UpstreamError::Transport)?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            token: config
                .tushare_token
                .clone()
                .filter(|token| !token.is_empty()),
        })
    }

    async fn make_request(
        &self,
        api_name: &str,
        params: &Map<String, Value>,
        fields: Option<&str>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let token = self.token.as_deref().ok_or(UpstreamError::Configuration)?;

        let request = UpstreamRequest {
            api_name,
            token,
            params,
            fields,
        };
        debug!(api_name, ?params, "Sending Tushare request");

        let response = self
            .client
            .post(self.api_url.clone())
            .json(&request)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(UpstreamError::Transport)?;

        let body = response.bytes().await.map_err(UpstreamError::Transport)?;
        let envelope: UpstreamResponse =
            serde_json::from_slice(&body).map_err(UpstreamError::Decode)?;

        envelope.into_result()
    }
}

#[async_trait]
impl Upstream for TushareClient {
    async fn call(
        &self,
        api_name: &str,
        params: Map<String, Value>,
        fields: Option<&str>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let result = self.make_request(api_name, &params, fields).await;
        if let Err(e) = &result {
            error!(api_name, "Tushare call failed: {}", e);
        }
        result
    }
}
