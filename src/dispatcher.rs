//! # Tool Dispatcher
//!
//! The boundary between `tools/call` and the upstream API. [`Dispatcher::invoke`]
//! never fails: every outcome, including unknown tools and upstream errors,
//! is turned into a [`CallToolResponse`] by [`into_response`], so no error
//! crosses into the protocol layer.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::tools::{Tools, UnknownTool};
use crate::types::{CallToolResponse, Tool};
use crate::upstream::{Upstream, UpstreamError};

/// Text returned when the upstream succeeds without a payload.
pub const NO_DATA_MESSAGE: &str = "No data returned from Tushare API";

/// Failures inside a single tool invocation.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    UnknownTool(#[from] UnknownTool),
    #[error("Invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("Failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Successful outcome of an invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Pretty-printed upstream `data`
    Data(String),
    /// The upstream returned no payload, or an empty one
    NoData,
}

/// Routes tool calls to the upstream API.
///
/// Cheap to clone; clones share the registry and the upstream client.
pub struct Dispatcher<U: Upstream> {
    tools: Arc<Tools>,
    upstream: Arc<U>,
}

impl<U: Upstream> Clone for Dispatcher<U> {
    fn clone(&self) -> Self {
        Self {
            tools: self.tools.clone(),
            upstream: self.upstream.clone(),
        }
    }
}

impl<U: Upstream> Dispatcher<U> {
    /// Creates a dispatcher over the full tool catalogue.
    pub fn new(upstream: U) -> Self {
        Self::with_tools(Tools::new(), upstream)
    }

    pub fn with_tools(tools: Tools, upstream: U) -> Self {
        Self {
            tools: Arc::new(tools),
            upstream: Arc::new(upstream),
        }
    }

    /// Descriptors of every tool, in catalogue order.
    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.list_tools()
    }

    /// Invokes `name` with `arguments` and returns the content for the host.
    pub async fn invoke(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> CallToolResponse {
        let arguments = strip_nulls(arguments.unwrap_or_default());
        info!(tool = name, ?arguments, "Calling tool");

        let result = self.try_invoke(name, arguments.clone()).await;
        if let Err(e) = &result {
            error!(tool = name, ?arguments, "Error calling tool {}: {}", name, e);
        }
        into_response(result)
    }

    async fn try_invoke(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<Envelope, DispatchError> {
        let tool = self.tools.resolve(name)?;
        let params =
            tool.encode_params(arguments)
                .map_err(|source| DispatchError::InvalidArguments {
                    tool: tool.name().to_string(),
                    source,
                })?;

        let response = self.upstream.call(tool.api_name(), params, None).await?;
        match response.data {
            Some(data) if !data.is_empty() => render(&data).map(Envelope::Data),
            _ => Ok(Envelope::NoData),
        }
    }
}

/// Drops every argument whose value is null. The upstream treats an
/// explicit null differently from an omitted key.
pub fn strip_nulls(arguments: Map<String, Value>) -> Map<String, Value> {
    arguments
        .into_iter()
        .filter(|(_, value)| !value.is_null())
        .collect()
}

/// Pretty-prints `data` with a two-space indent, keeping key order and
/// leaving non-ASCII text unescaped.
fn render(data: &Map<String, Value>) -> Result<String, DispatchError> {
    let mut out = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(
        &mut out,
        serde_json::ser::PrettyFormatter::with_indent(b"  "),
    );
    data.serialize(&mut serializer)
        .map_err(DispatchError::Encode)?;
    // serde_json only ever writes UTF-8.
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// The single conversion from an invocation outcome to the host envelope.
pub fn into_response(result: Result<Envelope, DispatchError>) -> CallToolResponse {
    match result {
        Ok(Envelope::Data(text)) => crate::tool_text_response!(text),
        Ok(Envelope::NoData) => crate::tool_text_response!(NO_DATA_MESSAGE.to_string()),
        Err(e) => crate::tool_error_response!(e),
    }
}
