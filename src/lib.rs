//! # Tushare MCP Server
//!
//! `tushare-mcp` exposes Chinese equity and index market data from the
//! Tushare Pro API as Model Context Protocol (MCP) tools, so an AI assistant
//! host can list the available datasets and query them.
//!
//! ## Architecture
//!
//! - **Upstream** ([`upstream`]): the JSON-over-HTTP client for Tushare Pro
//! - **Tools** ([`tools`], [`params`]): the fixed catalogue of tools and
//!   their typed, schema-advertised parameters
//! - **Dispatcher** ([`dispatcher`]): turns a `tools/call` into an upstream
//!   call and the outcome into a text envelope, never failing
//! - **Protocol** ([`protocol`]) and **Server** ([`server`]): JSON-RPC
//!   dispatch and the MCP method handlers
//! - **Transport** ([`transport`]): stdio and SSE server transports
//! - **Config** ([`config`]): the immutable process configuration
//!
//! ## Usage
//!
//! ```no_run
//! use tushare_mcp::{
//!     config::Config, dispatcher::Dispatcher, server::Server,
//!     transport::ServerStdioTransport, upstream::TushareClient,
//! };
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load();
//! let dispatcher = Dispatcher::new(TushareClient::new(&config)?);
//! let protocol = Server::builder(dispatcher).build();
//! Server::start(ServerStdioTransport::new(protocol)).await
//! # }
//! ```

pub mod config;
pub mod dispatcher;
pub mod params;
pub mod protocol;
pub mod server;
pub mod tools;
pub mod transport;
pub mod types;
pub mod upstream;

/// Creates a tool response reporting an error.
///
/// The text is `Error: <message>` and `is_error` is set.
///
/// # Examples
///
/// ```
/// use tushare_mcp::tool_error_response;
///
/// let response = tool_error_response!(anyhow::anyhow!("invalid token"));
/// assert_eq!(response.is_error, Some(true));
/// assert_eq!(response.text(), "Error: invalid token");
/// ```
#[macro_export]
macro_rules! tool_error_response {
    ($e:expr) => {{
        $crate::types::CallToolResponse {
            content: vec![$crate::tool_text_content!(format!("Error: {}", $e))],
            is_error: Some(true),
            meta: None,
        }
    }};
}

/// Creates a tool response with a single text block.
///
/// # Examples
///
/// ```
/// use tushare_mcp::tool_text_response;
///
/// let response = tool_text_response!("{}".to_string());
/// assert_eq!(response.content.len(), 1);
/// ```
#[macro_export]
macro_rules! tool_text_response {
    ($e:expr) => {{
        $crate::types::CallToolResponse {
            content: vec![$crate::tool_text_content!($e)],
            is_error: None,
            meta: None,
        }
    }};
}

/// Creates a text content block.
#[macro_export]
macro_rules! tool_text_content {
    ($e:expr) => {{
        $crate::types::ToolResponseContent::Text($crate::types::TextContent { text: $e })
    }};
}
