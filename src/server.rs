//! # MCP Server
//!
//! Wires the [`Dispatcher`] into a [`Protocol`] that answers the MCP
//! methods a host uses: `initialize`, `notifications/initialized`, `ping`,
//! `tools/list` and `tools/call`.
//!
//! Tool methods are refused until the host has completed the handshake.
//! Every [`Protocol`] built by [`ServerProtocolBuilder::build`] tracks its
//! own handshake, so a transport serving several hosts builds one protocol
//! per connection.

use std::sync::{Arc, RwLock};

use anyhow::Result;
use serde_json::{json, Value};

use crate::{
    dispatcher::Dispatcher,
    protocol::{HandlerFuture, Protocol, ProtocolBuilder},
    transport::Transport,
    types::{
        CallToolRequest, CallToolResponse, ClientCapabilities, Implementation, InitializeRequest,
        InitializeResponse, ListRequest, ProtocolVersion, ServerCapabilities, ToolCapabilities,
        ToolsListResponse, LATEST_PROTOCOL_VERSION,
    },
    upstream::Upstream,
};

/// Name reported in the `initialize` response
pub const SERVER_NAME: &str = "tushare-mcp-server";

const INSTRUCTIONS: &str = "Query Chinese equity and index market data from Tushare Pro. \
Dates use the YYYYMMDD format, stock codes look like 000001.SZ and index codes like 399300.SZ. \
Results are returned as {fields, items} tables where every item is aligned with fields.";

/// What the server knows about the connected host.
#[derive(Clone, Default)]
pub struct ClientConnection {
    /// The capabilities reported by the host
    pub client_capabilities: Option<ClientCapabilities>,
    /// Information about the host implementation
    pub client_info: Option<Implementation>,
    /// Whether the host has completed initialization
    pub initialized: bool,
}

/// Entry points for building and running the server.
#[derive(Clone)]
pub struct Server;

impl Server {
    /// Creates a server builder answering tool calls through `dispatcher`.
    pub fn builder<U: Upstream>(dispatcher: Dispatcher<U>) -> ServerProtocolBuilder<U> {
        ServerProtocolBuilder::new(dispatcher)
    }

    /// Serves on `transport` until it closes.
    pub async fn start<T: Transport>(transport: T) -> Result<()> {
        transport.open().await
    }
}

/// Builder for the server's [`Protocol`].
pub struct ServerProtocolBuilder<U: Upstream> {
    server_info: Implementation,
    capabilities: ServerCapabilities,
    instructions: Option<String>,
    dispatcher: Dispatcher<U>,
}

impl<U: Upstream> ServerProtocolBuilder<U> {
    pub fn new(dispatcher: Dispatcher<U>) -> Self {
        ServerProtocolBuilder {
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            capabilities: ServerCapabilities {
                tools: Some(ToolCapabilities {
                    list_changed: Some(false),
                }),
                ..Default::default()
            },
            instructions: Some(INSTRUCTIONS.to_string()),
            dispatcher,
        }
    }

    fn handle_init(
        state: Arc<RwLock<ClientConnection>>,
        server_info: Implementation,
        capabilities: ServerCapabilities,
        instructions: Option<String>,
    ) -> impl Fn(InitializeRequest) -> HandlerFuture<InitializeResponse> {
        move |req| {
            let state = state.clone();
            let server_info = server_info.clone();
            let capabilities = capabilities.clone();
            let instructions = instructions.clone();

            Box::pin(async move {
                let negotiated = ProtocolVersion::parse(&req.protocol_version)
                    .unwrap_or(LATEST_PROTOCOL_VERSION);
                {
                    let mut state = state
                        .write()
                        .map_err(|_| anyhow::anyhow!("Lock poisoned"))?;
                    state.client_capabilities = Some(req.capabilities);
                    state.client_info = Some(req.client_info);
                }
                tracing::info!(
                    "Initialized with protocol version {} (requested {})",
                    negotiated.as_str(),
                    req.protocol_version
                );

                Ok(InitializeResponse {
                    protocol_version: negotiated.as_str().to_string(),
                    capabilities,
                    server_info,
                    instructions,
                })
            })
        }
    }

    fn handle_initialized(
        state: Arc<RwLock<ClientConnection>>,
    ) -> impl Fn(Value) -> HandlerFuture<()> {
        move |_| {
            let state = state.clone();
            Box::pin(async move {
                let mut state = state
                    .write()
                    .map_err(|_| anyhow::anyhow!("Lock poisoned"))?;
                state.initialized = true;
                Ok(())
            })
        }
    }

    /// Builds a protocol for one host connection, starting before the
    /// handshake.
    pub fn build(&self) -> Protocol {
        let client_connection = Arc::new(RwLock::new(ClientConnection::default()));
        let dispatcher_list = self.dispatcher.clone();
        let dispatcher_call = self.dispatcher.clone();
        let conn_for_list = client_connection.clone();
        let conn_for_call = client_connection.clone();

        ProtocolBuilder::new()
            .request_handler(
                "initialize",
                Self::handle_init(
                    client_connection.clone(),
                    self.server_info.clone(),
                    self.capabilities.clone(),
                    self.instructions.clone(),
                ),
            )
            .notification_handler(
                "notifications/initialized",
                Self::handle_initialized(client_connection),
            )
            .request_handler("ping", |_req: Value| {
                Box::pin(async move { Ok(json!({})) })
            })
            .request_handler("tools/list", move |_req: ListRequest| {
                let dispatcher = dispatcher_list.clone();
                let conn = conn_for_list.clone();
                Box::pin(async move {
                    ensure_initialized(&conn)?;
                    Ok(ToolsListResponse {
                        tools: dispatcher.list_tools(),
                        next_cursor: None,
                        meta: None,
                    })
                })
            })
            .request_handler("tools/call", move |req: CallToolRequest| {
                let dispatcher = dispatcher_call.clone();
                let conn = conn_for_call.clone();
                Box::pin(async move {
                    ensure_initialized(&conn)?;
                    let response: CallToolResponse =
                        dispatcher.invoke(&req.name, req.arguments).await;
                    Ok(response)
                })
            })
            .build()
    }
}

fn ensure_initialized(conn: &RwLock<ClientConnection>) -> Result<()> {
    let conn = conn.read().map_err(|_| anyhow::anyhow!("Lock poisoned"))?;
    if !conn.initialized {
        return Err(anyhow::anyhow!("Client not initialized"));
    }
    Ok(())
}
