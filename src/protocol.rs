//! # MCP Protocol Implementation
//!
//! The JSON-RPC layer between a transport and the server's handlers.
//! Handlers are registered by method name through [`ProtocolBuilder`] and are
//! typed: the builder wraps each one in an adapter that decodes `params` into
//! the handler's request type and encodes its response.
//!
//! The handler tables are frozen when the protocol is built, so a `Protocol`
//! can be cloned into any number of concurrently running tasks and dispatch
//! without locking.

use super::transport::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId};
use super::types::ErrorCode;
use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::pin::Pin;
use std::{collections::HashMap, sync::Arc};

/// Boxed future returned by request and notification handlers.
pub type HandlerFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// The core protocol handler for MCP.
#[derive(Clone)]
pub struct Protocol {
    request_handlers: Arc<HashMap<String, Box<dyn RequestHandler>>>,
    notification_handlers: Arc<HashMap<String, Box<dyn NotificationHandler>>>,
}

impl Protocol {
    /// Creates a new protocol builder.
    pub fn builder() -> ProtocolBuilder {
        ProtocolBuilder::new()
    }

    /// Handles an incoming JSON-RPC request.
    ///
    /// Always produces a response: unknown methods, undecodable parameters
    /// and handler failures become JSON-RPC errors.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        match self.request_handlers.get(&request.method) {
            Some(handler) => handler.handle(request.id, request.params).await,
            None => {
                tracing::debug!("No handler for method: {}", request.method);
                JsonRpcResponse::failure(
                    request.id,
                    ErrorCode::MethodNotFound as i32,
                    format!("Method not found: {}", request.method),
                )
            }
        }
    }

    /// Handles an incoming JSON-RPC notification.
    pub async fn handle_notification(&self, notification: JsonRpcNotification) {
        if let Some(handler) = self.notification_handlers.get(&notification.method) {
            match handler.handle(notification.params).await {
                Ok(_) => tracing::info!("Received notification: {}", notification.method),
                Err(e) => tracing::error!(
                    "Error handling notification {}: {}",
                    notification.method,
                    e
                ),
            }
        } else {
            tracing::debug!("No handler for notification: {}", notification.method);
        }
    }
}

/// Builder for creating configured protocols.
#[derive(Default)]
pub struct ProtocolBuilder {
    request_handlers: HashMap<String, Box<dyn RequestHandler>>,
    notification_handlers: HashMap<String, Box<dyn NotificationHandler>>,
}

impl ProtocolBuilder {
    /// Creates a new protocol builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a typed request handler, replacing any handler already
    /// registered for `method`.
    pub fn request_handler<Req, Resp>(
        mut self,
        method: &str,
        handler: impl Fn(Req) -> HandlerFuture<Resp> + Send + Sync + 'static,
    ) -> Self
    where
        Req: DeserializeOwned + Send + Sync + 'static,
        Resp: Serialize + Send + Sync + 'static,
    {
        let handler = TypedRequestHandler {
            handler: Box::new(handler),
            _phantom: std::marker::PhantomData,
        };
        self.request_handlers
            .insert(method.to_string(), Box::new(handler));
        self
    }

    /// Registers a typed notification handler.
    pub fn notification_handler<N>(
        mut self,
        method: &str,
        handler: impl Fn(N) -> HandlerFuture<()> + Send + Sync + 'static,
    ) -> Self
    where
        N: DeserializeOwned + Send + Sync + 'static,
    {
        let handler = TypedNotificationHandler {
            handler: Box::new(handler),
            _phantom: std::marker::PhantomData,
        };
        self.notification_handlers
            .insert(method.to_string(), Box::new(handler));
        self
    }

    /// Builds the protocol with the configured handlers.
    pub fn build(self) -> Protocol {
        Protocol {
            request_handlers: Arc::new(self.request_handlers),
            notification_handlers: Arc::new(self.notification_handlers),
        }
    }
}

#[async_trait]
trait RequestHandler: Send + Sync {
    async fn handle(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse;
}

#[async_trait]
trait NotificationHandler: Send + Sync {
    async fn handle(&self, params: Option<Value>) -> Result<()>;
}

/// Adapts a typed handler function to the `RequestHandler` trait.
struct TypedRequestHandler<Req, Resp> {
    handler: Box<dyn Fn(Req) -> HandlerFuture<Resp> + Send + Sync>,
    _phantom: std::marker::PhantomData<fn(Req) -> Resp>,
}

#[async_trait]
impl<Req, Resp> RequestHandler for TypedRequestHandler<Req, Resp>
where
    Req: DeserializeOwned + Send + Sync + 'static,
    Resp: Serialize + Send + Sync + 'static,
{
    async fn handle(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        // A missing or null `params` decodes like an empty object.
        let params = match params {
            None | Some(Value::Null) => json!({}),
            Some(params) => params,
        };
        let params: Req = match serde_json::from_value(params) {
            Ok(params) => params,
            Err(e) => {
                return JsonRpcResponse::failure(
                    id,
                    ErrorCode::InvalidParams as i32,
                    format!("Invalid params: {e}"),
                )
            }
        };

        let result = (self.handler)(params)
            .await
            .and_then(|resp| serde_json::to_value(resp).map_err(Into::into));
        match result {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => {
                JsonRpcResponse::failure(id, ErrorCode::InternalError as i32, e.to_string())
            }
        }
    }
}

/// Adapts a typed handler function to the `NotificationHandler` trait.
struct TypedNotificationHandler<N> {
    handler: Box<dyn Fn(N) -> HandlerFuture<()> + Send + Sync>,
    _phantom: std::marker::PhantomData<fn(N)>,
}

#[async_trait]
impl<N> NotificationHandler for TypedNotificationHandler<N>
where
    N: DeserializeOwned + Send + Sync + 'static,
{
    async fn handle(&self, params: Option<Value>) -> Result<()> {
        let params: N = serde_json::from_value(params.unwrap_or(Value::Null))?;
        (self.handler)(params).await
    }
}
