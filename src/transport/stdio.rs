use crate::protocol::Protocol;
use crate::transport::{
    InFlight, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, Message,
    Transport, CANCELLED_METHOD,
};
use crate::types::ErrorCode;
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin, Stdout,
};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Server transport that talks to the host over standard I/O.
///
/// Messages are newline-delimited JSON-RPC. Each request is handled on its
/// own task, so a slow upstream call does not hold up other requests; the
/// responses share one writer and are written whole, one per line. A
/// `notifications/cancelled` from the host aborts the matching task, and no
/// response is written for it. A line that is not JSON is answered with a
/// parse error (`-32700`), and JSON that is not a JSON-RPC message with an
/// invalid request error (`-32600`), both with a null id.
///
/// The reader and writer default to the process's stdin and stdout; any
/// async byte streams can be used instead, e.g. for tests.
///
/// # Example
///
/// ```no_run
/// use tushare_mcp::{protocol::Protocol, transport::{ServerStdioTransport, Transport}};
///
/// async fn example() {
///     let protocol = Protocol::builder().build();
///     let transport = ServerStdioTransport::new(protocol);
///     transport.open().await.expect("Failed to start stdio server");
/// }
/// ```
pub struct ServerStdioTransport<R = Stdin, W = Stdout> {
    protocol: Protocol,
    reader: Arc<Mutex<Lines<BufReader<R>>>>,
    writer: Arc<Mutex<W>>,
    in_flight: InFlight,
}

impl<R, W> Clone for ServerStdioTransport<R, W> {
    fn clone(&self) -> Self {
        Self {
            protocol: self.protocol.clone(),
            reader: self.reader.clone(),
            writer: self.writer.clone(),
            in_flight: self.in_flight.clone(),
        }
    }
}

impl ServerStdioTransport {
    /// Creates a transport over the process's stdin and stdout.
    pub fn new(protocol: Protocol) -> Self {
        Self::with_io(protocol, tokio::io::stdin(), tokio::io::stdout())
    }
}

impl<R, W> ServerStdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Creates a transport reading messages from `reader` and writing them
    /// to `writer`.
    pub fn with_io(protocol: Protocol, reader: R, writer: W) -> Self {
        Self {
            protocol,
            reader: Arc::new(Mutex::new(BufReader::new(reader).lines())),
            writer: Arc::new(Mutex::new(writer)),
            in_flight: InFlight::default(),
        }
    }

    fn spawn_request(&self, tasks: &mut JoinSet<()>, request: JsonRpcRequest) {
        let id = request.id.clone();
        let transport = self.clone();
        self.in_flight.track(id, || {
            tasks.spawn(async move {
                let request_id = request.id.clone();
                let response = transport.protocol.handle_request(request).await;
                transport.in_flight.finish(&request_id);
                if let Err(e) = transport.send_response(response).await {
                    error!("Failed to send response to request {}: {:?}", request_id, e);
                }
            })
        });
    }

    /// Answers a line that could not be read as a message.
    async fn reject(&self, e: &serde_json::Error) -> Result<()> {
        let (code, message) = if e.is_data() {
            (ErrorCode::InvalidRequest, "Invalid Request")
        } else {
            (ErrorCode::ParseError, "Parse error")
        };
        self.write_message(&json!({
            "jsonrpc": "2.0",
            "id": null,
            "error": {"code": code as i32, "message": format!("{message}: {e}")}
        }))
        .await
    }

    async fn write_message(&self, message: &impl Serialize) -> Result<()> {
        let serialized = serde_json::to_string(message)?;
        debug!("Sending: {serialized}");

        let mut writer = self.writer.lock().await;
        writer.write_all(serialized.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok(())
    }
}

#[async_trait()]
impl<R, W> Transport for ServerStdioTransport<R, W>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Reads and dispatches messages until the input reaches EOF, then
    /// waits for the requests still in flight.
    async fn open(&self) -> Result<()> {
        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                message = self.poll_message() => match message {
                    Ok(Some(JsonRpcMessage::Request(request))) => {
                        self.spawn_request(&mut tasks, request);
                    }
                    Ok(Some(JsonRpcMessage::Notification(notification)))
                        if notification.method == CANCELLED_METHOD =>
                    {
                        self.in_flight.cancel(notification);
                    }
                    Ok(Some(JsonRpcMessage::Notification(notification))) => {
                        self.protocol.handle_notification(notification).await;
                    }
                    Ok(Some(JsonRpcMessage::Response(response))) => {
                        debug!("Ignoring response to request {}", response.id);
                    }
                    Ok(None) => break,
                    Err(e) => match e.downcast_ref::<serde_json::Error>() {
                        Some(malformed) => {
                            error!("Malformed message: {}", malformed);
                            if let Err(e) = self.reject(malformed).await {
                                error!("Failed to send error response: {:?}", e);
                            }
                        }
                        None => {
                            error!("Error receiving message: {:?}", e);
                            break;
                        }
                    },
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        if !e.is_cancelled() {
                            error!("Request task failed: {:?}", e);
                        }
                    }
                }
            }
        }

        while tasks.join_next().await.is_some() {}
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.in_flight.abort_all();
        Ok(())
    }

    /// Reads the next non-blank line and parses it as a JSON-RPC message.
    /// `None` indicates EOF.
    async fn poll_message(&self) -> Result<Option<Message>> {
        let mut reader = self.reader.lock().await;
        loop {
            let Some(line) = reader.next_line().await? else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }

            debug!("Received: {line}");
            let message: Message = serde_json::from_str(&line)?;
            return Ok(Some(message));
        }
    }

    async fn send_notification(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<()> {
        let notification = JsonRpcMessage::Notification(JsonRpcNotification {
            jsonrpc: Default::default(),
            method: method.to_owned(),
            params,
        });
        self.write_message(&notification).await
    }

    async fn send_response(&self, response: JsonRpcResponse) -> Result<()> {
        self.write_message(&JsonRpcMessage::Response(response)).await
    }
}
