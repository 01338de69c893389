use crate::{
    protocol::Protocol,
    transport::{
        InFlight, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, Message,
        Transport, CANCELLED_METHOD,
    },
};
use actix_web::{
    middleware::Logger,
    web::{self, Query},
    App, HttpResponse, HttpServer,
};
use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

/// Default interval between keep-alive pings on an open stream
const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(15);

type ProtocolFactory = Arc<dyn Fn() -> Protocol + Send + Sync>;
type Sessions = Arc<std::sync::Mutex<HashMap<String, ServerSseTransportSession>>>;

/// Server transport that talks to hosts over HTTP with Server-Sent Events.
///
/// A host opens `GET /sse` and receives an `endpoint` event naming the URL
/// to POST its messages to (`/message?sessionId=<id>`). Each POSTed request
/// is answered with `202 Accepted`; the JSON-RPC response arrives later as a
/// `message` event on the session's stream. Requests are handled
/// concurrently, so responses may arrive in any order.
///
/// Every session gets its own [`Protocol`] from the factory passed to
/// [`new`](Self::new), so each host goes through its own handshake. A
/// session ends when its stream is dropped, which also aborts the requests
/// it still has in flight.
///
/// # Example
///
/// ```no_run
/// use tushare_mcp::{protocol::Protocol, transport::{ServerSseTransport, Transport}};
///
/// async fn example() {
///     let transport =
///         ServerSseTransport::new("127.0.0.1".to_string(), 8000, || Protocol::builder().build());
///     transport.open().await.expect("Failed to start SSE server");
/// }
/// ```
#[derive(Clone)]
pub struct ServerSseTransport {
    new_protocol: ProtocolFactory,
    sessions: Sessions,
    host: String,
    port: u16,
    ping_interval: Duration,
}

impl ServerSseTransport {
    pub fn new(
        host: String,
        port: u16,
        new_protocol: impl Fn() -> Protocol + Send + Sync + 'static,
    ) -> Self {
        Self {
            new_protocol: Arc::new(new_protocol),
            sessions: Arc::new(std::sync::Mutex::new(HashMap::new())),
            host,
            port,
            ping_interval: DEFAULT_PING_INTERVAL,
        }
    }

    /// Sets how often open streams are pinged.
    pub fn with_ping_interval(mut self, ping_interval: Duration) -> Self {
        self.ping_interval = ping_interval;
        self
    }

    fn create_session(&self) -> (String, ServerSseTransportSession) {
        let session_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel::<JsonRpcMessage>(100);
        let session = ServerSseTransportSession {
            protocol: (self.new_protocol)(),
            tx,
            rx: Arc::new(Mutex::new(rx)),
            in_flight: InFlight::default(),
        };
        self.lock_sessions()
            .insert(session_id.clone(), session.clone());
        (session_id, session)
    }

    fn get_session(&self, session_id: &str) -> Option<ServerSseTransportSession> {
        self.lock_sessions().get(session_id).cloned()
    }

    fn remove_session(&self, session_id: &str) {
        let removed = self.lock_sessions().remove(session_id);
        if let Some(session) = removed {
            session.in_flight.abort_all();
            tracing::info!("Session {} closed", session_id);
        }
    }

    /// Number of open sessions.
    pub fn session_count(&self) -> usize {
        self.lock_sessions().len()
    }

    fn lock_sessions(&self) -> MutexGuard<'_, HashMap<String, ServerSseTransportSession>> {
        // Only short non-panicking sections run under the lock.
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Pings `session_id` until the session is gone. A ping is skipped
    /// while the stream is backed up.
    fn spawn_pinger(&self, session_id: String) {
        let transport = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(transport.ping_interval).await;
                let Some(session) = transport.get_session(&session_id) else {
                    break;
                };
                let ping = JsonRpcMessage::Notification(JsonRpcNotification {
                    method: "ping".to_owned(),
                    params: None,
                    jsonrpc: Default::default(),
                });
                match session.tx.try_send(ping) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::debug!("Skipping ping to backed-up session {}", session_id);
                    }
                    Err(TrySendError::Closed(_)) => {
                        transport.remove_session(&session_id);
                        break;
                    }
                }
            }
        });
    }
}

/// Removes its session when the stream holding it is dropped, whether the
/// host disconnected or the stream ended.
struct SessionGuard {
    transport: ServerSseTransport,
    session_id: String,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.transport.remove_session(&self.session_id);
    }
}

#[async_trait()]
impl Transport for ServerSseTransport {
    /// Runs the HTTP server on the configured host and port until it stops.
    async fn open(&self) -> Result<()> {
        let transport = self.clone();
        tracing::info!("Serving SSE on http://{}:{}/sse", self.host, self.port);
        let server = HttpServer::new(move || {
            App::new()
                .wrap(Logger::default())
                .app_data(web::Data::new(transport.clone()))
                .route("/sse", web::get().to(sse_handler))
                .route("/message", web::post().to(message_handler))
        })
        .bind((self.host.clone(), self.port))?
        .run();

        server
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {:?}", e))
    }

    async fn close(&self) -> Result<()> {
        let sessions: Vec<_> = self.lock_sessions().drain().collect();
        for (_, session) in sessions {
            session.in_flight.abort_all();
        }
        Ok(())
    }

    /// Messages arrive through the HTTP routes, never through polling.
    async fn poll_message(&self) -> Result<Option<Message>> {
        Ok(None)
    }

    /// Sends `method` to every open session.
    async fn send_notification(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<()> {
        let sessions: Vec<_> = self.lock_sessions().values().cloned().collect();
        for session in sessions {
            session.send_notification(method, params.clone()).await?;
        }
        Ok(())
    }

    /// Responses are routed through the session the request came from.
    async fn send_response(&self, response: JsonRpcResponse) -> Result<()> {
        Err(anyhow::anyhow!(
            "Response {} has no session to be delivered on",
            response.id
        ))
    }
}

/// Opens a session stream.
///
/// The first event names the message endpoint; after that the stream
/// carries the session's responses plus periodic `ping` notifications.
pub async fn sse_handler(
    req: actix_web::HttpRequest,
    transport: web::Data<ServerSseTransport>,
) -> HttpResponse {
    let client_ip = req
        .peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let (session_id, session) = transport.create_session();
    tracing::info!(
        "SSE connection established for {} with session_id {}",
        client_ip,
        session_id
    );

    let endpoint_info = format!(
        "event: endpoint\ndata: /message?sessionId={}\n\n",
        session_id
    );
    transport.spawn_pinger(session_id.clone());

    let guard = SessionGuard {
        transport: transport.get_ref().clone(),
        session_id: session_id.clone(),
    };
    let stream = futures::stream::once(async move {
        Ok::<_, std::convert::Infallible>(web::Bytes::from(endpoint_info))
    })
    .chain(futures::stream::unfold(
        (session, guard),
        |(session, guard)| async move {
            match session.poll_message().await {
                Ok(Some(msg)) => match serde_json::to_string(&msg) {
                    Ok(json) => {
                        tracing::debug!(
                            "Sending SSE message to session {}: {}",
                            guard.session_id,
                            json
                        );
                        let sse_data = format!("event: message\ndata: {}\n\n", json);
                        Some((
                            Ok::<_, std::convert::Infallible>(web::Bytes::from(sse_data)),
                            (session, guard),
                        ))
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to encode message for {}: {}",
                            guard.session_id,
                            e
                        );
                        None
                    }
                },
                Ok(None) | Err(_) => None,
            }
        },
    ));

    HttpResponse::Ok()
        .append_header(("X-Session-Id", session_id))
        .content_type("text/event-stream")
        .streaming(stream)
}

/// Query parameters of the message endpoint.
#[derive(Deserialize)]
pub struct MessageQuery {
    /// The session the message belongs to
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

/// Accepts a JSON-RPC message for a session.
///
/// Requests are handled on their own task and answered on the session's
/// stream; the HTTP reply only acknowledges receipt.
pub async fn message_handler(
    query: Query<MessageQuery>,
    message: web::Json<Message>,
    transport: web::Data<ServerSseTransport>,
) -> HttpResponse {
    let Some(session_id) = query.session_id.clone() else {
        return HttpResponse::BadRequest().body("Session ID not specified");
    };
    let Some(session) = transport.get_session(&session_id) else {
        return HttpResponse::NotFound().body(format!("Session {} not found", session_id));
    };

    match message.into_inner() {
        JsonRpcMessage::Request(request) => {
            tracing::debug!("Received request from session {}: {:?}", session_id, request);
            session.spawn_request(session_id, request);
        }
        JsonRpcMessage::Notification(notification) if notification.method == CANCELLED_METHOD => {
            session.in_flight.cancel(notification);
        }
        JsonRpcMessage::Notification(notification) => {
            tracing::debug!(
                "Received notification from session {}: {:?}",
                session_id,
                notification
            );
            session.protocol.handle_notification(notification).await;
        }
        JsonRpcMessage::Response(response) => {
            tracing::debug!(
                "Ignoring response {} from session {}",
                response.id,
                session_id
            );
        }
    }
    HttpResponse::Accepted().finish()
}

/// One host connection of the SSE transport.
#[derive(Clone)]
pub struct ServerSseTransportSession {
    protocol: Protocol,
    rx: Arc<Mutex<mpsc::Receiver<Message>>>,
    tx: mpsc::Sender<Message>,
    in_flight: InFlight,
}

impl ServerSseTransportSession {
    fn spawn_request(&self, session_id: String, request: JsonRpcRequest) {
        let session = self.clone();
        self.in_flight.track(request.id.clone(), || {
            tokio::spawn(async move {
                let request_id = request.id.clone();
                let response = session.protocol.handle_request(request).await;
                session.in_flight.finish(&request_id);
                if let Err(e) = session.send_response(response).await {
                    tracing::error!(
                        "Failed to send response to session {}: {:?}",
                        session_id,
                        e
                    );
                }
            })
            .abort_handle()
        });
    }
}

#[async_trait()]
impl Transport for ServerSseTransportSession {
    async fn open(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.in_flight.abort_all();
        self.rx.lock().await.close();
        Ok(())
    }

    async fn poll_message(&self) -> Result<Option<Message>> {
        Ok(self.rx.lock().await.recv().await)
    }

    async fn send_notification(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<()> {
        let message = JsonRpcMessage::Notification(JsonRpcNotification {
            method: method.to_owned(),
            params,
            jsonrpc: Default::default(),
        });
        self.tx
            .send(message)
            .await
            .map_err(|e| anyhow::anyhow!("Send notification error: {:?}", e))
    }

    async fn send_response(&self, response: JsonRpcResponse) -> Result<()> {
        self.tx
            .send(JsonRpcMessage::Response(response))
            .await
            .map_err(|e| anyhow::anyhow!("Send response error: {:?}", e))
    }
}
