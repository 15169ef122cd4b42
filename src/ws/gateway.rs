//! WebSocket proxy gateway: transport plumbing around the session state
//! machine.
//!
//! # Data Flow
//! ```text
//! client WS ──▶ session (buffer until backend open) ──▶ backend WS
//! backend WS ──▶ forwarding policy ──▶ own client, or room fan-out
//! ```
//!
//! # Design Decisions
//! - One task per client connection owns both sides of the pairing;
//!   the client and backend connections fail together
//! - Fan-out goes through per-client unbounded channels, so a slow
//!   room member never blocks the broadcasting session
//! - Handshake query and authorization header pass to the backend
//!   connection unmodified

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::http::HeaderMap;
use dashmap::DashMap;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message as TMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;
use uuid::Uuid;

use crate::config::schema::WebSocketConfig;
use crate::error::GatewayError;
use crate::observability::metrics;
use crate::registry::ServiceRegistry;
use crate::ws::events::{
    route_backend_event, room_action, EventFrame, ForwardRule, RoomAction, EVENT_CONNECT_ERROR,
    EVENT_GATEWAY_READY, EVENT_SERVICE_DISCONNECTED,
};
use crate::ws::rooms::{ConnId, RoomRegistry};
use crate::ws::session::Session;

type ClientSink = SplitSink<WebSocket, Message>;
type BackendStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Pluggable pre-routing auth check; the gateway only enforces the boolean.
pub type AuthGate = Arc<dyn Fn(&HeaderMap) -> bool + Send + Sync>;

/// Accepts client persistent connections and proxies them onto backend
/// messaging connections, with room-based broadcast.
pub struct WsGateway {
    registry: Arc<ServiceRegistry>,
    messaging_service: String,
    endpoint: String,
    rooms: RoomRegistry,
    clients: DashMap<ConnId, mpsc::UnboundedSender<EventFrame>>,
    auth_gate: Option<AuthGate>,
}

impl WsGateway {
    pub fn new(registry: Arc<ServiceRegistry>, config: &WebSocketConfig) -> Self {
        Self {
            registry,
            messaging_service: config.messaging_service.clone(),
            endpoint: config.endpoint.clone(),
            rooms: RoomRegistry::new(),
            clients: DashMap::new(),
            auth_gate: None,
        }
    }

    pub fn with_auth_gate(mut self, gate: AuthGate) -> Self {
        self.auth_gate = Some(gate);
        self
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    pub fn connection_count(&self) -> usize {
        self.clients.len()
    }

    /// Handle one client connection to completion, then clean up all of
    /// its state before returning.
    pub async fn handle_connection(
        self: Arc<Self>,
        socket: WebSocket,
        query: Option<String>,
        headers: HeaderMap,
    ) {
        let id = Uuid::new_v4();
        metrics::ws_connection_opened();
        tracing::info!(conn = %id, "Client connection accepted");

        self.run_session(id, socket, query, headers).await;

        self.clients.remove(&id);
        self.rooms.remove_connection(id);
        metrics::ws_connection_closed();
        tracing::info!(conn = %id, "Client connection closed and state purged");
    }

    async fn run_session(
        &self,
        id: ConnId,
        socket: WebSocket,
        query: Option<String>,
        headers: HeaderMap,
    ) {
        let (mut client_sink, mut client_rx) = socket.split();

        if let Some(gate) = &self.auth_gate {
            if !gate(&headers) {
                tracing::warn!(conn = %id, "Handshake rejected by auth gate");
                let denied = GatewayError::Unauthorized("handshake rejected".to_string());
                let _ = send_event(
                    &mut client_sink,
                    &EventFrame::new(EVENT_CONNECT_ERROR, json!({"message": denied.to_string()})),
                )
                .await;
                let _ = client_sink.close().await;
                return;
            }
        }

        let entry = match self.registry.get(&self.messaging_service) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(conn = %id, error = %e, "Messaging service not registered");
                let _ = send_event(
                    &mut client_sink,
                    &EventFrame::new(EVENT_CONNECT_ERROR, json!({"message": e.to_string()})),
                )
                .await;
                let _ = client_sink.close().await;
                return;
            }
        };

        let instances = entry.healthy_instances();
        let Some(instance) = instances.first() else {
            let _ = send_event(
                &mut client_sink,
                &EventFrame::new(
                    EVENT_CONNECT_ERROR,
                    json!({"message": "no messaging instances available"}),
                ),
            )
            .await;
            let _ = client_sink.close().await;
            return;
        };

        let ws_url = backend_ws_url(&instance.base_url, &self.endpoint, query.as_deref());
        let mut backend_request = match ws_url.clone().into_client_request() {
            Ok(request) => request,
            Err(e) => {
                tracing::error!(conn = %id, url = %ws_url, error = %e, "Invalid backend WS URL");
                let _ = send_event(
                    &mut client_sink,
                    &EventFrame::new(EVENT_CONNECT_ERROR, json!({"message": e.to_string()})),
                )
                .await;
                let _ = client_sink.close().await;
                return;
            }
        };
        if let Some(auth) = headers.get("authorization") {
            backend_request
                .headers_mut()
                .insert("authorization", auth.clone());
        }

        let (tx, mut fan_rx) = mpsc::unbounded_channel::<EventFrame>();
        self.clients.insert(id, tx);

        let mut session = Session::new(id);
        let mut connect_fut = Box::pin(connect_async(backend_request));

        // Connecting: buffer client events until the backend opens.
        let backend: BackendStream = loop {
            tokio::select! {
                result = &mut connect_fut => {
                    match result {
                        Ok((stream, _)) => break stream,
                        Err(e) => {
                            tracing::warn!(conn = %id, url = %ws_url, error = %e, "Backend connection failed");
                            let _ = send_event(
                                &mut client_sink,
                                &EventFrame::new(EVENT_CONNECT_ERROR, json!({"message": e.to_string()})),
                            )
                            .await;
                            session.close();
                            let _ = client_sink.close().await;
                            return;
                        }
                    }
                }
                msg = client_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(frame) = EventFrame::parse(text.as_str()) {
                                self.apply_bookkeeping(id, &frame);
                                session.outbound(frame);
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::debug!(conn = %id, "Client left before backend was ready");
                            session.close();
                            return;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(conn = %id, error = %e, "Client socket error while connecting");
                            session.close();
                            return;
                        }
                    }
                }
                Some(frame) = fan_rx.recv() => {
                    if send_event(&mut client_sink, &frame).await.is_err() {
                        session.close();
                        return;
                    }
                }
            }
        };

        let (mut backend_sink, mut backend_rx) = backend.split();

        // Replay buffered events in order, exactly once.
        let pending = session.backend_ready();
        let replayed = pending.len();
        for frame in pending {
            if backend_sink
                .send(TMessage::Text(frame.to_json().into()))
                .await
                .is_err()
            {
                let _ = send_event(
                    &mut client_sink,
                    &service_disconnected("backend closed during replay"),
                )
                .await;
                session.close();
                let _ = client_sink.close().await;
                return;
            }
        }
        tracing::debug!(conn = %id, replayed, "Backend connection ready");
        let _ = send_event(
            &mut client_sink,
            &EventFrame::new(EVENT_GATEWAY_READY, json!({})),
        )
        .await;

        // Connected: bidirectional forwarding until either side drops.
        loop {
            tokio::select! {
                msg = client_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(frame) = EventFrame::parse(text.as_str()) {
                                self.apply_bookkeeping(id, &frame);
                                if let Some(frame) = session.outbound(frame) {
                                    if backend_sink
                                        .send(TMessage::Text(frame.to_json().into()))
                                        .await
                                        .is_err()
                                    {
                                        let _ = send_event(
                                            &mut client_sink,
                                            &service_disconnected("backend send failed"),
                                        )
                                        .await;
                                        break;
                                    }
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::debug!(conn = %id, "Client disconnected");
                            let _ = backend_sink.send(TMessage::Close(None)).await;
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(conn = %id, error = %e, "Client socket error");
                            let _ = backend_sink.send(TMessage::Close(None)).await;
                            break;
                        }
                    }
                }
                msg = backend_rx.next() => {
                    match msg {
                        Some(Ok(TMessage::Text(text))) => {
                            if let Some(frame) = EventFrame::parse(text.as_str()) {
                                match route_backend_event(&frame) {
                                    ForwardRule::Broadcast { room } => {
                                        self.fan_out(&room, &frame);
                                    }
                                    ForwardRule::Direct => {
                                        if send_event(&mut client_sink, &frame).await.is_err() {
                                            let _ = backend_sink.send(TMessage::Close(None)).await;
                                            break;
                                        }
                                    }
                                }
                            }
                        }
                        Some(Ok(TMessage::Close(_))) | None => {
                            tracing::debug!(conn = %id, "Backend dropped connection");
                            let _ = send_event(
                                &mut client_sink,
                                &service_disconnected("backend closed connection"),
                            )
                            .await;
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(conn = %id, error = %e, "Backend socket error");
                            let _ = send_event(
                                &mut client_sink,
                                &service_disconnected(&e.to_string()),
                            )
                            .await;
                            break;
                        }
                    }
                }
                Some(frame) = fan_rx.recv() => {
                    if send_event(&mut client_sink, &frame).await.is_err() {
                        let _ = backend_sink.send(TMessage::Close(None)).await;
                        break;
                    }
                }
            }
        }

        session.close();
        let _ = client_sink.close().await;
    }

    /// Apply join/leave bookkeeping; the frame is still forwarded by the
    /// caller.
    fn apply_bookkeeping(&self, id: ConnId, frame: &EventFrame) {
        match room_action(frame) {
            Some(RoomAction::Join(room)) => {
                tracing::debug!(conn = %id, room = %room, "Joined room");
                self.rooms.join(&room, id);
            }
            Some(RoomAction::Leave(room)) => {
                tracing::debug!(conn = %id, room = %room, "Left room");
                self.rooms.leave(&room, id);
            }
            None => {}
        }
    }

    /// Fan an event out to every currently-connected member of a room.
    fn fan_out(&self, room: &str, frame: &EventFrame) -> usize {
        let mut delivered = 0;
        for member in self.rooms.members(room) {
            if let Some(tx) = self.clients.get(&member) {
                if tx.send(frame.clone()).is_ok() {
                    delivered += 1;
                }
            }
        }
        tracing::debug!(room = %room, event = %frame.event, delivered, "Room broadcast");
        delivered
    }
}

async fn send_event(sink: &mut ClientSink, frame: &EventFrame) -> Result<(), axum::Error> {
    sink.send(Message::Text(frame.to_json().into())).await
}

fn service_disconnected(reason: &str) -> EventFrame {
    EventFrame::new(EVENT_SERVICE_DISCONNECTED, json!({ "reason": reason }))
}

/// Derive the backend WS URL from the service base URL and endpoint.
fn backend_ws_url(base: &Url, endpoint: &str, query: Option<&str>) -> String {
    let scheme = if base.scheme() == "https" { "wss" } else { "ws" };
    let host = base.host_str().unwrap_or("localhost");
    let mut url = match base.port() {
        Some(port) => format!("{}://{}:{}{}", scheme, host, port, endpoint),
        None => format!("{}://{}{}", scheme, host, endpoint),
    };
    if let Some(q) = query {
        if !q.is_empty() {
            url.push('?');
            url.push_str(q);
        }
    }
    url
}
