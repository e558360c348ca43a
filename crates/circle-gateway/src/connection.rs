use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use circle_types::events::CloseCode;

use crate::dispatcher::Dispatcher;
use crate::registry::{Outbound, SessionHandle};
use crate::session::{ChatSession, Step, UserSession};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long the send task gets to flush a close frame after the read side ends.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

enum Session {
    User(UserSession),
    Chat(ChatSession),
}

impl Session {
    async fn handle_text(&mut self, text: &str) -> Step {
        match self {
            Self::User(s) => s.handle_text(text).await,
            Self::Chat(s) => s.handle_text(text).await,
        }
    }

    fn handle(&self) -> &SessionHandle {
        match self {
            Self::User(s) => s.handle(),
            Self::Chat(s) => s.handle(),
        }
    }

    fn disconnect(&mut self) {
        match self {
            Self::User(s) => s.disconnect(),
            Self::Chat(s) => s.disconnect(),
        }
    }
}

/// Serve one `/api/ws_user` connection until it closes.
pub async fn handle_user_socket(socket: WebSocket, dispatcher: Dispatcher) {
    let (handle, outbox) = SessionHandle::channel();
    info!("User channel connected ({})", handle.conn_id());
    run_connection(socket, Session::User(UserSession::new(dispatcher, handle)), outbox).await;
}

/// Serve one `/api/ws_chat` connection until it closes.
pub async fn handle_chat_socket(socket: WebSocket, dispatcher: Dispatcher) {
    let (handle, outbox) = SessionHandle::channel();
    info!("Chat channel connected ({})", handle.conn_id());
    run_connection(socket, Session::Chat(ChatSession::new(dispatcher, handle)), outbox).await;
}

async fn run_connection(
    socket: WebSocket,
    mut session: Session,
    mut outbox: mpsc::UnboundedReceiver<Outbound>,
) {
    let conn_id = session.handle().conn_id();
    let (mut sender, mut receiver) = socket.split();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();

    // Drain the outbound queue to the socket, with heartbeat.
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                msg = outbox.recv() => {
                    match msg {
                        Some(Outbound::Text(text)) => {
                            if sender.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        Some(Outbound::Close(code)) => {
                            let frame = CloseFrame {
                                code: code.code(),
                                reason: Utf8Bytes::from_static(code.reason()),
                            };
                            let _ = sender.send(Message::Close(Some(frame))).await;
                            break;
                        }
                        None => break,
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Frames are handled one at a time, in arrival order.
    loop {
        tokio::select! {
            _ = &mut send_task => break,
            frame = receiver.next() => {
                let msg = match frame {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        debug!("Read error on {}: {}", conn_id, e);
                        break;
                    }
                    None => break,
                };

                let step = match msg {
                    Message::Text(text) => session.handle_text(text.as_str()).await,
                    Message::Binary(_) => Step::Close(CloseCode::WrongDataType),
                    Message::Pong(_) => {
                        pong_received.store(true, Ordering::Release);
                        Step::Continue
                    }
                    Message::Ping(_) => Step::Continue,
                    Message::Close(_) => break,
                };

                if let Step::Close(code) = step {
                    info!("Closing {} with {} ({})", conn_id, code.code(), code.reason());
                    session.handle().close(code);
                    break;
                }
            }
        }
    }

    session.disconnect();
    // Last sender gone: the send task flushes what is queued and stops.
    drop(session);

    if !send_task.is_finished() && tokio::time::timeout(CLOSE_GRACE, &mut send_task).await.is_err() {
        send_task.abort();
    }
    info!("Connection {} closed", conn_id);
}
