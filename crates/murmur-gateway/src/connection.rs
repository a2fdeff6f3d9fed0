use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, trace, warn};
use uuid::Uuid;

use murmur_types::events::RoomEvent;

use crate::dispatcher::{Dispatcher, RoomMessage};

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Who is on the other end of a connection. Built from a verified session
/// token before the upgrade.
#[derive(Debug, Clone)]
pub struct LiveSession {
    pub room_id: Uuid,
    pub display_name: String,
    pub is_owner: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Delivery {
    Skip,
    Send,
    /// Forward, then end the connection
    SendAndClose,
}

fn route(msg: &RoomMessage, session: &LiveSession) -> Delivery {
    if msg.room_id != session.room_id {
        return Delivery::Skip;
    }

    match &msg.event {
        RoomEvent::RoomClosed { .. } => Delivery::SendAndClose,
        RoomEvent::UserBanned { display_name }
            if !session.is_owner && display_name.eq_ignore_ascii_case(&session.display_name) =>
        {
            Delivery::SendAndClose
        }
        _ => Delivery::Send,
    }
}

/// Run a room websocket until the client leaves, is banned, the room closes,
/// or the heartbeat times out.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, session: LiveSession) {
    let (mut sender, mut receiver) = socket.split();

    info!(
        "{} connected to room {} (owner: {})",
        session.display_name, session.room_id, session.is_owner
    );

    // Subscribe before joining so our own presence update reaches us too
    let mut broadcast_rx = dispatcher.subscribe();

    let ready = RoomEvent::Ready {
        room_id: session.room_id,
        display_name: session.display_name.clone(),
        is_owner: session.is_owner,
    };
    if send_event(&mut sender, &ready).await.is_err() {
        return;
    }

    dispatcher.join(session.room_id, &session.display_name).await;

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    let send_session = session.clone();
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let msg = match result {
                        Ok(msg) => msg,
                        Err(RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} messages", n);
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    };

                    match route(&msg, &send_session) {
                        Delivery::Skip => {}
                        Delivery::Send => {
                            if send_event(&mut sender, &msg.event).await.is_err() {
                                break;
                            }
                        }
                        Delivery::SendAndClose => {
                            let _ = send_event(&mut sender, &msg.event).await;
                            let _ = sender.send(Message::Close(None)).await;
                            break;
                        }
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
                    if sender.send(Message::Ping(Default::default())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Clients only talk over REST; inbound frames are heartbeat and close.
    let recv_name = session.display_name.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                Message::Text(text) => {
                    trace!("{} sent unexpected text frame ({} bytes)", recv_name, text.len());
                }
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.leave(session.room_id, &session.display_name).await;
    info!("{} disconnected from room {}", session.display_name, session.room_id);
}

async fn send_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: &RoomEvent,
) -> Result<(), axum::Error> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to serialize room event: {}", e);
            return Ok(());
        }
    };
    sender.send(Message::Text(text.into())).await
}
