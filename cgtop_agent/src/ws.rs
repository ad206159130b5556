//! WebSocket upgrade and per-connection handler.
//!
//! Each connection runs two activities side by side: an inbound command
//! reader and an outbound pusher that sends one view per tick. Whichever
//! ends first tears the other down with it.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::Ordering;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::action;
use crate::scanner::ScanMode;
use crate::session::{apply_command, compute_view, SessionState};
use crate::state::AppState;
use crate::types::{decode_command, encode, ActionAck, CommandError, ServerMessage};

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if state.client_count.load(Ordering::Relaxed) >= state.config.max_clients {
        warn!("connection rejected: max clients reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let id = state.next_session.fetch_add(1, Ordering::Relaxed);

    // Bump client count on connect and wake the sampler.
    state.client_count.fetch_add(1, Ordering::Relaxed);
    state.wake_sampler.notify_one();

    // Ensure we decrement and unregister on disconnect (drop).
    struct ClientGuard(AppState, u64);
    impl Drop for ClientGuard {
        fn drop(&mut self) {
            self.0.client_count.fetch_sub(1, Ordering::Relaxed);
            self.0.watches.remove(self.1);
        }
    }
    let _guard = ClientGuard(state.clone(), id);

    let initial = SessionState::new(&state.config.root);
    if state.config.scan_mode == ScanMode::Level {
        state.watches.set(id, initial.watch());
    }
    info!("[{id}] session started");

    let (state_tx, state_rx) = watch::channel(initial);
    let (ack_tx, ack_rx) = mpsc::channel::<ActionAck>(16);
    let (sink, stream) = socket.split();

    tokio::select! {
        reason = read_commands(id, stream, &state, state_tx, ack_tx) => {
            debug!("[{id}] inbound ended: {reason}");
        }
        reason = push_views(id, sink, &state, state_rx, ack_rx) => {
            debug!("[{id}] outbound ended: {reason}");
        }
    }
    info!("[{id}] session ended");
}

async fn read_commands(
    id: u64,
    mut stream: SplitStream<WebSocket>,
    state: &AppState,
    session: watch::Sender<SessionState>,
    acks: mpsc::Sender<ActionAck>,
) -> &'static str {
    let root = state.config.root.as_path();
    loop {
        let next = match state.config.idle_timeout {
            Some(limit) => match timeout(limit, stream.next()).await {
                Ok(next) => next,
                Err(_) => return "idle timeout",
            },
            None => stream.next().await,
        };
        let text = match next {
            None => return "client went away",
            Some(Err(e)) => {
                debug!("[{id}] read error: {e}");
                return "read error";
            }
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) => return "client closed",
            Some(Ok(Message::Binary(_))) => {
                warn!("[{id}] {}; closing", CommandError::Binary);
                return "malformed frame";
            }
            // Ping/Pong are answered by axum.
            Some(Ok(_)) => continue,
        };
        let cmd = match decode_command(&text) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!("[{id}] {e}; closing");
                return "malformed command";
            }
        };
        debug!("[{id}] command: {cmd:?}");

        let mut pending = None;
        session.send_modify(|st| pending = apply_command(st, root, cmd));
        if state.config.scan_mode == ScanMode::Level {
            let watch = session.borrow().watch();
            state.watches.set(id, watch);
        }
        if let Some(p) = pending {
            let ack = action::apply_and_ack(root, p.kind, p.target.as_deref()).await;
            if acks.send(ack).await.is_err() {
                return "outbound closed";
            }
        }
    }
}

async fn push_views(
    id: u64,
    mut sink: SplitSink<WebSocket, Message>,
    state: &AppState,
    session: watch::Receiver<SessionState>,
    mut acks: mpsc::Receiver<ActionAck>,
) -> &'static str {
    let mut ticker = interval(state.config.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        let msg = tokio::select! {
            _ = ticker.tick() => {
                // State as of this tick; commands arriving later land next tick.
                let current = session.borrow().clone();
                let snap = state.snapshots.read().await;
                ServerMessage::View(compute_view(&current, &snap, &state.config.root))
            }
            Some(ack) = acks.recv() => ServerMessage::Ack(ack),
        };
        let json = match encode(&msg) {
            Ok(json) => json,
            Err(e) => {
                error!("[{id}] failed to serialize frame: {e}");
                continue;
            }
        };
        match timeout(state.config.send_timeout, sink.send(Message::Text(json))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!("[{id}] send failed: {e}");
                return "send failed";
            }
            Err(_) => {
                warn!("[{id}] client not draining frames; closing");
                return "send timed out";
            }
        }
    }
}
