//! WebSocket watches over the change feed.
//!
//! Each connection owns exactly one feed subscription and forwards every
//! snapshot as one JSON message. The subscription is released on the single
//! exit path of [`pump`], whichever side ends the connection.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde::Serialize;
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use printdrop_core::{Order, Role, Subscription};

use super::error::{api_error, ApiError};
use super::middleware::Caller;
use super::orders::load_visible;
use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_MESSAGES_SENT};
use crate::state::AppState;

/// WebSocket message sent to watchers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Current state of a watched order; `order` is null once it is gone.
    Order { order: Option<Order> },
    /// Current orders addressed to the watching shop, newest first.
    Orders { orders: Vec<Order> },
}

impl WsMessage {
    fn kind(&self) -> &'static str {
        match self {
            WsMessage::Order { .. } => "order",
            WsMessage::Orders { .. } => "orders",
        }
    }
}

impl From<Option<Order>> for WsMessage {
    fn from(order: Option<Order>) -> Self {
        WsMessage::Order { order }
    }
}

impl From<Vec<Order>> for WsMessage {
    fn from(orders: Vec<Order>) -> Self {
        WsMessage::Orders { orders }
    }
}

/// Why a watch connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    ClientClosed,
    ClientGone,
    FeedClosed,
}

fn upgrade(ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>) -> Result<WebSocketUpgrade, ApiError> {
    ws.map_err(|e| api_error(e.status(), e.body_text()))
}

/// Watch one order. Owner and shop only.
///
/// Authorization runs before the upgrade so refused callers get a plain
/// HTTP error.
pub async fn watch_order(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    load_visible(&state, &caller, &id, "watch_order")?;
    let ws = upgrade(ws)?;

    let feed = state.feed().clone();
    Ok(ws.on_upgrade(move |socket| async move {
        let subscription = feed.watch_order(id);
        serve_socket(socket, subscription, "order").await;
    }))
}

/// Watch every order addressed to the calling shop.
pub async fn watch_shop_orders(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    caller.require(Role::Shop, "watch_shop_orders")?;
    let ws = upgrade(ws)?;

    let feed = state.feed().clone();
    let shop_id = caller.id().to_string();
    Ok(ws.on_upgrade(move |socket| async move {
        let subscription = feed.watch_shop(shop_id);
        serve_socket(socket, subscription, "shop").await;
    }))
}

async fn serve_socket<T>(socket: WebSocket, subscription: Subscription<T>, watch: &'static str)
where
    T: Into<WsMessage>,
{
    WS_CONNECTIONS_TOTAL.with_label_values(&[watch]).inc();
    WS_CONNECTIONS_ACTIVE.inc();
    info!(watch, "WebSocket watcher connected");

    let (sender, receiver) = socket.split();
    let exit = pump(sender, receiver, subscription).await;

    WS_CONNECTIONS_ACTIVE.dec();
    info!(watch, ?exit, "WebSocket watcher disconnected");
}

/// Forward snapshots to `sender` until the client or the feed goes away.
pub async fn pump<T, S, R, E>(
    mut sender: S,
    mut receiver: R,
    mut subscription: Subscription<T>,
) -> PumpExit
where
    T: Into<WsMessage>,
    S: Sink<Message> + Unpin,
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let exit = loop {
        tokio::select! {
            snapshot = subscription.next() => {
                let Some(snapshot) = snapshot else {
                    break PumpExit::FeedClosed;
                };
                let msg: WsMessage = snapshot.into();
                match serde_json::to_string(&msg) {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            debug!("WebSocket send failed, client disconnected");
                            break PumpExit::ClientGone;
                        }
                        WS_MESSAGES_SENT.with_label_values(&[msg.kind()]).inc();
                    }
                    Err(e) => error!("Failed to serialize WsMessage: {}", e),
                }
            }
            incoming = receiver.next() => match incoming {
                None | Some(Ok(Message::Close(_))) => break PumpExit::ClientClosed,
                Some(Ok(Message::Text(text))) => {
                    debug!("Ignoring client text message: {}", text.as_str());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket receive error: {}", e);
                    break PumpExit::ClientGone;
                }
            },
        }
    };

    subscription.release();
    exit
}
