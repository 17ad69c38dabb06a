//! Push-stream session: one connection, one symbol, auto-reconnect
//!
//! A [`StreamSession`] owns the full lifecycle of a single streaming
//! subscription: connect, subscribe, read, unsubscribe, disconnect, and
//! reconnect after a fixed delay for as long as the session stays open.
//! Every applied message is tagged with the generation the session was
//! opened for, so data from a superseded session is discarded at the
//! state boundary rather than raced against a switch.

use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::config::FeedConfig;
use crate::series::Bar;
use crate::state::FeedState;

/// Observable connection state of a stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Connecting,
    Subscribed,
    Reconnecting,
    Closed,
}

/// Subscribe/unsubscribe envelope sent to the streaming feed.
#[derive(Debug, Serialize)]
struct StreamRequest<'a> {
    method: &'static str,
    params: &'a [String],
    id: u64,
}

impl<'a> StreamRequest<'a> {
    fn subscribe(channels: &'a [String]) -> Self {
        Self {
            method: "SUBSCRIBE",
            params: channels,
            id: 1,
        }
    }

    fn unsubscribe(channels: &'a [String]) -> Self {
        Self {
            method: "UNSUBSCRIBE",
            params: channels,
            id: 1,
        }
    }
}

fn de_f64_str<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

/// Inbound stream messages, discriminated by the `e` event tag.
#[derive(Debug, Deserialize)]
#[serde(tag = "e")]
enum StreamMessage {
    #[serde(rename = "trade")]
    Trade {
        #[serde(rename = "p", deserialize_with = "de_f64_str")]
        price: f64,
        #[serde(rename = "q", default, deserialize_with = "de_f64_str")]
        quantity: f64,
    },
    #[serde(rename = "kline")]
    Kline {
        #[serde(rename = "k")]
        kline: KlinePayload,
    },
}

#[derive(Debug, Deserialize)]
struct KlinePayload {
    #[serde(rename = "t")]
    open_time_ms: i64,
    #[serde(rename = "o", deserialize_with = "de_f64_str")]
    open: f64,
    #[serde(rename = "h", deserialize_with = "de_f64_str")]
    high: f64,
    #[serde(rename = "l", deserialize_with = "de_f64_str")]
    low: f64,
    #[serde(rename = "c", deserialize_with = "de_f64_str")]
    close: f64,
    /// Whether the candle is final (its minute has closed).
    #[serde(rename = "x")]
    is_final: bool,
}

/// Handle to one live streaming subscription.
///
/// Exactly one session is open at a time; the controller fully closes
/// the previous session before opening the next, so subscriptions never
/// overlap and volume is never double-counted.
pub struct StreamSession {
    symbol: String,
    shutdown: watch::Sender<bool>,
    status: watch::Receiver<SessionStatus>,
    task: JoinHandle<()>,
}

impl StreamSession {
    /// Spawn the connection task for `symbol`, applying messages to
    /// `state` tagged with `generation`. Must be called within a Tokio
    /// runtime.
    pub fn open(
        config: &FeedConfig,
        symbol: &str,
        generation: u64,
        state: Arc<Mutex<FeedState>>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(SessionStatus::Connecting);

        let task = tokio::spawn(run_session(
            config.ws_url.clone(),
            symbol.to_lowercase(),
            generation,
            state,
            config.reconnect_delay,
            shutdown_rx,
            status_tx,
        ));

        Self {
            symbol: symbol.to_string(),
            shutdown: shutdown_tx,
            status: status_rx,
            task,
        }
    }

    /// Request shutdown: best-effort unsubscribe while the transport is
    /// open, then disconnect; any pending reconnect is cancelled.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Main connection loop with auto-reconnect.
async fn run_session(
    ws_url: String,
    channel_symbol: String,
    generation: u64,
    state: Arc<Mutex<FeedState>>,
    reconnect_delay: Duration,
    mut shutdown: watch::Receiver<bool>,
    status: watch::Sender<SessionStatus>,
) {
    let channels = vec![
        format!("{channel_symbol}@trade"),
        format!("{channel_symbol}@kline_1m"),
    ];
    info!(symbol = %channel_symbol, "starting stream session");

    loop {
        if *shutdown.borrow() {
            break;
        }
        let _ = status.send(SessionStatus::Connecting);

        match connect_async(ws_url.as_str()).await {
            Ok((ws_stream, _)) => {
                info!(symbol = %channel_symbol, url = %ws_url, "stream connected");
                let (mut write, mut read) = ws_stream.split();

                match serde_json::to_string(&StreamRequest::subscribe(&channels)) {
                    Ok(payload) => {
                        if let Err(e) = write.send(Message::text(payload)).await {
                            warn!(symbol = %channel_symbol, error = %e, "subscribe send failed");
                        } else {
                            let _ = status.send(SessionStatus::Subscribed);
                            debug!(symbol = %channel_symbol, "subscribed to trade and kline channels");
                        }
                    }
                    Err(e) => error!(error = %e, "failed to serialize subscribe request"),
                }

                loop {
                    tokio::select! {
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                if let Ok(payload) =
                                    serde_json::to_string(&StreamRequest::unsubscribe(&channels))
                                {
                                    let _ = write.send(Message::text(payload)).await;
                                }
                                let _ = write.send(Message::Close(None)).await;
                                let _ = status.send(SessionStatus::Closed);
                                info!(symbol = %channel_symbol, "stream session closed");
                                return;
                            }
                        }
                        message = read.next() => match message {
                            Some(Ok(Message::Text(text))) => {
                                handle_message(&text, generation, &state).await;
                            }
                            Some(Ok(Message::Close(_))) => {
                                warn!(symbol = %channel_symbol, "server closed stream");
                                break;
                            }
                            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                                // Heartbeat - handled by tungstenite automatically
                            }
                            Some(Err(e)) => {
                                error!(symbol = %channel_symbol, error = %e, "stream transport error");
                                break;
                            }
                            None => break,
                            _ => {}
                        }
                    }
                }

                let _ = status.send(SessionStatus::Reconnecting);
            }
            Err(e) => {
                error!(symbol = %channel_symbol, url = %ws_url, error = %e, "stream connect failed");
                let _ = status.send(SessionStatus::Reconnecting);
            }
        }

        debug!(symbol = %channel_symbol, delay = ?reconnect_delay, "waiting before reconnect");
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = tokio::time::sleep(reconnect_delay) => {}
        }
    }

    let _ = status.send(SessionStatus::Closed);
}

/// Parse and apply one inbound text frame.
///
/// Unparseable frames are dropped for that single message; they never
/// tear down the session.
async fn handle_message(text: &str, generation: u64, state: &Arc<Mutex<FeedState>>) {
    match serde_json::from_str::<StreamMessage>(text) {
        Ok(StreamMessage::Trade { price, quantity }) => {
            // The feed occasionally omits or zeroes quantity; fall back
            // to unit volume so the trade still carries VWAP weight
            let volume = if quantity > 0.0 { quantity } else { 1.0 };
            if !state.lock().await.apply_trade(generation, price, volume) {
                debug!(price, "trade for superseded session dropped");
            }
        }
        Ok(StreamMessage::Kline { kline }) => {
            if !kline.is_final {
                // Open-candle updates are left to the chart renderer
                return;
            }
            let bar = Bar {
                time: kline.open_time_ms / 1000,
                open: kline.open,
                high: kline.high,
                low: kline.low,
                close: kline.close,
            };
            if !state.lock().await.apply_closed_bar(generation, bar) {
                debug!(time = bar.time, "closed bar for superseded session dropped");
            }
        }
        Err(e) => {
            // Subscription acks come back as {"result":null,"id":1}
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
                if value.get("result").is_some() {
                    debug!("subscription ack received");
                    return;
                }
            }
            debug!(error = %e, raw = &text[..text.len().min(100)], "unparseable stream message dropped");
        }
    }
}
