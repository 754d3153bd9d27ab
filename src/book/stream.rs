//! Reconnecting websocket stream task, one per subscribed channel.
//!
//! Each task dials the raw-stream endpoint for its channel, decodes frames
//! into typed events and forwards them over the shared supervisor queue.
//! Transport faults never leave the task: it emits a [`Inbound::Disrupted`]
//! sentinel, notifies the supervisor unless the drop was a stall injection,
//! and redials after a short backoff.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::binance::types::Product;
use crate::book::events::MarketEvent;
use crate::error::{StreamError, SyncError};

/// Envelope placed on the shared supervisor queue.
#[derive(Debug)]
pub(crate) enum Inbound {
    /// A decoded market event.
    Market(MarketEvent),
    /// The producing stream dropped its connection and is reconnecting.
    Disrupted,
}

/// Signal injected by the supervisor into a stream task.
#[derive(Debug, Clone, Copy)]
pub(crate) enum StreamSignal {
    /// Reconciliation stalled; drop the connection and redial.
    Stall,
}

/// One websocket subscription with its reconnect loop.
pub(crate) struct StreamTask {
    pub(crate) product: Product,
    pub(crate) symbol: String,
    pub(crate) channel: &'static str,
    pub(crate) queue: mpsc::Sender<Inbound>,
    pub(crate) restart: mpsc::Sender<SyncError>,
    pub(crate) signal: mpsc::Receiver<StreamSignal>,
    pub(crate) cancel: CancellationToken,
    pub(crate) read_deadline: Duration,
    pub(crate) reconnect_backoff: Duration,
}

impl StreamTask {
    fn url(&self) -> String {
        format!(
            "{}{}{}",
            self.product.ws_base(),
            self.symbol.to_lowercase(),
            self.channel
        )
    }

    pub(crate) async fn run(mut self) {
        loop {
            if self.cancel.is_cancelled() {
                return;
            }
            match self.connect_and_read().await {
                Ok(()) => return,
                Err(err) => {
                    let stall = matches!(err, StreamError::StallInjected);
                    warn!(
                        symbol = %self.symbol,
                        channel = self.channel,
                        error = %err,
                        "stream disconnected, reconnecting"
                    );
                    if !stall {
                        let _ = self.restart.try_send(SyncError::Stream(err));
                    }
                    if self.queue.send(Inbound::Disrupted).await.is_err() {
                        return;
                    }
                    tokio::time::sleep(self.reconnect_backoff).await;
                }
            }
        }
    }

    /// Dial and pump frames until a fault or cancellation. Returns Ok only
    /// on cancellation.
    async fn connect_and_read(&mut self) -> Result<(), StreamError> {
        let url = self.url();
        info!(symbol = %self.symbol, url = %url, "connecting to stream");

        let (ws_stream, _) = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(()),
            connected = connect_async(&url) => connected?,
        };
        info!(
            symbol = %self.symbol,
            product = %self.product,
            channel = self.channel,
            "socket connected"
        );

        let (mut write, mut read) = ws_stream.split();

        // Per-connection sequence guard, independent of the book's cursor:
        // a diff whose first id precedes what this connection already saw
        // means the connection itself is unusable.
        let mut guard = Decimal::ZERO;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                Some(StreamSignal::Stall) = self.signal.recv() => {
                    return Err(StreamError::StallInjected);
                }
                frame = timeout(self.read_deadline, read.next()) => {
                    let message = match frame {
                        Err(_) => return Err(StreamError::ReadDeadline(self.read_deadline)),
                        Ok(None) => return Err(StreamError::Closed),
                        Ok(Some(message)) => message?,
                    };
                    match message {
                        Message::Text(text) => {
                            let Some(event) = MarketEvent::decode(text.as_str())? else {
                                continue;
                            };
                            if let MarketEvent::Depth(diff) = &event {
                                if diff.first_update_id < guard {
                                    return Err(StreamError::SequenceRewind {
                                        guard,
                                        got: diff.first_update_id,
                                    });
                                }
                                guard = diff.final_update_id;
                            }
                            if self.queue.send(Inbound::Market(event)).await.is_err() {
                                return Err(StreamError::QueueClosed);
                            }
                        }
                        Message::Ping(payload) => {
                            debug!(symbol = %self.symbol, "ping received, sending pong");
                            write.send(Message::Pong(payload)).await?;
                        }
                        Message::Pong(_) => {}
                        Message::Close(frame) => {
                            info!(symbol = %self.symbol, frame = ?frame, "close frame received");
                            return Err(StreamError::Closed);
                        }
                        Message::Binary(_) => {
                            warn!(symbol = %self.symbol, "unexpected binary message");
                        }
                        Message::Frame(_) => {}
                    }
                }
            }
        }
    }
}
