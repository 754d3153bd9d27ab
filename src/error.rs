//! Crate error types, one enum per failure domain.
//!
//! Stream faults are recovered locally by the stream tasks (reconnect).
//! Snapshot and sync faults abort a reconciliation round and trigger a cold
//! restart. None of these reach readers: accessors report `ready = false`
//! until the book is linked again.

use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::binance::rate_limiter::PacerError;

/// Faults local to a single websocket stream task.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("websocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("no frame received within the {0:?} read deadline")]
    ReadDeadline(Duration),

    #[error("stream closed by remote")]
    Closed,

    #[error("undecodable frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("depth stream update id went backwards (guard {guard}, got {got})")]
    SequenceRewind { guard: Decimal, got: Decimal },

    #[error("stall signal received, dropping connection")]
    StallInjected,

    #[error("event queue closed")]
    QueueClosed,
}

/// Faults from the REST depth snapshot fetch.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("depth snapshot request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("depth snapshot returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error(transparent)]
    RateLimit(#[from] PacerError),
}

/// Faults that abort a reconciliation round and force a cold restart.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("depth diff broke the update id chain (expected {expected}, diff carried {carried})")]
    Desync { expected: Decimal, carried: Decimal },

    #[error("no depth update applied within {0:?}")]
    Stall(Duration),

    #[error("snapshot fetch failed: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("stream task reconnecting: {0}")]
    Stream(#[from] StreamError),
}
