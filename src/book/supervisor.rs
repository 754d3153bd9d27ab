//! Supervisor: the only mutator of a [`LocalBook`].
//!
//! Spawns the depth-diff stream, the optional trade stream and a driver task
//! that runs reconciliation rounds. Each round re-snapshots, buffers diffs
//! until the snapshot lands, links the stream to the snapshot's sequence
//! line and applies diffs from then on. Any fault (desync, snapshot failure,
//! stream reconnect, stall) ends the round; the driver backs off briefly and
//! starts a fresh one.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, warn};

use crate::binance::client::SnapshotSource;
use crate::book::events::{DepthDiff, MarketEvent};
use crate::book::linker::{Linker, Verdict};
use crate::book::state::LocalBook;
use crate::book::stream::{Inbound, StreamSignal, StreamTask};
use crate::config::SyncConfig;
use crate::error::SyncError;

/// Spawn the stream tasks and the reconciliation driver for `book`.
pub(crate) fn spawn<S>(book: Arc<LocalBook>, source: S, stream_trades: bool, cfg: SyncConfig)
where
    S: SnapshotSource + Send + Sync + 'static,
{
    let (queue_tx, queue_rx) = mpsc::channel(cfg.queue_capacity);
    let (restart_tx, restart_rx) = mpsc::channel(4);

    let mut stall_txs = Vec::new();
    stall_txs.push(spawn_stream(
        &book,
        book.product().depth_channel(),
        queue_tx.clone(),
        restart_tx.clone(),
        &cfg,
    ));
    if stream_trades {
        stall_txs.push(spawn_stream(
            &book,
            book.product().trade_channel(),
            queue_tx,
            restart_tx.clone(),
            &cfg,
        ));
    }

    tokio::spawn(drive(
        book,
        Arc::new(source),
        queue_rx,
        restart_rx,
        restart_tx,
        stall_txs,
        cfg,
    ));
}

fn spawn_stream(
    book: &Arc<LocalBook>,
    channel: &'static str,
    queue: mpsc::Sender<Inbound>,
    restart: mpsc::Sender<SyncError>,
    cfg: &SyncConfig,
) -> mpsc::Sender<StreamSignal> {
    let (signal_tx, signal_rx) = mpsc::channel(1);
    let task = StreamTask {
        product: book.product(),
        symbol: book.symbol().to_string(),
        channel,
        queue,
        restart,
        signal: signal_rx,
        cancel: book.cancel_token().clone(),
        read_deadline: cfg.read_deadline,
        reconnect_backoff: cfg.reconnect_backoff,
    };
    tokio::spawn(task.run());
    signal_tx
}

/// How a reconciliation round ended.
enum RoundExit {
    Cancelled,
    Fault(SyncError),
}

async fn drive<S>(
    book: Arc<LocalBook>,
    source: Arc<S>,
    mut queue_rx: mpsc::Receiver<Inbound>,
    mut restart_rx: mpsc::Receiver<SyncError>,
    restart_tx: mpsc::Sender<SyncError>,
    stall_txs: Vec<mpsc::Sender<StreamSignal>>,
    cfg: SyncConfig,
) where
    S: SnapshotSource + Send + Sync + 'static,
{
    loop {
        if book.cancel_token().is_cancelled() {
            break;
        }
        let exit = reconcile(
            &book,
            &source,
            &mut queue_rx,
            &mut restart_rx,
            &restart_tx,
            &stall_txs,
            &cfg,
        )
        .await;
        match exit {
            RoundExit::Cancelled => break,
            RoundExit::Fault(err) => {
                warn!(
                    symbol = %book.symbol(),
                    product = %book.product(),
                    error = %err,
                    "refreshing local order book"
                );
            }
        }
        sleep(cfg.restart_backoff).await;
    }
    debug!(symbol = %book.symbol(), "supervisor stopped");
}

/// One reconciliation round: fresh snapshot, link, apply until a fault.
async fn reconcile<S>(
    book: &Arc<LocalBook>,
    source: &Arc<S>,
    queue_rx: &mut mpsc::Receiver<Inbound>,
    restart_rx: &mut mpsc::Receiver<SyncError>,
    restart_tx: &mpsc::Sender<SyncError>,
    stall_txs: &[mpsc::Sender<StreamSignal>],
    cfg: &SyncConfig,
) -> RoundExit
where
    S: SnapshotSource + Send + Sync + 'static,
{
    book.reset_sync().await;
    let mut reconciler = Reconciler::new(Arc::clone(book));

    // Snapshot fetch for this round, delayed so the diff stream can buffer
    // events straddling the snapshot. The guard cancels the fetch if the
    // round ends first.
    let snap_cancel = book.cancel_token().child_token();
    let _snap_guard = snap_cancel.clone().drop_guard();
    {
        let book = Arc::clone(book);
        let source = Arc::clone(source);
        let restart_tx = restart_tx.clone();
        let delay = cfg.snapshot_delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = snap_cancel.cancelled() => return,
                _ = sleep(delay) => {}
            }
            let fetch = source.fetch(
                book.product(),
                book.symbol(),
                book.product().snapshot_limit(),
            );
            tokio::select! {
                _ = snap_cancel.cancelled() => {}
                fetched = fetch => match fetched {
                    Ok(snapshot) => book.install_snapshot(&snapshot).await,
                    Err(err) => {
                        let _ = restart_tx.try_send(SyncError::Snapshot(err));
                    }
                }
            }
        });
    }

    let mut stall_deadline = Instant::now() + cfg.stall_threshold;
    loop {
        tokio::select! {
            _ = book.cancel_token().cancelled() => return RoundExit::Cancelled,
            Some(err) = restart_rx.recv() => return RoundExit::Fault(err),
            item = queue_rx.recv() => {
                let Some(item) = item else {
                    return RoundExit::Cancelled;
                };
                match reconciler.handle(item).await {
                    Ok(applied) => {
                        if applied {
                            stall_deadline = Instant::now() + cfg.stall_threshold;
                        }
                    }
                    Err(err) => return RoundExit::Fault(err),
                }
            }
            _ = sleep_until(stall_deadline) => {
                for tx in stall_txs {
                    let _ = tx.try_send(StreamSignal::Stall);
                }
                return RoundExit::Fault(SyncError::Stall(cfg.stall_threshold));
            }
        }
    }
}

/// Event-application core of a reconciliation round, kept free of task and
/// network concerns so the buffering and linking behavior is testable.
pub(crate) struct Reconciler {
    book: Arc<LocalBook>,
    linker: Linker,
    staging: Vec<DepthDiff>,
}

impl Reconciler {
    pub(crate) fn new(book: Arc<LocalBook>) -> Self {
        let linker = Linker::new(book.product());
        Self {
            book,
            linker,
            staging: Vec::new(),
        }
    }

    /// Process one queue item. Returns true when a depth diff reached the
    /// linker, which refreshes the stall deadline.
    pub(crate) async fn handle(&mut self, item: Inbound) -> Result<bool, SyncError> {
        match item {
            Inbound::Disrupted => {
                debug!(symbol = %self.book.symbol(), "stream disruption sentinel");
                Ok(false)
            }
            Inbound::Market(MarketEvent::Depth(diff)) => {
                if !self.book.is_snapshotted() {
                    self.staging.push(diff);
                    return Ok(false);
                }
                if !self.staging.is_empty() {
                    let staged = std::mem::take(&mut self.staging);
                    debug!(
                        symbol = %self.book.symbol(),
                        buffered = staged.len(),
                        "draining buffered diffs through the linker"
                    );
                    for buffered in staged {
                        self.judge_and_apply(buffered).await?;
                    }
                }
                self.judge_and_apply(diff).await?;
                Ok(true)
            }
            Inbound::Market(MarketEvent::Trade(tick))
            | Inbound::Market(MarketEvent::AggTrade(tick)) => {
                if self.book.is_snapshotted() {
                    self.book.record_trade(&tick).await;
                }
                Ok(false)
            }
        }
    }

    async fn judge_and_apply(&mut self, diff: DepthDiff) -> Result<(), SyncError> {
        let last = self.book.last_update_id().await;
        match self.linker.judge(&diff, last)? {
            Verdict::Apply => {
                self.book.apply_diff(&diff).await;
                self.book.set_last_update_id(diff.final_update_id).await;
            }
            Verdict::Drop => {}
        }
        Ok(())
    }
}
