//! Broadcast handoff: an unbounded queue drained by one worker task.
//!
//! Every accepted event already has a ledger row, so the queue never rejects a job for
//! lack of space. Jobs still queued at shutdown are logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::delivery::Broadcaster;
use super::retry::deliver_with_retry;
use crate::config::BroadcastSettings;
use crate::domain::NotificationPayload;
use crate::ingest::BroadcastDispatcher;
use crate::{Error, Result};

/// Owns the broadcast worker and the sending half of its queue.
pub struct BroadcastService {
    sender: mpsc::UnboundedSender<NotificationPayload>,
    cancellation_token: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl BroadcastService {
    /// Spawn the worker. It stops when `cancellation_token` is cancelled.
    pub fn start(
        broadcaster: Arc<Broadcaster>,
        settings: &BroadcastSettings,
        cancellation_token: CancellationToken,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();

        let worker = tokio::spawn(run_worker(
            broadcaster,
            receiver,
            settings.max_retries,
            settings.backoff_unit,
            cancellation_token.clone(),
        ));

        info!(
            max_retries = settings.max_retries,
            send_interval = ?settings.send_interval,
            "Broadcast service started"
        );

        Arc::new(Self {
            sender,
            cancellation_token,
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Stop the worker and wait for it to exit.
    pub async fn shutdown(&self) {
        info!("Stopping broadcast service");
        self.cancellation_token.cancel();

        if let Some(worker) = self.worker.lock().await.take()
            && let Err(e) = worker.await
        {
            error!(error = %e, "Broadcast worker panicked");
        }

        info!("Broadcast service stopped");
    }
}

impl BroadcastDispatcher for BroadcastService {
    fn dispatch(&self, payload: NotificationPayload) -> Result<()> {
        self.sender.send(payload).map_err(|e| {
            Error::Other(format!(
                "broadcast worker has stopped, dropping {}",
                e.0.content_id
            ))
        })
    }
}

async fn run_worker(
    broadcaster: Arc<Broadcaster>,
    mut receiver: mpsc::UnboundedReceiver<NotificationPayload>,
    max_retries: u32,
    backoff_unit: Duration,
    cancellation_token: CancellationToken,
) {
    loop {
        let payload = tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => {
                debug!("Broadcast worker cancelled");
                break;
            }
            next = receiver.recv() => match next {
                Some(payload) => payload,
                None => break,
            },
        };

        match deliver_with_retry(
            &broadcaster,
            &payload,
            max_retries,
            backoff_unit,
            &cancellation_token,
        )
        .await
        {
            Ok(report) if report.cancelled => {
                warn!(
                    item_id = %payload.content_id,
                    sent = report.sent,
                    skipped = report.skipped(),
                    "Broadcast interrupted by shutdown"
                );
            }
            Ok(report) => {
                debug!(item_id = %payload.content_id, ?report, "Broadcast job finished");
            }
            Err(Error::Cancelled) => {
                warn!(item_id = %payload.content_id, "Broadcast abandoned on shutdown");
            }
            Err(e) => {
                error!(item_id = %payload.content_id, error = %e, "Broadcast failed");
            }
        }
    }

    let dropped = receiver.len();
    if dropped > 0 {
        warn!(dropped, "Broadcast worker exiting with queued jobs");
    }
}
