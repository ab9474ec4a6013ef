//! Whole-broadcast retry on pipeline failure.
//!
//! Per-recipient failures inside a completed loop are terminal for that
//! broadcast; only a failure to read the recipient set is retried.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::delivery::{Broadcaster, DeliveryReport};
use crate::domain::NotificationPayload;
use crate::{Error, Result};

/// Backoff before retry `attempt` (1-based): `attempt` units.
fn backoff_delay(unit: Duration, attempt: u32) -> Duration {
    unit.saturating_mul(attempt)
}

/// Run one broadcast, retrying up to `max_retries` additional times when the
/// recipient set cannot be read.
pub async fn deliver_with_retry(
    broadcaster: &Broadcaster,
    payload: &NotificationPayload,
    max_retries: u32,
    backoff_unit: Duration,
    cancel: &CancellationToken,
) -> Result<DeliveryReport> {
    let mut last_error: Option<Error> = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff_delay(backoff_unit, attempt);
            info!(
                item_id = %payload.content_id,
                attempt,
                max_retries,
                ?delay,
                "Retrying broadcast"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    if let Some(e) = &last_error {
                        warn!(item_id = %payload.content_id, error = %e, "Broadcast retry abandoned on shutdown");
                    }
                    return Err(Error::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        match broadcaster.broadcast(payload, cancel).await {
            Ok(report) => {
                if attempt > 0 {
                    info!(item_id = %payload.content_id, attempt, "Broadcast succeeded after retry");
                }
                return Ok(report);
            }
            Err(e) => {
                warn!(
                    item_id = %payload.content_id,
                    attempt = attempt + 1,
                    error = %e,
                    "Broadcast attempt failed"
                );
                last_error = Some(e);
            }
        }
    }

    let attempts = max_retries + 1;
    Err(Error::pipeline(match last_error {
        Some(e) => format!("broadcast failed after {attempts} attempts: {e}"),
        None => format!("broadcast failed after {attempts} attempts"),
    }))
}
