//! Recipient selection for one broadcast.
//!
//! Order of filters: active only, then the tester partition, then the mute
//! filter. The tester partition runs first so staged events never reach
//! production recipients, whatever their mutes say.

use std::collections::HashSet;
use tracing::{info, warn};

use crate::config::SelectionConfig;
use crate::database::models::SubscriberDbModel;
use crate::database::repositories::MutedSeriesRepository;
use crate::domain::NotificationPayload;

/// Outcome of recipient selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Chat ids to deliver to, each at most once.
    pub recipients: Vec<i64>,
    /// Candidates dropped by the tester partition.
    pub non_testers: usize,
    /// Candidates dropped by the mute filter.
    pub muted: usize,
}

/// Whether this event is restricted to the tester allowlist.
pub fn testers_only(payload: &NotificationPayload, config: &SelectionConfig) -> bool {
    config.notify_only_testers || (payload.is_synthetic() && config.enable_beta_features)
}

/// Derive the delivery set for `payload` from the full recipient registry.
///
/// Mute lookups fail open: a recipient whose lookup errors is included.
pub async fn select_recipients(
    payload: &NotificationPayload,
    recipients: &[SubscriberDbModel],
    config: &SelectionConfig,
    mutes: &dyn MutedSeriesRepository,
) -> Selection {
    let mut seen = HashSet::new();
    let mut candidates: Vec<i64> = recipients
        .iter()
        .filter(|r| r.is_active)
        .map(|r| r.chat_id)
        .filter(|id| seen.insert(*id))
        .collect();

    let mut selection = Selection::default();

    if testers_only(payload, config) {
        let before = candidates.len();
        candidates.retain(|id| config.is_tester(*id));
        selection.non_testers = before - candidates.len();
        info!(
            item_id = %payload.content_id,
            notify_only_testers = config.notify_only_testers,
            synthetic = payload.is_synthetic(),
            tester_count = candidates.len(),
            "Broadcast restricted to testers"
        );
    }

    if let Some(series) = payload.mute_key() {
        let mut kept = Vec::with_capacity(candidates.len());
        for chat_id in candidates {
            match mutes.is_muted(chat_id, series).await {
                Ok(true) => selection.muted += 1,
                Ok(false) => kept.push(chat_id),
                Err(e) => {
                    warn!(
                        chat_id,
                        series_name = %series,
                        error = %e,
                        "Failed to check if series is muted, including subscriber"
                    );
                    kept.push(chat_id);
                }
            }
        }
        candidates = kept;

        if selection.muted > 0 {
            info!(muted_count = selection.muted, series_name = %series, "Filtered muted subscribers");
        }
    }

    selection.recipients = candidates;
    selection
}
