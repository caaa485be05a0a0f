use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::dao::models::{ActivityEventEntity, ActivityKind};
use crate::state::SharedState;

/// Translate one domain event into activity rows, one per group membership.
///
/// Points are a secondary gamification layer: every failure on this path is
/// logged and swallowed, and nothing is ever surfaced to the user. The
/// originating state transition has already happened by the time this runs.
pub async fn record_activity(
    state: &SharedState,
    activity: ActivityKind,
    points: i64,
    metadata: serde_json::Value,
) {
    let Some(identity) = state.identity().await else {
        debug!(?activity, "skipping points fan-out while signed out");
        return;
    };
    let Some(store) = state.study_store().await else {
        debug!(?activity, "skipping points fan-out without a storage backend");
        return;
    };

    let group_ids = match store.list_group_ids(identity.user_id).await {
        Ok(ids) => ids,
        Err(err) => {
            warn!(error = %err, ?activity, "failed to list group memberships for fan-out");
            return;
        }
    };
    if group_ids.is_empty() {
        debug!(?activity, "user belongs to no groups; no activity rows emitted");
        return;
    }

    let created_at = OffsetDateTime::now_utc();
    for group_id in group_ids {
        let event = ActivityEventEntity {
            user_id: identity.user_id,
            group_id,
            activity,
            points,
            metadata: metadata.clone(),
            created_at,
        };
        if let Err(err) = store.insert_activity_event(event).await {
            warn!(error = %err, %group_id, ?activity, "failed to insert activity event");
        }
    }
}
