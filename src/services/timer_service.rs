use time::OffsetDateTime;
use tracing::warn;
use validator::Validate;

use crate::dao::models::StudySessionEntity;
use crate::draft::{self, TIMER_MIRROR_KEY};
use crate::dto::{CustomTimerRequest, StartSessionRequest};
use crate::error::ServiceError;
use crate::services::points_service;
use crate::state::study::{StudySession, StudySessionDraft};
use crate::state::timer::{
    TimerConfig, TimerEffect, TimerEvent, TimerMirror, TimerPhase, TimerSnapshot,
    TimerStateMachine,
};
use crate::state::{Notice, SharedState};

/// Validate the request and start a work phase with its session draft.
pub async fn start_session(
    state: &SharedState,
    request: StartSessionRequest,
) -> Result<TimerSnapshot, ServiceError> {
    request.validate()?;
    let draft = StudySessionDraft::new(
        request.subject_id,
        request.subject_name,
        request.topic,
        request.notes,
    );
    dispatch(state, TimerEvent::Start(draft)).await
}

/// Advance the countdown by one second.
///
/// This is the single entry point the tick driver uses, so a tick landing
/// after a reset is serialized behind the same lock as the reset and
/// observes an idle machine.
pub async fn tick(state: &SharedState) -> Result<TimerSnapshot, ServiceError> {
    dispatch(state, TimerEvent::Tick).await
}

/// Stop the countdown without losing phase or remaining seconds.
pub async fn pause(state: &SharedState) -> Result<TimerSnapshot, ServiceError> {
    dispatch(state, TimerEvent::Pause).await
}

/// Resume a paused countdown.
pub async fn resume(state: &SharedState) -> Result<TimerSnapshot, ServiceError> {
    dispatch(state, TimerEvent::Resume).await
}

/// Discard the in-flight draft and runtime state. No record is emitted;
/// partial sessions are not credited.
pub async fn reset(state: &SharedState) -> Result<TimerSnapshot, ServiceError> {
    dispatch(state, TimerEvent::Reset).await
}

/// Switch to a preset config, forcing the machine back to idle.
pub async fn change_mode(
    state: &SharedState,
    config: TimerConfig,
) -> Result<TimerSnapshot, ServiceError> {
    dispatch(state, TimerEvent::ChangeMode(config)).await
}

/// Validate and apply user-supplied custom durations.
pub async fn apply_custom_config(
    state: &SharedState,
    request: CustomTimerRequest,
) -> Result<TimerSnapshot, ServiceError> {
    request.validate()?;
    let config = TimerConfig::custom(
        request.work_minutes,
        request.break_minutes,
        request.long_break_minutes,
    )?;
    dispatch(state, TimerEvent::ChangeMode(config)).await
}

/// Mirrored tuple left behind by a previous process instance, if any.
///
/// The host offers (never forces) a one-time resume based on this. An
/// unreadable mirror is discarded rather than surfaced.
pub fn resumable_session(state: &SharedState) -> Option<TimerMirror> {
    match draft::load_json::<TimerMirror>(state.drafts(), TIMER_MIRROR_KEY) {
        Ok(mirror) => mirror,
        Err(err) => {
            warn!(error = %err, "discarding unreadable timer mirror");
            if let Err(err) = state.drafts().clear(TIMER_MIRROR_KEY) {
                warn!(error = %err, "failed to clear unreadable timer mirror");
            }
            None
        }
    }
}

/// Replay a mirrored tuple verbatim, including its remaining seconds.
///
/// Wall-clock time elapsed while the process was unloaded is not subtracted
/// from the countdown.
pub async fn resume_session(
    state: &SharedState,
    mirror: TimerMirror,
) -> Result<TimerSnapshot, ServiceError> {
    let snapshot = {
        let mut timer = state.timer().write().await;
        if timer.phase() != TimerPhase::Idle {
            return Err(ServiceError::InvalidState(
                "a timer session is already active".into(),
            ));
        }
        *timer = TimerStateMachine::restore(mirror, state.points().hourly_study_rate);
        timer.snapshot()
    };
    state.publish_timer(snapshot.clone());
    Ok(snapshot)
}

/// Apply one event to the machine and execute the effects it requests.
async fn dispatch(state: &SharedState, event: TimerEvent) -> Result<TimerSnapshot, ServiceError> {
    let now = OffsetDateTime::now_utc();
    let (effects, snapshot, mirror) = {
        let mut timer = state.timer().write().await;
        let effects = timer.apply(event, now)?;
        (effects, timer.snapshot(), timer.mirror(now))
    };

    run_effects(state, effects, &mirror).await;
    state.publish_timer(snapshot.clone());
    Ok(snapshot)
}

/// Execute transition effects in order.
///
/// The transition is already committed when these run: a failing durable
/// write warns the user (or just the log) and never rolls the phase back.
async fn run_effects(state: &SharedState, effects: Vec<TimerEffect>, mirror: &TimerMirror) {
    for effect in effects {
        match effect {
            TimerEffect::MirrorState => {
                if let Err(err) = draft::save_json(state.drafts(), TIMER_MIRROR_KEY, mirror) {
                    warn!(error = %err, "failed to mirror timer state");
                }
            }
            TimerEffect::ClearMirror => {
                if let Err(err) = state.drafts().clear(TIMER_MIRROR_KEY) {
                    warn!(error = %err, "failed to clear timer mirror");
                }
            }
            TimerEffect::PersistSession(session) => persist_session(state, session).await,
            TimerEffect::AwardPoints {
                activity,
                points,
                metadata,
            } => points_service::record_activity(state, activity, points, metadata).await,
        }
    }
}

async fn persist_session(state: &SharedState, session: StudySession) {
    let Some(identity) = state.identity().await else {
        warn!("completed study session dropped: no identity installed");
        state.notify(Notice::warning(
            "your completed session was not saved: please sign in",
        ));
        return;
    };
    let Some(store) = state.study_store().await else {
        warn!("completed study session dropped: storage unavailable");
        state.notify(Notice::warning(
            "your completed session could not be saved right now",
        ));
        return;
    };

    let entity = StudySessionEntity::from((session, identity.user_id));
    if let Err(err) = store.insert_study_session(entity).await {
        warn!(error = %err, "failed to persist study session");
        state.notify(Notice::warning(
            "your completed session could not be saved right now",
        ));
    }
}
