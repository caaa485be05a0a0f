use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;
use validator::Validate;

use crate::dao::models::ExamSessionEntity;
use crate::dto::StartExamRequest;
use crate::error::ServiceError;
use crate::services::{points_service, pool_service};
use crate::state::exam::{ExamEffect, ExamSession, ExamStart};
use crate::state::study::{Question, QuestionFilter};
use crate::state::{Notice, SharedState};

/// Validate the request, sample the pool, and start a new exam.
pub async fn start_exam(
    state: &SharedState,
    request: StartExamRequest,
) -> Result<ExamSession, ServiceError> {
    request.validate()?;

    let pool: Vec<Question> = {
        let questions = state.questions().read().await;
        questions.values().cloned().collect()
    };
    let start = ExamStart {
        title: request.title,
        filter: QuestionFilter {
            subject_ids: request.subject_ids,
            only_unanswered: request.only_unanswered,
        },
        count: request.count as usize,
    };

    let mut exam = state.exam().write().await;
    let mut rng = rand::rng();
    let session = exam.start(start, &pool, &mut rng, OffsetDateTime::now_utc())?;
    Ok(session)
}

/// Record (or overwrite) the answer for one question of the running exam.
pub async fn answer(state: &SharedState, index: usize, option: usize) -> Result<(), ServiceError> {
    let mut exam = state.exam().write().await;
    exam.answer(index, option)?;
    Ok(())
}

/// Number of questions still unanswered in the running exam.
pub async fn unanswered_count(state: &SharedState) -> Result<usize, ServiceError> {
    let exam = state.exam().read().await;
    let session = exam
        .session()
        .ok_or_else(|| ServiceError::InvalidState("no exam is active".into()))?;
    Ok(session.unanswered_count())
}

/// Finish and score the running exam.
///
/// Returns [`ServiceError::ConfirmationRequired`] while questions are
/// unanswered and `acknowledge_unanswered` is false; the host re-calls with
/// the flag set after the user confirms. The score is always returned, even
/// when the durable write behind it fails (the user is warned instead).
pub async fn finish_exam(
    state: &SharedState,
    acknowledge_unanswered: bool,
) -> Result<ExamSession, ServiceError> {
    let now = OffsetDateTime::now_utc();
    let effects = {
        let mut exam = state.exam().write().await;
        exam.finish(now, acknowledge_unanswered)?
    };

    let mut finished = None;
    let mut marked_any = false;
    for effect in effects {
        match effect {
            ExamEffect::PersistExam(session) => {
                persist_exam(state, session.clone()).await;
                finished = Some(session);
            }
            ExamEffect::MarkQuestion {
                question_id,
                correct,
            } => {
                mark_question(state, question_id, correct).await;
                marked_any = true;
            }
            ExamEffect::AwardPoints {
                activity,
                points,
                metadata,
            } => points_service::record_activity(state, activity, points, metadata).await,
        }
    }
    if marked_any {
        pool_service::mirror_questions(state).await;
    }

    finished.ok_or_else(|| ServiceError::InvalidState("exam finished without a session".into()))
}

/// Discard the running exam without emitting any record.
pub async fn abandon_exam(state: &SharedState) -> Result<(), ServiceError> {
    let mut exam = state.exam().write().await;
    exam.abandon()?;
    Ok(())
}

async fn persist_exam(state: &SharedState, session: ExamSession) {
    let Some(identity) = state.identity().await else {
        warn!("finished exam dropped: no identity installed");
        state.notify(Notice::warning("your exam result was not saved: please sign in"));
        return;
    };
    let Some(store) = state.study_store().await else {
        warn!("finished exam dropped: storage unavailable");
        state.notify(Notice::warning("your exam result could not be saved right now"));
        return;
    };

    let entity = ExamSessionEntity::from((session, identity.user_id));
    if let Err(err) = store.insert_exam_session(entity).await {
        warn!(error = %err, "failed to persist exam session");
        state.notify(Notice::warning("your exam result could not be saved right now"));
    }
}

/// Flag the underlying pool item with the exam outcome. The exam holds a
/// value snapshot, so this is the one place the shared pool is mutated.
async fn mark_question(state: &SharedState, question_id: Uuid, correct: bool) {
    let updated = {
        let mut pool = state.questions().write().await;
        pool.get_mut(&question_id).map(|question| {
            question.answered = true;
            question.correct = correct;
            question.clone()
        })
    };
    match updated {
        Some(question) => pool_service::push_question(state, question).await,
        None => warn!(%question_id, "sampled question no longer in the pool"),
    }
}
