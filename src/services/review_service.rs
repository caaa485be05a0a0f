use time::OffsetDateTime;

use crate::error::ServiceError;
use crate::services::{points_service, pool_service};
use crate::state::SharedState;
use crate::state::review::{ReviewEffect, ReviewSession};
use crate::state::study::Flashcard;

/// Shuffle the full collection into a fresh review session, returning the
/// number of cards it covers.
pub async fn start_review(state: &SharedState) -> Result<usize, ServiceError> {
    let session = {
        let cards = state.cards().read().await;
        let mut rng = rand::rng();
        ReviewSession::start(&cards, &mut rng, state.points().card_reviewed)?
    };
    let (_, total) = session.progress();
    let mut slot = state.review().write().await;
    *slot = Some(session);
    Ok(total)
}

/// The card currently presented, or `None` once the session is exhausted.
pub async fn current_card(state: &SharedState) -> Result<Option<Flashcard>, ServiceError> {
    let review = state.review().read().await;
    let session = review
        .as_ref()
        .ok_or_else(|| ServiceError::InvalidState("no review session is active".into()))?;
    let Some(id) = session.current_card_id() else {
        return Ok(None);
    };
    let cards = state.cards().read().await;
    Ok(cards.get(&id).cloned())
}

/// Reveal the back of the current card.
pub async fn reveal(state: &SharedState) -> Result<(), ServiceError> {
    let mut review = state.review().write().await;
    let session = review
        .as_mut()
        .ok_or_else(|| ServiceError::InvalidState("no review session is active".into()))?;
    session.reveal()?;
    Ok(())
}

/// Grade the current card and advance. Each grade is persisted immediately;
/// there is no batching.
pub async fn grade(state: &SharedState, correct: bool) -> Result<(), ServiceError> {
    let now = OffsetDateTime::now_utc();
    let effects = {
        let mut review = state.review().write().await;
        let session = review
            .as_mut()
            .ok_or_else(|| ServiceError::InvalidState("no review session is active".into()))?;
        let card_id = session
            .current_card_id()
            .ok_or(crate::state::review::ReviewError::SessionFinished)?;
        let mut cards = state.cards().write().await;
        let card = cards.get_mut(&card_id).ok_or_else(|| {
            ServiceError::NotFound(format!("flashcard `{card_id}` no longer exists"))
        })?;
        session.grade(card, correct, now)?
    };

    for effect in effects {
        match effect {
            ReviewEffect::PersistCard(card) => {
                pool_service::mirror_cards(state).await;
                pool_service::push_card(state, card).await;
            }
            ReviewEffect::AwardPoints {
                activity,
                points,
                metadata,
            } => points_service::record_activity(state, activity, points, metadata).await,
        }
    }
    Ok(())
}

/// Whether the active session has been exhausted. Reaching the end of the
/// shuffled working copy ends the session; there is no partial resume.
pub async fn is_finished(state: &SharedState) -> Result<bool, ServiceError> {
    let review = state.review().read().await;
    let session = review
        .as_ref()
        .ok_or_else(|| ServiceError::InvalidState("no review session is active".into()))?;
    Ok(session.is_finished())
}

/// Drop the active session, if any.
pub async fn end_review(state: &SharedState) {
    let mut review = state.review().write().await;
    review.take();
}
