use tracing::{debug, warn};
use uuid::Uuid;
use validator::Validate;

use crate::dao::models::{FlashcardEntity, QuestionEntity};
use crate::draft::{self, CARD_COLLECTION_KEY, QUESTION_POOL_KEY};
use crate::dto::{NewFlashcardRequest, NewQuestionRequest};
use crate::error::ServiceError;
use crate::services::points_service;
use crate::state::SharedState;
use crate::state::study::{Flashcard, Question, QuestionSource};

/// Validate and add a hand-written question to the pool.
pub async fn add_question(
    state: &SharedState,
    request: NewQuestionRequest,
) -> Result<Question, ServiceError> {
    request.validate()?;
    let question = Question {
        id: Uuid::new_v4(),
        subject_id: request.subject_id,
        subject_name: request.subject_name,
        topic: request.topic,
        prompt: request.prompt,
        options: request.options,
        correct_option_index: request.correct_option_index,
        explanation: request.explanation,
        answered: false,
        correct: false,
        source: QuestionSource::Manual,
    };
    insert_questions(state, vec![question.clone()]).await;
    Ok(question)
}

/// Validate and add a hand-written flashcard to the collection.
pub async fn add_card(
    state: &SharedState,
    request: NewFlashcardRequest,
) -> Result<Flashcard, ServiceError> {
    request.validate()?;
    let card = Flashcard {
        id: Uuid::new_v4(),
        subject: request.subject,
        front: request.front,
        back: request.back,
        difficulty: request.difficulty.into(),
        review_count: 0,
        correct_count: 0,
        last_reviewed_at: None,
    };
    insert_cards(state, vec![card.clone()]).await;
    Ok(card)
}

/// Remove a question from the pool. Questions are only ever deleted by
/// explicit user action.
pub async fn delete_question(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    {
        let mut pool = state.questions().write().await;
        if pool.shift_remove(&id).is_none() {
            return Err(ServiceError::NotFound(format!("question `{id}` not found")));
        }
    }
    mirror_questions(state).await;

    if let Some(identity) = state.identity().await
        && let Some(store) = state.study_store().await
        && let Err(err) = store.delete_question(identity.user_id, id).await
    {
        warn!(error = %err, %id, "failed to delete question upstream");
    }
    Ok(())
}

/// Answer a pool question outside exam mode, mutating it in place and
/// crediting the answer activity.
pub async fn answer_question(
    state: &SharedState,
    id: Uuid,
    option: usize,
) -> Result<bool, ServiceError> {
    let (question, correct) = {
        let mut pool = state.questions().write().await;
        let question = pool
            .get_mut(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("question `{id}` not found")))?;
        if option >= question.options.len() {
            return Err(ServiceError::InvalidInput(format!(
                "option {option} is out of range for {} options",
                question.options.len()
            )));
        }
        let correct = option == question.correct_option_index;
        question.answered = true;
        question.correct = correct;
        (question.clone(), correct)
    };

    mirror_questions(state).await;
    push_question(state, question).await;
    points_service::record_activity(
        state,
        crate::dao::models::ActivityKind::QuestionAnswered,
        i64::from(state.points().question_answered),
        serde_json::json!({ "question_id": id, "correct": correct }),
    )
    .await;
    Ok(correct)
}

/// Explicit bulk reset of every card's review statistics.
pub async fn reset_card_stats(state: &SharedState) {
    let cards: Vec<Flashcard> = {
        let mut collection = state.cards().write().await;
        for card in collection.values_mut() {
            card.review_count = 0;
            card.correct_count = 0;
            card.last_reviewed_at = None;
        }
        collection.values().cloned().collect()
    };
    mirror_cards(state).await;
    for card in cards {
        push_card(state, card).await;
    }
}

/// Replace the in-memory pools with whatever the draft store mirrored
/// before the last shutdown.
pub async fn hydrate_from_drafts(state: &SharedState) {
    match draft::load_json::<Vec<Question>>(state.drafts(), QUESTION_POOL_KEY) {
        Ok(Some(questions)) => {
            let mut pool = state.questions().write().await;
            *pool = questions.into_iter().map(|q| (q.id, q)).collect();
        }
        Ok(None) => {}
        Err(err) => warn!(error = %err, "discarding unreadable question pool mirror"),
    }
    match draft::load_json::<Vec<Flashcard>>(state.drafts(), CARD_COLLECTION_KEY) {
        Ok(Some(cards)) => {
            let mut collection = state.cards().write().await;
            *collection = cards.into_iter().map(|c| (c.id, c)).collect();
        }
        Ok(None) => {}
        Err(err) => warn!(error = %err, "discarding unreadable card collection mirror"),
    }
}

/// Replace the in-memory pools with the user's durable collections.
pub async fn sync_from_store(state: &SharedState) -> Result<(), ServiceError> {
    let identity = state.require_identity().await?;
    let store = state.study_store().await.ok_or(ServiceError::Degraded)?;

    let questions = store.list_questions(identity.user_id).await?;
    let cards = store.list_flashcards(identity.user_id).await?;
    {
        let mut pool = state.questions().write().await;
        *pool = questions
            .into_iter()
            .map(|entity| {
                let question: Question = entity.into();
                (question.id, question)
            })
            .collect();
    }
    {
        let mut collection = state.cards().write().await;
        *collection = cards
            .into_iter()
            .map(|entity| {
                let card: Flashcard = entity.into();
                (card.id, card)
            })
            .collect();
    }
    mirror_questions(state).await;
    mirror_cards(state).await;
    Ok(())
}

/// Insert questions into the pool, mirror locally, and push upstream.
pub(crate) async fn insert_questions(state: &SharedState, items: Vec<Question>) {
    {
        let mut pool = state.questions().write().await;
        for question in &items {
            pool.insert(question.id, question.clone());
        }
    }
    mirror_questions(state).await;
    for question in items {
        push_question(state, question).await;
    }
}

/// Insert cards into the collection, mirror locally, and push upstream.
pub(crate) async fn insert_cards(state: &SharedState, items: Vec<Flashcard>) {
    {
        let mut collection = state.cards().write().await;
        for card in &items {
            collection.insert(card.id, card.clone());
        }
    }
    mirror_cards(state).await;
    for card in items {
        push_card(state, card).await;
    }
}

/// Mirror the question pool to the draft store.
pub(crate) async fn mirror_questions(state: &SharedState) {
    let questions: Vec<Question> = {
        let pool = state.questions().read().await;
        pool.values().cloned().collect()
    };
    if let Err(err) = draft::save_json(state.drafts(), QUESTION_POOL_KEY, &questions) {
        warn!(error = %err, "failed to mirror question pool");
    }
}

/// Mirror the flashcard collection to the draft store.
pub(crate) async fn mirror_cards(state: &SharedState) {
    let cards: Vec<Flashcard> = {
        let collection = state.cards().read().await;
        collection.values().cloned().collect()
    };
    if let Err(err) = draft::save_json(state.drafts(), CARD_COLLECTION_KEY, &cards) {
        warn!(error = %err, "failed to mirror card collection");
    }
}

/// Push one question upstream; failures are logged, never surfaced.
pub(crate) async fn push_question(state: &SharedState, question: Question) {
    let Some(identity) = state.identity().await else {
        debug!("skipping question upsert while signed out");
        return;
    };
    let Some(store) = state.study_store().await else {
        debug!("skipping question upsert without a storage backend");
        return;
    };
    let entity = QuestionEntity::from((question, identity.user_id));
    if let Err(err) = store.upsert_question(entity).await {
        warn!(error = %err, "failed to upsert question upstream");
    }
}

/// Push one flashcard upstream; failures are logged, never surfaced.
pub(crate) async fn push_card(state: &SharedState, card: Flashcard) {
    let Some(identity) = state.identity().await else {
        debug!("skipping flashcard upsert while signed out");
        return;
    };
    let Some(store) = state.study_store().await else {
        debug!("skipping flashcard upsert without a storage backend");
        return;
    };
    let entity = FlashcardEntity::from((card, identity.user_id));
    if let Err(err) = store.upsert_flashcard(entity).await {
        warn!(error = %err, "failed to upsert flashcard upstream");
    }
}
