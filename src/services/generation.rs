use futures::future::BoxFuture;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{GenerationKind, GenerationRequest};
use crate::dto::validation::{validate_correct_index, validate_options};
use crate::error::ServiceError;
use crate::services::pool_service;
use crate::state::SharedState;
use crate::state::study::{Difficulty, Flashcard, Question, QuestionSource};

/// Failure reported by a [`ContentGenerator`] implementation.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The generation service could not be reached or refused the request.
    #[error("generation service failure: {0}")]
    Transport(String),
}

/// Port to the AI generation collaborator.
///
/// Implementations return the raw model text; parsing and validation happen
/// on this side of the boundary and nothing is trusted past that check.
pub trait ContentGenerator: Send + Sync {
    /// Produce a batch of content for the given request.
    fn generate(&self, request: GenerationRequest)
    -> BoxFuture<'static, Result<String, GeneratorError>>;
}

/// Content produced by a successful generation call.
#[derive(Debug, Clone)]
pub enum GeneratedBatch {
    /// Questions already inserted into the pool.
    Questions(Vec<Question>),
    /// Flashcards already inserted into the collection.
    Flashcards(Vec<Flashcard>),
}

/// Expected shape of one generated question.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GeneratedQuestion {
    /// Question text.
    pub question: String,
    /// Answer options.
    pub options: Vec<String>,
    /// Index of the correct option.
    pub correct_answer_index: usize,
    /// Optional explanation.
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Expected shape of one generated flashcard.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GeneratedFlashcard {
    /// Front side of the card.
    pub front: String,
    /// Back side of the card.
    pub back: String,
}

/// Run a generation request end to end: entitlement gate, collaborator
/// call, strict parse, and pool insertion.
///
/// The parse is all-or-nothing: one malformed item rejects the whole batch
/// and nothing is inserted.
pub async fn generate(
    state: &SharedState,
    generator: &dyn ContentGenerator,
    request: GenerationRequest,
) -> Result<GeneratedBatch, ServiceError> {
    request.validate()?;
    let identity = state.require_identity().await?;
    if !identity.premium {
        return Err(ServiceError::Forbidden(
            "content generation is a premium feature".into(),
        ));
    }

    let kind = request.kind;
    let subject_name = request.subject_name.clone();
    let raw = generator
        .generate(request)
        .await
        .map_err(|err| ServiceError::UpstreamFormat(err.to_string()))?;

    match kind {
        GenerationKind::Questions => {
            let items = parse_question_batch(&raw)?;
            let questions: Vec<Question> = items
                .into_iter()
                .map(|item| Question {
                    id: Uuid::new_v4(),
                    subject_id: None,
                    subject_name: subject_name.clone(),
                    topic: None,
                    prompt: item.question,
                    options: item.options,
                    correct_option_index: item.correct_answer_index,
                    explanation: item.explanation,
                    answered: false,
                    correct: false,
                    source: QuestionSource::Generated,
                })
                .collect();
            pool_service::insert_questions(state, questions.clone()).await;
            Ok(GeneratedBatch::Questions(questions))
        }
        GenerationKind::Flashcards => {
            let items = parse_flashcard_batch(&raw)?;
            let cards: Vec<Flashcard> = items
                .into_iter()
                .map(|item| Flashcard {
                    id: Uuid::new_v4(),
                    subject: subject_name.clone(),
                    front: item.front,
                    back: item.back,
                    difficulty: Difficulty::Medium,
                    review_count: 0,
                    correct_count: 0,
                    last_reviewed_at: None,
                })
                .collect();
            pool_service::insert_cards(state, cards.clone()).await;
            Ok(GeneratedBatch::Flashcards(cards))
        }
    }
}

/// Strictly parse a question batch out of raw model text.
pub fn parse_question_batch(raw: &str) -> Result<Vec<GeneratedQuestion>, ServiceError> {
    let items: Vec<GeneratedQuestion> = serde_json::from_str(raw).map_err(|err| {
        ServiceError::UpstreamFormat(format!("response is not a question batch: {err}"))
    })?;
    if items.is_empty() {
        return Err(ServiceError::UpstreamFormat(
            "response contained no questions".into(),
        ));
    }
    for (index, item) in items.iter().enumerate() {
        if item.question.trim().is_empty() {
            return Err(ServiceError::UpstreamFormat(format!(
                "question {index} has empty text"
            )));
        }
        validate_options(&item.options)
            .map_err(|err| ServiceError::UpstreamFormat(format!("question {index}: {err}")))?;
        validate_correct_index(item.correct_answer_index, &item.options)
            .map_err(|err| ServiceError::UpstreamFormat(format!("question {index}: {err}")))?;
    }
    Ok(items)
}

/// Strictly parse a flashcard batch out of raw model text.
pub fn parse_flashcard_batch(raw: &str) -> Result<Vec<GeneratedFlashcard>, ServiceError> {
    let items: Vec<GeneratedFlashcard> = serde_json::from_str(raw).map_err(|err| {
        ServiceError::UpstreamFormat(format!("response is not a flashcard batch: {err}"))
    })?;
    if items.is_empty() {
        return Err(ServiceError::UpstreamFormat(
            "response contained no flashcards".into(),
        ));
    }
    for (index, item) in items.iter().enumerate() {
        if item.front.trim().is_empty() || item.back.trim().is_empty() {
            return Err(ServiceError::UpstreamFormat(format!(
                "flashcard {index} has an empty side"
            )));
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_question_batch_parses() {
        let raw = r#"[
            {"question": "2 + 2?", "options": ["3", "4", "5", "6"], "correct_answer_index": 1},
            {"question": "3 * 3?", "options": ["6", "9", "12", "3"], "correct_answer_index": 1,
             "explanation": "three threes"}
        ]"#;
        let items = parse_question_batch(raw).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].explanation.as_deref(), Some("three threes"));
    }

    #[test]
    fn non_json_payload_is_rejected() {
        let err = parse_question_batch("Sure! Here are your questions:").unwrap_err();
        assert!(matches!(err, ServiceError::UpstreamFormat(_)));
    }

    #[test]
    fn one_bad_item_rejects_the_whole_batch() {
        // Second item's correct index is out of range; nothing is accepted.
        let raw = r#"[
            {"question": "2 + 2?", "options": ["3", "4"], "correct_answer_index": 1},
            {"question": "3 * 3?", "options": ["6", "9"], "correct_answer_index": 5}
        ]"#;
        assert!(matches!(
            parse_question_batch(raw).unwrap_err(),
            ServiceError::UpstreamFormat(_)
        ));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let raw = r#"[{"question": "2 + 2?", "options": ["3", "4"],
                       "correct_answer_index": 1, "hint": "even"}]"#;
        assert!(matches!(
            parse_question_batch(raw).unwrap_err(),
            ServiceError::UpstreamFormat(_)
        ));
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(matches!(
            parse_question_batch("[]").unwrap_err(),
            ServiceError::UpstreamFormat(_)
        ));
    }

    #[test]
    fn flashcard_batch_requires_both_sides() {
        let ok = r#"[{"front": "hola", "back": "hello"}]"#;
        assert_eq!(parse_flashcard_batch(ok).unwrap().len(), 1);

        let bad = r#"[{"front": "hola", "back": "  "}]"#;
        assert!(matches!(
            parse_flashcard_batch(bad).unwrap_err(),
            ServiceError::UpstreamFormat(_)
        ));
    }
}
