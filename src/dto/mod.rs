//! Request payloads handed to the services by the host UI.

/// Custom validators shared by the payloads.
pub mod validation;

use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::dao::models::DifficultyEntity;
use crate::dto::validation::{validate_correct_index, validate_options, validate_topic};

/// Payload used to start a timed study session.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StartSessionRequest {
    /// Subject the session is booked against, if it still exists.
    pub subject_id: Option<Uuid>,
    /// Subject name denormalized into the eventual record.
    #[validate(length(min = 1, message = "subject name must not be empty"))]
    pub subject_name: String,
    /// Topic the user declares for the work phase.
    #[validate(custom(function = validate_topic))]
    pub topic: String,
    /// Optional free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Payload used to switch the timer into custom mode.
#[derive(Debug, Clone, Copy, Deserialize, Validate)]
pub struct CustomTimerRequest {
    /// Work phase length in minutes.
    #[validate(range(min = 1, max = 480, message = "work minutes out of range"))]
    pub work_minutes: u32,
    /// Break phase length in minutes.
    #[validate(range(min = 1, max = 120, message = "break minutes out of range"))]
    pub break_minutes: u32,
    /// Long break length in minutes.
    #[validate(range(min = 1, max = 180, message = "long break minutes out of range"))]
    pub long_break_minutes: u32,
}

/// Payload used to start an exam over the question pool.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StartExamRequest {
    /// Display title for the exam.
    #[validate(length(min = 1, message = "exam title must not be empty"))]
    pub title: String,
    /// Subjects the pool is filtered to; empty means every subject.
    #[serde(default)]
    pub subject_ids: Vec<Uuid>,
    /// Restrict sampling to questions never answered before.
    #[serde(default)]
    pub only_unanswered: bool,
    /// Number of questions to sample.
    #[validate(range(min = 1, max = 100, message = "question count out of range"))]
    pub count: u32,
}

/// Payload used to add a question to the pool by hand.
#[derive(Debug, Clone, Deserialize)]
pub struct NewQuestionRequest {
    /// Subject the question belongs to, if it still exists.
    pub subject_id: Option<Uuid>,
    /// Subject name denormalized into the pool item.
    pub subject_name: String,
    /// Optional topic within the subject.
    #[serde(default)]
    pub topic: Option<String>,
    /// Question text.
    pub prompt: String,
    /// Ordered answer options.
    pub options: Vec<String>,
    /// Index of the correct option.
    pub correct_option_index: usize,
    /// Optional explanation revealed after answering.
    #[serde(default)]
    pub explanation: Option<String>,
}

impl Validate for NewQuestionRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.subject_name.trim().is_empty() {
            let mut err = validator::ValidationError::new("subject_empty");
            err.message = Some("subject name must not be empty".into());
            errors.add("subject_name", err);
        }

        if self.prompt.trim().is_empty() {
            let mut err = validator::ValidationError::new("prompt_empty");
            err.message = Some("question text must not be empty".into());
            errors.add("prompt", err);
        }

        if let Err(err) = validate_options(&self.options) {
            errors.add("options", err);
        } else if let Err(err) = validate_correct_index(self.correct_option_index, &self.options) {
            errors.add("correct_option_index", err);
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload used to add a flashcard by hand.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewFlashcardRequest {
    /// Subject name the card belongs to.
    #[validate(length(min = 1, message = "subject must not be empty"))]
    pub subject: String,
    /// Front side of the card.
    #[validate(length(min = 1, message = "card front must not be empty"))]
    pub front: String,
    /// Back side of the card.
    #[validate(length(min = 1, message = "card back must not be empty"))]
    pub back: String,
    /// Difficulty tag.
    pub difficulty: DifficultyEntity,
}

/// Kind of content a generation request asks for.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GenerationKind {
    /// Multiple-choice questions for the exam pool.
    Questions,
    /// Front/back flashcards.
    Flashcards,
}

/// Payload handed to the AI generation collaborator.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct GenerationRequest {
    /// Raw text extracted from the user's document.
    #[validate(length(min = 1, message = "document text must not be empty"))]
    pub document_text: String,
    /// Subject the generated items are filed under.
    #[validate(length(min = 1, message = "subject must not be empty"))]
    pub subject_name: String,
    /// Number of items to generate.
    #[validate(range(min = 1, max = 50, message = "generation count out of range"))]
    pub count: u32,
    /// Whether to produce questions or flashcards.
    pub kind: GenerationKind,
}
