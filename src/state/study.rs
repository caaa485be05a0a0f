use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::dao::models::{
    DifficultyEntity, FlashcardEntity, QuestionEntity, QuestionSourceEntity, StudySessionEntity,
};
use crate::state::timer::TimerMode;

/// Origin of a question pool item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSource {
    /// Entered by hand.
    Manual,
    /// Produced by the content generation collaborator.
    Generated,
}

/// Difficulty tag attached to a flashcard.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Low effort card.
    Easy,
    /// Default difficulty.
    Medium,
    /// High effort card.
    Hard,
}

/// User-declared description of the session attached to a work phase.
///
/// Exclusively owned by the timer state machine once the phase starts;
/// consumed into a durable record on natural expiry, discarded on reset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudySessionDraft {
    /// Subject the session is booked against, if it still exists.
    pub subject_id: Option<Uuid>,
    /// Subject name denormalized into the eventual record.
    pub subject_name: String,
    /// Topic declared for the work phase.
    pub topic: String,
    /// Optional free-form notes.
    pub notes: Option<String>,
    /// Stamped by the machine when the work phase starts.
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
}

impl StudySessionDraft {
    /// Build a draft; `started_at` is overwritten when the work phase starts.
    pub fn new(
        subject_id: Option<Uuid>,
        subject_name: impl Into<String>,
        topic: impl Into<String>,
        notes: Option<String>,
    ) -> Self {
        Self {
            subject_id,
            subject_name: subject_name.into(),
            topic: topic.into(),
            notes,
            started_at: OffsetDateTime::UNIX_EPOCH,
        }
    }
}

/// Completed study session produced by a work phase that expired naturally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudySession {
    /// Freshly allocated record id.
    pub id: Uuid,
    /// Subject the session was booked against.
    pub subject_id: Option<Uuid>,
    /// Subject name at creation time.
    pub subject_name: String,
    /// Topic declared at start.
    pub topic: String,
    /// Rounded minutes between start and completion.
    pub duration_minutes: u32,
    /// Timer mode the session ran under.
    pub timer_mode: TimerMode,
    /// Start of the work phase.
    pub started_at: OffsetDateTime,
    /// Natural expiry of the work phase.
    pub completed_at: OffsetDateTime,
    /// Notes carried over from the draft.
    pub notes: Option<String>,
}

impl From<(StudySession, Uuid)> for StudySessionEntity {
    fn from((session, user_id): (StudySession, Uuid)) -> Self {
        Self {
            id: session.id,
            user_id,
            subject_id: session.subject_id,
            subject_name: session.subject_name,
            topic: session.topic,
            duration_minutes: session.duration_minutes,
            timer_mode: session.timer_mode.into(),
            started_at: session.started_at,
            completed_at: session.completed_at,
            notes: session.notes,
        }
    }
}

/// Runtime representation of a question pool item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Question {
    /// Stable identifier of the question.
    pub id: Uuid,
    /// Subject the question belongs to, if it still exists.
    pub subject_id: Option<Uuid>,
    /// Subject name at creation time.
    pub subject_name: String,
    /// Optional topic within the subject.
    pub topic: Option<String>,
    /// Question text.
    pub prompt: String,
    /// Ordered answer options (at least two).
    pub options: Vec<String>,
    /// Index of the correct option; always a valid index into `options`.
    pub correct_option_index: usize,
    /// Optional explanation revealed after answering.
    pub explanation: Option<String>,
    /// Whether the question has been answered at least once.
    pub answered: bool,
    /// Whether the most recent answer was correct.
    pub correct: bool,
    /// Where the question came from.
    pub source: QuestionSource,
}

/// Runtime representation of a flashcard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flashcard {
    /// Stable identifier of the card.
    pub id: Uuid,
    /// Subject name the card belongs to.
    pub subject: String,
    /// Front side shown first during review.
    pub front: String,
    /// Back side revealed on demand.
    pub back: String,
    /// Difficulty tag chosen at creation.
    pub difficulty: Difficulty,
    /// Total number of grades received.
    pub review_count: u32,
    /// Grades that were correct; never exceeds `review_count`.
    pub correct_count: u32,
    /// Timestamp of the most recent grade, if any.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_reviewed_at: Option<OffsetDateTime>,
}

/// Pool filter applied before exam sampling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionFilter {
    /// Subjects to keep; empty keeps every subject.
    pub subject_ids: Vec<Uuid>,
    /// Keep only questions never answered before.
    pub only_unanswered: bool,
}

impl QuestionFilter {
    /// Whether a pool item passes the filter.
    pub fn matches(&self, question: &Question) -> bool {
        if self.only_unanswered && question.answered {
            return false;
        }
        if self.subject_ids.is_empty() {
            return true;
        }
        question
            .subject_id
            .is_some_and(|id| self.subject_ids.contains(&id))
    }
}

impl From<QuestionSourceEntity> for QuestionSource {
    fn from(value: QuestionSourceEntity) -> Self {
        match value {
            QuestionSourceEntity::Manual => QuestionSource::Manual,
            QuestionSourceEntity::Generated => QuestionSource::Generated,
        }
    }
}

impl From<QuestionSource> for QuestionSourceEntity {
    fn from(value: QuestionSource) -> Self {
        match value {
            QuestionSource::Manual => QuestionSourceEntity::Manual,
            QuestionSource::Generated => QuestionSourceEntity::Generated,
        }
    }
}

impl From<DifficultyEntity> for Difficulty {
    fn from(value: DifficultyEntity) -> Self {
        match value {
            DifficultyEntity::Easy => Difficulty::Easy,
            DifficultyEntity::Medium => Difficulty::Medium,
            DifficultyEntity::Hard => Difficulty::Hard,
        }
    }
}

impl From<Difficulty> for DifficultyEntity {
    fn from(value: Difficulty) -> Self {
        match value {
            Difficulty::Easy => DifficultyEntity::Easy,
            Difficulty::Medium => DifficultyEntity::Medium,
            Difficulty::Hard => DifficultyEntity::Hard,
        }
    }
}

impl From<QuestionEntity> for Question {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: value.id,
            subject_id: value.subject_id,
            subject_name: value.subject_name,
            topic: value.topic,
            prompt: value.prompt,
            options: value.options,
            correct_option_index: value.correct_option_index,
            explanation: value.explanation,
            answered: value.answered,
            correct: value.correct,
            source: value.source.into(),
        }
    }
}

impl From<(Question, Uuid)> for QuestionEntity {
    fn from((question, user_id): (Question, Uuid)) -> Self {
        Self {
            id: question.id,
            user_id,
            subject_id: question.subject_id,
            subject_name: question.subject_name,
            topic: question.topic,
            prompt: question.prompt,
            options: question.options,
            correct_option_index: question.correct_option_index,
            explanation: question.explanation,
            answered: question.answered,
            correct: question.correct,
            source: question.source.into(),
        }
    }
}

impl From<FlashcardEntity> for Flashcard {
    fn from(value: FlashcardEntity) -> Self {
        Self {
            id: value.id,
            subject: value.subject,
            front: value.front,
            back: value.back,
            difficulty: value.difficulty.into(),
            review_count: value.review_count,
            correct_count: value.correct_count,
            last_reviewed_at: value.last_reviewed_at,
        }
    }
}

impl From<(Flashcard, Uuid)> for FlashcardEntity {
    fn from((card, user_id): (Flashcard, Uuid)) -> Self {
        Self {
            id: card.id,
            user_id,
            subject: card.subject,
            front: card.front,
            back: card.back,
            difficulty: card.difficulty.into(),
            review_count: card.review_count,
            correct_count: card.correct_count,
            last_reviewed_at: card.last_reviewed_at,
        }
    }
}
