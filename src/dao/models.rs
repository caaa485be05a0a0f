use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use time::OffsetDateTime;
use uuid::Uuid;

/// Timer mode recorded alongside a completed study session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimerModeEntity {
    /// Classic 25/5 cadence.
    Pomodoro,
    /// Extended 50/10 cadence.
    LongPomodoro,
    /// User supplied durations.
    Custom,
}

/// Completed study session persisted by the storage layer. Append-only.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudySessionEntity {
    /// Primary key of the session record.
    pub id: Uuid,
    /// Owner of the record.
    pub user_id: Uuid,
    /// Subject the session was booked against; null once the subject is deleted.
    #[serde(default)]
    pub subject_id: Option<Uuid>,
    /// Subject name denormalized at creation time, immutable thereafter.
    pub subject_name: String,
    /// Topic declared when the work phase started.
    pub topic: String,
    /// Rounded minutes between start and completion.
    pub duration_minutes: u32,
    /// Timer mode the session ran under.
    pub timer_mode: TimerModeEntity,
    /// Start of the work phase.
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    /// Natural expiry of the work phase.
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
    /// Free-form notes attached to the session, if any.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Origin of a question pool item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSourceEntity {
    /// Entered by hand.
    Manual,
    /// Produced by the content generation collaborator.
    Generated,
}

/// Question pool item persisted by the storage layer.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Primary key of the question.
    pub id: Uuid,
    /// Owner of the question.
    pub user_id: Uuid,
    /// Subject the question belongs to; null once the subject is deleted.
    #[serde(default)]
    pub subject_id: Option<Uuid>,
    /// Subject name denormalized at creation time.
    pub subject_name: String,
    /// Optional topic within the subject.
    #[serde(default)]
    pub topic: Option<String>,
    /// Question text shown to the user.
    pub prompt: String,
    /// Ordered answer options (at least two).
    pub options: Vec<String>,
    /// Index of the correct option; always a valid index into `options`.
    pub correct_option_index: usize,
    /// Optional explanation revealed after answering.
    #[serde(default)]
    pub explanation: Option<String>,
    /// Whether the question has been answered at least once.
    pub answered: bool,
    /// Whether the most recent answer was correct.
    pub correct: bool,
    /// Where the question came from.
    pub source: QuestionSourceEntity,
}

/// Snapshot of a single question frozen into a finished exam record.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExamQuestionEntity {
    /// Identifier of the pool item this snapshot was taken from.
    pub question_id: Uuid,
    /// Question text at sampling time.
    pub prompt: String,
    /// Answer options at sampling time.
    pub options: Vec<String>,
    /// Index of the correct option.
    pub correct_option_index: usize,
    /// Optional explanation.
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Finished exam session persisted by the storage layer. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExamSessionEntity {
    /// Primary key of the exam record.
    pub id: Uuid,
    /// Owner of the record.
    pub user_id: Uuid,
    /// Display title chosen for the exam.
    pub title: String,
    /// Ordered snapshot of the sampled questions.
    pub questions: Vec<ExamQuestionEntity>,
    /// Selected option per question; `None` marks an unanswered item.
    pub answers: Vec<Option<usize>>,
    /// When the exam was started.
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    /// When the exam was finished.
    #[serde(with = "time::serde::rfc3339")]
    pub finished_at: OffsetDateTime,
    /// Final percentage score, rounded half-up.
    pub score: u8,
}

/// Difficulty tag attached to a flashcard.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyEntity {
    /// Low effort card.
    Easy,
    /// Default difficulty.
    Medium,
    /// High effort card.
    Hard,
}

/// Flashcard persisted by the storage layer, overwritten in place by id.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlashcardEntity {
    /// Primary key of the card.
    pub id: Uuid,
    /// Owner of the card.
    pub user_id: Uuid,
    /// Subject name the card belongs to.
    pub subject: String,
    /// Front side shown first during review.
    pub front: String,
    /// Back side revealed on demand.
    pub back: String,
    /// Difficulty tag chosen at creation.
    pub difficulty: DifficultyEntity,
    /// Total number of times the card has been graded.
    pub review_count: u32,
    /// Number of times the card was graded correct; never exceeds `review_count`.
    pub correct_count: u32,
    /// Timestamp of the most recent grade, if any.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub last_reviewed_at: Option<OffsetDateTime>,
}

/// Kind of domain event translated into points.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    /// A work phase ran to natural expiry.
    StudySessionCompleted,
    /// An exam was finished and scored.
    ExamFinished,
    /// A flashcard was graded during review.
    CardReviewed,
    /// A pool question was answered outside exam mode.
    QuestionAnswered,
}

/// Point-valued activity row, one per group membership at emission time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEventEntity {
    /// User the points belong to.
    pub user_id: Uuid,
    /// Group the row is fanned out to.
    pub group_id: Uuid,
    /// Domain event the points were earned for.
    pub activity: ActivityKind,
    /// Points awarded for the event.
    pub points: i64,
    /// Event-specific payload (duration, score, card id, ...).
    pub metadata: serde_json::Value,
    /// Emission timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
