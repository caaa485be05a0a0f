use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    ActivityEventEntity, ExamSessionEntity, FlashcardEntity, QuestionEntity, StudySessionEntity,
};
use crate::dao::storage::StorageResult;

/// Abstraction over the durable persistence collaborator.
///
/// One method per operation the core consumes; row ownership is enforced by
/// the backend, so every read takes the owning `user_id` explicitly.
pub trait StudyStore: Send + Sync {
    /// Append a completed study session record.
    fn insert_study_session(
        &self,
        session: StudySessionEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Append a finished exam session record.
    fn insert_exam_session(&self, exam: ExamSessionEntity)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Insert or overwrite a flashcard by id.
    fn upsert_flashcard(&self, card: FlashcardEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// List every flashcard owned by the user.
    fn list_flashcards(&self, user_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<FlashcardEntity>>>;
    /// Insert or overwrite a question pool item by id.
    fn upsert_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// List every question pool item owned by the user.
    fn list_questions(&self, user_id: Uuid)
    -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;
    /// Delete a question pool item by id.
    fn delete_question(&self, user_id: Uuid, id: Uuid) -> BoxFuture<'static, StorageResult<()>>;
    /// Append one activity event row.
    fn insert_activity_event(
        &self,
        event: ActivityEventEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// List the ids of every group the user belongs to.
    fn list_group_ids(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<Uuid>>>;
    /// Cheap liveness probe used by the storage supervisor.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish a dropped connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
