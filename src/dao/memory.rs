use std::io;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    ActivityEventEntity, ExamSessionEntity, FlashcardEntity, QuestionEntity, StudySessionEntity,
};
use crate::dao::storage::{StorageError, StorageResult};
use crate::dao::study_store::StudyStore;

/// In-memory [`StudyStore`] backend.
///
/// Used by the test suites and as a stand-in while no real backend is
/// installed. The `set_unavailable` switch makes every operation fail so
/// outage handling can be exercised deterministically.
#[derive(Default)]
pub struct MemoryStudyStore {
    sessions: DashMap<Uuid, StudySessionEntity>,
    exams: DashMap<Uuid, ExamSessionEntity>,
    cards: DashMap<Uuid, FlashcardEntity>,
    questions: DashMap<Uuid, QuestionEntity>,
    activity: Mutex<Vec<ActivityEventEntity>>,
    memberships: DashMap<Uuid, Vec<Uuid>>,
    unavailable: AtomicBool,
}

impl MemoryStudyStore {
    /// Create an empty, healthy store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle simulated outage mode.
    pub fn set_unavailable(&self, value: bool) {
        self.unavailable.store(value, Ordering::SeqCst);
    }

    /// Register the groups a user belongs to.
    pub fn set_memberships(&self, user_id: Uuid, group_ids: Vec<Uuid>) {
        self.memberships.insert(user_id, group_ids);
    }

    /// Snapshot of every persisted study session record.
    pub fn study_sessions(&self) -> Vec<StudySessionEntity> {
        self.sessions.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Snapshot of every persisted exam session record.
    pub fn exam_sessions(&self) -> Vec<ExamSessionEntity> {
        self.exams.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Snapshot of every activity event row in emission order.
    pub fn activity_events(&self) -> Vec<ActivityEventEntity> {
        self.activity.lock().expect("activity mutex poisoned").clone()
    }

    /// Look up a single question by id.
    pub fn question(&self, id: Uuid) -> Option<QuestionEntity> {
        self.questions.get(&id).map(|entry| entry.value().clone())
    }

    /// Look up a single flashcard by id.
    pub fn flashcard(&self, id: Uuid) -> Option<FlashcardEntity> {
        self.cards.get(&id).map(|entry| entry.value().clone())
    }

    fn guard(&self) -> StorageResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "memory store switched unavailable".into(),
                io::Error::new(io::ErrorKind::NotConnected, "simulated outage"),
            ));
        }
        Ok(())
    }
}

impl StudyStore for MemoryStudyStore {
    fn insert_study_session(
        &self,
        session: StudySessionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.guard().map(|()| {
            self.sessions.insert(session.id, session);
        });
        futures::future::ready(result).boxed()
    }

    fn insert_exam_session(
        &self,
        exam: ExamSessionEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.guard().map(|()| {
            self.exams.insert(exam.id, exam);
        });
        futures::future::ready(result).boxed()
    }

    fn upsert_flashcard(&self, card: FlashcardEntity) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.guard().map(|()| {
            self.cards.insert(card.id, card);
        });
        futures::future::ready(result).boxed()
    }

    fn list_flashcards(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<FlashcardEntity>>> {
        let result = self.guard().map(|()| {
            self.cards
                .iter()
                .filter(|entry| entry.value().user_id == user_id)
                .map(|entry| entry.value().clone())
                .collect()
        });
        futures::future::ready(result).boxed()
    }

    fn upsert_question(&self, question: QuestionEntity) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.guard().map(|()| {
            self.questions.insert(question.id, question);
        });
        futures::future::ready(result).boxed()
    }

    fn list_questions(
        &self,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let result = self.guard().map(|()| {
            self.questions
                .iter()
                .filter(|entry| entry.value().user_id == user_id)
                .map(|entry| entry.value().clone())
                .collect()
        });
        futures::future::ready(result).boxed()
    }

    fn delete_question(&self, user_id: Uuid, id: Uuid) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.guard().and_then(|()| {
            match self.questions.get(&id) {
                Some(entry) if entry.value().user_id != user_id => {
                    return Err(StorageError::rejected("question owned by another user"));
                }
                _ => {}
            }
            self.questions.remove(&id);
            Ok(())
        });
        futures::future::ready(result).boxed()
    }

    fn insert_activity_event(
        &self,
        event: ActivityEventEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.guard().map(|()| {
            self.activity
                .lock()
                .expect("activity mutex poisoned")
                .push(event);
        });
        futures::future::ready(result).boxed()
    }

    fn list_group_ids(&self, user_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<Uuid>>> {
        let result = self.guard().map(|()| {
            self.memberships
                .get(&user_id)
                .map(|entry| entry.value().clone())
                .unwrap_or_default()
        });
        futures::future::ready(result).boxed()
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        futures::future::ready(self.guard()).boxed()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        futures::future::ready(self.guard()).boxed()
    }
}
