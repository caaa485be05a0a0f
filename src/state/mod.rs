//! Shared application state and the state machines it coordinates.

/// Exam/quiz session state machine.
pub mod exam;
/// Flashcard review loop.
pub mod review;
/// Runtime domain models shared across the machines.
pub mod study;
/// Timer & study-session state machine.
pub mod timer;

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::{RwLock, broadcast, watch};
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

use crate::auth::Identity;
use crate::config::{AppConfig, PointsConfig};
use crate::dao::study_store::StudyStore;
use crate::draft::DraftStore;
use crate::error::ServiceError;
use crate::state::exam::ExamStateMachine;
use crate::state::review::ReviewSession;
use crate::state::study::{Flashcard, Question};
use crate::state::timer::{TimerConfig, TimerSnapshot, TimerStateMachine};

/// Shared handle to the application state.
pub type SharedState = Arc<StudyState>;

/// Severity of a host-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational message.
    Info,
    /// Non-blocking warning (e.g. a durable write failed).
    Warning,
}

/// Non-blocking message surfaced to the host UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity of the notice.
    pub level: NoticeLevel,
    /// Human readable message.
    pub message: String,
}

impl Notice {
    /// Build an informational notice.
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    /// Build a warning notice.
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }
}

/// Central application state storing the machines, pools, and collaborator
/// handles.
///
/// All event sources (UI actions and clock ticks) are serialized through the
/// locks held here, so a tick acquiring the timer lock after a reset simply
/// observes an idle machine.
pub struct StudyState {
    config: AppConfig,
    store: RwLock<Option<Arc<dyn StudyStore>>>,
    degraded: watch::Sender<bool>,
    drafts: Arc<dyn DraftStore>,
    identity: RwLock<Option<Identity>>,
    timer: RwLock<TimerStateMachine>,
    exam: RwLock<ExamStateMachine>,
    review: RwLock<Option<ReviewSession>>,
    questions: RwLock<IndexMap<Uuid, Question>>,
    cards: RwLock<IndexMap<Uuid, Flashcard>>,
    timer_updates: watch::Sender<TimerSnapshot>,
    notices: broadcast::Sender<Notice>,
}

impl StudyState {
    /// Construct a new [`StudyState`] wrapped in an [`Arc`].
    ///
    /// The application starts in degraded mode until a storage backend is
    /// installed and signed out until the host installs an identity.
    pub fn new(config: AppConfig, drafts: Arc<dyn DraftStore>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        let (timer_tx, _rx) = watch::channel(TimerSnapshot::default());
        let (notice_tx, _rx) = broadcast::channel(32);
        let timer =
            TimerStateMachine::new(TimerConfig::default(), config.points.hourly_study_rate);
        let exam = ExamStateMachine::new(config.points.exam_finished);

        Arc::new(Self {
            config,
            store: RwLock::new(None),
            degraded: degraded_tx,
            drafts,
            identity: RwLock::new(None),
            timer: RwLock::new(timer),
            exam: RwLock::new(exam),
            review: RwLock::new(None),
            questions: RwLock::new(IndexMap::new()),
            cards: RwLock::new(IndexMap::new()),
            timer_updates: timer_tx,
            notices: notice_tx,
        })
    }

    /// Point rates from the loaded configuration.
    pub fn points(&self) -> &PointsConfig {
        &self.config.points
    }

    /// Obtain a handle to the current durable store, if one is installed.
    pub async fn study_store(&self) -> Option<Arc<dyn StudyStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Install a durable store implementation and leave degraded mode.
    pub async fn install_study_store(&self, store: Arc<dyn StudyStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current durable store and enter degraded mode.
    pub async fn clear_study_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        if self.is_degraded().await == value {
            return;
        }
        let _ = self.degraded.send(value);
    }

    /// Draft store injected at construction.
    pub fn drafts(&self) -> &dyn DraftStore {
        self.drafts.as_ref()
    }

    /// Install the signed-in identity.
    pub async fn sign_in(&self, identity: Identity) {
        let mut guard = self.identity.write().await;
        *guard = Some(identity);
    }

    /// Clear the signed-in identity.
    pub async fn sign_out(&self) {
        let mut guard = self.identity.write().await;
        guard.take();
    }

    /// Currently signed-in identity, if any.
    pub async fn identity(&self) -> Option<Identity> {
        *self.identity.read().await
    }

    /// Signed-in identity, or the error every durable operation returns
    /// before touching the network.
    pub async fn require_identity(&self) -> Result<Identity, ServiceError> {
        self.identity()
            .await
            .ok_or_else(|| ServiceError::Unauthorized("no identity installed".into()))
    }

    /// Timer state machine guarded by its lock.
    pub fn timer(&self) -> &RwLock<TimerStateMachine> {
        &self.timer
    }

    /// Exam state machine guarded by its lock.
    pub fn exam(&self) -> &RwLock<ExamStateMachine> {
        &self.exam
    }

    /// Active review session slot guarded by its lock.
    pub fn review(&self) -> &RwLock<Option<ReviewSession>> {
        &self.review
    }

    /// Question pool keyed by id, in insertion order.
    pub fn questions(&self) -> &RwLock<IndexMap<Uuid, Question>> {
        &self.questions
    }

    /// Flashcard collection keyed by id, in insertion order.
    pub fn cards(&self) -> &RwLock<IndexMap<Uuid, Flashcard>> {
        &self.cards
    }

    /// Publish a timer snapshot to every subscriber.
    pub fn publish_timer(&self, snapshot: TimerSnapshot) {
        // `send` drops the value (returns Err) when no receiver is currently
        // subscribed, leaving the channel holding a stale snapshot. A watch
        // channel is meant to retain the latest value regardless of
        // subscribers, so store it unconditionally.
        self.timer_updates.send_replace(snapshot);
    }

    /// Subscribe to timer snapshots.
    pub fn timer_updates(&self) -> watch::Receiver<TimerSnapshot> {
        self.timer_updates.subscribe()
    }

    /// Timer snapshots as an async stream for host UIs built on streams.
    pub fn timer_update_stream(&self) -> WatchStream<TimerSnapshot> {
        WatchStream::new(self.timer_updates.subscribe())
    }

    /// Surface a non-blocking notice to the host UI.
    pub fn notify(&self, notice: Notice) {
        let _ = self.notices.send(notice);
    }

    /// Subscribe to host-facing notices.
    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }
}
