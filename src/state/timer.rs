use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::dao::models::{ActivityKind, TimerModeEntity};
use crate::state::study::{StudySession, StudySessionDraft};

/// Every how many completed work phases the long break kicks in.
pub const LONG_BREAK_EVERY: u32 = 4;

/// Cadence preset the timer runs under.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimerMode {
    /// Classic 25/5 cadence.
    Pomodoro,
    /// Extended 50/10 cadence.
    LongPomodoro,
    /// User supplied durations.
    Custom,
}

impl From<TimerMode> for TimerModeEntity {
    fn from(value: TimerMode) -> Self {
        match value {
            TimerMode::Pomodoro => TimerModeEntity::Pomodoro,
            TimerMode::LongPomodoro => TimerModeEntity::LongPomodoro,
            TimerMode::Custom => TimerModeEntity::Custom,
        }
    }
}

/// Phase durations the timer counts down against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerConfig {
    /// Preset the durations were derived from.
    pub mode: TimerMode,
    /// Work phase length in minutes.
    pub work_minutes: u32,
    /// Break phase length in minutes.
    pub break_minutes: u32,
    /// Long break length in minutes.
    pub long_break_minutes: u32,
    /// Completed work phases between long breaks.
    pub long_break_every: u32,
}

impl TimerConfig {
    /// Classic 25/5/15 preset.
    pub fn pomodoro() -> Self {
        Self {
            mode: TimerMode::Pomodoro,
            work_minutes: 25,
            break_minutes: 5,
            long_break_minutes: 15,
            long_break_every: LONG_BREAK_EVERY,
        }
    }

    /// Extended 50/10/30 preset.
    pub fn long_pomodoro() -> Self {
        Self {
            mode: TimerMode::LongPomodoro,
            work_minutes: 50,
            break_minutes: 10,
            long_break_minutes: 30,
            long_break_every: LONG_BREAK_EVERY,
        }
    }

    /// Custom durations; every length must be strictly positive.
    pub fn custom(
        work_minutes: u32,
        break_minutes: u32,
        long_break_minutes: u32,
    ) -> Result<Self, TimerError> {
        if work_minutes == 0 || break_minutes == 0 || long_break_minutes == 0 {
            return Err(TimerError::InvalidConfig(
                "timer minutes must be strictly positive".into(),
            ));
        }
        Ok(Self {
            mode: TimerMode::Custom,
            work_minutes,
            break_minutes,
            long_break_minutes,
            long_break_every: LONG_BREAK_EVERY,
        })
    }

    fn work_seconds(&self) -> u32 {
        self.work_minutes * 60
    }

    fn break_seconds(&self, long: bool) -> u32 {
        if long {
            self.long_break_minutes * 60
        } else {
            self.break_minutes * 60
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self::pomodoro()
    }
}

/// Phase the timer is currently in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    /// Nothing is running; the initial state and the target of every reset.
    Idle,
    /// Timed focus interval with an attached study-session draft.
    Work,
    /// Timed rest interval between work phases.
    Break,
}

/// Events that can be applied to the timer state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// Begin a work phase with a user-declared session draft.
    Start(StudySessionDraft),
    /// One second of clock time elapsed. Always accepted; a no-op unless
    /// the countdown is running, which is what makes a tick arriving after
    /// a reset harmless.
    Tick,
    /// Stop the countdown without losing phase or remaining seconds.
    Pause,
    /// Resume a paused countdown.
    Resume,
    /// Discard the draft and runtime state unconditionally.
    Reset,
    /// Swap the active config and force the machine back to idle.
    ChangeMode(TimerConfig),
}

/// Side effects requested by a transition, executed by the caller in order.
///
/// Keeping effects out of the machine keeps it pure: persistence and points
/// can fail without rolling back the phase transition that produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerEffect {
    /// Append the completed session to the durable store.
    PersistSession(StudySession),
    /// Emit a point-valued activity event (fire-and-forget).
    AwardPoints {
        /// Domain event the points are for.
        activity: ActivityKind,
        /// Points awarded.
        points: i64,
        /// Event-specific payload.
        metadata: serde_json::Value,
    },
    /// Mirror the full machine tuple to the draft store for crash recovery.
    MirrorState,
    /// Drop the mirrored tuple from the draft store.
    ClearMirror,
}

/// Errors returned when an event cannot be applied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TimerError {
    /// The supplied session draft is missing required fields.
    #[error("invalid session draft: {0}")]
    InvalidDraft(String),
    /// The supplied config contains non-positive durations.
    #[error("invalid timer config: {0}")]
    InvalidConfig(String),
    /// The event cannot be applied in the current phase.
    #[error("cannot apply `{event}` while in {phase:?}")]
    InvalidTransition {
        /// Phase the machine was in.
        phase: TimerPhase,
        /// Name of the rejected event.
        event: &'static str,
    },
}

/// Read-only view of the machine published to the host UI after each event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerSnapshot {
    /// Current phase.
    pub phase: TimerPhase,
    /// Whether the countdown is decrementing.
    pub running: bool,
    /// Seconds left in the current phase.
    pub seconds_remaining: u32,
    /// Work phases completed since the machine was constructed.
    pub sessions_completed_today: u32,
    /// Topic of the attached draft, if any.
    pub topic: Option<String>,
    /// Subject of the attached draft, if any.
    pub subject_name: Option<String>,
}

impl Default for TimerSnapshot {
    fn default() -> Self {
        Self {
            phase: TimerPhase::Idle,
            running: false,
            seconds_remaining: TimerConfig::default().work_seconds(),
            sessions_completed_today: 0,
            topic: None,
            subject_name: None,
        }
    }
}

/// Durable mirror of the full machine tuple, written on every running tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerMirror {
    /// Active config at mirror time.
    pub config: TimerConfig,
    /// Phase at mirror time.
    pub phase: TimerPhase,
    /// Whether the countdown was running.
    pub running: bool,
    /// Seconds left in the current phase.
    pub seconds_remaining: u32,
    /// Work phases completed so far today.
    pub sessions_completed_today: u32,
    /// In-flight session draft, if a work phase was active.
    pub draft: Option<StudySessionDraft>,
    /// When the mirror was written; kept for hosts that want to display the
    /// gap, never used to adjust the countdown.
    #[serde(with = "time::serde::rfc3339")]
    pub mirrored_at: OffsetDateTime,
}

/// Pomodoro-style timer combined with the study-session lifecycle.
///
/// Transitions are synchronous and pure; side effects come back as a
/// [`TimerEffect`] list for the caller to execute.
#[derive(Debug, Clone)]
pub struct TimerStateMachine {
    config: TimerConfig,
    hourly_rate: u32,
    phase: TimerPhase,
    running: bool,
    seconds_remaining: u32,
    sessions_completed_today: u32,
    draft: Option<StudySessionDraft>,
}

impl TimerStateMachine {
    /// Create an idle machine with the given config and hourly point rate.
    pub fn new(config: TimerConfig, hourly_rate: u32) -> Self {
        Self {
            config,
            hourly_rate,
            phase: TimerPhase::Idle,
            running: false,
            seconds_remaining: config.work_seconds(),
            sessions_completed_today: 0,
            draft: None,
        }
    }

    /// Rebuild a machine from a mirrored tuple.
    ///
    /// The tuple is replayed verbatim: `seconds_remaining` is restored as
    /// written and the wall-clock time elapsed while the process was
    /// unloaded is not subtracted. Hosts that want reconciliation can
    /// compare `mirror.mirrored_at` themselves before calling this.
    pub fn restore(mirror: TimerMirror, hourly_rate: u32) -> Self {
        Self {
            config: mirror.config,
            hourly_rate,
            phase: mirror.phase,
            running: mirror.running,
            seconds_remaining: mirror.seconds_remaining,
            sessions_completed_today: mirror.sessions_completed_today,
            draft: mirror.draft,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> TimerPhase {
        self.phase
    }

    /// Whether the countdown is decrementing.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Seconds left in the current phase.
    pub fn seconds_remaining(&self) -> u32 {
        self.seconds_remaining
    }

    /// Work phases completed since construction.
    pub fn sessions_completed_today(&self) -> u32 {
        self.sessions_completed_today
    }

    /// Active config.
    pub fn config(&self) -> TimerConfig {
        self.config
    }

    /// In-flight draft, if a work phase is active.
    pub fn draft(&self) -> Option<&StudySessionDraft> {
        self.draft.as_ref()
    }

    /// Read-only view for the host UI.
    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            phase: self.phase,
            running: self.running,
            seconds_remaining: self.seconds_remaining,
            sessions_completed_today: self.sessions_completed_today,
            topic: self.draft.as_ref().map(|draft| draft.topic.clone()),
            subject_name: self.draft.as_ref().map(|draft| draft.subject_name.clone()),
        }
    }

    /// Mirror of the full tuple for the draft store.
    pub fn mirror(&self, now: OffsetDateTime) -> TimerMirror {
        TimerMirror {
            config: self.config,
            phase: self.phase,
            running: self.running,
            seconds_remaining: self.seconds_remaining,
            sessions_completed_today: self.sessions_completed_today,
            draft: self.draft.clone(),
            mirrored_at: now,
        }
    }

    /// Apply an event, returning the effects the caller must execute.
    pub fn apply(
        &mut self,
        event: TimerEvent,
        now: OffsetDateTime,
    ) -> Result<Vec<TimerEffect>, TimerError> {
        match event {
            TimerEvent::Start(draft) => self.start(draft, now),
            TimerEvent::Tick => Ok(self.tick(now)),
            TimerEvent::Pause => self.pause(),
            TimerEvent::Resume => self.resume(),
            TimerEvent::Reset => Ok(self.reset()),
            TimerEvent::ChangeMode(config) => self.change_mode(config),
        }
    }

    fn start(
        &mut self,
        mut draft: StudySessionDraft,
        now: OffsetDateTime,
    ) -> Result<Vec<TimerEffect>, TimerError> {
        let awaiting_draft =
            self.phase == TimerPhase::Work && !self.running && self.draft.is_none();
        if self.phase != TimerPhase::Idle && !awaiting_draft {
            return Err(TimerError::InvalidTransition {
                phase: self.phase,
                event: "start",
            });
        }

        if draft.subject_name.trim().is_empty() {
            return Err(TimerError::InvalidDraft("subject is required".into()));
        }
        let topic = draft.topic.trim();
        if topic.is_empty() {
            return Err(TimerError::InvalidDraft("topic must not be empty".into()));
        }
        draft.topic = topic.to_owned();
        draft.started_at = now;

        self.phase = TimerPhase::Work;
        self.running = true;
        self.seconds_remaining = self.config.work_seconds();
        self.draft = Some(draft);

        Ok(vec![TimerEffect::MirrorState])
    }

    fn tick(&mut self, now: OffsetDateTime) -> Vec<TimerEffect> {
        if !self.running || self.phase == TimerPhase::Idle {
            return Vec::new();
        }

        self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
        if self.seconds_remaining > 0 {
            return vec![TimerEffect::MirrorState];
        }

        match self.phase {
            TimerPhase::Work => self.expire_work(now),
            TimerPhase::Break => self.expire_break(),
            TimerPhase::Idle => Vec::new(),
        }
    }

    fn expire_work(&mut self, now: OffsetDateTime) -> Vec<TimerEffect> {
        self.sessions_completed_today += 1;
        let long = self.sessions_completed_today % self.config.long_break_every == 0;
        self.phase = TimerPhase::Break;
        self.running = true;
        self.seconds_remaining = self.config.break_seconds(long);

        let Some(draft) = self.draft.take() else {
            return vec![TimerEffect::ClearMirror];
        };

        let elapsed_seconds = (now - draft.started_at).whole_seconds().max(0) as u64;
        let duration_minutes = ((elapsed_seconds + 30) / 60) as u32;
        let session = StudySession {
            id: Uuid::new_v4(),
            subject_id: draft.subject_id,
            subject_name: draft.subject_name,
            topic: draft.topic,
            duration_minutes,
            timer_mode: self.config.mode,
            started_at: draft.started_at,
            completed_at: now,
            notes: draft.notes,
        };

        let points =
            (f64::from(duration_minutes) / 60.0 * f64::from(self.hourly_rate)).round() as i64;
        let metadata = json!({
            "duration_minutes": duration_minutes,
            "subject": session.subject_name,
            "topic": session.topic,
        });

        vec![
            TimerEffect::PersistSession(session),
            TimerEffect::AwardPoints {
                activity: ActivityKind::StudySessionCompleted,
                points,
                metadata,
            },
            TimerEffect::ClearMirror,
        ]
    }

    fn expire_break(&mut self) -> Vec<TimerEffect> {
        // The previous draft was consumed on work expiry, so the next work
        // phase parks here until `start` supplies a fresh one.
        self.phase = TimerPhase::Work;
        self.running = false;
        self.seconds_remaining = self.config.work_seconds();
        Vec::new()
    }

    fn pause(&mut self) -> Result<Vec<TimerEffect>, TimerError> {
        if self.phase == TimerPhase::Idle || !self.running {
            return Err(TimerError::InvalidTransition {
                phase: self.phase,
                event: "pause",
            });
        }
        self.running = false;
        Ok(Vec::new())
    }

    fn resume(&mut self) -> Result<Vec<TimerEffect>, TimerError> {
        let resumable = match self.phase {
            TimerPhase::Idle => false,
            TimerPhase::Work => !self.running && self.draft.is_some(),
            TimerPhase::Break => !self.running,
        };
        if !resumable {
            return Err(TimerError::InvalidTransition {
                phase: self.phase,
                event: "resume",
            });
        }
        self.running = true;
        Ok(Vec::new())
    }

    fn reset(&mut self) -> Vec<TimerEffect> {
        // Partial sessions are not credited: no record, no points.
        self.phase = TimerPhase::Idle;
        self.running = false;
        self.seconds_remaining = self.config.work_seconds();
        self.draft = None;
        vec![TimerEffect::ClearMirror]
    }

    fn change_mode(&mut self, config: TimerConfig) -> Result<Vec<TimerEffect>, TimerError> {
        if config.work_minutes == 0 || config.break_minutes == 0 || config.long_break_minutes == 0 {
            return Err(TimerError::InvalidConfig(
                "timer minutes must be strictly positive".into(),
            ));
        }
        self.config = config;
        self.phase = TimerPhase::Idle;
        self.running = false;
        self.seconds_remaining = config.work_seconds();
        self.draft = None;
        Ok(vec![TimerEffect::ClearMirror])
    }
}
