use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::dao::models::{ActivityKind, ExamQuestionEntity, ExamSessionEntity};
use crate::state::study::{Question, QuestionFilter};

/// Coarse phase descriptor used in error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamPhaseKind {
    /// No exam has been started yet.
    NotStarted,
    /// An exam is in flight.
    InProgress,
    /// The exam has been scored; terminal for this session instance.
    Finished,
}

/// Phase of the exam state machine, carrying the session where one exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExamPhase {
    /// No exam has been started yet.
    NotStarted,
    /// An exam is in flight.
    InProgress(ExamSession),
    /// The exam has been scored.
    Finished(ExamSession),
}

impl ExamPhase {
    /// Coarse descriptor for error reporting.
    pub fn kind(&self) -> ExamPhaseKind {
        match self {
            ExamPhase::NotStarted => ExamPhaseKind::NotStarted,
            ExamPhase::InProgress(_) => ExamPhaseKind::InProgress,
            ExamPhase::Finished(_) => ExamPhaseKind::Finished,
        }
    }
}

/// Value snapshot of a pool question frozen into an exam.
///
/// Later pool mutation must not affect an in-flight exam, so the snapshot
/// copies everything it needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExamQuestion {
    /// Pool item this snapshot was taken from.
    pub question_id: Uuid,
    /// Question text at sampling time.
    pub prompt: String,
    /// Answer options at sampling time.
    pub options: Vec<String>,
    /// Index of the correct option.
    pub correct_option_index: usize,
    /// Optional explanation.
    pub explanation: Option<String>,
}

impl From<Question> for ExamQuestion {
    fn from(value: Question) -> Self {
        Self {
            question_id: value.id,
            prompt: value.prompt,
            options: value.options,
            correct_option_index: value.correct_option_index,
            explanation: value.explanation,
        }
    }
}

impl From<ExamQuestion> for ExamQuestionEntity {
    fn from(value: ExamQuestion) -> Self {
        Self {
            question_id: value.question_id,
            prompt: value.prompt,
            options: value.options,
            correct_option_index: value.correct_option_index,
            explanation: value.explanation,
        }
    }
}

/// An exam over a fixed-size ordered sample of the question pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamSession {
    /// Freshly allocated session id.
    pub id: Uuid,
    /// Display title chosen at start.
    pub title: String,
    /// Ordered value snapshot of the sampled questions.
    pub questions: Vec<ExamQuestion>,
    /// Selected option per question; `None` marks an unanswered item.
    /// Always the same length as `questions`.
    pub answers: Vec<Option<usize>>,
    /// When the exam was started.
    pub started_at: OffsetDateTime,
    /// Set once the exam is finished.
    pub finished_at: Option<OffsetDateTime>,
    /// Final percentage score; immutable once computed.
    pub score: Option<u8>,
}

impl ExamSession {
    /// Number of questions still unanswered.
    pub fn unanswered_count(&self) -> usize {
        self.answers.iter().filter(|answer| answer.is_none()).count()
    }

    /// Number of answers matching the correct option. Unanswered items
    /// contribute nothing regardless of the correct index.
    pub fn correct_count(&self) -> usize {
        self.questions
            .iter()
            .zip(&self.answers)
            .filter(|(question, answer)| **answer == Some(question.correct_option_index))
            .count()
    }
}

/// Parameters for starting an exam.
#[derive(Debug, Clone)]
pub struct ExamStart {
    /// Display title for the session.
    pub title: String,
    /// Pool filter applied before sampling.
    pub filter: QuestionFilter,
    /// Number of questions to sample.
    pub count: usize,
}

/// Side effects produced by finishing an exam, executed by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ExamEffect {
    /// Append the finished exam to the durable store.
    PersistExam(ExamSession),
    /// Flag the underlying pool item as answered with the exam outcome.
    MarkQuestion {
        /// Pool item to update.
        question_id: Uuid,
        /// Whether the exam answer matched the correct option.
        correct: bool,
    },
    /// Emit a point-valued activity event (fire-and-forget).
    AwardPoints {
        /// Domain event the points are for.
        activity: ActivityKind,
        /// Points awarded.
        points: i64,
        /// Event-specific payload.
        metadata: serde_json::Value,
    },
}

/// Errors returned when an exam event cannot be applied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExamError {
    /// The filtered pool is smaller than the requested sample.
    #[error("insufficient questions: requested {requested}, only {available} match the filter")]
    InsufficientQuestions {
        /// Questions asked for.
        requested: usize,
        /// Questions available after filtering.
        available: usize,
    },
    /// Finishing needs explicit confirmation while items are unanswered.
    #[error("{count} questions are still unanswered")]
    UnansweredQuestions {
        /// Number of unanswered items.
        count: usize,
    },
    /// The answer targeted a question outside the session.
    #[error("question index {index} is out of range for {len} questions")]
    QuestionIndexOutOfRange {
        /// Index supplied by the caller.
        index: usize,
        /// Number of questions in the session.
        len: usize,
    },
    /// The selected option does not exist on the question.
    #[error("option {option} is out of range for {len} options")]
    InvalidOption {
        /// Option supplied by the caller.
        option: usize,
        /// Number of options on the question.
        len: usize,
    },
    /// The event cannot be applied in the current phase.
    #[error("cannot apply `{event}` while {state:?}")]
    InvalidTransition {
        /// Phase the machine was in.
        state: ExamPhaseKind,
        /// Name of the rejected event.
        event: &'static str,
    },
}

/// State machine driving a single exam at a time.
#[derive(Debug, Clone)]
pub struct ExamStateMachine {
    phase: ExamPhase,
    finish_points: u32,
}

impl ExamStateMachine {
    /// Create a machine with the flat point award for finishing an exam.
    pub fn new(finish_points: u32) -> Self {
        Self {
            phase: ExamPhase::NotStarted,
            finish_points,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> &ExamPhase {
        &self.phase
    }

    /// The in-flight or finished session, if any.
    pub fn session(&self) -> Option<&ExamSession> {
        match &self.phase {
            ExamPhase::NotStarted => None,
            ExamPhase::InProgress(session) | ExamPhase::Finished(session) => Some(session),
        }
    }

    /// Sample the pool and start a new exam.
    ///
    /// Draws `count` items without replacement via a Fisher–Yates partial
    /// shuffle of the filtered indices and snapshots them by value.
    pub fn start<R: Rng + ?Sized>(
        &mut self,
        request: ExamStart,
        pool: &[Question],
        rng: &mut R,
        now: OffsetDateTime,
    ) -> Result<ExamSession, ExamError> {
        if matches!(self.phase, ExamPhase::InProgress(_)) {
            return Err(ExamError::InvalidTransition {
                state: self.phase.kind(),
                event: "start",
            });
        }

        let filtered: Vec<Question> = pool
            .iter()
            .filter(|question| request.filter.matches(question))
            .cloned()
            .collect();
        if request.count == 0 || filtered.len() < request.count {
            return Err(ExamError::InsufficientQuestions {
                requested: request.count,
                available: filtered.len(),
            });
        }

        let mut indices: Vec<usize> = (0..filtered.len()).collect();
        let (sampled, _) = indices.partial_shuffle(rng, request.count);
        let questions: Vec<ExamQuestion> = sampled
            .iter()
            .map(|&index| filtered[index].clone().into())
            .collect();
        let answers = vec![None; questions.len()];

        let session = ExamSession {
            id: Uuid::new_v4(),
            title: request.title,
            questions,
            answers,
            started_at: now,
            finished_at: None,
            score: None,
        };
        self.phase = ExamPhase::InProgress(session.clone());
        Ok(session)
    }

    /// Record (or overwrite) the answer for a question. Navigation is
    /// non-linear, so any index inside the session is valid at any time.
    pub fn answer(&mut self, index: usize, option: usize) -> Result<(), ExamError> {
        let ExamPhase::InProgress(session) = &mut self.phase else {
            return Err(ExamError::InvalidTransition {
                state: self.phase.kind(),
                event: "answer",
            });
        };

        let len = session.questions.len();
        if index >= len {
            return Err(ExamError::QuestionIndexOutOfRange { index, len });
        }
        let options = session.questions[index].options.len();
        if option >= options {
            return Err(ExamError::InvalidOption {
                option,
                len: options,
            });
        }

        session.answers[index] = Some(option);
        Ok(())
    }

    /// Score the exam and transition to the terminal phase.
    ///
    /// With unanswered items this refuses unless `acknowledge_unanswered`
    /// is set (the caller's soft-confirm); unanswered items then count as
    /// incorrect.
    pub fn finish(
        &mut self,
        now: OffsetDateTime,
        acknowledge_unanswered: bool,
    ) -> Result<Vec<ExamEffect>, ExamError> {
        let ExamPhase::InProgress(session) = &mut self.phase else {
            return Err(ExamError::InvalidTransition {
                state: self.phase.kind(),
                event: "finish",
            });
        };

        let unanswered = session.unanswered_count();
        if unanswered > 0 && !acknowledge_unanswered {
            return Err(ExamError::UnansweredQuestions { count: unanswered });
        }

        let total = session.questions.len();
        let correct = session.correct_count();
        let score = (100.0 * correct as f64 / total as f64).round() as u8;
        session.score = Some(score);
        session.finished_at = Some(now);

        let finished = session.clone();
        let mut effects = Vec::with_capacity(finished.questions.len() + 2);
        effects.push(ExamEffect::PersistExam(finished.clone()));
        for (question, answer) in finished.questions.iter().zip(&finished.answers) {
            effects.push(ExamEffect::MarkQuestion {
                question_id: question.question_id,
                correct: *answer == Some(question.correct_option_index),
            });
        }
        effects.push(ExamEffect::AwardPoints {
            activity: ActivityKind::ExamFinished,
            points: i64::from(self.finish_points),
            metadata: json!({
                "score": score,
                "correct": correct,
                "total": total,
            }),
        });

        self.phase = ExamPhase::Finished(finished);
        Ok(effects)
    }

    /// Discard an in-flight exam without emitting any record.
    pub fn abandon(&mut self) -> Result<(), ExamError> {
        if !matches!(self.phase, ExamPhase::InProgress(_)) {
            return Err(ExamError::InvalidTransition {
                state: self.phase.kind(),
                event: "abandon",
            });
        }
        self.phase = ExamPhase::NotStarted;
        Ok(())
    }
}

/// Convert a finished session into its durable entity.
impl From<(ExamSession, Uuid)> for ExamSessionEntity {
    fn from((session, user_id): (ExamSession, Uuid)) -> Self {
        Self {
            id: session.id,
            user_id,
            title: session.title,
            questions: session.questions.into_iter().map(Into::into).collect(),
            answers: session.answers,
            started_at: session.started_at,
            finished_at: session.finished_at.unwrap_or(session.started_at),
            score: session.score.unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::study::QuestionSource;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;
    use time::macros::datetime;

    fn now() -> OffsetDateTime {
        datetime!(2026-08-07 14:00:00 UTC)
    }

    fn question(subject_id: Uuid, answered: bool) -> Question {
        Question {
            id: Uuid::new_v4(),
            subject_id: Some(subject_id),
            subject_name: "Physics".into(),
            topic: None,
            prompt: "Which way is down?".into(),
            options: vec!["up".into(), "down".into(), "left".into(), "right".into()],
            correct_option_index: 1,
            explanation: None,
            answered,
            correct: false,
            source: QuestionSource::Manual,
        }
    }

    fn pool_of(subject_id: Uuid, size: usize) -> Vec<Question> {
        (0..size).map(|_| question(subject_id, false)).collect()
    }

    fn start_request(subject_id: Uuid, count: usize) -> ExamStart {
        ExamStart {
            title: "midterm".into(),
            filter: QuestionFilter {
                subject_ids: vec![subject_id],
                only_unanswered: false,
            },
            count,
        }
    }

    fn started(pool: &[Question], subject_id: Uuid, count: usize) -> ExamStateMachine {
        let mut sm = ExamStateMachine::new(20);
        let mut rng = StdRng::seed_from_u64(7);
        sm.start(start_request(subject_id, count), pool, &mut rng, now())
            .unwrap();
        sm
    }

    #[test]
    fn sampling_draws_unique_questions_from_the_pool() {
        let subject = Uuid::new_v4();
        let pool = pool_of(subject, 20);
        let sm = started(&pool, subject, 5);

        let session = sm.session().unwrap();
        assert_eq!(session.questions.len(), 5);
        assert_eq!(session.answers, vec![None; 5]);

        let pool_ids: HashSet<Uuid> = pool.iter().map(|q| q.id).collect();
        let sampled: HashSet<Uuid> = session.questions.iter().map(|q| q.question_id).collect();
        assert_eq!(sampled.len(), 5, "sampled ids must be unique");
        assert!(sampled.is_subset(&pool_ids));
    }

    #[test]
    fn sampling_whole_pool_draws_every_question() {
        let subject = Uuid::new_v4();
        let pool = pool_of(subject, 6);
        let sm = started(&pool, subject, 6);
        let sampled: HashSet<Uuid> = sm
            .session()
            .unwrap()
            .questions
            .iter()
            .map(|q| q.question_id)
            .collect();
        assert_eq!(sampled.len(), 6);
    }

    #[test]
    fn undersized_pool_rejects_start() {
        let subject = Uuid::new_v4();
        let pool = pool_of(subject, 3);
        let mut sm = ExamStateMachine::new(20);
        let mut rng = StdRng::seed_from_u64(7);
        let err = sm
            .start(start_request(subject, 5), &pool, &mut rng, now())
            .unwrap_err();
        assert_eq!(
            err,
            ExamError::InsufficientQuestions {
                requested: 5,
                available: 3
            }
        );
        assert_eq!(sm.phase().kind(), ExamPhaseKind::NotStarted);
    }

    #[test]
    fn only_unanswered_filter_shrinks_the_pool() {
        let subject = Uuid::new_v4();
        let mut pool = pool_of(subject, 4);
        pool[0].answered = true;
        pool[1].answered = true;

        let mut sm = ExamStateMachine::new(20);
        let mut rng = StdRng::seed_from_u64(7);
        let request = ExamStart {
            title: "retry".into(),
            filter: QuestionFilter {
                subject_ids: vec![subject],
                only_unanswered: true,
            },
            count: 3,
        };
        let err = sm.start(request, &pool, &mut rng, now()).unwrap_err();
        assert_eq!(
            err,
            ExamError::InsufficientQuestions {
                requested: 3,
                available: 2
            }
        );
    }

    #[test]
    fn snapshot_is_immune_to_later_pool_mutation() {
        let subject = Uuid::new_v4();
        let mut pool = pool_of(subject, 4);
        let sm = started(&pool, subject, 4);

        for question in &mut pool {
            question.prompt = "mutated".into();
        }
        assert!(
            sm.session()
                .unwrap()
                .questions
                .iter()
                .all(|q| q.prompt == "Which way is down?")
        );
    }

    #[test]
    fn answering_twice_overwrites_not_appends() {
        let subject = Uuid::new_v4();
        let pool = pool_of(subject, 4);
        let mut sm = started(&pool, subject, 4);

        sm.answer(2, 0).unwrap();
        sm.answer(2, 3).unwrap();
        let session = sm.session().unwrap();
        assert_eq!(session.answers[2], Some(3));
        assert_eq!(session.answers.len(), 4);
    }

    #[test]
    fn answer_rejects_out_of_range_indices() {
        let subject = Uuid::new_v4();
        let pool = pool_of(subject, 4);
        let mut sm = started(&pool, subject, 4);

        assert_eq!(
            sm.answer(9, 0),
            Err(ExamError::QuestionIndexOutOfRange { index: 9, len: 4 })
        );
        assert_eq!(
            sm.answer(0, 9),
            Err(ExamError::InvalidOption { option: 9, len: 4 })
        );
    }

    #[test]
    fn finish_with_unanswered_needs_acknowledgement() {
        let subject = Uuid::new_v4();
        let pool = pool_of(subject, 4);
        let mut sm = started(&pool, subject, 4);
        sm.answer(0, 1).unwrap();

        let err = sm.finish(now(), false).unwrap_err();
        assert_eq!(err, ExamError::UnansweredQuestions { count: 3 });
        assert_eq!(sm.phase().kind(), ExamPhaseKind::InProgress);

        sm.finish(now(), true).unwrap();
        assert_eq!(sm.phase().kind(), ExamPhaseKind::Finished);
    }

    #[test]
    fn unanswered_items_count_as_incorrect() {
        let subject = Uuid::new_v4();
        let pool = pool_of(subject, 4);
        let mut sm = started(&pool, subject, 4);
        // Two right, one wrong, one unanswered.
        sm.answer(0, 1).unwrap();
        sm.answer(1, 1).unwrap();
        sm.answer(2, 0).unwrap();
        sm.finish(now(), true).unwrap();

        let session = sm.session().unwrap();
        assert_eq!(session.correct_count(), 2);
        assert_eq!(session.score, Some(50));
    }

    #[test]
    fn score_rounds_the_percentage() {
        let subject = Uuid::new_v4();
        let pool = pool_of(subject, 3);
        let mut sm = started(&pool, subject, 3);
        sm.answer(0, 1).unwrap();
        sm.answer(1, 0).unwrap();
        sm.answer(2, 0).unwrap();
        sm.finish(now(), false).unwrap();
        // 1 of 3 correct rounds to 33.
        assert_eq!(sm.session().unwrap().score, Some(33));
    }

    #[test]
    fn finish_marks_every_sampled_question_with_its_outcome() {
        let subject = Uuid::new_v4();
        let pool = pool_of(subject, 4);
        let mut sm = started(&pool, subject, 4);
        for index in 0..4 {
            sm.answer(index, 1).unwrap();
        }
        let effects = sm.finish(now(), false).unwrap();

        let marks: Vec<_> = effects
            .iter()
            .filter(|effect| matches!(effect, ExamEffect::MarkQuestion { .. }))
            .collect();
        assert_eq!(marks.len(), 4);
        assert!(marks.iter().all(|effect| matches!(
            effect,
            ExamEffect::MarkQuestion { correct: true, .. }
        )));
        assert!(
            effects
                .iter()
                .any(|effect| matches!(effect, ExamEffect::PersistExam(_)))
        );
        assert!(effects.iter().any(|effect| matches!(
            effect,
            ExamEffect::AwardPoints { points: 20, .. }
        )));
    }

    #[test]
    fn starting_over_an_in_flight_exam_is_rejected() {
        let subject = Uuid::new_v4();
        let pool = pool_of(subject, 4);
        let mut sm = started(&pool, subject, 4);
        let mut rng = StdRng::seed_from_u64(1);
        let err = sm
            .start(start_request(subject, 2), &pool, &mut rng, now())
            .unwrap_err();
        assert!(matches!(err, ExamError::InvalidTransition { event: "start", .. }));
    }

    #[test]
    fn abandon_discards_the_session_without_a_record() {
        let subject = Uuid::new_v4();
        let pool = pool_of(subject, 4);
        let mut sm = started(&pool, subject, 4);
        sm.abandon().unwrap();
        assert_eq!(sm.phase().kind(), ExamPhaseKind::NotStarted);
        assert!(sm.session().is_none());
    }
}
