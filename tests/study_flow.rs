//! End-to-end flows over the in-memory store and draft store.

use std::sync::Arc;

use anyhow::Result;
use futures::FutureExt;
use futures::future::BoxFuture;
use uuid::Uuid;

use studydeck::auth::Identity;
use studydeck::config::AppConfig;
use studydeck::dao::memory::MemoryStudyStore;
use studydeck::dao::models::{ActivityKind, DifficultyEntity, TimerModeEntity};
use studydeck::draft::{CARD_COLLECTION_KEY, DraftStore, MemoryDraftStore, TIMER_MIRROR_KEY};
use studydeck::dto::{
    CustomTimerRequest, GenerationKind, GenerationRequest, NewFlashcardRequest, NewQuestionRequest,
    StartExamRequest, StartSessionRequest,
};
use studydeck::error::ServiceError;
use studydeck::services::generation::{self, ContentGenerator, GeneratorError};
use studydeck::services::{exam_service, pool_service, review_service, timer_service};
use studydeck::state::study::QuestionSource;
use studydeck::state::timer::TimerPhase;
use studydeck::state::{NoticeLevel, SharedState, StudyState};

struct Harness {
    state: SharedState,
    store: Arc<MemoryStudyStore>,
    drafts: Arc<MemoryDraftStore>,
    user: Uuid,
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn harness() -> Harness {
    init_tracing();
    let drafts = Arc::new(MemoryDraftStore::new());
    let state = StudyState::new(AppConfig::default(), drafts.clone());
    let store = Arc::new(MemoryStudyStore::new());
    state.install_study_store(store.clone()).await;
    let user = Uuid::new_v4();
    state.sign_in(Identity::premium(user)).await;
    Harness {
        state,
        store,
        drafts,
        user,
    }
}

fn session_request(topic: &str) -> StartSessionRequest {
    StartSessionRequest {
        subject_id: Some(Uuid::new_v4()),
        subject_name: "Calculus".into(),
        topic: topic.into(),
        notes: None,
    }
}

fn question_request(subject_id: Uuid, prompt: &str) -> NewQuestionRequest {
    NewQuestionRequest {
        subject_id: Some(subject_id),
        subject_name: "Physics".into(),
        topic: None,
        prompt: prompt.into(),
        options: vec!["up".into(), "down".into(), "left".into(), "right".into()],
        correct_option_index: 1,
        explanation: None,
    }
}

async fn run_out_one_minute_work(state: &SharedState) {
    timer_service::apply_custom_config(
        state,
        CustomTimerRequest {
            work_minutes: 1,
            break_minutes: 1,
            long_break_minutes: 2,
        },
    )
    .await
    .unwrap();
    timer_service::start_session(state, session_request("integrals"))
        .await
        .unwrap();
    for _ in 0..60 {
        timer_service::tick(state).await.unwrap();
    }
}

#[tokio::test]
async fn completed_work_phase_credits_exactly_one_session() -> Result<()> {
    let h = harness().await;
    let groups = vec![Uuid::new_v4(), Uuid::new_v4()];
    h.store.set_memberships(h.user, groups.clone());

    run_out_one_minute_work(&h.state).await;

    let sessions = h.store.study_sessions();
    assert_eq!(sessions.len(), 1);
    let session = &sessions[0];
    assert_eq!(session.user_id, h.user);
    assert_eq!(session.topic, "integrals");
    assert_eq!(session.timer_mode, TimerModeEntity::Custom);
    assert!(session.completed_at >= session.started_at);
    // The test clock runs the 60 ticks in well under a minute.
    assert!(session.duration_minutes <= 1);

    let events = h.store.activity_events();
    assert_eq!(events.len(), 2, "one activity row per group membership");
    for event in &events {
        assert_eq!(event.activity, ActivityKind::StudySessionCompleted);
        assert!(groups.contains(&event.group_id));
    }

    let snapshot = h.state.timer_updates().borrow().clone();
    assert_eq!(snapshot.phase, TimerPhase::Break);
    assert_eq!(snapshot.sessions_completed_today, 1);
    assert!(h.drafts.load(TIMER_MIRROR_KEY)?.is_none(), "mirror cleared");
    Ok(())
}

#[tokio::test]
async fn reset_mid_work_credits_nothing() -> Result<()> {
    let h = harness().await;
    h.store.set_memberships(h.user, vec![Uuid::new_v4()]);

    timer_service::start_session(&h.state, session_request("derivatives"))
        .await
        .unwrap();
    for _ in 0..10 {
        timer_service::tick(&h.state).await.unwrap();
    }
    timer_service::reset(&h.state).await.unwrap();

    assert!(h.store.study_sessions().is_empty());
    assert!(h.store.activity_events().is_empty());
    assert!(h.drafts.load(TIMER_MIRROR_KEY)?.is_none());

    // A straggler tick after the reset must not resurrect the session.
    let snapshot = timer_service::tick(&h.state).await.unwrap();
    assert_eq!(snapshot.phase, TimerPhase::Idle);
    assert_eq!(snapshot.seconds_remaining, 25 * 60);
    Ok(())
}

#[tokio::test]
async fn mirrored_session_resumes_verbatim_in_a_fresh_process() -> Result<()> {
    let h = harness().await;
    timer_service::start_session(&h.state, session_request("series"))
        .await
        .unwrap();
    for _ in 0..90 {
        timer_service::tick(&h.state).await.unwrap();
    }

    // A fresh state over the same draft store stands in for a reload.
    let reloaded = StudyState::new(AppConfig::default(), h.drafts.clone());
    let mirror = timer_service::resumable_session(&reloaded).expect("mirror offered");
    assert_eq!(mirror.seconds_remaining, 25 * 60 - 90);
    assert_eq!(mirror.draft.as_ref().map(|d| d.topic.as_str()), Some("series"));

    let snapshot = timer_service::resume_session(&reloaded, mirror.clone())
        .await
        .unwrap();
    // Replayed verbatim: elapsed unload time is not subtracted.
    assert_eq!(snapshot.phase, TimerPhase::Work);
    assert!(snapshot.running);
    assert_eq!(snapshot.seconds_remaining, mirror.seconds_remaining);
    assert_eq!(snapshot.topic.as_deref(), Some("series"));
    Ok(())
}

#[tokio::test]
async fn exam_flow_scores_and_marks_the_pool() -> Result<()> {
    let h = harness().await;
    h.store.set_memberships(h.user, vec![Uuid::new_v4()]);
    let subject = Uuid::new_v4();
    for i in 0..6 {
        pool_service::add_question(&h.state, question_request(subject, &format!("q{i}")))
            .await
            .unwrap();
    }

    let session = exam_service::start_exam(
        &h.state,
        StartExamRequest {
            title: "midterm".into(),
            subject_ids: vec![subject],
            only_unanswered: false,
            count: 4,
        },
    )
    .await
    .unwrap();
    assert_eq!(session.questions.len(), 4);
    assert_eq!(session.answers, vec![None; 4]);

    // Two right, one wrong (overwriting a first right answer), one blank.
    exam_service::answer(&h.state, 0, 1).await.unwrap();
    exam_service::answer(&h.state, 1, 1).await.unwrap();
    exam_service::answer(&h.state, 2, 1).await.unwrap();
    exam_service::answer(&h.state, 2, 0).await.unwrap();

    let err = exam_service::finish_exam(&h.state, false).await.unwrap_err();
    assert!(matches!(err, ServiceError::ConfirmationRequired(_)));

    let finished = exam_service::finish_exam(&h.state, true).await.unwrap();
    assert_eq!(finished.score, Some(50));

    let persisted = h.store.exam_sessions();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].score, 50);
    assert_eq!(persisted[0].user_id, h.user);

    // Every sampled pool item was marked with its outcome.
    let pool = h.state.questions().read().await;
    let marked = pool.values().filter(|q| q.answered).count();
    assert_eq!(marked, 4);
    drop(pool);

    let events = h.store.activity_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].activity, ActivityKind::ExamFinished);
    Ok(())
}

#[tokio::test]
async fn exam_score_survives_a_storage_outage() -> Result<()> {
    let h = harness().await;
    let subject = Uuid::new_v4();
    for i in 0..3 {
        pool_service::add_question(&h.state, question_request(subject, &format!("q{i}")))
            .await
            .unwrap();
    }
    let mut notices = h.state.notices();

    exam_service::start_exam(
        &h.state,
        StartExamRequest {
            title: "finals".into(),
            subject_ids: vec![subject],
            only_unanswered: false,
            count: 3,
        },
    )
    .await
    .unwrap();
    for index in 0..3 {
        exam_service::answer(&h.state, index, 1).await.unwrap();
    }

    h.store.set_unavailable(true);
    let finished = exam_service::finish_exam(&h.state, false).await.unwrap();

    // The in-memory score is still shown; persistence failed behind a warning.
    assert_eq!(finished.score, Some(100));
    assert!(h.store.exam_sessions().is_empty());
    let notice = notices.try_recv().expect("a warning notice was broadcast");
    assert_eq!(notice.level, NoticeLevel::Warning);
    Ok(())
}

#[tokio::test]
async fn undersized_pool_blocks_exam_start() -> Result<()> {
    let h = harness().await;
    let subject = Uuid::new_v4();
    pool_service::add_question(&h.state, question_request(subject, "lonely"))
        .await
        .unwrap();

    let err = exam_service::start_exam(
        &h.state,
        StartExamRequest {
            title: "too big".into(),
            subject_ids: vec![subject],
            only_unanswered: false,
            count: 5,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::InsufficientData(_)));
    Ok(())
}

#[tokio::test]
async fn review_grades_persist_immediately_and_stay_monotonic() -> Result<()> {
    let h = harness().await;
    let groups = vec![Uuid::new_v4(), Uuid::new_v4()];
    h.store.set_memberships(h.user, groups);

    for word in ["uno", "dos", "tres"] {
        pool_service::add_card(
            &h.state,
            NewFlashcardRequest {
                subject: "Spanish".into(),
                front: word.into(),
                back: format!("{word} (en)"),
                difficulty: DifficultyEntity::Easy,
            },
        )
        .await
        .unwrap();
    }

    let total = review_service::start_review(&h.state).await.unwrap();
    assert_eq!(total, 3);

    let mut graded = 0;
    while !review_service::is_finished(&h.state).await.unwrap() {
        let card = review_service::current_card(&h.state)
            .await
            .unwrap()
            .expect("a card is presented");
        review_service::reveal(&h.state).await.unwrap();
        review_service::grade(&h.state, graded % 2 == 0).await.unwrap();
        graded += 1;

        // Each grade is a durable write, no batching.
        let persisted = h.store.flashcard(card.id).expect("card upserted");
        assert_eq!(persisted.review_count, card.review_count + 1);
        assert!(persisted.correct_count <= persisted.review_count);
        assert!(persisted.last_reviewed_at.is_some());
    }
    assert_eq!(graded, 3);
    assert!(h.drafts.load(CARD_COLLECTION_KEY)?.is_some());

    let err = review_service::grade(&h.state, true).await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidState(_)));

    let review_events = h
        .store
        .activity_events()
        .into_iter()
        .filter(|event| event.activity == ActivityKind::CardReviewed)
        .count();
    assert_eq!(review_events, 3 * 2, "three grades fanned out to two groups");
    Ok(())
}

#[tokio::test]
async fn answering_outside_exam_mode_mutates_the_pool_item() -> Result<()> {
    let h = harness().await;
    let subject = Uuid::new_v4();
    let question = pool_service::add_question(&h.state, question_request(subject, "gravity"))
        .await
        .unwrap();

    let correct = pool_service::answer_question(&h.state, question.id, 0)
        .await
        .unwrap();
    assert!(!correct);

    let pool = h.state.questions().read().await;
    let item = pool.get(&question.id).unwrap();
    assert!(item.answered);
    assert!(!item.correct);
    drop(pool);

    let upstream = h.store.question(question.id).expect("question pushed upstream");
    assert!(upstream.answered);
    assert!(!upstream.correct);
    Ok(())
}

#[tokio::test]
async fn fan_out_with_no_groups_emits_no_rows() -> Result<()> {
    let h = harness().await;
    run_out_one_minute_work(&h.state).await;

    assert_eq!(h.store.study_sessions().len(), 1);
    assert!(h.store.activity_events().is_empty());
    Ok(())
}

#[tokio::test]
async fn durable_writes_require_an_identity() -> Result<()> {
    let h = harness().await;
    h.state.sign_out().await;
    let mut notices = h.state.notices();

    run_out_one_minute_work(&h.state).await;

    // The phase still advanced; the record was dropped behind a warning.
    assert!(h.store.study_sessions().is_empty());
    let notice = notices.try_recv().expect("a warning notice was broadcast");
    assert_eq!(notice.level, NoticeLevel::Warning);
    assert_eq!(
        h.state.timer_updates().borrow().phase,
        TimerPhase::Break
    );
    Ok(())
}

struct FakeGenerator {
    response: String,
}

impl ContentGenerator for FakeGenerator {
    fn generate(
        &self,
        _request: GenerationRequest,
    ) -> BoxFuture<'static, Result<String, GeneratorError>> {
        let response = self.response.clone();
        async move { Ok(response) }.boxed()
    }
}

fn generation_request(kind: GenerationKind) -> GenerationRequest {
    GenerationRequest {
        document_text: "Newton's laws of motion describe ...".into(),
        subject_name: "Physics".into(),
        count: 2,
        kind,
    }
}

#[tokio::test]
async fn generation_inserts_a_well_formed_batch() -> Result<()> {
    let h = harness().await;
    let generator = FakeGenerator {
        response: r#"[
            {"question": "First law?", "options": ["inertia", "F=ma", "reaction", "gravity"],
             "correct_answer_index": 0},
            {"question": "Second law?", "options": ["inertia", "F=ma", "reaction", "gravity"],
             "correct_answer_index": 1, "explanation": "force equals mass times acceleration"}
        ]"#
        .into(),
    };

    let batch = generation::generate(
        &h.state,
        &generator,
        generation_request(GenerationKind::Questions),
    )
    .await
    .unwrap();

    let generation::GeneratedBatch::Questions(questions) = batch else {
        panic!("expected a question batch");
    };
    assert_eq!(questions.len(), 2);
    assert!(questions.iter().all(|q| q.source == QuestionSource::Generated));

    let pool = h.state.questions().read().await;
    assert_eq!(pool.len(), 2);
    Ok(())
}

#[tokio::test]
async fn generation_rejects_the_whole_batch_on_one_bad_item() -> Result<()> {
    let h = harness().await;
    let generator = FakeGenerator {
        response: r#"[
            {"question": "First law?", "options": ["inertia", "F=ma"], "correct_answer_index": 0},
            {"question": "Second law?", "options": ["inertia", "F=ma"], "correct_answer_index": 7}
        ]"#
        .into(),
    };

    let err = generation::generate(
        &h.state,
        &generator,
        generation_request(GenerationKind::Questions),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::UpstreamFormat(_)));

    // All-or-nothing: nothing made it into the pool.
    assert!(h.state.questions().read().await.is_empty());
    Ok(())
}

#[tokio::test]
async fn generation_is_gated_on_the_premium_entitlement() -> Result<()> {
    let h = harness().await;
    h.state.sign_in(Identity::standard(h.user)).await;
    let generator = FakeGenerator {
        response: "[]".into(),
    };

    let err = generation::generate(
        &h.state,
        &generator,
        generation_request(GenerationKind::Flashcards),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
    Ok(())
}

#[tokio::test]
async fn pools_rehydrate_from_the_draft_store() -> Result<()> {
    let h = harness().await;
    let subject = Uuid::new_v4();
    pool_service::add_question(&h.state, question_request(subject, "mirrored"))
        .await
        .unwrap();
    pool_service::add_card(
        &h.state,
        NewFlashcardRequest {
            subject: "Physics".into(),
            front: "c".into(),
            back: "speed of light".into(),
            difficulty: DifficultyEntity::Hard,
        },
    )
    .await
    .unwrap();

    let reloaded = StudyState::new(AppConfig::default(), h.drafts.clone());
    pool_service::hydrate_from_drafts(&reloaded).await;

    assert_eq!(reloaded.questions().read().await.len(), 1);
    assert_eq!(reloaded.cards().read().await.len(), 1);
    Ok(())
}
