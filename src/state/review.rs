use indexmap::IndexMap;
use rand::Rng;
use rand::seq::SliceRandom;
use serde_json::json;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::dao::models::ActivityKind;
use crate::state::study::Flashcard;

/// Side effects produced by grading a card, executed by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewEffect {
    /// Persist the updated card immediately (no batching).
    PersistCard(Flashcard),
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

/// Errors returned by the review loop.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ReviewError {
    /// There are no cards to review.
    #[error("the flashcard collection is empty")]
    EmptyCollection,
    /// The back of the card has not been revealed yet.
    #[error("reveal the card before grading it")]
    NotRevealed,
    /// The shuffled working copy has been exhausted.
    #[error("the review session is already finished")]
    SessionFinished,
}

/// Single-pass review over a shuffled working copy of the full collection.
///
/// Present front, reveal back, grade, advance. Every review session covers
/// the entire collection in randomized order; there is no interval
/// scheduling and no partial-session resume.
#[derive(Debug, Clone)]
pub struct ReviewSession {
    order: Vec<Uuid>,
    position: usize,
    revealed: bool,
    graded_correct: u32,
    card_points: u32,
}

impl ReviewSession {
    /// Shuffle the collection into a fresh working copy.
    pub fn start<R: Rng + ?Sized>(
        cards: &IndexMap<Uuid, Flashcard>,
        rng: &mut R,
        card_points: u32,
    ) -> Result<Self, ReviewError> {
        if cards.is_empty() {
            return Err(ReviewError::EmptyCollection);
        }
        let mut order: Vec<Uuid> = cards.keys().copied().collect();
        order.shuffle(rng);
        Ok(Self {
            order,
            position: 0,
            revealed: false,
            graded_correct: 0,
            card_points,
        })
    }

    /// Id of the card currently presented, or `None` once exhausted.
    pub fn current_card_id(&self) -> Option<Uuid> {
        self.order.get(self.position).copied()
    }

    /// Whether the working copy has been exhausted.
    pub fn is_finished(&self) -> bool {
        self.position >= self.order.len()
    }

    /// Cards graded so far and the session length.
    pub fn progress(&self) -> (usize, usize) {
        (self.position, self.order.len())
    }

    /// Cards graded correct so far this session.
    pub fn correct_so_far(&self) -> u32 {
        self.graded_correct
    }

    /// Reveal the back of the current card.
    pub fn reveal(&mut self) -> Result<(), ReviewError> {
        if self.is_finished() {
            return Err(ReviewError::SessionFinished);
        }
        self.revealed = true;
        Ok(())
    }

    /// Grade the current card and advance to the next one.
    ///
    /// Mutates the card in place: both counters only ever grow, and
    /// `correct_count` can never pass `review_count`.
    pub fn grade(
        &mut self,
        card: &mut Flashcard,
        correct: bool,
        now: OffsetDateTime,
    ) -> Result<Vec<ReviewEffect>, ReviewError> {
        if self.is_finished() {
            return Err(ReviewError::SessionFinished);
        }
        if !self.revealed {
            return Err(ReviewError::NotRevealed);
        }

        card.review_count += 1;
        if correct {
            card.correct_count += 1;
        }
        card.last_reviewed_at = Some(now);

        if correct {
            self.graded_correct += 1;
        }
        self.position += 1;
        self.revealed = false;

        Ok(vec![
            ReviewEffect::PersistCard(card.clone()),
            ReviewEffect::AwardPoints {
                activity: ActivityKind::CardReviewed,
                points: i64::from(self.card_points),
                metadata: json!({
                    "card_id": card.id,
                    "correct": correct,
                }),
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::study::Difficulty;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;
    use time::macros::datetime;

    fn now() -> OffsetDateTime {
        datetime!(2026-08-07 19:30:00 UTC)
    }

    fn card(front: &str) -> Flashcard {
        Flashcard {
            id: Uuid::new_v4(),
            subject: "Spanish".into(),
            front: front.into(),
            back: format!("{front} (es)"),
            difficulty: Difficulty::Medium,
            review_count: 0,
            correct_count: 0,
            last_reviewed_at: None,
        }
    }

    fn collection(size: usize) -> IndexMap<Uuid, Flashcard> {
        (0..size)
            .map(|i| {
                let card = card(&format!("word {i}"));
                (card.id, card)
            })
            .collect()
    }

    #[test]
    fn empty_collection_cannot_start_a_session() {
        let cards = IndexMap::new();
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(
            ReviewSession::start(&cards, &mut rng, 1).unwrap_err(),
            ReviewError::EmptyCollection
        );
    }

    #[test]
    fn working_copy_is_a_permutation_of_the_collection() {
        let cards = collection(12);
        let mut rng = StdRng::seed_from_u64(3);
        let session = ReviewSession::start(&cards, &mut rng, 1).unwrap();

        let mut seen = HashSet::new();
        let mut walker = session.clone();
        while let Some(id) = walker.current_card_id() {
            seen.insert(id);
            walker.position += 1;
        }
        assert_eq!(seen.len(), 12);
        assert!(cards.keys().all(|id| seen.contains(id)));
    }

    #[test]
    fn grading_before_reveal_is_rejected() {
        let mut cards = collection(3);
        let mut rng = StdRng::seed_from_u64(3);
        let mut session = ReviewSession::start(&cards, &mut rng, 1).unwrap();
        let id = session.current_card_id().unwrap();
        let card = cards.get_mut(&id).unwrap();
        assert_eq!(
            session.grade(card, true, now()).unwrap_err(),
            ReviewError::NotRevealed
        );
    }

    #[test]
    fn grade_updates_card_stats_and_stamps_review_time() {
        let mut cards = collection(3);
        let mut rng = StdRng::seed_from_u64(3);
        let mut session = ReviewSession::start(&cards, &mut rng, 1).unwrap();

        let id = session.current_card_id().unwrap();
        session.reveal().unwrap();
        let card = cards.get_mut(&id).unwrap();
        let effects = session.grade(card, true, now()).unwrap();

        assert_eq!(card.review_count, 1);
        assert_eq!(card.correct_count, 1);
        assert_eq!(card.last_reviewed_at, Some(now()));
        assert!(matches!(
            &effects[0],
            ReviewEffect::PersistCard(persisted) if persisted.review_count == 1
        ));
        assert!(matches!(
            &effects[1],
            ReviewEffect::AwardPoints { points: 1, .. }
        ));
    }

    #[test]
    fn stats_stay_monotonic_across_a_full_session() {
        let mut cards = collection(10);
        let mut rng = StdRng::seed_from_u64(11);
        let mut session = ReviewSession::start(&cards, &mut rng, 1).unwrap();

        let mut flip = false;
        while let Some(id) = session.current_card_id() {
            session.reveal().unwrap();
            let card = cards.get_mut(&id).unwrap();
            let (reviews_before, correct_before) = (card.review_count, card.correct_count);
            session.grade(card, flip, now()).unwrap();
            assert!(card.review_count > reviews_before);
            assert!(card.correct_count >= correct_before);
            assert!(card.correct_count <= card.review_count);
            flip = !flip;
        }
        assert!(session.is_finished());
        assert_eq!(session.progress(), (10, 10));
        assert_eq!(session.correct_so_far(), 5);
    }

    #[test]
    fn exhausted_session_rejects_further_grades() {
        let mut cards = collection(1);
        let mut rng = StdRng::seed_from_u64(3);
        let mut session = ReviewSession::start(&cards, &mut rng, 1).unwrap();

        let id = session.current_card_id().unwrap();
        session.reveal().unwrap();
        session.grade(cards.get_mut(&id).unwrap(), true, now()).unwrap();

        assert!(session.is_finished());
        assert_eq!(session.reveal().unwrap_err(), ReviewError::SessionFinished);
        assert_eq!(
            session
                .grade(cards.get_mut(&id).unwrap(), true, now())
                .unwrap_err(),
            ReviewError::SessionFinished
        );
    }
}
