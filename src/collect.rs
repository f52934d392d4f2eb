//! Answer collection and grading
//!
//! Submissions are graded and stamped entirely with server-side data at
//! write time. The client-reported elapsed time is advisory only and is
//! clamped to what the server itself observed, so no client can claim a
//! faster answer than the server can vouch for. The (participant,
//! question) uniqueness of the response log makes every submission after
//! the first a [`Error::DuplicateSubmission`], never an overwrite.

use std::collections::HashSet;
use std::time::Duration;

use log::debug;

use crate::{
    Error,
    clock::Timestamp,
    model::{Id, Question, QuestionState, Response},
    reconcile,
    store::{self, StateStore},
};

/// Grades a selection against a question's correct option set
///
/// The selection must match the correct set exactly; partial credit is not
/// awarded. Returns the correctness flag and the points earned.
pub fn grade(question: &Question, selected: &HashSet<Id>) -> (bool, u64) {
    let is_correct = !selected.is_empty() && *selected == question.correct_option_ids;
    let points = if is_correct { question.points } else { 0 };
    (is_correct, points)
}

/// Records a participant's answer to a question
///
/// Reconciles the owning quiz first, so a submission that arrives after the
/// question's deadline is rejected even if no poll has closed the question
/// yet. Returns the stored response on success.
///
/// # Errors
///
/// - [`Error::NotFound`] if the question or participant does not exist
/// - [`Error::Unauthorized`] if the participant belongs to a different quiz
/// - [`Error::QuestionNotAcceptingAnswers`] unless the question is open
/// - [`Error::DuplicateSubmission`] if this participant already answered it
pub fn submit<S: StateStore>(
    store: &S,
    now: Timestamp,
    participant_id: Id,
    question_id: Id,
    selected_option_ids: HashSet<Id>,
    client_elapsed: Duration,
) -> Result<Response, Error> {
    let question = store.question(question_id)?;
    let participant = store.participant(participant_id)?;
    if participant.quiz_id != question.quiz_id {
        return Err(Error::Unauthorized);
    }

    // The deadline check must see post-reconciliation state, and the
    // question record itself may have been closed by the repair.
    let quiz = store.quiz(question.quiz_id)?;
    reconcile::reconcile(store, now, quiz)?;
    let question = store.question(question_id)?;
    if question.state != QuestionState::Active {
        return Err(Error::QuestionNotAcceptingAnswers);
    }

    let (is_correct, points_earned) = grade(&question, &selected_option_ids);
    let latency = client_elapsed.min(question.elapsed(now));

    let response = Response {
        id: Id::new(),
        quiz_id: question.quiz_id,
        question_id,
        participant_id,
        selected_option_ids,
        is_correct,
        points_earned,
        latency,
        submitted_at: now,
    };
    match store.insert_response(response.clone()) {
        Ok(()) => {}
        Err(store::Error::Conflict) => return Err(Error::DuplicateSubmission),
        Err(e) => return Err(e.into()),
    }

    // Keep the cached totals fresh for cheap standings reads; the response
    // log remains the source of truth and the aggregator can rebuild them.
    store.set_participant_totals(
        participant_id,
        participant.total_score + points_earned,
        participant.total_correct + u64::from(is_correct),
    )?;

    debug!(
        "quiz {}: participant {} answered question {} ({})",
        question.quiz_id,
        participant_id,
        question.position,
        if is_correct { "correct" } else { "incorrect" }
    );
    Ok(response)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{
        config::{OptionConfig, QuestionConfig, QuizConfig},
        join_code::JoinCode,
        machine::{self, HostAction},
        model::{Participant, Quiz, QuizStatus},
        store::MemoryStore,
    };
    use web_time::SystemTime;

    fn started_quiz(store: &MemoryStore, start: Timestamp) -> Quiz {
        let (quiz, questions) = QuizConfig {
            title: "Collector Test".to_string(),
            questions: vec![QuestionConfig {
                text: "2 + 2?".to_string(),
                time_limit: Duration::from_secs(10),
                points: 5,
                options: vec![
                    OptionConfig {
                        text: "4".to_string(),
                        correct: true,
                    },
                    OptionConfig {
                        text: "5".to_string(),
                        correct: false,
                    },
                ],
            }],
        }
        .into_records(Id::new(), JoinCode::new());
        store.insert_quiz(quiz.clone()).unwrap();
        for q in questions {
            store.insert_question(q).unwrap();
        }
        machine::apply(store, start, &quiz, HostAction::Start).unwrap();
        store.quiz(quiz.id).unwrap()
    }

    fn join(store: &MemoryStore, quiz_id: Id, name: &str) -> Participant {
        let participant = Participant {
            id: Id::new(),
            quiz_id,
            name: name.to_string(),
            user_id: None,
            total_score: 0,
            total_correct: 0,
            display_position: None,
        };
        store.insert_participant(participant.clone()).unwrap();
        participant
    }

    fn correct_option(store: &MemoryStore, quiz_id: Id) -> (Id, HashSet<Id>) {
        let question = store.questions(quiz_id).unwrap().remove(0);
        (question.id, question.correct_option_ids.clone())
    }

    #[test]
    fn test_correct_answer_earns_full_points() {
        let store = MemoryStore::new();
        let start = SystemTime::now();
        let quiz = started_quiz(&store, start);
        let alice = join(&store, quiz.id, "Alice");
        let (question_id, correct) = correct_option(&store, quiz.id);

        let response = submit(
            &store,
            start + Duration::from_secs(3),
            alice.id,
            question_id,
            correct,
            Duration::from_millis(3000),
        )
        .unwrap();
        assert!(response.is_correct);
        assert_eq!(response.points_earned, 5);

        let alice = store.participant(alice.id).unwrap();
        assert_eq!(alice.total_score, 5);
        assert_eq!(alice.total_correct, 1);
    }

    #[test]
    fn test_wrong_answer_earns_zero() {
        let store = MemoryStore::new();
        let start = SystemTime::now();
        let quiz = started_quiz(&store, start);
        let bob = join(&store, quiz.id, "Bob");
        let question = store.questions(quiz.id).unwrap().remove(0);
        let wrong: HashSet<Id> = question
            .options
            .iter()
            .map(|o| o.id)
            .filter(|id| !question.correct_option_ids.contains(id))
            .collect();

        let response = submit(
            &store,
            start + Duration::from_secs(3),
            bob.id,
            question.id,
            wrong,
            Duration::from_millis(3000),
        )
        .unwrap();
        assert!(!response.is_correct);
        assert_eq!(response.points_earned, 0);
        assert_eq!(store.participant(bob.id).unwrap().total_score, 0);
    }

    #[test]
    fn test_empty_selection_is_incorrect() {
        let store = MemoryStore::new();
        let start = SystemTime::now();
        let quiz = started_quiz(&store, start);
        let carol = join(&store, quiz.id, "Carol");
        let (question_id, _) = correct_option(&store, quiz.id);

        let response = submit(
            &store,
            start + Duration::from_secs(1),
            carol.id,
            question_id,
            HashSet::new(),
            Duration::ZERO,
        )
        .unwrap();
        assert!(!response.is_correct);
    }

    #[test]
    fn test_duplicate_submission_preserves_first_response() {
        let store = MemoryStore::new();
        let start = SystemTime::now();
        let quiz = started_quiz(&store, start);
        let alice = join(&store, quiz.id, "Alice");
        let (question_id, correct) = correct_option(&store, quiz.id);

        let first = submit(
            &store,
            start + Duration::from_secs(2),
            alice.id,
            question_id,
            correct,
            Duration::from_millis(2000),
        )
        .unwrap();

        assert!(matches!(
            submit(
                &store,
                start + Duration::from_secs(4),
                alice.id,
                question_id,
                HashSet::new(),
                Duration::from_millis(4000),
            ),
            Err(Error::DuplicateSubmission)
        ));

        let stored = store.response(alice.id, question_id).unwrap().unwrap();
        assert_eq!(stored.id, first.id);
        assert!(stored.is_correct);
        // The failed retry must not touch the cached totals either.
        assert_eq!(store.participant(alice.id).unwrap().total_score, 5);
    }

    #[test]
    fn test_late_submission_is_rejected_via_reconciliation() {
        let store = MemoryStore::new();
        let start = SystemTime::now();
        let quiz = started_quiz(&store, start);
        let late = join(&store, quiz.id, "Late");
        let (question_id, correct) = correct_option(&store, quiz.id);

        // Nobody has polled; the question record still says active. The
        // submission path reconciles and rejects.
        assert!(matches!(
            submit(
                &store,
                start + Duration::from_secs(12),
                late.id,
                question_id,
                correct,
                Duration::from_millis(9000),
            ),
            Err(Error::QuestionNotAcceptingAnswers)
        ));
        assert_eq!(store.quiz(quiz.id).unwrap().status, QuizStatus::Paused);
    }

    #[test]
    fn test_submission_to_closed_question_is_rejected() {
        let store = MemoryStore::new();
        let start = SystemTime::now();
        let quiz = started_quiz(&store, start);
        let alice = join(&store, quiz.id, "Alice");
        let (question_id, correct) = correct_option(&store, quiz.id);
        machine::apply(&store, start, &quiz, HostAction::CloseQuestion).unwrap();

        assert!(matches!(
            submit(
                &store,
                start + Duration::from_secs(1),
                alice.id,
                question_id,
                correct,
                Duration::from_millis(1000),
            ),
            Err(Error::QuestionNotAcceptingAnswers)
        ));
    }

    #[test]
    fn test_participant_from_another_quiz_is_unauthorized() {
        let store = MemoryStore::new();
        let start = SystemTime::now();
        let quiz = started_quiz(&store, start);
        let other = started_quiz(&store, start);
        let outsider = join(&store, other.id, "Outsider");
        let (question_id, correct) = correct_option(&store, quiz.id);

        assert!(matches!(
            submit(
                &store,
                start + Duration::from_secs(1),
                outsider.id,
                question_id,
                correct,
                Duration::from_millis(1000),
            ),
            Err(Error::Unauthorized)
        ));
    }

    #[test]
    fn test_latency_is_clamped_to_server_elapsed() {
        let store = MemoryStore::new();
        let start = SystemTime::now();
        let quiz = started_quiz(&store, start);
        let alice = join(&store, quiz.id, "Alice");
        let (question_id, correct) = correct_option(&store, quiz.id);

        // Client claims a 1ms answer 5 seconds in; the server knows better
        // in the other direction only, so the small claim is kept.
        let response = submit(
            &store,
            start + Duration::from_secs(5),
            alice.id,
            question_id,
            correct.clone(),
            Duration::from_millis(1),
        )
        .unwrap();
        assert_eq!(response.latency, Duration::from_millis(1));

        // A claim exceeding the observed elapsed time is clamped down.
        let bob = join(&store, quiz.id, "Bob");
        let response = submit(
            &store,
            start + Duration::from_secs(6),
            bob.id,
            question_id,
            correct,
            Duration::from_millis(60_000),
        )
        .unwrap();
        assert_eq!(response.latency, Duration::from_secs(6));
    }
}
