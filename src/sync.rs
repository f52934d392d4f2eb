//! Polling snapshots and server-time synchronization
//!
//! Clients never run their own countdowns against local wall clocks.
//! Every snapshot carries the server's current time and the remaining
//! answer window computed on the server, so a client renders a countdown
//! by offsetting against `server_time` rather than trusting its own clock.
//!
//! The participant snapshot is also the confidentiality boundary: correct
//! option ids, per-response correctness, and option distributions are
//! stripped until the question is in its reveal state (or the quiz has
//! ended with results visibility switched on).

use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;
use serde_with::{serde_as, skip_serializing_none};

use crate::{
    Error,
    clock::Timestamp,
    model::{Id, Participant, Question, QuestionOption, QuestionState, Quiz, QuizStatus, Response},
    scoring::{self, Standing},
    store::StateStore,
};

/// A question as shown to participants
///
/// Unlike the stored [`Question`], the correct option set is only present
/// once it may be revealed.
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    /// Zero-based position of this question
    pub index: usize,
    /// Total number of questions in the quiz
    pub count: usize,
    /// The question text
    pub text: String,
    /// The selectable options, in display order
    pub options: Vec<QuestionOption>,
    /// Current runtime state
    pub state: QuestionState,
    /// The correct option ids, present only after reveal
    pub correct_option_ids: Option<HashSet<Id>>,
    /// The question's full answer window
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub time_limit: Duration,
    /// Points awarded for a correct answer
    pub points: u64,
}

/// A participant's own recorded response, result fields gated on reveal
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct ResponseView {
    /// The option ids the participant selected
    pub selected_option_ids: HashSet<Id>,
    /// Whether the selection was correct, present only after reveal
    pub is_correct: Option<bool>,
    /// Points earned, present only after reveal
    pub points_earned: Option<u64>,
}

/// How often one option was selected on the current question
#[derive(Debug, Clone, Serialize)]
pub struct OptionStat {
    /// The option in question
    pub option_id: Id,
    /// How many responses selected it
    pub count: usize,
    /// Share of responses that selected it, in percent
    pub percentage: f32,
}

/// Everything a participant client needs to render one poll cycle
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantSnapshot {
    /// Lifecycle status of the quiz
    pub quiz_status: QuizStatus,
    /// Display title of the quiz
    pub title: String,
    /// This participant's own record
    ///
    /// The cached totals exclude the current question's response until that
    /// question is revealable; a score delta would otherwise betray the
    /// grade of a pending answer.
    pub participant: Participant,
    /// The current question, if the quiz has started
    pub question: Option<QuestionView>,
    /// This participant's response to the current question, if any
    pub response: Option<ResponseView>,
    /// Selection distribution of the current question, present after reveal
    pub option_stats: Option<Vec<OptionStat>>,
    /// Final standings, present once the quiz ended with results visible
    pub standings: Option<Vec<Standing>>,
    /// Server clock at snapshot time; clients sync countdowns against this
    #[serde_as(as = "serde_with::TimestampMilliSeconds<i64>")]
    pub server_time: Timestamp,
    /// Remaining answer window of the current question, if it is open
    #[serde_as(as = "Option<serde_with::DurationMilliSeconds<u64>>")]
    pub time_remaining: Option<Duration>,
}

/// The host's complete view of a quiz session
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct HostSnapshot {
    /// The quiz record itself
    pub quiz: Quiz,
    /// All questions with full detail, correct answers included
    pub questions: Vec<Question>,
    /// Current standings; the host always sees them
    pub standings: Vec<Standing>,
    /// How many responses the current question has collected
    pub answers_received: Option<usize>,
    /// Selection distribution of the current question
    pub option_stats: Option<Vec<OptionStat>>,
    /// Server clock at snapshot time
    #[serde_as(as = "serde_with::TimestampMilliSeconds<i64>")]
    pub server_time: Timestamp,
    /// Remaining answer window of the current question, if it is open
    #[serde_as(as = "Option<serde_with::DurationMilliSeconds<u64>>")]
    pub time_remaining: Option<Duration>,
}

/// Whether the correct answer of `question` may be shown to participants
fn revealed(quiz: &Quiz, question: &Question) -> bool {
    question.answer_revealed()
        || (quiz.status == QuizStatus::Ended && quiz.show_results_to_students)
}

fn option_stats(question: &Question, responses: &[Response]) -> Vec<OptionStat> {
    let total = responses.len();
    question
        .options
        .iter()
        .map(|option| {
            let count = responses
                .iter()
                .filter(|r| r.selected_option_ids.contains(&option.id))
                .count();
            let percentage = if total == 0 {
                0.0
            } else {
                count as f32 / total as f32 * 100.0
            };
            OptionStat {
                option_id: option.id,
                count,
                percentage,
            }
        })
        .collect()
}

fn remaining(question: &Question, now: Timestamp) -> Option<Duration> {
    match question.state {
        QuestionState::Active => Some(question.time_remaining(now)),
        // A question that has run reports zero rather than omitting the
        // field, so clients showing a countdown land exactly on zero.
        QuestionState::Closed | QuestionState::ShowingAnswer => Some(Duration::ZERO),
        QuestionState::Hidden => None,
    }
}

/// Builds the host's snapshot of a quiz
///
/// `quiz` must already be reconciled; this function only reads.
///
/// # Errors
///
/// Propagates store failures.
pub fn host_snapshot<S: StateStore>(
    store: &S,
    quiz: &Quiz,
    now: Timestamp,
) -> Result<HostSnapshot, Error> {
    let questions = store.questions(quiz.id)?;
    let current = quiz
        .current_index
        .and_then(|index| questions.iter().find(|q| q.position == index));

    let (answers_received, stats, time_remaining) = match current {
        Some(question) => {
            let responses = store.responses_for_question(question.id)?;
            (
                Some(responses.len()),
                Some(option_stats(question, &responses)),
                remaining(question, now),
            )
        }
        None => (None, None, None),
    };

    Ok(HostSnapshot {
        quiz: quiz.clone(),
        questions,
        standings: scoring::standings(store.participants(quiz.id)?),
        answers_received,
        option_stats: stats,
        server_time: now,
        time_remaining,
    })
}

/// Builds one participant's snapshot of a quiz
///
/// `quiz` must already be reconciled; this function only reads and never
/// includes correct-answer data before reveal.
///
/// # Errors
///
/// Propagates store failures.
pub fn participant_snapshot<S: StateStore>(
    store: &S,
    quiz: &Quiz,
    participant: &Participant,
    now: Timestamp,
) -> Result<ParticipantSnapshot, Error> {
    let questions = store.questions(quiz.id)?;
    let count = questions.len();
    let current = quiz
        .current_index
        .and_then(|index| questions.into_iter().find(|q| q.position == index));

    let mut shown = participant.clone();
    let (question, response, stats, time_remaining) = match current {
        Some(question) => {
            let show_answer = revealed(quiz, &question);
            let stored = store.response(participant.id, question.id)?;
            if !show_answer {
                if let Some(r) = &stored {
                    shown.total_score = shown.total_score.saturating_sub(r.points_earned);
                    shown.total_correct =
                        shown.total_correct.saturating_sub(u64::from(r.is_correct));
                }
            }
            let response = stored.map(|r| {
                ResponseView {
                    selected_option_ids: r.selected_option_ids,
                    is_correct: show_answer.then_some(r.is_correct),
                    points_earned: show_answer.then_some(r.points_earned),
                }
            });
            let stats = if show_answer {
                Some(option_stats(
                    &question,
                    &store.responses_for_question(question.id)?,
                ))
            } else {
                None
            };
            let time_remaining = remaining(&question, now);
            let view = QuestionView {
                index: question.position,
                count,
                text: question.text,
                options: question.options,
                state: question.state,
                correct_option_ids: show_answer.then_some(question.correct_option_ids),
                time_limit: question.time_limit,
                points: question.points,
            };
            (Some(view), response, stats, time_remaining)
        }
        None => (None, None, None, None),
    };

    let standings = if quiz.status == QuizStatus::Ended && quiz.show_results_to_students {
        Some(scoring::standings(store.participants(quiz.id)?))
    } else {
        None
    };

    Ok(ParticipantSnapshot {
        quiz_status: quiz.status,
        title: quiz.title.clone(),
        participant: shown,
        question,
        response,
        option_stats: stats,
        standings,
        server_time: now,
        time_remaining,
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{
        collect,
        config::{OptionConfig, QuestionConfig, QuizConfig},
        join_code::JoinCode,
        machine::{self, HostAction},
        store::MemoryStore,
    };
    use web_time::SystemTime;

    fn seeded(store: &MemoryStore, start: Timestamp) -> (Quiz, Participant) {
        let (quiz, questions) = QuizConfig {
            title: "Sync Test".to_string(),
            questions: vec![QuestionConfig {
                text: "Pick one".to_string(),
                time_limit: Duration::from_secs(10),
                points: 5,
                options: vec![
                    OptionConfig {
                        text: "right".to_string(),
                        correct: true,
                    },
                    OptionConfig {
                        text: "wrong".to_string(),
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
        let participant = Participant {
            id: Id::new(),
            quiz_id: quiz.id,
            name: "Alice".to_string(),
            user_id: None,
            total_score: 0,
            total_correct: 0,
            display_position: None,
        };
        store.insert_participant(participant.clone()).unwrap();
        machine::apply(store, start, &quiz, HostAction::Start).unwrap();
        (store.quiz(quiz.id).unwrap(), participant)
    }

    #[test]
    fn test_participant_snapshot_withholds_correct_answers_while_open() {
        let store = MemoryStore::new();
        let start = SystemTime::now();
        let (quiz, alice) = seeded(&store, start);
        let question = store.questions(quiz.id).unwrap().remove(0);
        collect::submit(
            &store,
            start + Duration::from_secs(2),
            alice.id,
            question.id,
            question.correct_option_ids.clone(),
            Duration::from_millis(2000),
        )
        .unwrap();

        let snapshot =
            participant_snapshot(&store, &quiz, &alice, start + Duration::from_secs(3)).unwrap();
        let view = snapshot.question.unwrap();
        assert!(view.correct_option_ids.is_none());
        let response = snapshot.response.unwrap();
        assert!(response.is_correct.is_none());
        assert!(response.points_earned.is_none());
        assert!(snapshot.option_stats.is_none());

        // The serialized form must not leak the gated fields either.
        let json = serde_json::to_string(&ResponseView {
            selected_option_ids: HashSet::new(),
            is_correct: None,
            points_earned: None,
        })
        .unwrap();
        assert!(!json.contains("is_correct"));
    }

    #[test]
    fn test_participant_totals_exclude_pending_response() {
        let store = MemoryStore::new();
        let start = SystemTime::now();
        let (quiz, alice) = seeded(&store, start);
        let question = store.questions(quiz.id).unwrap().remove(0);
        collect::submit(
            &store,
            start + Duration::from_secs(2),
            alice.id,
            question.id,
            question.correct_option_ids.clone(),
            Duration::from_millis(2000),
        )
        .unwrap();

        // The cached totals already carry the 5 points, but a poll while
        // the question is still open must not show the jump.
        assert_eq!(store.participant(alice.id).unwrap().total_score, 5);
        let alice = store.participant(alice.id).unwrap();
        let snapshot =
            participant_snapshot(&store, &quiz, &alice, start + Duration::from_secs(3)).unwrap();
        assert_eq!(snapshot.participant.total_score, 0);
        assert_eq!(snapshot.participant.total_correct, 0);

        // Reveal, then the totals come through.
        machine::apply(&store, start, &quiz, HostAction::CloseQuestion).unwrap();
        let quiz = store.quiz(quiz.id).unwrap();
        machine::apply(&store, start, &quiz, HostAction::ShowAnswer).unwrap();
        let quiz = store.quiz(quiz.id).unwrap();
        let alice = store.participant(alice.id).unwrap();
        let snapshot = participant_snapshot(&store, &quiz, &alice, start).unwrap();
        assert_eq!(snapshot.participant.total_score, 5);
        assert_eq!(snapshot.participant.total_correct, 1);
    }

    #[test]
    fn test_participant_snapshot_reveals_after_show_answer() {
        let store = MemoryStore::new();
        let start = SystemTime::now();
        let (quiz, alice) = seeded(&store, start);
        let question = store.questions(quiz.id).unwrap().remove(0);
        collect::submit(
            &store,
            start + Duration::from_secs(2),
            alice.id,
            question.id,
            question.correct_option_ids.clone(),
            Duration::from_millis(2000),
        )
        .unwrap();

        machine::apply(&store, start, &quiz, HostAction::CloseQuestion).unwrap();
        let quiz = store.quiz(quiz.id).unwrap();
        machine::apply(&store, start, &quiz, HostAction::ShowAnswer).unwrap();
        let quiz = store.quiz(quiz.id).unwrap();

        let snapshot = participant_snapshot(&store, &quiz, &alice, start).unwrap();
        assert_eq!(
            snapshot.question.unwrap().correct_option_ids,
            Some(question.correct_option_ids)
        );
        assert_eq!(snapshot.response.unwrap().is_correct, Some(true));
        let stats = snapshot.option_stats.unwrap();
        assert_eq!(stats.iter().map(|s| s.count).sum::<usize>(), 1);
    }

    #[test]
    fn test_time_remaining_comes_from_server_clock() {
        let store = MemoryStore::new();
        let start = SystemTime::now();
        let (quiz, alice) = seeded(&store, start);

        let now = start + Duration::from_secs(4);
        let snapshot = participant_snapshot(&store, &quiz, &alice, now).unwrap();
        assert_eq!(snapshot.server_time, now);
        assert_eq!(snapshot.time_remaining, Some(Duration::from_secs(6)));
    }

    #[test]
    fn test_host_snapshot_sees_everything() {
        let store = MemoryStore::new();
        let start = SystemTime::now();
        let (quiz, alice) = seeded(&store, start);
        let question = store.questions(quiz.id).unwrap().remove(0);
        collect::submit(
            &store,
            start + Duration::from_secs(1),
            alice.id,
            question.id,
            question.correct_option_ids.clone(),
            Duration::from_millis(1000),
        )
        .unwrap();

        let snapshot = host_snapshot(&store, &quiz, start + Duration::from_secs(2)).unwrap();
        assert_eq!(snapshot.answers_received, Some(1));
        assert!(!snapshot.questions[0].correct_option_ids.is_empty());
        assert_eq!(snapshot.standings.len(), 1);
        let stats = snapshot.option_stats.unwrap();
        let full = stats
            .iter()
            .find(|s| question.correct_option_ids.contains(&s.option_id))
            .unwrap();
        assert_eq!(full.count, 1);
        assert!((full.percentage - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_standings_visible_to_participants_only_when_allowed() {
        let store = MemoryStore::new();
        let start = SystemTime::now();
        let (quiz, alice) = seeded(&store, start);

        let snapshot = participant_snapshot(&store, &quiz, &alice, start).unwrap();
        assert!(snapshot.standings.is_none());

        machine::apply(&store, start, &quiz, HostAction::End).unwrap();
        let quiz = store.quiz(quiz.id).unwrap();
        let snapshot = participant_snapshot(&store, &quiz, &alice, start).unwrap();
        assert!(snapshot.standings.is_some());

        machine::apply(
            &store,
            start,
            &quiz,
            HostAction::UpdateSettings {
                show_results_to_students: false,
            },
        )
        .unwrap();
        let quiz = store.quiz(quiz.id).unwrap();
        let snapshot = participant_snapshot(&store, &quiz, &alice, start).unwrap();
        assert!(snapshot.standings.is_none());
    }
}
