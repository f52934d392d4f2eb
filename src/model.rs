//! Durable records of the quiz data model
//!
//! This module defines the entities the engine persists through the state
//! store: the quiz session itself, its ordered questions, the joined
//! participants, and the immutable response log. The lifecycle enums and
//! the time math on [`Question`] live here too, since every other module
//! reasons in these terms.

use std::{
    collections::HashSet,
    fmt::Display,
    str::FromStr,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay, serde_as, skip_serializing_none};
use uuid::Uuid;

use crate::{clock::Timestamp, join_code::JoinCode};

/// A unique identifier for any record in the data model
///
/// Hosts, quizzes, questions, options, participants, and responses all use
/// the same UUID-backed identifier, serialized as its string form.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    /// Creates a new random identifier (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    /// Formats the identifier as a UUID string
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    /// Parses an identifier from a UUID string
    ///
    /// # Errors
    ///
    /// Returns a `uuid::Error` if the string is not a valid UUID.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// Lifecycle status of a quiz session
///
/// A quiz only ever moves forward through these states; `Ended` is terminal
/// and is never exited back to an earlier state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizStatus {
    /// Created but not started; participants are gathering
    Waiting,
    /// A question is currently open for answers
    Active,
    /// The current question is closed; the host decides what to show next
    Paused,
    /// The current question's correct answer is on display
    ShowingResults,
    /// The session is over
    Ended,
}

/// Runtime state of a single question within a quiz
///
/// A question never returns to `Hidden` once activated, and at most one
/// question per quiz is `Active` at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionState {
    /// Not yet shown to anyone
    Hidden,
    /// Open for answers
    Active,
    /// No longer accepting answers
    Closed,
    /// Closed, with the correct answer revealed
    ShowingAnswer,
}

/// One live quiz session
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    /// Unique identifier of this quiz
    pub id: Id,
    /// The host that created and exclusively controls this quiz
    pub host_id: Id,
    /// Short human-entry code participants use to join
    pub join_code: JoinCode,
    /// Display title of the quiz
    pub title: String,
    /// Current lifecycle status
    pub status: QuizStatus,
    /// Index of the current question; `None` before the quiz starts
    ///
    /// Monotonically non-decreasing for the lifetime of the quiz and
    /// bounded by the number of questions.
    pub current_index: Option<usize>,
    /// Whether end-of-quiz results are visible to participants
    pub show_results_to_students: bool,
    /// Whether this record is a reusable template rather than a live session
    pub is_template: bool,
    /// When the quiz was started, if it has been
    pub started_at: Option<Timestamp>,
    /// When the quiz ended, if it has
    pub ended_at: Option<Timestamp>,
}

/// One selectable option of a question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    /// Stable identifier of this option
    pub id: Id,
    /// Display text of this option
    pub text: String,
}

/// One question of a quiz, with its runtime sub-state
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier of this question
    pub id: Id,
    /// The quiz this question belongs to
    pub quiz_id: Id,
    /// Zero-based position within the quiz's question order
    pub position: usize,
    /// The question text shown to participants
    pub text: String,
    /// The selectable options, in display order
    pub options: Vec<QuestionOption>,
    /// The option ids that together form the correct answer
    pub correct_option_ids: HashSet<Id>,
    /// How long the question stays open once activated
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub time_limit: Duration,
    /// Points awarded for a fully correct answer
    pub points: u64,
    /// Current runtime state
    pub state: QuestionState,
    /// When the question was activated; set exactly once
    pub started_at: Option<Timestamp>,
    /// When the question was closed
    pub ended_at: Option<Timestamp>,
}

impl Question {
    /// Returns how long the question has been open at `now`
    ///
    /// Zero if the question has not been activated yet, or if `now` reads
    /// before the activation instant (which can happen across restarts with
    /// a non-monotonic wall clock; treating it as zero keeps the remaining
    /// time bounded by the full limit).
    pub fn elapsed(&self, now: Timestamp) -> Duration {
        self.started_at
            .and_then(|started| now.duration_since(started).ok())
            .unwrap_or_default()
    }

    /// Returns the remaining answer time at `now`, saturating at zero
    pub fn time_remaining(&self, now: Timestamp) -> Duration {
        self.time_limit.saturating_sub(self.elapsed(now))
    }

    /// Whether this question is active but past its time limit at `now`
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.state == QuestionState::Active && self.elapsed(now) >= self.time_limit
    }

    /// Whether the correct answer may be shown to participants
    ///
    /// Correct-answer data is withheld from the participant surface except
    /// when the question itself is in the reveal state; quiz-end visibility
    /// is layered on top by the synchronization protocol.
    pub fn answer_revealed(&self) -> bool {
        self.state == QuestionState::ShowingAnswer
    }
}

/// One joined participant of a quiz
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Unique identifier of this participant
    pub id: Id,
    /// The quiz this participant joined
    pub quiz_id: Id,
    /// Display name, unique within the quiz
    pub name: String,
    /// Linked user identity, if the participant is not a guest
    pub user_id: Option<Id>,
    /// Cumulative score
    ///
    /// Derived from the response log; always re-derivable by the score
    /// aggregator and never the sole source of truth.
    pub total_score: u64,
    /// Cumulative count of correct responses (derived, like `total_score`)
    pub total_correct: u64,
    /// Cosmetic display position chosen by the client, if any
    pub display_position: Option<u32>,
}

/// One participant's immutable submission to one question
///
/// At most one response exists per (participant, question) pair; a response
/// is never overwritten once written.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Unique identifier of this response
    pub id: Id,
    /// The quiz the answered question belongs to
    pub quiz_id: Id,
    /// The answered question
    pub question_id: Id,
    /// The submitting participant
    pub participant_id: Id,
    /// The option ids the participant selected
    pub selected_option_ids: HashSet<Id>,
    /// Whether the selection exactly matched the correct option set
    pub is_correct: bool,
    /// Points earned at write time
    pub points_earned: u64,
    /// Advisory response latency, clamped to the server-observed elapsed time
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub latency: Duration,
    /// Server time at which the response was recorded
    pub submitted_at: Timestamp,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use web_time::SystemTime;

    fn question_started_at(start: Timestamp) -> Question {
        Question {
            id: Id::new(),
            quiz_id: Id::new(),
            position: 0,
            text: "What is the capital of France?".to_string(),
            options: vec![],
            correct_option_ids: HashSet::new(),
            time_limit: Duration::from_secs(10),
            points: 5,
            state: QuestionState::Active,
            started_at: Some(start),
            ended_at: None,
        }
    }

    #[test]
    fn test_time_remaining_counts_down() {
        let start = SystemTime::now();
        let question = question_started_at(start);

        assert_eq!(
            question.time_remaining(start + Duration::from_secs(3)),
            Duration::from_secs(7)
        );
        assert_eq!(
            question.time_remaining(start + Duration::from_secs(10)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_time_remaining_saturates_at_zero() {
        let start = SystemTime::now();
        let question = question_started_at(start);

        assert_eq!(
            question.time_remaining(start + Duration::from_secs(25)),
            Duration::ZERO
        );
    }

    #[test]
    fn test_time_remaining_before_start_is_full_limit() {
        let start = SystemTime::now();
        let question = question_started_at(start + Duration::from_secs(60));

        // Clock read before the recorded start: elapsed clamps to zero.
        assert_eq!(question.time_remaining(start), Duration::from_secs(10));
    }

    #[test]
    fn test_is_expired_exactly_at_limit() {
        let start = SystemTime::now();
        let question = question_started_at(start);

        assert!(!question.is_expired(start + Duration::from_secs(9)));
        assert!(question.is_expired(start + Duration::from_secs(10)));
        assert!(question.is_expired(start + Duration::from_secs(12)));
    }

    #[test]
    fn test_closed_question_is_not_expired() {
        let start = SystemTime::now();
        let mut question = question_started_at(start);
        question.state = QuestionState::Closed;

        assert!(!question.is_expired(start + Duration::from_secs(60)));
    }

    #[test]
    fn test_id_round_trips_through_string() {
        let id = Id::new();
        let parsed = Id::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }
}
