//! State store contract and in-memory reference implementation
//!
//! The engine treats persistence as an external collaborator: a record
//! store with per-entity reads, patch-style updates, uniqueness-enforcing
//! inserts, and conditional writes. Conditional updates are the engine's
//! concurrency primitive — every state-machine transition is a
//! compare-and-swap keyed on the quiz status or question state, so
//! concurrent host double-clicks and racing reconcilers resolve to exactly
//! one winner.
//!
//! [`MemoryStore`] is the reference implementation: every operation takes a
//! single lock, which trivially gives each call the required atomicity. A
//! relational implementation would map patches to `UPDATE ... WHERE` and
//! conditional updates to a status predicate in the `WHERE` clause.

use std::{
    collections::HashMap,
    sync::Mutex,
};

use itertools::Itertools;
use thiserror::Error;

use crate::{
    clock::Timestamp,
    join_code::JoinCode,
    model::{Id, Participant, Question, QuestionState, Quiz, QuizStatus, Response},
};

/// Errors returned by state store operations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The requested record does not exist
    #[error("record not found")]
    NotFound,
    /// A uniqueness constraint or conditional-write precondition failed
    #[error("conflicting write")]
    Conflict,
    /// The target quiz is at participant capacity
    #[error("participant capacity reached")]
    CapacityExceeded,
}

/// A partial update to a quiz record
///
/// `None` fields are left untouched. `current_index` can only move to a
/// concrete value; the state machine never rewinds it.
#[derive(Debug, Clone, Copy, Default)]
pub struct QuizPatch {
    /// New lifecycle status
    pub status: Option<QuizStatus>,
    /// New current question index
    pub current_index: Option<usize>,
    /// New end-of-quiz visibility flag
    pub show_results_to_students: Option<bool>,
    /// Start timestamp (set once, on start)
    pub started_at: Option<Timestamp>,
    /// End timestamp (set once, on end)
    pub ended_at: Option<Timestamp>,
}

impl QuizPatch {
    /// Applies this patch to a quiz record in place
    pub fn apply(self, quiz: &mut Quiz) {
        if let Some(status) = self.status {
            quiz.status = status;
        }
        if let Some(index) = self.current_index {
            quiz.current_index = Some(index);
        }
        if let Some(show) = self.show_results_to_students {
            quiz.show_results_to_students = show;
        }
        if let Some(started_at) = self.started_at {
            quiz.started_at = Some(started_at);
        }
        if let Some(ended_at) = self.ended_at {
            quiz.ended_at = Some(ended_at);
        }
    }
}

/// A partial update to a question record
#[derive(Debug, Clone, Copy, Default)]
pub struct QuestionPatch {
    /// New runtime state
    pub state: Option<QuestionState>,
    /// Activation timestamp (set once)
    pub started_at: Option<Timestamp>,
    /// Close timestamp
    pub ended_at: Option<Timestamp>,
}

impl QuestionPatch {
    /// Applies this patch to a question record in place
    pub fn apply(self, question: &mut Question) {
        if let Some(state) = self.state {
            question.state = state;
        }
        if let Some(started_at) = self.started_at {
            question.started_at = Some(started_at);
        }
        if let Some(ended_at) = self.ended_at {
            question.ended_at = Some(ended_at);
        }
    }
}

/// A quiz with all of its children, read in one operation
#[derive(Debug, Clone)]
pub struct Session {
    /// The quiz record
    pub quiz: Quiz,
    /// The quiz's questions, ordered by position
    pub questions: Vec<Question>,
    /// The quiz's participants
    pub participants: Vec<Participant>,
}

/// Durable record storage for quizzes, questions, participants, and responses
///
/// Implementations must make every method atomic with respect to the
/// records it touches. The uniqueness guarantees are part of the contract:
/// `insert_quiz` conflicts when the join code is held by a non-ended quiz,
/// `insert_participant` conflicts on a duplicate (quiz, name) pair, and
/// `insert_response` conflicts on a duplicate (participant, question) pair
/// — reject, never overwrite.
pub trait StateStore: Send + Sync {
    /// Inserts a new quiz record
    ///
    /// # Errors
    ///
    /// `Error::Conflict` if the quiz id exists or the join code is already
    /// held by a quiz that has not ended.
    fn insert_quiz(&self, quiz: Quiz) -> Result<(), Error>;

    /// Reads a quiz by id
    fn quiz(&self, id: Id) -> Result<Quiz, Error>;

    /// Resolves a join code to the quiz currently holding it
    fn quiz_by_code(&self, code: JoinCode) -> Result<Quiz, Error>;

    /// Patches a quiz, optionally conditional on its current status
    ///
    /// # Errors
    ///
    /// `Error::Conflict` if `expected` is given and the stored status
    /// differs — the caller lost a race and must re-read.
    fn update_quiz(
        &self,
        id: Id,
        expected: Option<QuizStatus>,
        patch: QuizPatch,
    ) -> Result<Quiz, Error>;

    /// Deletes a quiz and all of its children
    fn delete_quiz(&self, id: Id) -> Result<(), Error>;

    /// Inserts a new question record
    fn insert_question(&self, question: Question) -> Result<(), Error>;

    /// Reads a question by id
    fn question(&self, id: Id) -> Result<Question, Error>;

    /// Reads all questions of a quiz, ordered by position
    fn questions(&self, quiz_id: Id) -> Result<Vec<Question>, Error>;

    /// Patches a question, optionally conditional on its current state
    ///
    /// # Errors
    ///
    /// `Error::Conflict` if `expected` is given and the stored state
    /// differs. Racing reconcilers rely on this: the loser's conditional
    /// close is a no-op conflict, never a double write.
    fn update_question(
        &self,
        id: Id,
        expected: Option<QuestionState>,
        patch: QuestionPatch,
    ) -> Result<Question, Error>;

    /// Inserts a new participant record
    ///
    /// The capacity check happens inside the same atomic operation as the
    /// insert, so concurrent joins at the limit cannot overshoot it.
    ///
    /// # Errors
    ///
    /// `Error::Conflict` if the quiz already has a participant with the
    /// same name (case-insensitive); `Error::CapacityExceeded` if the quiz
    /// is at participant capacity.
    fn insert_participant(&self, participant: Participant) -> Result<(), Error>;

    /// Reads a participant by id
    fn participant(&self, id: Id) -> Result<Participant, Error>;

    /// Reads all participants of a quiz
    fn participants(&self, quiz_id: Id) -> Result<Vec<Participant>, Error>;

    /// Overwrites a participant's derived score counters
    fn set_participant_totals(
        &self,
        id: Id,
        total_score: u64,
        total_correct: u64,
    ) -> Result<Participant, Error>;

    /// Inserts a new response record
    ///
    /// # Errors
    ///
    /// `Error::Conflict` if a response already exists for the same
    /// (participant, question) pair. The existing record is untouched.
    fn insert_response(&self, response: Response) -> Result<(), Error>;

    /// Reads a participant's response to a question, if any
    fn response(&self, participant_id: Id, question_id: Id) -> Result<Option<Response>, Error>;

    /// Reads all responses to one question
    fn responses_for_question(&self, question_id: Id) -> Result<Vec<Response>, Error>;

    /// Reads the full response log of a quiz
    fn responses(&self, quiz_id: Id) -> Result<Vec<Response>, Error>;

    /// Reads a quiz together with its questions and participants
    fn session(&self, quiz_id: Id) -> Result<Session, Error> {
        Ok(Session {
            quiz: self.quiz(quiz_id)?,
            questions: self.questions(quiz_id)?,
            participants: self.participants(quiz_id)?,
        })
    }
}

/// All records of a [`MemoryStore`], guarded by one lock
#[derive(Debug, Default)]
struct Inner {
    quizzes: HashMap<Id, Quiz>,
    codes: HashMap<JoinCode, Id>,
    questions: HashMap<Id, Question>,
    participants: HashMap<Id, Participant>,
    /// Keyed by (participant_id, question_id) — the idempotency key
    responses: HashMap<(Id, Id), Response>,
}

/// In-memory state store for tests and single-process embedders
///
/// Every operation acquires the single internal lock, so each call is
/// atomic and the conditional-update contract holds under concurrent use
/// from multiple request-handling threads.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panic mid-write; propagating the panic is
        // the only sound option for a store with no recovery story.
        self.inner.lock().expect("memory store lock poisoned")
    }
}

impl StateStore for MemoryStore {
    fn insert_quiz(&self, quiz: Quiz) -> Result<(), Error> {
        let mut inner = self.lock();
        if inner.quizzes.contains_key(&quiz.id) {
            return Err(Error::Conflict);
        }
        if let Some(holder) = inner.codes.get(&quiz.join_code) {
            let still_live = inner
                .quizzes
                .get(holder)
                .is_some_and(|q| q.status != QuizStatus::Ended);
            if still_live {
                return Err(Error::Conflict);
            }
        }
        inner.codes.insert(quiz.join_code, quiz.id);
        inner.quizzes.insert(quiz.id, quiz);
        Ok(())
    }

    fn quiz(&self, id: Id) -> Result<Quiz, Error> {
        self.lock().quizzes.get(&id).cloned().ok_or(Error::NotFound)
    }

    fn quiz_by_code(&self, code: JoinCode) -> Result<Quiz, Error> {
        let inner = self.lock();
        let id = inner.codes.get(&code).ok_or(Error::NotFound)?;
        inner.quizzes.get(id).cloned().ok_or(Error::NotFound)
    }

    fn update_quiz(
        &self,
        id: Id,
        expected: Option<QuizStatus>,
        patch: QuizPatch,
    ) -> Result<Quiz, Error> {
        let mut inner = self.lock();
        let quiz = inner.quizzes.get_mut(&id).ok_or(Error::NotFound)?;
        if expected.is_some_and(|status| quiz.status != status) {
            return Err(Error::Conflict);
        }
        patch.apply(quiz);
        Ok(quiz.clone())
    }

    fn delete_quiz(&self, id: Id) -> Result<(), Error> {
        let mut inner = self.lock();
        let quiz = inner.quizzes.remove(&id).ok_or(Error::NotFound)?;
        if inner.codes.get(&quiz.join_code) == Some(&id) {
            inner.codes.remove(&quiz.join_code);
        }
        inner.questions.retain(|_, q| q.quiz_id != id);
        inner.participants.retain(|_, p| p.quiz_id != id);
        inner.responses.retain(|_, r| r.quiz_id != id);
        Ok(())
    }

    fn insert_question(&self, question: Question) -> Result<(), Error> {
        let mut inner = self.lock();
        if inner.questions.contains_key(&question.id) {
            return Err(Error::Conflict);
        }
        inner.questions.insert(question.id, question);
        Ok(())
    }

    fn question(&self, id: Id) -> Result<Question, Error> {
        self.lock()
            .questions
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound)
    }

    fn questions(&self, quiz_id: Id) -> Result<Vec<Question>, Error> {
        Ok(self
            .lock()
            .questions
            .values()
            .filter(|q| q.quiz_id == quiz_id)
            .cloned()
            .sorted_by_key(|q| q.position)
            .collect_vec())
    }

    fn update_question(
        &self,
        id: Id,
        expected: Option<QuestionState>,
        patch: QuestionPatch,
    ) -> Result<Question, Error> {
        let mut inner = self.lock();
        let question = inner.questions.get_mut(&id).ok_or(Error::NotFound)?;
        if expected.is_some_and(|state| question.state != state) {
            return Err(Error::Conflict);
        }
        patch.apply(question);
        Ok(question.clone())
    }

    fn insert_participant(&self, participant: Participant) -> Result<(), Error> {
        let mut inner = self.lock();
        if inner.participants.contains_key(&participant.id) {
            return Err(Error::Conflict);
        }
        let name_taken = inner.participants.values().any(|p| {
            p.quiz_id == participant.quiz_id && p.name.eq_ignore_ascii_case(&participant.name)
        });
        if name_taken {
            return Err(Error::Conflict);
        }
        let seats = inner
            .participants
            .values()
            .filter(|p| p.quiz_id == participant.quiz_id)
            .count();
        if seats >= crate::constants::quiz::MAX_PARTICIPANT_COUNT {
            return Err(Error::CapacityExceeded);
        }
        inner.participants.insert(participant.id, participant);
        Ok(())
    }

    fn participant(&self, id: Id) -> Result<Participant, Error> {
        self.lock()
            .participants
            .get(&id)
            .cloned()
            .ok_or(Error::NotFound)
    }

    fn participants(&self, quiz_id: Id) -> Result<Vec<Participant>, Error> {
        Ok(self
            .lock()
            .participants
            .values()
            .filter(|p| p.quiz_id == quiz_id)
            .cloned()
            .sorted_by_key(|p| p.name.clone())
            .collect_vec())
    }

    fn set_participant_totals(
        &self,
        id: Id,
        total_score: u64,
        total_correct: u64,
    ) -> Result<Participant, Error> {
        let mut inner = self.lock();
        let participant = inner.participants.get_mut(&id).ok_or(Error::NotFound)?;
        participant.total_score = total_score;
        participant.total_correct = total_correct;
        Ok(participant.clone())
    }

    fn insert_response(&self, response: Response) -> Result<(), Error> {
        let mut inner = self.lock();
        let key = (response.participant_id, response.question_id);
        if inner.responses.contains_key(&key) {
            return Err(Error::Conflict);
        }
        inner.responses.insert(key, response);
        Ok(())
    }

    fn response(&self, participant_id: Id, question_id: Id) -> Result<Option<Response>, Error> {
        Ok(self
            .lock()
            .responses
            .get(&(participant_id, question_id))
            .cloned())
    }

    fn responses_for_question(&self, question_id: Id) -> Result<Vec<Response>, Error> {
        Ok(self
            .lock()
            .responses
            .values()
            .filter(|r| r.question_id == question_id)
            .cloned()
            .sorted_by_key(|r| r.submitted_at)
            .collect_vec())
    }

    fn responses(&self, quiz_id: Id) -> Result<Vec<Response>, Error> {
        Ok(self
            .lock()
            .responses
            .values()
            .filter(|r| r.quiz_id == quiz_id)
            .cloned()
            .sorted_by_key(|r| r.submitted_at)
            .collect_vec())
    }
}
