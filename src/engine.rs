//! The orchestration engine facade
//!
//! [`Engine`] ties the state store, the trusted server clock, and the
//! per-module logic together into the operations an embedding transport
//! exposes. Every read-bearing operation reconciles the quiz against the
//! clock before acting, so timeouts take effect on whichever request
//! observes them first.

use std::collections::HashSet;
use std::time::Duration;

use garde::Validate;
use log::{info, warn};

use crate::{
    Error,
    clock::Clock,
    collect,
    config::{self, QuizConfig},
    join_code::JoinCode,
    machine::{self, HostAction},
    model::{Id, Participant, Question, Quiz, QuizStatus, Response},
    names::{self, NameStyle},
    reconcile,
    store::{self, StateStore},
    sync::{self, HostSnapshot, ParticipantSnapshot},
};

/// How many fresh join codes to try before giving up on a collision streak
const JOIN_CODE_ATTEMPTS: usize = 16;

/// How many generated guest names to try before reporting exhaustion
const GUEST_NAME_ATTEMPTS: usize = 32;

/// The quiz orchestration engine
///
/// Generic over the persistence backend and the clock so tests can drive
/// time by hand while production uses the system clock.
pub struct Engine<S, C> {
    store: S,
    clock: C,
}

impl<S: StateStore, C: Clock> Engine<S, C> {
    /// Creates an engine over the given store and clock
    pub fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    /// Validates a quiz configuration and creates the quiz in the waiting state
    ///
    /// A fresh join code is drawn for the session; collisions with codes
    /// held by other live quizzes are retried with new draws.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] if the configuration fails validation;
    /// [`Error::NoAvailableJoinCode`] if every drawn code collided.
    pub fn create_quiz(&self, host_id: Id, config: QuizConfig) -> Result<Quiz, Error> {
        config.validate().map_err(Error::InvalidConfig)?;

        for _ in 0..JOIN_CODE_ATTEMPTS {
            let (quiz, questions) = config.clone().into_records(host_id, JoinCode::new());
            match self.store.insert_quiz(quiz.clone()) {
                Ok(()) => {
                    for question in questions {
                        self.store.insert_question(question)?;
                    }
                    info!("quiz {} created with join code {}", quiz.id, quiz.join_code);
                    return Ok(quiz);
                }
                Err(store::Error::Conflict) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        warn!("exhausted join code attempts for host {host_id}");
        Err(Error::NoAvailableJoinCode)
    }

    /// Deletes a quiz and everything attached to it
    ///
    /// # Errors
    ///
    /// [`Error::Unauthorized`] unless `host_id` controls the quiz.
    pub fn delete_quiz(&self, host_id: Id, quiz_id: Id) -> Result<(), Error> {
        let quiz = self.authorized(host_id, quiz_id)?;
        self.store.delete_quiz(quiz.id)?;
        info!("quiz {} deleted", quiz.id);
        Ok(())
    }

    /// Copies an ended or in-flight quiz into a fresh reusable template
    ///
    /// The template carries the questions with all runtime state reset and
    /// is never joinable until started as a new session.
    ///
    /// # Errors
    ///
    /// [`Error::Unauthorized`] unless `host_id` controls the quiz;
    /// [`Error::NoAvailableJoinCode`] if every drawn code collided.
    pub fn export_template(&self, host_id: Id, quiz_id: Id) -> Result<Quiz, Error> {
        let quiz = self.authorized(host_id, quiz_id)?;
        let questions = self.store.questions(quiz.id)?;

        for _ in 0..JOIN_CODE_ATTEMPTS {
            let (template, questions) = config::as_template(&quiz, &questions, JoinCode::new());
            match self.store.insert_quiz(template.clone()) {
                Ok(()) => {
                    for question in questions {
                        self.store.insert_question(question)?;
                    }
                    return Ok(template);
                }
                Err(store::Error::Conflict) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(Error::NoAvailableJoinCode)
    }

    /// Joins a participant to the quiz behind a join code
    ///
    /// With `name` given, the name is moderated and must be unused within
    /// the quiz; without one, a guest name is generated. Joining is allowed
    /// in every status short of ended, so latecomers can enter mid-quiz.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] for an unknown or expired code,
    /// [`Error::QuizFull`] at capacity, and [`Error::Name`] for a rejected
    /// or taken display name.
    pub fn join(
        &self,
        code: JoinCode,
        name: Option<&str>,
        user_id: Option<Id>,
    ) -> Result<Participant, Error> {
        let quiz = self.store.quiz_by_code(code)?;
        if quiz.status == QuizStatus::Ended {
            return Err(Error::NotFound);
        }

        if let Some(name) = name {
            let name = names::clean(name)?;
            return self.insert_named(quiz.id, name, user_id).map_err(|e| {
                if matches!(e, Error::InvalidTransition) {
                    Error::Name(names::Error::Used)
                } else {
                    e
                }
            });
        }

        let style = NameStyle::default();
        for _ in 0..GUEST_NAME_ATTEMPTS {
            match self.insert_named(quiz.id, style.get_name(), user_id) {
                Ok(participant) => return Ok(participant),
                Err(Error::InvalidTransition) => continue,
                Err(e) => return Err(e),
            }
        }
        warn!("exhausted guest name attempts for quiz {}", quiz.id);
        Err(Error::Name(names::Error::Used))
    }

    fn insert_named(
        &self,
        quiz_id: Id,
        name: String,
        user_id: Option<Id>,
    ) -> Result<Participant, Error> {
        let participant = Participant {
            id: Id::new(),
            quiz_id,
            name,
            user_id,
            total_score: 0,
            total_correct: 0,
            display_position: None,
        };
        self.store.insert_participant(participant.clone())?;
        info!("participant {} joined quiz {quiz_id}", participant.id);
        Ok(participant)
    }

    /// Applies a host action and returns the host's post-action view
    ///
    /// The quiz is reconciled first, so the action is validated against the
    /// state the host would see on a fresh poll rather than a stale record.
    ///
    /// # Errors
    ///
    /// [`Error::Unauthorized`] unless `host_id` controls the quiz, plus
    /// whatever the action itself rejects with.
    pub fn host_action(
        &self,
        host_id: Id,
        quiz_id: Id,
        action: HostAction,
    ) -> Result<HostSnapshot, Error> {
        let now = self.clock.now();
        let quiz = self.authorized(host_id, quiz_id)?;
        let quiz = reconcile::reconcile(&self.store, now, quiz)?;
        machine::apply(&self.store, now, &quiz, action)?;
        let quiz = self.store.quiz(quiz_id)?;
        sync::host_snapshot(&self.store, &quiz, now)
    }

    /// Returns the host's reconciled view of the quiz
    ///
    /// # Errors
    ///
    /// [`Error::Unauthorized`] unless `host_id` controls the quiz.
    pub fn host_view(&self, host_id: Id, quiz_id: Id) -> Result<HostSnapshot, Error> {
        let now = self.clock.now();
        let quiz = self.authorized(host_id, quiz_id)?;
        let quiz = reconcile::reconcile(&self.store, now, quiz)?;
        sync::host_snapshot(&self.store, &quiz, now)
    }

    /// Returns one participant's reconciled, redacted view of the quiz
    ///
    /// # Errors
    ///
    /// [`Error::Unauthorized`] if the participant belongs to another quiz.
    pub fn participant_view(
        &self,
        quiz_id: Id,
        participant_id: Id,
    ) -> Result<ParticipantSnapshot, Error> {
        let now = self.clock.now();
        let participant = self.store.participant(participant_id)?;
        if participant.quiz_id != quiz_id {
            return Err(Error::Unauthorized);
        }
        let quiz = self.store.quiz(quiz_id)?;
        let quiz = reconcile::reconcile(&self.store, now, quiz)?;
        sync::participant_snapshot(&self.store, &quiz, &participant, now)
    }

    /// Records a participant's answer to a question
    ///
    /// `client_elapsed_ms` is the client's own claim of how long it took to
    /// answer; it is clamped to the server-observed elapsed time.
    ///
    /// # Errors
    ///
    /// See [`collect::submit`].
    pub fn submit_answer(
        &self,
        participant_id: Id,
        question_id: Id,
        selected_option_ids: Vec<Id>,
        client_elapsed_ms: u64,
    ) -> Result<Response, Error> {
        collect::submit(
            &self.store,
            self.clock.now(),
            participant_id,
            question_id,
            selected_option_ids.into_iter().collect::<HashSet<_>>(),
            Duration::from_millis(client_elapsed_ms),
        )
    }

    /// Lists a quiz's questions in play order, for the host
    ///
    /// # Errors
    ///
    /// [`Error::Unauthorized`] unless `host_id` controls the quiz.
    pub fn questions(&self, host_id: Id, quiz_id: Id) -> Result<Vec<Question>, Error> {
        self.authorized(host_id, quiz_id)?;
        Ok(self.store.questions(quiz_id)?)
    }

    fn authorized(&self, host_id: Id, quiz_id: Id) -> Result<Quiz, Error> {
        let quiz = self.store.quiz(quiz_id)?;
        if quiz.host_id != host_id {
            return Err(Error::Unauthorized);
        }
        Ok(quiz)
    }
}
