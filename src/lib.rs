//! # Quizline Engine Library
//!
//! This library provides the server-authoritative orchestration engine for
//! live quiz sessions: the quiz/question state machine, server-time
//! synchronization, idempotent answer collection and scoring, and lazy
//! timeout reconciliation. It is transport-agnostic; clients are assumed to
//! poll, and every read converges them on the same state without a shared
//! clock. Persistence is abstracted behind the [`store::StateStore`] trait.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]

use serde::Serialize;
use thiserror::Error;

pub mod constants;

pub mod clock;
pub mod collect;
pub mod config;
pub mod engine;
pub mod join_code;
pub mod machine;
pub mod model;
pub mod names;
pub mod reconcile;
pub mod scoring;
pub mod store;
pub mod sync;

/// Errors surfaced by the engine's host and participant surfaces
///
/// Every variant is terminal for the triggering request: the engine never
/// retries internally, and all variants leave stored state untouched (or,
/// for [`Error::DuplicateSubmission`], leave the original record standing).
#[derive(Debug, Error)]
pub enum Error {
    /// The host requested an action that is illegal for the current quiz status
    #[error("action is not allowed in the current quiz state")]
    InvalidTransition,
    /// The caller does not control this quiz, or is not a participant of it
    #[error("caller is not authorized for this quiz")]
    Unauthorized,
    /// A submission arrived for a question that is not currently active
    #[error("question is not accepting answers")]
    QuestionNotAcceptingAnswers,
    /// A second submission arrived for an already-answered question
    ///
    /// The original response stands; submissions are never overwritten.
    #[error("an answer was already recorded for this question")]
    DuplicateSubmission,
    /// A quiz, question, or participant id did not resolve to a record
    #[error("record not found")]
    NotFound,
    /// A join was rejected because the quiz is at participant capacity
    #[error("quiz is full")]
    QuizFull,
    /// Creating a session failed because no unused join code could be drawn
    #[error("no unused join code is available")]
    NoAvailableJoinCode,
    /// The quiz configuration failed validation
    #[error("invalid quiz configuration: {0}")]
    InvalidConfig(garde::Report),
    /// A participant display name was rejected
    #[error(transparent)]
    Name(#[from] names::Error),
}

impl From<store::Error> for Error {
    /// Maps store failures onto the request-level taxonomy
    ///
    /// A conditional write that loses its race means the caller acted on a
    /// state that no longer holds, which is exactly an invalid transition
    /// from the caller's point of view. Inserts whose conflicts carry a
    /// different meaning (duplicate submissions, taken names) are mapped
    /// explicitly at their call sites instead of through this impl.
    fn from(e: store::Error) -> Self {
        match e {
            store::Error::NotFound => Error::NotFound,
            store::Error::Conflict => Error::InvalidTransition,
            store::Error::CapacityExceeded => Error::QuizFull,
        }
    }
}

/// A reconciled state snapshot for either side of the session
///
/// This enum wraps the two snapshot shapes the engine produces so embedders
/// with a single polling endpoint can serialize whichever applies.
#[derive(Debug, Serialize, Clone, derive_more::From)]
pub enum Snapshot {
    /// The host's full view, including correct answers and all participants
    Host(sync::HostSnapshot),
    /// A participant's redacted view
    Participant(sync::ParticipantSnapshot),
}

impl Snapshot {
    /// Converts the snapshot to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}
