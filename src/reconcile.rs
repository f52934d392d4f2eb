//! Lazy timeout reconciliation
//!
//! There is no background timer. Instead, every read path funnels through
//! [`reconcile`], which compares the current question's deadline against
//! the trusted server clock and retires it on the spot when the time limit
//! has elapsed. The conditional writes make the repair idempotent: any
//! number of concurrent pollers may observe the same expiry, but only one
//! write per record takes effect and the rest fall through harmlessly.

use log::debug;

use crate::{
    Error,
    clock::Timestamp,
    machine,
    model::{Quiz, QuizStatus},
    store::StateStore,
};

/// Brings a quiz record up to date with the passage of time
///
/// If the quiz is active and its current question has outlived its time
/// limit, the question is closed and the quiz paused, exactly as if the
/// host had closed it at the deadline. Returns the (re-read) quiz so
/// callers always hand out post-reconciliation state.
///
/// # Errors
///
/// Propagates store failures; a quiz with nothing to repair is returned
/// unchanged and error-free.
pub fn reconcile<S: StateStore>(store: &S, now: Timestamp, quiz: Quiz) -> Result<Quiz, Error> {
    if quiz.status != QuizStatus::Active {
        return Ok(quiz);
    }
    let current = machine::current_question(store, &quiz)?;
    if !current.is_expired(now) {
        return Ok(quiz);
    }

    debug!(
        "quiz {}: question {} expired, closing",
        quiz.id, current.position
    );
    machine::close_if_active(store, current.id, now)?;
    machine::pause_if_active(store, &quiz)?;

    Ok(store.quiz(quiz.id)?)
}
