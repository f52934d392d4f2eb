//! Quiz state machine
//!
//! This module owns the host-triggered lifecycle of a quiz and of each
//! question within it. Every transition is validated against the freshly
//! read quiz status and executed as a conditional write against the state
//! store, so a concurrent duplicate of the same action observes the
//! already-advanced state and either no-ops or fails with
//! [`Error::InvalidTransition`] — never a lost or doubled update.

use log::{debug, info};

use crate::{
    Error,
    clock::Timestamp,
    model::{Id, Question, QuestionState, Quiz, QuizStatus},
    scoring,
    store::{self, QuestionPatch, QuizPatch, StateStore},
};

/// Host-triggered actions of the quiz control surface
///
/// Action names are the wire-level identifiers the host surface accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostAction {
    /// Start the quiz and activate the first question
    Start,
    /// Close the current question if open, then advance (or end the quiz)
    NextQuestion,
    /// Close the current question and pause
    CloseQuestion,
    /// Reveal the current question's correct answer
    ShowAnswer,
    /// End the quiz immediately
    End,
    /// Make final results visible to participants
    ShowFinalResults,
    /// Update session settings after the quiz has ended
    UpdateSettings {
        /// Whether end-of-quiz results are visible to participants
        show_results_to_students: bool,
    },
    /// Re-run the score aggregator without changing state
    RecalculateScores,
}

/// Applies a host action to a quiz
///
/// `quiz` must be the freshly read (and reconciled) record; the transition
/// itself re-checks via conditional writes, so a stale read degrades to a
/// conflict rather than a bad write.
///
/// # Errors
///
/// [`Error::InvalidTransition`] if the action is illegal for the current
/// status or the conditional write loses a race; store-level failures
/// otherwise.
pub fn apply<S: StateStore>(
    store: &S,
    now: Timestamp,
    quiz: &Quiz,
    action: HostAction,
) -> Result<(), Error> {
    debug!("quiz {}: applying {action:?} in {:?}", quiz.id, quiz.status);
    match action {
        HostAction::Start => start(store, now, quiz),
        HostAction::NextQuestion => next_question(store, now, quiz),
        HostAction::CloseQuestion => close_question(store, now, quiz),
        HostAction::ShowAnswer => show_answer(store, quiz),
        HostAction::End => end(store, now, quiz),
        HostAction::ShowFinalResults => update_settings(store, quiz, true),
        HostAction::UpdateSettings {
            show_results_to_students,
        } => update_settings(store, quiz, show_results_to_students),
        HostAction::RecalculateScores => {
            scoring::recalculate(store, quiz.id)?;
            Ok(())
        }
    }
}

fn start<S: StateStore>(store: &S, now: Timestamp, quiz: &Quiz) -> Result<(), Error> {
    if quiz.status != QuizStatus::Waiting {
        return Err(Error::InvalidTransition);
    }
    let questions = store.questions(quiz.id)?;
    let first = questions.first().ok_or(Error::InvalidTransition)?;

    store.update_quiz(
        quiz.id,
        Some(QuizStatus::Waiting),
        QuizPatch {
            status: Some(QuizStatus::Active),
            current_index: Some(0),
            started_at: Some(now),
            ..QuizPatch::default()
        },
    )?;
    activate(store, first, now)?;
    info!("quiz {} started with {} questions", quiz.id, questions.len());
    Ok(())
}

fn next_question<S: StateStore>(store: &S, now: Timestamp, quiz: &Quiz) -> Result<(), Error> {
    if !matches!(
        quiz.status,
        QuizStatus::Paused | QuizStatus::ShowingResults
    ) {
        return Err(Error::InvalidTransition);
    }
    let index = quiz.current_index.ok_or(Error::InvalidTransition)?;
    let questions = store.questions(quiz.id)?;

    if let Some(current) = questions.get(index) {
        close_if_active(store, current.id, now)?;
    }

    if let Some(next) = questions.get(index + 1) {
        store.update_quiz(
            quiz.id,
            Some(quiz.status),
            QuizPatch {
                status: Some(QuizStatus::Active),
                current_index: Some(index + 1),
                ..QuizPatch::default()
            },
        )?;
        activate(store, next, now)?;
        debug!("quiz {}: advanced to question {}", quiz.id, index + 1);
        Ok(())
    } else {
        // Out of questions: this is the quiz's natural end. Aggregation
        // runs before the terminal write so a failed aggregation leaves
        // the quiz un-ended and the action safely retryable.
        finish(store, now, quiz)
    }
}

fn close_question<S: StateStore>(store: &S, now: Timestamp, quiz: &Quiz) -> Result<(), Error> {
    if quiz.status != QuizStatus::Active {
        return Err(Error::InvalidTransition);
    }
    let current = current_question(store, quiz)?;
    close_if_active(store, current.id, now)?;
    pause_if_active(store, quiz)?;
    debug!("quiz {}: question {} closed", quiz.id, current.position);
    Ok(())
}

fn show_answer<S: StateStore>(store: &S, quiz: &Quiz) -> Result<(), Error> {
    if quiz.status != QuizStatus::Paused {
        return Err(Error::InvalidTransition);
    }
    let current = current_question(store, quiz)?;

    store.update_quiz(
        quiz.id,
        Some(QuizStatus::Paused),
        QuizPatch {
            status: Some(QuizStatus::ShowingResults),
            ..QuizPatch::default()
        },
    )?;
    // Tolerate a conflict: a concurrent duplicate already revealed it.
    match store.update_question(
        current.id,
        Some(QuestionState::Closed),
        QuestionPatch {
            state: Some(QuestionState::ShowingAnswer),
            ..QuestionPatch::default()
        },
    ) {
        Ok(_) | Err(store::Error::Conflict) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn end<S: StateStore>(store: &S, now: Timestamp, quiz: &Quiz) -> Result<(), Error> {
    if !matches!(
        quiz.status,
        QuizStatus::Active | QuizStatus::Paused | QuizStatus::ShowingResults
    ) {
        return Err(Error::InvalidTransition);
    }
    finish(store, now, quiz)
}

/// Runs the aggregator, marks the quiz ended, and force-closes stragglers
fn finish<S: StateStore>(store: &S, now: Timestamp, quiz: &Quiz) -> Result<(), Error> {
    scoring::recalculate(store, quiz.id)?;

    store.update_quiz(
        quiz.id,
        Some(quiz.status),
        QuizPatch {
            status: Some(QuizStatus::Ended),
            show_results_to_students: Some(true),
            ended_at: Some(now),
            ..QuizPatch::default()
        },
    )?;

    for question in store.questions(quiz.id)? {
        if matches!(
            question.state,
            QuestionState::Hidden | QuestionState::Active
        ) {
            match store.update_question(
                question.id,
                Some(question.state),
                QuestionPatch {
                    state: Some(QuestionState::Closed),
                    ended_at: Some(now),
                    ..QuestionPatch::default()
                },
            ) {
                Ok(_) | Err(store::Error::Conflict) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    info!("quiz {} ended", quiz.id);
    Ok(())
}

fn update_settings<S: StateStore>(store: &S, quiz: &Quiz, visible: bool) -> Result<(), Error> {
    if quiz.status != QuizStatus::Ended {
        return Err(Error::InvalidTransition);
    }
    store.update_quiz(
        quiz.id,
        None,
        QuizPatch {
            show_results_to_students: Some(visible),
            ..QuizPatch::default()
        },
    )?;
    Ok(())
}

/// Reads the question the quiz's current index points at
pub(crate) fn current_question<S: StateStore>(store: &S, quiz: &Quiz) -> Result<Question, Error> {
    let index = quiz.current_index.ok_or(Error::InvalidTransition)?;
    store
        .questions(quiz.id)?
        .into_iter()
        .find(|q| q.position == index)
        .ok_or(Error::NotFound)
}

/// Marks the question active and stamps its start time
fn activate<S: StateStore>(store: &S, question: &Question, now: Timestamp) -> Result<(), Error> {
    store.update_question(
        question.id,
        Some(QuestionState::Hidden),
        QuestionPatch {
            state: Some(QuestionState::Active),
            started_at: Some(now),
            ..QuestionPatch::default()
        },
    )?;
    Ok(())
}

/// Closes a question if it is still accepting answers
///
/// A conflict means someone else (a racing host action or reconciler)
/// already closed it; the post-condition holds either way.
pub(crate) fn close_if_active<S: StateStore>(
    store: &S,
    question_id: Id,
    now: Timestamp,
) -> Result<(), Error> {
    match store.update_question(
        question_id,
        Some(QuestionState::Active),
        QuestionPatch {
            state: Some(QuestionState::Closed),
            ended_at: Some(now),
            ..QuestionPatch::default()
        },
    ) {
        Ok(_) | Err(store::Error::Conflict) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Pauses a quiz if it is still active
pub(crate) fn pause_if_active<S: StateStore>(store: &S, quiz: &Quiz) -> Result<(), Error> {
    match store.update_quiz(
        quiz.id,
        Some(QuizStatus::Active),
        QuizPatch {
            status: Some(QuizStatus::Paused),
            ..QuizPatch::default()
        },
    ) {
        Ok(_) | Err(store::Error::Conflict) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
