//! Quiz authoring configuration
//!
//! This module defines the validated, authoring-time shape of a quiz: the
//! title, the ordered questions, their options, time limits, and point
//! values. A configuration carries no runtime state; expanding it into
//! [`model`] records is what makes it a live session the engine can drive.

use std::time::Duration;

use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::{
    join_code::JoinCode,
    model::{self, Id, Question, QuestionOption, QuestionState, Quiz, QuizStatus},
};

type ValidationResult = garde::Result;

/// Validates that a duration falls within specified bounds
///
/// # Errors
///
/// Returns a `garde::Error` if the duration is outside the inclusive range
/// `[MIN_SECONDS, MAX_SECONDS]`.
fn validate_duration<const MIN_SECONDS: u64, const MAX_SECONDS: u64>(
    field: &'static str,
    val: &Duration,
) -> ValidationResult {
    if (MIN_SECONDS..=MAX_SECONDS).contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "{field} is outside of the bounds [{MIN_SECONDS},{MAX_SECONDS}]",
        )))
    }
}

/// Validates the answer time limit of a question
fn validate_time_limit(val: &Duration, _ctx: &()) -> ValidationResult {
    validate_duration::<
        { crate::constants::question::MIN_TIME_LIMIT },
        { crate::constants::question::MAX_TIME_LIMIT },
    >("time_limit", val)
}

/// Validates that at least one option is marked correct
fn validate_has_correct(options: &[OptionConfig], _ctx: &()) -> ValidationResult {
    if options.iter().any(|o| o.correct) {
        Ok(())
    } else {
        Err(garde::Error::new("question has no correct option"))
    }
}

/// Authoring configuration for one selectable option
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OptionConfig {
    /// Display text of the option
    #[garde(length(max = crate::constants::question::MAX_OPTION_LENGTH))]
    pub text: String,
    /// Whether this option is part of the correct answer set
    #[garde(skip)]
    pub correct: bool,
}

/// Authoring configuration for one question
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionConfig {
    /// The question text shown to participants
    #[garde(length(
        min = crate::constants::question::MIN_TEXT_LENGTH,
        max = crate::constants::question::MAX_TEXT_LENGTH
    ))]
    pub text: String,
    /// How long the question stays open once activated
    #[garde(custom(validate_time_limit))]
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    pub time_limit: Duration,
    /// Points awarded for a fully correct answer
    #[garde(range(max = crate::constants::question::MAX_POINTS))]
    pub points: u64,
    /// The selectable options; at least one must be marked correct
    #[garde(
        length(
            min = crate::constants::question::MIN_OPTION_COUNT,
            max = crate::constants::question::MAX_OPTION_COUNT
        ),
        custom(validate_has_correct),
        dive
    )]
    pub options: Vec<OptionConfig>,
}

/// A complete quiz configuration as authored by a host
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuizConfig {
    /// Display title of the quiz
    #[garde(length(max = crate::constants::quiz::MAX_TITLE_LENGTH))]
    pub title: String,
    /// The questions in presentation order
    #[garde(length(min = 1, max = crate::constants::quiz::MAX_QUESTION_COUNT), dive)]
    pub questions: Vec<QuestionConfig>,
}

impl QuestionConfig {
    /// Expands this configuration into a hidden runtime question record
    ///
    /// Options receive fresh stable ids; the correct-option set is derived
    /// from the `correct` flags and the flags themselves do not survive
    /// into the record's option list (which is what participants see).
    pub fn into_question(self, quiz_id: Id, position: usize) -> Question {
        let mut options = Vec::with_capacity(self.options.len());
        let mut correct_option_ids = std::collections::HashSet::new();
        for option in self.options {
            let id = Id::new();
            if option.correct {
                correct_option_ids.insert(id);
            }
            options.push(QuestionOption {
                id,
                text: option.text,
            });
        }

        Question {
            id: Id::new(),
            quiz_id,
            position,
            text: self.text,
            options,
            correct_option_ids,
            time_limit: self.time_limit,
            points: self.points,
            state: QuestionState::Hidden,
            started_at: None,
            ended_at: None,
        }
    }
}

impl QuizConfig {
    /// Expands this configuration into a waiting quiz and its questions
    ///
    /// The caller supplies the join code so it can regenerate on a
    /// uniqueness conflict at insert time.
    pub fn into_records(self, host_id: Id, join_code: JoinCode) -> (Quiz, Vec<Question>) {
        let quiz_id = Id::new();
        let questions = self
            .questions
            .into_iter()
            .enumerate()
            .map(|(position, q)| q.into_question(quiz_id, position))
            .collect();

        let quiz = Quiz {
            id: quiz_id,
            host_id,
            join_code,
            title: self.title,
            status: QuizStatus::Waiting,
            current_index: None,
            show_results_to_students: false,
            is_template: false,
            started_at: None,
            ended_at: None,
        };

        (quiz, questions)
    }
}

/// Snapshots an existing quiz's questions into a fresh template record
///
/// Runtime state is reset: the new quiz is `waiting`, every question is
/// `hidden` with fresh ids, and the record is flagged as a template. The
/// result consumes the same store contract as any other quiz.
pub fn as_template(quiz: &Quiz, questions: &[model::Question], join_code: JoinCode) -> (Quiz, Vec<Question>) {
    let quiz_id = Id::new();
    let questions = questions
        .iter()
        .map(|q| Question {
            id: Id::new(),
            quiz_id,
            position: q.position,
            text: q.text.clone(),
            options: q.options.clone(),
            correct_option_ids: q.correct_option_ids.clone(),
            time_limit: q.time_limit,
            points: q.points,
            state: QuestionState::Hidden,
            started_at: None,
            ended_at: None,
        })
        .collect();

    let template = Quiz {
        id: quiz_id,
        host_id: quiz.host_id,
        join_code,
        title: quiz.title.clone(),
        status: QuizStatus::Waiting,
        current_index: None,
        show_results_to_students: false,
        is_template: true,
        started_at: None,
        ended_at: None,
    };

    (template, questions)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn create_test_question_config() -> QuestionConfig {
        QuestionConfig {
            text: "Which of these is a prime number?".to_string(),
            time_limit: Duration::from_secs(30),
            points: 100,
            options: vec![
                OptionConfig {
                    text: "7".to_string(),
                    correct: true,
                },
                OptionConfig {
                    text: "8".to_string(),
                    correct: false,
                },
                OptionConfig {
                    text: "9".to_string(),
                    correct: false,
                },
            ],
        }
    }

    fn create_test_quiz_config() -> QuizConfig {
        QuizConfig {
            title: "Test Quiz".to_string(),
            questions: vec![create_test_question_config()],
        }
    }

    #[test]
    fn test_quiz_config_validation() {
        assert!(create_test_quiz_config().validate().is_ok());
    }

    #[test]
    fn test_quiz_config_title_too_long() {
        let mut config = create_test_quiz_config();
        config.title = "a".repeat(crate::constants::quiz::MAX_TITLE_LENGTH + 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_quiz_config_no_questions() {
        let mut config = create_test_quiz_config();
        config.questions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_question_config_time_limit_bounds() {
        let mut config = create_test_question_config();
        config.time_limit =
            Duration::from_secs(crate::constants::question::MIN_TIME_LIMIT - 1);
        assert!(config.validate().is_err());

        config.time_limit =
            Duration::from_secs(crate::constants::question::MAX_TIME_LIMIT + 1);
        assert!(config.validate().is_err());

        config.time_limit = Duration::from_secs(crate::constants::question::MIN_TIME_LIMIT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_question_config_requires_correct_option() {
        let mut config = create_test_question_config();
        for option in &mut config.options {
            option.correct = false;
        }
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_question_config_too_few_options() {
        let mut config = create_test_question_config();
        config.options.truncate(1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_into_records_starts_waiting_and_hidden() {
        let host_id = Id::new();
        let (quiz, questions) = create_test_quiz_config().into_records(host_id, JoinCode::new());

        assert_eq!(quiz.status, QuizStatus::Waiting);
        assert_eq!(quiz.current_index, None);
        assert_eq!(quiz.host_id, host_id);
        assert!(!quiz.is_template);

        assert_eq!(questions.len(), 1);
        let question = &questions[0];
        assert_eq!(question.quiz_id, quiz.id);
        assert_eq!(question.position, 0);
        assert_eq!(question.state, QuestionState::Hidden);
        assert_eq!(question.correct_option_ids.len(), 1);
        assert_eq!(question.options.len(), 3);
    }

    #[test]
    fn test_as_template_resets_runtime_state() {
        let host_id = Id::new();
        let (mut quiz, mut questions) =
            create_test_quiz_config().into_records(host_id, JoinCode::new());
        quiz.status = QuizStatus::Ended;
        questions[0].state = QuestionState::Closed;

        let (template, template_questions) = as_template(&quiz, &questions, JoinCode::new());

        assert!(template.is_template);
        assert_eq!(template.status, QuizStatus::Waiting);
        assert_ne!(template.id, quiz.id);
        assert_eq!(template_questions[0].state, QuestionState::Hidden);
        assert_eq!(template_questions[0].quiz_id, template.id);
        assert_eq!(
            template_questions[0].correct_option_ids,
            questions[0].correct_option_ids
        );
    }
}
