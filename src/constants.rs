//! Configuration constants for the quiz engine
//!
//! This module contains all the configuration limits and constraints used
//! throughout the engine to ensure data integrity and provide consistent
//! boundaries for authoring and joining.

/// Quiz-level configuration constants
pub mod quiz {
    /// Maximum number of questions allowed in a single quiz
    pub const MAX_QUESTION_COUNT: usize = 100;
    /// Maximum length of a quiz title in characters
    pub const MAX_TITLE_LENGTH: usize = 200;
    /// Maximum number of participants allowed in a single session
    pub const MAX_PARTICIPANT_COUNT: usize = 1000;
}

/// Question configuration constants
pub mod question {
    /// Minimum length of a question's text
    pub const MIN_TEXT_LENGTH: usize = 1;
    /// Maximum length of a question's text
    pub const MAX_TEXT_LENGTH: usize = 500;
    /// Minimum time limit in seconds for answering a question
    pub const MIN_TIME_LIMIT: u64 = 5;
    /// Maximum time limit in seconds for answering a question
    pub const MAX_TIME_LIMIT: u64 = 240;
    /// Minimum number of selectable options on a question
    pub const MIN_OPTION_COUNT: usize = 2;
    /// Maximum number of selectable options on a question
    pub const MAX_OPTION_COUNT: usize = 8;
    /// Maximum length of an option's text
    pub const MAX_OPTION_LENGTH: usize = 200;
    /// Maximum point value of a single question
    pub const MAX_POINTS: u64 = 10_000;
}

/// Participant configuration constants
pub mod participant {
    /// Maximum length of a participant display name
    pub const MAX_NAME_LENGTH: usize = 30;
}
