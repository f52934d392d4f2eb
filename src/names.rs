//! Participant display-name validation and generation
//!
//! This module validates the display names participants choose when joining
//! a quiz (length, emptiness, inappropriate content) and generates random
//! guest names for participants who do not choose one. Name uniqueness
//! within a quiz is enforced by the state store's insert conflict, since
//! participants are durable records rather than in-memory map entries.

use heck::ToTitleCase;
use rustrict::CensorStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Defines the style of automatically generated participant names
///
/// Guests who join without choosing a display name are assigned one in this
/// style, retried on collision with an existing participant.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, garde::Validate)]
pub enum NameStyle {
    /// Roman-style names (praenomen + nomen, optionally + cognomen)
    Roman(#[garde(range(min = 2, max = 3))] usize),
    /// Pet-style names (adjective + animal combinations)
    Petname(#[garde(range(min = 2, max = 3))] usize),
}

impl Default for NameStyle {
    /// Default name style is Petname with 2 words
    fn default() -> Self {
        Self::Petname(2)
    }
}

impl NameStyle {
    /// Generates a random name according to this style
    pub fn get_name(&self) -> String {
        match self {
            Self::Roman(count) => romanname::romanname(romanname::NameConfig {
                praenomen: *count > 2,
            }),
            Self::Petname(count) => petname::petname(*count as u8, " ").unwrap_or_default(),
        }
        .to_title_case()
    }
}

/// Errors that can occur when validating a display name
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The requested name is already in use within this quiz
    #[error("name already in-use")]
    Used,
    /// The name is empty or contains only whitespace
    #[error("name cannot be empty")]
    Empty,
    /// The name contains inappropriate content
    #[error("name is inappropriate")]
    Sinful,
    /// The name exceeds the maximum allowed length
    #[error("name is too long")]
    TooLong,
}

/// Validates and cleans a requested display name
///
/// Surrounding whitespace is trimmed before the emptiness check, matching
/// what a participant sees rendered.
///
/// # Errors
///
/// * `Error::TooLong` - name exceeds the configured maximum length
/// * `Error::Empty` - name is empty after trimming whitespace
/// * `Error::Sinful` - name contains inappropriate content
pub fn clean(name: &str) -> Result<String, Error> {
    if name.len() > crate::constants::participant::MAX_NAME_LENGTH {
        return Err(Error::TooLong);
    }
    let name = rustrict::trim_whitespace(name);
    if name.is_empty() {
        return Err(Error::Empty);
    }
    if name.is_inappropriate() {
        return Err(Error::Sinful);
    }
    Ok(name.to_owned())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_clean_accepts_plain_name() {
        assert_eq!(clean("TestPlayer"), Ok("TestPlayer".to_string()));
    }

    #[test]
    fn test_clean_trims_whitespace() {
        assert_eq!(clean("  TestPlayer  "), Ok("TestPlayer".to_string()));
    }

    #[test]
    fn test_clean_rejects_empty() {
        assert_eq!(clean(""), Err(Error::Empty));
        assert_eq!(clean("   "), Err(Error::Empty));
        assert_eq!(clean("\t\n"), Err(Error::Empty));
    }

    #[test]
    fn test_clean_rejects_too_long() {
        let long = "a".repeat(crate::constants::participant::MAX_NAME_LENGTH + 1);
        assert_eq!(clean(&long), Err(Error::TooLong));

        let max = "a".repeat(crate::constants::participant::MAX_NAME_LENGTH);
        assert_eq!(clean(&max), Ok(max.clone()));
    }

    #[test]
    fn test_clean_rejects_inappropriate() {
        assert_eq!(clean("fuck"), Err(Error::Sinful));
    }

    #[test]
    fn test_name_style_generates_nonempty() {
        assert!(!NameStyle::Petname(2).get_name().is_empty());
        assert!(!NameStyle::Roman(2).get_name().is_empty());
    }

    #[test]
    fn test_generated_names_pass_validation() {
        for _ in 0..20 {
            let name = NameStyle::default().get_name();
            assert!(clean(&name).is_ok(), "generated name rejected: {name}");
        }
    }
}
