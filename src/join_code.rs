//! Join code generation and management
//!
//! This module provides the short human-entry codes participants type to
//! join a live quiz. Codes are generated randomly within a fixed range and
//! displayed as six decimal digits so they are easy to read out loud and to
//! enter on a phone keypad. Uniqueness among active sessions is enforced by
//! the state store on insert, not here.

use std::{fmt::Display, num::ParseIntError, str::FromStr};

use enum_map::{Enum, EnumArray};
use serde::{Deserialize, Deserializer, Serialize};

/// Minimum value for generated join codes (first six-digit number)
const MIN_VALUE: u32 = 100_000;
/// Maximum value for generated join codes (exclusive)
const MAX_VALUE: u32 = 1_000_000;

/// A short human-entry code identifying a joinable quiz session
///
/// Join codes are always rendered as exactly six decimal digits. They
/// implement [`enum_map::Enum`] so embedders can keep a constant-time
/// code-to-session registry in an [`enum_map::EnumMap`] if they want to
/// avoid hashing on the hot join path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JoinCode(u32);

impl JoinCode {
    /// Creates a new random join code
    ///
    /// The code is drawn uniformly from the six-digit range; callers are
    /// expected to retry on a store-level uniqueness conflict.
    pub fn new() -> Self {
        Self(fastrand::u32(MIN_VALUE..MAX_VALUE))
    }
}

impl Default for JoinCode {
    /// Creates a new random join code (same as `new()`)
    fn default() -> Self {
        Self::new()
    }
}

impl Display for JoinCode {
    /// Formats the join code as six decimal digits
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:06}", self.0)
    }
}

impl Serialize for JoinCode {
    /// Serializes the join code as its six-digit string form
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for JoinCode {
    /// Deserializes a join code from its six-digit string form
    fn deserialize<D>(deserializer: D) -> Result<JoinCode, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        JoinCode::from_str(&s).map_err(|e| serde::de::Error::custom(e.to_string()))
    }
}

impl FromStr for JoinCode {
    type Err = ParseIntError;

    /// Parses a join code from a decimal string
    ///
    /// # Errors
    ///
    /// Returns a `ParseIntError` if the string is not a valid decimal
    /// number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(u32::from_str(s)?))
    }
}

impl Enum for JoinCode {
    /// Total number of possible join codes
    const LENGTH: usize = (MAX_VALUE - MIN_VALUE) as usize;

    /// Creates a join code from a usize index
    ///
    /// # Panics
    ///
    /// Panics if the value is out of range for the enum.
    fn from_usize(value: usize) -> Self {
        assert!(value < Self::LENGTH, "index out of range for Enum::from_usize");
        Self(value as u32 + MIN_VALUE)
    }

    /// Converts the join code to a usize index
    ///
    /// The returned value is clamped to the valid range to prevent
    /// array access violations.
    fn into_usize(self) -> usize {
        (self.0.saturating_sub(MIN_VALUE) as usize).min(JoinCode::LENGTH - 1)
    }
}

impl<V> EnumArray<V> for JoinCode {
    /// Array type for storing values indexed by `JoinCode`
    type Array = [V; Self::LENGTH];
}
