//! Phase identifiers and phase specifications.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{DomainError, DomainResult};

// ============================================================================
// Phase Name
// ============================================================================

/// Name of a phase within a schedule.
///
/// Phase names are an open taxonomy: the five well-known interview phases
/// have dedicated constructors, but any non-empty name is accepted.
/// Names are trimmed and lowercased on construction, so `"Technical"` and
/// `" technical "` refer to the same phase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PhaseName(String);

impl PhaseName {
    pub const INTRODUCTION: &'static str = "introduction";
    pub const BEHAVIORAL: &'static str = "behavioral";
    pub const TECHNICAL: &'static str = "technical";
    pub const CODING: &'static str = "coding";
    pub const CLOSING: &'static str = "closing";

    /// The five built-in phase names, in default schedule order.
    pub const WELL_KNOWN: [&'static str; 5] = [
        Self::INTRODUCTION,
        Self::BEHAVIORAL,
        Self::TECHNICAL,
        Self::CODING,
        Self::CLOSING,
    ];

    /// Creates a phase name, normalizing to trimmed lowercase.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidSchedule` if the name is empty after trimming.
    pub fn new(name: impl AsRef<str>) -> DomainResult<Self> {
        let normalized = name.as_ref().trim().to_lowercase();
        if normalized.is_empty() {
            return Err(DomainError::invalid_schedule("phase name must not be empty"));
        }
        Ok(Self(normalized))
    }

    fn well_known(name: &'static str) -> Self {
        Self(name.to_string())
    }

    pub fn introduction() -> Self {
        Self::well_known(Self::INTRODUCTION)
    }

    pub fn behavioral() -> Self {
        Self::well_known(Self::BEHAVIORAL)
    }

    pub fn technical() -> Self {
        Self::well_known(Self::TECHNICAL)
    }

    pub fn coding() -> Self {
        Self::well_known(Self::CODING)
    }

    pub fn closing() -> Self {
        Self::well_known(Self::CLOSING)
    }

    /// Returns true for one of the five built-in phase names.
    #[must_use]
    pub fn is_well_known(&self) -> bool {
        Self::WELL_KNOWN.contains(&self.0.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the name in title case (`"system design"` → `"System Design"`).
    ///
    /// A letter is capitalized when it follows a non-alphabetic character.
    #[must_use]
    pub fn title_case(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        let mut at_word_start = true;
        for c in self.0.chars() {
            if c.is_alphabetic() {
                if at_word_start {
                    out.extend(c.to_uppercase());
                } else {
                    out.push(c);
                }
                at_word_start = false;
            } else {
                out.push(c);
                at_word_start = true;
            }
        }
        out
    }

    /// Description used when a phase entry does not supply one.
    #[must_use]
    pub fn default_description(&self) -> String {
        format!("{} phase", self.title_case())
    }
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for PhaseName {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<PhaseName> for String {
    fn from(name: PhaseName) -> Self {
        name.0
    }
}

impl AsRef<str> for PhaseName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Phase Specification
// ============================================================================

/// A validated, immutable phase entry of a schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseSpec {
    pub name: PhaseName,
    /// Planned length of the phase, always positive
    pub duration_minutes: u32,
    pub description: String,
    pub is_skippable: bool,
    pub is_shortenable: bool,
}

impl PhaseSpec {
    /// Creates a phase spec with default flags (not skippable, shortenable).
    pub fn new(name: PhaseName, duration_minutes: u32, description: impl Into<String>) -> Self {
        Self {
            name,
            duration_minutes,
            description: description.into(),
            is_skippable: false,
            is_shortenable: true,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.duration_minutes))
    }
}

// ============================================================================
// Phase Input
// ============================================================================

/// Unvalidated phase entry as supplied by a caller or a config file.
///
/// Converted into a [`PhaseSpec`] by the schedule builder, which rejects
/// missing names and non-positive durations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseInput {
    #[serde(alias = "phase")]
    pub name: String,
    pub duration_minutes: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_skippable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_shortenable: Option<bool>,
}

impl PhaseInput {
    pub fn new(name: impl Into<String>, duration_minutes: i64) -> Self {
        Self {
            name: name.into(),
            duration_minutes,
            description: None,
            is_skippable: None,
            is_shortenable: None,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn skippable(mut self, is_skippable: bool) -> Self {
        self.is_skippable = Some(is_skippable);
        self
    }

    #[must_use]
    pub fn shortenable(mut self, is_shortenable: bool) -> Self {
        self.is_shortenable = Some(is_shortenable);
        self
    }

    /// Validates this entry into a [`PhaseSpec`].
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidSchedule` for an empty name or a
    /// duration that is not a positive `u32`.
    pub fn to_spec(&self) -> DomainResult<PhaseSpec> {
        let name = PhaseName::new(&self.name)?;

        if self.duration_minutes <= 0 {
            return Err(DomainError::invalid_schedule(format!(
                "phase {name}: duration must be positive (got {})",
                self.duration_minutes
            )));
        }
        let duration_minutes = u32::try_from(self.duration_minutes).map_err(|_| {
            DomainError::invalid_schedule(format!(
                "phase {name}: duration too large ({})",
                self.duration_minutes
            ))
        })?;

        let description = self
            .description
            .clone()
            .unwrap_or_else(|| name.default_description());

        Ok(PhaseSpec {
            name,
            duration_minutes,
            description,
            is_skippable: self.is_skippable.unwrap_or(false),
            is_shortenable: self.is_shortenable.unwrap_or(true),
        })
    }
}
