use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::game_keys::Key;

#[derive(Error, Debug)]
pub enum EngineError {
    // Whole-aggregate failures; callers get no result.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    // Only raised when the caller asks for strict keys; otherwise recorded as a Degradation.
    #[error("Degraded input: {0}")]
    DegradedInput(Degradation),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationReason {
    NoAttempts,
    UnusableGame,
    PossessionProxy,
    NoContributors,
    KeyUnavailable,
    MissingValueMetric,
}

impl DegradationReason {
    pub fn describe(self) -> &'static str {
        match self {
            DegradationReason::NoAttempts => "no attempts",
            DegradationReason::UnusableGame => "no plays for team",
            DegradationReason::PossessionProxy => "clock data missing, possession-count proxy used",
            DegradationReason::NoContributors => "no game contributed a value",
            DegradationReason::KeyUnavailable => "key missing on one side",
            DegradationReason::MissingValueMetric => "no EPA or success value on play",
        }
    }
}

/// A key or game that could not be computed and was left out rather than zeroed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Degradation {
    pub scope: String,
    pub key: Option<Key>,
    pub reason: DegradationReason,
}

impl Degradation {
    pub fn new(scope: impl Into<String>, key: Option<Key>, reason: DegradationReason) -> Self {
        Self {
            scope: scope.into(),
            key,
            reason,
        }
    }
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.key {
            Some(key) => write!(f, "{} [{}]: {}", self.scope, key.label(), self.reason.describe()),
            None => write!(f, "{}: {}", self.scope, self.reason.describe()),
        }
    }
}
