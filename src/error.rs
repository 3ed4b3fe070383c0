use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidInput,
    NotFound,
    OutOfRange,
    OpenFailure,
    PersistenceFailure,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "InvalidInput",
            Self::NotFound => "NotFound",
            Self::OutOfRange => "OutOfRange",
            Self::OpenFailure => "OpenFailure",
            Self::PersistenceFailure => "PersistenceFailure",
            Self::Internal => "Internal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineError {
    pub code: ErrorCode,
    pub message: String,
}

impl EngineError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn out_of_range(what: &str, index: impl fmt::Display, count: usize) -> Self {
        Self::new(
            ErrorCode::OutOfRange,
            format!("{what} out of range: {index} (fighter has {count} costumes)"),
        )
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::PersistenceFailure, message)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl Error for EngineError {}

/// Parses a user-supplied index token. Only non-integer input is
/// `InvalidInput`; a negative integer is left for the range check.
pub fn parse_index(label: &str, token: &str) -> Result<i64, EngineError> {
    token.trim().parse::<i64>().map_err(|_| {
        EngineError::invalid_input(format!("Invalid {}: {token}", label.to_lowercase()))
    })
}
