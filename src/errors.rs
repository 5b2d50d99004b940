use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::DebtStatus;

/// coarse classification callers map onto transport codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Forbidden,
    Storage,
    Configuration,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    #[error("conflict: {message}")]
    Conflict {
        message: String,
    },

    #[error("forbidden: {message}")]
    Forbidden {
        message: String,
    },

    #[error("storage error: {message}")]
    Storage {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    Configuration {
        message: String,
    },
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation { message: message.into() }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        LedgerError::Conflict { message: message.into() }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        LedgerError::Forbidden { message: message.into() }
    }

    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        LedgerError::NotFound { entity, id: id.to_string() }
    }

    /// amount must be strictly positive
    pub fn non_positive_amount(amount: Money) -> Self {
        LedgerError::validation(format!("amount must be greater than 0, got {}", amount))
    }

    /// amount too large for the ledger column
    pub fn amount_out_of_range(amount: Money) -> Self {
        LedgerError::validation(format!(
            "amount {} is out of range, must be below {}",
            amount,
            Money::LIMIT
        ))
    }

    /// payment larger than what is still owed
    pub fn exceeds_remaining(remaining: Money, requested: Money) -> Self {
        LedgerError::validation(format!(
            "payment amount {} exceeds remaining debt amount {}",
            requested, remaining
        ))
    }

    pub fn debt_not_payable(status: DebtStatus) -> Self {
        LedgerError::validation(format!("cannot add payment to a debt with status {}", status))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation { .. } => ErrorKind::Validation,
            LedgerError::NotFound { .. } => ErrorKind::NotFound,
            LedgerError::Conflict { .. } => ErrorKind::Conflict,
            LedgerError::Forbidden { .. } => ErrorKind::Forbidden,
            LedgerError::Storage { .. } => ErrorKind::Storage,
            LedgerError::Configuration { .. } => ErrorKind::Configuration,
        }
    }
}

impl From<config::ConfigError> for LedgerError {
    fn from(err: config::ConfigError) -> Self {
        LedgerError::Configuration { message: err.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
