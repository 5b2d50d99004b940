use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::decimal::Money;
use crate::errors::{LedgerError, Result};

/// unique identifier for a user account
pub type UserId = Uuid;

/// unique identifier for a client
pub type ClientId = Uuid;

/// unique identifier for a debt
pub type DebtId = Uuid;

/// unique identifier for a payment
pub type PaymentId = Uuid;

/// role of an authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// sees and manages the whole ledger
    Admin,
    /// sees only the debts and payments of its linked client
    Client,
}

/// debt status, always derived from the remaining amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DebtStatus {
    /// remaining amount above zero
    Active,
    /// remaining amount reached zero
    Settled,
}

/// how a payment was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentMethod {
    Cash,
    Card,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 2] = [PaymentMethod::Cash, PaymentMethod::Card];
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Client => "CLIENT",
        }
    }
}

impl DebtStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebtStatus::Active => "ACTIVE",
            DebtStatus::Settled => "SETTLED",
        }
    }
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Card => "CARD",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DebtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DebtStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(DebtStatus::Active),
            "SETTLED" => Ok(DebtStatus::Settled),
            other => Err(LedgerError::validation(format!("unknown debt status: {}", other))),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CASH" => Ok(PaymentMethod::Cash),
            "CARD" => Ok(PaymentMethod::Card),
            other => Err(LedgerError::validation(format!("unknown payment method: {}", other))),
        }
    }
}

static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+?[1-9]\d{1,14}$").unwrap_or_else(|e| panic!("invalid phone pattern: {}", e))
});

/// normalize and validate a phone used as login identity
pub fn normalize_phone(phone: &str) -> Result<String> {
    let trimmed = phone.trim();
    if !PHONE_PATTERN.is_match(trimmed) {
        return Err(LedgerError::validation(format!("invalid phone number: {:?}", phone)));
    }
    Ok(trimmed.to_string())
}

/// reject blank free-text fields
pub fn require_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

/// amounts entering the ledger: strictly positive and below [`Money::LIMIT`]
pub fn require_amount(amount: Money) -> Result<Money> {
    if !amount.is_positive() {
        return Err(LedgerError::non_positive_amount(amount));
    }
    if !amount.is_recordable() {
        return Err(LedgerError::amount_out_of_range(amount));
    }
    Ok(amount)
}

/// collapse blank optional text to None
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
