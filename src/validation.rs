//! Pre-write checks applied to incoming email records.

use email_address::EmailAddress;
use thiserror::Error;

use crate::models::EmailRecord;

pub const INCOMPLETE_MESSAGE: &str = "Fill all fields!";
pub const INVALID_ADDRESS_MESSAGE: &str = "Invalid email address";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Fill all fields!")]
    Incomplete,
    #[error("invalid email address '{0}'")]
    InvalidAddress(String),
}

impl ValidationError {
    /// Message returned to HTTP callers.
    pub fn public_message(&self) -> &'static str {
        match self {
            ValidationError::Incomplete => INCOMPLETE_MESSAGE,
            ValidationError::InvalidAddress(_) => INVALID_ADDRESS_MESSAGE,
        }
    }
}

/// True when every field of the record holds a non-default value.
pub fn is_complete(record: &EmailRecord) -> bool {
    !record.email.is_empty()
        && !record.title.is_empty()
        && !record.content.is_empty()
        && record.magic_number != 0
}

/// Syntax check of a `local-part@domain` address.
pub fn check_address(address: &str) -> Result<(), ValidationError> {
    if EmailAddress::is_valid(address) {
        Ok(())
    } else {
        Err(ValidationError::InvalidAddress(address.to_string()))
    }
}

/// A send trigger must name a group; zero is the unset value.
pub fn check_magic_number(magic_number: i32) -> Result<(), ValidationError> {
    if magic_number == 0 {
        Err(ValidationError::Incomplete)
    } else {
        Ok(())
    }
}

/// Completeness first, then address format.
pub fn validate(record: &EmailRecord) -> Result<(), ValidationError> {
    if !is_complete(record) {
        return Err(ValidationError::Incomplete);
    }
    check_address(&record.email)
}
