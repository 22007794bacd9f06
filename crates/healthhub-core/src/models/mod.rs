//! Domain models for the healthhub core.

mod diagnostic_result;
mod filter;
mod page;
mod patient;
mod views;

pub use diagnostic_result::*;
pub use filter::*;
pub use page::*;
pub use patient::*;
pub use views::*;

use chrono::{DateTime, SubsecRound, Utc};
use thiserror::Error;

/// A field-level validation failure raised by a domain factory or the sanitizer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Current UTC time at the precision the storage layer keeps (microseconds).
pub(crate) fn utc_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
