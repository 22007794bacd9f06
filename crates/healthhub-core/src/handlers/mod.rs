//! Query and command handlers.
//!
//! Each handler is one request/response transformation: validate and sanitize
//! the input, talk to storage, project the result into a view. Storage errors
//! propagate as [`HealthHubError::Internal`].

mod commands;
mod diagnoses;
mod patients;
mod queries;

pub use commands::*;
pub use queries::*;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::{HealthHubError, HealthHubResult};
use crate::repository::{DiagnosticResultRepository, PatientRepository};
use crate::sanitize;

/// Handler service over any store implementing both repositories.
pub struct Handlers<'a, S>
where
    S: PatientRepository + DiagnosticResultRepository + ?Sized,
{
    store: &'a S,
}

impl<'a, S> Handlers<'a, S>
where
    S: PatientRepository + DiagnosticResultRepository + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Reject the nil id before any storage call.
fn require_id(field: &'static str, id: Uuid) -> HealthHubResult<Uuid> {
    sanitize::require_valid_id(field, &id)?;
    Ok(id)
}

/// Convert a validated, non-negative paging value.
fn non_negative(value: Option<i32>) -> Option<u64> {
    value.map(|v| v.max(0) as u64)
}

fn audit(ctx: &RequestContext, action: &str, entity: &str, entity_id: Uuid) {
    tracing::info!(
        target: "healthhub::audit",
        action,
        entity,
        entity_id = %entity_id,
        caller = %ctx.caller(),
        "audit"
    );
}

fn patient_not_found(id: Uuid) -> HealthHubError {
    HealthHubError::not_found("Patient", id)
}
