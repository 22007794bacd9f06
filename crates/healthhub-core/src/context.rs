//! Per-request context: who is calling and whether they still want the answer.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{HealthHubError, HealthHubResult};

/// Authenticated caller, as established by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerIdentity(String);

impl CallerIdentity {
    pub fn new(id: impl Into<String>) -> HealthHubResult<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(HealthHubError::Unauthorized(
                "caller identity is required".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cooperative cancellation flag shared between a caller and a running request.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> HealthHubResult<()> {
        if self.is_cancelled() {
            return Err(HealthHubError::Cancelled);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    caller: CallerIdentity,
    cancellation: CancellationToken,
}

impl RequestContext {
    pub fn new(caller: CallerIdentity) -> Self {
        Self {
            caller,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(caller: CallerIdentity, cancellation: CancellationToken) -> Self {
        Self {
            caller,
            cancellation,
        }
    }

    pub fn caller(&self) -> &CallerIdentity {
        &self.caller
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Called before every storage round-trip.
    pub fn check_cancelled(&self) -> HealthHubResult<()> {
        self.cancellation.check()
    }
}
