//! Cancellation and deadlines for storage and authorization operations.
//!
//! Every operation accepts a [`Context`]. Long-running work (a migration
//! walking every record) calls [`Context::check`] between steps, and the
//! store checks it again before committing, so a cancelled update discards
//! its staged writes exactly like a failed one.

use std::time::{Duration, Instant};

use snafu::Snafu;
use tokio_util::sync::CancellationToken;

use crate::error::{CodedError, ErrorCode};

/// Why a [`Context`] stopped admitting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Snafu)]
pub enum ContextError {
    /// The cancellation token was triggered.
    #[snafu(display("operation cancelled"))]
    Cancelled,

    /// The deadline passed.
    #[snafu(display("deadline exceeded"))]
    DeadlineExceeded,
}

impl CodedError for ContextError {
    fn code(&self) -> ErrorCode {
        ErrorCode::Unavailable
    }
}

/// Caller-supplied cancellation signal and optional deadline.
///
/// Cloning shares the cancellation token.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancellation: Option<CancellationToken>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Sets an absolute deadline, keeping an earlier one if already set.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Sets a deadline `timeout` from now.
    #[must_use]
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Time left before the deadline, if any.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Whether the context no longer admits work.
    pub fn is_done(&self) -> bool {
        self.check().is_err()
    }

    /// Returns an error if the context was cancelled or its deadline passed.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError::Cancelled`] or [`ContextError::DeadlineExceeded`].
    pub fn check(&self) -> Result<(), ContextError> {
        if self.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(ContextError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(ContextError::DeadlineExceeded);
        }
        Ok(())
    }
}
