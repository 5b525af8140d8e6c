//! Mock collaborators for the pre-authorizer and resource services.
//!
//! - [`RecordingAuthorizer`]: grants a fixed permission set and records every check
//! - [`MockBucketFinder`]: resolves filters against an in-memory bucket list
//! - [`SequenceIdGenerator`]: hands out 1, 2, 3, ...

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use snafu::Snafu;
use tessera_types::{
    AuthorizerKind, Bucket, BucketFilter, BucketFinder, CodedError, Context, ErrorCode, Id,
    IdGenerator, Permission, SnowflakeError, authorizer::Authorizer, permission_allowed,
};

/// Authorizer granting a fixed permission set.
///
/// Every call to [`Authorizer::allowed`] is recorded, so tests can assert
/// which checks ran and in which order.
#[derive(Debug, Default)]
pub struct RecordingAuthorizer {
    granted: Vec<Permission>,
    checked: Mutex<Vec<Permission>>,
}

impl RecordingAuthorizer {
    /// Grants exactly `granted`.
    pub fn new(granted: Vec<Permission>) -> Self {
        Self { granted, checked: Mutex::new(Vec::new()) }
    }

    /// Grants nothing.
    pub fn deny_all() -> Self {
        Self::default()
    }

    /// Permissions checked so far, in call order.
    pub fn checked(&self) -> Vec<Permission> {
        self.checked.lock().clone()
    }
}

impl Authorizer for RecordingAuthorizer {
    fn allowed(&self, permission: &Permission) -> bool {
        self.checked.lock().push(permission.clone());
        permission_allowed(permission, &self.granted)
    }

    fn identifier(&self) -> Id {
        Id::new(1)
    }

    fn user_id(&self) -> Id {
        Id::new(1)
    }

    fn kind(&self) -> AuthorizerKind {
        AuthorizerKind::Authorization
    }
}

/// Errors returned by [`MockBucketFinder`].
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum MockFinderError {
    /// No bucket matched.
    #[snafu(display("bucket not found"))]
    NotFound,

    /// Injected lookup failure.
    #[snafu(display("lookup failed: {message}"))]
    Failed {
        /// Description of the injected failure.
        message: String,
    },
}

impl CodedError for MockFinderError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound => ErrorCode::NotFound,
            Self::Failed { .. } => ErrorCode::Internal,
        }
    }
}

/// Bucket lookup over an in-memory list.
///
/// Returns the first bucket, in insertion order, that the filter matches.
#[derive(Debug, Default)]
pub struct MockBucketFinder {
    buckets: Vec<Bucket>,
    failure: Option<String>,
    lookups: AtomicU64,
}

impl MockBucketFinder {
    /// Resolves against `buckets`.
    pub fn new(buckets: Vec<Bucket>) -> Self {
        Self { buckets, failure: None, lookups: AtomicU64::new(0) }
    }

    /// Makes every lookup fail with an internal error.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Number of lookups performed.
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl BucketFinder for MockBucketFinder {
    type Error = MockFinderError;

    fn find_bucket(&self, _ctx: &Context, filter: &BucketFilter) -> Result<Bucket, Self::Error> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(MockFinderError::Failed { message: message.clone() });
        }
        self.buckets
            .iter()
            .find(|bucket| filter.matches(bucket))
            .cloned()
            .ok_or(MockFinderError::NotFound)
    }
}

/// Deterministic identifier generator: 1, 2, 3, ...
#[derive(Debug)]
pub struct SequenceIdGenerator {
    next: AtomicU64,
}

impl SequenceIdGenerator {
    /// Starts the sequence at `first`.
    pub fn starting_at(first: u64) -> Self {
        Self { next: AtomicU64::new(first.max(1)) }
    }
}

impl Default for SequenceIdGenerator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl IdGenerator for SequenceIdGenerator {
    fn generate(&self) -> Result<Id, SnowflakeError> {
        Ok(Id::new(self.next.fetch_add(1, Ordering::SeqCst)))
    }
}
