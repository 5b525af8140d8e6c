//! Snowflake-style resource ID generation.
//!
//! Generates 64-bit IDs that are unique, roughly time-ordered, and
//! monotonically increasing per generator. New buckets get their [`Id`]
//! from an [`IdGenerator`]; [`SnowflakeGenerator`] is the default.
//!
//! # ID Structure
//!
//! ```text
//! | 42 bits: timestamp (ms since epoch) | 12 bits: worker | 10 bits: sequence |
//! ```
//!
//! - **Timestamp**: milliseconds since 2024-01-01 00:00:00 UTC (~139 years range)
//! - **Worker**: per-process identifier from entropy mixed with PID (4096 values)
//! - **Sequence**: counter within each millisecond (1024 IDs/ms per worker)
//!
//! The timestamp component is never zero after the epoch, so generated IDs
//! are always valid.

use std::{
    sync::OnceLock,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use parking_lot::Mutex;
use snafu::Snafu;

use crate::{
    error::{CodedError, ErrorCode},
    id::Id,
};

/// Custom epoch: 2024-01-01 00:00:00 UTC (milliseconds since Unix epoch).
const EPOCH_MS: u64 = 1_704_067_200_000;

/// Number of bits used for the random worker ID.
const WORKER_BITS: u32 = 12;

/// Number of bits used for the sequence portion.
const SEQUENCE_BITS: u32 = 10;

/// Mask for extracting the worker ID (12 bits).
const WORKER_MASK: u64 = (1 << WORKER_BITS) - 1;

/// Mask for extracting the sequence portion (10 bits).
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Per-process worker ID, initialized once from OS entropy mixed with PID.
static WORKER_ID: OnceLock<u64> = OnceLock::new();

fn process_worker_id() -> u64 {
    *WORKER_ID.get_or_init(|| {
        use rand::Rng;
        let pid = u64::from(std::process::id());
        (rand::rng().random::<u64>() ^ pid) & WORKER_MASK
    })
}

/// Errors from ID generation.
#[derive(Debug, Snafu)]
pub enum SnowflakeError {
    /// System clock is before the generator epoch.
    #[snafu(display("system clock is before the ID epoch"))]
    SystemClock,
}

impl CodedError for SnowflakeError {
    fn code(&self) -> ErrorCode {
        ErrorCode::Internal
    }
}

/// Source of fresh resource identifiers.
pub trait IdGenerator: Send + Sync {
    /// Returns a new, valid, never-before-returned identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SnowflakeError`] if an identifier cannot be produced.
    fn generate(&self) -> Result<Id, SnowflakeError>;
}

/// Sequence state for one generator.
#[derive(Debug, Default)]
struct SnowflakeState {
    last_timestamp: u64,
    sequence: u64,
}

/// Time-ordered [`IdGenerator`].
///
/// Each generator keeps its own sequence; generators in the same process
/// share the worker component, so share one generator per process.
#[derive(Debug)]
pub struct SnowflakeGenerator {
    worker: u64,
    state: Mutex<SnowflakeState>,
}

impl SnowflakeGenerator {
    /// Creates a generator using the per-process worker ID.
    pub fn new() -> Self {
        Self::with_worker(process_worker_id())
    }

    /// Creates a generator with an explicit worker ID (truncated to 12 bits).
    pub fn with_worker(worker: u64) -> Self {
        Self { worker: worker & WORKER_MASK, state: Mutex::new(SnowflakeState::default()) }
    }

    /// Worker component stamped into every generated ID.
    pub fn worker(&self) -> u64 {
        self.worker
    }

    fn next_raw(&self) -> Result<u64, SnowflakeError> {
        loop {
            let now_ms = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_err(|_| SnowflakeError::SystemClock)?
                .as_millis() as u64;
            let timestamp = now_ms.checked_sub(EPOCH_MS).ok_or(SnowflakeError::SystemClock)?;

            let mut state = self.state.lock();
            if timestamp > state.last_timestamp {
                state.last_timestamp = timestamp;
                state.sequence = 0;
            } else {
                // Same millisecond, or the clock went backwards: stay on the
                // last timestamp to keep IDs monotonic.
                state.sequence += 1;
                if state.sequence > SEQUENCE_MASK {
                    drop(state);
                    std::thread::sleep(Duration::from_millis(1));
                    continue;
                }
            }

            return Ok((state.last_timestamp << (WORKER_BITS + SEQUENCE_BITS))
                | (self.worker << SEQUENCE_BITS)
                | state.sequence);
        }
    }
}

impl Default for SnowflakeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SnowflakeGenerator {
    fn generate(&self) -> Result<Id, SnowflakeError> {
        self.next_raw().map(Id::new)
    }
}

/// Extracts the timestamp portion (ms since 2024-01-01 UTC) from an ID.
#[must_use]
pub fn extract_timestamp(id: Id) -> u64 {
    id.value() >> (WORKER_BITS + SEQUENCE_BITS)
}

/// Extracts the worker portion from an ID.
#[must_use]
pub fn extract_worker(id: Id) -> u64 {
    (id.value() >> SEQUENCE_BITS) & WORKER_MASK
}

/// Extracts the sequence portion from an ID.
#[must_use]
pub fn extract_sequence(id: Id) -> u64 {
    id.value() & SEQUENCE_MASK
}
