//! Administrative command line for Tessera stores.
//!
//! The `tessera` binary opens a store, brings it to the current schema and
//! inspects its contents:
//!
//! ```bash
//! # Show the migration flag
//! tessera --data /var/lib/tessera/tessera.db migration status
//!
//! # Convert legacy records, giving up after two minutes
//! tessera --data /var/lib/tessera/tessera.db migration run --timeout 2m
//!
//! # List an organization's buckets as JSON lines
//! TESSERA__STORAGE__PATH=/var/lib/tessera/tessera.db tessera buckets list --org-id 000000000000000a
//! ```

#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;

pub use cli::Cli;
pub use error::AdminError;
