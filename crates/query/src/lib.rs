//! tessera-query: permission pre-authorization for queries.
//!
//! A query reports the buckets it touches through [`BucketsAccessed`]. A
//! [`PreAuthorizer`] resolves each reference to a bucket and checks the
//! matching read or write permission against the caller's
//! [`Authorizer`](tessera_types::Authorizer), failing fast on the first denial.
//!
//! ```no_run
//! use tessera_query::{BucketPreAuthorizer, PreAuthorizer, QueryReferences};
//! use tessera_types::{BucketFilter, Context, Id};
//! # fn run(
//! #     finder: impl tessera_types::BucketFinder,
//! #     auth: &dyn tessera_types::Authorizer,
//! # ) -> tessera_query::Result<()> {
//! let org_id = Id::new(0x0a);
//! let query = QueryReferences::new().with_read(BucketFilter::by_name(org_id, "telemetry"));
//!
//! BucketPreAuthorizer::new(finder).pre_authorize(&Context::background(), &query, auth, Some(org_id))?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod preauthorizer;
pub mod references;

pub use error::{QueryError, Result};
pub use preauthorizer::{BucketPreAuthorizer, PreAuthorizer};
pub use references::{BucketsAccessed, QueryReferences};
