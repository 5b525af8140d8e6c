//! Core types for Tessera.
//!
//! This crate provides the foundational types shared by every other crate:
//! - [`Id`], the hex-encoded 64-bit resource identifier
//! - Resource records ([`Bucket`], the legacy [`OldBucket`]) and [`BucketFilter`]
//! - The permission model ([`Permission`], [`Authorizer`])
//! - The resource codec used to store records as opaque bytes
//! - Cancellation [`Context`], configuration types and ID generation
//! - Error codes using snafu

#![deny(unsafe_code)]

pub mod authorizer;
pub mod bucket;
pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod id;
pub mod permission;
pub mod snowflake;

// Re-export commonly used types at crate root
pub use authorizer::{
    Authorization, AuthorizationStatus, Authorizer, AuthorizerKind, Session, permission_allowed,
};
pub use bucket::{Bucket, BucketFilter, BucketFinder, OldBucket, convert_old_bucket_to_new};
pub use codec::{CodecError, decode, encode};
pub use config::{Config, ConfigError, LogFormat};
pub use context::{Context, ContextError};
pub use error::{CodedError, ErrorCode};
pub use id::{Id, IdError};
pub use permission::{Action, Permission, PermissionError, Resource, ResourceType};
pub use snowflake::{IdGenerator, SnowflakeError, SnowflakeGenerator};
