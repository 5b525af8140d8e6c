//! Errors surfaced by the `tessera` binary.

use snafu::Snafu;
use tessera_kv::KvError;
use tessera_types::{CodedError, ConfigError, ErrorCode};

/// Errors returned by admin commands.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AdminError {
    /// The configuration could not be loaded.
    #[snafu(display("{source}"))]
    Config {
        /// The config error.
        source: ConfigError,
    },

    /// The store could not be opened.
    #[snafu(display("failed to open store: {source}"))]
    OpenStore {
        /// The store error.
        source: tessera_store::Error,
    },

    /// A resource service operation failed.
    #[snafu(display("{source}"))]
    Service {
        /// The service error.
        source: KvError,
    },

    /// Buckets were requested from a dataset that is not migrated while
    /// automatic migration is disabled.
    #[snafu(display("data is not migrated; run `tessera migration run` first"))]
    NotMigrated,

    /// Output could not be written.
    #[snafu(display("failed to write output: {source}"))]
    Output {
        /// The I/O error.
        source: std::io::Error,
    },

    /// A bucket could not be rendered as JSON.
    #[snafu(display("failed to render bucket: {source}"))]
    Render {
        /// The JSON error.
        source: serde_json::Error,
    },
}

impl CodedError for AdminError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::Config { source } => source.code(),
            Self::OpenStore { source } => source.code(),
            Self::Service { source } => source.code(),
            Self::NotMigrated => ErrorCode::Unavailable,
            Self::Output { .. } | Self::Render { .. } => ErrorCode::Internal,
        }
    }
}
