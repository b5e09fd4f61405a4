//! Error taxonomy for the execution layer, split between per-action
//! failures and invocation-fatal conditions.

use core::result::Result as CoreResult;
use std::io::Error as IoError;

use thiserror::Error;
use toml::de::Error as TomlError;

/// Result type for execution-layer operations.
pub type Result<T> = CoreResult<T, Error>;

/// Errors that can occur in the standalone execution layer.
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// TOML deserialization failed.
    #[error("TOML deserialization error: {0}")]
    Toml(#[from] TomlError),

    /// Configuration is invalid or a required options section is missing.
    ///
    /// Fatal at strategy-assembly time, before any action runs.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An explicit strategy override named an implementation that was
    /// never registered for the requested capability.
    #[error("No strategy named '{name}' registered for capability {capability}")]
    UnknownStrategy {
        /// The override name the action requested.
        name: String,
        /// The capability the lookup was scoped to.
        capability: String,
    },

    /// The resource acquire/release protocol was violated.
    ///
    /// Indicates a programming error (double release or release without
    /// acquire); fatal to the invocation.
    #[error("Resource protocol violation: {0}")]
    ResourceProtocol(String),

    /// The build was interrupted and the operation unwound cleanly.
    ///
    /// Not a failure: resources are released before this is returned.
    #[error("Operation cancelled")]
    Cancelled,

    /// A general error not covered by other variants.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error is the distinguished cancellation outcome.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether this error aborts the whole invocation rather than a
    /// single action.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::UnknownStrategy { .. } | Self::ResourceProtocol(_)
        )
    }
}
