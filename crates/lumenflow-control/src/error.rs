//! Error types for the routing runtime
use thiserror::Error;

use crate::ehub::DecodeError;
use lumenflow_core::{ConfigError, MappingError, PatchError};

/// Runtime errors of the routing pipeline.
#[derive(Error, Debug)]
pub enum ControlError {
    /// Socket setup or teardown failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An inbound datagram could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A mapping snapshot was rejected at publication.
    #[error("mapping rejected: {0}")]
    Mapping(#[from] MappingError),

    /// A patch snapshot was rejected at publication.
    #[error("patch rejected: {0}")]
    Patch(#[from] PatchError),

    /// A raw configuration was rejected.
    #[error("configuration rejected: {0}")]
    Config(#[from] ConfigError),

    /// `start` was called while the engine is running.
    #[error("router is already running")]
    AlreadyRunning,

    /// `stop` was called while the engine is stopped.
    #[error("router is not running")]
    NotRunning,
}

/// Result type for control operations.
pub type Result<T> = std::result::Result<T, ControlError>;
