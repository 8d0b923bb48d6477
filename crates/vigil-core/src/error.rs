//! Error types for the VIGIL mesh
//!
//! Per-message errors (socket read/write failures, malformed datagrams,
//! corrupt payloads) are handled at the owning loop: logged, then the loop
//! continues. The only error treated as fatal at startup is failure to bind
//! the node's publish endpoint.

use thiserror::Error;

/// Core VIGIL errors
#[derive(Error, Debug)]
pub enum VigilError {
    // Transient network errors - logged, loop continues
    #[error("transport error: {0}")]
    Transport(String),

    // Bind failures degrade the owning subsystem (discovery disabled, etc.)
    // except for the publish endpoint, where they abort startup
    #[error("failed to bind port {port}: {source}")]
    BindFailed {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    // Wire-level decode errors - message dropped
    #[error("codec error: {0}")]
    Codec(String),

    #[error("payload decode error: {0}")]
    PayloadDecode(String),

    // An internal channel's other end went away (normally during shutdown)
    #[error("channel closed")]
    ChannelClosed,
}

/// Result type for VIGIL operations
pub type VigilResult<T> = Result<T, VigilError>;

impl VigilError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        VigilError::Transport(err.to_string())
    }

    pub fn codec(err: impl std::fmt::Display) -> Self {
        VigilError::Codec(err.to_string())
    }
}
