//! VIGIL Core - Fundamental types and primitives
//!
//! This crate defines the core types used throughout the VIGIL mesh:
//! - Node identifiers
//! - Wall-clock timestamps (ISO-8601 on the wire)
//! - Configuration defaults
//! - Error taxonomy and cooperative shutdown

pub mod config;
pub mod error;
pub mod id;
pub mod shutdown;
pub mod time;

pub use config::*;
pub use error::*;
pub use id::*;
pub use shutdown::*;
pub use time::*;
