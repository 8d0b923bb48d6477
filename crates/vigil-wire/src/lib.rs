//! VIGIL Wire - JSON message shapes
//!
//! Two wire surfaces, both JSON:
//! - discovery datagrams over UDP (`DiscoveryMessage`)
//! - mesh envelopes over the pub/sub fabric (`Envelope`), one JSON object
//!   per newline-terminated line
//!
//! Field names (`type`, `node_id`, `ts`, `image_data`, ...) are fixed; they
//! are the compatibility contract with every node already in the fleet.

pub mod discovery;
pub mod envelope;

pub use discovery::*;
pub use envelope::*;

/// Upper bound for a discovery datagram.
pub const MAX_DATAGRAM_SIZE: usize = 4096;
