//! VIGIL Transport - sockets only, no protocol policy
//!
//! - `BeaconSocket`: broadcast-enabled UDP socket for discovery datagrams
//! - `PubEndpoint` / `SubConnection`: the TCP pub/sub fabric; a publisher
//!   fans lines out to whoever is connected, fire-and-forget

pub mod beacon;
pub mod pubsub;

pub use beacon::*;
pub use pubsub::*;
