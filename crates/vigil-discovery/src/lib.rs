//! VIGIL Discovery - who is reachable, and how we find out
//!
//! The [`PeerRegistry`] is the single source of truth for reachable peers;
//! the [`DiscoveryBeacon`] populates it with a symmetric broadcast/announce
//! protocol that needs no central registry.

pub mod beacon;
pub mod net;
pub mod registry;

pub use beacon::*;
pub use net::*;
pub use registry::*;
