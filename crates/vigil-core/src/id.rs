//! Node identity
//!
//! Node identifiers are human-readable strings of the form
//! `{hostname}-{suffix}` where the suffix is either a role name
//! (for single-instance roles) or six random hex characters.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for one participating node.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Generate a node id with a random six-hex-char suffix.
    pub fn generate() -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        NodeId(format!("{}-{}", hostname(), &suffix[..6]))
    }

    /// Generate a node id with a fixed role suffix, e.g. `myhost-motion`.
    pub fn with_role(role: &str) -> Self {
        NodeId(format!("{}-{}", hostname(), role))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

fn hostname() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| "localhost".to_string())
}
