//! Discovery datagrams
//!
//! `{"type": "discover"|"announce", "node_id": ..., "ip": ..., "port": ...}`
//!
//! Discover is broadcast on a cycle; Announce is a unicast reply sent
//! directly to a discover's sender so that peer learns about this node
//! without waiting for its own next round.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use vigil_core::{NodeId, VigilError, VigilResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryKind {
    Discover,
    Announce,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryMessage {
    #[serde(rename = "type")]
    pub kind: DiscoveryKind,
    pub node_id: NodeId,
    /// Advertised address. Nodes behind quirky interfaces may omit it;
    /// the receiver then falls back to the datagram's source address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<IpAddr>,
    pub port: u16,
}

impl DiscoveryMessage {
    pub fn discover(node_id: NodeId, ip: IpAddr, port: u16) -> Self {
        DiscoveryMessage {
            kind: DiscoveryKind::Discover,
            node_id,
            ip: Some(ip),
            port,
        }
    }

    pub fn announce(node_id: NodeId, ip: IpAddr, port: u16) -> Self {
        DiscoveryMessage {
            kind: DiscoveryKind::Announce,
            node_id,
            ip: Some(ip),
            port,
        }
    }

    pub fn encode(&self) -> VigilResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(VigilError::codec)
    }

    pub fn decode(buf: &[u8]) -> VigilResult<Self> {
        serde_json::from_slice(buf).map_err(VigilError::codec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_wire_shape() {
        let msg = DiscoveryMessage::discover(NodeId::from("cam1-abc123"), "10.0.0.7".parse().unwrap(), 5555);
        let value: serde_json::Value = serde_json::from_slice(&msg.encode().unwrap()).unwrap();

        assert_eq!(value["type"], "discover");
        assert_eq!(value["node_id"], "cam1-abc123");
        assert_eq!(value["ip"], "10.0.0.7");
        assert_eq!(value["port"], 5555);
    }

    #[test]
    fn test_announce_roundtrip() {
        let msg = DiscoveryMessage::announce(NodeId::from("gw-1"), "192.168.1.4".parse().unwrap(), 5555);
        let decoded = DiscoveryMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(decoded.kind, DiscoveryKind::Announce);
    }

    #[test]
    fn test_malformed_datagram_is_codec_error() {
        let err = DiscoveryMessage::decode(b"{not json").unwrap_err();
        assert!(matches!(err, vigil_core::VigilError::Codec(_)));
    }

    #[test]
    fn test_missing_ip_decodes_as_none() {
        let msg = DiscoveryMessage::decode(
            br#"{"type":"discover","node_id":"cam1-abc123","port":5555}"#,
        )
        .unwrap();
        assert_eq!(msg.ip, None);
        assert_eq!(msg.port, 5555);
    }
}
