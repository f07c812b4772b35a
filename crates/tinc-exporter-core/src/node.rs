//! Node records from `dump nodes` and the reachability model derived from them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::scan::{DecodeError, Fields, LineDecoder, LineOutcome};

/// Host value tincd reports for its own node.
pub const MYSELF: &str = "MYSELF";

/// The node status word as reported by tincd.
///
/// Only a few bits are interpreted here; the rest are kept as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeStatus(pub u32);

impl NodeStatus {
    pub const VALID_KEY: u32 = 0x02;
    pub const REACHABLE: u32 = 0x10;
    pub const INDIRECT: u32 = 0x20;

    pub fn valid_key(self) -> bool {
        self.0 & Self::VALID_KEY != 0
    }

    pub fn reachable(self) -> bool {
        self.0 & Self::REACHABLE != 0
    }

    pub fn indirect(self) -> bool {
        self.0 & Self::INDIRECT != 0
    }
}

/// How packets currently get from this daemon to a node.
///
/// The discriminants are the values exported on the reachability gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Reachability {
    CanReachItself = 1,
    DirectlyWithUdp = 2,
    DirectlyWithTcp = 3,
    IndirectViaOtherNode = 4,
    ForwardedViaOtherNode = 5,
    Unreachable = 6,
    Unknown = 7,
}

impl Reachability {
    /// Numeric value for the reachability gauge.
    pub fn value(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Reachability::CanReachItself => "can reach itself",
            Reachability::DirectlyWithUdp => "directly with UDP",
            Reachability::DirectlyWithTcp => "directly with TCP",
            Reachability::IndirectViaOtherNode => "indirectly via other node",
            Reachability::ForwardedViaOtherNode => "forwarded via other node",
            Reachability::Unreachable => "unreachable",
            Reachability::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One row of a `dump nodes` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    pub id: String,
    pub host: String,
    pub port: String,
    pub cipher: i32,
    pub compression: i32,
    pub options: u32,
    pub status: NodeStatus,
    pub nexthop: String,
    pub via: String,
    pub distance: i32,
    pub pmtu: i32,
    pub min_mtu: i32,
    pub max_mtu: i32,
    pub last_state_change: i64,
    /// UDP ping round-trip time in milliseconds; 0 when unmeasured.
    pub udp_ping_rtt: f64,
    pub in_packets: u64,
    pub in_bytes: u64,
    pub out_packets: u64,
    pub out_bytes: u64,
}

impl NodeRecord {
    /// Whether this row describes the local daemon itself.
    pub fn is_myself(&self) -> bool {
        self.host == MYSELF
    }

    /// Whether a UDP path to this node has been probed.
    fn udp_probed(&self) -> bool {
        self.min_mtu > 0
    }

    /// Classify the path to this node. Checks are ordered; the first match wins.
    pub fn reachability(&self) -> Reachability {
        if self.is_myself() {
            Reachability::CanReachItself
        } else if !self.status.reachable() {
            Reachability::Unreachable
        } else if self.via != self.name {
            Reachability::IndirectViaOtherNode
        } else if !self.status.valid_key() {
            Reachability::Unknown
        } else if self.udp_probed() {
            Reachability::DirectlyWithUdp
        } else if self.nexthop == self.name {
            Reachability::DirectlyWithTcp
        } else {
            Reachability::ForwardedViaOtherNode
        }
    }

    /// The intermediate node for indirect or forwarded paths, empty otherwise.
    pub fn via_peer(&self) -> &str {
        match self.reachability() {
            Reachability::IndirectViaOtherNode => &self.via,
            Reachability::ForwardedViaOtherNode => &self.nexthop,
            _ => "",
        }
    }

    /// Path MTU, or 0 while no UDP path has been probed.
    pub fn effective_path_mtu(&self) -> i32 {
        if self.udp_probed() { self.pmtu } else { 0 }
    }

    /// UDP round-trip time in seconds, or 0 while no UDP path has been probed.
    pub fn round_trip_seconds(&self) -> f64 {
        if self.udp_probed() {
            self.udp_ping_rtt / 1000.0
        } else {
            0.0
        }
    }
}

impl LineDecoder for NodeRecord {
    fn decode_line(line: &str) -> Result<LineOutcome<Self>, DecodeError> {
        let mut f = Fields::new(line);
        let name = f.text("name")?.to_string();
        let id = f.text("id")?.to_string();
        let host = f.text("host")?.to_string();
        f.literal("port")?;
        let port = f.text("port")?.to_string();
        let cipher = f.parse("cipher")?;
        f.skip::<i64>("digest")?;
        f.skip::<i64>("maclength")?;
        let compression = f.parse("compression")?;
        let options = f.hex("options")?;
        let status = NodeStatus(f.hex("status")?);
        let nexthop = f.text("nexthop")?.to_string();
        let via = f.text("via")?.to_string();
        let distance = f.parse("distance")?;
        let pmtu = f.parse("pmtu")?;
        let min_mtu = f.parse("minmtu")?;
        let max_mtu = f.parse("maxmtu")?;
        let last_state_change = f.parse("last_state_change")?;
        let udp_ping_rtt = f.parse("udp_ping_rtt")?;
        let in_packets = f.parse("in_packets")?;
        let in_bytes = f.parse("in_bytes")?;
        let out_packets = f.parse("out_packets")?;
        let out_bytes = f.parse("out_bytes")?;
        f.finish()?;

        Ok(LineOutcome::Record(NodeRecord {
            name,
            id,
            host,
            port,
            cipher,
            compression,
            options,
            status,
            nexthop,
            via,
            distance,
            pmtu,
            min_mtu,
            max_mtu,
            last_state_change,
            udp_ping_rtt,
            in_packets,
            in_bytes,
            out_packets,
            out_bytes,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = "nodeA idA 10.0.0.1 port 655 0 0 0 0 12 30 nodeA nodeA 0 1400 1300 1400 1000000 2.5 10 1000 20 2000";

    fn decode(line: &str) -> NodeRecord {
        match NodeRecord::decode_line(line).unwrap() {
            LineOutcome::Record(n) => n,
            LineOutcome::Stop => panic!("node decoder never stops"),
        }
    }

    /// A reachable, keyed node talking to us directly with no UDP probe yet.
    fn peer(name: &str) -> NodeRecord {
        NodeRecord {
            name: name.to_string(),
            id: "0123456789ab".to_string(),
            host: "192.0.2.7".to_string(),
            port: "655".to_string(),
            cipher: 0,
            compression: 0,
            options: 0,
            status: NodeStatus(NodeStatus::REACHABLE | NodeStatus::VALID_KEY),
            nexthop: name.to_string(),
            via: name.to_string(),
            distance: 1,
            pmtu: 1518,
            min_mtu: 0,
            max_mtu: 1518,
            last_state_change: 1_700_000_000,
            udp_ping_rtt: 0.0,
            in_packets: 0,
            in_bytes: 0,
            out_packets: 0,
            out_bytes: 0,
        }
    }

    #[test]
    fn test_status_bits() {
        for bits in [0u32, 0x01, 0x02, 0x10, 0x12, 0x20, 0x32, 0xffff_ffff, 0xffff_ffed] {
            let s = NodeStatus(bits);
            assert_eq!(s.reachable(), bits & 0x10 != 0, "bits {bits:#x}");
            assert_eq!(s.valid_key(), bits & 0x02 != 0, "bits {bits:#x}");
            assert_eq!(s.indirect(), bits & 0x20 != 0, "bits {bits:#x}");
        }
    }

    #[test]
    fn test_decode_sample_line() {
        let n = decode(SAMPLE);
        assert_eq!(n.name, "nodeA");
        assert_eq!(n.id, "idA");
        assert_eq!(n.host, "10.0.0.1");
        assert_eq!(n.port, "655");
        assert_eq!(n.options, 0x12);
        assert_eq!(n.status, NodeStatus(0x30));
        assert_eq!(n.nexthop, "nodeA");
        assert_eq!(n.via, "nodeA");
        assert_eq!(n.pmtu, 1400);
        assert_eq!(n.min_mtu, 1300);
        assert_eq!(n.max_mtu, 1400);
        assert_eq!(n.last_state_change, 1_000_000);
        assert_eq!(n.udp_ping_rtt, 2.5);
        assert_eq!(
            (n.in_packets, n.in_bytes, n.out_packets, n.out_bytes),
            (10, 1000, 20, 2000)
        );
        assert_eq!(n.round_trip_seconds(), 0.0025);
        assert_eq!(n.effective_path_mtu(), 1400);
        // 0x30 is reachable + indirect but has no valid-key bit.
        assert_eq!(n.reachability(), Reachability::Unknown);
    }

    #[test]
    fn test_decode_sample_line_with_valid_key_is_udp() {
        let line = SAMPLE.replace(" 12 30 ", " 12 32 ");
        let n = decode(&line);
        // nexthop == name would also qualify for TCP; the UDP probe wins.
        assert_eq!(n.reachability(), Reachability::DirectlyWithUdp);
        assert_eq!(n.round_trip_seconds(), 0.0025);
        assert_eq!(n.via_peer(), "");
    }

    #[test]
    fn test_decode_rejects_short_line() {
        let err = NodeRecord::decode_line("nodeA idA 10.0.0.1 port 655 0 0 0").unwrap_err();
        assert_eq!(
            err,
            DecodeError::Missing {
                field: "compression",
                position: 9
            }
        );
    }

    #[test]
    fn test_decode_rejects_trailing_fields() {
        let err = NodeRecord::decode_line(&format!("{SAMPLE} extra")).unwrap_err();
        assert!(matches!(err, DecodeError::Trailing { count: 1, .. }));
    }

    #[test]
    fn test_decode_rejects_missing_port_literal() {
        let line = SAMPLE.replace(" port ", " prt ");
        let err = NodeRecord::decode_line(&line).unwrap_err();
        assert!(matches!(err, DecodeError::Literal { expected: "port", .. }));
    }

    #[test]
    fn test_decode_rejects_non_hex_status() {
        let line = SAMPLE.replace(" 12 30 ", " 12 zz ");
        let err = NodeRecord::decode_line(&line).unwrap_err();
        assert!(matches!(err, DecodeError::Invalid { field: "status", .. }));
    }

    #[test]
    fn test_myself_wins_over_everything() {
        let mut n = peer("self");
        n.host = MYSELF.to_string();
        for status in [0, 0x02, 0x10, 0x30] {
            n.status = NodeStatus(status);
            n.via = "elsewhere".to_string();
            n.min_mtu = 1200;
            assert_eq!(n.reachability(), Reachability::CanReachItself);
        }
        assert_eq!(n.via_peer(), "");
    }

    #[test]
    fn test_unreachable_ignores_routing_fields() {
        let mut n = peer("b");
        n.status = NodeStatus(NodeStatus::VALID_KEY);
        n.via = "c".to_string();
        n.nexthop = "d".to_string();
        n.min_mtu = 1400;
        assert_eq!(n.reachability(), Reachability::Unreachable);
        assert_eq!(n.via_peer(), "");
    }

    #[test]
    fn test_indirect_precedes_key_and_udp_checks() {
        let mut n = peer("b");
        n.status = NodeStatus(NodeStatus::REACHABLE);
        n.via = "relay".to_string();
        n.min_mtu = 1400;
        assert_eq!(n.reachability(), Reachability::IndirectViaOtherNode);
        assert_eq!(n.via_peer(), "relay");
    }

    #[test]
    fn test_unknown_without_valid_key() {
        let mut n = peer("b");
        n.status = NodeStatus(NodeStatus::REACHABLE);
        n.min_mtu = 1400;
        assert_eq!(n.reachability(), Reachability::Unknown);
    }

    #[test]
    fn test_direct_tcp_and_forwarded() {
        let n = peer("b");
        assert_eq!(n.reachability(), Reachability::DirectlyWithTcp);
        assert_eq!(n.via_peer(), "");

        let mut fwd = peer("b");
        fwd.nexthop = "hub".to_string();
        assert_eq!(fwd.reachability(), Reachability::ForwardedViaOtherNode);
        assert_eq!(fwd.via_peer(), "hub");
    }

    #[test]
    fn test_rtt_and_pmtu_guarded_by_min_mtu() {
        let mut n = peer("b");
        n.udp_ping_rtt = 12.0;
        assert_eq!(n.round_trip_seconds(), 0.0);
        assert_eq!(n.effective_path_mtu(), 0);

        n.min_mtu = 1;
        assert_eq!(n.round_trip_seconds(), 12.0 / 1000.0);
        assert_eq!(n.effective_path_mtu(), 1518);
    }

    #[test]
    fn test_reachability_values_and_display() {
        assert_eq!(Reachability::CanReachItself.value(), 1);
        assert_eq!(Reachability::Unknown.value(), 7);
        assert_eq!(Reachability::IndirectViaOtherNode.to_string(), "indirectly via other node");
        assert_eq!(
            serde_json::to_string(&Reachability::DirectlyWithUdp).unwrap(),
            "\"directly_with_udp\""
        );
    }
}
