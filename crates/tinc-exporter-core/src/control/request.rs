//! Request identifiers of the tinc meta/control protocol.
//!
//! The numeric values are part of the wire protocol.

use std::fmt;

/// Control protocol version sent in the handshake.
pub const CTL_VERSION_CURRENT: i32 = 0;

/// Top-level message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum RequestType {
    Id = 0,
    MetaKey = 1,
    Challenge = 2,
    ChalReply = 3,
    Ack = 4,
    Status = 5,
    Error = 6,
    TermReq = 7,
    Ping = 8,
    Pong = 9,
    AddSubnet = 10,
    DelSubnet = 11,
    AddEdge = 12,
    DelEdge = 13,
    KeyChanged = 14,
    ReqKey = 15,
    AnsKey = 16,
    Packet = 17,
    // tinc 1.1 additions
    Control = 18,
    ReqPubkey = 19,
    AnsPubkey = 20,
    SptpsPacket = 21,
    UdpInfo = 22,
    MtuInfo = 23,
    Last = 24,
}

impl RequestType {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Sub-request carried by a [`RequestType::Control`] message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Request {
    Stop = 0,
    Reload = 1,
    Restart = 2,
    DumpNodes = 3,
    DumpEdges = 4,
    DumpSubnets = 5,
    DumpConnections = 6,
    DumpGraph = 7,
    Purge = 8,
    SetDebug = 9,
    Retry = 10,
    Connect = 11,
    Disconnect = 12,
    DumpTraffic = 13,
    Pcap = 14,
    Log = 15,
}

impl Request {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// A `(type, sub-request)` pair. Its `Display` form is both the request
/// line and the prefix tincd tags every response line with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlRequest {
    pub request_type: RequestType,
    pub request: Request,
}

impl ControlRequest {
    pub const fn control(request: Request) -> Self {
        Self {
            request_type: RequestType::Control,
            request,
        }
    }

    pub const DUMP_NODES: Self = Self::control(Request::DumpNodes);
    pub const DUMP_TRAFFIC: Self = Self::control(Request::DumpTraffic);

    /// The echo prefix, e.g. `"18 3"`.
    pub fn echo(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ControlRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.request_type.code(), self.request.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_codes() {
        assert_eq!(RequestType::Id.code(), 0);
        assert_eq!(RequestType::Packet.code(), 17);
        assert_eq!(RequestType::Control.code(), 18);
        assert_eq!(RequestType::Last.code(), 24);
        assert_eq!(Request::DumpNodes.code(), 3);
        assert_eq!(Request::DumpTraffic.code(), 13);
        assert_eq!(Request::Log.code(), 15);
    }

    #[test]
    fn test_echo_prefix() {
        assert_eq!(ControlRequest::DUMP_NODES.echo(), "18 3");
        assert_eq!(ControlRequest::DUMP_TRAFFIC.echo(), "18 13");
        let edges = ControlRequest::control(Request::DumpEdges);
        assert_eq!(edges.to_string(), "18 4");
    }
}
