//! ICMPv6 messages, including the Neighbor Discovery subset of RFC 4861 a host needs.
use crate::*;
use std::net::Ipv6Addr;

pub const ICMPV6_TYPE_DEST_UNREACHABLE: u8 = 1;
pub const ICMPV6_TYPE_TIME_EXCEEDED: u8 = 3;
pub const ICMPV6_TYPE_ECHO_REQUEST: u8 = 128;
pub const ICMPV6_TYPE_ECHO_REPLY: u8 = 129;
pub const ICMPV6_TYPE_ROUTER_SOLICITATION: u8 = 133;
pub const ICMPV6_TYPE_ROUTER_ADVERTISEMENT: u8 = 134;
pub const ICMPV6_TYPE_NEIGHBOR_SOLICITATION: u8 = 135;
pub const ICMPV6_TYPE_NEIGHBOR_ADVERTISEMENT: u8 = 136;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Icmpv6DstUnreachable {
    NoRoute = 0,
    AdminProhibited = 1,
    BeyondScope = 2,
    AddrUnreachable = 3,
    PortUnreachable = 4,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Icmpv6TimeExceeded {
    HopLimitExceeded = 0,
    FragReassemblyExceeded = 1,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ipv6Quote {
    pub src_addr: Ipv6Addr,
    pub dest_addr: Ipv6Addr,
    pub echo: Option<(u16, u16)>,
}

impl Ipv6Quote {
    pub fn of(packet: &Ipv6Packet) -> Ipv6Quote {
        let echo = match &packet.payload {
            Ipv6Payload::Icmpv6(Icmpv6Message::EchoRequest {
                identifier,
                sequence,
                ..
            }) => Some((*identifier, *sequence)),
            _ => None,
        };
        Ipv6Quote {
            src_addr: packet.src_addr,
            dest_addr: packet.dest_addr,
            echo,
        }
    }
}

/// Prefix Information option (RFC 4861 §4.6.2).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefixInformation {
    pub prefix: Ipv6Addr,
    pub prefix_len: u8,
    /// L flag
    pub on_link: bool,
    /// A flag
    pub autonomous: bool,
    pub valid_lifetime: u32,
    pub preferred_lifetime: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Icmpv6Message {
    EchoRequest {
        identifier: u16,
        sequence: u16,
        data: Vec<u8>,
    },
    EchoReply {
        identifier: u16,
        sequence: u16,
        data: Vec<u8>,
    },
    DestinationUnreachable {
        reason: Icmpv6DstUnreachable,
        original: Ipv6Quote,
    },
    TimeExceeded {
        reason: Icmpv6TimeExceeded,
        original: Ipv6Quote,
    },
    RouterSolicitation {
        source_link_addr: Option<MacAddr>,
    },
    RouterAdvertisement {
        cur_hop_limit: u8,
        managed: bool,
        other_config: bool,
        /// Seconds; zero means "not a default router".
        router_lifetime: u16,
        source_link_addr: Option<MacAddr>,
        mtu: Option<u32>,
        prefixes: Vec<PrefixInformation>,
    },
    NeighborSolicitation {
        target: Ipv6Addr,
        source_link_addr: Option<MacAddr>,
    },
    NeighborAdvertisement {
        target: Ipv6Addr,
        router: bool,
        solicited: bool,
        override_flag: bool,
        target_link_addr: Option<MacAddr>,
    },
}

impl Icmpv6Message {
    pub fn msg_type(&self) -> u8 {
        match self {
            Icmpv6Message::DestinationUnreachable { .. } => ICMPV6_TYPE_DEST_UNREACHABLE,
            Icmpv6Message::TimeExceeded { .. } => ICMPV6_TYPE_TIME_EXCEEDED,
            Icmpv6Message::EchoRequest { .. } => ICMPV6_TYPE_ECHO_REQUEST,
            Icmpv6Message::EchoReply { .. } => ICMPV6_TYPE_ECHO_REPLY,
            Icmpv6Message::RouterSolicitation { .. } => ICMPV6_TYPE_ROUTER_SOLICITATION,
            Icmpv6Message::RouterAdvertisement { .. } => ICMPV6_TYPE_ROUTER_ADVERTISEMENT,
            Icmpv6Message::NeighborSolicitation { .. } => ICMPV6_TYPE_NEIGHBOR_SOLICITATION,
            Icmpv6Message::NeighborAdvertisement { .. } => ICMPV6_TYPE_NEIGHBOR_ADVERTISEMENT,
        }
    }

    pub fn is_error(&self) -> bool {
        self.msg_type() < 128
    }

    pub fn is_neighbor_discovery(&self) -> bool {
        (ICMPV6_TYPE_ROUTER_SOLICITATION..=ICMPV6_TYPE_NEIGHBOR_ADVERTISEMENT)
            .contains(&self.msg_type())
    }

    /// Length on the wire, link-layer address options counted at 8 bytes each and prefix
    /// information options at 32.
    pub fn len(&self) -> usize {
        let lla = |addr: &Option<MacAddr>| if addr.is_some() { 8 } else { 0 };
        match self {
            Icmpv6Message::EchoRequest { data, .. } | Icmpv6Message::EchoReply { data, .. } => {
                8 + data.len()
            }
            Icmpv6Message::DestinationUnreachable { .. } | Icmpv6Message::TimeExceeded { .. } => {
                8 + IPV6_HEADER_LEN + 8
            }
            Icmpv6Message::RouterSolicitation { source_link_addr } => 8 + lla(source_link_addr),
            Icmpv6Message::RouterAdvertisement {
                source_link_addr,
                mtu,
                prefixes,
                ..
            } => {
                16 + lla(source_link_addr)
                    + if mtu.is_some() { 8 } else { 0 }
                    + 32 * prefixes.len()
            }
            Icmpv6Message::NeighborSolicitation {
                source_link_addr, ..
            } => 24 + lla(source_link_addr),
            Icmpv6Message::NeighborAdvertisement {
                target_link_addr, ..
            } => 24 + lla(target_link_addr),
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}
