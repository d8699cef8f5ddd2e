use crate::*;
use std::net::Ipv6Addr;

pub const IPV6_HEADER_LEN: usize = 40;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ipv6Payload {
    Icmpv6(Icmpv6Message),
    Raw { next_header: u8, data: Vec<u8> },
}

impl Ipv6Payload {
    pub fn next_header(&self) -> IpProtocol {
        match self {
            Ipv6Payload::Icmpv6(_) => IpProtocol::Icmpv6,
            Ipv6Payload::Raw { next_header, .. } => IpProtocol::from(*next_header),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Ipv6Payload::Icmpv6(message) => message.len(),
            Ipv6Payload::Raw { data, .. } => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// IPv6 packet without extension headers. There is no header checksum in IPv6.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ipv6Packet {
    pub src_addr: Ipv6Addr,
    pub dest_addr: Ipv6Addr,
    pub hop_limit: u8,
    pub traffic_class: u8,
    pub flow_label: u32,
    pub payload: Ipv6Payload,
}

impl Ipv6Packet {
    pub fn new(src_addr: Ipv6Addr, dest_addr: Ipv6Addr, hop_limit: u8, payload: Ipv6Payload) -> Self {
        Ipv6Packet {
            src_addr,
            dest_addr,
            hop_limit,
            traffic_class: 0,
            flow_label: 0,
            payload,
        }
    }

    pub fn next_header(&self) -> IpProtocol {
        self.payload.next_header()
    }

    pub fn payload_length(&self) -> u16 {
        self.payload.len() as u16
    }

    pub fn set_hop_limit(&mut self, hop_limit: u8) {
        self.hop_limit = hop_limit;
    }
}
