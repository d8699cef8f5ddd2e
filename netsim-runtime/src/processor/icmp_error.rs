use crate::processor::Processor;
use netsim_packets::{
    IcmpMessage, Icmpv4DstUnreachable, Icmpv4TimeExceeded, Icmpv6DstUnreachable, Icmpv6Message,
    Icmpv6TimeExceeded, Ipv4Packet, Ipv4Payload, Ipv4Quote, Ipv6Packet, Ipv6Payload, Ipv6Quote,
};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Helper to generate ICMPv4 error messages
#[derive(Clone, Debug)]
pub struct Icmpv4ErrorGenerator {
    src_ip: Ipv4Addr,
    ttl: u8,
    bad_source_addrs: Vec<Ipv4Addr>,
}

impl Icmpv4ErrorGenerator {
    /// Create an ICMPv4 error generator
    ///
    /// # Arguments
    ///
    /// * `src_ip` - The source IPv4 address of the generated errors
    /// * `bad_source_addrs` - Packets from these IP addresses will generate a None instead of an
    /// an ICMP error. Intended to contain the broadcast address of a subnet
    pub fn new(src_ip: Ipv4Addr, bad_source_addrs: Vec<Ipv4Addr>) -> Icmpv4ErrorGenerator {
        Icmpv4ErrorGenerator {
            src_ip,
            ttl: 64,
            bad_source_addrs,
        }
    }

    pub fn src_ip(&self) -> Ipv4Addr {
        self.src_ip
    }

    /// Create an ICMPv4 TTL exceeded error message. Return `None` if an ICMP error message should
    /// not be generated, and the packet should be silently discarded instead
    pub fn ttl_exceeded_error(&self, packet: &Ipv4Packet) -> Option<Ipv4Packet> {
        self.generic_error(
            packet,
            IcmpMessage::TimeExceeded {
                reason: Icmpv4TimeExceeded::TtlExpired,
                original: Ipv4Quote::of(packet),
            },
        )
    }

    pub fn dst_unreachable_error(
        &self,
        packet: &Ipv4Packet,
        reason: Icmpv4DstUnreachable,
    ) -> Option<Ipv4Packet> {
        self.generic_error(
            packet,
            IcmpMessage::DestinationUnreachable {
                reason,
                original: Ipv4Quote::of(packet),
            },
        )
    }

    fn generic_error(&self, packet: &Ipv4Packet, message: IcmpMessage) -> Option<Ipv4Packet> {
        if !self.should_generate_error(packet) {
            return None;
        }
        let mut error = Ipv4Packet::new(
            self.src_ip,
            packet.src_addr,
            self.ttl,
            Ipv4Payload::Icmp(message),
        );
        error.dscp = packet.dscp;
        error.set_checksum();
        Some(error)
    }

    // Performs checks based on RFC 1812 4.3.2.7 (When Not to Send ICMP Errors)
    fn should_generate_error(&self, packet: &Ipv4Packet) -> bool {
        // Avoid infinite loops, no errors from errors
        if let Ipv4Payload::Icmp(message) = &packet.payload {
            if message.is_error() {
                return false;
            }
        }
        // No broadcast, multicast, unspecified or loopback sources
        let src = packet.src_addr;
        if src.is_broadcast() || src.is_multicast() || src.is_unspecified() || src.is_loopback() {
            return false;
        }
        !self.bad_source_addrs.contains(&src)
    }
}

/// Turns a packet whose TTL ran out into the error sent back to its source.
impl Processor for Icmpv4ErrorGenerator {
    type Input = Ipv4Packet;
    type Output = Ipv4Packet;

    fn process(&mut self, packet: Self::Input) -> Option<Self::Output> {
        self.ttl_exceeded_error(&packet)
    }
}

/// ICMPv6 counterpart of `Icmpv4ErrorGenerator` (RFC 4443 §2.4 (e)).
#[derive(Clone, Debug)]
pub struct Icmpv6ErrorGenerator {
    src_ip: Ipv6Addr,
    hop_limit: u8,
}

impl Icmpv6ErrorGenerator {
    pub fn new(src_ip: Ipv6Addr) -> Icmpv6ErrorGenerator {
        Icmpv6ErrorGenerator {
            src_ip,
            hop_limit: 64,
        }
    }

    pub fn hop_limit_exceeded_error(&self, packet: &Ipv6Packet) -> Option<Ipv6Packet> {
        self.generic_error(
            packet,
            Icmpv6Message::TimeExceeded {
                reason: Icmpv6TimeExceeded::HopLimitExceeded,
                original: Ipv6Quote::of(packet),
            },
        )
    }

    pub fn dst_unreachable_error(
        &self,
        packet: &Ipv6Packet,
        reason: Icmpv6DstUnreachable,
    ) -> Option<Ipv6Packet> {
        self.generic_error(
            packet,
            Icmpv6Message::DestinationUnreachable {
                reason,
                original: Ipv6Quote::of(packet),
            },
        )
    }

    fn generic_error(&self, packet: &Ipv6Packet, message: Icmpv6Message) -> Option<Ipv6Packet> {
        if let Ipv6Payload::Icmpv6(original) = &packet.payload {
            if original.is_error() {
                return None;
            }
        }
        let src = packet.src_addr;
        if src.is_multicast() || src.is_unspecified() || src.is_loopback() {
            return None;
        }
        Some(Ipv6Packet::new(
            self.src_ip,
            src,
            self.hop_limit,
            Ipv6Payload::Icmpv6(message),
        ))
    }
}

impl Processor for Icmpv6ErrorGenerator {
    type Input = Ipv6Packet;
    type Output = Ipv6Packet;

    fn process(&mut self, packet: Self::Input) -> Option<Self::Output> {
        self.hop_limit_exceeded_error(&packet)
    }
}
