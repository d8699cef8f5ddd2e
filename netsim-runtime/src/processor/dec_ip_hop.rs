use crate::processor::Processor;
use netsim_packets::{Ipv4Packet, Ipv6Packet};

/// Decrements the TTL of an IPv4 packet. The header checksum is refreshed along the way.
#[derive(Default)]
pub struct DecIpv4HopLimit {}

impl DecIpv4HopLimit {
    pub fn new() -> DecIpv4HopLimit {
        DecIpv4HopLimit {}
    }
}

impl Processor for DecIpv4HopLimit {
    type Input = Ipv4Packet;
    type Output = Ipv4Packet;

    fn process(&mut self, mut packet: Self::Input) -> Option<Self::Output> {
        match packet.ttl {
            0 => Some(packet),
            ttl => {
                packet.set_ttl(ttl - 1);
                Some(packet)
            }
        }
    }
}

/// Decrements the hop limit of an IPv6 packet
#[derive(Default, Clone)]
pub struct DecIpv6HopLimit {}

impl DecIpv6HopLimit {
    pub fn new() -> DecIpv6HopLimit {
        DecIpv6HopLimit {}
    }
}

impl Processor for DecIpv6HopLimit {
    type Input = Ipv6Packet;
    type Output = Ipv6Packet;

    fn process(&mut self, mut packet: Self::Input) -> Option<Self::Output> {
        match packet.hop_limit {
            0 => Some(packet),
            hop_limit => {
                packet.set_hop_limit(hop_limit - 1);
                Some(packet)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netsim_packets::{IcmpMessage, Icmpv6Message, Ipv4Payload, Ipv6Payload};
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn ipv4_packet(ttl: u8) -> Ipv4Packet {
        let echo = IcmpMessage::EchoRequest {
            identifier: 1,
            sequence: 1,
            data: vec![0; 8],
        };
        Ipv4Packet::new(
            Ipv4Addr::new(192, 178, 128, 0),
            Ipv4Addr::new(10, 0, 0, 1),
            ttl,
            Ipv4Payload::Icmp(echo),
        )
    }

    fn ipv6_packet(hop_limit: u8) -> Ipv6Packet {
        let echo = Icmpv6Message::EchoRequest {
            identifier: 1,
            sequence: 1,
            data: vec![],
        };
        Ipv6Packet::new(
            "2001:db8::1".parse::<Ipv6Addr>().unwrap(),
            "2001:db8:1::1".parse::<Ipv6Addr>().unwrap(),
            hop_limit,
            Ipv6Payload::Icmpv6(echo),
        )
    }

    #[test]
    fn test_dec_ipv4_hop_limit() {
        let init_ttl = 64;
        let mut elem = DecIpv4HopLimit::new();

        let packet = elem.process(ipv4_packet(init_ttl)).unwrap();

        assert_eq!(packet.ttl, init_ttl - 1);
        assert!(packet.validate_checksum());
    }

    #[test]
    fn test_dec_ipv4_hop_limit_expired() {
        let mut elem = DecIpv4HopLimit::new();

        let packet = elem.process(ipv4_packet(0)).unwrap();

        assert_eq!(packet.ttl, 0);
    }

    #[test]
    fn test_dec_ipv6_hop_limit() {
        let init_hop_limit = 64;
        let mut elem = DecIpv6HopLimit::new();

        let packet = elem.process(ipv6_packet(init_hop_limit)).unwrap();

        assert_eq!(packet.hop_limit, init_hop_limit - 1);
    }

    #[test]
    fn test_dec_ipv6_hop_limit_expired() {
        let mut elem = DecIpv6HopLimit::new();

        let packet = elem.process(ipv6_packet(0)).unwrap();

        assert_eq!(packet.hop_limit, 0);
    }
}
