use crate::*;
use std::convert::TryFrom;

/// Layer 3 contents of an Ethernet II frame, one variant per EtherType the simulator speaks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EtherPayload {
    Arp(ArpPacket),
    Ipv4(Ipv4Packet),
    Ipv6(Ipv6Packet),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EthernetFrame {
    pub dest_mac: MacAddr,
    pub src_mac: MacAddr,
    pub payload: EtherPayload,
}

impl EthernetFrame {
    pub fn new(dest_mac: MacAddr, src_mac: MacAddr, payload: EtherPayload) -> EthernetFrame {
        EthernetFrame {
            dest_mac,
            src_mac,
            payload,
        }
    }

    pub fn ether_type(&self) -> u16 {
        match self.payload {
            EtherPayload::Arp(_) => ARP_ETHER_TYPE,
            EtherPayload::Ipv4(_) => IPV4_ETHER_TYPE,
            EtherPayload::Ipv6(_) => IPV6_ETHER_TYPE,
        }
    }

    pub fn set_dest_mac(&mut self, mac: MacAddr) {
        self.dest_mac = mac;
    }

    pub fn set_src_mac(&mut self, mac: MacAddr) {
        self.src_mac = mac;
    }

    pub fn encap_arp(arp: ArpPacket, src_mac: MacAddr, dest_mac: MacAddr) -> EthernetFrame {
        EthernetFrame::new(dest_mac, src_mac, EtherPayload::Arp(arp))
    }

    pub fn encap_ipv4(ipv4: Ipv4Packet, src_mac: MacAddr, dest_mac: MacAddr) -> EthernetFrame {
        EthernetFrame::new(dest_mac, src_mac, EtherPayload::Ipv4(ipv4))
    }

    pub fn encap_ipv6(ipv6: Ipv6Packet, src_mac: MacAddr, dest_mac: MacAddr) -> EthernetFrame {
        EthernetFrame::new(dest_mac, src_mac, EtherPayload::Ipv6(ipv6))
    }
}

impl TryFrom<EthernetFrame> for ArpPacket {
    type Error = &'static str;

    fn try_from(frame: EthernetFrame) -> Result<Self, Self::Error> {
        match frame.payload {
            EtherPayload::Arp(arp) => Ok(arp),
            _ => Err("Frame does not have ARP ether type."),
        }
    }
}

impl TryFrom<EthernetFrame> for Ipv4Packet {
    type Error = &'static str;

    fn try_from(frame: EthernetFrame) -> Result<Self, Self::Error> {
        match frame.payload {
            EtherPayload::Ipv4(packet) => Ok(packet),
            _ => Err("Frame does not contain an IPv4 Packet"),
        }
    }
}

impl TryFrom<EthernetFrame> for Ipv6Packet {
    type Error = &'static str;

    fn try_from(frame: EthernetFrame) -> Result<Self, Self::Error> {
        match frame.payload {
            EtherPayload::Ipv6(packet) => Ok(packet),
            _ => Err("Frame does not contain an IPv6 Packet"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn echo() -> IcmpMessage {
        IcmpMessage::EchoRequest {
            identifier: 1,
            sequence: 1,
            data: vec![0; 8],
        }
    }

    #[test]
    fn ether_type() {
        let src = MacAddr::new([1, 2, 3, 4, 5, 6]);
        let arp = ArpPacket::request(src, Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2));
        let frame = EthernetFrame::encap_arp(arp, src, MacAddr::BROADCAST);
        assert_eq!(frame.ether_type(), ARP_ETHER_TYPE);
        assert_eq!(frame.dest_mac, MacAddr::BROADCAST);
        assert_eq!(frame.src_mac, src);
    }

    #[test]
    fn encap_ipv4() {
        let packet = Ipv4Packet::new(
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            64,
            Ipv4Payload::Icmp(echo()),
        );
        let frame = EthernetFrame::encap_ipv4(packet.clone(), MacAddr::ZERO, MacAddr::BROADCAST);
        assert_eq!(frame.ether_type(), IPV4_ETHER_TYPE);
        assert_eq!(Ipv4Packet::try_from(frame.clone()), Ok(packet));
        assert!(Ipv6Packet::try_from(frame.clone()).is_err());
        assert!(ArpPacket::try_from(frame).is_err());
    }

    #[test]
    fn encap_ipv6() {
        let packet = Ipv6Packet::new(
            Ipv6Addr::LOCALHOST,
            Ipv6Addr::LOCALHOST,
            64,
            Ipv6Payload::Icmpv6(Icmpv6Message::EchoRequest {
                identifier: 7,
                sequence: 1,
                data: vec![],
            }),
        );
        let mut frame = EthernetFrame::encap_ipv6(packet, MacAddr::ZERO, MacAddr::ZERO);
        assert_eq!(frame.ether_type(), IPV6_ETHER_TYPE);
        let new_dest = MacAddr::new([0x98, 0x88, 0x18, 0x12, 0xb4, 0xdf]);
        frame.set_dest_mac(new_dest);
        assert_eq!(frame.dest_mac, new_dest);
        assert!(Ipv6Packet::try_from(frame).is_ok());
    }
}
