use crate::*;
use std::net::Ipv4Addr;

pub const IPV4_HEADER_LEN: usize = 20;

/// What an IPv4 packet carries. ICMP is the only protocol the host stack interprets; anything
/// else travels as opaque bytes tagged with its protocol number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ipv4Payload {
    Icmp(IcmpMessage),
    Raw { protocol: u8, data: Vec<u8> },
}

impl Ipv4Payload {
    pub fn protocol(&self) -> IpProtocol {
        match self {
            Ipv4Payload::Icmp(_) => IpProtocol::Icmp,
            Ipv4Payload::Raw { protocol, .. } => IpProtocol::from(*protocol),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Ipv4Payload::Icmp(message) => message.len(),
            Ipv4Payload::Raw { data, .. } => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ipv4Packet {
    pub src_addr: Ipv4Addr,
    pub dest_addr: Ipv4Addr,
    pub ttl: u8,
    pub identification: u16,
    pub dscp: u8,
    /// Header checksum as carried on the wire. `new` fills it in; anything that edits header
    /// fields afterwards must call `set_checksum`.
    pub checksum: u16,
    pub payload: Ipv4Payload,
}

impl Ipv4Packet {
    pub fn new(src_addr: Ipv4Addr, dest_addr: Ipv4Addr, ttl: u8, payload: Ipv4Payload) -> Self {
        let mut packet = Ipv4Packet {
            src_addr,
            dest_addr,
            ttl,
            identification: 0,
            dscp: 0,
            checksum: 0,
            payload,
        };
        packet.set_checksum();
        packet
    }

    pub fn protocol(&self) -> IpProtocol {
        self.payload.protocol()
    }

    pub fn total_len(&self) -> u16 {
        (IPV4_HEADER_LEN + self.payload.len()) as u16
    }

    pub fn set_ttl(&mut self, ttl: u8) {
        self.ttl = ttl;
        self.set_checksum();
    }

    pub fn set_src_addr(&mut self, addr: Ipv4Addr) {
        self.src_addr = addr;
        self.set_checksum();
    }

    pub fn set_dest_addr(&mut self, addr: Ipv4Addr) {
        self.dest_addr = addr;
        self.set_checksum();
    }

    /// The 20 byte header as it would appear on the wire, options never present.
    pub fn header_bytes(&self) -> [u8; IPV4_HEADER_LEN] {
        let mut header = [0u8; IPV4_HEADER_LEN];
        header[0] = 0x45;
        header[1] = self.dscp << 2;
        header[2..4].copy_from_slice(&self.total_len().to_be_bytes());
        header[4..6].copy_from_slice(&self.identification.to_be_bytes());
        header[8] = self.ttl;
        header[9] = u8::from(self.protocol());
        header[10..12].copy_from_slice(&self.checksum.to_be_bytes());
        header[12..16].copy_from_slice(&self.src_addr.octets());
        header[16..20].copy_from_slice(&self.dest_addr.octets());
        header
    }

    /// Verifies the IP header checksum: the one's complement sum over the header, checksum
    /// field included, must be all ones.
    pub fn validate_checksum(&self) -> bool {
        let full_sum = self
            .header_bytes()
            .chunks_exact(2)
            .fold(0, |acc: u32, x| {
                acc + u32::from(u16::from_be_bytes([x[0], x[1]]))
            });
        let (carry, mut sum) = (((full_sum & 0xFFFF_0000) >> 16), (full_sum & 0x0000_FFFF));
        sum += carry;
        if sum & 0xFFFF_0000 != 0 {
            sum = (sum & 0xFFFF) + 1;
        }
        0 == (!sum & 0xFFFF)
    }

    /// Calculates what the checksum should be set to given the current header
    pub fn calculate_checksum(&self) -> u16 {
        let full_sum = self
            .header_bytes()
            .chunks_exact(2)
            .enumerate()
            .filter(|x| x.0 != 5)
            .fold(0, |acc: u32, x| {
                acc + u32::from(u16::from_be_bytes([x.1[0], x.1[1]]))
            });
        let (carry, mut sum) = (((full_sum & 0xFFFF_0000) >> 16), (full_sum & 0x0000_FFFF));
        sum += carry;
        if sum & 0xFFFF_0000 != 0 {
            sum = (sum & 0xFFFF) + 1;
        }
        sum = !sum & 0xFFFF;
        sum as u16
    }

    /// Sets checksum field to valid value
    pub fn set_checksum(&mut self) {
        self.checksum = self.calculate_checksum();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_packet() -> Ipv4Packet {
        // Same header as 45 00 00 14 00 00 40 00 40 11 b8 c0 c0 a8 00 01 c0 a8 00 c7, minus DF
        Ipv4Packet::new(
            Ipv4Addr::new(192, 168, 0, 1),
            Ipv4Addr::new(192, 168, 0, 199),
            64,
            Ipv4Payload::Raw {
                protocol: 17,
                data: vec![],
            },
        )
    }

    #[test]
    fn ipv4_packet() {
        let packet = raw_packet();
        assert_eq!(packet.src_addr, Ipv4Addr::new(192, 168, 0, 1));
        assert_eq!(packet.dest_addr, Ipv4Addr::new(192, 168, 0, 199));
        assert_eq!(packet.protocol(), IpProtocol::Udp);
        assert_eq!(packet.total_len(), 20);
        assert_eq!(packet.ttl, 64);
        assert!(packet.payload.is_empty());
    }

    #[test]
    fn known_checksum() {
        // With DF cleared the reference checksum 0xb8c0 grows by 0x4000.
        assert_eq!(raw_packet().checksum, 0xf8c0);
    }

    #[test]
    fn validate_checksum() {
        let mut packet = raw_packet();
        assert!(packet.validate_checksum());
        packet.checksum = 0xb861;
        assert!(!packet.validate_checksum());
        packet.set_checksum();
        assert!(packet.validate_checksum());
    }

    #[test]
    fn header_edits_keep_checksum_valid() {
        let mut packet = raw_packet();
        packet.set_ttl(1);
        assert!(packet.validate_checksum());
        packet.set_dest_addr(Ipv4Addr::new(10, 0, 0, 1));
        assert!(packet.validate_checksum());
        packet.ttl = 9;
        assert!(!packet.validate_checksum());
    }

    #[test]
    fn icmp_total_len() {
        let packet = Ipv4Packet::new(
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
            64,
            Ipv4Payload::Icmp(IcmpMessage::EchoRequest {
                identifier: 1,
                sequence: 1,
                data: vec![0; 56],
            }),
        );
        assert_eq!(packet.total_len(), 84);
        assert_eq!(packet.protocol(), IpProtocol::Icmp);
    }
}
