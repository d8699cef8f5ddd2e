use crate::{MacAddr, IPV4_ETHER_TYPE};
use std::convert::TryFrom;
use std::net::Ipv4Addr;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ArpOp {
    Request = 1,
    Reply = 2,
}

impl TryFrom<u16> for ArpOp {
    type Error = &'static str;

    fn try_from(opcode: u16) -> Result<Self, Self::Error> {
        match opcode {
            1 => Ok(ArpOp::Request),
            2 => Ok(ArpOp::Reply),
            _ => Err("Unknown ARP opcode"),
        }
    }
}

pub enum ArpHardwareType {
    Ethernet = 1,
}

///
/// The Ethernet/IPv4 flavour of the packet described in RFC 826
/// https://tools.ietf.org/html/rfc826
///
/// Hardware and protocol types are fixed (Ethernet, IPv4), so only the fields that vary are
/// carried.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArpPacket {
    pub op: ArpOp,
    pub sender_hardware_addr: MacAddr,
    pub sender_protocol_addr: Ipv4Addr,
    pub target_hardware_addr: MacAddr,
    pub target_protocol_addr: Ipv4Addr,
}

impl ArpPacket {
    ///
    /// Request for `target`'s hardware address. The target hardware address is left zeroed,
    /// because that is the value being determined.
    ///
    pub fn request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> ArpPacket {
        ArpPacket {
            op: ArpOp::Request,
            sender_hardware_addr: sender_mac,
            sender_protocol_addr: sender_ip,
            target_hardware_addr: MacAddr::ZERO,
            target_protocol_addr: target_ip,
        }
    }

    /// RFC 5227 probe: a request whose sender protocol address is all zeroes, so that
    /// receivers do not pollute their caches with a tentative address.
    pub fn probe(sender_mac: MacAddr, target_ip: Ipv4Addr) -> ArpPacket {
        ArpPacket::request(sender_mac, Ipv4Addr::UNSPECIFIED, target_ip)
    }

    ///
    /// Swap hardware and protocol fields, putting the local hardware and protocol addresses in
    /// the sender fields, and set the opcode to reply.
    ///
    pub fn reply_to(&self, local_mac: MacAddr) -> ArpPacket {
        ArpPacket {
            op: ArpOp::Reply,
            sender_hardware_addr: local_mac,
            sender_protocol_addr: self.target_protocol_addr,
            target_hardware_addr: self.sender_hardware_addr,
            target_protocol_addr: self.sender_protocol_addr,
        }
    }

    pub fn hardware_type(&self) -> u16 {
        ArpHardwareType::Ethernet as u16
    }

    pub fn protocol_type(&self) -> u16 {
        IPV4_ETHER_TYPE
    }

    pub fn opcode(&self) -> u16 {
        self.op as u16
    }

    pub fn is_probe(&self) -> bool {
        self.op == ArpOp::Request && self.sender_protocol_addr.is_unspecified()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_fields() {
        let mac = MacAddr::new([1, 2, 3, 4, 5, 6]);
        let arp = ArpPacket::request(mac, Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 9));
        assert_eq!(arp.hardware_type(), 1);
        assert_eq!(arp.protocol_type(), 0x0800);
        assert_eq!(arp.opcode(), ArpOp::Request as u16);
        assert_eq!(arp.target_hardware_addr, MacAddr::ZERO);
        assert!(!arp.is_probe());
    }

    #[test]
    fn reply_swaps_fields() {
        let asker = MacAddr::new([1, 2, 3, 4, 5, 6]);
        let owner = MacAddr::new([6, 5, 4, 3, 2, 1]);
        let request =
            ArpPacket::request(asker, Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 9));
        let reply = request.reply_to(owner);
        assert_eq!(reply.op, ArpOp::Reply);
        assert_eq!(reply.sender_hardware_addr, owner);
        assert_eq!(reply.sender_protocol_addr, Ipv4Addr::new(10, 0, 0, 9));
        assert_eq!(reply.target_hardware_addr, asker);
        assert_eq!(reply.target_protocol_addr, Ipv4Addr::new(10, 0, 0, 1));
    }

    #[test]
    fn probe_has_unspecified_sender() {
        let probe = ArpPacket::probe(MacAddr::new([1, 2, 3, 4, 5, 6]), Ipv4Addr::new(10, 0, 0, 5));
        assert!(probe.is_probe());
        assert_eq!(ArpOp::try_from(2), Ok(ArpOp::Reply));
        assert!(ArpOp::try_from(3).is_err());
    }
}
