//! Address arithmetic shared by the ARP, routing and NDP code.
use crate::MacAddr;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Builds a netmask with `prefix_len` leading ones. Lengths above 32 saturate.
pub fn ipv4_mask(prefix_len: u8) -> Ipv4Addr {
    match prefix_len {
        0 => Ipv4Addr::from(0),
        len if len >= 32 => Ipv4Addr::from(u32::MAX),
        len => Ipv4Addr::from(u32::MAX << (32 - u32::from(len))),
    }
}

/// Counts the leading ones of a netmask.
pub fn ipv4_prefix_len(mask: Ipv4Addr) -> u8 {
    u32::from(mask).leading_ones() as u8
}

pub fn ipv4_network(addr: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(addr) & u32::from(mask))
}

pub fn ipv4_broadcast(addr: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(addr) | !u32::from(mask))
}

pub fn ipv4_same_subnet(a: Ipv4Addr, b: Ipv4Addr, mask: Ipv4Addr) -> bool {
    ipv4_network(a, mask) == ipv4_network(b, mask)
}

/// Zeroes every bit past `prefix_len`.
pub fn ipv6_prefix(addr: Ipv6Addr, prefix_len: u8) -> Ipv6Addr {
    let bits = u128::from(addr);
    let mask = match prefix_len {
        0 => 0,
        len if len >= 128 => u128::MAX,
        len => u128::MAX << (128 - u32::from(len)),
    };
    Ipv6Addr::from(bits & mask)
}

pub fn ipv6_in_prefix(addr: Ipv6Addr, prefix: Ipv6Addr, prefix_len: u8) -> bool {
    ipv6_prefix(addr, prefix_len) == ipv6_prefix(prefix, prefix_len)
}

/// Appends the modified EUI-64 identifier of `mac` to a /64 prefix.
pub fn ipv6_eui64(prefix: Ipv6Addr, mac: MacAddr) -> Ipv6Addr {
    let mut octets = ipv6_prefix(prefix, 64).octets();
    octets[8..].copy_from_slice(&mac.eui64());
    Ipv6Addr::from(octets)
}

/// fe80::/64 address derived from the interface MAC.
pub fn ipv6_link_local(mac: MacAddr) -> Ipv6Addr {
    ipv6_eui64(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0), mac)
}

pub const IPV6_ALL_NODES: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 1);
pub const IPV6_ALL_ROUTERS: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 2);

/// Predicates the stack needs that `std` either lacks or keeps unstable.
pub trait Ipv6AddrExt {
    fn is_link_local(&self) -> bool;
    fn is_solicited_node(&self) -> bool;
    /// ff02::1:ffXX:XXXX built from the low 24 bits.
    fn solicited_node(&self) -> Ipv6Addr;
    fn hextets(&self) -> [u16; 8];
}

impl Ipv6AddrExt for Ipv6Addr {
    fn is_link_local(&self) -> bool {
        self.segments()[0] & 0xffc0 == 0xfe80
    }

    fn is_solicited_node(&self) -> bool {
        let s = self.segments();
        s[0] == 0xff02 && s[1..5] == [0, 0, 0, 0] && s[5] == 1 && s[6] & 0xff00 == 0xff00
    }

    fn solicited_node(&self) -> Ipv6Addr {
        let o = self.octets();
        Ipv6Addr::from([
            0xff, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01, 0xff, o[13], o[14], o[15],
        ])
    }

    fn hextets(&self) -> [u16; 8] {
        self.segments()
    }
}
