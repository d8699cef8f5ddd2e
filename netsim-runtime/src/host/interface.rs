use crate::link::Port;
use crate::state::{Ipv4Route, Ipv6Route, Route, RouteKind};
use netsim_packets::{
    ipv4_broadcast, ipv4_prefix_len, ipv4_same_subnet, ipv6_in_prefix, ipv6_link_local,
    Ipv6AddrExt, MacAddr, IPV6_ALL_NODES,
};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Ipv6Origin {
    LinkLocal,
    Manual,
    /// Stateless autoconfiguration from a Router Advertisement prefix.
    Slaac,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ipv6Address {
    pub addr: Ipv6Addr,
    pub prefix_len: u8,
    pub origin: Ipv6Origin,
}

/// One network interface of a host: its hardware address, its configuration, and the port it is
/// plugged into.
#[derive(Clone)]
pub struct Interface {
    pub name: String,
    pub mac: MacAddr,
    pub address: Option<Ipv4Addr>,
    pub subnet_mask: Option<Ipv4Addr>,
    pub ipv6_addresses: Vec<Ipv6Address>,
    port: Arc<dyn Port>,
}

impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Interface")
            .field("name", &self.name)
            .field("mac", &self.mac)
            .field("address", &self.address)
            .field("subnet_mask", &self.subnet_mask)
            .field("ipv6_addresses", &self.ipv6_addresses)
            .finish()
    }
}

impl Interface {
    /// A fresh interface carries only its EUI-64 link-local address.
    pub(crate) fn new(name: &str, mac: MacAddr, port: Arc<dyn Port>) -> Interface {
        Interface {
            name: name.to_string(),
            mac,
            address: None,
            subnet_mask: None,
            ipv6_addresses: vec![Ipv6Address {
                addr: ipv6_link_local(mac),
                prefix_len: 64,
                origin: Ipv6Origin::LinkLocal,
            }],
            port,
        }
    }

    pub fn port(&self) -> Arc<dyn Port> {
        Arc::clone(&self.port)
    }

    pub fn is_link_up(&self) -> bool {
        self.port.is_link_up()
    }

    pub fn prefix_len(&self) -> Option<u8> {
        self.subnet_mask.map(ipv4_prefix_len)
    }

    /// Directed broadcast address of the configured subnet.
    pub fn broadcast(&self) -> Option<Ipv4Addr> {
        match (self.address, self.subnet_mask) {
            (Some(addr), Some(mask)) => Some(ipv4_broadcast(addr, mask)),
            _ => None,
        }
    }

    pub fn owns_ipv4(&self, addr: Ipv4Addr) -> bool {
        self.address == Some(addr)
    }

    pub fn on_subnet(&self, addr: Ipv4Addr) -> bool {
        match (self.address, self.subnet_mask) {
            (Some(own), Some(mask)) => ipv4_same_subnet(own, addr, mask),
            _ => false,
        }
    }

    pub fn owns_ipv6(&self, addr: Ipv6Addr) -> bool {
        self.ipv6_addresses.iter().any(|entry| entry.addr == addr)
    }

    pub fn link_local(&self) -> Option<Ipv6Addr> {
        self.ipv6_addresses
            .iter()
            .find(|entry| entry.addr.is_link_local())
            .map(|entry| entry.addr)
    }

    /// Source address for talking to `dest`: same scope as the destination, preferring one
    /// whose prefix contains it.
    pub fn ipv6_source_for(&self, dest: Ipv6Addr) -> Option<Ipv6Addr> {
        if dest.is_link_local() || dest.is_multicast() {
            return self.link_local();
        }
        let global = self
            .ipv6_addresses
            .iter()
            .filter(|entry| !entry.addr.is_link_local());
        global
            .clone()
            .find(|entry| ipv6_in_prefix(dest, entry.addr, entry.prefix_len))
            .or_else(|| global.clone().next())
            .map(|entry| entry.addr)
            .or_else(|| self.link_local())
    }

    /// Multicast groups the interface listens to: all-nodes and the solicited-node group of
    /// every address it holds.
    pub fn joined_groups(&self) -> Vec<Ipv6Addr> {
        let mut groups = vec![IPV6_ALL_NODES];
        for entry in &self.ipv6_addresses {
            let group = entry.addr.solicited_node();
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        groups
    }

    pub fn connected_route(&self) -> Option<Ipv4Route> {
        let prefix_len = self.prefix_len()?;
        let address = self.address?;
        Route::new(address, prefix_len, None, &self.name, RouteKind::Connected, 0).ok()
    }

    /// On-link routes implied by the configured IPv6 addresses: fe80::/64 and every manually
    /// assigned prefix. Autoconfigured prefixes are on-link only when an RA says so.
    pub fn connected_ipv6_routes(&self) -> Vec<Ipv6Route> {
        self.ipv6_addresses
            .iter()
            .filter(|entry| entry.origin != Ipv6Origin::Slaac)
            .filter_map(|entry| {
                Route::new(
                    entry.addr,
                    entry.prefix_len,
                    None,
                    &self.name,
                    RouteKind::Connected,
                    0,
                )
                .ok()
            })
            .collect()
    }
}
