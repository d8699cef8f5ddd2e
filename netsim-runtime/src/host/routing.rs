use super::{HostState, Interface, Ipv6Address, Ipv6Origin};
use crate::error::{Error, Result};
use crate::host::Host;
use crate::state::{
    resolve_with, Ipv4Route, Ipv6Route, ResolvedRoute, Route, RouteKind,
};
use netsim_packets::{ipv4_mask, ipv4_prefix_len};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::info;

const DEFAULT_ROUTE_METRIC: u32 = 0;

impl HostState {
    /// Explicit routes plus the connected routes implied by interface configuration.
    pub(super) fn effective_routes(&self) -> Vec<Ipv4Route> {
        let connected: Vec<_> = self
            .interfaces
            .iter()
            .filter_map(Interface::connected_route)
            .collect();
        self.routes.effective(connected)
    }

    pub(super) fn effective_ipv6_routes(&self) -> Vec<Ipv6Route> {
        let connected: Vec<_> = self
            .interfaces
            .iter()
            .flat_map(Interface::connected_ipv6_routes)
            .collect();
        self.ipv6_routes.effective(connected)
    }
}

impl Host {
    /// Assigns an IPv4 address and subnet mask; the connected route follows from it. The mask
    /// must be contiguous.
    pub fn configure_interface(&self, iface: &str, addr: Ipv4Addr, mask: Ipv4Addr) -> Result<()> {
        let prefix_len = ipv4_prefix_len(mask);
        if ipv4_mask(prefix_len) != mask {
            return Err(Error::InvalidPrefix(prefix_len));
        }
        let mut state = self.inner.state.lock();
        let interface = state.iface_mut(iface)?;
        interface.address = Some(addr);
        interface.subnet_mask = Some(mask);
        info!(host = %self.inner.name, iface, %addr, prefix_len, "IPv4 address configured");
        Ok(())
    }

    /// Drops the IPv4 configuration of `iface` and every IPv4 route leaving through it. IPv6
    /// configuration is untouched.
    pub fn clear_interface(&self, iface: &str) -> Result<()> {
        let mut state = self.inner.state.lock();
        let interface = state.iface_mut(iface)?;
        interface.address = None;
        interface.subnet_mask = None;
        state.routes.remove_iface(iface);
        state.arp.flush_iface(iface);
        info!(host = %self.inner.name, iface, "IPv4 configuration cleared");
        Ok(())
    }

    pub fn configure_ipv6(&self, iface: &str, addr: Ipv6Addr, prefix_len: u8) -> Result<()> {
        if prefix_len > 128 {
            return Err(Error::InvalidPrefix(prefix_len));
        }
        let mut state = self.inner.state.lock();
        let interface = state.iface_mut(iface)?;
        interface.ipv6_addresses.retain(|entry| entry.addr != addr);
        interface.ipv6_addresses.push(Ipv6Address {
            addr,
            prefix_len,
            origin: Ipv6Origin::Manual,
        });
        info!(host = %self.inner.name, iface, %addr, prefix_len, "IPv6 address configured");
        Ok(())
    }

    /// Points the default route at `gateway`, which must sit on the subnet of one of the
    /// interfaces. Replaces any previous default route.
    pub fn set_default_gateway(&self, gateway: Ipv4Addr) -> Result<()> {
        let mut state = self.inner.state.lock();
        let iface = state
            .interfaces
            .iter()
            .find(|interface| interface.on_subnet(gateway))
            .map(|interface| interface.name.clone())
            .ok_or(Error::NoRoute(IpAddr::V4(gateway)))?;
        let route = Route::new(
            Ipv4Addr::UNSPECIFIED,
            0,
            Some(gateway),
            &iface,
            RouteKind::Default,
            DEFAULT_ROUTE_METRIC,
        )?;
        state.routes.clear_kind(RouteKind::Default);
        state.routes.add(route);
        info!(host = %self.inner.name, iface = %iface, %gateway, "default gateway set");
        Ok(())
    }

    pub fn clear_default_gateway(&self) {
        self.inner.state.lock().routes.clear_kind(RouteKind::Default);
    }

    pub fn default_gateway(&self) -> Option<Ipv4Addr> {
        self.inner
            .state
            .lock()
            .routes
            .routes()
            .iter()
            .find(|route| route.kind == RouteKind::Default)
            .and_then(|route| route.next_hop)
    }

    pub fn set_ipv6_default_gateway(&self, gateway: Ipv6Addr, iface: &str) -> Result<()> {
        let mut state = self.inner.state.lock();
        state.iface(iface)?;
        let route = Route::new(
            Ipv6Addr::UNSPECIFIED,
            0,
            Some(gateway),
            iface,
            RouteKind::Default,
            DEFAULT_ROUTE_METRIC,
        )?;
        state.ipv6_routes.clear_kind(RouteKind::Default);
        state.ipv6_routes.add(route);
        info!(host = %self.inner.name, iface, %gateway, "IPv6 default gateway set");
        Ok(())
    }

    pub fn clear_ipv6_default_gateway(&self) {
        self.inner
            .state
            .lock()
            .ipv6_routes
            .clear_kind(RouteKind::Default);
    }

    pub fn ipv6_default_gateway(&self) -> Option<Ipv6Addr> {
        self.inner
            .state
            .lock()
            .ipv6_routes
            .routes()
            .iter()
            .find(|route| route.kind == RouteKind::Default)
            .and_then(|route| route.next_hop)
    }

    pub fn add_static_route(
        &self,
        network: Ipv4Addr,
        prefix_len: u8,
        next_hop: Option<Ipv4Addr>,
        iface: &str,
        metric: u32,
    ) -> Result<()> {
        let route = Route::new(network, prefix_len, next_hop, iface, RouteKind::Static, metric)?;
        let mut state = self.inner.state.lock();
        state.iface(iface)?;
        info!(host = %self.inner.name, %route, "static route added");
        state.routes.add(route);
        Ok(())
    }

    pub fn add_ipv6_static_route(
        &self,
        network: Ipv6Addr,
        prefix_len: u8,
        next_hop: Option<Ipv6Addr>,
        iface: &str,
        metric: u32,
    ) -> Result<()> {
        let route = Route::new(network, prefix_len, next_hop, iface, RouteKind::Static, metric)?;
        let mut state = self.inner.state.lock();
        state.iface(iface)?;
        info!(host = %self.inner.name, %route, "static route added");
        state.ipv6_routes.add(route);
        Ok(())
    }

    /// Removes the explicit entries for `network/prefix_len`. Connected routes cannot be
    /// removed this way; they go away with the interface address.
    pub fn remove_route(&self, network: Ipv4Addr, prefix_len: u8) -> Result<()> {
        let removed = self.inner.state.lock().routes.remove(network, prefix_len)?;
        info!(host = %self.inner.name, count = removed.len(), %network, prefix_len, "route removed");
        Ok(())
    }

    pub fn remove_ipv6_route(&self, network: Ipv6Addr, prefix_len: u8) -> Result<()> {
        let removed = self
            .inner
            .state
            .lock()
            .ipv6_routes
            .remove(network, prefix_len)?;
        info!(host = %self.inner.name, count = removed.len(), %network, prefix_len, "route removed");
        Ok(())
    }

    pub fn routing_table(&self) -> Vec<Ipv4Route> {
        self.inner.state.lock().effective_routes()
    }

    pub fn ipv6_routing_table(&self) -> Vec<Ipv6Route> {
        self.inner.state.lock().effective_ipv6_routes()
    }

    /// Longest prefix match over the effective table, lowest metric on ties.
    pub fn resolve_route(&self, dest: Ipv4Addr) -> Option<ResolvedRoute<Ipv4Addr>> {
        let routes = self.inner.state.lock().effective_routes();
        resolve_with(&routes, dest)
    }

    pub fn resolve_route_v6(&self, dest: Ipv6Addr) -> Option<ResolvedRoute<Ipv6Addr>> {
        let routes = self.inner.state.lock().effective_ipv6_routes();
        resolve_with(&routes, dest)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::HostConfig;
    use crate::host::Host;
    use crate::link::Wire;
    use crate::state::RouteKind;
    use crate::Error;
    use netsim_packets::MacAddr;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    fn host() -> (Host, Wire) {
        let host = Host::new("alpha", HostConfig::default());
        let wire = Wire::new();
        host.add_interface("eth0", MacAddr::new([0x02, 0, 0, 0, 0, 1]), wire.end_a())
            .unwrap();
        host.configure_interface("eth0", Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(255, 255, 255, 0))
            .unwrap();
        (host, wire)
    }

    #[test]
    fn connected_route_follows_address() {
        let (host, _wire) = host();
        let table = host.routing_table();
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].kind, RouteKind::Connected);

        host.clear_interface("eth0").unwrap();
        assert!(host.routing_table().is_empty());
        assert!(host.resolve_route(Ipv4Addr::new(10, 0, 0, 2)).is_none());
    }

    #[test]
    fn gateway_must_be_on_link() {
        let (host, _wire) = host();
        assert_eq!(
            host.set_default_gateway(Ipv4Addr::new(10, 9, 9, 9)),
            Err(Error::NoRoute(IpAddr::V4(Ipv4Addr::new(10, 9, 9, 9))))
        );
        host.set_default_gateway(Ipv4Addr::new(10, 0, 0, 254)).unwrap();
        host.set_default_gateway(Ipv4Addr::new(10, 0, 0, 253)).unwrap();
        assert_eq!(host.default_gateway(), Some(Ipv4Addr::new(10, 0, 0, 253)));

        let resolved = host.resolve_route(Ipv4Addr::new(8, 8, 8, 8)).unwrap();
        assert_eq!(resolved.next_hop, Ipv4Addr::new(10, 0, 0, 253));
        let local = host.resolve_route(Ipv4Addr::new(10, 0, 0, 7)).unwrap();
        assert_eq!(local.next_hop, Ipv4Addr::new(10, 0, 0, 7));
    }

    #[test]
    fn static_routes_win_by_prefix() {
        let (host, _wire) = host();
        host.set_default_gateway(Ipv4Addr::new(10, 0, 0, 254)).unwrap();
        host.add_static_route(
            Ipv4Addr::new(172, 16, 0, 0),
            12,
            Some(Ipv4Addr::new(10, 0, 0, 100)),
            "eth0",
            5,
        )
        .unwrap();
        let resolved = host.resolve_route(Ipv4Addr::new(172, 20, 1, 1)).unwrap();
        assert_eq!(resolved.next_hop, Ipv4Addr::new(10, 0, 0, 100));

        host.remove_route(Ipv4Addr::new(172, 16, 0, 0), 12).unwrap();
        assert!(host.remove_route(Ipv4Addr::new(172, 16, 0, 0), 12).is_err());
        let resolved = host.resolve_route(Ipv4Addr::new(172, 20, 1, 1)).unwrap();
        assert_eq!(resolved.next_hop, Ipv4Addr::new(10, 0, 0, 254));
    }

    #[test]
    fn rejects_bad_input() {
        let (host, _wire) = host();
        assert_eq!(
            host.configure_interface("eth0", Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(255, 0, 255, 0)),
            Err(Error::InvalidPrefix(8))
        );
        assert_eq!(
            host.configure_interface("eth9", Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(255, 255, 255, 0)),
            Err(Error::UnknownInterface("eth9".to_string()))
        );
        assert_eq!(
            host.add_static_route(Ipv4Addr::new(10, 0, 0, 0), 33, None, "eth0", 0),
            Err(Error::InvalidPrefix(33))
        );
    }

    #[test]
    fn ipv6_link_local_route_is_implicit() {
        let (host, _wire) = host();
        let link_local: Ipv6Addr = "fe80::1".parse().unwrap();
        let resolved = host.resolve_route_v6(link_local).unwrap();
        assert_eq!(resolved.iface, "eth0");
        assert_eq!(resolved.next_hop, link_local);
        assert!(host.resolve_route_v6("2001:db8::1".parse().unwrap()).is_none());

        host.configure_ipv6("eth0", "2001:db8:1::2".parse().unwrap(), 64)
            .unwrap();
        host.set_ipv6_default_gateway("2001:db8:1::1".parse().unwrap(), "eth0")
            .unwrap();
        let resolved = host.resolve_route_v6("2001:db8:9::9".parse().unwrap()).unwrap();
        assert_eq!(resolved.next_hop, "2001:db8:1::1".parse::<Ipv6Addr>().unwrap());
        assert_eq!(host.ipv6_routing_table().len(), 3);
    }
}
