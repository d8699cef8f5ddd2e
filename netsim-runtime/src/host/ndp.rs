//! Neighbor Discovery (RFC 4861) and stateless address autoconfiguration (RFC 4862).
use super::{wait_for, Ipv6Address, Ipv6Origin};
use crate::error::{Error, Result};
use crate::host::Host;
use crate::state::{NeighborState, Route, RouteKind};
use netsim_packets::{
    ipv6_eui64, EthernetFrame, Icmpv6Message, Ipv6AddrExt, Ipv6Packet, Ipv6Payload, MacAddr,
    PrefixInformation, IPV6_ALL_NODES, IPV6_ALL_ROUTERS,
};
use std::net::{IpAddr, Ipv6Addr};
use tracing::{debug, info, warn};

/// Every ND message is sent, and must arrive, with this hop limit.
pub(super) const ND_HOP_LIMIT: u8 = 255;

const RA_ROUTE_METRIC: u32 = 0;

fn nd_frame(src: Ipv6Addr, dest: Ipv6Addr, message: Icmpv6Message, src_mac: MacAddr, dest_mac: MacAddr) -> EthernetFrame {
    let packet = Ipv6Packet::new(src, dest, ND_HOP_LIMIT, Ipv6Payload::Icmpv6(message));
    EthernetFrame::encap_ipv6(packet, src_mac, dest_mac)
}

impl Host {
    pub(super) fn handle_ndp(&self, iface: &str, src_mac: MacAddr, packet: &Ipv6Packet, message: Icmpv6Message) {
        if packet.hop_limit != ND_HOP_LIMIT {
            debug!(host = %self.inner.name, iface, hop_limit = packet.hop_limit, "ND message dropped: hop limit is not 255");
            return;
        }
        match message {
            Icmpv6Message::NeighborSolicitation {
                target,
                source_link_addr,
            } => self.handle_solicitation(iface, src_mac, packet.src_addr, target, source_link_addr),
            Icmpv6Message::NeighborAdvertisement {
                target,
                router,
                solicited,
                target_link_addr,
                ..
            } => self.handle_advertisement(iface, src_mac, target, router, solicited, target_link_addr),
            Icmpv6Message::RouterAdvertisement {
                router_lifetime,
                source_link_addr,
                prefixes,
                ..
            } => self.handle_router_advertisement(
                iface,
                src_mac,
                packet.src_addr,
                router_lifetime,
                source_link_addr,
                prefixes,
            ),
            Icmpv6Message::RouterSolicitation { .. } => {
                debug!(host = %self.inner.name, iface, "router solicitation ignored");
            }
            _ => {}
        }
    }

    fn handle_solicitation(
        &self,
        iface: &str,
        src_mac: MacAddr,
        src: Ipv6Addr,
        target: Ipv6Addr,
        source_link_addr: Option<MacAddr>,
    ) {
        let (frame, target_mac) = {
            let mut state = self.inner.state.lock();
            let local_mac = match state.iface(iface) {
                Ok(interface) if interface.owns_ipv6(target) => interface.mac,
                _ => return,
            };

            if src.is_unspecified() {
                // Duplicate Address Detection: defend the address to all nodes.
                warn!(host = %self.inner.name, iface, %target, "defending address against DAD probe");
                let advert = Icmpv6Message::NeighborAdvertisement {
                    target,
                    router: false,
                    solicited: false,
                    override_flag: true,
                    target_link_addr: Some(local_mac),
                };
                let frame = nd_frame(
                    target,
                    IPV6_ALL_NODES,
                    advert,
                    local_mac,
                    MacAddr::ipv6_multicast(IPV6_ALL_NODES),
                );
                (frame, None)
            } else {
                let link_addr = source_link_addr.unwrap_or(src_mac);
                let neighbor_state = match state.neighbors.get(&src) {
                    Some(entry) if entry.mac == link_addr && entry.state != NeighborState::Incomplete => {
                        entry.state
                    }
                    _ => NeighborState::Stale,
                };
                state
                    .neighbors
                    .update(src, link_addr, iface, neighbor_state, false);
                state.nd_waiters.resolve(&src, link_addr);

                let advert = Icmpv6Message::NeighborAdvertisement {
                    target,
                    router: false,
                    solicited: true,
                    override_flag: true,
                    target_link_addr: Some(local_mac),
                };
                (nd_frame(target, src, advert, local_mac, link_addr), Some(src))
            }
        };
        debug!(host = %self.inner.name, iface, %target, to = ?target_mac, "neighbor advertisement");
        self.transmit(iface, frame);
    }

    fn handle_advertisement(
        &self,
        iface: &str,
        src_mac: MacAddr,
        target: Ipv6Addr,
        router: bool,
        solicited: bool,
        target_link_addr: Option<MacAddr>,
    ) {
        let mut state = self.inner.state.lock();
        if state.owns_ipv6(target) {
            warn!(host = %self.inner.name, iface, %target, %src_mac, "duplicate address: another node advertises ours");
            return;
        }

        let known = state.neighbors.get(&target).cloned();
        let cached = known
            .as_ref()
            .filter(|entry| entry.state != NeighborState::Incomplete)
            .map(|entry| entry.mac);
        let mac = match target_link_addr.or(cached) {
            Some(mac) => mac,
            None => return,
        };

        let neighbor_state = if solicited {
            NeighborState::Reachable
        } else {
            NeighborState::Stale
        };
        state.neighbors.update(target, mac, iface, neighbor_state, router);
        if !router && known.map(|entry| entry.is_router).unwrap_or(false) {
            state.neighbors.clear_router(&target);
            let was_gateway = state
                .ipv6_routes
                .routes()
                .iter()
                .any(|route| route.kind == RouteKind::Default && route.next_hop == Some(target));
            if was_gateway {
                state.ipv6_routes.clear_kind(RouteKind::Default);
                info!(host = %self.inner.name, iface, %target, "neighbor stopped routing; IPv6 default gateway removed");
            }
        }
        let woken = state.nd_waiters.resolve(&target, mac);
        debug!(host = %self.inner.name, iface, %target, %mac, state = %neighbor_state, waiters = woken, "neighbor advertisement processed");
    }

    fn handle_router_advertisement(
        &self,
        iface: &str,
        src_mac: MacAddr,
        router: Ipv6Addr,
        router_lifetime: u16,
        source_link_addr: Option<MacAddr>,
        prefixes: Vec<PrefixInformation>,
    ) {
        if !router.is_link_local() {
            debug!(host = %self.inner.name, iface, %router, "RA dropped: source is not link-local");
            return;
        }
        let mut state = self.inner.state.lock();
        let local_mac = match state.iface(iface) {
            Ok(interface) => interface.mac,
            Err(_) => return,
        };

        let link_addr = source_link_addr.unwrap_or(src_mac);
        let neighbor_state = match state.neighbors.get(&router) {
            Some(entry) if entry.mac == link_addr && entry.state != NeighborState::Incomplete => entry.state,
            _ => NeighborState::Stale,
        };
        state
            .neighbors
            .update(router, link_addr, iface, neighbor_state, true);
        state.nd_waiters.resolve(&router, link_addr);

        let current_gateway = state
            .ipv6_routes
            .routes()
            .iter()
            .find(|route| route.kind == RouteKind::Default)
            .and_then(|route| route.next_hop);
        if router_lifetime > 0 && current_gateway.is_none() {
            if let Ok(route) = Route::new(Ipv6Addr::UNSPECIFIED, 0, Some(router), iface, RouteKind::Default, RA_ROUTE_METRIC) {
                state.ipv6_routes.add(route);
                info!(host = %self.inner.name, iface, %router, lifetime = router_lifetime, "IPv6 default gateway learned from RA");
            }
        } else if router_lifetime == 0 && current_gateway == Some(router) {
            state.ipv6_routes.clear_kind(RouteKind::Default);
            info!(host = %self.inner.name, iface, %router, "router withdrew as default gateway");
        }

        for prefix in prefixes {
            if prefix.on_link {
                if prefix.valid_lifetime == 0 {
                    let withdrawn = state
                        .ipv6_routes
                        .remove_matching(prefix.prefix, prefix.prefix_len, RouteKind::Ra, iface);
                    if !withdrawn.is_empty() {
                        info!(host = %self.inner.name, iface, prefix = %prefix.prefix, len = prefix.prefix_len, "on-link prefix withdrawn");
                    }
                } else if let Ok(route) = Route::new(prefix.prefix, prefix.prefix_len, None, iface, RouteKind::Ra, RA_ROUTE_METRIC) {
                    state.ipv6_routes.add(route);
                }
            }

            if !prefix.autonomous {
                continue;
            }
            if prefix.prefix_len != 64 {
                debug!(host = %self.inner.name, iface, prefix = %prefix.prefix, len = prefix.prefix_len, "autonomous prefix ignored: not a /64");
                continue;
            }
            let addr = ipv6_eui64(prefix.prefix, local_mac);
            let interface = match state.iface_mut(iface) {
                Ok(interface) => interface,
                Err(_) => return,
            };
            if prefix.valid_lifetime == 0 {
                let before = interface.ipv6_addresses.len();
                interface
                    .ipv6_addresses
                    .retain(|entry| !(entry.addr == addr && entry.origin == Ipv6Origin::Slaac));
                if interface.ipv6_addresses.len() != before {
                    info!(host = %self.inner.name, iface, %addr, "autoconfigured address expired");
                }
            } else if !interface.owns_ipv6(addr) {
                interface.ipv6_addresses.push(Ipv6Address {
                    addr,
                    prefix_len: 64,
                    origin: Ipv6Origin::Slaac,
                });
                info!(host = %self.inner.name, iface, %addr, "address autoconfigured");
            }
        }
    }

    /// Resolves `target` through a Neighbor Solicitation to its solicited-node group. Like
    /// `resolve_ipv4`, one solicitation serves every concurrent caller.
    pub async fn resolve_ipv6(&self, iface: &str, target: Ipv6Addr) -> Result<MacAddr> {
        let (solicitation, waiter, receiver, already_asked) = {
            let mut state = self.inner.state.lock();
            let interface = state.iface(iface)?;
            let local_mac = interface.mac;
            if interface.owns_ipv6(target) {
                return Ok(local_mac);
            }
            if target.is_multicast() {
                return Ok(MacAddr::ipv6_multicast(target));
            }
            let src = interface
                .ipv6_source_for(target)
                .ok_or_else(|| Error::NoIpv6Address(iface.to_string()))?;
            if let Some(mac) = state.neighbors.lookup(&target) {
                return Ok(mac);
            }
            if state.neighbors.get(&target).is_none() {
                state
                    .neighbors
                    .update(target, MacAddr::ZERO, iface, NeighborState::Incomplete, false);
            }

            let already_asked = state.nd_waiters.is_pending(&target);
            let (waiter, receiver) = state.nd_waiters.register(target);
            let group = target.solicited_node();
            let solicitation = nd_frame(
                src,
                group,
                Icmpv6Message::NeighborSolicitation {
                    target,
                    source_link_addr: Some(local_mac),
                },
                local_mac,
                MacAddr::ipv6_multicast(group),
            );
            (solicitation, waiter, receiver, already_asked)
        };

        if !already_asked {
            debug!(host = %self.inner.name, iface, %target, "neighbor solicitation");
            if !self.transmit(iface, solicitation) {
                self.withdraw_nd_waiter(target, waiter);
                return Err(Error::LinkDown(iface.to_string()));
            }
        }

        match wait_for(receiver, self.inner.config.resolution_timeout, Error::HostGone).await {
            Some(outcome) => outcome,
            None => {
                self.withdraw_nd_waiter(target, waiter);
                debug!(host = %self.inner.name, iface, %target, "neighbor resolution timed out");
                Err(Error::ResolutionTimeout(IpAddr::V6(target)))
            }
        }
    }

    /// Cancels one waiter; the INCOMPLETE placeholder goes once nobody waits on it.
    fn withdraw_nd_waiter(&self, target: Ipv6Addr, waiter: crate::state::WaiterId) {
        let mut state = self.inner.state.lock();
        state.nd_waiters.cancel(&target, waiter);
        let incomplete = state
            .neighbors
            .get(&target)
            .map(|entry| entry.state == NeighborState::Incomplete)
            .unwrap_or(false);
        if incomplete && !state.nd_waiters.is_pending(&target) {
            state.neighbors.remove(&target);
        }
    }

    /// Sends a Router Solicitation to all-routers from the link-local address of `iface`.
    pub fn solicit_routers(&self, iface: &str) -> Result<()> {
        let frame = {
            let state = self.inner.state.lock();
            let interface = state.iface(iface)?;
            let src = interface
                .link_local()
                .ok_or_else(|| Error::NoIpv6Address(iface.to_string()))?;
            nd_frame(
                src,
                IPV6_ALL_ROUTERS,
                Icmpv6Message::RouterSolicitation {
                    source_link_addr: Some(interface.mac),
                },
                interface.mac,
                MacAddr::ipv6_multicast(IPV6_ALL_ROUTERS),
            )
        };
        debug!(host = %self.inner.name, iface, "router solicitation");
        if self.transmit(iface, frame) {
            Ok(())
        } else {
            Err(Error::LinkDown(iface.to_string()))
        }
    }
}
