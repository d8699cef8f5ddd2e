use super::wait_for;
use crate::error::{Error, Result};
use crate::host::Host;
use crate::processor::{ArpHandler, Processor};
use netsim_packets::{ArpPacket, EthernetFrame, MacAddr};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tracing::{debug, info, warn};

impl Host {
    pub(super) fn handle_arp(&self, iface: &str, packet: ArpPacket) {
        let (reply, local_mac) = {
            let mut state = self.inner.state.lock();
            let (local_mac, owned): (MacAddr, Vec<Ipv4Addr>) = match state.iface(iface) {
                Ok(interface) => (interface.mac, interface.address.into_iter().collect()),
                Err(_) => return,
            };
            if packet.sender_hardware_addr == local_mac {
                return;
            }

            let sender = packet.sender_protocol_addr;
            let sender_mac = packet.sender_hardware_addr;
            // Someone else claims an address we are probing for: either by answering our probe
            // or by probing for it themselves.
            if state.probes.is_pending(&sender) {
                state.probes.resolve(&sender, sender_mac);
            }
            if packet.is_probe() && state.probes.is_pending(&packet.target_protocol_addr) {
                state
                    .probes
                    .resolve(&packet.target_protocol_addr, sender_mac);
            }

            if !sender.is_unspecified() {
                let previous = state.arp.insert(sender, sender_mac, iface);
                if previous != Some(sender_mac) {
                    debug!(host = %self.inner.name, iface, ip = %sender, mac = %sender_mac, "ARP entry learned");
                }
                let woken = state.arp_waiters.resolve(&sender, sender_mac);
                if woken > 0 {
                    debug!(host = %self.inner.name, iface, ip = %sender, waiters = woken, "ARP resolution complete");
                }
            }

            (ArpHandler::new(local_mac, owned).process(packet), local_mac)
        };

        if let Some(reply) = reply {
            debug!(host = %self.inner.name, iface, ip = %reply.sender_protocol_addr, to = %reply.target_protocol_addr, "ARP reply");
            let dest_mac = reply.target_hardware_addr;
            self.transmit(iface, EthernetFrame::encap_arp(reply, local_mac, dest_mac));
        }
    }

    /// Resolves `target` to a link address on `iface`, asking the link when the cache has no
    /// answer. Concurrent callers for the same target share one ARP request, but each is bound
    /// by its own timeout.
    pub async fn resolve_ipv4(&self, iface: &str, target: Ipv4Addr) -> Result<MacAddr> {
        let (request, waiter, receiver, already_asked) = {
            let mut state = self.inner.state.lock();
            let interface = state.iface(iface)?;
            let local_mac = interface.mac;
            if interface.owns_ipv4(target) {
                return Ok(local_mac);
            }
            if target.is_broadcast() || interface.broadcast() == Some(target) {
                return Ok(MacAddr::BROADCAST);
            }
            if target.is_multicast() {
                let o = target.octets();
                return Ok(MacAddr::new([0x01, 0x00, 0x5e, o[1] & 0x7f, o[2], o[3]]));
            }
            let address = interface.address;
            if let Some(mac) = state.arp.lookup(&target) {
                return Ok(mac);
            }
            let address = address.ok_or_else(|| Error::NoAddress(iface.to_string()))?;

            let already_asked = state.arp_waiters.is_pending(&target);
            let (waiter, receiver) = state.arp_waiters.register(target);
            let request = EthernetFrame::encap_arp(
                ArpPacket::request(local_mac, address, target),
                local_mac,
                MacAddr::BROADCAST,
            );
            (request, waiter, receiver, already_asked)
        };

        if !already_asked {
            debug!(host = %self.inner.name, iface, ip = %target, "ARP who-has");
            if !self.transmit(iface, request) {
                self.inner.state.lock().arp_waiters.cancel(&target, waiter);
                return Err(Error::LinkDown(iface.to_string()));
            }
        }

        match wait_for(receiver, self.inner.config.resolution_timeout, Error::HostGone).await {
            Some(outcome) => outcome,
            None => {
                self.inner.state.lock().arp_waiters.cancel(&target, waiter);
                debug!(host = %self.inner.name, iface, ip = %target, "ARP resolution timed out");
                Err(Error::ResolutionTimeout(IpAddr::V4(target)))
            }
        }
    }

    /// Broadcasts an ARP probe (sender address 0.0.0.0) for `addr` and reports whether any
    /// other station claimed it within `limit`.
    pub async fn probe_address(&self, iface: &str, addr: Ipv4Addr, limit: Duration) -> Result<bool> {
        let (probe, waiter, receiver) = {
            let mut state = self.inner.state.lock();
            let local_mac = state.iface(iface)?.mac;
            let (waiter, receiver) = state.probes.register(addr);
            let probe = EthernetFrame::encap_arp(
                ArpPacket::probe(local_mac, addr),
                local_mac,
                MacAddr::BROADCAST,
            );
            (probe, waiter, receiver)
        };

        debug!(host = %self.inner.name, iface, ip = %addr, "ARP probe");
        if !self.transmit(iface, probe) {
            self.inner.state.lock().probes.cancel(&addr, waiter);
            return Err(Error::LinkDown(iface.to_string()));
        }

        match wait_for(receiver, limit, Error::HostGone).await {
            Some(Ok(mac)) => {
                warn!(host = %self.inner.name, iface, ip = %addr, %mac, "address already in use");
                Ok(true)
            }
            Some(Err(err)) => Err(err),
            None => {
                self.inner.state.lock().probes.cancel(&addr, waiter);
                info!(host = %self.inner.name, iface, ip = %addr, "no conflict detected");
                Ok(false)
            }
        }
    }
}
