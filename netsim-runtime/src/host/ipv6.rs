use crate::host::Host;
use netsim_packets::{Ipv6Packet, Ipv6Payload, MacAddr};
use tracing::debug;

impl Host {
    /// Accepts packets for our addresses and for the multicast groups the receiving interface
    /// has joined, then splits Neighbor Discovery from the rest of ICMPv6.
    pub(super) fn handle_ipv6(&self, iface: &str, src_mac: MacAddr, packet: Ipv6Packet) {
        let dest = packet.dest_addr;
        let accepted = {
            let state = self.inner.state.lock();
            match state.iface(iface) {
                Ok(interface) => interface.joined_groups().contains(&dest) || state.owns_ipv6(dest),
                Err(_) => false,
            }
        };
        if !accepted {
            debug!(host = %self.inner.name, iface, %dest, "IPv6 packet not for us");
            return;
        }

        match packet.payload.clone() {
            Ipv6Payload::Icmpv6(message) if message.is_neighbor_discovery() => {
                self.handle_ndp(iface, src_mac, &packet, message)
            }
            Ipv6Payload::Icmpv6(message) => self.handle_icmpv6(
                iface,
                src_mac,
                packet.src_addr,
                dest,
                packet.hop_limit,
                message,
            ),
            Ipv6Payload::Raw { next_header, .. } => {
                debug!(host = %self.inner.name, iface, next_header, "IPv6 next header not handled");
            }
        }
    }
}
