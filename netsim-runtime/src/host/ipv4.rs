use crate::host::Host;
use netsim_packets::{Ipv4Packet, Ipv4Payload, MacAddr};
use tracing::debug;

impl Host {
    /// Accepts packets for our addresses, the limited broadcast and the directed broadcast of
    /// the receiving interface. Packets with a bad header checksum are dropped before anything
    /// else looks at them.
    pub(super) fn handle_ipv4(&self, iface: &str, src_mac: MacAddr, packet: Ipv4Packet) {
        if !packet.validate_checksum() {
            debug!(host = %self.inner.name, iface, src = %packet.src_addr, "IPv4 packet dropped: bad header checksum");
            return;
        }

        let dest = packet.dest_addr;
        let accepted = {
            let state = self.inner.state.lock();
            match state.iface(iface) {
                Ok(interface) => {
                    dest.is_broadcast() || interface.broadcast() == Some(dest) || state.owns_ipv4(dest)
                }
                Err(_) => false,
            }
        };
        if !accepted {
            debug!(host = %self.inner.name, iface, %dest, "IPv4 packet not for us");
            return;
        }

        let Ipv4Packet {
            src_addr,
            dest_addr,
            ttl,
            payload,
            ..
        } = packet;
        match payload {
            Ipv4Payload::Icmp(message) => {
                self.handle_icmpv4(iface, src_mac, src_addr, dest_addr, ttl, message)
            }
            Ipv4Payload::Raw { protocol, .. } => {
                debug!(host = %self.inner.name, iface, protocol, "IPv4 protocol not handled");
            }
        }
    }
}
