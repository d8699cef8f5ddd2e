use super::{EchoFailure, EchoKey, EchoReply};
use crate::host::Host;
use netsim_packets::{
    EthernetFrame, IcmpMessage, Icmpv6Message, Ipv4Packet, Ipv4Payload, Ipv6Packet, Ipv6Payload,
    MacAddr,
};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tokio::time::Instant;
use tracing::{debug, info};

/// ICMP header plus payload, as ping reports it.
fn echo_bytes(data: &[u8]) -> usize {
    8 + data.len()
}

impl Host {
    pub(super) fn handle_icmpv4(
        &self,
        iface: &str,
        src_mac: MacAddr,
        src: Ipv4Addr,
        dest: Ipv4Addr,
        ttl: u8,
        message: IcmpMessage,
    ) {
        match message {
            IcmpMessage::EchoRequest {
                identifier,
                sequence,
                data,
            } => {
                let frame = {
                    let state = self.inner.state.lock();
                    let interface = match state.iface(iface) {
                        Ok(interface) => interface,
                        Err(_) => return,
                    };
                    let reply_src = if state.owns_ipv4(dest) {
                        dest
                    } else {
                        match interface.address {
                            Some(address) => address,
                            None => return,
                        }
                    };
                    let dest_mac = state.arp.lookup(&src).unwrap_or(src_mac);
                    let reply = Ipv4Packet::new(
                        reply_src,
                        src,
                        self.inner.config.default_ttl,
                        Ipv4Payload::Icmp(IcmpMessage::EchoReply {
                            identifier,
                            sequence,
                            data,
                        }),
                    );
                    EthernetFrame::encap_ipv4(reply, interface.mac, dest_mac)
                };
                debug!(host = %self.inner.name, iface, to = %src, identifier, sequence, "echo reply");
                self.transmit(iface, frame);
            }
            IcmpMessage::EchoReply {
                identifier,
                sequence,
                data,
            } => self.complete_echo(IpAddr::V4(src), identifier, sequence, ttl, echo_bytes(&data)),
            IcmpMessage::DestinationUnreachable { reason, .. } => {
                self.fail_echoes(EchoFailure::Unreachable {
                    from: IpAddr::V4(src),
                    code: reason as u8,
                })
            }
            IcmpMessage::TimeExceeded { .. } => self.fail_echoes(EchoFailure::TimeExceeded {
                from: IpAddr::V4(src),
            }),
        }
    }

    pub(super) fn handle_icmpv6(
        &self,
        iface: &str,
        src_mac: MacAddr,
        src: Ipv6Addr,
        dest: Ipv6Addr,
        hop_limit: u8,
        message: Icmpv6Message,
    ) {
        match message {
            Icmpv6Message::EchoRequest {
                identifier,
                sequence,
                data,
            } => {
                let frame = {
                    let state = self.inner.state.lock();
                    let interface = match state.iface(iface) {
                        Ok(interface) => interface,
                        Err(_) => return,
                    };
                    let reply_src = if state.owns_ipv6(dest) {
                        dest
                    } else {
                        match interface.ipv6_source_for(src) {
                            Some(address) => address,
                            None => return,
                        }
                    };
                    let dest_mac = state.neighbors.lookup(&src).unwrap_or(src_mac);
                    let reply = Ipv6Packet::new(
                        reply_src,
                        src,
                        self.inner.config.hop_limit,
                        Ipv6Payload::Icmpv6(Icmpv6Message::EchoReply {
                            identifier,
                            sequence,
                            data,
                        }),
                    );
                    EthernetFrame::encap_ipv6(reply, interface.mac, dest_mac)
                };
                debug!(host = %self.inner.name, iface, to = %src, identifier, sequence, "echo reply");
                self.transmit(iface, frame);
            }
            Icmpv6Message::EchoReply {
                identifier,
                sequence,
                data,
            } => self.complete_echo(IpAddr::V6(src), identifier, sequence, hop_limit, echo_bytes(&data)),
            Icmpv6Message::DestinationUnreachable { reason, .. } => {
                self.fail_echoes(EchoFailure::Unreachable {
                    from: IpAddr::V6(src),
                    code: reason as u8,
                })
            }
            Icmpv6Message::TimeExceeded { .. } => self.fail_echoes(EchoFailure::TimeExceeded {
                from: IpAddr::V6(src),
            }),
            _ => {}
        }
    }

    fn complete_echo(&self, from: IpAddr, identifier: u16, sequence: u16, ttl: u8, bytes: usize) {
        let key = EchoKey {
            target: from,
            identifier,
            sequence,
        };
        let reply = EchoReply {
            from,
            ttl,
            bytes,
            received_at: Instant::now(),
        };
        let woken = self.inner.state.lock().pings.resolve(&key, reply);
        if woken == 0 {
            debug!(host = %self.inner.name, %from, identifier, sequence, "unmatched echo reply");
        }
    }

    /// An ICMP error carries no reliable correlation to a particular echo, so every outstanding
    /// echo fails with it.
    fn fail_echoes(&self, failure: EchoFailure) {
        let failed = self.inner.state.lock().pings.reject_all(failure.clone());
        if failed > 0 {
            info!(host = %self.inner.name, failed, ?failure, "ICMP error failed outstanding echoes");
        }
    }
}
