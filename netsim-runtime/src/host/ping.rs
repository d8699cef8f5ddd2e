//! ICMP echo measurement: `ping` and `traceroute` for both address families.
use super::wait_for;
use crate::host::Host;
use netsim_packets::{
    EthernetFrame, IcmpMessage, Icmpv6Message, Ipv4Packet, Ipv4Payload, Ipv6Packet, Ipv6Payload,
    MacAddr,
};
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Correlates an echo reply with its request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EchoKey {
    pub target: IpAddr,
    pub identifier: u16,
    pub sequence: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EchoReply {
    pub from: IpAddr,
    pub ttl: u8,
    pub bytes: usize,
    pub received_at: Instant,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EchoFailure {
    Timeout,
    LinkDown,
    /// Destination Unreachable, with the ICMP code.
    Unreachable { from: IpAddr, code: u8 },
    TimeExceeded { from: IpAddr },
}

impl EchoFailure {
    /// The node that reported the failure, if any did.
    pub fn responder(&self) -> Option<IpAddr> {
        match self {
            EchoFailure::Unreachable { from, .. } | EchoFailure::TimeExceeded { from } => {
                Some(*from)
            }
            EchoFailure::Timeout | EchoFailure::LinkDown => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PingResult {
    pub seq: u16,
    pub success: bool,
    pub rtt: Option<Duration>,
    pub ttl: Option<u8>,
    pub bytes: usize,
    pub from: Option<IpAddr>,
    pub failure: Option<EchoFailure>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TracerouteHop {
    pub hop: u8,
    pub responder: Option<IpAddr>,
    pub rtt: Option<Duration>,
    /// The target itself answered.
    pub reached: bool,
    pub failure: Option<EchoFailure>,
}

/// Everything needed to put echo requests on the wire towards one target.
struct EchoPath {
    iface: String,
    src: IpAddr,
    local_mac: MacAddr,
    next_hop_mac: MacAddr,
    identifier: u16,
}

impl Host {
    /// Sends `count` echo requests to `target`, one after the other, each waiting up to
    /// `timeout` for its reply. Returns one result per request, or nothing when no route or
    /// next hop exists. Our own addresses answer immediately without touching the link.
    pub async fn ping(&self, target: IpAddr, count: u16, timeout: Duration) -> Vec<PingResult> {
        let payload_len = self.inner.config.echo_payload_len;
        if self.owns_address(target) {
            let ttl = self.local_ttl(target);
            return (1..=count)
                .map(|seq| PingResult {
                    seq,
                    success: true,
                    rtt: Some(Duration::from_secs(0)),
                    ttl: Some(ttl),
                    bytes: 8 + payload_len,
                    from: Some(target),
                    failure: None,
                })
                .collect();
        }

        let path = match self.echo_path(target).await {
            Some(path) => path,
            None => return Vec::new(),
        };
        let ttl = self.local_ttl(target);
        let mut results = Vec::with_capacity(usize::from(count));
        for seq in 1..=count {
            let (sent_at, outcome) = self.echo_once(&path, target, seq, ttl, timeout).await;
            let result = match outcome {
                Ok(reply) => PingResult {
                    seq,
                    success: true,
                    rtt: Some(reply.received_at.saturating_duration_since(sent_at)),
                    ttl: Some(reply.ttl),
                    bytes: reply.bytes,
                    from: Some(reply.from),
                    failure: None,
                },
                Err(failure) => PingResult {
                    seq,
                    success: false,
                    rtt: None,
                    ttl: None,
                    bytes: 0,
                    from: failure.responder(),
                    failure: Some(failure),
                },
            };
            info!(host = %self.inner.name, %target, seq, success = result.success, rtt = ?result.rtt, "ping");
            results.push(result);
        }
        results
    }

    /// Probes the path to `target` with increasing TTL (hop limit), one echo per hop. Stops once
    /// the target answers; time exceeded, unreachable and silent hops are recorded and probing
    /// goes on until `max_hops`.
    pub async fn traceroute(&self, target: IpAddr, max_hops: u8, timeout: Duration) -> Vec<TracerouteHop> {
        if max_hops == 0 {
            return Vec::new();
        }
        if self.owns_address(target) {
            return vec![TracerouteHop {
                hop: 1,
                responder: Some(target),
                rtt: Some(Duration::from_secs(0)),
                reached: true,
                failure: None,
            }];
        }

        let path = match self.echo_path(target).await {
            Some(path) => path,
            None => return Vec::new(),
        };
        let mut hops = Vec::new();
        for ttl in 1..=max_hops {
            let (sent_at, outcome) = self
                .echo_once(&path, target, u16::from(ttl), ttl, timeout)
                .await;
            let hop = match outcome {
                Ok(reply) => TracerouteHop {
                    hop: ttl,
                    responder: Some(reply.from),
                    rtt: Some(reply.received_at.saturating_duration_since(sent_at)),
                    reached: true,
                    failure: None,
                },
                Err(failure) => TracerouteHop {
                    hop: ttl,
                    responder: failure.responder(),
                    rtt: failure
                        .responder()
                        .map(|_| Instant::now().saturating_duration_since(sent_at)),
                    reached: false,
                    failure: Some(failure),
                },
            };
            info!(host = %self.inner.name, %target, hop = ttl, responder = ?hop.responder, "traceroute hop");
            let reached = hop.reached;
            hops.push(hop);
            if reached {
                break;
            }
        }
        hops
    }

    fn local_ttl(&self, target: IpAddr) -> u8 {
        match target {
            IpAddr::V4(_) => self.inner.config.default_ttl,
            IpAddr::V6(_) => self.inner.config.hop_limit,
        }
    }

    /// Routes `target`, picks a source address and resolves the next hop. `None`, after
    /// logging why, when any of those steps fails.
    async fn echo_path(&self, target: IpAddr) -> Option<EchoPath> {
        let route = match target {
            IpAddr::V4(dest) => self
                .resolve_route(dest)
                .map(|route| (route.iface, IpAddr::V4(route.next_hop))),
            IpAddr::V6(dest) => self
                .resolve_route_v6(dest)
                .map(|route| (route.iface, IpAddr::V6(route.next_hop))),
        };
        let (iface, next_hop) = match route {
            Some(route) => route,
            None => {
                info!(host = %self.inner.name, %target, "no route to host");
                return None;
            }
        };
        let (src, local_mac) = {
            let state = self.inner.state.lock();
            let interface = state.iface(&iface).ok()?;
            let src = match target {
                IpAddr::V4(_) => interface.address.map(IpAddr::V4),
                IpAddr::V6(dest) => interface.ipv6_source_for(dest).map(IpAddr::V6),
            };
            (src, interface.mac)
        };
        let src = match src {
            Some(src) => src,
            None => {
                info!(host = %self.inner.name, iface = %iface, %target, "no source address for echo");
                return None;
            }
        };

        let resolved = match next_hop {
            IpAddr::V4(hop) => self.resolve_ipv4(&iface, hop).await,
            IpAddr::V6(hop) => self.resolve_ipv6(&iface, hop).await,
        };
        let next_hop_mac = match resolved {
            Ok(mac) => mac,
            Err(err) => {
                info!(host = %self.inner.name, iface = %iface, %next_hop, error = %err, "next hop unresolved");
                return None;
            }
        };

        let identifier = self.inner.state.lock().echo_ids.next_id(&iface);
        Some(EchoPath {
            iface,
            src,
            local_mac,
            next_hop_mac,
            identifier,
        })
    }

    /// One echo request with the given TTL. Returns when it was sent and how it ended.
    async fn echo_once(
        &self,
        path: &EchoPath,
        target: IpAddr,
        sequence: u16,
        ttl: u8,
        timeout: Duration,
    ) -> (Instant, Result<EchoReply, EchoFailure>) {
        let key = EchoKey {
            target,
            identifier: path.identifier,
            sequence,
        };
        let data = vec![0u8; self.inner.config.echo_payload_len];
        let frame = match (path.src, target) {
            (IpAddr::V4(src), IpAddr::V4(dest)) => {
                let request = IcmpMessage::EchoRequest {
                    identifier: path.identifier,
                    sequence,
                    data,
                };
                let packet = Ipv4Packet::new(src, dest, ttl, Ipv4Payload::Icmp(request));
                EthernetFrame::encap_ipv4(packet, path.local_mac, path.next_hop_mac)
            }
            (IpAddr::V6(src), IpAddr::V6(dest)) => {
                let request = Icmpv6Message::EchoRequest {
                    identifier: path.identifier,
                    sequence,
                    data,
                };
                let packet = Ipv6Packet::new(src, dest, ttl, Ipv6Payload::Icmpv6(request));
                EthernetFrame::encap_ipv6(packet, path.local_mac, path.next_hop_mac)
            }
            _ => return (Instant::now(), Err(EchoFailure::LinkDown)),
        };

        let (waiter, receiver) = self.inner.state.lock().pings.register(key);
        let sent_at = Instant::now();
        debug!(host = %self.inner.name, iface = %path.iface, %target, sequence, ttl, "echo request");
        if !self.transmit(&path.iface, frame) {
            self.inner.state.lock().pings.cancel(&key, waiter);
            return (sent_at, Err(EchoFailure::LinkDown));
        }

        match wait_for(receiver, timeout, EchoFailure::Timeout).await {
            Some(outcome) => (sent_at, outcome),
            None => {
                self.inner.state.lock().pings.cancel(&key, waiter);
                (sent_at, Err(EchoFailure::Timeout))
            }
        }
    }
}
