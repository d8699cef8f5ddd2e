//! A simulated end host: interfaces plugged into ports, the ARP and neighbor caches, IPv4 and
//! IPv6 routing tables, ICMP echo and error handling, and a DHCP client bound to the interface
//! configuration.
//!
//! Frames arriving on any port are queued on the host's inbox and handled one at a time by a
//! dispatch task, so protocol handlers never run re-entrantly. Operations that wait on the
//! network (address resolution, pings, DHCP conflict probes) register a pending waiter, send,
//! and await the waiter under a timeout; the dispatch task completes them.
use crate::classifier::{Classifier, EtherClass, EtherTypeClassifier};
use crate::config::{DhcpConfig, HostConfig};
use crate::dhcp::DhcpClient;
use crate::error::{Error, Result};
use crate::link::Port;
use crate::state::{
    ArpEntry, ArpTable, EchoIdAllocator, Ipv4RouteTable, Ipv6RouteTable, NeighborCache,
    NeighborEntry, PendingRegistry,
};
use futures::channel::oneshot;
use netsim_packets::{ArpPacket, EthernetFrame, Ipv4Packet, Ipv6Packet, MacAddr};
use parking_lot::Mutex;
use std::convert::TryFrom;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

mod arp;

mod dhcp;
use self::dhcp::HostHandle;

mod icmp;

mod interface;
pub use self::interface::*;

mod ipv4;

mod ipv6;

mod ndp;

mod ping;
pub use self::ping::*;

mod routing;

struct InboundFrame {
    iface: String,
    frame: EthernetFrame,
}

pub(crate) struct HostState {
    interfaces: Vec<Interface>,
    arp: ArpTable,
    neighbors: NeighborCache,
    routes: Ipv4RouteTable,
    ipv6_routes: Ipv6RouteTable,
    arp_waiters: PendingRegistry<Ipv4Addr, MacAddr, Error>,
    nd_waiters: PendingRegistry<Ipv6Addr, MacAddr, Error>,
    /// Conflict probes in flight, keyed by the address being probed.
    probes: PendingRegistry<Ipv4Addr, MacAddr, Error>,
    pings: PendingRegistry<EchoKey, EchoReply, EchoFailure>,
    echo_ids: EchoIdAllocator,
}

impl HostState {
    fn new() -> HostState {
        HostState {
            interfaces: Vec::new(),
            arp: ArpTable::new(),
            neighbors: NeighborCache::new(),
            routes: Ipv4RouteTable::new(),
            ipv6_routes: Ipv6RouteTable::new(),
            arp_waiters: PendingRegistry::new(),
            nd_waiters: PendingRegistry::new(),
            probes: PendingRegistry::new(),
            pings: PendingRegistry::new(),
            echo_ids: EchoIdAllocator::new(),
        }
    }

    fn iface(&self, name: &str) -> Result<&Interface> {
        self.interfaces
            .iter()
            .find(|interface| interface.name == name)
            .ok_or_else(|| Error::UnknownInterface(name.to_string()))
    }

    fn iface_mut(&mut self, name: &str) -> Result<&mut Interface> {
        self.interfaces
            .iter_mut()
            .find(|interface| interface.name == name)
            .ok_or_else(|| Error::UnknownInterface(name.to_string()))
    }

    fn owns_ipv4(&self, addr: Ipv4Addr) -> bool {
        addr.is_loopback()
            || self
                .interfaces
                .iter()
                .any(|interface| interface.owns_ipv4(addr))
    }

    fn owns_ipv6(&self, addr: Ipv6Addr) -> bool {
        addr.is_loopback()
            || self
                .interfaces
                .iter()
                .any(|interface| interface.owns_ipv6(addr))
    }
}

pub(crate) struct HostInner {
    name: String,
    config: HostConfig,
    state: Mutex<HostState>,
    inbox: mpsc::UnboundedSender<InboundFrame>,
    inbox_rx: Mutex<Option<mpsc::UnboundedReceiver<InboundFrame>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    dhcp: DhcpClient,
}

impl Drop for HostInner {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.dispatcher.get_mut().take() {
            dispatcher.abort();
        }
    }
}

/// Handle to a simulated host. Clones share the same host.
#[derive(Clone)]
pub struct Host {
    inner: Arc<HostInner>,
}

impl Host {
    pub fn new(name: &str, config: HostConfig) -> Host {
        Host::with_dhcp_config(name, config, DhcpConfig::default())
    }

    pub fn with_dhcp_config(name: &str, config: HostConfig, dhcp_config: DhcpConfig) -> Host {
        let (inbox, inbox_rx) = mpsc::unbounded_channel();
        let inner = Arc::new_cyclic(|weak: &Weak<HostInner>| {
            let handle = Arc::new(HostHandle::new(weak.clone()));
            let dhcp = DhcpClient::new(name, dhcp_config, handle.clone());
            dhcp.set_conflict_checker(handle);
            HostInner {
                name: name.to_string(),
                config,
                state: Mutex::new(HostState::new()),
                inbox,
                inbox_rx: Mutex::new(Some(inbox_rx)),
                dispatcher: Mutex::new(None),
                dhcp,
            }
        });
        Host { inner }
    }

    fn from_inner(inner: Arc<HostInner>) -> Host {
        Host { inner }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &HostConfig {
        &self.inner.config
    }

    /// Spawns the dispatch task that handles inbound frames. Must be called from within a tokio
    /// runtime; later calls do nothing.
    pub fn start(&self) {
        let mut inbox = match self.inner.inbox_rx.lock().take() {
            Some(inbox) => inbox,
            None => return,
        };
        let host = Arc::downgrade(&self.inner);
        let dispatcher = tokio::spawn(async move {
            while let Some(inbound) = inbox.recv().await {
                match host.upgrade() {
                    Some(inner) => Host::from_inner(inner).handle_frame(&inbound.iface, inbound.frame),
                    None => break,
                }
            }
        });
        *self.inner.dispatcher.lock() = Some(dispatcher);
        debug!(host = %self.inner.name, "dispatcher started");
    }

    /// Plugs a new interface into `port`. It comes up with only its link-local IPv6 address.
    pub fn add_interface(&self, name: &str, mac: MacAddr, port: Arc<dyn Port>) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if state.iface(name).is_ok() {
                return Err(Error::DuplicateInterface(name.to_string()));
            }
            state
                .interfaces
                .push(Interface::new(name, mac, Arc::clone(&port)));
        }

        let inbox = self.inner.inbox.clone();
        let iface = name.to_string();
        port.on_frame(Box::new(move |frame| {
            let _ = inbox.send(InboundFrame {
                iface: iface.clone(),
                frame,
            });
        }));
        info!(host = %self.inner.name, iface = name, %mac, "interface added");
        Ok(())
    }

    pub fn interface(&self, name: &str) -> Option<Interface> {
        self.inner.state.lock().iface(name).ok().cloned()
    }

    pub fn interfaces(&self) -> Vec<Interface> {
        self.inner.state.lock().interfaces.clone()
    }

    pub fn owns_address(&self, addr: IpAddr) -> bool {
        let state = self.inner.state.lock();
        match addr {
            IpAddr::V4(addr) => state.owns_ipv4(addr),
            IpAddr::V6(addr) => state.owns_ipv6(addr),
        }
    }

    pub fn arp_table(&self) -> Vec<(Ipv4Addr, ArpEntry)> {
        self.inner.state.lock().arp.entries()
    }

    pub fn neighbor_cache(&self) -> Vec<(Ipv6Addr, NeighborEntry)> {
        self.inner.state.lock().neighbors.entries()
    }

    fn handle_frame(&self, iface: &str, frame: EthernetFrame) {
        let classifier = match self.inner.state.lock().iface(iface) {
            Ok(interface) => EtherTypeClassifier::new(interface.mac),
            Err(_) => return,
        };
        let src_mac = frame.src_mac;
        match classifier.classify(&frame) {
            EtherClass::NotForUs => {
                trace!(host = %self.inner.name, iface, dest = %frame.dest_mac, "frame not for us");
            }
            EtherClass::Arp => {
                if let Ok(packet) = ArpPacket::try_from(frame) {
                    self.handle_arp(iface, packet);
                }
            }
            EtherClass::Ipv4 => {
                if let Ok(packet) = Ipv4Packet::try_from(frame) {
                    self.handle_ipv4(iface, src_mac, packet);
                }
            }
            EtherClass::Ipv6 => {
                if let Ok(packet) = Ipv6Packet::try_from(frame) {
                    self.handle_ipv6(iface, src_mac, packet);
                }
            }
        }
    }

    /// Puts a frame on the wire of `iface`. False when the interface is unknown or its link
    /// does not carry the frame.
    fn transmit(&self, iface: &str, frame: EthernetFrame) -> bool {
        let port = match self.inner.state.lock().iface(iface) {
            Ok(interface) => interface.port(),
            Err(_) => return false,
        };
        let sent = port.send_frame(frame);
        if !sent {
            debug!(host = %self.inner.name, iface, "frame not delivered");
        }
        sent
    }
}

/// Awaits a pending waiter for at most `limit`. `None` means the timeout won; the caller still
/// has to withdraw its waiter.
async fn wait_for<T, E>(
    receiver: oneshot::Receiver<std::result::Result<T, E>>,
    limit: Duration,
    gone: E,
) -> Option<std::result::Result<T, E>> {
    match tokio::time::timeout(limit, receiver).await {
        Ok(Ok(outcome)) => Some(outcome),
        Ok(Err(_canceled)) => Some(Err(gone)),
        Err(_elapsed) => None,
    }
}
