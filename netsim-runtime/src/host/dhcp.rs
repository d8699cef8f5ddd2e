use super::HostInner;
use crate::dhcp::{
    ConflictChecker, DhcpClient, DhcpLease, DhcpResult, DhcpServer, DhcpState, InterfaceConfigSink,
};
use crate::host::Host;
use futures::future::{self, BoxFuture};
use netsim_packets::MacAddr;
use std::net::Ipv4Addr;
use std::sync::{Arc, Weak};
use tracing::warn;

/// The host as seen by its own DHCP client. Holds the host weakly so the client does not keep
/// it alive.
pub(super) struct HostHandle {
    host: Weak<HostInner>,
}

impl HostHandle {
    pub(super) fn new(host: Weak<HostInner>) -> HostHandle {
        HostHandle { host }
    }

    fn host(&self) -> Option<Host> {
        self.host.upgrade().map(Host::from_inner)
    }
}

impl InterfaceConfigSink for HostHandle {
    fn hardware_address(&self, iface: &str) -> Option<MacAddr> {
        self.host()?.interface(iface).map(|interface| interface.mac)
    }

    fn apply_lease(&self, iface: &str, lease: &DhcpLease) {
        let host = match self.host() {
            Some(host) => host,
            None => return,
        };
        if let Err(err) = host.configure_interface(iface, lease.ip, lease.mask) {
            warn!(host = %host.name(), iface, error = %err, "could not apply lease");
            return;
        }
        if let Some(gateway) = lease.gateway {
            if let Err(err) = host.set_default_gateway(gateway) {
                warn!(host = %host.name(), iface, %gateway, error = %err, "lease gateway not usable");
            }
        }
    }

    fn clear_lease(&self, iface: &str) {
        if let Some(host) = self.host() {
            if let Err(err) = host.clear_interface(iface) {
                warn!(host = %host.name(), iface, error = %err, "could not clear lease");
            }
        }
    }
}

/// ARP-probes the offered address on the interface the lease is for.
impl ConflictChecker for HostHandle {
    fn check(&self, iface: &str, ip: Ipv4Addr) -> BoxFuture<'static, bool> {
        let host = match self.host() {
            Some(host) => host,
            None => return Box::pin(future::ready(false)),
        };
        let iface = iface.to_string();
        Box::pin(async move {
            let limit = host.config().probe_timeout;
            match host.probe_address(&iface, ip, limit).await {
                Ok(in_use) => in_use,
                Err(err) => {
                    warn!(host = %host.name(), iface = %iface, %ip, error = %err, "conflict probe failed");
                    false
                }
            }
        })
    }
}

impl Host {
    pub fn dhcp(&self) -> &DhcpClient {
        &self.inner.dhcp
    }

    pub async fn request_lease(&self, iface: &str) -> DhcpResult<DhcpLease> {
        self.inner.dhcp.request_lease(iface).await
    }

    pub fn release_lease(&self, iface: &str) -> DhcpResult<()> {
        self.inner.dhcp.release_lease(iface)
    }

    pub fn add_dhcp_server(&self, server: Arc<dyn DhcpServer>) {
        self.inner.dhcp.add_server(server);
    }

    /// Replaces the default checker, which ARP-probes the offered address.
    pub fn set_conflict_checker(&self, checker: Arc<dyn ConflictChecker>) {
        self.inner.dhcp.set_conflict_checker(checker);
    }

    pub fn dhcp_state(&self, iface: &str) -> DhcpState {
        self.inner.dhcp.state(iface)
    }

    pub fn dhcp_lease(&self, iface: &str) -> Option<DhcpLease> {
        self.inner.dhcp.lease(iface)
    }

    pub fn dhcp_logs(&self, iface: &str) -> Vec<String> {
        self.inner.dhcp.logs(iface)
    }
}
