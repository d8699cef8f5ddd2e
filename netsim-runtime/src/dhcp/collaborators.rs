use crate::dhcp::DhcpLease;
use futures::future::{self, BoxFuture};
use netsim_packets::{DhcpMessage, MacAddr};
use std::net::Ipv4Addr;

/// A DHCP server reachable from the client's segment. Replies are matched to requests by XID;
/// `None` means the server stayed silent.
pub trait DhcpServer: Send + Sync {
    fn server_identifier(&self) -> Ipv4Addr;

    /// DHCPDISCOVER in, DHCPOFFER out.
    fn process_discover(&self, discover: &DhcpMessage) -> Option<DhcpMessage>;

    /// DHCPREQUEST in, DHCPACK or DHCPNAK out.
    fn process_request(&self, request: &DhcpMessage) -> Option<DhcpMessage>;

    fn process_release(&self, release: &DhcpMessage);

    fn process_decline(&self, decline: &DhcpMessage);
}

/// Decides whether an offered address is already in use on the link. Consulted once per ACK,
/// before the address is bound.
pub trait ConflictChecker: Send + Sync {
    fn check(&self, iface: &str, ip: Ipv4Addr) -> BoxFuture<'static, bool>;
}

/// Never reports a conflict.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoConflicts;

impl ConflictChecker for NoConflicts {
    fn check(&self, _iface: &str, _ip: Ipv4Addr) -> BoxFuture<'static, bool> {
        Box::pin(future::ready(false))
    }
}

/// Where bound leases take effect: the interface configuration of the host running the client.
pub trait InterfaceConfigSink: Send + Sync {
    /// Hardware address used as chaddr and client identifier. `None` for unknown interfaces.
    fn hardware_address(&self, iface: &str) -> Option<MacAddr>;

    fn apply_lease(&self, iface: &str, lease: &DhcpLease);

    fn clear_lease(&self, iface: &str);
}
