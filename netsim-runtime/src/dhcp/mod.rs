//! DHCP client (RFC 2131 §4.4, options from RFC 2132). One lease state machine per interface,
//! driven by explicit requests and by the T1, T2 and expiration timers of the bound lease.
use std::fmt;
use std::net::Ipv4Addr;
use thiserror::Error;

mod client;
pub use self::client::*;

mod collaborators;
pub use self::collaborators::*;

mod lease;
pub use self::lease::*;

pub type DhcpResult<T> = std::result::Result<T, DhcpError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DhcpError {
    #[error("unknown interface {0}")]
    UnknownInterface(String),

    #[error("a DHCP exchange is already running on {0}")]
    InProgress(String),

    #[error("no DHCPOFFER received on {0}")]
    NoOffers(String),

    #[error("no DHCPACK received on {0}")]
    NoAck(String),

    #[error("server {server} refused the request on {iface}")]
    Nak { iface: String, server: Ipv4Addr },

    #[error("gave up on {iface} after {declines} declined offers")]
    TooManyDeclines { iface: String, declines: u32 },

    #[error("no lease held on {0}")]
    NoLease(String),
}

/// Client states of RFC 2131 figure 5.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DhcpState {
    Init,
    Selecting,
    Requesting,
    Bound,
    Renewing,
    Rebinding,
    InitReboot,
    Rebooting,
}

impl fmt::Display for DhcpState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            DhcpState::Init => "INIT",
            DhcpState::Selecting => "SELECTING",
            DhcpState::Requesting => "REQUESTING",
            DhcpState::Bound => "BOUND",
            DhcpState::Renewing => "RENEWING",
            DhcpState::Rebinding => "REBINDING",
            DhcpState::InitReboot => "INIT-REBOOT",
            DhcpState::Rebooting => "REBOOTING",
        };
        f.write_str(name)
    }
}
