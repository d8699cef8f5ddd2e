//! Error types surfaced to callers of the host stack.
use std::net::IpAddr;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Caller-facing failures. Malformed or hostile traffic never shows up here: it is dropped and
/// logged by the frame handlers instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("unknown interface {0}")]
    UnknownInterface(String),

    #[error("interface {0} has no IPv4 address")]
    NoAddress(String),

    #[error("interface {0} has no usable IPv6 address")]
    NoIpv6Address(String),

    #[error("no route to {0}")]
    NoRoute(IpAddr),

    #[error("address resolution for {0} timed out")]
    ResolutionTimeout(IpAddr),

    #[error("link on {0} is down")]
    LinkDown(String),

    #[error("interface {0} already exists")]
    DuplicateInterface(String),

    #[error("route {0} not found")]
    RouteNotFound(String),

    #[error("invalid prefix length {0}")]
    InvalidPrefix(u8),

    #[error("host has been shut down")]
    HostGone,
}
