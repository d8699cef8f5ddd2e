extern crate crossbeam;
extern crate futures;
extern crate tokio;

/// Classifiers sort inbound frames without modifying them. The host dispatcher runs every frame through one before handing it
/// to the ARP, IPv4 or IPv6 handler.
pub mod classifier;

/// Tunables for hosts and their DHCP clients. Everything has a sensible default and a builder-style setter.
pub mod config;

/// The DHCP client state machine (RFC 2131), its lease bookkeeping, and the traits it uses to reach servers, check for
/// address conflicts and apply leases to an interface.
pub mod dhcp;

/// Caller-facing error types.
pub mod error;

/// The simulated host: interfaces, address resolution, routing, ICMP, ping and traceroute, with frame dispatch running on
/// its own task. Start here.
pub mod host;

/// Ports are what a host's interfaces plug into. A `Wire` is a point-to-point link with a tap for observing traffic.
pub mod link;

/// Processors are the unit of per-packet transformation: answering ARP, decrementing the hop limit, generating ICMP errors.
/// Each implements `Processor`, taking a packet and returning zero or one packets.
pub mod processor;

/// Tables and registries shared by the protocol handlers: the ARP table, the neighbor cache, the routing tables, and the
/// registry of requests awaiting an answer from the network.
pub mod state;

/// Test fixtures, public so that integration tests and downstream crates can build topologies.
pub mod utils;

pub use crate::config::{DhcpConfig, HostConfig};
pub use crate::error::{Error, Result};
pub use crate::host::Host;
