use netsim_packets::{ipv4_mask, ipv4_prefix_len, DhcpMessage, MacAddr};
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::time::Instant;

/// An address binding obtained from a server (or, with the fallback enabled, made up locally).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DhcpLease {
    pub iface: String,
    pub ip: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub gateway: Option<Ipv4Addr>,
    pub dns_servers: Vec<Ipv4Addr>,
    pub domain_name: Option<String>,
    pub server_identifier: Ipv4Addr,
    pub lease_start: Instant,
    pub lease_duration: Duration,
    /// T1, relative to `lease_start`.
    pub renewal_time: Duration,
    /// T2, relative to `lease_start`.
    pub rebinding_time: Duration,
    pub expiration: Instant,
    pub xid: u32,
    /// True when no server was involved.
    pub synthesized: bool,
}

impl DhcpLease {
    /// Builds the lease an ACK describes. Missing T1/T2 default to 50% and 87.5% of the lease
    /// time (RFC 2131 §4.4.5); inconsistent ones are replaced by the defaults as well.
    pub fn from_ack(
        iface: &str,
        ack: &DhcpMessage,
        xid: u32,
        default_lease_time: Duration,
        now: Instant,
    ) -> DhcpLease {
        let options = &ack.options;
        let lease_duration = options
            .lease_time
            .map(|secs| Duration::from_secs(u64::from(secs)))
            .unwrap_or(default_lease_time);
        let default_t1 = lease_duration / 2;
        let default_t2 = lease_duration * 7 / 8;

        let mut renewal_time = options
            .renewal_time
            .map(|secs| Duration::from_secs(u64::from(secs)))
            .unwrap_or(default_t1);
        let mut rebinding_time = options
            .rebinding_time
            .map(|secs| Duration::from_secs(u64::from(secs)))
            .unwrap_or(default_t2);
        if !(renewal_time < rebinding_time && rebinding_time < lease_duration) {
            renewal_time = default_t1;
            rebinding_time = default_t2;
        }

        DhcpLease {
            iface: iface.to_string(),
            ip: ack.yiaddr,
            mask: options.subnet_mask.unwrap_or_else(|| ipv4_mask(24)),
            gateway: options.router,
            dns_servers: options.dns_servers.clone(),
            domain_name: options.domain_name.clone(),
            server_identifier: ack.server_id().unwrap_or(ack.siaddr),
            lease_start: now,
            lease_duration,
            renewal_time,
            rebinding_time,
            expiration: now + lease_duration,
            xid,
            synthesized: false,
        }
    }

    /// Deterministic private lease in 192.168.100.0/24, host part taken from the MAC.
    pub fn synthesized(
        iface: &str,
        mac: MacAddr,
        lease_duration: Duration,
        xid: u32,
        now: Instant,
    ) -> DhcpLease {
        let host = 2 + mac.bytes[5] % 253;
        let gateway = Ipv4Addr::new(192, 168, 100, 1);
        DhcpLease {
            iface: iface.to_string(),
            ip: Ipv4Addr::new(192, 168, 100, host),
            mask: ipv4_mask(24),
            gateway: Some(gateway),
            dns_servers: vec![gateway],
            domain_name: None,
            server_identifier: gateway,
            lease_start: now,
            lease_duration,
            renewal_time: lease_duration / 2,
            rebinding_time: lease_duration * 7 / 8,
            expiration: now + lease_duration,
            xid,
            synthesized: true,
        }
    }

    pub fn prefix_len(&self) -> u8 {
        ipv4_prefix_len(self.mask)
    }

    pub fn renewal_at(&self) -> Instant {
        self.lease_start + self.renewal_time
    }

    pub fn rebinding_at(&self) -> Instant {
        self.lease_start + self.rebinding_time
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expiration
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.expiration.saturating_duration_since(now)
    }
}
