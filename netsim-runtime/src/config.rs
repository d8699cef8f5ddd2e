use std::time::Duration;

/// Tunables of one simulated host. The defaults match what common operating systems use.
#[derive(Clone, Debug, PartialEq)]
pub struct HostConfig {
    /// TTL of every IPv4 packet the host originates.
    pub default_ttl: u8,
    /// Hop limit of every IPv6 packet the host originates.
    pub hop_limit: u8,
    /// How long an ARP or NDP resolution waits for its reply.
    pub resolution_timeout: Duration,
    /// How long an address conflict probe listens before declaring the address free.
    pub probe_timeout: Duration,
    /// How long ping and traceroute wait for each answer unless told otherwise.
    pub ping_timeout: Duration,
    /// Bytes of data carried by echo requests.
    pub echo_payload_len: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        HostConfig {
            default_ttl: 64,
            hop_limit: 64,
            resolution_timeout: Duration::from_secs(2),
            probe_timeout: Duration::from_millis(500),
            ping_timeout: Duration::from_secs(2),
            echo_payload_len: 56,
        }
    }
}

impl HostConfig {
    pub fn new() -> Self {
        HostConfig::default()
    }

    pub fn default_ttl(mut self, ttl: u8) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn hop_limit(mut self, hop_limit: u8) -> Self {
        self.hop_limit = hop_limit;
        self
    }

    pub fn resolution_timeout(mut self, timeout: Duration) -> Self {
        self.resolution_timeout = timeout;
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    pub fn echo_payload_len(mut self, len: usize) -> Self {
        self.echo_payload_len = len;
        self
    }
}

/// Tunables of the DHCP client.
#[derive(Clone, Debug, PartialEq)]
pub struct DhcpConfig {
    /// How many DHCPDECLINEs one acquisition may send before giving up. Zero acts as one.
    pub decline_limit: u32,
    /// When no server answers, bind a made-up lease in 192.168.100.0/24 instead of failing.
    /// Real clients never do this.
    pub synthesize_fallback: bool,
    /// Lease time assumed when an ACK omits option 51.
    pub default_lease_time: Duration,
}

impl Default for DhcpConfig {
    fn default() -> Self {
        DhcpConfig {
            decline_limit: 3,
            synthesize_fallback: false,
            default_lease_time: Duration::from_secs(86_400),
        }
    }
}

impl DhcpConfig {
    pub fn new() -> Self {
        DhcpConfig::default()
    }

    /// A conflicting offer is always declined, so the limit is at least one.
    pub fn decline_limit(mut self, limit: u32) -> Self {
        self.decline_limit = limit.max(1);
        self
    }

    pub fn synthesize_fallback(mut self, enabled: bool) -> Self {
        self.synthesize_fallback = enabled;
        self
    }

    pub fn default_lease_time(mut self, lease_time: Duration) -> Self {
        self.default_lease_time = lease_time;
        self
    }
}
