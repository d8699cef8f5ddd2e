use netsim_packets::MacAddr;
use std::collections::HashMap;
use std::fmt;
use std::net::Ipv6Addr;
use tokio::time::Instant;

/// Neighbor Unreachability Detection states of RFC 4861 §7.3.2.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NeighborState {
    Incomplete,
    Reachable,
    Stale,
    Delay,
    Probe,
}

impl fmt::Display for NeighborState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            NeighborState::Incomplete => "INCOMPLETE",
            NeighborState::Reachable => "REACHABLE",
            NeighborState::Stale => "STALE",
            NeighborState::Delay => "DELAY",
            NeighborState::Probe => "PROBE",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NeighborEntry {
    pub mac: MacAddr,
    pub iface: String,
    pub state: NeighborState,
    pub is_router: bool,
    pub learned_at: Instant,
}

#[derive(Debug, Default)]
pub struct NeighborCache {
    neighbors: HashMap<Ipv6Addr, NeighborEntry>,
}

impl NeighborCache {
    pub fn new() -> Self {
        NeighborCache {
            neighbors: HashMap::new(),
        }
    }

    pub fn get(&self, addr: &Ipv6Addr) -> Option<&NeighborEntry> {
        self.neighbors.get(addr)
    }

    /// A usable link address: any state but INCOMPLETE.
    pub fn lookup(&self, addr: &Ipv6Addr) -> Option<MacAddr> {
        self.neighbors
            .get(addr)
            .filter(|entry| entry.state != NeighborState::Incomplete)
            .map(|entry| entry.mac)
    }

    /// Records what an NS, NA or RA taught us. `is_router` is only ever raised here; callers
    /// that know a neighbor stopped routing use `clear_router`.
    pub fn update(
        &mut self,
        addr: Ipv6Addr,
        mac: MacAddr,
        iface: &str,
        state: NeighborState,
        is_router: bool,
    ) {
        let was_router = self
            .neighbors
            .get(&addr)
            .map(|entry| entry.is_router)
            .unwrap_or(false);
        self.neighbors.insert(
            addr,
            NeighborEntry {
                mac,
                iface: iface.to_string(),
                state,
                is_router: is_router || was_router,
                learned_at: Instant::now(),
            },
        );
    }

    pub fn clear_router(&mut self, addr: &Ipv6Addr) {
        if let Some(entry) = self.neighbors.get_mut(addr) {
            entry.is_router = false;
        }
    }

    pub fn remove(&mut self, addr: &Ipv6Addr) -> Option<NeighborEntry> {
        self.neighbors.remove(addr)
    }

    pub fn flush_iface(&mut self, iface: &str) {
        self.neighbors.retain(|_, entry| entry.iface != iface);
    }

    pub fn entries(&self) -> Vec<(Ipv6Addr, NeighborEntry)> {
        let mut entries: Vec<_> = self
            .neighbors
            .iter()
            .map(|(addr, entry)| (*addr, entry.clone()))
            .collect();
        entries.sort_by_key(|(addr, _)| *addr);
        entries
    }

    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> Ipv6Addr {
        "fe80::1".parse().unwrap()
    }

    #[tokio::test]
    async fn incomplete_entries_do_not_resolve() {
        let mut cache = NeighborCache::new();
        cache.update(addr(), MacAddr::ZERO, "eth0", NeighborState::Incomplete, false);
        assert_eq!(cache.lookup(&addr()), None);

        let mac = MacAddr::new([2, 0, 0, 0, 0, 1]);
        cache.update(addr(), mac, "eth0", NeighborState::Stale, false);
        assert_eq!(cache.lookup(&addr()), Some(mac));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn router_flag_is_sticky() {
        let mut cache = NeighborCache::new();
        let mac = MacAddr::new([2, 0, 0, 0, 0, 1]);
        cache.update(addr(), mac, "eth0", NeighborState::Stale, true);
        cache.update(addr(), mac, "eth0", NeighborState::Reachable, false);
        let entry = cache.get(&addr()).unwrap();
        assert!(entry.is_router);
        assert_eq!(entry.state, NeighborState::Reachable);

        cache.clear_router(&addr());
        assert!(!cache.get(&addr()).unwrap().is_router);
    }

    #[test]
    fn state_names() {
        assert_eq!(NeighborState::Reachable.to_string(), "REACHABLE");
        assert_eq!(NeighborState::Probe.to_string(), "PROBE");
    }
}
