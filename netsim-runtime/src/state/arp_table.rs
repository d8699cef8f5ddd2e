use netsim_packets::MacAddr;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use tokio::time::Instant;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArpEntry {
    pub mac: MacAddr,
    pub iface: String,
    pub learned_at: Instant,
}

/// Mappings between IPv4 protocol addresses and 48-bit Ethernet addresses. Entries never age
/// out; they are only replaced when newer information about the same address arrives.
#[derive(Debug, Default)]
pub struct ArpTable {
    translations: HashMap<Ipv4Addr, ArpEntry>,
}

impl ArpTable {
    pub fn new() -> Self {
        ArpTable {
            translations: HashMap::new(),
        }
    }

    pub fn contains_key(&self, addr: &Ipv4Addr) -> bool {
        self.translations.contains_key(addr)
    }

    pub fn get(&self, addr: &Ipv4Addr) -> Option<&ArpEntry> {
        self.translations.get(addr)
    }

    pub fn lookup(&self, addr: &Ipv4Addr) -> Option<MacAddr> {
        self.translations.get(addr).map(|entry| entry.mac)
    }

    /// Learns or refreshes a binding, returning the previous MAC when one existed.
    pub fn insert(&mut self, addr: Ipv4Addr, mac: MacAddr, iface: &str) -> Option<MacAddr> {
        self.translations
            .insert(
                addr,
                ArpEntry {
                    mac,
                    iface: iface.to_string(),
                    learned_at: Instant::now(),
                },
            )
            .map(|previous| previous.mac)
    }

    pub fn remove(&mut self, addr: &Ipv4Addr) -> Option<ArpEntry> {
        self.translations.remove(addr)
    }

    /// Drops every binding learned on `iface`.
    pub fn flush_iface(&mut self, iface: &str) {
        self.translations.retain(|_, entry| entry.iface != iface);
    }

    /// Snapshot sorted by address, the way `arp -a` prints it.
    pub fn entries(&self) -> Vec<(Ipv4Addr, ArpEntry)> {
        let mut entries: Vec<_> = self
            .translations
            .iter()
            .map(|(addr, entry)| (*addr, entry.clone()))
            .collect();
        entries.sort_by_key(|(addr, _)| *addr);
        entries
    }

    pub fn len(&self) -> usize {
        self.translations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.translations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_and_lookup() {
        let mut table = ArpTable::new();
        let ip = Ipv4Addr::new(192, 168, 1, 1);
        let mac = MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);

        assert_eq!(table.insert(ip, mac, "eth0"), None);
        assert!(table.contains_key(&ip));
        assert_eq!(table.lookup(&ip), Some(mac));
        assert_eq!(table.get(&ip).unwrap().iface, "eth0");
    }

    #[tokio::test]
    async fn one_entry_per_address() {
        let mut table = ArpTable::new();
        let ip = Ipv4Addr::new(192, 168, 1, 1);
        let old = MacAddr::new([1, 1, 1, 1, 1, 1]);
        let new = MacAddr::new([2, 2, 2, 2, 2, 2]);

        table.insert(ip, old, "eth0");
        assert_eq!(table.insert(ip, new, "eth0"), Some(old));
        assert_eq!(table.len(), 1);
        assert_eq!(table.lookup(&ip), Some(new));
    }

    #[tokio::test]
    async fn entries_are_sorted_and_flushable() {
        let mut table = ArpTable::new();
        table.insert(Ipv4Addr::new(10, 0, 0, 9), MacAddr::ZERO, "eth1");
        table.insert(Ipv4Addr::new(10, 0, 0, 2), MacAddr::ZERO, "eth0");
        let addrs: Vec<_> = table.entries().into_iter().map(|(addr, _)| addr).collect();
        assert_eq!(addrs, vec![Ipv4Addr::new(10, 0, 0, 2), Ipv4Addr::new(10, 0, 0, 9)]);

        table.flush_iface("eth1");
        assert_eq!(table.len(), 1);
        assert!(table.remove(&Ipv4Addr::new(10, 0, 0, 2)).is_some());
        assert!(table.is_empty());
    }
}
