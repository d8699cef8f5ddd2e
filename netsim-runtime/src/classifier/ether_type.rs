use crate::classifier::Classifier;
use netsim_packets::{EtherPayload, EthernetFrame, MacAddr};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EtherClass {
    Arp,
    Ipv4,
    Ipv6,
    /// Unicast to some other station.
    NotForUs,
}

/// Sorts frames by ether type after checking that the destination MAC is ours, broadcast, or
/// multicast.
#[derive(Clone, Debug)]
pub struct EtherTypeClassifier {
    local_mac: MacAddr,
}

impl EtherTypeClassifier {
    pub fn new(local_mac: MacAddr) -> EtherTypeClassifier {
        EtherTypeClassifier { local_mac }
    }
}

impl Classifier for EtherTypeClassifier {
    type Packet = EthernetFrame;
    type Class = EtherClass;

    fn classify(&self, frame: &Self::Packet) -> Self::Class {
        let dest = frame.dest_mac;
        if dest != self.local_mac && !dest.is_broadcast() && !dest.is_multicast() {
            return EtherClass::NotForUs;
        }
        match frame.payload {
            EtherPayload::Arp(_) => EtherClass::Arp,
            EtherPayload::Ipv4(_) => EtherClass::Ipv4,
            EtherPayload::Ipv6(_) => EtherClass::Ipv6,
        }
    }
}
