use crate::processor::Processor;
use netsim_packets::{ArpOp, ArpPacket, MacAddr};
use std::net::Ipv4Addr;

/// Answers ARP requests for the addresses an interface owns (RFC 826). Anything else, replies
/// included, produces nothing; learning the sender is the caller's business.
#[derive(Clone, Debug)]
pub struct ArpHandler {
    local_mac: MacAddr,
    local_addrs: Vec<Ipv4Addr>,
}

impl ArpHandler {
    pub fn new(local_mac: MacAddr, local_addrs: Vec<Ipv4Addr>) -> ArpHandler {
        ArpHandler {
            local_mac,
            local_addrs,
        }
    }

    pub fn owns(&self, addr: &Ipv4Addr) -> bool {
        self.local_addrs.contains(addr)
    }
}

impl Processor for ArpHandler {
    type Input = ArpPacket;
    type Output = ArpPacket;

    fn process(&mut self, packet: Self::Input) -> Option<Self::Output> {
        match packet.op {
            ArpOp::Request if self.owns(&packet.target_protocol_addr) => {
                Some(packet.reply_to(self.local_mac))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL: MacAddr = MacAddr {
        bytes: [0x02, 0, 0, 0, 0, 0x01],
    };
    const REMOTE: MacAddr = MacAddr {
        bytes: [0x02, 0, 0, 0, 0, 0x02],
    };

    fn handler() -> ArpHandler {
        ArpHandler::new(LOCAL, vec![Ipv4Addr::new(10, 0, 0, 1)])
    }

    #[test]
    fn replies_to_request_for_owned_address() {
        let request = ArpPacket::request(
            REMOTE,
            Ipv4Addr::new(10, 0, 0, 2),
            Ipv4Addr::new(10, 0, 0, 1),
        );

        let reply = handler().process(request).unwrap();

        assert_eq!(reply.op, ArpOp::Reply);
        assert_eq!(reply.sender_hardware_addr, LOCAL);
        assert_eq!(reply.sender_protocol_addr, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(reply.target_hardware_addr, REMOTE);
        assert_eq!(reply.target_protocol_addr, Ipv4Addr::new(10, 0, 0, 2));
    }

    #[test]
    fn ignores_requests_for_other_addresses() {
        let request = ArpPacket::request(
            REMOTE,
            Ipv4Addr::new(10, 0, 0, 2),
            Ipv4Addr::new(10, 0, 0, 9),
        );
        assert_eq!(handler().process(request), None);
    }

    #[test]
    fn ignores_replies() {
        let request = ArpPacket::request(
            LOCAL,
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 0, 0, 2),
        );
        let reply = request.reply_to(REMOTE);
        assert_eq!(handler().process(reply), None);
    }

    #[test]
    fn answers_probes() {
        let probe = ArpPacket::probe(REMOTE, Ipv4Addr::new(10, 0, 0, 1));
        let reply = handler().process(probe).unwrap();
        assert_eq!(reply.target_protocol_addr, Ipv4Addr::UNSPECIFIED);
        assert_eq!(reply.target_hardware_addr, REMOTE);
    }
}
