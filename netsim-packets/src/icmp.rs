use crate::*;
use std::net::Ipv4Addr;

/// The size of an ICMP "header", which precedes the data field
pub const ICMP_HDR_LEN: usize = 8;

pub const ICMP_TYPE_ECHO_REPLY: u8 = 0;
pub const ICMP_TYPE_DEST_UNREACHABLE: u8 = 3;
pub const ICMP_TYPE_ECHO_REQUEST: u8 = 8;
pub const ICMP_TYPE_TIME_EXCEEDED: u8 = 11;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Icmpv4DstUnreachable {
    NetUnreachable = 0,
    HostUnreachable = 1,
    ProtoUnreachable = 2,
    PortUnreachable = 3,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Icmpv4TimeExceeded {
    TtlExpired = 0,
    FragExpired = 1,
}

/// The part of the offending datagram an ICMP error carries back: its IP header and the first
/// eight payload bytes, which for an echo request hold the identifier and sequence number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ipv4Quote {
    pub src_addr: Ipv4Addr,
    pub dest_addr: Ipv4Addr,
    pub protocol: IpProtocol,
    pub echo: Option<(u16, u16)>,
}

impl Ipv4Quote {
    pub fn of(packet: &Ipv4Packet) -> Ipv4Quote {
        let echo = match &packet.payload {
            Ipv4Payload::Icmp(IcmpMessage::EchoRequest {
                identifier,
                sequence,
                ..
            }) => Some((*identifier, *sequence)),
            _ => None,
        };
        Ipv4Quote {
            src_addr: packet.src_addr,
            dest_addr: packet.dest_addr,
            protocol: packet.protocol(),
            echo,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IcmpMessage {
    EchoRequest {
        identifier: u16,
        sequence: u16,
        data: Vec<u8>,
    },
    EchoReply {
        identifier: u16,
        sequence: u16,
        data: Vec<u8>,
    },
    DestinationUnreachable {
        reason: Icmpv4DstUnreachable,
        original: Ipv4Quote,
    },
    TimeExceeded {
        reason: Icmpv4TimeExceeded,
        original: Ipv4Quote,
    },
}

impl IcmpMessage {
    pub fn msg_type(&self) -> u8 {
        match self {
            IcmpMessage::EchoReply { .. } => ICMP_TYPE_ECHO_REPLY,
            IcmpMessage::DestinationUnreachable { .. } => ICMP_TYPE_DEST_UNREACHABLE,
            IcmpMessage::EchoRequest { .. } => ICMP_TYPE_ECHO_REQUEST,
            IcmpMessage::TimeExceeded { .. } => ICMP_TYPE_TIME_EXCEEDED,
        }
    }

    pub fn msg_code(&self) -> u8 {
        match self {
            IcmpMessage::DestinationUnreachable { reason, .. } => *reason as u8,
            IcmpMessage::TimeExceeded { reason, .. } => *reason as u8,
            _ => 0,
        }
    }

    /// Errors must never be answered with errors (RFC 1122 §3.2.2).
    pub fn is_error(&self) -> bool {
        match self {
            IcmpMessage::DestinationUnreachable { .. } | IcmpMessage::TimeExceeded { .. } => true,
            IcmpMessage::EchoRequest { .. } | IcmpMessage::EchoReply { .. } => false,
        }
    }

    /// Length on the wire: header plus data, or header plus the quoted IP header and 8 bytes.
    pub fn len(&self) -> usize {
        match self {
            IcmpMessage::EchoRequest { data, .. } | IcmpMessage::EchoReply { data, .. } => {
                ICMP_HDR_LEN + data.len()
            }
            IcmpMessage::DestinationUnreachable { .. } | IcmpMessage::TimeExceeded { .. } => {
                ICMP_HDR_LEN + IPV4_HEADER_LEN + 8
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn types_and_codes() {
        let request = IcmpMessage::EchoRequest {
            identifier: 1,
            sequence: 2,
            data: vec![0; 32],
        };
        assert_eq!(request.msg_type(), 8);
        assert_eq!(request.msg_code(), 0);
        assert_eq!(request.len(), 40);
        assert!(!request.is_error());

        let packet = Ipv4Packet::new(
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 9, 9, 9),
            1,
            Ipv4Payload::Icmp(request),
        );
        let error = IcmpMessage::TimeExceeded {
            reason: Icmpv4TimeExceeded::TtlExpired,
            original: Ipv4Quote::of(&packet),
        };
        assert_eq!(error.msg_type(), 11);
        assert!(error.is_error());
        assert_eq!(error.len(), 36);

        let unreachable = IcmpMessage::DestinationUnreachable {
            reason: Icmpv4DstUnreachable::HostUnreachable,
            original: Ipv4Quote::of(&packet),
        };
        assert_eq!(unreachable.msg_code(), 1);
    }

    #[test]
    fn quote_keeps_echo_identity() {
        let packet = Ipv4Packet::new(
            Ipv4Addr::new(10, 0, 0, 1),
            Ipv4Addr::new(10, 9, 9, 9),
            3,
            Ipv4Payload::Icmp(IcmpMessage::EchoRequest {
                identifier: 0x1234,
                sequence: 3,
                data: vec![],
            }),
        );
        let quote = Ipv4Quote::of(&packet);
        assert_eq!(quote.echo, Some((0x1234, 3)));
        assert_eq!(quote.dest_addr, Ipv4Addr::new(10, 9, 9, 9));
        assert_eq!(quote.protocol, IpProtocol::Icmp);
    }
}
