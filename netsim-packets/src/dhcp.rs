//! DHCP messages (RFC 2131) with the RFC 2132 options the client and the servers it talks to
//! exchange. Options are typed fields rather than a TLV list; the option codes are kept for the
//! parameter request list and for logs.
use crate::MacAddr;
use std::convert::TryFrom;
use std::net::Ipv4Addr;

pub const DHCP_OPTION_SUBNET_MASK: u8 = 1;
pub const DHCP_OPTION_ROUTER: u8 = 3;
pub const DHCP_OPTION_DNS_SERVERS: u8 = 6;
pub const DHCP_OPTION_HOST_NAME: u8 = 12;
pub const DHCP_OPTION_DOMAIN_NAME: u8 = 15;
pub const DHCP_OPTION_REQUESTED_IP: u8 = 50;
pub const DHCP_OPTION_LEASE_TIME: u8 = 51;
pub const DHCP_OPTION_MESSAGE_TYPE: u8 = 53;
pub const DHCP_OPTION_SERVER_ID: u8 = 54;
pub const DHCP_OPTION_PARAMETER_LIST: u8 = 55;
pub const DHCP_OPTION_RENEWAL_TIME: u8 = 58;
pub const DHCP_OPTION_REBINDING_TIME: u8 = 59;
pub const DHCP_OPTION_CLIENT_ID: u8 = 61;

/// Parameters a client asks for in option 55.
pub const DEFAULT_PARAMETER_REQUEST_LIST: [u8; 6] = [
    DHCP_OPTION_SUBNET_MASK,
    DHCP_OPTION_ROUTER,
    DHCP_OPTION_DNS_SERVERS,
    DHCP_OPTION_DOMAIN_NAME,
    DHCP_OPTION_RENEWAL_TIME,
    DHCP_OPTION_REBINDING_TIME,
];

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DhcpMessageType {
    Discover = 1,
    Offer = 2,
    Request = 3,
    Decline = 4,
    Ack = 5,
    Nak = 6,
    Release = 7,
    Inform = 8,
}

impl TryFrom<u8> for DhcpMessageType {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(DhcpMessageType::Discover),
            2 => Ok(DhcpMessageType::Offer),
            3 => Ok(DhcpMessageType::Request),
            4 => Ok(DhcpMessageType::Decline),
            5 => Ok(DhcpMessageType::Ack),
            6 => Ok(DhcpMessageType::Nak),
            7 => Ok(DhcpMessageType::Release),
            8 => Ok(DhcpMessageType::Inform),
            _ => Err("Unknown DHCP message type"),
        }
    }
}

impl DhcpMessageType {
    pub fn name(self) -> &'static str {
        match self {
            DhcpMessageType::Discover => "DHCPDISCOVER",
            DhcpMessageType::Offer => "DHCPOFFER",
            DhcpMessageType::Request => "DHCPREQUEST",
            DhcpMessageType::Decline => "DHCPDECLINE",
            DhcpMessageType::Ack => "DHCPACK",
            DhcpMessageType::Nak => "DHCPNAK",
            DhcpMessageType::Release => "DHCPRELEASE",
            DhcpMessageType::Inform => "DHCPINFORM",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BootpOp {
    Request = 1,
    Reply = 2,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DhcpOptions {
    pub subnet_mask: Option<Ipv4Addr>,
    pub router: Option<Ipv4Addr>,
    pub dns_servers: Vec<Ipv4Addr>,
    pub host_name: Option<String>,
    pub domain_name: Option<String>,
    pub requested_ip: Option<Ipv4Addr>,
    /// Seconds
    pub lease_time: Option<u32>,
    pub server_id: Option<Ipv4Addr>,
    pub parameter_request_list: Vec<u8>,
    /// T1, seconds
    pub renewal_time: Option<u32>,
    /// T2, seconds
    pub rebinding_time: Option<u32>,
    pub client_id: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DhcpMessage {
    pub op: BootpOp,
    pub message_type: DhcpMessageType,
    pub xid: u32,
    pub broadcast: bool,
    pub ciaddr: Ipv4Addr,
    pub yiaddr: Ipv4Addr,
    pub siaddr: Ipv4Addr,
    pub chaddr: MacAddr,
    pub options: DhcpOptions,
}

impl DhcpMessage {
    fn client(message_type: DhcpMessageType, xid: u32, chaddr: MacAddr) -> DhcpMessage {
        DhcpMessage {
            op: BootpOp::Request,
            message_type,
            xid,
            broadcast: true,
            ciaddr: Ipv4Addr::UNSPECIFIED,
            yiaddr: Ipv4Addr::UNSPECIFIED,
            siaddr: Ipv4Addr::UNSPECIFIED,
            chaddr,
            options: DhcpOptions::default(),
        }
    }

    /// Option 61 as RFC 2132 §9.14 suggests for Ethernet: hardware type 1 then the MAC.
    pub fn client_id_for(chaddr: MacAddr) -> Vec<u8> {
        let mut id = vec![1];
        id.extend_from_slice(&chaddr.bytes);
        id
    }

    pub fn discover(xid: u32, chaddr: MacAddr) -> DhcpMessage {
        let mut message = DhcpMessage::client(DhcpMessageType::Discover, xid, chaddr);
        message.options.parameter_request_list = DEFAULT_PARAMETER_REQUEST_LIST.to_vec();
        message.options.client_id = Some(DhcpMessage::client_id_for(chaddr));
        message
    }

    /// REQUEST in SELECTING state: names the offer and the server it came from.
    pub fn request_selecting(
        xid: u32,
        chaddr: MacAddr,
        requested_ip: Ipv4Addr,
        server_id: Ipv4Addr,
    ) -> DhcpMessage {
        let mut message = DhcpMessage::client(DhcpMessageType::Request, xid, chaddr);
        message.options.parameter_request_list = DEFAULT_PARAMETER_REQUEST_LIST.to_vec();
        message.options.client_id = Some(DhcpMessage::client_id_for(chaddr));
        message.options.requested_ip = Some(requested_ip);
        message.options.server_id = Some(server_id);
        message
    }

    /// REQUEST in INIT-REBOOT state: option 50 carries the remembered address and option 54
    /// must be absent (RFC 2131 §4.3.2).
    pub fn request_init_reboot(xid: u32, chaddr: MacAddr, previous_ip: Ipv4Addr) -> DhcpMessage {
        let mut message = DhcpMessage::client(DhcpMessageType::Request, xid, chaddr);
        message.options.parameter_request_list = DEFAULT_PARAMETER_REQUEST_LIST.to_vec();
        message.options.client_id = Some(DhcpMessage::client_id_for(chaddr));
        message.options.requested_ip = Some(previous_ip);
        message
    }

    /// REQUEST in RENEWING or REBINDING state: ciaddr is filled in, options 50 and 54 absent.
    pub fn request_extend(xid: u32, chaddr: MacAddr, ciaddr: Ipv4Addr, broadcast: bool) -> Self {
        let mut message = DhcpMessage::client(DhcpMessageType::Request, xid, chaddr);
        message.options.parameter_request_list = DEFAULT_PARAMETER_REQUEST_LIST.to_vec();
        message.options.client_id = Some(DhcpMessage::client_id_for(chaddr));
        message.ciaddr = ciaddr;
        message.broadcast = broadcast;
        message
    }

    pub fn decline(xid: u32, chaddr: MacAddr, declined_ip: Ipv4Addr, server_id: Ipv4Addr) -> Self {
        let mut message = DhcpMessage::client(DhcpMessageType::Decline, xid, chaddr);
        message.options.requested_ip = Some(declined_ip);
        message.options.server_id = Some(server_id);
        message.options.client_id = Some(DhcpMessage::client_id_for(chaddr));
        message
    }

    pub fn release(xid: u32, chaddr: MacAddr, ciaddr: Ipv4Addr, server_id: Ipv4Addr) -> Self {
        let mut message = DhcpMessage::client(DhcpMessageType::Release, xid, chaddr);
        message.broadcast = false;
        message.ciaddr = ciaddr;
        message.options.server_id = Some(server_id);
        message.options.client_id = Some(DhcpMessage::client_id_for(chaddr));
        message
    }

    /// Server reply (OFFER, ACK or NAK) to `request`, echoing its xid and chaddr.
    pub fn reply(
        request: &DhcpMessage,
        message_type: DhcpMessageType,
        yiaddr: Ipv4Addr,
        server_id: Ipv4Addr,
    ) -> DhcpMessage {
        let mut options = DhcpOptions::default();
        options.server_id = Some(server_id);
        DhcpMessage {
            op: BootpOp::Reply,
            message_type,
            xid: request.xid,
            broadcast: request.broadcast,
            ciaddr: request.ciaddr,
            yiaddr,
            siaddr: server_id,
            chaddr: request.chaddr,
            options,
        }
    }

    pub fn server_id(&self) -> Option<Ipv4Addr> {
        self.options.server_id
    }
}
