mod types;
pub use self::types::*;

mod addr;
pub use self::addr::*;

mod ethernet;
pub use self::ethernet::*;

mod arp;
pub use self::arp::*;

mod ipv4;
pub use self::ipv4::*;

mod icmp;
pub use self::icmp::*;

mod ipv6;
pub use self::ipv6::*;

mod icmpv6;
pub use self::icmpv6::*;

mod dhcp;
pub use self::dhcp::*;
