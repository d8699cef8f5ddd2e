mod arp_handler;
pub use self::arp_handler::*;

mod dec_ip_hop;
pub use self::dec_ip_hop::*;

mod icmp_error;
pub use self::icmp_error::*;

pub trait Processor {
    type Input: Send + Clone;
    type Output: Send + Clone;

    fn process(&mut self, packet: Self::Input) -> Option<Self::Output>;
}
