//! The transport a host's interfaces are plugged into. A `Port` moves whole Ethernet frames; the
//! physical layer underneath (negotiation, propagation delay, loss) is out of the picture.
use netsim_packets::EthernetFrame;

mod wire;
pub use self::wire::*;

/// Callback a port invokes for every frame arriving from the far end.
pub type FrameHandler = Box<dyn Fn(EthernetFrame) + Send + Sync>;

pub trait Port: Send + Sync {
    /// Hands a frame to the link. Returns false when the link is down or nothing is plugged in
    /// at the far end.
    fn send_frame(&self, frame: EthernetFrame) -> bool;

    /// Registers the receiver for inbound frames. A later registration replaces the earlier one.
    fn on_frame(&self, handler: FrameHandler);

    fn is_link_up(&self) -> bool;
}
