//! # What are they for?
//!
//! Classifiers are very similar to processors, but are used to differentiate a stream of packets. As such, they take each packet by reference,
//! and are not able to modify it. The host's frame dispatch runs every inbound frame through one and hands the frame to the protocol handler
//! its class names.
mod ether_type;
pub use self::ether_type::*;

/// Used by frame dispatch to determine the kind of packet we have. Classifier::Class is then
/// consumed by the dispatcher to send it down the appropriate path.
pub trait Classifier {
    type Packet: Send + Clone;
    type Class: Sized;

    fn classify(&self, packet: &Self::Packet) -> Self::Class;
}
