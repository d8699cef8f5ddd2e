use crate::link::{FrameHandler, Port};
use crossbeam::channel::{self, Receiver, Sender};
use netsim_packets::EthernetFrame;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WireSide {
    A,
    B,
}

impl WireSide {
    fn index(self) -> usize {
        match self {
            WireSide::A => 0,
            WireSide::B => 1,
        }
    }

    fn peer(self) -> WireSide {
        match self {
            WireSide::A => WireSide::B,
            WireSide::B => WireSide::A,
        }
    }
}

/// A frame as seen by a tap: which end put it on the wire, and the frame itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TappedFrame {
    pub from: WireSide,
    pub frame: EthernetFrame,
}

struct WireShared {
    link_up: AtomicBool,
    handlers: [Mutex<Option<FrameHandler>>; 2],
    taps: Mutex<Vec<Sender<TappedFrame>>>,
}

/// An in-memory point-to-point cable. Delivery is immediate and lossless while the link is up.
#[derive(Clone)]
pub struct Wire {
    shared: Arc<WireShared>,
}

impl Default for Wire {
    fn default() -> Self {
        Wire::new()
    }
}

impl Wire {
    pub fn new() -> Wire {
        Wire {
            shared: Arc::new(WireShared {
                link_up: AtomicBool::new(true),
                handlers: [Mutex::new(None), Mutex::new(None)],
                taps: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn end(&self, side: WireSide) -> Arc<WireEnd> {
        Arc::new(WireEnd {
            shared: Arc::clone(&self.shared),
            side,
        })
    }

    pub fn end_a(&self) -> Arc<WireEnd> {
        self.end(WireSide::A)
    }

    pub fn end_b(&self) -> Arc<WireEnd> {
        self.end(WireSide::B)
    }

    pub fn set_link_up(&self, up: bool) {
        self.shared.link_up.store(up, Ordering::SeqCst);
    }

    pub fn is_link_up(&self) -> bool {
        self.shared.link_up.load(Ordering::SeqCst)
    }

    /// Every frame delivered from now on is also copied to the returned receiver.
    pub fn tap(&self) -> Receiver<TappedFrame> {
        let (sender, receiver) = channel::unbounded();
        self.shared.taps.lock().push(sender);
        receiver
    }
}

/// One end of a `Wire`.
pub struct WireEnd {
    shared: Arc<WireShared>,
    side: WireSide,
}

impl WireEnd {
    pub fn side(&self) -> WireSide {
        self.side
    }
}

impl Port for WireEnd {
    fn send_frame(&self, frame: EthernetFrame) -> bool {
        if !self.shared.link_up.load(Ordering::SeqCst) {
            return false;
        }
        let handler = self.shared.handlers[self.side.peer().index()].lock();
        let handler = match handler.as_ref() {
            Some(handler) => handler,
            None => return false,
        };
        self.shared.taps.lock().retain(|tap| {
            tap.send(TappedFrame {
                from: self.side,
                frame: frame.clone(),
            })
            .is_ok()
        });
        handler(frame);
        true
    }

    fn on_frame(&self, handler: FrameHandler) {
        *self.shared.handlers[self.side.index()].lock() = Some(handler);
    }

    fn is_link_up(&self) -> bool {
        self.shared.link_up.load(Ordering::SeqCst)
    }
}
