//! Packet ingestion queue.
//!
//! Decouples the UDP receive task from the fixed-tick simulation. The
//! receive side calls [`IngestQueue::enqueue`], which never blocks and never
//! fails; the room drains with [`IngestQueue::drain_up_to`] once per tick.
//!
//! Backpressure policy: bounded ring of [`QUEUE_CAP`] packets. Under
//! sustained overload the oldest packet is discarded to admit the newest,
//! so the simulation always sees the freshest input. Excess packets below
//! the cap stay queued for the next tick; arrival order is preserved.
//!
//! The internal lock is scoped strictly to the push/drain; it is never held
//! across simulation work.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Mutex;

use bytes::Bytes;

/// Maximum queued packets per room.
pub const QUEUE_CAP: usize = 4096;

/// One received datagram, still undecoded.
#[derive(Debug, Clone)]
pub struct RawPacket {
    pub payload: Bytes,
    pub from: SocketAddr,
}

#[derive(Default)]
struct Inner {
    packets: VecDeque<RawPacket>,
    dropped: u64,
}

/// Thread-safe packet buffer shared between the receive task and one room.
#[derive(Default)]
pub struct IngestQueue {
    inner: Mutex<Inner>,
}

impl IngestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a packet. Never blocks the caller; on overflow the oldest
    /// packet is dropped.
    pub fn enqueue(&self, payload: Bytes, from: SocketAddr) {
        let mut inner = self.inner.lock().expect("ingest lock");
        if inner.packets.len() >= QUEUE_CAP {
            inner.packets.pop_front();
            inner.dropped += 1;
        }
        inner.packets.push_back(RawPacket { payload, from });
    }

    /// Takes up to `max` packets in arrival order. Anything beyond `max`
    /// stays queued for the next tick.
    pub fn drain_up_to(&self, max: usize) -> Vec<RawPacket> {
        let mut inner = self.inner.lock().expect("ingest lock");
        let take = inner.packets.len().min(max);
        inner.packets.drain(..take).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("ingest lock").packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Packets discarded under overload since startup.
    pub fn dropped(&self) -> u64 {
        self.inner.lock().expect("ingest lock").dropped
    }
}
