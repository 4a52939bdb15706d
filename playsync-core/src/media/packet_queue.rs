//! Packet Queue
//!
//! Thread-safe FIFO of compressed packets between the demuxer thread and a
//! decoder thread. Tracks element count, payload bytes and total duration,
//! and carries a serial (generation number) that is bumped every time a
//! flush marker is enqueued.
//!
//! A queue starts aborted. `start()` clears the abort flag and enqueues a
//! flush marker, so the consumer's first packet tells it to reset.

use super::packet::Packet;
use super::types::Serial;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use thiserror::Error;
use tracing::debug;

/// Returned by `put` when the queue has been aborted
///
/// The rejected packet is handed back to the caller.
#[derive(Debug, Error)]
#[error("packet queue aborted")]
pub struct QueueAbortedError {
    pub packet: Packet,
}

/// Outcome of `PacketQueue::get`
#[derive(Debug, PartialEq, Eq)]
pub enum QueueGet {
    /// The queue was aborted
    Aborted,

    /// Non-blocking read found nothing
    Empty,

    /// A packet, with its serial already assigned
    Packet(Packet),
}

#[derive(Debug)]
struct QueueState {
    packets: VecDeque<Packet>,

    /// Sum of payload bytes
    size: usize,

    /// Sum of packet durations in stream time base ticks
    duration: i64,

    serial: Serial,
    abort_request: bool,
}

/// FIFO of packets with generation tracking
#[derive(Debug)]
pub struct PacketQueue {
    state: Mutex<QueueState>,
    condvar: Condvar,
}

impl Default for PacketQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketQueue {
    /// Create an empty, aborted queue
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                packets: VecDeque::new(),
                size: 0,
                duration: 0,
                serial: 0,
                abort_request: true,
            }),
            condvar: Condvar::new(),
        }
    }

    /// Clear the abort flag and enqueue a flush marker
    pub fn start(&self) {
        let mut state = self.state.lock().unwrap();
        state.abort_request = false;
        Self::put_locked(&mut state, Packet::flush());
        debug!(serial = state.serial, "Packet queue started");
        drop(state);
        self.condvar.notify_one();
    }

    /// Enqueue a packet
    ///
    /// # Returns
    /// `Err(QueueAbortedError)` carrying the packet back if the queue is aborted
    pub fn put(&self, packet: Packet) -> Result<(), QueueAbortedError> {
        let mut state = self.state.lock().unwrap();
        if state.abort_request {
            debug!(serial = state.serial, "Rejected put on aborted packet queue");
            return Err(QueueAbortedError { packet });
        }
        Self::put_locked(&mut state, packet);
        drop(state);
        self.condvar.notify_one();
        Ok(())
    }

    /// Enqueue a flush marker, starting a new generation
    pub fn put_flush_marker(&self) -> Result<(), QueueAbortedError> {
        self.put(Packet::flush())
    }

    /// Enqueue an end-of-stream drain packet
    pub fn put_null_packet(&self, stream_index: usize) -> Result<(), QueueAbortedError> {
        self.put(Packet::null(stream_index))
    }

    fn put_locked(state: &mut QueueState, mut packet: Packet) {
        if packet.is_flush() {
            state.serial += 1;
        }
        packet.serial = state.serial;
        state.size += packet.size();
        state.duration += packet.duration;
        state.packets.push_back(packet);
    }

    /// Dequeue the head packet
    ///
    /// With `block`, waits until a packet arrives or the queue is aborted.
    pub fn get(&self, block: bool) -> QueueGet {
        let mut state = self.state.lock().unwrap();
        loop {
            if state.abort_request {
                return QueueGet::Aborted;
            }

            if let Some(packet) = state.packets.pop_front() {
                state.size -= packet.size();
                state.duration -= packet.duration;
                return QueueGet::Packet(packet);
            }

            if !block {
                return QueueGet::Empty;
            }

            state = self.condvar.wait(state).unwrap();
        }
    }

    /// Drop all queued packets and zero the accounting
    ///
    /// The serial is left alone; callers follow up with a flush marker.
    pub fn flush(&self) {
        let mut state = self.state.lock().unwrap();
        let dropped = state.packets.len();
        state.packets.clear();
        state.size = 0;
        state.duration = 0;
        debug!(dropped, serial = state.serial, "Packet queue flushed");
    }

    /// Set the abort flag and wake every blocked consumer
    pub fn abort(&self) {
        let mut state = self.state.lock().unwrap();
        state.abort_request = true;
        drop(state);
        self.condvar.notify_all();
        debug!("Packet queue aborted");
    }

    pub fn is_aborted(&self) -> bool {
        self.state.lock().unwrap().abort_request
    }

    pub fn nb_packets(&self) -> usize {
        self.state.lock().unwrap().packets.len()
    }

    /// Queued payload bytes
    pub fn size(&self) -> usize {
        self.state.lock().unwrap().size
    }

    /// Queued duration in stream time base ticks
    pub fn duration(&self) -> i64 {
        self.state.lock().unwrap().duration
    }

    /// Current generation
    pub fn serial(&self) -> Serial {
        self.state.lock().unwrap().serial
    }
}
