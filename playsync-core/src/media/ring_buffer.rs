//! Blocking Frame Ring Buffer
//!
//! Fixed-capacity circular buffer of decoded frame slots shared by one
//! decoder thread (producer) and one render thread (consumer).
//!
//! Design:
//! - Slots are preallocated and filled in place; nothing is allocated per frame
//! - Producer: `peek_writable()` blocks while full, `WritableSlot::push()` publishes
//! - Consumer: `peek_readable()` blocks while empty, `pop()` releases the slot
//! - Keep-last: the most recently shown frame stays resident so the renderer
//!   can redraw it (`peek_last()`) without a fresh decode
//! - `stop()` wakes every waiter; blocking peeks then return `None`
//!
//! Slot guards must be dropped before `pop()` or `push()` on the same buffer.

use super::frame::FrameSlot;
use super::types::Serial;
use std::ops::{Deref, DerefMut};
use std::sync::{Condvar, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Default)]
struct RingState {
    rindex: usize,
    windex: usize,
    size: usize,

    /// 1 once the frame at `rindex` has been presented (keep-last only)
    rindex_shown: usize,

    stopped: bool,
}

/// Circular buffer of `N` frame slots
pub struct RingBuffer<T: FrameSlot, const N: usize> {
    slots: Box<[Mutex<T>]>,
    state: Mutex<RingState>,
    condvar: Condvar,
    keep_last: bool,
}

/// Exclusive handle on the next writable slot
///
/// Derefs to the slot for in-place filling. `push()` publishes the frame;
/// dropping the handle without pushing leaves the slot unpublished.
pub struct WritableSlot<'a, T: FrameSlot, const N: usize> {
    buffer: &'a RingBuffer<T, N>,
    guard: MutexGuard<'a, T>,
}

impl<'a, T: FrameSlot, const N: usize> WritableSlot<'a, T, N> {
    /// Publish the filled slot to the reader
    pub fn push(self) {
        let WritableSlot { buffer, guard } = self;
        drop(guard);
        buffer.advance_write();
    }
}

impl<'a, T: FrameSlot, const N: usize> Deref for WritableSlot<'a, T, N> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<'a, T: FrameSlot, const N: usize> DerefMut for WritableSlot<'a, T, N> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T: FrameSlot, const N: usize> RingBuffer<T, N> {
    /// Create a buffer of `N` default slots
    ///
    /// # Arguments
    /// * `keep_last` - Keep the last shown frame resident until the next one is shown
    pub fn new(keep_last: bool) -> Self {
        assert!(N > 0, "ring buffer capacity must be non-zero");
        let slots = (0..N).map(|_| Mutex::new(T::default())).collect();
        Self {
            slots,
            state: Mutex::new(RingState::default()),
            condvar: Condvar::new(),
            keep_last,
        }
    }

    /// Wait for a free slot
    ///
    /// # Returns
    /// `None` if the buffer was stopped
    pub fn peek_writable(&self) -> Option<WritableSlot<'_, T, N>> {
        let mut state = self.state.lock().unwrap();
        while state.size >= N && !state.stopped {
            state = self.condvar.wait(state).unwrap();
        }
        if state.stopped {
            return None;
        }
        let index = state.windex;
        drop(state);

        Some(WritableSlot {
            buffer: self,
            guard: self.slots[index].lock().unwrap(),
        })
    }

    fn advance_write(&self) {
        let mut state = self.state.lock().unwrap();
        debug_assert!(state.size < N, "push on a full ring buffer");
        state.windex = (state.windex + 1) % N;
        state.size += 1;
        drop(state);
        self.condvar.notify_all();
    }

    /// Wait for a frame that has not been shown yet
    ///
    /// # Returns
    /// `None` if the buffer was stopped
    pub fn peek_readable(&self) -> Option<MutexGuard<'_, T>> {
        let mut state = self.state.lock().unwrap();
        while state.size <= state.rindex_shown && !state.stopped {
            state = self.condvar.wait(state).unwrap();
        }
        if state.stopped {
            return None;
        }
        let index = (state.rindex + state.rindex_shown) % N;
        drop(state);

        Some(self.slots[index].lock().unwrap())
    }

    /// Current unshown frame without blocking
    pub fn peek(&self) -> Option<MutexGuard<'_, T>> {
        let state = self.state.lock().unwrap();
        if state.size <= state.rindex_shown {
            return None;
        }
        let index = (state.rindex + state.rindex_shown) % N;
        drop(state);

        Some(self.slots[index].lock().unwrap())
    }

    /// Frame after the current one, if at least two are queued
    pub fn peek_next(&self) -> Option<MutexGuard<'_, T>> {
        let state = self.state.lock().unwrap();
        if state.size < state.rindex_shown + 2 {
            return None;
        }
        let index = (state.rindex + state.rindex_shown + 1) % N;
        drop(state);

        Some(self.slots[index].lock().unwrap())
    }

    /// Last shown frame under keep-last, without blocking
    ///
    /// `None` until a frame has been shown. The shown slot is never handed
    /// to the writer, so this never waits on a decoder filling a slot.
    pub fn peek_last(&self) -> Option<MutexGuard<'_, T>> {
        let state = self.state.lock().unwrap();
        if state.rindex_shown == 0 {
            return None;
        }
        let index = state.rindex;
        drop(state);

        Some(self.slots[index].lock().unwrap())
    }

    /// Move past the current frame
    ///
    /// Under keep-last the first call only marks the head frame as shown.
    /// Afterwards the head slot is cleared and released to the writer.
    pub fn pop(&self) {
        let mut state = self.state.lock().unwrap();
        debug_assert!(
            state.size > state.rindex_shown,
            "pop with no unshown frame in the ring buffer"
        );
        if state.size <= state.rindex_shown {
            return;
        }

        if self.keep_last && state.rindex_shown == 0 {
            state.rindex_shown = 1;
            return;
        }

        self.slots[state.rindex].lock().unwrap().clear();
        state.rindex = (state.rindex + 1) % N;
        state.size -= 1;
        drop(state);
        self.condvar.notify_all();
    }

    /// Wake every waiter; blocking peeks return `None` from now on
    pub fn stop(&self) {
        let mut state = self.state.lock().unwrap();
        state.stopped = true;
        drop(state);
        self.condvar.notify_all();
        debug!(capacity = N, "Frame ring buffer stopped");
    }

    /// Source position of the shown frame if it belongs to `serial`
    pub fn last_shown_position(&self, serial: Serial) -> Option<i64> {
        let state = self.state.lock().unwrap();
        if state.rindex_shown == 0 {
            return None;
        }
        let slot = self.slots[state.rindex].lock().unwrap();
        if slot.serial() == serial {
            Some(slot.pos())
        } else {
            None
        }
    }

    /// Frames queued and not yet shown
    pub fn nb_remaining(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.size.saturating_sub(state.rindex_shown)
    }

    pub fn rindex_shown(&self) -> bool {
        self.state.lock().unwrap().rindex_shown == 1
    }

    pub fn is_empty(&self) -> bool {
        self.nb_remaining() == 0
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().unwrap().stopped
    }

    pub fn capacity(&self) -> usize {
        N
    }
}
