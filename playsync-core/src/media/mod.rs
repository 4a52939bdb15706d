//! Media synchronization core
//!
//! Packet queues, frame ring buffers, clocks and the per-stream state that
//! ties them together, plus the sync policy used by the render side.

pub mod bandwidth;
pub mod clock;
pub mod decoder;
pub mod frame;
pub mod packet;
pub mod packet_queue;
pub mod ring_buffer;
pub mod stats;
pub mod stream;
pub mod sync;
pub mod types;

pub use bandwidth::{CodecParams, DesireBytesPerSec};
pub use clock::Clock;
pub use decoder::{FeedEvent, PacketFeed};
pub use frame::{
    AudioFrame, AudioFrameQueue, FrameSlot, SubtitleFrame, SubtitleFrameQueue, VideoFrame,
    VideoFrameQueue,
};
pub use packet::{Packet, PacketKind};
pub use packet_queue::{PacketQueue, QueueAbortedError, QueueGet};
pub use ring_buffer::{RingBuffer, WritableSlot};
pub use stats::{Stats, StreamFormat};
pub use stream::Stream;
pub use sync::{FrameDropPolicy, RefreshAction, SyncMode, VideoPresenter};
pub use types::{Bandwidth, ClockMs, Rational, Serial, Size, StreamKind};
