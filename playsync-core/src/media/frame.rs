//! Decoded frame slots stored in the frame ring buffers
//!
//! Slots are allocated once per ring buffer and refilled in place by the
//! decoder. `clear()` releases the payload contents but keeps the
//! allocation for the next frame.

use super::ring_buffer::RingBuffer;
use super::types::{ClockMs, Rational, Serial, Size};

/// Video frame queue capacity
pub const VIDEO_PICTURE_QUEUE_SIZE: usize = 3;

/// Decoded audio queue capacity
pub const SAMPLE_QUEUE_SIZE: usize = 9;

/// Subtitle queue capacity
pub const SUBPICTURE_QUEUE_SIZE: usize = 16;

/// Behaviour every ring buffer slot provides
pub trait FrameSlot: Default + Send {
    /// Queue generation the frame was decoded under
    fn serial(&self) -> Serial;

    /// Byte position of the source packet, -1 if unknown
    fn pos(&self) -> i64;

    /// Release the payload, keeping the allocation
    fn clear(&mut self);
}

/// Decoded picture
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoFrame {
    /// Presentation timestamp in milliseconds
    pub pts: Option<ClockMs>,

    /// Nominal display duration in milliseconds
    pub duration: ClockMs,

    pub serial: Serial,
    pub pos: i64,
    pub size: Size,

    /// Sample aspect ratio
    pub sar: Rational,

    pub data: Vec<u8>,
}

impl FrameSlot for VideoFrame {
    fn serial(&self) -> Serial {
        self.serial
    }

    fn pos(&self) -> i64 {
        self.pos
    }

    fn clear(&mut self) {
        self.data.clear();
    }
}

/// Block of decoded audio samples
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioFrame {
    pub pts: Option<ClockMs>,
    pub duration: ClockMs,
    pub serial: Serial,
    pub pos: i64,
    pub sample_rate: u32,
    pub channels: u16,

    /// Interleaved samples
    pub samples: Vec<f32>,
}

impl AudioFrame {
    /// Samples per channel
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}

impl FrameSlot for AudioFrame {
    fn serial(&self) -> Serial {
        self.serial
    }

    fn pos(&self) -> i64 {
        self.pos
    }

    fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Decoded subtitle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubtitleFrame {
    pub pts: Option<ClockMs>,
    pub duration: ClockMs,
    pub serial: Serial,
    pub pos: i64,

    /// Display window relative to `pts`
    pub start_display_ms: ClockMs,
    pub end_display_ms: ClockMs,

    pub text: String,
}

impl FrameSlot for SubtitleFrame {
    fn serial(&self) -> Serial {
        self.serial
    }

    fn pos(&self) -> i64 {
        self.pos
    }

    fn clear(&mut self) {
        self.text.clear();
    }
}

pub type VideoFrameQueue = RingBuffer<VideoFrame, VIDEO_PICTURE_QUEUE_SIZE>;
pub type AudioFrameQueue = RingBuffer<AudioFrame, SAMPLE_QUEUE_SIZE>;
pub type SubtitleFrameQueue = RingBuffer<SubtitleFrame, SUBPICTURE_QUEUE_SIZE>;
