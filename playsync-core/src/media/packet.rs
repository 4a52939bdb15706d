//! Compressed packets moving from the demuxer to the decoders

use super::types::Serial;

/// What a queued packet means to the consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    /// Compressed payload
    Data,

    /// Flush marker: the consumer must reset its decoder. Enqueuing one
    /// starts a new queue generation.
    Flush,

    /// Empty payload used to drain a decoder at end of stream
    Null,
}

/// One compressed packet
///
/// Timestamps and duration are in the owning stream's time base. `serial`
/// is assigned by the packet queue at enqueue time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketKind,
    pub data: Vec<u8>,
    pub stream_index: usize,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub duration: i64,
    /// Byte position in the source, -1 if unknown
    pub pos: i64,
    pub serial: Serial,
}

impl Packet {
    /// Payload packet
    pub fn data(
        stream_index: usize,
        data: Vec<u8>,
        pts: Option<i64>,
        duration: i64,
        pos: i64,
    ) -> Self {
        Self {
            kind: PacketKind::Data,
            data,
            stream_index,
            pts,
            dts: pts,
            duration,
            pos,
            serial: 0,
        }
    }

    /// Flush marker. Queues recognize it by kind, never by payload.
    pub fn flush() -> Self {
        Self {
            kind: PacketKind::Flush,
            data: Vec::new(),
            stream_index: 0,
            pts: None,
            dts: None,
            duration: 0,
            pos: -1,
            serial: 0,
        }
    }

    /// End-of-stream drain packet for `stream_index`
    pub fn null(stream_index: usize) -> Self {
        Self {
            kind: PacketKind::Null,
            stream_index,
            ..Self::flush()
        }
    }

    pub fn is_flush(&self) -> bool {
        self.kind == PacketKind::Flush
    }

    pub fn is_null(&self) -> bool {
        self.kind == PacketKind::Null
    }

    /// Payload length in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}
