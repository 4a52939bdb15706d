//! Decoder-side view of a stream's packet queue
//!
//! `PacketFeed` turns raw queue reads into decoder events and drops packets
//! left over from an earlier generation, so a decoder never decodes data
//! queued before the last seek.

use super::packet::{Packet, PacketKind};
use super::packet_queue::QueueGet;
use super::stream::Stream;
use super::types::Serial;
use std::sync::Arc;
use tracing::{debug, trace};

/// What the decoder should do next
#[derive(Debug, PartialEq, Eq)]
pub enum FeedEvent {
    /// Decode this packet; frames it produces carry `packet.serial`
    Packet(Packet),

    /// Reset decoder state; a new generation starts
    Flushed { serial: Serial },

    /// Drain the decoder; no more data for this generation
    EndOfStream { serial: Serial },

    /// The queue was aborted; the decoder thread should exit
    Aborted,
}

/// Blocking packet source for one decoder thread
#[derive(Debug)]
pub struct PacketFeed {
    stream: Arc<Stream>,

    /// Serial of the last packet handed out
    pkt_serial: Option<Serial>,

    /// Generation that reached end of stream
    finished: Option<Serial>,
}

impl PacketFeed {
    pub fn new(stream: Arc<Stream>) -> Self {
        Self {
            stream,
            pkt_serial: None,
            finished: None,
        }
    }

    pub fn stream(&self) -> &Arc<Stream> {
        &self.stream
    }

    pub fn pkt_serial(&self) -> Option<Serial> {
        self.pkt_serial
    }

    pub fn finished(&self) -> Option<Serial> {
        self.finished
    }

    /// Block until the next event for the current generation
    pub fn next_event(&mut self) -> FeedEvent {
        loop {
            let packet = match self.stream.queue().get(true) {
                QueueGet::Aborted => {
                    debug!(stream = self.stream.index(), "Packet feed aborted");
                    return FeedEvent::Aborted;
                }
                QueueGet::Empty => continue,
                QueueGet::Packet(packet) => packet,
            };

            let live = self.stream.queue().serial();
            if packet.serial != live {
                trace!(
                    stream = self.stream.index(),
                    serial = packet.serial,
                    live,
                    "Discarding stale packet"
                );
                continue;
            }

            self.pkt_serial = Some(packet.serial);
            match packet.kind {
                PacketKind::Flush => {
                    self.finished = None;
                    return FeedEvent::Flushed { serial: packet.serial };
                }
                PacketKind::Null => {
                    self.finished = Some(packet.serial);
                    return FeedEvent::EndOfStream { serial: packet.serial };
                }
                PacketKind::Data => return FeedEvent::Packet(packet),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::types::{Rational, StreamKind};

    fn stream() -> Arc<Stream> {
        let stream = Arc::new(Stream::new(StreamKind::Audio, 1, Rational::millis()));
        stream.queue().start();
        stream
    }

    fn data(pts: i64) -> Packet {
        Packet::data(1, vec![0u8; 16], Some(pts), 20, -1)
    }

    #[test]
    fn test_feed_reports_flush_then_packets() {
        let stream = stream();
        stream.queue().put(data(0)).unwrap();

        let mut feed = PacketFeed::new(Arc::clone(&stream));
        assert_eq!(feed.next_event(), FeedEvent::Flushed { serial: 1 });

        match feed.next_event() {
            FeedEvent::Packet(pkt) => assert_eq!(pkt.pts, Some(0)),
            other => panic!("expected packet, got {:?}", other),
        }
        assert_eq!(feed.pkt_serial(), Some(1));
    }

    #[test]
    fn test_feed_discards_stale_packets() {
        let stream = stream();
        let mut feed = PacketFeed::new(Arc::clone(&stream));
        assert_eq!(feed.next_event(), FeedEvent::Flushed { serial: 1 });

        stream.queue().put(data(0)).unwrap();
        stream.queue().put(data(20)).unwrap();
        // Seek without flushing: old packets stay queued behind a new marker
        stream.queue().put_flush_marker().unwrap();
        stream.queue().put(data(5_000)).unwrap();

        assert_eq!(feed.next_event(), FeedEvent::Flushed { serial: 2 });
        match feed.next_event() {
            FeedEvent::Packet(pkt) => {
                assert_eq!(pkt.pts, Some(5_000));
                assert_eq!(pkt.serial, 2);
            }
            other => panic!("expected packet, got {:?}", other),
        }
    }

    #[test]
    fn test_feed_end_of_stream_and_abort() {
        let stream = stream();
        let mut feed = PacketFeed::new(Arc::clone(&stream));
        let _ = feed.next_event();

        stream.queue().put_null_packet(1).unwrap();
        assert_eq!(feed.next_event(), FeedEvent::EndOfStream { serial: 1 });
        assert_eq!(feed.finished(), Some(1));

        stream.queue().abort();
        assert_eq!(feed.next_event(), FeedEvent::Aborted);
    }
}
