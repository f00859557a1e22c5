use bytes::{Buf, BytesMut};
use tracing::{debug, trace, warn};

use crate::codec::{decode_frame, Frame, UnpiType, DEFAULT_MAX_PAYLOAD, FCS_SIZE, HEADER_SIZE, SOF};
use crate::error::FrameError;
use crate::subsystem::{MAX_SUBSYSTEM, RTLS, UTIL};

/// Configuration for stream resynchronization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Largest declared payload length treated as plausible. Default: 1 KiB.
    pub max_payload: usize,
    /// When true, headers naming a subsystem outside `known_subsystems` are
    /// treated as noise.
    pub strict_subsystems: bool,
    /// Subsystems the host understands.
    pub known_subsystems: Vec<u8>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
            strict_subsystems: true,
            known_subsystems: vec![RTLS, UTIL],
        }
    }
}

impl ParserConfig {
    /// Replace the known subsystem set.
    pub fn with_known_subsystems(mut self, subsystems: impl IntoIterator<Item = u8>) -> Self {
        self.known_subsystems = subsystems.into_iter().collect();
        self
    }

    /// Enable or disable strict subsystem filtering.
    pub fn with_strict_subsystems(mut self, strict: bool) -> Self {
        self.strict_subsystems = strict;
        self
    }
}

/// Counters describing what the parser has seen so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Frames handed back to the caller.
    pub frames: u64,
    /// Bytes discarded as noise.
    pub skipped_bytes: u64,
    /// Candidate frames rejected by the checksum.
    pub checksum_errors: u64,
}

/// Extracts frames from a noisy byte stream.
///
/// The parser owns no buffer; callers append whatever the port produced to
/// their own `BytesMut` and call [`StreamParser::next_frame`] until it
/// returns `None`.
#[derive(Debug, Clone, Default)]
pub struct StreamParser {
    config: ParserConfig,
    stats: ParserStats,
}

impl StreamParser {
    /// Create a parser with explicit configuration.
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            stats: ParserStats::default(),
        }
    }

    /// Current configuration.
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Counters accumulated so far.
    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Pull the next complete frame off the front of `buf`.
    ///
    /// Bytes before the first marker are discarded. A marker whose header is
    /// implausible (oversized length, unknown type, unknown subsystem in
    /// strict mode) or whose frame fails the checksum costs exactly one byte
    /// and the scan continues. When the buffered bytes end inside a plausible
    /// frame, `None` is returned and the frame's bytes stay in `buf` for the
    /// next call. On success exactly the frame's bytes are consumed.
    pub fn next_frame(&mut self, buf: &mut BytesMut) -> Option<Frame> {
        loop {
            match buf.iter().position(|&b| b == SOF) {
                Some(0) => {}
                Some(pos) => {
                    trace!(skipped = pos, "discarding bytes before marker");
                    self.skip(buf, pos);
                }
                None => {
                    if !buf.is_empty() {
                        trace!(skipped = buf.len(), "discarding bytes without marker");
                        let len = buf.len();
                        self.skip(buf, len);
                    }
                    return None;
                }
            }

            if buf.len() < HEADER_SIZE {
                return None;
            }

            let payload_len = u16::from_le_bytes([buf[1], buf[2]]) as usize;
            if let Some(reason) = self.implausible_header(payload_len, buf[3]) {
                debug!(reason, "spurious frame marker");
                self.skip(buf, 1);
                continue;
            }

            let total = HEADER_SIZE + payload_len + FCS_SIZE;
            if buf.len() < total {
                return None;
            }

            match decode_frame(&buf[..total]) {
                Ok((frame, used)) => {
                    buf.advance(used);
                    self.stats.frames += 1;
                    return Some(frame);
                }
                Err(FrameError::ChecksumMismatch { expected, actual }) => {
                    warn!(
                        expected = format_args!("0x{expected:02X}"),
                        actual = format_args!("0x{actual:02X}"),
                        "frame checksum mismatch"
                    );
                    self.stats.checksum_errors += 1;
                    self.skip(buf, 1);
                }
                Err(err) => {
                    debug!(%err, "discarding undecodable frame");
                    self.skip(buf, 1);
                }
            }
        }
    }

    fn implausible_header(&self, payload_len: usize, cmd0: u8) -> Option<&'static str> {
        if payload_len > self.config.max_payload {
            return Some("length exceeds maximum");
        }
        if UnpiType::from_cmd0(cmd0).is_none() {
            return Some("unknown frame type");
        }
        if self.config.strict_subsystems
            && !self.config.known_subsystems.contains(&(cmd0 & MAX_SUBSYSTEM))
        {
            return Some("unknown subsystem");
        }
        None
    }

    fn skip(&mut self, buf: &mut BytesMut, count: usize) {
        buf.advance(count);
        self.stats.skipped_bytes += count as u64;
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::codec::encode_frame;

    fn frame_a() -> Frame {
        Frame::new(UnpiType::AsyncReq, RTLS, 0x23, vec![0x10, 0x00, 0xC9, 0x01, 0x25])
    }

    fn frame_b() -> Frame {
        Frame::new(UnpiType::SyncRsp, RTLS, 0x00, vec![0xA0, 0x00, 1, 2, 3, 4, 5, 6])
    }

    fn wire(frame: &Frame) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(frame, &mut buf).unwrap();
        buf.to_vec()
    }

    fn drain(parser: &mut StreamParser, buf: &mut BytesMut) -> Vec<Frame> {
        let mut out = Vec::new();
        while let Some(frame) = parser.next_frame(buf) {
            out.push(frame);
        }
        out
    }

    #[test]
    fn parses_back_to_back_frames() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&wire(&frame_a()));
        buf.extend_from_slice(&wire(&frame_b()));

        let mut parser = StreamParser::default();
        assert_eq!(drain(&mut parser, &mut buf), vec![frame_a(), frame_b()]);
        assert!(buf.is_empty());
        assert_eq!(parser.stats().frames, 2);
        assert_eq!(parser.stats().skipped_bytes, 0);
    }

    #[test]
    fn resyncs_through_garbage() {
        let garbage_one = [0x00, 0x13, 0x37, 0xAA];
        let garbage_two = [0x55, 0x01];

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&garbage_one);
        buf.extend_from_slice(&wire(&frame_a()));
        buf.extend_from_slice(&garbage_two);
        buf.extend_from_slice(&wire(&frame_b()));

        let mut parser = StreamParser::default();
        assert_eq!(drain(&mut parser, &mut buf), vec![frame_a(), frame_b()]);
        assert!(buf.is_empty());
        assert_eq!(parser.stats().skipped_bytes, 6);
    }

    #[test]
    fn partial_frame_is_kept_intact() {
        let bytes = wire(&frame_b());
        for k in 1..bytes.len() {
            let mut buf = BytesMut::from(&bytes[..k]);
            let mut parser = StreamParser::default();
            assert!(parser.next_frame(&mut buf).is_none(), "prefix {k}");
            assert_eq!(buf.as_ref(), &bytes[..k], "prefix {k}");
        }
    }

    #[test]
    fn completes_frame_across_reads() {
        let bytes = wire(&frame_a());
        let (head, tail) = bytes.split_at(4);

        let mut parser = StreamParser::default();
        let mut buf = BytesMut::from(head);
        assert!(parser.next_frame(&mut buf).is_none());
        buf.extend_from_slice(tail);
        assert_eq!(parser.next_frame(&mut buf), Some(frame_a()));
        assert!(buf.is_empty());
    }

    #[test]
    fn spurious_marker_with_oversized_length_is_skipped() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[SOF, 0xFF, 0xFF, 0x39, 0x00]);
        buf.extend_from_slice(&wire(&frame_a()));

        let mut parser = StreamParser::default();
        assert_eq!(drain(&mut parser, &mut buf), vec![frame_a()]);
        assert_eq!(parser.stats().skipped_bytes, 5);
    }

    #[test]
    fn checksum_failure_skips_one_byte_then_recovers() {
        let mut corrupted = wire(&frame_a());
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0x01;

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&corrupted);
        buf.extend_from_slice(&wire(&frame_b()));

        let mut parser = StreamParser::default();
        assert_eq!(drain(&mut parser, &mut buf), vec![frame_b()]);
        assert_eq!(parser.stats().checksum_errors, 1);
        assert_eq!(parser.stats().skipped_bytes, corrupted.len() as u64);
    }

    #[test]
    fn strict_mode_rejects_unknown_subsystem() {
        let foreign = Frame::new(UnpiType::SyncRsp, 0x01, 0x00, Bytes::from_static(&[1]));
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&wire(&foreign));
        buf.extend_from_slice(&wire(&frame_a()));

        let mut strict = StreamParser::default();
        assert_eq!(drain(&mut strict, &mut buf.clone()), vec![frame_a()]);

        let mut lenient = StreamParser::new(ParserConfig::default().with_strict_subsystems(false));
        assert_eq!(drain(&mut lenient, &mut buf), vec![foreign, frame_a()]);
    }

    #[test]
    fn invalid_type_bits_are_skipped() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&[SOF, 0x00, 0x00, 0x19, 0x00, 0x19]);
        buf.extend_from_slice(&wire(&frame_b()));

        let mut parser = StreamParser::default();
        assert_eq!(drain(&mut parser, &mut buf), vec![frame_b()]);
    }

    #[test]
    fn garbage_only_is_consumed() {
        let mut buf = BytesMut::from(&[0x01, 0x02, 0x03][..]);
        let mut parser = StreamParser::default();
        assert!(parser.next_frame(&mut buf).is_none());
        assert!(buf.is_empty());
        assert_eq!(parser.stats().skipped_bytes, 3);
    }
}
