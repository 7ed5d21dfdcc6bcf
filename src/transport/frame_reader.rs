//! Receive buffer that turns fragmented reads into newline-terminated frames.
//!
//! The caller reads into [`FrameReader::spare`] and reports the byte count to
//! [`FrameReader::advance`]. Only the last byte of each read is checked for
//! the delimiter, so a read carrying several complete requests surfaces as a
//! single frame spanning all of them.

use super::{ConnectionError, TextEncoding};

/// Hard ceiling for one connection's receive buffer.
pub const MAX_BUFFER_SIZE: usize = 1024 * 1024;

/// Capacity a fresh buffer starts with.
pub const INITIAL_BUFFER_SIZE: usize = 32;

/// Frame delimiter.
pub const DELIMITER: u8 = b'\n';

/// Growable receive buffer with a write cursor.
///
/// Invariants: `receive_position < buffer.len()` between reads, and the
/// buffer only ever grows, by doubling, up to `max_size`.
#[derive(Debug)]
pub struct FrameReader {
    buffer: Vec<u8>,
    receive_position: usize,
    max_size: usize,
    encoding: TextEncoding,
}

impl FrameReader {
    /// Creates a reader with the default 32 byte start and 1 MiB ceiling.
    pub fn new(encoding: TextEncoding) -> Self {
        Self::with_limits(INITIAL_BUFFER_SIZE, MAX_BUFFER_SIZE, encoding)
    }

    /// Creates a reader with custom limits.
    pub fn with_limits(initial: usize, max_size: usize, encoding: TextEncoding) -> Self {
        let max_size = max_size.max(1);
        Self {
            buffer: vec![0; initial.clamp(1, max_size)],
            receive_position: 0,
            max_size,
            encoding,
        }
    }

    /// Free space the next read should fill.
    pub fn spare(&mut self) -> &mut [u8] {
        &mut self.buffer[self.receive_position..]
    }

    /// Records `count` freshly read bytes.
    ///
    /// Returns the decoded frame when the read ended on the delimiter. A zero
    /// count means the peer hung up; a full buffer at the ceiling means the
    /// peer is sending a frame that will never fit. Both are fatal.
    pub fn advance(&mut self, count: usize) -> Result<Option<String>, ConnectionError> {
        if count == 0 {
            return Err(ConnectionError::Closed);
        }
        debug_assert!(self.receive_position + count <= self.buffer.len());
        self.receive_position += count;

        if self.receive_position == self.buffer.len() {
            if self.buffer.len() >= self.max_size {
                return Err(ConnectionError::FrameTooLarge {
                    limit: self.max_size,
                });
            }
            self.grow();
        }

        if self.receive_position > 1 && self.buffer[self.receive_position - 1] == DELIMITER {
            let frame = self.encoding.decode(&self.buffer[..self.receive_position])?;
            self.receive_position = 0;
            return Ok(Some(frame));
        }
        Ok(None)
    }

    /// Feeds `bytes` as if they had arrived in a single read.
    ///
    /// Convenience for callers that already hold the data; splits it across
    /// several internal reads when it does not fit the spare space.
    pub fn push(&mut self, mut bytes: &[u8]) -> Result<Vec<String>, ConnectionError> {
        let mut frames = Vec::new();
        while !bytes.is_empty() {
            let spare = self.spare();
            let count = spare.len().min(bytes.len());
            spare[..count].copy_from_slice(&bytes[..count]);
            bytes = &bytes[count..];
            if let Some(frame) = self.advance(count)? {
                frames.push(frame);
            }
        }
        Ok(frames)
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn receive_position(&self) -> usize {
        self.receive_position
    }

    fn grow(&mut self) {
        let new_len = (self.buffer.len() * 2).min(self.max_size);
        self.buffer.resize(new_len, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader() -> FrameReader {
        FrameReader::new(TextEncoding::Utf8)
    }

    fn read(reader: &mut FrameReader, bytes: &[u8]) -> Result<Option<String>, ConnectionError> {
        reader.spare()[..bytes.len()].copy_from_slice(bytes);
        reader.advance(bytes.len())
    }

    #[test]
    fn single_read_frame() {
        let mut reader = reader();
        let frame = read(&mut reader, b"{\"id\":1}\n").unwrap();
        assert_eq!(frame.as_deref(), Some("{\"id\":1}\n"));
        assert_eq!(reader.receive_position(), 0);
    }

    #[test]
    fn byte_by_byte_yields_one_frame() {
        let text = "{\"id\":1,\"method\":\"Add\",\"params\":[2,3]}\n";
        let mut reader = reader();
        let mut frames = Vec::new();
        for byte in text.as_bytes() {
            if let Some(frame) = read(&mut reader, &[*byte]).unwrap() {
                frames.push(frame);
            }
        }
        assert_eq!(frames, vec![text.to_string()]);
    }

    #[test]
    fn two_frames_across_three_reads() {
        let mut reader = reader();
        assert_eq!(read(&mut reader, b"{\"id\":1,").unwrap(), None);
        assert_eq!(
            read(&mut reader, b"\"method\":\"A\"}\n").unwrap().as_deref(),
            Some("{\"id\":1,\"method\":\"A\"}\n")
        );
        // The cursor restarted, so the second frame carries none of the first.
        assert_eq!(
            read(&mut reader, b"{\"id\":2}\n").unwrap().as_deref(),
            Some("{\"id\":2}\n")
        );
    }

    #[test]
    fn lone_delimiter_is_not_a_frame() {
        let mut reader = reader();
        assert_eq!(read(&mut reader, b"\n").unwrap(), None);
        assert_eq!(reader.receive_position(), 1);
    }

    #[test]
    fn concatenated_messages_arrive_as_one_span() {
        let mut reader = reader();
        let frame = read(&mut reader, b"a\nb\n").unwrap();
        assert_eq!(frame.as_deref(), Some("a\nb\n"));
    }

    #[test]
    fn buffer_doubles_when_full() {
        let mut reader = reader();
        let chunk = vec![b'x'; INITIAL_BUFFER_SIZE];
        assert_eq!(read(&mut reader, &chunk).unwrap(), None);
        assert_eq!(reader.capacity(), INITIAL_BUFFER_SIZE * 2);
        assert_eq!(reader.receive_position(), INITIAL_BUFFER_SIZE);
    }

    #[test]
    fn growth_preserves_bytes() {
        let mut reader = FrameReader::with_limits(4, 64, TextEncoding::Utf8);
        let frames = reader.push(b"abcdefghij\n").unwrap();
        assert_eq!(frames, vec!["abcdefghij\n".to_string()]);
        assert_eq!(reader.capacity(), 16);
    }

    #[test]
    fn capacity_is_kept_after_frame() {
        let mut reader = FrameReader::with_limits(4, 64, TextEncoding::Utf8);
        reader.push(b"abcdefghij\n").unwrap();
        let frames = reader.push(b"k\n").unwrap();
        assert_eq!(frames, vec!["k\n".to_string()]);
        assert_eq!(reader.capacity(), 16);
    }

    #[test]
    fn oversize_frame_is_fatal() {
        let mut reader = FrameReader::with_limits(4, 16, TextEncoding::Utf8);
        let err = reader.push(&[b'x'; 16]).unwrap_err();
        assert!(matches!(err, ConnectionError::FrameTooLarge { limit: 16 }));
        assert_eq!(reader.capacity(), 16);
    }

    #[test]
    fn growth_is_bounded_at_default_ceiling() {
        let mut reader = reader();
        let chunk = vec![b'x'; 4096];
        let mut error = None;
        let mut fed = 0;
        while error.is_none() {
            match reader.push(&chunk) {
                Ok(frames) => assert!(frames.is_empty()),
                Err(err) => error = Some(err),
            }
            fed += chunk.len();
            assert!(reader.capacity() <= MAX_BUFFER_SIZE);
        }
        assert!(matches!(error, Some(ConnectionError::FrameTooLarge { .. })));
        assert_eq!(fed, MAX_BUFFER_SIZE);
    }

    #[test]
    fn frames_before_oversize_are_intact() {
        let mut reader = FrameReader::with_limits(4, 32, TextEncoding::Utf8);
        assert_eq!(reader.push(b"ok\n").unwrap(), vec!["ok\n".to_string()]);
        assert!(reader.push(&[b'y'; 40]).is_err());
    }

    #[test]
    fn zero_read_is_disconnect() {
        let mut reader = reader();
        assert!(matches!(reader.advance(0), Err(ConnectionError::Closed)));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut reader = reader();
        assert!(matches!(
            read(&mut reader, &[0xff, 0xfe, b'\n']),
            Err(ConnectionError::InvalidText { .. })
        ));
    }
}
