use std::io::{ErrorKind, Read};

use bitfield_struct::bitfield;

/// First byte of every RTCM3 frame
pub const PREAMBLE: u8 = 0xD3;
/// Largest payload a frame can announce
pub const MAX_PAYLOAD_LEN: usize = 1023;

const HEADER_LEN: usize = 3;
const CRC_LEN: usize = 3;
const CRC24Q_POLY: u32 = 0x0186_4CFB;
/// Bytes discarded without a valid frame before the stream counts as lost
const MAX_DESYNC: usize = 4096;

/// Three byte frame header, read big endian into the low 24 bits
#[bitfield(u32)]
struct FrameHeader {
    #[bits(10)]
    length: u16,
    #[bits(6)]
    reserved: u8,
    preamble: u8,
    #[bits(8)]
    __: u8,
}

impl FrameHeader {
    fn parse(bytes: &[u8]) -> Self {
        Self::from_bits(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    }
}

/// CRC-24Q as used by RTCM3 and SBAS
pub fn crc24q(data: &[u8]) -> u32 {
    data.iter().fold(0u32, |mut crc, &byte| {
        crc ^= (byte as u32) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24Q_POLY;
            }
        }
        crc & 0x00FF_FFFF
    })
}

/// Delimits RTCM3 frames in a raw correction byte stream.
///
/// Frames are returned whole (header, payload and CRC) and are otherwise
/// opaque. Bytes that do not belong to a frame with a valid CRC are dropped.
/// Buffered bytes survive a read error, so a timed out read can be retried.
pub struct RtcmScanner<R> {
    reader: R,
    buf: Vec<u8>,
    skipped: usize,
}

impl<R: Read> RtcmScanner<R> {
    /// Scan frames from `reader`
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(2 * (HEADER_LEN + MAX_PAYLOAD_LEN + CRC_LEN)),
            skipped: 0,
        }
    }

    /// The underlying reader
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Next frame, or `None` if the stream ended or lost framing
    pub fn next_message(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        loop {
            if let Some(frame) = self.extract() {
                return Ok(Some(frame));
            }
            if self.skipped > MAX_DESYNC {
                log::debug!("no RTCM3 frame in {} bytes, stream out of sync", self.skipped);
                self.skipped = 0;
                self.buf.clear();
                return Ok(None);
            }
            let mut tmp = [0; 1024];
            let n = match self.reader.read(&mut tmp) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if n == 0 {
                return Ok(None);
            }
            self.buf.extend_from_slice(&tmp[..n]);
        }
    }

    fn extract(&mut self) -> Option<Vec<u8>> {
        loop {
            let start = self
                .buf
                .iter()
                .position(|&b| b == PREAMBLE)
                .unwrap_or(self.buf.len());
            self.discard(start);
            if self.buf.len() < HEADER_LEN {
                return None;
            }
            let header = FrameHeader::parse(&self.buf);
            if header.reserved() != 0 {
                self.discard(1);
                continue;
            }
            let body = HEADER_LEN + header.length() as usize;
            let total = body + CRC_LEN;
            if self.buf.len() < total {
                return None;
            }
            let crc = u32::from_be_bytes([0, self.buf[body], self.buf[body + 1], self.buf[body + 2]]);
            if crc24q(&self.buf[..body]) != crc {
                self.discard(1);
                continue;
            }
            self.skipped = 0;
            return Some(self.buf.drain(..total).collect());
        }
    }

    fn discard(&mut self, n: usize) {
        if n > 0 {
            self.buf.drain(..n);
            self.skipped += n;
        }
    }
}

#[cfg(test)]
pub(crate) fn frame(payload: &[u8]) -> Vec<u8> {
    let len = payload.len() as u16;
    let mut out = vec![PREAMBLE, (len >> 8) as u8 & 0x03, len as u8];
    out.extend_from_slice(payload);
    let crc = crc24q(&out);
    out.extend_from_slice(&crc.to_be_bytes()[1..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Error};

    #[test]
    fn crc_check_value() {
        assert_eq!(crc24q(b"123456789"), 0xCDE703);
    }

    #[test]
    fn header_fields() {
        let header = FrameHeader::parse(&[0xD3, 0x01, 0x13]);
        assert_eq!(header.preamble(), PREAMBLE);
        assert_eq!(header.reserved(), 0);
        assert_eq!(header.length(), 0x113);
    }

    #[test]
    fn frames_across_junk() {
        let a = frame(&[0x3E, 0xD0, 0x00, 0x01]);
        let b = frame(&[0x43, 0x50, 0xD3, 0x00, 0x77]);
        let mut data = b"$GNGGA,junk\r\n".to_vec();
        data.extend_from_slice(&a);
        data.extend_from_slice(&[0xD3, 0xFF, 0x00]);
        data.extend_from_slice(&b);
        let mut scanner = RtcmScanner::new(Cursor::new(data));
        assert_eq!(scanner.next_message().unwrap(), Some(a));
        assert_eq!(scanner.next_message().unwrap(), Some(b));
        assert_eq!(scanner.next_message().unwrap(), None);
    }

    #[test]
    fn corrupt_crc_is_skipped() {
        let mut bad = frame(&[1, 2, 3]);
        let crc_at = bad.len() - CRC_LEN;
        bad[crc_at..].copy_from_slice(&[0, 0, 0]);
        let good = frame(&[4, 5, 6]);
        let mut data = bad;
        data.extend_from_slice(&good);
        let mut scanner = RtcmScanner::new(Cursor::new(data));
        assert_eq!(scanner.next_message().unwrap(), Some(good));
    }

    /// Serves the bytes one chunk at a time, timing out between chunks
    struct Trickle {
        chunks: Vec<Vec<u8>>,
        timed_out: bool,
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.timed_out {
                self.timed_out = true;
                return Err(Error::from(ErrorKind::TimedOut));
            }
            self.timed_out = false;
            if self.chunks.is_empty() {
                return Ok(0);
            }
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn timeouts_keep_partial_frame() {
        let msg = frame(&[9; 40]);
        let (head, tail) = msg.split_at(10);
        let mut scanner = RtcmScanner::new(Trickle {
            chunks: vec![head.to_vec(), tail.to_vec()],
            timed_out: false,
        });
        let mut timeouts = 0;
        let found = loop {
            match scanner.next_message() {
                Ok(msg) => break msg,
                Err(e) if e.kind() == ErrorKind::TimedOut => timeouts += 1,
                Err(e) => panic!("unexpected error {e}"),
            }
        };
        assert_eq!(found, Some(msg));
        assert_eq!(timeouts, 2);
    }

    #[test]
    fn garbage_counts_as_lost_sync() {
        let data = vec![0x55; MAX_DESYNC + 2048];
        let mut scanner = RtcmScanner::new(Cursor::new(data));
        assert_eq!(scanner.next_message().unwrap(), None);
    }
}
