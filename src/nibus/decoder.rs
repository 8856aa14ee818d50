//! Streaming NIBUS frame reassembly.
//!
//! The transport delivers arbitrary byte chunks; this decoder accumulates
//! them, hunts for the preamble, waits until the length byte promises a
//! complete frame, and verifies the CRC before emitting a datagram.
//! Anything that does not check out is consumed one byte at a time so that
//! a preamble hiding inside garbage is found on the next pass. Physical
//! buses produce line noise routinely, so rejects are logged at trace
//! level and otherwise invisible.

use bytes::BytesMut;
use log::trace;

use crate::constants::{MAX_DATA_LENGTH, OFFSET_LENGTH, PREAMBLE};
use crate::nibus::frame::{parse_frame, NibusDatagram};

/// Reassembles NIBUS frames from a byte stream.
#[derive(Debug, Default)]
pub struct NibusDecoder {
    buf: BytesMut,
}

impl NibusDecoder {
    pub fn new() -> Self {
        NibusDecoder {
            buf: BytesMut::with_capacity(512),
        }
    }

    /// Appends freshly received bytes and returns every complete, valid
    /// frame that became available.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<NibusDatagram> {
        self.buf.extend_from_slice(bytes);
        let mut frames = Vec::new();
        loop {
            match self.buf.iter().position(|&b| b == PREAMBLE) {
                Some(0) => {}
                Some(pos) => {
                    trace!("skipping {pos} bytes before preamble");
                    let _ = self.buf.split_to(pos);
                }
                None => {
                    self.buf.clear();
                    break;
                }
            }
            if self.buf.len() <= OFFSET_LENGTH {
                break;
            }
            let length = self.buf[OFFSET_LENGTH];
            if length == 0 || length as usize - 1 > MAX_DATA_LENGTH {
                let _ = self.buf.split_to(1);
                continue;
            }
            let total = NibusDatagram::frame_length(length);
            if self.buf.len() < total {
                break;
            }
            match parse_frame(&self.buf[..total]) {
                Ok((_, datagram)) => {
                    let _ = self.buf.split_to(total);
                    frames.push(datagram);
                }
                Err(_) => {
                    trace!("dropping corrupt frame candidate ({total} bytes)");
                    let _ = self.buf.split_to(1);
                }
            }
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PROTOCOL_NMS;
    use crate::nibus::address::Address;

    fn sample_frame() -> NibusDatagram {
        NibusDatagram::new(
            0,
            "1.2.3".parse().unwrap(),
            Address::Empty,
            PROTOCOL_NMS,
            vec![0x0B, 0x02, 0x00],
        )
        .unwrap()
    }

    #[test]
    fn frame_split_across_chunks() {
        let frame = sample_frame();
        let mut decoder = NibusDecoder::new();
        let (head, tail) = frame.raw.split_at(7);
        assert!(decoder.push(head).is_empty());
        let frames = decoder.push(tail);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, frame.data);
        assert!(frames[0].received_at.is_some());
    }

    #[test]
    fn noise_before_frame_is_skipped() {
        let frame = sample_frame();
        let mut input = vec![0x00, 0xFF, 0x55];
        input.extend_from_slice(&frame.raw);
        let mut decoder = NibusDecoder::new();
        let frames = decoder.push(&input);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn corrupt_crc_is_dropped_silently() {
        let frame = sample_frame();
        let mut bad = frame.raw.clone();
        let last = bad.len() - 1;
        bad[last] ^= 0xFF;
        let mut decoder = NibusDecoder::new();
        assert!(decoder.push(&bad).is_empty());
        // a healthy frame after the noise still decodes
        let frames = decoder.push(&frame.raw);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn two_frames_in_one_chunk() {
        let frame = sample_frame();
        let mut input = frame.raw.clone();
        input.extend_from_slice(&frame.raw);
        let mut decoder = NibusDecoder::new();
        assert_eq!(decoder.push(&input).len(), 2);
    }
}
