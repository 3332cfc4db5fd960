//! Incremental frame decoder.
//!
//! Header bytes are consumed one at a time and payload bytes in bulk, so a frame may be
//! split across any number of reads. The decoder stops right after a completed frame and
//! reports how many input bytes it used; the caller pushes the rest back.

use super::frame::{Frame, MAX_CONTROL_PAYLOAD, Opcode};
use crate::ensure;
use crate::protocol::ParseError;
use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

/// Upper bound for a single frame payload.
pub const DEFAULT_MAX_PAYLOAD: u64 = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Opcode,
    Length,
    ExtendedLength,
    Mask,
    Payload,
}

#[derive(Debug)]
pub struct FrameDecoder {
    stage: Stage,
    fin: bool,
    opcode: Opcode,
    payload_len_bytes_remaining: u8,
    payload_len: u64,
    mask_present: bool,
    mask_key: [u8; 4],
    mask_pos: u8,
    payload_pos: u64,
    payload: BytesMut,
    max_payload: u64,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(max_payload: u64) -> Self {
        Self {
            stage: Stage::Opcode,
            fin: false,
            opcode: Opcode::Continuation,
            payload_len_bytes_remaining: 0,
            payload_len: 0,
            mask_present: false,
            mask_key: [0; 4],
            mask_pos: 0,
            payload_pos: 0,
            payload: BytesMut::new(),
            max_payload,
        }
    }

    /// True once the first byte of a frame was consumed and until that frame completes.
    #[inline]
    pub fn in_progress(&self) -> bool {
        self.stage != Stage::Opcode
    }

    /// Feeds `data`, returning the bytes used and the frame if one completed.
    pub fn decode_slice(&mut self, data: &[u8]) -> Result<(usize, Option<Frame>), ParseError> {
        let mut i = 0;
        while i < data.len() {
            match self.stage {
                Stage::Opcode => {
                    let b = data[i];
                    ensure!(b & 0x70 == 0, ParseError::malformed_frame("reserved bits set"));
                    self.fin = b & 0x80 != 0;
                    self.opcode = Opcode::from_u8(b & 0x0F)
                        .ok_or_else(|| ParseError::malformed_frame(format!("reserved opcode {:#x}", b & 0x0F)))?;
                    ensure!(
                        self.fin || !self.opcode.is_control(),
                        ParseError::malformed_frame("fragmented control frame")
                    );
                    self.stage = Stage::Length;
                    i += 1;
                }
                Stage::Length => {
                    let b = data[i];
                    self.mask_present = b & 0x80 != 0;
                    ensure!(
                        !self.opcode.is_control() || usize::from(b & 0x7F) <= MAX_CONTROL_PAYLOAD,
                        ParseError::malformed_frame("control frame payload too large")
                    );
                    match b & 0x7F {
                        126 => {
                            self.payload_len_bytes_remaining = 2;
                            self.payload_len = 0;
                            self.stage = Stage::ExtendedLength;
                        }
                        127 => {
                            self.payload_len_bytes_remaining = 8;
                            self.payload_len = 0;
                            self.stage = Stage::ExtendedLength;
                        }
                        len => {
                            self.payload_len = u64::from(len);
                            self.header_done()?;
                        }
                    }
                    i += 1;
                }
                Stage::ExtendedLength => {
                    self.payload_len = (self.payload_len << 8) | u64::from(data[i]);
                    self.payload_len_bytes_remaining -= 1;
                    if self.payload_len_bytes_remaining == 0 {
                        ensure!(self.payload_len >> 63 == 0, ParseError::malformed_frame("payload length overflow"));
                        self.header_done()?;
                    }
                    i += 1;
                }
                Stage::Mask => {
                    self.mask_key[usize::from(self.mask_pos)] = data[i];
                    self.mask_pos += 1;
                    if self.mask_pos == 4 {
                        self.stage = Stage::Payload;
                    }
                    i += 1;
                }
                Stage::Payload => {
                    let remaining = self.payload_len - self.payload_pos;
                    let n = usize::try_from(remaining).unwrap_or(usize::MAX).min(data.len() - i);
                    let start = self.payload.len();
                    self.payload.extend_from_slice(&data[i..i + n]);
                    if self.mask_present {
                        let offset = self.payload_pos as usize;
                        for (j, b) in self.payload[start..].iter_mut().enumerate() {
                            *b ^= self.mask_key[(offset + j) % 4];
                        }
                    }
                    self.payload_pos += n as u64;
                    i += n;
                }
            }

            if self.stage == Stage::Payload && self.payload_pos == self.payload_len {
                return Ok((i, Some(self.finish())));
            }
        }
        Ok((i, None))
    }

    fn header_done(&mut self) -> Result<(), ParseError> {
        if self.opcode.is_control() {
            ensure!(
                self.payload_len <= MAX_CONTROL_PAYLOAD as u64,
                ParseError::malformed_frame("control frame payload too large")
            );
        }
        ensure!(
            self.payload_len <= self.max_payload,
            ParseError::malformed_frame(format!("frame payload of {} bytes exceeds {}", self.payload_len, self.max_payload))
        );
        self.payload_pos = 0;
        self.mask_pos = 0;
        self.payload.reserve(usize::try_from(self.payload_len).unwrap_or(0).min(64 * 1024));
        self.stage = if self.mask_present { Stage::Mask } else { Stage::Payload };
        Ok(())
    }

    fn finish(&mut self) -> Frame {
        self.stage = Stage::Opcode;
        let frame = Frame::new(self.fin, self.opcode, self.payload.split().freeze());
        trace!(opcode = ?frame.opcode, fin = frame.fin, len = frame.payload.len(), "decoded websocket frame");
        frame
    }
}

impl Decoder for FrameDecoder {
    type Item = Frame;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let (used, frame) = self.decode_slice(&src[..])?;
        src.advance(used);
        Ok(frame)
    }
}
