use super::frame::{Frame, MAX_CONTROL_PAYLOAD};
use crate::ensure;
use crate::protocol::SendError;
use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

/// Writes single frames. Server frames are never masked; a masking key is only used when
/// acting as a client.
#[derive(Debug, Default, Clone)]
pub struct FrameEncoder {
    mask: Option<[u8; 4]>,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self { mask: None }
    }

    pub fn masked(key: [u8; 4]) -> Self {
        Self { mask: Some(key) }
    }
}

impl Encoder<Frame> for FrameEncoder {
    type Error = SendError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let len = frame.payload.len();
        if frame.opcode.is_control() {
            ensure!(frame.fin, SendError::invalid_body("control frames can not be fragmented"));
            ensure!(len <= MAX_CONTROL_PAYLOAD, SendError::invalid_body("control frame payload too large"));
        }

        dst.reserve(len + 14);
        dst.put_u8((u8::from(frame.fin) << 7) | frame.opcode as u8);

        let mask_bit = if self.mask.is_some() { 0x80 } else { 0 };
        if len < 126 {
            dst.put_u8(mask_bit | len as u8);
        } else if len < 65536 {
            dst.put_u8(mask_bit | 126);
            dst.put_u16(len as u16);
        } else {
            dst.put_u8(mask_bit | 127);
            dst.put_u64(len as u64);
        }

        match self.mask {
            None => dst.put_slice(&frame.payload),
            Some(key) => {
                dst.put_slice(&key);
                dst.extend(frame.payload.iter().enumerate().map(|(i, b)| b ^ key[i % 4]));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::websocket::Opcode;
    use bytes::Bytes;

    fn encode(frame: Frame) -> BytesMut {
        let mut dst = BytesMut::new();
        FrameEncoder::new().encode(frame, &mut dst).unwrap();
        dst
    }

    #[test]
    fn test_length_forms() {
        assert_eq!(&encode(Frame::text("hi"))[..], b"\x81\x02hi");

        let encoded = encode(Frame::binary(vec![0u8; 126]));
        assert_eq!(&encoded[..4], &[0x82, 126, 0, 126]);
        assert_eq!(encoded.len(), 4 + 126);

        let encoded = encode(Frame::binary(vec![0u8; 65536]));
        assert_eq!(&encoded[..10], &[0x82, 127, 0, 0, 0, 0, 0, 1, 0, 0]);
        assert_eq!(encoded.len(), 10 + 65536);
    }

    #[test]
    fn test_unfinished_frame_header() {
        let encoded = encode(Frame::new(false, Opcode::Text, Bytes::from_static(b"a")));
        assert_eq!(encoded[0], 0x01);
    }

    #[test]
    fn test_oversized_control_frame() {
        let mut dst = BytesMut::new();
        let result = FrameEncoder::new().encode(Frame::ping(vec![0u8; 126]), &mut dst);
        assert!(matches!(result, Err(SendError::InvalidBody { .. })));
    }
}
