use bytes::{BufMut, Bytes, BytesMut};

/// Largest payload a control frame may carry.
pub const MAX_CONTROL_PAYLOAD: usize = 125;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Continuation = 0x0,
    Text = 0x1,
    Binary = 0x2,
    Close = 0x8,
    Ping = 0x9,
    Pong = 0xA,
}

impl Opcode {
    /// Maps the low nibble of the first frame byte; reserved values are `None`.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x0 => Some(Opcode::Continuation),
            0x1 => Some(Opcode::Text),
            0x2 => Some(Opcode::Binary),
            0x8 => Some(Opcode::Close),
            0x9 => Some(Opcode::Ping),
            0xA => Some(Opcode::Pong),
            _ => None,
        }
    }

    #[inline]
    pub fn is_control(self) -> bool {
        (self as u8) & 0x8 != 0
    }
}

/// One complete, unmasked frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub fin: bool,
    pub opcode: Opcode,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(fin: bool, opcode: Opcode, payload: Bytes) -> Self {
        Self { fin, opcode, payload }
    }

    pub fn text<T: Into<String>>(text: T) -> Self {
        Self::new(true, Opcode::Text, Bytes::from(text.into()))
    }

    pub fn binary<B: Into<Bytes>>(data: B) -> Self {
        Self::new(true, Opcode::Binary, data.into())
    }

    pub fn ping<B: Into<Bytes>>(data: B) -> Self {
        Self::new(true, Opcode::Ping, data.into())
    }

    pub fn pong<B: Into<Bytes>>(data: B) -> Self {
        Self::new(true, Opcode::Pong, data.into())
    }

    /// Close frame carrying the status code (unless empty) and the reason.
    pub fn close(status: CloseStatus, reason: &str) -> Self {
        let mut payload = BytesMut::with_capacity(2 + reason.len());
        if let Some(code) = status.code() {
            payload.put_u16(code);
            payload.put_slice(reason.as_bytes());
        }
        Self::new(true, Opcode::Close, payload.freeze())
    }

    /// Status and reason of a close frame payload.
    pub fn close_reason(&self) -> (CloseStatus, String) {
        match self.payload.len() {
            0 | 1 => (CloseStatus::Empty, String::new()),
            _ => {
                let code = u16::from_be_bytes([self.payload[0], self.payload[1]]);
                (CloseStatus::from(code), String::from_utf8_lossy(&self.payload[2..]).into_owned())
            }
        }
    }
}

/// Close status codes of RFC 6455 section 7.4.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CloseStatus {
    /// No status code was sent.
    Empty,
    NormalClosure,
    EndpointUnavailable,
    ProtocolError,
    InvalidMessageType,
    Reserved4,
    Reserved5,
    Reserved6,
    InvalidPayloadData,
    PolicyViolation,
    MessageTooBig,
    MandatoryExtension,
    InternalServerError,
    Reserved12,
    Reserved13,
    Reserved14,
    Reserved15,
    Other(u16),
}

impl CloseStatus {
    pub fn code(self) -> Option<u16> {
        let code = match self {
            CloseStatus::Empty => return None,
            CloseStatus::NormalClosure => 1000,
            CloseStatus::EndpointUnavailable => 1001,
            CloseStatus::ProtocolError => 1002,
            CloseStatus::InvalidMessageType => 1003,
            CloseStatus::Reserved4 => 1004,
            CloseStatus::Reserved5 => 1005,
            CloseStatus::Reserved6 => 1006,
            CloseStatus::InvalidPayloadData => 1007,
            CloseStatus::PolicyViolation => 1008,
            CloseStatus::MessageTooBig => 1009,
            CloseStatus::MandatoryExtension => 1010,
            CloseStatus::InternalServerError => 1011,
            CloseStatus::Reserved12 => 1012,
            CloseStatus::Reserved13 => 1013,
            CloseStatus::Reserved14 => 1014,
            CloseStatus::Reserved15 => 1015,
            CloseStatus::Other(code) => code,
        };
        Some(code)
    }
}

impl From<u16> for CloseStatus {
    fn from(code: u16) -> Self {
        match code {
            1000 => CloseStatus::NormalClosure,
            1001 => CloseStatus::EndpointUnavailable,
            1002 => CloseStatus::ProtocolError,
            1003 => CloseStatus::InvalidMessageType,
            1004 => CloseStatus::Reserved4,
            1005 => CloseStatus::Reserved5,
            1006 => CloseStatus::Reserved6,
            1007 => CloseStatus::InvalidPayloadData,
            1008 => CloseStatus::PolicyViolation,
            1009 => CloseStatus::MessageTooBig,
            1010 => CloseStatus::MandatoryExtension,
            1011 => CloseStatus::InternalServerError,
            1012 => CloseStatus::Reserved12,
            1013 => CloseStatus::Reserved13,
            1014 => CloseStatus::Reserved14,
            1015 => CloseStatus::Reserved15,
            other => CloseStatus::Other(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode() {
        assert_eq!(Opcode::from_u8(0x1), Some(Opcode::Text));
        assert_eq!(Opcode::from_u8(0x3), None);
        assert_eq!(Opcode::from_u8(0xB), None);
        assert!(Opcode::Ping.is_control());
        assert!(!Opcode::Binary.is_control());
    }

    #[test]
    fn test_close_payload() {
        let frame = Frame::close(CloseStatus::PolicyViolation, "bye");
        assert_eq!(&frame.payload[..], b"\x03\xf0bye");
        assert_eq!(frame.close_reason(), (CloseStatus::PolicyViolation, "bye".to_string()));

        let frame = Frame::close(CloseStatus::Empty, "ignored");
        assert!(frame.payload.is_empty());
        assert_eq!(frame.close_reason().0, CloseStatus::Empty);
        assert_eq!(CloseStatus::from(4000), CloseStatus::Other(4000));
    }
}
