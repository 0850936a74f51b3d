use crate::constants::HEADER_SIZE;
use crate::crc::crc16_xmodem;
use crate::error::ShadeError;
use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{FromPrimitive, IntoPrimitive};

/// Single-byte operation identifier. Requests and replies share opcodes;
/// direction is implied by who sent the datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    GetSerial = 0x00,
    SetLimit = 0x01,
    JogUp = 0x03,
    JogDown = 0x04,
    JogStop = 0x05,
    SetPosition = 0x1A,
    GetStatus = 0x1D,
    ClearLimits = 0x1E,
    StepUp = 0x23,
    StepDown = 0x24,
    GetShadeName = 0x34,
    GetDeviceName = 0x3A,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Wrapping per-session command counter. Bumped before every outgoing
/// command; replies are never correlated against it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceCounter(u8);

impl SequenceCounter {
    pub fn new() -> Self {
        Self(0)
    }

    /// Increment (mod 256) and return the new value.
    pub fn next(&mut self) -> u8 {
        self.0 = self.0.wrapping_add(1);
        self.0
    }

    pub fn current(&self) -> u8 {
        self.0
    }
}

/// One UDP datagram's worth of protocol:
/// `length:u16, crc:u16, opcode:u8, sequence:u8, channel:u8, reserved:u8`
/// followed by `length` payload bytes, all little-endian.
///
/// The CRC covers `opcode‖sequence‖channel‖reserved‖payload`. On decode the
/// received value is carried as-is and deliberately not re-verified; the
/// controllers' own traffic is trusted, matching established behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub opcode: Opcode,
    pub sequence: u8,
    pub channel: u8,
    pub reserved: u8,
    pub crc: u16,
    pub payload: Bytes,
}

impl Frame {
    /// Build a frame with its CRC computed.
    pub fn new(opcode: Opcode, sequence: u8, channel: u8, payload: Bytes) -> Self {
        let mut frame = Self {
            opcode,
            sequence,
            channel,
            reserved: 0,
            crc: 0,
            payload,
        };
        frame.crc = frame.compute_crc();
        frame
    }

    /// CRC over the post-header bytes of this frame.
    pub fn compute_crc(&self) -> u16 {
        let mut data = Vec::with_capacity(4 + self.payload.len());
        data.extend_from_slice(&[
            self.opcode.into(),
            self.sequence,
            self.channel,
            self.reserved,
        ]);
        data.extend_from_slice(&self.payload);
        crc16_xmodem(&data)
    }
}

impl From<Frame> for Bytes {
    fn from(frame: Frame) -> Self {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + frame.payload.len());
        buf.put_u16_le(frame.payload.len() as u16);
        buf.put_u16_le(frame.crc);
        buf.put_u8(frame.opcode.into());
        buf.put_u8(frame.sequence);
        buf.put_u8(frame.channel);
        buf.put_u8(frame.reserved);
        buf.put_slice(&frame.payload);
        buf.freeze()
    }
}

impl TryFrom<Bytes> for Frame {
    type Error = ShadeError;

    fn try_from(mut bytes: Bytes) -> Result<Self, Self::Error> {
        if bytes.len() < HEADER_SIZE {
            return Err(ShadeError::Malformed(bytes.len()));
        }
        let header = bytes.split_to(HEADER_SIZE);
        let length = u16::from_le_bytes([header[0], header[1]]) as usize;
        let crc = u16::from_le_bytes([header[2], header[3]]);
        if bytes.len() < length {
            return Err(ShadeError::Truncated {
                expected: length,
                actual: bytes.len(),
            });
        }
        // datagrams longer than header + length occur; the excess is ignored
        let payload = bytes.split_to(length);
        Ok(Frame {
            opcode: Opcode::from_primitive(header[4]),
            sequence: header[5],
            channel: header[6],
            reserved: header[7],
            crc,
            payload,
        })
    }
}
