//! Typed commands and replies layered over [`Frame`]. Builders reproduce the
//! controllers' exact payload layouts; parsers accept the reply shapes seen
//! on real networks (40-byte status payloads, NUL-padded name fields).

use crate::constants::{NAME_FIELD_SIZE, SERIAL_PAYLOAD_SIZE, STATUS_PAYLOAD_SIZE};
use crate::error::ShadeError;
use crate::packet::{Frame, Opcode};
use bytes::{BufMut, Bytes, BytesMut};
use std::net::Ipv4Addr;
use strum_macros::Display;
use zerocopy::FromBytes;
use zerocopy::byteorder::little_endian::{I16, U16, U32};
use zerocopy::{Immutable, KnownLayout, Unaligned};

/// Field mask for the SetPosition payload: only the percent field is driven.
const POSITION_MASK_PERCENT: u16 = 0x0001;

/// Get/set selector carried by the shade-name opcode.
const SHADE_NAME_GET: u8 = 0;

/// Travel limit selected by a SetLimit command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[repr(u16)]
pub enum LimitType {
    #[strum(to_string = "upper")]
    Upper = 0,
    #[strum(to_string = "lower")]
    Lower = 1,
}

/// Every request the session or discovery layer can put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    GetSerial,
    JogUp,
    JogDown,
    JogStop,
    SetLimit(LimitType),
    GetStatus,
    SetPosition { percent: u8 },
    ClearLimits,
    StepUp,
    StepDown,
    GetDeviceName,
    GetShadeName,
}

impl Command {
    /// Build the wire frame for this command with the given sequence number.
    pub fn to_frame(self, sequence: u8) -> Frame {
        match self {
            Command::GetSerial => Frame::new(Opcode::GetSerial, sequence, 0, Bytes::new()),
            Command::JogUp => Frame::new(Opcode::JogUp, sequence, 0, Bytes::new()),
            Command::JogDown => Frame::new(Opcode::JogDown, sequence, 0, Bytes::new()),
            Command::JogStop => Frame::new(Opcode::JogStop, sequence, 0, Bytes::new()),
            Command::SetLimit(limit) => {
                let mut payload = BytesMut::with_capacity(2);
                payload.put_u16_le(limit as u16);
                Frame::new(Opcode::SetLimit, sequence, 0, payload.freeze())
            }
            Command::GetStatus => Frame::new(Opcode::GetStatus, sequence, 0, Bytes::new()),
            Command::SetPosition { percent } => {
                // mask:u16, percent:i16, tilt:i16, channel_mask:u32
                let mut payload = BytesMut::with_capacity(10);
                payload.put_u16_le(POSITION_MASK_PERCENT);
                payload.put_i16_le(percent as i16);
                payload.put_i16_le(0);
                payload.put_u32_le(0);
                Frame::new(Opcode::SetPosition, sequence, 0, payload.freeze())
            }
            Command::ClearLimits => Frame::new(Opcode::ClearLimits, sequence, 0, Bytes::new()),
            Command::StepUp => Frame::new(Opcode::StepUp, sequence, 0, Bytes::new()),
            Command::StepDown => Frame::new(Opcode::StepDown, sequence, 0, Bytes::new()),
            Command::GetDeviceName => Frame::new(Opcode::GetDeviceName, sequence, 0, Bytes::new()),
            Command::GetShadeName => Frame::new(
                Opcode::GetShadeName,
                sequence,
                0,
                Bytes::from_static(&[SHADE_NAME_GET]),
            ),
        }
    }
}

/// Wire layout of the first 30 bytes of a status reply payload.
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct StatusReportRaw {
    pub percent: I16,
    pub tilt: I16,
    pub memory: U16,
    pub battery_mv: U16,
    pub uptime: U32,
    pub cycles: U32,
    pub stalls: U32,
    pub temperature: I16,
    pub raw_percent: U32,
    pub raw_tilt: U32,
}

/// Decoded status reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub percent: i16,
    pub tilt: i16,
    pub memory: u16,
    pub battery_mv: u16,
    pub uptime: u32,
    pub cycles: u32,
    pub stalls: u32,
    pub temperature: i16,
    pub raw_percent: u32,
    pub raw_tilt: u32,
}

impl From<StatusReportRaw> for StatusReport {
    fn from(raw: StatusReportRaw) -> Self {
        StatusReport {
            percent: raw.percent.get(),
            tilt: raw.tilt.get(),
            memory: raw.memory.get(),
            battery_mv: raw.battery_mv.get(),
            uptime: raw.uptime.get(),
            cycles: raw.cycles.get(),
            stalls: raw.stalls.get(),
            temperature: raw.temperature.get(),
            raw_percent: raw.raw_percent.get(),
            raw_tilt: raw.raw_tilt.get(),
        }
    }
}

impl StatusReport {
    /// Reported percent-open clamped to the valid 0..=100 range.
    pub fn position(&self) -> u8 {
        self.percent.clamp(0, 100) as u8
    }
}

/// Decoded serial reply: model byte, 64-bit serial sent as two halves, and
/// the IPv4 address the device reports for itself (byte-reversed on wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialReply {
    pub model: u8,
    pub serial: u64,
    pub reported_ip: Ipv4Addr,
}

impl SerialReply {
    fn parse(payload: &[u8]) -> Result<Self, ShadeError> {
        if payload.len() < SERIAL_PAYLOAD_SIZE {
            return Err(ShadeError::Protocol(format!(
                "serial reply payload too short: {} bytes",
                payload.len()
            )));
        }
        let low = u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]) as u64;
        let high = u32::from_le_bytes([payload[8], payload[9], payload[10], payload[11]]) as u64;
        Ok(SerialReply {
            model: payload[0],
            serial: (high << 32) | low,
            reported_ip: Ipv4Addr::new(payload[19], payload[18], payload[17], payload[16]),
        })
    }
}

/// Extract a name from a 50-byte NUL-terminated ASCII field. Non-ASCII
/// bytes are dropped and surrounding whitespace trimmed.
fn parse_name_field(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    field[..end]
        .iter()
        .filter(|b| b.is_ascii())
        .map(|&b| b as char)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Every reply shape the layer understands; anything else passes through
/// as [`Reply::Other`] for the caller to inspect or drop.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Status(StatusReport),
    Serial(SerialReply),
    DeviceName(String),
    ShadeName(String),
    Other(Frame),
}

impl TryFrom<Frame> for Reply {
    type Error = ShadeError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        match frame.opcode {
            Opcode::GetStatus => {
                let payload = frame.payload.as_ref();
                if payload.len() < STATUS_PAYLOAD_SIZE {
                    return Err(ShadeError::Protocol(format!(
                        "status payload too short: {} bytes",
                        payload.len()
                    )));
                }
                let raw = StatusReportRaw::read_from_bytes(&payload[..STATUS_PAYLOAD_SIZE])
                    .map_err(|_| ShadeError::Protocol("unreadable status payload".into()))?;
                Ok(Reply::Status(raw.into()))
            }
            Opcode::GetSerial => Ok(Reply::Serial(SerialReply::parse(frame.payload.as_ref())?)),
            Opcode::GetDeviceName => {
                let payload = frame.payload.as_ref();
                if payload.len() < NAME_FIELD_SIZE {
                    return Err(ShadeError::Protocol(format!(
                        "device name payload too short: {} bytes",
                        payload.len()
                    )));
                }
                Ok(Reply::DeviceName(parse_name_field(
                    &payload[..NAME_FIELD_SIZE],
                )))
            }
            Opcode::GetShadeName => {
                // one get/set flag byte, then the name field
                let payload = frame.payload.as_ref();
                if payload.len() < 1 + NAME_FIELD_SIZE {
                    return Err(ShadeError::Protocol(format!(
                        "shade name payload too short: {} bytes",
                        payload.len()
                    )));
                }
                Ok(Reply::ShadeName(parse_name_field(
                    &payload[1..1 + NAME_FIELD_SIZE],
                )))
            }
            _ => Ok(Reply::Other(frame)),
        }
    }
}
