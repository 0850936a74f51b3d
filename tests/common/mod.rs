//! Shared test utilities and captured reference frames

// Not every test file uses every helper here.
#[allow(unused_imports)]
pub use bytes::Bytes;
#[allow(unused_imports)]
pub use powershades_rs::crc::crc16_xmodem;
#[allow(unused_imports)]
pub use powershades_rs::error::ShadeError;
#[allow(unused_imports)]
pub use powershades_rs::message::{Command, LimitType, Reply, StatusReport};
#[allow(unused_imports)]
pub use powershades_rs::packet::{Frame, Opcode, SequenceCounter};

/// Decode a hex string into bytes for testing.
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("failed to decode hex"))
}

/// GetStatus request, sequence 1.
#[allow(dead_code)]
pub const GET_STATUS_REQUEST: &str = "000011151d010000";

/// GetSerial request, sequence 1 (the discovery probe).
#[allow(dead_code)]
pub const GET_SERIAL_REQUEST: &str = "0000303700010000";

/// GetShadeName request, sequence 1, with its one-byte get flag.
#[allow(dead_code)]
pub const GET_SHADE_NAME_REQUEST: &str = "01005cf33401000000";

/// SetPosition to 50%, sequence 1.
#[allow(dead_code)]
pub const SET_POSITION_50_REQUEST: &str = "0a0002381a01000001003200000000000000";

/// SetLimit lower, sequence 3.
#[allow(dead_code)]
pub const SET_LIMIT_LOWER_REQUEST: &str = "02004398010300000100";

/// Status reply, sequence 9: percent 42, tilt 0, battery 3700 mV,
/// uptime 1000, cycles 5, stalls 0, temperature 21, raw percent 42000.
#[allow(dead_code)]
pub const STATUS_REPLY_30: &str =
    "1e00daf51d0900002a0000000000740ee80300000500000000000000150010a4000000000000";

/// The same status reply padded the way real devices send it (40-byte
/// payload, trailing bytes undefined).
#[allow(dead_code)]
pub const STATUS_REPLY_40: &str =
    "2800472f1d0900002a0000000000740ee80300000500000000000000150010a4000000000000aaaaaaaaaaaaaaaaaaaa";

/// Serial reply: model 7, serial 0x1_1234_5678, reported IP 192.168.1.42
/// (byte-reversed on the wire).
#[allow(dead_code)]
pub const SERIAL_REPLY: &str = "14009dbb00010000070000007856341201000000000000002a01a8c0";

/// Device name reply carrying "Living Room" in a NUL-padded 50-byte field.
#[allow(dead_code)]
pub const DEVICE_NAME_REPLY: &str = "3200d4213a0100004c6976696e6720526f6f6d000000000000000000000000000000000000000000000000000000000000000000000000000000";

/// Shade name reply: get/set flag byte, then the same name field.
#[allow(dead_code)]
pub const SHADE_NAME_REPLY: &str = "3300154134010000004c6976696e6720526f6f6d000000000000000000000000000000000000000000000000000000000000000000000000000000";

/// Build a 30-byte status payload with the given percent and battery.
#[allow(dead_code)]
pub fn status_payload(percent: i16, battery_mv: u16) -> Bytes {
    let mut payload = Vec::with_capacity(30);
    payload.extend_from_slice(&percent.to_le_bytes());
    payload.extend_from_slice(&0i16.to_le_bytes()); // tilt
    payload.extend_from_slice(&0u16.to_le_bytes()); // memory
    payload.extend_from_slice(&battery_mv.to_le_bytes());
    payload.extend_from_slice(&0u32.to_le_bytes()); // uptime
    payload.extend_from_slice(&0u32.to_le_bytes()); // cycles
    payload.extend_from_slice(&0u32.to_le_bytes()); // stalls
    payload.extend_from_slice(&0i16.to_le_bytes()); // temperature
    payload.extend_from_slice(&0u32.to_le_bytes()); // raw percent
    payload.extend_from_slice(&0u32.to_le_bytes()); // raw tilt
    Bytes::from(payload)
}

/// Build an encoded status reply frame.
#[allow(dead_code)]
pub fn status_reply(sequence: u8, percent: i16, battery_mv: u16) -> Bytes {
    Frame::new(
        Opcode::GetStatus,
        sequence,
        0,
        status_payload(percent, battery_mv),
    )
    .into()
}

/// Build a 20-byte serial reply payload.
#[allow(dead_code)]
pub fn serial_payload(model: u8, serial: u64, ip: [u8; 4]) -> Bytes {
    let mut payload = vec![0u8; 20];
    payload[0] = model;
    payload[4..8].copy_from_slice(&(serial as u32).to_le_bytes());
    payload[8..12].copy_from_slice(&((serial >> 32) as u32).to_le_bytes());
    // reported address is byte-reversed on the wire
    payload[16..20].copy_from_slice(&[ip[3], ip[2], ip[1], ip[0]]);
    Bytes::from(payload)
}
