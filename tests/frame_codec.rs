//! Frame encode/decode against captured wire bytes

mod common;

use common::*;

#[test]
fn encode_get_status_request() {
    let frame = Command::GetStatus.to_frame(1);
    let bytes: Bytes = frame.into();
    assert_eq!(hex::encode(&bytes), GET_STATUS_REQUEST);
}

#[test]
fn encode_get_serial_request() {
    let bytes: Bytes = Command::GetSerial.to_frame(1).into();
    assert_eq!(hex::encode(&bytes), GET_SERIAL_REQUEST);
}

#[test]
fn encode_shade_name_request_carries_get_flag() {
    let bytes: Bytes = Command::GetShadeName.to_frame(1).into();
    assert_eq!(hex::encode(&bytes), GET_SHADE_NAME_REQUEST);
}

#[test]
fn encode_set_position_request() {
    let bytes: Bytes = Command::SetPosition { percent: 50 }.to_frame(1).into();
    assert_eq!(hex::encode(&bytes), SET_POSITION_50_REQUEST);
}

#[test]
fn encode_set_limit_request() {
    let bytes: Bytes = Command::SetLimit(LimitType::Lower).to_frame(3).into();
    assert_eq!(hex::encode(&bytes), SET_LIMIT_LOWER_REQUEST);
}

#[test]
fn decode_request_round_trip() {
    let commands = [
        Command::GetSerial,
        Command::JogUp,
        Command::JogDown,
        Command::JogStop,
        Command::SetLimit(LimitType::Upper),
        Command::GetStatus,
        Command::SetPosition { percent: 73 },
        Command::ClearLimits,
        Command::StepUp,
        Command::StepDown,
        Command::GetDeviceName,
        Command::GetShadeName,
    ];
    for (i, command) in commands.into_iter().enumerate() {
        let frame = command.to_frame(i as u8);
        let encoded: Bytes = frame.clone().into();
        let decoded = Frame::try_from(encoded).expect("decode failed");
        assert_eq!(decoded, frame, "{command:?} did not survive a round trip");
    }
}

#[test]
fn decode_keeps_received_crc_unverified() {
    // corrupt the CRC field; decode must still succeed and carry it as-is
    let mut bytes = hex::decode(GET_STATUS_REQUEST).unwrap();
    bytes[2] = 0xDE;
    bytes[3] = 0xAD;
    let frame = Frame::try_from(Bytes::from(bytes)).expect("decode failed");
    assert_eq!(frame.crc, 0xADDE);
    assert_ne!(frame.crc, frame.compute_crc());
}

#[test]
fn decode_rejects_short_header() {
    for len in 0..8 {
        let bytes = Bytes::from(vec![0u8; len]);
        match Frame::try_from(bytes) {
            Err(ShadeError::Malformed(got)) => assert_eq!(got, len),
            other => panic!("{len}-byte input: expected Malformed, got {other:?}"),
        }
    }
}

#[test]
fn decode_rejects_truncated_payload() {
    // header announces 30 payload bytes but only 4 follow
    let mut bytes = vec![30, 0, 0, 0, 0x1D, 0x01, 0x00, 0x00];
    bytes.extend_from_slice(&[1, 2, 3, 4]);
    match Frame::try_from(Bytes::from(bytes)) {
        Err(ShadeError::Truncated { expected, actual }) => {
            assert_eq!(expected, 30);
            assert_eq!(actual, 4);
        }
        other => panic!("expected Truncated, got {other:?}"),
    }
}

#[test]
fn decode_ignores_trailing_bytes() {
    let mut bytes = hex::decode(GET_STATUS_REQUEST).unwrap();
    bytes.extend_from_slice(&[0xFF, 0xFF, 0xFF]);
    let frame = Frame::try_from(Bytes::from(bytes)).expect("decode failed");
    assert_eq!(frame.opcode, Opcode::GetStatus);
    assert!(frame.payload.is_empty());
}

#[test]
fn unknown_opcodes_are_preserved() {
    let bytes = Bytes::from(vec![0, 0, 0, 0, 0x77, 0x01, 0x00, 0x00]);
    let frame = Frame::try_from(bytes).expect("decode failed");
    assert_eq!(frame.opcode, Opcode::Unknown(0x77));
    let value: u8 = frame.opcode.into();
    assert_eq!(value, 0x77);
}

#[test]
fn sequence_counter_wraps_to_zero() {
    let mut counter = SequenceCounter::new();
    let first = counter.next();
    assert_eq!(first, 1);
    for _ in 0..255 {
        counter.next();
    }
    assert_eq!(counter.current(), 0);
    assert_eq!(counter.next(), 1);
}
