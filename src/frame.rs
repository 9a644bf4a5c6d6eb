//! Wire frame shared by every transport.
//!
//! ```text
//! byte0: 0x55           signature
//! byte1: 0x55           signature
//! byte2: payload_len+2
//! byte3: command id
//! byte4..: payload
//! ```

use crate::constants::{HEADER_LEN, MAX_PAYLOAD, SIGNATURE};
use crate::error::ProtocolError;
use std::fmt;
use strum_macros::{EnumIter, FromRepr};

#[repr(u8)]
#[derive(Debug, EnumIter, FromRepr, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Command {
    Move = 0x03,
    GetBatteryVoltage = 0x0f,
    Stop = 0x14,
    GetPosition = 0x15,
    WriteId = 0x1b,
}

impl Command {
    pub fn opcode(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (0x{:02x})", self, self.opcode())
    }
}

/// A single frame, built per call and dropped once written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(command: Command, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD);
        Frame { command, payload }
    }

    pub fn encode(&self) -> Vec<u8> {
        encode(self.command, &self.payload)
    }
}

/// Serializes `payload` behind the fixed header.
pub fn encode(command: Command, payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= MAX_PAYLOAD);
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
    bytes.extend_from_slice(&[SIGNATURE, SIGNATURE, (payload.len() + 2) as u8, command.opcode()]);
    bytes.extend_from_slice(payload);
    bytes
}

/// Number of payload bytes announced by a header, once it has been checked
/// against the expected command.
pub fn payload_len(header: &[u8], expected: Command) -> Result<usize, ProtocolError> {
    if header.len() < HEADER_LEN {
        return Err(ProtocolError::Malformed(format!(
            "expected a {}-byte header, got {} bytes",
            HEADER_LEN,
            header.len()
        )));
    }
    if header[0] != SIGNATURE || header[1] != SIGNATURE {
        return Err(ProtocolError::Malformed(format!(
            "invalid signature: {:02x} {:02x}",
            header[0], header[1]
        )));
    }
    if header[3] != expected.opcode() {
        return Err(ProtocolError::Malformed(format!(
            "expected reply to {}, got command 0x{:02x}",
            expected, header[3]
        )));
    }
    let length = header[2] as usize;
    if length < 2 {
        return Err(ProtocolError::Malformed(format!("invalid length byte {}", length)));
    }
    Ok(length - 2)
}

/// Extracts the payload of a reply to `expected`. Bytes past the declared
/// frame length (HID report padding) are ignored.
pub fn decode(raw: &[u8], expected: Command) -> Result<Vec<u8>, ProtocolError> {
    let len = payload_len(raw, expected)?;
    let end = HEADER_LEN + len;
    if raw.len() < end {
        return Err(ProtocolError::Malformed(format!(
            "frame declares {} payload bytes but only {} arrived",
            len,
            raw.len() - HEADER_LEN
        )));
    }
    Ok(raw[HEADER_LEN..end].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_battery_query() {
        assert_eq!(encode(Command::GetBatteryVoltage, &[]), vec![0x55, 0x55, 0x02, 0x0f]);
    }

    #[test]
    fn test_encode_move() {
        let frame = Frame::new(Command::Move, vec![1, 0xe8, 0x03, 2, 0xf4, 0x01]);
        assert_eq!(
            frame.encode(),
            vec![0x55, 0x55, 0x08, 0x03, 1, 0xe8, 0x03, 2, 0xf4, 0x01]
        );
    }

    #[test]
    fn test_decode_ignores_report_padding() {
        let mut report = vec![0x55, 0x55, 0x04, 0x0f, 0x10, 0x1f];
        report.resize(64, 0);
        assert_eq!(decode(&report, Command::GetBatteryVoltage).unwrap(), vec![0x10, 0x1f]);
    }

    #[test]
    fn test_decode_rejects_bad_signature() {
        let err = decode(&[0x55, 0x54, 0x02, 0x0f], Command::GetBatteryVoltage).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn test_decode_rejects_wrong_command() {
        let err = decode(&[0x55, 0x55, 0x02, 0x14], Command::GetBatteryVoltage).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        let err = decode(&[0x55, 0x55, 0x05, 0x15, 1, 2], Command::GetPosition).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
        assert!(decode(&[0x55, 0x55], Command::GetPosition).is_err());
    }

    #[test]
    fn test_decode_rejects_short_length_byte() {
        assert!(decode(&[0x55, 0x55, 0x01, 0x15], Command::GetPosition).is_err());
    }

    #[test]
    fn test_command_from_repr() {
        assert_eq!(Command::from_repr(0x1b), Some(Command::WriteId));
        assert_eq!(Command::from_repr(0x00), None);
    }
}
