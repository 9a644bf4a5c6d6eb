use strum::IntoEnumIterator;
use xarm_controller::frame::{decode, encode, Command};
use xarm_controller::{ProtocolError, MAX_PAYLOAD};

#[test]
fn test_round_trip_every_command_and_length() {
    for command in Command::iter() {
        for len in 0..=MAX_PAYLOAD {
            let payload: Vec<u8> = (0..len).map(|i| (i * 7 + command.opcode() as usize) as u8).collect();
            let bytes = encode(command, &payload);
            assert_eq!(bytes.len(), 4 + len);
            assert_eq!(bytes[2] as usize, len + 2);
            assert_eq!(decode(&bytes, command).unwrap(), payload);
        }
    }
}

#[test]
fn test_reply_to_other_command_is_malformed() {
    for sent in Command::iter() {
        let bytes = encode(sent, &[1, 2, 3]);
        for expected in Command::iter().filter(|&c| c != sent) {
            assert!(matches!(decode(&bytes, expected), Err(ProtocolError::Malformed(_))));
        }
    }
}

#[test]
fn test_bad_signature_is_malformed() {
    for first in [0x00u8, 0x54, 0x55, 0xaa, 0xff] {
        for second in [0x00u8, 0x54, 0x55, 0xaa, 0xff] {
            if first == 0x55 && second == 0x55 {
                continue;
            }
            let bytes = [first, second, 0x02, Command::Stop.opcode()];
            assert!(matches!(decode(&bytes, Command::Stop), Err(ProtocolError::Malformed(_))));
        }
    }
}

#[test]
fn test_truncated_frame_is_malformed() {
    let bytes = encode(Command::GetPosition, &[1, 3, 0x64, 0x00]);
    for cut in 0..bytes.len() {
        assert!(decode(&bytes[..cut], Command::GetPosition).is_err());
    }
}
