use crate::frame::Command;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for every controller operation.
#[derive(Debug, Error)]
pub enum Error {
    /// The connection address could not be mapped to a transport.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Caller input that violates a precondition. Always raised before any
/// bytes reach the device.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Position {0} must be between 0 and 1000")]
    PositionRange(i32),

    #[error("Angle {0} must be between -125.0 and 125.0 degrees")]
    AngleRange(f32),

    #[error("Invalid servo specification: {0}")]
    BadSpec(String),

    /// The id write command reaches every attached servo.
    #[error("{0} servos are connected; pass overwrite_all to write the same id to all of them")]
    AmbiguousTarget(usize),

    #[error("No servos to update their id")]
    NoServos,

    #[error("Servo id 0 is reserved")]
    ZeroId,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[cfg(feature = "hid")]
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    #[cfg(feature = "bluetooth")]
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    #[error("No device found: {0}")]
    DeviceNotFound(String),

    /// The blocking I/O task panicked or was cancelled.
    #[error("Blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    Malformed(String),

    #[error("No response to command {0}")]
    NoResponse(Command),
}

impl Error {
    /// Whether the error came from the device not answering properly,
    /// as opposed to bad input or a broken channel.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }
}
