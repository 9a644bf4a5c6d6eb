use crate::constants::*;
use crate::error::Error;
use std::str::FromStr;
use std::time::Duration;

/// Where the controller is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// Serial port name, e.g. `COM3` or `/dev/ttyUSB0`.
    Serial(String),
    /// USB HID device by vendor/product id, optionally narrowed to one serial number.
    Usb { serial_number: Option<String> },
    Bluetooth,
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("COM") || s.starts_with("/dev/") {
            Ok(Address::Serial(s.to_string()))
        } else if let Some(serial) = s.strip_prefix("USB") {
            let serial = serial.trim_start_matches(':');
            Ok(Address::Usb {
                serial_number: (!serial.is_empty()).then(|| serial.to_string()),
            })
        } else if s == "BLE" {
            Ok(Address::Bluetooth)
        } else {
            Err(Error::Configuration(format!(
                "unrecognized address '{}', expected COM*, /dev/*, USB[serial] or BLE",
                s
            )))
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub baud_rate: u32,
    pub serial_timeout: Duration,
    pub hid_timeout_ms: i32,
    pub hid_report_size: usize,
    /// Platform device path; takes precedence over vendor/product lookup.
    pub hid_path: Option<String>,
    pub battery_attempts: u32,
    pub battery_retry_interval: Duration,
    pub max_servo_id: u8,
    pub scan_timeout: Duration,
    /// Log every frame at debug level instead of trace.
    pub debug: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            baud_rate: SERIAL_BAUD_RATE,
            serial_timeout: Duration::from_millis(SERIAL_TIMEOUT_MS),
            hid_timeout_ms: HID_TIMEOUT_MS,
            hid_report_size: HID_REPORT_SIZE,
            hid_path: None,
            battery_attempts: BATTERY_ATTEMPTS,
            battery_retry_interval: Duration::from_millis(BATTERY_RETRY_MS),
            max_servo_id: DEFAULT_MAX_SERVO_ID,
            scan_timeout: Duration::from_secs(5),
            debug: false,
        }
    }
}

impl ControllerConfig {
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn hid_path(mut self, path: impl Into<String>) -> Self {
        self.hid_path = Some(path.into());
        self
    }
}
