pub const VENDOR_ID: u16 = 0x0483;
pub const PRODUCT_ID: u16 = 0x5750;
pub const SIGNATURE: u8 = 0x55;

// Frame layout
pub const HEADER_LEN: usize = 4;
pub const MAX_PAYLOAD: usize = 250;
pub const HID_REPORT_ID: u8 = 0x00;
pub const HID_REPORT_SIZE: usize = 64;

// Servo movement constants
pub const MIN_ANGLE: f32 = -125.0;
pub const MAX_ANGLE: f32 = 125.0;
pub const MIN_POSITION: i32 = 0;
pub const MAX_POSITION: i32 = 1000;

// Connection defaults
pub const SERIAL_BAUD_RATE: u32 = 9600;
pub const SERIAL_TIMEOUT_MS: u64 = 1000;
pub const HID_TIMEOUT_MS: i32 = 50;

// Polling
pub const BATTERY_ATTEMPTS: u32 = 5;
pub const BATTERY_RETRY_MS: u64 = 1000;
pub const DEFAULT_MAX_SERVO_ID: u8 = 6;
