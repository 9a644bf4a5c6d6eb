//! Driver for the xArm six-servo controller board over a serial port, USB
//! HID or (with the `bluetooth` feature) BLE.
//!
//! ```no_run
//! use xarm_controller::{Controller, ControllerConfig, ServoSpec};
//!
//! # async fn run() -> xarm_controller::Result<()> {
//! let mut arm = Controller::open("USB", ControllerConfig::default()).await?;
//! println!("Battery: {:.2}V", arm.get_battery_voltage().await?);
//! arm.set_position(ServoSpec::angle(6, 45.0), 1000, true).await?;
//! arm.servo_off(None).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod constants;
mod controller;
mod error;
pub mod frame;
mod transport;
mod types;
pub mod units;

pub use config::{Address, ControllerConfig};
pub use controller::Controller;
pub use error::{Error, ProtocolError, Result, TransportError, ValidationError};
pub use frame::{Command, Frame};
pub use transport::{Link, SerialTransport, Transport};
pub use types::{Servo, ServoSpec, ServoState, Target};

#[cfg(feature = "hid")]
pub use transport::HidTransport;

#[cfg(feature = "bluetooth")]
pub use transport::BluetoothTransport;

// Re-export commonly used items
pub use constants::{MAX_PAYLOAD, PRODUCT_ID, VENDOR_ID};
