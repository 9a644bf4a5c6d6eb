use crate::config::{Address, ControllerConfig};
use crate::constants::*;
use crate::error::{Error, TransportError};
use parking_lot::Mutex;
use serialport::{ClearBuffer, SerialPort};
use std::io::{self, Read, Write};
use std::sync::Arc;
use tracing::info;

#[cfg(feature = "hid")]
use hidapi::{HidApi, HidDevice};

#[cfg(feature = "bluetooth")]
use {
    btleplug::api::{
        Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _,
        ScanFilter, ValueNotification, WriteType,
    },
    btleplug::platform::{Manager, Peripheral},
    futures::stream::{Stream, StreamExt},
    std::pin::Pin,
    std::time::Duration,
    uuid::Uuid,
};

/// A channel that moves whole frames to and from the controller.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Writes one encoded frame.
    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    /// Reads one raw frame, header included. `Ok(None)` means nothing
    /// arrived before the read timeout.
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}

/// Reads up to `len` bytes, stopping early on timeout or end of stream.
fn read_up_to<R: Read + ?Sized>(port: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        match port.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    buf.truncate(filled);
    Ok(buf)
}

/// Reads the 4-byte header, then the payload it announces. A header that
/// does not carry the signature is returned as-is for the codec to reject.
/// A short payload is returned short; the codec reports it as malformed.
pub(crate) fn read_serial_frame<R: Read + ?Sized>(port: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut frame = read_up_to(port, HEADER_LEN)?;
    if frame.len() < HEADER_LEN {
        return Ok(None);
    }
    if frame[0] != SIGNATURE || frame[1] != SIGNATURE || frame[2] < 2 {
        return Ok(Some(frame));
    }
    let payload = read_up_to(port, frame[2] as usize - 2)?;
    frame.extend_from_slice(&payload);
    Ok(Some(frame))
}

/// Prefixes the report id and pads to a full output report.
pub(crate) fn hid_report(frame: &[u8], report_size: usize) -> Vec<u8> {
    let mut report = Vec::with_capacity(report_size + 1);
    report.push(HID_REPORT_ID);
    report.extend_from_slice(frame);
    if report.len() < report_size + 1 {
        report.resize(report_size + 1, 0);
    }
    report
}

/// The frame inside an input report, or `None` when the report is too short
/// to hold even a header.
pub(crate) fn hid_frame(report: &[u8], read: usize) -> Option<Vec<u8>> {
    if read < HEADER_LEN {
        return None;
    }
    Some(report[..read.min(report.len())].to_vec())
}

pub struct SerialTransport {
    port: Arc<Mutex<Box<dyn SerialPort>>>,
}

impl SerialTransport {
    pub async fn open(path: &str, config: &ControllerConfig) -> Result<Self, TransportError> {
        let builder = serialport::new(path, config.baud_rate).timeout(config.serial_timeout);
        let port = tokio::task::spawn_blocking(move || builder.open()).await??;
        info!("Connected via serial port {} at {} baud", path, config.baud_rate);
        Ok(SerialTransport {
            port: Arc::new(Mutex::new(port)),
        })
    }
}

impl Transport for SerialTransport {
    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let port = Arc::clone(&self.port);
        let frame = frame.to_vec();
        tokio::task::spawn_blocking(move || -> Result<(), TransportError> {
            let mut port = port.lock();
            port.clear(ClearBuffer::Input)?;
            port.write_all(&frame)?;
            port.flush()?;
            Ok(())
        })
        .await?
    }

    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let port = Arc::clone(&self.port);
        let frame = tokio::task::spawn_blocking(move || {
            let mut port = port.lock();
            read_serial_frame(&mut *port)
        })
        .await??;
        Ok(frame)
    }
}

#[cfg(feature = "hid")]
pub struct HidTransport {
    device: Arc<Mutex<HidDevice>>,
    timeout_ms: i32,
    report_size: usize,
}

#[cfg(feature = "hid")]
impl HidTransport {
    /// Opens by serial number if given, else by configured device path,
    /// else the first device matching the vendor/product id.
    pub async fn open(serial_number: Option<&str>, config: &ControllerConfig) -> Result<Self, TransportError> {
        let serial_number = serial_number.map(str::to_string);
        let path = config.hid_path.clone();
        let device = tokio::task::spawn_blocking(move || -> Result<HidDevice, TransportError> {
            let api = HidApi::new()?;
            let device = match (serial_number, path) {
                (Some(serial), _) => api.open_serial(VENDOR_ID, PRODUCT_ID, &serial)?,
                (None, Some(path)) => {
                    let path = std::ffi::CString::new(path)
                        .map_err(|e| TransportError::DeviceNotFound(e.to_string()))?;
                    api.open_path(&path)?
                }
                (None, None) => api.open(VENDOR_ID, PRODUCT_ID)?,
            };
            Ok(device)
        })
        .await??;

        if let Ok(Some(serial)) = device.get_serial_number_string() {
            info!("Connected via USB HID, serial number {}", serial);
        } else {
            info!("Connected via USB HID");
        }

        Ok(HidTransport {
            device: Arc::new(Mutex::new(device)),
            timeout_ms: config.hid_timeout_ms,
            report_size: config.hid_report_size,
        })
    }
}

#[cfg(feature = "hid")]
impl Transport for HidTransport {
    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let device = Arc::clone(&self.device);
        let report = hid_report(frame, self.report_size);
        tokio::task::spawn_blocking(move || device.lock().write(&report)).await??;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let device = Arc::clone(&self.device);
        let (timeout_ms, report_size) = (self.timeout_ms, self.report_size);
        let (report, read) = tokio::task::spawn_blocking(move || -> Result<(Vec<u8>, usize), TransportError> {
            let mut buf = vec![0u8; report_size];
            let read = device.lock().read_timeout(&mut buf, timeout_ms)?;
            Ok((buf, read))
        })
        .await??;
        Ok(hid_frame(&report, read))
    }
}

#[cfg(feature = "bluetooth")]
const SERVICE_UUID: Uuid = Uuid::from_u128(0x0000ffe000001000800000805f9b34fb);
#[cfg(feature = "bluetooth")]
const CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x0000ffe100001000800000805f9b34fb);
#[cfg(feature = "bluetooth")]
const DEVICE_NAME: &str = "xArm";

#[cfg(feature = "bluetooth")]
pub struct BluetoothTransport {
    device: Peripheral,
    characteristic: Characteristic,
    notifications: Option<Pin<Box<dyn Stream<Item = ValueNotification> + Send>>>,
    timeout: Duration,
}

#[cfg(feature = "bluetooth")]
impl BluetoothTransport {
    pub async fn open(config: &ControllerConfig) -> Result<Self, TransportError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::DeviceNotFound("no Bluetooth adapter".into()))?;

        adapter.start_scan(ScanFilter::default()).await?;
        let mut events = adapter.events().await?;
        info!("Scanning for {}...", DEVICE_NAME);

        let mut found = None;
        while let Ok(Some(event)) = tokio::time::timeout(config.scan_timeout, events.next()).await {
            if let CentralEvent::DeviceDiscovered(id) = event {
                let peripheral = adapter.peripheral(&id).await?;
                if let Ok(Some(properties)) = peripheral.properties().await {
                    if properties.local_name.as_deref() == Some(DEVICE_NAME) {
                        found = Some(peripheral);
                        break;
                    }
                }
            }
        }
        adapter.stop_scan().await?;

        let device = found.ok_or_else(|| TransportError::DeviceNotFound(DEVICE_NAME.into()))?;
        device.connect().await?;
        device.discover_services().await?;

        let characteristic = device
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == CHARACTERISTIC_UUID && c.service_uuid == SERVICE_UUID)
            .ok_or_else(|| TransportError::DeviceNotFound("communication characteristic".into()))?;

        let notifications = if characteristic.properties.contains(CharPropFlags::NOTIFY) {
            device.subscribe(&characteristic).await?;
            Some(device.notifications().await?)
        } else {
            None
        };

        info!("Connected via Bluetooth");
        Ok(BluetoothTransport {
            device,
            characteristic,
            notifications,
            timeout: config.serial_timeout,
        })
    }
}

#[cfg(feature = "bluetooth")]
impl Transport for BluetoothTransport {
    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.device
            .write(&self.characteristic, frame, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let buf = match self.notifications.as_mut() {
            Some(notifications) => match tokio::time::timeout(self.timeout, notifications.next()).await {
                Ok(Some(notification)) => notification.value,
                _ => return Ok(None),
            },
            None => self.device.read(&self.characteristic).await?,
        };
        Ok((buf.len() >= HEADER_LEN).then_some(buf))
    }
}

/// Whichever physical channel the controller was opened on.
pub enum Link {
    Serial(SerialTransport),
    #[cfg(feature = "hid")]
    Hid(HidTransport),
    #[cfg(feature = "bluetooth")]
    Bluetooth(BluetoothTransport),
}

impl Link {
    pub async fn open(address: &Address, config: &ControllerConfig) -> Result<Self, Error> {
        match address {
            Address::Serial(path) => Ok(Link::Serial(SerialTransport::open(path, config).await?)),
            #[cfg(feature = "hid")]
            Address::Usb { serial_number } => Ok(Link::Hid(
                HidTransport::open(serial_number.as_deref(), config).await?,
            )),
            #[cfg(not(feature = "hid"))]
            Address::Usb { .. } => Err(Error::Configuration(
                "USB addresses need the `hid` feature".into(),
            )),
            #[cfg(feature = "bluetooth")]
            Address::Bluetooth => Ok(Link::Bluetooth(BluetoothTransport::open(config).await?)),
            #[cfg(not(feature = "bluetooth"))]
            Address::Bluetooth => Err(Error::Configuration(
                "BLE addresses need the `bluetooth` feature".into(),
            )),
        }
    }
}

impl Transport for Link {
    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        match self {
            Link::Serial(transport) => transport.write_frame(frame).await,
            #[cfg(feature = "hid")]
            Link::Hid(transport) => transport.write_frame(frame).await,
            #[cfg(feature = "bluetooth")]
            Link::Bluetooth(transport) => transport.write_frame(frame).await,
        }
    }

    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        match self {
            Link::Serial(transport) => transport.read_frame().await,
            #[cfg(feature = "hid")]
            Link::Hid(transport) => transport.read_frame().await,
            #[cfg(feature = "bluetooth")]
            Link::Bluetooth(transport) => transport.read_frame().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_serial_reads_announced_payload() {
        let mut port = Cursor::new(vec![0x55, 0x55, 0x04, 0x0f, 0x10, 0x1f, 0xaa]);
        let frame = read_serial_frame(&mut port).unwrap().unwrap();
        assert_eq!(frame, vec![0x55, 0x55, 0x04, 0x0f, 0x10, 0x1f]);
    }

    #[test]
    fn test_serial_short_header_is_no_response() {
        let mut port = Cursor::new(vec![0x55, 0x55]);
        assert_eq!(read_serial_frame(&mut port).unwrap(), None);
    }

    #[test]
    fn test_serial_short_payload_is_returned_short() {
        let mut port = Cursor::new(vec![0x55, 0x55, 0x05, 0x15, 0x01]);
        let frame = read_serial_frame(&mut port).unwrap().unwrap();
        assert_eq!(frame.len(), 5);
        assert!(crate::frame::decode(&frame, crate::frame::Command::GetPosition).is_err());
    }

    #[test]
    fn test_serial_bad_signature_stops_after_header() {
        let mut port = Cursor::new(vec![0xff, 0x55, 0x04, 0x0f, 0x10, 0x1f]);
        let frame = read_serial_frame(&mut port).unwrap().unwrap();
        assert_eq!(frame, vec![0xff, 0x55, 0x04, 0x0f]);
    }

    #[test]
    fn test_hid_report_prefixes_report_id() {
        let report = hid_report(&[0x55, 0x55, 0x02, 0x0f], 64);
        assert_eq!(report.len(), 65);
        assert_eq!(&report[..5], &[0x00, 0x55, 0x55, 0x02, 0x0f]);
        assert!(report[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_hid_short_report_is_no_response() {
        let report = [0x55, 0x55, 0x02, 0x0f];
        assert_eq!(hid_frame(&report, 3), None);
        assert_eq!(hid_frame(&report, 0), None);
        assert_eq!(hid_frame(&report, 4), Some(report.to_vec()));
    }
}
