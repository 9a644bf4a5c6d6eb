use crate::{
    config::{Address, ControllerConfig},
    constants::MAX_PAYLOAD,
    error::{Error, ProtocolError, Result, ValidationError},
    frame::{self, Command, Frame},
    transport::{Link, Transport},
    types::{Servo, ServoSpec, ServoState},
    units::position_to_angle,
};
use strum::IntoEnumIterator;
use tokio::time::{sleep, Duration};
use tracing::{debug, trace, warn};

/// Session with one arm controller. Owns the transport exclusively and
/// issues one request at a time.
pub struct Controller<T = Link> {
    transport: T,
    config: ControllerConfig,
    /// Ids found by the last discovery; empty until `list_servos` runs.
    servos: Vec<u8>,
}

impl Controller<Link> {
    /// Opens the transport named by `address` (`COM3`, `/dev/ttyUSB0`,
    /// `USB`, `USB<serial>`, `BLE`).
    pub async fn open(address: &str, config: ControllerConfig) -> Result<Self> {
        let address: Address = address.parse()?;
        let transport = Link::open(&address, &config).await?;
        Ok(Controller::with_transport(transport, config))
    }
}

impl<T: Transport> Controller<T> {
    pub fn with_transport(transport: T, config: ControllerConfig) -> Self {
        Controller {
            transport,
            config,
            servos: Vec::new(),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Servo ids found by the last discovery.
    pub fn servos(&self) -> &[u8] {
        &self.servos
    }

    pub fn forget_servos(&mut self) {
        self.servos.clear();
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn log_frame(&self, direction: &str, command: Command, bytes: &[u8]) {
        if self.config.debug {
            debug!(%command, "{} {:02x?}", direction, bytes);
        } else {
            trace!(%command, "{} {:02x?}", direction, bytes);
        }
    }

    async fn send(&mut self, command: Command, payload: &[u8]) -> Result<()> {
        let bytes = Frame::new(command, payload.to_vec()).encode();
        self.log_frame("Tx", command, &bytes);
        self.transport.write_frame(&bytes).await?;
        Ok(())
    }

    async fn recv(&mut self, command: Command) -> Result<Vec<u8>> {
        let raw = match self.transport.read_frame().await? {
            Some(raw) => raw,
            None => {
                self.log_frame("Rx (none)", command, &[]);
                return Err(ProtocolError::NoResponse(command).into());
            }
        };
        self.log_frame("Rx", command, &raw);
        Ok(frame::decode(&raw, command)?)
    }

    async fn request(&mut self, command: Command, payload: &[u8]) -> Result<Vec<u8>> {
        self.send(command, payload).await?;
        self.recv(command).await
    }

    /// Moves one or more servos over `duration_ms`. With `wait`, sleeps for
    /// the duration afterwards; the device never confirms completion.
    pub async fn set_position(
        &mut self,
        servos: impl Into<ServoSpec>,
        duration_ms: u16,
        wait: bool,
    ) -> Result<()> {
        let moves = servos.into().moves()?;
        check_count(moves.len(), 3, 3)?;

        let mut data = Vec::with_capacity(3 + 3 * moves.len());
        data.push(moves.len() as u8);
        data.extend_from_slice(&duration_ms.to_le_bytes());
        for (id, position) in moves {
            data.push(id);
            data.extend_from_slice(&position.to_le_bytes());
        }

        self.send(Command::Move, &data).await?;

        if wait {
            sleep(Duration::from_millis(duration_ms as u64)).await;
        }
        Ok(())
    }

    /// Raw positions for `ids`, in request order.
    async fn query_positions(&mut self, ids: &[u8]) -> Result<Vec<u16>> {
        check_count(ids.len(), 1, 1)?;
        let mut data = Vec::with_capacity(1 + ids.len());
        data.push(ids.len() as u8);
        data.extend_from_slice(ids);

        let reply = self.request(Command::GetPosition, &data).await?;
        parse_positions(&reply, ids).map_err(Into::into)
    }

    pub async fn get_position(&mut self, id: u8) -> Result<u16> {
        let positions = self.query_positions(&[id]).await?;
        positions
            .first()
            .copied()
            .ok_or_else(|| ProtocolError::NoResponse(Command::GetPosition).into())
    }

    pub async fn get_angle(&mut self, id: u8) -> Result<f32> {
        Ok(position_to_angle(self.get_position(id).await?))
    }

    /// Refreshes `servos[i].position` for every entry in one round trip.
    pub async fn get_positions(&mut self, servos: &mut [ServoState]) -> Result<()> {
        if servos.is_empty() {
            return Ok(());
        }
        let ids: Vec<u8> = servos.iter().map(|servo| servo.id).collect();
        let positions = self.query_positions(&ids).await?;
        for (servo, position) in servos.iter_mut().zip(positions) {
            servo.position = position;
        }
        Ok(())
    }

    /// Positions for every id in `servos`; any targets they carry are ignored.
    pub async fn read_positions(&mut self, servos: impl Into<ServoSpec>) -> Result<Vec<ServoState>> {
        let mut states: Vec<ServoState> = servos.into().ids()?.into_iter().map(ServoState::new).collect();
        self.get_positions(&mut states).await?;
        Ok(states)
    }

    /// Releases torque. `None` addresses ids 1 through 6.
    pub async fn servo_off(&mut self, servos: impl Into<Option<ServoSpec>>) -> Result<()> {
        let ids = match servos.into() {
            Some(spec) => spec.ids()?,
            None => Servo::iter().map(Servo::id).collect(),
        };
        check_count(ids.len(), 1, 1)?;

        let mut data = Vec::with_capacity(1 + ids.len());
        data.push(ids.len() as u8);
        data.extend_from_slice(&ids);
        self.send(Command::Stop, &data).await
    }

    /// Writes `new_id` to every attached servo.
    ///
    /// The device applies the id write to all servos on the bus, so unless
    /// `overwrite_all` is set this first runs discovery and refuses to write
    /// when anything other than exactly one servo answers.
    pub async fn write_servo_id(&mut self, new_id: u8, overwrite_all: bool) -> Result<()> {
        if new_id == 0 {
            return Err(ValidationError::ZeroId.into());
        }

        if !overwrite_all {
            let max_id = self.config.max_servo_id;
            self.list_servos(max_id).await?;
            match self.servos.len() {
                0 => return Err(ValidationError::NoServos.into()),
                1 => {}
                n => return Err(ValidationError::AmbiguousTarget(n).into()),
            }
        }

        self.send(Command::WriteId, &[new_id]).await
    }

    /// Probes ids `1..=max_id` one at a time and caches the ones that answer.
    ///
    /// A protocol failure for an id only means the servo is absent, so its
    /// detail is dropped. Transport failures still abort the scan.
    pub async fn list_servos(&mut self, max_id: u8) -> Result<Vec<u8>> {
        self.servos.clear();
        let mut found = Vec::new();
        for id in 1..=max_id {
            match self.get_position(id).await {
                Ok(_) => found.push(id),
                Err(Error::Protocol(e)) => trace!(id, "no servo: {}", e),
                Err(e) => return Err(e),
            }
        }
        debug!("Found {} servos: {:?}", found.len(), found);
        self.servos = found.clone();
        Ok(found)
    }

    /// Battery voltage in volts.
    ///
    /// The controller often ignores the first queries after connecting, so
    /// this polls up to `battery_attempts` times. When every attempt fails it
    /// reports 0.0 instead of an error.
    pub async fn get_battery_voltage(&mut self) -> Result<f32> {
        let attempts = self.config.battery_attempts;
        for attempt in 1..=attempts {
            match self.request(Command::GetBatteryVoltage, &[]).await {
                Ok(data) if data.len() >= 2 => {
                    let millivolts = u16::from_le_bytes([data[0], data[1]]);
                    return Ok(millivolts as f32 / 1000.0);
                }
                Ok(data) => debug!(attempt, "short battery reply {:02x?}", data),
                Err(Error::Protocol(e)) => debug!(attempt, "battery query failed: {}", e),
                Err(e) => return Err(e),
            }
            sleep(self.config.battery_retry_interval).await;
        }
        warn!("No battery reading after {} attempts", attempts);
        Ok(0.0)
    }
}

/// Ensures a payload of `fixed + per_entry * count` bytes fits one frame.
fn check_count(count: usize, fixed: usize, per_entry: usize) -> std::result::Result<(), ValidationError> {
    if count == 0 {
        return Err(ValidationError::BadSpec("no servos given".into()));
    }
    let max = (MAX_PAYLOAD - fixed) / per_entry;
    if count > max {
        return Err(ValidationError::BadSpec(format!(
            "{} servos in one command, at most {} fit in a frame",
            count, max
        )));
    }
    Ok(())
}

/// Matches a `[count, (id, lo, hi)*]` reply against the requested ids.
fn parse_positions(reply: &[u8], ids: &[u8]) -> std::result::Result<Vec<u16>, ProtocolError> {
    let count = *reply
        .first()
        .ok_or_else(|| ProtocolError::Malformed("empty position reply".into()))? as usize;
    if count != ids.len() {
        return Err(ProtocolError::Malformed(format!(
            "asked for {} positions, got {}",
            ids.len(),
            count
        )));
    }
    if reply.len() < 1 + 3 * count {
        return Err(ProtocolError::Malformed(format!(
            "position reply holds {} bytes, expected {}",
            reply.len(),
            1 + 3 * count
        )));
    }

    let entries: Vec<(u8, u16)> = reply[1..1 + 3 * count]
        .chunks_exact(3)
        .map(|entry| (entry[0], u16::from_le_bytes([entry[1], entry[2]])))
        .collect();

    ids.iter()
        .map(|id| {
            entries
                .iter()
                .find(|(reply_id, _)| reply_id == id)
                .map(|&(_, position)| position)
                .ok_or_else(|| ProtocolError::Malformed(format!("no position for servo {}", id)))
        })
        .collect()
}
