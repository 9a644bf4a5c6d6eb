use crate::constants::{MAX_ANGLE, MAX_POSITION, MIN_ANGLE, MIN_POSITION};
use crate::error::ValidationError;
use crate::units::angle_to_position;
use strum_macros::EnumIter;

/// Joints of the stock six-servo arm, by bus id.
#[derive(Debug, EnumIter, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Servo {
    Gripper = 1,
    WristSpin = 2,
    WristTilt = 3,    // -125 to 125 up to down
    ElbowTilt = 4,    // -125 to 125 up to down
    ShoulderTilt = 5, // -125 to 125 up to down
    BaseSpin = 6,     // -125 to 125 clockwise
}

impl Servo {
    pub fn id(self) -> u8 {
        self as u8
    }
}

/// Requested position, either raw units or degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    Raw(i32),
    Angle(f32),
}

impl Target {
    /// Range-checks the target and converts it to raw units.
    pub fn resolve(self) -> Result<u16, ValidationError> {
        match self {
            Target::Raw(position) => {
                if !(MIN_POSITION..=MAX_POSITION).contains(&position) {
                    return Err(ValidationError::PositionRange(position));
                }
                Ok(position as u16)
            }
            Target::Angle(angle) => {
                if !(MIN_ANGLE..=MAX_ANGLE).contains(&angle) {
                    return Err(ValidationError::AngleRange(angle));
                }
                Ok(angle_to_position(angle))
            }
        }
    }
}

impl From<i32> for Target {
    fn from(position: i32) -> Self {
        Target::Raw(position)
    }
}

impl From<f32> for Target {
    fn from(angle: f32) -> Self {
        Target::Angle(angle)
    }
}

/// A servo with its last known raw position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoState {
    pub id: u8,
    pub position: u16,
}

impl ServoState {
    pub fn new(id: u8) -> Self {
        ServoState { id, position: 0 }
    }

    pub fn with_position(id: u8, position: u16) -> Self {
        ServoState { id, position }
    }

    pub fn angle(&self) -> f32 {
        crate::units::position_to_angle(self.position)
    }
}

/// Caller-side description of one or more servos.
#[derive(Debug, Clone, PartialEq)]
pub enum ServoSpec {
    Id(u8),
    IdWithPosition(u8, Target),
    List(Vec<ServoSpec>),
}

impl ServoSpec {
    pub fn raw(id: u8, position: i32) -> Self {
        ServoSpec::IdWithPosition(id, Target::Raw(position))
    }

    pub fn angle(id: u8, angle: f32) -> Self {
        ServoSpec::IdWithPosition(id, Target::Angle(angle))
    }

    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ServoSpec>,
    {
        ServoSpec::List(items.into_iter().map(Into::into).collect())
    }

    /// Flattens the spec into `(id, target)` entries in caller order. Lists
    /// nest one level deep at most.
    pub fn normalize(&self) -> Result<Vec<(u8, Option<Target>)>, ValidationError> {
        match self {
            ServoSpec::Id(id) => Ok(vec![(*id, None)]),
            ServoSpec::IdWithPosition(id, target) => Ok(vec![(*id, Some(*target))]),
            ServoSpec::List(items) => {
                if items.is_empty() {
                    return Err(ValidationError::BadSpec("empty servo list".into()));
                }
                items
                    .iter()
                    .map(|item| match item {
                        ServoSpec::Id(id) => Ok((*id, None)),
                        ServoSpec::IdWithPosition(id, target) => Ok((*id, Some(*target))),
                        ServoSpec::List(_) => {
                            Err(ValidationError::BadSpec("nested servo lists are not supported".into()))
                        }
                    })
                    .collect()
            }
        }
    }

    /// Normalizes and resolves every entry to raw units. Any entry without a
    /// valid target fails the whole spec.
    pub fn moves(&self) -> Result<Vec<(u8, u16)>, ValidationError> {
        self.normalize()?
            .into_iter()
            .map(|(id, target)| match target {
                Some(target) => Ok((id, target.resolve()?)),
                None => Err(ValidationError::BadSpec(format!("servo {} has no position", id))),
            })
            .collect()
    }

    pub fn ids(&self) -> Result<Vec<u8>, ValidationError> {
        Ok(self.normalize()?.into_iter().map(|(id, _)| id).collect())
    }
}

impl From<u8> for ServoSpec {
    fn from(id: u8) -> Self {
        ServoSpec::Id(id)
    }
}

impl From<Servo> for ServoSpec {
    fn from(servo: Servo) -> Self {
        ServoSpec::Id(servo.id())
    }
}

impl From<ServoState> for ServoSpec {
    fn from(state: ServoState) -> Self {
        ServoSpec::raw(state.id, state.position as i32)
    }
}

impl From<&ServoState> for ServoSpec {
    fn from(state: &ServoState) -> Self {
        ServoSpec::from(*state)
    }
}

impl<T: Into<Target>> From<(u8, T)> for ServoSpec {
    fn from((id, target): (u8, T)) -> Self {
        ServoSpec::IdWithPosition(id, target.into())
    }
}

impl<T: Into<ServoSpec>> From<Vec<T>> for ServoSpec {
    fn from(items: Vec<T>) -> Self {
        ServoSpec::list(items)
    }
}
