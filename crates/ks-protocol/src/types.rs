use core::fmt;
use serde::{Deserialize, Serialize};

/// Device classes found on the greenhouse bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// On/off actuators: fans, CO2 valve, fogger
    Switch,
    /// Open/close actuators: roof vents, screens, curtains
    Retractable,
    /// Nutrient solution dispenser
    Dispenser,
}

impl DeviceClass {
    pub const ALL: [DeviceClass; 3] = [Self::Switch, Self::Retractable, Self::Dispenser];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Switch => "switch",
            Self::Retractable => "retractable",
            Self::Dispenser => "dispenser",
        }
    }

    /// Whether a device of this class understands `opcode`.
    pub fn accepts(self, opcode: Opcode) -> bool {
        use Opcode::*;
        match self {
            Self::Switch => matches!(opcode, Off | On | TimedOn),
            Self::Retractable => matches!(
                opcode,
                Off | Open | Close | TimedOpen | TimedClose | SetPosition
            ),
            Self::Dispenser => matches!(opcode, Off | OnceWater | JustWater | NutWater),
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Command opcodes (KS X 3267 numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum Opcode {
    Off = 0,
    On = 201,
    TimedOn = 202,
    Open = 301,
    Close = 302,
    TimedOpen = 303,
    TimedClose = 304,
    SetPosition = 305,
    OnceWater = 401,
    JustWater = 402,
    NutWater = 403,
}

impl Opcode {
    pub const ALL: [Opcode; 11] = [
        Self::Off,
        Self::On,
        Self::TimedOn,
        Self::Open,
        Self::Close,
        Self::TimedOpen,
        Self::TimedClose,
        Self::SetPosition,
        Self::OnceWater,
        Self::JustWater,
        Self::NutWater,
    ];

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::On => "on",
            Self::TimedOn => "timed_on",
            Self::Open => "open",
            Self::Close => "close",
            Self::TimedOpen => "timed_open",
            Self::TimedClose => "timed_close",
            Self::SetPosition => "set_position",
            Self::OnceWater => "once_water",
            Self::JustWater => "just_water",
            Self::NutWater => "nut_water",
        }
    }

    /// Parameters that must be present, in wire order.
    pub fn required_fields(self) -> &'static [Field] {
        match self {
            Self::TimedOn | Self::TimedOpen | Self::TimedClose => &[Field::Duration],
            Self::SetPosition => &[Field::Position],
            Self::JustWater => &[Field::Area, Field::Duration],
            Self::NutWater => &[Field::Area, Field::Duration, Field::Ec, Field::Ph],
            Self::Off | Self::On | Self::Open | Self::Close | Self::OnceWater => &[],
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.as_str(), self.code())
    }
}

/// Optional command parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Duration,
    Area,
    Ec,
    Ph,
    Position,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Duration => "duration",
            Self::Area => "area",
            Self::Ec => "ec",
            Self::Ph => "ph",
            Self::Position => "position",
        })
    }
}

/// Device state codes reported in status blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateCode {
    Ready,
    Error,
    Busy,
    VoltageError,
    CurrentError,
    TemperatureError,
    FuseError,
    NeedReplace,
    NeedCalibration,
    Checking,
    Working,
    Opening,
    Closing,
    Preparing,
    Supplying,
    Finishing,
    Unknown(u16),
}

impl StateCode {
    pub fn from_code(code: u16) -> Self {
        match code {
            0 => Self::Ready,
            1 => Self::Error,
            2 => Self::Busy,
            3 => Self::VoltageError,
            4 => Self::CurrentError,
            5 => Self::TemperatureError,
            6 => Self::FuseError,
            101 => Self::NeedReplace,
            102 => Self::NeedCalibration,
            103 => Self::Checking,
            201 => Self::Working,
            301 => Self::Opening,
            302 => Self::Closing,
            401 => Self::Preparing,
            402 => Self::Supplying,
            403 => Self::Finishing,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u16 {
        match self {
            Self::Ready => 0,
            Self::Error => 1,
            Self::Busy => 2,
            Self::VoltageError => 3,
            Self::CurrentError => 4,
            Self::TemperatureError => 5,
            Self::FuseError => 6,
            Self::NeedReplace => 101,
            Self::NeedCalibration => 102,
            Self::Checking => 103,
            Self::Working => 201,
            Self::Opening => 301,
            Self::Closing => 302,
            Self::Preparing => 401,
            Self::Supplying => 402,
            Self::Finishing => 403,
            Self::Unknown(code) => code,
        }
    }

    pub fn is_ready(self) -> bool {
        self == Self::Ready
    }

    pub fn is_fault(self) -> bool {
        matches!(
            self,
            Self::Error
                | Self::VoltageError
                | Self::CurrentError
                | Self::TemperatureError
                | Self::FuseError
        )
    }

    /// Anything that is neither rest nor fault is still in progress.
    pub fn is_transitioning(self) -> bool {
        !self.is_ready() && !self.is_fault()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Error => "error",
            Self::Busy => "busy",
            Self::VoltageError => "voltage_error",
            Self::CurrentError => "current_error",
            Self::TemperatureError => "temperature_error",
            Self::FuseError => "fuse_error",
            Self::NeedReplace => "need_replace",
            Self::NeedCalibration => "need_calibration",
            Self::Checking => "checking",
            Self::Working => "working",
            Self::Opening => "opening",
            Self::Closing => "closing",
            Self::Preparing => "preparing",
            Self::Supplying => "supplying",
            Self::Finishing => "finishing",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.as_str(), self.code())
    }
}

/// Irrigation area range for the dispenser
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaRange {
    pub start: u16,
    pub end: u16,
}

impl AreaRange {
    pub fn single(area: u16) -> Self {
        Self {
            start: area,
            end: area,
        }
    }
}

/// Optional command parameters. Which ones are required depends on the opcode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandParams {
    #[serde(default)]
    pub duration_secs: Option<i32>,
    #[serde(default)]
    pub area: Option<AreaRange>,
    #[serde(default)]
    pub ec: Option<f32>,
    #[serde(default)]
    pub ph: Option<f32>,
    #[serde(default)]
    pub position: Option<u16>,
}

impl CommandParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_duration(mut self, secs: i32) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn with_area(mut self, area: AreaRange) -> Self {
        self.area = Some(area);
        self
    }

    pub fn with_ec(mut self, ec: f32) -> Self {
        self.ec = Some(ec);
        self
    }

    pub fn with_ph(mut self, ph: f32) -> Self {
        self.ph = Some(ph);
        self
    }

    pub fn with_position(mut self, percent: u16) -> Self {
        self.position = Some(percent);
        self
    }

    pub fn has(&self, field: Field) -> bool {
        match field {
            Field::Duration => self.duration_secs.is_some(),
            Field::Area => self.area.is_some(),
            Field::Ec => self.ec.is_some(),
            Field::Ph => self.ph.is_some(),
            Field::Position => self.position.is_some(),
        }
    }
}
