use crate::codec::unpack_f32;
use crate::types::StateCode;
use field_transport::{RegisterBus, TransportError, UnitId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Registers per sensor point: value pair, then state
pub const SENSOR_BLOCK_LEN: u16 = 3;

pub const NUTRIENT_EC: &str = "nutrient-ec";
pub const NUTRIENT_PH: &str = "nutrient-ph";
pub const NUTRIENT_FLOW: &str = "nutrient-flow";

/// A readable measurement point on the bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorPoint {
    pub name: String,
    pub unit: u8,
    #[serde(alias = "start-address")]
    pub address: u16,
}

impl SensorPoint {
    pub fn new(name: &str, unit: u8, address: u16) -> Self {
        Self {
            name: name.to_string(),
            unit,
            address,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub name: String,
    pub state: StateCode,
    /// Present only while the sensor reports ready
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f32>,
    pub raw: Vec<u16>,
}

/// Decode `[value_lo, value_hi, state]`.
pub fn decode_sensor(raw: &[u16]) -> Result<(StateCode, Option<f32>), TransportError> {
    if raw.len() != usize::from(SENSOR_BLOCK_LEN) {
        return Err(TransportError::InvalidBlock {
            expected: usize::from(SENSOR_BLOCK_LEN),
            actual: raw.len(),
        });
    }
    let state = StateCode::from_code(raw[2]);
    let value = state.is_ready().then(|| unpack_f32(raw[0], raw[1]));
    Ok((state, value))
}

pub fn read_sensor<B: RegisterBus + ?Sized>(
    bus: &mut B,
    point: &SensorPoint,
) -> Result<SensorReading, TransportError> {
    let raw = bus.read_registers(point.address, SENSOR_BLOCK_LEN, UnitId(point.unit))?;
    debug!(sensor = %point.name, registers = ?raw, "read sensor");
    let (state, value) = decode_sensor(&raw)?;
    Ok(SensorReading {
        name: point.name.clone(),
        state,
        value,
        raw,
    })
}

/// Sensor points of the reference greenhouse controller
pub fn default_sensor_points() -> Vec<SensorPoint> {
    vec![
        SensorPoint::new("weather-temperature", 2, 203),
        SensorPoint::new("weather-humidity", 2, 212),
        SensorPoint::new("weather-rain", 2, 218),
        SensorPoint::new("weather-radiation", 2, 227),
        SensorPoint::new("weather-wind-speed", 2, 230),
        SensorPoint::new("weather-wind-direction", 2, 233),
        SensorPoint::new("indoor-temperature", 3, 203),
        SensorPoint::new("indoor-humidity", 3, 212),
        SensorPoint::new("indoor-co2", 3, 239),
        SensorPoint::new("substrate-ec", 3, 242),
        SensorPoint::new("substrate-moisture", 3, 248),
        SensorPoint::new("substrate-temperature", 3, 257),
        SensorPoint::new(NUTRIENT_EC, 5, 204),
        SensorPoint::new(NUTRIENT_PH, 5, 213),
        SensorPoint::new(NUTRIENT_FLOW, 5, 225),
    ]
}
