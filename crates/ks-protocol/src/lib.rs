//! ks-protocol: command/status correlation for greenhouse field-bus devices
//!
//! Commands are encoded into holding-register writes, status blocks are decoded
//! per device class, and a per-channel tracker correlates what the device
//! reports with the operation id of the latest command.

mod codec;
pub use codec::{pack_f32, pack_i32, pack_u32, unpack_f32, unpack_i32, unpack_u32};

mod types;
pub use types::{AreaRange, CommandParams, DeviceClass, Field, Opcode, StateCode};

mod error;
pub use error::{Error, Result};

mod encode;
pub use encode::{encode, Command};

mod decode;
pub use decode::{decode, decode_with, StatusBlock, StatusLayout};

mod addressing;
pub use addressing::{device_count, resolve, AddressMap, ChannelAddress, ClassMap};

mod tracker;
pub use tracker::{Channel, Outcome, PollOutcome, TrackerState, INITIAL_OPERATION_ID};

mod sensor;
pub use sensor::{
    decode_sensor, default_sensor_points, read_sensor, SensorPoint, SensorReading,
    NUTRIENT_EC, NUTRIENT_FLOW, NUTRIENT_PH, SENSOR_BLOCK_LEN,
};

mod loader;
pub use loader::{load_config_file, BusConfig, DeviceNames};

mod record;
pub use record::{CommandRecord, ObservationRecord};

mod metrics;
pub use metrics::{MetricsHub, ProtocolMetrics};
