use crate::addressing::AddressMap;
use crate::sensor::{default_sensor_points, SensorPoint};
use crate::types::DeviceClass;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Bus endpoint and device tables, as found in `conf.json` / `conf.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_ip")]
    pub modbus_ip: String,
    #[serde(default = "default_port")]
    pub modbus_port: u16,
    #[serde(default)]
    pub devices: DeviceNames,
    /// Replaces the built-in sensor table when present
    #[serde(default)]
    pub sensors: Option<Vec<SensorPoint>>,
}

/// Display names per class; their count bounds the valid device indices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceNames {
    #[serde(default = "default_switch_names")]
    pub switch: Vec<String>,
    #[serde(default = "default_retractable_names")]
    pub retractable: Vec<String>,
    #[serde(default = "default_dispenser_names")]
    pub dispenser: Vec<String>,
}

impl Default for DeviceNames {
    fn default() -> Self {
        Self {
            switch: default_switch_names(),
            retractable: default_retractable_names(),
            dispenser: default_dispenser_names(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            modbus_ip: default_ip(),
            modbus_port: default_port(),
            devices: DeviceNames::default(),
            sensors: None,
        }
    }
}

impl BusConfig {
    pub fn device_names(&self, class: DeviceClass) -> &[String] {
        match class {
            DeviceClass::Switch => &self.devices.switch,
            DeviceClass::Retractable => &self.devices.retractable,
            DeviceClass::Dispenser => &self.devices.dispenser,
        }
    }

    /// Built-in register map with device counts taken from the name tables.
    pub fn address_map(&self) -> AddressMap {
        DeviceClass::ALL
            .into_iter()
            .fold(AddressMap::default(), |map, class| {
                map.with_device_count(class, self.device_names(class).len())
            })
    }

    pub fn sensor_points(&self) -> Vec<SensorPoint> {
        self.sensors.clone().unwrap_or_else(default_sensor_points)
    }
}

fn default_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    502
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn default_switch_names() -> Vec<String> {
    names(&["FCU fan", "FCU circulation", "CO2", "circulation fan", "fog"])
}

fn default_retractable_names() -> Vec<String> {
    names(&["roof vent left", "roof vent right", "screen", "thermal curtain"])
}

fn default_dispenser_names() -> Vec<String> {
    names(&["nutrient supply"])
}

/// Load a configuration file; `.yaml`/`.yml` as YAML, anything else as JSON.
pub fn load_config_file(path: impl AsRef<Path>) -> anyhow::Result<BusConfig> {
    let path = path.as_ref();
    let raw =
        fs::read_to_string(path).with_context(|| format!("reading config: {}", path.display()))?;
    let is_yaml = path
        .extension()
        .map(|ext| ext == "yaml" || ext == "yml")
        .unwrap_or(false);
    let cfg: BusConfig = if is_yaml {
        serde_yaml::from_str(&raw).with_context(|| format!("parsing yaml: {}", path.display()))?
    } else {
        serde_json::from_str(&raw).with_context(|| format!("parsing json: {}", path.display()))?
    };
    Ok(cfg)
}
