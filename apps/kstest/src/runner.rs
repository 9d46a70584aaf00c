use crate::report::Reporter;
use crate::sequence::{run_sequence, sequence_for, StepReport};
use crate::sim::SimulatedField;
use anyhow::{Context, Result};
use field_transport::{ModbusTcpBus, RegisterBus};
use ks_protocol::{
    read_sensor, AddressMap, BusConfig, Channel, DeviceClass, MetricsHub, Outcome, SensorPoint,
    NUTRIENT_EC, NUTRIENT_FLOW, NUTRIENT_PH,
};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Backend {
    Simulated,
    ModbusTcp,
}

/// Dispenser sensor values taken before irrigating
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NutrientReadings {
    pub ec: f32,
    pub ph: f32,
    /// Cumulative flow; only reported
    pub flow: Option<f32>,
}

/// Everything a test run needs besides the device selection
pub struct Runner {
    pub config: BusConfig,
    pub map: AddressMap,
    pub backend: Backend,
    pub interval: Duration,
    pub reporter: Reporter,
    pub metrics: Option<MetricsHub>,
}

impl Runner {
    pub fn new(
        config: BusConfig,
        backend: Backend,
        interval: Duration,
        reporter: Reporter,
    ) -> Self {
        let map = config.address_map();
        Self {
            config,
            map,
            backend,
            interval,
            reporter,
            metrics: None,
        }
    }

    /// One bus session per channel; dropped when the channel is.
    pub fn open_bus(&self) -> Result<Box<dyn RegisterBus>> {
        match self.backend {
            Backend::Simulated => Ok(Box::new(SimulatedField::new(
                &self.map,
                &self.config.sensor_points(),
            ))),
            Backend::ModbusTcp => {
                let bus = ModbusTcpBus::connect(&self.config.modbus_ip, self.config.modbus_port)
                    .with_context(|| {
                        format!(
                            "connecting to {}:{}",
                            self.config.modbus_ip, self.config.modbus_port
                        )
                    })?;
                Ok(Box::new(bus))
            }
        }
    }

    fn device_name(&self, class: DeviceClass, index: usize) -> String {
        self.config
            .device_names(class)
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("{class} {index}"))
    }

    /// Test one device, or every device of the class when `index` is `None`.
    pub fn run_class(&self, class: DeviceClass, index: Option<i64>) -> Result<Vec<StepReport>> {
        match index {
            Some(idx) => self.run_device(class, idx),
            None => {
                let mut all = Vec::new();
                for idx in 0..self.map.device_count(class) {
                    all.extend(self.run_device(class, idx as i64)?);
                }
                Ok(all)
            }
        }
    }

    pub fn run_device(&self, class: DeviceClass, index: i64) -> Result<Vec<StepReport>> {
        let address = self.map.resolve(class, index)?;
        let mut bus = self.open_bus()?;
        let nutrients = if class == DeviceClass::Dispenser {
            self.read_nutrients(&mut bus)?
        } else {
            NutrientReadings::default()
        };
        let bus_info = bus.info();
        let mut channel = Channel::new(bus, address);
        if let Some(hub) = &self.metrics {
            channel = channel.with_metrics(hub.protocol.clone());
        }
        let name = self.device_name(class, address.index);
        info!(%class, index = address.index, %name, bus = %bus_info, "device test start");
        self.reporter.device_start(class, address.index, &name, &bus_info);
        let reports = run_sequence(
            &mut channel,
            &sequence_for(class, nutrients.ec, nutrients.ph),
            self.interval,
            &self.reporter,
        )?;
        self.reporter.device_end(class, address.index, &name);
        let unsettled = reports
            .iter()
            .filter(|r| r.outcome != Outcome::Success)
            .count();
        if unsettled > 0 {
            warn!(%class, index = address.index, unsettled, "device test had unsettled steps");
        }
        Ok(reports)
    }

    /// Read the dispenser's EC, pH and cumulative flow. A failed or abnormal
    /// EC/pH read falls back to zero.
    pub fn read_nutrients(&self, bus: &mut Box<dyn RegisterBus>) -> Result<NutrientReadings> {
        let points = self.config.sensor_points();
        let mut value_of = |name: &str| -> Result<Option<f32>> {
            let Some(point) = points.iter().find(|p| p.name == name) else {
                return Ok(None);
            };
            match read_sensor(bus, point) {
                Ok(reading) => {
                    self.reporter.sensor(&reading)?;
                    Ok(reading.value)
                }
                Err(e) => {
                    self.reporter.sensor_failed(name, &e);
                    Ok(None)
                }
            }
        };
        let readings = NutrientReadings {
            ec: value_of(NUTRIENT_EC)?.unwrap_or(0.0),
            ph: value_of(NUTRIENT_PH)?.unwrap_or(0.0),
            flow: value_of(NUTRIENT_FLOW)?,
        };
        info!(
            ec = readings.ec,
            ph = readings.ph,
            flow = ?readings.flow,
            "nutrient readings"
        );
        Ok(readings)
    }

    /// Read every configured sensor point once.
    pub fn read_all_sensors(&self) -> Result<usize> {
        let mut bus = self.open_bus()?;
        let points: Vec<SensorPoint> = self.config.sensor_points();
        let mut ok = 0;
        for (i, point) in points.iter().enumerate() {
            if i > 0 && !self.interval.is_zero() {
                std::thread::sleep(self.interval);
            }
            match read_sensor(&mut bus, point) {
                Ok(reading) => {
                    self.reporter.sensor(&reading)?;
                    if reading.value.is_some() {
                        ok += 1;
                    }
                }
                Err(e) => self.reporter.sensor_failed(&point.name, &e),
            }
        }
        Ok(ok)
    }
}
