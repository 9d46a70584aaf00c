use field_transport::{BusInfo, RegisterBus, Result, TransportError, UnitId};
use ks_protocol::{
    pack_f32, pack_i32, unpack_i32, AddressMap, ChannelAddress, DeviceClass, Opcode,
    SensorPoint, StateCode, StatusLayout,
};
use std::collections::HashMap;

/// Reads a state stays in before settling when the command carries no duration
const UNTIMED_TRAVEL: i32 = 5;

#[derive(Debug, Clone, Copy)]
struct SimDevice {
    operation_id: u16,
    state: StateCode,
    /// Reads left before returning to ready; `None` runs until stopped
    remaining: Option<i32>,
    area: u16,
}

impl Default for SimDevice {
    fn default() -> Self {
        Self {
            operation_id: 0,
            state: StateCode::Ready,
            remaining: None,
            area: 0,
        }
    }
}

/// An in-process stand-in for the greenhouse controller, used by `--mock`.
///
/// Every status read counts as one second of device time.
pub struct SimulatedField {
    channels: Vec<ChannelAddress>,
    devices: HashMap<(UnitId, u16), SimDevice>,
    sensors: Vec<(SensorPoint, f32)>,
}

impl SimulatedField {
    pub fn new(map: &AddressMap, sensors: &[SensorPoint]) -> Self {
        let channels = DeviceClass::ALL
            .into_iter()
            .flat_map(|class| {
                (0..map.device_count(class))
                    .filter_map(move |idx| map.resolve(class, idx as i64).ok())
            })
            .collect();
        let sensors = sensors
            .iter()
            .enumerate()
            .map(|(i, p)| (p.clone(), sample_value(&p.name, i)))
            .collect();
        Self {
            channels,
            devices: HashMap::new(),
            sensors,
        }
    }

    fn by_command(&self, address: u16, unit: UnitId) -> Option<ChannelAddress> {
        self.channels
            .iter()
            .find(|c| c.command_base == address && c.unit_id == unit)
            .copied()
    }

    fn by_status(&self, address: u16, unit: UnitId) -> Option<ChannelAddress> {
        self.channels
            .iter()
            .find(|c| c.status_base == address && c.unit_id == unit)
            .copied()
    }

    fn apply(&mut self, channel: ChannelAddress, regs: &[u16]) -> Result<()> {
        if regs.len() < 2 {
            return Err(TransportError::Exception("illegal data value".into()));
        }
        let opcode = Opcode::from_code(regs[0])
            .filter(|op| channel.class.accepts(*op))
            .ok_or_else(|| TransportError::Exception(format!("unknown opcode {}", regs[0])))?;
        let duration = regs.get(2..4).map(|p| unpack_i32(p[0], p[1]));
        let dev = self
            .devices
            .entry((channel.unit_id, channel.status_base))
            .or_default();
        dev.operation_id = regs[1];
        let (state, remaining) = match opcode {
            Opcode::Off => (StateCode::Ready, None),
            Opcode::On => (StateCode::Working, None),
            Opcode::TimedOn => (StateCode::Working, duration),
            Opcode::Open | Opcode::SetPosition => (StateCode::Opening, Some(UNTIMED_TRAVEL)),
            Opcode::Close => (StateCode::Closing, Some(UNTIMED_TRAVEL)),
            Opcode::TimedOpen => (StateCode::Opening, duration),
            Opcode::TimedClose => (StateCode::Closing, duration),
            Opcode::OnceWater => (StateCode::Supplying, Some(UNTIMED_TRAVEL)),
            Opcode::JustWater | Opcode::NutWater => {
                dev.area = regs.get(2).copied().unwrap_or(1);
                let secs = regs.get(4..6).map(|p| unpack_i32(p[0], p[1]));
                (StateCode::Preparing, secs)
            }
        };
        dev.state = state;
        dev.remaining = remaining;
        Ok(())
    }

    fn status(&mut self, channel: ChannelAddress) -> Vec<u16> {
        let dev = self
            .devices
            .entry((channel.unit_id, channel.status_base))
            .or_default();
        let layout = StatusLayout::for_class(channel.class);
        let mut out = vec![0u16; layout.len];
        out[layout.operation_id] = dev.operation_id;
        out[layout.state] = dev.state.code();
        let (lo, hi) = pack_i32(dev.remaining.unwrap_or(0).max(0));
        out[layout.remaining] = lo;
        out[layout.remaining + 1] = hi;
        if let Some(idx) = layout.area {
            out[idx] = dev.area;
        }
        tick(dev);
        out
    }
}

fn tick(dev: &mut SimDevice) {
    if dev.state == StateCode::Preparing {
        dev.state = StateCode::Supplying;
        return;
    }
    if let Some(left) = dev.remaining {
        if left <= 1 {
            dev.state = StateCode::Ready;
            dev.remaining = None;
        } else {
            dev.remaining = Some(left - 1);
        }
    }
}

fn sample_value(name: &str, i: usize) -> f32 {
    match name {
        ks_protocol::NUTRIENT_EC => 1.8,
        ks_protocol::NUTRIENT_PH => 6.1,
        _ => 10.0 + i as f32 * 1.5,
    }
}

impl RegisterBus for SimulatedField {
    fn write_registers(&mut self, address: u16, registers: &[u16], unit: UnitId) -> Result<()> {
        let channel = self
            .by_command(address, unit)
            .ok_or_else(|| TransportError::Exception("illegal data address".into()))?;
        self.apply(channel, registers)
    }

    fn read_registers(&mut self, address: u16, count: u16, unit: UnitId) -> Result<Vec<u16>> {
        let mut out = if let Some(channel) = self.by_status(address, unit) {
            self.status(channel)
        } else if let Some((_, value)) = self
            .sensors
            .iter()
            .find(|(p, _)| p.address == address && UnitId(p.unit) == unit)
        {
            let (lo, hi) = pack_f32(*value);
            vec![lo, hi, StateCode::Ready.code()]
        } else {
            return Err(TransportError::Exception("illegal data address".into()));
        };
        out.resize(usize::from(count), 0);
        Ok(out)
    }

    fn info(&self) -> BusInfo {
        BusInfo {
            name: "sim0".to_string(),
            driver: "simulated".to_string(),
        }
    }
}
