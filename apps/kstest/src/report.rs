use anyhow::Result;
use field_transport::BusInfo;
use ks_protocol::{
    CommandRecord, DeviceClass, ObservationRecord, Opcode, Outcome, PollOutcome, SensorReading,
    StateCode,
};
use serde::Serialize;

/// Human-facing names for opcodes
pub fn opcode_name(op: Opcode) -> &'static str {
    match op {
        Opcode::Off => "stop",
        Opcode::On => "run",
        Opcode::TimedOn => "timed run",
        Opcode::Open => "open",
        Opcode::Close => "close",
        Opcode::TimedOpen => "timed open",
        Opcode::TimedClose => "timed close",
        Opcode::SetPosition => "set position",
        Opcode::OnceWater => "single irrigation",
        Opcode::JustWater => "raw water irrigation",
        Opcode::NutWater => "nutrient irrigation",
    }
}

/// Human-facing names for states, as each class describes them
pub fn state_name(class: DeviceClass, state: StateCode) -> &'static str {
    match (class, state) {
        (_, StateCode::Ready) => "stopped",
        (DeviceClass::Switch, StateCode::Working) => "running",
        (DeviceClass::Retractable, StateCode::Opening) => "opening",
        (DeviceClass::Retractable, StateCode::Closing) => "closing",
        (DeviceClass::Dispenser, StateCode::Preparing) => "preparing",
        (DeviceClass::Dispenser, StateCode::Supplying) => "irrigating",
        (DeviceClass::Dispenser, StateCode::Finishing) => "finishing",
        (_, s) if s.is_fault() => "fault",
        _ => "unknown state",
    }
}

/// Prints command and observation records, as text or JSON lines
#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    pub json: bool,
}

impl Reporter {
    fn emit<T: Serialize>(&self, kind: &str, rec: &T) -> Result<()> {
        let mut value = serde_json::to_value(rec)?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("record".into(), kind.into());
        }
        println!("{}", serde_json::to_string(&value)?);
        Ok(())
    }

    pub fn device_start(&self, class: DeviceClass, index: usize, name: &str, bus: &BusInfo) {
        if !self.json {
            println!("\n===== {name} ({class} {index}) test start on {bus} =====\n");
        }
    }

    pub fn device_end(&self, class: DeviceClass, index: usize, name: &str) {
        if !self.json {
            println!("\n===== {name} ({class} {index}) test end =====\n");
        }
    }

    pub fn command(&self, rec: &CommandRecord, op: Opcode) -> Result<()> {
        if self.json {
            return self.emit("command", rec);
        }
        println!(
            "sending {} command {:?}",
            opcode_name(op),
            rec.registers
        );
        Ok(())
    }

    pub fn observation(&self, rec: &ObservationRecord, want_timing: bool) -> Result<()> {
        if self.json {
            return self.emit("observation", rec);
        }
        let class = rec.channel.class;
        match &rec.outcome {
            PollOutcome::Stale {
                expected, observed, ..
            } => println!("operation id mismatch: register holds {observed}, expecting {expected}"),
            PollOutcome::Fault { fault_code, block } => {
                println!(
                    "operation {} is {}",
                    block.operation_id,
                    state_name(class, block.state)
                );
                println!("device fault, fault code {fault_code}");
            }
            PollOutcome::InProgress(block) | PollOutcome::Settled(block) => {
                println!(
                    "operation {} is {}",
                    block.operation_id,
                    state_name(class, block.state)
                );
                if want_timing {
                    match (block.area, block.remaining_secs) {
                        (Some(area), Some(secs)) => {
                            println!("irrigating area {area}, {secs} s remaining")
                        }
                        (None, Some(secs)) => println!("{secs} s of operation remaining"),
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    pub fn read_failed(&self, err: &dyn std::error::Error) {
        eprintln!("status read failed: {err}");
    }

    pub fn step_finished(&self, op: Opcode, outcome: Outcome) {
        if self.json {
            return;
        }
        match outcome {
            Outcome::Success => {}
            Outcome::Fault(code) => println!("{} ended in fault {code}", opcode_name(op)),
            Outcome::Timeout => {
                println!("{} not settled within the polling budget", opcode_name(op))
            }
        }
    }

    pub fn sensor(&self, reading: &SensorReading) -> Result<()> {
        if self.json {
            return self.emit("sensor", reading);
        }
        match reading.value {
            Some(v) => println!("{}: normal, value {v}", reading.name),
            None => println!(
                "{}: abnormal state {} {:?}",
                reading.name, reading.state, reading.raw
            ),
        }
        Ok(())
    }

    pub fn sensor_failed(&self, name: &str, err: &dyn std::error::Error) {
        eprintln!("{name}: read failed: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_class() {
        assert_eq!(state_name(DeviceClass::Switch, StateCode::Working), "running");
        assert_eq!(
            state_name(DeviceClass::Dispenser, StateCode::Supplying),
            "irrigating"
        );
        assert_eq!(state_name(DeviceClass::Switch, StateCode::Opening), "unknown state");
        assert_eq!(state_name(DeviceClass::Retractable, StateCode::FuseError), "fault");
        assert_eq!(opcode_name(Opcode::NutWater), "nutrient irrigation");
    }
}
