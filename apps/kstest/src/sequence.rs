//! Test sequences: send one command, then poll a bounded number of times.

use crate::report::Reporter;
use anyhow::{Context, Result};
use field_transport::RegisterBus;
use ks_protocol::{
    AreaRange, Channel, CommandParams, CommandRecord, DeviceClass, ObservationRecord, Opcode,
    Outcome, TrackerState,
};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub opcode: Opcode,
    pub params: CommandParams,
    /// Intervals to wait after sending, before the first poll
    pub settle: u32,
    /// Polls before giving up; an unresolved operation is a soft timeout
    pub attempts: u32,
    pub want_timing: bool,
}

impl Step {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            params: CommandParams::new(),
            settle: 1,
            attempts: 1,
            want_timing: false,
        }
    }

    /// Stop, give the device a few seconds, check once.
    pub fn off() -> Self {
        Self {
            settle: 5,
            ..Self::new(Opcode::Off)
        }
    }

    pub fn params(mut self, params: CommandParams) -> Self {
        self.params = params;
        self
    }

    pub fn settle(mut self, intervals: u32) -> Self {
        self.settle = intervals;
        self
    }

    pub fn attempts(mut self, n: u32) -> Self {
        self.attempts = n;
        self
    }

    pub fn timed(mut self) -> Self {
        self.want_timing = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepReport {
    pub opcode: Opcode,
    pub operation_id: u16,
    pub outcome: Outcome,
    pub polls: u32,
}

pub fn switch_sequence() -> Vec<Step> {
    vec![
        Step::off(),
        Step::new(Opcode::On).attempts(19),
        Step::off(),
        Step::new(Opcode::TimedOn)
            .params(CommandParams::new().with_duration(20))
            .attempts(24)
            .timed(),
        Step::off(),
    ]
}

pub fn retractable_sequence() -> Vec<Step> {
    let timed = |op| {
        Step::new(op)
            .params(CommandParams::new().with_duration(10))
            .attempts(14)
            .timed()
    };
    vec![
        Step::off(),
        Step::new(Opcode::Open).attempts(9),
        Step::off(),
        Step::new(Opcode::Close).attempts(9),
        Step::off(),
        timed(Opcode::TimedOpen),
        timed(Opcode::TimedClose),
        Step::off(),
    ]
}

/// Irrigate with the nutrient solution at the measured EC/pH.
pub fn dispenser_sequence(ec: f32, ph: f32) -> Vec<Step> {
    vec![
        Step::off(),
        Step::new(Opcode::NutWater)
            .params(
                CommandParams::new()
                    .with_area(AreaRange::single(1))
                    .with_duration(30)
                    .with_ec(ec)
                    .with_ph(ph),
            )
            .settle(0)
            .attempts(39)
            .timed(),
        Step::off(),
    ]
}

pub fn sequence_for(class: DeviceClass, ec: f32, ph: f32) -> Vec<Step> {
    match class {
        DeviceClass::Switch => switch_sequence(),
        DeviceClass::Retractable => retractable_sequence(),
        DeviceClass::Dispenser => dispenser_sequence(ec, ph),
    }
}

/// Drive one step to a terminal tracker state.
///
/// Read failures are reported and count as an attempt; the write failing
/// aborts the step.
pub fn run_step<B: RegisterBus>(
    channel: &mut Channel<B>,
    step: &Step,
    interval: Duration,
    reporter: &Reporter,
) -> Result<StepReport> {
    let cmd = channel
        .send(step.opcode, &step.params)
        .with_context(|| format!("sending {} to {:?}", step.opcode, channel.address()))?;
    reporter.command(
        &CommandRecord::new(*channel.address(), &cmd, Some(OffsetDateTime::now_utc())),
        step.opcode,
    )?;
    pause(interval * step.settle);

    let mut polls = 0;
    while polls < step.attempts {
        if polls > 0 {
            pause(interval);
        }
        polls += 1;
        match channel.poll(step.want_timing) {
            Ok(outcome) => {
                let rec = ObservationRecord::new(
                    *channel.address(),
                    outcome,
                    channel.state(),
                    Some(OffsetDateTime::now_utc()),
                );
                reporter.observation(&rec, step.want_timing)?;
                if outcome.is_terminal() {
                    break;
                }
            }
            Err(e) => reporter.read_failed(&e),
        }
    }

    channel.mark_timeout();
    let outcome = match channel.state() {
        TrackerState::Terminal(outcome) => outcome,
        _ => Outcome::Timeout,
    };
    reporter.step_finished(step.opcode, outcome);
    Ok(StepReport {
        opcode: step.opcode,
        operation_id: cmd.operation_id,
        outcome,
        polls,
    })
}

pub fn run_sequence<B: RegisterBus>(
    channel: &mut Channel<B>,
    steps: &[Step],
    interval: Duration,
    reporter: &Reporter,
) -> Result<Vec<StepReport>> {
    steps
        .iter()
        .map(|step| run_step(channel, step, interval, reporter))
        .collect()
}

fn pause(d: Duration) {
    if !d.is_zero() {
        thread::sleep(d);
    }
}
