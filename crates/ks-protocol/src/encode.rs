use crate::codec::{pack_f32, pack_i32};
use crate::error::{Error, Result};
use crate::types::{CommandParams, DeviceClass, Opcode};
use serde::Serialize;

/// A fully encoded command, ready to be written to the command registers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Command {
    pub class: DeviceClass,
    pub opcode: Opcode,
    pub operation_id: u16,
    pub registers: Vec<u16>,
}

impl Command {
    /// Validate `opcode` against `class` and encode it.
    pub fn build(
        class: DeviceClass,
        opcode: Opcode,
        operation_id: u16,
        params: &CommandParams,
    ) -> Result<Self> {
        if !class.accepts(opcode) {
            return Err(Error::UnsupportedOpcode { class, opcode });
        }
        let registers = encode(opcode, operation_id, params)?;
        Ok(Self {
            class,
            opcode,
            operation_id,
            registers,
        })
    }
}

/// Encode a command into its register sequence.
///
/// Every command starts with `[opcode, operation_id]`; the remaining words
/// depend on the opcode. The operation id is taken as given. Parameters are
/// checked against [`Opcode::required_fields`] before anything is packed.
pub fn encode(opcode: Opcode, operation_id: u16, params: &CommandParams) -> Result<Vec<u16>> {
    if let Some(&field) = opcode.required_fields().iter().find(|f| !params.has(**f)) {
        return Err(Error::MissingParameter { opcode, field });
    }
    let secs = params.duration_secs.unwrap_or_default();
    let area = params.area.unwrap_or_default();

    let mut regs = vec![opcode.code(), operation_id];
    match opcode {
        Opcode::Off | Opcode::On | Opcode::Open | Opcode::Close | Opcode::OnceWater => {}
        Opcode::TimedOn | Opcode::TimedOpen | Opcode::TimedClose => {
            push_pair(&mut regs, pack_i32(secs));
        }
        // Time pair is reserved for this opcode and sent as zeros
        Opcode::SetPosition => {
            regs.extend_from_slice(&[0, 0, params.position.unwrap_or_default()]);
        }
        Opcode::JustWater => {
            regs.extend_from_slice(&[area.start, area.end]);
            push_pair(&mut regs, pack_i32(secs));
        }
        Opcode::NutWater => {
            regs.extend_from_slice(&[area.start, area.end]);
            push_pair(&mut regs, pack_i32(secs));
            push_pair(&mut regs, pack_f32(params.ec.unwrap_or_default()));
            push_pair(&mut regs, pack_f32(params.ph.unwrap_or_default()));
        }
    }
    Ok(regs)
}

fn push_pair(regs: &mut Vec<u16>, (lo, hi): (u16, u16)) {
    regs.push(lo);
    regs.push(hi);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AreaRange, Field};

    #[test]
    fn plain_opcodes_are_header_only() -> Result<()> {
        assert_eq!(encode(Opcode::Off, 2, &CommandParams::new())?, vec![0, 2]);
        assert_eq!(encode(Opcode::On, 3, &CommandParams::new())?, vec![201, 3]);
        Ok(())
    }

    #[test]
    fn timed_opcode_requires_duration() {
        let err = encode(Opcode::TimedOpen, 2, &CommandParams::new());
        assert!(matches!(
            err,
            Err(Error::MissingParameter {
                opcode: Opcode::TimedOpen,
                field: Field::Duration
            })
        ));
    }

    #[test]
    fn timed_open_appends_packed_duration() -> Result<()> {
        let regs = encode(Opcode::TimedOpen, 4, &CommandParams::new().with_duration(10))?;
        let (lo, hi) = pack_i32(10);
        assert_eq!(regs, vec![303, 4, lo, hi]);
        assert_eq!(regs.len(), 2 + 2);
        Ok(())
    }

    #[test]
    fn set_position_pads_reserved_time_pair() -> Result<()> {
        let regs = encode(Opcode::SetPosition, 5, &CommandParams::new().with_position(40))?;
        assert_eq!(regs, vec![305, 5, 0, 0, 40]);
        Ok(())
    }

    #[test]
    fn nut_water_field_order() -> Result<()> {
        let params = CommandParams::new()
            .with_area(AreaRange::single(1))
            .with_duration(30)
            .with_ec(1.5)
            .with_ph(6.0);
        let regs = encode(Opcode::NutWater, 2, &params)?;
        let (d_lo, d_hi) = pack_i32(30);
        let (ec_lo, ec_hi) = pack_f32(1.5);
        let (ph_lo, ph_hi) = pack_f32(6.0);
        assert_eq!(
            regs,
            vec![403, 2, 1, 1, d_lo, d_hi, ec_lo, ec_hi, ph_lo, ph_hi]
        );
        Ok(())
    }

    #[test]
    fn nut_water_reports_first_missing_field() {
        let params = CommandParams::new()
            .with_area(AreaRange::single(1))
            .with_duration(30)
            .with_ec(1.5);
        assert!(matches!(
            encode(Opcode::NutWater, 2, &params),
            Err(Error::MissingParameter {
                field: Field::Ph,
                ..
            })
        ));
    }

    #[test]
    fn build_rejects_foreign_opcode() {
        let res = Command::build(DeviceClass::Switch, Opcode::Open, 2, &CommandParams::new());
        assert!(matches!(res, Err(Error::UnsupportedOpcode { .. })));
    }

    #[test]
    fn just_water_field_order() -> Result<()> {
        let params = CommandParams::new()
            .with_area(AreaRange { start: 2, end: 4 })
            .with_duration(70_000);
        let regs = encode(Opcode::JustWater, 9, &params)?;
        let (d_lo, d_hi) = pack_i32(70_000);
        assert_eq!(regs, vec![402, 9, 2, 4, d_lo, d_hi]);
        assert_eq!(d_hi, 1);
        Ok(())
    }

    #[test]
    fn just_water_requires_area_first() {
        assert!(matches!(
            encode(Opcode::JustWater, 2, &CommandParams::new()),
            Err(Error::MissingParameter {
                opcode: Opcode::JustWater,
                field: Field::Area
            })
        ));
        let no_area = CommandParams::new().with_duration(30);
        assert!(matches!(
            encode(Opcode::JustWater, 2, &no_area),
            Err(Error::MissingParameter {
                field: Field::Area,
                ..
            })
        ));
    }

    #[test]
    fn every_required_field_is_enforced() {
        let full = CommandParams::new()
            .with_area(AreaRange::single(1))
            .with_duration(5)
            .with_ec(1.0)
            .with_ph(6.0)
            .with_position(50);
        for op in Opcode::ALL {
            assert!(encode(op, 2, &full).is_ok(), "{op}");
            for &field in op.required_fields() {
                let mut params = full;
                match field {
                    Field::Duration => params.duration_secs = None,
                    Field::Area => params.area = None,
                    Field::Ec => params.ec = None,
                    Field::Ph => params.ph = None,
                    Field::Position => params.position = None,
                }
                assert!(
                    matches!(
                        encode(op, 2, &params),
                        Err(Error::MissingParameter { field: f, .. }) if f == field
                    ),
                    "{op} without {field}"
                );
            }
        }
    }
}
