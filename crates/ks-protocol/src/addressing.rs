use crate::decode::StatusLayout;
use crate::error::{Error, Result};
use crate::types::DeviceClass;
use field_transport::UnitId;
use serde::Serialize;

/// Register placement of one device class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassMap {
    pub status_start: u16,
    pub command_start: u16,
    /// Registers consumed per additional device index
    pub stride: u16,
    pub unit_id: UnitId,
    pub device_count: usize,
}

/// Resolved registers and unit of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChannelAddress {
    pub class: DeviceClass,
    pub index: usize,
    pub command_base: u16,
    pub status_base: u16,
    #[serde(serialize_with = "unit_raw")]
    pub unit_id: UnitId,
}

impl ChannelAddress {
    pub fn status_len(&self) -> u16 {
        StatusLayout::for_class(self.class).len as u16
    }
}

fn unit_raw<S: serde::Serializer>(unit: &UnitId, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u8(unit.raw())
}

/// Per-class register map of the greenhouse controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressMap {
    switch: ClassMap,
    retractable: ClassMap,
    dispenser: ClassMap,
}

impl Default for AddressMap {
    fn default() -> Self {
        Self {
            switch: ClassMap {
                status_start: 203,
                command_start: 503,
                stride: 4,
                unit_id: UnitId(4),
                device_count: 5,
            },
            retractable: ClassMap {
                status_start: 267,
                command_start: 567,
                stride: 4,
                unit_id: UnitId(4),
                device_count: 4,
            },
            dispenser: ClassMap {
                status_start: 401,
                command_start: 504,
                stride: 0,
                unit_id: UnitId(5),
                device_count: 1,
            },
        }
    }
}

impl AddressMap {
    pub fn class(&self, class: DeviceClass) -> &ClassMap {
        match class {
            DeviceClass::Switch => &self.switch,
            DeviceClass::Retractable => &self.retractable,
            DeviceClass::Dispenser => &self.dispenser,
        }
    }

    fn class_mut(&mut self, class: DeviceClass) -> &mut ClassMap {
        match class {
            DeviceClass::Switch => &mut self.switch,
            DeviceClass::Retractable => &mut self.retractable,
            DeviceClass::Dispenser => &mut self.dispenser,
        }
    }

    pub fn with_device_count(mut self, class: DeviceClass, count: usize) -> Self {
        self.class_mut(class).device_count = count;
        self
    }

    pub fn device_count(&self, class: DeviceClass) -> usize {
        self.class(class).device_count
    }

    /// Map a device index within `class` to its registers and unit.
    pub fn resolve(&self, class: DeviceClass, index: i64) -> Result<ChannelAddress> {
        let map = self.class(class);
        let out_of_range = || Error::IndexOutOfRange {
            class,
            index,
            count: map.device_count,
        };
        let idx = usize::try_from(index).map_err(|_| out_of_range())?;
        if idx >= map.device_count {
            return Err(out_of_range());
        }
        let offset = u32::from(map.stride) * idx as u32;
        let base = |start: u16| u16::try_from(u32::from(start) + offset).ok();
        let (command_base, status_base) = base(map.command_start)
            .zip(base(map.status_start))
            .ok_or_else(out_of_range)?;
        Ok(ChannelAddress {
            class,
            index: idx,
            command_base,
            status_base,
            unit_id: map.unit_id,
        })
    }
}

/// Resolve against the built-in register map.
pub fn resolve(class: DeviceClass, index: i64) -> Result<ChannelAddress> {
    AddressMap::default().resolve(class, index)
}

pub fn device_count(class: DeviceClass) -> usize {
    AddressMap::default().device_count(class)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_valid_index_resolves() {
        for class in DeviceClass::ALL {
            for idx in 0..device_count(class) {
                assert!(resolve(class, idx as i64).is_ok(), "{class} {idx}");
            }
        }
    }

    #[test]
    fn bounds_are_reported() {
        for class in DeviceClass::ALL {
            let count = device_count(class);
            for bad in [-1, count as i64] {
                let res = resolve(class, bad);
                assert!(
                    matches!(
                        res,
                        Err(Error::IndexOutOfRange { class: c, index, count: n })
                            if c == class && index == bad && n == count
                    ),
                    "{res:?}"
                );
            }
        }
    }

    #[test]
    fn stride_places_devices() -> Result<()> {
        let sw = resolve(DeviceClass::Switch, 1)?;
        assert_eq!((sw.status_base, sw.command_base), (207, 507));
        assert_eq!(sw.unit_id, UnitId(4));

        let rt = resolve(DeviceClass::Retractable, 3)?;
        assert_eq!((rt.status_base, rt.command_base), (279, 579));

        let ds = resolve(DeviceClass::Dispenser, 0)?;
        assert_eq!((ds.status_base, ds.command_base), (401, 504));
        assert_eq!(ds.unit_id, UnitId(5));
        assert_eq!(ds.status_len(), 6);
        Ok(())
    }

    #[test]
    fn configured_count_changes_bounds() {
        let map = AddressMap::default().with_device_count(DeviceClass::Switch, 2);
        assert!(map.resolve(DeviceClass::Switch, 1).is_ok());
        assert!(map.resolve(DeviceClass::Switch, 2).is_err());
    }
}
