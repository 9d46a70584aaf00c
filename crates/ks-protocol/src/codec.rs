//! 32-bit values carried in register pairs.
//!
//! The low word always goes first. Swapping the order is a protocol break, so
//! there is deliberately no knob for it.

pub fn pack_u32(value: u32) -> (u16, u16) {
    ((value & 0xFFFF) as u16, (value >> 16) as u16)
}

pub fn unpack_u32(lo: u16, hi: u16) -> u32 {
    u32::from(lo) | (u32::from(hi) << 16)
}

pub fn pack_i32(value: i32) -> (u16, u16) {
    pack_u32(value as u32)
}

pub fn unpack_i32(lo: u16, hi: u16) -> i32 {
    unpack_u32(lo, hi) as i32
}

/// IEEE-754 single precision, bit pattern preserved (NaN payloads included).
pub fn pack_f32(value: f32) -> (u16, u16) {
    pack_u32(value.to_bits())
}

pub fn unpack_f32(lo: u16, hi: u16) -> f32 {
    f32::from_bits(unpack_u32(lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn low_word_first() {
        assert_eq!(pack_i32(10), (10, 0));
        assert_eq!(pack_i32(0x0001_0002), (2, 1));
        assert_eq!(pack_i32(-1), (0xFFFF, 0xFFFF));
        assert_eq!(pack_f32(1.0), (0x0000, 0x3F80));
        assert_eq!(unpack_f32(0x0000, 0xC120), -10.0);
    }

    #[test]
    fn float_edge_values_survive() {
        for f in [0.0_f32, -0.0, f32::MIN_POSITIVE / 2.0, f32::MAX, f32::INFINITY] {
            let (lo, hi) = pack_f32(f);
            assert_eq!(unpack_f32(lo, hi).to_bits(), f.to_bits());
        }
    }

    proptest! {
        #[test]
        fn i32_round_trip(v in any::<i32>()) {
            let (lo, hi) = pack_i32(v);
            prop_assert_eq!(unpack_i32(lo, hi), v);
        }

        #[test]
        fn f32_round_trip_is_bit_exact(bits in any::<u32>()) {
            let f = f32::from_bits(bits);
            let (lo, hi) = pack_f32(f);
            prop_assert_eq!(unpack_f32(lo, hi).to_bits(), bits);
        }
    }
}
