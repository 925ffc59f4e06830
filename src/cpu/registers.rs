//! Addressable registers R0..RE.
//!
//! Fifteen cells hold full register words. When a register is used as an
//! indirect address or a loop counter its content changes as a side effect:
//! - R0..R3 count down toward zero; zero wraps to -99 999 999
//! - R4..R6 count up; overflow past 99 999 999 resets to zero
//! - R7..RE are left alone

use serde::{Serialize, Deserialize};
use crate::cpu::Address;
use crate::decimal::{PackedDecimal, MAX_MANTISSA};

/// Number of addressable registers.
pub const REGISTER_COUNT: usize = 15;

/// The register bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterBank {
    cells: [PackedDecimal; REGISTER_COUNT],
}

impl RegisterBank {
    pub fn new() -> Self {
        Self {
            cells: [PackedDecimal::zero(); REGISTER_COUNT],
        }
    }

    /// Zero every register.
    pub fn reset(&mut self) {
        self.cells = [PackedDecimal::zero(); REGISTER_COUNT];
    }

    pub fn store(&mut self, index: usize, value: PackedDecimal) {
        self.cells[index % REGISTER_COUNT] = value;
    }

    pub fn load(&self, index: usize) -> PackedDecimal {
        self.cells[index % REGISTER_COUNT]
    }

    /// Read a register for indirect use, applying its counter rule.
    ///
    /// Returns the integer the register holds after the update. Registers
    /// 7 and up return their integer value unchanged.
    pub fn modify_and_get(&mut self, index: usize) -> i64 {
        let index = index % REGISTER_COUNT;
        let value = self.cells[index].indirect_integer();
        let updated = match index {
            0..=3 => {
                if value == 0 {
                    -MAX_MANTISSA
                } else {
                    value - value.signum()
                }
            }
            4..=6 => {
                let magnitude = value.abs() + 1;
                if magnitude > MAX_MANTISSA {
                    0
                } else if value < 0 {
                    -magnitude
                } else {
                    magnitude
                }
            }
            _ => return value,
        };
        self.cells[index] = PackedDecimal::from_i64(updated);
        updated
    }

    /// Register number named by register `index`.
    pub fn indirect_register(&mut self, index: usize) -> usize {
        register_from_integer(self.modify_and_get(index))
    }

    /// Branch target named by register `index`.
    pub fn indirect_address(&mut self, index: usize) -> Address {
        address_from_integer(self.modify_and_get(index))
    }

    /// Indicator text of every register.
    pub fn render_all(&self) -> Vec<String> {
        self.cells.iter().map(PackedDecimal::render).collect()
    }
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

/// Register number for an indirect integer.
pub fn register_from_integer(value: i64) -> usize {
    (value.unsigned_abs() % REGISTER_COUNT as u64) as usize
}

/// Branch target for an indirect integer: its two lowest digits form the operand code.
pub fn address_from_integer(value: i64) -> Address {
    let magnitude = value.unsigned_abs();
    let units = (magnitude % 10) as u8;
    let tens = (magnitude / 10 % 10) as u8;
    Address::from_code((tens << 4) | units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn int(v: i64) -> PackedDecimal {
        PackedDecimal::from_i64(v)
    }

    #[test]
    fn test_store_load_wraps_index() {
        let mut bank = RegisterBank::new();
        bank.store(16, int(7));
        assert_eq!(bank.load(1), int(7));
    }

    #[test]
    fn test_descending_counter() {
        let mut bank = RegisterBank::new();
        bank.store(0, int(3));
        assert_eq!(bank.modify_and_get(0), 2);
        assert_eq!(bank.modify_and_get(0), 1);
        assert_eq!(bank.modify_and_get(0), 0);
        assert_eq!(bank.modify_and_get(0), -99_999_999);
        assert_eq!(bank.modify_and_get(0), -99_999_998);
        assert_eq!(bank.load(0), int(-99_999_998));
    }

    #[test]
    fn test_ascending_counter() {
        let mut bank = RegisterBank::new();
        bank.store(4, int(-2));
        assert_eq!(bank.modify_and_get(4), -3);
        bank.store(5, int(99_999_999));
        assert_eq!(bank.modify_and_get(5), 0);
        assert_eq!(bank.modify_and_get(5), 1);
    }

    #[test]
    fn test_high_registers_untouched() {
        let mut bank = RegisterBank::new();
        let value = PackedDecimal::value_of(12.75).unwrap();
        bank.store(7, value);
        assert_eq!(bank.modify_and_get(7), 12);
        assert_eq!(bank.load(7), value);
    }

    #[test]
    fn test_indirect_targets() {
        let mut bank = RegisterBank::new();
        bank.store(9, int(1234));
        assert_eq!(bank.indirect_address(9).to_string(), "34");
        assert_eq!(bank.indirect_register(9), 1234 % 15);
        bank.store(1, int(18));
        assert_eq!(bank.indirect_register(1), 2);
        assert_eq!(bank.load(1), int(17));
    }

    #[test]
    fn test_descending_magnitude_strictly_decreases() {
        let mut bank = RegisterBank::new();
        bank.store(2, int(-40));
        let mut last = 40;
        for _ in 0..40 {
            let next = bank.modify_and_get(2).abs();
            assert!(next < last);
            last = next;
        }
        assert_eq!(last, 0);
    }

    proptest! {
        #[test]
        fn prop_descending_step(index in 0usize..=3, v in -MAX_MANTISSA..=MAX_MANTISSA) {
            let mut bank = RegisterBank::new();
            bank.store(index, int(v));
            let got = bank.modify_and_get(index);
            if v == 0 {
                prop_assert_eq!(got, -MAX_MANTISSA);
            } else {
                prop_assert_eq!(got.abs(), v.abs() - 1);
                prop_assert!(got == 0 || got.signum() == v.signum());
            }
            prop_assert_eq!(bank.load(index), int(got));
        }

        #[test]
        fn prop_descending_walk_reaches_wrap(index in 0usize..=3, v in -60i64..=60) {
            let mut bank = RegisterBank::new();
            bank.store(index, int(v));
            let mut last = v.abs();
            for _ in 0..v.abs() {
                let next = bank.modify_and_get(index).abs();
                prop_assert!(next < last);
                last = next;
            }
            prop_assert_eq!(last, 0);
            prop_assert_eq!(bank.modify_and_get(index), -MAX_MANTISSA);
        }

        #[test]
        fn prop_ascending_step(index in 4usize..=6, v in -MAX_MANTISSA..=MAX_MANTISSA) {
            let mut bank = RegisterBank::new();
            bank.store(index, int(v));
            let got = bank.modify_and_get(index);
            let expected = if v.abs() == MAX_MANTISSA {
                0
            } else if v < 0 {
                v - 1
            } else {
                v + 1
            };
            prop_assert_eq!(got, expected);
            prop_assert_eq!(bank.load(index), int(expected));
        }
    }
}
