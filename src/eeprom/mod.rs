//! Persistent tetrad store.
//!
//! The EEPROM holds 1024 tetrads and is the only state that survives power
//! off. Exchanges move whole lines of twelve tetrads between the store and
//! either program memory (six steps per line) or the registers (one word per
//! line). Writes are OR-merged: a burned bit stays set until the range is
//! erased.
//!
//! An exchange is prepared in three steps: pick the operation and the mode,
//! select the address from the indicator, then trigger the exchange.

pub mod dump;

use log::debug;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::cpu::{ProgramMemory, RegisterBank, REGISTER_COUNT};
use crate::decimal::{PackedDecimal, TETRADS};

pub use dump::{export_dump, import_dump, load_dump, save_dump};

/// Tetrads in the store.
pub const CAPACITY: usize = 1024;

/// Tetrads per line.
pub const LINE_TETRADS: usize = TETRADS;

/// Program steps per line.
pub const STEPS_PER_LINE: usize = LINE_TETRADS / 2;

/// Largest step count a single exchange covers.
pub const MAX_STEPS: usize = 108;

/// What the next exchange does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Erase,
    #[default]
    Read,
    Write,
}

/// What the next exchange transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeMode {
    #[default]
    Program,
    Data,
}

/// Address and extent of the next exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Selection {
    /// First tetrad.
    pub address: usize,
    /// Program steps, a multiple of [`STEPS_PER_LINE`].
    pub steps: usize,
}

impl Selection {
    /// Read the selection from indicator text.
    ///
    /// Characters 2..6 hold the address and 6..9 the step count; anything
    /// that is not a digit counts as 0. With `1AAAASSS` typed into X the
    /// address is `AAAA` and the step count `SSS`.
    pub fn from_display(display: &str) -> Self {
        let chars: Vec<char> = display.chars().collect();
        let number = |from: usize, to: usize| {
            (from..to).fold(0usize, |acc, i| {
                let digit = chars.get(i).and_then(|c| c.to_digit(10)).unwrap_or(0);
                acc * 10 + digit as usize
            })
        };
        let address = number(2, 6) % CAPACITY;
        let steps = (number(6, 9) / STEPS_PER_LINE * STEPS_PER_LINE).min(MAX_STEPS);
        Self { address, steps }
    }

    /// Lines an exchange covers; never fewer than one.
    pub fn lines(&self) -> usize {
        (self.steps / STEPS_PER_LINE).max(1)
    }

    /// Store index of tetrad `offset` of line `line`.
    fn index(&self, line: usize, offset: usize) -> usize {
        (self.address + line * LINE_TETRADS + offset) % CAPACITY
    }
}

/// The store with its pending exchange settings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eeprom {
    tetrads: Vec<u8>,
    selection: Selection,
    operation: Operation,
    mode: ExchangeMode,
}

impl Eeprom {
    pub fn new() -> Self {
        Self {
            tetrads: vec![0; CAPACITY],
            selection: Selection::default(),
            operation: Operation::default(),
            mode: ExchangeMode::default(),
        }
    }

    /// Raw contents.
    pub fn tetrads(&self) -> &[u8] {
        &self.tetrads
    }

    /// Replace the contents; every tetrad is masked to four bits.
    pub fn load_tetrads(&mut self, tetrads: &[u8]) -> Result<(), EepromError> {
        if tetrads.len() != CAPACITY {
            return Err(EepromError::SizeMismatch { expected: CAPACITY, got: tetrads.len() });
        }
        for (cell, &t) in self.tetrads.iter_mut().zip(tetrads) {
            *cell = t & 0x0F;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.tetrads.iter_mut().for_each(|t| *t = 0);
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn set_operation(&mut self, operation: Operation) {
        self.operation = operation;
    }

    pub fn mode(&self) -> ExchangeMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: ExchangeMode) {
        self.mode = mode;
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// Take the exchange address from indicator text.
    pub fn select(&mut self, display: &str) {
        self.selection = Selection::from_display(display);
        debug!(
            "eeprom: selected address {:04} for {} steps",
            self.selection.address, self.selection.steps
        );
    }

    pub fn read_line(&self, line: usize) -> [u8; LINE_TETRADS] {
        let mut out = [0u8; LINE_TETRADS];
        for (offset, t) in out.iter_mut().enumerate() {
            *t = self.tetrads[self.selection.index(line, offset)];
        }
        out
    }

    /// OR a line into the store.
    pub fn burn_line(&mut self, line: usize, tetrads: &[u8]) -> Result<(), EepromError> {
        check_line(tetrads)?;
        for (offset, &t) in tetrads.iter().enumerate() {
            let index = self.selection.index(line, offset);
            self.tetrads[index] |= t & 0x0F;
        }
        Ok(())
    }

    pub fn erase_line(&mut self, line: usize) {
        for offset in 0..LINE_TETRADS {
            let index = self.selection.index(line, offset);
            self.tetrads[index] = 0;
        }
    }

    /// Run the pending exchange against program memory, the registers and X.
    ///
    /// Data line 0 is X and lines 1 through 15 are R0..RE. Program line `n`
    /// holds cells `6n..6n+6`.
    pub fn exchange(
        &mut self,
        memory: &mut ProgramMemory,
        registers: &mut RegisterBank,
        x: &mut PackedDecimal,
    ) -> Result<(), EepromError> {
        let lines = self.selection.lines();
        debug!(
            "eeprom: {:?} {:?}, {} line(s) at {:04}",
            self.operation, self.mode, lines, self.selection.address
        );
        for line in 0..lines {
            match (self.operation, self.mode) {
                (Operation::Erase, ExchangeMode::Program) => {
                    self.erase_line(line);
                    memory.erase(line * STEPS_PER_LINE, STEPS_PER_LINE);
                }
                (Operation::Erase, ExchangeMode::Data) => {
                    self.erase_line(line);
                    if let Some(r) = data_register(line) {
                        registers.store(r, PackedDecimal::zero());
                    }
                }
                (Operation::Write, ExchangeMode::Program) => {
                    let start = line * STEPS_PER_LINE;
                    let mut steps = [0u8; STEPS_PER_LINE];
                    for (i, step) in steps.iter_mut().enumerate() {
                        if start + i < memory.as_bytes().len() {
                            *step = memory.read(start + i);
                        }
                    }
                    self.burn_line(line, &encode_program_line(&steps))?;
                }
                (Operation::Write, ExchangeMode::Data) => {
                    let value = match line {
                        0 => *x,
                        _ => match data_register(line) {
                            Some(r) => registers.load(r),
                            None => continue,
                        },
                    };
                    self.burn_line(line, &encode_data_line(&value))?;
                }
                (Operation::Read, ExchangeMode::Program) => {
                    let steps = decode_program_line(&self.read_line(line))?;
                    let start = line * STEPS_PER_LINE;
                    for (i, &step) in steps.iter().enumerate() {
                        if start + i < memory.as_bytes().len() {
                            memory.write(start + i, step);
                        }
                    }
                }
                (Operation::Read, ExchangeMode::Data) => {
                    let value = decode_data_line(&self.read_line(line))?;
                    match line {
                        0 => *x = value,
                        _ => {
                            if let Some(r) = data_register(line) {
                                registers.store(r, value);
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for Eeprom {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Eeprom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.tetrads.iter().filter(|&&t| t != 0).count();
        f.debug_struct("Eeprom")
            .field("non_zero_tetrads", &non_zero)
            .field("selection", &self.selection)
            .field("operation", &self.operation)
            .field("mode", &self.mode)
            .finish()
    }
}

/// Register held by a data line, if any.
fn data_register(line: usize) -> Option<usize> {
    if (1..=REGISTER_COUNT).contains(&line) {
        Some(line - 1)
    } else {
        None
    }
}

fn check_line(tetrads: &[u8]) -> Result<(), EepromError> {
    if tetrads.len() != LINE_TETRADS {
        return Err(EepromError::MalformedLine { expected: LINE_TETRADS, got: tetrads.len() });
    }
    Ok(())
}

/// Six program steps as a line.
///
/// Each step becomes `[low, high]`; the first step's pair goes to the end.
pub fn encode_program_line(steps: &[u8]) -> [u8; LINE_TETRADS] {
    let mut line = [0u8; LINE_TETRADS];
    for (i, &step) in steps.iter().take(STEPS_PER_LINE).enumerate() {
        let slot = (i + STEPS_PER_LINE - 1) % STEPS_PER_LINE;
        line[2 * slot] = step & 0x0F;
        line[2 * slot + 1] = step >> 4;
    }
    line
}

/// Inverse of [`encode_program_line`].
pub fn decode_program_line(tetrads: &[u8]) -> Result<[u8; STEPS_PER_LINE], EepromError> {
    check_line(tetrads)?;
    let mut steps = [0u8; STEPS_PER_LINE];
    for (i, step) in steps.iter_mut().enumerate() {
        let slot = (i + STEPS_PER_LINE - 1) % STEPS_PER_LINE;
        *step = (tetrads[2 * slot] & 0x0F) | ((tetrads[2 * slot + 1] & 0x0F) << 4);
    }
    Ok(steps)
}

/// A register word as a line, tetrad for tetrad.
pub fn encode_data_line(value: &PackedDecimal) -> [u8; LINE_TETRADS] {
    value.tetrads()
}

/// Inverse of [`encode_data_line`].
pub fn decode_data_line(tetrads: &[u8]) -> Result<PackedDecimal, EepromError> {
    check_line(tetrads)?;
    let mut word = [0u8; LINE_TETRADS];
    word.copy_from_slice(tetrads);
    Ok(PackedDecimal::from_tetrads(word))
}

/// Errors from the store and its dump format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EepromError {
    #[error("line has {got} tetrads, expected {expected}")]
    MalformedLine { expected: usize, got: usize },

    #[error("invalid hex digit {token:?} on line {line}")]
    InvalidDigit { line: usize, token: String },

    #[error("dump holds {got} tetrads, expected {expected}")]
    SizeMismatch { expected: usize, got: usize },

    #[error("I/O error: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_from_display() {
        let sel = Selection::from_display(" 10012030.   ");
        assert_eq!(sel, Selection { address: 12, steps: 30 });
        assert_eq!(sel.lines(), 5);

        let floored = Selection::from_display(" 10000013.   ");
        assert_eq!(floored.steps, 12);

        let capped = Selection::from_display(" 10000999.   ");
        assert_eq!(capped.steps, MAX_STEPS);
        assert_eq!(capped.lines(), 18);

        let six = Selection::from_display(" 10000006.   ");
        assert_eq!(six, Selection { address: 0, steps: 6 });
        assert_eq!(six.lines(), 1);

        // The digits are read by position; a typed point shifts them.
        let pointed = Selection::from_display(" 1.0000006   ");
        assert_eq!(pointed, Selection { address: 0, steps: 0 });

        let zero = Selection::from_display(" 0.          ");
        assert_eq!(zero, Selection { address: 0, steps: 0 });
        assert_eq!(zero.lines(), 1);
    }

    #[test]
    fn test_address_wraps_capacity() {
        let sel = Selection::from_display(" 11030006.   ");
        assert_eq!(sel.address, 1030 % CAPACITY);
    }

    #[test]
    fn test_program_line_rotation() {
        let line = encode_program_line(&[0x10, 0x21, 0x32, 0x43, 0x54, 0x65]);
        assert_eq!(line, [1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 0, 1]);
        assert_eq!(decode_program_line(&line).unwrap(), [0x10, 0x21, 0x32, 0x43, 0x54, 0x65]);
    }

    #[test]
    fn test_malformed_line_rejected() {
        assert_eq!(
            decode_program_line(&[0; 11]),
            Err(EepromError::MalformedLine { expected: 12, got: 11 })
        );
        let mut eeprom = Eeprom::new();
        assert!(eeprom.burn_line(0, &[1; 13]).is_err());
    }

    #[test]
    fn test_burn_is_or_merge() {
        let mut eeprom = Eeprom::new();
        eeprom.burn_line(0, &[0b0101; LINE_TETRADS]).unwrap();
        eeprom.burn_line(0, &[0b0011; LINE_TETRADS]).unwrap();
        assert_eq!(eeprom.read_line(0), [0b0111; LINE_TETRADS]);
        eeprom.erase_line(0);
        assert_eq!(eeprom.read_line(0), [0; LINE_TETRADS]);
    }

    #[test]
    fn test_line_wraps_end_of_store() {
        let mut eeprom = Eeprom::new();
        eeprom.select(" 11020012.   ");
        eeprom.burn_line(0, &[7; LINE_TETRADS]).unwrap();
        assert_eq!(eeprom.tetrads()[1020..], [7, 7, 7, 7]);
        assert!(eeprom.tetrads()[..8].iter().all(|&t| t == 7));
    }

    #[test]
    fn test_program_exchange() {
        let mut memory = ProgramMemory::new();
        let mut registers = RegisterBank::new();
        let mut x = PackedDecimal::zero();
        let program: Vec<u8> = (1..=12).collect();
        memory.load_program(&program).unwrap();

        let mut eeprom = Eeprom::new();
        eeprom.select(" 10100012.   ");
        eeprom.set_operation(Operation::Write);
        eeprom.exchange(&mut memory, &mut registers, &mut x).unwrap();
        assert_eq!(eeprom.tetrads()[100..112], [2, 0, 3, 0, 4, 0, 5, 0, 6, 0, 1, 0]);

        memory.clear();
        eeprom.set_operation(Operation::Read);
        eeprom.exchange(&mut memory, &mut registers, &mut x).unwrap();
        assert_eq!(&memory.as_bytes()[..12], program.as_slice());

        eeprom.set_operation(Operation::Erase);
        eeprom.exchange(&mut memory, &mut registers, &mut x).unwrap();
        assert!(memory.as_bytes().iter().all(|&c| c == 0));
        assert!(eeprom.tetrads().iter().all(|&t| t == 0));
    }

    #[test]
    fn test_data_exchange() {
        let mut memory = ProgramMemory::new();
        let mut registers = RegisterBank::new();
        let mut x = PackedDecimal::PI;
        registers.store(0, PackedDecimal::from_i64(42));

        let mut eeprom = Eeprom::new();
        eeprom.set_mode(ExchangeMode::Data);
        eeprom.select(" 10000012.   ");
        eeprom.set_operation(Operation::Write);
        eeprom.exchange(&mut memory, &mut registers, &mut x).unwrap();

        x = PackedDecimal::zero();
        registers.reset();
        eeprom.set_operation(Operation::Read);
        eeprom.exchange(&mut memory, &mut registers, &mut x).unwrap();
        assert_eq!(x, PackedDecimal::PI);
        assert_eq!(registers.load(0), PackedDecimal::from_i64(42));
    }
}
