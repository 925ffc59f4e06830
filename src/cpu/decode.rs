//! Instruction set.
//!
//! Every program step is one byte. Register-indexed families keep the register
//! number in the low tetrad (0..E); branch and loop instructions take a second
//! byte holding the target address. The table below is the compatibility
//! contract for stored programs: codes, widths and families must not change.

use std::fmt;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::cpu::Address;

/// What an opcode does, as far as dispatch is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Digit 0-9 typed into the entry buffer.
    Digit,
    /// Decimal point, sign change, exponent entry.
    Entry,
    /// Stack manipulation: push, swap, rotate, last X, clear X.
    Stack,
    /// One-operand function of X.
    Unary,
    /// Two-operand function that drops Y.
    Binary,
    /// Two-operand function that keeps Y.
    BinaryKeepY,
    /// Pushes a constant or generated value.
    Constant,
    /// X into a register.
    Store,
    /// Register onto the stack.
    Load,
    /// Stop the program.
    Stop,
    /// Unconditional branch.
    Goto,
    /// Subroutine call.
    Call,
    /// Subroutine return.
    Return,
    /// Branch taken when the test on X fails.
    Conditional,
    /// Loop counter L0..L3.
    Loop,
    /// X into the register named by a register.
    IndirectStore,
    /// Register named by a register onto the stack.
    IndirectLoad,
    /// Branch to the address held in a register.
    IndirectGoto,
    /// Call the address held in a register.
    IndirectCall,
    /// Conditional branch to the address held in a register.
    IndirectConditional,
    /// Does nothing.
    NoOp,
}

/// Test applied by conditional branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Negative,
    Zero,
    NotNegative,
    NonZero,
}

impl Condition {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Condition::Negative => "x<0",
            Condition::Zero => "x=0",
            Condition::NotNegative => "x>=0",
            Condition::NonZero => "x!=0",
        }
    }
}

/// Static description of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub code: u8,
    /// Family mnemonic; register-indexed codes append the register digit.
    pub mnemonic: &'static str,
    pub category: Category,
    /// Whether a second byte (branch target) follows.
    pub two_byte: bool,
    /// Whether the low tetrad is a register number.
    pub register_indexed: bool,
    /// Nominal execution time, used only for real-time pacing.
    pub duration_ms: u32,
}

impl OpcodeInfo {
    /// Register number for register-indexed codes.
    pub fn register(&self) -> Option<usize> {
        if self.register_indexed {
            Some((self.code & 0x0F) as usize)
        } else {
            None
        }
    }

    /// Test used by conditional and indirect-conditional codes.
    pub fn condition(&self) -> Option<Condition> {
        match self.category {
            Category::Conditional => match self.code {
                0x57 => Some(Condition::NonZero),
                0x59 => Some(Condition::NotNegative),
                0x5C => Some(Condition::Negative),
                0x5E => Some(Condition::Zero),
                _ => None,
            },
            Category::IndirectConditional => match self.code >> 4 {
                0x7 => Some(Condition::NonZero),
                0x9 => Some(Condition::NotNegative),
                0xC => Some(Condition::Negative),
                0xE => Some(Condition::Zero),
                _ => None,
            },
            _ => None,
        }
    }

    /// Counter register for the loop codes.
    pub fn loop_register(&self) -> Option<usize> {
        match self.code {
            0x5D => Some(0),
            0x5B => Some(1),
            0x58 => Some(2),
            0x5A => Some(3),
            _ => None,
        }
    }

    /// Full mnemonic, including the register digit for indexed codes.
    pub fn full_mnemonic(&self) -> String {
        match self.register() {
            Some(r) => format!("{} {}", self.mnemonic, register_name(r)),
            None => self.mnemonic.to_string(),
        }
    }
}

/// Register digit as printed in listings: 0-9, then a-e.
pub fn register_name(index: usize) -> char {
    std::char::from_digit(index as u32 % 16, 16).unwrap_or('?')
}

const fn op(code: u8, mnemonic: &'static str, category: Category, duration_ms: u32) -> OpcodeInfo {
    OpcodeInfo {
        code,
        mnemonic,
        category,
        two_byte: false,
        register_indexed: false,
        duration_ms,
    }
}

const fn branch(code: u8, mnemonic: &'static str, category: Category) -> OpcodeInfo {
    OpcodeInfo {
        code,
        mnemonic,
        category,
        two_byte: true,
        register_indexed: false,
        duration_ms: 100,
    }
}

const fn indexed(code: u8, mnemonic: &'static str, category: Category, duration_ms: u32) -> OpcodeInfo {
    OpcodeInfo {
        code,
        mnemonic,
        category,
        two_byte: false,
        register_indexed: true,
        duration_ms,
    }
}

const fn describe(code: u8) -> Option<OpcodeInfo> {
    use Category::*;
    let info = match code {
        0x00 => op(code, "0", Digit, 30),
        0x01 => op(code, "1", Digit, 30),
        0x02 => op(code, "2", Digit, 30),
        0x03 => op(code, "3", Digit, 30),
        0x04 => op(code, "4", Digit, 30),
        0x05 => op(code, "5", Digit, 30),
        0x06 => op(code, "6", Digit, 30),
        0x07 => op(code, "7", Digit, 30),
        0x08 => op(code, "8", Digit, 30),
        0x09 => op(code, "9", Digit, 30),
        0x0A => op(code, ".", Entry, 30),
        0x0B => op(code, "/-/", Entry, 30),
        0x0C => op(code, "VP", Entry, 30),
        0x0D => op(code, "Cx", Stack, 30),
        0x0E => op(code, "B^", Stack, 30),
        0x0F => op(code, "Bx", Stack, 30),
        0x10 => op(code, "+", Binary, 60),
        0x11 => op(code, "-", Binary, 60),
        0x12 => op(code, "*", Binary, 90),
        0x13 => op(code, "/", Binary, 150),
        0x14 => op(code, "<->", Stack, 30),
        0x15 => op(code, "10^x", Unary, 500),
        0x16 => op(code, "e^x", Unary, 500),
        0x17 => op(code, "lg", Unary, 700),
        0x18 => op(code, "ln", Unary, 700),
        0x19 => op(code, "arcsin", Unary, 900),
        0x1A => op(code, "arccos", Unary, 900),
        0x1B => op(code, "arctg", Unary, 900),
        0x1C => op(code, "sin", Unary, 800),
        0x1D => op(code, "cos", Unary, 800),
        0x1E => op(code, "tg", Unary, 800),
        0x1F => op(code, "K1F", NoOp, 30),
        0x20 => op(code, "pi", Constant, 30),
        0x21 => op(code, "sqrt", Unary, 300),
        0x22 => op(code, "x^2", Unary, 90),
        0x23 => op(code, "1/x", Unary, 150),
        0x24 => op(code, "x^y", BinaryKeepY, 1200),
        0x25 => op(code, "rot", Stack, 30),
        0x26 => op(code, "->dm", Unary, 300),
        0x27 => op(code, "K27", NoOp, 30),
        0x28 => op(code, "K28", NoOp, 30),
        0x29 => op(code, "K29", NoOp, 30),
        0x2A => op(code, "->dms", Unary, 300),
        0x2B => op(code, "K2B", NoOp, 30),
        0x2C => op(code, "K2C", NoOp, 30),
        0x2D => op(code, "K2D", NoOp, 30),
        0x2E => op(code, "K2E", NoOp, 30),
        0x2F => op(code, "K2F", NoOp, 30),
        0x30 => op(code, "dms->", Unary, 300),
        0x31 => op(code, "|x|", Unary, 30),
        0x32 => op(code, "sgn", Unary, 30),
        0x33 => op(code, "dm->", Unary, 300),
        0x34 => op(code, "[x]", Unary, 60),
        0x35 => op(code, "{x}", Unary, 60),
        0x36 => op(code, "max", Binary, 60),
        0x37 => op(code, "and", BinaryKeepY, 60),
        0x38 => op(code, "or", BinaryKeepY, 60),
        0x39 => op(code, "xor", BinaryKeepY, 60),
        0x3A => op(code, "inv", Unary, 60),
        0x3B => op(code, "rnd", Constant, 60),
        0x40..=0x4E => indexed(code, "P", Store, 30),
        0x50 => op(code, "S/P", Stop, 30),
        0x51 => branch(code, "BP", Goto),
        0x52 => op(code, "V/O", Return, 60),
        0x53 => branch(code, "PP", Call),
        0x54 => op(code, "NOP", NoOp, 30),
        0x55 => op(code, "K1", NoOp, 30),
        0x56 => op(code, "K2", NoOp, 30),
        0x57 => branch(code, "x!=0", Conditional),
        0x58 => branch(code, "L2", Loop),
        0x59 => branch(code, "x>=0", Conditional),
        0x5A => branch(code, "L3", Loop),
        0x5B => branch(code, "L1", Loop),
        0x5C => branch(code, "x<0", Conditional),
        0x5D => branch(code, "L0", Loop),
        0x5E => branch(code, "x=0", Conditional),
        0x60..=0x6E => indexed(code, "IP", Load, 30),
        0x70..=0x7E => indexed(code, "Kx!=0", IndirectConditional, 100),
        0x80..=0x8E => indexed(code, "KBP", IndirectGoto, 100),
        0x90..=0x9E => indexed(code, "Kx>=0", IndirectConditional, 100),
        0xA0..=0xAE => indexed(code, "KPP", IndirectCall, 100),
        0xB0..=0xBE => indexed(code, "KP", IndirectStore, 60),
        0xC0..=0xCE => indexed(code, "Kx<0", IndirectConditional, 100),
        0xD0..=0xDE => indexed(code, "KIP", IndirectLoad, 60),
        0xE0..=0xEE => indexed(code, "Kx=0", IndirectConditional, 100),
        _ => return None,
    };
    Some(info)
}

const fn build_table() -> [Option<OpcodeInfo>; 256] {
    let mut table = [None; 256];
    let mut code = 0;
    while code < 256 {
        table[code] = describe(code as u8);
        code += 1;
    }
    table
}

/// The opcode table, indexed by code.
pub static INSTRUCTION_SET: [Option<OpcodeInfo>; 256] = build_table();

/// Look up an opcode.
#[inline]
pub fn lookup(code: u8) -> Option<&'static OpcodeInfo> {
    INSTRUCTION_SET[code as usize].as_ref()
}

/// Number of defined opcodes.
pub fn defined_count() -> usize {
    INSTRUCTION_SET.iter().filter(|e| e.is_some()).count()
}

/// A fetched instruction: opcode plus the optional target byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: u8,
    pub operand: Option<u8>,
}

impl Instruction {
    pub fn new(opcode: u8) -> Self {
        Self { opcode, operand: None }
    }

    pub fn with_target(opcode: u8, target: Address) -> Self {
        Self { opcode, operand: Some(target.to_code()) }
    }

    /// Table entry for the opcode.
    pub fn info(&self) -> Option<&'static OpcodeInfo> {
        lookup(self.opcode)
    }

    /// Branch target encoded in the second byte.
    pub fn target(&self) -> Option<Address> {
        self.operand.map(Address::from_code)
    }

    /// Encoded bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self.operand {
            Some(operand) => vec![self.opcode, operand],
            None => vec![self.opcode],
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.info() {
            Some(info) => {
                write!(f, "{}", info.full_mnemonic())?;
                if let Some(operand) = self.operand {
                    write!(f, " {:02X}", operand)?;
                }
                Ok(())
            }
            None => write!(f, "?? {:02X}", self.opcode),
        }
    }
}

/// Errors that can occur while decoding a program step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unrecognized opcode {code:02X} at {at}")]
    UnknownOpcode { code: u8, at: Address },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_size() {
        assert_eq!(defined_count(), 225);
        assert!(lookup(0x3C).is_none());
        assert!(lookup(0x4F).is_none());
        assert!(lookup(0xF0).is_none());
        assert!(lookup(0xFF).is_none());
    }

    #[test]
    fn test_codes_match_table_position() {
        for (i, entry) in INSTRUCTION_SET.iter().enumerate() {
            if let Some(info) = entry {
                assert_eq!(info.code as usize, i);
            }
        }
    }

    #[test]
    fn test_two_byte_codes() {
        let two_byte: Vec<u8> = INSTRUCTION_SET
            .iter()
            .flatten()
            .filter(|i| i.two_byte)
            .map(|i| i.code)
            .collect();
        assert_eq!(two_byte, vec![0x51, 0x53, 0x57, 0x58, 0x59, 0x5A, 0x5B, 0x5C, 0x5D, 0x5E]);
    }

    #[test]
    fn test_register_families() {
        let store = lookup(0x4E).unwrap();
        assert_eq!(store.category, Category::Store);
        assert_eq!(store.register(), Some(14));
        assert_eq!(store.full_mnemonic(), "P e");

        let indirect = lookup(0xC3).unwrap();
        assert_eq!(indirect.category, Category::IndirectConditional);
        assert_eq!(indirect.condition(), Some(Condition::Negative));
        assert_eq!(indirect.register(), Some(3));
    }

    #[test]
    fn test_loop_registers() {
        assert_eq!(lookup(0x5D).unwrap().loop_register(), Some(0));
        assert_eq!(lookup(0x5B).unwrap().loop_register(), Some(1));
        assert_eq!(lookup(0x58).unwrap().loop_register(), Some(2));
        assert_eq!(lookup(0x5A).unwrap().loop_register(), Some(3));
    }

    #[test]
    fn test_instruction_display() {
        let goto = Instruction::with_target(0x51, Address::new(104).unwrap());
        assert_eq!(goto.to_string(), "BP A4");
        assert_eq!(goto.to_bytes(), vec![0x51, 0xA4]);
        assert_eq!(Instruction::new(0x63).to_string(), "IP 3");
        assert_eq!(Instruction::new(0xF5).to_string(), "?? F5");
    }
}
