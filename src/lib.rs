//! # MK-52 Emulator
//!
//! The computing core of the Elektronika MK-61/MK-52 programmable
//! calculators: packed-BCD arithmetic, the four-level operand stack, fifteen
//! registers, a 105-step program memory, and the MK-52 EEPROM block.
//!
//! The [`Engine`] is a plain single-threaded state machine. [`Calculator`]
//! wraps it for callers that run programs in the background while still
//! pressing keys and watching the indicator.

pub mod decimal;
pub mod cpu;
pub mod eeprom;
pub mod config;
pub mod calculator;
pub mod asm;

// Re-export commonly used types
pub use decimal::{AngleMode, ArithmeticError, PackedDecimal};
pub use cpu::{Address, Engine, EngineError, Instruction, Key, KeyOutcome, Mode, Observer, Snapshot, Status};
pub use eeprom::{Eeprom, EepromError, ExchangeMode, Operation};
pub use config::{ConfigError, EngineConfig};
pub use calculator::Calculator;
pub use asm::{assemble, disassemble, AssemblerError, Listing, load_listing, save_listing};
