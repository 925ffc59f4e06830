//! Packed-decimal number system.
//!
//! This module provides the register word and everything that operates on it:
//! - [`PackedDecimal`] - the 12-tetrad sign/mantissa/exponent word
//! - [`arith`] - arithmetic, transcendental and conversion functions
//! - [`Logical`] / [`Value`] - the logical view used by AND/OR/XOR/NOT

mod packed;
pub mod arith;
pub mod logic;

pub use packed::{
    PackedDecimal, DISPLAY_WIDTH, ERROR_DISPLAY, MANTISSA_DIGITS, MAX_EXPONENT, MAX_MANTISSA,
    TETRADS,
};
pub(crate) use packed::{glyph, pad_mantissa};
pub use arith::{AngleMode, ArithmeticError, RandomSource};
pub use logic::{Logical, Value};
