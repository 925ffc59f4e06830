//! Packed-decimal register word.
//!
//! Every stack slot, storage register and EEPROM data line holds the same
//! 48-bit quantity, read as twelve tetrads:
//! - tetrad 0: mantissa sign (0 positive, 9 negative)
//! - tetrads 1-8: mantissa digits, least significant first
//! - tetrad 9: exponent sign
//! - tetrads 10-11: exponent digits, least significant first
//!
//! The value is `±d7.d6d5d4d3d2d1d0 × 10^exp`. Digit tetrads above 9 are
//! legal: logical operations leave them behind and the indicator shows them
//! with letter glyphs.

use std::fmt;
use serde::{Serialize, Deserialize};
use crate::decimal::ArithmeticError;

/// Number of tetrads in a register word.
pub const TETRADS: usize = 12;

/// Number of mantissa digits.
pub const MANTISSA_DIGITS: usize = 8;

/// Largest mantissa magnitude (eight nines).
pub const MAX_MANTISSA: i64 = 99_999_999;

/// Largest exponent magnitude.
pub const MAX_EXPONENT: i32 = 99;

/// Width of the indicator in characters.
pub const DISPLAY_WIDTH: usize = 13;

/// What the indicator shows for an invalid value or a failed operation.
pub const ERROR_DISPLAY: &str = " ЕГГОГ       ";

const SIGN: usize = 0;
const MANTISSA: usize = 1;
const EXP_SIGN: usize = 9;
const EXP_UNITS: usize = 10;
const EXP_TENS: usize = 11;
const NEGATIVE: u8 = 9;
const NORMALIZED_MIN: i64 = 10_000_000;

/// Indicator glyph for each tetrad value.
const GLYPHS: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', '-', 'L', 'C', 'Г', 'E', ' ',
];

/// A packed-decimal register word.
///
/// Values are immutable; every operation returns a new word.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PackedDecimal {
    tetrads: [u8; TETRADS],
}

impl PackedDecimal {
    /// The hardware π constant. The ROM holds it truncated, not rounded.
    pub const PI: PackedDecimal = PackedDecimal {
        tetrads: [0, 6, 2, 9, 5, 1, 4, 1, 3, 0, 0, 0],
    };

    /// Canonical zero.
    #[inline]
    pub const fn zero() -> Self {
        Self { tetrads: [0; TETRADS] }
    }

    /// Build from raw tetrads. Each entry is masked to four bits.
    pub fn from_tetrads(tetrads: [u8; TETRADS]) -> Self {
        let mut masked = tetrads;
        for t in masked.iter_mut() {
            *t &= 0x0F;
        }
        Self { tetrads: masked }
    }

    /// The raw tetrads, in storage order.
    #[inline]
    pub const fn tetrads(&self) -> [u8; TETRADS] {
        self.tetrads
    }

    /// Build from mantissa digits (most significant first) without normalizing.
    pub fn from_digits(negative: bool, digits: [u8; MANTISSA_DIGITS], exponent: i32) -> Self {
        debug_assert!(exponent.abs() <= MAX_EXPONENT, "exponent {} out of range", exponent);
        let mut tetrads = [0u8; TETRADS];
        tetrads[SIGN] = if negative { NEGATIVE } else { 0 };
        for (k, d) in digits.iter().enumerate() {
            tetrads[MANTISSA + MANTISSA_DIGITS - 1 - k] = d & 0x0F;
        }
        let magnitude = exponent.unsigned_abs();
        tetrads[EXP_SIGN] = if exponent < 0 { NEGATIVE } else { 0 };
        tetrads[EXP_UNITS] = (magnitude % 10) as u8;
        tetrads[EXP_TENS] = (magnitude / 10 % 10) as u8;
        Self { tetrads }
    }

    /// Build a normalized word whose value is `magnitude × 10^(exponent - 7)`.
    ///
    /// Magnitudes wider than eight digits are rounded half-up one digit at a
    /// time. Exponent underflow yields zero; overflow is an error.
    pub fn normalize(negative: bool, magnitude: i64, exponent: i32) -> Result<Self, ArithmeticError> {
        let mut magnitude = magnitude.abs();
        let mut exponent = exponent;
        if magnitude == 0 {
            return Ok(Self::zero());
        }
        while magnitude > MAX_MANTISSA {
            magnitude = (magnitude + 5) / 10;
            exponent += 1;
        }
        while magnitude < NORMALIZED_MIN {
            magnitude *= 10;
            exponent -= 1;
        }
        if exponent > MAX_EXPONENT {
            return Err(ArithmeticError::Overflow);
        }
        if exponent < -MAX_EXPONENT {
            return Ok(Self::zero());
        }
        Ok(Self::from_digits(negative, split_digits(magnitude), exponent))
    }

    /// Build from an integer, clamped to eight digits.
    pub fn from_i64(value: i64) -> Self {
        let magnitude = value.abs().min(MAX_MANTISSA);
        Self::normalize(value < 0, magnitude, 7).unwrap_or_else(|_| Self::zero())
    }

    /// Convert a native float, rounding to eight significant digits.
    ///
    /// The float is printed in exponential notation with exactly eight
    /// significant digits, laid out as `±d.dddddddE±ee`, and the tetrads are
    /// read back from fixed character offsets of that text.
    pub fn value_of(value: f64) -> Result<Self, ArithmeticError> {
        if !value.is_finite() {
            return Err(ArithmeticError::NotFinite);
        }
        if value == 0.0 {
            return Ok(Self::zero());
        }

        let scientific = format!("{:.7e}", value.abs());
        let (digits, exponent) = scientific
            .split_once('e')
            .ok_or(ArithmeticError::NotFinite)?;
        let exponent: i32 = exponent.parse().map_err(|_| ArithmeticError::NotFinite)?;
        if exponent > MAX_EXPONENT {
            return Err(ArithmeticError::Overflow);
        }
        if exponent < -MAX_EXPONENT {
            return Ok(Self::zero());
        }

        let text = format!(
            "{}{}E{}{:02}",
            if value < 0.0 { '-' } else { '+' },
            digits,
            if exponent < 0 { '-' } else { '+' },
            exponent.abs()
        );
        Self::parse_scientific(&text)
    }

    /// Read `±d.dddddddE±ee` at fixed offsets.
    fn parse_scientific(text: &str) -> Result<Self, ArithmeticError> {
        let bytes = text.as_bytes();
        if bytes.len() != 14 || !bytes[1].is_ascii_digit() {
            return Err(ArithmeticError::NotFinite);
        }
        let digit = |i: usize| bytes[i].wrapping_sub(b'0') & 0x0F;

        let mut tetrads = [0u8; TETRADS];
        tetrads[SIGN] = if bytes[0] == b'-' { NEGATIVE } else { 0 };
        tetrads[MANTISSA + 7] = digit(1);
        for (k, i) in (3..10).enumerate() {
            tetrads[MANTISSA + 6 - k] = digit(i);
        }
        tetrads[EXP_SIGN] = if bytes[11] == b'-' { NEGATIVE } else { 0 };
        tetrads[EXP_TENS] = digit(12);
        tetrads[EXP_UNITS] = digit(13);
        Ok(Self { tetrads })
    }

    /// Convert to a native float.
    pub fn to_f64(&self) -> f64 {
        if self.is_zero() {
            return 0.0;
        }
        let text = format!(
            "{}{}e{}",
            if self.is_negative() { "-" } else { "" },
            self.mantissa(),
            self.exponent() - 7
        );
        text.parse().unwrap_or(f64::NAN)
    }

    /// Mantissa digits, most significant first.
    pub fn digits(&self) -> [u8; MANTISSA_DIGITS] {
        let mut digits = [0u8; MANTISSA_DIGITS];
        for (k, d) in digits.iter_mut().enumerate() {
            *d = self.tetrads[MANTISSA + MANTISSA_DIGITS - 1 - k];
        }
        digits
    }

    /// Positional value of the mantissa tetrads, ignoring the sign.
    pub fn mantissa(&self) -> i64 {
        self.digits().iter().fold(0i64, |acc, &d| acc * 10 + d as i64)
    }

    /// Signed exponent.
    pub fn exponent(&self) -> i32 {
        let magnitude = self.tetrads[EXP_TENS] as i32 * 10 + self.tetrads[EXP_UNITS] as i32;
        if self.tetrads[EXP_SIGN] != 0 {
            -magnitude
        } else {
            magnitude
        }
    }

    /// Whether the mantissa sign tetrad is set.
    #[inline]
    pub fn is_negative(&self) -> bool {
        self.tetrads[SIGN] != 0
    }

    /// Zero is an all-zero mantissa, whatever the sign and exponent say.
    pub fn is_zero(&self) -> bool {
        self.tetrads[MANTISSA..MANTISSA + MANTISSA_DIGITS]
            .iter()
            .all(|&d| d == 0)
    }

    /// A word is displayable when both exponent tetrads are decimal digits.
    pub fn is_valid(&self) -> bool {
        self.tetrads[EXP_UNITS] <= 9 && self.tetrads[EXP_TENS] <= 9
    }

    /// Flip the mantissa sign tetrad (0 ↔ 9).
    pub fn neg(&self) -> Self {
        let mut tetrads = self.tetrads;
        tetrads[SIGN] = (25 - tetrads[SIGN]) % 16;
        Self { tetrads }
    }

    /// Clear the mantissa sign tetrad.
    pub fn abs(&self) -> Self {
        let mut tetrads = self.tetrads;
        tetrads[SIGN] = 0;
        Self { tetrads }
    }

    /// Shift leading zero digits out of the mantissa.
    ///
    /// Only zero tetrads move; letter tetrads stay where they are.
    pub fn normalized(&self) -> Self {
        if self.is_zero() {
            return Self::zero();
        }
        let mut digits = self.digits();
        let mut exponent = self.exponent();
        while digits[0] == 0 {
            digits.rotate_left(1);
            exponent -= 1;
        }
        if exponent < -MAX_EXPONENT {
            return Self::zero();
        }
        if exponent > MAX_EXPONENT {
            return *self;
        }
        Self::from_digits(self.is_negative(), digits, exponent)
    }

    /// Drop the digits below the decimal point.
    pub fn truncated(&self) -> Self {
        let exponent = self.exponent();
        if self.is_zero() || exponent >= 7 {
            return *self;
        }
        if exponent < 0 {
            return Self::zero();
        }
        let mut digits = self.digits();
        for d in digits.iter_mut().skip(exponent as usize + 1) {
            *d = 0;
        }
        Self::from_digits(self.is_negative(), digits, exponent)
    }

    /// Integer view used by indirect addressing: the truncated integer part,
    /// kept to its eight lowest digits, with the mantissa sign applied.
    pub fn indirect_integer(&self) -> i64 {
        let exponent = self.exponent();
        if self.is_zero() || exponent < 0 {
            return 0;
        }
        let digits = self.digits();
        let whole = (exponent as usize + 1).min(MANTISSA_DIGITS);
        let mut value = digits[..whole]
            .iter()
            .fold(0i64, |acc, &d| (acc * 10 + d as i64) % 100_000_000);
        for _ in MANTISSA_DIGITS..(exponent as usize + 1).min(2 * MANTISSA_DIGITS) {
            value = value * 10 % 100_000_000;
        }
        if self.is_negative() {
            -value
        } else {
            value
        }
    }

    /// Render the 13-character indicator text.
    ///
    /// Exponents 0 through 7 are shown by moving the decimal point; anything
    /// else is shown as `d.ddddddd` followed by a signed two-digit exponent.
    /// Trailing zero digits after the point are dropped.
    pub fn render(&self) -> String {
        if !self.is_valid() {
            return ERROR_DISPLAY.to_string();
        }

        let mut text = String::with_capacity(DISPLAY_WIDTH + 4);
        if self.is_zero() {
            text.push_str(" 0.");
            pad_mantissa(&mut text);
            text.push_str("   ");
            return text;
        }

        let digits = self.digits();
        let exponent = self.exponent();
        let inline = (0..=7).contains(&exponent);
        let point = if inline { exponent as usize + 1 } else { 1 };
        let last = digits
            .iter()
            .rposition(|&d| d != 0)
            .map_or(0, |i| i + 1)
            .max(point);

        text.push(if self.is_negative() { '-' } else { ' ' });
        for (i, &d) in digits[..last].iter().enumerate() {
            if i == point {
                text.push('.');
            }
            text.push(GLYPHS[d as usize & 0x0F]);
        }
        if last == point {
            text.push('.');
        }
        pad_mantissa(&mut text);

        if inline {
            text.push_str("   ");
        } else {
            text.push(if exponent < 0 { '-' } else { ' ' });
            text.push_str(&format!("{:02}", exponent.abs()));
        }
        text
    }
}

/// Split an eight-digit magnitude into digits, most significant first.
fn split_digits(mut magnitude: i64) -> [u8; MANTISSA_DIGITS] {
    let mut digits = [0u8; MANTISSA_DIGITS];
    for d in digits.iter_mut().rev() {
        *d = (magnitude % 10) as u8;
        magnitude /= 10;
    }
    digits
}

/// Pad the sign and mantissa part of the indicator to ten characters.
pub(crate) fn pad_mantissa(text: &mut String) {
    let width = text.chars().count();
    for _ in width..DISPLAY_WIDTH - 3 {
        text.push(' ');
    }
}

/// Indicator glyph for a tetrad.
pub(crate) fn glyph(tetrad: u8) -> char {
    GLYPHS[tetrad as usize & 0x0F]
}

impl fmt::Display for PackedDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}

impl fmt::Debug for PackedDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackedDecimal(")?;
        for t in self.tetrads.iter() {
            write!(f, "{:X}", t)?;
        }
        write!(f, " = {:?})", self.render().trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_value_of_layout() {
        let v = PackedDecimal::value_of(3.1415926).unwrap();
        assert_eq!(v.digits(), [3, 1, 4, 1, 5, 9, 2, 6]);
        assert_eq!(v.exponent(), 0);
        assert!(!v.is_negative());

        let v = PackedDecimal::value_of(-0.00125).unwrap();
        assert_eq!(v.digits(), [1, 2, 5, 0, 0, 0, 0, 0]);
        assert_eq!(v.exponent(), -3);
        assert!(v.is_negative());
        assert_eq!(v.tetrads()[0], 9);
    }

    #[test]
    fn test_value_of_rounds_to_eight_digits() {
        let v = PackedDecimal::value_of(std::f64::consts::PI).unwrap();
        assert_eq!(v.digits(), [3, 1, 4, 1, 5, 9, 2, 7]);
        assert_ne!(v, PackedDecimal::PI);

        let v = PackedDecimal::value_of(9.99999996).unwrap();
        assert_eq!(v.digits(), [1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(v.exponent(), 1);
    }

    #[test]
    fn test_value_of_range() {
        assert_eq!(PackedDecimal::value_of(1e100), Err(ArithmeticError::Overflow));
        assert_eq!(PackedDecimal::value_of(1e-100), Ok(PackedDecimal::zero()));
        assert_eq!(PackedDecimal::value_of(f64::NAN), Err(ArithmeticError::NotFinite));
        assert_eq!(PackedDecimal::value_of(f64::INFINITY), Err(ArithmeticError::NotFinite));
        assert_eq!(PackedDecimal::value_of(-0.0), Ok(PackedDecimal::zero()));
    }

    #[test]
    fn test_render_inline_exponent() {
        assert_eq!(PackedDecimal::from_i64(1234).render(), " 1234.       ");
        assert_eq!(PackedDecimal::from_i64(12345678).render(), " 12345678.   ");
        assert_eq!(PackedDecimal::from_i64(3).render(), " 3.          ");
        assert_eq!(PackedDecimal::from_i64(-40).render(), "-40.         ");
        assert_eq!(PackedDecimal::PI.render(), " 3.1415926   ");
        assert_eq!(PackedDecimal::value_of(2.5).unwrap().render(), " 2.5         ");
    }

    #[test]
    fn test_render_exponent_field() {
        assert_eq!(PackedDecimal::value_of(0.00125).unwrap().render(), " 1.25     -03");
        assert_eq!(PackedDecimal::value_of(1.5e20).unwrap().render(), " 1.5       20");
        assert_eq!(PackedDecimal::value_of(-0.5).unwrap().render(), "-5.       -01");
        assert_eq!(PackedDecimal::zero().render(), " 0.          ");
    }

    #[test]
    fn test_render_width_is_constant() {
        for v in [0.0, 1.0, -1.0, 123.456, 1e-50, -9.9999999e99, 12345678.0] {
            let text = PackedDecimal::value_of(v).unwrap().render();
            assert_eq!(text.chars().count(), DISPLAY_WIDTH, "{:?}", text);
        }
    }

    #[test]
    fn test_render_letter_tetrads() {
        let v = PackedDecimal::from_digits(false, [8, 10, 11, 12, 13, 14, 15, 1], 0);
        assert_eq!(v.render(), " 8.-LCГE 1   ");
    }

    #[test]
    fn test_invalid_exponent_renders_error() {
        let mut tetrads = PackedDecimal::from_i64(5).tetrads();
        tetrads[11] = 0xC;
        let v = PackedDecimal::from_tetrads(tetrads);
        assert!(!v.is_valid());
        assert_eq!(v.render(), ERROR_DISPLAY);
    }

    #[test]
    fn test_zero_ignores_sign_and_exponent() {
        let v = PackedDecimal::from_digits(true, [0; 8], -12);
        assert!(v.is_zero());
        assert_eq!(v.to_f64(), 0.0);
    }

    #[test]
    fn test_normalized_shifts_zero_digits_only() {
        let v = PackedDecimal::from_digits(false, [0, 0, 1, 2, 0, 0, 0, 0], 3);
        let n = v.normalized();
        assert_eq!(n.digits(), [1, 2, 0, 0, 0, 0, 0, 0]);
        assert_eq!(n.exponent(), 1);
        assert_eq!(n.to_f64(), 12.0);
    }

    #[test]
    fn test_truncated() {
        let v = PackedDecimal::value_of(-123.987).unwrap();
        assert_eq!(v.truncated().to_f64(), -123.0);
        assert_eq!(PackedDecimal::value_of(0.75).unwrap().truncated(), PackedDecimal::zero());
    }

    #[test]
    fn test_indirect_integer() {
        assert_eq!(PackedDecimal::value_of(17.9).unwrap().indirect_integer(), 17);
        assert_eq!(PackedDecimal::value_of(-3.2).unwrap().indirect_integer(), -3);
        assert_eq!(PackedDecimal::value_of(0.9).unwrap().indirect_integer(), 0);
        assert_eq!(PackedDecimal::value_of(1.2345e9).unwrap().indirect_integer(), 34_500_000);
    }

    proptest! {
        #[test]
        fn prop_value_of_round_trip(
            digits in 10_000_000i64..=MAX_MANTISSA,
            exponent in -MAX_EXPONENT..=MAX_EXPONENT,
            negative in any::<bool>(),
        ) {
            let x = PackedDecimal::normalize(negative, digits, exponent).unwrap();
            prop_assert_eq!(PackedDecimal::value_of(x.to_f64()).unwrap(), x);
        }

        #[test]
        fn prop_negate_is_involution(tetrads in proptest::array::uniform12(0u8..16)) {
            let x = PackedDecimal::from_tetrads(tetrads);
            prop_assert_eq!(x.neg().neg(), x);
        }
    }
}
