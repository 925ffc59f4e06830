//! Tetrad-wise logical operations.
//!
//! The logical instructions ignore sign and exponent and work on the seven
//! mantissa tetrads after the leading one. Their result is marked by an `8` in
//! the leading position, so a logical value reads `8.ddddddd` on the indicator
//! with letter glyphs for tetrads above 9.

use serde::{Serialize, Deserialize};
use crate::decimal::PackedDecimal;
use crate::decimal::{MANTISSA_DIGITS, TETRADS};

/// Leading digit that marks a logical value.
pub const MARKER: u8 = 8;

/// Number of tetrads taking part in a logical operation.
pub const LOGICAL_DIGITS: usize = 7;

/// The seven-tetrad logical view of a register word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Logical {
    /// Most significant first.
    digits: [u8; LOGICAL_DIGITS],
}

impl Logical {
    pub fn new(digits: [u8; LOGICAL_DIGITS]) -> Self {
        let mut masked = digits;
        for d in masked.iter_mut() {
            *d &= 0x0F;
        }
        Self { digits: masked }
    }

    /// Take the mantissa tetrads after the leading one.
    pub fn from_decimal(value: &PackedDecimal) -> Self {
        let mantissa = value.digits();
        let mut digits = [0u8; LOGICAL_DIGITS];
        digits.copy_from_slice(&mantissa[1..]);
        Self { digits }
    }

    pub fn digits(&self) -> [u8; LOGICAL_DIGITS] {
        self.digits
    }

    /// The register word `8.ddddddd`, positive, exponent zero.
    pub fn to_decimal(&self) -> PackedDecimal {
        let mut mantissa = [0u8; MANTISSA_DIGITS];
        mantissa[0] = MARKER;
        mantissa[1..].copy_from_slice(&self.digits);
        PackedDecimal::from_digits(false, mantissa, 0)
    }

    pub fn and(&self, other: &Self) -> Self {
        self.zip(other, |a, b| a & b)
    }

    pub fn or(&self, other: &Self) -> Self {
        self.zip(other, |a, b| a | b)
    }

    pub fn xor(&self, other: &Self) -> Self {
        self.zip(other, |a, b| a ^ b)
    }

    /// Complement each tetrad.
    pub fn not(&self) -> Self {
        let mut digits = self.digits;
        for d in digits.iter_mut() {
            *d = 0x0F - *d;
        }
        Self { digits }
    }

    fn zip(&self, other: &Self, f: impl Fn(u8, u8) -> u8) -> Self {
        let mut digits = [0u8; LOGICAL_DIGITS];
        for (i, d) in digits.iter_mut().enumerate() {
            *d = f(self.digits[i], other.digits[i]) & 0x0F;
        }
        Self { digits }
    }
}

/// A register word seen either as a decimal number or as a logical value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Decimal(PackedDecimal),
    Logical(Logical),
}

impl Value {
    /// Indicator text.
    pub fn render(&self) -> String {
        self.to_decimal().render()
    }

    /// The register word that holds this value.
    pub fn to_decimal(&self) -> PackedDecimal {
        match self {
            Value::Decimal(d) => *d,
            Value::Logical(l) => l.to_decimal(),
        }
    }

    /// Raw tetrads, as written to an EEPROM data line.
    pub fn to_tetrads(&self) -> [u8; TETRADS] {
        self.to_decimal().tetrads()
    }

    pub fn is_valid(&self) -> bool {
        match self {
            Value::Decimal(d) => d.is_valid(),
            Value::Logical(_) => true,
        }
    }
}

impl From<PackedDecimal> for Value {
    fn from(value: PackedDecimal) -> Self {
        Value::Decimal(value)
    }
}

impl From<Logical> for Value {
    fn from(value: Logical) -> Self {
        Value::Logical(value)
    }
}

/// Tetrad-wise AND of two register words.
pub fn and(a: &PackedDecimal, b: &PackedDecimal) -> PackedDecimal {
    Value::from(Logical::from_decimal(a).and(&Logical::from_decimal(b))).to_decimal()
}

/// Tetrad-wise OR of two register words.
pub fn or(a: &PackedDecimal, b: &PackedDecimal) -> PackedDecimal {
    Value::from(Logical::from_decimal(a).or(&Logical::from_decimal(b))).to_decimal()
}

/// Tetrad-wise XOR of two register words.
pub fn xor(a: &PackedDecimal, b: &PackedDecimal) -> PackedDecimal {
    Value::from(Logical::from_decimal(a).xor(&Logical::from_decimal(b))).to_decimal()
}

/// Tetrad-wise complement of a register word.
pub fn not(a: &PackedDecimal) -> PackedDecimal {
    Value::from(Logical::from_decimal(a).not()).to_decimal()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logical(digits: [u8; 8]) -> PackedDecimal {
        PackedDecimal::from_digits(false, digits, 0)
    }

    #[test]
    fn test_and_or_xor() {
        let a = logical([8, 1, 2, 3, 4, 5, 6, 7]);
        let b = logical([8, 7, 6, 5, 4, 3, 2, 1]);
        assert_eq!(and(&a, &b).digits(), [8, 1, 2, 1, 4, 1, 2, 1]);
        assert_eq!(or(&a, &b).digits(), [8, 7, 6, 7, 4, 7, 6, 7]);
        assert_eq!(xor(&a, &b).digits(), [8, 6, 4, 6, 0, 6, 4, 6]);
    }

    #[test]
    fn test_not_renders_letters() {
        let a = logical([8, 0, 1, 2, 3, 4, 5, 9]);
        let r = not(&a);
        assert_eq!(r.digits(), [8, 15, 14, 13, 12, 11, 10, 6]);
        assert_eq!(r.render(), " 8. EГCL-6   ");
    }

    #[test]
    fn test_leading_digit_and_exponent_ignored() {
        let a = PackedDecimal::value_of(-3.5e12).unwrap();
        assert_eq!(Logical::from_decimal(&a).digits(), [5, 0, 0, 0, 0, 0, 0]);
        let r = or(&a, &a);
        assert!(!r.is_negative());
        assert_eq!(r.exponent(), 0);
        assert_eq!(r.digits()[0], MARKER);
    }

    #[test]
    fn test_value_variants_agree() {
        let l = Logical::new([1, 2, 3, 4, 5, 6, 7]);
        let v = Value::from(l);
        assert!(v.is_valid());
        assert_eq!(v.to_decimal(), Value::from(l.to_decimal()).to_decimal());
        assert_eq!(v.to_tetrads()[8], MARKER);
    }
}
