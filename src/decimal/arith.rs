//! Register-word arithmetic.
//!
//! Addition is carried out on the decimal mantissas directly, with the
//! hardware's digit-by-digit half-up rounding. Everything else goes through a
//! native float and back via [`PackedDecimal::value_of`], which limits the
//! result to eight significant digits exactly as the calculator does.

use std::f64::consts::PI;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::decimal::PackedDecimal;
use crate::decimal::MAX_MANTISSA;

/// Angle unit used by the trigonometric family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleMode {
    #[default]
    Radian,
    Gradian,
    Degree,
}

impl AngleMode {
    fn to_radians(self, angle: f64) -> f64 {
        match self {
            AngleMode::Radian => angle,
            AngleMode::Gradian => angle * PI / 200.0,
            AngleMode::Degree => angle * PI / 180.0,
        }
    }

    fn from_radians(self, angle: f64) -> f64 {
        match self {
            AngleMode::Radian => angle,
            AngleMode::Gradian => angle * 200.0 / PI,
            AngleMode::Degree => angle * 180.0 / PI,
        }
    }
}

impl std::str::FromStr for AngleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "r" | "rad" | "radian" | "radians" => Ok(AngleMode::Radian),
            "g" | "grd" | "grad" | "gradian" | "gradians" => Ok(AngleMode::Gradian),
            "d" | "deg" | "degree" | "degrees" => Ok(AngleMode::Degree),
            other => Err(format!("unknown angle mode: {}", other)),
        }
    }
}

/// An operation produced no displayable number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArithmeticError {
    #[error("result is not a finite number")]
    NotFinite,

    #[error("exponent overflow")]
    Overflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("{0} is undefined for this argument")]
    Domain(&'static str),
}

/// Sum of two words.
///
/// The operand with the smaller exponent is shifted toward the other one,
/// rounding half-up at every digit, and the signed mantissas are added. A sum
/// wider than eight digits is rounded down one digit at a time while the
/// exponent grows.
pub fn add(a: &PackedDecimal, b: &PackedDecimal) -> Result<PackedDecimal, ArithmeticError> {
    if a.is_zero() {
        return Ok(*b);
    }
    if b.is_zero() {
        return Ok(*a);
    }

    let (anchor, other) = if a.exponent() >= b.exponent() { (a, b) } else { (b, a) };
    let mut exponent = anchor.exponent();

    let mut shifted = other.mantissa();
    for _ in 0..(exponent - other.exponent()).min(10) {
        shifted = (shifted + 5) / 10;
    }

    let signed = |negative: bool, m: i64| if negative { -m } else { m };
    let sum = signed(anchor.is_negative(), anchor.mantissa()) + signed(other.is_negative(), shifted);

    let mut magnitude = sum.abs();
    while magnitude > MAX_MANTISSA {
        magnitude = (magnitude + 5) / 10;
        exponent += 1;
    }
    PackedDecimal::normalize(sum < 0, magnitude, exponent)
}

/// `a - b`.
#[inline]
pub fn subtract(a: &PackedDecimal, b: &PackedDecimal) -> Result<PackedDecimal, ArithmeticError> {
    add(a, &b.neg())
}

/// `a × b`.
pub fn multiply(a: &PackedDecimal, b: &PackedDecimal) -> Result<PackedDecimal, ArithmeticError> {
    PackedDecimal::value_of(a.to_f64() * b.to_f64())
}

/// `a ÷ b`.
pub fn divide(a: &PackedDecimal, b: &PackedDecimal) -> Result<PackedDecimal, ArithmeticError> {
    if b.is_zero() {
        return Err(ArithmeticError::DivisionByZero);
    }
    PackedDecimal::value_of(a.to_f64() / b.to_f64())
}

/// Flip the sign.
#[inline]
pub fn negate(a: &PackedDecimal) -> PackedDecimal {
    a.neg()
}

/// Absolute value.
#[inline]
pub fn abs(a: &PackedDecimal) -> PackedDecimal {
    a.abs()
}

pub fn sqrt(a: &PackedDecimal) -> Result<PackedDecimal, ArithmeticError> {
    if a.is_negative() && !a.is_zero() {
        return Err(ArithmeticError::Domain("square root"));
    }
    PackedDecimal::value_of(a.to_f64().sqrt())
}

pub fn square(a: &PackedDecimal) -> Result<PackedDecimal, ArithmeticError> {
    let v = a.to_f64();
    PackedDecimal::value_of(v * v)
}

pub fn reciprocal(a: &PackedDecimal) -> Result<PackedDecimal, ArithmeticError> {
    if a.is_zero() {
        return Err(ArithmeticError::DivisionByZero);
    }
    PackedDecimal::value_of(1.0 / a.to_f64())
}

pub fn log10(a: &PackedDecimal) -> Result<PackedDecimal, ArithmeticError> {
    positive(a, "logarithm")?;
    PackedDecimal::value_of(a.to_f64().log10())
}

pub fn ln(a: &PackedDecimal) -> Result<PackedDecimal, ArithmeticError> {
    positive(a, "logarithm")?;
    PackedDecimal::value_of(a.to_f64().ln())
}

pub fn pow10(a: &PackedDecimal) -> Result<PackedDecimal, ArithmeticError> {
    PackedDecimal::value_of(10f64.powf(a.to_f64()))
}

pub fn exp(a: &PackedDecimal) -> Result<PackedDecimal, ArithmeticError> {
    PackedDecimal::value_of(a.to_f64().exp())
}

/// `base ^ exponent`. A negative base needs an integer exponent.
pub fn power(base: &PackedDecimal, exponent: &PackedDecimal) -> Result<PackedDecimal, ArithmeticError> {
    let b = base.to_f64();
    let e = exponent.to_f64();
    if b < 0.0 && e.fract() != 0.0 {
        return Err(ArithmeticError::Domain("power"));
    }
    if b == 0.0 && e < 0.0 {
        return Err(ArithmeticError::DivisionByZero);
    }
    PackedDecimal::value_of(b.powf(e))
}

pub fn sin(a: &PackedDecimal, mode: AngleMode) -> Result<PackedDecimal, ArithmeticError> {
    PackedDecimal::value_of(mode.to_radians(a.to_f64()).sin())
}

pub fn cos(a: &PackedDecimal, mode: AngleMode) -> Result<PackedDecimal, ArithmeticError> {
    PackedDecimal::value_of(mode.to_radians(a.to_f64()).cos())
}

pub fn tan(a: &PackedDecimal, mode: AngleMode) -> Result<PackedDecimal, ArithmeticError> {
    PackedDecimal::value_of(mode.to_radians(a.to_f64()).tan())
}

pub fn arcsin(a: &PackedDecimal, mode: AngleMode) -> Result<PackedDecimal, ArithmeticError> {
    let v = a.to_f64();
    if v.abs() > 1.0 {
        return Err(ArithmeticError::Domain("arcsine"));
    }
    PackedDecimal::value_of(mode.from_radians(v.asin()))
}

pub fn arccos(a: &PackedDecimal, mode: AngleMode) -> Result<PackedDecimal, ArithmeticError> {
    let v = a.to_f64();
    if v.abs() > 1.0 {
        return Err(ArithmeticError::Domain("arccosine"));
    }
    PackedDecimal::value_of(mode.from_radians(v.acos()))
}

pub fn arctan(a: &PackedDecimal, mode: AngleMode) -> Result<PackedDecimal, ArithmeticError> {
    PackedDecimal::value_of(mode.from_radians(a.to_f64().atan()))
}

/// Integer part, truncated toward zero. Exact.
#[inline]
pub fn integer_part(a: &PackedDecimal) -> PackedDecimal {
    a.truncated()
}

/// Fractional part with the sign of the operand. Exact.
pub fn fractional_part(a: &PackedDecimal) -> Result<PackedDecimal, ArithmeticError> {
    subtract(a, &a.truncated())
}

/// The larger operand, or zero when either operand is zero.
pub fn max(a: &PackedDecimal, b: &PackedDecimal) -> PackedDecimal {
    if a.is_zero() || b.is_zero() {
        return PackedDecimal::zero();
    }
    if a.to_f64() >= b.to_f64() {
        *a
    } else {
        *b
    }
}

/// -1, 0 or 1.
pub fn sign(a: &PackedDecimal) -> PackedDecimal {
    if a.is_zero() {
        PackedDecimal::zero()
    } else if a.is_negative() {
        PackedDecimal::from_i64(-1)
    } else {
        PackedDecimal::from_i64(1)
    }
}

/// Decimal degrees to `D.MM` (minutes in the first two fraction digits).
pub fn to_degrees_minutes(a: &PackedDecimal) -> Result<PackedDecimal, ArithmeticError> {
    let (sign, v) = split_sign(a);
    let degrees = v.trunc();
    let minutes = (v - degrees) * 60.0;
    PackedDecimal::value_of(sign * (degrees + minutes / 100.0))
}

/// Decimal degrees to `D.MMSS`.
pub fn to_degrees_minutes_seconds(a: &PackedDecimal) -> Result<PackedDecimal, ArithmeticError> {
    let (sign, v) = split_sign(a);
    let degrees = v.trunc();
    let total_minutes = settle((v - degrees) * 60.0);
    let minutes = total_minutes.trunc();
    let seconds = (total_minutes - minutes) * 60.0;
    PackedDecimal::value_of(sign * (degrees + minutes / 100.0 + seconds / 10_000.0))
}

/// `D.MM` back to decimal degrees.
pub fn from_degrees_minutes(a: &PackedDecimal) -> Result<PackedDecimal, ArithmeticError> {
    let (sign, v) = split_sign(a);
    let degrees = v.trunc();
    let minutes = settle((v - degrees) * 100.0);
    PackedDecimal::value_of(sign * (degrees + minutes / 60.0))
}

/// `D.MMSS` back to decimal degrees.
pub fn from_degrees_minutes_seconds(a: &PackedDecimal) -> Result<PackedDecimal, ArithmeticError> {
    let (sign, v) = split_sign(a);
    let degrees = v.trunc();
    let packed = settle((v - degrees) * 100.0);
    let minutes = packed.trunc();
    let seconds = settle((packed - minutes) * 100.0);
    PackedDecimal::value_of(sign * (degrees + minutes / 60.0 + seconds / 3_600.0))
}

/// Drop binary noise picked up when a decimal fraction is scaled.
fn settle(v: f64) -> f64 {
    (v * 1e6).round() / 1e6
}

fn split_sign(a: &PackedDecimal) -> (f64, f64) {
    let v = a.to_f64();
    (if v < 0.0 { -1.0 } else { 1.0 }, v.abs())
}

fn positive(a: &PackedDecimal, what: &'static str) -> Result<(), ArithmeticError> {
    if a.is_zero() || a.is_negative() {
        return Err(ArithmeticError::Domain(what));
    }
    Ok(())
}

/// Source for the random-number instruction.
///
/// A 64-bit linear congruential generator; each draw yields a seven-digit
/// fraction in `[0, 1)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomSource {
    state: u64,
}

impl RandomSource {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_value(&mut self) -> PackedDecimal {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        let fraction = ((self.state >> 33) % 10_000_000) as i64;
        PackedDecimal::normalize(false, fraction, 0).unwrap_or_else(|_| PackedDecimal::zero())
    }
}
