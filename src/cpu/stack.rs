//! Operand stack.
//!
//! Four slots X, Y, Z, T plus X1, the value X held before the last operation.
//! Typed digits go into an [`EntryBuffer`] laid over X; the buffer becomes a
//! register word as soon as anything reads X.

use serde::{Serialize, Deserialize};
use crate::decimal::{pad_mantissa, ArithmeticError, PackedDecimal, MANTISSA_DIGITS};

/// Field receiving typed digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryField {
    Mantissa,
    Exponent,
}

/// A number being typed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryBuffer {
    digits: Vec<u8>,
    /// Digits before the decimal point, once a point is typed.
    point: Option<usize>,
    negative: bool,
    exponent: u8,
    exponent_negative: bool,
    field: EntryField,
}

impl EntryBuffer {
    fn new() -> Self {
        Self {
            digits: Vec::with_capacity(MANTISSA_DIGITS),
            point: None,
            negative: false,
            exponent: 0,
            exponent_negative: false,
            field: EntryField::Mantissa,
        }
    }

    pub fn field(&self) -> EntryField {
        self.field
    }

    fn add_digit(&mut self, digit: u8) {
        match self.field {
            EntryField::Mantissa => {
                if self.digits == [0] && self.point.is_none() {
                    self.digits[0] = digit;
                } else if self.digits.len() < MANTISSA_DIGITS {
                    self.digits.push(digit);
                }
            }
            EntryField::Exponent => {
                self.exponent = (self.exponent % 10) * 10 + digit;
            }
        }
    }

    fn add_point(&mut self) {
        if self.field != EntryField::Mantissa || self.point.is_some() {
            return;
        }
        if self.digits.is_empty() {
            self.digits.push(0);
        }
        self.point = Some(self.digits.len());
    }

    fn enter_exponent(&mut self) {
        if self.digits.iter().all(|&d| d == 0) {
            self.digits.clear();
            self.digits.push(1);
            self.point = None;
        }
        self.field = EntryField::Exponent;
    }

    fn change_sign(&mut self) {
        match self.field {
            EntryField::Mantissa => self.negative = !self.negative,
            EntryField::Exponent => self.exponent_negative = !self.exponent_negative,
        }
    }

    /// The register word the buffer stands for.
    pub fn value(&self) -> Result<PackedDecimal, ArithmeticError> {
        let magnitude = self.digits.iter().fold(0i64, |acc, &d| acc * 10 + d as i64);
        let whole = self.point.unwrap_or(self.digits.len()) as i32;
        let exponent = if self.exponent_negative {
            -(self.exponent as i32)
        } else {
            self.exponent as i32
        };
        let scale = whole - self.digits.len() as i32 + exponent + 7;
        PackedDecimal::normalize(self.negative, magnitude, scale)
    }

    /// Indicator text while typing.
    pub fn render(&self) -> String {
        let mut text = String::with_capacity(16);
        text.push(if self.negative { '-' } else { ' ' });
        if self.digits.is_empty() {
            text.push('0');
        }
        for (i, d) in self.digits.iter().enumerate() {
            if self.point == Some(i) {
                text.push('.');
            }
            text.push(char::from(b'0' + d));
        }
        if self.point.map_or(true, |p| p == self.digits.len()) {
            text.push('.');
        }
        pad_mantissa(&mut text);
        if self.field == EntryField::Exponent {
            text.push(if self.exponent_negative { '-' } else { ' ' });
            text.push_str(&format!("{:02}", self.exponent));
        } else {
            text.push_str("   ");
        }
        text
    }
}

/// The four-level stack with last-X and the entry buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperandStack {
    pub x: PackedDecimal,
    pub y: PackedDecimal,
    pub z: PackedDecimal,
    pub t: PackedDecimal,
    pub x1: PackedDecimal,
    entry: Option<EntryBuffer>,
    /// Whether new entry lifts the stack first.
    lift: bool,
}

impl OperandStack {
    pub fn new() -> Self {
        Self {
            x: PackedDecimal::zero(),
            y: PackedDecimal::zero(),
            z: PackedDecimal::zero(),
            t: PackedDecimal::zero(),
            x1: PackedDecimal::zero(),
            entry: None,
            lift: true,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Turn an in-progress entry into X.
    pub fn commit_entry(&mut self) -> Result<(), ArithmeticError> {
        if let Some(entry) = self.entry.take() {
            self.x = entry.value()?;
        }
        Ok(())
    }

    /// End of any operation other than push or Cx: commit the entry and
    /// re-enable lift. Returns X.
    pub fn settle_x(&mut self) -> Result<PackedDecimal, ArithmeticError> {
        self.commit_entry()?;
        self.lift = true;
        Ok(self.x)
    }

    fn lift_stack(&mut self) {
        self.t = self.z;
        self.z = self.y;
        self.y = self.x;
    }

    fn begin_entry(&mut self) -> &mut EntryBuffer {
        if self.entry.is_none() {
            if self.lift {
                self.lift_stack();
            }
            self.lift = true;
        }
        self.entry.get_or_insert_with(EntryBuffer::new)
    }

    pub fn add_digit(&mut self, digit: u8) {
        self.begin_entry().add_digit(digit % 10);
    }

    pub fn add_point(&mut self) {
        self.begin_entry().add_point();
    }

    pub fn enter_exponent(&mut self) {
        self.begin_entry().enter_exponent();
    }

    /// Flip the sign of the field being typed, or negate X.
    pub fn change_sign(&mut self) {
        match self.entry.as_mut() {
            Some(entry) => entry.change_sign(),
            None => {
                self.x = self.x.neg();
                self.lift = true;
            }
        }
    }

    /// Stack lift key: X is copied into Y and the next entry overwrites X.
    pub fn push(&mut self) -> Result<(), ArithmeticError> {
        self.commit_entry()?;
        self.x1 = self.x;
        self.x = self.x.normalized();
        self.lift_stack();
        self.lift = false;
        Ok(())
    }

    pub fn clear_x(&mut self) {
        self.entry = None;
        self.x = PackedDecimal::zero();
        self.lift = false;
    }

    pub fn swap(&mut self) -> Result<(), ArithmeticError> {
        self.commit_entry()?;
        self.x1 = self.x;
        std::mem::swap(&mut self.x, &mut self.y);
        self.lift = true;
        Ok(())
    }

    /// (X, Y, Z, T) become (Y, Z, T, X).
    pub fn rotate(&mut self) -> Result<(), ArithmeticError> {
        self.commit_entry()?;
        let out = self.x;
        self.x = self.y;
        self.y = self.z;
        self.z = self.t;
        self.t = out;
        self.x1 = out;
        self.lift = true;
        Ok(())
    }

    /// Last X: lift and bring X1 back into X.
    pub fn restore_x(&mut self) -> Result<(), ArithmeticError> {
        self.commit_entry()?;
        self.lift_stack();
        self.x = self.x1;
        self.lift = true;
        Ok(())
    }

    /// Put a value into X, lifting first unless the last key was push or Cx.
    pub fn recall(&mut self, value: PackedDecimal) -> Result<(), ArithmeticError> {
        self.commit_entry()?;
        if self.lift {
            self.lift_stack();
        }
        self.x = value;
        self.lift = true;
        Ok(())
    }

    /// Copy X into X1 and return it; used by tests on X.
    pub fn observe_x(&mut self) -> Result<PackedDecimal, ArithmeticError> {
        self.commit_entry()?;
        self.x1 = self.x;
        self.lift = true;
        Ok(self.x)
    }

    /// Replace X by `f(X)`.
    ///
    /// X1 takes the old X even when `f` fails; X is only written on success.
    pub fn unary_operation<F>(&mut self, f: F) -> Result<(), ArithmeticError>
    where
        F: FnOnce(&PackedDecimal) -> Result<PackedDecimal, ArithmeticError>,
    {
        self.commit_entry()?;
        self.x1 = self.x;
        self.lift = true;
        self.x = f(&self.x)?;
        Ok(())
    }

    /// Replace X by `f(X, Y)` and drop the stack: Y takes Z, Z takes T, T stays.
    pub fn binary_operation<F>(&mut self, f: F) -> Result<(), ArithmeticError>
    where
        F: FnOnce(&PackedDecimal, &PackedDecimal) -> Result<PackedDecimal, ArithmeticError>,
    {
        self.commit_entry()?;
        self.x1 = self.x;
        self.lift = true;
        let result = f(&self.x, &self.y)?;
        self.x = result;
        self.y = self.z;
        self.z = self.t;
        Ok(())
    }

    /// Replace X by `f(X, Y)` and leave Y, Z and T alone.
    pub fn binary_keep_y_operation<F>(&mut self, f: F) -> Result<(), ArithmeticError>
    where
        F: FnOnce(&PackedDecimal, &PackedDecimal) -> Result<PackedDecimal, ArithmeticError>,
    {
        self.commit_entry()?;
        self.x1 = self.x;
        self.lift = true;
        self.x = f(&self.x, &self.y)?;
        Ok(())
    }

    /// Whether X holds a value the indicator can show.
    pub fn is_valid(&self) -> bool {
        self.entry.is_some() || self.x.is_valid()
    }

    /// Indicator text: the entry buffer while typing, otherwise X.
    pub fn display(&self) -> String {
        match &self.entry {
            Some(entry) => entry.render(),
            None => self.x.render(),
        }
    }
}

impl Default for OperandStack {
    fn default() -> Self {
        Self::new()
    }
}
