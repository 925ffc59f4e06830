//! Program addresses.
//!
//! The program counter walks a ring of 105 cells (00 through A4). Three more
//! cells, A5 through A7, hang off the side of the ring: they can only be
//! reached by a branch and lead back into the ring at 00. Branch operands are
//! two tetrads (tens, units); tens above 9 print as letters, so A4 is 104.

use std::fmt;
use serde::{Serialize, Deserialize};

/// Cells on the main ring.
pub const LINEAR_SIZE: usize = 105;

/// Side-branch cells after the ring.
pub const SIDE_CELLS: usize = 3;

/// Every addressable cell.
pub const MEMORY_SIZE: usize = LINEAR_SIZE + SIDE_CELLS;

/// A position in program memory.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Address(u8);

impl Address {
    pub const ZERO: Address = Address(0);

    /// Address for a cell index, if it exists.
    pub fn new(index: usize) -> Option<Self> {
        if index < MEMORY_SIZE {
            Some(Self(index as u8))
        } else {
            None
        }
    }

    /// Decode a branch operand.
    ///
    /// The operand value is `10 × tens + units`. Values that name a cell land
    /// on it (A5..A7 land on the side branch); larger values wrap past the
    /// whole 108-cell space.
    pub fn from_code(code: u8) -> Self {
        let value = (code >> 4) as usize * 10 + (code & 0x0F) as usize;
        if value < MEMORY_SIZE {
            Self(value as u8)
        } else {
            Self((value - MEMORY_SIZE) as u8)
        }
    }

    /// Encode as a branch operand.
    pub fn to_code(self) -> u8 {
        ((self.0 / 10) << 4) | (self.0 % 10)
    }

    /// Cell index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Whether this is one of the side-branch cells.
    pub fn is_side_branch(self) -> bool {
        self.index() >= LINEAR_SIZE
    }

    /// The address the program counter moves to after this one.
    pub fn next(self) -> Self {
        match self.index() {
            i if i == LINEAR_SIZE - 1 => Self::ZERO,
            i if i == MEMORY_SIZE - 1 => Self::ZERO,
            i => Self(i as u8 + 1),
        }
    }

    /// The address the program counter moves back to.
    pub fn prev(self) -> Self {
        match self.index() {
            0 => Self((LINEAR_SIZE - 1) as u8),
            i if i == LINEAR_SIZE => Self((LINEAR_SIZE - 1) as u8),
            i => Self(i as u8 - 1),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}{}", self.0 / 10, self.0 % 10)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_wraps_at_a4() {
        let last = Address::new(104).unwrap();
        assert_eq!(last.to_string(), "A4");
        assert_eq!(last.next(), Address::ZERO);
        assert_eq!(Address::ZERO.prev(), last);
    }

    #[test]
    fn test_side_branch_rejoins_ring() {
        let a5 = Address::from_code(0xA5);
        assert!(a5.is_side_branch());
        assert_eq!(a5.index(), 105);
        let a6 = a5.next();
        let a7 = a6.next();
        assert_eq!(a7.to_string(), "A7");
        assert_eq!(a7.next(), Address::ZERO);
        assert_eq!(a5.prev().index(), 104);
        assert_eq!(a7.prev(), a6);
    }

    #[test]
    fn test_long_codes_wrap() {
        assert_eq!(Address::from_code(0xA8).index(), 0);
        assert_eq!(Address::from_code(0xB0).index(), 2);
        assert_eq!(Address::from_code(0xFF).index(), 57);
        // Units above 9 carry into the tens.
        assert_eq!(Address::from_code(0x1C).index(), 22);
    }

    #[test]
    fn test_code_round_trip_for_real_cells() {
        for i in 0..MEMORY_SIZE {
            let a = Address::new(i).unwrap();
            assert_eq!(Address::from_code(a.to_code()), a);
        }
        assert!(Address::new(MEMORY_SIZE).is_none());
    }
}
