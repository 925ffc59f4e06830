//! Subroutine return stack.
//!
//! Five slots, no overflow detection. A push overwrites the deepest entry;
//! a pop leaves the deepest entry in place, so it shows up twice.

use serde::{Serialize, Deserialize};
use crate::cpu::Address;

/// Depth of the return stack.
pub const CALL_DEPTH: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallStack {
    slots: [Address; CALL_DEPTH],
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.slots = [Address::ZERO; CALL_DEPTH];
    }

    pub fn push(&mut self, return_to: Address) {
        self.slots.copy_within(0..CALL_DEPTH - 1, 1);
        self.slots[0] = return_to;
    }

    pub fn pop(&mut self) -> Address {
        let top = self.slots[0];
        self.slots.copy_within(1..CALL_DEPTH, 0);
        top
    }

    /// Entries from the most recent call outward.
    pub fn entries(&self) -> [Address; CALL_DEPTH] {
        self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(i: usize) -> Address {
        Address::new(i).unwrap()
    }

    #[test]
    fn test_push_pop_order() {
        let mut calls = CallStack::new();
        calls.push(at(10));
        calls.push(at(20));
        assert_eq!(calls.pop(), at(20));
        assert_eq!(calls.pop(), at(10));
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let mut calls = CallStack::new();
        for i in 1..=6 {
            calls.push(at(i));
        }
        assert_eq!(calls.entries(), [at(6), at(5), at(4), at(3), at(2)]);
    }

    #[test]
    fn test_pop_duplicates_deepest() {
        let mut calls = CallStack::new();
        for i in 1..=5 {
            calls.push(at(i));
        }
        calls.pop();
        assert_eq!(calls.entries(), [at(4), at(3), at(2), at(1), at(1)]);
        for _ in 0..4 {
            calls.pop();
        }
        // The oldest return address keeps coming back.
        assert_eq!(calls.pop(), at(1));
    }
}
