//! Program memory.
//!
//! 105 ring cells plus the three side-branch cells, one instruction byte each.
//! Programs are entered in programming mode, loaded from a listing, or read
//! back from the EEPROM.

use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::cpu::{Address, MEMORY_SIZE};
use crate::cpu::decode::{self, DecodeError, Instruction};

/// Program store of [`MEMORY_SIZE`] byte cells.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramMemory {
    cells: Vec<u8>,
}

impl ProgramMemory {
    /// Create a memory with all cells zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE],
        }
    }

    /// Read a cell by index.
    ///
    /// # Panics
    /// Panics if the index is outside the memory.
    #[inline]
    pub fn read(&self, index: usize) -> u8 {
        assert!(index < MEMORY_SIZE, "program cell {} out of range (0-{})", index, MEMORY_SIZE - 1);
        self.cells[index]
    }

    /// Write a cell by index.
    ///
    /// # Panics
    /// Panics if the index is outside the memory.
    #[inline]
    pub fn write(&mut self, index: usize, code: u8) {
        assert!(index < MEMORY_SIZE, "program cell {} out of range (0-{})", index, MEMORY_SIZE - 1);
        self.cells[index] = code;
    }

    /// Read the cell at an address.
    #[inline]
    pub fn code_at(&self, at: Address) -> u8 {
        self.cells[at.index()]
    }

    /// Store one code in programming mode.
    #[inline]
    pub fn store_code(&mut self, at: Address, code: u8) {
        self.cells[at.index()] = code;
    }

    /// Fetch the instruction at `pc` and advance `pc` past it.
    ///
    /// Two-byte instructions consume the following cell as their target.
    /// An unknown opcode still advances `pc` by one before the error is
    /// returned.
    pub fn fetch_instruction(&self, pc: &mut Address) -> Result<Instruction, DecodeError> {
        let at = *pc;
        let opcode = self.code_at(at);
        *pc = at.next();

        let info = decode::lookup(opcode).ok_or(DecodeError::UnknownOpcode { code: opcode, at })?;
        if info.two_byte {
            let operand = self.code_at(*pc);
            *pc = pc.next();
            Ok(Instruction { opcode, operand: Some(operand) })
        } else {
            Ok(Instruction::new(opcode))
        }
    }

    /// Zero `count` cells starting at `start`, stopping at the end of memory.
    pub fn erase(&mut self, start: usize, count: usize) {
        let end = start.saturating_add(count).min(MEMORY_SIZE);
        for cell in self.cells.iter_mut().take(end).skip(start) {
            *cell = 0;
        }
    }

    /// Zero every cell.
    pub fn clear(&mut self) {
        self.erase(0, MEMORY_SIZE);
    }

    /// Copy a program into memory starting at cell 0.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        if program.len() > MEMORY_SIZE {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available: MEMORY_SIZE,
            });
        }
        self.cells[..program.len()].copy_from_slice(program);
        Ok(())
    }

    /// All cells in index order.
    pub fn as_bytes(&self) -> &[u8] {
        &self.cells
    }
}

impl Default for ProgramMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProgramMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&c| c != 0).count();
        f.debug_struct("ProgramMemory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}

/// Errors that can occur while loading program memory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let mut mem = ProgramMemory::new();
        mem.write(10, 0x42);
        assert_eq!(mem.read(10), 0x42);
        assert_eq!(mem.code_at(Address::new(10).unwrap()), 0x42);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_memory_bounds() {
        let mem = ProgramMemory::new();
        mem.read(MEMORY_SIZE);
    }

    #[test]
    fn test_fetch_one_and_two_byte() {
        let mut mem = ProgramMemory::new();
        mem.load_program(&[0x10, 0x51, 0x05, 0x50]).unwrap();
        let mut pc = Address::ZERO;

        let add = mem.fetch_instruction(&mut pc).unwrap();
        assert_eq!(add, Instruction::new(0x10));
        assert_eq!(pc.index(), 1);

        let goto = mem.fetch_instruction(&mut pc).unwrap();
        assert_eq!(goto.operand, Some(0x05));
        assert_eq!(goto.target().unwrap().index(), 5);
        assert_eq!(pc.index(), 3);
    }

    #[test]
    fn test_fetch_operand_wraps_ring() {
        let mut mem = ProgramMemory::new();
        mem.write(104, 0x51);
        mem.write(0, 0x12);
        let mut pc = Address::new(104).unwrap();
        let goto = mem.fetch_instruction(&mut pc).unwrap();
        assert_eq!(goto.operand, Some(0x12));
        assert_eq!(pc.index(), 1);
    }

    #[test]
    fn test_fetch_unknown_opcode() {
        let mut mem = ProgramMemory::new();
        mem.write(0, 0xF0);
        let mut pc = Address::ZERO;
        let err = mem.fetch_instruction(&mut pc).unwrap_err();
        assert_eq!(err, DecodeError::UnknownOpcode { code: 0xF0, at: Address::ZERO });
        assert_eq!(pc.index(), 1);
    }

    #[test]
    fn test_load_program_too_large() {
        let mut mem = ProgramMemory::new();
        let program = vec![0u8; MEMORY_SIZE + 1];
        assert_eq!(
            mem.load_program(&program),
            Err(MemoryError::ProgramTooLarge { size: MEMORY_SIZE + 1, available: MEMORY_SIZE })
        );
    }

    #[test]
    fn test_erase_range() {
        let mut mem = ProgramMemory::new();
        mem.load_program(&[1; MEMORY_SIZE]).unwrap();
        mem.erase(100, 50);
        assert_eq!(mem.read(99), 1);
        assert!(mem.as_bytes()[100..].iter().all(|&c| c == 0));
    }
}
