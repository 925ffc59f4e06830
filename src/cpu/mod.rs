//! Arithmetic and control unit of the calculator.
//!
//! This module implements the programmable core:
//! - 105 + 3 program cells with a non-linear address ring
//! - X, Y, Z, T, X1 operand stack with digit entry
//! - 15 registers with indirect counters
//! - 5-deep return stack
//! - 225-opcode instruction set and the execution engine

pub mod address;
pub mod memory;
pub mod decode;
pub mod stack;
pub mod registers;
pub mod call_stack;
pub mod execute;

pub use address::{Address, LINEAR_SIZE, MEMORY_SIZE, SIDE_CELLS};
pub use memory::{MemoryError, ProgramMemory};
pub use decode::{Category, Condition, DecodeError, Instruction, OpcodeInfo, INSTRUCTION_SET};
pub use stack::{EntryBuffer, EntryField, OperandStack};
pub use registers::{RegisterBank, REGISTER_COUNT};
pub use call_stack::{CallStack, CALL_DEPTH};
pub use execute::{
    Engine, EngineError, Key, KeyOutcome, Mode, Observer, Silent, Snapshot, StackSnapshot, Status,
};
