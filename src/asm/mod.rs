//! Assembler and disassembler for MK-52 programs.
//!
//! This module provides:
//! - A two-pass assembler (mnemonics to a program image)
//! - A disassembler (program image to mnemonics)
//! - The hex listing file format

pub mod assembler;
pub mod disasm;
pub mod listing;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, disassemble_instruction};
pub use listing::{Listing, ListingError, load_listing, parse_listing, save_listing};
