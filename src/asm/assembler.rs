//! Mnemonic assembler for calculator programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//! START:  1           ; digit key
//!         B^          ; stack lift
//!         P 3         ; store into R3
//!         IP a        ; recall Ra
//!         x<0 END     ; conditional branch to a label
//!         L0 START    ; loop on R0
//!         BP A4       ; branch to an address (tens may be A)
//!         BP 0xB0     ; raw operand byte
//!         ORG 50      ; continue at cell 50
//!         DB 0x1F     ; raw byte
//! END:    S/P
//! ```
//!
//! Mnemonics are matched without regard to case. The output is a memory
//! image starting at cell 00.

use std::collections::HashMap;
use thiserror::Error;
use crate::cpu::decode::INSTRUCTION_SET;
use crate::cpu::{Address, MEMORY_SIZE, REGISTER_COUNT};

/// Assemble source code to a program image.
pub fn assemble(source: &str) -> Result<Vec<u8>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// How a mnemonic encodes.
#[derive(Debug, Clone, Copy)]
enum Form {
    /// Single byte, no operand.
    Plain(u8),
    /// Register family; the register goes in the low tetrad.
    Indexed(u8),
    /// Opcode followed by a target address.
    Branch(u8),
}

fn mnemonic_table() -> HashMap<String, Form> {
    let mut table = HashMap::new();
    for info in INSTRUCTION_SET.iter().flatten() {
        let form = if info.register_indexed {
            Form::Indexed(info.code & 0xF0)
        } else if info.two_byte {
            Form::Branch(info.code)
        } else {
            Form::Plain(info.code)
        };
        table.entry(info.mnemonic.to_uppercase()).or_insert(form);
    }
    for (alias, code) in [
        ("ENTER", 0x0E),
        ("CHS", 0x0B),
        ("EEX", 0x0C),
        ("LASTX", 0x0F),
        ("SWAP", 0x14),
        ("STOP", 0x50),
        ("RET", 0x52),
    ] {
        table.insert(alias.to_string(), Form::Plain(code));
    }
    table.insert("GOTO".to_string(), Form::Branch(0x51));
    table.insert("CALL".to_string(), Form::Branch(0x53));
    table
}

/// The assembler state.
struct Assembler {
    /// Next cell to fill.
    current_addr: usize,
    /// Symbol table (label -> cell).
    symbols: HashMap<String, usize>,
    /// Operand bytes waiting for a label: (cell, label, source line).
    pending: Vec<(usize, String, usize)>,
    table: HashMap<String, Form>,
    output: Vec<u8>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            current_addr: 0,
            symbols: HashMap::new(),
            pending: Vec::new(),
            table: mnemonic_table(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u8>, AssemblerError> {
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }
        self.resolve_references()?;
        Ok(std::mem::take(&mut self.output))
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let line = match line.find(';') {
            Some(idx) => line[..idx].trim(),
            None => line.trim(),
        };
        if line.is_empty() {
            return Ok(());
        }

        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_uppercase();
            if label.is_empty() || label.contains(char::is_whitespace) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("bad label {:?}", &line[..colon_idx]),
                });
            }
            if self.symbols.insert(label.clone(), self.current_addr).is_some() {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("label {} defined twice", label),
                });
            }
            let rest = line[colon_idx + 1..].trim();
            if rest.is_empty() {
                return Ok(());
            }
            return self.process_instruction(rest, line_num);
        }

        self.process_instruction(line, line_num)
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let mnemonic = parts[0].to_uppercase();
        let operand = parts.get(1).copied();
        if parts.len() > 2 {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("unexpected {:?}", parts[2]),
            });
        }

        match mnemonic.as_str() {
            "ORG" => {
                let value = self.parse_number(require(operand, "ORG", line_num)?, line_num)?;
                if value >= MEMORY_SIZE as i64 || value < 0 {
                    return Err(AssemblerError::ValueOutOfRange { line: line_num, value });
                }
                self.current_addr = value as usize;
            }
            "DB" => {
                let value = self.parse_number(require(operand, "DB", line_num)?, line_num)?;
                let byte = u8::try_from(value)
                    .map_err(|_| AssemblerError::ValueOutOfRange { line: line_num, value })?;
                self.emit(byte, line_num)?;
            }
            _ => {
                let form = *self.table.get(&mnemonic).ok_or_else(|| {
                    AssemblerError::UnknownMnemonic { line: line_num, mnemonic: parts[0].to_string() }
                })?;
                match form {
                    Form::Plain(code) => {
                        if let Some(extra) = operand {
                            return Err(AssemblerError::SyntaxError {
                                line: line_num,
                                message: format!("{} takes no operand, got {:?}", parts[0], extra),
                            });
                        }
                        self.emit(code, line_num)?;
                    }
                    Form::Indexed(base) => {
                        let register = parse_register(require(operand, parts[0], line_num)?, line_num)?;
                        self.emit(base | register, line_num)?;
                    }
                    Form::Branch(code) => {
                        let target = require(operand, parts[0], line_num)?;
                        self.emit(code, line_num)?;
                        let operand_byte = self.parse_target(target, line_num)?;
                        self.emit(operand_byte, line_num)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Operand byte for a branch target; labels are filled in later.
    fn parse_target(&mut self, target: &str, line_num: usize) -> Result<u8, AssemblerError> {
        if let Some(hex) = target.strip_prefix("0x").or_else(|| target.strip_prefix("0X")) {
            let value = i64::from_str_radix(hex, 16).map_err(|_| AssemblerError::SyntaxError {
                line: line_num,
                message: "invalid hex literal".into(),
            })?;
            return u8::try_from(value)
                .map_err(|_| AssemblerError::ValueOutOfRange { line: line_num, value });
        }
        if let Ok(index) = target.parse::<i64>() {
            return cell(index, line_num).map(Address::to_code);
        }
        let chars: Vec<char> = target.chars().collect();
        if let &[tens, units] = chars.as_slice() {
            if let (Some(t), Some(u)) = (tens.to_digit(16), units.to_digit(10)) {
                return cell((t * 10 + u) as i64, line_num).map(Address::to_code);
            }
        }
        self.pending.push((self.current_addr, target.to_uppercase(), line_num));
        Ok(0)
    }

    fn parse_number(&self, operand: &str, line_num: usize) -> Result<i64, AssemblerError> {
        let parsed = match operand.strip_prefix("0x").or_else(|| operand.strip_prefix("0X")) {
            Some(hex) => i64::from_str_radix(hex, 16),
            None => operand.parse::<i64>(),
        };
        parsed.map_err(|_| AssemblerError::SyntaxError {
            line: line_num,
            message: format!("invalid number {:?}", operand),
        })
    }

    fn emit(&mut self, byte: u8, line_num: usize) -> Result<(), AssemblerError> {
        if self.current_addr >= MEMORY_SIZE {
            return Err(AssemblerError::ValueOutOfRange {
                line: line_num,
                value: self.current_addr as i64,
            });
        }
        if self.output.len() <= self.current_addr {
            self.output.resize(self.current_addr + 1, 0);
        }
        self.output[self.current_addr] = byte;
        self.current_addr += 1;
        Ok(())
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for (at, label, line_num) in &self.pending {
            let target = self.symbols.get(label).ok_or_else(|| AssemblerError::UndefinedLabel {
                line: *line_num,
                label: label.clone(),
            })?;
            self.output[*at] = cell(*target as i64, *line_num)?.to_code();
        }
        Ok(())
    }
}

fn require<'a>(operand: Option<&'a str>, what: &str, line_num: usize) -> Result<&'a str, AssemblerError> {
    operand.ok_or_else(|| AssemblerError::SyntaxError {
        line: line_num,
        message: format!("{} requires an operand", what),
    })
}

fn cell(index: i64, line_num: usize) -> Result<Address, AssemblerError> {
    usize::try_from(index)
        .ok()
        .and_then(Address::new)
        .ok_or(AssemblerError::ValueOutOfRange { line: line_num, value: index })
}

/// Register operand: 0-9, a-e, or 10-14.
fn parse_register(operand: &str, line_num: usize) -> Result<u8, AssemblerError> {
    let value = if operand.len() == 1 {
        operand.chars().next().and_then(|c| c.to_digit(16)).map(i64::from)
    } else {
        operand.parse::<i64>().ok()
    };
    match value {
        Some(r) if (0..REGISTER_COUNT as i64).contains(&r) => Ok(r as u8),
        Some(r) => Err(AssemblerError::ValueOutOfRange { line: line_num, value: r }),
        None => Err(AssemblerError::SyntaxError {
            line: line_num,
            message: format!("invalid register {:?}", operand),
        }),
    }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            ; 2 + 3
            2
            B^
            3
            +
            S/P
        "#;
        assert_eq!(assemble(source).unwrap(), vec![0x02, 0x0E, 0x03, 0x10, 0x50]);
    }

    #[test]
    fn test_assemble_registers() {
        let source = "P 3\nIP a\nKP e\nKBP 0\nKx=0 12";
        assert_eq!(assemble(source).unwrap(), vec![0x43, 0x6A, 0xBE, 0x80, 0xEC]);
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
        START:
            IP 1
            L0 START
            BP END
            NOP
        END: S/P
        "#;
        assert_eq!(assemble(source).unwrap(), vec![0x61, 0x5D, 0x00, 0x51, 0x06, 0x54, 0x50]);
    }

    #[test]
    fn test_branch_targets() {
        let source = "BP A4\nPP 12\nx<0 0xB0\nGOTO 107";
        assert_eq!(
            assemble(source).unwrap(),
            vec![0x51, 0xA4, 0x53, 0x12, 0x5C, 0xB0, 0x51, 0xA7]
        );
    }

    #[test]
    fn test_org_and_db() {
        let source = "ORG 3\nDB 0x1F\nDB 255";
        assert_eq!(assemble(source).unwrap(), vec![0, 0, 0, 0x1F, 0xFF]);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(assemble("cx\nE^X\nlg").unwrap(), vec![0x0D, 0x16, 0x17]);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(assemble("FOO"), Err(AssemblerError::UnknownMnemonic { line: 1, .. })));
        assert!(matches!(assemble("BP NOWHERE"), Err(AssemblerError::UndefinedLabel { line: 1, .. })));
        assert!(matches!(assemble("P 15"), Err(AssemblerError::ValueOutOfRange { value: 15, .. })));
        assert!(matches!(assemble("BP 108"), Err(AssemblerError::ValueOutOfRange { value: 108, .. })));
        assert!(matches!(assemble("DB 256"), Err(AssemblerError::ValueOutOfRange { .. })));
        assert!(matches!(assemble("+ 3"), Err(AssemblerError::SyntaxError { .. })));
        assert!(matches!(assemble("A:\nA:"), Err(AssemblerError::SyntaxError { line: 2, .. })));
    }

    #[test]
    fn test_program_too_long() {
        let source = "NOP\n".repeat(MEMORY_SIZE + 1);
        assert!(matches!(assemble(&source), Err(AssemblerError::ValueOutOfRange { .. })));
    }
}
