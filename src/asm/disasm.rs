//! Disassembler for calculator programs.
//!
//! Converts a program image back to mnemonics the assembler accepts.

use crate::cpu::decode::{lookup, Instruction};
use crate::cpu::Address;

/// Disassemble the instruction at `at`, returning its text and length.
pub fn disassemble_instruction(program: &[u8], at: usize) -> (String, usize) {
    let code = program[at];
    let info = match lookup(code) {
        Some(info) => info,
        None => return (format!("DB 0x{:02X}", code), 1),
    };
    if !info.two_byte {
        return (info.full_mnemonic(), 1);
    }
    match program.get(at + 1) {
        Some(&operand) => {
            let target = Address::from_code(operand);
            let text = if target.to_code() == operand {
                format!("{} {}", info.mnemonic, target)
            } else {
                format!("{} 0x{:02X}", info.mnemonic, operand)
            };
            (text, 2)
        }
        None => (format!("DB 0x{:02X}", code), 1),
    }
}

/// Disassemble a whole program image.
pub fn disassemble(program: &[u8]) -> String {
    let mut output = String::new();
    output.push_str("; MK-52 program\n");
    output.push_str("; -------------\n\n");

    let mut at = 0;
    while at < program.len() {
        let (text, len) = disassemble_instruction(program, at);
        let codes: Vec<String> = program[at..at + len].iter().map(|c| format!("{:02X}", c)).collect();
        let address = Address::new(at).map_or_else(|| format!("{:03}", at), |a| a.to_string());
        output.push_str(&format!("{:<12} ; {}: {}\n", text, address, codes.join(" ")));
        at += len;
    }

    output
}

/// One line per instruction, as decoded values.
pub fn instructions(program: &[u8]) -> Vec<(usize, Instruction)> {
    let mut out = Vec::new();
    let mut at = 0;
    while at < program.len() {
        let code = program[at];
        let two_byte = lookup(code).map_or(false, |i| i.two_byte) && at + 1 < program.len();
        let instr = Instruction {
            opcode: code,
            operand: if two_byte { Some(program[at + 1]) } else { None },
        };
        out.push((at, instr));
        at += if two_byte { 2 } else { 1 };
    }
    out
}
