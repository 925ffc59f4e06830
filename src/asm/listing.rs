//! Hex listing format for program images.
//!
//! A listing is plain text:
//! - Each line holds one or more hex byte codes (`51 A4`)
//! - Anything after `;` is a comment
//! - Blank lines are ignored

use std::io::Write;
use std::path::Path;
use thiserror::Error;
use crate::asm::disasm::disassemble_instruction;
use crate::cpu::{Address, MEMORY_SIZE};

/// A loaded program listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    /// Program bytes, from address 00 up.
    pub codes: Vec<u8>,
    /// Source line each byte came from.
    pub source_lines: Vec<String>,
}

impl Listing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a listing from a program image.
    pub fn from_codes(codes: &[u8]) -> Self {
        Self {
            codes: codes.to_vec(),
            source_lines: codes.iter().map(|c| format!("{:02X}", c)).collect(),
        }
    }

    pub fn push(&mut self, code: u8, source: &str) {
        self.codes.push(code);
        self.source_lines.push(source.to_string());
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Render as text, one instruction per line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("; MK-52 program listing\n");
        out.push_str(&format!("; {} cells\n\n", self.len()));
        let mut at = 0;
        while at < self.codes.len() {
            let (text, len) = disassemble_instruction(&self.codes, at);
            let codes: Vec<String> =
                self.codes[at..at + len].iter().map(|c| format!("{:02X}", c)).collect();
            let address = Address::new(at).map_or_else(|| format!("{:03}", at), |a| a.to_string());
            out.push_str(&format!("{:<6}; {}: {}\n", codes.join(" "), address, text));
            at += len;
        }
        out
    }
}

/// Parse listing text.
pub fn parse_listing(text: &str) -> Result<Listing, ListingError> {
    let mut listing = Listing::new();

    for (line_num, line) in text.lines().enumerate() {
        let body = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let trimmed = body.trim();
        if trimmed.is_empty() {
            continue;
        }

        for token in trimmed.split_whitespace() {
            let digits = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")).unwrap_or(token);
            let code = u8::from_str_radix(digits, 16).map_err(|_| ListingError::Parse {
                line: line_num + 1,
                message: format!("invalid byte {:?}", token),
            })?;
            listing.push(code, trimmed);
        }

        if listing.len() > MEMORY_SIZE {
            return Err(ListingError::Parse {
                line: line_num + 1,
                message: format!("program exceeds {} cells", MEMORY_SIZE),
            });
        }
    }

    Ok(listing)
}

/// Load a listing from disk.
pub fn load_listing<P: AsRef<Path>>(path: P) -> Result<Listing, ListingError> {
    let text = std::fs::read_to_string(path.as_ref())
        .map_err(|e| ListingError::Io(e.to_string()))?;
    parse_listing(&text)
}

/// Save a listing to disk.
pub fn save_listing<P: AsRef<Path>>(path: P, listing: &Listing) -> Result<(), ListingError> {
    let mut file = std::fs::File::create(path.as_ref())
        .map_err(|e| ListingError::Io(e.to_string()))?;
    file.write_all(listing.render().as_bytes())
        .map_err(|e| ListingError::Io(e.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListingError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },
}
