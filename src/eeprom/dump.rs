//! Text dump of the EEPROM.
//!
//! One hex digit per tetrad, separated by single spaces, twelve tetrads per
//! line. Export writes uppercase; import accepts either case and ignores
//! blank lines and a missing final newline.

use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use crate::eeprom::{Eeprom, EepromError, CAPACITY, LINE_TETRADS};

/// Render tetrads in dump format.
pub fn export_dump(tetrads: &[u8]) -> String {
    let mut text = String::with_capacity(tetrads.len() * 2);
    for line in tetrads.chunks(LINE_TETRADS) {
        let digits: Vec<String> = line.iter().map(|t| format!("{:X}", t & 0x0F)).collect();
        text.push_str(&digits.join(" "));
        text.push('\n');
    }
    text
}

/// Parse a dump; it must hold exactly [`CAPACITY`] tetrads.
pub fn import_dump(text: &str) -> Result<Vec<u8>, EepromError> {
    let mut tetrads = Vec::with_capacity(CAPACITY);
    for (line_num, line) in text.lines().enumerate() {
        for token in line.split_whitespace() {
            let digit = parse_digit(token).ok_or_else(|| EepromError::InvalidDigit {
                line: line_num + 1,
                token: token.to_string(),
            })?;
            tetrads.push(digit);
        }
    }
    if tetrads.len() != CAPACITY {
        return Err(EepromError::SizeMismatch { expected: CAPACITY, got: tetrads.len() });
    }
    Ok(tetrads)
}

fn parse_digit(token: &str) -> Option<u8> {
    let mut chars = token.chars();
    let c = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    c.to_digit(16).map(|d| d as u8)
}

impl Eeprom {
    /// Write the contents to a byte stream.
    pub fn export_to<W: Write>(&self, mut out: W) -> Result<(), EepromError> {
        out.write_all(export_dump(self.tetrads()).as_bytes())
            .map_err(|e| EepromError::Io(e.to_string()))
    }

    /// Replace the contents from a byte stream.
    pub fn import_from<R: Read>(&mut self, input: R) -> Result<(), EepromError> {
        let mut text = String::new();
        for line in BufReader::new(input).lines() {
            let line = line.map_err(|e| EepromError::Io(e.to_string()))?;
            text.push_str(&line);
            text.push('\n');
        }
        let tetrads = import_dump(&text)?;
        self.load_tetrads(&tetrads)
    }
}

/// Load a dump file from disk.
pub fn load_dump<P: AsRef<Path>>(path: P) -> Result<Eeprom, EepromError> {
    let file = std::fs::File::open(path.as_ref())
        .map_err(|e| EepromError::Io(e.to_string()))?;
    let mut eeprom = Eeprom::new();
    eeprom.import_from(file)?;
    Ok(eeprom)
}

/// Save a dump file to disk.
pub fn save_dump<P: AsRef<Path>>(path: P, eeprom: &Eeprom) -> Result<(), EepromError> {
    let file = std::fs::File::create(path.as_ref())
        .map_err(|e| EepromError::Io(e.to_string()))?;
    eeprom.export_to(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_export_layout() {
        let mut tetrads = vec![0u8; CAPACITY];
        tetrads[0] = 0xA;
        tetrads[11] = 3;
        tetrads[12] = 0xF;
        let text = export_dump(&tetrads);
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("A 0 0 0 0 0 0 0 0 0 0 3"));
        assert_eq!(lines.next(), Some("F 0 0 0 0 0 0 0 0 0 0 0"));
        // 1024 = 85 full lines and one of four.
        assert_eq!(text.lines().count(), 86);
        assert_eq!(text.lines().last(), Some("0 0 0 0"));
    }

    #[test]
    fn test_import_lowercase_without_final_newline() {
        let mut tetrads = vec![0u8; CAPACITY];
        tetrads[5] = 0xB;
        let text = export_dump(&tetrads).to_lowercase();
        let trimmed = text.trim_end();
        assert_eq!(import_dump(trimmed).unwrap(), tetrads);
    }

    #[test]
    fn test_import_rejects_bad_digit() {
        let text = "0 0 G";
        assert_eq!(
            import_dump(text),
            Err(EepromError::InvalidDigit { line: 1, token: "G".to_string() })
        );
        assert!(matches!(import_dump("00 1"), Err(EepromError::InvalidDigit { .. })));
    }

    #[test]
    fn test_import_rejects_short_dump() {
        assert_eq!(
            import_dump("1 2 3\n"),
            Err(EepromError::SizeMismatch { expected: CAPACITY, got: 3 })
        );
    }

    #[test]
    fn test_stream_round_trip() {
        let mut eeprom = Eeprom::new();
        eeprom.burn_line(3, &[9; LINE_TETRADS]).unwrap();
        let mut bytes = Vec::new();
        eeprom.export_to(&mut bytes).unwrap();

        let mut restored = Eeprom::new();
        restored.import_from(bytes.as_slice()).unwrap();
        assert_eq!(restored.tetrads(), eeprom.tetrads());
    }

    proptest! {
        #[test]
        fn prop_export_clear_import(tetrads in proptest::collection::vec(0u8..16, CAPACITY)) {
            let mut eeprom = Eeprom::new();
            eeprom.load_tetrads(&tetrads).unwrap();
            let text = export_dump(eeprom.tetrads());
            eeprom.clear();
            prop_assert!(eeprom.tetrads().iter().all(|&t| t == 0));
            eeprom.load_tetrads(&import_dump(&text).unwrap()).unwrap();
            prop_assert_eq!(eeprom.tetrads(), tetrads.as_slice());
        }
    }
}
