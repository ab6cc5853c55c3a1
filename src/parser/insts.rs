//! Instruction file loader.
//!
//! mlir-aie writes NPU instruction streams in two forms:
//!
//! ```text
//! insts.txt   one 32-bit word per line in hex, optional 0x prefix
//!             06030100
//!             00000104
//!             ...
//! insts.bin   raw little-endian 32-bit words
//! ```
//!
//! Both load into the same word array that [`Disassembly`] walks.
//!
//! # Example
//!
//! ```no_run
//! use xdna_cmd::parser::InstructionFile;
//!
//! let file = InstructionFile::from_file("build/insts.txt")?;
//! let disassembly = file.disassemble()?;
//! println!("{} commands", disassembly.len());
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::fmt;
use std::io::Cursor;
use std::path::Path;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::npu::Disassembly;

/// On-disk encoding of an instruction file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    /// Hex text, one word per line.
    #[serde(alias = "txt")]
    Hex,
    /// Little-endian binary words.
    #[serde(alias = "bin")]
    Binary,
}

impl InputFormat {
    /// Guess the format from the file extension: `.bin` is binary, anything
    /// else hex.
    pub fn detect(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("bin") => InputFormat::Binary,
            _ => InputFormat::Hex,
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputFormat::Hex => write!(f, "hex"),
            InputFormat::Binary => write!(f, "binary"),
        }
    }
}

impl FromStr for InputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hex" | "txt" => Ok(InputFormat::Hex),
            "binary" | "bin" => Ok(InputFormat::Binary),
            other => bail!("Unknown input format '{}' (expected hex or binary)", other),
        }
    }
}

/// An instruction stream loaded from disk.
#[derive(Debug, Clone)]
pub struct InstructionFile {
    words: Vec<u32>,
    format: InputFormat,
}

impl InstructionFile {
    /// Load a file, picking the format from its extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Self::from_file_as(path, InputFormat::detect(path))
    }

    /// Load a file in the given format.
    pub fn from_file_as<P: AsRef<Path>>(path: P, format: InputFormat) -> Result<Self> {
        let path = path.as_ref();
        let words = match format {
            InputFormat::Hex => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                parse_hex(&text).with_context(|| format!("Invalid hex file {}", path.display()))?
            }
            InputFormat::Binary => {
                let data = std::fs::read(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                parse_binary(&data)
                    .with_context(|| format!("Invalid binary file {}", path.display()))?
            }
        };
        log::debug!("Loaded {} words ({}) from {}", words.len(), format, path.display());
        Ok(Self { words, format })
    }

    /// Wrap an in-memory word array.
    pub fn from_words(words: Vec<u32>, format: InputFormat) -> Self {
        Self { words, format }
    }

    /// The loaded words.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Take the loaded words.
    pub fn into_words(self) -> Vec<u32> {
        self.words
    }

    /// Format the file was read in.
    pub fn format(&self) -> InputFormat {
        self.format
    }

    /// Walk the loaded stream.
    pub fn disassemble(&self) -> crate::npu::Result<Disassembly<'_>> {
        Disassembly::parse(&self.words)
    }

    /// Write the words to `path` in this file's format.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        write_words(path, &self.words, self.format)
    }
}

/// Parse hex text, one word per line. Blank lines are skipped.
pub fn parse_hex(text: &str) -> Result<Vec<u32>> {
    let mut words = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let digits = line
            .strip_prefix("0x")
            .or_else(|| line.strip_prefix("0X"))
            .unwrap_or(line);
        let word = u32::from_str_radix(digits, 16)
            .with_context(|| format!("line {}: invalid hex word '{}'", line_no + 1, line))?;
        words.push(word);
    }
    Ok(words)
}

/// Parse little-endian binary words.
pub fn parse_binary(data: &[u8]) -> Result<Vec<u32>> {
    if data.len() % 4 != 0 {
        bail!(
            "Binary instruction data is {} bytes, not a multiple of 4",
            data.len()
        );
    }

    let mut cursor = Cursor::new(data);
    let mut words = Vec::with_capacity(data.len() / 4);
    for _ in 0..data.len() / 4 {
        words.push(cursor.read_u32::<LittleEndian>()?);
    }
    Ok(words)
}

/// Render words as hex text, one zero-padded word per line.
pub fn to_hex(words: &[u32]) -> String {
    let mut out = String::with_capacity(words.len() * 9);
    for word in words {
        out.push_str(&format!("{:08x}\n", word));
    }
    out
}

/// Render words as little-endian bytes.
pub fn to_binary(words: &[u32]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(words.len() * 4);
    for &word in words {
        out.write_u32::<LittleEndian>(word)?;
    }
    Ok(out)
}

/// Write words to `path` in `format`.
pub fn write_words<P: AsRef<Path>>(path: P, words: &[u32], format: InputFormat) -> Result<()> {
    let path = path.as_ref();
    let data = match format {
        InputFormat::Hex => to_hex(words).into_bytes(),
        InputFormat::Binary => to_binary(words)?,
    };
    std::fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))?;
    log::debug!("Wrote {} words ({}) to {}", words.len(), format, path.display());
    Ok(())
}
