//! Stream header and device context.
//!
//! Every instruction stream starts with four words describing the target
//! device and the size of the stream:
//!
//! ```text
//! word 0   [31:24] rows   [23:16] generation   [15:8] minor   [7:0] major
//! word 1                  [15:8] mem tile rows  [7:0] columns
//! word 2   declared command count
//! word 3   declared word count (words after the header)
//! ```

use std::fmt;

use super::command::TileLocation;
use super::error::{CodecError, Result};
use super::fields::{pack, Field, HEADER_WORDS};
use super::report::ReportWriter;

/// Decoded stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader {
    /// NPU major version.
    pub major: u8,
    /// NPU minor version.
    pub minor: u8,
    /// Device generation.
    pub generation: u8,
    /// Tile-grid rows.
    pub rows: u8,
    /// Tile-grid columns.
    pub cols: u8,
    /// Memory-tile rows.
    pub mem_tile_rows: u8,
    /// Number of commands the stream declares.
    pub command_count: u32,
    /// Number of words following the header.
    pub word_count: u32,
}

impl StreamHeader {
    /// Decode the header from the first four words of `words`.
    pub fn decode(words: &[u32]) -> Result<Self> {
        if words.len() < HEADER_WORDS {
            return Err(CodecError::TruncatedStream {
                index: 0,
                opcode: words.first().copied().unwrap_or(0),
                needed: HEADER_WORDS,
                available: words.len(),
            });
        }

        Ok(Self {
            major: Field::DevMajor.get(words[0]) as u8,
            minor: Field::DevMinor.get(words[0]) as u8,
            generation: Field::DevGeneration.get(words[0]) as u8,
            rows: Field::DevRows.get(words[0]) as u8,
            cols: Field::DevCols.get(words[1]) as u8,
            mem_tile_rows: Field::DevMemTileRows.get(words[1]) as u8,
            command_count: words[2],
            word_count: words[3],
        })
    }

    /// Encode the header into its four words.
    pub fn encode(&self) -> Result<[u32; HEADER_WORDS]> {
        Ok([
            pack(&[
                (Field::DevMajor, self.major.into()),
                (Field::DevMinor, self.minor.into()),
                (Field::DevGeneration, self.generation.into()),
                (Field::DevRows, self.rows.into()),
            ])?,
            pack(&[
                (Field::DevCols, self.cols.into()),
                (Field::DevMemTileRows, self.mem_tile_rows.into()),
            ])?,
            self.command_count,
            self.word_count,
        ])
    }

    /// Check the declared word count against the words that follow the header.
    pub fn validate_length(&self, body_words: usize) -> Result<()> {
        if self.word_count as usize != body_words {
            return Err(CodecError::StreamLengthMismatch {
                declared: self.word_count,
                actual: body_words,
            });
        }
        Ok(())
    }

    /// Device described by this header.
    pub fn device(&self) -> DeviceContext {
        DeviceContext {
            major: self.major,
            minor: self.minor,
            generation: self.generation,
            rows: self.rows,
            cols: self.cols,
            mem_tile_rows: self.mem_tile_rows,
        }
    }

    /// Annotate the four header words.
    pub fn describe(&self, w: &mut ReportWriter<'_>) {
        w.separator();
        w.word("NPU information");
        w.note(format!("--NPU version: {}.{}", self.major, self.minor));
        w.note(format!("--NPU generation: {}", self.generation));
        w.note(format!("--NPU rows: {}", self.rows));
        w.word(format!("--NPU cols: {}", self.cols));
        w.note(format!("--NPU memory tile rows: {}", self.mem_tile_rows));
        w.word(format!("Instruction commands: {}", self.command_count));
        w.word(format!("Instruction words: {}", self.word_count));
    }
}

/// The device a stream is built for.
///
/// Passed explicitly to whatever synthesizes commands, so several devices
/// can be targeted from one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceContext {
    /// NPU major version.
    pub major: u8,
    /// NPU minor version.
    pub minor: u8,
    /// Device generation.
    pub generation: u8,
    /// Tile-grid rows (shim row included).
    pub rows: u8,
    /// Tile-grid columns.
    pub cols: u8,
    /// Memory-tile rows.
    pub mem_tile_rows: u8,
}

impl DeviceContext {
    /// Device with the given grid and an unset version.
    pub fn new(rows: u8, cols: u8, mem_tile_rows: u8) -> Self {
        Self {
            major: 0,
            minor: 0,
            generation: 0,
            rows,
            cols,
            mem_tile_rows,
        }
    }

    /// Set version and generation.
    pub fn with_version(mut self, major: u8, minor: u8, generation: u8) -> Self {
        self.major = major;
        self.minor = minor;
        self.generation = generation;
        self
    }

    /// Check if a tile lies inside the grid.
    pub fn contains(&self, location: TileLocation) -> bool {
        location.row < self.rows && location.col < self.cols
    }

    /// Reject tiles outside the grid.
    pub fn check(&self, location: TileLocation) -> Result<()> {
        if self.contains(location) {
            Ok(())
        } else {
            Err(CodecError::TileOutOfRange {
                row: location.row,
                col: location.col,
                rows: self.rows,
                cols: self.cols,
            })
        }
    }

    /// Check if a row holds shim tiles.
    pub fn is_shim_row(&self, row: u8) -> bool {
        row == 0
    }

    /// Check if a row holds memory tiles.
    pub fn is_mem_tile_row(&self, row: u8) -> bool {
        (1..=self.mem_tile_rows).contains(&row)
    }

    /// Header for a stream of this device.
    pub fn header(&self, command_count: u32, word_count: u32) -> StreamHeader {
        StreamHeader {
            major: self.major,
            minor: self.minor,
            generation: self.generation,
            rows: self.rows,
            cols: self.cols,
            mem_tile_rows: self.mem_tile_rows,
            command_count,
            word_count,
        }
    }
}

impl fmt::Display for DeviceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NPU {}.{} (gen {}) {}x{} tiles, {} mem tile row(s)",
            self.major, self.minor, self.generation, self.rows, self.cols, self.mem_tile_rows
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_header() {
        let words = [0x06010203, 0x00000104, 0x00000002, 0x00000018];
        let header = StreamHeader::decode(&words).unwrap();
        assert_eq!(header.major, 3);
        assert_eq!(header.minor, 2);
        assert_eq!(header.generation, 1);
        assert_eq!(header.rows, 6);
        assert_eq!(header.cols, 4);
        assert_eq!(header.mem_tile_rows, 1);
        assert_eq!(header.command_count, 2);
        assert_eq!(header.word_count, 24);
    }

    #[test]
    fn test_header_encode_matches_words() {
        let words = [0x06010203, 0x00000104, 0x00000002, 0x00000018];
        let header = StreamHeader::decode(&words).unwrap();
        assert_eq!(header.encode().unwrap(), words);
    }

    #[test]
    fn test_header_too_short() {
        let err = StreamHeader::decode(&[0x1, 0x2]).unwrap_err();
        assert_eq!(
            err,
            CodecError::TruncatedStream { index: 0, opcode: 0x1, needed: 4, available: 2 }
        );
    }

    #[test]
    fn test_validate_length() {
        let header = StreamHeader::decode(&[0, 0, 0, 5]).unwrap();
        assert!(header.validate_length(5).is_ok());
        assert_eq!(
            header.validate_length(6),
            Err(CodecError::StreamLengthMismatch { declared: 5, actual: 6 })
        );
    }

    #[test]
    fn test_device_context_bounds() {
        let device = DeviceContext::new(6, 4, 1);
        assert!(device.contains(TileLocation::new(5, 3)));
        assert!(!device.contains(TileLocation::new(6, 0)));
        assert_eq!(
            device.check(TileLocation::new(0, 4)),
            Err(CodecError::TileOutOfRange { row: 0, col: 4, rows: 6, cols: 4 })
        );
        assert!(device.is_shim_row(0));
        assert!(device.is_mem_tile_row(1));
        assert!(!device.is_mem_tile_row(2));
    }

    #[test]
    fn test_device_header_roundtrip() {
        let device = DeviceContext::new(6, 4, 1).with_version(1, 0, 2);
        let header = device.header(3, 19);
        assert_eq!(header.device(), device);
        let decoded = StreamHeader::decode(&header.encode().unwrap()).unwrap();
        assert_eq!(decoded, header);
    }
}
