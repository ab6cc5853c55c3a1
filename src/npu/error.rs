//! Errors raised by the instruction codec.
//!
//! Only fatal conditions are errors. An unrecognized op header is not: the
//! walker records it as an unknown word and keeps going.

use thiserror::Error;

use super::fields::Field;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Fatal codec errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The header's declared word count disagrees with the stream body.
    #[error("stream length mismatch: header declares {declared} words, stream has {actual}")]
    StreamLengthMismatch {
        /// Word count declared in the header.
        declared: u32,
        /// Words actually following the header.
        actual: usize,
    },

    /// A command (or the header) runs past the end of the stream.
    #[error("truncated stream: op 0x{opcode:02X} at word {index} needs {needed} words, {available} available")]
    TruncatedStream {
        /// Word index where the command starts.
        index: usize,
        /// Header word of the command being decoded.
        opcode: u32,
        /// Words the command occupies.
        needed: usize,
        /// Words left in the stream from `index`.
        available: usize,
    },

    /// A field value does not fit its slot.
    #[error("field {field} cannot encode {value} (valid range {min}..={max})")]
    EncodeFieldInvalid {
        /// The offending field.
        field: Field,
        /// Value that was rejected.
        value: u32,
        /// Smallest encodable value.
        min: u32,
        /// Largest encodable value.
        max: u32,
    },

    /// A synthesized command targets a tile outside the device.
    #[error("tile (row {row}, col {col}) outside device of {rows} rows x {cols} columns")]
    TileOutOfRange {
        /// Requested row.
        row: u8,
        /// Requested column.
        col: u8,
        /// Rows in the device.
        rows: u8,
        /// Columns in the device.
        cols: u8,
    },
}

impl CodecError {
    /// Shift a window-relative truncation index to an absolute stream index.
    pub(crate) fn at(self, base: usize) -> Self {
        match self {
            CodecError::TruncatedStream { index, opcode, needed, available } => {
                CodecError::TruncatedStream {
                    index: base + index,
                    opcode,
                    needed,
                    available,
                }
            }
            other => other,
        }
    }
}
