//! NPU instruction stream codec.
//!
//! An instruction stream is a flat array of 32-bit words: a 4-word header
//! followed by commands, each starting with a header word that selects its
//! variant and fixes its length.
//!
//! ```text
//! +--------+---------------------------------------------+---------+
//! | header | cmd 1 | cmd 2 | ... | cmd N                 | padding |
//! +--------+---------------------------------------------+---------+
//!   4 words  N = declared command count
//! ```
//!
//! - [`fields`] - shared bit-field table for every decode and encode path
//! - [`header`] - stream header and device context
//! - [`command`] - typed command variants
//! - [`parser`] - stream walker / disassembler
//! - [`report`] - disassembly report lines and rendering
//! - [`sequence`] - builder for host-synthesized streams

pub mod command;
pub mod error;
pub mod fields;
pub mod header;
pub mod parser;
pub mod report;
pub mod sequence;

pub use command::{
    ChannelDirection, Command, DdrPatch, Decodable, DmaBlockWrite, Encodable, IssueToken,
    QueueWrite, RegisterWrite, TileLocation, WaitSync,
};
pub use error::{CodecError, Result};
pub use header::{DeviceContext, StreamHeader};
pub use parser::{Disassembly, EntryKind, StreamEntry};
pub use report::{ReportLine, ReportStyle};
pub use sequence::InstructionSequence;

/// Command header words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NpuOpcode {
    /// 32-bit register write; also used for task-queue pushes.
    QueueWrite,
    /// DMA buffer descriptor write.
    DmaBlockWrite,
    /// Issue-token request.
    IssueTokenWrite,
    /// Wait for a completion token (TCT).
    SyncWrite,
    /// Host address patch.
    DdrPatchWrite,
    /// Any other header word.
    Unknown(u32),
}

impl NpuOpcode {
    /// Header word of this opcode.
    pub const fn word(self) -> u32 {
        match self {
            NpuOpcode::QueueWrite => 0x00,
            NpuOpcode::DmaBlockWrite => 0x01,
            NpuOpcode::IssueTokenWrite => 0x03,
            NpuOpcode::SyncWrite => 0x80,
            NpuOpcode::DdrPatchWrite => 0x81,
            NpuOpcode::Unknown(word) => word,
        }
    }
}

impl From<u32> for NpuOpcode {
    fn from(word: u32) -> Self {
        match word {
            0x00 => NpuOpcode::QueueWrite,
            0x01 => NpuOpcode::DmaBlockWrite,
            0x03 => NpuOpcode::IssueTokenWrite,
            0x80 => NpuOpcode::SyncWrite,
            0x81 => NpuOpcode::DdrPatchWrite,
            other => NpuOpcode::Unknown(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_from_u32() {
        assert_eq!(NpuOpcode::from(0), NpuOpcode::QueueWrite);
        assert_eq!(NpuOpcode::from(1), NpuOpcode::DmaBlockWrite);
        assert_eq!(NpuOpcode::from(3), NpuOpcode::IssueTokenWrite);
        assert_eq!(NpuOpcode::from(0x80), NpuOpcode::SyncWrite);
        assert_eq!(NpuOpcode::from(0x81), NpuOpcode::DdrPatchWrite);
        assert_eq!(NpuOpcode::from(2), NpuOpcode::Unknown(2));
        // only the whole word selects an op
        assert_eq!(NpuOpcode::from(0x0100_0081), NpuOpcode::Unknown(0x0100_0081));
    }

    #[test]
    fn test_opcode_word_roundtrip() {
        for word in [0x00, 0x01, 0x03, 0x80, 0x81, 0x42] {
            assert_eq!(NpuOpcode::from(word).word(), word);
        }
    }
}
