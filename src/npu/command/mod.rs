//! Typed NPU commands.
//!
//! Each command variant owns its decoded fields and knows its fixed word
//! length. Decoding is available for every variant; encoding only for the
//! variants the host synthesizes itself:
//!
//! | Variant         | Header | Words | Decode | Encode |
//! |-----------------|--------|-------|--------|--------|
//! | `DmaBlockWrite` | `0x01` | 12    | yes    | no     |
//! | `DdrPatch`      | `0x81` | 12    | yes    | yes    |
//! | `IssueToken`    | `0x03` | 7     | yes    | yes    |
//! | `QueueWrite`    | `0x00` | 6     | yes    | yes    |
//! | `RegisterWrite` | `0x00` | 6     | yes    | yes    |
//! | `WaitSync`      | `0x80` | 4     | yes    | no     |
//!
//! Block-write BDs and sync waits always come from the compiler, so they are
//! only ever disassembled.

mod block_write;
mod ddr_patch;
mod issue_token;
mod queue_write;
mod register_write;
mod wait_sync;

use std::fmt;

pub use block_write::{Dimension, DmaBlockWrite, IterationDim, PacketInfo};
pub use ddr_patch::DdrPatch;
pub use issue_token::IssueToken;
pub use queue_write::QueueWrite;
pub use register_write::{QueuePush, RegisterWrite};
pub use wait_sync::WaitSync;

use super::error::{CodecError, Result};
use super::fields::{pack, Field};
use super::report::ReportWriter;
use super::NpuOpcode;

/// Tile coordinates carried in a tile address word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TileLocation {
    /// Tile row.
    pub row: u8,
    /// Tile column.
    pub col: u8,
}

impl TileLocation {
    /// Location at (`row`, `col`).
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }

    /// Extract row and column from a tile address word.
    pub fn decode(word: u32) -> Self {
        Self {
            row: Field::TileRow.get(word) as u8,
            col: Field::TileCol.get(word) as u8,
        }
    }

    /// Row and column bits of a tile address word.
    pub fn encode(&self) -> Result<u32> {
        pack(&[(Field::TileCol, self.col.into()), (Field::TileRow, self.row.into())])
    }
}

impl fmt::Display for TileLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(row: {}, col: {})", self.row, self.col)
    }
}

/// DMA channel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelDirection {
    /// Stream to memory-map.
    #[default]
    S2mm,
    /// Memory-map to stream.
    Mm2s,
}

impl ChannelDirection {
    /// Direction from its encoded bit.
    pub fn from_bit(bit: bool) -> Self {
        if bit {
            ChannelDirection::Mm2s
        } else {
            ChannelDirection::S2mm
        }
    }

    /// Encoded bit (MM2S = 1).
    pub fn bit(self) -> bool {
        self == ChannelDirection::Mm2s
    }
}

impl fmt::Display for ChannelDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelDirection::S2mm => write!(f, "S2MM"),
            ChannelDirection::Mm2s => write!(f, "MM2S"),
        }
    }
}

/// Channel register word: tile, channel and direction over a register base.
pub(crate) fn channel_register(
    base: u32,
    location: TileLocation,
    channel: u8,
    direction: ChannelDirection,
) -> Result<u32> {
    Ok(base
        | location.encode()?
        | pack(&[
            (Field::QueueChannel, channel.into()),
            (Field::ChannelDirection, direction.bit().into()),
        ])?)
}

/// Borrow exactly `N` words from the front of `words`.
pub(crate) fn window<const N: usize>(words: &[u32]) -> Result<&[u32; N]> {
    words
        .get(..N)
        .and_then(|w| w.try_into().ok())
        .ok_or(CodecError::TruncatedStream {
            index: 0,
            opcode: words.first().copied().unwrap_or(0),
            needed: N,
            available: words.len(),
        })
}

/// A command that can be read out of a word window.
pub trait Decodable: Sized {
    /// Words the command occupies.
    const WORDS: usize;

    /// Header word the command starts with.
    const OPCODE: NpuOpcode;

    /// Decode from the first [`WORDS`](Self::WORDS) words of `words`.
    ///
    /// Fails with [`CodecError::TruncatedStream`] (index relative to the
    /// window) if fewer words are available.
    fn decode(words: &[u32]) -> Result<Self>;

    /// Annotate the command's words for a report.
    fn describe(&self, op_count: usize, w: &mut ReportWriter<'_>);
}

/// A command the host can synthesize.
pub trait Encodable {
    /// Tile the command targets.
    fn location(&self) -> TileLocation;

    /// Encode into a fresh word vector.
    fn encode(&self) -> Result<Vec<u32>>;

    /// Append the encoded words to `out`.
    ///
    /// `out` is left untouched on error.
    fn encode_into(&self, out: &mut Vec<u32>) -> Result<()> {
        let words = self.encode()?;
        out.extend_from_slice(&words);
        Ok(())
    }
}

/// Any decoded command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// DMA buffer descriptor write.
    DmaBlockWrite(DmaBlockWrite),
    /// Host address patch of a BD.
    DdrPatch(DdrPatch),
    /// Issue-token request on a channel.
    IssueToken(IssueToken),
    /// Push of a BD into a channel's task queue.
    QueueWrite(QueueWrite),
    /// Plain 32-bit register write.
    RegisterWrite(RegisterWrite),
    /// Wait for a completion token.
    WaitSync(WaitSync),
}

impl Command {
    /// Decode the command starting at `words[0]`.
    ///
    /// Returns `None` when the header word matches no known op. A `0x00`
    /// header decodes as [`QueueWrite`] when it targets a start-queue
    /// register with a value made only of queue control fields, and as
    /// [`RegisterWrite`] otherwise.
    pub fn decode(words: &[u32]) -> Option<Result<Command>> {
        let opcode = NpuOpcode::from(*words.first()?);
        let command = match opcode {
            NpuOpcode::QueueWrite => window::<6>(words).map(|w| {
                if QueueWrite::matches(w) {
                    Command::QueueWrite(QueueWrite::from_words(w))
                } else {
                    Command::RegisterWrite(RegisterWrite::from_words(w))
                }
            }),
            NpuOpcode::DmaBlockWrite => DmaBlockWrite::decode(words).map(Command::DmaBlockWrite),
            NpuOpcode::IssueTokenWrite => IssueToken::decode(words).map(Command::IssueToken),
            NpuOpcode::SyncWrite => WaitSync::decode(words).map(Command::WaitSync),
            NpuOpcode::DdrPatchWrite => DdrPatch::decode(words).map(Command::DdrPatch),
            NpuOpcode::Unknown(_) => return None,
        };
        Some(command)
    }

    /// Words this command occupies.
    pub fn word_len(&self) -> usize {
        match self {
            Command::DmaBlockWrite(_) => DmaBlockWrite::WORDS,
            Command::DdrPatch(_) => DdrPatch::WORDS,
            Command::IssueToken(_) => IssueToken::WORDS,
            Command::QueueWrite(_) => QueueWrite::WORDS,
            Command::RegisterWrite(_) => RegisterWrite::WORDS,
            Command::WaitSync(_) => WaitSync::WORDS,
        }
    }

    /// Header word of this command.
    pub fn opcode(&self) -> NpuOpcode {
        match self {
            Command::DmaBlockWrite(_) => DmaBlockWrite::OPCODE,
            Command::DdrPatch(_) => DdrPatch::OPCODE,
            Command::IssueToken(_) => IssueToken::OPCODE,
            Command::QueueWrite(_) => QueueWrite::OPCODE,
            Command::RegisterWrite(_) => RegisterWrite::OPCODE,
            Command::WaitSync(_) => WaitSync::OPCODE,
        }
    }

    /// Short variant name.
    pub fn name(&self) -> &'static str {
        match self {
            Command::DmaBlockWrite(_) => "DMA_BLOCK_WRITE",
            Command::DdrPatch(_) => "DDR_PATCH",
            Command::IssueToken(_) => "ISSUE_TOKEN",
            Command::QueueWrite(_) => "QUEUE_WRITE",
            Command::RegisterWrite(_) => "REGISTER_WRITE",
            Command::WaitSync(_) => "WAIT_SYNC",
        }
    }

    /// Tile the command targets.
    pub fn location(&self) -> TileLocation {
        match self {
            Command::DmaBlockWrite(c) => c.location,
            Command::DdrPatch(c) => c.location,
            Command::IssueToken(c) => c.location,
            Command::QueueWrite(c) => c.location,
            Command::RegisterWrite(c) => c.location,
            Command::WaitSync(c) => c.location,
        }
    }

    /// Annotate the command's words for a report.
    pub fn describe(&self, op_count: usize, w: &mut ReportWriter<'_>) {
        match self {
            Command::DmaBlockWrite(c) => c.describe(op_count, w),
            Command::DdrPatch(c) => c.describe(op_count, w),
            Command::IssueToken(c) => c.describe(op_count, w),
            Command::QueueWrite(c) => c.describe(op_count, w),
            Command::RegisterWrite(c) => c.describe(op_count, w),
            Command::WaitSync(c) => c.describe(op_count, w),
        }
    }

    /// Encoder for this command, if the variant can be synthesized.
    pub fn as_encodable(&self) -> Option<&dyn Encodable> {
        match self {
            Command::DdrPatch(c) => Some(c),
            Command::IssueToken(c) => Some(c),
            Command::QueueWrite(c) => Some(c),
            Command::RegisterWrite(c) => Some(c),
            Command::DmaBlockWrite(_) | Command::WaitSync(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_location_roundtrip() {
        for row in 0..=0x1F {
            for col in [0u8, 1, 4, 0x7F] {
                let loc = TileLocation::new(row, col);
                assert_eq!(TileLocation::decode(loc.encode().unwrap()), loc);
            }
        }
        assert!(TileLocation::new(0x20, 0).encode().is_err());
        assert!(TileLocation::new(0, 0x80).encode().is_err());
    }

    #[test]
    fn test_channel_register() {
        let loc = TileLocation::new(0, 2);
        let word = channel_register(0x1D204, loc, 1, ChannelDirection::Mm2s).unwrap();
        assert_eq!(word, (2 << 25) | 0x1D204 | 0x8 | 0x10);
        assert!(channel_register(0x1D204, loc, 2, ChannelDirection::S2mm).is_err());
    }

    #[test]
    fn test_window_short() {
        let words = [0x81, 0x30];
        let err = window::<12>(&words).unwrap_err();
        assert_eq!(
            err,
            CodecError::TruncatedStream { index: 0, opcode: 0x81, needed: 12, available: 2 }
        );
        assert!(window::<2>(&words).is_ok());
    }

    #[test]
    fn test_decode_unknown_header() {
        assert!(Command::decode(&[0x42, 0, 0, 0]).is_none());
        assert!(Command::decode(&[]).is_none());
    }

    #[test]
    fn test_decode_write_dispatch() {
        let queue = QueueWrite::new(TileLocation::new(0, 1), ChannelDirection::S2mm, 0, 3);
        let words = queue.encode().unwrap();
        assert!(matches!(Command::decode(&words), Some(Ok(Command::QueueWrite(_)))));

        let rtp = RegisterWrite::new(TileLocation::new(2, 1), 0x0400, 7);
        let words = rtp.encode().unwrap();
        assert!(matches!(Command::decode(&words), Some(Ok(Command::RegisterWrite(_)))));
    }

    fn reencode(words: &[u32]) -> (&'static str, Vec<u32>) {
        let command = Command::decode(words).unwrap().unwrap();
        let encoder = command.as_encodable().unwrap();
        (command.name(), encoder.encode().unwrap())
    }

    #[test]
    fn test_write_roundtrip_across_offsets() {
        let offsets = (0..=0xF_FFFFu32)
            .step_by(0x1F4)
            .chain((0..=0xF).map(|high| (high << 16) | 0xD204))
            .chain((0..=0xF).map(|high| (high << 16) | 0xD21C))
            .chain([0xF_FFFF, 0x1D200, 0x1D000]);
        for offset in offsets {
            for value in [0, 5, 0x8003_000F, 0xDEAD_BEEF, u32::MAX] {
                let words = [0, 0, (1 << 20) | offset, 0, value, 24];
                let (name, encoded) = reencode(&words);
                assert_eq!(encoded, words, "{name} at {offset:#x} = {value:#x}");
            }
        }
    }

    #[test]
    fn test_write_roundtrip_across_tiles() {
        for row in 0..=0x1F {
            for col in [0u32, 1, 5, 0x7F] {
                let tile = (col << 25) | (row << 20);
                for (offset, value) in [(0x0400, 42), (0x1D204, 0x0001_0003), (0x1D20C, 0xFFFF_FFFF)] {
                    let words = [0, 0, tile | offset, 0, value, 24];
                    assert_eq!(reencode(&words).1, words, "row {row} col {col} {offset:#x}");
                }
            }
        }
    }

    #[test]
    fn test_start_queue_alias_is_register_write() {
        let write = RegisterWrite::new(TileLocation::new(1, 0), 0x5D204, 0xDEAD_BEEF);
        let words = write.encode().unwrap();
        assert_eq!(Command::decode(&words), Some(Ok(Command::RegisterWrite(write))));
        assert_eq!(reencode(&words).1, words);

        let write = RegisterWrite::new(TileLocation::new(0, 0), 0x1D204, u32::MAX);
        let words = write.encode().unwrap();
        assert_eq!(Command::decode(&words), Some(Ok(Command::RegisterWrite(write))));
        assert_eq!(reencode(&words).1, words);
    }

    #[test]
    fn test_encodable_capability() {
        let rtp = Command::RegisterWrite(RegisterWrite::new(TileLocation::new(2, 0), 0x10, 1));
        assert!(rtp.as_encodable().is_some());

        let sync = WaitSync::decode(&[0x80, 16, 0x0000_0000, 0x0101_0000]).unwrap();
        assert!(Command::WaitSync(sync).as_encodable().is_none());
    }
}
