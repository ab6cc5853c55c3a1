//! Bit-field layout of NPU instruction words.
//!
//! Every shift/mask pair used by the command codec lives here, and both the
//! decode and the encode paths go through [`Field::layout`]. Nothing else in
//! the crate shifts or masks a command word by hand.
//!
//! Layouts follow the AIE2 shim DMA register map as emitted by mlir-aie:
//!
//! ```text
//! tile address word
//!   [31:25] column   [24:20] row   [19:0] register offset
//!                                   [8:5] bd id (BD registers)
//!                                   [4]   direction (queue registers)
//!                                   [3]   channel   (queue registers)
//! ```
//!
//! Some fields are stored biased: a dimension stride of `n` is written as
//! `n - 1`. The bias is part of the layout so callers only ever see logical
//! values.

use std::fmt;

use super::error::{CodecError, Result};

// ============================================================================
// Register map constants
// ============================================================================

/// Number of words in the stream header.
pub const HEADER_WORDS: usize = 4;

/// Base of the shim DMA buffer descriptor registers.
pub const SHIM_DMA_BD_BASE: u32 = 0x1D000;

/// Spacing between two buffer descriptors (`bd_id << 5`).
pub const SHIM_DMA_BD_STRIDE: u32 = 0x20;

/// Offset of the address-low register inside a buffer descriptor.
///
/// DDR patches target this register, so the raw word must be rebased by this
/// amount before the BD id can be extracted.
pub const BD_ADDRESS_LOW_OFFSET: u32 = 0x04;

/// Shim DMA channel control register base (S2MM channel 0).
pub const SHIM_DMA_CTRL_BASE: u32 = 0x1D200;

/// Shim DMA start-queue register (S2MM channel 0).
pub const SHIM_DMA_START_QUEUE: u32 = 0x1D204;

/// Window selecting the shim DMA channel register block.
///
/// Only bits [16:0] take part, so this is a hint for reports and not a
/// dispatch rule.
pub const DMA_CHANNEL_WINDOW_MASK: u32 = 0x1FE00;

/// Register-offset mask that clears the channel and direction bits of a
/// start-queue register.
pub const START_QUEUE_MATCH_MASK: u32 = 0xF_FFE7;

/// Constant mask word carried by an issue-token write.
pub const ISSUE_TOKEN_MASK: u32 = 0x0000_0F00;

// ============================================================================
// Field layout
// ============================================================================

/// Placement of one field inside a 32-bit word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitField {
    /// Bit position of the least significant bit.
    pub shift: u32,
    /// Mask applied after shifting.
    pub mask: u32,
    /// Amount added on decode and subtracted on encode.
    pub bias: u32,
}

impl BitField {
    /// An unbiased field.
    pub const fn new(shift: u32, mask: u32) -> Self {
        Self { shift, mask, bias: 0 }
    }

    /// A field stored as `value - bias`.
    pub const fn biased(shift: u32, mask: u32, bias: u32) -> Self {
        Self { shift, mask, bias }
    }

    /// Mask restricted to the bits that survive the shift into a u32.
    pub const fn effective_mask(&self) -> u32 {
        self.mask & (u32::MAX >> self.shift)
    }

    /// Bits this field occupies in its word.
    pub const fn placed_mask(&self) -> u32 {
        self.effective_mask() << self.shift
    }

    /// Raw stored bits, without bias correction.
    #[inline]
    pub const fn raw(&self, word: u32) -> u32 {
        (word >> self.shift) & self.mask
    }

    /// Logical value (raw bits plus bias).
    #[inline]
    pub const fn extract(&self, word: u32) -> u32 {
        self.raw(word).wrapping_add(self.bias)
    }

    /// Smallest logical value this field can hold.
    pub const fn min_value(&self) -> u32 {
        self.bias
    }

    /// Largest logical value this field can hold.
    pub const fn max_value(&self) -> u32 {
        self.effective_mask().saturating_add(self.bias)
    }
}

/// Every named field of the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    // Stream header
    DevMajor,
    DevMinor,
    DevGeneration,
    DevRows,
    DevCols,
    DevMemTileRows,

    // Tile address word
    TileCol,
    TileRow,
    RegisterOffset,
    BdId,
    QueueChannel,
    ChannelDirection,

    // Buffer descriptor: packet word
    EnablePacket,
    OutOfOrderId,
    PacketId,
    PacketType,

    // Buffer descriptor: dimensions
    DimSize,
    DimStride,
    CurrentIteration,
    IterationSize,
    IterationStride,

    // Buffer descriptor: chaining
    NextBdId,
    UseNextBd,
    ValidBd,

    // Queue push / issue token
    ControllerPacketId,
    QueueBdId,
    RepeatCount,
    IssueToken,

    // Wait sync
    SyncDirection,
    SyncRow,
    SyncCol,
    SyncChannel,

    /// Operation size in words, stored in bytes (`words << 2`).
    OpSizeWords,
}

impl Field {
    /// Bit layout of this field.
    pub const fn layout(self) -> BitField {
        match self {
            Field::DevMajor => BitField::new(0, 0xFF),
            Field::DevMinor => BitField::new(8, 0xFF),
            Field::DevGeneration => BitField::new(16, 0xFF),
            Field::DevRows => BitField::new(24, 0xFF),
            Field::DevCols => BitField::new(0, 0xFF),
            Field::DevMemTileRows => BitField::new(8, 0xFF),

            Field::TileCol => BitField::new(25, 0x7F),
            Field::TileRow => BitField::new(20, 0x1F),
            Field::RegisterOffset => BitField::new(0, 0xFFFFF),
            Field::BdId => BitField::new(5, 0xF),
            Field::QueueChannel => BitField::new(3, 0x1),
            Field::ChannelDirection => BitField::new(4, 0x1),

            Field::EnablePacket => BitField::new(30, 0x1),
            Field::OutOfOrderId => BitField::new(24, 0x3F),
            Field::PacketId => BitField::new(19, 0x1F),
            Field::PacketType => BitField::new(16, 0x7),

            Field::DimSize => BitField::new(20, 0x3FF),
            Field::DimStride => BitField::biased(0, 0xFFFFF, 1),
            Field::CurrentIteration => BitField::new(26, 0x3FF),
            Field::IterationSize => BitField::biased(20, 0x3FF, 1),
            Field::IterationStride => BitField::biased(0, 0xFFFFF, 1),

            Field::NextBdId => BitField::new(27, 0xF),
            Field::UseNextBd => BitField::new(26, 0x1),
            Field::ValidBd => BitField::new(25, 0x1),

            Field::ControllerPacketId => BitField::new(8, 0xFF_FFFF),
            Field::QueueBdId => BitField::new(0, 0xF),
            Field::RepeatCount => BitField::new(16, 0xFF),
            Field::IssueToken => BitField::new(31, 0x1),

            Field::SyncDirection => BitField::new(0, 0xFF),
            Field::SyncRow => BitField::new(8, 0xFF),
            Field::SyncCol => BitField::new(16, 0xFF),
            Field::SyncChannel => BitField::new(24, 0xFF),

            Field::OpSizeWords => BitField::new(2, 0x3FFF_FFFF),
        }
    }

    /// Decode this field from `word`.
    #[inline]
    pub const fn get(self, word: u32) -> u32 {
        self.layout().extract(word)
    }

    /// Decode a one-bit field as a flag.
    #[inline]
    pub const fn flag(self, word: u32) -> bool {
        self.layout().raw(word) != 0
    }

    /// Encode `value` into its position, rejecting values the slot cannot hold.
    pub fn put(self, value: u32) -> Result<u32> {
        let layout = self.layout();
        let invalid = || CodecError::EncodeFieldInvalid {
            field: self,
            value,
            min: layout.min_value(),
            max: layout.max_value(),
        };

        let raw = value.checked_sub(layout.bias).ok_or_else(invalid)?;
        if raw & !layout.effective_mask() != 0 {
            return Err(invalid());
        }
        Ok(raw << layout.shift)
    }

    /// Encode a flag into its position.
    pub fn put_flag(self, set: bool) -> Result<u32> {
        self.put(u32::from(set))
    }

    /// Field name as used in reports and errors.
    pub fn name(self) -> &'static str {
        match self {
            Field::DevMajor => "dev_major",
            Field::DevMinor => "dev_minor",
            Field::DevGeneration => "dev_gen",
            Field::DevRows => "dev_n_row",
            Field::DevCols => "dev_num_cols",
            Field::DevMemTileRows => "dev_mem_tile_rows",
            Field::TileCol => "bd_col",
            Field::TileRow => "bd_row",
            Field::RegisterOffset => "register_offset",
            Field::BdId => "bd_id",
            Field::QueueChannel => "queue_channel",
            Field::ChannelDirection => "channel_direction",
            Field::EnablePacket => "en_packet",
            Field::OutOfOrderId => "out_of_order",
            Field::PacketId => "packet_id",
            Field::PacketType => "packet_type",
            Field::DimSize => "dim_size",
            Field::DimStride => "dim_stride",
            Field::CurrentIteration => "curr_iter",
            Field::IterationSize => "iter_size",
            Field::IterationStride => "iter_stride",
            Field::NextBdId => "next_bd_id",
            Field::UseNextBd => "use_next_bd",
            Field::ValidBd => "valid_bd",
            Field::ControllerPacketId => "queue_pkt_id",
            Field::QueueBdId => "ending_bd_id",
            Field::RepeatCount => "ending_repeat_cnt",
            Field::IssueToken => "ending_issue_token",
            Field::SyncDirection => "wait_sync_direction",
            Field::SyncRow => "wait_sync_row",
            Field::SyncCol => "wait_sync_col",
            Field::SyncChannel => "wait_sync_channel",
            Field::OpSizeWords => "op_size",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// OR together a list of encoded fields.
///
/// Stops at the first field that does not fit.
pub fn pack(parts: &[(Field, u32)]) -> Result<u32> {
    parts
        .iter()
        .try_fold(0u32, |word, &(field, value)| Ok(word | field.put(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_address_layout() {
        let word = (3 << 25) | (2 << 20) | 0x1D004;
        assert_eq!(Field::TileCol.get(word), 3);
        assert_eq!(Field::TileRow.get(word), 2);
        assert_eq!(Field::RegisterOffset.get(word), 0x1D004);
    }

    #[test]
    fn test_biased_fields_decode() {
        assert_eq!(Field::IterationSize.get(0x000 << 20), 1);
        assert_eq!(Field::IterationStride.get(0x5), 6);
        assert_eq!(Field::DimStride.get(0), 1);
    }

    #[test]
    fn test_biased_fields_encode() {
        assert_eq!(Field::IterationStride.put(6).unwrap(), 0x5);
        assert_eq!(Field::IterationSize.put(1).unwrap(), 0);
        assert_eq!(Field::DimStride.put(0x100000).unwrap(), 0xFFFFF);
    }

    #[test]
    fn test_put_rejects_overflow() {
        let err = Field::QueueChannel.put(2).unwrap_err();
        match err {
            CodecError::EncodeFieldInvalid { field, value, min, max } => {
                assert_eq!(field, Field::QueueChannel);
                assert_eq!(value, 2);
                assert_eq!(min, 0);
                assert_eq!(max, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(Field::TileCol.put(0x80).is_err());
        assert!(Field::TileRow.put(0x20).is_err());
    }

    #[test]
    fn test_put_rejects_bias_underflow() {
        assert!(Field::DimStride.put(0).is_err());
        assert!(Field::IterationSize.put(0).is_err());
    }

    #[test]
    fn test_put_truncating_shift_rejected() {
        // curr_iter sits at bit 26, so only 6 of its 10 mask bits fit
        assert_eq!(Field::CurrentIteration.layout().effective_mask(), 0x3F);
        assert!(Field::CurrentIteration.put(0x3F).is_ok());
        assert!(Field::CurrentIteration.put(0x40).is_err());
    }

    #[test]
    fn test_put_get_all_single_bit_fields() {
        for field in [
            Field::QueueChannel,
            Field::ChannelDirection,
            Field::EnablePacket,
            Field::UseNextBd,
            Field::ValidBd,
            Field::IssueToken,
        ] {
            for bit in [false, true] {
                let word = field.put_flag(bit).unwrap();
                assert_eq!(field.flag(word), bit, "{field}");
            }
        }
    }

    #[test]
    fn test_put_get_full_width() {
        for field in [
            Field::TileCol,
            Field::TileRow,
            Field::BdId,
            Field::RepeatCount,
            Field::QueueBdId,
            Field::DimSize,
        ] {
            let max = field.layout().max_value();
            for value in 0..=max {
                assert_eq!(field.get(field.put(value).unwrap()), value, "{field}");
            }
        }
    }

    #[test]
    fn test_pack_combines_fields() {
        let word = pack(&[(Field::TileCol, 1), (Field::TileRow, 2), (Field::BdId, 3)]).unwrap();
        assert_eq!(word, (1 << 25) | (2 << 20) | (3 << 5));
        assert!(pack(&[(Field::TileCol, 1), (Field::BdId, 16)]).is_err());
    }

    #[test]
    fn test_placed_mask() {
        assert_eq!(Field::RegisterOffset.layout().placed_mask(), 0xF_FFFF);
        assert_eq!(Field::RepeatCount.layout().placed_mask(), 0x00FF_0000);
        assert_eq!(Field::IssueToken.layout().placed_mask(), 0x8000_0000);
        assert_eq!(Field::CurrentIteration.layout().placed_mask(), 0xFC00_0000);
    }

    #[test]
    fn test_op_size_words() {
        assert_eq!(Field::OpSizeWords.put(7).unwrap(), 28);
        assert_eq!(Field::OpSizeWords.get(24), 6);
    }
}
