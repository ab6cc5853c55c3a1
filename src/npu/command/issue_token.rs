//! Issue-token request (`0x03`).
//!
//! ```text
//! word 0  header 0x03
//! word 1  reserved
//! word 2  channel control register: col, row, direction, channel, 0x1D200
//! word 3  reserved
//! word 4  controller packet id << 8
//! word 5  mask 0xF00
//! word 6  operation size (words << 2)
//! ```

use super::{channel_register, window, ChannelDirection, Decodable, Encodable, TileLocation};
use crate::npu::error::Result;
use crate::npu::fields::{Field, ISSUE_TOKEN_MASK, SHIM_DMA_CTRL_BASE};
use crate::npu::report::ReportWriter;
use crate::npu::NpuOpcode;

/// Issue-token request on a shim DMA channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueToken {
    /// Channel direction.
    pub direction: ChannelDirection,
    /// Channel index (0 or 1).
    pub channel: u8,
    /// Target tile.
    pub location: TileLocation,
    /// Packet id the controller answers with.
    pub controller_packet_id: u32,
    /// Mask word, normally [`ISSUE_TOKEN_MASK`].
    pub mask: u32,
    /// Operation size in words.
    pub op_size: u32,
}

impl IssueToken {
    /// Token request on `channel` of `location`.
    pub fn new(
        location: TileLocation,
        direction: ChannelDirection,
        channel: u8,
        controller_packet_id: u32,
    ) -> Self {
        Self {
            direction,
            channel,
            location,
            controller_packet_id,
            mask: ISSUE_TOKEN_MASK,
            op_size: Self::WORDS as u32,
        }
    }

    pub(crate) fn from_words(w: &[u32; 7]) -> Self {
        Self {
            direction: ChannelDirection::from_bit(Field::ChannelDirection.flag(w[2])),
            channel: Field::QueueChannel.get(w[2]) as u8,
            location: TileLocation::decode(w[2]),
            controller_packet_id: Field::ControllerPacketId.get(w[4]),
            mask: w[5],
            op_size: Field::OpSizeWords.get(w[6]),
        }
    }
}

impl Decodable for IssueToken {
    const WORDS: usize = 7;
    const OPCODE: NpuOpcode = NpuOpcode::IssueTokenWrite;

    fn decode(words: &[u32]) -> Result<Self> {
        Ok(Self::from_words(window::<7>(words)?))
    }

    fn describe(&self, op_count: usize, w: &mut ReportWriter<'_>) {
        w.separator();
        w.word(format!("Issue token, OP count: {}", op_count));
        w.word("Reserved");
        w.word(format!("--{}", self.direction));
        w.note(format!("--Location: {}", self.location));
        w.note(format!("--Channel: {}", self.channel));
        w.word("Reserved");
        w.word(format!("Controller packet ID: {}", self.controller_packet_id));
        w.word("Mask");
        w.word(format!("OP size: {}", self.op_size));
    }
}

impl Encodable for IssueToken {
    fn location(&self) -> TileLocation {
        self.location
    }

    fn encode(&self) -> Result<Vec<u32>> {
        Ok(vec![
            Self::OPCODE.word(),
            0,
            channel_register(SHIM_DMA_CTRL_BASE, self.location, self.channel, self.direction)?,
            0,
            Field::ControllerPacketId.put(self.controller_packet_id)?,
            self.mask,
            Field::OpSizeWords.put(self.op_size)?,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_layout() {
        let token = IssueToken::new(TileLocation::new(0, 0), ChannelDirection::Mm2s, 0, 0);
        assert_eq!(
            token.encode().unwrap(),
            vec![0x03, 0, 0x1D210, 0, 0, 0xF00, 28]
        );
    }

    #[test]
    fn test_roundtrip_all_channels() {
        for direction in [ChannelDirection::S2mm, ChannelDirection::Mm2s] {
            for channel in 0..=1 {
                for row in 0..=0x1F {
                    for col in [0u8, 1, 3, 0x7F] {
                        let token =
                            IssueToken::new(TileLocation::new(row, col), direction, channel, 0xAB_CDEF);
                        let words = token.encode().unwrap();
                        let decoded = IssueToken::decode(&words).unwrap();
                        assert_eq!(decoded, token);
                        assert_eq!(decoded.encode().unwrap(), words);
                    }
                }
            }
        }
    }

    #[test]
    fn test_direction_and_channel_from_register_word() {
        // direction is bit 4 and channel bit 3 of the register word
        let words = [0x03, 0, 0x1D208, 0, 0x0500, 0xF00, 28];
        let token = IssueToken::decode(&words).unwrap();
        assert_eq!(token.direction, ChannelDirection::S2mm);
        assert_eq!(token.channel, 1);
        assert_eq!(token.controller_packet_id, 5);
        assert_eq!(token.op_size, 7);
    }

    #[test]
    fn test_rejects_wide_channel() {
        let token = IssueToken::new(TileLocation::new(0, 0), ChannelDirection::S2mm, 2, 0);
        assert!(token.encode().is_err());

        let token = IssueToken::new(TileLocation::new(0, 0), ChannelDirection::S2mm, 0, 1 << 24);
        assert!(token.encode().is_err());
    }

    #[test]
    fn test_describe() {
        let token = IssueToken::new(TileLocation::new(0, 2), ChannelDirection::Mm2s, 1, 9);
        let words = token.encode().unwrap();
        let mut lines = Vec::new();
        let mut w = ReportWriter::new(&mut lines, &words, 0);
        token.describe(1, &mut w);
        assert_eq!(w.consumed(), IssueToken::WORDS);
        let texts: Vec<_> = lines.iter().filter_map(|l| l.text()).collect();
        assert!(texts.contains(&"--MM2S"));
        assert!(texts.contains(&"--Location: (row: 0, col: 2)"));
        assert!(texts.contains(&"--Channel: 1"));
        assert!(texts.contains(&"Controller packet ID: 9"));
    }
}
