//! Task-queue push (`0x00` aimed at a start-queue register).
//!
//! ```text
//! word 0  header 0x00
//! word 1  reserved
//! word 2  start-queue register: col, row, direction, channel, 0x1D204
//! word 3  reserved
//! word 4  [31] issue token  [23:16] repeat count  [3:0] bd id
//! word 5  operation size (words << 2)
//! ```

use super::{channel_register, window, ChannelDirection, Decodable, Encodable, TileLocation};
use crate::npu::error::Result;
use crate::npu::fields::{pack, Field, SHIM_DMA_START_QUEUE, START_QUEUE_MATCH_MASK};
use crate::npu::report::ReportWriter;
use crate::npu::NpuOpcode;

/// Push of a BD into a shim DMA channel's task queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueWrite {
    /// Channel direction.
    pub direction: ChannelDirection,
    /// Channel index (0 or 1).
    pub channel: u8,
    /// Target tile.
    pub location: TileLocation,
    /// Extra repetitions of the BD.
    pub repeat_count: u8,
    /// Request a completion token.
    pub issue_token: bool,
    /// BD to start.
    pub bd_id: u8,
    /// Operation size in words.
    pub op_size: u32,
}

impl QueueWrite {
    /// Push `bd_id` onto `channel` of `location`, no repeat and no token.
    pub fn new(location: TileLocation, direction: ChannelDirection, channel: u8, bd_id: u8) -> Self {
        Self {
            direction,
            channel,
            location,
            repeat_count: 0,
            issue_token: false,
            bd_id,
            op_size: Self::WORDS as u32,
        }
    }

    /// Set the repeat count.
    pub fn with_repeat(mut self, repeat_count: u8) -> Self {
        self.repeat_count = repeat_count;
        self
    }

    /// Set the issue-token flag.
    pub fn with_issue_token(mut self, issue_token: bool) -> Self {
        self.issue_token = issue_token;
        self
    }

    /// Bits of the control word a queue push can carry.
    const CONTROL_BITS: u32 = Field::RepeatCount.layout().placed_mask()
        | Field::IssueToken.layout().placed_mask()
        | Field::QueueBdId.layout().placed_mask();

    /// Check if a `0x00` op is a task-queue push.
    ///
    /// The full register offset must be a start-queue register and the value
    /// must carry no bits outside the control fields. Anything else is a
    /// plain register write, so decoding never drops bits.
    pub(crate) fn matches(w: &[u32; 6]) -> bool {
        Field::RegisterOffset.get(w[2]) & START_QUEUE_MATCH_MASK == SHIM_DMA_START_QUEUE
            && w[4] & !Self::CONTROL_BITS == 0
    }

    pub(crate) fn from_words(w: &[u32; 6]) -> Self {
        Self {
            direction: ChannelDirection::from_bit(Field::ChannelDirection.flag(w[2])),
            channel: Field::QueueChannel.get(w[2]) as u8,
            location: TileLocation::decode(w[2]),
            repeat_count: Field::RepeatCount.get(w[4]) as u8,
            issue_token: Field::IssueToken.flag(w[4]),
            bd_id: Field::QueueBdId.get(w[4]) as u8,
            op_size: Field::OpSizeWords.get(w[5]),
        }
    }

    /// Control word: repeat count, issue token and BD id.
    pub fn control_word(&self) -> Result<u32> {
        pack(&[
            (Field::RepeatCount, self.repeat_count.into()),
            (Field::IssueToken, self.issue_token.into()),
            (Field::QueueBdId, self.bd_id.into()),
        ])
    }
}

impl Decodable for QueueWrite {
    const WORDS: usize = 6;
    const OPCODE: NpuOpcode = NpuOpcode::QueueWrite;

    fn decode(words: &[u32]) -> Result<Self> {
        Ok(Self::from_words(window::<6>(words)?))
    }

    fn describe(&self, op_count: usize, w: &mut ReportWriter<'_>) {
        w.separator();
        w.word(format!("Queue write, OP count: {}", op_count));
        w.word("Reserved");
        w.word(format!("--{}", self.direction));
        w.note(format!("--Location: {}", self.location));
        w.note(format!("--Channel: {}", self.channel));
        w.word("Reserved");
        w.word(format!("--Repeat count: {}", self.repeat_count));
        w.note(format!("--Issue token: {}", u8::from(self.issue_token)));
        w.note(format!("--BD ID: {}", self.bd_id));
        w.word(format!("OP size: {}", self.op_size));
    }
}

impl Encodable for QueueWrite {
    fn location(&self) -> TileLocation {
        self.location
    }

    fn encode(&self) -> Result<Vec<u32>> {
        Ok(vec![
            Self::OPCODE.word(),
            0,
            channel_register(SHIM_DMA_START_QUEUE, self.location, self.channel, self.direction)?,
            0,
            self.control_word()?,
            Field::OpSizeWords.put(self.op_size)?,
        ])
    }
}
