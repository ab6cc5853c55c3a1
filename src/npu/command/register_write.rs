//! Plain 32-bit register write (`0x00`).
//!
//! ```text
//! word 0  header 0x00
//! word 1  reserved
//! word 2  col, row, register offset [19:0]
//! word 3  reserved
//! word 4  value
//! word 5  operation size (words << 2)
//! ```
//!
//! Writes that land in the shim DMA channel register window may still be
//! task-queue pushes in disguise; [`RegisterWrite::queue_push`] gives that
//! reading of the value.

use super::{window, ChannelDirection, Decodable, Encodable, TileLocation};
use crate::npu::error::Result;
use crate::npu::fields::{Field, DMA_CHANNEL_WINDOW_MASK, SHIM_DMA_CTRL_BASE};
use crate::npu::report::ReportWriter;
use crate::npu::NpuOpcode;

/// Register write, typically a runtime parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterWrite {
    /// Target tile.
    pub location: TileLocation,
    /// Register offset inside the tile.
    pub address: u32,
    /// Value written.
    pub value: u32,
    /// Operation size in words.
    pub op_size: u32,
}

/// Task-queue reading of a register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePush {
    /// Channel direction.
    pub direction: ChannelDirection,
    /// Channel index.
    pub channel: u8,
    /// Extra repetitions of the BD.
    pub repeat_count: u8,
    /// Completion token requested.
    pub issue_token: bool,
    /// BD started.
    pub bd_id: u8,
}

impl RegisterWrite {
    /// Write `value` to `address` on `location`.
    pub fn new(location: TileLocation, address: u32, value: u32) -> Self {
        Self {
            location,
            address,
            value,
            op_size: Self::WORDS as u32,
        }
    }

    pub(crate) fn from_words(w: &[u32; 6]) -> Self {
        Self {
            location: TileLocation::decode(w[2]),
            address: Field::RegisterOffset.get(w[2]),
            value: w[4],
            op_size: Field::OpSizeWords.get(w[5]),
        }
    }

    /// Check if the address lies in the shim DMA channel register window.
    pub fn could_be_push_queue(&self) -> bool {
        self.address & DMA_CHANNEL_WINDOW_MASK == SHIM_DMA_CTRL_BASE
    }

    /// Queue-push view of the write, if the address allows one.
    pub fn queue_push(&self) -> Option<QueuePush> {
        self.could_be_push_queue().then(|| QueuePush {
            direction: ChannelDirection::from_bit(Field::ChannelDirection.flag(self.address)),
            channel: Field::QueueChannel.get(self.address) as u8,
            repeat_count: Field::RepeatCount.get(self.value) as u8,
            issue_token: Field::IssueToken.flag(self.value),
            bd_id: Field::QueueBdId.get(self.value) as u8,
        })
    }
}

impl Decodable for RegisterWrite {
    const WORDS: usize = 6;
    const OPCODE: NpuOpcode = NpuOpcode::QueueWrite;

    fn decode(words: &[u32]) -> Result<Self> {
        Ok(Self::from_words(window::<6>(words)?))
    }

    fn describe(&self, op_count: usize, w: &mut ReportWriter<'_>) {
        w.separator();
        w.word(format!("Write 32, OP count: {}", op_count));
        w.word("Reserved");
        match self.queue_push() {
            Some(push) => {
                w.word(format!("--{}", push.direction));
                w.note(format!("--Location: {}", self.location));
                w.note(format!("--Register address: 0x{:05x}", self.address));
                w.note(format!("--Channel: {}", push.channel));
                w.word("Reserved");
                w.word(format!("--Repeat count: {}", push.repeat_count));
                w.note(format!("--Issue token: {}", u8::from(push.issue_token)));
                w.note(format!("--BD ID: {}", push.bd_id));
            }
            None => {
                w.word("RTP write");
                w.note(format!("--Location: {}", self.location));
                w.note(format!("--Register address: 0x{:05x}", self.address));
                w.word("Reserved");
                w.word(format!("Value: {}", self.value));
            }
        }
        w.word(format!("OP size: {}", self.op_size));
    }
}

impl Encodable for RegisterWrite {
    fn location(&self) -> TileLocation {
        self.location
    }

    fn encode(&self) -> Result<Vec<u32>> {
        Ok(vec![
            Self::OPCODE.word(),
            0,
            self.location.encode()? | Field::RegisterOffset.put(self.address)?,
            0,
            self.value,
            Field::OpSizeWords.put(self.op_size)?,
        ])
    }
}
