//! DMA buffer descriptor block write (`0x01`).
//!
//! ```text
//! word  0  header 0x01
//! word  1  tile address: col, row, bd id
//! word  2  operation size (bytes)
//! word  3  buffer length
//! word  4  buffer offset
//! word  5  packet: enable, out-of-order id, packet id, packet type
//! word  6  D0 size/stride        (0 = linear transfer)
//! word  7  D1 size/stride        (0 = absent)
//! word  8  D2 stride             (0 = absent, size is inferred)
//! word  9  iteration current/size/stride (0 = absent)
//! word 10  next bd, use next, valid
//! word 11  trailing word
//! ```

use super::{window, Decodable, TileLocation};
use crate::npu::error::Result;
use crate::npu::fields::Field;
use crate::npu::report::ReportWriter;
use crate::npu::NpuOpcode;

/// Packet header settings of a BD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketInfo {
    /// Out-of-order id.
    pub out_of_order_id: u8,
    /// Packet id.
    pub packet_id: u8,
    /// Packet type.
    pub packet_type: u8,
}

/// One addressing dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimension {
    /// Element count. For D2 this is inferred from the buffer length.
    pub size: u32,
    /// Stride in words (already corrected for the stored `- 1`).
    pub stride: u32,
}

/// Outer repeat dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationDim {
    /// Current iteration.
    pub current: u32,
    /// Iteration count.
    pub size: u32,
    /// Iteration stride.
    pub stride: u32,
}

/// Decoded buffer descriptor write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmaBlockWrite {
    /// Target tile.
    pub location: TileLocation,
    /// Buffer descriptor id.
    pub bd_id: u8,
    /// Operation size in bytes.
    pub op_size: u32,
    /// Buffer length.
    pub buffer_length: u32,
    /// Buffer offset in bytes.
    pub buffer_offset: u32,
    /// Packet settings, when packet mode is enabled.
    pub packet: Option<PacketInfo>,
    /// Innermost dimension.
    pub d0: Option<Dimension>,
    /// Second dimension.
    pub d1: Option<Dimension>,
    /// Third dimension.
    pub d2: Option<Dimension>,
    /// Iteration dimension.
    pub iteration: Option<IterationDim>,
    /// BD to chain to.
    pub next_bd_id: u8,
    /// Chain to `next_bd_id` when done.
    pub use_next_bd: bool,
    /// BD valid flag.
    pub valid_bd: bool,
    /// Last word of the op, kept verbatim.
    pub trailing: u32,
}

/// Decode a size/stride word; zero means the dimension is absent.
fn dimension(word: u32) -> Option<Dimension> {
    (word != 0).then(|| Dimension {
        size: Field::DimSize.get(word),
        stride: Field::DimStride.get(word),
    })
}

impl DmaBlockWrite {
    pub(crate) fn from_words(w: &[u32; 12]) -> Self {
        let buffer_length = w[3];

        let packet = Field::EnablePacket.flag(w[5]).then(|| PacketInfo {
            out_of_order_id: Field::OutOfOrderId.get(w[5]) as u8,
            packet_id: Field::PacketId.get(w[5]) as u8,
            packet_type: Field::PacketType.get(w[5]) as u8,
        });

        let d0 = dimension(w[6]);
        let d1 = dimension(w[7]);

        // D2 only stores its stride; the size is whatever the buffer length
        // leaves after D0 and D1
        let d2 = (w[8] != 0).then(|| {
            let d0_size = d0.map_or(1, |d| d.size);
            let d1_size = d1.map_or(1, |d| d.size);
            let size = d0_size
                .checked_mul(d1_size)
                .and_then(|divisor| buffer_length.checked_div(divisor))
                .unwrap_or(0);
            Dimension {
                size,
                stride: Field::DimStride.get(w[8]),
            }
        });

        let iteration = (w[9] != 0).then(|| IterationDim {
            current: Field::CurrentIteration.get(w[9]),
            size: Field::IterationSize.get(w[9]),
            stride: Field::IterationStride.get(w[9]),
        });

        Self {
            location: TileLocation::decode(w[1]),
            bd_id: Field::BdId.get(w[1]) as u8,
            op_size: w[2],
            buffer_length,
            buffer_offset: w[4],
            packet,
            d0,
            d1,
            d2,
            iteration,
            next_bd_id: Field::NextBdId.get(w[10]) as u8,
            use_next_bd: Field::UseNextBd.flag(w[10]),
            valid_bd: Field::ValidBd.flag(w[10]),
            trailing: w[11],
        }
    }

    /// Number of addressing dimensions in use (D0..D2).
    pub fn dimension_count(&self) -> usize {
        [self.d0, self.d1, self.d2].iter().filter(|d| d.is_some()).count()
    }
}

impl Decodable for DmaBlockWrite {
    const WORDS: usize = 12;
    const OPCODE: NpuOpcode = NpuOpcode::DmaBlockWrite;

    fn decode(words: &[u32]) -> Result<Self> {
        Ok(Self::from_words(window::<12>(words)?))
    }

    fn describe(&self, op_count: usize, w: &mut ReportWriter<'_>) {
        w.separator();
        w.word(format!("DMA block write, OP count: {}", op_count));

        w.word(format!("--Location: {}", self.location));
        w.note(format!("--BD ID: {}", self.bd_id));

        w.word(format!("Operation size: {}", self.op_size / 4));
        w.word(format!("--Buffer length: {}", self.buffer_length));
        w.word(format!("--Buffer offset: {}", self.buffer_offset));

        match &self.packet {
            Some(packet) => {
                w.word("--Packet enabled");
                w.note(format!("--Out of order id: {}", packet.out_of_order_id));
                w.note(format!("--Packet id: {}", packet.packet_id));
                w.note(format!("--Packet type: {}", packet.packet_type));
            }
            None => w.word("Packet disabled"),
        }

        match &self.d0 {
            Some(d) => w.word(format!("--D0 size, stride: {}, {}", d.size, d.stride)),
            None => w.word("A linear transfer, no D0"),
        }
        match &self.d1 {
            Some(d) => w.word(format!("--D1 size, stride: {}, {}", d.size, d.stride)),
            None => w.word("--No D1"),
        }
        match &self.d2 {
            Some(d) => {
                w.word(format!("--D2 stride: {}", d.stride));
                w.note(format!("--Inferred D2 size: {}", d.size));
            }
            None => w.word("--No D2"),
        }

        match &self.iteration {
            Some(it) => {
                w.word(format!("--Current iteration: {}", it.current));
                w.note(format!("--Iteration size: {}", it.size));
                w.note(format!("--Iteration stride: {}", it.stride));
            }
            None => w.word("--No Iteration dimension"),
        }

        w.word(format!("--Next BD ID: {}", self.next_bd_id));
        w.note(format!("--Use next BD: {}", u8::from(self.use_next_bd)));
        w.note(format!("--Valid BD: {}", u8::from(self.valid_bd)));

        w.word("Trailing word");
    }
}
