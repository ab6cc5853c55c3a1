//! Wait for a completion token (`0x80`, TXN_OPC_TCT).
//!
//! ```text
//! word 0  header 0x80
//! word 1  operation size (bytes)
//! word 2  [23:16] col  [15:8] row  [7:0] direction
//! word 3  [31:24] channel  [23:16] num cols  [15:8] num rows (unused)
//! ```

use super::{window, Decodable, TileLocation};
use crate::npu::error::Result;
use crate::npu::fields::Field;
use crate::npu::report::ReportWriter;
use crate::npu::NpuOpcode;

/// Decoded sync wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitSync {
    /// Operation size in bytes.
    pub op_size: u32,
    /// Direction byte of the location word.
    pub direction: u8,
    /// Tile waited on.
    pub location: TileLocation,
    /// Row span, unused by the hardware.
    pub num_rows: u8,
    /// Column span, unused by the hardware.
    pub num_cols: u8,
    /// Channel waited on.
    pub channel: u8,
}

impl WaitSync {
    pub(crate) fn from_words(w: &[u32; 4]) -> Self {
        Self {
            op_size: w[1],
            direction: Field::SyncDirection.get(w[2]) as u8,
            location: TileLocation {
                row: Field::SyncRow.get(w[2]) as u8,
                col: Field::SyncCol.get(w[2]) as u8,
            },
            num_rows: Field::SyncRow.get(w[3]) as u8,
            num_cols: Field::SyncCol.get(w[3]) as u8,
            channel: Field::SyncChannel.get(w[3]) as u8,
        }
    }
}

impl Decodable for WaitSync {
    const WORDS: usize = 4;
    const OPCODE: NpuOpcode = NpuOpcode::SyncWrite;

    fn decode(words: &[u32]) -> Result<Self> {
        Ok(Self::from_words(window::<4>(words)?))
    }

    fn describe(&self, op_count: usize, w: &mut ReportWriter<'_>) {
        w.separator();
        w.word(format!("Wait sync: TXN_OPC_TCT, OP count: {}", op_count));
        w.word(format!("--Operation size: {}", self.op_size / 4));
        w.word(format!("--Location: {}", self.location));
        w.note(format!("--Direction: {}", self.direction));
        w.word(format!(
            "--Unused: (num rows: {}, num cols: {})",
            self.num_rows, self.num_cols
        ));
        w.note(format!("--Channel: {}", self.channel));
    }
}
