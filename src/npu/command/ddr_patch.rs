//! Host address patch of a BD (`0x81`).
//!
//! The runtime rewrites the address-low register of a shim BD with the host
//! address of kernel argument `arg_idx`, plus `arg_offset` bytes.
//!
//! ```text
//! word  0  header 0x81
//! word  1  operation size (bytes, 48)
//! word  2..5  reserved
//! word  6  BD address-low register: col, row, bd id, 0x1D004
//! word  7  reserved
//! word  8  argument index
//! word  9  reserved
//! word 10  argument offset (bytes)
//! word 11  reserved
//! ```

use super::{window, Decodable, Encodable, TileLocation};
use crate::npu::error::Result;
use crate::npu::fields::{Field, BD_ADDRESS_LOW_OFFSET, SHIM_DMA_BD_BASE};
use crate::npu::report::ReportWriter;
use crate::npu::NpuOpcode;

/// Operation size of a DDR patch in bytes.
pub const DDR_PATCH_OP_SIZE: u32 = 48;

/// Decoded or synthesized DDR patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdrPatch {
    /// Operation size in bytes.
    pub op_size: u32,
    /// Tile owning the patched BD.
    pub location: TileLocation,
    /// Patched buffer descriptor.
    pub bd_id: u8,
    /// Kernel argument whose address is patched in.
    pub arg_idx: u32,
    /// Byte offset added to the argument address.
    pub arg_offset: u32,
}

impl DdrPatch {
    /// Patch of `bd_id` on `location` with argument `arg_idx` at `arg_offset`.
    pub fn new(location: TileLocation, bd_id: u8, arg_idx: u32, arg_offset: u32) -> Self {
        Self {
            op_size: DDR_PATCH_OP_SIZE,
            location,
            bd_id,
            arg_idx,
            arg_offset,
        }
    }

    pub(crate) fn from_words(w: &[u32; 12]) -> Self {
        // The register points at address-low, so rebase before reading the BD id
        let bd_register = w[6].wrapping_sub(BD_ADDRESS_LOW_OFFSET);
        Self {
            op_size: w[1],
            location: TileLocation::decode(w[6]),
            bd_id: Field::BdId.get(bd_register) as u8,
            arg_idx: w[8],
            arg_offset: w[10],
        }
    }

    /// Address-low register word of the patched BD.
    pub fn bd_register(&self) -> Result<u32> {
        Ok(self.location.encode()?
            | Field::BdId.put(self.bd_id.into())?
            | (SHIM_DMA_BD_BASE + BD_ADDRESS_LOW_OFFSET))
    }
}

impl Decodable for DdrPatch {
    const WORDS: usize = 12;
    const OPCODE: NpuOpcode = NpuOpcode::DdrPatchWrite;

    fn decode(words: &[u32]) -> Result<Self> {
        Ok(Self::from_words(window::<12>(words)?))
    }

    fn describe(&self, op_count: usize, w: &mut ReportWriter<'_>) {
        w.separator();
        w.word(format!("DDR patch, OP count: {}", op_count));
        w.word(format!("Operation size: {}", self.op_size / 4));
        for _ in 2..6 {
            w.word("Reserved");
        }
        w.word("BD register address");
        w.note(format!("--Location: {}", self.location));
        w.note(format!("--BD ID: {}", self.bd_id));
        w.word("Reserved");
        w.word(format!("Argument index: {}", self.arg_idx));
        w.word("Reserved");
        w.word(format!("Argument offset (Bytes): {}", self.arg_offset));
        w.word("Reserved");
    }
}

impl Encodable for DdrPatch {
    fn location(&self) -> TileLocation {
        self.location
    }

    fn encode(&self) -> Result<Vec<u32>> {
        Ok(vec![
            Self::OPCODE.word(),
            self.op_size,
            0,
            0,
            0,
            0,
            self.bd_register()?,
            0,
            self.arg_idx,
            0,
            self.arg_offset,
            0,
        ])
    }
}
