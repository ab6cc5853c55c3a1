//! Instruction file formats.
//!
//! - [`insts`] - NPU instruction streams as hex text or little-endian binary

pub mod insts;

pub use insts::{InputFormat, InstructionFile};
