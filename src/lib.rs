//! xdna-cmd library
//!
//! Codec for AMD XDNA NPU instruction streams: decode, disassemble and
//! synthesize the command words the shim DMA controller consumes.

pub mod config;
pub mod npu;
pub mod parser;
