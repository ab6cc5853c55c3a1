//! Build a small instruction stream, write it as insts.txt, load it back
//! and print its disassembly.
//!
//! Run with: cargo run --example disasm [output.txt]

use xdna_cmd::npu::{
    ChannelDirection, DeviceContext, InstructionSequence, ReportStyle, TileLocation,
};
use xdna_cmd::parser::{insts, InputFormat, InstructionFile};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn")
    ).init();

    // NPU1: shim row, one memory tile row, four compute rows, four columns
    let device = DeviceContext::new(6, 4, 1).with_version(1, 0, 1);
    let shim = TileLocation::new(0, 0);

    let mut seq = InstructionSequence::new(device);
    seq.write_rtp(TileLocation::new(2, 0), 0x0400, 3)?;
    seq.patch_address(shim, 0, 0, 0)?;
    seq.push_queue(shim, ChannelDirection::Mm2s, 0, 0, false)?;
    seq.patch_address(shim, 1, 1, 0)?;
    seq.push_queue(shim, ChannelDirection::S2mm, 0, 1, true)?;
    seq.issue_token(shim, ChannelDirection::S2mm, 0, 0)?;
    println!("Built {} commands for {}", seq.len(), seq.device());

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| std::env::temp_dir().join("xdna-cmd-demo.txt").display().to_string());
    insts::write_words(&path, &seq.finish()?, InputFormat::Hex)?;
    println!("Wrote {}", path);
    println!();

    let file = InstructionFile::from_file(&path)?;
    let disassembly = file.disassemble()?;
    disassembly.print_report(ReportStyle::default());
    println!();
    disassembly.print_summary();

    Ok(())
}
