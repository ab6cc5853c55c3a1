//! xdna-cmd: disassembler for AMD XDNA NPU instruction streams

use std::env;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{bail, Context};
use xdna_cmd::config::Config;
use xdna_cmd::npu::ReportStyle;
use xdna_cmd::parser::{InputFormat, InstructionFile};

const USAGE: &str = "usage: xdna-cmd [--summary] [--no-color] [--width N] [--hex|--bin] <file>";

/// Command-line options.
#[derive(Debug, Default)]
struct Options {
    summary: bool,
    no_color: bool,
    width: Option<usize>,
    format: Option<InputFormat>,
    path: Option<String>,
}

fn parse_args(args: &[String]) -> anyhow::Result<Options> {
    let mut options = Options::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--summary" | "-s" => options.summary = true,
            "--no-color" => options.no_color = true,
            "--hex" => options.format = Some(InputFormat::Hex),
            "--bin" => options.format = Some(InputFormat::Binary),
            "--width" | "-w" => {
                let value = iter.next().context("--width needs a value")?;
                let width = value
                    .parse()
                    .with_context(|| format!("Invalid width '{}'", value))?;
                options.width = Some(width);
            }
            flag if flag.starts_with('-') => bail!("Unknown option '{}'\n{}", flag, USAGE),
            path => {
                if options.path.is_some() {
                    bail!("More than one input file\n{}", USAGE);
                }
                options.path = Some(path.to_string());
            }
        }
    }

    Ok(options)
}

fn run(options: Options) -> anyhow::Result<()> {
    let config = Config::get();

    let Some(path) = options.path else {
        bail!("No input file\n{}", USAGE);
    };

    let format = options
        .format
        .or(config.input_format())
        .unwrap_or_else(|| InputFormat::detect(Path::new(&path)));
    let file = InstructionFile::from_file_as(&path, format)?;

    let disassembly = file
        .disassemble()
        .with_context(|| format!("Failed to disassemble {}", path))?;

    if options.summary {
        println!("Loading: {}", path);
        println!();
        disassembly.print_summary();
        return Ok(());
    }

    let mut style = ReportStyle::from_config(config);
    if let Some(width) = options.width {
        style.width = width;
    }
    if options.no_color {
        style.color = false;
    }
    disassembly.print_report(style);

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    let result = parse_args(&args).and_then(run);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        let options =
            parse_args(&args(&["--summary", "--width", "100", "--bin", "insts.bin"])).unwrap();
        assert!(options.summary);
        assert!(!options.no_color);
        assert_eq!(options.width, Some(100));
        assert_eq!(options.format, Some(InputFormat::Binary));
        assert_eq!(options.path.as_deref(), Some("insts.bin"));
    }

    #[test]
    fn test_parse_args_errors() {
        assert!(parse_args(&args(&["--width"])).is_err());
        assert!(parse_args(&args(&["--width", "wide"])).is_err());
        assert!(parse_args(&args(&["--verbose"])).is_err());
        assert!(parse_args(&args(&["a.txt", "b.txt"])).is_err());
    }
}
