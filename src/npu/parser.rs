//! NPU instruction stream walker.
//!
//! Walks a word array produced by mlir-aie (or by [`InstructionSequence`])
//! and decodes every command in order:
//!
//! ```text
//! ReadingHeader --> DispatchingOp --+--> Done
//!                      ^            |
//!                      +------------+  one command or one unknown word
//! ```
//!
//! Dispatch stops once the declared command count has been decoded; the
//! words left after that are padding. Unknown header words are recorded and
//! skipped one word at a time so the next well-formed command is still found.
//!
//! [`InstructionSequence`]: super::sequence::InstructionSequence

use std::collections::BTreeMap;
use std::ops::Range;

use super::command::Command;
use super::error::Result;
use super::fields::HEADER_WORDS;
use super::header::StreamHeader;
use super::report::{self, ReportLine, ReportStyle, ReportWriter, UNKNOWN_MARKER};

/// What sits at a stream position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// A decoded command.
    Command {
        /// 1-based running operation count.
        op_count: usize,
        /// The command.
        command: Command,
    },
    /// A word that matches no known op header.
    Unknown {
        /// The raw word.
        word: u32,
    },
}

/// One decoded position of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    /// Absolute word index of the entry.
    pub index: usize,
    /// What was found there.
    pub kind: EntryKind,
}

impl StreamEntry {
    /// Words the entry covers.
    pub fn word_len(&self) -> usize {
        match &self.kind {
            EntryKind::Command { command, .. } => command.word_len(),
            EntryKind::Unknown { .. } => 1,
        }
    }

    /// Absolute word range of the entry.
    pub fn span(&self) -> Range<usize> {
        self.index..self.index + self.word_len()
    }
}

/// Walker states.
#[derive(Debug, Clone, Copy)]
enum WalkState {
    ReadingHeader,
    DispatchingOp {
        header: StreamHeader,
        index: usize,
        op_count: usize,
    },
    Done {
        header: StreamHeader,
        end: usize,
    },
}

/// A fully walked instruction stream.
#[derive(Debug, Clone)]
pub struct Disassembly<'a> {
    words: &'a [u32],
    header: StreamHeader,
    entries: Vec<StreamEntry>,
    unknown_count: usize,
    padding: Range<usize>,
    padding_nonzero: usize,
}

impl<'a> Disassembly<'a> {
    /// Walk `words`, header included.
    ///
    /// Fails on a header/length mismatch or on a command that runs past the
    /// end of the array. Unknown words are not errors.
    pub fn parse(words: &'a [u32]) -> Result<Self> {
        let mut entries = Vec::new();
        let mut unknown_count = 0;
        let mut state = WalkState::ReadingHeader;

        let (header, end) = loop {
            state = match state {
                WalkState::ReadingHeader => {
                    let header = StreamHeader::decode(words)?;
                    header.validate_length(words.len() - HEADER_WORDS)?;
                    log::debug!(
                        "NPU stream header: {} commands, {} words",
                        header.command_count,
                        header.word_count
                    );
                    WalkState::DispatchingOp { header, index: HEADER_WORDS, op_count: 0 }
                }

                WalkState::DispatchingOp { header, index, op_count }
                    if index >= words.len() || op_count as u64 >= u64::from(header.command_count) =>
                {
                    WalkState::Done { header, end: index }
                }

                WalkState::DispatchingOp { header, index, op_count } => {
                    match Command::decode(&words[index..]) {
                        Some(decoded) => {
                            let command = decoded.map_err(|e| e.at(index))?;
                            let len = command.word_len();
                            log::debug!(
                                "Op {} at word {}: {} ({} words)",
                                op_count + 1,
                                index,
                                command.name(),
                                len
                            );
                            entries.push(StreamEntry {
                                index,
                                kind: EntryKind::Command { op_count: op_count + 1, command },
                            });
                            WalkState::DispatchingOp { header, index: index + len, op_count: op_count + 1 }
                        }
                        None => {
                            let word = words[index];
                            log::warn!("Unknown instruction 0x{:08X} at word {}", word, index);
                            entries.push(StreamEntry { index, kind: EntryKind::Unknown { word } });
                            unknown_count += 1;
                            WalkState::DispatchingOp { header, index: index + 1, op_count }
                        }
                    }
                }

                WalkState::Done { header, end } => break (header, end),
            };
        };

        let decoded = entries
            .iter()
            .filter(|e| matches!(e.kind, EntryKind::Command { .. }))
            .count();
        if (decoded as u64) < u64::from(header.command_count) {
            log::warn!(
                "Stream declares {} commands but only {} decoded",
                header.command_count,
                decoded
            );
        }

        let padding_nonzero = words[end..].iter().filter(|&&w| w != 0).count();
        if padding_nonzero > 0 {
            log::warn!(
                "{} non-zero words in padding after word {}; declared command count may be too low",
                padding_nonzero,
                end
            );
        }

        Ok(Self {
            words,
            header,
            entries,
            unknown_count,
            padding: end..words.len(),
            padding_nonzero,
        })
    }

    /// The stream header.
    pub fn header(&self) -> &StreamHeader {
        &self.header
    }

    /// The walked word array.
    pub fn words(&self) -> &'a [u32] {
        self.words
    }

    /// Every decoded position in stream order.
    pub fn entries(&self) -> &[StreamEntry] {
        &self.entries
    }

    /// Decoded commands with their operation counts.
    pub fn commands(&self) -> impl Iterator<Item = (usize, &Command)> + '_ {
        self.entries.iter().filter_map(|e| match &e.kind {
            EntryKind::Command { op_count, command } => Some((*op_count, command)),
            EntryKind::Unknown { .. } => None,
        })
    }

    /// Decoded commands with the raw words they were decoded from.
    pub fn command_words(&self) -> impl Iterator<Item = (&Command, &'a [u32])> + '_ {
        let words = self.words;
        self.entries.iter().filter_map(move |e| match &e.kind {
            EntryKind::Command { command, .. } => Some((command, &words[e.span()])),
            EntryKind::Unknown { .. } => None,
        })
    }

    /// Number of decoded commands.
    pub fn len(&self) -> usize {
        self.commands().count()
    }

    /// Check if no command was decoded.
    pub fn is_empty(&self) -> bool {
        self.commands().next().is_none()
    }

    /// Number of unknown words skipped.
    pub fn unknown_count(&self) -> usize {
        self.unknown_count
    }

    /// Word range left after the last declared command.
    pub fn padding(&self) -> Range<usize> {
        self.padding.clone()
    }

    /// Number of non-zero words inside the padding.
    ///
    /// Anything but zero means the header declares fewer commands than the
    /// stream holds.
    pub fn padding_nonzero(&self) -> usize {
        self.padding_nonzero
    }

    /// Check if every declared command was decoded.
    pub fn is_complete(&self) -> bool {
        self.len() as u64 == u64::from(self.header.command_count)
    }

    /// Count of each command kind, unknown words included.
    pub fn kind_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            let name = match &entry.kind {
                EntryKind::Command { command, .. } => command.name().to_string(),
                EntryKind::Unknown { word } => format!("UNKNOWN(0x{:08X})", word),
            };
            *counts.entry(name).or_insert(0) += 1;
        }
        counts
    }

    /// Annotated report of the whole stream.
    pub fn report(&self) -> Vec<ReportLine> {
        let mut lines = Vec::new();

        self.header.describe(&mut ReportWriter::new(&mut lines, &self.words[..HEADER_WORDS], 0));

        for entry in &self.entries {
            let mut w = ReportWriter::new(&mut lines, &self.words[entry.span()], entry.index);
            match &entry.kind {
                EntryKind::Command { op_count, command } => command.describe(*op_count, &mut w),
                EntryKind::Unknown { .. } => w.alert(UNKNOWN_MARKER),
            }
        }

        if !self.padding.is_empty() {
            let mut w = ReportWriter::new(&mut lines, &self.words[self.padding()], self.padding.start);
            w.separator();
            w.word(format!("Padding ({} words)", self.padding.len()));
            if self.padding_nonzero > 0 {
                w.note(format!("--{} non-zero words after the last command", self.padding_nonzero));
            }
        }

        if self.is_empty() {
            lines.push(ReportLine::Separator);
            lines.push(ReportLine::Message("No Operation found!".to_string()));
        }
        lines.push(ReportLine::Separator);
        lines
    }

    /// Render the report with `style`.
    pub fn render(&self, style: ReportStyle) -> String {
        report::render(&self.report(), style)
    }

    /// Print the report to stdout.
    pub fn print_report(&self, style: ReportStyle) {
        print!("{}", self.render(style));
    }

    /// Print a summary of the stream contents.
    pub fn print_summary(&self) {
        println!("NPU Instruction Summary");
        println!("=======================");
        println!("Device: {}", self.header.device());
        println!(
            "Commands: {} decoded / {} declared",
            self.len(),
            self.header.command_count
        );
        println!("Words: {} (+{} header)", self.header.word_count, HEADER_WORDS);
        println!("Unknown words: {}", self.unknown_count);
        println!(
            "Padding words: {} ({} non-zero)",
            self.padding.len(),
            self.padding_nonzero
        );
        println!();
        println!("Command counts:");
        let counts = self.kind_counts();
        let mut sorted: Vec<_> = counts.iter().collect();
        sorted.sort_by(|a, b| b.1.cmp(a.1));
        for (name, count) in sorted {
            println!("  {}: {}", name, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npu::command::{
        ChannelDirection, DdrPatch, Encodable, IssueToken, QueueWrite, TileLocation,
    };
    use crate::npu::error::CodecError;

    fn stream(command_count: u32, body: &[u32]) -> Vec<u32> {
        let mut words = vec![0x0001_0203, 0x0000_0004, command_count, body.len() as u32];
        words.extend_from_slice(body);
        words
    }

    fn token_and_push() -> Vec<u32> {
        let mut body = IssueToken::new(TileLocation::new(0, 0), ChannelDirection::Mm2s, 0, 0)
            .encode()
            .unwrap();
        body.extend(
            QueueWrite::new(TileLocation::new(0, 0), ChannelDirection::S2mm, 0, 1)
                .encode()
                .unwrap(),
        );
        body
    }

    #[test]
    fn test_token_push_with_padding() {
        let mut body = token_and_push();
        body.extend([0u32; 11]);
        let words = stream(2, &body);
        assert_eq!(words[3], 0x18);

        let dis = Disassembly::parse(&words).unwrap();
        assert_eq!(dis.len(), 2);
        assert_eq!(dis.unknown_count(), 0);
        let counts: Vec<_> = dis.commands().map(|(n, _)| n).collect();
        assert_eq!(counts, vec![1, 2]);
        assert!(matches!(dis.commands().next(), Some((_, Command::IssueToken(_)))));
        assert!(matches!(dis.commands().nth(1), Some((_, Command::QueueWrite(_)))));
        assert_eq!(dis.padding(), 17..28);
        assert_eq!(dis.padding().end, words.len());
        assert!(dis.is_complete());
    }

    #[test]
    fn test_unknown_word_between_patches() {
        let patch = DdrPatch::new(TileLocation::new(0, 1), 2, 0, 0).encode().unwrap();
        let second = DdrPatch::new(TileLocation::new(0, 2), 5, 1, 64).encode().unwrap();
        let mut body = patch.clone();
        body.push(0xDEAD_BEEF);
        body.extend(&second);
        let words = stream(2, &body);

        let dis = Disassembly::parse(&words).unwrap();
        assert_eq!(dis.unknown_count(), 1);
        assert_eq!(dis.len(), 2);
        assert_eq!(dis.entries()[1], StreamEntry {
            index: 16,
            kind: EntryKind::Unknown { word: 0xDEAD_BEEF },
        });
        match dis.commands().nth(1) {
            Some((2, Command::DdrPatch(p))) => {
                assert_eq!(p.bd_id, 5);
                assert_eq!(p.arg_idx, 1);
                assert_eq!(p.arg_offset, 64);
            }
            other => panic!("unexpected entry: {other:?}"),
        }
        assert!(dis.padding().is_empty());
    }

    #[test]
    fn test_length_mismatch() {
        let mut words = stream(2, &token_and_push());
        words[3] += 1;
        assert_eq!(
            Disassembly::parse(&words).unwrap_err(),
            CodecError::StreamLengthMismatch { declared: 14, actual: 13 }
        );
    }

    #[test]
    fn test_truncated_command() {
        let body = token_and_push();
        let words = stream(2, &body[..10]);
        assert_eq!(
            Disassembly::parse(&words).unwrap_err(),
            CodecError::TruncatedStream { index: 11, opcode: 0x00, needed: 6, available: 3 }
        );
    }

    #[test]
    fn test_short_header() {
        assert!(matches!(
            Disassembly::parse(&[0x0001_0203]),
            Err(CodecError::TruncatedStream { index: 0, needed: 4, available: 1, .. })
        ));
    }

    #[test]
    fn test_shortfall_is_incomplete() {
        let words = stream(3, &token_and_push());
        let dis = Disassembly::parse(&words).unwrap();
        assert_eq!(dis.len(), 2);
        assert!(!dis.is_complete());
    }

    #[test]
    fn test_empty_stream_report() {
        let words = stream(0, &[]);
        let dis = Disassembly::parse(&words).unwrap();
        assert!(dis.is_empty());
        let lines = dis.report();
        assert!(lines.iter().any(|l| l.text() == Some("No Operation found!")));
    }

    #[test]
    fn test_report_marks_unknown_and_padding() {
        let mut body = vec![0x42];
        body.extend(token_and_push());
        body.extend([0u32; 3]);
        let words = stream(2, &body);
        let dis = Disassembly::parse(&words).unwrap();

        let lines = dis.report();
        let unknown: Vec<_> = lines
            .iter()
            .filter(|l| matches!(l, ReportLine::Word { alert: true, .. }))
            .collect();
        assert_eq!(unknown.len(), 1);
        assert_eq!(unknown[0].text(), Some(UNKNOWN_MARKER));
        assert!(lines.iter().any(|l| l.text() == Some("Padding (3 words)")));

        // every word except the padding tail gets exactly one indexed line
        let indexed = lines
            .iter()
            .filter(|l| matches!(l, ReportLine::Word { index: Some(_), .. }))
            .count();
        assert_eq!(indexed, words.len() - 3 + 1);
    }

    #[test]
    fn test_commands_past_declared_count_are_flagged() {
        let body = token_and_push();
        let words = stream(1, &body);
        let dis = Disassembly::parse(&words).unwrap();
        assert_eq!(dis.len(), 1);
        assert_eq!(dis.padding(), 11..17);
        assert_eq!(dis.padding_nonzero(), 3);
        let lines = dis.report();
        assert!(lines
            .iter()
            .any(|l| l.text() == Some("--3 non-zero words after the last command")));

        let mut body = token_and_push();
        body.extend([0u32; 4]);
        let words = stream(2, &body);
        assert_eq!(Disassembly::parse(&words).unwrap().padding_nonzero(), 0);
    }

    #[test]
    fn test_kind_counts() {
        let mut body = token_and_push();
        body.push(0x42);
        let words = stream(3, &body);
        let dis = Disassembly::parse(&words).unwrap();
        let counts = dis.kind_counts();
        assert_eq!(counts.get("ISSUE_TOKEN"), Some(&1));
        assert_eq!(counts.get("QUEUE_WRITE"), Some(&1));
        assert_eq!(counts.get("UNKNOWN(0x00000042)"), Some(&1));
    }

    #[test]
    fn test_command_words_are_source_slices() {
        let body = token_and_push();
        let words = stream(2, &body);
        let dis = Disassembly::parse(&words).unwrap();
        let slices: Vec<_> = dis.command_words().map(|(_, w)| w).collect();
        assert_eq!(slices[0], &body[..7]);
        assert_eq!(slices[1], &body[7..]);
    }
}
