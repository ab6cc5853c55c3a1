//! Human-readable disassembly report.
//!
//! A report is a flat list of [`ReportLine`]s. Each line either annotates a
//! stream word (with its absolute index), continues the annotation of the
//! previous word, or is a separator between operations. Rendering is a
//! fixed-width box:
//!
//! ```text
//! +------------------------------------------------------------------------------+
//! |    4 | 00000003 | Issue token, OP count: 1                                  |
//! |    5 | 00000000 | Reserved                                                  |
//! |    6 | 0001d210 | --MM2S                                                    |
//! |      |          | --Location: (row: 0, col: 0)                              |
//! ```
//!
//! Column widths are cosmetic; the line model is what tests look at.

use crate::config::Config;

/// Marker text for words that match no known op header.
pub const UNKNOWN_MARKER: &str = "Unknown instruction";

/// One line of a disassembly report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportLine {
    /// Visual break before a new operation.
    Separator,

    /// Annotation of a stream word.
    Word {
        /// Absolute word index, or `None` when continuing the previous word.
        index: Option<usize>,
        /// Raw word value.
        word: u32,
        /// Decoded annotation.
        text: String,
        /// Highlight the annotation (unknown words).
        alert: bool,
    },

    /// Free-standing message without index or word columns.
    Message(String),
}

impl ReportLine {
    /// Annotation text, if the line carries one.
    pub fn text(&self) -> Option<&str> {
        match self {
            ReportLine::Separator => None,
            ReportLine::Word { text, .. } => Some(text),
            ReportLine::Message(text) => Some(text),
        }
    }

    /// True for continuation lines.
    pub fn is_continuation(&self) -> bool {
        matches!(self, ReportLine::Word { index: None, .. })
    }
}

/// Appends annotated lines for a window of consecutive stream words.
///
/// Each call to [`word`](Self::word) consumes the next word of the window;
/// [`note`](Self::note) adds another annotation to the word just consumed.
pub struct ReportWriter<'a> {
    lines: &'a mut Vec<ReportLine>,
    window: &'a [u32],
    base: usize,
    next: usize,
}

impl<'a> ReportWriter<'a> {
    /// Writer over `window`, whose first word sits at absolute index `base`.
    pub fn new(lines: &'a mut Vec<ReportLine>, window: &'a [u32], base: usize) -> Self {
        Self { lines, window, base, next: 0 }
    }

    /// Emit a separator line.
    pub fn separator(&mut self) {
        self.lines.push(ReportLine::Separator);
    }

    /// Annotate the next word of the window.
    pub fn word(&mut self, text: impl Into<String>) {
        self.push_word(text.into(), false);
    }

    /// Annotate the next word of the window as an alert.
    pub fn alert(&mut self, text: impl Into<String>) {
        self.push_word(text.into(), true);
    }

    /// Add another annotation to the word most recently consumed.
    pub fn note(&mut self, text: impl Into<String>) {
        let word = self.window.get(self.next.saturating_sub(1)).copied().unwrap_or(0);
        self.lines.push(ReportLine::Word {
            index: None,
            word,
            text: text.into(),
            alert: false,
        });
    }

    /// Emit a message line.
    pub fn message(&mut self, text: impl Into<String>) {
        self.lines.push(ReportLine::Message(text.into()));
    }

    /// Number of window words consumed so far.
    pub fn consumed(&self) -> usize {
        self.next
    }

    fn push_word(&mut self, text: String, alert: bool) {
        let word = self.window.get(self.next).copied().unwrap_or(0);
        self.lines.push(ReportLine::Word {
            index: Some(self.base + self.next),
            word,
            text,
            alert,
        });
        self.next += 1;
    }
}

/// Rendering options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportStyle {
    /// Total box width in characters.
    pub width: usize,
    /// Use ANSI colour for alerts.
    pub color: bool,
}

impl Default for ReportStyle {
    fn default() -> Self {
        Self { width: 80, color: false }
    }
}

impl ReportStyle {
    /// Style taken from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            width: config.report_width(),
            color: config.color(),
        }
    }
}

/// Render report lines into a string, one line per entry.
pub fn render(lines: &[ReportLine], style: ReportStyle) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(&render_line(line, style));
        out.push('\n');
    }
    out
}

fn render_line(line: &ReportLine, style: ReportStyle) -> String {
    let inner = style.width.saturating_sub(4);
    match line {
        ReportLine::Separator => format!("+{}+", "-".repeat(style.width.saturating_sub(2))),
        ReportLine::Message(text) => boxed(text, text, inner),
        ReportLine::Word { index, word, text, alert } => {
            let prefix = match index {
                Some(index) => format!("{:>4} | {:08x} | ", index, word),
                None => format!("{:>4} | {:>8} | ", "", ""),
            };
            let plain = format!("{}{}", prefix, text);
            if *alert && style.color {
                boxed(&plain, &format!("{}\x1b[31m{}\x1b[0m", prefix, text), inner)
            } else {
                boxed(&plain, &plain, inner)
            }
        }
    }
}

/// Pad by the visible length of `plain` but print `shown`.
fn boxed(plain: &str, shown: &str, inner: usize) -> String {
    let pad = inner.saturating_sub(plain.chars().count());
    format!("| {}{} |", shown, " ".repeat(pad))
}
