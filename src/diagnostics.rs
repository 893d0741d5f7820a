//! Fancy diagnostics support using `ariadne`.
//!
//! [`DecodeLog`] entries of the text format carry the byte range of their source line, so they can
//! be rendered with the offending line underlined. Ariadne computes rows and columns from the byte
//! offsets. Entries without a range, such as those of bmson documents, point at the start of the
//! source.
//!
//! # Usage Example
//!
//! ```rust
//! use bms_timeline::{
//!     decode::{DecodeConfig, decode_bytes},
//!     diagnostics::emit_decode_logs,
//! };
//!
//! let source = "#TITLE Test\n#ARTIST Composer\n#INVALID command\n";
//! let output = decode_bytes("test.bms", source.as_bytes(), &DecodeConfig::default()).unwrap();
//!
//! emit_decode_logs("test.bms", source, &output.logs);
//! ```

use std::ops::Range;

use ariadne::{Color, Label, Report, ReportKind, Source};

use crate::decode::{DecodeLog, Severity};

/// Simple source container that holds the filename and source text.
///
/// ```rust
/// use bms_timeline::diagnostics::SimpleSource;
///
/// let source_text = "#TITLE test\n#ARTIST composer\n";
/// let source = SimpleSource::new("test.bms", source_text);
/// assert_eq!(source.text(), source_text);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SimpleSource<'a> {
    name: &'a str,
    text: &'a str,
}

impl<'a> SimpleSource<'a> {
    /// Creates a new source container.
    #[must_use]
    pub const fn new(name: &'a str, text: &'a str) -> Self {
        Self { name, text }
    }

    /// Source text content.
    #[must_use]
    pub const fn text(&self) -> &'a str {
        self.text
    }

    /// Source file name.
    #[must_use]
    pub const fn name(&self) -> &'a str {
        self.name
    }
}

/// Trait for converting positioned diagnostics to `ariadne::Report`.
pub trait ToAriadne {
    /// Converts into an ariadne report against `src`.
    fn to_report<'a>(&self, src: &SimpleSource<'a>) -> Report<'a, (String, Range<usize>)>;
}

/// Builds a styled ariadne `Report` with a single label.
#[must_use]
pub fn build_report<'a>(
    src: &SimpleSource<'a>,
    kind: ReportKind<'a>,
    range: Range<usize>,
    title: &str,
    label_message: impl ToString,
    color: Color,
) -> Report<'a, (String, Range<usize>)> {
    let filename = src.name().to_string();
    Report::build(kind, (filename.clone(), range.clone()))
        .with_message(title)
        .with_label(
            Label::new((filename, range))
                .with_message(label_message.to_string())
                .with_color(color),
        )
        .finish()
}

impl ToAriadne for DecodeLog {
    fn to_report<'a>(&self, src: &SimpleSource<'a>) -> Report<'a, (String, Range<usize>)> {
        let (kind, color, title) = match self.severity {
            Severity::Info => (ReportKind::Advice, Color::Blue, "note"),
            Severity::Warning => (ReportKind::Warning, Color::Yellow, "warning"),
            Severity::Error => (ReportKind::Error, Color::Red, "error"),
        };
        // keep the range inside the text so rendering never fails on stale offsets
        let len = src.text().len();
        let range = self
            .range
            .clone()
            .map_or(0..0, |range| range.start.min(len)..range.end.min(len));
        build_report(src, kind, range, title, &self.warning, color)
    }
}

/// Prints every log entry against its source to stderr.
pub fn emit_decode_logs<'a>(
    name: &'a str,
    source: &'a str,
    logs: impl IntoIterator<Item = &'a DecodeLog>,
) {
    let simple = SimpleSource::new(name, source);
    let ariadne_source = Source::from(source);
    for log in logs {
        let report = log.to_report(&simple);
        let _ = report.eprint((name.to_string(), ariadne_source.clone()));
    }
}

/// Collects the reports of `logs` without printing them.
#[must_use]
pub fn collect_decode_reports<'a>(
    name: &'a str,
    source: &'a str,
    logs: impl IntoIterator<Item = &'a DecodeLog>,
) -> Vec<Report<'a, (String, Range<usize>)>> {
    let simple = SimpleSource::new(name, source);
    logs.into_iter().map(|log| log.to_report(&simple)).collect()
}
