//! Decode entry points, configuration, and the diagnostics produced while decoding.
//!
//! A decode never aborts on malformed content. Every recoverable problem is recorded as a
//! [`DecodeLog`] and decoding continues with a documented recovery. Only the conditions in
//! [`DecodeError`] abort a decode, and then no [`Chart`] is produced at all.
//!
//! # Usage Example
//!
//! ```rust
//! use bms_timeline::decode::{DecodeConfig, decode_bytes};
//!
//! let source = "#WAV01 kick.wav\n#BPM 120\n#00011:01\n";
//! let output = decode_bytes("song.bms", source.as_bytes(), &DecodeConfig::default()).unwrap();
//! assert_eq!(output.chart.timelines().len(), 1);
//! assert!(output.logs.is_empty());
//! ```

use std::{
    borrow::Cow,
    ops::Range,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::{
    hash::ChartHash,
    model::{Chart, LnMode, mode::Mode, store::TimelineStore},
};

/// Source format of a chart file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChartFormat {
    /// The line-oriented text format (`.bms`, `.bme`, `.bml`, `.pms`).
    #[default]
    Bms,
    /// The JSON format (`.bmson`).
    Bmson,
}

impl ChartFormat {
    /// Picks the format from the extension of `path`, case-insensitively.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "bms" | "bme" | "bml" | "pms" => Some(Self::Bms),
            "bmson" => Some(Self::Bmson),
            _ => None,
        }
    }
}

/// How serious a [`DecodeLog`] entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational, nothing was lost.
    Info,
    /// Something was skipped or replaced with a fallback.
    Warning,
    /// The chart is playable but structurally broken at this point.
    Error,
}

/// The kind of definition an unresolved reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    /// `#BPMxx` / `#EXBPMxx`.
    Bpm,
    /// `#STOPxx`.
    Stop,
    /// `#SCROLLxx`.
    Scroll,
    /// A bmson `bga_sequence` id.
    Sequence,
}

impl std::fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Bpm => "BPM",
            Self::Stop => "STOP",
            Self::Scroll => "SCROLL",
            Self::Sequence => "animation sequence",
        })
    }
}

/// What was wrong with the nesting of `#RANDOM`/`#IF` directives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ControlFlowIssue {
    /// `#IF` (or `#ELSEIF`) with no enclosing `#RANDOM`.
    #[error("#IF without #RANDOM")]
    IfWithoutRandom,
    /// `#ELSE` or `#ELSEIF` with no open `#IF`.
    #[error("#ELSE without #IF")]
    ElseWithoutIf,
    /// `#ENDIF` with no open `#IF`.
    #[error("#ENDIF without #IF")]
    EndIfWithoutIf,
    /// `#ENDRANDOM` with no open `#RANDOM`.
    #[error("#ENDRANDOM without #RANDOM")]
    EndRandomWithoutRandom,
    /// `#ENDRANDOM` closed a block whose `#IF` was still open.
    #[error("#IF left open at #ENDRANDOM")]
    UnclosedIf,
}

/// A recoverable problem found while decoding.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeWarning {
    /// A numeric argument could not be parsed.
    #[error("invalid number for {field}: {value:?}")]
    InvalidNumber {
        /// Keyword or field being parsed.
        field: String,
        /// The raw text.
        value: String,
    },
    /// A numeric argument was parsed but is outside the accepted range.
    #[error("{field} out of range: {value}")]
    OutOfRange {
        /// Keyword or field being parsed.
        field: String,
        /// The rejected value.
        value: String,
    },
    /// A tempo of zero or below was rejected.
    #[error("non-positive BPM {0} rejected")]
    NegativeBpm(f64),
    /// A negative stop duration was replaced by its magnitude.
    #[error("negative stop duration {0}, absolute value used")]
    NegativeStop(f64),
    /// A directive was missing its argument.
    #[error("missing argument for {0}")]
    MissingArgument(String),
    /// An event referenced an id with no definition.
    #[error("undefined {kind} reference {id}")]
    UndefinedReference {
        /// The kind of definition that was looked up.
        kind: DefinitionKind,
        /// The referenced id as written.
        id: String,
    },
    /// A channel line used channel digits that are not recognized.
    #[error("invalid channel {0:?}")]
    InvalidChannel(String),
    /// Channel data that is not a sequence of two-character cells.
    #[error("invalid cell data {0:?}")]
    InvalidCell(String),
    /// A measure-length line with a non-positive or unparsable value.
    #[error("invalid measure length {0:?}")]
    InvalidMeasureLength(String),
    /// Conditional directives did not nest properly.
    #[error("unbalanced control flow: {0}")]
    UnbalancedControlFlow(ControlFlowIssue),
    /// A second note was placed on an occupied lane slot.
    #[error("lane {lane} already has a note at {position}, the new note is moved to background")]
    LaneCollision {
        /// Lane index.
        lane: usize,
        /// Musical position in measures.
        position: f64,
    },
    /// A note was placed inside the span of a long note.
    #[error("note inside long note on lane {lane} at {position}, moved to background")]
    InsideLongNote {
        /// Lane index.
        lane: usize,
        /// Musical position in measures.
        position: f64,
    },
    /// A long-note cell landed on the position of the pending head it should close.
    #[error("long note on lane {lane} closed at its own head position {position}, head dropped")]
    LongNoteReentrancy {
        /// Lane index.
        lane: usize,
        /// Musical position in measures.
        position: f64,
    },
    /// A terminator object with no note before it in the lane.
    #[error("long note terminator on lane {lane} at {position} has nothing to close")]
    OrphanTerminator {
        /// Lane index.
        lane: usize,
        /// Musical position in measures.
        position: f64,
    },
    /// A long-note head that never received its tail.
    #[error("long note on lane {lane} at {position} is never terminated")]
    UnterminatedLongNote {
        /// Lane index.
        lane: usize,
        /// Musical position in measures.
        position: f64,
    },
    /// An unrecognized JSON mode hint; the 7-key layout is used.
    #[error("unknown mode hint {0:?}, beat-7k assumed")]
    UnknownModeHint(String),
    /// A `#` line whose keyword is not recognized.
    #[error("unknown header #{0}")]
    UnknownHeader(String),
    /// The text was not valid UTF-8 and was decoded as Shift_JIS.
    #[error("source is not UTF-8, decoded as Shift_JIS")]
    EncodingFallback,
}

impl DecodeWarning {
    /// The severity this kind of problem is reported with.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::UnknownHeader(_) | Self::EncodingFallback => Severity::Info,
            Self::LongNoteReentrancy { .. } | Self::UnterminatedLongNote { .. } => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

/// One entry of the diagnostic log returned alongside a decoded chart.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeLog {
    /// How serious the problem is.
    pub severity: Severity,
    /// What happened.
    pub warning: DecodeWarning,
    /// Byte range of the offending source line, when the format is line-oriented.
    pub range: Option<Range<usize>>,
}

impl DecodeLog {
    /// Creates a log entry, taking the severity from the warning kind.
    #[must_use]
    pub const fn new(warning: DecodeWarning, range: Option<Range<usize>>) -> Self {
        Self {
            severity: warning.severity(),
            warning,
            range,
        }
    }
}

impl std::fmt::Display for DecodeLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{tag}: {}", self.warning)
    }
}

/// Options of a decode.
///
/// ```rust
/// use bms_timeline::{decode::DecodeConfig, model::LnMode};
///
/// let config = DecodeConfig::default()
///     .with_selected_randoms([2, 1])
///     .with_ln_mode(LnMode::ChargeNote);
/// assert_eq!(config.selected_randoms.as_deref(), Some(&[2, 1][..]));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeConfig {
    /// Branch numbers for `#RANDOM` directives, consumed in order of appearance. Once exhausted,
    /// the generator rolls.
    pub selected_randoms: Option<Vec<u64>>,
    /// Overrides the chart's own long-note policy.
    pub ln_mode_override: Option<LnMode>,
    /// Accepts `#RONDAM`, `#END IF` and a full-width `＃` line prefix.
    pub relaxed: bool,
    /// Starting lane layout of the text format. Defaults by extension.
    pub hint: Option<Mode>,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            selected_randoms: None,
            ln_mode_override: None,
            relaxed: true,
            hint: None,
        }
    }
}

impl DecodeConfig {
    /// Sets deterministic `#RANDOM` selections.
    #[must_use]
    pub fn with_selected_randoms(mut self, selections: impl IntoIterator<Item = u64>) -> Self {
        self.selected_randoms = Some(selections.into_iter().collect());
        self
    }

    /// Overrides the long-note policy.
    #[must_use]
    pub const fn with_ln_mode(mut self, ln_mode: LnMode) -> Self {
        self.ln_mode_override = Some(ln_mode);
        self
    }

    /// Enables or disables the typo aliases.
    #[must_use]
    pub const fn with_relaxed(mut self, relaxed: bool) -> Self {
        self.relaxed = relaxed;
        self
    }

    /// Forces the starting lane layout.
    #[must_use]
    pub const fn with_hint(mut self, mode: Mode) -> Self {
        self.hint = Some(mode);
        self
    }
}

/// A decoded chart together with every recoverable problem found on the way.
#[derive(Debug, Clone)]
pub struct DecodeOutput {
    /// The decoded chart.
    pub chart: Chart,
    /// Diagnostics in the order they were found.
    pub logs: Vec<DecodeLog>,
}

impl DecodeOutput {
    /// Logs at or above `severity`.
    pub fn logs_at_least(&self, severity: Severity) -> impl Iterator<Item = &DecodeLog> {
        self.logs.iter().filter(move |log| log.severity >= severity)
    }
}

/// A condition that aborts the decode. No chart is produced.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The file that was being read.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Invalid JSON, or a required field is missing or mistyped.
    #[cfg(feature = "bmson")]
    #[error("invalid bmson document: {0}")]
    Json(#[from] serde_path_to_error::Error<serde_json::Error>),
    /// The extension is not one of the known chart formats.
    #[error("unsupported chart format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
}

/// Reads and decodes the chart at `path`.
///
/// # Errors
///
/// Returns [`DecodeError::Io`] if the file cannot be read, and otherwise the errors of
/// [`decode_bytes`].
pub fn decode_path(
    path: impl AsRef<Path>,
    config: &DecodeConfig,
) -> Result<DecodeOutput, DecodeError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_bytes(path, &bytes, config)
}

/// Decodes `bytes`, picking the format from the extension of `path`.
///
/// `#RANDOM` blocks without a caller-supplied selection are rolled with the default generator.
///
/// # Errors
///
/// Returns [`DecodeError::UnsupportedFormat`] for unknown extensions and
/// `DecodeError::Json` for JSON input that cannot be parsed as a chart document.
pub fn decode_bytes(
    path: impl AsRef<Path>,
    bytes: &[u8],
    config: &DecodeConfig,
) -> Result<DecodeOutput, DecodeError> {
    let path = path.as_ref();
    match ChartFormat::from_path(path) {
        Some(ChartFormat::Bms) => Ok(crate::bms::BmsDecoder::new(config).decode(path, bytes)),
        #[cfg(feature = "bmson")]
        Some(ChartFormat::Bmson) => crate::bmson::BmsonDecoder::new(config).decode(path, bytes),
        _ => Err(DecodeError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Decodes chart text as UTF-8, falling back to Shift_JIS. The flag tells whether the fallback
/// was taken. A leading byte order mark is dropped.
pub(crate) fn decode_text(bytes: &[u8]) -> (Cow<'_, str>, bool) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (Cow::Borrowed(text.trim_start_matches('\u{feff}')), false),
        Err(_) => {
            let (text, _) = encoding_rs::SHIFT_JIS.decode_without_bom_handling(bytes);
            (text, true)
        }
    }
}

/// Freezes the store into `chart`, hashes the input and reports long notes left open.
pub(crate) fn finalize(
    mut chart: Chart,
    store: TimelineStore,
    bytes: &[u8],
    mut logs: Vec<DecodeLog>,
) -> DecodeOutput {
    let (timelines, notes) = store.into_parts();
    for timeline in &timelines {
        for (lane, id) in timeline.lane_notes() {
            let open = notes
                .get(id)
                .is_some_and(|note| note.is_long_start() && note.pair().is_none());
            if open {
                let position = timeline.position();
                logs.push(DecodeLog::new(
                    DecodeWarning::UnterminatedLongNote { lane, position },
                    None,
                ));
            }
        }
    }
    chart.freeze(timelines, notes);
    chart.hash = ChartHash::of(bytes);
    log::debug!(
        "decoded {}: {} timelines, {} notes, {} logs",
        chart.path.display(),
        chart.timelines().len(),
        chart.notes().len(),
        logs.len()
    );
    DecodeOutput { chart, logs }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_by_extension() {
        assert_eq!(ChartFormat::from_path(Path::new("a.BME")), Some(ChartFormat::Bms));
        assert_eq!(ChartFormat::from_path(Path::new("a.pms")), Some(ChartFormat::Bms));
        assert_eq!(ChartFormat::from_path(Path::new("a.bmson")), Some(ChartFormat::Bmson));
        assert_eq!(ChartFormat::from_path(Path::new("a.txt")), None);
        assert_eq!(ChartFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn unknown_extension_is_fatal() {
        let err = decode_bytes("song.txt", b"#TITLE x", &DecodeConfig::default()).unwrap_err();
        assert!(matches!(err, DecodeError::UnsupportedFormat(_)));
    }

    #[test]
    fn shift_jis_fallback() {
        // "あ" in Shift_JIS
        let (text, fallback) = decode_text(&[0x82, 0xA0]);
        assert!(fallback);
        assert_eq!(text, "あ");

        let (text, fallback) = decode_text("\u{feff}#TITLE".as_bytes());
        assert!(!fallback);
        assert_eq!(text, "#TITLE");
    }

    #[test]
    fn severity_follows_kind() {
        assert_eq!(DecodeWarning::EncodingFallback.severity(), Severity::Info);
        assert_eq!(DecodeWarning::NegativeBpm(-1.0).severity(), Severity::Warning);
        let log = DecodeLog::new(
            DecodeWarning::UnterminatedLongNote {
                lane: 0,
                position: 1.0,
            },
            None,
        );
        assert_eq!(log.severity, Severity::Error);
    }
}
