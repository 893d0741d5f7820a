//! The decoded chart model shared by both formats.
//!
//! A [`Chart`] owns a sorted array of [`Timeline`] entries and a [`NoteArena`] holding every note
//! placed on them. Entries refer to notes by [`NoteId`], and so do long notes to their partners.
//!
//! The model is read-only after decoding: it is the sole contract with renderers, players and
//! statistics tools.

pub mod mode;
pub mod note;
pub mod store;
pub mod timeline;

use std::path::PathBuf;

pub use crate::{hash::ChartHash, metadata::Metadata};

use self::{
    mode::Mode,
    note::{LongNoteType, Note, NoteArena, NoteId},
    timeline::Timeline,
};
use crate::decode::ChartFormat;

/// How long notes without a declared type are judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LnMode {
    /// Only the head is judged (`#LNMODE 1`, bmson `ln_type: 1`).
    #[default]
    LongNote,
    /// Head and release are judged (`#LNMODE 2`).
    ChargeNote,
    /// Head, release and holding are judged (`#LNMODE 3`).
    HellChargeNote,
}

impl LnMode {
    /// Maps the numeric form used by both formats, `1..=3`.
    #[must_use]
    pub const fn from_number(n: i64) -> Option<Self> {
        match n {
            1 => Some(Self::LongNote),
            2 => Some(Self::ChargeNote),
            3 => Some(Self::HellChargeNote),
            _ => None,
        }
    }

    /// The long-note type this policy stands for.
    #[must_use]
    pub const fn note_type(self) -> LongNoteType {
        match self {
            Self::LongNote => LongNoteType::LongNote,
            Self::ChargeNote => LongNoteType::ChargeNote,
            Self::HellChargeNote => LongNoteType::HellChargeNote,
        }
    }
}

/// A decoded chart.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Chart {
    /// The file the chart was decoded from.
    pub path: PathBuf,
    /// Source format.
    pub format: ChartFormat,
    /// Lane layout.
    pub mode: Mode,
    /// Initial tempo.
    pub bpm: f64,
    /// Policy for long notes without a declared type.
    pub ln_mode: LnMode,
    /// Header fields.
    pub metadata: Metadata,
    /// Sound files, indexed by [`Note::wav`].
    pub wav_list: Vec<String>,
    /// Image files, indexed by animation cues.
    pub bga_list: Vec<String>,
    /// The branch taken at every `#RANDOM`, in order of appearance. Feeding this back as
    /// [`crate::decode::DecodeConfig::selected_randoms`] reproduces the chart.
    pub random_selections: Vec<u64>,
    /// Digests of the raw input.
    pub hash: ChartHash,
    timelines: Vec<Timeline>,
    notes: NoteArena,
}

impl Chart {
    pub(crate) fn new(path: PathBuf, format: ChartFormat, mode: Mode) -> Self {
        Self {
            path,
            format,
            mode,
            bpm: 130.0,
            ln_mode: LnMode::default(),
            metadata: Metadata::default(),
            wav_list: Vec::new(),
            bga_list: Vec::new(),
            random_selections: Vec::new(),
            hash: ChartHash::default(),
            timelines: Vec::new(),
            notes: NoteArena::default(),
        }
    }

    pub(crate) fn freeze(&mut self, timelines: Vec<Timeline>, notes: NoteArena) {
        self.timelines = timelines;
        self.notes = notes;
    }

    /// Entries sorted by position, without duplicate positions.
    #[must_use]
    pub fn timelines(&self) -> &[Timeline] {
        &self.timelines
    }

    /// Every note of the chart.
    #[must_use]
    pub const fn notes(&self) -> &NoteArena {
        &self.notes
    }

    /// Looks a note up.
    #[must_use]
    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.get(id)
    }

    /// Number of lanes of the layout.
    #[must_use]
    pub const fn lane_count(&self) -> usize {
        self.mode.key_count()
    }

    /// The type a long note is judged with: its declared type, or the chart's policy.
    #[must_use]
    pub fn resolved_ln_type(&self, note: &Note) -> Option<LongNoteType> {
        note.ln_type().map(|ln_type| match ln_type {
            LongNoteType::Undefined => self.ln_mode.note_type(),
            declared => declared,
        })
    }

    /// Every lane note as `(timeline, lane, note)`, in position order.
    pub fn lane_notes(&self) -> impl Iterator<Item = (&Timeline, usize, &Note)> {
        self.timelines.iter().flat_map(move |timeline| {
            timeline
                .lane_notes()
                .filter_map(move |(lane, id)| Some((timeline, lane, self.notes.get(id)?)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_ln_type_follows_policy() {
        let mut chart = Chart::new(PathBuf::new(), ChartFormat::Bms, Mode::Beat7K);
        chart.ln_mode = LnMode::HellChargeNote;
        let undefined = Note::long(None, LongNoteType::Undefined);
        let declared = Note::long(None, LongNoteType::ChargeNote);
        assert_eq!(
            chart.resolved_ln_type(&undefined),
            Some(LongNoteType::HellChargeNote)
        );
        assert_eq!(
            chart.resolved_ln_type(&declared),
            Some(LongNoteType::ChargeNote)
        );
        assert_eq!(chart.resolved_ln_type(&Note::plain(None)), None);
    }
}
