//! One instant of a chart and the animation cues that can hang off it.

use super::note::NoteId;

/// What makes an [`AnimationCue`] play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AnimationTrigger {
    /// When the player hits a note.
    Play,
    /// When the player misses a note.
    Miss,
    /// Unconditionally.
    Always,
}

/// One step of an [`AnimationSequence`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnimationFrame {
    /// Milliseconds from the start of the sequence.
    pub offset_ms: i64,
    /// Index into [`crate::model::Chart::bga_list`]. `None` ends the sequence.
    pub image: Option<usize>,
}

/// An ordered list of frames, finished by a frame without image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnimationSequence {
    /// Frames in playback order.
    pub frames: Vec<AnimationFrame>,
}

impl AnimationSequence {
    /// Milliseconds the sequence shows a missing image before ending.
    pub const FALLBACK_END_MS: i64 = 500;

    /// Shows `image` and ends after [`Self::FALLBACK_END_MS`].
    #[must_use]
    pub fn single(image: Option<usize>) -> Self {
        Self {
            frames: vec![
                AnimationFrame { offset_ms: 0, image },
                AnimationFrame {
                    offset_ms: Self::FALLBACK_END_MS,
                    image: None,
                },
            ],
        }
    }
}

/// Sequences to play when `trigger` fires.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AnimationCue {
    /// What starts the sequences.
    pub trigger: AnimationTrigger,
    /// Milliseconds between switching sequences, zero for no switching.
    pub interval: i64,
    /// Sequences played in rotation.
    pub sequences: Vec<AnimationSequence>,
}

/// One instant in musical time.
///
/// Entries are created and timed by [`super::store::TimelineStore`]; position and time are
/// read-only from outside the crate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timeline {
    position: f64,
    exact_time_us: f64,
    time_us: i64,
    bpm: f64,
    stop_us: f64,
    scroll: f64,
    bpm_set: bool,
    scroll_set: bool,
    section_line: bool,
    notes: Vec<Option<NoteId>>,
    hidden_notes: Vec<Option<NoteId>>,
    bg_notes: Vec<NoteId>,
    bga: Option<usize>,
    layer: Option<usize>,
    event_cues: Vec<AnimationCue>,
}

impl Timeline {
    pub(crate) fn new(position: f64, lane_count: usize, bpm: f64, scroll: f64) -> Self {
        Self {
            position,
            exact_time_us: 0.0,
            time_us: 0,
            bpm,
            stop_us: 0.0,
            scroll,
            bpm_set: false,
            scroll_set: false,
            section_line: false,
            notes: vec![None; lane_count],
            hidden_notes: vec![None; lane_count],
            bg_notes: Vec::new(),
            bga: None,
            layer: None,
            event_cues: Vec::new(),
        }
    }

    /// Musical position in measures from the start of the chart.
    #[must_use]
    pub const fn position(&self) -> f64 {
        self.position
    }

    /// Time in microseconds, truncated.
    #[must_use]
    pub const fn time_us(&self) -> i64 {
        self.time_us
    }

    /// Time in microseconds without truncation.
    #[must_use]
    pub const fn exact_time_us(&self) -> f64 {
        self.exact_time_us
    }

    /// Tempo in effect from this instant.
    #[must_use]
    pub const fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Pause after this instant in microseconds, truncated.
    #[must_use]
    pub const fn stop_us(&self) -> i64 {
        self.stop_us as i64
    }

    /// Scroll speed multiplier in effect from this instant.
    #[must_use]
    pub const fn scroll(&self) -> f64 {
        self.scroll
    }

    /// Whether a measure starts here.
    #[must_use]
    pub const fn is_section_line(&self) -> bool {
        self.section_line
    }

    /// The note on `lane`, if any.
    #[must_use]
    pub fn note(&self, lane: usize) -> Option<NoteId> {
        self.notes.get(lane).copied().flatten()
    }

    /// The invisible note on `lane`, if any.
    #[must_use]
    pub fn hidden_note(&self, lane: usize) -> Option<NoteId> {
        self.hidden_notes.get(lane).copied().flatten()
    }

    /// Lane notes as `(lane, id)`.
    pub fn lane_notes(&self) -> impl Iterator<Item = (usize, NoteId)> + '_ {
        self.notes
            .iter()
            .enumerate()
            .filter_map(|(lane, id)| id.map(|id| (lane, id)))
    }

    /// Hidden notes as `(lane, id)`.
    pub fn hidden_lane_notes(&self) -> impl Iterator<Item = (usize, NoteId)> + '_ {
        self.hidden_notes
            .iter()
            .enumerate()
            .filter_map(|(lane, id)| id.map(|id| (lane, id)))
    }

    /// Auto-played notes.
    #[must_use]
    pub fn bg_notes(&self) -> &[NoteId] {
        &self.bg_notes
    }

    /// Background image switched to here, index into [`crate::model::Chart::bga_list`].
    #[must_use]
    pub const fn bga(&self) -> Option<usize> {
        self.bga
    }

    /// Overlay image switched to here.
    #[must_use]
    pub const fn layer(&self) -> Option<usize> {
        self.layer
    }

    /// Event-driven animations starting here.
    #[must_use]
    pub fn event_cues(&self) -> &[AnimationCue] {
        &self.event_cues
    }

    /// Whether nothing is placed here.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes.iter().all(Option::is_none)
            && self.hidden_notes.iter().all(Option::is_none)
            && self.bg_notes.is_empty()
    }

    /// Every note owned by this entry, layered notes excluded.
    pub(crate) fn owned_notes(&self) -> impl Iterator<Item = NoteId> + '_ {
        self.notes
            .iter()
            .chain(&self.hidden_notes)
            .filter_map(|id| *id)
            .chain(self.bg_notes.iter().copied())
    }

    pub(crate) fn set_time(&mut self, exact_time_us: f64) {
        self.exact_time_us = exact_time_us;
        self.time_us = exact_time_us as i64;
    }

    pub(crate) const fn set_bpm(&mut self, bpm: f64) {
        self.bpm = bpm;
        self.bpm_set = true;
    }

    pub(crate) const fn inherit(&mut self, bpm: f64, scroll: f64) {
        if !self.bpm_set {
            self.bpm = bpm;
        }
        if !self.scroll_set {
            self.scroll = scroll;
        }
    }

    pub(crate) const fn set_scroll(&mut self, scroll: f64) {
        self.scroll = scroll;
        self.scroll_set = true;
    }

    pub(crate) fn add_stop(&mut self, stop_us: f64) {
        self.stop_us += stop_us;
    }

    pub(crate) const fn exact_stop_us(&self) -> f64 {
        self.stop_us
    }

    pub(crate) const fn set_section_line(&mut self) {
        self.section_line = true;
    }

    pub(crate) fn slot_mut(&mut self, lane: usize, hidden: bool) -> Option<&mut Option<NoteId>> {
        if hidden {
            self.hidden_notes.get_mut(lane)
        } else {
            self.notes.get_mut(lane)
        }
    }

    pub(crate) fn push_bg_note(&mut self, id: NoteId) {
        self.bg_notes.push(id);
    }

    pub(crate) const fn set_bga(&mut self, image: Option<usize>) {
        self.bga = image;
    }

    pub(crate) const fn set_layer(&mut self, image: Option<usize>) {
        self.layer = image;
    }

    pub(crate) fn push_cue(&mut self, cue: AnimationCue) {
        self.event_cues.push(cue);
    }
}
