//! Notes and the per-chart arena that owns them.
//!
//! Long notes refer to their partner by [`NoteId`], an index into the [`NoteArena`], so a pair is
//! two plain values and never a reference cycle.

use thiserror::Error;

/// Index of a note in its chart's [`NoteArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NoteId(pub(crate) usize);

impl NoteId {
    /// The raw arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// How a long note is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LongNoteType {
    /// Not declared by the note. The chart's policy decides, see
    /// [`crate::model::Chart::resolved_ln_type`].
    #[default]
    Undefined,
    /// Only the head is judged.
    LongNote,
    /// Head and release are judged.
    ChargeNote,
    /// Head and release are judged, and holding is judged continuously.
    HellChargeNote,
}

/// The variant-specific part of a [`Note`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NoteKind {
    /// A single hit.
    Plain,
    /// One end of a held note.
    Long {
        /// How the pair is judged.
        ln_type: LongNoteType,
        /// Whether this is the tail.
        is_end: bool,
        /// The other end. `None` only for a head that was never terminated.
        pair: Option<NoteId>,
    },
    /// A note that damages the player when hit.
    Mine {
        /// Damage magnitude.
        damage: f64,
    },
}

/// A sound placed at one instant, either on a lane or in the background.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Note {
    /// Index into [`crate::model::Chart::wav_list`], `None` when silent.
    pub wav: Option<usize>,
    /// Variant data.
    pub kind: NoteKind,
    /// Offset into the sound file to start playing from, in microseconds.
    pub start_us: i64,
    /// How long to play the sound for, in microseconds. Zero plays to the end.
    pub duration_us: i64,
    position: f64,
    time_us: i64,
    layered: Vec<NoteId>,
}

impl Note {
    /// Creates a note of `kind` playing `wav`.
    #[must_use]
    pub const fn new(wav: Option<usize>, kind: NoteKind) -> Self {
        Self {
            wav,
            kind,
            start_us: 0,
            duration_us: 0,
            position: 0.0,
            time_us: 0,
            layered: Vec::new(),
        }
    }

    /// A plain note.
    #[must_use]
    pub const fn plain(wav: Option<usize>) -> Self {
        Self::new(wav, NoteKind::Plain)
    }

    /// An unpaired long-note end. The decoder pairs it through the arena.
    #[must_use]
    pub const fn long(wav: Option<usize>, ln_type: LongNoteType) -> Self {
        Self::new(
            wav,
            NoteKind::Long {
                ln_type,
                is_end: false,
                pair: None,
            },
        )
    }

    /// A mine note.
    #[must_use]
    pub const fn mine(wav: Option<usize>, damage: f64) -> Self {
        Self::new(wav, NoteKind::Mine { damage })
    }

    /// Sets the sound slice this note plays.
    #[must_use]
    pub const fn with_slice(mut self, start_us: i64, duration_us: i64) -> Self {
        self.start_us = start_us;
        self.duration_us = duration_us;
        self
    }

    /// Background notes are never long notes or mines.
    pub(crate) const fn into_plain(mut self) -> Self {
        self.kind = NoteKind::Plain;
        self
    }

    /// Musical position in measures, owned by the timeline holding the note.
    #[must_use]
    pub const fn position(&self) -> f64 {
        self.position
    }

    /// Time in microseconds, owned by the timeline holding the note.
    #[must_use]
    pub const fn time_us(&self) -> i64 {
        self.time_us
    }

    /// Notes sounding together with this one.
    #[must_use]
    pub fn layered(&self) -> &[NoteId] {
        &self.layered
    }

    /// The partner of a long note.
    #[must_use]
    pub const fn pair(&self) -> Option<NoteId> {
        match self.kind {
            NoteKind::Long { pair, .. } => pair,
            _ => None,
        }
    }

    /// Whether this is a long-note tail.
    #[must_use]
    pub const fn is_long_end(&self) -> bool {
        matches!(self.kind, NoteKind::Long { is_end: true, .. })
    }

    /// Whether this is a long-note head.
    #[must_use]
    pub const fn is_long_start(&self) -> bool {
        matches!(self.kind, NoteKind::Long { is_end: false, .. })
    }

    /// The declared long-note type, `None` for other kinds.
    #[must_use]
    pub const fn ln_type(&self) -> Option<LongNoteType> {
        match self.kind {
            NoteKind::Long { ln_type, .. } => Some(ln_type),
            _ => None,
        }
    }
}

/// Why two notes could not be paired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PairError {
    /// The id is not in the arena.
    #[error("note {0:?} does not exist")]
    Missing(NoteId),
    /// The note is not a long note.
    #[error("note {0:?} is not a long note")]
    NotLong(NoteId),
    /// Head and tail are the same note.
    #[error("a long note cannot be paired with itself")]
    SameNote,
}

/// Owner of every note of a chart.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NoteArena {
    notes: Vec<Note>,
}

impl NoteArena {
    /// Stores `note` and returns its id.
    pub fn alloc(&mut self, note: Note) -> NoteId {
        self.notes.push(note);
        NoteId(self.notes.len() - 1)
    }

    /// Looks a note up.
    #[must_use]
    pub fn get(&self, id: NoteId) -> Option<&Note> {
        self.notes.get(id.0)
    }

    /// Looks a note up mutably.
    pub fn get_mut(&mut self, id: NoteId) -> Option<&mut Note> {
        self.notes.get_mut(id.0)
    }

    /// Number of notes, layered and background notes included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Whether the arena holds no note.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// All notes with their ids, in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (NoteId, &Note)> {
        self.notes.iter().enumerate().map(|(i, note)| (NoteId(i), note))
    }

    /// Links `head` and `tail` as one long note.
    ///
    /// Both sides get each other as partner, `head` becomes the start and `tail` the end. The type
    /// is taken from whichever side declares one, the head first.
    ///
    /// # Errors
    ///
    /// Fails without touching either note if an id is missing, a note is not a long note, or the
    /// ids are equal.
    pub fn pair(&mut self, head: NoteId, tail: NoteId) -> Result<(), PairError> {
        if head == tail {
            return Err(PairError::SameNote);
        }
        let head_type = self.long_type_of(head)?;
        let tail_type = self.long_type_of(tail)?;
        let ln_type = if head_type == LongNoteType::Undefined {
            tail_type
        } else {
            head_type
        };
        for (id, is_end, pair) in [(head, false, tail), (tail, true, head)] {
            if let Some(note) = self.get_mut(id) {
                note.kind = NoteKind::Long {
                    ln_type,
                    is_end,
                    pair: Some(pair),
                };
            }
        }
        Ok(())
    }

    /// Clears the partner of `id` and of its partner.
    pub(crate) fn unpair(&mut self, id: NoteId) {
        let partner = self.get(id).and_then(Note::pair);
        for side in std::iter::once(id).chain(partner) {
            if let Some(Note {
                kind: NoteKind::Long { pair, .. },
                ..
            }) = self.get_mut(side)
            {
                *pair = None;
            }
        }
    }

    pub(crate) fn push_layered(&mut self, parent: NoteId, child: NoteId) {
        if let Some(note) = self.get_mut(parent) {
            note.layered.push(child);
        }
    }

    /// Moves `id` and everything layered on it to a new instant.
    pub(crate) fn set_time(&mut self, id: NoteId, position: f64, time_us: i64) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(note) = self.get_mut(current) {
                note.position = position;
                note.time_us = time_us;
                stack.extend(note.layered.iter().copied());
            }
        }
    }

    fn long_type_of(&self, id: NoteId) -> Result<LongNoteType, PairError> {
        self.get(id)
            .ok_or(PairError::Missing(id))?
            .ln_type()
            .ok_or(PairError::NotLong(id))
    }
}
