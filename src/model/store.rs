//! The sorted, sparse timeline store shared by both decoders.
//!
//! # Time integration
//!
//! An entry's time is derived from the entry before it:
//!
//! ```text
//! time = prev.time + prev.stop + 240_000_000 * (position - prev.position) / prev.bpm
//! ```
//!
//! in microseconds, where a position is a count of whole-note measures. Times are kept exact in
//! `f64` and truncated for [`Timeline::time_us`], so rounding never accumulates.
//!
//! # Order of timing events
//!
//! [`TimelineStore::apply_timing_events`] applies coincident events as scroll, then tempo, then
//! stop. A stop therefore always lasts according to the tempo set at the same instant.

use itertools::Itertools;

use super::{
    note::{Note, NoteArena, NoteId, NoteKind, PairError},
    timeline::Timeline,
};
use crate::decode::DecodeWarning;

/// Microseconds of one whole-note measure at 1 BPM.
pub const MEASURE_US_AT_ONE_BPM: f64 = 240_000_000.0;

/// A tempo, stop, or scroll change at a musical position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingEvent {
    /// Musical position in measures.
    pub position: f64,
    /// What changes.
    pub change: TimingChange,
}

/// The change carried by a [`TimingEvent`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimingChange {
    /// New scroll multiplier.
    Scroll(f64),
    /// New tempo. Must be positive.
    Bpm(f64),
    /// A pause lasting this many whole-note measures at the tempo in effect.
    Stop(f64),
}

impl TimingChange {
    const fn precedence(self) -> u8 {
        match self {
            Self::Scroll(_) => 0,
            Self::Bpm(_) => 1,
            Self::Stop(_) => 2,
        }
    }
}

/// Timeline entries sorted by position, plus the arena of every note placed on them.
#[derive(Debug, Clone)]
pub struct TimelineStore {
    entries: Vec<Timeline>,
    notes: NoteArena,
    lane_count: usize,
}

impl TimelineStore {
    /// Creates a store with a single entry at position 0 carrying `bpm`.
    #[must_use]
    pub fn new(lane_count: usize, bpm: f64) -> Self {
        let mut origin = Timeline::new(0.0, lane_count, bpm, 1.0);
        origin.set_bpm(bpm);
        origin.set_scroll(1.0);
        Self {
            entries: vec![origin],
            notes: NoteArena::default(),
            lane_count,
        }
    }

    /// Number of lanes of every entry.
    #[must_use]
    pub const fn lane_count(&self) -> usize {
        self.lane_count
    }

    /// Entries in position order.
    #[must_use]
    pub fn entries(&self) -> &[Timeline] {
        &self.entries
    }

    /// The note arena.
    #[must_use]
    pub const fn notes(&self) -> &NoteArena {
        &self.notes
    }

    fn find(&self, position: f64) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|entry| entry.position().total_cmp(&position))
    }

    fn index_of(&mut self, position: f64) -> usize {
        let position = position.max(0.0);
        match self.find(position) {
            Ok(index) => index,
            Err(index) => {
                // the origin entry at 0 always precedes a new entry
                let mut entry = Timeline::new(position, self.lane_count, 0.0, 1.0);
                if let Some(prev) = index.checked_sub(1).and_then(|i| self.entries.get(i)) {
                    entry.inherit(prev.bpm(), prev.scroll());
                    entry.set_time(integrate(prev, position));
                }
                self.entries.insert(index, entry);
                index
            }
        }
    }

    /// Returns the entry at exactly `position`, creating it if there is none.
    ///
    /// A new entry inherits tempo and scroll from the entry before it and is timed by integrating
    /// from that entry. Asking twice for the same position returns the same entry.
    pub fn get_or_create(&mut self, position: f64) -> &mut Timeline {
        let index = self.index_of(position);
        self.at(index)
    }

    #[allow(clippy::indexing_slicing)] // indices come from `index_of`
    fn at(&mut self, index: usize) -> &mut Timeline {
        &mut self.entries[index]
    }

    /// The entry at exactly `position`, without creating one.
    #[must_use]
    pub fn get(&self, position: f64) -> Option<&Timeline> {
        self.find(position).ok().and_then(|i| self.entries.get(i))
    }

    /// Applies tempo, stop, and scroll changes, then re-times every entry.
    ///
    /// Events are merged by position; coincident events run scroll, tempo, stop. Non-positive
    /// tempos are ignored here, decoders reject them with a warning before.
    pub fn apply_timing_events(&mut self, events: impl IntoIterator<Item = TimingEvent>) {
        let (mut scrolls, mut bpms, mut stops) = (Vec::new(), Vec::new(), Vec::new());
        for event in events {
            match event.change {
                TimingChange::Scroll(_) => scrolls.push(event),
                TimingChange::Bpm(_) => bpms.push(event),
                TimingChange::Stop(_) => stops.push(event),
            }
        }
        for list in [&mut scrolls, &mut bpms, &mut stops] {
            list.sort_by(|a, b| a.position.total_cmp(&b.position));
        }
        let merged = [scrolls, bpms, stops]
            .into_iter()
            .kmerge_by(|a: &TimingEvent, b: &TimingEvent| {
                a.position
                    .total_cmp(&b.position)
                    .then(a.change.precedence().cmp(&b.change.precedence()))
                    .is_lt()
            });
        for event in merged {
            let index = self.index_of(event.position);
            let entry = self.at(index);
            match event.change {
                TimingChange::Scroll(scroll) => entry.set_scroll(scroll),
                TimingChange::Bpm(bpm) if bpm > 0.0 => entry.set_bpm(bpm),
                TimingChange::Bpm(_) => continue,
                TimingChange::Stop(measures) => {
                    entry.add_stop(MEASURE_US_AT_ONE_BPM * measures.abs() / entry.bpm());
                }
            }
            self.retime_range(index);
        }
    }

    /// Sets the tempo from `position` on and re-times the entries after it.
    pub fn set_bpm(&mut self, position: f64, bpm: f64) {
        if bpm > 0.0 {
            self.apply_timing_events([TimingEvent {
                position,
                change: TimingChange::Bpm(bpm),
            }]);
        }
    }

    /// Recomputes inheritance and time of every entry after `changed`, then moves their notes.
    fn retime_range(&mut self, changed: usize) {
        let Self { entries, notes, .. } = self;
        let mut prev: Option<(f64, f64, f64, f64, f64)> = None;
        for entry in entries.iter_mut().skip(changed) {
            if let Some((position, time, stop, bpm, scroll)) = prev {
                entry.inherit(bpm, scroll);
                entry.set_time(
                    time + stop + MEASURE_US_AT_ONE_BPM * (entry.position() - position) / bpm,
                );
                for id in entry.owned_notes() {
                    notes.set_time(id, entry.position(), entry.time_us());
                }
            }
            prev = Some((
                entry.position(),
                entry.exact_time_us(),
                entry.exact_stop_us(),
                entry.bpm(),
                entry.scroll(),
            ));
        }
    }

    fn place(&mut self, position: f64, note: Note) -> (usize, NoteId) {
        let index = self.index_of(position);
        let entry = self.at(index);
        let (position, time_us) = (entry.position(), entry.time_us());
        let id = self.notes.alloc(note);
        self.notes.set_time(id, position, time_us);
        (index, id)
    }

    fn insert_in_slot(
        &mut self,
        position: f64,
        lane: usize,
        note: Note,
        hidden: bool,
    ) -> Result<NoteId, Note> {
        let index = self.index_of(position);
        if !matches!(self.at(index).slot_mut(lane, hidden), Some(None)) {
            return Err(note);
        }
        let (_, id) = self.place(position, note);
        if let Some(slot) = self.at(index).slot_mut(lane, hidden) {
            *slot = Some(id);
        }
        Ok(id)
    }

    /// Places `note` on `lane` at `position`.
    ///
    /// # Errors
    ///
    /// Gives the note back when the slot is taken or the lane does not exist.
    pub fn insert_note(&mut self, position: f64, lane: usize, note: Note) -> Result<NoteId, Note> {
        self.insert_in_slot(position, lane, note, false)
    }

    /// Places an invisible note on `lane` at `position`.
    ///
    /// # Errors
    ///
    /// Gives the note back when the slot is taken or the lane does not exist.
    pub fn insert_hidden_note(
        &mut self,
        position: f64,
        lane: usize,
        note: Note,
    ) -> Result<NoteId, Note> {
        self.insert_in_slot(position, lane, note, true)
    }

    /// Adds an auto-played note at `position`.
    pub fn add_background_note(&mut self, position: f64, note: Note) -> NoteId {
        let (index, id) = self.place(position, note);
        self.at(index).push_bg_note(id);
        id
    }

    /// Removes the lane note on `lane` at `position` and keeps it as a background note there.
    pub fn demote_to_background(&mut self, position: f64, lane: usize) -> Option<NoteId> {
        let index = self.find(position).ok()?;
        let entry = self.entries.get_mut(index)?;
        let id = entry.slot_mut(lane, false)?.take()?;
        self.notes.unpair(id);
        if let Some(note) = self.notes.get_mut(id) {
            note.kind = NoteKind::Plain;
        }
        entry.push_bg_note(id);
        Some(id)
    }

    /// Attaches `note` to `parent` so both sound on one trigger.
    pub fn add_layered(&mut self, parent: NoteId, note: Note) -> NoteId {
        let (position, time_us) = self
            .notes
            .get(parent)
            .map_or((0.0, 0), |p| (p.position(), p.time_us()));
        let id = self.notes.alloc(note);
        self.notes.set_time(id, position, time_us);
        self.notes.push_layered(parent, id);
        id
    }

    /// Pairs two long notes, see [`NoteArena::pair`].
    ///
    /// # Errors
    ///
    /// Forwards the arena's [`PairError`].
    pub fn pair(&mut self, head: NoteId, tail: NoteId) -> Result<(), PairError> {
        self.notes.pair(head, tail)
    }

    /// Mutable access to a note.
    pub fn note_mut(&mut self, id: NoteId) -> Option<&mut Note> {
        self.notes.get_mut(id)
    }

    /// The lane note on `lane` at exactly `position`.
    #[must_use]
    pub fn lane_note(&self, position: f64, lane: usize) -> Option<NoteId> {
        self.get(position)?.note(lane)
    }

    /// The nearest lane note on `lane` strictly before `position`, with its position.
    #[must_use]
    pub fn previous_note_in_lane(&self, lane: usize, position: f64) -> Option<(f64, NoteId)> {
        let end = match self.find(position) {
            Ok(i) | Err(i) => i,
        };
        self.entries
            .get(..end)?
            .iter()
            .rev()
            .find_map(|entry| entry.note(lane).map(|id| (entry.position(), id)))
    }

    /// Lane notes on `lane` strictly between `from` and `to`.
    #[must_use]
    pub fn notes_between(&self, lane: usize, from: f64, to: f64) -> Vec<(f64, NoteId)> {
        self.entries
            .iter()
            .skip_while(|entry| entry.position() <= from)
            .take_while(|entry| entry.position() < to)
            .filter_map(|entry| entry.note(lane).map(|id| (entry.position(), id)))
            .collect()
    }

    /// The long-note head whose span strictly contains `position` on `lane`.
    ///
    /// A head that was never terminated spans to the end of the chart.
    #[must_use]
    pub fn long_note_covering(&self, lane: usize, position: f64) -> Option<NoteId> {
        let (_, id) = self.previous_note_in_lane(lane, position)?;
        let note = self.notes.get(id)?;
        if !note.is_long_start() {
            return None;
        }
        match note.pair().and_then(|tail| self.notes.get(tail)) {
            Some(tail) => (tail.position() > position).then_some(id),
            None => Some(id),
        }
    }

    /// Places a lane note, or keeps it as a background note when it collides.
    ///
    /// A note inside a long-note span or on an occupied slot is moved to the background, so its
    /// sound still plays, and the warning describing the collision is returned.
    pub(crate) fn place_lane_note(
        &mut self,
        position: f64,
        lane: usize,
        note: Note,
    ) -> (NoteId, Option<DecodeWarning>) {
        if self.long_note_covering(lane, position).is_some() {
            let id = self.add_background_note(position, note.into_plain());
            return (id, Some(DecodeWarning::InsideLongNote { lane, position }));
        }
        match self.insert_note(position, lane, note) {
            Ok(id) => (id, None),
            Err(note) => {
                let id = self.add_background_note(position, note.into_plain());
                (id, Some(DecodeWarning::LaneCollision { lane, position }))
            }
        }
    }

    /// Places a paired long note spanning `head_position..tail_position` on `lane`.
    ///
    /// The span must be free: no long note covers the head, both slots are empty and no lane note
    /// lies in between. Otherwise the head is kept as a background note, the tail is dropped, and
    /// the warning is returned. A taken head slot is a [`DecodeWarning::LaneCollision`] even when
    /// the note there ends inside the new span.
    pub(crate) fn place_long_note(
        &mut self,
        lane: usize,
        head_position: f64,
        head: Note,
        tail_position: f64,
        tail: Note,
    ) -> Result<(NoteId, NoteId), DecodeWarning> {
        let slot_taken = |store: &Self, position| store.lane_note(position, lane).is_some();
        let collision = DecodeWarning::LaneCollision {
            lane,
            position: head_position,
        };
        let warning = if lane >= self.lane_count
            || tail_position <= head_position
            || slot_taken(self, head_position)
        {
            Some(collision)
        } else if self.long_note_covering(lane, head_position).is_some()
            || !self.notes_between(lane, head_position, tail_position).is_empty()
        {
            Some(DecodeWarning::InsideLongNote {
                lane,
                position: head_position,
            })
        } else if slot_taken(self, tail_position) {
            Some(collision)
        } else {
            None
        };
        if let Some(warning) = warning {
            self.add_background_note(head_position, head.into_plain());
            return Err(warning);
        }
        let (Ok(head_id), Ok(tail_id)) = (
            self.insert_note(head_position, lane, head),
            self.insert_note(tail_position, lane, tail),
        ) else {
            return Err(DecodeWarning::LaneCollision {
                lane,
                position: head_position,
            });
        };
        // both notes were built as long notes by the caller
        let _ = self.pair(head_id, tail_id);
        Ok((head_id, tail_id))
    }

    /// Consumes the store into its sorted entries and the arena.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Timeline>, NoteArena) {
        (self.entries, self.notes)
    }
}

fn integrate(prev: &Timeline, position: f64) -> f64 {
    prev.exact_time_us()
        + prev.exact_stop_us()
        + MEASURE_US_AT_ONE_BPM * (position - prev.position()) / prev.bpm()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent() {
        let mut store = TimelineStore::new(8, 120.0);
        store.get_or_create(1.0).set_section_line();
        let len = store.entries().len();
        let again = store.get_or_create(1.0);
        assert!(again.is_section_line());
        assert_eq!(store.entries().len(), len);
    }

    #[test]
    fn one_measure_at_120() {
        let mut store = TimelineStore::new(8, 120.0);
        assert_eq!(store.get_or_create(1.0).time_us(), 2_000_000);
    }

    #[test]
    fn entries_stay_sorted_when_created_out_of_order() {
        let mut store = TimelineStore::new(8, 120.0);
        for position in [3.0, 0.5, 2.25, 1.0, 0.5] {
            store.get_or_create(position);
        }
        let positions: Vec<_> = store.entries().iter().map(Timeline::position).collect();
        assert_eq!(positions, vec![0.0, 0.5, 1.0, 2.25, 3.0]);
    }

    #[test]
    fn bpm_change_retimes_later_entries() {
        let mut store = TimelineStore::new(8, 120.0);
        store.get_or_create(2.0);
        store.set_bpm(1.0, 240.0);
        // 2s for the first measure, 1s for the second.
        assert_eq!(store.get(2.0).unwrap().time_us(), 3_000_000);
        assert_eq!(store.get(2.0).unwrap().bpm(), 240.0);
    }

    #[test]
    fn stop_uses_tempo_of_same_instant() {
        let mut store = TimelineStore::new(8, 120.0);
        store.apply_timing_events([
            TimingEvent {
                position: 1.0,
                change: TimingChange::Stop(0.25),
            },
            TimingEvent {
                position: 1.0,
                change: TimingChange::Bpm(60.0),
            },
        ]);
        let entry = store.get(1.0).unwrap();
        assert_eq!(entry.stop_us(), 1_000_000);
        assert_eq!(store.get_or_create(2.0).time_us(), 2_000_000 + 1_000_000 + 4_000_000);
    }

    #[test]
    fn coincident_events_apply_scroll_then_tempo_then_stop() {
        let mut store = TimelineStore::new(8, 120.0);
        let at = |change| TimingEvent {
            position: 1.0,
            change,
        };
        store.apply_timing_events([
            at(TimingChange::Stop(0.25)),
            at(TimingChange::Bpm(90.0)),
            at(TimingChange::Scroll(2.0)),
            at(TimingChange::Bpm(60.0)),
            at(TimingChange::Scroll(0.5)),
        ]);
        let entry = store.get(1.0).unwrap();
        // the later of two same-kind events wins
        assert_eq!(entry.scroll(), 0.5);
        assert_eq!(entry.bpm(), 60.0);
        assert_eq!(entry.stop_us(), 1_000_000);
        let next = store.get_or_create(1.5);
        assert_eq!(next.scroll(), 0.5);
        assert_eq!(next.bpm(), 60.0);
    }

    #[test]
    fn notes_follow_retiming() {
        let mut store = TimelineStore::new(8, 120.0);
        let id = store.insert_note(1.0, 0, Note::plain(Some(0))).unwrap();
        assert_eq!(store.notes().get(id).unwrap().time_us(), 2_000_000);
        store.set_bpm(0.0, 240.0);
        assert_eq!(store.notes().get(id).unwrap().time_us(), 1_000_000);
    }

    #[test]
    fn occupied_slot_returns_note() {
        let mut store = TimelineStore::new(8, 120.0);
        store.insert_note(0.5, 2, Note::plain(Some(0))).unwrap();
        let rejected = store.insert_note(0.5, 2, Note::plain(Some(1))).unwrap_err();
        assert_eq!(rejected.wav, Some(1));
        assert!(store.insert_note(0.5, 8, Note::plain(None)).is_err());
    }

    #[test]
    fn open_long_note_covers_the_rest() {
        use crate::model::note::LongNoteType;

        let mut store = TimelineStore::new(8, 120.0);
        let head = store
            .insert_note(1.0, 0, Note::long(None, LongNoteType::LongNote))
            .unwrap();
        assert_eq!(store.long_note_covering(0, 5.0), Some(head));
        let tail = store
            .insert_note(2.0, 0, Note::long(None, LongNoteType::LongNote))
            .unwrap();
        store.pair(head, tail).unwrap();
        assert_eq!(store.long_note_covering(0, 1.5), Some(head));
        assert_eq!(store.long_note_covering(0, 2.5), None);
        assert_eq!(store.long_note_covering(1, 1.5), None);
    }

    #[test]
    fn long_note_on_taken_head_slot_is_a_collision() {
        use crate::model::note::LongNoteType;

        let long = || Note::long(Some(0), LongNoteType::Undefined);
        let mut store = TimelineStore::new(8, 120.0);
        store.place_long_note(2, 0.0, long(), 0.25, long()).unwrap();
        let warning = store
            .place_long_note(2, 0.0, long(), 0.5, long())
            .unwrap_err();
        assert_eq!(
            warning,
            DecodeWarning::LaneCollision {
                lane: 2,
                position: 0.0
            }
        );
        assert_eq!(store.get(0.0).unwrap().bg_notes().len(), 1);
        assert_eq!(store.lane_note(0.5, 2), None);

        let warning = store
            .place_long_note(2, 0.125, long(), 0.5, long())
            .unwrap_err();
        assert!(matches!(warning, DecodeWarning::InsideLongNote { lane: 2, .. }));
    }
}
