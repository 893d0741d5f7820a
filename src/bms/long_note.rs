//! Long-note pairing of the text format.
//!
//! Two encodings exist and both are supported:
//!
//! - Channel pairs (`5x`/`6x`): cells on a long-note channel alternate between opening and closing
//!   a note in their lane. [`PairTracker`] keeps the open head of every lane.
//! - Terminator object (`#LNOBJ`): the designated id on an ordinary channel turns the nearest
//!   preceding note of its lane into a head and closes it, see [`terminate`].

use std::collections::HashMap;

use crate::{
    decode::DecodeWarning,
    model::{
        note::{LongNoteType, Note, NoteId, NoteKind},
        store::TimelineStore,
    },
};

#[derive(Debug, Clone, Copy)]
struct PendingHead {
    id: NoteId,
    position: f64,
}

/// Open heads of the channel-pair encoding, per lane.
///
/// Cells must be fed per lane in ascending position.
#[derive(Debug, Default)]
pub struct PairTracker {
    pending: HashMap<usize, PendingHead>,
}

impl PairTracker {
    /// Feeds one long-note cell. Returns the warning of an anomaly, if any.
    ///
    /// - No open head in the lane: the cell opens one.
    /// - An open head at an earlier position: the cell closes it.
    /// - An open head at the same position: the head is moved to the background and the cell is
    ///   dropped, so nothing is paired with itself.
    pub fn feed(
        &mut self,
        store: &mut TimelineStore,
        lane: usize,
        position: f64,
        wav: Option<usize>,
        ln_type: LongNoteType,
    ) -> Option<DecodeWarning> {
        let Some(head) = self.pending.remove(&lane) else {
            let (id, warning) = store.place_lane_note(position, lane, Note::long(wav, ln_type));
            if warning.is_none() {
                self.pending.insert(lane, PendingHead { id, position });
            }
            return warning;
        };
        if position <= head.position {
            store.demote_to_background(head.position, lane);
            return Some(DecodeWarning::LongNoteReentrancy { lane, position });
        }
        match store.insert_note(position, lane, Note::long(wav, ln_type)) {
            Ok(tail) => {
                let _ = store.pair(head.id, tail);
                None
            }
            Err(note) => {
                self.pending.insert(lane, head);
                store.add_background_note(position, note.into_plain());
                Some(DecodeWarning::LaneCollision { lane, position })
            }
        }
    }

    /// Lanes whose head is still open.
    pub fn open_lanes(&self) -> impl Iterator<Item = usize> + '_ {
        self.pending.keys().copied()
    }
}

/// Closes a long note with a terminator object at `position` on `lane`.
///
/// The nearest preceding lane note becomes the head: a plain note is converted, an open head is
/// closed as is.
///
/// # Errors
///
/// [`DecodeWarning::LaneCollision`] when the slot at `position` is taken,
/// [`DecodeWarning::InsideLongNote`] when a closed long note spans `position`, and
/// [`DecodeWarning::OrphanTerminator`] when there is no plain note or open head to close.
pub fn terminate(
    store: &mut TimelineStore,
    lane: usize,
    position: f64,
    wav: Option<usize>,
    ln_type: LongNoteType,
) -> Result<NoteId, DecodeWarning> {
    if store.lane_note(position, lane).is_some() {
        return Err(DecodeWarning::LaneCollision { lane, position });
    }
    // an open head spans the rest of the lane and is closed here, a paired one is not
    let inside_pair = store
        .long_note_covering(lane, position)
        .and_then(|id| store.notes().get(id))
        .and_then(Note::pair)
        .is_some();
    if inside_pair {
        return Err(DecodeWarning::InsideLongNote { lane, position });
    }
    let orphan = DecodeWarning::OrphanTerminator { lane, position };
    let (_, head) = store
        .previous_note_in_lane(lane, position)
        .ok_or_else(|| orphan.clone())?;
    let head_note = store.note_mut(head).ok_or_else(|| orphan.clone())?;
    match head_note.kind {
        NoteKind::Plain => {
            head_note.kind = NoteKind::Long {
                ln_type,
                is_end: false,
                pair: None,
            };
        }
        NoteKind::Long {
            is_end: false,
            pair: None,
            ..
        } => {}
        _ => return Err(orphan),
    }
    let tail = store
        .insert_note(position, lane, Note::long(wav, ln_type))
        .map_err(|_| DecodeWarning::LaneCollision { lane, position })?;
    let _ = store.pair(head, tail);
    Ok(tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TimelineStore {
        TimelineStore::new(8, 120.0)
    }

    #[test]
    fn alternating_cells_pair_up() {
        let mut store = store();
        let mut tracker = PairTracker::default();
        for position in [0.0, 0.5, 1.0, 1.5] {
            assert_eq!(
                tracker.feed(&mut store, 0, position, Some(0), LongNoteType::Undefined),
                None
            );
        }
        assert_eq!(tracker.open_lanes().count(), 0);
        let head = store.lane_note(1.0, 0).unwrap();
        let tail = store.lane_note(1.5, 0).unwrap();
        assert_eq!(store.notes().get(head).unwrap().pair(), Some(tail));
        assert_eq!(store.notes().get(tail).unwrap().pair(), Some(head));
    }

    #[test]
    fn same_position_drops_head() {
        let mut store = store();
        let mut tracker = PairTracker::default();
        tracker.feed(&mut store, 2, 0.25, Some(0), LongNoteType::Undefined);
        let warning = tracker.feed(&mut store, 2, 0.25, Some(0), LongNoteType::Undefined);
        assert!(matches!(
            warning,
            Some(DecodeWarning::LongNoteReentrancy { lane: 2, .. })
        ));
        assert_eq!(store.lane_note(0.25, 2), None);
        assert_eq!(store.get(0.25).unwrap().bg_notes().len(), 1);
        assert_eq!(tracker.open_lanes().count(), 0);
    }

    #[test]
    fn unterminated_head_stays_open() {
        let mut store = store();
        let mut tracker = PairTracker::default();
        tracker.feed(&mut store, 1, 0.0, None, LongNoteType::ChargeNote);
        assert_eq!(tracker.open_lanes().collect::<Vec<_>>(), vec![1]);
        let head = store.lane_note(0.0, 1).unwrap();
        assert_eq!(store.notes().get(head).unwrap().pair(), None);
    }

    #[test]
    fn terminator_converts_plain_note() {
        let mut store = store();
        let head = store.insert_note(0.0, 3, Note::plain(Some(4))).unwrap();
        let tail = terminate(&mut store, 3, 0.5, None, LongNoteType::Undefined).unwrap();
        let head_note = store.notes().get(head).unwrap();
        assert!(head_note.is_long_start());
        assert_eq!(head_note.wav, Some(4));
        assert_eq!(head_note.pair(), Some(tail));
    }

    #[test]
    fn terminator_without_note_is_orphan() {
        let mut store = store();
        assert_eq!(
            terminate(&mut store, 0, 0.5, None, LongNoteType::Undefined),
            Err(DecodeWarning::OrphanTerminator {
                lane: 0,
                position: 0.5
            })
        );
        let head = store.insert_note(0.0, 0, Note::plain(None)).unwrap();
        terminate(&mut store, 0, 0.5, None, LongNoteType::Undefined).unwrap();
        // the nearest note is now a tail
        assert!(terminate(&mut store, 0, 0.75, None, LongNoteType::Undefined).is_err());
        assert!(store.notes().get(head).unwrap().is_long_start());
    }

    #[test]
    fn terminator_inside_paired_span_is_rejected() {
        let mut store = store();
        let mut tracker = PairTracker::default();
        tracker.feed(&mut store, 0, 1.0, Some(0), LongNoteType::Undefined);
        tracker.feed(&mut store, 0, 1.75, Some(0), LongNoteType::Undefined);
        assert_eq!(
            terminate(&mut store, 0, 1.5, Some(1), LongNoteType::Undefined),
            Err(DecodeWarning::InsideLongNote {
                lane: 0,
                position: 1.5
            })
        );
    }

    #[test]
    fn terminator_closes_open_channel_head() {
        let mut store = store();
        let mut tracker = PairTracker::default();
        tracker.feed(&mut store, 4, 0.0, Some(0), LongNoteType::Undefined);
        let tail = terminate(&mut store, 4, 0.5, None, LongNoteType::Undefined).unwrap();
        let head = store.lane_note(0.0, 4).unwrap();
        assert_eq!(store.notes().get(head).unwrap().pair(), Some(tail));
    }
}
