//! The bmson decoder.
//!
//! Pulses become measure positions by dividing by `4 * resolution`. Timing events are merged into
//! the store first, so every note lands on an entry whose time is final. Long notes of every
//! channel are placed before short notes, so a note inside a long note is detected whichever
//! channel it comes from.

use std::{collections::HashMap, path::Path};

use itertools::Itertools;

use super::{BgaEvent, BgaId, Bmson, BmsonInfo, PulseNumber};
use crate::{
    decode::{
        ChartFormat, DecodeConfig, DecodeError, DecodeLog, DecodeOutput, DecodeWarning,
        DefinitionKind, finalize,
    },
    model::{
        Chart, LnMode,
        mode::Mode,
        note::{LongNoteType, Note, NoteKind},
        store::{TimelineStore, TimingChange, TimingEvent},
        timeline::{AnimationCue, AnimationFrame, AnimationSequence, AnimationTrigger},
    },
};

/// Pulses per quarter note when the document gives none or a non-positive one.
const FALLBACK_RESOLUTION: i64 = 240;

/// Measure lines synthesized for a document without `lines` stop here, the range a text chart's
/// three-digit measure numbers can address.
const MAX_GENERATED_MEASURES: u64 = 1000;

/// Decoder of `.bmson` files.
///
/// ```rust
/// use bms_timeline::{bmson::BmsonDecoder, decode::DecodeConfig};
///
/// let json = r#"{
///     "version": "1.0.0",
///     "info": { "init_bpm": 120, "resolution": 240 },
///     "sound_channels": [{ "name": "a.wav", "notes": [{ "x": 1, "y": 960 }] }]
/// }"#;
/// let output = BmsonDecoder::new(&DecodeConfig::default())
///     .decode("song.bmson", json.as_bytes())
///     .unwrap();
/// let (timeline, lane, _) = output.chart.lane_notes().next().unwrap();
/// assert_eq!((timeline.position(), lane), (1.0, 0));
/// assert_eq!(timeline.time_us(), 2_000_000);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BmsonDecoder<'a> {
    config: &'a DecodeConfig,
}

impl<'a> BmsonDecoder<'a> {
    /// Creates a decoder using `config`.
    #[must_use]
    pub const fn new(config: &'a DecodeConfig) -> Self {
        Self { config }
    }

    /// Parses and decodes `bytes`.
    ///
    /// # Errors
    ///
    /// [`DecodeError::Json`] when the input is not JSON or lacks a required field, with the path of
    /// the offending value.
    pub fn decode(
        &self,
        path: impl AsRef<Path>,
        bytes: &[u8],
    ) -> Result<DecodeOutput, DecodeError> {
        let path = path.as_ref();
        log::debug!("decoding {} as bmson", path.display());
        let text = String::from_utf8_lossy(bytes);
        let deserializer = &mut serde_json::Deserializer::from_str(&text);
        let bmson: Bmson = serde_path_to_error::deserialize(deserializer)?;
        Ok(self.decode_document(path, &bmson, bytes))
    }

    /// Decodes an already parsed document. `bytes` are only hashed.
    pub fn decode_document(&self, path: &Path, bmson: &Bmson, bytes: &[u8]) -> DecodeOutput {
        let mut logs = Vec::new();
        let mut warn = |warning| logs.push(DecodeLog::new(warning, None));

        let info = &bmson.info;
        let mode = Mode::from_hint(&info.mode_hint).unwrap_or_else(|| {
            warn(DecodeWarning::UnknownModeHint(info.mode_hint.clone()));
            Mode::Beat7K
        });
        let mut chart = Chart::new(path.to_path_buf(), ChartFormat::Bmson, mode);
        apply_info(&mut chart, info);
        if info.init_bpm > 0.0 {
            chart.bpm = info.init_bpm;
        } else {
            warn(DecodeWarning::NegativeBpm(info.init_bpm));
        }
        chart.ln_mode = self
            .config
            .ln_mode_override
            .or_else(|| LnMode::from_number(info.ln_type))
            .unwrap_or_default();

        let resolution = if info.resolution > 0 {
            info.resolution
        } else {
            FALLBACK_RESOLUTION
        };
        let mut build = Build {
            store: TimelineStore::new(mode.key_count(), chart.bpm),
            pulses_per_measure: 4.0 * resolution as f64,
            mode,
            logs: Vec::new(),
        };
        build.logs.append(&mut logs);
        build.timing(bmson);
        build.bar_lines(bmson);
        build.notes(bmson);
        chart.wav_list = bmson
            .sound_channels
            .iter()
            .map(|channel| channel.name.clone())
            .chain(bmson.key_channels.iter().map(|channel| channel.name.clone()))
            .chain(bmson.mine_channels.iter().map(|channel| channel.name.clone()))
            .collect();
        chart.bga_list = build.animations(bmson);
        let Build { store, logs, .. } = build;
        finalize(chart, store, bytes, logs)
    }
}

fn apply_info(chart: &mut Chart, info: &BmsonInfo) {
    let metadata = &mut chart.metadata;
    metadata.title.clone_from(&info.title);
    metadata.subtitle.clone_from(&info.subtitle);
    metadata.artist.clone_from(&info.artist);
    metadata.subartist = info.subartists.iter().map(|s| s.trim()).join(",");
    metadata.genre.clone_from(&info.genre);
    metadata.chart_name.clone_from(&info.chart_name);
    metadata.play_level = info.level.to_string();
    if info.judge_rank >= 0.0 {
        metadata.defexrank = Some(info.judge_rank);
    }
    if info.total > 0.0 {
        metadata.total = Some(info.total);
    }
    let image = |name: &Option<String>| name.clone().unwrap_or_default();
    metadata.backbmp = image(&info.back_image);
    metadata.stagefile = image(&info.eyecatch_image);
    metadata.title_image = image(&info.title_image);
    metadata.banner = image(&info.banner_image);
    metadata.preview = image(&info.preview_music);
}

/// A sound-channel note with its lane resolved and its sound slice computed.
#[derive(Debug, Clone)]
struct PlannedNote {
    wav: usize,
    lane: Option<usize>,
    position: f64,
    length: f64,
    ln_type: LongNoteType,
    up: bool,
    start_us: i64,
    duration_us: i64,
}

struct Build {
    store: TimelineStore,
    pulses_per_measure: f64,
    mode: Mode,
    logs: Vec<DecodeLog>,
}

impl Build {
    fn warn(&mut self, warning: DecodeWarning) {
        self.logs.push(DecodeLog::new(warning, None));
    }

    fn position(&self, y: PulseNumber) -> f64 {
        y.measures(self.pulses_per_measure)
    }

    fn timing(&mut self, bmson: &Bmson) {
        let mut events = Vec::new();
        for event in &bmson.bpm_events {
            if event.bpm > 0.0 {
                events.push(TimingEvent {
                    position: self.position(event.y),
                    change: TimingChange::Bpm(event.bpm),
                });
            } else {
                self.warn(DecodeWarning::NegativeBpm(event.bpm));
            }
        }
        for event in &bmson.stop_events {
            if event.duration < 0 {
                self.warn(DecodeWarning::NegativeStop(event.duration as f64));
            }
            events.push(TimingEvent {
                position: self.position(event.y),
                change: TimingChange::Stop(
                    event.duration.unsigned_abs() as f64 / self.pulses_per_measure,
                ),
            });
        }
        for event in &bmson.scroll_events {
            events.push(TimingEvent {
                position: self.position(event.y),
                change: TimingChange::Scroll(event.rate),
            });
        }
        self.store.apply_timing_events(events);
    }

    fn bar_lines(&mut self, bmson: &Bmson) {
        if let Some(lines) = &bmson.lines {
            for line in lines {
                let position = self.position(line.y);
                self.store.get_or_create(position).set_section_line();
            }
            return;
        }
        let last = bmson
            .sound_channels
            .iter()
            .flat_map(|channel| {
                channel
                    .notes
                    .iter()
                    .map(|note| note.y.0.saturating_add(note.l))
            })
            .chain(bmson.bpm_events.iter().map(|event| event.y.0))
            .chain(bmson.stop_events.iter().map(|event| event.y.0))
            .chain(bmson.scroll_events.iter().map(|event| event.y.0))
            .max()
            .unwrap_or(0);
        let last_measure = (last as f64 / self.pulses_per_measure).floor() as u64;
        if last_measure >= MAX_GENERATED_MEASURES {
            self.warn(DecodeWarning::OutOfRange {
                field: "last measure".to_string(),
                value: last_measure.to_string(),
            });
        }
        for measure in 0..=last_measure.min(MAX_GENERATED_MEASURES - 1) {
            self.store
                .get_or_create(measure as f64)
                .set_section_line();
        }
    }

    /// Resolves lanes and continuation slices of every sound-channel note.
    fn plan(&mut self, bmson: &Bmson) -> Vec<PlannedNote> {
        let mut planned = Vec::new();
        for (wav, channel) in bmson.sound_channels.iter().enumerate() {
            let notes = channel.notes.iter().sorted_by_key(|note| note.y).collect_vec();
            let mut start_us = 0;
            for (index, note) in notes.iter().enumerate() {
                if !note.c {
                    start_us = 0;
                }
                let position = self.position(note.y);
                let time = self.store.get_or_create(position).exact_time_us();
                // the slice lasts until the next note continues it
                let next = notes.get(index + 1..).unwrap_or_default();
                let next_y = next.iter().map(|n| n.y).find(|&y| y > note.y);
                let continued = next_y.filter(|&y| next.iter().any(|n| n.y == y && n.c));
                let duration_us = match continued {
                    Some(y) => {
                        let next_position = self.position(y);
                        (self.store.get_or_create(next_position).exact_time_us() - time).round() as i64
                    }
                    None => 0,
                };
                planned.push(PlannedNote {
                    wav,
                    lane: self.mode.lane_for_x(note.x),
                    position,
                    length: note.l as f64 / self.pulses_per_measure,
                    ln_type: LnMode::from_number(note.t)
                        .map_or(LongNoteType::Undefined, LnMode::note_type),
                    up: note.up,
                    start_us,
                    duration_us,
                });
                start_us += duration_us;
            }
        }
        planned
    }

    fn notes(&mut self, bmson: &Bmson) {
        let planned = self.plan(bmson);
        let by_position = |a: &&PlannedNote, b: &&PlannedNote| a.position.total_cmp(&b.position);
        let (long, short): (Vec<_>, Vec<_>) = planned
            .iter()
            .filter(|note| !note.up)
            .sorted_by(by_position)
            .partition(|note| note.lane.is_some() && note.length > 0.0);
        for note in long.into_iter().chain(short) {
            self.place(note);
        }
        for note in planned.iter().filter(|note| note.up) {
            self.assign_tail_sound(note);
        }

        let sound_count = bmson.sound_channels.len();
        for (offset, channel) in bmson.key_channels.iter().enumerate() {
            for note in &channel.notes {
                let Some(lane) = self.mode.lane_for_x(note.x) else {
                    continue;
                };
                let position = self.position(note.y);
                let hidden = Note::plain(Some(sound_count + offset));
                if self.store.insert_hidden_note(position, lane, hidden).is_err() {
                    self.warn(DecodeWarning::LaneCollision { lane, position });
                }
            }
        }
        let mine_base = sound_count + bmson.key_channels.len();
        for (offset, channel) in bmson.mine_channels.iter().enumerate() {
            for note in channel.notes.iter().sorted_by_key(|note| note.y) {
                let Some(lane) = self.mode.lane_for_x(note.x) else {
                    continue;
                };
                let position = self.position(note.y);
                let mine = Note::mine(Some(mine_base + offset), note.damage);
                if let (_, Some(warning)) = self.store.place_lane_note(position, lane, mine) {
                    self.warn(warning);
                }
            }
        }
    }

    fn place(&mut self, planned: &PlannedNote) {
        let sound = |note: Note| note.with_slice(planned.start_us, planned.duration_us);
        let position = planned.position;
        let Some(lane) = planned.lane else {
            self.store
                .add_background_note(position, sound(Note::plain(Some(planned.wav))));
            return;
        };
        let is_long = planned.length > 0.0;
        let tail_position = position + planned.length;
        let note = if is_long {
            sound(Note::long(Some(planned.wav), planned.ln_type))
        } else {
            sound(Note::plain(Some(planned.wav)))
        };

        if let Some(existing) = self.store.lane_note(position, lane) {
            let layerable = self.store.notes().get(existing).is_some_and(|first| {
                match (&first.kind, is_long) {
                    (NoteKind::Plain, false) => true,
                    (NoteKind::Long { is_end: false, .. }, true) => first
                        .pair()
                        .and_then(|tail| self.store.notes().get(tail))
                        .is_some_and(|tail| tail.position() == tail_position),
                    _ => false,
                }
            });
            if layerable {
                self.store.add_layered(existing, note);
                return;
            }
        }

        let warning = if is_long {
            let tail = Note::long(None, planned.ln_type);
            self.store
                .place_long_note(lane, position, note, tail_position, tail)
                .err()
        } else {
            self.store.place_lane_note(position, lane, note).1
        };
        if let Some(warning) = warning {
            self.warn(warning);
        }
    }

    /// Gives the tail ending at the note's position the note's sound. Without such a tail the note
    /// plays in the background.
    fn assign_tail_sound(&mut self, planned: &PlannedNote) {
        let tail = planned
            .lane
            .and_then(|lane| self.store.lane_note(planned.position, lane))
            .filter(|&id| self.store.notes().get(id).is_some_and(Note::is_long_end));
        match tail.and_then(|id| self.store.note_mut(id)) {
            Some(tail) => tail.wav = Some(planned.wav),
            None => {
                self.store
                    .add_background_note(planned.position, Note::plain(Some(planned.wav)));
            }
        }
    }

    /// Places animation events and returns the image list.
    fn animations(&mut self, bmson: &Bmson) -> Vec<String> {
        let bga = &bmson.bga;
        let images: HashMap<BgaId, usize> = bga
            .bga_header
            .iter()
            .enumerate()
            .map(|(index, header)| (header.id, index))
            .collect();
        let sequences: HashMap<BgaId, AnimationSequence> = bga
            .bga_sequence
            .iter()
            .map(|sequence| {
                let frames = sequence
                    .sequence
                    .iter()
                    .map(|step| AnimationFrame {
                        offset_ms: step.time,
                        image: u32::try_from(step.id)
                            .ok()
                            .and_then(|id| images.get(&BgaId(id)).copied()),
                    })
                    .collect();
                (sequence.id, AnimationSequence { frames })
            })
            .collect();

        for event in &bga.bga_events {
            if let Some(&image) = images.get(&event.id) {
                let position = self.position(event.y);
                self.store.get_or_create(position).set_bga(Some(image));
            }
        }
        for event in &bga.layer_events {
            let position = self.position(event.y);
            if event.id_set.is_none() && event.condition.is_none() {
                if let Some(&image) = images.get(&event.id) {
                    self.store.get_or_create(position).set_layer(Some(image));
                }
                continue;
            }
            let cue = self.cue(event, &images, &sequences);
            self.store.get_or_create(position).push_cue(cue);
        }
        for event in &bga.poor_events {
            let sequence = self.sequence(event.id, &images, &sequences);
            let position = self.position(event.y);
            self.store.get_or_create(position).push_cue(AnimationCue {
                trigger: AnimationTrigger::Miss,
                interval: 0,
                sequences: vec![sequence],
            });
        }
        bga.bga_header
            .iter()
            .map(|header| header.name.clone())
            .collect()
    }

    fn cue(
        &mut self,
        event: &BgaEvent,
        images: &HashMap<BgaId, usize>,
        sequences: &HashMap<BgaId, AnimationSequence>,
    ) -> AnimationCue {
        let trigger = match event.condition.as_deref() {
            Some("play") => AnimationTrigger::Play,
            Some("miss") => AnimationTrigger::Miss,
            _ => AnimationTrigger::Always,
        };
        let ids = event
            .id_set
            .clone()
            .unwrap_or_else(|| vec![event.id]);
        let sequences = ids
            .into_iter()
            .map(|id| self.sequence(id, images, sequences))
            .collect();
        AnimationCue {
            trigger,
            interval: event.interval,
            sequences,
        }
    }

    /// The sequence `id`, or the image `id` shown once when no such sequence is defined.
    fn sequence(
        &mut self,
        id: BgaId,
        images: &HashMap<BgaId, usize>,
        sequences: &HashMap<BgaId, AnimationSequence>,
    ) -> AnimationSequence {
        if let Some(sequence) = sequences.get(&id) {
            return sequence.clone();
        }
        self.warn(DecodeWarning::UndefinedReference {
            kind: DefinitionKind::Sequence,
            id: id.0.to_string(),
        });
        AnimationSequence::single(images.get(&id).copied())
    }
}
