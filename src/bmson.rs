//! The [bmson format](https://bmson-spec.readthedocs.io/en/master/doc/index.html) definition and
//! its decoder.
//!
//! # Order of Processing
//!
//! When there are coincident events in the same pulse, they are processed in the order below:
//!
//! - [`ScrollEvent`],
//! - [`BpmEvent`],
//! - [`StopEvent`].
//!
//! If a [`BpmEvent`] and a [`StopEvent`] appear on the same pulse, the current BPM will be changed
//! at first, then scrolling the chart will be stopped for a while depending the changed BPM.
//!
//! # Layered Notes
//!
//! In case that notes (not BGM) from different sound channels exist on the same (key and pulse)
//! position:
//!
//! - When their lengths differ, it is a collision and the later note is moved to the background.
//! - Otherwise the notes are fused: the later one is layered on the first, so one hit plays both.
//!
//! # Differences from BMS
//!
//! - The tail of a long note plays no sound unless a note with `up` set marks it.
//! - Positions are pulses, `4 * resolution` to a measure, instead of measure fractions.

pub mod decoder;

use serde::{Deserialize, Serialize};

pub use self::decoder::BmsonDecoder;

/// Note position for the chart [`Bmson`], in pulses from the start.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct PulseNumber(pub u64);

impl PulseNumber {
    /// Position in measures, given the pulses of one measure.
    #[must_use]
    pub fn measures(self, pulses_per_measure: f64) -> f64 {
        self.0 as f64 / pulses_per_measure
    }
}

/// Top-level object for bmson format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bmson {
    /// Version of bmson format. Older bmson file may not have this field, but lacking this must be
    /// an error.
    pub version: String,
    /// Score metadata.
    pub info: BmsonInfo,
    /// Location of bar lines in pulses. If `None`, then a 4/4 beat is assumed and bar lines will be
    /// generated every 4 quarter notes. If `Some(vec![])`, this chart will not have any bar line.
    #[serde(default)]
    pub lines: Option<Vec<BarLine>>,
    /// Events of bpm change.
    #[serde(default)]
    pub bpm_events: Vec<BpmEvent>,
    /// Events of scroll stop. If there are coincident events, they are happened in succession.
    #[serde(default)]
    pub stop_events: Vec<StopEvent>,
    /// Events of scroll speed change.
    #[serde(default)]
    pub scroll_events: Vec<ScrollEvent>,
    /// Note data.
    pub sound_channels: Vec<SoundChannel>,
    /// Mine data.
    #[serde(default)]
    pub mine_channels: Vec<MineChannel>,
    /// Invisible note data.
    #[serde(default)]
    pub key_channels: Vec<KeyChannel>,
    /// BGA data.
    #[serde(default)]
    pub bga: Bga,
}

/// Header metadata of chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BmsonInfo {
    /// Self explanatory title.
    #[serde(default)]
    pub title: String,
    /// Self explanatory subtitle. Usually this is shown as a smaller text than `title`.
    #[serde(default)]
    pub subtitle: String,
    /// Author of the chart.
    #[serde(default)]
    pub artist: String,
    /// Other authors of the chart, each of the form `key:value`.
    #[serde(default)]
    pub subartists: Vec<String>,
    /// Self explanatory genre.
    #[serde(default)]
    pub genre: String,
    /// Hint for layout lanes, e.g. "beat-7k", "popn-5k". Defaults to `"beat-7k"`.
    #[serde(default = "default_mode_hint")]
    pub mode_hint: String,
    /// Special chart name, e.g. "BEGINNER", "NORMAL", "HYPER", "FOUR DIMENSIONS".
    #[serde(default)]
    pub chart_name: String,
    /// Self explanatory level number.
    #[serde(default)]
    pub level: i64,
    /// Initial BPM.
    pub init_bpm: f64,
    /// Relative judge width in percentage. Larger is easier.
    #[serde(default = "default_percentage")]
    pub judge_rank: f64,
    /// Relative life bar gain in percentage. Larger is easier.
    #[serde(default = "default_percentage")]
    pub total: f64,
    /// Background image file name.
    #[serde(default)]
    pub back_image: Option<String>,
    /// Eyecatch image file name, shown while the chart is loading.
    #[serde(default)]
    pub eyecatch_image: Option<String>,
    /// Title image file name.
    #[serde(default)]
    pub title_image: Option<String>,
    /// Banner image file name.
    #[serde(default)]
    pub banner_image: Option<String>,
    /// Preview music file name.
    #[serde(default)]
    pub preview_music: Option<String>,
    /// Numbers of pulse per quarter note in 4/4 measure.
    #[serde(default = "default_resolution")]
    pub resolution: i64,
    /// Long-note policy, `1..=3` as `#LNMODE`. Anything else leaves the default.
    #[serde(default)]
    pub ln_type: i64,
}

/// Default mode hint, beatmania 7 keys.
#[must_use]
pub fn default_mode_hint() -> String {
    "beat-7k".into()
}

/// Default relative percentage, 100%.
#[must_use]
pub const fn default_percentage() -> f64 {
    100.0
}

/// Default resolution pulses per quarter note in 4/4 measure, 240 pulses.
#[must_use]
pub const fn default_resolution() -> i64 {
    240
}

/// Event of bar line of the chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarLine {
    /// Pulse number to place the line.
    pub y: PulseNumber,
}

/// Note sound file and positions to be placed in the chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundChannel {
    /// Sound file path.
    pub name: String,
    /// Data of note to be placed.
    #[serde(default)]
    pub notes: Vec<Note>,
}

/// Sound note to ring a sound file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Lane number. `0` is a background (BGM) note.
    #[serde(default)]
    pub x: u32,
    /// Position to be placed.
    pub y: PulseNumber,
    /// Length of pulses of the note. It will be a normal note if zero, otherwise a long note.
    #[serde(default)]
    pub l: u64,
    /// Continuation flag. It will continue to ring rest of the file when play if `true`, otherwise
    /// it will play from start.
    #[serde(default)]
    pub c: bool,
    /// Long-note type of this note, `1..=3`. Anything else follows the chart.
    #[serde(default)]
    pub t: i64,
    /// Marks the sound of a long-note tail ending at this position.
    #[serde(default)]
    pub up: bool,
}

/// BPM change note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BpmEvent {
    /// Position to change BPM of the chart.
    pub y: PulseNumber,
    /// New BPM to be.
    pub bpm: f64,
}

/// Scroll stop note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopEvent {
    /// Start position to scroll stop.
    pub y: PulseNumber,
    /// Stopping duration in pulses.
    pub duration: i64,
}

/// Scroll speed change note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollEvent {
    /// Position to change the scroll speed.
    pub y: PulseNumber,
    /// New scroll multiplier.
    #[serde(default = "default_scroll_rate")]
    pub rate: f64,
}

const fn default_scroll_rate() -> f64 {
    1.0
}

/// Mine sound file and positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MineChannel {
    /// Sound file played when a mine explodes.
    #[serde(default)]
    pub name: String,
    /// Mines to be placed.
    #[serde(default)]
    pub notes: Vec<MineNote>,
}

/// A mine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MineNote {
    /// Lane number.
    #[serde(default)]
    pub x: u32,
    /// Position to be placed.
    pub y: PulseNumber,
    /// Damage on hitting.
    #[serde(default)]
    pub damage: f64,
}

/// Invisible note sound file and positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyChannel {
    /// Sound file played on hitting.
    #[serde(default)]
    pub name: String,
    /// Notes to be placed.
    #[serde(default)]
    pub notes: Vec<KeyNote>,
}

/// An invisible note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyNote {
    /// Lane number.
    #[serde(default)]
    pub x: u32,
    /// Position to be placed.
    pub y: PulseNumber,
}

/// BGA data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bga {
    /// Pictures data for playing BGA.
    #[serde(default)]
    pub bga_header: Vec<BgaHeader>,
    /// Animation sequences referenced by events.
    #[serde(default)]
    pub bga_sequence: Vec<BgaSequence>,
    /// Base picture sequence.
    #[serde(default)]
    pub bga_events: Vec<BgaEvent>,
    /// Layered picture sequence.
    #[serde(default)]
    pub layer_events: Vec<BgaEvent>,
    /// Picture sequence displayed when missed.
    #[serde(default)]
    pub poor_events: Vec<BgaEvent>,
}

/// Picture file information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgaHeader {
    /// Self explanatory ID of picture.
    pub id: BgaId,
    /// Picture file name.
    pub name: String,
}

/// An animation: pictures switched at offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgaSequence {
    /// ID referenced by events.
    pub id: BgaId,
    /// Steps in playback order.
    #[serde(default)]
    pub sequence: Vec<SequenceStep>,
}

/// One step of a [`BgaSequence`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceStep {
    /// Milliseconds from the start of the sequence.
    #[serde(default)]
    pub time: i64,
    /// Picture to show. A negative ID ends the sequence.
    #[serde(default)]
    pub id: i64,
}

/// BGA note to display the picture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgaEvent {
    /// Position to display the picture in pulses.
    pub y: PulseNumber,
    /// ID of picture to display.
    #[serde(default)]
    pub id: BgaId,
    /// Sequences to rotate through instead of a single picture.
    #[serde(default)]
    pub id_set: Option<Vec<BgaId>>,
    /// What triggers the sequences: `"play"`, `"miss"`, or anything else for always.
    #[serde(default)]
    pub condition: Option<String>,
    /// Milliseconds between sequences of `id_set`.
    #[serde(default)]
    pub interval: i64,
}

/// Picture id for [`Bga`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct BgaId(pub u32);
