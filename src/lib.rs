//! Decoder from BMS-family rhythm-game charts into a timestamped performance timeline.
//!
//! Two source formats are supported:
//!
//! - the line-oriented text format (`.bms`, `.bme`, `.bml`, `.pms`), see [`bms`],
//! - the JSON format (`.bmson`), see `bmson` (requires the `bmson` feature).
//!
//! Both are decoded into the same [`model::Chart`]: an ordered list of [`model::timeline::Timeline`]
//! entries, each at a musical position with its absolute time in microseconds, holding the notes,
//! tempo and animation events of that instant.
//!
//! # Usage Example
//!
//! ```rust
//! use bms_timeline::decode::{DecodeConfig, decode_bytes};
//!
//! let source = "#TITLE Example\n#BPM 120\n#WAV01 kick.wav\n#00111:01\n";
//! let output = decode_bytes("example.bms", source.as_bytes(), &DecodeConfig::default()).unwrap();
//!
//! let chart = output.chart;
//! assert_eq!(chart.metadata.title, "Example");
//! let (timeline, lane, note) = chart.lane_notes().next().unwrap();
//! assert_eq!(timeline.time_us(), 2_000_000);
//! assert_eq!(lane, 0);
//! assert_eq!(note.wav, Some(0));
//! ```
//!
//! Decoding never stops at malformed content. Every skipped or repaired part is recorded in
//! [`decode::DecodeOutput::logs`], which can be rendered with `diagnostics` (requires the
//! `diagnostics` feature).
//!
//! # Features
//!
//! - `bmson`: the JSON format, via `serde_json`.
//! - `rand`: rolls `#RANDOM` with an OS-seeded generator. Without it, the first branch is taken.
//! - `diagnostics`: renders decode logs with `ariadne`.
//! - `serde`: `Serialize`/`Deserialize` for the chart model.
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod bms;
#[cfg(feature = "bmson")]
#[cfg_attr(docsrs, doc(cfg(feature = "bmson")))]
pub mod bmson;
pub mod decode;
#[cfg(feature = "diagnostics")]
#[cfg_attr(docsrs, doc(cfg(feature = "diagnostics")))]
pub mod diagnostics;
pub mod hash;
pub mod metadata;
pub mod model;
pub mod rng;

pub use self::decode::{DecodeConfig, DecodeError, DecodeOutput, decode_bytes, decode_path};
