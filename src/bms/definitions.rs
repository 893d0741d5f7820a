//! Resource definitions: `#WAVxx`, `#BMPxx`, `#BPMxx`, `#STOPxx`, `#SCROLLxx`.
//!
//! Redefining an id overwrites it. Sounds and images keep the slot of their first definition, so
//! indices into the chart's lists stay stable.

use std::collections::HashMap;

use super::obj_id::{Base, ObjId};
use crate::{decode::DecodeWarning, metadata::parse_float};

/// Ticks of a whole-note measure in `#STOPxx` durations.
pub const STOP_TICKS_PER_MEASURE: f64 = 192.0;

/// A file list with an id-to-index map.
#[derive(Debug, Default)]
pub struct ResourceTable {
    ids: HashMap<ObjId, usize>,
    files: Vec<String>,
}

impl ResourceTable {
    fn define(&mut self, id: ObjId, file: &str) {
        if let Some(slot) = self.ids.get(&id).and_then(|&i| self.files.get_mut(i)) {
            *slot = file.to_string();
            return;
        }
        self.ids.insert(id, self.files.len());
        self.files.push(file.to_string());
    }

    /// Index of `id` in the file list.
    #[must_use]
    pub fn index(&self, id: ObjId) -> Option<usize> {
        self.ids.get(&id).copied()
    }

    /// Consumes the table into its file list.
    #[must_use]
    pub fn into_files(self) -> Vec<String> {
        self.files
    }
}

/// Every definition table of a text chart.
#[derive(Debug, Default)]
pub struct Definitions {
    /// Radix of ids parsed from now on.
    pub base: Base,
    /// `#WAVxx`.
    pub wav: ResourceTable,
    /// `#BMPxx`.
    pub bmp: ResourceTable,
    /// `#BPMxx` and `#EXBPMxx`.
    pub bpm: HashMap<ObjId, f64>,
    /// `#STOPxx`, in whole-note measures.
    pub stop: HashMap<ObjId, f64>,
    /// `#SCROLLxx`.
    pub scroll: HashMap<ObjId, f64>,
    /// `#LNOBJ`.
    pub lnobj: Option<ObjId>,
}

impl Definitions {
    /// Parses an id under the current base.
    #[must_use]
    pub fn id(&self, s: &str) -> Option<ObjId> {
        ObjId::parse(s, self.base)
    }

    /// Handles a definition header. `keyword` is uppercase and includes the id, e.g. `WAV01`.
    ///
    /// Returns `Ok(false)` when the keyword is not a definition. Corrections that still apply the
    /// definition, such as a negative stop, are pushed to `warnings`.
    ///
    /// # Errors
    ///
    /// Rejects a malformed id or value, leaving the tables unchanged.
    pub fn apply(
        &mut self,
        keyword: &str,
        raw_keyword: &str,
        args: &str,
        warnings: &mut Vec<DecodeWarning>,
    ) -> Result<bool, DecodeWarning> {
        const PREFIXES: [&str; 6] = ["WAV", "BMP", "EXBPM", "BPM", "STOP", "SCROLL"];
        let Some(prefix) = PREFIXES
            .into_iter()
            .find(|prefix| keyword.starts_with(prefix) && keyword.len() == prefix.len() + 2)
        else {
            return Ok(false);
        };
        // ids keep their case from the source for #BASE 62
        let raw_id = raw_keyword.get(prefix.len()..).unwrap_or_default();
        let id = self
            .id(raw_id)
            .ok_or_else(|| DecodeWarning::InvalidCell(raw_id.to_string()))?;
        let args = args.trim();
        match prefix {
            "WAV" | "BMP" => {
                if args.is_empty() {
                    return Err(DecodeWarning::MissingArgument(keyword.to_string()));
                }
                let table = if prefix == "WAV" {
                    &mut self.wav
                } else {
                    &mut self.bmp
                };
                table.define(id, args);
            }
            "BPM" | "EXBPM" => {
                let bpm = parse_float(keyword, args, |_| true)?;
                if bpm <= 0.0 {
                    return Err(DecodeWarning::NegativeBpm(bpm));
                }
                self.bpm.insert(id, bpm);
            }
            "STOP" => {
                let ticks = parse_float(keyword, args, |_| true)?;
                if ticks < 0.0 {
                    warnings.push(DecodeWarning::NegativeStop(ticks));
                }
                self.stop.insert(id, ticks.abs() / STOP_TICKS_PER_MEASURE);
            }
            _ => {
                let scroll = parse_float(keyword, args, |_| true)?;
                self.scroll.insert(id, scroll);
            }
        }
        Ok(true)
    }
}
