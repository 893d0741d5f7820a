//! Measures of the text format.
//!
//! Measure lines are buffered per measure while the source is scanned, then turned into
//! [`Section`]s laid end to end: a section starts where the previous one ends, and lasts its length
//! multiplier in whole-note measures.

use std::{collections::BTreeMap, ops::Range};

use super::{
    channel::Channel,
    obj_id::{Base, ObjId},
};
use crate::decode::DecodeWarning;

/// One buffered `#mmmCC:data` line.
#[derive(Debug, Clone)]
pub struct ChannelLine {
    /// The channel.
    pub channel: Channel,
    /// Cell data with surrounding whitespace removed.
    pub data: String,
    /// Byte range of the source line.
    pub range: Range<usize>,
    /// Radix in effect when the line was read.
    pub base: Base,
}

/// A non-rest cell of a channel line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    /// Fraction of the measure, `0.0..1.0`.
    pub fraction: f64,
    /// The cell value.
    pub id: ObjId,
}

impl ChannelLine {
    /// Splits the data into equal-width cells, skipping `00`.
    ///
    /// # Errors
    ///
    /// Fails on data of odd length or with characters that are not object ids.
    pub fn cells(&self) -> Result<Vec<Cell>, DecodeWarning> {
        split_cells(&self.data, self.base)
    }
}

/// Splits channel data into cells, see [`ChannelLine::cells`].
///
/// ```rust
/// use bms_timeline::bms::{obj_id::Base, section::split_cells};
///
/// let cells = split_cells("01000200", Base::Base36).unwrap();
/// let fractions: Vec<f64> = cells.iter().map(|c| c.fraction).collect();
/// assert_eq!(fractions, vec![0.0, 0.5]);
/// ```
///
/// # Errors
///
/// Fails on data of odd length or with characters that are not object ids.
pub fn split_cells(data: &str, base: Base) -> Result<Vec<Cell>, DecodeWarning> {
    let invalid = || DecodeWarning::InvalidCell(data.to_string());
    if !data.is_ascii() || data.len() % 2 != 0 {
        return Err(invalid());
    }
    let count = data.len() / 2;
    let mut cells = Vec::new();
    for i in 0..count {
        let id = data
            .get(i * 2..i * 2 + 2)
            .and_then(|s| ObjId::parse(s, base))
            .ok_or_else(invalid)?;
        if !id.is_null() {
            cells.push(Cell {
                fraction: i as f64 / count as f64,
                id,
            });
        }
    }
    Ok(cells)
}

/// One measure.
#[derive(Debug, Clone)]
pub struct Section {
    /// Measure number.
    pub measure: u32,
    /// Start position in whole-note measures.
    pub start: f64,
    /// Length multiplier.
    pub length: f64,
    /// Lines of this measure, in source order, the length line excluded.
    pub lines: Vec<ChannelLine>,
}

impl Section {
    /// Musical position of a cell at `fraction` of this measure.
    #[must_use]
    pub fn position(&self, fraction: f64) -> f64 {
        self.start + fraction * self.length
    }
}

/// Lays measures `0..=last` out end to end.
///
/// Lines on channel `02` set their measure's length; the last valid one wins. Measures without
/// lines still get a section so every measure has a start.
pub fn build_sections(
    mut lines: BTreeMap<u32, Vec<ChannelLine>>,
    mut warn: impl FnMut(DecodeWarning, Range<usize>),
) -> Vec<Section> {
    let Some(&last) = lines.keys().next_back() else {
        return Vec::new();
    };
    let mut start = 0.0;
    (0..=last)
        .map(|measure| {
            let (length_lines, lines): (Vec<_>, Vec<_>) = lines
                .remove(&measure)
                .unwrap_or_default()
                .into_iter()
                .partition(|line| line.channel == Channel::SectionLength);
            let mut length = 1.0;
            for line in length_lines {
                match line.data.parse::<f64>() {
                    Ok(value) if value.is_finite() && value > 0.0 => length = value,
                    _ => warn(DecodeWarning::InvalidMeasureLength(line.data), line.range),
                }
            }
            let section = Section {
                measure,
                start,
                length,
                lines: concat_same_channel(lines),
            };
            start += length;
            section
        })
        .collect()
}

/// Joins the data of repeated lines of one channel in source order. Background sound lines stay
/// apart, each is its own layer.
fn concat_same_channel(lines: Vec<ChannelLine>) -> Vec<ChannelLine> {
    let mut merged: Vec<ChannelLine> = Vec::with_capacity(lines.len());
    for line in lines {
        if line.channel != Channel::Bgm {
            if let Some(first) = merged.iter_mut().find(|first| first.channel == line.channel) {
                first.data.push_str(&line.data);
                continue;
            }
        }
        merged.push(line);
    }
    merged
}
