//! Header fields of a chart and the mapper from text-format header lines onto them.

use std::ops::RangeInclusive;

use crate::decode::DecodeWarning;

/// Descriptive header fields. None of them affect timing.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Metadata {
    /// `#PLAYER`: 1 single, 2 couple, 3 double.
    pub player: i64,
    /// `#GENRE`.
    pub genre: String,
    /// `#TITLE`.
    pub title: String,
    /// `#SUBTITLE`.
    pub subtitle: String,
    /// `#ARTIST`.
    pub artist: String,
    /// `#SUBARTIST`, or the bmson `subartists` joined.
    pub subartist: String,
    /// `#PLAYLEVEL`, kept as written.
    pub play_level: String,
    /// `#RANK`, 0 (very hard) to 4 (very easy).
    pub rank: i64,
    /// `#DEFEXRANK` or bmson `judge_rank`, in percent.
    pub defexrank: Option<f64>,
    /// `#TOTAL`.
    pub total: Option<f64>,
    /// `#VOLWAV`, in percent.
    pub volwav: f64,
    /// `#DIFFICULTY`, 0 (unknown) to 5.
    pub difficulty: i64,
    /// `#STAGEFILE` or bmson `eyecatch_image`.
    pub stagefile: String,
    /// `#BACKBMP` or bmson `back_image`.
    pub backbmp: String,
    /// `#BANNER` or bmson `banner_image`.
    pub banner: String,
    /// `#PREVIEW` or bmson `preview_music`.
    pub preview: String,
    /// bmson `title_image`.
    pub title_image: String,
    /// bmson `chart_name`.
    pub chart_name: String,
    /// `#COMMENT`.
    pub comment: String,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            player: 1,
            genre: String::new(),
            title: String::new(),
            subtitle: String::new(),
            artist: String::new(),
            subartist: String::new(),
            play_level: String::new(),
            rank: 2,
            defexrank: None,
            total: None,
            volwav: 100.0,
            difficulty: 0,
            stagefile: String::new(),
            backbmp: String::new(),
            banner: String::new(),
            preview: String::new(),
            title_image: String::new(),
            chart_name: String::new(),
            comment: String::new(),
        }
    }
}

impl Metadata {
    /// Applies a header line `#KEYWORD args`.
    ///
    /// `keyword` must be uppercase. Returns `Ok(false)` when the keyword is not a metadata field.
    ///
    /// # Errors
    ///
    /// Rejects a malformed or out-of-range numeric argument, leaving the field unchanged.
    pub fn apply_header(&mut self, keyword: &str, args: &str) -> Result<bool, DecodeWarning> {
        let args = args.trim();
        match keyword {
            "PLAYER" => self.player = parse_int(keyword, args, 1..=3)?,
            "GENRE" => self.genre = args.to_string(),
            "TITLE" => self.title = args.to_string(),
            "SUBTITLE" => self.subtitle = args.to_string(),
            "ARTIST" => self.artist = args.to_string(),
            "SUBARTIST" => self.subartist = args.to_string(),
            "PLAYLEVEL" => self.play_level = args.to_string(),
            "RANK" => self.rank = parse_int(keyword, args, 0..=4)?,
            "DEFEXRANK" => self.defexrank = Some(parse_float(keyword, args, |v| v >= 0.0)?),
            "TOTAL" => self.total = Some(parse_float(keyword, args, |v| v > 0.0)?),
            "VOLWAV" => self.volwav = parse_float(keyword, args, |v| v >= 0.0)?,
            "DIFFICULTY" => self.difficulty = parse_int(keyword, args, 0..=5)?,
            "STAGEFILE" => self.stagefile = args.to_string(),
            "BACKBMP" => self.backbmp = args.to_string(),
            "BANNER" => self.banner = args.to_string(),
            "PREVIEW" => self.preview = args.to_string(),
            "COMMENT" => self.comment = args.trim_matches('"').to_string(),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Parses an integer argument and checks it against `range`.
pub(crate) fn parse_int(
    field: &str,
    args: &str,
    range: RangeInclusive<i64>,
) -> Result<i64, DecodeWarning> {
    let value: i64 = args.parse().map_err(|_| DecodeWarning::InvalidNumber {
        field: field.to_string(),
        value: args.to_string(),
    })?;
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(DecodeWarning::OutOfRange {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

/// Parses a finite float argument accepted by `valid`.
pub(crate) fn parse_float(
    field: &str,
    args: &str,
    valid: impl FnOnce(f64) -> bool,
) -> Result<f64, DecodeWarning> {
    let value = args
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| DecodeWarning::InvalidNumber {
            field: field.to_string(),
            value: args.to_string(),
        })?;
    if valid(value) {
        Ok(value)
    } else {
        Err(DecodeWarning::OutOfRange {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}
