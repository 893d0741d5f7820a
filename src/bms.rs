//! The decoder of the line-oriented text format (.bms/.bme/.bml/.pms).
//!
//! A source is a sequence of lines. `#KEYWORD args` lines carry headers, resource definitions and
//! the `#RANDOM`/`#IF` control flow, and `#mmmCC:data` lines place objects on channel `CC` of
//! measure `mmm`.
//!
//! In detail, our policies are:
//!
//! - Accept UTF-8, and Shift_JIS for anything that is not valid UTF-8.
//! - Never abort. Malformed lines are reported in the log and skipped.
//! - Accept the historical typos `#RONDAM`, `#IFEND` and `#END IF` unless
//!   [`DecodeConfig::relaxed`](crate::decode::DecodeConfig::relaxed) is off.
//! - Buffer measure lines until the whole source is read, because the lane layout can be promoted
//!   by any later line.

pub mod channel;
pub mod control_flow;
pub mod decoder;
pub mod definitions;
pub mod long_note;
pub mod obj_id;
pub mod section;

pub use self::decoder::BmsDecoder;
