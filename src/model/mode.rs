//! Lane layouts (play styles) and the channel-to-lane assignment tables.
//!
//! Every supported layout is a variant of [`Mode`]. The set is closed and immutable: a layout is
//! only ever looked up by its hint string ([`Mode::from_hint`]) or reached by promotion
//! ([`Mode::with_extended_keys`], [`Mode::with_second_player`]).

/// Unassigned slot in an assignment table.
const NA: i8 = -1;

/// Text format, 5-key family. Index is `player * 9 + (key channel digit - 1)`.
const TEXT_ASSIGN_BEAT5: [i8; 18] = [0, 1, 2, 3, 4, 5, NA, NA, NA, 6, 7, 8, 9, 10, 11, NA, NA, NA];
/// Text format, 7-key family. Channel `x6` is the scratch and `x8`/`x9` are keys 6 and 7.
const TEXT_ASSIGN_BEAT7: [i8; 18] = [0, 1, 2, 3, 4, 7, NA, 5, 6, 8, 9, 10, 11, 12, 15, NA, 13, 14];
/// Text format, pop'n. Buttons 1-5 on `11`-`15`, buttons 6-9 on `22`-`25`.
const TEXT_ASSIGN_POPN: [i8; 18] = [0, 1, 2, 3, 4, NA, NA, NA, NA, NA, 5, 6, 7, 8, NA, NA, NA, NA];

/// JSON format, beat-5k. Index is `x - 1`.
const JSON_ASSIGN_BEAT5: [i8; 8] = [0, 1, 2, 3, 4, NA, NA, 5];
/// JSON format, beat-10k. Index is `x - 1`.
const JSON_ASSIGN_BEAT10: [i8; 16] = [0, 1, 2, 3, 4, NA, NA, 5, 6, 7, 8, 9, 10, NA, NA, 11];

/// A play style: how many lanes there are, for how many players, and which lanes are scratches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// 5 keys and a scratch.
    #[default]
    Beat5K,
    /// 7 keys and a scratch.
    Beat7K,
    /// 5 keys and a scratch for each of two sides.
    Beat10K,
    /// 7 keys and a scratch for each of two sides.
    Beat14K,
    /// 5 buttons without scratch.
    PopN5K,
    /// 9 buttons without scratch.
    PopN9K,
    /// 24 keys and two wheel lanes.
    Keyboard24K,
    /// 24 keys and two wheel lanes for each of two sides.
    Keyboard24KDouble,
}

impl Mode {
    /// Every layout, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Beat5K,
        Self::Beat7K,
        Self::Beat10K,
        Self::Beat14K,
        Self::PopN5K,
        Self::PopN9K,
        Self::Keyboard24K,
        Self::Keyboard24KDouble,
    ];

    /// The mode hint string used by the JSON format.
    #[must_use]
    pub const fn hint(self) -> &'static str {
        match self {
            Self::Beat5K => "beat-5k",
            Self::Beat7K => "beat-7k",
            Self::Beat10K => "beat-10k",
            Self::Beat14K => "beat-14k",
            Self::PopN5K => "popn-5k",
            Self::PopN9K => "popn-9k",
            Self::Keyboard24K => "keyboard-24k",
            Self::Keyboard24KDouble => "keyboard-24k-double",
        }
    }

    /// Looks a layout up by its hint string, e.g. `"beat-7k"`.
    #[must_use]
    pub fn from_hint(hint: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.hint() == hint)
    }

    /// Total number of lanes, scratch lanes included.
    #[must_use]
    pub const fn key_count(self) -> usize {
        match self {
            Self::Beat5K => 6,
            Self::Beat7K => 8,
            Self::Beat10K => 12,
            Self::Beat14K => 16,
            Self::PopN5K => 5,
            Self::PopN9K => 9,
            Self::Keyboard24K => 26,
            Self::Keyboard24KDouble => 52,
        }
    }

    /// Number of players (sides).
    #[must_use]
    pub const fn player_count(self) -> usize {
        match self {
            Self::Beat10K | Self::Beat14K | Self::Keyboard24KDouble => 2,
            _ => 1,
        }
    }

    /// Lane indices that are scratch lanes.
    #[must_use]
    pub const fn scratch_lanes(self) -> &'static [usize] {
        match self {
            Self::Beat5K => &[5],
            Self::Beat7K => &[7],
            Self::Beat10K => &[5, 11],
            Self::Beat14K => &[7, 15],
            Self::PopN5K | Self::PopN9K => &[],
            Self::Keyboard24K => &[24, 25],
            Self::Keyboard24KDouble => &[24, 25, 50, 51],
        }
    }

    /// Whether `lane` is a scratch lane in this layout.
    #[must_use]
    pub fn is_scratch_lane(self, lane: usize) -> bool {
        self.scratch_lanes().contains(&lane)
    }

    /// The 7-key counterpart of a 5-key layout. Other layouts are returned unchanged.
    #[must_use]
    pub const fn with_extended_keys(self) -> Self {
        match self {
            Self::Beat5K => Self::Beat7K,
            Self::Beat10K => Self::Beat14K,
            other => other,
        }
    }

    /// The 2-player counterpart of a 1-player layout. Other layouts are returned unchanged.
    #[must_use]
    pub const fn with_second_player(self) -> Self {
        match self {
            Self::Beat5K => Self::Beat10K,
            Self::Beat7K => Self::Beat14K,
            Self::PopN5K => Self::PopN9K,
            Self::Keyboard24K => Self::Keyboard24KDouble,
            other => other,
        }
    }

    /// Maps a text-format note channel to a lane.
    ///
    /// `player` is 0 or 1, `key` is the channel's second digit minus one (0..9).
    /// Returns `None` for slots the layout leaves unassigned.
    #[must_use]
    pub fn lane_for_channel(self, player: u8, key: u8) -> Option<usize> {
        if player > 1 || key > 8 {
            return None;
        }
        let table = match self {
            Self::Beat5K | Self::Beat10K => &TEXT_ASSIGN_BEAT5,
            Self::Beat7K | Self::Beat14K => &TEXT_ASSIGN_BEAT7,
            Self::PopN5K | Self::PopN9K => &TEXT_ASSIGN_POPN,
            Self::Keyboard24K | Self::Keyboard24KDouble => return None,
        };
        let index = usize::from(player) * 9 + usize::from(key);
        Self::resolve(table.get(index).copied(), self.key_count())
    }

    /// Maps a JSON-format lane number `x` (1-based, 0 means background) to a lane.
    #[must_use]
    pub fn lane_for_x(self, x: u32) -> Option<usize> {
        let index = usize::try_from(x.checked_sub(1)?).ok()?;
        match self {
            Self::Beat5K => Self::resolve(JSON_ASSIGN_BEAT5.get(index).copied(), self.key_count()),
            Self::Beat10K => {
                Self::resolve(JSON_ASSIGN_BEAT10.get(index).copied(), self.key_count())
            }
            _ => (index < self.key_count()).then_some(index),
        }
    }

    fn resolve(slot: Option<i8>, key_count: usize) -> Option<usize> {
        let lane = usize::try_from(slot?).ok()?;
        (lane < key_count).then_some(lane)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.hint())
    }
}
