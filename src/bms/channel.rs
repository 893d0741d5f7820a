//! Channel ids of measure lines, `#mmmCC:data`.
//!
//! | channel | meaning |
//! |---|---|
//! | `01` | background sound, every line is a separate layer |
//! | `02` | measure length multiplier |
//! | `03` | tempo as a hexadecimal cell |
//! | `04` | background image |
//! | `06` | image shown on a miss |
//! | `07` | overlay image |
//! | `08` | tempo by `#BPMxx` |
//! | `09` | stop by `#STOPxx` |
//! | `SC` | scroll by `#SCROLLxx` |
//! | `1x` `2x` | visible notes, player 1 and 2 |
//! | `3x` `4x` | invisible notes |
//! | `5x` `6x` | long notes, channel-pair encoding |
//! | `Dx` `Ex` | mines, the cell is the damage |

/// What the notes of a note channel become.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteChannelKind {
    /// Lane notes.
    Visible,
    /// Invisible lane notes.
    Hidden,
    /// Long-note ends, paired in order of appearance.
    Long,
    /// Mines.
    Mine,
}

/// A recognized channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// `01`.
    Bgm,
    /// `02`.
    SectionLength,
    /// `03`.
    BpmInline,
    /// `04`.
    BgaBase,
    /// `06`.
    BgaPoor,
    /// `07`.
    BgaLayer,
    /// `08`.
    BpmDefined,
    /// `09`.
    Stop,
    /// `SC`.
    Scroll,
    /// Note channels.
    Note {
        /// Kind of the notes.
        kind: NoteChannelKind,
        /// 0 for player 1, 1 for player 2.
        player: u8,
        /// Second channel digit minus one, `0..=8`.
        key: u8,
    },
}

impl Channel {
    /// Parses the two channel characters. `None` for channels this decoder does not use.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.to_ascii_uppercase();
        let [a, b] = <[u8; 2]>::try_from(upper.as_bytes()).ok()?;
        Some(match (a, b) {
            (b'0', b'1') => Self::Bgm,
            (b'0', b'2') => Self::SectionLength,
            (b'0', b'3') => Self::BpmInline,
            (b'0', b'4') => Self::BgaBase,
            (b'0', b'6') => Self::BgaPoor,
            (b'0', b'7') => Self::BgaLayer,
            (b'0', b'8') => Self::BpmDefined,
            (b'0', b'9') => Self::Stop,
            (b'S', b'C') => Self::Scroll,
            (kind, key @ b'1'..=b'9') => {
                let (kind, player) = match kind {
                    b'1' => (NoteChannelKind::Visible, 0),
                    b'2' => (NoteChannelKind::Visible, 1),
                    b'3' => (NoteChannelKind::Hidden, 0),
                    b'4' => (NoteChannelKind::Hidden, 1),
                    b'5' => (NoteChannelKind::Long, 0),
                    b'6' => (NoteChannelKind::Long, 1),
                    b'D' => (NoteChannelKind::Mine, 0),
                    b'E' => (NoteChannelKind::Mine, 1),
                    _ => return None,
                };
                Self::Note {
                    kind,
                    player,
                    key: key - b'1',
                }
            }
            _ => return None,
        })
    }

    /// Whether this note channel addresses keys only the 7-key layouts have (`x8`, `x9`).
    #[must_use]
    pub const fn uses_extended_keys(self) -> bool {
        matches!(self, Self::Note { key: 7 | 8, .. })
    }

    /// Whether this note channel belongs to player 2.
    #[must_use]
    pub const fn uses_second_player(self) -> bool {
        matches!(self, Self::Note { player: 1, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_note_channels() {
        assert_eq!(
            Channel::parse("16"),
            Some(Channel::Note {
                kind: NoteChannelKind::Visible,
                player: 0,
                key: 5
            })
        );
        assert_eq!(
            Channel::parse("e9"),
            Some(Channel::Note {
                kind: NoteChannelKind::Mine,
                player: 1,
                key: 8
            })
        );
        assert_eq!(Channel::parse("sc"), Some(Channel::Scroll));
        assert_eq!(Channel::parse("10"), None);
        assert_eq!(Channel::parse("99"), None);
    }

    #[test]
    fn promotion_triggers() {
        assert!(Channel::parse("18").unwrap().uses_extended_keys());
        assert!(Channel::parse("59").unwrap().uses_extended_keys());
        assert!(!Channel::parse("17").unwrap().uses_extended_keys());
        assert!(Channel::parse("21").unwrap().uses_second_player());
        assert!(!Channel::parse("01").unwrap().uses_second_player());
    }
}
