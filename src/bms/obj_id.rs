//! Two-character object ids used by definitions and channel cells.

/// Radix of object ids, switched by `#BASE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Base {
    /// Case-insensitive `0-9A-Z`, the historical default.
    #[default]
    Base36,
    /// Case-sensitive `0-9A-Za-z` (`#BASE 62`).
    Base62,
}

impl Base {
    /// Maps a `#BASE` argument.
    #[must_use]
    pub fn from_arg(arg: &str) -> Option<Self> {
        match arg.trim() {
            "36" => Some(Self::Base36),
            "62" => Some(Self::Base62),
            _ => None,
        }
    }
}

/// An object id such as `01` or `ZZ`. Its meaning is determined by the channel it appears in.
///
/// The representation is 2 ASCII digits, normalized to uppercase under [`Base::Base36`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjId([u8; 2]);

impl std::fmt::Debug for ObjId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObjId").field(&self.to_string()).finish()
    }
}

impl std::fmt::Display for ObjId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.0[0] as char, self.0[1] as char)
    }
}

const fn is_digit(ch: u8) -> bool {
    ch.is_ascii_alphanumeric()
}

const fn digit_value(ch: u8) -> u16 {
    match ch {
        b'0'..=b'9' => (ch - b'0') as u16,
        b'A'..=b'Z' => (ch - b'A' + 10) as u16,
        b'a'..=b'z' => (ch - b'a' + 36) as u16,
        _ => 0,
    }
}

impl ObjId {
    /// The rest object `00`.
    pub const NULL: Self = Self([b'0', b'0']);

    /// Parses two characters under `base`.
    ///
    /// ```rust
    /// use bms_timeline::bms::obj_id::{Base, ObjId};
    ///
    /// assert_eq!(ObjId::parse("0a", Base::Base36), ObjId::parse("0A", Base::Base36));
    /// assert_ne!(ObjId::parse("0a", Base::Base62), ObjId::parse("0A", Base::Base62));
    /// assert_eq!(ObjId::parse("0", Base::Base36), None);
    /// ```
    #[must_use]
    pub fn parse(s: &str, base: Base) -> Option<Self> {
        let [a, b] = <[u8; 2]>::try_from(s.as_bytes()).ok()?;
        if !is_digit(a) || !is_digit(b) {
            return None;
        }
        Some(match base {
            Base::Base36 => Self([a.to_ascii_uppercase(), b.to_ascii_uppercase()]),
            Base::Base62 => Self([a, b]),
        })
    }

    /// Whether this is `00`.
    #[must_use]
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }

    /// Numeric value. Uppercase ids read as base 36, so `ZZ` is 1295.
    #[must_use]
    pub const fn value(self) -> u16 {
        let [a, b] = self.0;
        if a.is_ascii_lowercase() || b.is_ascii_lowercase() {
            digit_value(a) * 62 + digit_value(b)
        } else {
            digit_value(a) * 36 + digit_value(b)
        }
    }

    /// Reads the id as a two-digit hexadecimal number, as channel `03` does.
    #[must_use]
    pub fn hex_value(self) -> Option<u8> {
        u8::from_str_radix(std::str::from_utf8(&self.0).ok()?, 16).ok()
    }
}
