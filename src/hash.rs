//! Content digests of the raw chart bytes.
//!
//! Both digests are computed over the untouched input, before any text decoding, so they match
//! the hashes other players and score databases use to identify a chart.

use md5::Md5;
use sha2::{Digest, Sha256};

/// MD5 and SHA-256 of a chart file, as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChartHash {
    /// Legacy digest.
    pub md5: String,
    /// Digest used by newer databases.
    pub sha256: String,
}

impl ChartHash {
    /// Hashes `bytes`.
    ///
    /// ```rust
    /// use bms_timeline::hash::ChartHash;
    ///
    /// let hash = ChartHash::of(b"");
    /// assert_eq!(hash.md5, "d41d8cd98f00b204e9800998ecf8427e");
    /// ```
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        Self {
            md5: format!("{:x}", Md5::digest(bytes)),
            sha256: format!("{:x}", Sha256::digest(bytes)),
        }
    }
}
