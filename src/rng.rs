//! Random number generation for `#RANDOM` blocks of the text format.
//!
//! The text decoder asks an [`Rng`] for a branch number whenever it meets a `#RANDOM n` directive
//! and no caller-supplied selection is left (see [`crate::decode::DecodeConfig::selected_randoms`]).
//!
//! # Implementations
//!
//! ## [`RngMock`]
//!
//! A deterministic mock that returns predefined values in rotation, for tests and replays.
//!
//! ## [`RandRng`]
//!
//! An adapter over any [`rand::RngCore`], used by the default entry points with an OS-seeded
//! generator.
//!
//! ## [`FirstBranch`]
//!
//! Always picks the lowest branch. Used when the `rand` feature is disabled.

use core::ops::RangeInclusive;

/// A random number generator for `#RANDOM` branch selection.
///
/// # Contract
///
/// - The generated number should be within the specified `range` (inclusive).
/// - The decoder does not validate the returned number, so an out-of-range value simply selects
///   no `#IF` branch.
pub trait Rng {
    /// Generates a random integer within the specified `range`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bms_timeline::rng::{Rng, RngMock};
    ///
    /// let mut rng = RngMock([5u64]);
    /// assert_eq!(rng.generate(1..=10), 5);
    /// ```
    fn generate(&mut self, range: RangeInclusive<u64>) -> u64;
}

impl<T: Rng + ?Sized> Rng for Box<T> {
    fn generate(&mut self, range: RangeInclusive<u64>) -> u64 {
        T::generate(self, range)
    }
}

impl<T: Rng + ?Sized> Rng for &mut T {
    fn generate(&mut self, range: RangeInclusive<u64>) -> u64 {
        T::generate(self, range)
    }
}

/// A deterministic mock random number generator.
///
/// Returns values from a predefined array in rotation.
///
/// ```rust
/// use bms_timeline::rng::{Rng, RngMock};
///
/// let mut rng = RngMock([1u64, 2u64]);
/// assert_eq!(rng.generate(1..=10), 1);
/// assert_eq!(rng.generate(1..=10), 2);
/// assert_eq!(rng.generate(1..=10), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RngMock<const N: usize>(pub [u64; N]);

impl<const N: usize> Rng for RngMock<N> {
    fn generate(&mut self, _range: RangeInclusive<u64>) -> u64 {
        let Some(first) = self.0.first().copied() else {
            return 0;
        };
        self.0.rotate_left(1);
        first
    }
}

/// A random number generator backed by the [`rand`] crate.
///
/// ```rust
/// # #[cfg(feature = "rand")]
/// # {
/// use bms_timeline::rng::{Rng, RandRng};
/// use rand::{SeedableRng, rngs::StdRng};
///
/// let mut rng = RandRng(StdRng::seed_from_u64(42));
/// let n = rng.generate(1..=10);
/// assert!((1..=10).contains(&n));
/// # }
/// ```
///
/// [`rand`]: https://crates.io/crates/rand
#[cfg(feature = "rand")]
#[derive(Debug, Clone)]
pub struct RandRng<R>(pub R);

#[cfg(feature = "rand")]
impl<R: rand::RngCore> Rng for RandRng<R> {
    fn generate(&mut self, range: RangeInclusive<u64>) -> u64 {
        let start = *range.start();
        let end = *range.end();
        if end < start {
            return start;
        }
        let width = (end - start).wrapping_add(1);
        if width == 0 {
            // full u64 range
            self.0.next_u64()
        } else {
            (self.0.next_u64() % width) + start
        }
    }
}

#[cfg(feature = "rand")]
impl RandRng<rand::rngs::StdRng> {
    /// Creates a generator seeded from the operating system.
    #[must_use]
    pub fn from_os_rng() -> Self {
        use rand::SeedableRng;
        Self(rand::rngs::StdRng::from_os_rng())
    }
}

/// Always selects the first branch of a `#RANDOM` block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FirstBranch;

impl Rng for FirstBranch {
    fn generate(&mut self, range: RangeInclusive<u64>) -> u64 {
        *range.start()
    }
}

/// Returns the generator used by the default entry points.
#[cfg(feature = "rand")]
pub(crate) fn default_rng() -> impl Rng {
    RandRng::from_os_rng()
}

/// Returns the generator used by the default entry points.
#[cfg(not(feature = "rand"))]
pub(crate) fn default_rng() -> impl Rng {
    FirstBranch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_rotates() {
        let mut rng = RngMock([3, 1, 2]);
        let got: Vec<_> = (0..4).map(|_| rng.generate(1..=3)).collect();
        assert_eq!(got, vec![3, 1, 2, 3]);
    }

    #[test]
    fn empty_mock_yields_zero() {
        let mut rng = RngMock([]);
        assert_eq!(rng.generate(1..=3), 0);
    }

    #[test]
    fn first_branch_is_range_start() {
        assert_eq!(FirstBranch.generate(1..=8), 1);
    }

    #[cfg(feature = "rand")]
    #[test]
    fn rand_rng_stays_in_range() {
        use rand::{SeedableRng, rngs::StdRng};

        let mut rng = RandRng(StdRng::seed_from_u64(7));
        for _ in 0..256 {
            let n = rng.generate(1..=4);
            assert!((1..=4).contains(&n));
        }
    }
}
