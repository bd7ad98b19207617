//! Time APIs for calculating with points in time and durations.
//!
//! These APIs are made for the trickle timer and are not meant to be general-purpose. Trickle
//! intervals are scheduled with millisecond granularity, so both types have millisecond resolution
//! and use 32-bit arithmetic.

use core::fmt;
use core::ops::{Add, AddAssign, Sub};

/// A duration with millisecond resolution.
///
/// This can represent a maximum duration of about 49 days. Overflowing arithmetic through the
/// operator impls panics; the `saturating_*` methods are used where an overflow is possible.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(u32);

impl Duration {
    /// The empty duration.
    pub const ZERO: Self = Duration(0);

    /// The largest representable duration.
    pub const MAX: Self = Duration(u32::MAX);

    /// Creates a [`Duration`] from a number of milliseconds.
    pub const fn from_millis(millis: u32) -> Self {
        Duration(millis)
    }

    /// Creates a [`Duration`] representing a number of seconds.
    pub const fn from_secs(secs: u16) -> Self {
        Duration(secs as u32 * 1_000)
    }

    /// Returns the number of milliseconds represented by `self`.
    pub const fn as_millis(&self) -> u32 {
        self.0
    }

    /// Returns the number of whole seconds that fit in `self`.
    pub const fn whole_secs(&self) -> u32 {
        self.0 / 1_000
    }

    /// Returns the fractional part of milliseconds in `self`.
    pub const fn subsec_millis(&self) -> u32 {
        self.0 % 1_000
    }

    /// Returns `true` if `self` is zero.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns half of `self`, rounded down.
    pub const fn half(&self) -> Self {
        Duration(self.0 / 2)
    }

    /// Multiplies `self` by `rhs`, saturating at [`Duration::MAX`].
    pub const fn saturating_mul(self, rhs: u32) -> Self {
        Duration(self.0.saturating_mul(rhs))
    }

    /// Subtracts `rhs` from `self`, saturating at zero.
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Duration(self.0.saturating_sub(rhs.0))
    }

    /// Adds `rhs` to `self`, saturating at [`Duration::MAX`].
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Duration(self.0.saturating_add(rhs.0))
    }

    /// Scales `self` by a factor, truncating towards zero.
    ///
    /// Negative and NaN factors yield zero, results that do not fit saturate.
    pub fn mul_f32(self, factor: f32) -> Self {
        Duration((self.0 as f32 * factor) as u32)
    }

    /// Returns the number of `unit`-sized pieces needed to cover `self`, rounding up.
    ///
    /// Returns 0 if `unit` is zero.
    pub fn div_ceil(self, unit: Duration) -> u32 {
        if unit.0 == 0 {
            0
        } else {
            self.0 / unit.0 + u32::from(self.0 % unit.0 != 0)
        }
    }
}

impl Add for Duration {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Duration(self.0.checked_add(rhs.0).expect("duration overflow"))
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Duration {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Duration(self.0.checked_sub(rhs.0).expect("duration underflow"))
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1_000 {
            let (secs, subsec_millis) = (self.whole_secs(), self.subsec_millis());
            if subsec_millis == 0 {
                write!(f, "{}s", secs)
            } else {
                write!(f, "{}.{:03}s", secs, subsec_millis)
            }
        } else {
            write!(f, "{}ms", self.0)
        }
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as fmt::Display>::fmt(self, f)
    }
}

/// A point in time, relative to an unspecified epoch.
///
/// This has millisecond resolution and wraps around after about 49 days. Apart from the
/// wraparound, it is monotonic.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Instant(u32);

impl Instant {
    /// The epoch.
    pub const ZERO: Self = Instant(0);

    /// The maximum time between two `Instant`s that can be handled by [`Instant::duration_since`].
    ///
    /// Half the wrapping range, so that the order of two instants is still well-defined.
    pub const MAX_TIME_BETWEEN: Duration = Duration(u32::MAX / 2);

    /// Creates an `Instant` from raw milliseconds since an arbitrary reference point.
    pub const fn from_raw_millis(millis: u32) -> Self {
        Instant(millis)
    }

    /// Returns the raw value from which this `Instant` was created.
    pub const fn raw_millis(&self) -> u32 {
        self.0
    }

    /// Calculates the duration of time that has passed between `earlier` and `self`.
    ///
    /// Calling this method when `earlier` is actually later than `self`, or when the instants are
    /// further apart than [`Instant::MAX_TIME_BETWEEN`], gives a meaningless result and trips a
    /// debug assertion.
    pub fn duration_since(&self, earlier: Instant) -> Duration {
        let millis_passed = self.0.wrapping_sub(earlier.0);
        debug_assert!(
            millis_passed <= Self::MAX_TIME_BETWEEN.0,
            "{}ms between instants {} and {}",
            millis_passed,
            earlier,
            self
        );

        Duration(millis_passed)
    }

    /// Returns `true` if `self` is at or after `other`, taking wraparound into account.
    pub fn is_at_or_after(&self, other: Instant) -> bool {
        self.0.wrapping_sub(other.0) <= Self::MAX_TIME_BETWEEN.0
    }
}

/// [`Instant`]s can be subtracted, which computes the [`Duration`] between the rhs and lhs using
/// [`Instant::duration_since`].
impl Sub<Instant> for Instant {
    type Output = Duration;

    fn sub(self, rhs: Self) -> Duration {
        self.duration_since(rhs)
    }
}

/// A [`Duration`] can be added to an [`Instant`], moving the [`Instant`] forwards in time.
impl Add<Duration> for Instant {
    type Output = Self;

    fn add(self, d: Duration) -> Self {
        Instant(self.0.wrapping_add(d.as_millis()))
    }
}

impl AddAssign<Duration> for Instant {
    fn add_assign(&mut self, d: Duration) {
        *self = *self + d;
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Duration as fmt::Display>::fmt(&Duration(self.0), f)
    }
}

impl fmt::Debug for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        <Self as fmt::Display>::fmt(self, f)
    }
}
