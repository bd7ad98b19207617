//! Per-interval recomputation of the redundancy constant `K`.
//!
//! With [`RedundancyMode::Adaptive`], `K` is derived at the start of every interval from the
//! neighbor count and the fraction of intervals that ended in a reset:
//!
//! ```text
//! K = 1 + ceil(min(n, Kdefault - 1) * x)
//! ```
//!
//! where a node without neighbors counts `n = Kdefault`. The factor `x` is selected by
//! [`ResetCoupling`].

use crate::utils::ceil_u32;

/// How the reset fraction feeds into `K`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResetCoupling {
    /// `x = preset`: frequent resets raise `K`, so more consistent messages are needed before a
    /// transmission is suppressed.
    Tolerant,

    /// `x = pstable`: a stable topology raises `K`, frequent resets lower it.
    Strict,
}

/// Whether `K` is fixed or recomputed every interval.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RedundancyMode {
    /// `K` keeps its configured value.
    Fixed,

    /// `K` is recomputed at every interval start.
    Adaptive(ResetCoupling),
}

impl RedundancyMode {
    /// Computes `K` for the next interval.
    ///
    /// `k_default` is the configured redundancy constant. A `k_default` of 0 disables redundancy
    /// checking and is never adapted.
    pub fn next_k(&self, k_default: u8, neighbors: u8, preset: f32, pstable: f32) -> u8 {
        let coupling = match self {
            RedundancyMode::Fixed => return k_default,
            RedundancyMode::Adaptive(coupling) => coupling,
        };
        if k_default == 0 {
            return 0;
        }

        let neighbors = if neighbors == 0 { k_default } else { neighbors };
        let x = match coupling {
            ResetCoupling::Tolerant => preset,
            ResetCoupling::Strict => pstable,
        };
        let scaled = f32::from(neighbors.min(k_default - 1)) * x;
        let k = 1 + ceil_u32(scaled);
        if k > u32::from(u8::MAX) {
            u8::MAX
        } else {
            k as u8
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed() {
        assert_eq!(RedundancyMode::Fixed.next_k(10, 3, 1.0, 0.0), 10);
    }

    #[test]
    fn tolerant() {
        let mode = RedundancyMode::Adaptive(ResetCoupling::Tolerant);
        // No resets yet: a single consistent message suppresses.
        assert_eq!(mode.next_k(10, 4, 0.0, 1.0), 1);
        // 4 neighbors, half the intervals were resets: 1 + ceil(2.0).
        assert_eq!(mode.next_k(10, 4, 0.5, 0.5), 3);
        // Neighbor count is capped at Kdefault - 1.
        assert_eq!(mode.next_k(10, 50, 1.0, 0.0), 10);
        // No neighbors counts as Kdefault, then gets capped.
        assert_eq!(mode.next_k(10, 0, 0.25, 0.75), 1 + 3);
    }

    #[test]
    fn strict() {
        let mode = RedundancyMode::Adaptive(ResetCoupling::Strict);
        assert_eq!(mode.next_k(10, 4, 0.0, 1.0), 5);
        assert_eq!(mode.next_k(10, 4, 1.0, 0.0), 1);
        assert_eq!(mode.next_k(10, 3, 0.1, 0.9), 1 + 3);
    }

    #[test]
    fn disabled_stays_disabled() {
        let mode = RedundancyMode::Adaptive(ResetCoupling::Tolerant);
        assert_eq!(mode.next_k(0, 4, 1.0, 0.0), 0);
    }
}
