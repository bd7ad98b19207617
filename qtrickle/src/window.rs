//! Placement of the listen window and the transmission instant inside an interval.
//!
//! Every interval `I` contains a window `[tStart, tEnd]` from which the transmission instant `T` is
//! drawn. The minimal cell's operation counter is sampled at both ends of the window, which lets
//! the estimator judge how busy the shared broadcast cell was while this node was listening.

use crate::{config::WindowMode, time::Duration, utils::uniform_inclusive};
use rand_core::RngCore;

/// Probabilities that bias the adaptive window.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Bias {
    pub ptransmit: f32,
    pub pfree: f32,
    pub pstable: f32,
}

/// The listen window of one interval, as offsets from the interval start.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Window {
    /// `tStart`.
    pub start: Duration,
    /// `tEnd`, never past the end of the interval.
    pub end: Duration,
    /// The instant `T` at which the transmit decision is made.
    pub t: Duration,
}

impl Window {
    /// Computes the window bounds `(tStart, tEnd)` for an interval of length `interval`.
    ///
    /// The result always satisfies `tStart < tEnd <= interval` as long as `interval` is at least
    /// 2 ms.
    pub fn bounds(
        mode: WindowMode,
        interval: Duration,
        floor: Duration,
        bias: &Bias,
    ) -> (Duration, Duration) {
        let half = interval.half();
        let (mut start, mut end) = match mode {
            WindowMode::Rfc6206 => (half, interval),
            WindowMode::Adaptive => (
                half.mul_f32(bias.ptransmit * bias.pfree),
                half.saturating_add(half.mul_f32(bias.pstable)),
            ),
        };

        if end > interval {
            end = interval;
        }
        if start < floor {
            start = floor;
        }
        if end.saturating_sub(start) < floor {
            start = start.saturating_sub(floor);
        }

        if start < end && end <= interval {
            (start, end)
        } else {
            warn!(
                "degenerate window [{}, {}] in {} ({:?}), using [I/2, I]",
                start, end, interval, bias
            );
            (half, interval)
        }
    }

    /// Computes the bounds and draws a fresh `T` uniformly from them.
    pub fn draw<R: RngCore + ?Sized>(
        mode: WindowMode,
        interval: Duration,
        floor: Duration,
        bias: &Bias,
        rng: &mut R,
    ) -> Self {
        let (start, end) = Self::bounds(mode, interval, floor, bias);
        let span = (end - start).as_millis();
        let t = start + Duration::from_millis(uniform_inclusive(rng, span));
        Self { start, end, t }
    }

    /// Returns the length of the window.
    pub fn width(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }

    /// Returns how many slotframes (and thus minimal cells) fit in the window, at least 1.
    pub fn cells(&self, slotframe: Duration) -> u16 {
        let cells = self.width().div_ceil(slotframe).max(1);
        if cells > u32::from(u16::MAX) {
            u16::MAX
        } else {
            cells as u16
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::impls;

    /// Counts upwards from a seed.
    struct Counter(u32);

    impl RngCore for Counter {
        fn next_u32(&mut self) -> u32 {
            self.0 = self.0.wrapping_add(7919);
            self.0
        }

        fn next_u64(&mut self) -> u64 {
            impls::next_u64_via_u32(self)
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            impls::fill_bytes_via_next(self, dest)
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    const FLOOR: Duration = Duration::from_millis(100);

    fn bias(ptransmit: f32, pfree: f32, pstable: f32) -> Bias {
        Bias {
            ptransmit,
            pfree,
            pstable,
        }
    }

    fn ms(ms: u32) -> Duration {
        Duration::from_millis(ms)
    }

    #[test]
    fn rfc6206() {
        let b = bias(0.0, 0.0, 0.0);
        assert_eq!(
            Window::bounds(WindowMode::Rfc6206, ms(1000), FLOOR, &b),
            (ms(500), ms(1000))
        );
    }

    #[test]
    fn adaptive() {
        let b = bias(1.0, 1.0, 1.0);
        assert_eq!(
            Window::bounds(WindowMode::Adaptive, ms(4000), FLOOR, &b),
            (ms(2000), ms(4000))
        );

        let b = bias(0.5, 0.5, 0.5);
        assert_eq!(
            Window::bounds(WindowMode::Adaptive, ms(4000), FLOOR, &b),
            (ms(500), ms(3000))
        );

        // Never transmitted: tStart is raised to the floor.
        let b = bias(0.0, 1.0, 0.0);
        assert_eq!(
            Window::bounds(WindowMode::Adaptive, ms(4000), FLOOR, &b),
            (ms(100), ms(2000))
        );
    }

    #[test]
    fn narrow_window_is_widened() {
        // tStart = 1000 * 0.9375 = 937, tEnd = 1000: only 63ms wide.
        let b = bias(0.9375, 1.0, 0.0);
        assert_eq!(
            Window::bounds(WindowMode::Adaptive, ms(2000), FLOOR, &b),
            (ms(837), ms(1000))
        );
    }

    #[test]
    fn out_of_range_bias_falls_back() {
        let b = bias(3.0, 1.0, 0.0);
        assert_eq!(
            Window::bounds(WindowMode::Adaptive, ms(2000), FLOOR, &b),
            (ms(1000), ms(2000))
        );
    }

    #[test]
    fn ordering_holds() {
        let mut rng = Counter(1);
        let values = [-0.5, 0.0, 0.1, 0.33, 0.5, 0.9, 1.0, 1.7];
        for interval in [2, 3, 150, 1000, 4096, 65_536, 1_048_576] {
            let interval = ms(interval);
            for &p in &values {
                for &q in &values {
                    for mode in [WindowMode::Rfc6206, WindowMode::Adaptive] {
                        let w = Window::draw(mode, interval, FLOOR, &bias(p, q, p), &mut rng);
                        assert!(w.start < w.end, "{:?} in {}", w, interval);
                        assert!(w.end <= interval, "{:?} in {}", w, interval);
                        assert!(w.start <= w.t && w.t <= w.end, "{:?}", w);
                    }
                }
            }
        }
    }

    #[test]
    fn cells() {
        let w = Window {
            start: ms(500),
            end: ms(1000),
            t: ms(700),
        };
        assert_eq!(w.cells(ms(1010)), 1);
        assert_eq!(w.cells(ms(200)), 3);
        assert_eq!(w.cells(Duration::ZERO), 1);
    }
}
