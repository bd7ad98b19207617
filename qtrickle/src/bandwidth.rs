//! Available minimal-cell bandwidth ratio (AMBR).
//!
//! Independently of the trickle interval, the minimal cell's all-operations counter is sampled
//! every `N` slotframes. Since the minimal cell occurs once per slotframe, `delta / N` is the
//! fraction of minimal cells that were used in the sampling period. The AMBR is the running
//! average of the unused fraction over all samples.
//!
//! On the DAG root the sampler stays armed but does not take samples.

use crate::{
    alarm::{AlarmId, Alarms},
    telemetry::to_fixed,
    time::Duration,
};

/// Long-period sampler of minimal cell usage.
#[derive(Debug, Clone)]
pub struct AmbrSampler {
    /// Sampling period in slotframes, 0 if disabled.
    slotframes: u8,
    last_ops: Option<u16>,
    ambr: f32,
    samples: u32,
}

impl AmbrSampler {
    pub fn new(slotframes: u8) -> Self {
        Self {
            slotframes,
            last_ops: None,
            ambr: 0.0,
            samples: 0,
        }
    }

    /// Returns whether sampling is configured at all.
    pub fn is_enabled(&self) -> bool {
        self.slotframes != 0
    }

    /// Returns the sampling period for the given slotframe duration.
    pub fn period(&self, slotframe: Duration) -> Duration {
        slotframe.saturating_mul(u32::from(self.slotframes))
    }

    /// Arms the sampling alarm `id` and takes the reference sample.
    pub fn start<A: Alarms>(
        &mut self,
        id: AlarmId,
        alarms: &mut A,
        slotframe: Duration,
        ops: Option<u16>,
    ) {
        if !self.is_enabled() {
            return;
        }
        self.last_ops = ops;
        alarms.schedule_in(id, self.period(slotframe));
    }

    pub fn stop<A: Alarms>(&mut self, id: AlarmId, alarms: &mut A) {
        alarms.cancel(id);
        self.last_ops = None;
    }

    /// Handles expiry of the sampling alarm: re-arms it and, unless `is_root`, takes a sample.
    pub fn alarm_fired<A: Alarms>(
        &mut self,
        id: AlarmId,
        alarms: &mut A,
        slotframe: Duration,
        ops: Option<u16>,
        is_root: bool,
    ) {
        if !self.is_enabled() {
            return;
        }
        alarms.schedule_in(id, self.period(slotframe));

        if is_root {
            self.last_ops = None;
        } else {
            self.sample(ops);
        }
    }

    /// Takes a sample of the minimal cell counter.
    ///
    /// Samples without a previous reading only establish the reference.
    pub fn sample(&mut self, ops: Option<u16>) {
        if let (Some(prev), Some(now)) = (self.last_ops, ops) {
            let delta = now.wrapping_sub(prev);
            let mut busy = f32::from(delta) / f32::from(self.slotframes.max(1));
            if busy > 1.0 {
                busy = 1.0;
            }

            self.samples = self.samples.saturating_add(1);
            self.ambr += (1.0 - busy - self.ambr) / self.samples as f32;
            trace!("ambr sample {}: {} ops, average {}", self.samples, delta, self.ambr);
        }
        self.last_ops = ops;
    }

    /// Returns the average unused fraction of the minimal cell, 0 before the first sample.
    pub fn available_bandwidth(&self) -> f32 {
        self.ambr
    }

    /// Returns the AMBR as fixed point value.
    pub fn available_bandwidth_fixed(&self) -> u16 {
        to_fixed(self.ambr)
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{alarm::AlarmPool, time::Instant};

    #[test]
    fn incremental_average() {
        let mut ambr = AmbrSampler::new(10);
        ambr.sample(Some(100));
        assert_eq!(ambr.samples(), 0);

        // 2 of 10 cells used, then 6 of 10, then (saturated) all of them.
        ambr.sample(Some(102));
        assert_eq!(ambr.available_bandwidth_fixed(), 8000);
        ambr.sample(Some(108));
        assert_eq!(ambr.available_bandwidth_fixed(), 6000);
        ambr.sample(Some(130));
        assert_eq!(ambr.available_bandwidth_fixed(), 4000);
        assert_eq!(ambr.samples(), 3);

        // Missing minimal cell breaks the chain.
        ambr.sample(None);
        ambr.sample(Some(131));
        assert_eq!(ambr.samples(), 3);
    }

    #[test]
    fn paused_at_root() {
        let mut pool = AlarmPool::<1>::new(Instant::ZERO);
        let id = pool.create().unwrap();
        let slotframe = Duration::from_millis(101 * 10);
        let mut ambr = AmbrSampler::new(10);

        ambr.start(id, &mut pool, slotframe, Some(0));
        assert_eq!(pool.next_deadline(), Some(Instant::from_raw_millis(10_100)));

        pool.set_time(Instant::from_raw_millis(10_100));
        assert_eq!(pool.pop_expired(), Some(id));
        ambr.alarm_fired(id, &mut pool, slotframe, Some(5), true);
        assert!(pool.is_pending(id));
        assert_eq!(ambr.samples(), 0);

        // The first sample after the pause only sets the reference.
        ambr.alarm_fired(id, &mut pool, slotframe, Some(9), false);
        assert_eq!(ambr.samples(), 0);
        ambr.alarm_fired(id, &mut pool, slotframe, Some(10), false);
        assert_eq!(ambr.samples(), 1);
        assert_eq!(ambr.available_bandwidth_fixed(), 9000);

        ambr.stop(id, &mut pool);
        assert!(!pool.is_pending(id));
    }

    #[test]
    fn disabled() {
        let mut pool = AlarmPool::<1>::new(Instant::ZERO);
        let id = pool.create().unwrap();
        let mut ambr = AmbrSampler::new(0);
        ambr.start(id, &mut pool, Duration::from_millis(1010), Some(0));
        assert!(!pool.is_pending(id));
    }
}
