//! Occupancy, queue and delivery estimation.
//!
//! The estimator turns raw observations into the probabilities that bias the listen window and feed
//! the Q-learning policy:
//!
//! * `pbusy`/`pfree`: fraction of minimal cells in the last listen window that carried traffic,
//!   from the minimal cell's all-operations counter sampled at `tStart` and `tEnd`.
//! * `pqu`: packet queue fill level.
//! * `psent`/`pfailed`: delivery success of trickle-originated DIOs.
//! * `ptransmit`: fraction of intervals in which this node transmitted.
//! * `preset`/`pstable`: fraction of intervals that ended in a reset, and its complement.
//!
//! All probabilities are range-checked when computed. A value outside `[0, 1]` indicates a bug in
//! the inputs (eg. more confirmations than attempts). It is logged, counted as an anomaly, and kept
//! as computed so that the telemetry shows it.

use crate::{
    config::QueueUsage,
    rpl::DioStats,
    time::Duration,
    utils::ratio,
    window::{Bias, Window},
};
use core::fmt;

/// Names a probability tracked by the [`Estimator`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Quantity {
    Pbusy,
    Pfree,
    Pqu,
    Psent,
    Pfailed,
    Ptransmit,
    Preset,
    Pstable,
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Quantity::Pbusy => "pbusy",
            Quantity::Pfree => "pfree",
            Quantity::Pqu => "pqu",
            Quantity::Psent => "psent",
            Quantity::Pfailed => "pfailed",
            Quantity::Ptransmit => "ptransmit",
            Quantity::Preset => "preset",
            Quantity::Pstable => "pstable",
        })
    }
}

/// A probability that was computed outside of `[0, 1]`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Anomaly {
    pub quantity: Quantity,
    pub value: f32,
}

/// Snapshot of all estimated probabilities.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Estimates {
    pub pbusy: f32,
    pub pfree: f32,
    pub pqu: f32,
    pub psent: f32,
    pub pfailed: f32,
    pub ptransmit: f32,
    pub preset: f32,
    pub pstable: f32,
}

impl Estimates {
    /// Values before anything was observed: the window starts out unbiased.
    pub const INITIAL: Self = Self {
        pbusy: 0.0,
        pfree: 1.0,
        pqu: 0.0,
        psent: 0.0,
        pfailed: 0.0,
        ptransmit: 1.0,
        preset: 0.0,
        pstable: 1.0,
    };

    /// Returns the probabilities that bias the listen window.
    pub fn bias(&self) -> Bias {
        Bias {
            ptransmit: self.ptransmit,
            pfree: self.pfree,
            pstable: self.pstable,
        }
    }
}

impl Default for Estimates {
    fn default() -> Self {
        Self::INITIAL
    }
}

/// Estimator state of one trickle timer.
#[derive(Debug, Clone)]
pub struct Estimator {
    probs: Estimates,
    dio_transmit: u32,
    dio_suppress: u32,
    n_reset: u32,
    n_states: u32,
    /// Minimal cell counter at `tStart`, `None` if not (yet) sampled or the cell is missing.
    start_ops: Option<u16>,
    end_ops: Option<u16>,
    end_sampled: bool,
    /// Confirmed DIO count just before this node sent its own DIO in the current interval.
    own_dio_from: Option<u32>,
    used: u16,
    n_cells: u16,
    anomalies: u32,
    last_anomaly: Option<Anomaly>,
}

impl Estimator {
    pub fn new() -> Self {
        Self {
            probs: Estimates::INITIAL,
            dio_transmit: 0,
            dio_suppress: 0,
            n_reset: 0,
            n_states: 0,
            start_ops: None,
            end_ops: None,
            end_sampled: false,
            own_dio_from: None,
            used: 0,
            n_cells: 1,
            anomalies: 0,
            last_anomaly: None,
        }
    }

    /// Starts bookkeeping for a new interval with listen window `window`.
    pub fn begin_interval(&mut self, window: &Window, slotframe: Duration) {
        self.n_states = self.n_states.saturating_add(1);
        self.n_cells = window.cells(slotframe);
        self.start_ops = None;
        self.end_ops = None;
        self.end_sampled = false;
        self.own_dio_from = None;
    }

    /// Records the minimal cell counter at `tStart`.
    pub fn sample_start(&mut self, ops: Option<u16>) {
        self.start_ops = ops;
    }

    /// Records the minimal cell counter at `tEnd`.
    pub fn sample_end(&mut self, ops: Option<u16>) {
        self.end_ops = ops;
        self.end_sampled = true;
    }

    /// Returns whether the end of the listen window has been sampled in this interval.
    pub fn end_sampled(&self) -> bool {
        self.end_sampled
    }

    /// Notes that this node is about to hand its own DIO to RPL. `stats` are taken before the send.
    pub fn own_dio_pending(&mut self, stats: DioStats) {
        self.own_dio_from = Some(stats.confirmed);
    }

    /// Records the outcome of the decision at `T` and updates `ptransmit`.
    pub fn record_decision(&mut self, transmit: bool) {
        if transmit {
            self.dio_transmit = self.dio_transmit.saturating_add(1);
        } else {
            self.dio_suppress = self.dio_suppress.saturating_add(1);
        }
        self.probs.ptransmit = ratio(self.dio_transmit, self.n_states);
        self.check(Quantity::Ptransmit, self.probs.ptransmit);
    }

    /// Computes `pbusy` and `pfree` from the listen window samples.
    ///
    /// Our own DIO occupies the minimal cell too once the MAC layer confirmed it, so a confirmed
    /// DIO is not counted as foreign traffic.
    pub fn update_occupancy(&mut self, stats: DioStats) {
        let own = match self.own_dio_from {
            Some(before) => stats.confirmed > before,
            None => false,
        };
        match (self.start_ops, self.end_ops) {
            (Some(start), Some(end)) => {
                self.used = end.wrapping_sub(start).saturating_sub(u16::from(own));
                self.probs.pbusy = ratio(u32::from(self.used), u32::from(self.n_cells));
                self.probs.pfree = 1.0 - self.probs.pbusy;
            }
            _ => {
                self.used = 0;
                self.probs.pbusy = 0.0;
                self.probs.pfree = 1.0;
            }
        }
        self.check(Quantity::Pbusy, self.probs.pbusy);
        self.check(Quantity::Pfree, self.probs.pfree);
    }

    /// Computes `psent` and `pfailed` from the DIO send statistics.
    pub fn update_delivery(&mut self, stats: DioStats) {
        if stats.attempted == 0 {
            self.probs.pfailed = 0.0;
            self.probs.psent = 0.0;
        } else {
            let failed = stats.attempted as f32 - stats.confirmed as f32;
            self.probs.pfailed = failed / stats.attempted as f32;
            self.probs.psent = 1.0 - self.probs.pfailed;
        }
        self.check(Quantity::Pfailed, self.probs.pfailed);
        self.check(Quantity::Psent, self.probs.psent);
    }

    /// Computes `pqu` from the packet queue occupancy.
    pub fn update_queue(&mut self, queue: QueueUsage) {
        self.probs.pqu = ratio(u32::from(queue.used), u32::from(queue.capacity));
        self.check(Quantity::Pqu, self.probs.pqu);
    }

    /// Counts a reset and updates `preset` and `pstable`.
    pub fn record_reset(&mut self) {
        self.n_reset = self.n_reset.saturating_add(1);
        self.probs.preset = ratio(self.n_reset, self.n_states);
        self.probs.pstable = 1.0 - self.probs.preset;
        self.check(Quantity::Preset, self.probs.preset);
        self.check(Quantity::Pstable, self.probs.pstable);
    }

    fn check(&mut self, quantity: Quantity, value: f32) {
        if !(0.0..=1.0).contains(&value) {
            error!("{} out of range: {}", quantity, value);
            self.anomalies = self.anomalies.saturating_add(1);
            self.last_anomaly = Some(Anomaly { quantity, value });
        }
    }

    pub fn estimates(&self) -> &Estimates {
        &self.probs
    }

    pub fn dio_transmit(&self) -> u32 {
        self.dio_transmit
    }

    pub fn dio_suppress(&self) -> u32 {
        self.dio_suppress
    }

    pub fn n_reset(&self) -> u32 {
        self.n_reset
    }

    pub fn n_states(&self) -> u32 {
        self.n_states
    }

    /// Minimal cell operations by others in the last listen window.
    pub fn used(&self) -> u16 {
        self.used
    }

    /// Number of minimal cells in the current listen window.
    pub fn n_cells(&self) -> u16 {
        self.n_cells
    }

    /// Returns how many out-of-range probabilities have been computed.
    pub fn anomalies(&self) -> u32 {
        self.anomalies
    }

    pub fn last_anomaly(&self) -> Option<Anomaly> {
        self.last_anomaly
    }
}

impl Default for Estimator {
    fn default() -> Self {
        Self::new()
    }
}
