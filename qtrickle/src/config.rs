//! Platform configuration trait and timer parameters.

use crate::{
    alarm::Alarms,
    periodic::Report,
    redundancy::{RedundancyMode, ResetCoupling},
    rpl::DioStats,
    telemetry::Record,
    time::{Duration, Instant},
    Error,
};
use rand_core::RngCore;

/// Trait for platform configurations.
///
/// This trait bundles the types of the services the trickle timer consumes from the rest of the
/// node: the alarm facility, the random source, the TSCH schedule and the RPL node state.
///
/// Every application must define a type implementing this trait and supply it to the timer.
pub trait Config {
    /// One-shot millisecond alarms.
    type Alarms: Alarms;

    /// Random source used to draw the transmission instant and exploration decisions.
    type Rng: RngCore;

    /// TSCH schedule introspection.
    type Schedule: Schedule;

    /// Neighbor table, packet queue and RPL state of this node.
    type Node: Node;
}

/// Read access to the TSCH schedule.
pub trait Schedule {
    /// Returns the duration of one slotframe.
    fn slotframe_duration(&self) -> Duration;

    /// Returns the minimal cell's all-operations counter.
    ///
    /// The counter wraps. Returns `None` if the minimal cell is not installed.
    fn minimal_cell_ops(&self) -> Option<u16>;
}

/// Occupancy of the packet queue.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct QueueUsage {
    pub used: u8,
    pub capacity: u8,
}

/// RPL-side node state consumed by the timer.
pub trait Node {
    /// Returns the number of entries in the neighbor table.
    fn neighbor_count(&self) -> u8;

    /// Returns the current packet queue occupancy.
    fn queue_usage(&self) -> QueueUsage;

    /// Returns the DIO send statistics of trickle-originated DIOs.
    fn dio_stats(&self) -> DioStats;

    /// Returns whether this node is the DAG root.
    fn is_dag_root(&self) -> bool;

    /// Emits a telemetry record over the debug channel.
    ///
    /// The default implementation discards the record.
    fn emit_telemetry(&mut self, record: &Record) {
        let _ = record;
    }

    /// Sends a periodic report upwards.
    fn send_report(&mut self, report: &Report) -> Result<(), Error>;
}

/// Borrowed platform services, handed to every timer operation that needs them.
pub struct Env<'a, C: Config> {
    pub alarms: &'a mut C::Alarms,
    pub rng: &'a mut C::Rng,
    pub schedule: &'a C::Schedule,
    pub node: &'a mut C::Node,
}

impl<'a, C: Config> Env<'a, C> {
    pub fn new(
        alarms: &'a mut C::Alarms,
        rng: &'a mut C::Rng,
        schedule: &'a C::Schedule,
        node: &'a mut C::Node,
    ) -> Self {
        Self {
            alarms,
            rng,
            schedule,
            node,
        }
    }
}

/// How the listen window `[tStart, tEnd]` is placed inside the interval.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WindowMode {
    /// The RFC 6206 window `[I/2, I]`.
    Rfc6206,

    /// Window biased by `ptransmit`, `pfree` and `pstable`.
    Adaptive,
}

/// Which action wins when both Q-table entries of a state are equal.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TieBreak {
    Transmit,
    Suppress,
}

/// Bounds and step of the adaptive exploration rate.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AdaptiveEpsilon {
    pub min: f32,
    pub max: f32,
    /// Fraction of `max - min` that epsilon moves per interval.
    pub decay_rate: f32,
}

impl AdaptiveEpsilon {
    /// Returns the amount epsilon moves per interval.
    pub fn delta(&self) -> f32 {
        (self.max - self.min) * self.decay_rate
    }
}

/// Q-learning hyperparameters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct QConfig {
    /// Learning rate `α`.
    pub learning_rate: f32,
    /// Discount factor `γ`.
    pub discount: f32,
    /// Initial exploration probability.
    pub epsilon: f32,
    pub tie_break: TieBreak,
    /// Adaptive exploration. With `None`, epsilon stays fixed.
    pub adaptive_epsilon: Option<AdaptiveEpsilon>,
}

impl Default for QConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            discount: 0.2,
            epsilon: 0.5,
            tie_break: TieBreak::Transmit,
            adaptive_epsilon: Some(AdaptiveEpsilon {
                min: 0.01,
                max: 1.0,
                decay_rate: 0.2,
            }),
        }
    }
}

/// Selects the decision policy evaluated at `T`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PolicyConfig {
    /// Transmit iff fewer than `K` consistent messages were heard.
    Plain,

    /// Epsilon-greedy Q-learning.
    QLearning(QConfig),
}

/// Trickle timer parameters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Parameters {
    /// Minimum interval length `Imin`.
    pub i_min: Duration,
    /// Number of times `Imin` may double.
    pub doublings: u8,
    /// Redundancy constant `K`. 0 disables suppression.
    pub k: u8,
    /// Minimum listen window width.
    pub window_floor: Duration,
    pub window: WindowMode,
    pub redundancy: RedundancyMode,
    pub policy: PolicyConfig,
    /// Period of the bandwidth sampler in slotframes. 0 disables it.
    pub ambr_slotframes: u8,
}

impl Parameters {
    /// Plain RFC 6206 trickle: fixed window, fixed `K`, no learning.
    pub fn rfc6206(i_min: Duration, doublings: u8, k: u8) -> Self {
        Self {
            i_min,
            doublings,
            k,
            window: WindowMode::Rfc6206,
            redundancy: RedundancyMode::Fixed,
            policy: PolicyConfig::Plain,
            ..Self::default()
        }
    }

    /// Returns `Imin * 2^doublings`.
    pub fn max_interval(&self) -> Duration {
        self.i_min.saturating_mul(1 << u32::from(self.doublings.min(31)))
    }

    /// Checks the parameters for consistency.
    pub fn validate(&self) -> Result<(), Error> {
        fn unit(value: f32) -> bool {
            (0.0..=1.0).contains(&value)
        }

        if self.i_min.as_millis() < 2 || self.window_floor.is_zero() || self.doublings > 16 {
            return Err(Error::InvalidConfig);
        }

        // Alarm deadlines must stay within the range in which instants are ordered.
        if self.max_interval() > Instant::MAX_TIME_BETWEEN {
            return Err(Error::InvalidConfig);
        }

        if let PolicyConfig::QLearning(q) = &self.policy {
            if !unit(q.learning_rate) || !unit(q.discount) || !unit(q.epsilon) {
                return Err(Error::InvalidConfig);
            }
            if let Some(adaptive) = &q.adaptive_epsilon {
                if !unit(adaptive.min)
                    || !unit(adaptive.max)
                    || adaptive.min > adaptive.max
                    || !unit(adaptive.decay_rate)
                {
                    return Err(Error::InvalidConfig);
                }
            }
        }

        Ok(())
    }
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            i_min: Duration::from_millis(1 << 12),
            doublings: 8,
            k: 10,
            window_floor: Duration::from_millis(100),
            window: WindowMode::Adaptive,
            redundancy: RedundancyMode::Adaptive(ResetCoupling::Tolerant),
            policy: PolicyConfig::QLearning(QConfig::default()),
            ambr_slotframes: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let params = Parameters::default();
        params.validate().unwrap();
        assert_eq!(params.max_interval(), Duration::from_millis(4096 * 256));

        let plain = Parameters::rfc6206(Duration::from_millis(1000), 3, 2);
        plain.validate().unwrap();
        assert_eq!(plain.max_interval(), Duration::from_millis(8000));
        assert_eq!(plain.policy, PolicyConfig::Plain);
    }

    #[test]
    fn rejects_inconsistent() {
        let mut params = Parameters::default();
        params.i_min = Duration::from_millis(1);
        assert_eq!(params.validate(), Err(Error::InvalidConfig));

        let mut params = Parameters::default();
        params.window_floor = Duration::ZERO;
        assert_eq!(params.validate(), Err(Error::InvalidConfig));

        let mut params = Parameters::default();
        params.doublings = 17;
        assert_eq!(params.validate(), Err(Error::InvalidConfig));

        // I would outgrow the range in which alarm deadlines are ordered.
        let mut params = Parameters::rfc6206(Duration::from_millis(1 << 30), 2, 2);
        params.ambr_slotframes = 0;
        assert_eq!(params.validate(), Err(Error::InvalidConfig));
        params.doublings = 0;
        params.validate().unwrap();

        let mut q = QConfig::default();
        q.learning_rate = 1.5;
        let params = Parameters {
            policy: PolicyConfig::QLearning(q),
            ..Parameters::default()
        };
        assert_eq!(params.validate(), Err(Error::InvalidConfig));

        let q = QConfig {
            adaptive_epsilon: Some(AdaptiveEpsilon {
                min: 0.8,
                max: 0.2,
                decay_rate: 0.1,
            }),
            ..QConfig::default()
        };
        let params = Parameters {
            policy: PolicyConfig::QLearning(q),
            ..Parameters::default()
        };
        assert_eq!(params.validate(), Err(Error::InvalidConfig));
    }

    #[test]
    fn epsilon_delta() {
        let adaptive = AdaptiveEpsilon {
            min: 0.0,
            max: 1.0,
            decay_rate: 0.25,
        };
        assert_eq!(adaptive.delta(), 0.25);
    }
}
