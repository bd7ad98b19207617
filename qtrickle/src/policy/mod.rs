//! Transmit-or-suppress decision at the instant `T`.
//!
//! A [`Policy`] is selected from [`PolicyConfig`] when the timer is constructed:
//!
//! * [`PlainRedundancy`] implements RFC 6206: transmit iff fewer than `K` consistent messages were
//!   heard in the current interval.
//! * [`QLearningPolicy`] explores with probability epsilon (applying the RFC 6206 rule) and
//!   otherwise exploits a Q-table indexed by discretized channel busyness and queue pressure.
//!
//! [`PolicyConfig`]: ../config/enum.PolicyConfig.html
//! [`QLearningPolicy`]: qlearning/struct.QLearningPolicy.html

pub mod qlearning;

pub use self::qlearning::QLearningPolicy;

use crate::{config::PolicyConfig, estimator::Estimates};
use rand_core::RngCore;

/// Action chosen at `T`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    Suppress = 0,
    Transmit = 1,
}

impl Action {
    pub fn from_transmit(transmit: bool) -> Self {
        if transmit {
            Action::Transmit
        } else {
            Action::Suppress
        }
    }

    pub fn is_transmit(&self) -> bool {
        *self == Action::Transmit
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

/// Outcome of one decision.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    /// Whether the decision was made by exploring rather than exploiting.
    pub explored: bool,
}

/// Inputs available at `T`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DecisionInput {
    /// Consistent messages heard in this interval.
    pub c: u8,
    /// Redundancy constant of this interval.
    pub k: u8,
}

impl DecisionInput {
    /// The RFC 6206 rule: transmit iff `C < K`, or always if `K` is 0.
    pub fn redundancy_allows(&self) -> bool {
        self.k == 0 || self.c < self.k
    }
}

/// Trait for decision policies.
pub trait DecisionPolicy {
    /// Called at every interval start with the estimates of the interval that just ended.
    fn interval_started(&mut self, previous: &Estimates);

    /// Decides whether to transmit at `T`.
    fn decide<R: RngCore + ?Sized>(&mut self, input: &DecisionInput, rng: &mut R) -> Decision;

    /// Called at every interval boundary, after the estimator has updated `current`.
    fn interval_ended(&mut self, current: &Estimates);

    /// Returns the exploration probability, if the policy explores.
    fn epsilon(&self) -> Option<f32> {
        None
    }

    /// Returns the reward computed at the last interval boundary.
    fn last_reward(&self) -> i8 {
        0
    }
}

/// The plain RFC 6206 suppression rule.
#[derive(Debug, Copy, Clone, Default)]
pub struct PlainRedundancy;

impl DecisionPolicy for PlainRedundancy {
    fn interval_started(&mut self, _: &Estimates) {}

    fn decide<R: RngCore + ?Sized>(&mut self, input: &DecisionInput, _: &mut R) -> Decision {
        Decision {
            action: Action::from_transmit(input.redundancy_allows()),
            explored: false,
        }
    }

    fn interval_ended(&mut self, _: &Estimates) {}
}

/// The decision policy of one timer.
#[derive(Debug, Clone)]
pub enum Policy {
    Plain(PlainRedundancy),
    QLearning(QLearningPolicy),
}

impl Policy {
    pub fn new(config: &PolicyConfig) -> Self {
        match config {
            PolicyConfig::Plain => Policy::Plain(PlainRedundancy),
            PolicyConfig::QLearning(q) => Policy::QLearning(QLearningPolicy::new(*q)),
        }
    }

    /// Returns the Q-learning policy, if that is the active one.
    pub fn q_learning(&self) -> Option<&QLearningPolicy> {
        match self {
            Policy::Plain(_) => None,
            Policy::QLearning(q) => Some(q),
        }
    }
}

impl DecisionPolicy for Policy {
    fn interval_started(&mut self, previous: &Estimates) {
        match self {
            Policy::Plain(p) => p.interval_started(previous),
            Policy::QLearning(q) => q.interval_started(previous),
        }
    }

    fn decide<R: RngCore + ?Sized>(&mut self, input: &DecisionInput, rng: &mut R) -> Decision {
        match self {
            Policy::Plain(p) => p.decide(input, rng),
            Policy::QLearning(q) => q.decide(input, rng),
        }
    }

    fn interval_ended(&mut self, current: &Estimates) {
        match self {
            Policy::Plain(p) => p.interval_ended(current),
            Policy::QLearning(q) => q.interval_ended(current),
        }
    }

    fn epsilon(&self) -> Option<f32> {
        match self {
            Policy::Plain(p) => p.epsilon(),
            Policy::QLearning(q) => q.epsilon(),
        }
    }

    fn last_reward(&self) -> i8 {
        match self {
            Policy::Plain(p) => p.last_reward(),
            Policy::QLearning(q) => q.last_reward(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::impls;

    struct NeverCalled;

    impl RngCore for NeverCalled {
        fn next_u32(&mut self) -> u32 {
            panic!("plain policy must not draw random numbers")
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

    #[test]
    fn plain_redundancy() {
        let mut policy = Policy::new(&PolicyConfig::Plain);
        let mut rng = NeverCalled;
        let decide = |policy: &mut Policy, rng: &mut NeverCalled, c, k| {
            policy.decide(&DecisionInput { c, k }, rng).action
        };
        assert_eq!(decide(&mut policy, &mut rng, 0, 2), Action::Transmit);
        assert_eq!(decide(&mut policy, &mut rng, 1, 2), Action::Transmit);
        assert_eq!(decide(&mut policy, &mut rng, 2, 2), Action::Suppress);
        assert_eq!(decide(&mut policy, &mut rng, 3, 2), Action::Suppress);
        assert_eq!(decide(&mut policy, &mut rng, 200, 0), Action::Transmit);
        assert_eq!(policy.epsilon(), None);
        assert!(policy.q_learning().is_none());
    }
}
