//! Epsilon-greedy Q-learning over discretized channel and queue state.
//!
//! The state is the pair `(class(pbusy), class(pqu))`, each probability split into three classes.
//! The two actions are "suppress" and "transmit". After every interval the entry of the state and
//! action used at `T` is updated with TD(0):
//!
//! ```text
//! Q[s][a] <- (1 - α) Q[s][a] + α (reward + γ max_a' Q[s'][a'])
//! ```
//!
//! The reward is derived from how DIO delivery success developed since the previous interval.

use super::{Action, Decision, DecisionInput, DecisionPolicy};
use crate::{
    config::{QConfig, TieBreak},
    estimator::Estimates,
    utils::unit_interval,
};
use rand_core::RngCore;

/// Number of classes a probability is split into.
pub const CLASSES: usize = 3;

/// Maps a probability to one of 3 classes.
///
/// `[0, 1/3]` is class 0, `(1/3, 2/3)` class 1, and `[2/3, 1]` class 2. Values outside of `[0, 1]`
/// land in class 2.
pub fn prob_to_class(p: f32) -> u8 {
    const LOW: f32 = 1.0 / 3.0;
    const HIGH: f32 = 2.0 / 3.0;

    if (0.0..=LOW).contains(&p) {
        0
    } else if p > LOW && p < HIGH {
        1
    } else {
        2
    }
}

/// A discretized `(busy, queue)` state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct State {
    pub busy: u8,
    pub queue: u8,
}

impl State {
    pub fn from_estimates(pbusy: f32, pqu: f32) -> Self {
        Self {
            busy: prob_to_class(pbusy),
            queue: prob_to_class(pqu),
        }
    }
}

/// Action-value table, `3 x 3` states with 2 actions each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QTable([[[f32; 2]; CLASSES]; CLASSES]);

impl QTable {
    pub fn get(&self, state: State, action: Action) -> f32 {
        self.0[usize::from(state.busy)][usize::from(state.queue)][action.index()]
    }

    pub fn set(&mut self, state: State, action: Action, value: f32) {
        self.0[usize::from(state.busy)][usize::from(state.queue)][action.index()] = value;
    }

    /// Returns `max_a Q[state][a]`.
    pub fn best_value(&self, state: State) -> f32 {
        let suppress = self.get(state, Action::Suppress);
        let transmit = self.get(state, Action::Transmit);
        if transmit >= suppress {
            transmit
        } else {
            suppress
        }
    }

    /// Returns the greedy action for `state`.
    pub fn greedy(&self, state: State, tie_break: TieBreak) -> Action {
        let suppress = self.get(state, Action::Suppress);
        let transmit = self.get(state, Action::Transmit);
        let transmit = match tie_break {
            TieBreak::Transmit => transmit >= suppress,
            TieBreak::Suppress => transmit > suppress,
        };
        Action::from_transmit(transmit)
    }
}

/// Reward for the development of `psent` from `previous` to `current`.
pub fn reward(previous: f32, current: f32) -> i8 {
    if current > previous || current == 1.0 {
        1
    } else if current < previous || current == 0.0 {
        -1
    } else {
        0
    }
}

/// The Q-learning decision policy.
#[derive(Debug, Clone)]
pub struct QLearningPolicy {
    config: QConfig,
    table: QTable,
    epsilon: f32,
    /// Estimates at the end of the previous interval.
    previous: Estimates,
    /// State and action used at `T` in the current interval.
    pending: Option<(State, Action)>,
    last_reward: i8,
    total_reward: f32,
    prev_total_reward: f32,
    updates: u32,
}

impl QLearningPolicy {
    pub fn new(config: QConfig) -> Self {
        Self {
            config,
            table: QTable::default(),
            epsilon: config.epsilon,
            previous: Estimates::INITIAL,
            pending: None,
            last_reward: 0,
            total_reward: 0.0,
            prev_total_reward: 0.0,
            updates: 0,
        }
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    /// Returns the state the next exploiting decision will be based on.
    pub fn state(&self) -> State {
        State::from_estimates(self.previous.pbusy, self.previous.pqu)
    }

    /// Applies the TD(0) update for `action` taken in `state`, ending up in `next`.
    fn learn(&mut self, state: State, action: Action, reward: i8, next: State) {
        let alpha = self.config.learning_rate;
        let old = self.table.get(state, action);
        let target = f32::from(reward) + self.config.discount * self.table.best_value(next);
        let new = (1.0 - alpha) * old + alpha * target;
        trace!("Q{:?}[{:?}]: {} -> {}", state, action, old, new);
        self.table.set(state, action, new);
    }

    /// Moves epsilon towards exploiting while the average reward improves, towards exploring
    /// otherwise.
    fn adapt_epsilon(&mut self, reward: i8) {
        let adaptive = match self.config.adaptive_epsilon {
            Some(adaptive) => adaptive,
            None => return,
        };

        self.total_reward += f32::from(reward);
        self.updates = self.updates.saturating_add(1);
        if self.updates > 1 {
            let average = self.total_reward / self.updates as f32;
            let prev_average = self.prev_total_reward / (self.updates - 1) as f32;
            if average > prev_average {
                self.epsilon -= adaptive.delta();
            } else {
                self.epsilon += adaptive.delta();
            }
        }
        self.epsilon = self.epsilon.max(adaptive.min).min(adaptive.max);
        self.prev_total_reward = self.total_reward;
    }
}

impl DecisionPolicy for QLearningPolicy {
    fn interval_started(&mut self, previous: &Estimates) {
        self.previous = *previous;
        self.pending = None;
    }

    fn decide<R: RngCore + ?Sized>(&mut self, input: &DecisionInput, rng: &mut R) -> Decision {
        let state = self.state();
        let explored = unit_interval(rng) <= self.epsilon;
        let action = if explored {
            Action::from_transmit(input.redundancy_allows())
        } else {
            self.table.greedy(state, self.config.tie_break)
        };

        self.pending = Some((state, action));
        Decision { action, explored }
    }

    fn interval_ended(&mut self, current: &Estimates) {
        let (state, action) = match self.pending.take() {
            Some(pending) => pending,
            None => return,
        };

        let reward = reward(self.previous.psent, current.psent);
        let next = State::from_estimates(current.pbusy, current.pqu);
        self.learn(state, action, reward, next);
        self.last_reward = reward;
        self.adapt_epsilon(reward);
    }

    fn epsilon(&self) -> Option<f32> {
        Some(self.epsilon)
    }

    fn last_reward(&self) -> i8 {
        self.last_reward
    }
}
