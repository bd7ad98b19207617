//! The trickle timer.
//!
//! Each interval `I` is partitioned by four one-shot alarms:
//!
//! ```notrust
//! 0          tStart            T           tEnd            I
//! |------------|---------------|-------------|-------------|
//!              ^ at_start      ^ at_t        ^ at_end      ^ at_i
//!              sample ops      decide        sample ops    estimate, learn, double I
//! ```
//!
//! * `at_start` and `at_end` sample the minimal cell's operation counter, delimiting the listen
//!   window used by the occupancy estimate. When `tEnd == I`, `at_end` is not armed and the
//!   boundary handler samples the end itself.
//! * `at_t` asks the decision policy whether to transmit. On a transmission, the send callback
//!   supplied at [`TrickleTimer::initialize`] is invoked with the node.
//! * `at_i` ends the interval: the estimator updates its probabilities, the Q-learning policy (if
//!   active) learns from the interval, a telemetry record is emitted, `I` doubles (up to the
//!   maximum interval) and the next interval is armed.
//!
//! A fifth alarm, the id passed to `initialize`, drives the [`AmbrSampler`].
//!
//! [`TrickleTimer::initialize`]: struct.TrickleTimer.html#method.initialize
//! [`AmbrSampler`]: ../bandwidth/struct.AmbrSampler.html

use crate::{
    alarm::{AlarmId, Alarms},
    bandwidth::AmbrSampler,
    config::{Config, Env, Node, Parameters, Schedule},
    estimator::{Estimates, Estimator},
    policy::{Action, DecisionInput, DecisionPolicy, Policy},
    telemetry::{FixedProbabilities, Record, RecordFlags, RecordKind},
    time::Duration,
    utils::saturate_u16,
    window::Window,
    Error,
};
use bitflags::bitflags;

bitflags! {
    /// Lifecycle flags of a [`TrickleTimer`].
    pub struct Status: u8 {
        /// The timer has been initialized and owns its alarms.
        const USED    = 0x01;
        /// The timer is started. Alarm firings are ignored while this is unset.
        const RUNNING = 0x02;
    }
}

enum_with_unknown! {
    /// Selects the value returned by [`TrickleTimer::get_value`].
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    pub enum ValueCode(u8) {
        /// The current interval `I`.
        CurrentInterval = 0,
        /// The minimum interval `Imin`.
        MinInterval = 1,
    }
}

/// Progress of the current interval.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    /// `T` has not been reached yet.
    Armed,

    /// The decision at `T` has been made.
    Evaluated(Action),
}

/// Alarms owned by one timer.
#[derive(Debug, Copy, Clone)]
struct TimerAlarms {
    /// Supplied to `initialize`, used by the bandwidth sampler.
    own: AlarmId,
    at_t: AlarmId,
    at_start: AlarmId,
    at_end: AlarmId,
    at_i: AlarmId,
}

impl TimerAlarms {
    fn create<A: Alarms>(own: AlarmId, alarms: &mut A) -> Option<Self> {
        Some(Self {
            own,
            at_t: alarms.create()?,
            at_start: alarms.create()?,
            at_end: alarms.create()?,
            at_i: alarms.create()?,
        })
    }

    fn cancel_interval<A: Alarms>(&self, alarms: &mut A) {
        alarms.cancel(self.at_t);
        alarms.cancel(self.at_start);
        alarms.cancel(self.at_end);
        alarms.cancel(self.at_i);
    }
}

/// An adaptive trickle timer.
///
/// The timer is an owned value. Every operation takes `&mut self`; when alarm handlers run in
/// interrupt context, share the timer through a [`SharedTrickle`].
///
/// [`SharedTrickle`]: ../shared/struct.SharedTrickle.html
pub struct TrickleTimer<C: Config> {
    params: Parameters,
    max_interval: Duration,
    status: Status,
    callback: Option<fn(&mut C::Node)>,
    alarms: Option<TimerAlarms>,
    /// Current interval `I`, zero until the first `start`.
    interval: Duration,
    window: Window,
    /// Whether `at_end` is armed in this interval.
    end_armed: bool,
    k: u8,
    c: u8,
    phase: Phase,
    explored: bool,
    estimator: Estimator,
    policy: Policy,
    bandwidth: AmbrSampler,
}

impl<C: Config> TrickleTimer<C> {
    /// Creates a timer with the given parameters.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if `params` fail [`Parameters::validate`].
    ///
    /// [`Parameters::validate`]: ../config/struct.Parameters.html#method.validate
    pub fn new(params: Parameters) -> Result<Self, Error> {
        params.validate()?;
        Ok(Self {
            params,
            max_interval: params.max_interval(),
            status: Status::empty(),
            callback: None,
            alarms: None,
            interval: Duration::ZERO,
            window: Window {
                start: Duration::ZERO,
                end: Duration::ZERO,
                t: Duration::ZERO,
            },
            end_armed: false,
            k: params.k,
            c: 0,
            phase: Phase::Armed,
            explored: false,
            estimator: Estimator::new(),
            policy: Policy::new(&params.policy),
            bandwidth: AmbrSampler::new(params.ambr_slotframes),
        })
    }

    /// Prepares the timer for use.
    ///
    /// Allocates the interval alarms from `alarms` and resets all state. The alarms stay allocated
    /// to this timer, so initializing again reuses them.
    ///
    /// # Parameters
    ///
    /// * **`id`**: Alarm id of the timer itself. Must be valid in `alarms`.
    /// * **`callback`**: Invoked with the node whenever a DIO should be sent.
    /// * **`alarms`**: The alarm facility.
    ///
    /// # Errors
    ///
    /// Returns `Error::NoFreeAlarm` if `id` is invalid or the interval alarms cannot be allocated.
    /// The timer must not be started in that case.
    pub fn initialize(
        &mut self,
        id: AlarmId,
        callback: fn(&mut C::Node),
        alarms: &mut C::Alarms,
    ) -> Result<(), Error> {
        if !alarms.is_valid(id) {
            error!("trickle timer {:?} out of range", id);
            return Err(Error::NoFreeAlarm);
        }

        let timer_alarms = match self.alarms {
            Some(existing) => {
                existing.cancel_interval(alarms);
                TimerAlarms { own: id, ..existing }
            }
            None => match TimerAlarms::create(id, alarms) {
                Some(created) => created,
                None => {
                    error!("no free alarm for trickle timer {:?}", id);
                    return Err(Error::NoFreeAlarm);
                }
            },
        };
        alarms.cancel(id);

        self.reset_state();
        self.alarms = Some(timer_alarms);
        self.callback = Some(callback);
        self.status = Status::USED;
        debug!("trickle timer initialized: {:?}", timer_alarms);
        Ok(())
    }

    /// Starts the timer at `I = Imin`.
    ///
    /// Starting a running timer restarts it. A timer that was stopped has lost its callback and
    /// does not transmit until it is initialized again.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotInUse` if the timer has not been initialized.
    pub fn start(&mut self, env: &mut Env<'_, C>) -> Result<(), Error> {
        let alarms = self.alarms.filter(|_| self.is_used()).ok_or(Error::NotInUse)?;
        if self.is_running() {
            warn!("trickle timer started twice, restarting");
        }

        self.status.insert(Status::RUNNING);
        self.interval = self.params.i_min;
        self.bandwidth.start(
            alarms.own,
            env.alarms,
            env.schedule.slotframe_duration(),
            env.schedule.minimal_cell_ops(),
        );
        info!("trickle timer started, Imin = {}", self.params.i_min);
        self.start_next_interval(env);
        Ok(())
    }

    /// Stops the timer and disarms all of its alarms.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotInUse` if the timer has not been initialized and `Error::NotRunning` if
    /// it is not started. Nothing is changed in both cases.
    pub fn stop(&mut self, alarms: &mut C::Alarms) -> Result<(), Error> {
        let own = self.running_alarms()?;
        own.cancel_interval(alarms);
        self.bandwidth.stop(own.own, alarms);
        self.status.remove(Status::RUNNING);
        self.callback = None;
        info!("trickle timer stopped");
        Ok(())
    }

    /// Records a consistent transmission heard from a neighbor.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotInUse` if the timer has not been initialized.
    pub fn recv_consistent(&mut self) -> Result<(), Error> {
        if !self.is_used() {
            return Err(Error::NotInUse);
        }
        self.c = self.c.saturating_add(1);
        trace!("consistent, C = {}", self.c);
        Ok(())
    }

    /// Handles an inconsistency: restarts the timer at `I = Imin`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotInUse` if the timer has not been initialized and `Error::NotRunning` if
    /// it is not started.
    pub fn reset(&mut self, env: &mut Env<'_, C>) -> Result<(), Error> {
        self.running_alarms()?;
        self.estimator.record_reset();
        debug!(
            "trickle reset in I = {}, preset = {}",
            self.interval,
            self.estimator.estimates().preset
        );
        self.emit_telemetry(RecordKind::Reset, env);
        self.interval = self.params.i_min;
        self.start_next_interval(env);
        Ok(())
    }

    /// Returns the value selected by `code` in milliseconds, or `u32::MAX` for an unknown code.
    pub fn get_value(&self, code: u8) -> u32 {
        match ValueCode::from(code) {
            ValueCode::CurrentInterval => self.interval.as_millis(),
            ValueCode::MinInterval => self.params.i_min.as_millis(),
            ValueCode::Unknown(_) => u32::MAX,
        }
    }

    /// Resets the timer to the uninitialized state.
    ///
    /// Pending alarm firings are ignored afterwards. The alarm ids stay allocated to this timer and
    /// are reused by the next [`initialize`](#method.initialize).
    pub fn clear(&mut self) {
        self.reset_state();
        self.status = Status::empty();
        self.callback = None;
    }

    /// Dispatches an alarm firing.
    ///
    /// Returns `false` if `id` does not belong to this timer. Firings of a stopped timer are
    /// ignored.
    pub fn alarm_fired(&mut self, id: AlarmId, env: &mut Env<'_, C>) -> bool {
        let alarms = match self.alarms {
            Some(alarms) => alarms,
            None => return false,
        };

        let handler: fn(&mut Self, &mut Env<'_, C>) = if id == alarms.own {
            Self::on_sample_bandwidth
        } else if id == alarms.at_t {
            Self::on_t
        } else if id == alarms.at_start {
            Self::on_window_start
        } else if id == alarms.at_end {
            Self::on_window_end
        } else if id == alarms.at_i {
            Self::on_interval_end
        } else {
            return false;
        };

        if self.status.contains(Status::USED | Status::RUNNING) {
            handler(self, env);
        } else {
            trace!("stale alarm {:?} ignored", id);
        }
        true
    }

    /// Returns whether the listen window of the current interval is open.
    pub fn in_listen_window(&self, alarms: &C::Alarms) -> bool {
        match &self.alarms {
            Some(own) if self.is_running() => {
                let window_end = if self.end_armed { own.at_end } else { own.at_i };
                !alarms.is_pending(own.at_start) && alarms.is_pending(window_end)
            }
            _ => false,
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_used(&self) -> bool {
        self.status.contains(Status::USED)
    }

    pub fn is_running(&self) -> bool {
        self.status.contains(Status::RUNNING)
    }

    /// Returns the current interval `I`. Zero if the timer was never started.
    pub fn current_interval(&self) -> Duration {
        self.interval
    }

    pub fn min_interval(&self) -> Duration {
        self.params.i_min
    }

    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    /// Returns the listen window and `T` of the current interval.
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Redundancy constant `K` of the current interval.
    pub fn k(&self) -> u8 {
        self.k
    }

    /// Consistency counter `C` of the current interval.
    pub fn c(&self) -> u8 {
        self.c
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn estimates(&self) -> &Estimates {
        self.estimator.estimates()
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Average unused fraction of the minimal cell, see [`AmbrSampler`].
    ///
    /// [`AmbrSampler`]: ../bandwidth/struct.AmbrSampler.html
    pub fn available_bandwidth(&self) -> f32 {
        self.bandwidth.available_bandwidth()
    }

    pub fn available_bandwidth_fixed(&self) -> u16 {
        self.bandwidth.available_bandwidth_fixed()
    }

    fn running_alarms(&self) -> Result<TimerAlarms, Error> {
        let alarms = self.alarms.filter(|_| self.is_used()).ok_or(Error::NotInUse)?;
        if self.is_running() {
            Ok(alarms)
        } else {
            Err(Error::NotRunning)
        }
    }

    fn reset_state(&mut self) {
        self.interval = Duration::ZERO;
        self.window = Window {
            start: Duration::ZERO,
            end: Duration::ZERO,
            t: Duration::ZERO,
        };
        self.end_armed = false;
        self.k = self.params.k;
        self.c = 0;
        self.phase = Phase::Armed;
        self.explored = false;
        self.estimator = Estimator::new();
        self.policy = Policy::new(&self.params.policy);
        self.bandwidth = AmbrSampler::new(self.params.ambr_slotframes);
    }

    /// Arms the alarms of a new interval of length `self.interval`.
    fn start_next_interval(&mut self, env: &mut Env<'_, C>) {
        let alarms = match self.alarms {
            Some(alarms) if self.status.contains(Status::USED | Status::RUNNING) => alarms,
            _ => return,
        };
        alarms.cancel_interval(env.alarms);

        self.c = 0;
        self.phase = Phase::Armed;
        self.explored = false;

        let estimates = *self.estimator.estimates();
        self.k = self.params.redundancy.next_k(
            self.params.k,
            env.node.neighbor_count(),
            estimates.preset,
            estimates.pstable,
        );
        self.policy.interval_started(&estimates);

        self.window = Window::draw(
            self.params.window,
            self.interval,
            self.params.window_floor,
            &estimates.bias(),
            env.rng,
        );
        self.estimator
            .begin_interval(&self.window, env.schedule.slotframe_duration());

        env.alarms.schedule_in(alarms.at_t, self.window.t);
        env.alarms.schedule_in(alarms.at_start, self.window.start);
        self.end_armed = self.window.end < self.interval;
        if self.end_armed {
            env.alarms.schedule_in(alarms.at_end, self.window.end);
        }
        env.alarms.schedule_in(alarms.at_i, self.interval);

        debug!(
            "interval {}: I = {}, window [{}, {}], T = {}, K = {}",
            self.estimator.n_states(),
            self.interval,
            self.window.start,
            self.window.end,
            self.window.t,
            self.k
        );
    }

    fn on_t(&mut self, env: &mut Env<'_, C>) {
        let callback = match self.callback {
            Some(callback) => callback,
            None => return,
        };

        let input = DecisionInput {
            c: self.c,
            k: self.k,
        };
        let decision = self.policy.decide(&input, env.rng);
        let transmit = decision.action.is_transmit();
        if transmit {
            self.estimator.own_dio_pending(env.node.dio_stats());
            callback(env.node);
        }
        self.estimator.record_decision(transmit);
        self.phase = Phase::Evaluated(decision.action);
        self.explored = decision.explored;
        trace!(
            "T: C = {}, K = {}, {:?} (explored: {})",
            self.c,
            self.k,
            decision.action,
            decision.explored
        );
    }

    fn on_window_start(&mut self, env: &mut Env<'_, C>) {
        self.estimator.sample_start(env.schedule.minimal_cell_ops());
    }

    fn on_window_end(&mut self, env: &mut Env<'_, C>) {
        self.estimator.sample_end(env.schedule.minimal_cell_ops());
    }

    fn on_interval_end(&mut self, env: &mut Env<'_, C>) {
        if !self.estimator.end_sampled() {
            self.on_window_end(env);
        }

        let stats = env.node.dio_stats();
        self.estimator.update_occupancy(stats);
        self.estimator.update_delivery(stats);
        self.estimator.update_queue(env.node.queue_usage());
        let estimates = *self.estimator.estimates();
        self.policy.interval_ended(&estimates);
        self.emit_telemetry(RecordKind::Boundary, env);

        self.interval = self.interval.saturating_mul(2);
        if self.interval > self.max_interval {
            self.interval = self.max_interval;
        }
        self.start_next_interval(env);
    }

    fn on_sample_bandwidth(&mut self, env: &mut Env<'_, C>) {
        if let Some(alarms) = self.alarms {
            self.bandwidth.alarm_fired(
                alarms.own,
                env.alarms,
                env.schedule.slotframe_duration(),
                env.schedule.minimal_cell_ops(),
                env.node.is_dag_root(),
            );
        }
    }

    fn emit_telemetry(&self, kind: RecordKind, env: &mut Env<'_, C>) {
        if env.node.is_dag_root() {
            return;
        }

        let mut flags = RecordFlags::empty();
        flags.set(
            RecordFlags::TRANSMITTED,
            self.phase == Phase::Evaluated(Action::Transmit),
        );
        flags.set(RecordFlags::EXPLORED, self.explored);

        let record = Record {
            kind,
            flags,
            n_states: saturate_u16(self.estimator.n_states()),
            n_reset: saturate_u16(self.estimator.n_reset()),
            c: self.c,
            k: self.k,
            n_nbr: env.node.neighbor_count(),
            reward: self.policy.last_reward(),
            used: self.estimator.used(),
            n_cells: self.estimator.n_cells(),
            dio_transmit: saturate_u16(self.estimator.dio_transmit()),
            dio_suppress: saturate_u16(self.estimator.dio_suppress()),
            interval: self.interval,
            t: self.window.t,
            probabilities: FixedProbabilities::new(
                self.estimator.estimates(),
                self.policy.epsilon().unwrap_or(0.0),
            ),
        };
        env.node.emit_telemetry(&record);
    }
}
