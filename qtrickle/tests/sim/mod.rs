//! Discrete-event simulation of a single node.
//!
//! Time only advances to the next alarm deadline. All alarms due at that instant are dispatched in
//! the order [`AlarmPool::pop_expired`] returns them.

#![allow(dead_code)]

use qtrickle::{
    alarm::{AlarmId, AlarmPool, Alarms},
    config::{Config, Env, Node, Parameters, QueueUsage, Schedule},
    periodic::Report,
    rpl::{DioCounters, DioStats},
    telemetry::Record,
    time::{Duration, Instant},
    Error, TrickleTimer,
};
use rand_core::{impls, RngCore};
use std::cell::Cell;

/// Deterministic random source.
pub enum SimRng {
    /// Always returns the same value. `Constant(0)` places `T` at `tStart`.
    Constant(u32),
    /// xorshift32, the state must not be 0.
    XorShift(u32),
}

impl RngCore for SimRng {
    fn next_u32(&mut self) -> u32 {
        match self {
            SimRng::Constant(value) => *value,
            SimRng::XorShift(state) => {
                let mut x = *state;
                x ^= x << 13;
                x ^= x >> 17;
                x ^= x << 5;
                *state = x;
                x
            }
        }
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

/// TSCH schedule with a minimal cell whose operation counter grows with simulated time.
pub struct MockSchedule {
    pub slotframe: Duration,
    /// Busy minimal cells per 10 slotframes, `None` if there is no minimal cell.
    pub load: Option<u32>,
    pub now: Cell<Instant>,
}

impl MockSchedule {
    pub fn idle() -> Self {
        Self {
            slotframe: Duration::from_millis(1010),
            load: None,
            now: Cell::new(Instant::ZERO),
        }
    }
}

impl Schedule for MockSchedule {
    fn slotframe_duration(&self) -> Duration {
        self.slotframe
    }

    fn minimal_cell_ops(&self) -> Option<u16> {
        let load = self.load?;
        let frames = self.now.get().raw_millis() / self.slotframe.as_millis();
        Some((frames * load / 10) as u16)
    }
}

/// RPL node state as seen by the timer.
pub struct MockNode {
    pub now: Instant,
    pub neighbors: u8,
    pub root: bool,
    pub queue: QueueUsage,
    pub counters: DioCounters,
    /// Whether the MAC layer confirms DIOs.
    pub confirm: bool,
    /// Instants at which a DIO was sent.
    pub dios: Vec<Instant>,
    pub telemetry: Vec<Record>,
    pub reports: Vec<Report>,
}

impl Default for MockNode {
    fn default() -> Self {
        Self {
            now: Instant::ZERO,
            neighbors: 0,
            root: false,
            queue: QueueUsage::default(),
            counters: DioCounters::new(),
            confirm: true,
            dios: Vec::new(),
            telemetry: Vec::new(),
            reports: Vec::new(),
        }
    }
}

impl MockNode {
    pub fn dio_times(&self) -> Vec<u32> {
        self.dios.iter().map(|t| t.raw_millis()).collect()
    }
}

impl Node for MockNode {
    fn neighbor_count(&self) -> u8 {
        self.neighbors
    }

    fn queue_usage(&self) -> QueueUsage {
        self.queue
    }

    fn dio_stats(&self) -> DioStats {
        self.counters.trickle()
    }

    fn is_dag_root(&self) -> bool {
        self.root
    }

    fn emit_telemetry(&mut self, record: &Record) {
        self.telemetry.push(*record);
    }

    fn send_report(&mut self, report: &Report) -> Result<(), Error> {
        self.reports.push(*report);
        Ok(())
    }
}

/// The trickle send callback.
pub fn send_dio(node: &mut MockNode) {
    node.dios.push(node.now);
    node.counters.on_send(true);
    let confirm = node.confirm;
    node.counters.on_send_done(true, confirm);
}

pub enum SimConfig {}

impl Config for SimConfig {
    type Alarms = AlarmPool<8>;
    type Rng = SimRng;
    type Schedule = MockSchedule;
    type Node = MockNode;
}

pub struct Sim {
    pub pool: AlarmPool<8>,
    pub rng: SimRng,
    pub schedule: MockSchedule,
    pub node: MockNode,
    pub timer: TrickleTimer<SimConfig>,
    pub own: AlarmId,
}

impl Sim {
    /// Creates a node with an initialized (but not started) timer.
    pub fn new(params: Parameters, rng: SimRng) -> Self {
        let mut pool = AlarmPool::<8>::new(Instant::ZERO);
        let own = pool.create().unwrap();
        let mut timer = TrickleTimer::<SimConfig>::new(params).unwrap();
        timer.initialize(own, send_dio, &mut pool).unwrap();
        Self {
            pool,
            rng,
            schedule: MockSchedule::idle(),
            node: MockNode::default(),
            timer,
            own,
        }
    }

    /// Plain RFC 6206 timer with `Imin = 1000 ms`, 3 doublings and `K = 2`, `T` at `I/2`.
    pub fn plain() -> Self {
        Self::new(
            Parameters::rfc6206(Duration::from_millis(1000), 3, 2),
            SimRng::Constant(0),
        )
    }

    /// Runs `f` with the timer and a fresh environment.
    pub fn with_env<R>(
        &mut self,
        f: impl FnOnce(&mut TrickleTimer<SimConfig>, &mut Env<'_, SimConfig>) -> R,
    ) -> R {
        let mut env = Env::<SimConfig>::new(
            &mut self.pool,
            &mut self.rng,
            &self.schedule,
            &mut self.node,
        );
        f(&mut self.timer, &mut env)
    }

    pub fn now(&self) -> u32 {
        self.pool.now().raw_millis()
    }

    pub fn start(&mut self) {
        self.with_env(|timer, env| timer.start(env)).unwrap();
    }

    pub fn reset(&mut self) {
        self.with_env(|timer, env| timer.reset(env)).unwrap();
    }

    /// Dispatches the firing of `id`, returning whether it belonged to the timer.
    pub fn fire(&mut self, id: AlarmId) -> bool {
        self.with_env(|timer, env| timer.alarm_fired(id, env))
    }

    /// Dispatches every alarm due at or before `millis` and advances the clock to `millis`.
    pub fn run_until(&mut self, millis: u32) {
        while let Some(deadline) = self.pool.next_deadline() {
            if deadline.raw_millis() > millis {
                break;
            }
            self.set_time(deadline);
            while let Some(id) = self.pool.pop_expired() {
                assert!(self.fire(id), "foreign alarm {:?}", id);
            }
        }
        self.set_time(Instant::from_raw_millis(millis));
    }

    fn set_time(&mut self, now: Instant) {
        self.pool.set_time(now);
        self.schedule.now.set(now);
        self.node.now = now;
    }

    /// Returns whether any alarm is armed.
    pub fn idle(&self) -> bool {
        self.pool.next_deadline().is_none()
    }

    pub fn is_pending(&self, id: AlarmId) -> bool {
        self.pool.is_pending(id)
    }
}
