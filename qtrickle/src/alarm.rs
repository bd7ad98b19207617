//! One-shot millisecond alarms.
//!
//! The trickle timer never talks to a hardware timer directly. It asks an [`Alarms`] facility for
//! a handful of alarm ids during initialization and then (re-)arms and cancels them. When an alarm
//! expires, the platform calls [`TrickleTimer::alarm_fired`] with its id.
//!
//! [`AlarmPool`] is a software implementation of [`Alarms`] that multiplexes any number of alarms
//! onto a single hardware compare channel: the platform programs the channel with
//! [`AlarmPool::next_deadline`], and on expiry calls [`AlarmPool::set_time`] followed by
//! [`AlarmPool::pop_expired`] until it returns `None`.
//!
//! [`TrickleTimer::alarm_fired`]: ../timer/struct.TrickleTimer.html#method.alarm_fired

use crate::time::{Duration, Instant};
use core::fmt;
use heapless::Vec;

/// Identifies an alarm allocated from an [`Alarms`] facility.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct AlarmId(u8);

impl AlarmId {
    /// Creates an `AlarmId` from its raw index.
    pub const fn from_raw(raw: u8) -> Self {
        AlarmId(raw)
    }

    /// Returns the raw index of this alarm.
    pub const fn raw(&self) -> u8 {
        self.0
    }
}

impl fmt::Debug for AlarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AlarmId({})", self.0)
    }
}

/// Trait for one-shot alarm facilities.
///
/// Alarms fire at most once per `schedule_in` call. Scheduling an alarm that is already pending
/// replaces its deadline.
pub trait Alarms {
    /// Returns the number of alarm ids the facility can hand out.
    ///
    /// Valid ids have a raw value below this.
    fn capacity(&self) -> u8;

    /// Allocates a new alarm, or returns `None` if all alarms are in use.
    fn create(&mut self) -> Option<AlarmId>;

    /// Arms `id` to fire `delay` from now.
    fn schedule_in(&mut self, id: AlarmId, delay: Duration);

    /// Disarms `id`. Cancelling an alarm that is not pending has no effect.
    fn cancel(&mut self, id: AlarmId);

    /// Returns whether `id` is armed and has not fired yet.
    fn is_pending(&self, id: AlarmId) -> bool;

    /// Returns whether `id` lies within the facility's id range.
    fn is_valid(&self, id: AlarmId) -> bool {
        id.0 < self.capacity()
    }
}

/// A fixed-capacity software alarm facility driven by an external clock.
///
/// `N` must not exceed 256.
pub struct AlarmPool<const N: usize> {
    now: Instant,
    /// Deadline of every allocated alarm, `None` while disarmed.
    slots: Vec<Option<Instant>, N>,
}

impl<const N: usize> AlarmPool<N> {
    /// Creates an empty pool whose clock starts at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            now,
            slots: Vec::new(),
        }
    }

    /// Returns the pool's notion of the current time.
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Advances the pool's clock to `now`.
    ///
    /// `now` must not be earlier than the previous time.
    pub fn set_time(&mut self, now: Instant) {
        debug_assert!(now.is_at_or_after(self.now));
        self.now = now;
    }

    /// Returns the number of alarms handed out so far.
    pub fn allocated(&self) -> usize {
        self.slots.len()
    }

    /// Returns the earliest deadline among all armed alarms.
    ///
    /// Alarms whose deadline has already passed report their (past) deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.slots
            .iter()
            .flatten()
            .copied()
            .min_by_key(|deadline| self.remaining(*deadline))
    }

    /// Disarms and returns the alarm that is due for the longest time, if any.
    ///
    /// Alarms with the same deadline are returned in allocation order.
    pub fn pop_expired(&mut self) -> Option<AlarmId> {
        let now = self.now;
        let mut due: Option<(usize, Duration)> = None;
        for (index, slot) in self.slots.iter().enumerate() {
            if let Some(deadline) = slot {
                if now.is_at_or_after(*deadline) {
                    let late = now - *deadline;
                    if due.map_or(true, |(_, most_late)| late > most_late) {
                        due = Some((index, late));
                    }
                }
            }
        }

        let (index, _) = due?;
        self.slots[index] = None;
        Some(AlarmId(index as u8))
    }

    /// Time until `deadline`, zero if it has passed.
    fn remaining(&self, deadline: Instant) -> Duration {
        if self.now.is_at_or_after(deadline) {
            Duration::ZERO
        } else {
            deadline - self.now
        }
    }

    fn slot_mut(&mut self, id: AlarmId) -> Option<&mut Option<Instant>> {
        self.slots.get_mut(usize::from(id.0))
    }
}

impl<const N: usize> Alarms for AlarmPool<N> {
    fn capacity(&self) -> u8 {
        if N > usize::from(u8::MAX) {
            u8::MAX
        } else {
            N as u8
        }
    }

    fn create(&mut self) -> Option<AlarmId> {
        let index = self.slots.len();
        if index >= usize::from(self.capacity()) {
            return None;
        }
        self.slots.push(None).ok()?;
        Some(AlarmId(index as u8))
    }

    fn schedule_in(&mut self, id: AlarmId, delay: Duration) {
        let deadline = self.now + delay;
        match self.slot_mut(id) {
            Some(slot) => *slot = Some(deadline),
            None => warn!("scheduling unallocated {:?}", id),
        }
    }

    fn cancel(&mut self, id: AlarmId) {
        if let Some(slot) = self.slot_mut(id) {
            *slot = None;
        }
    }

    fn is_pending(&self, id: AlarmId) -> bool {
        matches!(self.slots.get(usize::from(id.0)), Some(Some(_)))
    }
}
