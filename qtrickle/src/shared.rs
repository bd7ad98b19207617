//! Sharing a timer between thread mode and interrupt handlers.
//!
//! Alarm interrupts and the RPL code calling into the timer run on the same core. Every access
//! goes through a critical section, so an alarm handler never observes a half-updated timer and a
//! facade call is never interrupted by one of the timer's alarms.

use crate::{
    alarm::AlarmId,
    config::{Config, Env},
    timer::TrickleTimer,
    Error,
};
use core::cell::RefCell;
use critical_section::Mutex;

/// A [`TrickleTimer`] behind a critical-section mutex.
///
/// This can be stored in a `static` once the timer is constructed, eg. by placing an
/// `Option<SharedTrickle<_>>` in a `static` cell, or by keeping it in the owner of the interrupt
/// handlers.
///
/// [`TrickleTimer`]: ../timer/struct.TrickleTimer.html
pub struct SharedTrickle<C: Config> {
    inner: Mutex<RefCell<TrickleTimer<C>>>,
}

impl<C: Config> SharedTrickle<C> {
    pub fn new(timer: TrickleTimer<C>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(timer)),
        }
    }

    /// Runs `f` with exclusive access to the timer, inside a critical section.
    pub fn with<R>(&self, f: impl FnOnce(&mut TrickleTimer<C>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// Dispatches an alarm firing, see [`TrickleTimer::alarm_fired`].
    ///
    /// [`TrickleTimer::alarm_fired`]: ../timer/struct.TrickleTimer.html#method.alarm_fired
    pub fn alarm_fired(&self, id: AlarmId, env: &mut Env<'_, C>) -> bool {
        self.with(|timer| timer.alarm_fired(id, env))
    }

    /// Binds the timer to its alarms and send callback, see [`TrickleTimer::initialize`].
    ///
    /// [`TrickleTimer::initialize`]: ../timer/struct.TrickleTimer.html#method.initialize
    pub fn initialize(
        &self,
        id: AlarmId,
        callback: fn(&mut C::Node),
        alarms: &mut C::Alarms,
    ) -> Result<(), Error> {
        self.with(|timer| timer.initialize(id, callback, alarms))
    }

    pub fn clear(&self) {
        self.with(|timer| timer.clear())
    }

    pub fn start(&self, env: &mut Env<'_, C>) -> Result<(), Error> {
        self.with(|timer| timer.start(env))
    }

    pub fn stop(&self, alarms: &mut C::Alarms) -> Result<(), Error> {
        self.with(|timer| timer.stop(alarms))
    }

    pub fn reset(&self, env: &mut Env<'_, C>) -> Result<(), Error> {
        self.with(|timer| timer.reset(env))
    }

    pub fn recv_consistent(&self) -> Result<(), Error> {
        self.with(|timer| timer.recv_consistent())
    }

    pub fn get_value(&self, code: u8) -> u32 {
        self.with(|timer| timer.get_value(code))
    }

    /// Consumes `self`, returning the timer.
    pub fn into_inner(self) -> TrickleTimer<C> {
        self.inner.into_inner().into_inner()
    }
}
