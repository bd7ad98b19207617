//! An adaptive trickle timer for scheduling RPL DIO transmissions on 6TiSCH nodes.
//!
//! Implements the trickle algorithm of *RFC 6206* as used by RPL (*RFC 6550*), extended with an
//! estimator of minimal-cell occupancy and queue pressure that biases the transmission instant,
//! and an optional epsilon-greedy Q-learning policy that learns whether to transmit or suppress
//! from observed DIO delivery success.
//!
//! # Using the timer
//!
//! The crate is runtime and hardware-agnostic: It does not need an RTOS and only talks to the rest
//! of the node through a few traits, bundled by a [`Config`] implementation:
//! * An [`Alarms`] facility with millisecond one-shot alarms. [`AlarmPool`] is a software
//!   implementation that multiplexes alarms onto a single hardware compare channel.
//! * A random source implementing `rand_core::RngCore`.
//! * A [`Schedule`] giving access to the TSCH slotframe duration and the minimal cell's operation
//!   counter.
//! * A [`Node`] giving access to the neighbor table, packet queue, DIO send statistics and the
//!   telemetry channel.
//!
//! The platform routes every alarm firing to [`TrickleTimer::alarm_fired`]. When the timer is
//! shared between interrupt handlers and thread-mode code, wrap it in a [`SharedTrickle`].
//!
//! [`Config`]: config/trait.Config.html
//! [`Alarms`]: alarm/trait.Alarms.html
//! [`AlarmPool`]: alarm/struct.AlarmPool.html
//! [`Schedule`]: config/trait.Schedule.html
//! [`Node`]: config/trait.Node.html
//! [`TrickleTimer::alarm_fired`]: timer/struct.TrickleTimer.html#method.alarm_fired
//! [`SharedTrickle`]: shared/struct.SharedTrickle.html

// We're `#[no_std]`, except when we're testing
#![cfg_attr(not(test), no_std)]
#![warn(rust_2018_idioms)]
// The claims of this lint are dubious, disable it
#![allow(clippy::trivially_copy_pass_by_ref)]

#[macro_use]
mod log;
#[macro_use]
mod utils;
pub mod alarm;
pub mod bandwidth;
pub mod bytes;
pub mod config;
mod error;
pub mod estimator;
pub mod periodic;
pub mod policy;
pub mod redundancy;
pub mod rpl;
pub mod shared;
pub mod telemetry;
pub mod time;
pub mod timer;
pub mod window;

pub use self::error::Error;
pub use self::shared::SharedTrickle;
pub use self::timer::TrickleTimer;

/// Multiplier used to turn probabilities into fixed-point integers at the telemetry boundary.
pub const FIXED_POINT_SCALE: f32 = 10_000.0;
