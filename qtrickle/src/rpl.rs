//! Glue between RPL and the trickle timer.
//!
//! RPL keeps the DIO send statistics the estimator's delivery probabilities are computed from,
//! decides when the topology changed enough to (re)start the timer, and tells the timer about
//! consistent DIOs heard from neighbors.

use crate::{
    config::{Config, Env},
    timer::TrickleTimer,
    Error,
};

/// The rank advertised by nodes that are not (or no longer) part of a DODAG.
pub const INFINITE_RANK: u16 = 0xffff;

/// Send statistics of a class of DIOs.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DioStats {
    /// DIOs handed to the MAC layer.
    pub attempted: u32,
    /// DIOs the MAC layer reported as sent.
    pub confirmed: u32,
}

impl DioStats {
    /// Returns the number of DIOs that were attempted but never confirmed.
    pub fn failed(&self) -> u32 {
        self.attempted.saturating_sub(self.confirmed)
    }
}

/// DIO send accounting kept by the RPL module.
///
/// DIOs sent from the trickle callback are counted separately from all DIOs (which also include
/// DIOs sent in response to a DIS, for example).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct DioCounters {
    trickle: DioStats,
    total: DioStats,
}

impl DioCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a DIO handed to the MAC layer.
    pub fn on_send(&mut self, is_trickle: bool) {
        self.total.attempted = self.total.attempted.saturating_add(1);
        if is_trickle {
            self.trickle.attempted = self.trickle.attempted.saturating_add(1);
        }
    }

    /// Records the outcome of a DIO transmission.
    ///
    /// # Parameters
    ///
    /// * **`is_trickle`**: Whether the DIO was sent from the trickle callback.
    /// * **`success`**: Whether the MAC layer reported the DIO as sent.
    pub fn on_send_done(&mut self, is_trickle: bool, success: bool) {
        if !success {
            debug!("DIO send failed (trickle: {})", is_trickle);
            return;
        }

        self.total.confirmed = self.total.confirmed.saturating_add(1);
        if is_trickle {
            self.trickle.confirmed = self.trickle.confirmed.saturating_add(1);
        }
    }

    /// Statistics of trickle-originated DIOs, the input of [`Node::dio_stats`].
    ///
    /// [`Node::dio_stats`]: ../config/trait.Node.html#tymethod.dio_stats
    pub fn trickle(&self) -> DioStats {
        self.trickle
    }

    /// Statistics of all DIOs.
    pub fn total(&self) -> DioStats {
        self.total
    }
}

/// What [`start_or_reset`] did to the timer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TimerAction {
    /// Sending DIOs is not allowed, the timer was left alone.
    Skipped,
    /// The timer was not running and has been started.
    Started,
    /// The running timer has been reset to `Imin`.
    Reset,
}

/// Starts the timer if it never ran (or was stopped), resets it otherwise.
///
/// # Parameters
///
/// * **`timer`**: The DIO trickle timer, already initialized.
/// * **`env`**: Platform services.
/// * **`allow_sending`**: Whether this node may send DIOs at all (eg. it has a rank).
///
/// # Errors
///
/// Returns `Error::NotInUse` if the timer has not been initialized.
pub fn start_or_reset<C: Config>(
    timer: &mut TrickleTimer<C>,
    env: &mut Env<'_, C>,
    allow_sending: bool,
) -> Result<TimerAction, Error> {
    if !allow_sending {
        return Ok(TimerAction::Skipped);
    }

    if timer.current_interval().is_zero() || !timer.is_running() {
        timer.start(env)?;
        Ok(TimerAction::Started)
    } else {
        timer.reset(env)?;
        Ok(TimerAction::Reset)
    }
}

/// How a received DIO affected the timer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DioReaction {
    /// The sender advertised an infinite rank. The timer was started or reset.
    Inconsistent(TimerAction),
    /// The sender's rank matches its neighbor table entry, which counts as consistent.
    Consistent,
    /// The DIO did not concern the timer.
    Ignored,
}

/// Feeds a received DIO to the timer.
///
/// # Parameters
///
/// * **`incoming_rank`**: Rank carried by the DIO.
/// * **`neighbor_rank`**: Rank of the sender in the neighbor table, `None` if it is not a known
///   neighbor.
/// * **`allow_sending`**: Whether this node may send DIOs at all.
///
/// # Errors
///
/// Returns `Error::NotInUse` if the timer has not been initialized.
pub fn on_dio_received<C: Config>(
    timer: &mut TrickleTimer<C>,
    env: &mut Env<'_, C>,
    incoming_rank: u16,
    neighbor_rank: Option<u16>,
    allow_sending: bool,
) -> Result<DioReaction, Error> {
    if incoming_rank == INFINITE_RANK {
        let action = start_or_reset(timer, env, allow_sending)?;
        return Ok(DioReaction::Inconsistent(action));
    }

    if neighbor_rank == Some(incoming_rank) {
        timer.recv_consistent()?;
        Ok(DioReaction::Consistent)
    } else {
        Ok(DioReaction::Ignored)
    }
}
