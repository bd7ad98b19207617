//! Periodic upward reports.
//!
//! Besides DIOs, every node that is not the DAG root periodically reports a small amount of data
//! towards the root. The reports share the channel with the DIOs, which makes them useful to
//! observe how the timer's bandwidth estimate behaves under application load. Each report carries
//! a running counter (so the root can count losses) and the sender's current AMBR.
//!
//! Only a configurable portion of the periodic alarm firings actually produce a report.

use crate::{
    alarm::{AlarmId, Alarms},
    bytes::{ByteReader, ByteWriter, FromBytes, ToBytes},
    config::Node,
    time::Duration,
    utils::HexSlice,
    Error,
};
use rand_core::RngCore;

/// Payload of a periodic report.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Report {
    /// Number of report attempts so far, including this one.
    pub counter: u16,
    /// Available minimal-cell bandwidth ratio in fixed point.
    pub ambr: u16,
}

impl Report {
    /// Encoded size of a report in bytes.
    pub const SIZE: usize = 4;

    pub fn to_array(&self) -> Result<[u8; Self::SIZE], Error> {
        let mut buf = [0; Self::SIZE];
        self.to_bytes(&mut ByteWriter::new(&mut buf))?;
        Ok(buf)
    }
}

impl ToBytes for Report {
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        writer.write_u16_le(self.counter)?;
        writer.write_u16_le(self.ambr)?;
        Ok(())
    }
}

impl<'a> FromBytes<'a> for Report {
    fn from_bytes(bytes: &mut ByteReader<'a>) -> Result<Self, Error> {
        Ok(Self {
            counter: bytes.read_u16_le()?,
            ambr: bytes.read_u16_le()?,
        })
    }
}

/// Configuration of a [`PeriodicReporter`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ReportConfig {
    /// Period of the report alarm.
    pub period: Duration,
    /// Probability that a firing produces a report.
    pub portion: f32,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
            portion: 0.1,
        }
    }
}

impl ReportConfig {
    /// Returns the largest random `u32` that still results in a report.
    fn threshold(&self) -> u32 {
        (self.portion * u32::MAX as f32) as u32
    }
}

/// Sends [`Report`]s through [`Node::send_report`].
///
/// [`Node::send_report`]: ../config/trait.Node.html#tymethod.send_report
pub struct PeriodicReporter {
    config: ReportConfig,
    alarm: Option<AlarmId>,
    counter: u16,
}

impl PeriodicReporter {
    pub fn new(config: ReportConfig) -> Self {
        Self {
            config,
            alarm: None,
            counter: 0,
        }
    }

    /// Arms the report alarm `id`.
    ///
    /// The DAG root does not report, so nothing happens if `is_root` is set. Starting a running
    /// reporter has no effect either.
    ///
    /// Returns whether the reporter is running afterwards.
    pub fn start<A: Alarms>(&mut self, id: AlarmId, alarms: &mut A, is_root: bool) -> bool {
        if is_root {
            return false;
        }
        if self.alarm.is_some() {
            return true;
        }

        self.alarm = Some(id);
        alarms.schedule_in(id, self.config.period);
        debug!("periodic reports every {}", self.config.period);
        true
    }

    pub fn stop<A: Alarms>(&mut self, alarms: &mut A) {
        if let Some(id) = self.alarm.take() {
            alarms.cancel(id);
        }
    }

    pub fn is_running(&self) -> bool {
        self.alarm.is_some()
    }

    /// Number of report attempts so far.
    pub fn counter(&self) -> u16 {
        self.counter
    }

    /// Handles an alarm firing.
    ///
    /// Re-arms the alarm and, with the configured probability, sends a report carrying `ambr`.
    /// A failed send is not retried.
    ///
    /// Returns `false` if `id` is not the report alarm.
    pub fn alarm_fired<A, R, N>(
        &mut self,
        id: AlarmId,
        alarms: &mut A,
        rng: &mut R,
        node: &mut N,
        ambr: u16,
    ) -> bool
    where
        A: Alarms,
        R: RngCore + ?Sized,
        N: Node,
    {
        if self.alarm != Some(id) {
            return false;
        }
        alarms.schedule_in(id, self.config.period);

        if node.is_dag_root() || rng.next_u32() > self.config.threshold() {
            return true;
        }

        self.counter = self.counter.wrapping_add(1);
        let report = Report {
            counter: self.counter,
            ambr,
        };
        if let Ok(bytes) = report.to_array() {
            trace!("report {:?}", HexSlice(&bytes));
        }
        if let Err(e) = node.send_report(&report) {
            debug!("report {} not sent: {}", report.counter, e);
        }
        true
    }
}
