//! Timing utilities for QuizWire
//!
//! Implements the Bayeux timesync extension. Each inbound envelope carrying
//! timesync data yields a latency/offset estimate that is reported back to
//! the server on the response envelope.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::envelope::TimeSync;

/// Timestamp type (Unix milliseconds)
pub type Millis = i64;

/// Get current Unix timestamp in milliseconds
pub fn now_millis() -> Millis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as Millis
}

/// Clock synchronization state
#[derive(Debug, Clone, Default)]
pub struct ClockSync {
    /// Latest one-way latency estimate (milliseconds)
    latency: f64,
    /// Latest server clock offset estimate (milliseconds)
    offset: f64,
    /// Number of sync samples
    samples: u32,
}

impl ClockSync {
    /// Create a new clock sync instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Estimate latency and offset for one exchange
    ///
    /// # Arguments
    /// * `tc` - Client send time of the request being answered
    /// * `ts` - Server timestamp
    /// * `p` - Server processing delay
    /// * `now` - Client receive time
    ///
    /// Inputs come from the server, so the arithmetic runs in `f64` and
    /// cannot overflow.
    pub fn estimate(tc: Millis, ts: Millis, p: Millis, now: Millis) -> (f64, f64) {
        let (tc, ts, p, now) = (tc as f64, ts as f64, p as f64, now as f64);
        let latency = (now - tc - p) / 2.0;
        let offset = ts - tc - latency;
        (latency, offset)
    }

    /// Process inbound timesync data and build the fields for the reply
    ///
    /// Absent inbound fields count as zero.
    pub fn sample(&mut self, inbound: &TimeSync, now: Millis) -> TimeSync {
        let (latency, offset) = Self::estimate(
            inbound.tc.unwrap_or(0),
            inbound.ts.unwrap_or(0),
            inbound.p.unwrap_or(0),
            now,
        );

        self.latency = latency;
        self.offset = offset;
        self.samples += 1;

        TimeSync {
            tc: Some(now),
            l: Some(latency),
            o: Some(offset),
            ..Default::default()
        }
    }

    /// Get current latency estimate
    pub fn latency(&self) -> f64 {
        self.latency
    }

    /// Get current offset estimate
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Number of exchanges processed
    pub fn samples(&self) -> u32 {
        self.samples
    }
}
