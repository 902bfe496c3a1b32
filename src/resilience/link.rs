//! Broker connect supervisor.
//!
//! Spaces connect attempts by a retry interval and counts consecutive
//! failures.  The counter resets on success; reaching the limit is reported
//! once and also resets it.

use log::{info, warn};

use crate::config::PanelSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectStep {
    Connected,
    /// Attempt failed; `failures` consecutive so far.
    Failed { failures: u8 },
    /// The failure limit was reached by this attempt.
    LimitReached,
}

#[derive(Debug, Clone)]
pub struct ConnectSupervisor {
    retry_interval_ms: u32,
    failure_limit: u8,
    failures: u8,
    last_attempt_ms: Option<u32>,
}

impl ConnectSupervisor {
    pub fn new(retry_interval_ms: u32, failure_limit: u8) -> Self {
        Self {
            retry_interval_ms,
            failure_limit: failure_limit.max(1),
            failures: 0,
            last_attempt_ms: None,
        }
    }

    pub fn from_settings(settings: &PanelSettings) -> Self {
        Self::new(
            settings.connect_retry_interval_ms,
            settings.connect_failure_limit,
        )
    }

    /// The first attempt is due immediately, later ones once per interval.
    pub fn attempt_due(&self, now_ms: u32) -> bool {
        self.last_attempt_ms
            .is_none_or(|last| now_ms.wrapping_sub(last) >= self.retry_interval_ms)
    }

    pub fn record(&mut self, now_ms: u32, success: bool) -> ConnectStep {
        self.last_attempt_ms = Some(now_ms);
        if success {
            if self.failures > 0 {
                info!("LINK | connected after {} failed attempts", self.failures);
            } else {
                info!("LINK | connected");
            }
            self.failures = 0;
            return ConnectStep::Connected;
        }

        self.failures = self.failures.saturating_add(1);
        if self.failures >= self.failure_limit {
            warn!("LINK | {} consecutive connect failures", self.failures);
            self.failures = 0;
            ConnectStep::LimitReached
        } else {
            warn!(
                "LINK | connect failed ({}/{})",
                self.failures, self.failure_limit
            );
            ConnectStep::Failed {
                failures: self.failures,
            }
        }
    }

    pub fn failures(&self) -> u8 {
        self.failures
    }
}
