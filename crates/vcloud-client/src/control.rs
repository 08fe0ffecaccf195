//! Polling and retry settings with their defaults

use std::time::Duration;
use vcloud_config::ControlSettings;

/// Resolved control settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control {
    /// Seconds
    pub wait_max: u64,
    /// Seconds
    pub wait_delay: u64,
    pub retry_max: u32,
    /// Milliseconds
    pub retry_delay: u64,
    /// Seconds
    pub cookie_timeout: u64,
}

impl Control {
    pub const WAIT_MAX: u64 = 300;
    pub const WAIT_DELAY: u64 = 5;
    pub const RETRY_MAX: u32 = 3;
    pub const RETRY_DELAY: u64 = 100;
    pub const COOKIE_TIMEOUT: u64 = 1500;

    /// Each missing field falls back to its own default
    pub fn from_settings(control: &ControlSettings) -> Self {
        Self {
            wait_max: control.wait_max.unwrap_or(Self::WAIT_MAX),
            wait_delay: control.wait_delay.unwrap_or(Self::WAIT_DELAY),
            retry_max: control.retry_max.unwrap_or(Self::RETRY_MAX),
            retry_delay: control.retry_delay.unwrap_or(Self::RETRY_DELAY),
            cookie_timeout: control.cookie_timeout.unwrap_or(Self::COOKIE_TIMEOUT),
        }
    }

    pub fn wait_max(&self) -> Duration {
        Duration::from_secs(self.wait_max)
    }

    pub fn wait_delay(&self) -> Duration {
        Duration::from_secs(self.wait_delay)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay)
    }

    pub fn cookie_timeout(&self) -> Duration {
        Duration::from_secs(self.cookie_timeout)
    }
}

impl Default for Control {
    fn default() -> Self {
        Self::from_settings(&ControlSettings::default())
    }
}
