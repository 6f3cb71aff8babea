// Copyright 2025 HEM Sp. z o.o.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::time::Duration;

use crate::errors::BridgeError;

pub const DEFAULT_DISCOVERY_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_READ_ATTEMPTS: u32 = 10;
pub const DEFAULT_READ_TIMEOUT_PER_ATTEMPT_MS: u64 = 1000;

pub const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_millis(DEFAULT_DISCOVERY_TIMEOUT_MS);
pub const DEFAULT_READ_TIMEOUT_PER_ATTEMPT: Duration = Duration::from_millis(DEFAULT_READ_TIMEOUT_PER_ATTEMPT_MS);

/// Timing parameters used by discovery and by tag polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    pub discovery_timeout: Duration,
    pub read_attempts: u32,
    pub read_timeout_per_attempt: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            read_attempts: DEFAULT_READ_ATTEMPTS,
            read_timeout_per_attempt: DEFAULT_READ_TIMEOUT_PER_ATTEMPT,
        }
    }
}

impl BridgeConfig {
    /// Builds a config from millisecond values, validating the result.
    pub fn from_millis(discovery_timeout_ms: u64, read_attempts: u32, read_timeout_per_attempt_ms: u64) -> Result<Self, BridgeError> {
        let config = Self {
            discovery_timeout: Duration::from_millis(discovery_timeout_ms),
            read_attempts,
            read_timeout_per_attempt: Duration::from_millis(read_timeout_per_attempt_ms),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), BridgeError> {
        validate_deadline("discovery timeout", self.discovery_timeout)?;
        validate_attempts(self.read_attempts)?;
        validate_deadline("read timeout per attempt", self.read_timeout_per_attempt)
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            discovery_timeout_ms: whole_millis(self.discovery_timeout),
            read_attempts: self.read_attempts,
            read_timeout_per_attempt_ms: whole_millis(self.read_timeout_per_attempt),
        }
    }
}

/// Millisecond view of [`BridgeConfig`] as reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigSnapshot {
    pub discovery_timeout_ms: u64,
    pub read_attempts: u32,
    pub read_timeout_per_attempt_ms: u64,
}

/// Saturates at `u64::MAX` for durations too long to count in milliseconds.
fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Deadlines are whole milliseconds and must be at least one.
pub(crate) fn validate_deadline(name: &str, deadline: Duration) -> Result<(), BridgeError> {
    if deadline.as_millis() == 0 {
        return Err(BridgeError::InvalidConfig(format!("{name} must be a positive number of milliseconds")));
    }
    Ok(())
}

pub(crate) fn validate_attempts(attempts: u32) -> Result<(), BridgeError> {
    if attempts == 0 {
        return Err(BridgeError::InvalidConfig("read attempts must be at least 1".to_string()));
    }
    Ok(())
}
