/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Configuration types for the outbox dispatcher.
//!
//! The retry ceiling, poll interval and friends are externally supplied
//! values, not constants baked into the loop.

use std::time::Duration;

/// Configuration for the outbox dispatcher.
///
/// # Construction
///
/// Use [`DispatcherConfig::builder()`]:
///
/// ```rust,ignore
/// let config = DispatcherConfig::builder()
///     .poll_interval(Duration::from_millis(500))
///     .batch_size(25)
///     .max_retries(5)
///     .build();
/// ```
///
/// Or use the default configuration:
///
/// ```rust,ignore
/// let config = DispatcherConfig::default();
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct DispatcherConfig {
    poll_interval: Duration,
    batch_size: usize,
    max_retries: i32,
    publish_timeout: Duration,
    claim_lease: Duration,
}

impl DispatcherConfig {
    /// Creates a new configuration builder with default values.
    pub fn builder() -> DispatcherConfigBuilder {
        DispatcherConfigBuilder::default()
    }

    /// How long the dispatcher sleeps between cycles.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Maximum number of messages claimed per cycle.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Failed delivery attempts after which a message stops being claimed.
    /// Exhausted messages stay in the table for inspection.
    pub fn max_retries(&self) -> i32 {
        self.max_retries
    }

    /// Upper bound on a single publish call. A publish that exceeds this is
    /// treated as a failed attempt, not left claimed indefinitely.
    pub fn publish_timeout(&self) -> Duration {
        self.publish_timeout
    }

    /// How long a claim shields a message from other dispatchers. A crash
    /// between claim and outcome makes the message claimable again once the
    /// lease expires.
    pub fn claim_lease(&self) -> Duration {
        self.claim_lease
    }
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        DispatcherConfigBuilder::default().build()
    }
}

/// Builder for [`DispatcherConfig`].
#[derive(Debug, Clone)]
pub struct DispatcherConfigBuilder {
    config: DispatcherConfig,
}

impl Default for DispatcherConfigBuilder {
    fn default() -> Self {
        Self {
            config: DispatcherConfig {
                poll_interval: Duration::from_secs(1),
                batch_size: 10,
                max_retries: 3,
                publish_timeout: Duration::from_secs(30),
                claim_lease: Duration::from_secs(300),
            },
        }
    }
}

impl DispatcherConfigBuilder {
    /// Sets the poll interval.
    pub fn poll_interval(mut self, value: Duration) -> Self {
        self.config.poll_interval = value;
        self
    }

    /// Sets the claim batch size.
    pub fn batch_size(mut self, value: usize) -> Self {
        self.config.batch_size = value;
        self
    }

    /// Sets the retry ceiling.
    pub fn max_retries(mut self, value: i32) -> Self {
        self.config.max_retries = value;
        self
    }

    /// Sets the publish timeout.
    pub fn publish_timeout(mut self, value: Duration) -> Self {
        self.config.publish_timeout = value;
        self
    }

    /// Sets the claim lease.
    pub fn claim_lease(mut self, value: Duration) -> Self {
        self.config.claim_lease = value;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> DispatcherConfig {
        self.config
    }
}
