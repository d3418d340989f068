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

//! Event Publisher
//!
//! Delivers materialized events to whatever is registered for their type.
//! The [`EventPublisher`] trait is the seam where an external broker adapter
//! could replace in-process fan-out without changing the outbox contract:
//! the dispatcher only knows "publish succeeded or failed".

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::debug;

use super::DomainEvent;
use crate::error::PublishError;

/// Boxed error type subscribers report failures with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An in-process consumer of domain events.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Subscriber name, used in aggregated failure summaries.
    fn name(&self) -> &str;

    /// Handles one event. Subscribers must be idempotent: delivery is
    /// at-least-once, and a message that fails part-way is redelivered.
    async fn handle(&self, event: Arc<dyn DomainEvent>) -> Result<(), BoxError>;
}

/// Delivery seam between the dispatcher and event consumers.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Delivers one event. An error here is recorded against the message and
    /// consumes a retry attempt.
    async fn publish(&self, event: Arc<dyn DomainEvent>) -> Result<(), PublishError>;
}

/// In-process fan-out publisher.
///
/// Subscribers are registered per event type before the publisher is handed
/// to the dispatcher. Every subscriber is attempted on each publish; their
/// failures are aggregated into a single [`PublishError`] so the dispatcher
/// records one outcome per message.
#[derive(Default)]
pub struct InProcessPublisher {
    subscribers: HashMap<String, Vec<Arc<dyn EventSubscriber>>>,
}

impl InProcessPublisher {
    /// Creates a publisher with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber for an event type.
    pub fn subscribe(&mut self, event_type: impl Into<String>, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers
            .entry(event_type.into())
            .or_default()
            .push(subscriber);
    }

    /// Number of subscribers registered for an event type.
    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.subscribers.get(event_type).map_or(0, Vec::len)
    }
}

impl std::fmt::Debug for InProcessPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<_> = self
            .subscribers
            .iter()
            .map(|(k, v)| (k.as_str(), v.len()))
            .collect();
        types.sort();
        f.debug_struct("InProcessPublisher")
            .field("subscribers", &types)
            .finish()
    }
}

#[async_trait]
impl EventPublisher for InProcessPublisher {
    async fn publish(&self, event: Arc<dyn DomainEvent>) -> Result<(), PublishError> {
        let subscribers = match self.subscribers.get(event.event_type()) {
            Some(subscribers) => subscribers,
            None => {
                // No subscribers is a successful delivery to nobody, not an
                // error: absence of consumers must not poison the message.
                debug!(event_type = %event.event_type(), "No subscribers registered");
                return Ok(());
            }
        };

        let results = join_all(subscribers.iter().map(|subscriber| {
            let event = event.clone();
            async move { (subscriber.name().to_string(), subscriber.handle(event).await) }
        }))
        .await;

        let failures: Vec<String> = results
            .into_iter()
            .filter_map(|(name, result)| result.err().map(|e| format!("{}: {}", name, e)))
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PublishError {
                event_type: event.event_type().to_string(),
                failed: failures.len(),
                total: subscribers.len(),
                details: failures.join("; "),
            })
        }
    }
}
