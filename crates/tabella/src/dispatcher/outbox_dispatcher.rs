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

//! Outbox Dispatcher
//!
//! The dispatcher is a background loop, decoupled from request handling:
//! claim a batch, dispatch each message through the registry and publisher,
//! record all outcomes in one transactional write, sleep, repeat. One
//! failing message never blocks the rest of its batch, and no failure here
//! ever propagates back to the business caller whose transaction already
//! committed.
//!
//! Multiple dispatcher instances may run against the same store; the claim
//! query guarantees they partition the pending set.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dal::DAL;
use crate::dispatcher::DispatcherConfig;
use crate::error::{DispatchError, StoreError};
use crate::events::{DomainEvent, EventPublisher, EventTypeRegistry};
use crate::models::outbox_message::{MessageOutcome, OutboxMessage};

/// Background dispatcher for outbox messages.
pub struct OutboxDispatcher {
    dal: DAL,
    registry: Arc<EventTypeRegistry>,
    publisher: Arc<dyn EventPublisher>,
    config: DispatcherConfig,
}

impl OutboxDispatcher {
    /// Creates a new dispatcher.
    ///
    /// The registry and publisher are constructed by the caller at startup
    /// and are immutable from here on.
    pub fn new(
        dal: DAL,
        registry: Arc<EventTypeRegistry>,
        publisher: Arc<dyn EventPublisher>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            dal,
            registry,
            publisher,
            config,
        }
    }

    /// Spawns the dispatcher as a background task.
    ///
    /// Returns a handle that shuts the loop down gracefully: the dispatcher
    /// stops claiming new batches promptly but finishes the publish attempts
    /// of a batch it already claimed.
    pub fn spawn(self) -> DispatcherHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let join_handle = tokio::spawn(async move {
            self.run(shutdown_rx).await;
        });

        DispatcherHandle {
            shutdown_tx,
            join_handle,
        }
    }

    /// Runs the dispatch loop until a shutdown signal arrives.
    ///
    /// The shutdown receiver is only polled between cycles, so an in-flight
    /// batch always drains before the loop exits.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            poll_interval = ?self.config.poll_interval(),
            batch_size = self.config.batch_size(),
            max_retries = self.config.max_retries(),
            "Outbox dispatcher started"
        );

        loop {
            match self.process_cycle().await {
                Ok(0) => {}
                Ok(count) => {
                    debug!(count, "Outbox cycle drained batch");
                }
                Err(e) => {
                    // Store unavailability is a skipped cycle, never a crash.
                    error!(error = %e, "Outbox cycle failed; waiting for next poll");
                }
            }

            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Outbox dispatcher shutdown requested");
                    break;
                }
                _ = tokio::time::sleep(self.config.poll_interval()) => {}
            }
        }

        info!("Outbox dispatcher stopped");
    }

    /// Claims and dispatches one batch, then records all outcomes in a
    /// single transactional write. Returns the number of messages claimed.
    ///
    /// Public so deployments embedding their own scheduling (and tests) can
    /// drive cycles deterministically.
    pub async fn process_cycle(&self) -> Result<usize, StoreError> {
        let batch = self
            .dal
            .outbox()
            .claim_batch(
                self.config.batch_size(),
                self.config.max_retries(),
                self.config.claim_lease(),
            )
            .await?;

        if batch.is_empty() {
            return Ok(0);
        }

        debug!(count = batch.len(), "Claimed outbox batch");

        let mut outcomes = Vec::with_capacity(batch.len());
        for message in &batch {
            match self.dispatch_message(message).await {
                Ok(()) => {
                    debug!(message_id = %message.id, event_type = %message.event_type,
                        "Outbox message delivered");
                    outcomes.push(MessageOutcome::Processed(message.id));
                }
                Err(e) => {
                    warn!(message_id = %message.id, event_type = %message.event_type,
                        retry_count = message.retry_count, error = %e,
                        "Outbox message dispatch failed");
                    outcomes.push(MessageOutcome::Failed(message.id, e.to_string()));
                }
            }
        }

        self.dal.outbox().record_outcomes(&outcomes).await?;

        Ok(batch.len())
    }

    /// Resolves, deserializes and publishes one message.
    ///
    /// Every failure mode lands in the same place: a [`DispatchError`] whose
    /// rendering becomes the message's `last_error`. Unknown event types
    /// consume retry attempts like any other failure and age out where an
    /// operator can see them.
    async fn dispatch_message(&self, message: &OutboxMessage) -> Result<(), DispatchError> {
        let deserializer = self.registry.resolve(&message.event_type).ok_or_else(|| {
            DispatchError::UnknownEventType {
                event_type: message.event_type.clone(),
            }
        })?;

        let event =
            deserializer(&message.payload).map_err(|source| DispatchError::Deserialization {
                event_type: message.event_type.clone(),
                source,
            })?;
        let event: Arc<dyn DomainEvent> = Arc::from(event);

        match tokio::time::timeout(self.config.publish_timeout(), self.publisher.publish(event))
            .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(DispatchError::Publish(e)),
            Err(_) => Err(DispatchError::PublishTimeout {
                timeout: self.config.publish_timeout(),
            }),
        }
    }
}

/// Handle to a spawned dispatcher.
pub struct DispatcherHandle {
    shutdown_tx: broadcast::Sender<()>,
    join_handle: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Signals shutdown and waits for the loop to drain its in-flight batch
    /// and exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.join_handle.await {
            error!(error = %e, "Outbox dispatcher task failed to join");
        }
    }

    /// Whether the background task has already exited.
    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }
}
