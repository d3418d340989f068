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

//! Domain events, the type registry, and the publisher seam.

pub mod publisher;
pub mod registry;

pub use publisher::{BoxError, EventPublisher, EventSubscriber, InProcessPublisher};
pub use registry::EventTypeRegistry;

use std::any::Any;

/// A materialized domain event, resolved from an outbox message's
/// `(event_type, payload)` pair.
///
/// The outbox core treats events as opaque: it resolves and delivers them,
/// but never inspects their contents. Subscribers downcast through
/// [`DomainEvent::as_any`] to recover the concrete type.
pub trait DomainEvent: std::fmt::Debug + Send + Sync + 'static {
    /// The string tag this event was registered under.
    fn event_type(&self) -> &str;

    /// Upcast for subscriber-side downcasting.
    fn as_any(&self) -> &dyn Any;
}
