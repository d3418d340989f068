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

//! Event Type Registry
//!
//! Maps event type tags to deserializers. The registry is built once at
//! startup and handed to the dispatcher as an immutable object - there is no
//! process-wide registration, which keeps the subsystem testable in
//! isolation.

use std::collections::HashMap;

use serde::de::DeserializeOwned;

use super::DomainEvent;

/// A function resolving a serialized payload into a concrete event.
pub type EventDeserializer =
    dyn Fn(&str) -> Result<Box<dyn DomainEvent>, serde_json::Error> + Send + Sync;

/// Registry of event type tags to deserializers.
///
/// # Example
///
/// ```rust,ignore
/// let mut registry = EventTypeRegistry::new();
/// registry.register::<ShiftLogged>("residency.shift-logged");
/// registry.register::<ProcedureRecorded>("residency.procedure-recorded");
/// let registry = Arc::new(registry); // frozen from here on
/// ```
#[derive(Default)]
pub struct EventTypeRegistry {
    deserializers: HashMap<String, Box<EventDeserializer>>,
}

impl EventTypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a deserializer for `event_type`, replacing any previous
    /// registration for the same tag.
    pub fn register<E>(&mut self, event_type: impl Into<String>)
    where
        E: DomainEvent + DeserializeOwned,
    {
        self.deserializers.insert(
            event_type.into(),
            Box::new(|payload: &str| {
                let event: E = serde_json::from_str(payload)?;
                Ok(Box::new(event) as Box<dyn DomainEvent>)
            }),
        );
    }

    /// Resolves the deserializer for an event type tag, if one is
    /// registered.
    pub fn resolve(&self, event_type: &str) -> Option<&EventDeserializer> {
        self.deserializers.get(event_type).map(|d| d.as_ref())
    }

    /// Whether a deserializer is registered for `event_type`.
    pub fn contains(&self, event_type: &str) -> bool {
        self.deserializers.contains_key(event_type)
    }

    /// The registered type tags, in no particular order.
    pub fn registered_types(&self) -> impl Iterator<Item = &str> {
        self.deserializers.keys().map(|k| k.as_str())
    }

    /// Number of registered event types.
    pub fn len(&self) -> usize {
        self.deserializers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deserializers.is_empty()
    }
}

impl std::fmt::Debug for EventTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTypeRegistry")
            .field("types", &self.deserializers.keys().collect::<Vec<_>>())
            .finish()
    }
}
