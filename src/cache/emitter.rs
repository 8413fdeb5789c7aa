//! Emitter Module
//!
//! Typed publish/subscribe bus for cache lifecycle events. Listeners are
//! registered per event type or on the wildcard topic. There is no replay:
//! a listener only sees events emitted after it was attached.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::cache::clock::current_timestamp_ms;

// == Event Type ==
/// Discriminant of a `CacheEvent`, used as a subscription topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    CacheHit,
    CacheMiss,
    CacheStale,
    CacheExpired,
    CacheGetFailed,
    CacheSetFailed,
    CacheRemoveFailed,
    CacheUpdated,
    CacheInFlight,
    CacheInFlightSettled,
    Invoke,
    Revalidate,
    RevalidateFailed,
}

// == Cache Event ==
/// Payload of each lifecycle event. `cache_key` is always the normalized key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheEvent {
    CacheHit {
        cache_key: String,
        cached_value: Value,
    },
    CacheMiss {
        cache_key: String,
    },
    CacheStale {
        cache_key: String,
        cached_value: Value,
        cached_age: i64,
    },
    CacheExpired {
        cache_key: String,
        cached_value: Value,
        cached_age: i64,
        cached_at: i64,
        max_time_to_live: Option<u64>,
    },
    CacheGetFailed {
        cache_key: String,
        error: String,
    },
    CacheSetFailed {
        cache_key: String,
        error: String,
    },
    CacheRemoveFailed {
        cache_key: String,
        error: String,
    },
    CacheUpdated {
        cache_key: String,
        cache_value: Value,
    },
    CacheInFlight {
        cache_key: String,
    },
    CacheInFlightSettled {
        cache_key: String,
    },
    Invoke {
        cache_key: String,
    },
    Revalidate {
        cache_key: String,
    },
    RevalidateFailed {
        cache_key: String,
        error: String,
    },
}

impl CacheEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            CacheEvent::CacheHit { .. } => EventType::CacheHit,
            CacheEvent::CacheMiss { .. } => EventType::CacheMiss,
            CacheEvent::CacheStale { .. } => EventType::CacheStale,
            CacheEvent::CacheExpired { .. } => EventType::CacheExpired,
            CacheEvent::CacheGetFailed { .. } => EventType::CacheGetFailed,
            CacheEvent::CacheSetFailed { .. } => EventType::CacheSetFailed,
            CacheEvent::CacheRemoveFailed { .. } => EventType::CacheRemoveFailed,
            CacheEvent::CacheUpdated { .. } => EventType::CacheUpdated,
            CacheEvent::CacheInFlight { .. } => EventType::CacheInFlight,
            CacheEvent::CacheInFlightSettled { .. } => EventType::CacheInFlightSettled,
            CacheEvent::Invoke { .. } => EventType::Invoke,
            CacheEvent::Revalidate { .. } => EventType::Revalidate,
            CacheEvent::RevalidateFailed { .. } => EventType::RevalidateFailed,
        }
    }

    /// Normalized key the event concerns.
    pub fn cache_key(&self) -> &str {
        match self {
            CacheEvent::CacheHit { cache_key, .. }
            | CacheEvent::CacheMiss { cache_key }
            | CacheEvent::CacheStale { cache_key, .. }
            | CacheEvent::CacheExpired { cache_key, .. }
            | CacheEvent::CacheGetFailed { cache_key, .. }
            | CacheEvent::CacheSetFailed { cache_key, .. }
            | CacheEvent::CacheRemoveFailed { cache_key, .. }
            | CacheEvent::CacheUpdated { cache_key, .. }
            | CacheEvent::CacheInFlight { cache_key }
            | CacheEvent::CacheInFlightSettled { cache_key }
            | CacheEvent::Invoke { cache_key }
            | CacheEvent::Revalidate { cache_key }
            | CacheEvent::RevalidateFailed { cache_key, .. } => cache_key,
        }
    }
}

// == Envelope ==
/// What listeners receive: the event plus where and when it was emitted.
#[derive(Debug, Clone, Serialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub payload: CacheEvent,
    pub source: String,
    /// Emission time (Unix milliseconds)
    pub timestamp: i64,
}

// == Topic ==
/// Subscription target: one event type or every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Event(EventType),
    All,
}

impl From<EventType> for Topic {
    fn from(event_type: EventType) -> Self {
        Topic::Event(event_type)
    }
}

/// Identifier handed out on subscription, used by `Emitter::off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Arc<dyn Fn(&EventEnvelope) + Send + Sync>;

type ListenerMap = HashMap<Topic, Vec<(ListenerId, Listener)>>;

#[derive(Default)]
struct Registry {
    listeners: Mutex<ListenerMap>,
    next_id: AtomicU64,
}

impl Registry {
    fn remove(&self, topic: Topic, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let Some(entries) = listeners.get_mut(&topic) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(&topic);
        }
        removed
    }
}

// == Emitter ==
/// Cloneable handle to a shared listener registry.
#[derive(Clone)]
pub struct Emitter {
    registry: Arc<Registry>,
    source: Arc<str>,
}

impl fmt::Debug for Emitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("source", &self.source)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl Emitter {
    // == Constructor ==
    /// Creates an emitter whose envelopes carry `source`.
    pub fn new(source: impl Into<String>) -> Self {
        let source: String = source.into();
        Self {
            registry: Arc::new(Registry::default()),
            source: source.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    // == Emit ==
    /// Notifies listeners of the exact type, then wildcard listeners.
    ///
    /// Listeners run synchronously on the emitting task, outside the registry
    /// lock, so they may subscribe or unsubscribe from within the callback.
    pub fn emit(&self, event: CacheEvent) {
        let envelope = EventEnvelope {
            event_type: event.event_type(),
            payload: event,
            source: self.source.to_string(),
            timestamp: current_timestamp_ms(),
        };

        let targets: Vec<Listener> = {
            let listeners = self.registry.listeners.lock();
            let exact = listeners.get(&Topic::Event(envelope.event_type));
            let wildcard = listeners.get(&Topic::All);
            exact
                .into_iter()
                .chain(wildcard)
                .flat_map(|entries| entries.iter().map(|(_, listener)| listener.clone()))
                .collect()
        };

        for listener in targets {
            listener(&envelope);
        }
    }

    // == On ==
    /// Registers a listener; the returned handle unsubscribes it.
    pub fn on<F>(&self, topic: impl Into<Topic>, listener: F) -> Subscription
    where
        F: Fn(&EventEnvelope) + Send + Sync + 'static,
    {
        self.register(topic.into(), Arc::new(listener))
    }

    // == Off ==
    /// Removes a listener. Returns false if it was not registered.
    pub fn off(&self, topic: impl Into<Topic>, id: ListenerId) -> bool {
        self.registry.remove(topic.into(), id)
    }

    // == Once ==
    /// Registers a listener that is removed after its first invocation.
    pub fn once<F>(&self, topic: impl Into<Topic>, listener: F) -> Subscription
    where
        F: Fn(&EventEnvelope) + Send + Sync + 'static,
    {
        let topic = topic.into();
        let id = self.next_id();
        let fired = AtomicBool::new(false);
        let registry = Arc::downgrade(&self.registry);

        let wrapper: Listener = Arc::new(move |envelope: &EventEnvelope| {
            if fired.swap(true, Ordering::SeqCst) {
                return;
            }
            if let Some(registry) = registry.upgrade() {
                registry.remove(topic, id);
            }
            listener(envelope);
        });

        self.insert(topic, id, wrapper)
    }

    /// Total number of registered listeners across all topics.
    pub fn listener_count(&self) -> usize {
        self.registry.listeners.lock().values().map(Vec::len).sum()
    }

    fn register(&self, topic: Topic, listener: Listener) -> Subscription {
        let id = self.next_id();
        self.insert(topic, id, listener)
    }

    fn insert(&self, topic: Topic, id: ListenerId, listener: Listener) -> Subscription {
        self.registry
            .listeners
            .lock()
            .entry(topic)
            .or_default()
            .push((id, listener));

        Subscription {
            registry: Arc::downgrade(&self.registry),
            topic,
            id,
        }
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.registry.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

// == Subscription ==
/// Handle to a registered listener. Dropping it does NOT unsubscribe.
#[derive(Debug, Clone)]
pub struct Subscription {
    registry: Weak<Registry>,
    topic: Topic,
    id: ListenerId,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Removes the listener. Returns false if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.remove(self.topic, self.id))
    }
}
