//! Typed publish/subscribe registry keyed by [`EventName`].
//!
//! Callbacks run on the socket's background task, after the mirror has
//! been updated, in the order they were registered. The registry lock is
//! released before any callback runs, so a callback may subscribe or
//! unsubscribe without deadlocking.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::event::{EventName, GameEvent};

/// A registered event callback.
pub type Callback = Arc<dyn Fn(&GameEvent) + Send + Sync>;

type Registry = BTreeMap<EventName, Vec<(u64, Callback)>>;

/// Per-event-name callback lists.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    registry: Mutex<Registry>,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `callback` for `name`.
    ///
    /// The returned [`Subscription`] removes the callback when
    /// [`unsubscribe`](Subscription::unsubscribe) is called. Dropping it
    /// keeps the callback registered.
    pub fn subscribe<F>(self: &Arc<Self>, name: EventName, callback: F) -> Subscription
    where
        F: Fn(&GameEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock()
            .entry(name)
            .or_default()
            .push((id, Arc::new(callback)));
        tracing::debug!(event = %name, id, "callback registered");
        Subscription {
            bus: Arc::downgrade(self),
            name,
            id,
        }
    }

    /// Invoke every callback registered for the event's name.
    ///
    /// Returns how many callbacks ran. A callback that panics is logged and
    /// skipped; the remaining callbacks still run.
    pub fn publish(&self, event: &GameEvent) -> usize {
        let callbacks: Vec<Callback> = self
            .lock()
            .get(&event.name())
            .map(|entries| entries.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();
        for callback in &callbacks {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                tracing::error!(event = %event.name(), "event callback panicked");
            }
        }
        callbacks.len()
    }

    /// Number of callbacks currently registered for `name`.
    pub fn subscriber_count(&self, name: EventName) -> usize {
        self.lock().get(&name).map_or(0, Vec::len)
    }

    fn remove(&self, name: EventName, id: u64) -> bool {
        let mut registry = self.lock();
        let Some(entries) = registry.get_mut(&name) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        before != entries.len()
    }

    // A panicking callback never runs with the lock held, so the data
    // behind a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: BTreeMap<EventName, usize> = self
            .lock()
            .iter()
            .map(|(name, entries)| (*name, entries.len()))
            .collect();
        f.debug_struct("EventBus").field("callbacks", &counts).finish()
    }
}

/// Handle to a registered callback.
#[derive(Debug)]
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    bus: Weak<EventBus>,
    name: EventName,
    id: u64,
}

impl Subscription {
    /// The event this subscription listens to.
    pub fn event(&self) -> EventName {
        self.name
    }

    /// Remove the callback. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        match self.bus.upgrade() {
            Some(bus) => bus.remove(self.name, self.id),
            None => false,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::event::TimerPayload;

    fn tick(time: i64) -> GameEvent {
        GameEvent::TimerUpdate(TimerPayload {
            time,
            ..Default::default()
        })
    }

    #[test]
    fn callbacks_run_in_registration_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            let _ = bus.subscribe(EventName::TimerUpdate, move |_| {
                log.lock().unwrap().push(label);
            });
        }

        assert_eq!(bus.publish(&tick(3)), 3);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn panicking_callback_does_not_stop_the_rest() {
        let bus = EventBus::new();
        let _ = bus.subscribe(EventName::TimerUpdate, |_| panic!("subscriber bug"));
        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);
        let _ = bus.subscribe(EventName::TimerUpdate, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.publish(&tick(2)), 2);
        assert_eq!(bus.publish(&tick(1)), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn only_matching_name_is_invoked() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&hits);
        let _ = bus.subscribe(EventName::ChoiceTimerUpdate, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(bus.publish(&tick(1)), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn callbacks_receive_the_payload() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&seen);
        let _ = bus.subscribe(EventName::TimerUpdate, move |event| {
            if let GameEvent::TimerUpdate(timer) = event {
                *slot.lock().unwrap() = Some(timer.time);
            }
        });
        bus.publish(&tick(8));
        assert_eq!(*seen.lock().unwrap(), Some(8));
    }

    #[test]
    fn unsubscribe_removes_only_that_callback() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let first_log = Arc::clone(&log);
        let first = bus.subscribe(EventName::TimerUpdate, move |_| {
            first_log.lock().unwrap().push("first");
        });
        let second_log = Arc::clone(&log);
        let _second = bus.subscribe(EventName::TimerUpdate, move |_| {
            second_log.lock().unwrap().push("second");
        });

        assert_eq!(first.event(), EventName::TimerUpdate);
        assert!(first.unsubscribe());
        assert_eq!(bus.subscriber_count(EventName::TimerUpdate), 1);

        bus.publish(&tick(1));
        assert_eq!(*log.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn unsubscribe_after_bus_dropped_is_harmless() {
        let bus = EventBus::new();
        let sub = bus.subscribe(EventName::GameFinished, |_| {});
        drop(bus);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn callback_may_subscribe_during_publish() {
        let bus = EventBus::new();
        let inner_bus = Arc::clone(&bus);
        let _ = bus.subscribe(EventName::TimerUpdate, move |_| {
            let _ = inner_bus.subscribe(EventName::GameFinished, |_| {});
        });

        bus.publish(&tick(2));
        assert_eq!(bus.subscriber_count(EventName::GameFinished), 1);
    }
}
