//! Named-event hubs and cross-object subscriptions.
//!
//! An [`EventHub`] is the observer primitive every Lateralus node is built on:
//! listeners register for a named event and are invoked synchronously, in
//! registration order, when that event is triggered.
//!
//! # Key Types
//!
//! - [`EventHub`] - A cloneable handle to a set of named-event listeners
//! - [`Event`] - The payload delivered to listeners
//! - [`Collector`] - Result accumulator carried by provider requests
//! - [`ListenerId`] - Identifies a registration for [`EventHub::off`]
//! - [`Subscriptions`] - `listenTo`/`stopListening` bookkeeping of a subscriber
//! - [`ListenerGuard`] - RAII registration that removes itself on drop
//!
//! # Re-entrancy
//!
//! [`EventHub::trigger`] snapshots the listeners for the event before invoking
//! any of them and never holds its lock while user code runs. A listener may
//! therefore register or remove listeners (including itself) on the same hub.
//! Listeners removed during a dispatch are skipped if they have not run yet;
//! listeners added during a dispatch are not invoked by it.
//!
//! # Example
//!
//! ```
//! use lateralus_core::{Event, EventHub};
//!
//! let hub = EventHub::new();
//! let id = hub.on("saved", |event| {
//!     println!("saved with {} args", event.args().len());
//!     Ok(())
//! });
//!
//! hub.trigger(&Event::new("saved", vec![serde_json::json!(1)])).unwrap();
//! assert!(hub.off(id));
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use slotmap::{new_key_type, SlotMap};

use crate::error::{HubError, Result};

new_key_type! {
    /// A unique identifier for a listener registration.
    ///
    /// Returned by [`EventHub::on`] and [`Subscriptions::listen_to`]; pass it
    /// to [`EventHub::off`] to remove the listener.
    pub struct ListenerId;
}

/// Callback invoked for a triggered event.
pub type Callback = Arc<dyn Fn(&Event) -> Result<()> + Send + Sync>;

/// Accumulates provider results for a single `collect` request.
///
/// `None` entries stand for providers that produced no value; they are
/// dropped by [`Collector::into_values`]. Falsy JSON values (`false`, `0`,
/// `null`) are real results and are kept.
#[derive(Clone, Default)]
pub struct Collector {
    values: Arc<Mutex<Vec<Option<Value>>>>,
}

impl Collector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one provider result.
    pub fn push(&self, value: Option<Value>) {
        self.values.lock().push(value);
    }

    /// Number of providers that answered, including those without a value.
    pub fn responses(&self) -> usize {
        self.values.lock().len()
    }

    /// The collected values in provider order, with absent results removed.
    pub fn into_values(self) -> Vec<Value> {
        let values = std::mem::take(&mut *self.values.lock());
        values.into_iter().flatten().collect()
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("responses", &self.responses())
            .finish()
    }
}

/// An event delivered to listeners.
#[derive(Clone, Debug)]
pub struct Event {
    name: String,
    args: Vec<Value>,
    collector: Option<Collector>,
}

impl Event {
    /// Create an event with the given name and arguments.
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
            collector: None,
        }
    }

    /// Create an event that carries a result accumulator.
    pub fn with_collector(name: impl Into<String>, args: Vec<Value>, collector: Collector) -> Self {
        Self {
            name: name.into(),
            args,
            collector: Some(collector),
        }
    }

    /// The event name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The event arguments.
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// The argument at `index`, if any.
    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    /// The result accumulator, for provider requests.
    pub fn collector(&self) -> Option<&Collector> {
        self.collector.as_ref()
    }
}

/// Internal storage for a single listener.
struct Listener {
    event: String,
    /// Registration order; slot reuse in the slotmap does not preserve it.
    seq: u64,
    callback: Callback,
}

struct HubInner {
    listeners: Mutex<SlotMap<ListenerId, Listener>>,
    next_seq: AtomicU64,
    blocked: AtomicBool,
}

/// A set of named-event listeners.
///
/// `EventHub` is a cheap, cloneable handle; clones share the same listeners.
/// Nodes own one hub each, and a stand-alone hub can represent any external
/// event source that should be folded into the component tree (see
/// `Node::amplify` in the `lateralus` crate).
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    /// Create a hub with no listeners.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                listeners: Mutex::new(SlotMap::with_key()),
                next_seq: AtomicU64::new(0),
                blocked: AtomicBool::new(false),
            }),
        }
    }

    /// Register a listener for `event`.
    pub fn on<F>(&self, event: impl Into<String>, callback: F) -> ListenerId
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        self.on_callback(event, Arc::new(callback))
    }

    /// Register an already shared callback for `event`.
    pub fn on_callback(&self, event: impl Into<String>, callback: Callback) -> ListenerId {
        let event = event.into();
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(target: "lateralus::hub", event = %event, seq, "listener registered");
        self.inner.listeners.lock().insert(Listener {
            event,
            seq,
            callback,
        })
    }

    /// Register a listener that is removed when the returned guard drops.
    pub fn on_scoped<F>(&self, event: impl Into<String>, callback: F) -> ListenerGuard
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        let id = self.on(event, callback);
        ListenerGuard {
            hub: self.downgrade(),
            id,
        }
    }

    /// Remove a listener. Returns `true` if it was registered.
    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.listeners.lock().remove(id).is_some()
    }

    /// Remove every listener.
    pub fn off_all(&self) {
        self.inner.listeners.lock().clear();
    }

    /// Whether the listener is still registered.
    pub fn is_listening(&self, id: ListenerId) -> bool {
        self.inner.listeners.lock().contains_key(id)
    }

    /// Total number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    /// Number of listeners registered for `event`.
    pub fn listener_count_for(&self, event: &str) -> usize {
        self.inner
            .listeners
            .lock()
            .values()
            .filter(|l| l.event == event)
            .count()
    }

    /// Block or unblock dispatch. A blocked hub ignores `trigger`.
    pub fn set_blocked(&self, blocked: bool) {
        self.inner.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Whether dispatch is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.inner.blocked.load(Ordering::SeqCst)
    }

    /// Invoke every listener registered for the event, in registration order.
    ///
    /// The first listener error aborts the dispatch and is returned.
    pub fn trigger(&self, event: &Event) -> Result<()> {
        if self.is_blocked() {
            tracing::trace!(target: "lateralus::hub", event = event.name(), "hub blocked, skipping trigger");
            return Ok(());
        }

        let mut snapshot: Vec<(u64, ListenerId, Callback)> = {
            let listeners = self.inner.listeners.lock();
            listeners
                .iter()
                .filter(|(_, l)| l.event == event.name())
                .map(|(id, l)| (l.seq, id, l.callback.clone()))
                .collect()
        };
        snapshot.sort_by_key(|(seq, _, _)| *seq);
        tracing::trace!(target: "lateralus::hub", event = event.name(), listener_count = snapshot.len(), "triggering event");

        for (_, id, callback) in snapshot {
            if !self.is_listening(id) {
                continue;
            }
            callback(event)?;
        }
        Ok(())
    }

    /// Create a weak reference to this hub.
    pub fn downgrade(&self) -> WeakHub {
        WeakHub {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same hub.
    pub fn ptr_eq(&self, other: &EventHub) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("listeners", &self.listener_count())
            .field("blocked", &self.is_blocked())
            .finish()
    }
}

/// A weak reference to an [`EventHub`].
#[derive(Clone)]
pub struct WeakHub {
    inner: Weak<HubInner>,
}

impl WeakHub {
    /// Upgrade to a strong handle if the hub is still alive.
    pub fn upgrade(&self) -> Option<EventHub> {
        self.inner.upgrade().map(|inner| EventHub { inner })
    }
}

/// Anything that exposes an [`EventHub`] to subscribe to.
pub trait Emitter {
    /// The hub that carries this emitter's events.
    fn event_hub(&self) -> Result<EventHub>;
}

impl Emitter for EventHub {
    fn event_hub(&self) -> Result<EventHub> {
        Ok(self.clone())
    }
}

impl Emitter for WeakHub {
    fn event_hub(&self) -> Result<EventHub> {
        self.upgrade().ok_or_else(|| HubError::Dropped.into())
    }
}

/// Listener registration that is removed when dropped.
pub struct ListenerGuard {
    hub: WeakHub,
    id: ListenerId,
}

impl ListenerGuard {
    /// The guarded registration.
    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.off(self.id);
        }
    }
}

/// The registrations a subscriber made on other hubs.
///
/// This is the `listenTo`/`stopListening` half of the observer contract: the
/// subscriber, not the source, remembers what it registered so everything
/// can be removed in one call when the subscriber goes away.
#[derive(Default)]
pub struct Subscriptions {
    entries: Mutex<Vec<(WeakHub, ListenerId)>>,
}

impl Subscriptions {
    /// Create an empty subscription list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` on `hub` and remember the registration.
    pub fn listen_to<F>(&self, hub: &EventHub, event: impl Into<String>, callback: F) -> ListenerId
    where
        F: Fn(&Event) -> Result<()> + Send + Sync + 'static,
    {
        self.listen_to_callback(hub, event, Arc::new(callback))
    }

    /// Register a shared callback on `hub` and remember the registration.
    pub fn listen_to_callback(
        &self,
        hub: &EventHub,
        event: impl Into<String>,
        callback: Callback,
    ) -> ListenerId {
        let id = hub.on_callback(event, callback);
        self.entries.lock().push((hub.downgrade(), id));
        id
    }

    /// Remove every registration made on `hub`. Returns how many were removed.
    pub fn stop_listening_to(&self, hub: &EventHub) -> usize {
        let mut removed = 0;
        self.entries.lock().retain(|(weak, id)| match weak.upgrade() {
            Some(target) if target.ptr_eq(hub) => {
                if target.off(*id) {
                    removed += 1;
                }
                false
            }
            Some(_) => true,
            None => false,
        });
        removed
    }

    /// Remove every registration. Returns how many were still live.
    pub fn stop_listening(&self) -> usize {
        let entries = std::mem::take(&mut *self.entries.lock());
        let removed = entries
            .into_iter()
            .filter(|(weak, id)| weak.upgrade().is_some_and(|hub| hub.off(*id)))
            .count();
        tracing::trace!(target: "lateralus::hub", removed, "stopped listening");
        removed
    }

    /// Number of remembered registrations (including ones on dropped hubs).
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

static_assertions::assert_impl_all!(EventHub: Send, Sync);
static_assertions::assert_impl_all!(Subscriptions: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Callback) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |tag: &str| -> Callback {
            let log = log_clone.clone();
            let tag = tag.to_string();
            Arc::new(move |_event: &Event| {
                log.lock().push(tag.clone());
                Ok(())
            })
        };
        (log, make)
    }

    #[test]
    fn test_trigger_in_registration_order() {
        let hub = EventHub::new();
        let (log, make) = recorder();

        hub.on_callback("x", make("a"));
        hub.on_callback("x", make("b"));
        hub.on_callback("y", make("c"));

        hub.trigger(&Event::new("x", vec![])).unwrap();
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[test]
    fn test_order_survives_slot_reuse() {
        let hub = EventHub::new();
        let (log, make) = recorder();

        let first = hub.on_callback("x", make("first"));
        hub.on_callback("x", make("second"));
        hub.off(first);
        // Reuses the freed slot but must still run last.
        hub.on_callback("x", make("third"));

        hub.trigger(&Event::new("x", vec![])).unwrap();
        assert_eq!(*log.lock(), vec!["second", "third"]);
    }

    #[test]
    fn test_off_and_counts() {
        let hub = EventHub::new();
        let a = hub.on("x", |_| Ok(()));
        hub.on("y", |_| Ok(()));

        assert_eq!(hub.listener_count(), 2);
        assert_eq!(hub.listener_count_for("x"), 1);
        assert!(hub.off(a));
        assert!(!hub.off(a));
        assert_eq!(hub.listener_count_for("x"), 0);

        hub.off_all();
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn test_listener_removed_during_dispatch_is_skipped() {
        let hub = EventHub::new();
        let (log, make) = recorder();

        let victim = Arc::new(Mutex::new(None));
        let victim_clone = victim.clone();
        let hub_clone = hub.clone();
        hub.on("x", move |_| {
            if let Some(id) = *victim_clone.lock() {
                hub_clone.off(id);
            }
            Ok(())
        });
        *victim.lock() = Some(hub.on_callback("x", make("victim")));

        hub.trigger(&Event::new("x", vec![])).unwrap();
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_listener_added_during_dispatch_waits_for_next_trigger() {
        let hub = EventHub::new();
        let (log, make) = recorder();

        let hub_clone = hub.clone();
        let late = make("late");
        hub.on("x", move |_| {
            hub_clone.on_callback("x", late.clone());
            Ok(())
        });

        hub.trigger(&Event::new("x", vec![])).unwrap();
        assert!(log.lock().is_empty());
        hub.trigger(&Event::new("x", vec![])).unwrap();
        assert_eq!(*log.lock(), vec!["late"]);
    }

    #[test]
    fn test_first_error_aborts_dispatch() {
        let hub = EventHub::new();
        let (log, make) = recorder();

        hub.on("x", |event| Err(crate::LateralusError::handler(event.name(), "boom")));
        hub.on_callback("x", make("after"));

        let result = hub.trigger(&Event::new("x", vec![]));
        assert!(result.is_err());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_blocked_hub_ignores_trigger() {
        let hub = EventHub::new();
        let (log, make) = recorder();
        hub.on_callback("x", make("a"));

        hub.set_blocked(true);
        hub.trigger(&Event::new("x", vec![])).unwrap();
        hub.set_blocked(false);
        hub.trigger(&Event::new("x", vec![])).unwrap();

        assert_eq!(*log.lock(), vec!["a"]);
    }

    #[test]
    fn test_listener_guard() {
        let hub = EventHub::new();
        {
            let _guard = hub.on_scoped("x", |_| Ok(()));
            assert_eq!(hub.listener_count(), 1);
        }
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn test_collector_keeps_falsy_values() {
        let collector = Collector::new();
        collector.push(Some(json!(false)));
        collector.push(None);
        collector.push(Some(json!(0)));
        collector.push(Some(Value::Null));

        assert_eq!(collector.responses(), 4);
        assert_eq!(collector.into_values(), vec![json!(false), json!(0), Value::Null]);
    }

    #[test]
    fn test_collector_travels_with_event() {
        let hub = EventHub::new();
        hub.on("provide:size", |event| {
            if let Some(collector) = event.collector() {
                collector.push(event.arg(0).cloned());
            }
            Ok(())
        });

        let collector = Collector::new();
        hub.trigger(&Event::with_collector("provide:size", vec![json!(3)], collector.clone()))
            .unwrap();
        assert_eq!(collector.into_values(), vec![json!(3)]);
    }

    #[test]
    fn test_stop_listening_removes_all_registrations() {
        let source_a = EventHub::new();
        let source_b = EventHub::new();
        let subs = Subscriptions::new();

        subs.listen_to(&source_a, "x", |_| Ok(()));
        subs.listen_to(&source_a, "y", |_| Ok(()));
        subs.listen_to(&source_b, "x", |_| Ok(()));
        assert_eq!(subs.len(), 3);

        assert_eq!(subs.stop_listening(), 3);
        assert_eq!(source_a.listener_count(), 0);
        assert_eq!(source_b.listener_count(), 0);
        assert!(subs.is_empty());
    }

    #[test]
    fn test_stop_listening_to_one_hub() {
        let source_a = EventHub::new();
        let source_b = EventHub::new();
        let subs = Subscriptions::new();

        subs.listen_to(&source_a, "x", |_| Ok(()));
        subs.listen_to(&source_b, "x", |_| Ok(()));

        assert_eq!(subs.stop_listening_to(&source_a), 1);
        assert_eq!(source_a.listener_count(), 0);
        assert_eq!(source_b.listener_count(), 1);
        assert_eq!(subs.len(), 1);
    }

    #[test]
    fn test_stop_listening_tolerates_dropped_source() {
        let subs = Subscriptions::new();
        {
            let source = EventHub::new();
            subs.listen_to(&source, "x", |_| Ok(()));
        }
        assert_eq!(subs.stop_listening(), 0);
    }

    #[test]
    fn test_weak_hub_emitter() {
        let hub = EventHub::new();
        let weak = hub.downgrade();
        assert!(weak.event_hub().unwrap().ptr_eq(&hub));
        drop(hub);
        assert!(weak.event_hub().is_err());
    }
}
