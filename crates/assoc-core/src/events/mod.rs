//! Change notifier: synchronous, ordered fan-out of per-field state changes

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use parking_lot::Mutex;
use tracing::trace;

use crate::model::FieldId;
use crate::resolver::ResolvedField;

/// Session identifier type
pub type SessionId = uuid::Uuid;

/// Handle returned by a subscription, used to unsubscribe
pub type SubscriptionId = u64;

/// Emitted once per field whose resolved states changed in a mutation
#[derive(Debug, Clone)]
pub struct FieldChanged {
    pub session: SessionId,
    /// Increases by one per mutation that changed anything
    pub sequence: u64,
    pub field: FieldId,
    pub resolved: Arc<ResolvedField>,
}

/// Trait for components that re-render when a field's states change
pub trait SelectionSubscriber: Send + Sync {
    fn on_field_changed(&self, event: &FieldChanged);
}

/// Handler trait for owned event handlers
pub trait EventHandler: Send {
    fn handle(&mut self, event: &FieldChanged);
}

/// Helper struct for creating event handlers from closures
pub struct ClosureEventHandler<F> {
    handler: F,
}

impl<F> EventHandler for ClosureEventHandler<F>
where
    F: FnMut(&FieldChanged) + Send,
{
    fn handle(&mut self, event: &FieldChanged) {
        (self.handler)(event);
    }
}

/// Create an event handler from a closure
pub fn handler_from_fn<F>(f: F) -> Box<dyn EventHandler>
where
    F: FnMut(&FieldChanged) + Send + 'static,
{
    Box::new(ClosureEventHandler { handler: f })
}

enum Listener {
    /// Owned by the notifier
    Handler(Box<dyn EventHandler>),
    /// Held weakly; pruned once the subscriber is dropped
    Subscriber(Weak<dyn SelectionSubscriber>),
}

impl Listener {
    fn is_alive(&self) -> bool {
        match self {
            Listener::Handler(_) => true,
            Listener::Subscriber(weak) => weak.strong_count() > 0,
        }
    }

    fn deliver(&mut self, event: &FieldChanged) {
        match self {
            Listener::Handler(handler) => handler.handle(event),
            Listener::Subscriber(weak) => {
                if let Some(subscriber) = weak.upgrade() {
                    subscriber.on_field_changed(event);
                }
            }
        }
    }
}

#[derive(Default)]
struct Registry {
    listeners: Vec<(SubscriptionId, Listener)>,
    /// Thread currently delivering events, if any
    dispatching: Option<ThreadId>,
    /// Unsubscribed while their listener was checked out for delivery
    removed_during_dispatch: Vec<SubscriptionId>,
}

/// Fan-out of [`FieldChanged`] events to listeners
pub struct ChangeNotifier {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
}

/// Listeners checked out of the registry for one dispatch. Dropping it,
/// including during a listener panic, hands them back.
struct CheckedOut<'a> {
    notifier: &'a ChangeNotifier,
    active: Vec<(SubscriptionId, Listener)>,
}

impl Drop for CheckedOut<'_> {
    fn drop(&mut self) {
        let mut registry = self.notifier.registry.lock();
        registry.dispatching = None;

        let removed = std::mem::take(&mut registry.removed_during_dispatch);
        let mut active = std::mem::take(&mut self.active);
        active.retain(|(id, _)| !removed.contains(id));

        // Listeners added during dispatch go after the existing ones
        active.append(&mut registry.listeners);
        registry.listeners = active;
    }
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe an owned handler
    pub fn subscribe(&self, handler: Box<dyn EventHandler>) -> SubscriptionId {
        self.push(Listener::Handler(handler))
    }

    /// Subscribe a closure
    pub fn subscribe_fn<F>(&self, f: F) -> SubscriptionId
    where
        F: FnMut(&FieldChanged) + Send + 'static,
    {
        self.subscribe(handler_from_fn(f))
    }

    /// Add a weakly held subscriber
    pub fn add_subscriber(&self, subscriber: Arc<dyn SelectionSubscriber>) -> SubscriptionId {
        self.push(Listener::Subscriber(Arc::downgrade(&subscriber)))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut registry = self.registry.lock();
        let before = registry.listeners.len();
        registry.listeners.retain(|(listener_id, _)| *listener_id != id);
        if registry.listeners.len() == before && registry.dispatching.is_some() {
            registry.removed_during_dispatch.push(id);
        }
    }

    /// Number of live listeners
    pub fn listener_count(&self) -> usize {
        self.registry.lock().listeners.iter().filter(|(_, l)| l.is_alive()).count()
    }

    /// True while the calling thread is delivering events
    pub fn is_dispatching_on_current_thread(&self) -> bool {
        self.registry.lock().dispatching == Some(thread::current().id())
    }

    /// Deliver `events` in order to every listener, synchronously.
    ///
    /// Listeners are checked out of the lock for the duration, so a listener
    /// may subscribe, unsubscribe or read session state without deadlocking.
    /// Callers serialise dispatches; the session does so with its writer lock.
    pub fn dispatch(&self, events: &[FieldChanged]) {
        if events.is_empty() {
            return;
        }

        let mut checked_out = {
            let mut registry = self.registry.lock();
            let mut active = std::mem::take(&mut registry.listeners);
            active.retain(|(_, listener)| listener.is_alive());
            registry.dispatching = Some(thread::current().id());
            CheckedOut { notifier: self, active }
        };

        for event in events {
            trace!(field = %event.field, sequence = event.sequence, "notifying field change");
            for (_, listener) in checked_out.active.iter_mut() {
                listener.deliver(event);
            }
        }
    }

    fn push(&self, listener: Listener) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registry.lock().listeners.push((id, listener));
        id
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(field: u32, sequence: u64) -> FieldChanged {
        FieldChanged {
            session: SessionId::nil(),
            sequence,
            field: FieldId(field),
            resolved: Arc::new(ResolvedField {
                field: FieldId(field),
                name: Arc::from("F"),
                values: Vec::new(),
            }),
        }
    }

    struct Recorder {
        seen: Mutex<Vec<FieldId>>,
    }

    impl SelectionSubscriber for Recorder {
        fn on_field_changed(&self, event: &FieldChanged) {
            self.seen.lock().push(event.field);
        }
    }

    #[test]
    fn test_ordered_delivery() {
        let notifier = ChangeNotifier::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        notifier.subscribe_fn(move |e| sink.lock().push((e.sequence, e.field)));

        notifier.dispatch(&[event(0, 1), event(2, 1)]);
        notifier.dispatch(&[event(1, 2)]);

        assert_eq!(
            *seen.lock(),
            vec![(1, FieldId(0)), (1, FieldId(2)), (2, FieldId(1))]
        );
    }

    #[test]
    fn test_weak_subscriber_pruned() {
        let notifier = ChangeNotifier::new();
        let recorder = Arc::new(Recorder { seen: Mutex::new(Vec::new()) });
        notifier.add_subscriber(recorder.clone());

        notifier.dispatch(&[event(3, 1)]);
        assert_eq!(*recorder.seen.lock(), vec![FieldId(3)]);
        assert_eq!(notifier.listener_count(), 1);

        drop(recorder);
        notifier.dispatch(&[event(3, 2)]);
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn test_unsubscribe_inside_dispatch() {
        let notifier = Arc::new(ChangeNotifier::new());
        let count = Arc::new(Mutex::new(0));

        let own_id = Arc::new(Mutex::new(None::<SubscriptionId>));
        let (n, c, id_slot) = (notifier.clone(), count.clone(), own_id.clone());
        let id = notifier.subscribe_fn(move |_| {
            *c.lock() += 1;
            if let Some(id) = *id_slot.lock() {
                n.unsubscribe(id);
            }
        });
        *own_id.lock() = Some(id);

        notifier.dispatch(&[event(0, 1), event(1, 1)]);
        // Removal takes effect after the current dispatch
        assert_eq!(*count.lock(), 2);

        notifier.dispatch(&[event(0, 2)]);
        assert_eq!(*count.lock(), 2);
        assert_eq!(notifier.listener_count(), 0);
    }

    #[test]
    fn test_dispatch_flag_cleared() {
        let notifier = Arc::new(ChangeNotifier::new());
        let observed = Arc::new(Mutex::new(false));
        let (n, o) = (notifier.clone(), observed.clone());
        notifier.subscribe_fn(move |_| *o.lock() = n.is_dispatching_on_current_thread());

        notifier.dispatch(&[event(0, 1)]);
        assert!(*observed.lock());
        assert!(!notifier.is_dispatching_on_current_thread());
    }

    #[test]
    fn test_listener_panic_restores_registry() {
        let notifier = ChangeNotifier::new();
        let hits = Arc::new(AtomicU64::new(0));
        let counter = hits.clone();
        notifier.subscribe_fn(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let panicked = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = panicked.clone();
        notifier.subscribe_fn(move |_| {
            if !flag.swap(true, Ordering::SeqCst) {
                panic!("listener failed");
            }
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| notifier.dispatch(&[event(0, 1)])));
        assert!(result.is_err());
        assert!(!notifier.is_dispatching_on_current_thread());
        assert_eq!(notifier.listener_count(), 2);

        notifier.dispatch(&[event(0, 2)]);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_from_other_thread_during_dispatch() {
        for _ in 0..200 {
            let notifier = Arc::new(ChangeNotifier::new());
            let hits = Arc::new(AtomicU64::new(0));
            let counter = hits.clone();
            let id = notifier.subscribe_fn(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });

            let dispatcher = {
                let notifier = notifier.clone();
                thread::spawn(move || {
                    for sequence in 0..50 {
                        notifier.dispatch(&[event(0, sequence)]);
                    }
                })
            };
            notifier.unsubscribe(id);
            dispatcher.join().unwrap();

            let settled = hits.load(Ordering::SeqCst);
            notifier.dispatch(&[event(0, 50)]);
            assert_eq!(hits.load(Ordering::SeqCst), settled);
            assert_eq!(notifier.listener_count(), 0);
        }
    }
}
