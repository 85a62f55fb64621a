//! Label-grouped signal subscriptions with bulk disconnect.
//!
//! # Responsibility
//! - Connect callbacks to emitters and remember the returned handlers.
//! - Disconnect every handler of one label, or of all labels, on teardown.
//!
//! # Invariants
//! - A label is present iff it still owns at least one live handler.
//! - Each handler is released exactly once, in registration order.
//! - Disconnecting an unknown label is a no-op.
//! - No internal borrow is held while an emitter runs, so emitters may call
//!   back into the registry from `connect` or `disconnect`.
//!
//! # See also
//! - `crate::injection` for the method-patch counterpart.

use crate::label::{LabeledEntries, DEFAULT_LABEL};
use log::{debug, warn};
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Object that accepts named signal subscriptions.
///
/// `Handler` is the opaque token returned by `connect`; it is handed back to
/// `disconnect` unchanged. The registry never inspects either associated type.
pub trait SignalEmitter {
    type Callback;
    type Handler;

    fn connect(&self, signal: &str, callback: Self::Callback) -> Self::Handler;
    fn disconnect(&self, handler: Self::Handler);
}

/// One `(emitter, signal, callback)` registration request.
///
/// The emitter type is erased here, so one sequence may mix emitters.
pub struct SignalBinding {
    signal: String,
    connect: Box<dyn FnOnce(&str) -> Box<dyn Connection>>,
}

impl SignalBinding {
    pub fn new<E>(emitter: &Rc<E>, signal: impl Into<String>, callback: E::Callback) -> Self
    where
        E: SignalEmitter + 'static,
    {
        let emitter = Rc::clone(emitter);
        Self {
            signal: signal.into(),
            connect: Box::new(move |signal: &str| -> Box<dyn Connection> {
                let handler = emitter.connect(signal, callback);
                Box::new(Subscription { emitter, handler })
            }),
        }
    }

    pub fn signal(&self) -> &str {
        &self.signal
    }
}

impl Debug for SignalBinding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalBinding")
            .field("signal", &self.signal)
            .finish_non_exhaustive()
    }
}

trait Connection {
    fn release(self: Box<Self>);
}

struct Subscription<E: SignalEmitter> {
    emitter: Rc<E>,
    handler: E::Handler,
}

impl<E: SignalEmitter> Connection for Subscription<E> {
    fn release(self: Box<Self>) {
        let Subscription { emitter, handler } = *self;
        emitter.disconnect(handler);
    }
}

/// Tracks signal handlers by label so they can be disconnected together.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscriptions: RefCell<LabeledEntries<Box<dyn Connection>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connects every binding under the `"generic"` label.
    pub fn push(&self, bindings: impl IntoIterator<Item = SignalBinding>) {
        self.push_with_label(DEFAULT_LABEL, bindings);
    }

    /// Connects every binding under `label`, in sequence order.
    ///
    /// An empty sequence leaves the registry untouched.
    pub fn push_with_label(&self, label: &str, bindings: impl IntoIterator<Item = SignalBinding>) {
        for binding in bindings {
            let SignalBinding { signal, connect } = binding;
            let subscription = connect(&signal);
            debug!(
                "event=signal_connect module=signals status=ok label={} signal={}",
                label, signal
            );
            self.subscriptions.borrow_mut().append(label, subscription);
        }
    }

    /// Disconnects every handler stored under `label`.
    ///
    /// Handlers registered under `label` while this runs are kept.
    pub fn disconnect_with_label(&self, label: &str) {
        let detached = self.subscriptions.borrow_mut().take(label);
        let Some(subscriptions) = detached else {
            return;
        };
        let count = subscriptions.len();
        for subscription in subscriptions {
            subscription.release();
        }
        debug!(
            "event=signal_disconnect module=signals status=ok label={} count={}",
            label, count
        );
    }

    /// Disconnects every label present at call time, newest label first.
    pub fn disconnect(&self) {
        let labels = self.subscriptions.borrow().labels_newest_first();
        for label in labels {
            self.disconnect_with_label(&label);
        }
    }

    /// Present labels in population order.
    pub fn labels(&self) -> Vec<String> {
        self.subscriptions.borrow().labels()
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.subscriptions.borrow().contains_label(label)
    }

    /// Live handlers under `label`.
    pub fn handlers_in(&self, label: &str) -> usize {
        self.subscriptions.borrow().entries_in(label)
    }

    /// Live handlers across all labels.
    pub fn len(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.borrow().is_empty()
    }
}

impl Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("labels", &self.labels())
            .field("handlers", &self.len())
            .finish()
    }
}

impl Drop for SubscriptionRegistry {
    fn drop(&mut self) {
        let subscriptions = self.subscriptions.get_mut();
        if !subscriptions.is_empty() {
            warn!(
                "event=signal_registry_dropped module=signals status=leak labels={:?} handlers={}",
                subscriptions.labels(),
                subscriptions.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{SignalBinding, SignalEmitter, SubscriptionRegistry};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct CountingEmitter {
        next_id: RefCell<u32>,
        released: RefCell<Vec<u32>>,
    }

    impl SignalEmitter for CountingEmitter {
        type Callback = ();
        type Handler = u32;

        fn connect(&self, _signal: &str, _callback: ()) -> u32 {
            let mut next = self.next_id.borrow_mut();
            *next += 1;
            *next
        }

        fn disconnect(&self, handler: u32) {
            self.released.borrow_mut().push(handler);
        }
    }

    #[test]
    fn empty_push_does_not_create_label() {
        let registry = SubscriptionRegistry::new();
        registry.push_with_label("ui", Vec::new());

        assert!(!registry.contains_label("ui"));
        assert!(registry.is_empty());
    }

    #[test]
    fn disconnect_releases_in_registration_order() {
        let emitter = Rc::new(CountingEmitter::default());
        let registry = SubscriptionRegistry::new();
        registry.push(vec![
            SignalBinding::new(&emitter, "changed", ()),
            SignalBinding::new(&emitter, "destroy", ()),
        ]);
        registry.push(vec![SignalBinding::new(&emitter, "notify", ())]);
        assert_eq!(registry.handlers_in("generic"), 3);

        registry.disconnect_with_label("generic");
        assert_eq!(*emitter.released.borrow(), vec![1, 2, 3]);
        assert!(registry.is_empty());
    }

    #[test]
    fn debug_output_lists_labels_and_binding_signal() {
        let emitter = Rc::new(CountingEmitter::default());
        let binding = SignalBinding::new(&emitter, "changed", ());
        assert!(format!("{binding:?}").contains("changed"));

        let registry = SubscriptionRegistry::new();
        registry.push_with_label("dock", vec![binding]);
        assert!(format!("{registry:?}").contains("dock"));
        registry.disconnect();
    }
}
