//! Label-grouped method injection with bulk restore.
//!
//! # Responsibility
//! - Wrap a named method on a target with a chained decorator.
//! - Remember what was there before so teardown can put it back.
//!
//! # Invariants
//! - The installed decorator runs the original first and only falls through
//!   to the replacement when the original yields `None`.
//! - Teardown restores the captured original, or removes the method when
//!   none existed before injection.
//! - A label is present iff it still owns at least one live injection.
//! - No internal borrow is held while a target runs, so `set_method` and
//!   `remove_method` may call back into the registry.
//!
//! # Ordering constraint
//! Two injections on the same `(target, name)` chain onto each other: the
//! second captures the first decorator as its original. Labels holding such
//! overlapping injections must be torn down last-registered-first, otherwise
//! a stale decorator is restored. The registry does not detect this.

use crate::label::{LabeledEntries, DEFAULT_LABEL};
use log::{debug, warn};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

/// Callable stored in a [`MethodTable`].
///
/// `R` is the receiver the method is invoked on. `None` is the unset result;
/// `Some(Value::Null)` is a defined value.
pub struct Method<R: ?Sized> {
    body: Rc<dyn Fn(&R, &[Value]) -> Option<Value>>,
}

impl<R: ?Sized> Method<R> {
    pub fn new(body: impl Fn(&R, &[Value]) -> Option<Value> + 'static) -> Self {
        Self {
            body: Rc::new(body),
        }
    }

    pub fn invoke(&self, receiver: &R, args: &[Value]) -> Option<Value> {
        (self.body)(receiver, args)
    }

    /// Builds the decorator installed by an injection.
    ///
    /// Calls `original` (when present) with the same receiver and arguments;
    /// `replacement` only runs if that produced `None`.
    pub fn chain(original: Option<Method<R>>, replacement: Method<R>) -> Self
    where
        R: 'static,
    {
        Self::new(move |receiver, args| {
            let result = match &original {
                Some(method) => method.invoke(receiver, args),
                None => None,
            };
            result.or_else(|| replacement.invoke(receiver, args))
        })
    }

    /// Returns whether both handles share one body.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.body, &other.body)
    }
}

impl<R: ?Sized> Clone for Method<R> {
    fn clone(&self) -> Self {
        Self {
            body: Rc::clone(&self.body),
        }
    }
}

impl<R: ?Sized> Debug for Method<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Method").finish_non_exhaustive()
    }
}

/// Capability-replacement hook exposed by objects that accept injections.
///
/// Implementations use interior mutability: targets are shared through `Rc`
/// and may be patched while other handles are alive. `method` must return a
/// clone rather than hold a borrow, so the returned method may re-enter the
/// table.
pub trait MethodTable {
    fn method(&self, name: &str) -> Option<Method<Self>>;
    fn set_method(&self, name: &str, method: Method<Self>);
    fn remove_method(&self, name: &str);

    /// Invokes `name` on `self`; `None` when the method is absent or unset.
    fn call(&self, name: &str, args: &[Value]) -> Option<Value>
    where
        Self: Sized,
    {
        self.method(name)?.invoke(self, args)
    }
}

/// Named method slots for types implementing [`MethodTable`] by delegation.
pub struct MethodSlots<R: ?Sized> {
    slots: RefCell<BTreeMap<String, Method<R>>>,
}

impl<R: ?Sized> Default for MethodSlots<R> {
    fn default() -> Self {
        Self {
            slots: RefCell::new(BTreeMap::new()),
        }
    }
}

impl<R: ?Sized> MethodSlots<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Method<R>> {
        self.slots.borrow().get(name).cloned()
    }

    pub fn insert(&self, name: &str, method: Method<R>) {
        self.slots.borrow_mut().insert(name.to_string(), method);
    }

    pub fn remove(&self, name: &str) {
        self.slots.borrow_mut().remove(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slots.borrow().contains_key(name)
    }

    /// Slot names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.slots.borrow().keys().cloned().collect()
    }
}

impl<R: ?Sized> Debug for MethodSlots<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodSlots")
            .field("names", &self.names())
            .finish()
    }
}

/// One `(target, name, replacement)` injection request.
pub struct Injection<T: MethodTable> {
    pub target: Rc<T>,
    pub name: String,
    pub replacement: Method<T>,
}

impl<T: MethodTable> Injection<T> {
    pub fn new(target: &Rc<T>, name: impl Into<String>, replacement: Method<T>) -> Self {
        Self {
            target: Rc::clone(target),
            name: name.into(),
            replacement,
        }
    }
}

trait Revert {
    fn revert(self: Box<Self>);
}

struct Patch<T: MethodTable> {
    target: Rc<T>,
    name: String,
    original: Option<Method<T>>,
}

impl<T: MethodTable> Revert for Patch<T> {
    fn revert(self: Box<Self>) {
        let Patch {
            target,
            name,
            original,
        } = *self;
        match original {
            Some(method) => target.set_method(&name, method),
            None => target.remove_method(&name),
        }
    }
}

/// Tracks method injections by label so they can be reverted together.
#[derive(Default)]
pub struct PatchRegistry {
    patches: RefCell<LabeledEntries<Box<dyn Revert>>>,
}

impl PatchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Injects every request under the `"generic"` label.
    pub fn push<T>(&self, injections: impl IntoIterator<Item = Injection<T>>)
    where
        T: MethodTable + 'static,
    {
        self.push_with_label(DEFAULT_LABEL, injections);
    }

    /// Injects every request under `label`, in sequence order.
    pub fn push_with_label<T>(
        &self,
        label: &str,
        injections: impl IntoIterator<Item = Injection<T>>,
    ) where
        T: MethodTable + 'static,
    {
        for injection in injections {
            let Injection {
                target,
                name,
                replacement,
            } = injection;
            let original = target.method(&name);
            debug!(
                "event=method_inject module=injection status=ok label={} method={} had_original={}",
                label,
                name,
                original.is_some()
            );
            target.set_method(&name, Method::chain(original.clone(), replacement));
            self.patches.borrow_mut().append(
                label,
                Box::new(Patch {
                    target,
                    name,
                    original,
                }),
            );
        }
    }

    /// Restores every method injected under `label`.
    ///
    /// Injections registered under `label` while this runs are kept.
    pub fn deinject_with_label(&self, label: &str) {
        let detached = self.patches.borrow_mut().take(label);
        let Some(patches) = detached else {
            return;
        };
        let count = patches.len();
        for patch in patches {
            patch.revert();
        }
        debug!(
            "event=method_deinject module=injection status=ok label={} count={}",
            label, count
        );
    }

    /// Restores every label present at call time, newest label first.
    pub fn destroy(&self) {
        let labels = self.patches.borrow().labels_newest_first();
        for label in labels {
            self.deinject_with_label(&label);
        }
    }

    /// Present labels in population order.
    pub fn labels(&self) -> Vec<String> {
        self.patches.borrow().labels()
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.patches.borrow().contains_label(label)
    }

    /// Live injections under `label`.
    pub fn patches_in(&self, label: &str) -> usize {
        self.patches.borrow().entries_in(label)
    }

    /// Live injections across all labels.
    pub fn len(&self) -> usize {
        self.patches.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.borrow().is_empty()
    }
}

impl Debug for PatchRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchRegistry")
            .field("labels", &self.labels())
            .field("patches", &self.len())
            .finish()
    }
}

impl Drop for PatchRegistry {
    fn drop(&mut self) {
        let patches = self.patches.get_mut();
        if !patches.is_empty() {
            warn!(
                "event=patch_registry_dropped module=injection status=leak labels={:?} patches={}",
                patches.labels(),
                patches.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Injection, Method, MethodSlots, MethodTable, PatchRegistry};
    use serde_json::{json, Value};
    use std::rc::Rc;

    #[derive(Default)]
    struct Widget {
        methods: MethodSlots<Widget>,
    }

    impl MethodTable for Widget {
        fn method(&self, name: &str) -> Option<Method<Self>> {
            self.methods.get(name)
        }

        fn set_method(&self, name: &str, method: Method<Self>) {
            self.methods.insert(name, method);
        }

        fn remove_method(&self, name: &str) {
            self.methods.remove(name);
        }
    }

    #[test]
    fn chain_treats_null_as_defined_result() {
        let original = Method::<Widget>::new(|_, _| Some(Value::Null));
        let replacement = Method::new(|_, _| Some(json!("fallback")));
        let chained = Method::chain(Some(original), replacement);

        assert_eq!(chained.invoke(&Widget::default(), &[]), Some(Value::Null));
    }

    #[test]
    fn chain_passes_receiver_and_arguments_to_replacement() {
        let widget = Widget::default();
        widget
            .methods
            .insert("scale", Method::new(|_, _| Some(json!(3))));
        let replacement = Method::new(|receiver: &Widget, args: &[Value]| {
            let factor = receiver.call("scale", &[])?.as_i64()?;
            Some(json!(args[0].as_i64()? * factor))
        });
        let chained = Method::chain(None, replacement);

        assert_eq!(chained.invoke(&widget, &[json!(7)]), Some(json!(21)));
    }

    #[test]
    fn deinject_restores_exact_original_method() {
        let widget = Rc::new(Widget::default());
        let original = Method::new(|_, _| Some(json!("original")));
        widget.set_method("render", original.clone());

        let registry = PatchRegistry::new();
        registry.push(vec![Injection::new(
            &widget,
            "render",
            Method::new(|_, _| Some(json!("replacement"))),
        )]);
        let installed = widget.method("render").expect("decorator installed");
        assert!(!installed.ptr_eq(&original));

        registry.deinject_with_label("generic");
        let restored = widget.method("render").expect("original restored");
        assert!(restored.ptr_eq(&original));
    }

    #[test]
    fn empty_push_does_not_create_label() {
        let registry = PatchRegistry::new();
        registry.push_with_label("ui", Vec::<Injection<Widget>>::new());

        assert!(!registry.contains_label("ui"));
        assert!(registry.is_empty());
    }
}
