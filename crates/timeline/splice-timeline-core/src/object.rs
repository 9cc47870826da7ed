//! Intrusive reference counting for graph objects.
//!
//! Graph nodes are allocated behind `Rc` but their *ownership* count is the
//! intrusive one kept in [`ObjectBase`]: `Rc` strong counts only track who is
//! currently looking at a node, while [`Retainer`] instances track who keeps
//! it alive in the model. A host runtime can observe every count transition
//! through an externally installed keepalive monitor.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::ops::Deref;
use std::rc::{Rc, Weak};

use crate::value::{Dictionary, Value};

/// Behavior common to every node in the object graph.
pub trait SerializableObject: Any {
    fn base(&self) -> &ObjectBase;

    /// Stable schema name, e.g. `"Marker"`.
    fn schema_name(&self) -> &'static str;

    fn schema_version(&self) -> u32 {
        1
    }

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

/// Shared state embedded in every graph object.
pub struct ObjectBase {
    ref_count: Cell<usize>,
    monitor: RefCell<Option<Rc<dyn Fn()>>>,
    parent: RefCell<Option<Weak<dyn SerializableObject>>>,
    dynamic_fields: RefCell<Dictionary>,
}

impl ObjectBase {
    pub fn new() -> Self {
        ObjectBase {
            ref_count: Cell::new(0),
            monitor: RefCell::new(None),
            parent: RefCell::new(None),
            dynamic_fields: RefCell::new(Dictionary::new()),
        }
    }

    /// Current intrusive count: the number of live [`Retainer`]s on this
    /// object.
    pub fn current_ref_count(&self) -> usize {
        self.ref_count.get()
    }

    /// Installs (or replaces) the keepalive monitor. The monitor is invoked
    /// after every count transition; when `apply_now` is set it also runs
    /// immediately so the observer can react to the current count.
    pub fn install_external_keepalive_monitor(&self, monitor: impl Fn() + 'static, apply_now: bool) {
        let monitor: Rc<dyn Fn()> = Rc::new(monitor);
        *self.monitor.borrow_mut() = Some(monitor.clone());
        if apply_now {
            monitor();
        }
    }

    /// Runs the installed monitor, if any. The monitor slot is released
    /// before the call so the monitor itself may retain or release this
    /// object without re-entering a borrow.
    pub fn notify_keepalive_monitor(&self) {
        let monitor = self.monitor.borrow().clone();
        if let Some(monitor) = monitor {
            monitor();
        }
    }

    /// The composition this object currently belongs to, if any.
    pub fn parent(&self) -> Option<Rc<dyn SerializableObject>> {
        self.parent.borrow().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn set_parent(&self, parent: Weak<dyn SerializableObject>) {
        *self.parent.borrow_mut() = Some(parent);
    }

    pub(crate) fn clear_parent(&self) {
        *self.parent.borrow_mut() = None;
    }

    pub fn dynamic_field(&self, key: &str) -> Option<Value> {
        self.dynamic_fields.borrow().get(key).cloned()
    }

    pub fn set_dynamic_field(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.dynamic_fields.borrow_mut().insert(key, value);
    }

    /// Snapshot of all dynamic fields.
    pub fn dynamic_fields(&self) -> Dictionary {
        self.dynamic_fields.borrow().clone()
    }

    pub fn set_dynamic_fields(&self, fields: Dictionary) {
        *self.dynamic_fields.borrow_mut() = fields;
    }

    fn retain(&self) {
        self.ref_count.set(self.ref_count.get() + 1);
        self.notify_keepalive_monitor();
    }

    fn retain_silent(&self) {
        self.ref_count.set(self.ref_count.get() + 1);
    }

    fn release(&self) {
        self.ref_count.set(self.ref_count.get() - 1);
        self.notify_keepalive_monitor();
    }
}

impl Default for ObjectBase {
    fn default() -> Self {
        ObjectBase::new()
    }
}

/// An owning hold on a graph object.
///
/// Creating a `Retainer` increments the target's intrusive count and dropping
/// it decrements the count again; both transitions fire the keepalive
/// monitor. The backing `Rc` is released only after the drop-side monitor has
/// run, so the object is fully alive while observers react.
pub struct Retainer<T: SerializableObject + ?Sized> {
    node: Rc<T>,
}

impl<T: SerializableObject + ?Sized> Retainer<T> {
    pub fn new(node: Rc<T>) -> Self {
        node.base().retain();
        Retainer { node }
    }

    /// Takes the hold without firing the monitor.
    ///
    /// Used when the holder being created is the very thing the monitor needs
    /// to look up: the caller registers the holder first, then calls
    /// [`ObjectBase::notify_keepalive_monitor`] itself.
    pub fn new_deferred(node: Rc<T>) -> Self {
        node.base().retain_silent();
        Retainer { node }
    }

    pub fn node(&self) -> &Rc<T> {
        &self.node
    }
}

impl<T: SerializableObject + ?Sized> Clone for Retainer<T> {
    fn clone(&self) -> Self {
        Retainer::new(self.node.clone())
    }
}

impl<T: SerializableObject + ?Sized> Deref for Retainer<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.node
    }
}

impl<T: SerializableObject + ?Sized> Drop for Retainer<T> {
    fn drop(&mut self) {
        self.node.base().release();
    }
}
