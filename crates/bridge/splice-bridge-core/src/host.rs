//! In-process model of a host runtime.
//!
//! [`HostScope`] plays the part of the embedding realm: it interns one
//! wrapper per live native object, pins wrappers that must survive host
//! garbage collection, and carries the scope-wide conversion policy.
//! [`HostValue`] is the dynamic value shape of that runtime; its containers
//! have reference semantics, like the objects of the hosts being modeled.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use hashbrown::HashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use splice_timeline_core::{RationalTime, Retainer, SerializableObject, TimeRange, TimeTransform};

use crate::convert::NumberPolicy;
use crate::error::BridgeError;

pub(crate) type ObjectKey = usize;

/// Identity of a graph object: the address of its allocation.
pub(crate) fn object_key(node: &Rc<dyn SerializableObject>) -> ObjectKey {
    Rc::as_ptr(node) as *const () as usize
}

/// Scope construction options, deserializable from an embedding's config
/// object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScopeConfig {
    pub number_policy: NumberPolicy,
}

/// A dynamically typed host value.
#[derive(Clone, Debug)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    /// Host integers wider than the double-precision safe range.
    BigInt(i128),
    Str(String),
    Array(HostArray),
    Object(HostObject),
    RationalTime(RationalTime),
    TimeRange(TimeRange),
    TimeTransform(TimeTransform),
    Handle(HostHandle),
    Symbol(HostSymbol),
    Function(HostFunction),
}

impl HostValue {
    /// Host-visible type name, as an embedding would report it.
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Null => "null",
            HostValue::Bool(_) => "boolean",
            HostValue::Number(_) => "number",
            HostValue::BigInt(_) => "bigint",
            HostValue::Str(_) => "string",
            HostValue::Array(_) => "Array",
            HostValue::Object(_) => "Object",
            HostValue::RationalTime(_) => "RationalTime",
            HostValue::TimeRange(_) => "TimeRange",
            HostValue::TimeTransform(_) => "TimeTransform",
            HostValue::Handle(handle) => handle.schema_name(),
            HostValue::Symbol(_) => "symbol",
            HostValue::Function(_) => "function",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            HostValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&HostArray> {
        match self {
            HostValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&HostObject> {
        match self {
            HostValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<&HostHandle> {
        match self {
            HostValue::Handle(h) => Some(h),
            _ => None,
        }
    }
}

/// Structural equality, with identity as a fast path for reference types.
/// `Number(NaN)` is unequal to itself, as in the hosts being modeled.
impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Undefined, HostValue::Undefined) => true,
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Number(a), HostValue::Number(b)) => a == b,
            (HostValue::BigInt(a), HostValue::BigInt(b)) => a == b,
            (HostValue::Str(a), HostValue::Str(b)) => a == b,
            (HostValue::Array(a), HostValue::Array(b)) => {
                a.ptr_eq(b) || *a.items.borrow() == *b.items.borrow()
            }
            (HostValue::Object(a), HostValue::Object(b)) => {
                a.ptr_eq(b) || *a.entries.borrow() == *b.entries.borrow()
            }
            (HostValue::RationalTime(a), HostValue::RationalTime(b)) => a == b,
            (HostValue::TimeRange(a), HostValue::TimeRange(b)) => a == b,
            (HostValue::TimeTransform(a), HostValue::TimeTransform(b)) => a == b,
            (HostValue::Handle(a), HostValue::Handle(b)) => a.is_same(b),
            (HostValue::Symbol(a), HostValue::Symbol(b)) => a == b,
            (HostValue::Function(a), HostValue::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for HostValue {
    fn from(v: bool) -> Self {
        HostValue::Bool(v)
    }
}

impl From<i32> for HostValue {
    fn from(v: i32) -> Self {
        HostValue::Number(v as f64)
    }
}

impl From<f64> for HostValue {
    fn from(v: f64) -> Self {
        HostValue::Number(v)
    }
}

impl From<&str> for HostValue {
    fn from(v: &str) -> Self {
        HostValue::Str(v.to_string())
    }
}

impl From<String> for HostValue {
    fn from(v: String) -> Self {
        HostValue::Str(v)
    }
}

impl From<HostArray> for HostValue {
    fn from(v: HostArray) -> Self {
        HostValue::Array(v)
    }
}

impl From<HostObject> for HostValue {
    fn from(v: HostObject) -> Self {
        HostValue::Object(v)
    }
}

impl From<HostHandle> for HostValue {
    fn from(v: HostHandle) -> Self {
        HostValue::Handle(v)
    }
}

impl From<RationalTime> for HostValue {
    fn from(v: RationalTime) -> Self {
        HostValue::RationalTime(v)
    }
}

impl From<TimeRange> for HostValue {
    fn from(v: TimeRange) -> Self {
        HostValue::TimeRange(v)
    }
}

impl From<TimeTransform> for HostValue {
    fn from(v: TimeTransform) -> Self {
        HostValue::TimeTransform(v)
    }
}

impl From<HostSymbol> for HostValue {
    fn from(v: HostSymbol) -> Self {
        HostValue::Symbol(v)
    }
}

impl From<HostFunction> for HostValue {
    fn from(v: HostFunction) -> Self {
        HostValue::Function(v)
    }
}

/// A host array. Cloning shares the backing storage.
#[derive(Clone, Default)]
pub struct HostArray {
    items: Rc<RefCell<Vec<HostValue>>>,
}

impl HostArray {
    pub fn new() -> Self {
        HostArray::default()
    }

    pub fn from_values(values: impl IntoIterator<Item = HostValue>) -> Self {
        HostArray {
            items: Rc::new(RefCell::new(values.into_iter().collect())),
        }
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<HostValue> {
        self.items.borrow().get(index).cloned()
    }

    /// Replaces the element at `index`; returns false when out of range.
    pub fn set(&self, index: usize, value: HostValue) -> bool {
        match self.items.borrow_mut().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn push(&self, value: HostValue) {
        self.items.borrow_mut().push(value);
    }

    pub fn to_vec(&self) -> Vec<HostValue> {
        self.items.borrow().clone()
    }

    fn ptr_eq(&self, other: &HostArray) -> bool {
        Rc::ptr_eq(&self.items, &other.items)
    }
}

impl fmt::Debug for HostArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.borrow().iter()).finish()
    }
}

/// A property key on a host object.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum HostKey {
    Str(String),
    Symbol(HostSymbol),
}

impl HostKey {
    pub fn type_name(&self) -> &'static str {
        match self {
            HostKey::Str(_) => "string",
            HostKey::Symbol(_) => "symbol",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostKey::Str(s) => Some(s),
            HostKey::Symbol(_) => None,
        }
    }
}

impl From<&str> for HostKey {
    fn from(v: &str) -> Self {
        HostKey::Str(v.to_string())
    }
}

impl From<String> for HostKey {
    fn from(v: String) -> Self {
        HostKey::Str(v)
    }
}

impl From<HostSymbol> for HostKey {
    fn from(v: HostSymbol) -> Self {
        HostKey::Symbol(v)
    }
}

/// A plain host object: ordered properties under string or symbol keys.
/// Cloning shares the backing storage.
#[derive(Clone, Default)]
pub struct HostObject {
    entries: Rc<RefCell<IndexMap<HostKey, HostValue>>>,
}

impl HostObject {
    pub fn new() -> Self {
        HostObject::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn set(&self, key: impl Into<HostKey>, value: impl Into<HostValue>) {
        self.entries.borrow_mut().insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<HostValue> {
        self.entries
            .borrow()
            .get(&HostKey::Str(key.to_string()))
            .cloned()
    }

    /// Snapshot of the property list in insertion order.
    pub fn entries(&self) -> Vec<(HostKey, HostValue)> {
        self.entries
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn ptr_eq(&self, other: &HostObject) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }
}

impl fmt::Debug for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.borrow().iter()).finish()
    }
}

/// A unique host symbol. Symbols compare by identity, never by description.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HostSymbol(u32);

/// A callable host value.
#[derive(Clone)]
pub struct HostFunction {
    f: Rc<dyn Fn(&[HostValue]) -> Result<HostValue, BridgeError>>,
}

impl HostFunction {
    pub fn new(f: impl Fn(&[HostValue]) -> Result<HostValue, BridgeError> + 'static) -> Self {
        HostFunction { f: Rc::new(f) }
    }

    pub fn call(&self, args: &[HostValue]) -> Result<HostValue, BridgeError> {
        (self.f)(args)
    }

    fn ptr_eq(&self, other: &HostFunction) -> bool {
        Rc::ptr_eq(&self.f, &other.f)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HostFunction")
    }
}

struct Wrapper {
    hold: Retainer<dyn SerializableObject>,
    props: RefCell<IndexMap<String, HostValue>>,
}

/// The host-side face of a graph object.
///
/// Handles to the same live object are always the same wrapper: identity is
/// interned per scope, so host code can compare handles and stash expando
/// properties on them. Each wrapper keeps one intrusive hold on its target
/// for as long as any handle to it exists.
#[derive(Clone)]
pub struct HostHandle {
    wrap: Rc<Wrapper>,
}

impl HostHandle {
    pub fn node(&self) -> &Rc<dyn SerializableObject> {
        self.wrap.hold.node()
    }

    pub fn schema_name(&self) -> &'static str {
        self.wrap.hold.node().schema_name()
    }

    /// True when both handles wrap the same native object.
    pub fn is_same(&self, other: &HostHandle) -> bool {
        Rc::ptr_eq(&self.wrap, &other.wrap)
    }

    pub fn downcast<T: SerializableObject>(&self) -> Result<Rc<T>, BridgeError> {
        let node = self.wrap.hold.node().clone();
        let actual = node.schema_name();
        node.into_any().downcast::<T>().map_err(|_| {
            let expected = std::any::type_name::<T>()
                .rsplit("::")
                .next()
                .unwrap_or("object");
            BridgeError::TypeMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            }
        })
    }

    /// Host-side expando property. These live on the wrapper, so they survive
    /// as long as the handle identity does.
    pub fn property(&self, key: &str) -> Option<HostValue> {
        self.wrap.props.borrow().get(key).cloned()
    }

    pub fn set_property(&self, key: impl Into<String>, value: impl Into<HostValue>) {
        self.wrap
            .props
            .borrow_mut()
            .insert(key.into(), value.into());
    }
}

impl fmt::Debug for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HostHandle({}@{:#x})",
            self.schema_name(),
            Rc::as_ptr(self.wrap.hold.node()) as *const () as usize
        )
    }
}

pub(crate) struct ScopeInner {
    wrappers: RefCell<HashMap<ObjectKey, Weak<Wrapper>>>,
    pinned: RefCell<HashMap<ObjectKey, HostHandle>>,
    number_policy: Cell<NumberPolicy>,
    next_symbol: Cell<u32>,
}

impl ScopeInner {
    /// Canonical wrapper for `node`, creating and interning one on first use.
    pub(crate) fn handle_for(&self, node: &Rc<dyn SerializableObject>) -> HostHandle {
        let key = object_key(node);
        if let Some(existing) = self.wrappers.borrow().get(&key).and_then(Weak::upgrade) {
            return HostHandle { wrap: existing };
        }
        // The new wrapper takes its hold silently: the monitor must only see
        // the transition once the wrapper is discoverable in the table.
        let wrap = Rc::new(Wrapper {
            hold: Retainer::new_deferred(node.clone()),
            props: RefCell::new(IndexMap::new()),
        });
        self.wrappers.borrow_mut().insert(key, Rc::downgrade(&wrap));
        node.base().notify_keepalive_monitor();
        HostHandle { wrap }
    }

    pub(crate) fn pin(&self, node: &Rc<dyn SerializableObject>) {
        let key = object_key(node);
        log::trace!("pinning {}@{:#x}", node.schema_name(), key);
        let handle = self.handle_for(node);
        self.pinned.borrow_mut().entry(key).or_insert(handle);
    }

    pub(crate) fn unpin(&self, key: ObjectKey) {
        log::trace!("unpinning object @{:#x}", key);
        let removed = self.pinned.borrow_mut().remove(&key);
        // Dropped outside the table borrow: releasing the pin may release the
        // last hold on the object and re-enter the monitor.
        drop(removed);
    }
}

/// One embedding realm: wrapper identity, pin table and conversion policy.
///
/// Cloning a scope is cheap and yields the same realm.
#[derive(Clone)]
pub struct HostScope {
    inner: Rc<ScopeInner>,
}

impl HostScope {
    pub fn new() -> Self {
        HostScope::with_config(ScopeConfig::default())
    }

    pub fn with_config(config: ScopeConfig) -> Self {
        HostScope {
            inner: Rc::new(ScopeInner {
                wrappers: RefCell::new(HashMap::new()),
                pinned: RefCell::new(HashMap::new()),
                number_policy: Cell::new(config.number_policy),
                next_symbol: Cell::new(0),
            }),
        }
    }

    pub fn number_policy(&self) -> NumberPolicy {
        self.inner.number_policy.get()
    }

    pub fn set_number_policy(&self, policy: NumberPolicy) {
        self.inner.number_policy.set(policy);
    }

    /// The canonical handle for a graph object.
    pub fn handle_for(&self, node: &Rc<dyn SerializableObject>) -> HostHandle {
        self.inner.handle_for(node)
    }

    pub fn make_symbol(&self) -> HostSymbol {
        let id = self.inner.next_symbol.get();
        self.inner.next_symbol.set(id + 1);
        HostSymbol(id)
    }

    /// Prunes identity-map entries whose wrappers have been collected by the
    /// host. Returns the number of entries removed.
    pub fn collect(&self) -> usize {
        let mut wrappers = self.inner.wrappers.borrow_mut();
        let before = wrappers.len();
        wrappers.retain(|_, w| w.strong_count() > 0);
        let removed = before - wrappers.len();
        if removed > 0 {
            log::debug!("collected {removed} dead wrapper entries");
        }
        removed
    }

    /// Number of live wrappers known to this scope.
    pub fn wrapper_count(&self) -> usize {
        self.inner
            .wrappers
            .borrow()
            .values()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    /// Number of wrappers currently pinned against host collection.
    pub fn pinned_count(&self) -> usize {
        self.inner.pinned.borrow().len()
    }

    pub(crate) fn inner_weak(&self) -> Weak<ScopeInner> {
        Rc::downgrade(&self.inner)
    }
}

impl Default for HostScope {
    fn default() -> Self {
        HostScope::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splice_timeline_core::Marker;

    fn as_node(marker: &Rc<Marker>) -> Rc<dyn SerializableObject> {
        marker.clone()
    }

    #[test]
    fn handles_are_interned_per_object() {
        let scope = HostScope::new();
        let marker = Marker::new("m");
        let node = as_node(&marker);
        let a = scope.handle_for(&node);
        let b = scope.handle_for(&node);
        assert!(a.is_same(&b));
        assert_eq!(scope.wrapper_count(), 1);

        let other = as_node(&Marker::new("n"));
        let c = scope.handle_for(&other);
        assert!(!a.is_same(&c));
    }

    #[test]
    fn expando_properties_survive_identity_hits() {
        let scope = HostScope::new();
        let marker = Marker::new("m");
        let node = as_node(&marker);
        // The binding keeps the wrapper alive; interning then hands every
        // later handle the same property table.
        let handle = scope.handle_for(&node);
        handle.set_property("color", "red");
        assert_eq!(
            scope.handle_for(&node).property("color"),
            Some(HostValue::from("red"))
        );
    }

    #[test]
    fn collect_prunes_dead_wrappers() {
        let scope = HostScope::new();
        let marker = Marker::new("m");
        let node = as_node(&marker);
        let handle = scope.handle_for(&node);
        assert_eq!(scope.collect(), 0);
        drop(handle);
        assert_eq!(scope.wrapper_count(), 0);
        assert_eq!(scope.collect(), 1);
    }

    #[test]
    fn host_value_equality_is_structural_with_identity_fast_path() {
        let a = HostArray::from_values([HostValue::from(1.0), HostValue::from("x")]);
        let b = a.clone();
        assert_eq!(HostValue::from(a.clone()), HostValue::from(b));
        let c = HostArray::from_values([HostValue::from(1.0), HostValue::from("x")]);
        assert_eq!(HostValue::from(a), HostValue::from(c));
        assert_ne!(HostValue::Number(f64::NAN), HostValue::Number(f64::NAN));
    }

    #[test]
    fn symbols_are_unique() {
        let scope = HostScope::new();
        let a = scope.make_symbol();
        let b = scope.make_symbol();
        assert_ne!(a, b);
        assert_eq!(HostKey::from(a).type_name(), "symbol");
    }
}
