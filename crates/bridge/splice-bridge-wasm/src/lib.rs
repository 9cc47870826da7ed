//! wasm-bindgen surface over the Splice ownership bridge.
//!
//! JavaScript reaches the object graph through three shapes exported here:
//! [`BridgeScope`] (one realm with its identity map, pin table and number
//! policy), [`SpliceObject`] (the canonical wrapper for one graph object)
//! and the sequence list classes over membership vectors. Values cross the
//! boundary under the same rules the native bridge applies: conversion
//! always copies, object references bridge out as wrappers, and writes into
//! membership vectors take an owning hold.

use std::rc::Rc;

use js_sys::{Array, BigInt, Function, Object, Reflect};
use serde_wasm_bindgen as swb;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use splice_bridge_core::{
    bigint_to_value, bridge_object, number_to_value, BridgeError, HostHandle, HostScope,
    NumberPolicy, ScopeConfig, SequenceProxy,
};
use splice_timeline_core::{
    time, Composition, Dictionary, Effect, Item, Marker, Sequence, SerializableObject, Value,
};

// console_error_panic_hook is invoked via its fully qualified path when the
// feature is enabled.

/// Helper function to check if a JsValue is undefined or null
fn jsvalue_is_undefined_or_null(v: &JsValue) -> bool {
    v.is_undefined() || v.is_null()
}

fn js_error(err: BridgeError) -> JsError {
    JsError::new(&err.to_string())
}

/// Get the ABI version for compatibility checks
#[wasm_bindgen]
pub fn abi_version() -> u32 {
    1
}

/// A point in time expressed as `value` ticks at `rate` ticks per second.
///
/// Crosses the boundary by value; two equal times carry no shared identity.
#[wasm_bindgen]
#[derive(Clone, Copy)]
pub struct RationalTime {
    inner: time::RationalTime,
}

#[wasm_bindgen]
impl RationalTime {
    #[wasm_bindgen(constructor)]
    pub fn new(value: f64, rate: f64) -> RationalTime {
        RationalTime {
            inner: time::RationalTime::new(value, rate),
        }
    }

    pub fn value(&self) -> f64 {
        self.inner.value
    }

    pub fn rate(&self) -> f64 {
        self.inner.rate
    }

    #[wasm_bindgen(js_name = toSeconds)]
    pub fn to_seconds(&self) -> f64 {
        self.inner.to_seconds()
    }
}

/// A half-open interval `[startTime, startTime + duration)`.
#[wasm_bindgen]
#[derive(Clone, Copy)]
pub struct TimeRange {
    inner: time::TimeRange,
}

#[wasm_bindgen]
impl TimeRange {
    #[wasm_bindgen(constructor)]
    pub fn new(start_time: &RationalTime, duration: &RationalTime) -> TimeRange {
        TimeRange {
            inner: time::TimeRange::new(start_time.inner, duration.inner),
        }
    }

    #[wasm_bindgen(js_name = startTime)]
    pub fn start_time(&self) -> RationalTime {
        RationalTime {
            inner: self.inner.start_time,
        }
    }

    pub fn duration(&self) -> RationalTime {
        RationalTime {
            inner: self.inner.duration,
        }
    }

    #[wasm_bindgen(js_name = endTimeExclusive)]
    pub fn end_time_exclusive(&self) -> RationalTime {
        RationalTime {
            inner: self.inner.end_time_exclusive(),
        }
    }
}

/// An affine mapping applied to times: scale about zero, then offset.
#[wasm_bindgen]
#[derive(Clone, Copy)]
pub struct TimeTransform {
    inner: time::TimeTransform,
}

#[wasm_bindgen]
impl TimeTransform {
    #[wasm_bindgen(constructor)]
    pub fn new(offset: &RationalTime, scale: f64) -> TimeTransform {
        TimeTransform {
            inner: time::TimeTransform::new(offset.inner, scale),
        }
    }

    pub fn offset(&self) -> RationalTime {
        RationalTime {
            inner: self.inner.offset,
        }
    }

    pub fn scale(&self) -> f64 {
        self.inner.scale
    }

    #[wasm_bindgen(js_name = appliedTo)]
    pub fn applied_to(&self, time: &RationalTime) -> RationalTime {
        RationalTime {
            inner: self.inner.applied_to(time.inner),
        }
    }
}

/// The constructor name of a JS object, when it has one.
fn class_of(value: &JsValue) -> Option<String> {
    let ctor = Reflect::get(value, &JsValue::from_str("constructor")).ok()?;
    let ctor = ctor.dyn_ref::<Function>()?;
    ctor.name().as_string()
}

/// Reads `key` off a JS object, invoking it when it is an accessor method.
fn probe_field(value: &JsValue, key: &str) -> Result<JsValue, JsError> {
    let field = Reflect::get(value, &JsValue::from_str(key))
        .map_err(|_| JsError::new(&format!("expected a '{key}' field")))?;
    if let Some(method) = field.dyn_ref::<Function>() {
        return method
            .call0(value)
            .map_err(|_| JsError::new(&format!("'{key}' accessor failed")));
    }
    Ok(field)
}

fn f64_field(value: &JsValue, key: &str) -> Result<f64, JsError> {
    probe_field(value, key)?
        .as_f64()
        .ok_or_else(|| JsError::new(&format!("expected a numeric '{key}' field")))
}

fn time_from_js(value: &JsValue) -> Result<time::RationalTime, JsError> {
    Ok(time::RationalTime::new(
        f64_field(value, "value")?,
        f64_field(value, "rate")?,
    ))
}

fn range_from_js(value: &JsValue) -> Result<time::TimeRange, JsError> {
    let start_time = probe_field(value, "startTime")?;
    let duration = probe_field(value, "duration")?;
    Ok(time::TimeRange::new(
        time_from_js(&start_time)?,
        time_from_js(&duration)?,
    ))
}

fn transform_from_js(value: &JsValue) -> Result<time::TimeTransform, JsError> {
    let offset = probe_field(value, "offset")?;
    Ok(time::TimeTransform::new(
        time_from_js(&offset)?,
        f64_field(value, "scale")?,
    ))
}

/// Converts a JS value into the native model.
///
/// The value's shape is inspected in the same order the native bridge uses:
/// null/undefined, boolean, number, bigint, string, array, the three time
/// classes (recognized by constructor name), then plain object. Anything
/// else, including already bridged wrappers, has no native representation.
fn js_to_value(scope: &HostScope, value: &JsValue) -> Result<Value, JsError> {
    if jsvalue_is_undefined_or_null(value) {
        return Ok(Value::Null);
    }
    if let Some(b) = value.as_bool() {
        return Ok(Value::Bool(b));
    }
    if let Some(n) = value.as_f64() {
        return Ok(number_to_value(scope.number_policy(), n));
    }
    if let Some(big) = value.dyn_ref::<BigInt>() {
        return match i128::try_from(big.clone()) {
            Ok(b) => bigint_to_value(b).map_err(js_error),
            Err(_) => Err(js_error(BridgeError::unsupported_value("bigint"))),
        };
    }
    if let Some(s) = value.as_string() {
        return Ok(Value::Str(s));
    }
    if Array::is_array(value) {
        let array = Array::from(value);
        let mut seq = Sequence::with_capacity(array.length() as usize);
        for entry in array.iter() {
            seq.push(js_to_value(scope, &entry)?);
        }
        return Ok(Value::Sequence(seq));
    }
    if value.is_object() {
        match class_of(value).as_deref() {
            Some("RationalTime") => return Ok(Value::RationalTime(time_from_js(value)?)),
            Some("TimeRange") => return Ok(Value::TimeRange(range_from_js(value)?)),
            Some("TimeTransform") => return Ok(Value::TimeTransform(transform_from_js(value)?)),
            Some("Object") | None => {}
            Some(other) => return Err(js_error(BridgeError::unsupported_value(other))),
        }
        let keys = Reflect::own_keys(value)
            .map_err(|_| js_error(BridgeError::Internal("object keys are not readable".into())))?;
        let mut dict = Dictionary::new();
        for key in keys.iter() {
            match key.as_string() {
                Some(name) => {
                    let entry = Reflect::get(value, &key).map_err(|_| {
                        js_error(BridgeError::Internal("object property read failed".into()))
                    })?;
                    dict.insert(name, js_to_value(scope, &entry)?);
                }
                None => {
                    let key_type = key
                        .js_typeof()
                        .as_string()
                        .unwrap_or_else(|| "unknown".to_string());
                    return Err(js_error(BridgeError::KeyType { key_type }));
                }
            }
        }
        return Ok(Value::Dictionary(dict));
    }
    let type_name = value
        .js_typeof()
        .as_string()
        .unwrap_or_else(|| "unknown".to_string());
    Err(js_error(BridgeError::unsupported_value(type_name)))
}

/// Converts a native value into its JS representation.
///
/// Containers copy into fresh JS containers; object references bridge out
/// as [`SpliceObject`] wrappers in `scope`.
fn value_to_js(scope: &HostScope, value: &Value) -> Result<JsValue, JsError> {
    Ok(match value {
        Value::Null => JsValue::NULL,
        Value::Bool(b) => JsValue::from_bool(*b),
        Value::Int32(n) => JsValue::from_f64(*n as f64),
        Value::Int64(n) => BigInt::from(*n).into(),
        Value::UInt64(n) => BigInt::from(*n).into(),
        Value::Double(n) => JsValue::from_f64(*n),
        Value::Str(s) => JsValue::from_str(s),
        Value::RationalTime(t) => RationalTime { inner: *t }.into(),
        Value::TimeRange(r) => TimeRange { inner: *r }.into(),
        Value::TimeTransform(x) => TimeTransform { inner: *x }.into(),
        Value::Object(reference) => {
            let node = reference.upgrade().ok_or_else(|| {
                js_error(BridgeError::unsupported_type("reference to a disposed object"))
            })?;
            let handle = bridge_object(scope, &node, false);
            SpliceObject::wrap(scope, handle).into()
        }
        Value::Dictionary(dict) => {
            let out = Object::new();
            for (key, entry) in dict.iter() {
                let converted = value_to_js(scope, entry)?;
                Reflect::set(&out, &JsValue::from_str(key), &converted).map_err(|_| {
                    js_error(BridgeError::Internal("host object rejected a property".into()))
                })?;
            }
            out.into()
        }
        Value::Sequence(seq) => {
            let out = Array::new();
            for entry in seq {
                out.push(&value_to_js(scope, entry)?);
            }
            out.into()
        }
    })
}

/// The JS face of one graph object.
///
/// Wrapper identity is interned per scope, so any two of these for the same
/// live object share one wrapper; `isSame` compares that identity. Holding a
/// `SpliceObject` keeps its target alive, and letting the host collect every
/// one of them drops the bridge's hold.
#[wasm_bindgen]
pub struct SpliceObject {
    scope: HostScope,
    handle: HostHandle,
}

impl SpliceObject {
    fn wrap(scope: &HostScope, handle: HostHandle) -> SpliceObject {
        SpliceObject {
            scope: scope.clone(),
            handle,
        }
    }

    fn node(&self) -> &Rc<dyn SerializableObject> {
        self.handle.node()
    }
}

#[wasm_bindgen]
impl SpliceObject {
    #[wasm_bindgen(js_name = schemaName)]
    pub fn schema_name(&self) -> String {
        self.handle.schema_name().to_string()
    }

    /// True when both wrappers refer to the same graph object.
    #[wasm_bindgen(js_name = isSame)]
    pub fn is_same(&self, other: &SpliceObject) -> bool {
        self.handle.is_same(&other.handle)
    }

    pub fn name(&self) -> Result<String, JsError> {
        let any = self.node().as_any();
        if let Some(marker) = any.downcast_ref::<Marker>() {
            Ok(marker.name())
        } else if let Some(effect) = any.downcast_ref::<Effect>() {
            Ok(effect.name())
        } else if let Some(item) = any.downcast_ref::<Item>() {
            Ok(item.name())
        } else if let Some(composition) = any.downcast_ref::<Composition>() {
            Ok(composition.name())
        } else {
            Err(JsError::new(&format!(
                "schema '{}' has no name",
                self.handle.schema_name()
            )))
        }
    }

    #[wasm_bindgen(js_name = setName)]
    pub fn set_name(&self, name: &str) -> Result<(), JsError> {
        let any = self.node().as_any();
        if let Some(marker) = any.downcast_ref::<Marker>() {
            marker.set_name(name);
        } else if let Some(effect) = any.downcast_ref::<Effect>() {
            effect.set_name(name);
        } else if let Some(item) = any.downcast_ref::<Item>() {
            item.set_name(name);
        } else if let Some(composition) = any.downcast_ref::<Composition>() {
            composition.set_name(name);
        } else {
            return Err(JsError::new(&format!(
                "schema '{}' has no name",
                self.handle.schema_name()
            )));
        }
        Ok(())
    }

    #[wasm_bindgen(js_name = effectName)]
    pub fn effect_name(&self) -> Result<String, JsError> {
        let effect = self.handle.downcast::<Effect>().map_err(js_error)?;
        Ok(effect.effect_name())
    }

    #[wasm_bindgen(js_name = setEffectName)]
    pub fn set_effect_name(&self, effect_name: &str) -> Result<(), JsError> {
        let effect = self.handle.downcast::<Effect>().map_err(js_error)?;
        effect.set_effect_name(effect_name);
        Ok(())
    }

    #[wasm_bindgen(js_name = markedRange)]
    pub fn marked_range(&self) -> Result<TimeRange, JsError> {
        let marker = self.handle.downcast::<Marker>().map_err(js_error)?;
        Ok(TimeRange {
            inner: marker.marked_range(),
        })
    }

    #[wasm_bindgen(js_name = setMarkedRange)]
    pub fn set_marked_range(&self, range: &TimeRange) -> Result<(), JsError> {
        let marker = self.handle.downcast::<Marker>().map_err(js_error)?;
        marker.set_marked_range(range.inner);
        Ok(())
    }

    /// The dynamic field stored under `key`, or `undefined` when absent.
    #[wasm_bindgen(js_name = getField)]
    pub fn get_field(&self, key: &str) -> Result<JsValue, JsError> {
        match self.node().base().dynamic_field(key) {
            Some(value) => value_to_js(&self.scope, &value),
            None => Ok(JsValue::UNDEFINED),
        }
    }

    #[wasm_bindgen(js_name = setField)]
    pub fn set_field(&self, key: &str, value: JsValue) -> Result<(), JsError> {
        let value = js_to_value(&self.scope, &value)?;
        self.node().base().set_dynamic_field(key, value);
        Ok(())
    }

    /// A copy of every dynamic field as a plain JS object.
    pub fn fields(&self) -> Result<JsValue, JsError> {
        let fields = self.node().base().dynamic_fields();
        value_to_js(&self.scope, &Value::Dictionary(fields))
    }

    /// Replaces the dynamic fields wholesale. `fields` must convert to a
    /// dictionary.
    #[wasm_bindgen(js_name = setFields)]
    pub fn set_fields(&self, fields: JsValue) -> Result<(), JsError> {
        match js_to_value(&self.scope, &fields)? {
            Value::Dictionary(dict) => {
                self.node().base().set_dynamic_fields(dict);
                Ok(())
            }
            other => Err(js_error(BridgeError::TypeMismatch {
                expected: "dictionary".to_string(),
                actual: other.kind().name().to_string(),
            })),
        }
    }

    /// Inserts `child` into this composition at `index`, taking ownership.
    #[wasm_bindgen(js_name = insertChild)]
    pub fn insert_child(&self, index: u32, child: &SpliceObject) -> Result<(), JsError> {
        let composition = self.handle.downcast::<Composition>().map_err(js_error)?;
        let item = child.handle.downcast::<Item>().map_err(js_error)?;
        composition
            .insert_child(index as usize, item)
            .map_err(BridgeError::from)
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = appendChild)]
    pub fn append_child(&self, child: &SpliceObject) -> Result<(), JsError> {
        let composition = self.handle.downcast::<Composition>().map_err(js_error)?;
        let item = child.handle.downcast::<Item>().map_err(js_error)?;
        composition
            .append_child(item)
            .map_err(BridgeError::from)
            .map_err(js_error)
    }

    /// Removes the child at `index`, releasing this composition's hold on it.
    #[wasm_bindgen(js_name = removeChild)]
    pub fn remove_child(&self, index: u32) -> Result<(), JsError> {
        let composition = self.handle.downcast::<Composition>().map_err(js_error)?;
        composition
            .remove_child(index as usize)
            .map(|_| ())
            .map_err(BridgeError::from)
            .map_err(js_error)
    }

    /// The child at `index`, bridged out as a wrapper.
    #[wasm_bindgen(js_name = childAt)]
    pub fn child_at(&self, index: u32) -> Result<SpliceObject, JsError> {
        let composition = self.handle.downcast::<Composition>().map_err(js_error)?;
        let child = composition
            .child_at(index as usize)
            .map_err(BridgeError::from)
            .map_err(js_error)?;
        let node: Rc<dyn SerializableObject> = child;
        let handle = bridge_object(&self.scope, &node, false);
        Ok(SpliceObject::wrap(&self.scope, handle))
    }

    /// This item's marker sequence as a mutable list view.
    pub fn markers(&self) -> Result<MarkerList, JsError> {
        let item = self.handle.downcast::<Item>().map_err(js_error)?;
        Ok(MarkerList::over(&self.scope, &item))
    }

    /// This item's effect sequence as a mutable list view.
    pub fn effects(&self) -> Result<EffectList, JsError> {
        let item = self.handle.downcast::<Item>().map_err(js_error)?;
        Ok(EffectList::over(&self.scope, &item))
    }

    /// This composition's children as a mutable list view.
    pub fn children(&self) -> Result<ChildList, JsError> {
        let composition = self.handle.downcast::<Composition>().map_err(js_error)?;
        Ok(ChildList::over(&self.scope, &composition))
    }
}

macro_rules! sequence_list {
    ($list:ident, $iter:ident, $owner:ty, $element:ty, $project:expr, $desc:literal) => {
        #[doc = concat!("Mutable list view over the ", $desc, ".")]
        ///
        /// Indexes follow host conventions: negative values count from the
        /// end, `insert` past the end appends and `delItem` past the end
        /// removes the tail element.
        #[wasm_bindgen]
        pub struct $list {
            scope: HostScope,
            proxy: SequenceProxy<$owner, $element>,
        }

        impl $list {
            fn over(scope: &HostScope, owner: &Rc<$owner>) -> $list {
                $list {
                    scope: scope.clone(),
                    proxy: SequenceProxy::new(scope, owner, $project),
                }
            }
        }

        #[wasm_bindgen]
        impl $list {
            pub fn length(&self) -> u32 {
                self.proxy.len() as u32
            }

            /// The element at `index`, bridged out as a wrapper.
            pub fn at(&self, index: i32) -> Result<SpliceObject, JsError> {
                let handle = self.proxy.at(index).map_err(js_error)?;
                Ok(SpliceObject::wrap(&self.scope, handle))
            }

            /// Replaces the element at `index`, taking ownership of `value`.
            #[wasm_bindgen(js_name = setItem)]
            pub fn set_item(&self, index: i32, value: &SpliceObject) -> Result<(), JsError> {
                self.proxy.set_item(index, &value.handle).map_err(js_error)
            }

            /// Inserts `value` before `index`, taking ownership of it.
            pub fn insert(&self, index: i32, value: &SpliceObject) -> Result<(), JsError> {
                self.proxy.insert(index, &value.handle).map_err(js_error)
            }

            /// Appends `value`, taking ownership of it.
            pub fn push(&self, value: &SpliceObject) -> Result<(), JsError> {
                self.proxy.push(&value.handle).map_err(js_error)
            }

            /// Removes the element at `index`, releasing the sequence's hold.
            #[wasm_bindgen(js_name = delItem)]
            pub fn del_item(&self, index: i32) -> Result<(), JsError> {
                self.proxy.del_item(index).map_err(js_error)
            }

            /// A cursor over the live sequence. Elements are read from the
            /// underlying vector at each step, so mutations made while
            /// iterating are observed.
            pub fn iterate(&self) -> $iter {
                $iter {
                    scope: self.scope.clone(),
                    proxy: SequenceProxy::new(&self.scope, self.proxy.owner(), $project),
                    cursor: 0,
                }
            }
        }

        #[doc = concat!("Cursor over the ", $desc, ". Not restartable.")]
        #[wasm_bindgen]
        pub struct $iter {
            scope: HostScope,
            proxy: SequenceProxy<$owner, $element>,
            cursor: i32,
        }

        #[wasm_bindgen]
        impl $iter {
            /// The next element, or `undefined` once the cursor moves past
            /// the end of the sequence.
            pub fn next(&mut self) -> Option<SpliceObject> {
                let handle = self.proxy.at(self.cursor).ok()?;
                self.cursor += 1;
                Some(SpliceObject::wrap(&self.scope, handle))
            }
        }
    };
}

sequence_list!(
    MarkerList,
    MarkerListIter,
    Item,
    Marker,
    Item::markers,
    "markers of an item"
);
sequence_list!(
    EffectList,
    EffectListIter,
    Item,
    Effect,
    Item::effects,
    "effects of an item"
);
sequence_list!(
    ChildList,
    ChildListIter,
    Composition,
    Item,
    Composition::children,
    "children of a composition"
);

/// One bridged realm. Every wrapper, pin and conversion made through this
/// scope shares its identity map and number policy.
#[wasm_bindgen]
pub struct BridgeScope {
    scope: HostScope,
}

impl BridgeScope {
    fn bridge<T: SerializableObject>(&self, node: Rc<T>) -> SpliceObject {
        let node: Rc<dyn SerializableObject> = node;
        let handle = bridge_object(&self.scope, &node, false);
        SpliceObject::wrap(&self.scope, handle)
    }
}

#[wasm_bindgen]
impl BridgeScope {
    /// Create a new scope. Pass a config object or undefined/null for
    /// defaults.
    /// Example:
    ///   new BridgeScope({ numberPolicy: "legacy_int32" })
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<BridgeScope, JsError> {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        let config: ScopeConfig = if jsvalue_is_undefined_or_null(&config) {
            ScopeConfig::default()
        } else {
            swb::from_value(config).map_err(|e| JsError::new(&format!("config error: {e}")))?
        };
        Ok(BridgeScope {
            scope: HostScope::with_config(config),
        })
    }

    #[wasm_bindgen(js_name = createMarker)]
    pub fn create_marker(&self, name: &str) -> SpliceObject {
        self.bridge(Marker::new(name))
    }

    #[wasm_bindgen(js_name = createEffect)]
    pub fn create_effect(&self, name: &str, effect_name: &str) -> SpliceObject {
        self.bridge(Effect::new(name, effect_name))
    }

    #[wasm_bindgen(js_name = createItem)]
    pub fn create_item(&self, name: &str) -> SpliceObject {
        self.bridge(Item::new(name))
    }

    #[wasm_bindgen(js_name = createComposition)]
    pub fn create_composition(&self, name: &str) -> SpliceObject {
        self.bridge(Composition::new(name))
    }

    /// Converts a JS value into the native model and back, showing what
    /// native code receives under the current number policy.
    pub fn roundtrip(&self, value: JsValue) -> Result<JsValue, JsError> {
        let native = js_to_value(&self.scope, &value)?;
        value_to_js(&self.scope, &native)
    }

    /// The scope's number policy as its config string.
    #[wasm_bindgen(js_name = numberPolicy)]
    pub fn number_policy(&self) -> Result<JsValue, JsError> {
        swb::to_value(&self.scope.number_policy())
            .map_err(|e| JsError::new(&format!("policy error: {e}")))
    }

    #[wasm_bindgen(js_name = setNumberPolicy)]
    pub fn set_number_policy(&self, policy: JsValue) -> Result<(), JsError> {
        let policy: NumberPolicy =
            swb::from_value(policy).map_err(|e| JsError::new(&format!("policy error: {e}")))?;
        self.scope.set_number_policy(policy);
        Ok(())
    }

    /// Drops identity-map entries whose wrappers the host has collected.
    /// Returns the number of entries removed.
    pub fn collect(&self) -> u32 {
        self.scope.collect() as u32
    }

    /// Number of live wrappers known to this scope.
    #[wasm_bindgen(js_name = wrapperCount)]
    pub fn wrapper_count(&self) -> u32 {
        self.scope.wrapper_count() as u32
    }

    /// Number of wrappers currently pinned against host collection.
    #[wasm_bindgen(js_name = pinnedCount)]
    pub fn pinned_count(&self) -> u32 {
        self.scope.pinned_count() as u32
    }
}
