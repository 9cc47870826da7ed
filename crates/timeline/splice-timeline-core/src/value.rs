//! Type-erased values stored in dynamic fields and exchanged with host runtimes.
//!
//! `Value` is a closed union over the kinds the bridge understands. Containers
//! nest arbitrarily; `ObjectRef` points into the object graph without owning
//! its target.

use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::object::SerializableObject;
use crate::status::Status;
use crate::time::{RationalTime, TimeRange, TimeTransform};

/// Discriminant for every value shape the bridge can carry.
///
/// The declaration order is stable and dense: `kind as usize` indexes the
/// conversion dispatch table, so new kinds append at the end.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    Int32,
    Int64,
    UInt64,
    Double,
    Str,
    RationalTime,
    TimeRange,
    TimeTransform,
    Object,
    Dictionary,
    Sequence,
}

impl ValueKind {
    /// Number of registered kinds, and the length of the dispatch table.
    pub const COUNT: usize = 13;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Int32 => "int32",
            ValueKind::Int64 => "int64",
            ValueKind::UInt64 => "uint64",
            ValueKind::Double => "double",
            ValueKind::Str => "string",
            ValueKind::RationalTime => "RationalTime",
            ValueKind::TimeRange => "TimeRange",
            ValueKind::TimeTransform => "TimeTransform",
            ValueKind::Object => "object",
            ValueKind::Dictionary => "dictionary",
            ValueKind::Sequence => "sequence",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Ordered sequence of values. Element order is payload, so equality is
/// positional.
pub type Sequence = Vec<Value>;

/// A type-erased value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    Str(String),
    RationalTime(RationalTime),
    TimeRange(TimeRange),
    TimeTransform(TimeTransform),
    Object(ObjectRef),
    Dictionary(Dictionary),
    Sequence(Sequence),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int32(_) => ValueKind::Int32,
            Value::Int64(_) => ValueKind::Int64,
            Value::UInt64(_) => ValueKind::UInt64,
            Value::Double(_) => ValueKind::Double,
            Value::Str(_) => ValueKind::Str,
            Value::RationalTime(_) => ValueKind::RationalTime,
            Value::TimeRange(_) => ValueKind::TimeRange,
            Value::TimeTransform(_) => ValueKind::TimeTransform,
            Value::Object(_) => ValueKind::Object,
            Value::Dictionary(_) => ValueKind::Dictionary,
            Value::Sequence(_) => ValueKind::Sequence,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Result<bool, Status> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch(ValueKind::Bool, other)),
        }
    }

    pub fn as_int32(&self) -> Result<i32, Status> {
        match self {
            Value::Int32(n) => Ok(*n),
            other => Err(mismatch(ValueKind::Int32, other)),
        }
    }

    pub fn as_int64(&self) -> Result<i64, Status> {
        match self {
            Value::Int64(n) => Ok(*n),
            other => Err(mismatch(ValueKind::Int64, other)),
        }
    }

    pub fn as_uint64(&self) -> Result<u64, Status> {
        match self {
            Value::UInt64(n) => Ok(*n),
            other => Err(mismatch(ValueKind::UInt64, other)),
        }
    }

    pub fn as_double(&self) -> Result<f64, Status> {
        match self {
            Value::Double(n) => Ok(*n),
            other => Err(mismatch(ValueKind::Double, other)),
        }
    }

    pub fn as_str(&self) -> Result<&str, Status> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(mismatch(ValueKind::Str, other)),
        }
    }

    pub fn as_rational_time(&self) -> Result<RationalTime, Status> {
        match self {
            Value::RationalTime(t) => Ok(*t),
            other => Err(mismatch(ValueKind::RationalTime, other)),
        }
    }

    pub fn as_time_range(&self) -> Result<TimeRange, Status> {
        match self {
            Value::TimeRange(r) => Ok(*r),
            other => Err(mismatch(ValueKind::TimeRange, other)),
        }
    }

    pub fn as_time_transform(&self) -> Result<TimeTransform, Status> {
        match self {
            Value::TimeTransform(x) => Ok(*x),
            other => Err(mismatch(ValueKind::TimeTransform, other)),
        }
    }

    pub fn as_object(&self) -> Result<&ObjectRef, Status> {
        match self {
            Value::Object(o) => Ok(o),
            other => Err(mismatch(ValueKind::Object, other)),
        }
    }

    pub fn as_dictionary(&self) -> Result<&Dictionary, Status> {
        match self {
            Value::Dictionary(d) => Ok(d),
            other => Err(mismatch(ValueKind::Dictionary, other)),
        }
    }

    pub fn as_sequence(&self) -> Result<&Sequence, Status> {
        match self {
            Value::Sequence(s) => Ok(s),
            other => Err(mismatch(ValueKind::Sequence, other)),
        }
    }
}

fn mismatch(expected: ValueKind, actual: &Value) -> Status {
    Status::type_mismatch(expected.name(), actual.kind().name())
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::UInt64(a), Value::UInt64(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::RationalTime(a), Value::RationalTime(b)) => a == b,
            (Value::TimeRange(a), Value::TimeRange(b)) => a == b,
            (Value::TimeTransform(a), Value::TimeTransform(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Dictionary(a), Value::Dictionary(b)) => a == b,
            (Value::Sequence(a), Value::Sequence(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<RationalTime> for Value {
    fn from(v: RationalTime) -> Self {
        Value::RationalTime(v)
    }
}

impl From<TimeRange> for Value {
    fn from(v: TimeRange) -> Self {
        Value::TimeRange(v)
    }
}

impl From<TimeTransform> for Value {
    fn from(v: TimeTransform) -> Self {
        Value::TimeTransform(v)
    }
}

impl From<Dictionary> for Value {
    fn from(v: Dictionary) -> Self {
        Value::Dictionary(v)
    }
}

impl From<Sequence> for Value {
    fn from(v: Sequence) -> Self {
        Value::Sequence(v)
    }
}

/// String-keyed mapping with stable insertion order.
///
/// Equality ignores insertion order; two dictionaries are equal when they hold
/// the same key set with equal values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dictionary {
    entries: IndexMap<String, Value>,
}

impl Dictionary {
    pub fn new() -> Self {
        Dictionary {
            entries: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
}

impl FromIterator<(String, Value)> for Dictionary {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Dictionary {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Dictionary {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Non-owning reference to a graph object.
///
/// Holding an `ObjectRef` never extends the target's lifetime; `upgrade`
/// returns `None` once the target has been disposed.
#[derive(Clone)]
pub struct ObjectRef {
    target: Weak<dyn SerializableObject>,
}

impl ObjectRef {
    pub fn new(target: &Rc<dyn SerializableObject>) -> Self {
        ObjectRef {
            target: Rc::downgrade(target),
        }
    }

    pub fn upgrade(&self) -> Option<Rc<dyn SerializableObject>> {
        self.target.upgrade()
    }

    /// Identity comparison; two refs are equal when they point at the same
    /// allocation.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Weak::ptr_eq(&self.target, &other.target)
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target.upgrade() {
            Some(obj) => write!(f, "ObjectRef({})", obj.schema_name()),
            None => f.write_str("ObjectRef(<disposed>)"),
        }
    }
}
