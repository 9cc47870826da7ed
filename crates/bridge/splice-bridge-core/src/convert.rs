//! Value conversion between the native model and a host scope.
//!
//! `value_to_host` routes through a kind-indexed dispatch table built once on
//! first use and read-only after that. `host_to_value` inspects the host
//! value's runtime shape in a fixed order. Container conversions copy into
//! fresh host containers; the result never aliases the native source, so
//! edits on one side are invisible to the other.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use splice_timeline_core::{Dictionary, Sequence, Value, ValueKind};

use crate::error::BridgeError;
use crate::host::{HostArray, HostFunction, HostKey, HostObject, HostScope, HostValue};
use crate::keepalive::bridge_object;

/// How host numbers map back onto native numeric kinds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberPolicy {
    /// Every host number lands as `Int32`, truncating fractions and
    /// saturating out-of-range magnitudes.
    LegacyInt32,
    /// Integral numbers take the narrowest integer kind that fits; everything
    /// else stays `Double`.
    #[default]
    Widen,
}

type ToHostFn = fn(&HostScope, &Value, bool) -> Result<HostValue, BridgeError>;

struct DispatchTable {
    entries: [Option<ToHostFn>; ValueKind::COUNT],
}

static TO_HOST: OnceLock<DispatchTable> = OnceLock::new();

fn to_host_table() -> &'static DispatchTable {
    TO_HOST.get_or_init(DispatchTable::build)
}

impl DispatchTable {
    fn build() -> Self {
        log::trace!("building host conversion dispatch table");
        let mut entries: [Option<ToHostFn>; ValueKind::COUNT] = [None; ValueKind::COUNT];
        entries[ValueKind::Null.index()] = Some(|_, _, _| Ok(HostValue::Null));
        entries[ValueKind::Bool.index()] = Some(|_, v, _| Ok(HostValue::Bool(v.as_bool()?)));
        entries[ValueKind::Int32.index()] =
            Some(|_, v, _| Ok(HostValue::Number(v.as_int32()? as f64)));
        entries[ValueKind::Int64.index()] =
            Some(|_, v, _| Ok(HostValue::BigInt(v.as_int64()? as i128)));
        entries[ValueKind::UInt64.index()] =
            Some(|_, v, _| Ok(HostValue::BigInt(v.as_uint64()? as i128)));
        entries[ValueKind::Double.index()] =
            Some(|_, v, _| Ok(HostValue::Number(v.as_double()?)));
        entries[ValueKind::Str.index()] =
            Some(|_, v, _| Ok(HostValue::Str(v.as_str()?.to_string())));
        entries[ValueKind::RationalTime.index()] =
            Some(|_, v, _| Ok(HostValue::RationalTime(v.as_rational_time()?)));
        entries[ValueKind::TimeRange.index()] =
            Some(|_, v, _| Ok(HostValue::TimeRange(v.as_time_range()?)));
        entries[ValueKind::TimeTransform.index()] =
            Some(|_, v, _| Ok(HostValue::TimeTransform(v.as_time_transform()?)));
        entries[ValueKind::Object.index()] = Some(|scope, v, _| {
            let target = v
                .as_object()?
                .upgrade()
                .ok_or_else(|| BridgeError::unsupported_type("reference to a disposed object"))?;
            Ok(HostValue::Handle(bridge_object(scope, &target, false)))
        });
        entries[ValueKind::Dictionary.index()] = Some(|scope, v, _| {
            Ok(HostValue::Object(dictionary_to_host(
                scope,
                v.as_dictionary()?,
            )?))
        });
        entries[ValueKind::Sequence.index()] = Some(|scope, v, _| {
            Ok(HostValue::Array(sequence_to_host(scope, v.as_sequence()?)?))
        });
        DispatchTable { entries }
    }
}

/// Converts a native value into its host representation.
///
/// `top_level` marks the root of a conversion as opposed to a value nested
/// inside a container; both take the same copying path here, the flag exists
/// so a proxy-sharing surface could branch on it without changing callers.
pub fn value_to_host(
    scope: &HostScope,
    value: &Value,
    top_level: bool,
) -> Result<HostValue, BridgeError> {
    let kind = value.kind();
    let entry = to_host_table().entries[kind.index()].ok_or_else(|| {
        BridgeError::unsupported_type(format!("no conversion registered for kind '{kind}'"))
    })?;
    entry(scope, value, top_level)
}

/// Converts a host value into a native one.
///
/// The host value's shape is inspected in a fixed order: null/undefined,
/// boolean, number, bigint, string, array, the three time-algebra types,
/// then plain object. Anything else has no native representation.
pub fn host_to_value(scope: &HostScope, value: &HostValue) -> Result<Value, BridgeError> {
    match value {
        HostValue::Undefined | HostValue::Null => Ok(Value::Null),
        HostValue::Bool(b) => Ok(Value::Bool(*b)),
        HostValue::Number(n) => Ok(number_to_value(scope.number_policy(), *n)),
        HostValue::BigInt(b) => bigint_to_value(*b),
        HostValue::Str(s) => Ok(Value::Str(s.clone())),
        HostValue::Array(array) => Ok(Value::Sequence(host_to_sequence(scope, array)?)),
        HostValue::RationalTime(t) => Ok(Value::RationalTime(*t)),
        HostValue::TimeRange(r) => Ok(Value::TimeRange(*r)),
        HostValue::TimeTransform(x) => Ok(Value::TimeTransform(*x)),
        HostValue::Object(object) => Ok(Value::Dictionary(host_to_dictionary(scope, object)?)),
        other => Err(BridgeError::unsupported_value(other.type_name())),
    }
}

/// Copies a dictionary into a fresh host object, converting each value.
pub fn dictionary_to_host(scope: &HostScope, dict: &Dictionary) -> Result<HostObject, BridgeError> {
    let out = HostObject::new();
    for (key, value) in dict.iter() {
        out.set(key.as_str(), value_to_host(scope, value, false)?);
    }
    Ok(out)
}

/// Copies a host object's enumerable properties into a dictionary.
///
/// Fails with a key-type error on the first non-string key; nothing partial
/// is returned.
pub fn host_to_dictionary(
    scope: &HostScope,
    object: &HostObject,
) -> Result<Dictionary, BridgeError> {
    let mut dict = Dictionary::new();
    for (key, value) in object.entries() {
        let key = match key {
            HostKey::Str(s) => s,
            other => {
                return Err(BridgeError::KeyType {
                    key_type: other.type_name().to_string(),
                })
            }
        };
        dict.insert(key, host_to_value(scope, &value)?);
    }
    Ok(dict)
}

pub fn sequence_to_host(scope: &HostScope, seq: &Sequence) -> Result<HostArray, BridgeError> {
    let out = HostArray::new();
    for value in seq {
        out.push(value_to_host(scope, value, false)?);
    }
    Ok(out)
}

pub fn host_to_sequence(scope: &HostScope, array: &HostArray) -> Result<Sequence, BridgeError> {
    let mut seq = Sequence::with_capacity(array.len());
    for value in array.to_vec() {
        seq.push(host_to_value(scope, &value)?);
    }
    Ok(seq)
}

/// Invokes a host callback with native arguments, converting both ways.
///
/// Arguments cross as roots; the callback's result is converted back with
/// the scope's current number policy.
pub fn call_host_function(
    scope: &HostScope,
    function: &HostFunction,
    args: &[Value],
) -> Result<Value, BridgeError> {
    let mut host_args = Vec::with_capacity(args.len());
    for arg in args {
        host_args.push(value_to_host(scope, arg, true)?);
    }
    let result = function.call(&host_args)?;
    host_to_value(scope, &result)
}

/// Maps a host number onto a native numeric kind under `policy`.
pub fn number_to_value(policy: NumberPolicy, n: f64) -> Value {
    match policy {
        NumberPolicy::LegacyInt32 => Value::Int32(n as i32),
        NumberPolicy::Widen => {
            if !n.is_finite() || n.fract() != 0.0 {
                Value::Double(n)
            } else if (i32::MIN as f64..=i32::MAX as f64).contains(&n) {
                Value::Int32(n as i32)
            } else if (i64::MIN as f64..i64::MAX as f64).contains(&n) {
                Value::Int64(n as i64)
            } else {
                Value::Double(n)
            }
        }
    }
}

/// Maps a host big integer onto `Int64` when it fits, `UInt64` otherwise.
pub fn bigint_to_value(b: i128) -> Result<Value, BridgeError> {
    if let Ok(n) = i64::try_from(b) {
        Ok(Value::Int64(n))
    } else if let Ok(n) = u64::try_from(b) {
        Ok(Value::UInt64(n))
    } else {
        Err(BridgeError::unsupported_value("bigint"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widen_picks_the_narrowest_integer_kind() {
        assert_eq!(number_to_value(NumberPolicy::Widen, 7.0), Value::Int32(7));
        assert_eq!(
            number_to_value(NumberPolicy::Widen, 4e12),
            Value::Int64(4_000_000_000_000)
        );
        assert_eq!(number_to_value(NumberPolicy::Widen, 2.5), Value::Double(2.5));
        assert_eq!(
            number_to_value(NumberPolicy::Widen, 1e300),
            Value::Double(1e300)
        );
        assert_eq!(
            number_to_value(NumberPolicy::Widen, f64::NEG_INFINITY),
            Value::Double(f64::NEG_INFINITY)
        );
    }

    #[test]
    fn legacy_policy_truncates_to_int32() {
        assert_eq!(
            number_to_value(NumberPolicy::LegacyInt32, 3.9),
            Value::Int32(3)
        );
        assert_eq!(
            number_to_value(NumberPolicy::LegacyInt32, -1.0),
            Value::Int32(-1)
        );
    }

    #[test]
    fn bigint_maps_to_the_matching_width() {
        assert_eq!(bigint_to_value(5), Ok(Value::Int64(5)));
        assert_eq!(
            bigint_to_value(i64::MAX as i128 + 1),
            Ok(Value::UInt64(i64::MAX as u64 + 1))
        );
        assert_eq!(
            bigint_to_value(u64::MAX as i128),
            Ok(Value::UInt64(u64::MAX))
        );
        assert_eq!(
            bigint_to_value(u64::MAX as i128 + 1),
            Err(BridgeError::unsupported_value("bigint"))
        );
    }

    #[test]
    fn number_policy_deserializes_from_config_strings() {
        let policy: NumberPolicy = serde_json::from_str("\"legacy_int32\"").unwrap();
        assert_eq!(policy, NumberPolicy::LegacyInt32);
        let policy: NumberPolicy = serde_json::from_str("\"widen\"").unwrap();
        assert_eq!(policy, NumberPolicy::Widen);
    }
}
