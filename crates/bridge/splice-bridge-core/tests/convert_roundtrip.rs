use std::rc::Rc;

use splice_bridge_core::{
    call_host_function, host_to_value, value_to_host, BridgeError, HostFunction, HostObject,
    HostScope, HostValue, NumberPolicy, ScopeConfig,
};
use splice_timeline_core::{
    Dictionary, Marker, ObjectRef, RationalTime, Retainer, SerializableObject, TimeRange,
    TimeTransform, Value,
};

fn roundtrip(scope: &HostScope, value: Value) -> Value {
    let host = value_to_host(scope, &value, true).unwrap();
    host_to_value(scope, &host).unwrap()
}

#[test]
fn scalar_round_trips_preserve_kind_and_value() {
    let scope = HostScope::new();
    let cases = [
        Value::Null,
        Value::Bool(true),
        Value::Bool(false),
        Value::Int32(0),
        Value::Int32(i32::MIN),
        Value::Int32(i32::MAX),
        Value::Int64(i64::MIN),
        Value::Int64(i64::MAX),
        Value::UInt64(u64::MAX),
        Value::Double(2.5),
        Value::Double(-0.25),
        Value::Double(f64::INFINITY),
        Value::Str(String::new()),
        Value::from("grüße"),
        Value::from(RationalTime::new(24.0, 24.0)),
        Value::from(TimeRange::new(
            RationalTime::new(1.0, 30.0),
            RationalTime::new(5.0, 30.0),
        )),
        Value::from(TimeTransform::new(RationalTime::new(2.0, 24.0), 0.5)),
    ];
    for value in cases {
        assert_eq!(roundtrip(&scope, value.clone()), value);
    }
}

#[test]
fn nan_survives_as_double() {
    let scope = HostScope::new();
    let back = roundtrip(&scope, Value::Double(f64::NAN));
    match back {
        Value::Double(n) => assert!(n.is_nan()),
        other => panic!("expected a double, got {other:?}"),
    }
}

// Host numbers carry no integer-width tag, so whole doubles and small
// unsigned values come back under the narrowest kind that fits. The value
// is preserved; only the tag narrows.
#[test]
fn integral_values_collapse_to_the_narrowest_tag() {
    let scope = HostScope::new();
    assert_eq!(roundtrip(&scope, Value::Double(3.0)), Value::Int32(3));
    assert_eq!(roundtrip(&scope, Value::UInt64(5)), Value::Int64(5));
    assert_eq!(
        roundtrip(&scope, Value::Double(9e15)),
        Value::Int64(9_000_000_000_000_000)
    );
}

#[test]
fn legacy_policy_reproduces_int32_truncation() {
    let scope = HostScope::with_config(ScopeConfig {
        number_policy: NumberPolicy::LegacyInt32,
    });
    assert_eq!(roundtrip(&scope, Value::Double(2.5)), Value::Int32(2));
    assert_eq!(roundtrip(&scope, Value::Int32(-7)), Value::Int32(-7));
}

#[test]
fn undefined_and_null_both_map_to_null() {
    let scope = HostScope::new();
    assert_eq!(host_to_value(&scope, &HostValue::Undefined).unwrap(), Value::Null);
    assert_eq!(host_to_value(&scope, &HostValue::Null).unwrap(), Value::Null);
}

#[test]
fn host_side_round_trip_is_stable() {
    let scope = HostScope::new();
    let cases = [
        HostValue::Null,
        HostValue::Bool(true),
        HostValue::Number(3.0),
        HostValue::Number(-2.5),
        HostValue::BigInt(i64::MAX as i128),
        HostValue::from("text"),
        HostValue::from(RationalTime::new(12.0, 24.0)),
    ];
    for host in cases {
        let native = host_to_value(&scope, &host).unwrap();
        assert_eq!(value_to_host(&scope, &native, true).unwrap(), host);
    }
}

#[test]
fn dictionary_round_trip_preserves_nested_structure() {
    let scope = HostScope::new();
    let mut inner = Dictionary::new();
    inner.insert("c", "x");
    let mut dict = Dictionary::new();
    dict.insert("a", 1i32);
    dict.insert("b", inner);
    dict.insert(
        "d",
        vec![Value::from(1i32), Value::from(2i32), Value::from(3i32)],
    );

    let host = value_to_host(&scope, &Value::from(dict.clone()), true).unwrap();
    let object = match &host {
        HostValue::Object(object) => object,
        other => panic!("expected an object, got {other:?}"),
    };
    assert_eq!(object.get("a"), Some(HostValue::Number(1.0)));
    assert!(matches!(object.get("b"), Some(HostValue::Object(_))));
    let d = match object.get("d") {
        Some(HostValue::Array(array)) => array,
        other => panic!("expected an array, got {other:?}"),
    };
    assert_eq!(d.len(), 3);

    assert_eq!(host_to_value(&scope, &host).unwrap(), Value::from(dict));
}

#[test]
fn converted_containers_do_not_alias_the_source() {
    let scope = HostScope::new();
    let mut dict = Dictionary::new();
    dict.insert("a", 1i32);
    dict.insert("seq", vec![Value::from(1i32)]);

    let host = value_to_host(&scope, &Value::from(dict.clone()), true).unwrap();
    let object = host.as_object().unwrap();
    object.set("a", "mutated");
    if let Some(HostValue::Array(array)) = object.get("seq") {
        array.push(HostValue::from("extra"));
    }

    assert_eq!(dict.get("a"), Some(&Value::Int32(1)));
    assert_eq!(
        dict.get("seq"),
        Some(&Value::Sequence(vec![Value::Int32(1)]))
    );
}

#[test]
fn object_refs_bridge_to_interned_handles() {
    let scope = HostScope::new();
    let marker = Marker::new("beat");
    let node: Rc<dyn SerializableObject> = marker.clone();
    let mut dict = Dictionary::new();
    dict.insert("first", Value::Object(ObjectRef::new(&node)));
    dict.insert("second", Value::Object(ObjectRef::new(&node)));

    let host = value_to_host(&scope, &Value::from(dict), true).unwrap();
    let object = host.as_object().unwrap();
    let first = object.get("first").unwrap();
    let second = object.get("second").unwrap();
    let first = first.as_handle().unwrap();
    assert_eq!(first.schema_name(), "Marker");
    assert!(first.is_same(second.as_handle().unwrap()));
}

#[test]
fn converted_handles_observe_native_holds() {
    let scope = HostScope::new();
    let marker = Marker::new("beat");
    let node: Rc<dyn SerializableObject> = marker.clone();

    let host = value_to_host(&scope, &Value::Object(ObjectRef::new(&node)), true).unwrap();
    assert_eq!(host.as_handle().unwrap().schema_name(), "Marker");
    assert_eq!(scope.pinned_count(), 0);

    // A native hold taken after the conversion must pin the wrapper; the
    // minted handle carries the same liveness observer as a bridged one.
    let hold = Retainer::new(marker.clone());
    assert_eq!(scope.pinned_count(), 1);
    drop(hold);
    assert_eq!(scope.pinned_count(), 0);
}

#[test]
fn dangling_object_ref_fails_conversion() {
    let scope = HostScope::new();
    let value = {
        let marker = Marker::new("gone");
        let node: Rc<dyn SerializableObject> = marker;
        Value::Object(ObjectRef::new(&node))
    };
    let err = value_to_host(&scope, &value, true).unwrap_err();
    assert!(matches!(err, BridgeError::UnsupportedType { .. }));
}

#[test]
fn exotic_host_values_are_rejected_by_name() {
    let scope = HostScope::new();

    let err = host_to_value(&scope, &HostValue::Symbol(scope.make_symbol())).unwrap_err();
    assert_eq!(
        err,
        BridgeError::UnsupportedValue {
            type_name: "symbol".into()
        }
    );

    let f = HostFunction::new(|_| Ok(HostValue::Undefined));
    let err = host_to_value(&scope, &HostValue::Function(f)).unwrap_err();
    assert_eq!(
        err,
        BridgeError::UnsupportedValue {
            type_name: "function".into()
        }
    );

    // Bridged handles only travel native-to-host; the reverse is rejected
    // under the wrapped object's schema name.
    let node: Rc<dyn SerializableObject> = Marker::new("m");
    let handle = scope.handle_for(&node);
    let err = host_to_value(&scope, &HostValue::Handle(handle)).unwrap_err();
    assert_eq!(
        err,
        BridgeError::UnsupportedValue {
            type_name: "Marker".into()
        }
    );
}

#[test]
fn non_string_keys_fail_with_key_type_error() {
    let scope = HostScope::new();
    let object = HostObject::new();
    object.set("fine", HostValue::Number(1.0));
    object.set(scope.make_symbol(), HostValue::Number(2.0));

    let err = host_to_value(&scope, &HostValue::Object(object)).unwrap_err();
    assert_eq!(
        err,
        BridgeError::KeyType {
            key_type: "symbol".into()
        }
    );
}

#[test]
fn nested_failure_aborts_the_whole_conversion() {
    let scope = HostScope::new();
    let inner = HostObject::new();
    inner.set("bad", HostValue::Symbol(scope.make_symbol()));
    let outer = HostObject::new();
    outer.set("ok", HostValue::Number(1.0));
    outer.set("inner", HostValue::Object(inner));

    let err = host_to_value(&scope, &HostValue::Object(outer)).unwrap_err();
    assert_eq!(
        err,
        BridgeError::UnsupportedValue {
            type_name: "symbol".into()
        }
    );
}

#[test]
fn host_callbacks_convert_both_directions() {
    let scope = HostScope::new();
    let sum = HostFunction::new(|args| {
        let mut total = 0.0;
        for arg in args {
            total += arg
                .as_number()
                .ok_or_else(|| BridgeError::UnsupportedValue {
                    type_name: arg.type_name().to_string(),
                })?;
        }
        Ok(HostValue::Number(total))
    });

    let out = call_host_function(&scope, &sum, &[Value::from(2i32), Value::from(3i32)]).unwrap();
    assert_eq!(out, Value::Int32(5));

    let err = call_host_function(&scope, &sum, &[Value::from("nope")]).unwrap_err();
    assert_eq!(
        err,
        BridgeError::UnsupportedValue {
            type_name: "string".into()
        }
    );
}
