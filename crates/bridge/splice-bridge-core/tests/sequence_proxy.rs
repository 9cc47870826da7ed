use std::rc::Rc;

use splice_bridge_core::{BridgeError, HostScope, SequenceProxy};
use splice_timeline_core::{Effect, Item, Marker, SerializableObject};

fn fixture(names: &[&str]) -> (HostScope, Rc<Item>, SequenceProxy<Item, Marker>) {
    let scope = HostScope::new();
    let item = Item::new("clip");
    let proxy = SequenceProxy::new(&scope, &item, Item::markers);
    for name in names {
        let node: Rc<dyn SerializableObject> = Marker::new(name);
        proxy.push(&scope.handle_for(&node)).unwrap();
    }
    (scope, item, proxy)
}

fn names(proxy: &SequenceProxy<Item, Marker>) -> Vec<String> {
    proxy
        .iter()
        .map(|handle| handle.downcast::<Marker>().unwrap().name())
        .collect()
}

#[test]
fn negative_indexes_count_from_the_end() {
    let (_scope, _item, proxy) = fixture(&["x", "y", "z"]);
    assert_eq!(proxy.len(), 3);
    assert_eq!(proxy.at(-1).unwrap().downcast::<Marker>().unwrap().name(), "z");
    assert_eq!(proxy.at(-3).unwrap().downcast::<Marker>().unwrap().name(), "x");
    assert_eq!(proxy.at(2).unwrap().downcast::<Marker>().unwrap().name(), "z");
}

#[test]
fn out_of_range_reads_fail_after_adjustment() {
    let (_scope, _item, proxy) = fixture(&["x", "y", "z"]);
    assert_eq!(
        proxy.at(3).unwrap_err(),
        BridgeError::Index { index: 3, len: 3 }
    );
    assert_eq!(
        proxy.at(-4).unwrap_err(),
        BridgeError::Index { index: -4, len: 3 }
    );
}

#[test]
fn negative_insert_lands_before_the_counted_element() {
    let (scope, _item, proxy) = fixture(&["x", "y", "z"]);
    let node: Rc<dyn SerializableObject> = Marker::new("w");
    proxy.insert(-1, &scope.handle_for(&node)).unwrap();
    assert_eq!(names(&proxy), ["x", "y", "w", "z"]);
}

#[test]
fn out_of_range_inserts_append_from_either_side() {
    let (scope, _item, proxy) = fixture(&["x", "y", "z"]);

    let node: Rc<dyn SerializableObject> = Marker::new("tail");
    proxy.insert(99, &scope.handle_for(&node)).unwrap();
    // An index still negative after adjustment is out of range too, and
    // lands at the end like any other out-of-range insert.
    let node: Rc<dyn SerializableObject> = Marker::new("last");
    proxy.insert(-99, &scope.handle_for(&node)).unwrap();

    assert_eq!(names(&proxy), ["x", "y", "z", "tail", "last"]);
}

#[test]
fn set_item_replaces_in_place() {
    let (scope, _item, proxy) = fixture(&["x", "y", "z"]);
    let node: Rc<dyn SerializableObject> = Marker::new("mid");
    proxy.set_item(-2, &scope.handle_for(&node)).unwrap();
    assert_eq!(names(&proxy), ["x", "mid", "z"]);
    assert_eq!(proxy.len(), 3);

    let node: Rc<dyn SerializableObject> = Marker::new("nope");
    assert_eq!(
        proxy.set_item(3, &scope.handle_for(&node)).unwrap_err(),
        BridgeError::Index { index: 3, len: 3 }
    );
}

#[test]
fn set_item_rejects_foreign_schemas() {
    let (scope, _item, proxy) = fixture(&["x"]);
    let node: Rc<dyn SerializableObject> = Effect::new("fx", "blur");
    assert_eq!(
        proxy.set_item(0, &scope.handle_for(&node)).unwrap_err(),
        BridgeError::TypeMismatch {
            expected: "Marker".into(),
            actual: "Effect".into(),
        }
    );
    assert_eq!(names(&proxy), ["x"]);
}

#[test]
fn deletion_is_lenient_out_of_range() {
    let (_scope, _item, proxy) = fixture(&["w", "x", "y", "z"]);
    proxy.del_item(-1).unwrap();
    assert_eq!(names(&proxy), ["w", "x", "y"]);

    // Past-the-end deletion removes the tail element.
    proxy.del_item(7).unwrap();
    assert_eq!(names(&proxy), ["w", "x"]);

    // So does an index still negative after adjustment: "x" goes, not "w".
    proxy.del_item(-9).unwrap();
    assert_eq!(names(&proxy), ["w"]);

    proxy.del_item(0).unwrap();
    assert_eq!(
        proxy.del_item(0).unwrap_err(),
        BridgeError::Index { index: 0, len: 0 }
    );
}

#[test]
fn iteration_reads_the_live_vector() {
    let (scope, _item, proxy) = fixture(&["a", "b"]);
    let mut iter = proxy.iter();
    let first = iter.next().unwrap();
    assert_eq!(first.downcast::<Marker>().unwrap().name(), "a");

    // Mutation between steps is visible to the remaining steps.
    let node: Rc<dyn SerializableObject> = Marker::new("c");
    proxy.push(&scope.handle_for(&node)).unwrap();
    let rest: Vec<String> = iter
        .map(|handle| handle.downcast::<Marker>().unwrap().name())
        .collect();
    assert_eq!(rest, ["b", "c"]);
}

#[test]
fn written_elements_are_owned_by_the_vector() {
    let (scope, _item, proxy) = fixture(&[]);
    let marker = Marker::new("owned");
    let weak = Rc::downgrade(&marker);
    {
        let node: Rc<dyn SerializableObject> = marker;
        proxy.push(&scope.handle_for(&node)).unwrap();
    }
    // All direct handles are gone; the vector's hold keeps the marker alive.
    assert!(weak.upgrade().is_some());

    proxy.del_item(0).unwrap();
    assert!(weak.upgrade().is_none());
}

#[test]
fn reads_bridge_out_interned_handles() {
    let (_scope, _item, proxy) = fixture(&["x"]);
    let a = proxy.at(0).unwrap();
    let b = proxy.at(-1).unwrap();
    assert!(a.is_same(&b));
    assert_eq!(a.schema_name(), "Marker");
}

#[test]
fn writes_pin_elements_reachable_from_the_vector() {
    let (scope, _item, proxy) = fixture(&[]);
    let node: Rc<dyn SerializableObject> = Marker::new("pinned");
    let handle = scope.handle_for(&node);
    proxy.push(&handle).unwrap();

    // Vector hold plus wrapper hold: the wrapper must survive host
    // collection while the vector can still surface it.
    assert_eq!(scope.pinned_count(), 1);
    drop(handle);
    drop(node);
    assert_eq!(scope.collect(), 0);
    assert_eq!(proxy.at(0).unwrap().schema_name(), "Marker");

    proxy.del_item(0).unwrap();
    assert_eq!(scope.pinned_count(), 0);
    assert_eq!(scope.collect(), 1);
}

#[test]
fn proxies_share_the_owner_and_project_different_vectors() {
    let scope = HostScope::new();
    let item = Item::new("clip");
    let markers = SequenceProxy::new(&scope, &item, Item::markers);
    let effects = SequenceProxy::new(&scope, &item, Item::effects);

    let node: Rc<dyn SerializableObject> = Marker::new("m");
    markers.push(&scope.handle_for(&node)).unwrap();
    let node: Rc<dyn SerializableObject> = Effect::new("fx", "flip");
    effects.push(&scope.handle_for(&node)).unwrap();

    assert_eq!(markers.len(), 1);
    assert_eq!(effects.len(), 1);
    assert_eq!(item.base().current_ref_count(), 2);
}
