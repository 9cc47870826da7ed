//! Synchronization between native reference counts and host collection.
//!
//! A bridged object has two liveness authorities: the intrusive count on the
//! native side and the host garbage collector on the wrapper side. The
//! keepalive monitor turns every native count transition into a
//! [`Crossing`] relative to the bridge's own hold, and the scope reacts by
//! pinning or unpinning the wrapper. Neither side ever samples the other;
//! they stay synchronized at every transition.

use std::rc::Rc;

use splice_timeline_core::{Retainer, SerializableObject};

use crate::host::{object_key, HostHandle, HostScope, ScopeInner};

/// The bridge's own hold on a bridged object. A count at this level means
/// only the bridge still needs the object.
const BRIDGE_FLOOR: usize = 1;

/// Direction of a reference-count crossing relative to the bridge floor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Crossing {
    /// An external holder appeared; the wrapper must survive host collection.
    AboveFloor,
    /// External holders are gone; the wrapper may be collected.
    ToFloor,
}

impl ScopeInner {
    /// Liveness-observer entry point: keeps the pin table consistent with the
    /// most recent count transition. Safe to invoke redundantly; pinning and
    /// unpinning are both idempotent.
    pub(crate) fn on_count_crossed(&self, node: &Rc<dyn SerializableObject>, crossing: Crossing) {
        match crossing {
            Crossing::AboveFloor => self.pin(node),
            Crossing::ToFloor => self.unpin(object_key(node)),
        }
    }
}

/// Installs the scope's liveness observer on `node`.
///
/// Reinstalling replaces the monitor rather than stacking a second one, and
/// takes no hold of its own, so bridging an object twice leaves its count
/// unchanged. With `apply_now` the observer also runs once immediately to
/// establish the correct state for objects that already have holders.
pub fn install_external_keepalive_monitor(
    scope: &HostScope,
    node: &Rc<dyn SerializableObject>,
    apply_now: bool,
) {
    let scope = scope.inner_weak();
    let target = Rc::downgrade(node);
    node.base().install_external_keepalive_monitor(
        move || {
            let scope = match scope.upgrade() {
                Some(scope) => scope,
                None => return,
            };
            let node = match target.upgrade() {
                Some(node) => node,
                None => return,
            };
            let crossing = if node.base().current_ref_count() > BRIDGE_FLOOR {
                Crossing::AboveFloor
            } else {
                Crossing::ToFloor
            };
            scope.on_count_crossed(&node, crossing);
        },
        apply_now,
    );
}

/// Bridges `node` into `scope` and returns its owning host handle.
///
/// The handle's wrapper carries the hold that forms the bridge floor.
pub fn bridge_object(
    scope: &HostScope,
    node: &Rc<dyn SerializableObject>,
    apply_now: bool,
) -> HostHandle {
    install_external_keepalive_monitor(scope, node, apply_now);
    scope.handle_for(node)
}

/// A strong native reference that bridges its target on construction.
///
/// This is the canonical type for native factories that hand fresh objects
/// to host code: the pointer holds the object natively, and the installed
/// observer keeps the wrapper reachable whenever anything else holds the
/// object. The empty pointer is a valid state and bridges nothing.
pub struct ManagingPtr<T: SerializableObject> {
    hold: Option<Retainer<T>>,
}

impl<T: SerializableObject> ManagingPtr<T> {
    pub fn new(scope: &HostScope, node: Rc<T>) -> Self {
        let hold = Retainer::new(node.clone());
        let node: Rc<dyn SerializableObject> = node;
        install_external_keepalive_monitor(scope, &node, false);
        ManagingPtr { hold: Some(hold) }
    }

    pub fn empty() -> Self {
        ManagingPtr { hold: None }
    }

    pub fn is_empty(&self) -> bool {
        self.hold.is_none()
    }

    /// The managed object, without transferring the hold.
    pub fn get(&self) -> Option<&Rc<T>> {
        self.hold.as_ref().map(Retainer::node)
    }

    /// The managed object's canonical host handle.
    pub fn handle(&self, scope: &HostScope) -> Option<HostHandle> {
        self.get().map(|node| {
            let node: Rc<dyn SerializableObject> = node.clone();
            scope.handle_for(&node)
        })
    }
}

impl<T: SerializableObject> Default for ManagingPtr<T> {
    fn default() -> Self {
        ManagingPtr::empty()
    }
}
