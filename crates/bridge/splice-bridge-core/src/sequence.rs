//! Host-facing mutable view over an owned-element vector.
//!
//! The proxy wraps the raw membership vector a graph object exposes (its
//! markers, effects or children) and applies host indexing conventions on
//! top of it: negative indexes count from the end, insertion out of range
//! appends, and deletion out of range removes the tail element. Reads bridge
//! elements out as handles; writes take a hold on the written element, tying
//! its lifetime to the vector.

use std::cell::RefCell;
use std::rc::Rc;

use splice_timeline_core::{Retainer, SerializableObject};

use crate::error::BridgeError;
use crate::host::{HostHandle, HostScope};
use crate::keepalive::{bridge_object, install_external_keepalive_monitor};

/// Selects the wrapped vector out of the owner object.
pub type Projection<O, E> = fn(&O) -> &RefCell<Vec<Retainer<E>>>;

/// A mutable host view of one owner's element vector.
pub struct SequenceProxy<O: SerializableObject, E: SerializableObject> {
    scope: HostScope,
    owner: Retainer<O>,
    project: Projection<O, E>,
}

impl<O: SerializableObject, E: SerializableObject> SequenceProxy<O, E> {
    /// Wraps the vector `project` selects out of `owner`. The proxy holds
    /// its owner, so the projected vector stays valid for the proxy's
    /// lifetime.
    pub fn new(scope: &HostScope, owner: &Rc<O>, project: Projection<O, E>) -> Self {
        SequenceProxy {
            scope: scope.clone(),
            owner: Retainer::new(owner.clone()),
            project,
        }
    }

    /// The owner whose vector this proxy projects.
    pub fn owner(&self) -> &Rc<O> {
        self.owner.node()
    }

    fn items(&self) -> &RefCell<Vec<Retainer<E>>> {
        (self.project)(self.owner.node())
    }

    /// Bridges a written value and takes the vector's hold on it. The
    /// monitor is installed before the hold so the retain transition is
    /// observed.
    fn take_hold(&self, value: &HostHandle) -> Result<Retainer<E>, BridgeError> {
        let element = value.downcast::<E>()?;
        install_external_keepalive_monitor(&self.scope, value.node(), false);
        Ok(Retainer::new(element))
    }

    pub fn len(&self) -> usize {
        self.items().borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().borrow().is_empty()
    }

    /// The element at `index`, bridged out as a handle.
    pub fn at(&self, index: i32) -> Result<HostHandle, BridgeError> {
        let node = {
            let items = self.items().borrow();
            let adjusted = adjusted_index(index, items.len());
            if adjusted < 0 || adjusted as usize >= items.len() {
                return Err(BridgeError::Index {
                    index: i64::from(index),
                    len: items.len(),
                });
            }
            items[adjusted as usize].node().clone()
        };
        let node: Rc<dyn SerializableObject> = node;
        Ok(bridge_object(&self.scope, &node, false))
    }

    /// Replaces the element at `index` in place; the vector does not grow.
    pub fn set_item(&self, index: i32, value: &HostHandle) -> Result<(), BridgeError> {
        let hold = self.take_hold(value)?;
        let old = {
            let mut items = self.items().borrow_mut();
            let adjusted = adjusted_index(index, items.len());
            if adjusted < 0 || adjusted as usize >= items.len() {
                return Err(BridgeError::Index {
                    index: i64::from(index),
                    len: items.len(),
                });
            }
            std::mem::replace(&mut items[adjusted as usize], hold)
        };
        // The displaced hold is released outside the borrow; dropping it may
        // dispose the element and re-enter the keepalive monitor.
        drop(old);
        Ok(())
    }

    /// Inserts before the element at the adjusted index. An adjusted index
    /// outside the vector appends, whichever side it falls out on.
    pub fn insert(&self, index: i32, value: &HostHandle) -> Result<(), BridgeError> {
        let hold = self.take_hold(value)?;
        let mut items = self.items().borrow_mut();
        let adjusted = adjusted_index(index, items.len());
        if adjusted < 0 || adjusted as usize >= items.len() {
            items.push(hold);
        } else {
            items.insert(adjusted as usize, hold);
        }
        Ok(())
    }

    pub fn push(&self, value: &HostHandle) -> Result<(), BridgeError> {
        let hold = self.take_hold(value)?;
        self.items().borrow_mut().push(hold);
        Ok(())
    }

    /// Removes the element at the adjusted index. Deleting out of range
    /// removes the tail element; only the empty vector is an error.
    pub fn del_item(&self, index: i32) -> Result<(), BridgeError> {
        let removed = {
            let mut items = self.items().borrow_mut();
            if items.is_empty() {
                return Err(BridgeError::Index {
                    index: i64::from(index),
                    len: 0,
                });
            }
            let adjusted = adjusted_index(index, items.len());
            if adjusted < 0 || adjusted as usize >= items.len() {
                items.pop()
            } else {
                Some(items.remove(adjusted as usize))
            }
        };
        drop(removed);
        Ok(())
    }

    /// Forward-only live iteration: each step reads the backing vector at
    /// the current cursor, so mutations between steps change what later
    /// steps observe. The iterator does not restart.
    pub fn iter(&self) -> SequenceProxyIter<'_, O, E> {
        SequenceProxyIter {
            proxy: self,
            cursor: 0,
        }
    }
}

pub struct SequenceProxyIter<'a, O: SerializableObject, E: SerializableObject> {
    proxy: &'a SequenceProxy<O, E>,
    cursor: usize,
}

impl<O: SerializableObject, E: SerializableObject> Iterator for SequenceProxyIter<'_, O, E> {
    type Item = HostHandle;

    fn next(&mut self) -> Option<HostHandle> {
        let node = {
            let items = self.proxy.items().borrow();
            items.get(self.cursor)?.node().clone()
        };
        self.cursor += 1;
        let node: Rc<dyn SerializableObject> = node;
        Some(bridge_object(&self.proxy.scope, &node, false))
    }
}

/// Host-convention index adjustment: negative indexes count from the end.
fn adjusted_index(index: i32, len: usize) -> i32 {
    if index < 0 {
        index + len as i32
    } else {
        index
    }
}
