//! Concrete graph node schemas.
//!
//! Nodes are constructed behind `Rc` with an intrusive count of zero; they
//! stay alive only while something holds a [`Retainer`] (or the `Rc` itself).
//! Membership vectors store retainers, so a composition owns its children.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::object::{ObjectBase, Retainer, SerializableObject};
use crate::status::Status;
use crate::time::TimeRange;

macro_rules! impl_serializable_object {
    ($ty:ident, $schema:literal) => {
        impl SerializableObject for $ty {
            fn base(&self) -> &ObjectBase {
                &self.base
            }

            fn schema_name(&self) -> &'static str {
                $schema
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }

            fn into_any(self: Rc<Self>) -> Rc<dyn std::any::Any> {
                self
            }
        }
    };
}

/// A named annotation over a time range.
pub struct Marker {
    base: ObjectBase,
    name: RefCell<String>,
    marked_range: Cell<TimeRange>,
}

impl Marker {
    pub fn new(name: &str) -> Rc<Self> {
        Rc::new(Marker {
            base: ObjectBase::new(),
            name: RefCell::new(name.to_string()),
            marked_range: Cell::new(TimeRange::default()),
        })
    }

    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    pub fn set_name(&self, name: &str) {
        *self.name.borrow_mut() = name.to_string();
    }

    pub fn marked_range(&self) -> TimeRange {
        self.marked_range.get()
    }

    pub fn set_marked_range(&self, range: TimeRange) {
        self.marked_range.set(range);
    }
}

impl_serializable_object!(Marker, "Marker");

/// A named processing step attached to an item.
pub struct Effect {
    base: ObjectBase,
    name: RefCell<String>,
    effect_name: RefCell<String>,
}

impl Effect {
    pub fn new(name: &str, effect_name: &str) -> Rc<Self> {
        Rc::new(Effect {
            base: ObjectBase::new(),
            name: RefCell::new(name.to_string()),
            effect_name: RefCell::new(effect_name.to_string()),
        })
    }

    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    pub fn set_name(&self, name: &str) {
        *self.name.borrow_mut() = name.to_string();
    }

    pub fn effect_name(&self) -> String {
        self.effect_name.borrow().clone()
    }

    pub fn set_effect_name(&self, effect_name: &str) {
        *self.effect_name.borrow_mut() = effect_name.to_string();
    }
}

impl_serializable_object!(Effect, "Effect");

/// A leaf timeline element carrying markers and effects.
pub struct Item {
    base: ObjectBase,
    name: RefCell<String>,
    markers: RefCell<Vec<Retainer<Marker>>>,
    effects: RefCell<Vec<Retainer<Effect>>>,
}

impl Item {
    pub fn new(name: &str) -> Rc<Self> {
        Rc::new(Item {
            base: ObjectBase::new(),
            name: RefCell::new(name.to_string()),
            markers: RefCell::new(Vec::new()),
            effects: RefCell::new(Vec::new()),
        })
    }

    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    pub fn set_name(&self, name: &str) {
        *self.name.borrow_mut() = name.to_string();
    }

    /// Raw marker storage. Mutations through this cell move ownership in and
    /// out of the item without any index policy; host-facing access goes
    /// through a sequence proxy instead.
    pub fn markers(&self) -> &RefCell<Vec<Retainer<Marker>>> {
        &self.markers
    }

    pub fn effects(&self) -> &RefCell<Vec<Retainer<Effect>>> {
        &self.effects
    }
}

impl_serializable_object!(Item, "Item");

/// An ordered container of items.
pub struct Composition {
    base: ObjectBase,
    name: RefCell<String>,
    children: RefCell<Vec<Retainer<Item>>>,
}

impl Composition {
    pub fn new(name: &str) -> Rc<Self> {
        Rc::new(Composition {
            base: ObjectBase::new(),
            name: RefCell::new(name.to_string()),
            children: RefCell::new(Vec::new()),
        })
    }

    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    pub fn set_name(&self, name: &str) {
        *self.name.borrow_mut() = name.to_string();
    }

    pub fn children(&self) -> &RefCell<Vec<Retainer<Item>>> {
        &self.children
    }

    pub fn len(&self) -> usize {
        self.children.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.borrow().is_empty()
    }

    /// Inserts `child` at `index`, taking ownership of it. A child can belong
    /// to at most one composition at a time.
    pub fn insert_child(self: &Rc<Self>, index: usize, child: Rc<Item>) -> Result<(), Status> {
        if child.base().parent().is_some() {
            return Err(Status::ChildAlreadyParented);
        }
        let len = self.children.borrow().len();
        if index > len {
            return Err(Status::IllegalIndex { index, len });
        }
        // Take the hold before touching the vector; the monitor may run here.
        let hold = Retainer::new(child.clone());
        self.children.borrow_mut().insert(index, hold);
        let parent: Rc<dyn SerializableObject> = self.clone();
        child.base().set_parent(Rc::downgrade(&parent));
        Ok(())
    }

    pub fn append_child(self: &Rc<Self>, child: Rc<Item>) -> Result<(), Status> {
        let len = self.children.borrow().len();
        self.insert_child(len, child)
    }

    /// Removes the child at `index` and returns the hold on it. Dropping the
    /// returned retainer releases the composition's share of ownership.
    pub fn remove_child(&self, index: usize) -> Result<Retainer<Item>, Status> {
        let len = self.children.borrow().len();
        if index >= len {
            return Err(Status::IllegalIndex { index, len });
        }
        let removed = self.children.borrow_mut().remove(index);
        removed.base().clear_parent();
        Ok(removed)
    }

    pub fn child_at(&self, index: usize) -> Result<Rc<Item>, Status> {
        let children = self.children.borrow();
        match children.get(index) {
            Some(child) => Ok(child.node().clone()),
            None => Err(Status::IllegalIndex {
                index,
                len: children.len(),
            }),
        }
    }
}

impl_serializable_object!(Composition, "Composition");
