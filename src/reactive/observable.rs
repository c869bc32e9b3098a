//! Observable - an explicit change-notifying wrapper around a [`Value`] tree.
//!
//! Every mutating operation writes through to the shared root and then
//! invokes the change callback. [`Observable::field`] and
//! [`Observable::index`] return child wrappers that point into the same
//! root and share the same callback, so a write anywhere in the tree
//! notifies the owner.
//!
//! ```ignore
//! let (todos, version) = Observable::tracked(Value::map([("items", Value::list([]))]));
//! todos.field("items").push(Value::from("write tests"));
//! assert_eq!(version.get(), 1);
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use spark_signals::{signal, Signal};

use crate::types::{Path, Value};

#[derive(Clone)]
pub struct Observable {
    root: Rc<RefCell<Value>>,
    path: Path,
    on_change: Rc<dyn Fn()>,
    version: Option<Signal<u64>>,
}

impl Observable {
    /// Wrap `value`, calling `on_change` after every mutation.
    pub fn new(value: Value, on_change: impl Fn() + 'static) -> Self {
        Self {
            root: Rc::new(RefCell::new(value)),
            path: Path::root(),
            on_change: Rc::new(on_change),
            version: None,
        }
    }

    /// Wrap `value` and bump a version signal after every mutation.
    pub fn tracked(value: Value) -> (Self, Signal<u64>) {
        let version = signal(0u64);
        let counter = Rc::new(Cell::new(0u64));
        let writer = version.clone();
        let mut observable = Self::new(value, move || {
            counter.set(counter.get() + 1);
            writer.set(counter.get());
        });
        observable.version = Some(version.clone());
        (observable, version)
    }

    /// The version signal, for observables built with [`Observable::tracked`].
    pub fn version(&self) -> Option<&Signal<u64>> {
        self.version.as_ref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the wrapped member. Null if the path no longer resolves.
    pub fn get(&self) -> Value {
        self.root.borrow().get_path(&self.path)
    }

    fn child(&self, path: Path) -> Self {
        Self {
            root: self.root.clone(),
            path,
            on_change: self.on_change.clone(),
            version: self.version.clone(),
        }
    }

    pub fn field(&self, name: &str) -> Self {
        self.child(self.path.field(name))
    }

    pub fn index(&self, index: usize) -> Self {
        self.child(self.path.index(index))
    }

    fn notify(&self) {
        (self.on_change)();
    }

    /// Replace the wrapped member. Returns false if the path is unreachable.
    pub fn set(&self, value: Value) -> bool {
        let written = self.root.borrow_mut().set_path(&self.path, value);
        if written {
            self.notify();
        }
        written
    }

    /// Append to the wrapped list. Null becomes a one-element list.
    pub fn push(&self, item: Value) -> bool {
        let pushed = {
            let mut root = self.root.borrow_mut();
            match root.get_path_mut(&self.path) {
                Some(slot) => match slot {
                    Value::List(items) => {
                        Rc::make_mut(items).push(item);
                        true
                    }
                    Value::Null => {
                        *slot = Value::list([item]);
                        true
                    }
                    _ => false,
                },
                None => false,
            }
        };
        if pushed {
            self.notify();
        }
        pushed
    }

    /// Remove and return one element of the wrapped list.
    pub fn remove(&self, index: usize) -> Option<Value> {
        let removed = {
            let mut root = self.root.borrow_mut();
            match root.get_path_mut(&self.path) {
                Some(Value::List(items)) if index < items.len() => Some(Rc::make_mut(items).remove(index)),
                _ => None,
            }
        };
        if removed.is_some() {
            self.notify();
        }
        removed
    }

    /// Mutate the wrapped member in place, then notify once.
    pub fn update(&self, f: impl FnOnce(&mut Value)) -> bool {
        let updated = {
            let mut root = self.root.borrow_mut();
            match root.get_path_mut(&self.path) {
                Some(slot) => {
                    f(slot);
                    true
                }
                None => false,
            }
        };
        if updated {
            self.notify();
        }
        updated
    }
}

impl fmt::Debug for Observable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("path", &self.path.to_string())
            .field("value", &self.get())
            .finish()
    }
}
