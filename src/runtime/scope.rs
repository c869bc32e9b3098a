//! Evaluation scope and the flattened method table.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use super::definition::ComponentDefinition;
use crate::types::Value;

/// Opaque controller object handed down from the caller.
pub type Controller = Rc<dyn Any>;

/// A component method callable from expressions.
pub type Method = Rc<dyn Fn(&Scope<'_>, &[Value]) -> Value>;

/// What lookups and effects can see of an instance.
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    props: &'a Value,
    state: &'a Value,
    controller: Option<&'a Controller>,
    methods: &'a MethodTable,
}

impl<'a> Scope<'a> {
    pub fn new(
        props: &'a Value,
        state: &'a Value,
        controller: Option<&'a Controller>,
        methods: &'a MethodTable,
    ) -> Self {
        Self {
            props,
            state,
            controller,
            methods,
        }
    }

    pub fn props(&self) -> &'a Value {
        self.props
    }

    pub fn state(&self) -> &'a Value {
        self.state
    }

    pub fn controller(&self) -> Option<&'a Controller> {
        self.controller
    }

    pub fn methods(&self) -> &'a MethodTable {
        self.methods
    }

    /// Call a method by name. Unknown methods evaluate to null.
    pub fn call(&self, name: &str, args: &[Value]) -> Value {
        match self.methods.method(name) {
            Some(method) => method(self, args),
            None => {
                log::debug!("call to unknown method `{name}`");
                Value::Null
            }
        }
    }
}

/// Methods and stubs of one definition, with its bases folded in.
#[derive(Default, Clone)]
pub struct MethodTable {
    methods: HashMap<String, Method>,
    stubs: HashMap<String, Rc<ComponentDefinition>>,
}

impl MethodTable {
    pub fn insert_method(
        &mut self,
        name: &str,
        method: impl Fn(&Scope<'_>, &[Value]) -> Value + 'static,
    ) {
        self.methods.insert(name.to_string(), Rc::new(method));
    }

    pub(crate) fn insert_shared(&mut self, name: &str, method: Method) {
        self.methods.insert(name.to_string(), method);
    }

    pub fn insert_stub(&mut self, name: &str, definition: Rc<ComponentDefinition>) {
        self.stubs.insert(name.to_string(), definition);
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    pub fn stub(&self, name: &str) -> Option<&Rc<ComponentDefinition>> {
        self.stubs.get(name)
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&String> = self.methods.keys().collect();
        methods.sort();
        let mut stubs: Vec<&String> = self.stubs.keys().collect();
        stubs.sort();
        f.debug_struct("MethodTable")
            .field("methods", &methods)
            .field("stubs", &stubs)
            .finish()
    }
}
