//! Event listeners attached to arena nodes.
//!
//! Listeners are keyed by node index. Dispatch clones the matching handlers
//! out of the table before calling them, so a handler may register or clear
//! listeners without re-entering the borrow.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::document::NodeId;
use crate::types::Value;

/// An event delivered to a node.
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub target: NodeId,
    /// Payload, e.g. the new value of an input.
    pub value: Value,
}

/// Listener callback (Rc so it can be cloned out of the table).
pub type Listener = Rc<dyn Fn(&Event)>;

thread_local! {
    static LISTENERS: RefCell<HashMap<usize, Vec<(String, Listener)>>> = RefCell::new(HashMap::new());
}

/// Register `listener` for `event` on `node`.
pub fn listen(node: NodeId, event: &str, listener: Listener) {
    LISTENERS.with(|listeners| {
        listeners
            .borrow_mut()
            .entry(node.index())
            .or_default()
            .push((event.to_string(), listener));
    });
}

/// Deliver an event to the listeners of `target`. Returns how many ran.
pub fn dispatch(target: NodeId, name: &str, value: Value) -> usize {
    let matching: Vec<Listener> = LISTENERS.with(|listeners| {
        listeners
            .borrow()
            .get(&target.index())
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(event, _)| event == name)
                    .map(|(_, listener)| listener.clone())
                    .collect()
            })
            .unwrap_or_default()
    });
    let event = Event {
        name: name.to_string(),
        target,
        value,
    };
    for listener in &matching {
        listener(&event);
    }
    matching.len()
}

pub fn listener_count(node: NodeId) -> usize {
    LISTENERS.with(|listeners| listeners.borrow().get(&node.index()).map_or(0, Vec::len))
}

pub(crate) fn clear_listeners(node: NodeId) {
    LISTENERS.with(|listeners| {
        listeners.borrow_mut().remove(&node.index());
    });
}

pub(crate) fn reset_listeners() {
    LISTENERS.with(|listeners| listeners.borrow_mut().clear());
}
