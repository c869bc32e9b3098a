//! Per-instance stash: offset trackers, nested children and repeaters,
//! addressed by keys assigned at compile time.

use std::rc::Rc;

use super::detacher::OffsetTracker;
use super::error::RuntimeError;
use super::instance::Component;
use super::repeater::{KeyedRepeater, SequentialRepeater};
use crate::dom::NodeId;

/// Index into an instance's stash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StashKey(pub(crate) usize);

impl StashKey {
    pub fn index(self) -> usize {
        self.0
    }
}

pub enum StashEntry {
    Tracker(OffsetTracker),
    Child(Component),
    Sequential(SequentialRepeater),
    Keyed(KeyedRepeater),
}

impl StashEntry {
    fn kind(&self) -> &'static str {
        match self {
            StashEntry::Tracker(_) => "an offset tracker",
            StashEntry::Child(_) => "a nested child",
            StashEntry::Sequential(_) => "a sequential repeater",
            StashEntry::Keyed(_) => "a keyed repeater",
        }
    }
}

pub struct Stash {
    component: Rc<str>,
    entries: Vec<StashEntry>,
}

impl Stash {
    pub fn new(component: &str, entries: Vec<StashEntry>) -> Self {
        Self {
            component: component.into(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn tracker_mut(&mut self, key: StashKey) -> Result<&mut OffsetTracker, RuntimeError> {
        let component = self.component.clone();
        match self.entries.get_mut(key.0) {
            Some(StashEntry::Tracker(tracker)) => Ok(tracker),
            other => Err(mismatch(&component, key, other.map(|e| e.kind()), "an offset tracker")),
        }
    }

    pub fn child(&self, key: StashKey) -> Result<&Component, RuntimeError> {
        match self.entries.get(key.0) {
            Some(StashEntry::Child(child)) => Ok(child),
            other => Err(mismatch(&self.component, key, other.map(|e| e.kind()), "a nested child")),
        }
    }

    pub fn sequential_mut(&mut self, key: StashKey) -> Result<&mut SequentialRepeater, RuntimeError> {
        let component = self.component.clone();
        match self.entries.get_mut(key.0) {
            Some(StashEntry::Sequential(repeater)) => Ok(repeater),
            other => Err(mismatch(
                &component,
                key,
                other.map(|e| e.kind()),
                "a sequential repeater",
            )),
        }
    }

    pub fn keyed_mut(&mut self, key: StashKey) -> Result<&mut KeyedRepeater, RuntimeError> {
        let component = self.component.clone();
        match self.entries.get_mut(key.0) {
            Some(StashEntry::Keyed(repeater)) => Ok(repeater),
            other => Err(mismatch(&component, key, other.map(|e| e.kind()), "a keyed repeater")),
        }
    }

    /// First attached root of the repeater at `key`, if any.
    pub fn repeat_head(&self, key: StashKey) -> Option<NodeId> {
        match self.entries.get(key.0)? {
            StashEntry::Sequential(repeater) => repeater.head(),
            StashEntry::Keyed(repeater) => repeater.head(),
            _ => None,
        }
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = &mut StashEntry> {
        self.entries.iter_mut()
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = &StashEntry> {
        self.entries.iter()
    }
}

fn mismatch(
    component: &str,
    key: StashKey,
    found: Option<&'static str>,
    expected: &'static str,
) -> RuntimeError {
    log::debug!(
        "{component}: stash slot {} holds {}",
        key.0,
        found.unwrap_or("nothing")
    );
    RuntimeError::StashMismatch {
        component: component.to_string(),
        key: key.0,
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mismatch_names_expected_kind() {
        let mut stash = Stash::new("card", vec![StashEntry::Tracker(OffsetTracker::new())]);

        assert!(stash.tracker_mut(StashKey(0)).is_ok());
        let err = stash.sequential_mut(StashKey(0)).err().unwrap();
        assert_eq!(
            err,
            RuntimeError::StashMismatch {
                component: "card".to_string(),
                key: 0,
                expected: "a sequential repeater",
            }
        );
        assert!(stash.child(StashKey(3)).is_err(), "out of range is a mismatch too");
    }
}
