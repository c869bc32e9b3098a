//! Mount - keep a component rendered from a tracked observable.
//!
//! [`mount`] creates a render effect that reads the observable's version
//! signal and re-renders the component with the current value whenever it
//! changes. The returned [`MountHandle`] stops the effect.

use spark_signals::effect;

use super::observable::Observable;
use crate::runtime::Component;

/// Handle returned by [`mount`].
pub struct MountHandle {
    stop_effect: Option<Box<dyn FnOnce()>>,
    component: Component,
}

impl MountHandle {
    pub fn component(&self) -> &Component {
        &self.component
    }

    pub fn is_mounted(&self) -> bool {
        self.stop_effect.is_some()
    }

    /// Stop the render effect and dismount the component.
    pub fn unmount(mut self) {
        if let Some(stop) = self.stop_effect.take() {
            stop();
        }
        self.component.borrow_mut().dismount();
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop_effect.take() {
            stop();
        }
    }
}

/// Render `component` from `observable` now and after every change.
///
/// Untracked observables (built with [`Observable::new`]) have no version
/// signal; they are rendered once.
pub fn mount(component: &Component, observable: &Observable) -> MountHandle {
    let Some(version) = observable.version().cloned() else {
        log::warn!("mounting an untracked observable; it will render once");
        render(component, observable);
        return MountHandle {
            stop_effect: None,
            component: component.clone(),
        };
    };

    let target = component.clone();
    let source = observable.clone();
    let stop_fn = effect(move || {
        // Read the version to subscribe
        let _ = version.get();
        render(&target, &source);
    });

    MountHandle {
        stop_effect: Some(Box::new(stop_fn)),
        component: component.clone(),
    }
}

fn render(component: &Component, observable: &Observable) {
    let Ok(mut instance) = component.try_borrow_mut() else {
        log::error!("render skipped: component is already being updated");
        return;
    };
    let controller = instance.controller().cloned();
    if let Err(err) = instance.render(observable.get(), controller) {
        log::error!("{}: render failed: {err}", instance.definition().name());
    }
}
