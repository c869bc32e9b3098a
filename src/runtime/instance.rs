//! Component instances - the live side of a definition.
//!
//! An instance owns a cloned copy of its definition's markup, the element
//! array located in it, one value cache per watch callback, and a stash of
//! offset trackers, nested children and repeaters. Instances are shared as
//! [`Component`] handles so that repeaters, pools and event listeners can
//! all refer to them.
//!
//! # Lifecycle
//!
//! - [`ComponentInstance::construct`] builds and renders a new instance
//! - [`ComponentInstance::render`] replaces props and runs a full update
//! - [`ComponentInstance::dismount`] prepares the instance for a pool,
//!   returning every shared descendant to its own pool
//! - [`ComponentInstance::destroy`] releases the instance's nodes for good

use std::cell::RefCell;
use std::rc::Rc;

use super::definition::{ComponentDefinition, NestedChild, StashInit};
use super::detacher::OffsetTracker;
use super::error::RuntimeError;
use super::patcher::{self, PatchStats};
use super::repeater::{KeyedRepeater, SequentialRepeater};
use super::scope::Controller;
use super::stash::{Stash, StashEntry};
use crate::dom::{self, Event, NodeId};
use crate::types::{Path, Value};

/// Shared handle to an instance.
pub type Component = Rc<RefCell<ComponentInstance>>;

pub struct ComponentInstance {
    pub(crate) definition: Rc<ComponentDefinition>,
    pub(crate) root: NodeId,
    pub(crate) props: Value,
    pub(crate) state: Value,
    pub(crate) controller: Option<Controller>,
    pub(crate) elements: Vec<NodeId>,
    /// Previous value per watch per callback; `None` until first run.
    pub(crate) cache: Vec<Vec<Option<Value>>>,
    pub(crate) stash: Stash,
    mounted: bool,
}

impl ComponentInstance {
    /// Build an instance and run its first update.
    pub fn construct(
        definition: &Rc<ComponentDefinition>,
        props: Value,
        controller: Option<Controller>,
    ) -> Result<Component, RuntimeError> {
        let component = Self::build(definition, props, controller)?;
        let result = component.borrow_mut().update();
        match result {
            Ok(_) => {
                component.borrow_mut().mounted = true;
                Ok(component)
            }
            Err(err) => {
                component.borrow_mut().destroy();
                Err(err)
            }
        }
    }

    /// Build an instance without rendering it.
    pub(crate) fn build(
        definition: &Rc<ComponentDefinition>,
        props: Value,
        controller: Option<Controller>,
    ) -> Result<Component, RuntimeError> {
        let template = definition.template().clone();
        let root = dom::instantiate(template.markup());
        let mut elements = match template.bindings.bind(root, definition.name()) {
            Ok(elements) => elements,
            Err(err) => {
                dom::release(root);
                return Err(err);
            }
        };

        let mut entries = Vec::with_capacity(template.stash.len());
        for init in &template.stash {
            match build_entry(definition, init, &mut elements) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    for entry in entries {
                        if let StashEntry::Child(child) = entry {
                            child.borrow_mut().destroy();
                        }
                    }
                    dom::release(root);
                    return Err(err);
                }
            }
        }

        let cache = template
            .watches
            .iter()
            .map(|watch| vec![None; watch.callbacks.len()])
            .collect();

        let instance = ComponentInstance {
            definition: definition.clone(),
            root,
            props,
            state: definition.initial_state().clone(),
            controller,
            elements,
            cache,
            stash: Stash::new(definition.name(), entries),
            mounted: false,
        };
        let component = Rc::new(RefCell::new(instance));
        attach_listeners(&component);
        Ok(component)
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Replace props and controller, then update.
    pub fn render(
        &mut self,
        props: Value,
        controller: Option<Controller>,
    ) -> Result<PatchStats, RuntimeError> {
        self.props = props;
        self.controller = controller;
        self.mounted = true;
        self.update()
    }

    /// Run the whole watch list.
    pub fn update(&mut self) -> Result<PatchStats, RuntimeError> {
        let len = self.definition.template().watches.len();
        patcher::patch(self, 0..len)
    }

    /// Run the watches in `[start, end)`.
    pub fn update_range(&mut self, start: usize, end: usize) -> Result<PatchStats, RuntimeError> {
        patcher::patch(self, start..end)
    }

    /// Run the watches of one named part.
    pub fn update_part(&mut self, name: &str) -> Result<PatchStats, RuntimeError> {
        let range = self
            .definition
            .template()
            .part(name)
            .ok_or_else(|| RuntimeError::UnknownPart {
                component: self.definition.name().to_string(),
                name: name.to_string(),
            })?;
        patcher::patch(self, range)
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Prepare for a pool. Shared repeaters return their children to their
    /// pools; nested children and private repeater children are dismounted
    /// in place. The instance's own nodes are kept.
    pub fn dismount(&mut self) {
        for entry in self.stash.entries_mut() {
            match entry {
                StashEntry::Child(child) => child.borrow_mut().dismount(),
                StashEntry::Sequential(repeater) => repeater.dismount(),
                StashEntry::Keyed(repeater) => repeater.dismount(),
                StashEntry::Tracker(_) => {}
            }
        }
        self.mounted = false;
    }

    /// Release every node the instance owns. Shared repeater children go
    /// back to their pools first.
    pub fn destroy(&mut self) {
        for entry in self.stash.entries_mut() {
            match entry {
                StashEntry::Child(child) => child.borrow_mut().destroy(),
                StashEntry::Sequential(repeater) => repeater.clear(),
                StashEntry::Keyed(repeater) => repeater.clear(),
                StashEntry::Tracker(_) => {}
            }
        }
        dom::release(self.root);
        self.mounted = false;
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn definition(&self) -> &Rc<ComponentDefinition> {
        &self.definition
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn props(&self) -> &Value {
        &self.props
    }

    pub fn state(&self) -> &Value {
        &self.state
    }

    /// Replace state. Takes effect on the next update.
    pub fn set_state(&mut self, state: Value) {
        self.state = state;
    }

    /// Write one member of state. Returns false if `path` is unreachable.
    pub fn set_state_at(&mut self, path: &Path, value: Value) -> bool {
        self.state.set_path(path, value)
    }

    pub fn controller(&self) -> Option<&Controller> {
        self.controller.as_ref()
    }

    pub fn get_ref(&self, name: &str) -> Option<NodeId> {
        let slot = self.definition.template().ref_slot(name)?;
        self.elements.get(slot).copied()
    }

    pub fn element(&self, index: usize) -> Option<NodeId> {
        self.elements.get(index).copied()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Nested children held by this instance, in stash order.
    pub fn children(&self) -> Vec<Component> {
        self.stash
            .entries()
            .filter_map(|entry| match entry {
                StashEntry::Child(child) => Some(child.clone()),
                _ => None,
            })
            .collect()
    }
}

fn build_entry(
    definition: &Rc<ComponentDefinition>,
    init: &StashInit,
    elements: &mut [NodeId],
) -> Result<StashEntry, RuntimeError> {
    let entry = match init {
        StashInit::OffsetTracker { detached } => {
            StashEntry::Tracker(OffsetTracker::with_detached(detached.iter().copied()))
        }
        StashInit::Sequential {
            definition,
            share,
            anchors,
        } => StashEntry::Sequential(
            SequentialRepeater::new(definition.clone(), *share).with_anchors(anchors.clone()),
        ),
        StashInit::Keyed {
            definition,
            key,
            share,
            anchors,
        } => StashEntry::Keyed(
            KeyedRepeater::new(definition.clone(), key.clone(), *share).with_anchors(anchors.clone()),
        ),
        StashInit::Nested(source) => {
            let child_definition = match &source.child {
                NestedChild::Definition(child) => child.clone(),
                NestedChild::Stub(name) => definition
                    .method_table()
                    .stub(name)
                    .cloned()
                    .ok_or_else(|| RuntimeError::UnknownStub {
                        component: definition.name().to_string(),
                        name: name.clone(),
                    })?,
            };
            let child = ComponentInstance::build(&child_definition, Value::Null, None)?;
            let child_root = child.borrow().root();
            let placeholder = elements[source.element_index];
            if !source.starts_detached {
                dom::replace(placeholder, child_root);
            }
            dom::release(placeholder);
            elements[source.element_index] = child_root;
            StashEntry::Child(child)
        }
    };
    Ok(entry)
}

fn attach_listeners(component: &Component) {
    let (definition, elements) = {
        let instance = component.borrow();
        (instance.definition.clone(), instance.elements.clone())
    };
    for binding in definition.template().listeners() {
        let Some(node) = elements.get(binding.element_index).copied() else {
            continue;
        };
        let weak = Rc::downgrade(component);
        let handler = binding.handler.clone();
        dom::listen(
            node,
            &binding.event,
            Rc::new(move |event: &Event| {
                let Some(component) = weak.upgrade() else {
                    return;
                };
                let Ok(mut instance) = component.try_borrow_mut() else {
                    log::error!("`{}` listener fired during an update of the same instance", event.name);
                    return;
                };
                if let Err(err) = handler(event, &mut instance) {
                    log::error!(
                        "{}: `{}` listener failed: {err}",
                        instance.definition.name(),
                        event.name
                    );
                }
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile, Expr, ExtractedNode};
    use crate::dom::{child_count, children, dispatch, get_attribute, has_class, reset_document, text_content, to_html};
    use crate::runtime::effects;

    fn badge() -> Rc<ComponentDefinition> {
        let root = ExtractedNode::element("b").watch(Expr::prop("label"), effects::text());
        Rc::new(compile("badge", &root).unwrap())
    }

    fn labelled(label: &str) -> Value {
        Value::map([("label", Value::from(label))])
    }

    #[test]
    fn test_nested_child_replaces_placeholder() {
        reset_document();
        let root = ExtractedNode::element("div")
            .child(ExtractedNode::element("x-badge").nested(&badge(), Expr::prop("badge")));
        let card = Rc::new(compile("card", &root).unwrap());

        let instance = ComponentInstance::construct(
            &card,
            Value::map([("badge", labelled("new"))]),
            None,
        )
        .unwrap();
        assert_eq!(to_html(instance.borrow().root()), "<div><b>new</b></div>");

        instance
            .borrow_mut()
            .render(Value::map([("badge", labelled("old"))]), None)
            .unwrap();
        assert_eq!(to_html(instance.borrow().root()), "<div><b>old</b></div>");
    }

    #[test]
    fn test_detached_nested_starts_detached() {
        reset_document();
        let root = ExtractedNode::element("div")
            .child(ExtractedNode::element("p").child(ExtractedNode::text("first")))
            .child(
                ExtractedNode::element("x-badge")
                    .nested(&badge(), Expr::prop("badge"))
                    .allow_siblings()
                    .attached_when(Expr::prop("show")),
            );
        let card = Rc::new(compile("card", &root).unwrap());
        let props = |show: bool| Value::map([("show", Value::from(show)), ("badge", labelled("hi"))]);

        let instance = ComponentInstance::construct(&card, props(false), None).unwrap();
        let div = instance.borrow().root();
        assert_eq!(child_count(div), 1, "placeholder removed, child not attached");

        instance.borrow_mut().render(props(true), None).unwrap();
        assert_eq!(to_html(div), "<div><p>first</p><b>hi</b></div>");

        instance.borrow_mut().render(props(false), None).unwrap();
        assert_eq!(to_html(div), "<div><p>first</p></div>");
    }

    #[test]
    fn test_stub_resolves_through_method_table() {
        reset_document();
        let root = ExtractedNode::element("div").child(ExtractedNode::element("slot").stub("footer", Expr::prop("footer")));
        let base = Rc::new(compile("layout", &root).unwrap());

        let missing = ComponentInstance::construct(&base, Value::Null, None);
        assert_eq!(
            missing.err(),
            Some(RuntimeError::UnknownStub {
                component: "layout".to_string(),
                name: "footer".to_string(),
            })
        );

        let page = Rc::new(ComponentDefinition::extend(&base, "page").with_stub("footer", &badge()));
        let instance = ComponentInstance::construct(
            &page,
            Value::map([("footer", labelled("(c)"))]),
            None,
        )
        .unwrap();
        assert_eq!(to_html(instance.borrow().root()), "<div><b>(c)</b></div>");
    }

    #[test]
    fn test_bind_writes_state_and_updates() {
        reset_document();
        let root = ExtractedNode::element("form")
            .child(
                ExtractedNode::element("input")
                    .reference("name")
                    .bind("value", "name", "input"),
            )
            .child(ExtractedNode::element("output").watch(Expr::state("name"), effects::text()));
        let form = Rc::new(
            compile("form", &root)
                .unwrap()
                .with_state(Value::map([("name", Value::from("ada"))])),
        );

        let instance = ComponentInstance::construct(&form, Value::Null, None).unwrap();
        let input = instance.borrow().get_ref("name").unwrap();
        assert_eq!(get_attribute(input, "value"), Some("ada".to_string()));

        assert_eq!(dispatch(input, "input", Value::from("grace")), 1);
        let output = children(instance.borrow().root())[1];
        assert_eq!(text_content(output), "grace");
        assert_eq!(instance.borrow().state().field("name"), Some(&Value::from("grace")));
    }

    #[test]
    fn test_listener_handler_updates_instance() {
        reset_document();
        let increment = effects::handler(|_, instance| {
            let count = instance.state().field("count").and_then(Value::as_int).unwrap_or(0);
            instance.set_state_at(&Path::parse("count"), Value::from(count + 1));
            instance.update()?;
            Ok(())
        });
        let root = ExtractedNode::element("button")
            .on("click", increment)
            .watch(Expr::state("count"), effects::text());
        let counter = Rc::new(compile("counter", &root).unwrap().with_state(Value::map([("count", Value::from(0))])));

        let instance = ComponentInstance::construct(&counter, Value::Null, None).unwrap();
        let button = instance.borrow().root();
        dispatch(button, "click", Value::Null);
        dispatch(button, "click", Value::Null);
        assert_eq!(text_content(button), "2");
    }

    #[test]
    fn test_toggle_switches_target_classes() {
        reset_document();
        let root = ExtractedNode::element("div")
            .toggle("alert", Expr::prop("failed"))
            .toggle_target("alert", "red bold")
            .toggle("busy", Expr::prop("loading"));
        let status = Rc::new(compile("status", &root).unwrap());

        let instance = ComponentInstance::construct(
            &status,
            Value::map([("failed", Value::from(true)), ("loading", Value::from(true))]),
            None,
        )
        .unwrap();
        let div = instance.borrow().root();
        assert!(has_class(div, "red") && has_class(div, "bold"));
        assert!(has_class(div, "busy"), "trigger without target toggles its own name");
    }

    #[test]
    fn test_update_part_runs_only_its_range() {
        reset_document();
        let root = ExtractedNode::element("div")
            .child(ExtractedNode::element("h1").watch(Expr::prop("title"), effects::text()))
            .child(
                ExtractedNode::element("section")
                    .part("body")
                    .child(ExtractedNode::element("p").watch(Expr::prop("body"), effects::text())),
            );
        let page = Rc::new(compile("page", &root).unwrap());
        let props = |title: &str, body: &str| {
            Value::map([("title", Value::from(title)), ("body", Value::from(body))])
        };

        let instance = ComponentInstance::construct(&page, props("a", "b"), None).unwrap();
        instance.borrow_mut().props = props("A", "B");
        let stats = instance.borrow_mut().update_part("body").unwrap();

        assert_eq!(stats.visited, 1);
        assert_eq!(to_html(instance.borrow().root()), "<div><h1>a</h1><section><p>B</p></section></div>");
        assert!(matches!(
            instance.borrow_mut().update_part("nope"),
            Err(RuntimeError::UnknownPart { .. })
        ));
    }

    #[test]
    fn test_update_part_skips_hidden_subtree() {
        reset_document();
        let root = ExtractedNode::element("div")
            .watch(Expr::prop("v"), effects::attribute("data-v"))
            .child(
                ExtractedNode::element("section")
                    .part("body")
                    .shown_when(Expr::prop("open"))
                    .child(ExtractedNode::element("p").watch(Expr::prop("v"), effects::text())),
            )
            .child(ExtractedNode::element("footer").watch(Expr::prop("v"), effects::text()));
        let page = Rc::new(compile("page", &root).unwrap());
        let props = |open: bool, v: &str| Value::map([("open", Value::from(open)), ("v", Value::from(v))]);

        let instance = ComponentInstance::construct(&page, props(true, "1"), None).unwrap();
        instance.borrow_mut().props = props(false, "2");
        let stats = instance.borrow_mut().update_part("body").unwrap();

        assert_eq!((stats.visited, stats.skipped, stats.effects), (1, 1, 0));
        assert_eq!(
            to_html(instance.borrow().root()),
            "<div data-v=\"1\"><section hidden><p>1</p></section><footer>1</footer></div>",
            "only the shield inside the part ran"
        );
    }

    #[test]
    fn test_repeat_items_stay_ahead_of_later_siblings() {
        reset_document();
        let root = ExtractedNode::element("ul")
            .child(ExtractedNode::element("header"))
            .child(ExtractedNode::element("li").repeat(&badge(), Expr::prop("rows")).allow_siblings())
            .child(ExtractedNode::element("li").repeat_keyed(&badge(), Expr::prop("more"), "label").allow_siblings())
            .child(ExtractedNode::element("footer"));
        let list = Rc::new(compile("list", &root).unwrap());
        let props = |rows: &[&str], more: &[&str]| {
            Value::map([
                ("rows", Value::list(rows.iter().map(|r| labelled(r)))),
                ("more", Value::list(more.iter().map(|m| labelled(m)))),
            ])
        };

        let instance = ComponentInstance::construct(&list, props(&["a"], &["x"]), None).unwrap();
        let ul = instance.borrow().root();
        assert_eq!(
            to_html(ul),
            "<ul><header></header><b>a</b><b>x</b><footer></footer></ul>"
        );

        instance.borrow_mut().render(props(&["a", "b"], &["x", "y"]), None).unwrap();
        assert_eq!(
            to_html(ul),
            "<ul><header></header><b>a</b><b>b</b><b>x</b><b>y</b><footer></footer></ul>",
            "growth lands before the next repeat and before the footer"
        );

        instance.borrow_mut().render(props(&["a"], &[]), None).unwrap();
        instance.borrow_mut().render(props(&["a", "c"], &[]), None).unwrap();
        assert_eq!(
            to_html(ul),
            "<ul><header></header><b>a</b><b>c</b><footer></footer></ul>",
            "an empty repeat falls through to the footer"
        );
    }

    #[test]
    fn test_destroy_releases_nodes() {
        reset_document();
        let root = ExtractedNode::element("div")
            .child(ExtractedNode::element("x-badge").nested(&badge(), Expr::prop("badge")));
        let card = Rc::new(compile("card", &root).unwrap());

        let instance = ComponentInstance::construct(&card, Value::map([("badge", labelled("x"))]), None).unwrap();
        assert!(dom::live_count() > 0);
        instance.borrow_mut().destroy();
        assert_eq!(dom::live_count(), 0);
    }
}
