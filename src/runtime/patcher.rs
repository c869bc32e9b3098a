//! Runtime patcher - the linear watch-list executor.
//!
//! One cursor walks the watch list in address pre-order. A shielded watch
//! whose query says hidden skips itself and the `skip_count` watches of its
//! subtree in one step, so cost is proportional to the watches actually
//! visited. Lookup values are memoised per pass and compared against the
//! per-callback cache; effects only run on change, except under the
//! `Always` key.

use std::ops::Range;

use super::definition::CallbackKey;
use super::detacher::Detacher;
use super::effects::EffectContext;
use super::error::RuntimeError;
use super::instance::ComponentInstance;
use super::scope::Scope;
use crate::compiler::LookupMemo;
use crate::dom::{self, NodeId};
use crate::types::Value;

/// Counters of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatchStats {
    /// Watches the cursor landed on.
    pub visited: usize,
    /// Watches of the window jumped over inside hidden subtrees.
    pub skipped: usize,
    /// Effects run because a lookup changed.
    pub effects: usize,
    /// `Always` callbacks run.
    pub always: usize,
}

/// Run the watches of `instance` in `range`.
pub fn patch(instance: &mut ComponentInstance, range: Range<usize>) -> Result<PatchStats, RuntimeError> {
    let definition = instance.definition.clone();
    let template = definition.template().clone();
    let methods = definition.method_table();
    let watches = &template.watches;
    let lookups = &template.lookups;

    let ComponentInstance {
        props,
        state,
        controller,
        elements,
        cache,
        stash,
        ..
    } = instance;
    let elements: &[NodeId] = elements;
    let scope = Scope::new(props, state, controller.as_ref(), &methods);
    let mut memo = LookupMemo::new(lookups);
    let mut stats = PatchStats::default();

    let end = range.end.min(watches.len());
    let mut i = range.start;
    while i < end {
        let watch = &watches[i];
        let element = elements[watch.element_index];
        stats.visited += 1;

        if let Some(shield) = &watch.shield {
            let visible = memo.evaluate(lookups, shield.query, &scope).is_truthy() != shield.reverse;
            match &shield.detacher {
                Some(spec) => {
                    let parent = elements[spec.parent_element];
                    let tracker = stash.tracker_mut(spec.tracker)?;
                    Detacher::new(spec.sibling_index, parent).apply(tracker, element, visible);
                }
                None => {
                    let hidden = if visible { None } else { Some("") };
                    dom::set_attribute(element, &template.hide_attribute, hidden);
                }
            }
            if !visible {
                // The jump never leaves the window.
                let skip = shield.skip_count.min(end - i - 1);
                log::trace!("{}: watch {i} hidden, skipping {skip}", definition.name());
                stats.skipped += skip;
                i += 1 + skip;
                continue;
            }
        }

        for (slot, callback) in watch.callbacks.iter().enumerate() {
            match callback.key {
                CallbackKey::Always => {
                    let value = Value::Null;
                    let mut ctx = EffectContext::new(element, elements, &value, scope, stash, lookups, &mut memo);
                    for effect in &callback.effects {
                        effect(&mut ctx)?;
                    }
                    stats.always += 1;
                }
                CallbackKey::Lookup(key) => {
                    let value = memo.evaluate(lookups, key, &scope);
                    if cache[i][slot].as_ref() == Some(&value) {
                        continue;
                    }
                    let mut ctx = EffectContext::new(element, elements, &value, scope, stash, lookups, &mut memo);
                    for effect in &callback.effects {
                        effect(&mut ctx)?;
                    }
                    stats.effects += callback.effects.len();
                    cache[i][slot] = Some(value);
                }
            }
        }
        i += 1;
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile, Expr, ExtractedNode};
    use crate::dom::{has_attribute, reset_document, text_content, to_html};
    use crate::runtime::{effects, ComponentInstance, RuntimeError};
    use std::rc::Rc;

    #[test]
    fn test_second_update_is_idempotent() {
        reset_document();
        let root = ExtractedNode::element("div")
            .child(ExtractedNode::element("h1").watch(Expr::prop("title"), effects::text()))
            .child(ExtractedNode::element("p").watch(Expr::prop("title"), effects::attribute("title")));
        let definition = Rc::new(compile("card", &root).unwrap());

        let card = ComponentInstance::construct(
            &definition,
            Value::map([("title", Value::from("Hi"))]),
            None,
        )
        .unwrap();
        let stats = card.borrow_mut().update().unwrap();

        assert_eq!(stats.effects, 0, "nothing changed");
        assert_eq!(stats.visited, 2);
        assert_eq!(to_html(card.borrow().root()), "<div><h1>Hi</h1><p title=\"Hi\"></p></div>");
    }

    #[test]
    fn test_hidden_subtree_is_skipped() {
        reset_document();
        let root = ExtractedNode::element("div").child(
            ExtractedNode::element("section")
                .shown_when(Expr::prop("open"))
                .child(ExtractedNode::element("span").watch(Expr::prop("label"), effects::text())),
        );
        let definition = Rc::new(compile("panel", &root).unwrap());
        let props = |open: bool| {
            Value::map([("open", Value::from(open)), ("label", Value::from("x"))])
        };

        let panel = ComponentInstance::construct(&definition, props(false), None).unwrap();
        let section = dom::child_at(panel.borrow().root(), 0).unwrap();
        assert!(has_attribute(section, "hidden"));
        assert_eq!(text_content(section), "", "label never rendered while hidden");

        let stats = panel.borrow_mut().render(props(true), None).unwrap();
        assert!(!has_attribute(section, "hidden"));
        assert_eq!(text_content(section), "x");
        assert_eq!(stats.skipped, 0);
    }

    #[test]
    fn test_nan_value_is_cached() {
        reset_document();
        let root = ExtractedNode::element("meter").watch(Expr::prop("x"), effects::attribute("value"));
        let definition = Rc::new(compile("gauge", &root).unwrap());

        let gauge = ComponentInstance::construct(
            &definition,
            Value::map([("x", Value::Float(f64::NAN))]),
            None,
        )
        .unwrap();
        let stats = gauge.borrow_mut().update().unwrap();
        assert_eq!(stats.effects, 0, "NaN matches its cached value");
    }

    #[test]
    fn test_range_window_bounds_the_skip() {
        reset_document();
        let root = ExtractedNode::element("div")
            .child(
                ExtractedNode::element("section")
                    .shown_when(Expr::prop("open"))
                    .child(ExtractedNode::element("p").watch(Expr::prop("v"), effects::text()))
                    .child(ExtractedNode::element("p").watch(Expr::prop("v"), effects::text())),
            )
            .child(ExtractedNode::element("footer").watch(Expr::prop("v"), effects::text()));
        let definition = Rc::new(compile("panel", &root).unwrap());
        let props = |open: bool, v: &str| Value::map([("open", Value::from(open)), ("v", Value::from(v))]);

        let panel = ComponentInstance::construct(&definition, props(true, "1"), None).unwrap();
        let mut instance = panel.borrow_mut();
        instance.props = props(false, "2");

        let stats = patch(&mut instance, 0..2).unwrap();
        assert_eq!((stats.visited, stats.skipped), (1, 1), "the jump stops at the window end");

        let stats = patch(&mut instance, 2..4).unwrap();
        assert_eq!(stats.visited, 2, "a window starting inside the subtree is not shielded");
        assert_eq!(stats.effects, 2);
        assert_eq!(
            to_html(instance.root()),
            "<div><section hidden><p>1</p><p>2</p></section><footer>2</footer></div>"
        );
    }

    #[test]
    fn test_failing_effect_aborts_pass() {
        reset_document();
        let failing = effects::effect(|_| Err(RuntimeError::effect("boom")));
        let root = ExtractedNode::element("div")
            .child(ExtractedNode::element("a").watch(Expr::prop("x"), failing))
            .child(ExtractedNode::element("b").watch(Expr::prop("x"), effects::text()));
        let definition = Rc::new(compile("broken", &root).unwrap());

        let result = ComponentInstance::construct(&definition, Value::map([("x", Value::from(1))]), None);
        assert_eq!(result.err(), Some(RuntimeError::effect("boom")));
    }
}
