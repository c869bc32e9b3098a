//! Property tests for consolidation and the patch engine.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use proptest::prelude::*;

use spark_view::dom::{self, children, create_element, reset_stats, stats, text_content};
use spark_view::{
    compile, effects, reset_document, Component, ComponentDefinition, ComponentInstance, Expr,
    ExtractedNode, ItemKey, KeyedRepeater, Path, SequentialRepeater, Value,
};

// =============================================================================
// Generators
// =============================================================================

/// Shape of a generated tree. Field `n` of props drives node `n`.
#[derive(Debug, Clone)]
struct Shape {
    watch: bool,
    shield: bool,
    children: Vec<Shape>,
}

fn arb_shape() -> impl Strategy<Value = Shape> {
    let leaf = (any::<bool>(), any::<bool>()).prop_map(|(watch, shield)| Shape {
        watch,
        shield,
        children: Vec::new(),
    });
    leaf.prop_recursive(3, 24, 4, |inner| {
        (any::<bool>(), any::<bool>(), prop::collection::vec(inner, 0..4)).prop_map(
            |(watch, shield, children)| Shape {
                watch,
                shield,
                children,
            },
        )
    })
}

fn build(shape: &Shape, counter: &mut usize, is_root: bool) -> ExtractedNode {
    let id = *counter;
    *counter += 1;
    let mut node = ExtractedNode::element("div");
    if shape.watch {
        node = node.watch(Expr::prop(&format!("v{id}")), effects::attribute("data-v"));
    }
    if shape.shield && !is_root {
        node = node.shown_when(Expr::prop(&format!("s{id}")));
    }
    for child in &shape.children {
        node = node.child(build(child, counter, false));
    }
    node
}

fn props_for(count: usize, seed: u64) -> Value {
    let mut entries = Vec::new();
    for id in 0..count {
        entries.push((format!("v{id}"), Value::from(((seed % 3) as i64 + id as i64) % 3)));
        entries.push((format!("s{id}"), Value::from((seed >> (id % 60)) & 1 == 1)));
    }
    Value::map(entries)
}

fn unique(keys: Vec<i64>) -> Vec<i64> {
    let mut seen = std::collections::HashSet::new();
    keys.into_iter().filter(|k| seen.insert(*k)).collect()
}

fn row_definition() -> Rc<ComponentDefinition> {
    let root = ExtractedNode::element("li").watch(Expr::prop("label"), effects::text());
    Rc::new(compile("row", &root).unwrap())
}

fn row(id: i64) -> Value {
    Value::map([("id", Value::from(id)), ("label", Value::from(format!("row {id}")))])
}

fn texts(container: dom::NodeId) -> Vec<String> {
    children(container).into_iter().map(text_content).collect()
}

// =============================================================================
// Consolidation
// =============================================================================

proptest! {
    #[test]
    fn prop_watch_list_is_pre_order_with_exact_skip_counts(shape in arb_shape()) {
        let mut counter = 0;
        let root = build(&shape, &mut counter, true);
        let definition = compile("generated", &root).unwrap();
        let watches = definition.template().watches();

        for pair in watches.windows(2) {
            prop_assert!(pair[0].address < pair[1].address, "pre-order");
        }
        for (i, watch) in watches.iter().enumerate() {
            if let Some(shield) = &watch.shield {
                let descendants = watches[i + 1..]
                    .iter()
                    .filter(|later| later.address.extends(&watch.address))
                    .count();
                prop_assert_eq!(shield.skip_count, descendants);
            }
        }
    }

    #[test]
    fn prop_second_update_runs_no_value_effects(shape in arb_shape(), seed in any::<u64>()) {
        reset_document();
        let mut counter = 0;
        let root = build(&shape, &mut counter, true);
        let definition = Rc::new(compile("generated", &root).unwrap());

        let instance = ComponentInstance::construct(&definition, props_for(counter, seed), None).unwrap();
        let stats = instance.borrow_mut().update().unwrap();
        prop_assert_eq!(stats.effects, 0);
    }
}

#[test]
fn test_skip_count_example() {
    let root = ExtractedNode::element("div")
        .watch(Expr::prop("a"), effects::text())
        .child(
            ExtractedNode::element("p")
                .shown_when(Expr::prop("open"))
                .child(ExtractedNode::element("span").watch(Expr::prop("b"), effects::text())),
        )
        .child(ExtractedNode::element("p").watch(Expr::prop("c"), effects::text()));
    let definition = compile("example", &root).unwrap();
    let watches = definition.template().watches();

    let addresses: Vec<&[usize]> = watches.iter().map(|w| w.address.as_slice()).collect();
    assert_eq!(addresses, vec![&[][..], &[0][..], &[0, 0][..], &[1][..]]);
    assert_eq!(
        watches[1].shield.as_ref().unwrap().skip_count,
        1,
        "hiding [0] skips [0, 0] only"
    );
}

// =============================================================================
// Detacher
// =============================================================================

proptest! {
    #[test]
    fn prop_detached_siblings_keep_logical_order(
        steps in prop::collection::vec(prop::array::uniform3(any::<bool>()), 1..12)
    ) {
        reset_document();
        let mut root = ExtractedNode::element("ul");
        for i in 0..3 {
            root = root.child(
                ExtractedNode::element("li")
                    .attached_when(Expr::prop(&format!("show{i}")))
                    .child(ExtractedNode::text(&format!("item {i}"))),
            );
        }
        let definition = Rc::new(compile("toggles", &root).unwrap());
        let props = |visible: [bool; 3]| {
            Value::map((0..3).map(|i| (format!("show{i}"), Value::from(visible[i]))))
        };

        let instance = ComponentInstance::construct(&definition, props([true; 3]), None).unwrap();
        let ul = instance.borrow().root();
        for visible in steps {
            instance.borrow_mut().render(props(visible), None).unwrap();
            let expected: Vec<String> = (0..3)
                .filter(|i| visible[*i])
                .map(|i| format!("item {i}"))
                .collect();
            prop_assert_eq!(texts(ul), expected);
        }
    }
}

// =============================================================================
// Repeaters
// =============================================================================

proptest! {
    #[test]
    fn prop_keyed_patch_follows_order_and_keeps_identity(
        first in prop::collection::vec(0..12i64, 0..10),
        second in prop::collection::vec(0..12i64, 0..10),
        share in any::<bool>(),
    ) {
        reset_document();
        let first = unique(first);
        let second = unique(second);
        let container = create_element("ul");
        let mut repeater = KeyedRepeater::new(row_definition(), Path::parse("id"), share);

        let items: Vec<Value> = first.iter().map(|id| row(*id)).collect();
        repeater.patch(container, &items, None).unwrap();
        let before: HashMap<i64, Component> = first
            .iter()
            .map(|id| (*id, repeater.instance(&ItemKey::Int(*id)).unwrap().clone()))
            .collect();

        let items: Vec<Value> = second.iter().map(|id| row(*id)).collect();
        repeater.patch(container, &items, None).unwrap();

        let expected: Vec<String> = second.iter().map(|id| format!("row {id}")).collect();
        prop_assert_eq!(texts(container), expected);
        for id in &second {
            if let Some(old) = before.get(id) {
                let now = repeater.instance(&ItemKey::Int(*id)).unwrap();
                prop_assert!(Rc::ptr_eq(old, now), "key {} kept its instance", id);
            }
        }
    }
}

#[test]
fn test_sequential_same_length_renders_in_place() {
    reset_document();
    let renders = Rc::new(Cell::new(0));
    let renders_clone = renders.clone();
    let counting = effects::effect(move |ctx| {
        renders_clone.set(renders_clone.get() + 1);
        dom::set_text(ctx.element(), &ctx.value().to_text());
        Ok(())
    });
    let definition = Rc::new(
        compile("row", &ExtractedNode::element("li").watch(Expr::prop("label"), counting)).unwrap(),
    );
    let container = create_element("ul");
    let mut repeater = SequentialRepeater::new(definition.clone(), true);
    let labels = |names: [&str; 2]| -> Vec<Value> {
        names
            .iter()
            .map(|n| Value::map([("label", Value::from(*n))]))
            .collect()
    };

    repeater.patch(container, &labels(["x1", "x2"]), None).unwrap();
    renders.set(0);
    reset_stats();

    repeater.patch(container, &labels(["y1", "y2"]), None).unwrap();
    assert_eq!(renders.get(), 2, "each item re-rendered once");
    assert_eq!(stats().structural(), 0, "no inserts, appends or removes");
    assert_eq!(repeater.instances().len(), 2, "no pool growth");
    assert_eq!(definition.pool().len(), 0);
    assert_eq!(texts(container), vec!["y1", "y2"]);
}

// =============================================================================
// Pool Cascade
// =============================================================================

proptest! {
    #[test]
    fn prop_dismount_returns_every_leaf(groups in prop::collection::vec(0..4usize, 0..5)) {
        reset_document();
        let leaf = row_definition();
        let group = Rc::new(
            compile(
                "group",
                &ExtractedNode::element("section").child(
                    ExtractedNode::element("ul")
                        .child(ExtractedNode::element("li").repeat_keyed(&leaf, Expr::prop("leaves"), "id")),
                ),
            )
            .unwrap(),
        );
        let board = Rc::new(
            compile(
                "board",
                &ExtractedNode::element("div")
                    .child(ExtractedNode::element("section").repeat(&group, Expr::prop("groups"))),
            )
            .unwrap(),
        );

        let mut next_id = 0;
        let group_props: Vec<Value> = groups
            .iter()
            .map(|size| {
                let leaves: Vec<Value> = (0..*size)
                    .map(|_| {
                        next_id += 1;
                        row(next_id)
                    })
                    .collect();
                Value::map([("leaves", Value::list(leaves))])
            })
            .collect();
        let instance = ComponentInstance::construct(
            &board,
            Value::map([("groups", Value::list(group_props))]),
            None,
        )
        .unwrap();
        prop_assert_eq!(group.pool().len(), 0);
        prop_assert_eq!(leaf.pool().len(), 0);

        instance.borrow_mut().dismount();
        prop_assert_eq!(group.pool().len(), groups.len());
        prop_assert_eq!(leaf.pool().len(), groups.iter().sum::<usize>());
        prop_assert_eq!(dom::child_count(instance.borrow().root()), 0);
    }
}
