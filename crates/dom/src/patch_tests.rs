//! Diff/patch round-trip checks: applying `diff(A, B)` to a live tree
//! rendered from A must yield a tree equivalent to rendering B directly,
//! with keyed nodes keeping their live identity.

use crate::apply::apply_patches;
use crate::render::render;
use crate::snapshot::assert_dom_eq;
use crate::Document;
use core_types::{DomId, val};
use std::rc::Rc;
use vdom::events::{EventNodeRef, root};
use vdom::facts::{attr, prop, style};
use vdom::node::{VNode, keyed, lazy, map, node, text};
use vdom::diff;

fn sink() -> EventNodeRef {
    root(Rc::new(|_| {}))
}

fn mount(tree: &Rc<VNode>) -> (Document, DomId) {
    let mut doc = Document::new();
    let id = render(&mut doc, tree, &sink()).expect("render failed");
    doc.set_root(id);
    (doc, id)
}

fn patch_to(doc: &mut Document, root_id: DomId, old: &Rc<VNode>, new: &Rc<VNode>) -> DomId {
    let patches = diff(old, new);
    let id = apply_patches(doc, root_id, old, &patches, &sink()).expect("apply failed");
    doc.set_root(id);
    id
}

/// Applies `diff(a, b)` to a render of `a` and compares against a direct
/// render of `b`.
fn assert_roundtrip(a: Rc<VNode>, b: Rc<VNode>) {
    let (mut doc, root_id) = mount(&a);
    let patched = patch_to(&mut doc, root_id, &a, &b);
    let (direct_doc, direct_id) = mount(&b);
    assert_dom_eq(&doc, patched, &direct_doc, direct_id);
}

fn li(label: &str) -> Rc<VNode> {
    node("li", vec![], vec![text(label.to_string())])
}

fn keyed_list(entries: &[(&str, &str)]) -> Rc<VNode> {
    keyed(
        "ul",
        vec![],
        entries
            .iter()
            .map(|(k, label)| ((*k).into(), li(label)))
            .collect(),
    )
}

/// Live child ids of the keyed list, paired with their keys.
fn child_ids(doc: &Document, root_id: DomId) -> Vec<DomId> {
    doc.children(root_id).expect("children").to_vec()
}

#[test]
fn facts_changes_roundtrip() {
    let a = node(
        "div",
        vec![attr("id", "x"), attr("class", "a"), style("color", "red")],
        vec![text("hi")],
    );
    let b = node(
        "div",
        vec![attr("id", "x"), attr("class", "b"), style("margin", "1px")],
        vec![text("hi")],
    );
    assert_roundtrip(a, b);
}

#[test]
fn prop_identity_roundtrip() {
    let shared = val(5_i64);
    let a = node("input", vec![prop("value", shared.clone())], vec![]);
    let b = node("input", vec![prop("value", shared)], vec![]);
    assert_roundtrip(a, b);
}

#[test]
fn text_change_roundtrip() {
    assert_roundtrip(
        node("p", vec![], vec![text("one"), text("two")]),
        node("p", vec![], vec![text("one"), text("2")]),
    );
}

#[test]
fn trailing_append_and_remove_roundtrip() {
    let short = node("ul", vec![], vec![li("a")]);
    let long = node("ul", vec![], vec![li("a"), li("b"), li("c")]);
    assert_roundtrip(short.clone(), long.clone());
    assert_roundtrip(long, short);
}

#[test]
fn kind_mismatch_redraw_roundtrip() {
    assert_roundtrip(
        node("div", vec![], vec![node("span", vec![], vec![text("x")])]),
        node("div", vec![], vec![text("flat")]),
    );
    assert_roundtrip(
        node("div", vec![], vec![text("flat")]),
        node("div", vec![], vec![keyed_list(&[("a", "A")])]),
    );
}

#[test]
fn tag_change_redraw_roundtrip() {
    assert_roundtrip(
        node("div", vec![], vec![node("em", vec![], vec![text("x")])]),
        node("div", vec![], vec![node("strong", vec![], vec![text("x")])]),
    );
}

#[test]
fn dekeyed_transition_roundtrip() {
    let unkeyed = node("ul", vec![], vec![li("A"), li("B")]);
    let keyed_version = keyed_list(&[("a", "A"), ("b", "B2")]);
    assert_roundtrip(unkeyed, keyed_version);
}

#[test]
fn keyed_swap_insert_preserves_identity() {
    // [a, b, c] -> [b, a, d, c]: a/b swap, d inserted before c.
    let a = keyed_list(&[("a", "X"), ("b", "Y"), ("c", "Z")]);
    let b = keyed_list(&[("b", "Y"), ("a", "X"), ("d", "W"), ("c", "Z")]);
    let (mut doc, root_id) = mount(&a);
    let before = child_ids(&doc, root_id);
    let (id_a, id_b, id_c) = (before[0], before[1], before[2]);

    let patched = patch_to(&mut doc, root_id, &a, &b);
    let after = child_ids(&doc, patched);
    assert_eq!(after.len(), 4);
    assert_eq!(after[0], id_b, "b must be the moved original node");
    assert_eq!(after[1], id_a, "a must keep its node");
    assert!(
        !before.contains(&after[2]),
        "d is new and must be a fresh node"
    );
    assert_eq!(after[3], id_c, "c must keep its node");

    let (direct_doc, direct_id) = mount(&b);
    assert_dom_eq(&doc, patched, &direct_doc, direct_id);
}

#[test]
fn keyed_move_to_end_preserves_identity() {
    let a = keyed_list(&[("a", "A"), ("b", "B"), ("c", "C")]);
    let b = keyed_list(&[("b", "B"), ("c", "C"), ("a", "A")]);
    let (mut doc, root_id) = mount(&a);
    let before = child_ids(&doc, root_id);
    let patched = patch_to(&mut doc, root_id, &a, &b);
    let after = child_ids(&doc, patched);
    assert_eq!(after, vec![before[1], before[2], before[0]]);
}

#[test]
fn keyed_move_to_front_preserves_identity() {
    let a = keyed_list(&[("a", "A"), ("b", "B"), ("c", "C")]);
    let b = keyed_list(&[("c", "C"), ("a", "A"), ("b", "B")]);
    let (mut doc, root_id) = mount(&a);
    let before = child_ids(&doc, root_id);
    let patched = patch_to(&mut doc, root_id, &a, &b);
    let after = child_ids(&doc, patched);
    assert_eq!(after, vec![before[2], before[0], before[1]]);
}

#[test]
fn keyed_reversal_preserves_identity() {
    let a = keyed_list(&[("a", "A"), ("b", "B"), ("c", "C")]);
    let b = keyed_list(&[("c", "C"), ("b", "B"), ("a", "A")]);
    let (mut doc, root_id) = mount(&a);
    let before = child_ids(&doc, root_id);
    let patched = patch_to(&mut doc, root_id, &a, &b);
    let after = child_ids(&doc, patched);
    assert_eq!(after, vec![before[2], before[1], before[0]]);
}

#[test]
fn keyed_mixed_permutation_roundtrip() {
    let a = keyed_list(&[
        ("a", "A"),
        ("b", "B"),
        ("c", "C"),
        ("d", "D"),
        ("e", "E"),
    ]);
    let b = keyed_list(&[
        ("d", "D"),
        ("b", "B+"),
        ("f", "F"),
        ("a", "A"),
        ("e", "E"),
    ]);
    assert_roundtrip(a, b);
}

#[test]
fn keyed_clear_and_refill_roundtrip() {
    let a = keyed_list(&[("a", "A"), ("b", "B")]);
    let b = keyed_list(&[]);
    assert_roundtrip(a.clone(), b.clone());
    assert_roundtrip(b, a);
}

#[test]
fn duplicate_keys_roundtrip_without_identity() {
    let a = keyed_list(&[("x", "first"), ("x", "second"), ("y", "Y")]);
    let b = keyed_list(&[("y", "Y"), ("x", "first")]);
    assert_roundtrip(a, b);
}

#[test]
fn keyed_child_update_inside_reorder_roundtrip() {
    // b both moves and changes content; its sub-patches ride the move.
    let a = keyed_list(&[("a", "A"), ("b", "B"), ("c", "C")]);
    let b = keyed_list(&[("b", "B-next"), ("c", "C"), ("a", "A")]);
    let (mut doc, root_id) = mount(&a);
    let before = child_ids(&doc, root_id);
    let patched = patch_to(&mut doc, root_id, &a, &b);
    let after = child_ids(&doc, patched);
    assert_eq!(after, vec![before[1], before[2], before[0]]);
    let (direct_doc, direct_id) = mount(&keyed_list(&[("b", "B-next"), ("c", "C"), ("a", "A")]));
    assert_dom_eq(&doc, patched, &direct_doc, direct_id);
}

#[test]
fn thunk_cache_hit_keeps_live_nodes() {
    let key = val(9_u32);
    let make = |k: core_types::Value| {
        node(
            "div",
            vec![],
            vec![lazy(vec![k], || node("span", vec![], vec![text("memo")]))],
        )
    };
    let a = make(key.clone());
    let b = make(key);
    let (mut doc, root_id) = mount(&a);
    let span_before = child_ids(&doc, root_id)[0];
    let patches = diff(&a, &b);
    assert!(patches.is_empty());
    let patched = patch_to(&mut doc, root_id, &a, &b);
    assert_eq!(child_ids(&doc, patched)[0], span_before);
}

#[test]
fn thunk_miss_patches_through() {
    let make = |label: &'static str| {
        node(
            "div",
            vec![],
            vec![lazy(vec![val(label)], move || {
                node("span", vec![], vec![text(label)])
            })],
        )
    };
    let a = make("one");
    let b = make("two");
    // Force the old thunk the way a first render would.
    let (mut doc, root_id) = mount(&a);
    let patched = patch_to(&mut doc, root_id, &a, &b);
    let (direct_doc, direct_id) = mount(&make("two"));
    assert_dom_eq(&doc, patched, &direct_doc, direct_id);
}

#[test]
fn tagger_wrapped_subtree_roundtrip() {
    let tag: core_types::TaggerFn = Rc::new(|v| v);
    let a = node(
        "div",
        vec![],
        vec![map(tag.clone(), node("span", vec![], vec![text("a")]))],
    );
    let b = node(
        "div",
        vec![],
        vec![map(tag, node("span", vec![], vec![text("b")]))],
    );
    assert_roundtrip(a, b);
}

#[test]
fn deep_nested_changes_roundtrip() {
    let a = node(
        "main",
        vec![attr("class", "shell")],
        vec![
            node(
                "section",
                vec![],
                vec![keyed_list(&[("a", "A"), ("b", "B")]), li("side")],
            ),
            node("footer", vec![], vec![text("v1")]),
        ],
    );
    let b = node(
        "main",
        vec![attr("class", "shell wide")],
        vec![
            node(
                "section",
                vec![],
                vec![keyed_list(&[("b", "B"), ("a", "A+")]), li("side")],
            ),
            node("footer", vec![], vec![text("v2"), text("!")]),
        ],
    );
    assert_roundtrip(a, b);
}

#[test]
fn diff_of_equal_trees_is_empty_after_render() {
    let tree = node(
        "div",
        vec![attr("id", "same")],
        vec![keyed_list(&[("a", "A")]), text("t")],
    );
    assert!(diff(&tree, &tree).is_empty());
    let again = node(
        "div",
        vec![attr("id", "same")],
        vec![keyed_list(&[("a", "A")]), text("t")],
    );
    assert!(diff(&tree, &again).is_empty());
}

#[test]
fn removed_ids_stay_invalid() {
    let a = node("ul", vec![], vec![li("a"), li("b")]);
    let b = node("ul", vec![], vec![li("a")]);
    let (mut doc, root_id) = mount(&a);
    let dropped = child_ids(&doc, root_id)[1];
    patch_to(&mut doc, root_id, &a, &b);
    assert!(!doc.is_live(dropped));
    assert!(doc.get(dropped).is_err());
}
