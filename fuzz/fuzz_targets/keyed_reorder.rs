#![no_main]

use arbitrary::Arbitrary;
use dom::snapshot::{snap_eq, snapshot};
use dom::{Document, apply_patches, render};
use libfuzzer_sys::fuzz_target;
use std::collections::HashMap;
use std::rc::Rc;
use vdom::diff;
use vdom::node::{VNode, keyed, node, text};

#[derive(Arbitrary, Debug)]
struct Lists {
    before: Vec<u8>,
    after: Vec<u8>,
}

fn item(key: u8) -> Rc<VNode> {
    node("li", vec![], vec![text(format!("item {key}"))])
}

fn list(keys: &[u8]) -> Rc<VNode> {
    keyed(
        "ul",
        vec![],
        keys.iter()
            .take(12)
            .map(|k| (format!("k{k}").into(), item(*k)))
            .collect(),
    )
}

fn sink() -> vdom::EventNodeRef {
    vdom::root(Rc::new(|_| {}))
}

fuzz_target!(|lists: Lists| {
    let a = list(&lists.before);
    let b = list(&lists.after);

    let mut doc = Document::new();
    let root = render(&mut doc, &a, &sink()).expect("render a");
    doc.set_root(root);
    let ids_before: HashMap<u8, _> = lists
        .before
        .iter()
        .take(12)
        .zip(doc.children(root).expect("children").iter().copied())
        .map(|(k, id)| (*k, id))
        .collect();

    let patches = diff(&a, &b);
    let patched = apply_patches(&mut doc, root, &a, &patches, &sink()).expect("apply");

    let mut direct = Document::new();
    let expected = render(&mut direct, &b, &sink()).expect("render b");
    assert!(
        snap_eq(&snapshot(&doc, patched), &snapshot(&direct, expected)),
        "patched keyed list must match a direct render"
    );

    // Identity: a unique key present on both sides keeps its live node.
    let unique = |keys: &[u8], k: u8| keys.iter().take(12).filter(|x| **x == k).count() == 1;
    let after_ids = doc.children(patched).expect("children").to_vec();
    for (position, key) in lists.after.iter().take(12).enumerate() {
        if unique(&lists.before, *key) && unique(&lists.after, *key) {
            if let Some(old_id) = ids_before.get(key) {
                assert_eq!(
                    after_ids[position], *old_id,
                    "key {key} was recreated instead of moved"
                );
            }
        }
    }
});
