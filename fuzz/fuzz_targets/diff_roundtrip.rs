#![no_main]

use arbitrary::Arbitrary;
use dom::snapshot::{snap_eq, snapshot};
use dom::{Document, apply_patches, render};
use libfuzzer_sys::fuzz_target;
use std::rc::Rc;
use vdom::node::{VNode, keyed, node, text};
use vdom::{attr, diff, style};

const MAX_DEPTH: usize = 4;
const TAGS: [&str; 4] = ["div", "span", "ul", "li"];

#[derive(Arbitrary, Debug)]
enum Spec {
    Text(u8),
    Elem {
        tag: u8,
        attrs: Vec<(u8, u8)>,
        children: Vec<Spec>,
    },
    Keyed {
        tag: u8,
        children: Vec<(u8, Spec)>,
    },
}

fn build(spec: &Spec, depth: usize) -> Rc<VNode> {
    if depth >= MAX_DEPTH {
        return text("deep");
    }
    match spec {
        Spec::Text(t) => text(format!("t{t}")),
        Spec::Elem {
            tag,
            attrs,
            children,
        } => node(
            TAGS[*tag as usize % TAGS.len()],
            attrs
                .iter()
                .take(4)
                .map(|(name, value)| {
                    if name % 2 == 0 {
                        attr(format!("a{}", name % 5), format!("v{value}"))
                    } else {
                        style(format!("s{}", name % 5), format!("v{value}"))
                    }
                })
                .collect(),
            children
                .iter()
                .take(6)
                .map(|child| build(child, depth + 1))
                .collect(),
        ),
        Spec::Keyed { tag, children } => keyed(
            TAGS[*tag as usize % TAGS.len()],
            vec![],
            children
                .iter()
                .take(6)
                // A tiny key alphabet on purpose: duplicate keys must
                // degrade to position-based matching, never crash.
                .map(|(key, child)| (format!("k{}", key % 4).into(), build(child, depth + 1)))
                .collect(),
        ),
    }
}

fn sink() -> vdom::EventNodeRef {
    vdom::root(Rc::new(|_| {}))
}

fuzz_target!(|specs: (Spec, Spec)| {
    let a = build(&specs.0, 0);
    let b = build(&specs.1, 0);

    assert!(diff(&a, &a).is_empty(), "diff of a tree with itself");

    let mut doc = Document::new();
    let root = render(&mut doc, &a, &sink()).expect("render a");
    doc.set_root(root);
    let patches = diff(&a, &b);
    let patched = apply_patches(&mut doc, root, &a, &patches, &sink()).expect("apply");

    let mut direct = Document::new();
    let expected = render(&mut direct, &b, &sink()).expect("render b");
    assert!(
        snap_eq(&snapshot(&doc, patched), &snapshot(&direct, expected)),
        "patched tree must match a direct render"
    );
});
