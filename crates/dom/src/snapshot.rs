//! Structural snapshots for comparing live trees in tests.

use crate::{Document, NodeKind};
use core_types::{DomId, Value};
use std::rc::Rc;
use std::sync::Arc;
use vdom::facts::HandlerShape;

pub enum SnapNode {
    Text(String),
    Element {
        tag: Arc<str>,
        namespace: Option<Arc<str>>,
        attrs: Vec<(Arc<str>, Arc<str>)>,
        attrs_ns: Vec<(Arc<str>, (Arc<str>, Arc<str>))>,
        styles: Vec<(Arc<str>, Arc<str>)>,
        /// Property values compare by reference identity, matching the
        /// diff engine's contract.
        props: Vec<(Arc<str>, Value)>,
        listeners: Vec<(Arc<str>, HandlerShape)>,
        children: Vec<SnapNode>,
    },
}

pub fn snapshot(doc: &Document, id: DomId) -> SnapNode {
    let record = doc.get(id).expect("snapshot of a missing node");
    match &record.kind {
        NodeKind::Text(text) => SnapNode::Text(text.clone()),
        NodeKind::Element {
            tag,
            namespace,
            attrs,
            attrs_ns,
            styles,
            props,
            listeners,
            children,
        } => SnapNode::Element {
            tag: tag.clone(),
            namespace: namespace.clone(),
            attrs: attrs.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            attrs_ns: attrs_ns
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            styles: styles.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            props: props.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            listeners: listeners
                .iter()
                .map(|(k, l)| (k.clone(), l.handler.borrow().shape))
                .collect(),
            children: children.iter().map(|c| snapshot(doc, *c)).collect(),
        },
    }
}

pub fn snap_eq(a: &SnapNode, b: &SnapNode) -> bool {
    match (a, b) {
        (SnapNode::Text(x), SnapNode::Text(y)) => x == y,
        (
            SnapNode::Element {
                tag: at,
                namespace: ans,
                attrs: aa,
                attrs_ns: aans,
                styles: ast,
                props: ap,
                listeners: al,
                children: ac,
            },
            SnapNode::Element {
                tag: bt,
                namespace: bns,
                attrs: ba,
                attrs_ns: bans,
                styles: bst,
                props: bp,
                listeners: bl,
                children: bc,
            },
        ) => {
            at == bt
                && ans == bns
                && aa == ba
                && aans == bans
                && ast == bst
                && al == bl
                && ap.len() == bp.len()
                && ap
                    .iter()
                    .zip(bp)
                    .all(|((ak, av), (bk, bv))| ak == bk && Rc::ptr_eq(av, bv))
                && ac.len() == bc.len()
                && ac.iter().zip(bc).all(|(x, y)| snap_eq(x, y))
        }
        _ => false,
    }
}

pub fn describe(node: &SnapNode, out: &mut String, depth: usize) {
    let indent = "  ".repeat(depth);
    match node {
        SnapNode::Text(text) => out.push_str(&format!("{indent}{text:?}\n")),
        SnapNode::Element {
            tag,
            attrs,
            styles,
            listeners,
            children,
            ..
        } => {
            out.push_str(&format!(
                "{indent}<{tag} attrs={attrs:?} styles={styles:?} listeners={:?}>\n",
                listeners.iter().map(|(k, _)| k.clone()).collect::<Vec<_>>()
            ));
            for child in children {
                describe(child, out, depth + 1);
            }
        }
    }
}

/// Asserts two live subtrees are structurally and attribute-equivalent.
pub fn assert_dom_eq(doc_a: &Document, a: DomId, doc_b: &Document, b: DomId) {
    let snap_a = snapshot(doc_a, a);
    let snap_b = snapshot(doc_b, b);
    if !snap_eq(&snap_a, &snap_b) {
        let mut left = String::new();
        let mut right = String::new();
        describe(&snap_a, &mut left, 0);
        describe(&snap_b, &mut right, 0);
        panic!("live trees differ\n--- left ---\n{left}--- right ---\n{right}");
    }
}
