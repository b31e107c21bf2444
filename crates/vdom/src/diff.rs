//! Virtual tree diffing.
//!
//! Contract:
//! - Single pass, O(n) in tree size; identical references short-circuit.
//! - Output is a flat, index-ascending patch list addressed in pre-order
//!   positions over the old tree (a node spans `1 + descendants` positions).
//! - Different node kinds force a subtree redraw, except an unkeyed element
//!   meeting a keyed one at the same position, which is de-keyed and diffed
//!   structurally.
//! - Keyed children are reconciled by a two-pointer scan with one-step
//!   lookahead (match / swap / insert / remove); any shape the scan cannot
//!   classify locally closes out both suffixes as removals then insertions.
//! - A duplicate key degrades to position-based matching: the scan suffixes
//!   a fixed private constant and retries, never errors.

use crate::facts::diff_facts;
use crate::node::{ElemNode, KeyedNode, VNode, force_thunk};
use crate::patch::{
    Entry, EntryKind, EntryRef, Insert, Patch, PatchOp, RemoveData, ReorderData,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// Fixed suffix for disambiguating duplicate keys. Intentionally a constant,
/// not a counter: repeated duplicates keep folding onto the same synthetic
/// key and fall back to position-based matching.
const KEY_POSTFIX: &str = "\u{1f}dup";

pub fn diff(old: &Rc<VNode>, new: &Rc<VNode>) -> Vec<Patch> {
    let mut patches = Vec::new();
    diff_help(old, new, &mut patches, 0);
    log::trace!(target: "vdom.diff", "diff produced {} patches", patches.len());
    patches
}

fn push(patches: &mut Vec<Patch>, op: PatchOp, index: usize) {
    patches.push(Patch::new(index, op));
}

pub(crate) fn diff_help(x: &Rc<VNode>, y: &Rc<VNode>, patches: &mut Vec<Patch>, index: usize) {
    if Rc::ptr_eq(x, y) {
        return;
    }
    match (&**x, &**y) {
        (VNode::Thunk(xt), VNode::Thunk(yt)) => {
            let same_refs = xt.refs.len() == yt.refs.len()
                && xt
                    .refs
                    .iter()
                    .zip(&yt.refs)
                    .all(|(a, b)| Rc::ptr_eq(a, b));
            let x_node = force_thunk(xt);
            if same_refs {
                // Cache hit: reuse the old subtree (and its DOM) wholesale.
                *yt.cache.borrow_mut() = Some(x_node);
                return;
            }
            let y_node = force_thunk(yt);
            let mut sub = Vec::new();
            diff_help(&x_node, &y_node, &mut sub, 0);
            if !sub.is_empty() {
                push(patches, PatchOp::Thunk(sub), index);
            }
        }
        (VNode::Tagger(xt), VNode::Tagger(yt)) => {
            let changed = xt.funcs.len() != yt.funcs.len()
                || xt
                    .funcs
                    .iter()
                    .zip(&yt.funcs)
                    .any(|(a, b)| !Rc::ptr_eq(a, b));
            if changed {
                push(patches, PatchOp::Tagger(yt.funcs.clone()), index);
            }
            diff_help(&xt.child, &yt.child, patches, index + 1);
        }
        (VNode::Text(xs), VNode::Text(ys)) => {
            if xs != ys {
                push(patches, PatchOp::Text(ys.clone()), index);
            }
        }
        (VNode::Elem(xe), VNode::Elem(ye)) => {
            if xe.tag != ye.tag || xe.namespace != ye.namespace {
                push(patches, PatchOp::Redraw(y.clone()), index);
                return;
            }
            let facts = diff_facts(&xe.facts, &ye.facts);
            if !facts.is_empty() {
                push(patches, PatchOp::Facts(facts), index);
            }
            diff_kids(xe, ye, patches, index);
        }
        (VNode::Keyed(xk), VNode::Keyed(yk)) => {
            if xk.tag != yk.tag || xk.namespace != yk.namespace {
                push(patches, PatchOp::Redraw(y.clone()), index);
                return;
            }
            let facts = diff_facts(&xk.facts, &yk.facts);
            if !facts.is_empty() {
                push(patches, PatchOp::Facts(facts), index);
            }
            diff_keyed_kids(xk, yk, patches, index);
        }
        (VNode::Elem(xe), VNode::Keyed(yk)) => {
            // Keyed node arriving where a plain element was: strip the keys
            // and reconcile structurally rather than redraw.
            let dekeyed = dekey(yk);
            if xe.tag != yk.tag || xe.namespace != yk.namespace {
                push(patches, PatchOp::Redraw(y.clone()), index);
                return;
            }
            let facts = diff_facts(&xe.facts, &yk.facts);
            if !facts.is_empty() {
                push(patches, PatchOp::Facts(facts), index);
            }
            diff_kids(xe, &dekeyed, patches, index);
        }
        (VNode::Custom(xc), VNode::Custom(yc)) => {
            let same_widget = Rc::ptr_eq(&xc.widget, &yc.widget);
            if !same_widget || !yc.widget.keep(&xc.model, &yc.model) {
                push(patches, PatchOp::Redraw(y.clone()), index);
                return;
            }
            let facts = diff_facts(&xc.facts, &yc.facts);
            if !facts.is_empty() {
                push(patches, PatchOp::Facts(facts), index);
            }
        }
        _ => push(patches, PatchOp::Redraw(y.clone()), index),
    }
}

fn dekey(node: &KeyedNode) -> ElemNode {
    ElemNode {
        tag: node.tag.clone(),
        namespace: node.namespace.clone(),
        facts: node.facts.clone(),
        children: node.children.iter().map(|(_, c)| c.clone()).collect(),
        descendants: node.descendants,
    }
}

fn diff_kids(x: &ElemNode, y: &ElemNode, patches: &mut Vec<Patch>, index: usize) {
    let x_len = x.children.len();
    let y_len = y.children.len();
    if x_len > y_len {
        push(
            patches,
            PatchOp::RemoveLast {
                kept: y_len,
                dropped: x_len - y_len,
            },
            index,
        );
    } else if x_len < y_len {
        push(
            patches,
            PatchOp::Append {
                kept: x_len,
                kids: y.children.clone(),
            },
            index,
        );
    }
    let mut idx = index;
    for (x_kid, y_kid) in x.children.iter().zip(&y.children) {
        idx += 1;
        diff_help(x_kid, y_kid, patches, idx);
        idx += x_kid.descendants();
    }
}

fn diff_keyed_kids(x: &KeyedNode, y: &KeyedNode, patches: &mut Vec<Patch>, root_index: usize) {
    let mut local: Vec<Patch> = Vec::new();
    let mut changes: HashMap<Arc<str>, EntryRef> = HashMap::new();
    let mut inserts: Vec<Insert> = Vec::new();
    let mut end_inserts: Vec<Insert> = Vec::new();

    let xs = &x.children;
    let ys = &y.children;
    let mut xi = 0;
    let mut yi = 0;
    let mut index = root_index;

    while xi < xs.len() && yi < ys.len() {
        let (x_key, x_node) = &xs[xi];
        let (y_key, y_node) = &ys[yi];

        if x_key == y_key {
            index += 1;
            diff_help(x_node, y_node, &mut local, index);
            index += x_node.descendants();
            xi += 1;
            yi += 1;
            continue;
        }

        let x_next = xs.get(xi + 1);
        let y_next = ys.get(yi + 1);
        let old_match = x_next.is_some_and(|(k, _)| k == y_key);
        let new_match = y_next.is_some_and(|(k, _)| k == x_key);

        if old_match && new_match {
            // Adjacent swap: x pairs with the next new node, y moves in front.
            let (_, y_next_node) = y_next.unwrap();
            let (x_next_key, x_next_node) = x_next.unwrap();
            index += 1;
            diff_help(x_node, y_next_node, &mut local, index);
            insert_node(
                &mut changes,
                &mut local,
                y_key.clone(),
                y_node.clone(),
                Some(yi),
                &mut inserts,
            );
            index += x_node.descendants();
            index += 1;
            remove_node(
                &mut changes,
                &mut local,
                x_next_key.clone(),
                x_next_node.clone(),
                index,
            );
            index += x_next_node.descendants();
            xi += 2;
            yi += 2;
        } else if new_match {
            // Pure insertion in front of x.
            let (_, y_next_node) = y_next.unwrap();
            index += 1;
            insert_node(
                &mut changes,
                &mut local,
                y_key.clone(),
                y_node.clone(),
                Some(yi),
                &mut inserts,
            );
            diff_help(x_node, y_next_node, &mut local, index);
            index += x_node.descendants();
            xi += 1;
            yi += 2;
        } else if old_match {
            // Pure removal of x.
            let (_, x_next_node) = x_next.unwrap();
            index += 1;
            remove_node(
                &mut changes,
                &mut local,
                x_key.clone(),
                x_node.clone(),
                index,
            );
            index += x_node.descendants();
            index += 1;
            diff_help(x_next_node, y_node, &mut local, index);
            index += x_next_node.descendants();
            xi += 2;
            yi += 1;
        } else {
            let pair_match = match (x_next, y_next) {
                (Some((xnk, _)), Some((ynk, _))) => xnk == ynk,
                _ => false,
            };
            if !pair_match {
                // Nothing classifiable within one step of lookahead.
                break;
            }
            // Heads replaced, next pair matches: remove x, insert y.
            let (_, x_next_node) = x_next.unwrap();
            let (_, y_next_node) = y_next.unwrap();
            index += 1;
            remove_node(
                &mut changes,
                &mut local,
                x_key.clone(),
                x_node.clone(),
                index,
            );
            insert_node(
                &mut changes,
                &mut local,
                y_key.clone(),
                y_node.clone(),
                Some(yi),
                &mut inserts,
            );
            index += x_node.descendants();
            index += 1;
            diff_help(x_next_node, y_next_node, &mut local, index);
            index += x_next_node.descendants();
            xi += 2;
            yi += 2;
        }
    }

    // Close out the suffixes: old leftovers are removals, new ones inserts.
    while xi < xs.len() {
        let (x_key, x_node) = &xs[xi];
        index += 1;
        remove_node(
            &mut changes,
            &mut local,
            x_key.clone(),
            x_node.clone(),
            index,
        );
        index += x_node.descendants();
        xi += 1;
    }
    for (y_key, y_node) in &ys[yi..] {
        insert_node(
            &mut changes,
            &mut local,
            y_key.clone(),
            y_node.clone(),
            None,
            &mut end_inserts,
        );
    }

    if !local.is_empty() || !inserts.is_empty() || !end_inserts.is_empty() {
        push(
            patches,
            PatchOp::Reorder(ReorderData {
                patches: local,
                inserts,
                end_inserts,
            }),
            root_index,
        );
    }
}

fn insert_node(
    changes: &mut HashMap<Arc<str>, EntryRef>,
    local: &mut Vec<Patch>,
    key: Arc<str>,
    vnode: Rc<VNode>,
    position: Option<usize>,
    inserts: &mut Vec<Insert>,
) {
    match changes.get(&key).cloned() {
        None => {
            let entry: EntryRef = Rc::new(Entry {
                kind: Cell::new(EntryKind::Insert),
                vnode,
                index: Cell::new(position.unwrap_or(usize::MAX)),
                stashed: RefCell::new(None),
                remove_slot: Cell::new(None),
            });
            inserts.push(Insert {
                position,
                entry: entry.clone(),
            });
            changes.insert(key, entry);
        }
        Some(entry) if entry.kind.get() == EntryKind::Remove => {
            // The key was removed earlier in the scan: this is a move. Diff
            // old against new at the old position and upgrade the pending
            // removal to carry the sub-patches and shared entry.
            inserts.push(Insert {
                position,
                entry: entry.clone(),
            });
            entry.kind.set(EntryKind::Move);
            let mut sub = Vec::new();
            diff_help(&entry.vnode, &vnode, &mut sub, entry.index.get());
            if let Some(slot) = entry.remove_slot.get() {
                local[slot].op = PatchOp::Remove(Some(RemoveData {
                    patches: sub,
                    entry: entry.clone(),
                }));
            } else {
                debug_assert!(false, "move entry without a removal patch");
            }
        }
        Some(_) => {
            // Duplicate key: degrade to position-based matching.
            let dup: Arc<str> = format!("{key}{KEY_POSTFIX}").into();
            insert_node(changes, local, dup, vnode, position, inserts);
        }
    }
}

fn remove_node(
    changes: &mut HashMap<Arc<str>, EntryRef>,
    local: &mut Vec<Patch>,
    key: Arc<str>,
    vnode: Rc<VNode>,
    index: usize,
) {
    match changes.get(&key).cloned() {
        None => {
            local.push(Patch::new(index, PatchOp::Remove(None)));
            let slot = local.len() - 1;
            let entry: EntryRef = Rc::new(Entry {
                kind: Cell::new(EntryKind::Remove),
                vnode,
                index: Cell::new(index),
                stashed: RefCell::new(None),
                remove_slot: Cell::new(Some(slot)),
            });
            changes.insert(key, entry);
        }
        Some(entry) if entry.kind.get() == EntryKind::Insert => {
            // The key was inserted earlier in the scan: this removal is the
            // other half of a move. The entry keeps the new vnode; the node
            // leaving here is patched old-to-new, then stashed.
            entry.kind.set(EntryKind::Move);
            let mut sub = Vec::new();
            diff_help(&vnode, &entry.vnode, &mut sub, index);
            local.push(Patch::new(
                index,
                PatchOp::Remove(Some(RemoveData {
                    patches: sub,
                    entry: entry.clone(),
                })),
            ));
        }
        Some(_) => {
            let dup: Arc<str> = format!("{key}{KEY_POSTFIX}").into();
            remove_node(changes, local, dup, vnode, index);
        }
    }
}
