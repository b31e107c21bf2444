//! Patch addressing and application.
//!
//! Contract:
//! - `add_dom_nodes` walks the old virtual tree and the live tree in
//!   lock-step, using precomputed descendant counts to skip subtrees whose
//!   index range holds no patch, and attaches the matching live node and
//!   event chain onto every patch.
//! - `apply_patches` then applies in index order; a redraw replaces the node
//!   and keeps its prior event chain when the new render did not set one.
//! - Keyed reorders apply their recorded removals first (stashing moved
//!   nodes on the shared entries), then replay mid-list inserts in scan
//!   order, then end inserts.

use crate::render::render;
use crate::{Document, DomError};
use core_types::DomId;
use std::rc::Rc;
use vdom::events::{EventNode, EventNodeRef};
use vdom::facts::FactsDiff;
use vdom::node::{VNode, force_thunk};
use vdom::patch::{EntryKind, Insert, Patch, PatchOp};

pub fn apply_patches(
    doc: &mut Document,
    root: DomId,
    old_vnode: &Rc<VNode>,
    patches: &[Patch],
    event_node: &EventNodeRef,
) -> Result<DomId, DomError> {
    if patches.is_empty() {
        return Ok(root);
    }
    add_dom_nodes(doc, root, old_vnode, patches, event_node);
    apply_patch_list(doc, root, patches)
}

/// Attaches live targets and event chains to an index-ascending patch list.
pub fn add_dom_nodes(
    doc: &Document,
    root: DomId,
    vnode: &Rc<VNode>,
    patches: &[Patch],
    event_node: &EventNodeRef,
) {
    add_helper(doc, root, vnode, patches, 0, 0, vnode.descendants(), event_node);
}

fn add_helper(
    doc: &Document,
    dom: DomId,
    vnode: &Rc<VNode>,
    patches: &[Patch],
    mut i: usize,
    low: usize,
    high: usize,
    event_node: &EventNodeRef,
) -> usize {
    while i < patches.len() {
        let patch = &patches[i];
        if patch.index > high {
            return i;
        }
        if patch.index != low {
            break;
        }
        attach(doc, dom, vnode, patch, low, high, event_node);
        i += 1;
    }
    match &**vnode {
        VNode::Tagger(tagger) => {
            let child_event = doc
                .event_node(dom)
                .unwrap_or_else(|| event_node.clone());
            add_helper(doc, dom, &tagger.child, patches, i, low + 1, high, &child_event)
        }
        VNode::Elem(elem) => {
            let kids: Vec<Rc<VNode>> = elem.children.clone();
            add_kids(doc, dom, &kids, patches, i, low, high, event_node)
        }
        VNode::Keyed(elem) => {
            let kids: Vec<Rc<VNode>> = elem.children.iter().map(|(_, c)| c.clone()).collect();
            add_kids(doc, dom, &kids, patches, i, low, high, event_node)
        }
        _ => i,
    }
}

fn add_kids(
    doc: &Document,
    dom: DomId,
    kids: &[Rc<VNode>],
    patches: &[Patch],
    mut i: usize,
    mut low: usize,
    high: usize,
    event_node: &EventNodeRef,
) -> usize {
    let dom_kids: Vec<DomId> = match doc.children(dom) {
        Ok(children) => children.to_vec(),
        Err(_) => {
            debug_assert!(false, "element vnode over a non-element live node");
            return i;
        }
    };
    for (j, kid) in kids.iter().enumerate() {
        low += 1;
        let next_low = low + kid.descendants();
        if i >= patches.len() || patches[i].index > high {
            return i;
        }
        let index = patches[i].index;
        if low <= index && index <= next_low {
            let Some(&kid_dom) = dom_kids.get(j) else {
                debug_assert!(false, "live tree is missing a child the old vtree has");
                return i;
            };
            i = add_helper(doc, kid_dom, kid, patches, i, low, next_low, event_node);
        }
        low = next_low;
    }
    i
}

fn attach(
    doc: &Document,
    dom: DomId,
    vnode: &Rc<VNode>,
    patch: &Patch,
    low: usize,
    high: usize,
    event_node: &EventNodeRef,
) {
    patch.target.set(dom);
    *patch.event_node.borrow_mut() = Some(event_node.clone());
    match &patch.op {
        PatchOp::Thunk(sub) => {
            // Thunk sub-patches live in their own index space rooted at the
            // forced subtree.
            if let VNode::Thunk(thunk) = &**vnode {
                let cached = force_thunk(thunk);
                add_helper(doc, dom, &cached, sub, 0, 0, cached.descendants(), event_node);
            } else {
                debug_assert!(false, "thunk patch over a non-thunk vnode");
            }
        }
        PatchOp::Reorder(data) => {
            if !data.patches.is_empty() {
                add_helper(doc, dom, vnode, &data.patches, 0, low, high, event_node);
            }
        }
        PatchOp::Remove(Some(data)) => {
            if !data.patches.is_empty() {
                add_helper(doc, dom, vnode, &data.patches, 0, low, high, event_node);
            }
        }
        _ => {}
    }
}

fn apply_patch_list(doc: &mut Document, root: DomId, patches: &[Patch]) -> Result<DomId, DomError> {
    let mut root = root;
    for patch in patches {
        let target = patch.target.get();
        if target == DomId::INVALID {
            debug_assert!(false, "patch was never attached to a live node");
            return Err(DomError::UnattachedPatch { index: patch.index });
        }
        let replacement = apply_patch(doc, target, patch)?;
        if target == root {
            root = replacement;
        }
    }
    Ok(root)
}

fn patch_event_node(patch: &Patch) -> Result<EventNodeRef, DomError> {
    patch
        .event_node
        .borrow()
        .clone()
        .ok_or(DomError::UnattachedPatch { index: patch.index })
}

fn apply_patch(doc: &mut Document, target: DomId, patch: &Patch) -> Result<DomId, DomError> {
    match &patch.op {
        PatchOp::Redraw(vnode) => {
            let event_node = patch_event_node(patch)?;
            let new_id = render(doc, vnode, &event_node)?;
            if doc.event_node(new_id).is_none() {
                let prior = doc.event_node(target);
                doc.set_event_node(new_id, prior);
            }
            doc.replace(target, new_id)?;
            Ok(new_id)
        }
        PatchOp::Facts(diff) => {
            apply_facts_diff(doc, target, diff, patch)?;
            Ok(target)
        }
        PatchOp::Text(text) => {
            doc.set_text(target, text)?;
            Ok(target)
        }
        PatchOp::Thunk(sub) => apply_patch_list(doc, target, sub),
        PatchOp::Tagger(funcs) => {
            match doc.event_node(target) {
                Some(event_node) => match &*event_node {
                    EventNode::Tagger { funcs: slot, .. } => {
                        *slot.borrow_mut() = funcs.clone();
                    }
                    EventNode::Root(_) => {
                        debug_assert!(false, "retag against a root event chain");
                    }
                },
                None => debug_assert!(false, "retag against a node with no event chain"),
            }
            Ok(target)
        }
        PatchOp::RemoveLast { kept, dropped } => {
            for _ in 0..*dropped {
                let child = {
                    let kids = doc.children(target)?;
                    kids.get(*kept).copied()
                };
                match child {
                    Some(child) => doc.remove_subtree(child)?,
                    None => {
                        debug_assert!(false, "remove-last ran past the child list");
                        return Err(DomError::InvalidPosition {
                            parent: target,
                            position: *kept,
                        });
                    }
                }
            }
            Ok(target)
        }
        PatchOp::Append { kept, kids } => {
            let event_node = patch_event_node(patch)?;
            for vnode in kids.iter().skip(*kept) {
                let id = render(doc, vnode, &event_node)?;
                doc.append_child(target, id)?;
            }
            Ok(target)
        }
        PatchOp::Remove(None) => {
            doc.remove_subtree(target)?;
            Ok(target)
        }
        PatchOp::Remove(Some(data)) => {
            // Half of a move: bring the leaving node up to date, detach it,
            // and stash it for the insert side.
            let node = apply_patch_list(doc, target, &data.patches)?;
            doc.detach(node)?;
            *data.entry.stashed.borrow_mut() = Some(node);
            Ok(node)
        }
        PatchOp::Reorder(data) => {
            let event_node = patch_event_node(patch)?;
            apply_patch_list(doc, target, &data.patches)?;
            for insert in &data.inserts {
                let node = reorder_node(doc, insert, &event_node)?;
                let position = insert.position.unwrap_or(usize::MAX);
                doc.insert_at(target, node, position)?;
            }
            for insert in &data.end_inserts {
                let node = reorder_node(doc, insert, &event_node)?;
                doc.append_child(target, node)?;
            }
            Ok(target)
        }
    }
}

fn reorder_node(
    doc: &mut Document,
    insert: &Insert,
    event_node: &EventNodeRef,
) -> Result<DomId, DomError> {
    if insert.entry.kind.get() == EntryKind::Move {
        return match insert.entry.stashed.borrow_mut().take() {
            Some(id) => Ok(id),
            None => {
                debug_assert!(false, "move insert ran before its removal");
                Err(DomError::MoveWithoutNode)
            }
        };
    }
    render(doc, &insert.entry.vnode, event_node)
}

fn apply_facts_diff(
    doc: &mut Document,
    id: DomId,
    diff: &FactsDiff,
    patch: &Patch,
) -> Result<(), DomError> {
    for (name, value) in &diff.attrs {
        match value {
            Some(value) => doc.set_attr(id, name.clone(), value.clone())?,
            None => doc.remove_attr(id, name)?,
        }
    }
    for (name, value) in &diff.attrs_ns {
        match value {
            Some((namespace, value)) => {
                doc.set_attr_ns(id, name.clone(), namespace.clone(), value.clone())?
            }
            None => doc.remove_attr_ns(id, name)?,
        }
    }
    for (name, value) in &diff.styles {
        match value {
            Some(value) => doc.set_style(id, name.clone(), value.clone())?,
            None => doc.remove_style(id, name)?,
        }
    }
    for (name, value) in &diff.props {
        match value {
            Some(value) => doc.set_prop(id, name.clone(), value.clone())?,
            None => doc.remove_prop(id, name)?,
        }
    }
    for (name, handler) in &diff.events {
        match handler {
            None => doc.remove_listener(id, name)?,
            Some(handler) => {
                let existing_shape = doc.listener(id, name).map(|l| l.handler.borrow().shape);
                match existing_shape {
                    // Same shape: swap only the closure, keep the attachment.
                    Some(shape) if shape == handler.shape => {
                        doc.patch_listener(id, name, handler.clone())?;
                    }
                    // Shape change: full reattach under the same event chain.
                    Some(_) => {
                        let event_node = match doc.listener(id, name) {
                            Some(listener) => listener.event_node.clone(),
                            None => patch_event_node(patch)?,
                        };
                        doc.remove_listener(id, name)?;
                        doc.set_listener(id, name.clone(), handler.clone(), event_node)?;
                    }
                    None => {
                        let event_node = patch_event_node(patch)?;
                        doc.set_listener(id, name.clone(), handler.clone(), event_node)?;
                    }
                }
            }
        }
    }
    Ok(())
}
