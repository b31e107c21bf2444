//! The live document: an arena tree of rendered nodes.
//!
//! This is the only externally mutable shared state in the runtime. It is
//! touched exclusively by patch application and event dispatch, both of
//! which run synchronously to completion.
//!
//! Invariants:
//! - Node ids are never reused; a removed id stays invalid for the lifetime
//!   of the document.
//! - A node has at most one parent; child ordering is explicit.
//! - Only element nodes carry children, facts, and listeners.

pub mod apply;
pub mod debug;
pub mod events;
#[cfg(test)]
mod patch_tests;
pub mod render;
#[cfg(any(test, feature = "dom-snapshot"))]
pub mod snapshot;

pub use apply::{add_dom_nodes, apply_patches};
pub use render::render;

use core_types::{DomId, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;
use vdom::events::EventNodeRef;
use vdom::facts::EventHandler;

#[derive(Debug)]
pub enum DomError {
    MissingNode(DomId),
    NotAnElement(DomId),
    NotText(DomId),
    InvalidPosition { parent: DomId, position: usize },
    MoveWithoutNode,
    UnattachedPatch { index: usize },
}

pub struct Listener {
    pub handler: RefCell<EventHandler>,
    pub event_node: EventNodeRef,
}

pub enum NodeKind {
    Text(String),
    Element {
        tag: Arc<str>,
        namespace: Option<Arc<str>>,
        attrs: BTreeMap<Arc<str>, Arc<str>>,
        attrs_ns: BTreeMap<Arc<str>, (Arc<str>, Arc<str>)>,
        styles: BTreeMap<Arc<str>, Arc<str>>,
        props: BTreeMap<Arc<str>, Value>,
        listeners: BTreeMap<Arc<str>, Listener>,
        children: Vec<DomId>,
    },
}

pub struct NodeRecord {
    pub kind: NodeKind,
    pub parent: Option<DomId>,
    /// Present on nodes rendered under a tagger; the retag patch rewires it.
    pub event_node: Option<EventNodeRef>,
}

pub struct Document {
    nodes: Vec<Option<NodeRecord>>,
    root: Option<DomId>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Document {
            nodes: Vec::new(),
            root: None,
        }
    }

    pub fn root(&self) -> Option<DomId> {
        self.root
    }

    pub fn set_root(&mut self, id: DomId) {
        self.root = Some(id);
    }

    pub fn live_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    fn alloc(&mut self, record: NodeRecord) -> DomId {
        let id = DomId(self.nodes.len() as u32);
        self.nodes.push(Some(record));
        id
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> DomId {
        self.alloc(NodeRecord {
            kind: NodeKind::Text(text.into()),
            parent: None,
            event_node: None,
        })
    }

    pub fn create_element(&mut self, tag: Arc<str>, namespace: Option<Arc<str>>) -> DomId {
        self.alloc(NodeRecord {
            kind: NodeKind::Element {
                tag,
                namespace,
                attrs: BTreeMap::new(),
                attrs_ns: BTreeMap::new(),
                styles: BTreeMap::new(),
                props: BTreeMap::new(),
                listeners: BTreeMap::new(),
                children: Vec::new(),
            },
            parent: None,
            event_node: None,
        })
    }

    pub fn get(&self, id: DomId) -> Result<&NodeRecord, DomError> {
        self.nodes
            .get(id.0 as usize)
            .and_then(|slot| slot.as_ref())
            .ok_or(DomError::MissingNode(id))
    }

    fn get_mut(&mut self, id: DomId) -> Result<&mut NodeRecord, DomError> {
        self.nodes
            .get_mut(id.0 as usize)
            .and_then(|slot| slot.as_mut())
            .ok_or(DomError::MissingNode(id))
    }

    pub fn is_live(&self, id: DomId) -> bool {
        self.nodes
            .get(id.0 as usize)
            .is_some_and(|slot| slot.is_some())
    }

    pub fn parent(&self, id: DomId) -> Option<DomId> {
        self.get(id).ok().and_then(|n| n.parent)
    }

    pub fn children(&self, id: DomId) -> Result<&[DomId], DomError> {
        match &self.get(id)?.kind {
            NodeKind::Element { children, .. } => Ok(children),
            NodeKind::Text(_) => {
                debug_assert!(false, "text nodes have no children");
                Err(DomError::NotAnElement(id))
            }
        }
    }

    fn children_mut(&mut self, id: DomId) -> Result<&mut Vec<DomId>, DomError> {
        match &mut self.get_mut(id)?.kind {
            NodeKind::Element { children, .. } => Ok(children),
            NodeKind::Text(_) => {
                debug_assert!(false, "text nodes have no children");
                Err(DomError::NotAnElement(id))
            }
        }
    }

    pub fn append_child(&mut self, parent: DomId, child: DomId) -> Result<(), DomError> {
        self.get(child)?;
        self.children_mut(parent)?.push(child);
        self.get_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Inserts `child` before the current child at `position`; positions past
    /// the end append.
    pub fn insert_at(
        &mut self,
        parent: DomId,
        child: DomId,
        position: usize,
    ) -> Result<(), DomError> {
        self.get(child)?;
        let children = self.children_mut(parent)?;
        let position = position.min(children.len());
        children.insert(position, child);
        self.get_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Unlinks `id` from its parent without freeing it.
    pub fn detach(&mut self, id: DomId) -> Result<(), DomError> {
        let parent = self.get_mut(id)?.parent.take();
        if let Some(parent) = parent {
            self.children_mut(parent)?.retain(|c| *c != id);
        } else if self.root == Some(id) {
            self.root = None;
        }
        Ok(())
    }

    /// Unlinks and frees `id` and everything below it. Freed ids stay
    /// invalid for the rest of the document's life.
    pub fn remove_subtree(&mut self, id: DomId) -> Result<(), DomError> {
        self.detach(id)?;
        self.free_subtree(id);
        Ok(())
    }

    fn free_subtree(&mut self, id: DomId) {
        let Some(record) = self.nodes.get_mut(id.0 as usize).and_then(Option::take) else {
            return;
        };
        if let NodeKind::Element { children, .. } = record.kind {
            for child in children {
                self.free_subtree(child);
            }
        }
    }

    /// Replaces `old` with `new` in the tree (parent slot or root), then
    /// frees the old subtree.
    pub fn replace(&mut self, old: DomId, new: DomId) -> Result<(), DomError> {
        let parent = self.get(old)?.parent;
        match parent {
            Some(parent) => {
                let children = self.children_mut(parent)?;
                let Some(slot) = children.iter().position(|c| *c == old) else {
                    debug_assert!(false, "old node missing from its parent");
                    return Err(DomError::MissingNode(old));
                };
                children[slot] = new;
                self.get_mut(new)?.parent = Some(parent);
            }
            None => {
                if self.root == Some(old) {
                    self.root = Some(new);
                }
            }
        }
        self.get_mut(old)?.parent = None;
        self.free_subtree(old);
        Ok(())
    }

    pub fn set_text(&mut self, id: DomId, text: &str) -> Result<(), DomError> {
        match &mut self.get_mut(id)?.kind {
            NodeKind::Text(existing) => {
                existing.clear();
                existing.push_str(text);
                Ok(())
            }
            NodeKind::Element { .. } => {
                debug_assert!(false, "set_text on a non-text node");
                Err(DomError::NotText(id))
            }
        }
    }

    fn element_mut(
        &mut self,
        id: DomId,
    ) -> Result<(&mut BTreeMap<Arc<str>, Arc<str>>, &mut BTreeMap<Arc<str>, (Arc<str>, Arc<str>)>, &mut BTreeMap<Arc<str>, Arc<str>>, &mut BTreeMap<Arc<str>, Value>, &mut BTreeMap<Arc<str>, Listener>), DomError> {
        match &mut self.get_mut(id)?.kind {
            NodeKind::Element {
                attrs,
                attrs_ns,
                styles,
                props,
                listeners,
                ..
            } => Ok((attrs, attrs_ns, styles, props, listeners)),
            NodeKind::Text(_) => {
                debug_assert!(false, "facts on a non-element node");
                Err(DomError::NotAnElement(id))
            }
        }
    }

    pub fn set_attr(&mut self, id: DomId, name: Arc<str>, value: Arc<str>) -> Result<(), DomError> {
        self.element_mut(id)?.0.insert(name, value);
        Ok(())
    }

    pub fn remove_attr(&mut self, id: DomId, name: &str) -> Result<(), DomError> {
        self.element_mut(id)?.0.remove(name);
        Ok(())
    }

    pub fn set_attr_ns(
        &mut self,
        id: DomId,
        name: Arc<str>,
        namespace: Arc<str>,
        value: Arc<str>,
    ) -> Result<(), DomError> {
        self.element_mut(id)?.1.insert(name, (namespace, value));
        Ok(())
    }

    pub fn remove_attr_ns(&mut self, id: DomId, name: &str) -> Result<(), DomError> {
        self.element_mut(id)?.1.remove(name);
        Ok(())
    }

    pub fn set_style(&mut self, id: DomId, name: Arc<str>, value: Arc<str>) -> Result<(), DomError> {
        self.element_mut(id)?.2.insert(name, value);
        Ok(())
    }

    pub fn remove_style(&mut self, id: DomId, name: &str) -> Result<(), DomError> {
        self.element_mut(id)?.2.remove(name);
        Ok(())
    }

    pub fn set_prop(&mut self, id: DomId, name: Arc<str>, value: Value) -> Result<(), DomError> {
        self.element_mut(id)?.3.insert(name, value);
        Ok(())
    }

    pub fn remove_prop(&mut self, id: DomId, name: &str) -> Result<(), DomError> {
        self.element_mut(id)?.3.remove(name);
        Ok(())
    }

    /// Attaches (or re-attaches) a listener, binding it to `event_node`.
    pub fn set_listener(
        &mut self,
        id: DomId,
        name: Arc<str>,
        handler: EventHandler,
        event_node: EventNodeRef,
    ) -> Result<(), DomError> {
        self.element_mut(id)?.4.insert(
            name,
            Listener {
                handler: RefCell::new(handler),
                event_node,
            },
        );
        Ok(())
    }

    /// Swaps only the handler closure of an existing listener, leaving the
    /// native attachment and event-node binding untouched.
    pub fn patch_listener(
        &mut self,
        id: DomId,
        name: &str,
        handler: EventHandler,
    ) -> Result<(), DomError> {
        match self.element_mut(id)?.4.get(name) {
            Some(listener) => {
                *listener.handler.borrow_mut() = handler;
                Ok(())
            }
            None => {
                debug_assert!(false, "patching a listener that is not attached");
                Err(DomError::MissingNode(id))
            }
        }
    }

    pub fn remove_listener(&mut self, id: DomId, name: &str) -> Result<(), DomError> {
        self.element_mut(id)?.4.remove(name);
        Ok(())
    }

    pub fn listener(&self, id: DomId, name: &str) -> Option<&Listener> {
        match &self.get(id).ok()?.kind {
            NodeKind::Element { listeners, .. } => listeners.get(name),
            NodeKind::Text(_) => None,
        }
    }

    pub fn event_node(&self, id: DomId) -> Option<EventNodeRef> {
        self.get(id).ok().and_then(|n| n.event_node.clone())
    }

    pub fn set_event_node(&mut self, id: DomId, event_node: Option<EventNodeRef>) {
        if let Ok(record) = self.get_mut(id) {
            record.event_node = event_node;
        }
    }
}
