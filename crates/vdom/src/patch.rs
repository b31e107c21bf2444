use crate::events::EventNodeRef;
use crate::facts::FactsDiff;
use crate::node::VNode;
use core_types::{DomId, TaggerFn};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;

/// One mutation instruction against the live tree.
///
/// `index` is a pre-order position over the *previous* virtual tree, where
/// every node contributes `1 + descendants` positions. Patch lists are flat
/// and index-ascending; `target` and `event_node` start empty and are
/// attached by the addressing pass right before application.
pub struct Patch {
    pub index: usize,
    pub op: PatchOp,
    pub target: Cell<DomId>,
    pub event_node: RefCell<Option<EventNodeRef>>,
}

impl Patch {
    pub fn new(index: usize, op: PatchOp) -> Patch {
        Patch {
            index,
            op,
            target: Cell::new(DomId::INVALID),
            event_node: RefCell::new(None),
        }
    }
}

pub enum PatchOp {
    /// Replace the whole subtree with a fresh render of the node.
    Redraw(Rc<VNode>),
    Facts(FactsDiff),
    Text(Arc<str>),
    /// Patches against the forced subtree of a thunk, indexed from its root.
    Thunk(Vec<Patch>),
    /// Rewire the event-remap chain stored on the node; never touches DOM.
    Tagger(Vec<TaggerFn>),
    /// Drop the trailing `dropped` children, keeping the first `kept`.
    RemoveLast { kept: usize, dropped: usize },
    /// Render and append `kids[kept..]`.
    Append { kept: usize, kids: Vec<Rc<VNode>> },
    /// Keyed removal. With data, the node is leaving as half of a move: its
    /// sub-patches apply first, then the node is stashed on the shared entry
    /// for the insert side to adopt.
    Remove(Option<RemoveData>),
    Reorder(ReorderData),
}

pub struct RemoveData {
    pub patches: Vec<Patch>,
    pub entry: EntryRef,
}

pub struct ReorderData {
    /// Removals plus matched-pair diffs, in index order.
    pub patches: Vec<Patch>,
    pub inserts: Vec<Insert>,
    pub end_inserts: Vec<Insert>,
}

pub struct Insert {
    /// Child position in the new list; `None` appends at the end.
    pub position: Option<usize>,
    pub entry: EntryRef,
}

/// Shared bookkeeping between the remove and insert sides of the keyed scan,
/// keyed by list key.
pub struct Entry {
    pub kind: Cell<EntryKind>,
    pub vnode: Rc<VNode>,
    pub index: Cell<usize>,
    /// Set at apply time when a moved node is detached; taken by its insert.
    pub stashed: RefCell<Option<DomId>>,
    /// Position of this entry's `Remove` patch in the local patch list, so a
    /// later insert of the same key can upgrade it to a move.
    pub remove_slot: Cell<Option<usize>>,
}

pub type EntryRef = Rc<Entry>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Insert,
    Remove,
    Move,
}
