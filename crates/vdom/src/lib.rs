//! Immutable virtual tree descriptions and the diff engine.
//!
//! The live-document side (rendering, patch addressing, patch application)
//! lives in the `dom` crate; this crate is pure tree work and produces the
//! patch protocol both sides share.

pub mod diff;
pub mod events;
pub mod facts;
pub mod node;
pub mod patch;

pub use diff::diff;
pub use events::{EventNode, EventNodeRef, remap, root};
pub use facts::{
    DecodeFn, EventHandler, EventResponse, Fact, Facts, FactsDiff, HandlerShape, attr, attr_ns,
    diff_facts, on_handler, on_msg, prop, style,
};
pub use node::{
    CustomNode, ElemNode, KeyedNode, TaggerNode, ThunkNode, VNode, Widget, custom, force_thunk,
    keyed, keyed_ns, lazy, map, node, node_ns, text,
};
pub use patch::{Entry, EntryKind, EntryRef, Insert, Patch, PatchOp, RemoveData, ReorderData};
