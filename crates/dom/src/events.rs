use crate::{Document, NodeKind};
use core_types::{DomId, Value};
use vdom::events::EventNodeRef;

/// Outcome of routing one synthetic event.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventOutcome {
    pub delivered: usize,
    pub default_prevented: bool,
}

/// A message plus the event chain it must be remapped through. Routing is
/// split from delivery so the document borrow can be dropped before handlers
/// re-enter the runtime.
pub type Delivery = (EventNodeRef, Value);

/// Bubbles an event from `target` to the root, decoding at every node with a
/// listener for `name`. A decode failure skips that listener; a decoded
/// `stop_propagation` ends the walk.
pub fn route(
    doc: &Document,
    target: DomId,
    name: &str,
    payload: &Value,
) -> (Vec<Delivery>, EventOutcome) {
    let mut deliveries = Vec::new();
    let mut outcome = EventOutcome::default();
    let mut current = Some(target);
    while let Some(id) = current {
        if let Some(listener) = doc.listener(id, name) {
            let response = {
                let handler = listener.handler.borrow();
                (handler.decode)(payload)
            };
            if let Some(response) = response {
                outcome.default_prevented |= response.prevent_default;
                if let Some(message) = response.message {
                    deliveries.push((listener.event_node.clone(), message));
                    outcome.delivered += 1;
                }
                if response.stop_propagation {
                    break;
                }
            }
        }
        current = doc.parent(id);
    }
    (deliveries, outcome)
}

/// Convenience for finding an event target in tests and demos: first element
/// in document order with a matching attribute value.
pub fn find_by_attr(doc: &Document, root: DomId, name: &str, value: &str) -> Option<DomId> {
    let record = doc.get(root).ok()?;
    if let NodeKind::Element { attrs, children, .. } = &record.kind {
        if attrs.get(name).is_some_and(|v| &**v == value) {
            return Some(root);
        }
        for child in children {
            if let Some(found) = find_by_attr(doc, *child, name, value) {
                return Some(found);
            }
        }
    }
    None
}
