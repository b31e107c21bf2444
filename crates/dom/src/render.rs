use crate::{Document, DomError};
use core_types::DomId;
use std::cell::RefCell;
use std::rc::Rc;
use vdom::events::{EventNode, EventNodeRef};
use vdom::facts::Facts;
use vdom::node::{VNode, force_thunk};

/// Builds live nodes for a virtual subtree. `event_node` is the remap chain
/// in scope; taggers push a fresh link and stamp it onto their rendered node.
pub fn render(
    doc: &mut Document,
    vnode: &Rc<VNode>,
    event_node: &EventNodeRef,
) -> Result<DomId, DomError> {
    match &**vnode {
        VNode::Text(text) => Ok(doc.create_text(&**text)),
        VNode::Thunk(thunk) => {
            let forced = force_thunk(thunk);
            render(doc, &forced, event_node)
        }
        VNode::Tagger(tagger) => {
            let child_event: EventNodeRef = Rc::new(EventNode::Tagger {
                funcs: RefCell::new(tagger.funcs.clone()),
                parent: event_node.clone(),
            });
            let id = render(doc, &tagger.child, &child_event)?;
            doc.set_event_node(id, Some(child_event));
            Ok(id)
        }
        VNode::Elem(elem) => {
            let id = doc.create_element(elem.tag.clone(), elem.namespace.clone());
            apply_facts(doc, id, &elem.facts, event_node)?;
            for child in &elem.children {
                let kid = render(doc, child, event_node)?;
                doc.append_child(id, kid)?;
            }
            Ok(id)
        }
        VNode::Keyed(elem) => {
            let id = doc.create_element(elem.tag.clone(), elem.namespace.clone());
            apply_facts(doc, id, &elem.facts, event_node)?;
            for (_, child) in &elem.children {
                let kid = render(doc, child, event_node)?;
                doc.append_child(id, kid)?;
            }
            Ok(id)
        }
        VNode::Custom(node) => {
            let built = node.widget.build(&node.model);
            let id = render(doc, &built, event_node)?;
            apply_facts(doc, id, &node.facts, event_node)?;
            Ok(id)
        }
    }
}

fn apply_facts(
    doc: &mut Document,
    id: DomId,
    facts: &Facts,
    event_node: &EventNodeRef,
) -> Result<(), DomError> {
    for (name, value) in &facts.attrs {
        doc.set_attr(id, name.clone(), value.clone())?;
    }
    for (name, (namespace, value)) in &facts.attrs_ns {
        doc.set_attr_ns(id, name.clone(), namespace.clone(), value.clone())?;
    }
    for (name, value) in &facts.styles {
        doc.set_style(id, name.clone(), value.clone())?;
    }
    for (name, value) in &facts.props {
        doc.set_prop(id, name.clone(), value.clone())?;
    }
    for (name, handler) in &facts.events {
        doc.set_listener(id, name.clone(), handler.clone(), event_node.clone())?;
    }
    Ok(())
}
