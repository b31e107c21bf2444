use core_types::{TaggerFn, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// One link of the event-remap chain attached to rendered DOM nodes. The
/// chain mirrors the tagger structure of the virtual tree; a retag patch
/// rewires `funcs` in place without touching the DOM.
pub enum EventNode {
    /// Mount root: delivers the final message to the application driver.
    Root(Rc<dyn Fn(Value)>),
    Tagger {
        funcs: RefCell<Vec<TaggerFn>>,
        parent: EventNodeRef,
    },
}

pub type EventNodeRef = Rc<EventNode>;

pub fn root(send: Rc<dyn Fn(Value)>) -> EventNodeRef {
    Rc::new(EventNode::Root(send))
}

/// Runs `msg` up the chain: innermost tagger first, then outward, then the
/// root sender.
pub fn remap(node: &EventNodeRef, msg: Value) {
    let mut msg = msg;
    let mut current = node.clone();
    loop {
        let next = match &*current {
            EventNode::Root(send) => {
                send(msg);
                return;
            }
            EventNode::Tagger { funcs, parent } => {
                for f in funcs.borrow().iter().rev() {
                    msg = f(msg);
                }
                parent.clone()
            }
        };
        current = next;
    }
}
