use core_types::Value;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

/// How an event handler interacts with propagation and default behavior.
/// Changing the shape of a handler forces listener reattachment; changing
/// only its function patches the stored closure in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerShape {
    Normal,
    StopPropagation,
    PreventDefault,
    Custom,
}

/// What a handler decoded out of an event payload.
pub struct EventResponse {
    pub message: Option<Value>,
    pub stop_propagation: bool,
    pub prevent_default: bool,
}

pub type DecodeFn = Rc<dyn Fn(&Value) -> Option<EventResponse>>;

#[derive(Clone)]
pub struct EventHandler {
    pub shape: HandlerShape,
    pub decode: DecodeFn,
}

/// One entry of the flat attribute list handed to the node constructors.
pub enum Fact {
    Attr(Arc<str>, Arc<str>),
    AttrNs {
        namespace: Arc<str>,
        name: Arc<str>,
        value: Arc<str>,
    },
    Style(Arc<str>, Arc<str>),
    Prop(Arc<str>, Value),
    Event(Arc<str>, EventHandler),
}

pub fn attr(name: impl Into<Arc<str>>, value: impl Into<Arc<str>>) -> Fact {
    Fact::Attr(name.into(), value.into())
}

pub fn attr_ns(
    namespace: impl Into<Arc<str>>,
    name: impl Into<Arc<str>>,
    value: impl Into<Arc<str>>,
) -> Fact {
    Fact::AttrNs {
        namespace: namespace.into(),
        name: name.into(),
        value: value.into(),
    }
}

pub fn style(name: impl Into<Arc<str>>, value: impl Into<Arc<str>>) -> Fact {
    Fact::Style(name.into(), value.into())
}

pub fn prop(name: impl Into<Arc<str>>, value: Value) -> Fact {
    Fact::Prop(name.into(), value)
}

pub fn on_handler(name: impl Into<Arc<str>>, handler: EventHandler) -> Fact {
    Fact::Event(name.into(), handler)
}

/// A plain handler that produces the same message for every payload.
pub fn on_msg(name: impl Into<Arc<str>>, msg: Value) -> Fact {
    Fact::Event(
        name.into(),
        EventHandler {
            shape: HandlerShape::Normal,
            decode: Rc::new(move |_| {
                Some(EventResponse {
                    message: Some(msg.clone()),
                    stop_propagation: false,
                    prevent_default: false,
                })
            }),
        },
    )
}

/// Facts organized by class, built once at node construction and never
/// mutated afterwards. Later entries of the flat list win per name.
#[derive(Default)]
pub struct Facts {
    pub styles: BTreeMap<Arc<str>, Arc<str>>,
    pub attrs: BTreeMap<Arc<str>, Arc<str>>,
    pub attrs_ns: BTreeMap<Arc<str>, (Arc<str>, Arc<str>)>,
    pub props: BTreeMap<Arc<str>, Value>,
    pub events: BTreeMap<Arc<str>, EventHandler>,
}

pub fn organize(list: Vec<Fact>) -> Facts {
    let mut facts = Facts::default();
    for fact in list {
        match fact {
            Fact::Attr(name, value) => {
                facts.attrs.insert(name, value);
            }
            Fact::AttrNs {
                namespace,
                name,
                value,
            } => {
                facts.attrs_ns.insert(name, (namespace, value));
            }
            Fact::Style(name, value) => {
                facts.styles.insert(name, value);
            }
            Fact::Prop(name, value) => {
                facts.props.insert(name, value);
            }
            Fact::Event(name, handler) => {
                facts.events.insert(name, handler);
            }
        }
    }
    facts
}

/// Sparse facts diff: `None` marks removal, `Some` an added or changed value.
#[derive(Default)]
pub struct FactsDiff {
    pub styles: Vec<(Arc<str>, Option<Arc<str>>)>,
    pub attrs: Vec<(Arc<str>, Option<Arc<str>>)>,
    pub attrs_ns: Vec<(Arc<str>, Option<(Arc<str>, Arc<str>)>)>,
    pub props: Vec<(Arc<str>, Option<Value>)>,
    pub events: Vec<(Arc<str>, Option<EventHandler>)>,
}

impl FactsDiff {
    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
            && self.attrs.is_empty()
            && self.attrs_ns.is_empty()
            && self.props.is_empty()
            && self.events.is_empty()
    }
}

pub fn diff_facts(old: &Facts, new: &Facts) -> FactsDiff {
    let mut diff = FactsDiff::default();

    for (name, value) in &new.styles {
        if old.styles.get(name) != Some(value) {
            diff.styles.push((name.clone(), Some(value.clone())));
        }
    }
    for name in old.styles.keys() {
        if !new.styles.contains_key(name) {
            diff.styles.push((name.clone(), None));
        }
    }

    for (name, value) in &new.attrs {
        if old.attrs.get(name) != Some(value) {
            diff.attrs.push((name.clone(), Some(value.clone())));
        }
    }
    for name in old.attrs.keys() {
        if !new.attrs.contains_key(name) {
            diff.attrs.push((name.clone(), None));
        }
    }

    for (name, value) in &new.attrs_ns {
        if old.attrs_ns.get(name) != Some(value) {
            diff.attrs_ns.push((name.clone(), Some(value.clone())));
        }
    }
    for name in old.attrs_ns.keys() {
        if !new.attrs_ns.contains_key(name) {
            diff.attrs_ns.push((name.clone(), None));
        }
    }

    // Properties are compared by reference identity: a fresh value instance
    // invalidates, even when structurally equal.
    for (name, value) in &new.props {
        let same = old
            .props
            .get(name)
            .is_some_and(|old_value| Rc::ptr_eq(old_value, value));
        if !same {
            diff.props.push((name.clone(), Some(value.clone())));
        }
    }
    for name in old.props.keys() {
        if !new.props.contains_key(name) {
            diff.props.push((name.clone(), None));
        }
    }

    for (name, handler) in &new.events {
        let same = old.events.get(name).is_some_and(|old_handler| {
            old_handler.shape == handler.shape && Rc::ptr_eq(&old_handler.decode, &handler.decode)
        });
        if !same {
            diff.events.push((name.clone(), Some(handler.clone())));
        }
    }
    for name in old.events.keys() {
        if !new.events.contains_key(name) {
            diff.events.push((name.clone(), None));
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::val;

    #[test]
    fn later_facts_win_per_name() {
        let facts = organize(vec![attr("class", "a"), attr("class", "b")]);
        assert_eq!(facts.attrs.get("class").map(|v| &**v), Some("b"));
    }

    #[test]
    fn diff_is_sparse() {
        let old = organize(vec![attr("id", "x"), attr("class", "a"), style("color", "red")]);
        let new = organize(vec![attr("id", "x"), attr("class", "b")]);
        let d = diff_facts(&old, &new);
        assert_eq!(d.attrs, vec![("class".into(), Some("b".into()))]);
        assert_eq!(d.styles, vec![("color".into(), None)]);
    }

    #[test]
    fn props_compare_by_identity() {
        let shared = val(7_u32);
        let old = organize(vec![prop("value", shared.clone())]);
        let same = organize(vec![prop("value", shared)]);
        assert!(diff_facts(&old, &same).is_empty());

        let fresh = organize(vec![prop("value", val(7_u32))]);
        let d = diff_facts(&old, &fresh);
        assert_eq!(d.props.len(), 1, "value-equal but fresh instance must repatch");
    }

    #[test]
    fn handler_function_change_is_a_diff() {
        let h1 = EventHandler {
            shape: HandlerShape::Normal,
            decode: Rc::new(|_| None),
        };
        let h1_again = h1.clone();
        let h2 = EventHandler {
            shape: HandlerShape::Normal,
            decode: Rc::new(|_| None),
        };
        let old = organize(vec![on_handler("click", h1)]);
        let same = organize(vec![on_handler("click", h1_again)]);
        assert!(diff_facts(&old, &same).is_empty());
        let new = organize(vec![on_handler("click", h2)]);
        assert_eq!(diff_facts(&old, &new).events.len(), 1);
    }
}
