use crate::facts::{Fact, Facts, organize};
use core_types::{TaggerFn, Value};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// Immutable description of a DOM subtree. Trees are created fresh on every
/// `view` call; a tree is retained only as the "previous tree" for one diff
/// cycle. Reference identity (`Rc::ptr_eq`) is the short-circuit primitive.
pub enum VNode {
    Text(Arc<str>),
    Elem(ElemNode),
    Keyed(KeyedNode),
    Custom(CustomNode),
    Tagger(TaggerNode),
    Thunk(ThunkNode),
}

pub struct ElemNode {
    pub tag: Arc<str>,
    pub namespace: Option<Arc<str>>,
    pub facts: Rc<Facts>,
    pub children: Vec<Rc<VNode>>,
    /// Exact number of VNodes in the subtree below this node. Precomputed at
    /// construction; used to skip whole subtrees during patch addressing.
    pub descendants: usize,
}

pub struct KeyedNode {
    pub tag: Arc<str>,
    pub namespace: Option<Arc<str>>,
    pub facts: Rc<Facts>,
    pub children: Vec<(Arc<str>, Rc<VNode>)>,
    pub descendants: usize,
}

/// Message-remapping wrapper. Nested `map` calls are flattened at
/// construction into one node holding the whole tagger chain, outermost
/// first.
pub struct TaggerNode {
    pub funcs: Vec<TaggerFn>,
    pub child: Rc<VNode>,
    pub descendants: usize,
}

/// Memoized lazy subtree. `refs` is the cache key, compared entry-wise by
/// reference identity; on a hit the cached node (and its rendered DOM) is
/// reused wholesale.
pub struct ThunkNode {
    pub refs: Vec<Value>,
    pub force: Rc<dyn Fn() -> Rc<VNode>>,
    pub cache: RefCell<Option<Rc<VNode>>>,
}

/// Escape hatch for externally-controlled subtrees: the widget decides when
/// a model change invalidates its rendered output.
pub struct CustomNode {
    pub facts: Rc<Facts>,
    pub model: Value,
    pub widget: Rc<dyn Widget>,
}

pub trait Widget {
    /// Produces the subtree for `model`. Called on first render and whenever
    /// [`keep`](Widget::keep) declines to retain the old output.
    fn build(&self, model: &Value) -> Rc<VNode>;

    /// Whether the output rendered for `old` is still valid for `new`.
    fn keep(&self, old: &Value, new: &Value) -> bool;
}

impl VNode {
    pub fn descendants(&self) -> usize {
        match self {
            VNode::Text(_) | VNode::Thunk(_) | VNode::Custom(_) => 0,
            VNode::Elem(e) => e.descendants,
            VNode::Keyed(e) => e.descendants,
            VNode::Tagger(t) => t.descendants,
        }
    }
}

pub fn text(s: impl Into<Arc<str>>) -> Rc<VNode> {
    Rc::new(VNode::Text(s.into()))
}

pub fn node(
    tag: impl Into<Arc<str>>,
    facts: Vec<Fact>,
    children: Vec<Rc<VNode>>,
) -> Rc<VNode> {
    node_ns(None, tag, facts, children)
}

pub fn node_ns(
    namespace: Option<Arc<str>>,
    tag: impl Into<Arc<str>>,
    facts: Vec<Fact>,
    children: Vec<Rc<VNode>>,
) -> Rc<VNode> {
    let descendants = children.iter().map(|c| 1 + c.descendants()).sum();
    Rc::new(VNode::Elem(ElemNode {
        tag: tag.into(),
        namespace,
        facts: Rc::new(organize(facts)),
        children,
        descendants,
    }))
}

pub fn keyed(
    tag: impl Into<Arc<str>>,
    facts: Vec<Fact>,
    children: Vec<(Arc<str>, Rc<VNode>)>,
) -> Rc<VNode> {
    keyed_ns(None, tag, facts, children)
}

pub fn keyed_ns(
    namespace: Option<Arc<str>>,
    tag: impl Into<Arc<str>>,
    facts: Vec<Fact>,
    children: Vec<(Arc<str>, Rc<VNode>)>,
) -> Rc<VNode> {
    let descendants = children.iter().map(|(_, c)| 1 + c.descendants()).sum();
    Rc::new(VNode::Keyed(KeyedNode {
        tag: tag.into(),
        namespace,
        facts: Rc::new(organize(facts)),
        children,
        descendants,
    }))
}

/// Wraps a subtree so its messages pass through `tagger`. Mapping an
/// already-mapped subtree extends the existing chain instead of nesting.
pub fn map(tagger: TaggerFn, child: Rc<VNode>) -> Rc<VNode> {
    let flattened = match &*child {
        VNode::Tagger(inner) => {
            let mut funcs = Vec::with_capacity(inner.funcs.len() + 1);
            funcs.push(tagger.clone());
            funcs.extend(inner.funcs.iter().cloned());
            Some((funcs, inner.child.clone()))
        }
        _ => None,
    };
    let (funcs, child) = flattened.unwrap_or((vec![tagger], child));
    let descendants = 1 + child.descendants();
    Rc::new(VNode::Tagger(TaggerNode {
        funcs,
        child,
        descendants,
    }))
}

pub fn lazy(refs: Vec<Value>, force: impl Fn() -> Rc<VNode> + 'static) -> Rc<VNode> {
    Rc::new(VNode::Thunk(ThunkNode {
        refs,
        force: Rc::new(force),
        cache: RefCell::new(None),
    }))
}

pub fn custom(facts: Vec<Fact>, model: Value, widget: Rc<dyn Widget>) -> Rc<VNode> {
    Rc::new(VNode::Custom(CustomNode {
        facts: Rc::new(organize(facts)),
        model,
        widget,
    }))
}

/// Forces a thunk, caching and returning its subtree.
pub fn force_thunk(thunk: &ThunkNode) -> Rc<VNode> {
    if let Some(cached) = thunk.cache.borrow().as_ref() {
        return cached.clone();
    }
    let node = (thunk.force)();
    *thunk.cache.borrow_mut() = Some(node.clone());
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::attr;
    use core_types::val;

    /// Structural recount, for checking the construction-time invariant.
    fn count(node: &VNode) -> usize {
        match node {
            VNode::Text(_) | VNode::Thunk(_) | VNode::Custom(_) => 0,
            VNode::Elem(e) => e.children.iter().map(|c| 1 + count(c)).sum(),
            VNode::Keyed(e) => e.children.iter().map(|(_, c)| 1 + count(c)).sum(),
            VNode::Tagger(t) => 1 + count(&t.child),
        }
    }

    #[test]
    fn descendant_counts_match_structural_recount() {
        let tree = node(
            "div",
            vec![attr("id", "root")],
            vec![
                text("hi"),
                node(
                    "ul",
                    vec![],
                    vec![
                        node("li", vec![], vec![text("a")]),
                        node("li", vec![], vec![text("b"), text("c")]),
                    ],
                ),
                map(Rc::new(|v| v), node("span", vec![], vec![text("x")])),
                keyed(
                    "ol",
                    vec![],
                    vec![
                        ("k1".into(), node("li", vec![], vec![text("1")])),
                        ("k2".into(), text("2")),
                    ],
                ),
            ],
        );
        assert_eq!(tree.descendants(), count(&tree));
        if let VNode::Elem(e) = &*tree {
            for child in &e.children {
                assert_eq!(child.descendants(), count(child));
            }
        }
    }

    #[test]
    fn nested_maps_flatten_into_one_chain() {
        let inner = map(
            Rc::new(|v| val(format!("g({})", core_types::cast::<String>(&v).unwrap()))),
            text("leaf"),
        );
        let outer = map(
            Rc::new(|v| val(format!("f({})", core_types::cast::<String>(&v).unwrap()))),
            inner,
        );
        let VNode::Tagger(t) = &*outer else {
            panic!("expected tagger");
        };
        assert_eq!(t.funcs.len(), 2);
        assert!(matches!(&*t.child, VNode::Text(_)));
        assert_eq!(t.descendants, 1);
    }

    #[test]
    fn thunk_forces_once() {
        use std::cell::Cell;
        let calls = Rc::new(Cell::new(0_u32));
        let c2 = calls.clone();
        let thunk = lazy(vec![val(1_u32)], move || {
            c2.set(c2.get() + 1);
            text("t")
        });
        let VNode::Thunk(t) = &*thunk else {
            panic!("expected thunk");
        };
        let a = force_thunk(t);
        let b = force_thunk(t);
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(calls.get(), 1);
    }
}
