use core_types::{TaggerFn, Value};
use std::sync::Arc;

/// Effect description tree built by application code each update cycle.
/// Flattened per manager key by `dispatch_effects`.
pub(crate) enum Bag {
    Leaf { home: Arc<str>, value: Value },
    Batch(Vec<Bag>),
    Map { tagger: TaggerFn, bag: Box<Bag> },
}

/// A bag of commands: effects to perform this cycle.
pub struct Cmd(pub(crate) Bag);

/// A bag of subscriptions: event sources to stay attached to.
pub struct Sub(pub(crate) Bag);

impl Cmd {
    pub fn none() -> Self {
        Cmd(Bag::Batch(Vec::new()))
    }

    pub fn leaf(home: impl Into<Arc<str>>, value: Value) -> Self {
        Cmd(Bag::Leaf {
            home: home.into(),
            value,
        })
    }

    pub fn batch(items: Vec<Cmd>) -> Self {
        Cmd(Bag::Batch(items.into_iter().map(|b| b.0).collect()))
    }

    /// Wraps every message this bag will produce with `tagger`.
    pub fn map(self, tagger: TaggerFn) -> Self {
        Cmd(Bag::Map {
            tagger,
            bag: Box::new(self.0),
        })
    }
}

impl Sub {
    pub fn none() -> Self {
        Sub(Bag::Batch(Vec::new()))
    }

    pub fn leaf(home: impl Into<Arc<str>>, value: Value) -> Self {
        Sub(Bag::Leaf {
            home: home.into(),
            value,
        })
    }

    pub fn batch(items: Vec<Sub>) -> Self {
        Sub(Bag::Batch(items.into_iter().map(|b| b.0).collect()))
    }

    pub fn map(self, tagger: TaggerFn) -> Self {
        Sub(Bag::Map {
            tagger,
            bag: Box::new(self.0),
        })
    }
}
