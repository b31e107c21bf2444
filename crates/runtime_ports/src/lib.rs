//! Port managers: the boundary between application effects and host code.
//!
//! Each port registers its own single-purpose effect manager under the port
//! name, so a duplicate port name is caught by the registry's fatal
//! duplicate-key check.
//!
//! - An outgoing port turns `Cmd` payloads into host callbacks: every
//!   subscribed host listener sees every written value.
//! - An incoming port keeps the subscriber list from the current `Sub` bag;
//!   host code feeds values through `send`, which runs the reader and
//!   delivers to every subscriber. A reader failure is fatal by design.

use core_types::{Value, val};
use effects::{Cmd, ManagerSpec, Registry, SendToApp, Sub};
use scheduler::Task;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

pub type SubscriberId = u64;

type HostListener = Rc<dyn Fn(&Value)>;
type Writer = Rc<dyn Fn(&Value) -> Value>;
type Reader = Rc<dyn Fn(&Value) -> Result<Value, String>>;
type MsgTagger = Rc<dyn Fn(Value) -> Value>;

/// Host handle for an outgoing port: build commands with [`Outgoing::cmd`],
/// observe written values with `subscribe`/`unsubscribe`.
pub struct Outgoing {
    name: Arc<str>,
    listeners: Rc<RefCell<Vec<(SubscriberId, HostListener)>>>,
    next_id: std::cell::Cell<SubscriberId>,
}

pub fn outgoing(registry: &Registry, name: impl Into<Arc<str>>, write: Writer) -> Outgoing {
    let name = name.into();
    let listeners: Rc<RefCell<Vec<(SubscriberId, HostListener)>>> =
        Rc::new(RefCell::new(Vec::new()));
    let fx_listeners = listeners.clone();
    let fx_name = name.clone();
    registry.register(
        name.clone(),
        ManagerSpec {
            init: Task::succeed(()),
            on_effects: Rc::new(move |_router, cmds, _subs, state| {
                for cmd in cmds {
                    let out = write(&cmd);
                    log::trace!(target: "ports.out", "port '{fx_name}' wrote a value");
                    for (_, listener) in fx_listeners.borrow().iter() {
                        listener(&out);
                    }
                }
                Task::succeed_value(state)
            }),
            on_self_msg: Rc::new(|_, _, state| Task::succeed_value(state)),
            // Outgoing payloads carry no messages; taggers pass through.
            cmd_map: Some(Rc::new(|_apply, value| value)),
            sub_map: None,
        },
    );
    Outgoing {
        name,
        listeners,
        next_id: std::cell::Cell::new(1),
    }
}

impl Outgoing {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cmd(&self, payload: Value) -> Cmd {
        Cmd::leaf(self.name.clone(), payload)
    }

    pub fn subscribe(&self, listener: impl Fn(&Value) + 'static) -> SubscriberId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.listeners.borrow_mut().retain(|(s, _)| *s != id);
    }
}

struct IncomingSub {
    tagger: MsgTagger,
}

struct IncomingShared {
    subscribers: RefCell<Vec<MsgTagger>>,
    sender: RefCell<Option<SendToApp>>,
}

/// Host handle for an incoming port: applications subscribe with
/// [`Incoming::sub`], host code injects values with [`Incoming::send`].
pub struct Incoming {
    name: Arc<str>,
    read: Reader,
    shared: Rc<IncomingShared>,
}

pub fn incoming(registry: &Registry, name: impl Into<Arc<str>>, read: Reader) -> Incoming {
    let name = name.into();
    let shared = Rc::new(IncomingShared {
        subscribers: RefCell::new(Vec::new()),
        sender: RefCell::new(None),
    });
    let fx_shared = shared.clone();
    registry.register(
        name.clone(),
        ManagerSpec {
            init: Task::succeed(()),
            on_effects: Rc::new(move |router, _cmds, subs, state| {
                let mut subscribers = Vec::with_capacity(subs.len());
                for sub in &subs {
                    match core_types::cast::<IncomingSub>(sub) {
                        Some(incoming) => subscribers.push(incoming.tagger.clone()),
                        None => debug_assert!(false, "foreign subscription in an incoming port"),
                    }
                }
                *fx_shared.subscribers.borrow_mut() = subscribers;
                *fx_shared.sender.borrow_mut() = Some(router.app_sender());
                Task::succeed_value(state)
            }),
            on_self_msg: Rc::new(|_, _, state| Task::succeed_value(state)),
            cmd_map: None,
            sub_map: Some(Rc::new(|apply, value| {
                let Some(incoming) = core_types::cast::<IncomingSub>(&value) else {
                    debug_assert!(false, "foreign subscription in an incoming port");
                    return value;
                };
                let tagger = incoming.tagger.clone();
                val(IncomingSub {
                    tagger: Rc::new(move |v| apply(tagger(v))),
                })
            })),
        },
    );
    Incoming { name, read, shared }
}

impl Incoming {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subscription delivering each accepted value through `to_msg`.
    pub fn sub(&self, to_msg: impl Fn(Value) -> Value + 'static) -> Sub {
        Sub::leaf(
            self.name.clone(),
            val(IncomingSub {
                tagger: Rc::new(to_msg),
            }),
        )
    }

    /// Runs the reader over `value` and delivers to every subscriber. A
    /// reader failure aborts with a diagnostic; there is no recovery path
    /// across this boundary.
    pub fn send(&self, value: Value) {
        let accepted = match (self.read)(&value) {
            Ok(v) => v,
            Err(reason) => panic!("invalid value sent to port '{}': {reason}", self.name),
        };
        let subscribers = self.shared.subscribers.borrow().clone();
        let Some(sender) = self.shared.sender.borrow().clone() else {
            return;
        };
        for tagger in subscribers {
            sender(tagger(accepted.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::cast;
    use std::cell::RefCell;

    fn string_writer() -> Writer {
        Rc::new(|v: &Value| val(format!("out:{}", cast::<String>(v).cloned().unwrap_or_default())))
    }

    fn int_reader() -> Reader {
        Rc::new(|v: &Value| match cast::<i64>(v) {
            Some(n) => Ok(val(*n)),
            None => Err("expected an integer".to_string()),
        })
    }

    #[test]
    fn outgoing_port_reaches_all_listeners() {
        let registry = Registry::new();
        let port = outgoing(&registry, "title", string_writer());
        let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let s1 = seen.clone();
        let s2 = seen.clone();
        port.subscribe(move |v| s1.borrow_mut().push(format!("a:{}", cast::<String>(v).unwrap())));
        let second = port.subscribe(move |v| {
            s2.borrow_mut().push(format!("b:{}", cast::<String>(v).unwrap()))
        });

        let sched = scheduler::Scheduler::new();
        let managers = effects::instantiate(registry, &sched, Rc::new(|_| {}));
        effects::dispatch_effects(
            &managers,
            &sched,
            port.cmd(val("hello".to_string())),
            Sub::none(),
        );
        assert_eq!(*seen.borrow(), vec!["a:out:hello", "b:out:hello"]);

        port.unsubscribe(second);
        effects::dispatch_effects(
            &managers,
            &sched,
            port.cmd(val("again".to_string())),
            Sub::none(),
        );
        assert_eq!(seen.borrow().last().unwrap(), "a:out:again");
        assert_eq!(seen.borrow().len(), 3);
    }

    #[test]
    fn incoming_port_delivers_to_subscribers() {
        let registry = Registry::new();
        let port = incoming(&registry, "count", int_reader());
        let sched = scheduler::Scheduler::new();
        let inbox: Rc<RefCell<Vec<i64>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = inbox.clone();
        let managers = effects::instantiate(
            registry,
            &sched,
            Rc::new(move |msg| sink.borrow_mut().push(*cast::<i64>(&msg).unwrap())),
        );

        // No subscribers yet: sends are dropped.
        port.send(val(1_i64));
        assert!(inbox.borrow().is_empty());

        effects::dispatch_effects(
            &managers,
            &sched,
            effects::Cmd::none(),
            port.sub(|v| val(*cast::<i64>(&v).unwrap() * 10)),
        );
        port.send(val(2_i64));
        assert_eq!(*inbox.borrow(), vec![20]);

        // Unsubscribing via an empty bag stops delivery.
        effects::dispatch_effects(&managers, &sched, effects::Cmd::none(), Sub::none());
        port.send(val(3_i64));
        assert_eq!(*inbox.borrow(), vec![20]);
    }

    #[test]
    #[should_panic(expected = "invalid value sent to port 'count'")]
    fn incoming_reader_failure_is_fatal() {
        let registry = Registry::new();
        let port = incoming(&registry, "count", int_reader());
        port.send(val("not a number".to_string()));
    }

    #[test]
    #[should_panic(expected = "duplicate effect manager key")]
    fn duplicate_port_name_is_fatal() {
        let registry = Registry::new();
        let _a = outgoing(&registry, "dup", string_writer());
        let _b = incoming(&registry, "dup", int_reader());
    }
}
