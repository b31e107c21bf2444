//! Effect-manager dispatch layer.
//!
//! Contract:
//! - Application code builds `Cmd`/`Sub` bags (`leaf` / `batch` / `map`);
//!   the driver hands both bags to `dispatch_effects` once per update cycle.
//! - Each capability family registers one [`ManagerSpec`] under a unique key
//!   before the application starts; a duplicate key is fatal.
//! - Every manager becomes one long-lived scheduler process looping
//!   `Receive` on its own mailbox: `Fx` messages carry the cycle's flattened
//!   commands and subscriptions, `SelfMsg` carries `send_to_self` values.
//! - Manager callbacks are not guarded: a panic inside `on_effects` or
//!   `on_self_msg` is a systemic crash, not a per-operation failure.

mod bag;
mod dispatch;
mod registry;
mod router;

pub use bag::{Cmd, Sub};
pub use dispatch::dispatch_effects;
pub use registry::{
    EffectMapFn, ManagerSpec, Managers, OnEffectsFn, OnSelfFn, Registry, TaggerApply, instantiate,
};
pub use router::{Router, SendToApp};

use core_types::Value;

/// Mailbox protocol for manager processes.
#[derive(Clone)]
pub(crate) enum MgrMsg {
    Fx { cmds: Vec<Value>, subs: Vec<Value> },
    SelfMsg(Value),
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{cast, val};
    use scheduler::{Scheduler, Task};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Registers a manager that records every command and subscription value
    /// it receives, after tagger application.
    fn recording_manager(
        registry: &Registry,
        key: &str,
        seen: Rc<RefCell<Vec<(String, String)>>>,
    ) {
        let on_seen = seen.clone();
        registry.register(
            key,
            ManagerSpec {
                init: Task::succeed(()),
                on_effects: Rc::new(move |_router, cmds, subs, state| {
                    for c in cmds {
                        let text = cast::<String>(&c).cloned().unwrap_or_default();
                        on_seen.borrow_mut().push(("cmd".into(), text));
                    }
                    for s in subs {
                        let text = cast::<String>(&s).cloned().unwrap_or_default();
                        on_seen.borrow_mut().push(("sub".into(), text));
                    }
                    Task::succeed_value(state)
                }),
                on_self_msg: Rc::new(|_, _, state| Task::succeed_value(state)),
                cmd_map: Some(Rc::new(|apply, v| {
                    // Effect payloads here are plain strings; taggers rewrite
                    // them directly.
                    apply(v)
                })),
                sub_map: Some(Rc::new(|apply, v| apply(v))),
            },
        );
    }

    #[test]
    #[should_panic(expected = "duplicate effect manager key")]
    fn duplicate_manager_key_is_fatal() {
        let registry = Registry::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        recording_manager(&registry, "Fake", seen.clone());
        recording_manager(&registry, "Fake", seen);
    }

    #[test]
    fn leaves_are_grouped_and_taggers_compose() {
        let registry = Registry::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        recording_manager(&registry, "Fake", seen.clone());

        let sched = Scheduler::new();
        let managers = instantiate(registry, &sched, Rc::new(|_| {}));

        let inner = Cmd::batch(vec![
            Cmd::leaf("Fake", val("a".to_string())),
            Cmd::leaf("Fake", val("b".to_string())),
        ])
        .map(Rc::new(|v| {
            let s = cast::<String>(&v).cloned().unwrap_or_default();
            val(format!("in({s})"))
        }));
        let cmds = inner.map(Rc::new(|v| {
            let s = cast::<String>(&v).cloned().unwrap_or_default();
            val(format!("out({s})"))
        }));
        let subs = Sub::leaf("Fake", val("s".to_string()));

        dispatch_effects(&managers, &sched, cmds, subs);
        assert_eq!(
            *seen.borrow(),
            vec![
                ("cmd".to_string(), "out(in(a))".to_string()),
                ("cmd".to_string(), "out(in(b))".to_string()),
                ("sub".to_string(), "s".to_string()),
            ]
        );
    }

    #[test]
    fn every_manager_receives_fx_each_cycle() {
        let registry = Registry::new();
        let calls = Rc::new(RefCell::new(0_u32));
        let c2 = calls.clone();
        registry.register(
            "Quiet",
            ManagerSpec {
                init: Task::succeed(()),
                on_effects: Rc::new(move |_, cmds, subs, state| {
                    assert!(cmds.is_empty() && subs.is_empty());
                    *c2.borrow_mut() += 1;
                    Task::succeed_value(state)
                }),
                on_self_msg: Rc::new(|_, _, state| Task::succeed_value(state)),
                cmd_map: None,
                sub_map: None,
            },
        );
        let sched = Scheduler::new();
        let managers = instantiate(registry, &sched, Rc::new(|_| {}));
        dispatch_effects(&managers, &sched, Cmd::none(), Sub::none());
        dispatch_effects(&managers, &sched, Cmd::none(), Sub::none());
        assert_eq!(*calls.borrow(), 2);
    }

    #[test]
    #[should_panic(expected = "no effect manager registered")]
    fn unknown_home_is_fatal() {
        let registry = Registry::new();
        let sched = Scheduler::new();
        let managers = instantiate(registry, &sched, Rc::new(|_| {}));
        dispatch_effects(
            &managers,
            &sched,
            Cmd::leaf("Nowhere", val(())),
            Sub::none(),
        );
    }

    #[test]
    fn self_messages_reach_on_self_msg() {
        let registry = Registry::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s2 = seen.clone();
        registry.register(
            "Echo",
            ManagerSpec {
                init: Task::succeed(()),
                on_effects: Rc::new(|router, cmds, _subs, state| {
                    let mut t = Task::succeed_value(state.clone());
                    for c in cmds {
                        let router = router.clone();
                        t = t.and_then(move |s| router.send_to_self(c).map(move |_| s));
                    }
                    t
                }),
                on_self_msg: Rc::new(move |_router, msg, state| {
                    let text = cast::<String>(&msg).cloned().unwrap_or_default();
                    s2.borrow_mut().push(text);
                    Task::succeed_value(state)
                }),
                cmd_map: Some(Rc::new(|_, v| v)),
                sub_map: None,
            },
        );
        let sched = Scheduler::new();
        let managers = instantiate(registry, &sched, Rc::new(|_| {}));
        dispatch_effects(
            &managers,
            &sched,
            Cmd::leaf("Echo", val("ping".to_string())),
            Sub::none(),
        );
        assert_eq!(*seen.borrow(), vec!["ping"]);
    }
}
