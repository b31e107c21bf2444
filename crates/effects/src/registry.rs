use crate::router::{Router, SendToApp};
use crate::MgrMsg;
use core_types::{ProcessId, Value};
use scheduler::{Scheduler, Task};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// Applies the tagger chain accumulated through `Map` wrappers.
pub type TaggerApply = Rc<dyn Fn(Value) -> Value>;

/// Rewrites a manager-specific effect payload so its embedded messages go
/// through the accumulated taggers.
pub type EffectMapFn = Rc<dyn Fn(TaggerApply, Value) -> Value>;

pub type OnEffectsFn = Rc<dyn Fn(&Router, Vec<Value>, Vec<Value>, Value) -> Task>;
pub type OnSelfFn = Rc<dyn Fn(&Router, Value, Value) -> Task>;

/// Behavior descriptor for one capability family. Registered once, then
/// instantiated into exactly one long-lived process per application instance.
pub struct ManagerSpec {
    pub init: Task,
    pub on_effects: OnEffectsFn,
    pub on_self_msg: OnSelfFn,
    /// Absent when the manager takes no commands.
    pub cmd_map: Option<EffectMapFn>,
    /// Absent when the manager takes no subscriptions.
    pub sub_map: Option<EffectMapFn>,
}

/// Process-wide manager registry. All registration must happen before the
/// application starts; a duplicate key is a fatal startup error.
pub struct Registry {
    specs: RefCell<Vec<(Arc<str>, ManagerSpec)>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            specs: RefCell::new(Vec::new()),
        }
    }

    pub fn register(&self, key: impl Into<Arc<str>>, spec: ManagerSpec) {
        let key = key.into();
        let mut specs = self.specs.borrow_mut();
        if specs.iter().any(|(k, _)| *k == key) {
            panic!("duplicate effect manager key: {key}");
        }
        specs.push((key, spec));
    }
}

struct Handlers {
    on_effects: OnEffectsFn,
    on_self_msg: OnSelfFn,
}

/// The instantiated manager set for one application instance.
pub struct Managers {
    order: Vec<Arc<str>>,
    procs: HashMap<Arc<str>, ProcessId>,
    cmd_maps: HashMap<Arc<str>, Option<EffectMapFn>>,
    sub_maps: HashMap<Arc<str>, Option<EffectMapFn>>,
}

impl Managers {
    pub(crate) fn order(&self) -> &[Arc<str>] {
        &self.order
    }

    pub(crate) fn process(&self, key: &Arc<str>) -> ProcessId {
        self.procs[key]
    }

    pub(crate) fn cmd_map(&self, home: &Arc<str>) -> Option<&Option<EffectMapFn>> {
        self.cmd_maps.get(home)
    }

    pub(crate) fn sub_map(&self, home: &Arc<str>) -> Option<&Option<EffectMapFn>> {
        self.sub_maps.get(home)
    }
}

/// Spins up one actor process per registered manager:
/// `init |> and_then loop`, where the loop alternates `Receive` on the
/// manager mailbox and folds each message into the next loop state.
pub fn instantiate(registry: Registry, sched: &Scheduler, send_to_app: SendToApp) -> Managers {
    let mut managers = Managers {
        order: Vec::new(),
        procs: HashMap::new(),
        cmd_maps: HashMap::new(),
        sub_maps: HashMap::new(),
    };
    for (key, spec) in registry.specs.into_inner() {
        let router = Router::new(sched.clone(), send_to_app.clone());
        let handlers = Rc::new(Handlers {
            on_effects: spec.on_effects,
            on_self_msg: spec.on_self_msg,
        });
        let task = {
            let router = router.clone();
            spec.init
                .and_then(move |state| manager_loop(router, handlers, state))
        };
        let pid = sched.raw_spawn(task);
        router.set_pid(pid);
        log::debug!(target: "fx.registry", "manager '{key}' running as process {pid}");
        managers.order.push(key.clone());
        managers.procs.insert(key.clone(), pid);
        managers.cmd_maps.insert(key.clone(), spec.cmd_map);
        managers.sub_maps.insert(key, spec.sub_map);
    }
    managers
}

fn manager_loop(router: Router, handlers: Rc<Handlers>, state: Value) -> Task {
    Task::receive(move |msg| {
        let msg = msg
            .downcast::<MgrMsg>()
            .unwrap_or_else(|_| panic!("effect manager received a foreign message"));
        let msg = Rc::try_unwrap(msg).unwrap_or_else(|rc| (*rc).clone());
        let next = match msg {
            MgrMsg::Fx { cmds, subs } => (handlers.on_effects)(&router, cmds, subs, state),
            MgrMsg::SelfMsg(v) => (handlers.on_self_msg)(&router, v, state),
        };
        next.and_then(move |new_state| manager_loop(router, handlers, new_state))
    })
}
