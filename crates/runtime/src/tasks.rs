//! The core `Task` effect manager: turns tasks into commands whose results
//! come back as application messages.

use core_types::{Value, val};
use effects::{Cmd, ManagerSpec, Registry};
use scheduler::Task;
use std::cell::RefCell;
use std::rc::Rc;

pub const HOME: &str = "Task";

struct PerformCmd {
    task: RefCell<Option<Task>>,
}

/// A command that runs an infallible task and feeds its result to `to_msg`.
pub fn perform(task: Task, to_msg: impl Fn(Value) -> Value + 'static) -> Cmd {
    Cmd::leaf(
        HOME,
        val(PerformCmd {
            task: RefCell::new(Some(task.map(move |v| to_msg(v)))),
        }),
    )
}

/// A command that runs a fallible task, mapping either outcome into a
/// message.
pub fn attempt(task: Task, to_msg: impl Fn(Result<Value, Value>) -> Value + 'static) -> Cmd {
    let to_msg = Rc::new(to_msg);
    let on_ok = to_msg.clone();
    let wrapped = task
        .and_then(move |v| Task::Succeed(on_ok(Ok(v))))
        .on_error(move |e| Task::Succeed(to_msg(Err(e))));
    Cmd::leaf(
        HOME,
        val(PerformCmd {
            task: RefCell::new(Some(wrapped)),
        }),
    )
}

pub fn register(registry: &Registry) {
    registry.register(
        HOME,
        ManagerSpec {
            init: Task::succeed(()),
            on_effects: Rc::new(|router, cmds, _subs, state| {
                for cmd in cmds {
                    let Some(perform) = cmd.downcast_ref::<PerformCmd>() else {
                        debug_assert!(false, "foreign command in the Task manager");
                        continue;
                    };
                    let Some(task) = perform.task.borrow_mut().take() else {
                        continue;
                    };
                    let reply = router.clone();
                    router
                        .scheduler()
                        .raw_spawn(task.and_then(move |msg| reply.send_to_app(msg)));
                }
                Task::succeed_value(state)
            }),
            on_self_msg: Rc::new(|_, _, state| Task::succeed_value(state)),
            cmd_map: Some(Rc::new(|apply, value| {
                let Some(perform) = value.downcast_ref::<PerformCmd>() else {
                    debug_assert!(false, "foreign command in the Task manager");
                    return value;
                };
                let task = perform.task.borrow_mut().take();
                val(PerformCmd {
                    task: RefCell::new(task.map(|t| t.map(move |msg| apply(msg)))),
                })
            })),
            sub_map: None,
        },
    );
}
