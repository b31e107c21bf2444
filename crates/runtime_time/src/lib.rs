//! Time effect manager: `now` and `sleep` tasks plus the `every` interval
//! subscription.
//!
//! Subscription handling keeps one ticking process per distinct interval:
//! each cycle the manager diffs the subscribed interval set against its
//! running processes, kills the stale ones, and spawns loops for new ones.
//! A tick posts the interval to the manager's own mailbox; `on_self_msg`
//! fans the current timestamp out to every tagger registered for it.

use core_types::{ProcessId, TimerId, Value, cast, val};
use effects::{ManagerSpec, Registry, Router, Sub};
use scheduler::{Cancel, Task};
use std::collections::HashMap;
use std::rc::Rc;

pub const HOME: &str = "Time";

/// Host capability for scheduling wakeups. The shell provides the real
/// clock; tests drive a manual one.
pub trait Clock {
    fn now_ms(&self) -> u64;
    fn after(&self, delay_ms: u64, wake: Box<dyn FnOnce()>) -> TimerId;
    fn cancel(&self, id: TimerId);
}

/// A task that resolves immediately with the current time in milliseconds.
pub fn now(clock: &Rc<dyn Clock>) -> Task {
    let clock = clock.clone();
    Task::binding(move |resume| {
        resume.invoke(Task::succeed(clock.now_ms()));
        None
    })
}

/// A task that suspends the calling process for `delay_ms`. Killing the
/// process cancels the underlying host timer.
pub fn sleep(clock: &Rc<dyn Clock>, delay_ms: u64) -> Task {
    let clock = clock.clone();
    Task::binding(move |resume| {
        let id = clock.after(delay_ms, Box::new(move || resume.invoke(Task::succeed(()))));
        Some(Box::new(move || clock.cancel(id)) as Cancel)
    })
}

type TimeTagger = Rc<dyn Fn(u64) -> Value>;

struct EverySub {
    interval_ms: u64,
    tagger: TimeTagger,
}

/// Subscription: a message per `interval_ms`, built from the tick timestamp.
pub fn every(interval_ms: u64, to_msg: impl Fn(u64) -> Value + 'static) -> Sub {
    Sub::leaf(
        HOME,
        val(EverySub {
            interval_ms,
            tagger: Rc::new(to_msg),
        }),
    )
}

#[derive(Clone, Default)]
struct TimeState {
    taggers: HashMap<u64, Vec<TimeTagger>>,
    processes: HashMap<u64, ProcessId>,
}

pub fn register(registry: &Registry, clock: Rc<dyn Clock>) {
    let fx_clock = clock.clone();
    let self_clock = clock.clone();
    registry.register(
        HOME,
        ManagerSpec {
            init: Task::succeed(TimeState::default()),
            on_effects: Rc::new(move |router, _cmds, subs, state| {
                let old = cast::<TimeState>(&state).cloned().unwrap_or_default();

                let mut taggers: HashMap<u64, Vec<TimeTagger>> = HashMap::new();
                for sub in &subs {
                    let Some(every) = cast::<EverySub>(sub) else {
                        debug_assert!(false, "foreign subscription in the Time manager");
                        continue;
                    };
                    taggers
                        .entry(every.interval_ms)
                        .or_default()
                        .push(every.tagger.clone());
                }

                let mut processes = HashMap::new();
                for (interval, pid) in &old.processes {
                    if taggers.contains_key(interval) {
                        processes.insert(*interval, *pid);
                    } else {
                        log::trace!(target: "time.every", "dropping interval {interval}ms");
                        router.scheduler().kill(*pid);
                    }
                }
                for interval in taggers.keys() {
                    if !processes.contains_key(interval) {
                        log::trace!(target: "time.every", "starting interval {interval}ms");
                        let pid = router
                            .scheduler()
                            .raw_spawn(tick_loop(router.clone(), fx_clock.clone(), *interval));
                        processes.insert(*interval, pid);
                    }
                }

                Task::succeed(TimeState { taggers, processes })
            }),
            on_self_msg: Rc::new(move |router, interval, state| {
                let current = cast::<TimeState>(&state).cloned().unwrap_or_default();
                let Some(interval) = cast::<u64>(&interval).copied() else {
                    debug_assert!(false, "foreign self message in the Time manager");
                    return Task::succeed_value(state);
                };
                let stamp = self_clock.now_ms();
                let sends = current
                    .taggers
                    .get(&interval)
                    .into_iter()
                    .flatten()
                    .map(|tagger| router.send_to_app(tagger(stamp)))
                    .collect();
                Task::sequence(sends).and_then(move |_| Task::succeed_value(state))
            }),
            cmd_map: None,
            sub_map: Some(Rc::new(|apply, value| {
                let Some(every) = cast::<EverySub>(&value) else {
                    debug_assert!(false, "foreign subscription in the Time manager");
                    return value;
                };
                let tagger = every.tagger.clone();
                val(EverySub {
                    interval_ms: every.interval_ms,
                    tagger: Rc::new(move |stamp| apply(tagger(stamp))),
                })
            })),
        },
    );
}

fn tick_loop(router: Router, clock: Rc<dyn Clock>, interval_ms: u64) -> Task {
    sleep(&clock, interval_ms).and_then(move |_| {
        let next_router = router.clone();
        router
            .send_to_self(val(interval_ms))
            .and_then(move |_| tick_loop(next_router, clock, interval_ms))
    })
}
