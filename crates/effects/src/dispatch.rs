use crate::bag::{Bag, Cmd, Sub};
use crate::registry::{Managers, TaggerApply};
use crate::MgrMsg;
use core_types::{TaggerFn, Value, val};
use scheduler::Scheduler;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

/// Flattens one cycle's command and subscription bags per manager key and
/// posts an `Fx` message to every registered manager — including managers
/// with nothing this cycle, so subscription sets are refreshed, not diffed.
pub fn dispatch_effects(managers: &Managers, sched: &Scheduler, cmds: Cmd, subs: Sub) {
    let mut dict: HashMap<Arc<str>, (Vec<Value>, Vec<Value>)> = HashMap::new();
    let mut taggers = Vec::new();
    gather(true, cmds.0, managers, &mut dict, &mut taggers);
    debug_assert!(taggers.is_empty());
    gather(false, subs.0, managers, &mut dict, &mut taggers);
    debug_assert!(taggers.is_empty());

    for key in managers.order() {
        let (c, s) = dict.remove(key).unwrap_or_default();
        log::trace!(
            target: "fx.dispatch",
            "manager '{key}': {} commands, {} subscriptions",
            c.len(),
            s.len()
        );
        sched.send(
            managers.process(key),
            val(MgrMsg::Fx { cmds: c, subs: s }),
        );
    }
}

fn gather(
    is_cmd: bool,
    bag: Bag,
    managers: &Managers,
    dict: &mut HashMap<Arc<str>, (Vec<Value>, Vec<Value>)>,
    taggers: &mut Vec<TaggerFn>,
) {
    match bag {
        Bag::Leaf { home, value } => {
            let map = if is_cmd {
                managers.cmd_map(&home)
            } else {
                managers.sub_map(&home)
            };
            let Some(map) = map else {
                panic!("no effect manager registered for '{home}'");
            };
            let Some(map) = map else {
                let kind = if is_cmd { "commands" } else { "subscriptions" };
                panic!("effect manager '{home}' does not accept {kind}");
            };
            let effect = map(compose(taggers), value);
            let slot = dict.entry(home).or_default();
            if is_cmd {
                slot.0.push(effect);
            } else {
                slot.1.push(effect);
            }
        }
        Bag::Batch(items) => {
            for item in items {
                gather(is_cmd, item, managers, dict, taggers);
            }
        }
        Bag::Map { tagger, bag } => {
            taggers.push(tagger);
            gather(is_cmd, *bag, managers, dict, taggers);
            taggers.pop();
        }
    }
}

/// Prefix-composes the accumulated tagger stack: the tagger nearest the leaf
/// applies first.
fn compose(taggers: &[TaggerFn]) -> TaggerApply {
    let taggers: Vec<TaggerFn> = taggers.to_vec();
    Rc::new(move |mut v: Value| {
        for tagger in taggers.iter().rev() {
            v = tagger(v);
        }
        v
    })
}
