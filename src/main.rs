use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use bus::{Bus, HostEvent};
use core_types::{cast, val};
use effects::{Cmd, Registry};
use runtime::application;
use std::rc::Rc;
use std::thread;
use std::time::Duration;
use vdom::facts::{attr, on_msg};
use vdom::node::{node, text};

#[derive(Clone)]
struct Model {
    count: i64,
    ticks: u64,
}

enum Msg {
    Inc,
    Dec,
    Tick(u64),
    Nudge(i64),
}

const RUN_FOR_MS: u64 = 2_000;

fn main() {
    let bus = Bus::new();
    let clock = shell::HostClock::threaded(bus.evt_tx.clone());

    let registry = Registry::new();
    runtime_time::register(&registry, clock.clone());

    let title = Rc::new(runtime_ports::outgoing(
        &registry,
        "title",
        Rc::new(|v| v.clone()),
    ));
    title.subscribe(|v| {
        if let Some(text) = cast::<String>(v) {
            println!("[port:title] {text}");
        }
    });
    let nudge = Rc::new(runtime_ports::incoming(
        &registry,
        "nudge",
        Rc::new(|v| match cast::<i64>(v) {
            Some(n) => Ok(val(*n)),
            None => Err("expected an integer".to_string()),
        }),
    ));

    let cmd_title = title.clone();
    let program = application(
        |_flags| (Model { count: 0, ticks: 0 }, Cmd::none()),
        move |msg: &Msg, model: &Model| {
            let mut next = model.clone();
            match msg {
                Msg::Inc => next.count += 1,
                Msg::Dec => next.count -= 1,
                Msg::Tick(_) => next.ticks += 1,
                Msg::Nudge(n) => next.count += n,
            }
            let cmd = if next.count != model.count {
                cmd_title.cmd(val(format!("count = {}", next.count)))
            } else {
                Cmd::none()
            };
            (next, cmd)
        },
        |model: &Model| {
            node(
                "div",
                vec![attr("id", "app")],
                vec![
                    node("h1", vec![], vec![text("arbor demo")]),
                    node(
                        "button",
                        vec![attr("id", "inc"), on_msg("click", val(Msg::Inc))],
                        vec![text("+")],
                    ),
                    node(
                        "button",
                        vec![attr("id", "dec"), on_msg("click", val(Msg::Dec))],
                        vec![text("-")],
                    ),
                    node(
                        "p",
                        vec![],
                        vec![text(format!("count: {}", model.count))],
                    ),
                    node(
                        "p",
                        vec![],
                        vec![text(format!("uptime: {}s", model.ticks))],
                    ),
                ],
            )
        },
        {
            let nudge = nudge.clone();
            move |_model: &Model| {
                effects::Sub::batch(vec![
                    runtime_time::every(1_000, |stamp| val(Msg::Tick(stamp))),
                    nudge.sub(|v| val(Msg::Nudge(*cast::<i64>(&v).unwrap_or(&0)))),
                ])
            }
        },
    );

    let app = shell::mount(program, val(()), registry, clock.clone(), None);
    println!("-- mounted --");
    print_dom(&app);

    let inc = app.find("id", "inc").expect("inc button");
    app.dispatch(inc, "click", val(()));
    app.dispatch(inc, "click", val(()));
    nudge.send(val(40_i64));

    let quit_tx = bus.evt_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(RUN_FOR_MS));
        let _ = quit_tx.send(HostEvent::Quit);
    });
    app.run(bus.evt_rx);

    println!("-- after {RUN_FOR_MS}ms --");
    print_dom(&app);
}

fn print_dom(app: &shell::App) {
    let doc = app.document().borrow();
    print!("{}", dom::debug::dump(&doc, app.root()));
}
