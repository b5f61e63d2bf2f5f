//! Walking triggers: control flow, delays and async effects.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Journal, TestEvent, runtime};
use skript_registry::{ChangeMode, ClassId, Relation, Timespan, Value};
use skript_runtime::{
    AsyncJob, Completion, Cond, Context, ExitLevels, ExitScope, Expr, FnAsyncEffect, FnCondition, FnEffect,
    Locals, RuntimeError, Script, Stmt,
};

fn numbers(ns: &[i32]) -> Expr {
    Expr::Literal(ns.iter().map(|n| Value::from(*n)).collect())
}

fn always() -> Cond {
    Cond::custom(FnCondition::new("always", |_| true))
}

fn never() -> Cond {
    Cond::custom(FnCondition::new("never", |_| false))
}

fn ticks(n: u64) -> Expr {
    Expr::literal(Timespan::from_ticks(n))
}

#[test]
fn test_delay_restores_locals() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    runtime
        .install(Script::new("delay").trigger(
            "on tick",
            events.tick,
            vec![
                journal.local("a"),
                Stmt::delay(ticks(1)),
                journal.local("a"),
                journal.local("b"),
            ],
        ))
        .unwrap();

    let trigger = runtime.triggers()[0].clone();
    let locals: Locals = [("a", 1), ("b", 2)].into_iter().collect();
    let id = runtime.execute(&trigger, Arc::new(TestEvent(events.tick)), locals);

    assert_eq!(journal.entries(), ["a=1"]);
    assert!(runtime.is_delayed(id));
    assert_eq!(runtime.pending_continuations(), 1);
    // Detached while suspended.
    assert!(runtime.context(id).unwrap().locals().is_empty());

    assert_eq!(runtime.tick(), 1);
    assert_eq!(journal.entries(), ["a=1", "a=1", "b=2"]);
    assert!(runtime.context(id).is_none());
    assert!(!runtime.is_delayed(id));
    assert_eq!(runtime.live_contexts(), 0);
    assert_eq!(runtime.pending_continuations(), 0);
}

#[test]
fn test_delay_waits_exact_ticks() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    runtime
        .install(Script::new("wait").trigger(
            "on tick",
            events.tick,
            vec![journal.mark("a"), Stmt::delay(ticks(3)), journal.mark("b")],
        ))
        .unwrap();

    assert_eq!(runtime.fire(Arc::new(TestEvent(events.tick))), 1);
    assert_eq!(runtime.tick(), 0);
    assert_eq!(runtime.tick(), 0);
    assert_eq!(journal.entries(), ["a"]);
    assert_eq!(runtime.tick(), 1);
    assert_eq!(journal.entries(), ["a", "b"]);
    assert_eq!(runtime.current_tick(), 3);
}

#[test]
fn test_sub_tick_delay_waits_one_tick() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    let report = runtime
        .install(Script::new("short").trigger(
            "on tick",
            events.tick,
            vec![
                Stmt::delay(Expr::literal(Timespan::from_millis(10))),
                journal.mark("literal"),
                Stmt::delay(Expr::local("wait")),
                journal.mark("variable"),
            ],
        ))
        .unwrap();

    assert_eq!(report.warnings.len(), 1);
    assert_eq!(
        report.warnings[0].message,
        "Delays less than one tick are not possible, defaulting to one tick."
    );

    let trigger = runtime.triggers()[0].clone();
    let locals: Locals = [("wait", Timespan::from_millis(0))].into_iter().collect();
    runtime.execute(&trigger, Arc::new(TestEvent(events.tick)), locals);

    assert!(journal.entries().is_empty());
    assert_eq!(runtime.tick(), 1);
    assert_eq!(journal.entries(), ["literal"]);
    assert_eq!(runtime.tick(), 1);
    assert_eq!(journal.entries(), ["literal", "variable"]);
    assert_eq!(runtime.live_contexts(), 0);
}

#[test]
fn test_loop_state_survives_delay() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    runtime
        .install(Script::new("slow loop").trigger(
            "on tick",
            events.tick,
            vec![
                Stmt::loop_(
                    numbers(&[1, 2, 3]),
                    vec![
                        Stmt::change(Expr::local("seen::*"), ChangeMode::Add, Some(Expr::loop_value())),
                        Stmt::delay(ticks(1)),
                    ],
                ),
                journal.local("seen::*"),
            ],
        ))
        .unwrap();

    runtime.fire(Arc::new(TestEvent(events.tick)));
    assert_eq!(runtime.tick(), 1);
    assert_eq!(runtime.tick(), 1);
    assert!(journal.entries().is_empty());
    assert_eq!(runtime.tick(), 1);
    assert_eq!(journal.entries(), ["seen::*=1,2,3"]);
    assert_eq!(runtime.live_contexts(), 0);
}

#[test]
fn test_exit_two_of_three_loops() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    let recorder = journal.clone();
    runtime
        .install(Script::new("nested").trigger(
            "on tick",
            events.tick,
            vec![
                Stmt::loop_(
                    numbers(&[1, 2]),
                    vec![
                        Stmt::loop_(
                            numbers(&[1, 2]),
                            vec![
                                Stmt::loop_(
                                    numbers(&[1, 2]),
                                    vec![
                                        journal.mark("inner"),
                                        Stmt::exit(ExitLevels::Count(2), ExitScope::Loops),
                                    ],
                                ),
                                journal.mark("middle"),
                            ],
                        ),
                        Stmt::effect(FnEffect::new("count loops", move |ctx| {
                            recorder.push(format!("loops={}", ctx.active_loops()));
                        })),
                    ],
                ),
                journal.mark("end"),
            ],
        ))
        .unwrap();

    runtime.fire(Arc::new(TestEvent(events.tick)));
    assert_eq!(journal.entries(), ["inner", "loops=1", "inner", "loops=1", "end"]);
}

#[test]
fn test_continue() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    runtime
        .install(Script::new("continue").trigger(
            "on tick",
            events.tick,
            vec![
                Stmt::loop_(
                    numbers(&[1, 2, 3]),
                    vec![
                        Stmt::if_(
                            Cond::compare(Expr::loop_value(), Relation::Equal, Expr::literal(2)),
                            vec![Stmt::continue_()],
                        ),
                        Stmt::change(Expr::local("seen::*"), ChangeMode::Add, Some(Expr::loop_value())),
                    ],
                ),
                journal.local("seen::*"),
                Stmt::set(Expr::local("i"), Expr::literal(0)),
                Stmt::while_(
                    Cond::compare(Expr::local("i"), Relation::Smaller, Expr::literal(5)),
                    vec![
                        Stmt::change(Expr::local("i"), ChangeMode::Add, Some(Expr::literal(1))),
                        Stmt::if_(
                            Cond::compare(Expr::local("i"), Relation::Equal, Expr::literal(3)),
                            vec![Stmt::continue_()],
                        ),
                        Stmt::change(Expr::local("out::*"), ChangeMode::Add, Some(Expr::local("i"))),
                    ],
                ),
                journal.local("out::*"),
            ],
        ))
        .unwrap();

    runtime.fire(Arc::new(TestEvent(events.tick)));
    assert_eq!(journal.entries(), ["seen::*=1,3", "out::*=1,2,4,5"]);
}

#[test]
fn test_do_while_runs_once() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    runtime
        .install(Script::new("do while").trigger(
            "on tick",
            events.tick,
            vec![
                Stmt::while_(never(), vec![journal.mark("while")]),
                Stmt::do_while(never(), vec![journal.mark("do while")]),
                journal.mark("after"),
            ],
        ))
        .unwrap();

    runtime.fire(Arc::new(TestEvent(events.tick)));
    assert_eq!(journal.entries(), ["do while", "after"]);
}

#[test]
fn test_exit_conditional() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    runtime
        .install(Script::new("exit").trigger(
            "on tick",
            events.tick,
            vec![
                Stmt::if_(
                    always(),
                    vec![
                        journal.mark("x"),
                        Stmt::exit(ExitLevels::Count(1), ExitScope::Conditionals),
                        journal.mark("y"),
                    ],
                ),
                journal.mark("z"),
            ],
        ))
        .unwrap();

    runtime.fire(Arc::new(TestEvent(events.tick)));
    assert_eq!(journal.entries(), ["x", "z"]);
}

#[test]
fn test_else_chain() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    runtime
        .install(Script::new("chain").trigger(
            "on tick",
            events.tick,
            vec![
                Stmt::if_(never(), vec![journal.mark("if")]),
                Stmt::else_if(always(), vec![journal.mark("else if")]),
                Stmt::else_(vec![journal.mark("else")]),
                Stmt::if_(always(), vec![journal.mark("second if")]),
                Stmt::else_(vec![journal.mark("second else")]),
                Stmt::if_(never(), vec![]),
                Stmt::else_(vec![journal.mark("third else")]),
                journal.mark("after"),
            ],
        ))
        .unwrap();

    runtime.fire(Arc::new(TestEvent(events.tick)));
    assert_eq!(journal.entries(), ["else if", "second if", "third else", "after"]);
}

#[test]
fn test_guards_and_do_if() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    runtime
        .install(Script::new("guards").trigger(
            "on tick",
            events.tick,
            vec![
                Stmt::loop_(
                    numbers(&[1, 2, 3]),
                    vec![
                        Stmt::condition(Cond::compare(
                            Expr::loop_value(),
                            Relation::NotEqual,
                            Expr::literal(2),
                        )),
                        Stmt::change(Expr::local("kept::*"), ChangeMode::Add, Some(Expr::loop_value())),
                    ],
                ),
                journal.local("kept::*"),
                Stmt::do_if(journal.mark("skipped"), never()),
                Stmt::do_if(journal.mark("ran"), always()),
                Stmt::condition(never()),
                journal.mark("unreachable"),
            ],
        ))
        .unwrap();

    runtime.fire(Arc::new(TestEvent(events.tick)));
    assert_eq!(journal.entries(), ["kept::*=1,3", "ran"]);
    assert_eq!(runtime.live_contexts(), 0);
}

#[test]
fn test_stop_inside_loop_ends_trigger() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    runtime
        .install(Script::new("stop").trigger(
            "on tick",
            events.tick,
            vec![
                Stmt::loop_(numbers(&[1, 2, 3]), vec![journal.mark("body"), Stmt::stop()]),
                journal.mark("after"),
            ],
        ))
        .unwrap();

    runtime.fire(Arc::new(TestEvent(events.tick)));
    assert_eq!(journal.entries(), ["body"]);
    assert_eq!(runtime.live_contexts(), 0);
}

#[test]
fn test_event_values() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    runtime
        .install(Script::new("chat").trigger(
            "on chat",
            events.chat,
            vec![
                Stmt::set(Expr::local("message"), Expr::event_value(ClassId::TEXT)),
                journal.local("message"),
            ],
        ))
        .unwrap();

    assert_eq!(runtime.fire(Arc::new(TestEvent(events.tick))), 0);
    assert_eq!(runtime.fire(Arc::new(TestEvent(events.chat))), 1);
    assert_eq!(journal.entries(), ["message=hello"]);
}

#[test]
fn test_fire_matches_event_supertypes() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    runtime
        .install(
            Script::new("events")
                .trigger("on tick", events.tick, vec![journal.mark("tick")])
                .trigger("on any event", ClassId::EVENT, vec![journal.mark("any")])
                .trigger("on chat", events.chat, vec![journal.mark("chat")]),
        )
        .unwrap();

    assert_eq!(runtime.fire(Arc::new(TestEvent(events.tick))), 2);
    assert_eq!(journal.entries(), ["tick", "any"]);
}

#[test]
fn test_async_effect_resumes_with_completion() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    runtime
        .install(Script::new("async").trigger(
            "on tick",
            events.tick,
            vec![
                Stmt::async_effect(FnAsyncEffect::new("double {_x}", |ctx| {
                    let x = ctx.locals().get_single("x").map_or(0.0, Value::as_number);
                    let job: AsyncJob = Box::new(move || {
                        let doubled = x * 2.0;
                        let completion: Completion = Box::new(move |ctx: &mut Context| {
                            ctx.locals_mut().set("result", &[Value::from(doubled)]);
                        });
                        completion
                    });
                    job
                })),
                journal.local("x"),
                journal.local("result"),
            ],
        ))
        .unwrap();

    let trigger = runtime.triggers()[0].clone();
    let locals: Locals = [("x", 21)].into_iter().collect();
    let id = runtime.execute(&trigger, Arc::new(TestEvent(events.tick)), locals);

    assert!(journal.entries().is_empty());
    assert!(runtime.is_delayed(id));
    assert_eq!(runtime.pending_async(), 1);

    assert_eq!(runtime.await_async(Duration::from_secs(10)), 1);
    assert_eq!(journal.entries(), ["x=21", "result=42"]);
    assert_eq!(runtime.pending_async(), 0);
    assert_eq!(runtime.live_contexts(), 0);
}

fn noop_async() -> Stmt {
    Stmt::async_effect(FnAsyncEffect::new("noop", |_| {
        let job: AsyncJob = Box::new(|| {
            let completion: Completion = Box::new(|_: &mut Context| {});
            completion
        });
        job
    }))
}

#[test]
fn test_delay_after_async_effect_waits_a_full_tick() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    runtime
        .install(Script::new("async-delay").trigger(
            "on tick",
            events.tick,
            vec![
                noop_async(),
                journal.mark("after-async"),
                Stmt::delay(ticks(1)),
                journal.mark("after-delay"),
            ],
        ))
        .unwrap();

    runtime.fire(Arc::new(TestEvent(events.tick)));
    let mut resumed_on = None;
    for _ in 0..10_000 {
        runtime.tick();
        if !journal.entries().is_empty() {
            resumed_on = Some(runtime.current_tick());
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    let resumed_on = resumed_on.expect("async effect never completed");

    assert_eq!(journal.entries(), ["after-async"]);
    assert_eq!(runtime.pending_continuations(), 1);

    assert_eq!(runtime.tick(), 1);
    assert_eq!(runtime.current_tick(), resumed_on + 1);
    assert_eq!(journal.entries(), ["after-async", "after-delay"]);
    assert_eq!(runtime.live_contexts(), 0);
}

#[test]
fn test_delay_after_awaited_async_effect() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    runtime
        .install(Script::new("async-delay").trigger(
            "on tick",
            events.tick,
            vec![
                noop_async(),
                journal.mark("after-async"),
                Stmt::delay(ticks(2)),
                journal.mark("after-delay"),
            ],
        ))
        .unwrap();

    runtime.fire(Arc::new(TestEvent(events.tick)));
    assert_eq!(runtime.await_async(Duration::from_secs(10)), 1);
    assert_eq!(journal.entries(), ["after-async"]);

    assert_eq!(runtime.tick(), 0);
    assert_eq!(runtime.tick(), 1);
    assert_eq!(runtime.current_tick(), 2);
    assert_eq!(journal.entries(), ["after-async", "after-delay"]);
}

#[test]
fn test_completion_for_finished_execution_is_not_counted() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    let (release, gate) = crossbeam_channel::unbounded::<()>();
    runtime
        .install(Script::new("late").trigger(
            "on tick",
            events.tick,
            vec![
                Stmt::async_effect(FnAsyncEffect::new("wait for release", move |_| {
                    let gate = gate.clone();
                    let job: AsyncJob = Box::new(move || {
                        let _ = gate.recv();
                        let completion: Completion = Box::new(|_: &mut Context| {});
                        completion
                    });
                    job
                })),
                journal.mark("after"),
            ],
        ))
        .unwrap();

    runtime.fire(Arc::new(TestEvent(events.tick)));
    assert_eq!(runtime.pending_async(), 1);
    runtime.shutdown();
    release.send(()).unwrap();

    for _ in 0..10_000 {
        if runtime.pending_async() == 0 {
            break;
        }
        assert_eq!(runtime.tick(), 0);
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(runtime.pending_async(), 0);
    assert!(journal.entries().is_empty());
}

#[test]
fn test_disabled_runtime_ends_at_delay() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    runtime
        .install(Script::new("disabled").trigger(
            "on tick",
            events.tick,
            vec![journal.mark("a"), Stmt::delay(ticks(1)), journal.mark("b")],
        ))
        .unwrap();

    runtime.set_enabled(false);
    assert_eq!(runtime.fire(Arc::new(TestEvent(events.tick))), 0);

    let trigger = runtime.triggers()[0].clone();
    runtime.execute(&trigger, Arc::new(TestEvent(events.tick)), Locals::new());
    assert_eq!(journal.entries(), ["a"]);
    assert_eq!(runtime.pending_continuations(), 0);
    assert_eq!(runtime.live_contexts(), 0);
}

#[test]
fn test_shutdown_drops_suspended_executions() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    runtime
        .install(Script::new("shutdown").trigger(
            "on tick",
            events.tick,
            vec![journal.mark("a"), Stmt::delay(ticks(5)), journal.mark("b")],
        ))
        .unwrap();

    runtime.fire(Arc::new(TestEvent(events.tick)));
    runtime.fire(Arc::new(TestEvent(events.tick)));
    assert_eq!(runtime.live_contexts(), 2);

    assert_eq!(runtime.shutdown(), 2);
    assert_eq!(runtime.live_contexts(), 0);
    for _ in 0..10 {
        assert_eq!(runtime.tick(), 0);
    }
    assert_eq!(journal.entries(), ["a", "a"]);
    assert!(matches!(
        runtime.install(Script::new("late")),
        Err(RuntimeError::Disabled)
    ));
}

#[test]
fn test_reinstall_replaces_script() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    let script = |name: &str| Script::new("greet").trigger("on tick", events.tick, vec![journal.mark(name)]);

    runtime.install(script("old")).unwrap();
    runtime.install(script("new")).unwrap();
    assert_eq!(runtime.triggers().len(), 1);

    runtime.fire(Arc::new(TestEvent(events.tick)));
    assert_eq!(journal.entries(), ["new"]);

    assert_eq!(runtime.uninstall("greet"), 1);
    assert_eq!(runtime.fire(Arc::new(TestEvent(events.tick))), 0);
}
