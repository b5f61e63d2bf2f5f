//! Script functions: binding, defaults, returns and call depth.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use common::{Journal, TestEvent, runtime, runtime_with};
use skript_registry::{ClassId, ClassInfo, RegistryBuilder, Value};
use skript_runtime::{Expr, FnEffect, FnExpression, FunctionDef, ParamDef, Runtime, RuntimeConfig, Script, Stmt};

fn double() -> FunctionDef {
    FunctionDef::new(
        "double",
        vec![ParamDef::single("n", ClassId::NUMBER)],
        vec![Stmt::return_(Expr::custom(FnExpression::new(
            "{_n} * 2",
            ClassId::NUMBER,
            true,
            |ctx| {
                ctx.locals()
                    .get("n")
                    .iter()
                    .map(|v| Value::from(v.as_number() * 2.0))
                    .collect()
            },
        )))],
    )
    .returns(ClassId::NUMBER, true)
}

#[test]
fn test_function_returns_value() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    let report = runtime
        .install(Script::new("math").function(double()).trigger(
            "on tick",
            events.tick,
            vec![
                Stmt::set(Expr::local("r"), Expr::call("double", vec![Expr::literal(4)])),
                journal.local("r"),
            ],
        ))
        .unwrap();
    assert_eq!(report.functions, 1);
    assert_eq!(report.triggers, 1);

    assert_eq!(
        runtime.call_function("double", &[vec![Value::from(21)]]),
        Some(vec![Value::from(42)])
    );

    runtime.fire(Arc::new(TestEvent(events.tick)));
    assert_eq!(journal.entries(), ["r=8"]);

    let function = runtime.function("double").unwrap();
    assert_eq!(function.signature().required_parameters(), 1);
    assert_eq!(function.signature().script, "math");
}

#[test]
fn test_functions_are_shared_between_scripts() {
    let (mut runtime, events) = runtime();
    let journal = Journal::default();
    runtime
        .install(Script::new("lib").function(FunctionDef::new(
            "log",
            vec![ParamDef::single("message", ClassId::TEXT)],
            vec![journal.local("message")],
        )))
        .unwrap();
    runtime
        .install(Script::new("main").trigger(
            "on tick",
            events.tick,
            vec![Stmt::call("log", vec![Expr::literal("hi")])],
        ))
        .unwrap();

    runtime.fire(Arc::new(TestEvent(events.tick)));
    assert_eq!(journal.entries(), ["message=hi"]);

    // Calls resolve by name at run time.
    runtime.uninstall("lib");
    runtime.fire(Arc::new(TestEvent(events.tick)));
    assert_eq!(journal.entries(), ["message=hi"]);
}

#[test]
fn test_plural_parameter() {
    let (mut runtime, _) = runtime();
    runtime
        .install(
            Script::new("sum").function(
                FunctionDef::new(
                    "sum",
                    vec![ParamDef::plural("ns", ClassId::NUMBER)],
                    vec![Stmt::return_(Expr::custom(FnExpression::new(
                        "sum of {_ns::*}",
                        ClassId::NUMBER,
                        true,
                        |ctx| {
                            let total: f64 = ctx.locals().get("ns::*").iter().map(Value::as_number).sum();
                            vec![Value::from(total)]
                        },
                    )))],
                )
                .returns(ClassId::NUMBER, true),
            ),
        )
        .unwrap();

    let args = vec![Value::from(1), Value::from(2), Value::from(3)];
    assert_eq!(runtime.call_function("sum", &[args]), Some(vec![Value::from(6)]));
    assert_eq!(runtime.call_function("sum", &[vec![]]), Some(vec![Value::from(0)]));
}

#[test]
fn test_default_parameter() {
    let (mut runtime, _) = runtime();
    runtime
        .install(
            Script::new("greet").function(
                FunctionDef::new(
                    "greet",
                    vec![ParamDef::single("name", ClassId::TEXT).with_default(Expr::literal("world"))],
                    vec![Stmt::return_(Expr::custom(FnExpression::new(
                        "greeting",
                        ClassId::TEXT,
                        true,
                        |ctx| {
                            let name = ctx.locals().get_single("name").map(Value::as_text).unwrap_or_default();
                            vec![Value::from(format!("hello {name}"))]
                        },
                    )))],
                )
                .returns(ClassId::TEXT, true),
            ),
        )
        .unwrap();

    assert_eq!(
        runtime.call_function("greet", &[]),
        Some(vec![Value::from("hello world")])
    );
    assert_eq!(
        runtime.call_function("greet", &[vec![Value::from("bob")]]),
        Some(vec![Value::from("hello bob")])
    );
}

fn one() -> Script {
    Script::new("one").function(
        FunctionDef::new(
            "one",
            vec![ParamDef::single("x", ClassId::NUMBER).with_default(Expr::local("unset"))],
            vec![Stmt::return_(Expr::literal(1))],
        )
        .returns(ClassId::NUMBER, true),
    )
}

#[test]
fn test_missing_parameters() {
    let (mut runtime, _) = runtime();
    runtime.install(one()).unwrap();
    assert_eq!(runtime.call_function("one", &[]), Some(vec![Value::from(1)]));

    let (mut strict, _) = runtime_with(RuntimeConfig {
        execute_functions_with_missing_params: false,
        ..RuntimeConfig::default()
    });
    strict.install(one()).unwrap();
    assert_eq!(strict.call_function("one", &[]), None);
    assert_eq!(
        strict.call_function("one", &[vec![Value::from(5)]]),
        Some(vec![Value::from(1)])
    );
}

#[test]
fn test_arguments_that_do_not_convert() {
    let (mut runtime, _) = runtime();
    runtime.install(Script::new("math").function(double())).unwrap();
    assert_eq!(runtime.call_function("double", &[vec![Value::from("abc")]]), None);
    assert_eq!(runtime.call_function("missing", &[]), None);
}

#[test]
fn test_call_depth_is_limited() {
    let (mut runtime, _) = runtime_with(RuntimeConfig {
        max_call_depth: 8,
        ..RuntimeConfig::default()
    });
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    runtime
        .install(
            Script::new("deep").function(
                FunctionDef::new(
                    "deep",
                    vec![ParamDef::single("n", ClassId::NUMBER)],
                    vec![
                        Stmt::effect(FnEffect::new("count", move |_| {
                            counter.fetch_add(1, Ordering::Relaxed);
                        })),
                        Stmt::return_(Expr::call("deep", vec![Expr::local("n")])),
                    ],
                )
                .returns(ClassId::NUMBER, true),
            ),
        )
        .unwrap();

    assert_eq!(runtime.call_function("deep", &[vec![Value::from(1)]]), Some(vec![]));
    assert_eq!(calls.load(Ordering::Relaxed), 8);
}

struct Named(&'static str);

#[test]
fn test_supertype_argument_is_checked_at_run_time() {
    let mut builder = RegistryBuilder::new();
    let tick = builder.register_event("tick", &[]).unwrap();
    let entity = builder.register_class(ClassInfo::new("entity")).unwrap();
    let player = builder
        .register_class(ClassInfo::new("player").supertype(entity))
        .unwrap();
    let mut runtime = Runtime::new(Arc::new(builder.build()), RuntimeConfig::default()).unwrap();

    let journal = Journal::default();
    let report = runtime.install(
        Script::new("names")
            .function(
                FunctionDef::new(
                    "name_of",
                    vec![ParamDef::single("p", player)],
                    vec![Stmt::return_(Expr::custom(FnExpression::new(
                        "name of {_p}",
                        ClassId::TEXT,
                        true,
                        |ctx| {
                            ctx.locals()
                                .get_single("p")
                                .and_then(|p| p.downcast_ref::<Named>())
                                .map(|n| Value::from(n.0))
                                .into_iter()
                                .collect()
                        },
                    )))],
                )
                .returns(ClassId::TEXT, true),
            )
            .trigger(
                "on tick",
                tick,
                vec![
                    Stmt::set(
                        Expr::local("r"),
                        Expr::call(
                            "name_of",
                            vec![Expr::custom(FnExpression::new("the entity", entity, true, move |_| {
                                vec![Value::object(player, Named("steve"))]
                            }))],
                        ),
                    ),
                    journal.local("r"),
                ],
            ),
    );
    assert!(report.is_ok(), "{report:?}");

    runtime.fire(Arc::new(TestEvent(tick)));
    assert_eq!(journal.entries(), ["r=steve"]);

    // An entity that isn't a player doesn't bind.
    assert_eq!(
        runtime.call_function("name_of", &[vec![Value::object(entity, Named("zombie"))]]),
        None
    );
}
