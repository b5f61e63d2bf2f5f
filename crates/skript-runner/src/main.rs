//! Skript runner
//!
//! Hosts a [`Runtime`] on a fixed-rate tick loop and runs a small demo
//! script against it.
//!
//! Environment:
//! - `TARGET_TPS`: ticks per second (default 20)
//! - `RUN_TICKS`: ticks to run before shutting down (default 200)
//! - `SKRIPT_CONFIG`: path to a JSON runtime config; `SKRIPT_*` variables
//!   are used otherwise

use std::sync::Arc;
use std::time::{Duration, Instant};

use skript_registry::{
    ClassId, ClassInfo, ConverterOptions, Event, Registry, RegistryBuilder, Time, Timespan, Value,
};
use skript_runtime::{
    Completion, Context, Effect, Expr, Expression, FnAsyncEffect, FunctionDef, Literal, LocalVariable,
    ParamDef, Runtime, RuntimeConfig, Script, Stmt,
};
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct Player {
    name: String,
}

struct JoinEvent {
    class: ClassId,
    player: Player,
}

impl Event for JoinEvent {
    fn class(&self) -> ClassId {
        self.class
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Sends its parts, joined as text, to the log.
struct Broadcast {
    parts: Vec<Box<dyn Expression>>,
}

impl Broadcast {
    fn new(parts: Vec<Box<dyn Expression>>) -> Self {
        Self { parts }
    }
}

impl Effect for Broadcast {
    fn execute(&self, ctx: &mut Context) {
        let registry = ctx.registry();
        let message: String = self
            .parts
            .iter()
            .flat_map(|part| part.get(ctx))
            .map(|v| {
                registry
                    .convert(&v, ClassId::TEXT)
                    .map_or_else(|| registry.to_string(&v), |t| t.as_text())
            })
            .collect();
        info!(target: "broadcast", "{message}");
    }

    fn describe(&self, ctx: Option<&Context>, debug: bool) -> String {
        let parts: Vec<String> = self.parts.iter().map(|p| p.describe(ctx, debug)).collect();
        format!("broadcast {}", parts.join(" "))
    }
}

fn text(s: &str) -> Box<dyn Expression> {
    Box::new(Literal::single(s))
}

fn local(name: &str) -> Box<dyn Expression> {
    Box::new(LocalVariable::new(name))
}

fn registry() -> eyre::Result<(Arc<Registry>, ClassId, ClassId)> {
    let mut builder = RegistryBuilder::new();
    let player = builder.register_class(ClassInfo::new("player").name("player", "players"))?;
    builder.register_converter(
        player,
        ClassId::TEXT,
        |v| v.downcast_ref::<Player>().map(|p| Value::from(p.name.as_str())),
        ConverterOptions::empty(),
    )?;

    let join = builder.register_event("join", &[])?;
    builder.register_event_value(
        join,
        player,
        move |e| {
            e.downcast_ref::<JoinEvent>()
                .map(|e| Value::object(player, e.player.clone()))
        },
        Time::Now,
    )?;

    Ok((Arc::new(builder.build()), join, player))
}

fn script(join: ClassId, player: ClassId) -> Script {
    let save = FnAsyncEffect::new("save stats", |_| {
        Box::new(|| {
            std::thread::sleep(Duration::from_millis(20));
            let completion: Completion = Box::new(|ctx: &mut Context| {
                ctx.locals_mut().set("saved", &[Value::from(true)]);
            });
            completion
        })
    });

    Script::new("demo")
        .function(
            FunctionDef::new(
                "score",
                vec![ParamDef::single("player", player)],
                vec![Stmt::return_(Expr::literal(42))],
            )
            .returns(ClassId::NUMBER, true),
        )
        .trigger(
            "on join",
            join,
            vec![
                Stmt::set(Expr::local("player"), Expr::event_value(player)),
                Stmt::effect(Broadcast::new(vec![text("Welcome, "), local("player")])),
                Stmt::loop_(
                    Expr::Literal(vec![Value::from(3), Value::from(2), Value::from(1)]),
                    vec![
                        Stmt::set(Expr::local("n"), Expr::loop_value()),
                        Stmt::effect(Broadcast::new(vec![text("Starting in "), local("n")])),
                        Stmt::wait_for(Expr::literal(Timespan::from_seconds(1))),
                    ],
                ),
                Stmt::set(Expr::local("score"), Expr::call("score", vec![Expr::local("player")])),
                Stmt::effect(Broadcast::new(vec![text("Score: "), local("score")])),
                Stmt::async_effect(save),
                Stmt::effect(Broadcast::new(vec![text("Saved: "), local("saved")])),
            ],
        )
}

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("skript_runner=info".parse()?)
                .add_directive("skript_runtime=info".parse()?)
                .add_directive("broadcast=info".parse()?),
        )
        .init();

    let target_tps: f32 = std::env::var("TARGET_TPS")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(20.0);
    let run_ticks: u64 = std::env::var("RUN_TICKS")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(200);
    let target_delta = Duration::from_secs_f32(1.0 / target_tps);

    let config = match std::env::var("SKRIPT_CONFIG") {
        Ok(path) => RuntimeConfig::from_json(&std::fs::read_to_string(path)?)?,
        Err(_) => RuntimeConfig::from_env(),
    };

    let (registry, join, player) = registry()?;

    let mut runtime = Runtime::new(registry, config)?;
    let report = runtime.install(script(join, player))?;
    for warning in &report.warnings {
        info!("warning: {}", warning.message);
    }
    for trigger in runtime.triggers() {
        debug!("\n{}", trigger.render());
    }

    info!("Running {run_ticks} ticks at {target_tps} TPS");

    let names = ["alex", "sam"];
    let mut joined = 0;
    for tick in 0..run_ticks {
        let start = Instant::now();

        if tick.is_multiple_of(100) {
            let name = names[joined % names.len()];
            joined += 1;
            runtime.fire(Arc::new(JoinEvent {
                class: join,
                player: Player { name: name.to_string() },
            }));
        }

        runtime.tick();

        let elapsed = start.elapsed();
        if elapsed < target_delta {
            std::thread::sleep(target_delta - elapsed);
        }
    }

    let dropped = runtime.shutdown();
    info!(dropped, "Shut down");

    Ok(())
}
