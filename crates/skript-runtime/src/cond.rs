//! Conditions.

use std::fmt;

use skript_registry::Relation;

use crate::context::Context;
use crate::expr::Expression;

pub trait Condition: Send + Sync {
    fn check(&self, ctx: &Context) -> bool;

    fn describe(&self, ctx: Option<&Context>, debug: bool) -> String;
}

impl fmt::Debug for dyn Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(None, true))
    }
}

/// `<left> is <relation> <right>`.
///
/// Holds when every left value relates to at least one right value. An
/// empty side never matches.
pub struct Compare {
    left: Box<dyn Expression>,
    relation: Relation,
    right: Box<dyn Expression>,
}

impl Compare {
    pub fn new(left: Box<dyn Expression>, relation: Relation, right: Box<dyn Expression>) -> Self {
        Self {
            left,
            relation,
            right,
        }
    }
}

impl Condition for Compare {
    fn check(&self, ctx: &Context) -> bool {
        let left = self.left.get(ctx);
        let right = self.right.get(ctx);
        if left.is_empty() || right.is_empty() {
            return false;
        }
        let comparators = ctx.registry().comparators();
        left.iter().all(|l| {
            right
                .iter()
                .any(|r| self.relation.is(comparators.compare(l, r)))
        })
    }

    fn describe(&self, ctx: Option<&Context>, debug: bool) -> String {
        let left = self.left.describe(ctx, debug);
        let right = self.right.describe(ctx, debug);
        match self.relation {
            Relation::Equal => format!("{left} is {right}"),
            Relation::NotEqual => format!("{left} is not {right}"),
            relation => format!("{left} is {relation} {right}"),
        }
    }
}

/// `<expr> is set`.
pub struct IsSet {
    expr: Box<dyn Expression>,
}

impl IsSet {
    pub fn new(expr: Box<dyn Expression>) -> Self {
        Self { expr }
    }
}

impl Condition for IsSet {
    fn check(&self, ctx: &Context) -> bool {
        !self.expr.get(ctx).is_empty()
    }

    fn describe(&self, ctx: Option<&Context>, debug: bool) -> String {
        format!("{} is set", self.expr.describe(ctx, debug))
    }
}

pub struct Not {
    inner: Box<dyn Condition>,
}

impl Not {
    pub fn new(inner: Box<dyn Condition>) -> Self {
        Self { inner }
    }
}

impl Condition for Not {
    fn check(&self, ctx: &Context) -> bool {
        !self.inner.check(ctx)
    }

    fn describe(&self, ctx: Option<&Context>, debug: bool) -> String {
        format!("not {}", self.inner.describe(ctx, debug))
    }
}

type CheckFn = Box<dyn Fn(&Context) -> bool + Send + Sync>;

/// A host condition backed by a closure.
pub struct FnCondition {
    name: String,
    f: CheckFn,
}

impl FnCondition {
    pub fn new(name: impl Into<String>, f: impl Fn(&Context) -> bool + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            f: Box::new(f),
        }
    }
}

impl Condition for FnCondition {
    fn check(&self, ctx: &Context) -> bool {
        (self.f)(ctx)
    }

    fn describe(&self, _ctx: Option<&Context>, _debug: bool) -> String {
        self.name.clone()
    }
}
