//! Script functions.
//!
//! A function body is a graph like any trigger's, walked in a detached
//! context whose event is a [`FunctionEvent`]. Parameters become locals:
//! single parameters under their name, plural ones as `name::*`.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use skript_registry::{ClassId, Event, Value};
use tracing::{debug, error, warn};

use crate::context::{Context, ContextId, Shared};
use crate::engine;
use crate::expr::Expression;
use crate::locals::Locals;
use crate::node::{Graph, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub class: ClassId,
    pub single: bool,
    pub has_default: bool,
}

/// Everything a call site needs to be checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub script: String,
    pub parameters: Vec<Parameter>,
    pub return_type: Option<ClassId>,
    pub single_return: bool,
}

impl Signature {
    /// Arguments that must be given explicitly.
    #[must_use]
    pub fn required_parameters(&self) -> usize {
        self.parameters
            .iter()
            .rposition(|p| !p.has_default)
            .map_or(0, |i| i + 1)
    }
}

/// The event of a function call.
#[derive(Debug)]
pub struct FunctionEvent {
    pub function: String,
}

impl Event for FunctionEvent {
    fn class(&self) -> ClassId {
        ClassId::FUNCTION_EVENT
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct Function {
    signature: Arc<Signature>,
    defaults: Vec<Option<Box<dyn Expression>>>,
    graph: Graph,
    root: NodeId,
}

impl Function {
    pub(crate) fn new(
        signature: Arc<Signature>,
        defaults: Vec<Option<Box<dyn Expression>>>,
        graph: Graph,
        root: NodeId,
    ) -> Self {
        Self {
            signature,
            defaults,
            graph,
            root,
        }
    }

    #[must_use]
    pub fn signature(&self) -> &Arc<Signature> {
        &self.signature
    }

    #[must_use]
    pub const fn graph(&self) -> &Graph {
        &self.graph
    }

    #[must_use]
    pub fn render(&self) -> String {
        format!("function {}:\n{}", self.signature.name, self.graph.render(self.root))
    }

    fn execute(&self, shared: &Arc<Shared>, args: &[Vec<Value>], depth: usize) -> Option<Vec<Value>> {
        let signature = &self.signature;
        let event: Arc<dyn Event> = Arc::new(FunctionEvent {
            function: signature.name.clone(),
        });
        let mut ctx = Context::new(ContextId::DETACHED, event, Locals::new(), shared.clone(), depth);

        for (i, param) in signature.parameters.iter().enumerate() {
            let values = match (args.get(i), self.defaults.get(i).and_then(Option::as_ref)) {
                (Some(values), _) => values.clone(),
                (None, Some(default)) => default.get(&ctx),
                (None, None) => Vec::new(),
            };
            if values.is_empty() && !shared.config.execute_functions_with_missing_params {
                debug!(function = %signature.name, parameter = %param.name, "skipping call with a missing parameter");
                return None;
            }
            let bound = match shared.registry.convert_strictly(&values, param.class) {
                Ok(bound) => bound,
                Err(err) => {
                    warn!(
                        function = %signature.name,
                        parameter = %param.name,
                        "argument {} is not a {}",
                        err.index,
                        shared.registry.classes().code_name(err.to)
                    );
                    return None;
                }
            };
            if param.single {
                ctx.locals_mut().set(&param.name, &bound[..bound.len().min(1)]);
            } else {
                ctx.locals_mut().set(&format!("{}::*", param.name), &bound);
            }
        }

        if engine::walk(&self.graph, self.root, &mut ctx).is_some() {
            error!(function = %signature.name, "function body suspended, dropping the rest of the call");
        }
        ctx.take_return_value()
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("signature", &self.signature)
            .field("nodes", &self.graph.len())
            .finish_non_exhaustive()
    }
}

/// Installed functions by name.
#[derive(Debug, Default)]
pub struct FunctionTable {
    functions: FxHashMap<String, Arc<Function>>,
}

impl FunctionTable {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Function>> {
        self.functions.get(name).cloned()
    }

    #[must_use]
    pub fn signature(&self, name: &str) -> Option<Arc<Signature>> {
        self.functions.get(name).map(|f| f.signature.clone())
    }

    pub fn signatures(&self) -> impl Iterator<Item = &Arc<Signature>> + '_ {
        self.functions.values().map(|f| &f.signature)
    }

    pub(crate) fn insert(&mut self, function: Function) {
        self.functions
            .insert(function.signature.name.clone(), Arc::new(function));
    }

    /// Drop every function loaded from `script`.
    pub(crate) fn remove_script(&mut self, script: &str) -> usize {
        let before = self.functions.len();
        self.functions.retain(|_, f| f.signature.script != script);
        before - self.functions.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Call `name` at nesting `depth`. `None` when the function doesn't exist,
/// the arguments don't bind, or the call is too deep.
pub(crate) fn call(shared: &Arc<Shared>, name: &str, args: &[Vec<Value>], depth: usize) -> Option<Vec<Value>> {
    let function = shared.functions.read().get(name)?;
    if depth > shared.config.max_call_depth {
        warn!(function = %name, depth, "maximum call depth exceeded");
        return None;
    }
    function.execute(shared, args, depth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_parameters() {
        let param = |name: &str, has_default| Parameter {
            name: name.to_string(),
            class: ClassId::NUMBER,
            single: true,
            has_default,
        };
        let mut signature = Signature {
            name: "f".to_string(),
            script: "test".to_string(),
            parameters: vec![param("a", false), param("b", true)],
            return_type: None,
            single_return: true,
        };
        assert_eq!(signature.required_parameters(), 1);

        signature.parameters.push(param("c", false));
        assert_eq!(signature.required_parameters(), 3);

        signature.parameters.clear();
        assert_eq!(signature.required_parameters(), 0);
    }
}
