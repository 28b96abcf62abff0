//! Tree-walk evaluation.
//!
//! `eval` is the single entry for every node kind. Evaluation is pure
//! with respect to the environment it is given; the depth counter is
//! entered on every node and released through a drop guard, so error
//! propagation can never leak a level. Value-level errors travel back
//! through `Ok`; the `Err` channel is reserved for structural faults
//! (see [`crate::error`]).

use std::sync::{Arc, Weak};

use crate::ast::{EmbeddingExpr, Expr, ExprKind, RecordExpr, ReferenceMode};
use crate::depth::DepthCounter;
use crate::diagnostics::Span;
use crate::env::{EnvRef, Environment, LayeredEnv, MapEnv};
use crate::error::{EvalError, EvalResult};
use crate::func::Callable;
use crate::list::{ArrayList, FsList, ListRef};
use crate::value::{FsError, Value};

pub fn eval(expr: &Expr, env: &EnvRef, depth: &Arc<DepthCounter>) -> EvalResult<Value> {
    let Some(_level) = depth.enter(0) else {
        tracing::debug!(pos = expr.span.pos, max = depth.max(), "evaluation depth exceeded");
        return Ok(Value::error(
            FsError::depth_overflow(depth.max()).with_location(expr.span),
        ));
    };

    match &expr.kind {
        ExprKind::Literal(value) => Ok(value.clone()),
        ExprKind::Null => Ok(Value::Null),
        ExprKind::Reference {
            name_lower, mode, ..
        } => resolve(env, name_lower, *mode),
        ExprKind::Call { target, args } => eval_call(expr.span, target, args, env, depth),
        ExprKind::Lambda { params, body } => Ok(Value::Function(Arc::new(LambdaClosure {
            params: params.clone(),
            body: body.clone(),
            env: env.clone(),
            depth: depth.clone(),
        }))),
        ExprKind::List(items) => Ok(Value::List(Arc::new(ExprList::new(
            items.clone(),
            env.clone(),
            depth.clone(),
        )))),
        ExprKind::Record(record) => eval_record(record, env, depth),
        ExprKind::Selector { source, selector } => {
            eval_selector(source, selector, env, depth)
        }
        ExprKind::Embedding(embedding) => eval_embedding(embedding, expr.span, env),
        ExprKind::Unparsed(unparsed) => {
            let parsed = unparsed.parsed(env)?;
            eval(&parsed, env, depth)
        }
    }
}

/// Name lookup under the reference's fixed resolution mode. A name no
/// scope defines is an absence, never an error.
fn resolve(env: &EnvRef, name: &str, mode: ReferenceMode) -> EvalResult<Value> {
    match mode {
        ReferenceMode::Standard => Ok(env.get(name)?.unwrap_or(Value::Null)),
        ReferenceMode::SkipSiblings => match env.parent() {
            Some(parent) => Ok(parent.get(name)?.unwrap_or(Value::Null)),
            None => Ok(Value::Null),
        },
        ReferenceMode::ParentsThenSiblings => {
            if let Some(parent) = env.parent() {
                if parent.is_defined(name) {
                    return Ok(parent.get(name)?.unwrap_or(Value::Null));
                }
            }
            Ok(env.get(name)?.unwrap_or(Value::Null))
        }
    }
}

fn eval_call(
    span: Span,
    target: &Expr,
    args: &Expr,
    env: &EnvRef,
    depth: &Arc<DepthCounter>,
) -> EvalResult<Value> {
    let callee = eval(target, env, depth)?;
    if matches!(callee, Value::Error(_)) {
        return Ok(callee);
    }

    // The aggregated argument list stays lazy; callables decide which
    // positions to force.
    let arg_list: ListRef = match &args.kind {
        ExprKind::List(items) => Arc::new(ExprList::new(
            items.clone(),
            env.clone(),
            depth.clone(),
        )),
        _ => match eval(args, env, depth)? {
            Value::Error(error) => return Ok(Value::Error(error)),
            Value::List(list) => list,
            single => Arc::new(ArrayList::new(vec![single])),
        },
    };

    apply(span, &callee, &arg_list)
}

/// Applies a value to an argument list. Functions are invoked; records
/// index by key and lists by position; anything else is a type error
/// carried as a value.
pub fn apply(span: Span, callee: &Value, args: &ListRef) -> EvalResult<Value> {
    match callee {
        Value::Function(function) => function.eval(args),
        Value::Record(record) => match args.item(0)? {
            Value::Text(key) => Ok(record.get(&key)?.unwrap_or(Value::Null)),
            error @ Value::Error(_) => Ok(error),
            other => Ok(Value::error(
                FsError::type_mismatch(format!(
                    "key-value collection index must be a string, not {}",
                    other.kind_name()
                ))
                .with_location(span),
            )),
        },
        Value::List(list) => match args.item(0)? {
            Value::Int(index) if index >= 0 => list.item(index as usize),
            Value::Long(index) if index >= 0 => list.item(index as usize),
            Value::Int(_) | Value::Long(_) => Ok(Value::Null),
            error @ Value::Error(_) => Ok(error),
            other => Ok(Value::error(
                FsError::type_mismatch(format!(
                    "list index must be an integer, not {}",
                    other.kind_name()
                ))
                .with_location(span),
            )),
        },
        Value::Error(_) => Ok(callee.clone()),
        other => Ok(Value::error(
            FsError::type_mismatch(format!(
                "a {} can not be applied as a function",
                other.kind_name()
            ))
            .with_location(span),
        )),
    }
}

fn eval_record(
    record: &Arc<RecordExpr>,
    env: &EnvRef,
    depth: &Arc<DepthCounter>,
) -> EvalResult<Value> {
    let scope = RecordScope::create(record.clone(), env.clone(), depth.clone());
    match record.eval_expr() {
        Some(designated) => {
            let scope: EnvRef = scope;
            eval(designated, &scope, depth)
        }
        None => Ok(Value::Record(scope)),
    }
}

fn eval_selector(
    source: &Expr,
    selector: &Arc<RecordExpr>,
    env: &EnvRef,
    depth: &Arc<DepthCounter>,
) -> EvalResult<Value> {
    match eval(source, env, depth)? {
        Value::Record(record) => apply_selector(selector, record, env, depth),
        Value::List(list) => {
            let mut projected = Vec::with_capacity(list.len());
            for index in 0..list.len() {
                projected.push(match list.item(index)? {
                    Value::Record(record) => apply_selector(selector, record, env, depth)?,
                    error @ Value::Error(_) => error,
                    _ => Value::Null,
                });
            }
            Ok(Value::list(projected))
        }
        error @ Value::Error(_) => Ok(error),
        // A selector over anything else selects nothing.
        _ => Ok(Value::Null),
    }
}

/// Evaluates the selector record in a scope that exposes the projected
/// record's keys first and the ambient environment after.
fn apply_selector(
    selector: &Arc<RecordExpr>,
    record: EnvRef,
    ambient: &EnvRef,
    depth: &Arc<DepthCounter>,
) -> EvalResult<Value> {
    let projection: EnvRef = Arc::new(LayeredEnv::new(record, ambient.clone()));
    let scope = RecordScope::create(selector.clone(), projection, depth.clone());
    match selector.eval_expr() {
        Some(designated) => {
            let scope: EnvRef = scope;
            eval(designated, &scope, depth)
        }
        None => Ok(Value::Record(scope)),
    }
}

fn eval_embedding(node: &EmbeddingExpr, span: Span, env: &EnvRef) -> EvalResult<Value> {
    let language = &node.language;
    match node.compiled() {
        Err(message) => Ok(Value::error(
            FsError::default_error(format!("[{language}] {message}")).with_location(span),
        )),
        Ok(compiled) => match node.binding().evaluate(compiled, env) {
            Ok(value) => Ok(value),
            // The narrow catch-and-convert boundary: a failing binding
            // becomes a value tagged with the span of the block in the
            // host text.
            Err(error) => Ok(Value::error(
                FsError::default_error(format!("[{language}] {error}")).with_location(span),
            )),
        },
    }
}

/// Lazy list over element expressions. Each access re-evaluates the
/// element against the owning environment; nothing is memoized.
///
/// The baseline records how deep the list literal itself sat, so an
/// element forced later from a shallow call still counts from at least
/// the list's own nesting level.
pub struct ExprList {
    items: Arc<Vec<Expr>>,
    env: EnvRef,
    depth: Arc<DepthCounter>,
    baseline: usize,
}

impl ExprList {
    pub fn new(items: Arc<Vec<Expr>>, env: EnvRef, depth: Arc<DepthCounter>) -> Self {
        let baseline = depth.current() + 1;
        Self {
            items,
            env,
            depth,
            baseline,
        }
    }
}

impl FsList for ExprList {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn item(&self, index: usize) -> EvalResult<Value> {
        let Some(expr) = self.items.get(index) else {
            return Ok(Value::Null);
        };
        let Some(_level) = self.depth.enter(self.baseline) else {
            return Ok(Value::error(
                FsError::depth_overflow(self.depth.max()).with_location(expr.span),
            ));
        };
        eval(expr, &self.env, &self.depth)
    }
}

/// A user-defined closure: captures the defining environment and the
/// active depth counter, and evaluates its body in a fresh parameter
/// scope on every call.
pub struct LambdaClosure {
    params: Arc<Vec<String>>,
    body: Arc<Expr>,
    env: EnvRef,
    depth: Arc<DepthCounter>,
}

impl Callable for LambdaClosure {
    fn symbol(&self) -> &str {
        "lambda"
    }

    fn max_args(&self) -> i32 {
        self.params.len() as i32
    }

    fn eval(&self, args: &ListRef) -> EvalResult<Value> {
        if args.len() < self.params.len() {
            return Ok(Value::error(FsError::parameter_count(format!(
                "function expects {} parameters, {} given",
                self.params.len(),
                args.len()
            ))));
        }
        let mut pairs = Vec::with_capacity(self.params.len());
        for (index, param) in self.params.iter().enumerate() {
            pairs.push((param.clone(), args.item(index)?));
        }
        let scope: EnvRef = Arc::new(MapEnv::new(Some(self.env.clone()), pairs));
        eval(&self.body, &scope, &self.depth)
    }

    fn param_name(&self, index: usize) -> Option<String> {
        self.params.get(index).cloned()
    }
}

/// A record's own scope: bindings evaluate lazily against this scope
/// itself, chained to the enclosing environment, which is what lets a
/// sibling reference a sibling declared later in the text.
pub struct RecordScope {
    record: Arc<RecordExpr>,
    parent: EnvRef,
    depth: Arc<DepthCounter>,
    this: Weak<RecordScope>,
}

impl RecordScope {
    pub fn create(
        record: Arc<RecordExpr>,
        parent: EnvRef,
        depth: Arc<DepthCounter>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            record,
            parent,
            depth,
            this: this.clone(),
        })
    }

    fn as_env(&self) -> EvalResult<EnvRef> {
        self.this
            .upgrade()
            .map(|scope| scope as EnvRef)
            .ok_or_else(|| EvalError::fault("record scope is no longer alive"))
    }
}

impl Environment for RecordScope {
    fn get(&self, key: &str) -> EvalResult<Option<Value>> {
        let lower = key.to_lowercase();
        match self.record.binding(&lower) {
            Some(binding) => {
                let scope = self.as_env()?;
                Ok(Some(eval(&binding.expr, &scope, &self.depth)?))
            }
            None => self.parent.get(key),
        }
    }

    fn is_defined(&self, key: &str) -> bool {
        self.record.defines(&key.to_lowercase()) || self.parent.is_defined(key)
    }

    fn parent(&self) -> Option<EnvRef> {
        Some(self.parent.clone())
    }

    fn entries(&self) -> EvalResult<Vec<(String, Value)>> {
        let scope = self.as_env()?;
        let mut entries = Vec::with_capacity(self.record.bindings().len());
        for binding in self.record.bindings() {
            let value = eval(&binding.expr, &scope, &self.depth)?;
            entries.push((binding.key.clone(), value));
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Binding;
    use crate::value::ERROR_EVALUATION_DEPTH_OVERFLOW;

    fn literal(value: Value) -> Expr {
        Expr::new(ExprKind::Literal(value), Span::new(0, 1))
    }

    fn reference(name: &str, mode: ReferenceMode) -> Expr {
        Expr::new(
            ExprKind::Reference {
                name: name.to_string(),
                name_lower: name.to_lowercase(),
                mode,
            },
            Span::new(0, name.len()),
        )
    }

    fn binding(key: &str, expr: Expr) -> Binding {
        Binding {
            key: key.to_string(),
            key_lower: key.to_lowercase(),
            expr,
        }
    }

    fn base_env(pairs: Vec<(&str, Value)>) -> EnvRef {
        Arc::new(MapEnv::new(
            None,
            pairs
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        ))
    }

    fn counter() -> Arc<DepthCounter> {
        Arc::new(DepthCounter::default())
    }

    #[test]
    fn unresolved_reference_is_absence_not_error() {
        let env = base_env(vec![]);
        let value = eval(&reference("missing", ReferenceMode::Standard), &env, &counter()).unwrap();
        assert_eq!(value, Value::Null);
    }

    #[test]
    fn record_bindings_see_siblings_declared_later() {
        let record = RecordExpr::new(
            vec![
                binding("a", reference("b", ReferenceMode::Standard)),
                binding("b", literal(Value::Int(2))),
            ],
            None,
        )
        .unwrap();
        let scope = RecordScope::create(Arc::new(record), base_env(vec![]), counter());
        assert_eq!(scope.get("a").unwrap(), Some(Value::Int(2)));
    }

    #[test]
    fn reference_modes_pick_different_scopes() {
        let outer = base_env(vec![("x", Value::Int(10))]);
        let record = RecordExpr::new(
            vec![binding("x", literal(Value::Int(1)))],
            None,
        )
        .unwrap();
        let scope: EnvRef = RecordScope::create(Arc::new(record), outer, counter());

        let standard = eval(&reference("x", ReferenceMode::Standard), &scope, &counter()).unwrap();
        assert_eq!(standard, Value::Int(1));

        let skipping =
            eval(&reference("x", ReferenceMode::SkipSiblings), &scope, &counter()).unwrap();
        assert_eq!(skipping, Value::Int(10));

        let preferring = eval(
            &reference("x", ReferenceMode::ParentsThenSiblings),
            &scope,
            &counter(),
        )
        .unwrap();
        assert_eq!(preferring, Value::Int(10));
    }

    #[test]
    fn parents_then_siblings_falls_back_to_the_sibling() {
        let record = RecordExpr::new(
            vec![binding("x", literal(Value::Int(1)))],
            None,
        )
        .unwrap();
        let scope: EnvRef = RecordScope::create(Arc::new(record), base_env(vec![]), counter());
        let value = eval(
            &reference("x", ReferenceMode::ParentsThenSiblings),
            &scope,
            &counter(),
        )
        .unwrap();
        assert_eq!(value, Value::Int(1));
    }

    #[test]
    fn self_recursive_binding_yields_depth_overflow_value() {
        let record = RecordExpr::new(
            vec![binding("a", reference("a", ReferenceMode::Standard))],
            None,
        )
        .unwrap();
        let depth = Arc::new(DepthCounter::new(32));
        let scope = RecordScope::create(Arc::new(record), base_env(vec![]), depth.clone());
        let Some(Value::Error(error)) = scope.get("a").unwrap() else {
            panic!("expected depth overflow error value");
        };
        assert_eq!(error.error_type, ERROR_EVALUATION_DEPTH_OVERFLOW);
        assert_eq!(depth.current(), 0, "guard must unwind cleanly");
    }

    #[test]
    fn applying_a_non_callable_is_a_type_error_value() {
        let args: ListRef = Arc::new(ArrayList::new(vec![Value::Int(1)]));
        let Value::Error(error) = apply(Span::new(0, 1), &Value::Int(5), &args).unwrap() else {
            panic!("expected error value");
        };
        assert!(error.message.contains("can not be applied"));
    }

    #[test]
    fn records_and_lists_apply_by_key_and_index() {
        let record = Value::record(vec![("name".to_string(), Value::Text("keva".into()))]);
        let by_key: ListRef = Arc::new(ArrayList::new(vec![Value::Text("NAME".into())]));
        assert_eq!(
            apply(Span::new(0, 1), &record, &by_key).unwrap(),
            Value::Text("keva".into())
        );

        let list = Value::list(vec![Value::Int(10), Value::Int(20)]);
        let by_index: ListRef = Arc::new(ArrayList::new(vec![Value::Int(1)]));
        assert_eq!(apply(Span::new(0, 1), &list, &by_index).unwrap(), Value::Int(20));
    }

    #[test]
    fn unparsed_nodes_parse_once_and_cache_failures() {
        use crate::ast::UnparsedExpr;
        use crate::ops::default_env;

        let env = default_env();
        let node = Arc::new(UnparsedExpr::new("1 + 2"));
        let expr = Expr::new(ExprKind::Unparsed(node.clone()), Span::new(0, 5));
        assert!(!node.is_settled());
        assert_eq!(eval(&expr, &env, &counter()).unwrap(), Value::Int(3));
        assert!(node.is_settled());
        assert_eq!(eval(&expr, &env, &counter()).unwrap(), Value::Int(3));

        let broken = Arc::new(UnparsedExpr::new("{a:}"));
        let expr = Expr::new(ExprKind::Unparsed(broken.clone()), Span::new(0, 4));
        let first = eval(&expr, &env, &counter()).unwrap_err();
        let second = eval(&expr, &env, &counter()).unwrap_err();
        assert_eq!(first, second, "the cached failure re-raises unchanged");
        assert!(broken.is_settled());
    }

    #[test]
    fn concurrent_first_evaluations_parse_once() {
        use crate::ast::UnparsedExpr;
        use crate::ops::default_env;

        let node = Arc::new(UnparsedExpr::new("2 * 21"));
        let expr = Arc::new(Expr::new(
            ExprKind::Unparsed(node.clone()),
            Span::new(0, 6),
        ));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let expr = expr.clone();
            handles.push(std::thread::spawn(move || {
                let env = default_env();
                eval(&expr, &env, &Arc::new(DepthCounter::default())).unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Value::Int(42));
        }
        assert!(node.is_settled());
    }

    #[test]
    fn lazy_list_elements_reevaluate_against_the_owning_env() {
        let env = base_env(vec![("x", Value::Int(7))]);
        let items = Arc::new(vec![reference("x", ReferenceMode::Standard)]);
        let list = ExprList::new(items, env, counter());
        assert_eq!(list.item(0).unwrap(), Value::Int(7));
        assert_eq!(list.item(0).unwrap(), Value::Int(7));
        assert_eq!(list.item(9).unwrap(), Value::Null);
    }
}
