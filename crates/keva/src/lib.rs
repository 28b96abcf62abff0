//! keva — an embeddable key-value expression language.
//!
//! Source text parses into a span-tagged syntax tree plus positional
//! diagnostics, then into a closed AST that evaluates against layered
//! key-value environments under a recursion-depth guard. Parsing never
//! fails; the `evaluate*` entry points raise a structured error when a
//! caller demands a parsed result from broken text. Evaluation yields a
//! typed value, and language-level failures travel inside it as
//! ordinary error values.
//!
//! ```
//! let value = keva::evaluate("{a: b + 1, b: 2, return a * 10}").unwrap();
//! assert_eq!(value, keva::Value::Int(30));
//! ```
//!
//! Hosts expose their own variables by layering them over the default
//! provider (see [`host_env`]), implement [`Callable`] to add
//! functions, and implement [`Environment`] to bridge native data. The
//! crate emits `tracing` events and installs no subscriber of its own.

pub mod ast;
pub mod cst;
pub mod depth;
pub mod diagnostics;
pub mod embedding;
pub mod env;
pub mod error;
pub mod eval;
pub mod format;
pub mod func;
pub mod list;
pub mod ops;
pub mod parser;
pub mod syntax;
pub mod value;

use std::sync::Arc;

pub use ast::{Binding, EmbeddingExpr, Expr, ExprKind, RecordExpr, ReferenceMode, UnparsedExpr};
pub use cst::{
    color_nodes, fingerprint, fold_regions, Analysis, AnalysisCache, ParseNode, ParseNodeType,
};
pub use depth::{DepthCounter, DEFAULT_MAX_DEPTH};
pub use diagnostics::{render_diagnostics, Span, SyntaxErrorData};
pub use embedding::{BindingRegistry, Compiled, LanguageBinding};
pub use env::{merge, EnvRef, Environment, LayeredEnv, MapEnv};
pub use error::{EvalError, EvalResult, SyntaxFailure};
pub use eval::{apply, eval, ExprList, LambdaClosure, RecordScope};
pub use format::{display, from_json, json_text, literal, to_json};
pub use func::{arg, CallStyle, Callable, FuncRef};
pub use list::{collect_items, ArrayList, FsList, ListRef};
pub use ops::default_env;
pub use parser::{parse, parse_with, ParseOptions, Parsed};
pub use value::{
    common_numeric, compare_values, values_equal, FsError, Value, ERROR_DEFAULT,
    ERROR_EVALUATION_DEPTH_OVERFLOW, ERROR_INVALID_PARAMETER, ERROR_PARAMETER_COUNT_MISMATCH,
    ERROR_TYPE_MISMATCH,
};

/// Host variables layered over the default binding provider. The
/// resulting chain is what most embeddings hand to [`parse`] and the
/// `evaluate*` functions.
pub fn host_env(pairs: Vec<(String, Value)>) -> EnvRef {
    Arc::new(MapEnv::new(Some(default_env()), pairs))
}

/// Parses and evaluates `src` against the default environment.
pub fn evaluate(src: &str) -> EvalResult<Value> {
    evaluate_with(&default_env(), src)
}

/// Parses and evaluates `src` against `env` (which also serves as the
/// parse-time binding provider).
pub fn evaluate_with(env: &EnvRef, src: &str) -> EvalResult<Value> {
    evaluate_with_options(env, src, &ParseOptions::default(), DEFAULT_MAX_DEPTH)
}

/// Full-control entry point: explicit parse options and depth limit.
/// Unparseable text raises [`EvalError::Syntax`] here — callers wanting
/// the diagnostics list instead use [`parse`].
pub fn evaluate_with_options(
    env: &EnvRef,
    src: &str,
    options: &ParseOptions,
    max_depth: usize,
) -> EvalResult<Value> {
    let parsed = parse_with(env, src, options);
    let Some(expr) = parsed.expr else {
        return Err(EvalError::Syntax(SyntaxFailure::new(src, parsed.errors)));
    };
    let depth = Arc::new(DepthCounter::new(max_depth));
    tracing::trace!(source_len = src.len(), max_depth, "evaluating expression");
    eval(&expr, env, &depth)
}
