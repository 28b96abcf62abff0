//! The abstract syntax tree.
//!
//! A closed set of node kinds; evaluation contracts live in
//! [`crate::eval`]. Nodes are immutable once built and shareable across
//! threads; subtrees that lazy values must retain (record bodies, list
//! elements, lambda bodies) sit behind `Arc`.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::diagnostics::Span;
use crate::embedding::{Compiled, LanguageBinding};
use crate::env::EnvRef;
use crate::error::{EvalError, EvalResult, SyntaxFailure};
use crate::value::Value;

/// How a reference resolves against the environment chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceMode {
    /// Innermost scope first.
    Standard,
    /// Start at the enclosing parent's scope, ignoring current-record
    /// siblings. Used for the `{a}` shorthand so the binding cannot
    /// capture itself.
    SkipSiblings,
    /// Prefer an ancestor binding over a same-named sibling when the
    /// ancestor defines it. Assigned when a reference is the left-hand
    /// binder of its own value (`{a: a + 1}`).
    ParentsThenSiblings,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(Value),
    Reference {
        name: String,
        name_lower: String,
        mode: ReferenceMode,
    },
    Call {
        target: Arc<Expr>,
        args: Arc<Expr>,
    },
    Lambda {
        params: Arc<Vec<String>>,
        body: Arc<Expr>,
    },
    List(Arc<Vec<Expr>>),
    Record(Arc<RecordExpr>),
    Selector {
        source: Arc<Expr>,
        selector: Arc<RecordExpr>,
    },
    Embedding(Arc<EmbeddingExpr>),
    Null,
    Unparsed(Arc<UnparsedExpr>),
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub key: String,
    pub key_lower: String,
    pub expr: Expr,
}

/// A record body: ordered bindings plus an optional designated `return`
/// expression ("eval mode").
#[derive(Debug)]
pub struct RecordExpr {
    bindings: Vec<Binding>,
    index: HashMap<String, usize>,
    eval_expr: Option<Expr>,
}

impl RecordExpr {
    /// Builds the body, rejecting case-insensitive duplicate keys. This
    /// is a bind-time failure, not an evaluation-time one.
    pub fn new(bindings: Vec<Binding>, eval_expr: Option<Expr>) -> Result<Self, String> {
        let mut index = HashMap::with_capacity(bindings.len());
        for (slot, binding) in bindings.iter().enumerate() {
            if index.insert(binding.key_lower.clone(), slot).is_some() {
                return Err(format!("key '{}' is duplicated", binding.key_lower));
            }
        }
        Ok(Self {
            bindings,
            index,
            eval_expr,
        })
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn binding(&self, key_lower: &str) -> Option<&Binding> {
        self.index.get(key_lower).map(|&slot| &self.bindings[slot])
    }

    pub fn defines(&self, key_lower: &str) -> bool {
        self.index.contains_key(key_lower)
    }

    pub fn eval_expr(&self) -> Option<&Expr> {
        self.eval_expr.as_ref()
    }

    pub fn is_eval_mode(&self) -> bool {
        self.eval_expr.is_some()
    }
}

/// A raw nested source blob, parsed on first evaluation.
///
/// The cell is the AST's only internal mutable state: the first
/// evaluation computes under the cell's lock while later evaluations
/// read lock-free. Parsed and Failed are both terminal — a cached
/// failure re-raises without re-parsing.
#[derive(Debug)]
pub struct UnparsedExpr {
    pub source: String,
    cell: OnceLock<Result<Arc<Expr>, SyntaxFailure>>,
}

impl UnparsedExpr {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            cell: OnceLock::new(),
        }
    }

    pub fn parsed(&self, env: &EnvRef) -> EvalResult<Arc<Expr>> {
        let outcome = self.cell.get_or_init(|| {
            let parsed = crate::parser::parse(env, &self.source);
            match parsed.expr {
                Some(expr) => Ok(expr),
                None => Err(SyntaxFailure::new(&self.source, parsed.errors)),
            }
        });
        match outcome {
            Ok(expr) => Ok(expr.clone()),
            Err(failure) => Err(EvalError::Syntax(failure.clone())),
        }
    }

    #[cfg(test)]
    pub(crate) fn is_settled(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// A foreign-code block. Compilation happens at construction so a
/// compile failure is already known by the time the node evaluates.
pub struct EmbeddingExpr {
    pub language: String,
    pub code: String,
    binding: Arc<dyn LanguageBinding>,
    compiled: Result<Compiled, String>,
}

impl EmbeddingExpr {
    pub fn new(language: String, code: String, binding: Arc<dyn LanguageBinding>) -> Self {
        let compiled = binding.compile(&code);
        Self {
            language,
            code,
            binding,
            compiled,
        }
    }

    pub fn compiled(&self) -> &Result<Compiled, String> {
        &self.compiled
    }

    pub fn binding(&self) -> &Arc<dyn LanguageBinding> {
        &self.binding
    }
}

impl std::fmt::Debug for EmbeddingExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingExpr")
            .field("language", &self.language)
            .field("compiled", &self.compiled.is_ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(key: &str, expr: Expr) -> Binding {
        Binding {
            key: key.to_string(),
            key_lower: key.to_lowercase(),
            expr,
        }
    }

    fn literal(value: i32) -> Expr {
        Expr::new(ExprKind::Literal(Value::Int(value)), Span::new(0, 1))
    }

    #[test]
    fn record_rejects_case_insensitive_duplicates() {
        let result = RecordExpr::new(
            vec![binding("A", literal(1)), binding("a", literal(2))],
            None,
        );
        let message = result.err().expect("duplicate keys must fail at bind time");
        assert!(message.contains("duplicated"));
    }

    #[test]
    fn record_indexes_by_lowercase_key() {
        let record = RecordExpr::new(
            vec![binding("Alpha", literal(1)), binding("beta", literal(2))],
            None,
        )
        .unwrap();
        assert!(record.defines("alpha"));
        assert!(record.binding("alpha").is_some());
        assert!(record.binding("Alpha").is_none(), "index is canonical-lower");
    }
}
