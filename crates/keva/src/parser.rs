//! Scannerless recursive-descent parser.
//!
//! `parse` never fails: it returns a best-effort AST, the descriptive
//! syntax tree, and a list of positional diagnostics. Operators and
//! keyword forms bind at parse time by looking their symbol up in the
//! provider and embedding the resolved function as a literal callee.
//!
//! Error discipline: a construct only contributes diagnostics once it
//! has anchored itself (consumed a token that makes the construct
//! unambiguous). Failed speculative attempts stay silent, and a
//! construct whose child already reported does not stack its own
//! diagnostic on top — the deepest failing span wins, one diagnostic
//! per distinct failure site.

mod collections;
mod expressions;
mod helpers;
mod literals;

use std::sync::Arc;

use crate::ast::{Expr, ExprKind};
use crate::cst::{ParseNode, ParseNodeType};
use crate::diagnostics::{Span, SyntaxErrorData};
use crate::embedding::BindingRegistry;
use crate::env::EnvRef;
use crate::value::Value;

#[derive(Default, Clone)]
pub struct ParseOptions {
    /// Language bindings available to embedded foreign-code blocks.
    pub bindings: BindingRegistry,
}

/// Outcome of one parse: best-effort AST, syntax tree, diagnostics.
pub struct Parsed {
    pub expr: Option<Arc<Expr>>,
    pub root: Option<ParseNode>,
    pub errors: Vec<SyntaxErrorData>,
}

pub fn parse(env: &EnvRef, src: &str) -> Parsed {
    parse_with(env, src, &ParseOptions::default())
}

pub fn parse_with(env: &EnvRef, src: &str, options: &ParseOptions) -> Parsed {
    let ctx = Ctx {
        src,
        env,
        bindings: &options.bindings,
    };
    let parsed = ctx.root_expression();
    tracing::debug!(
        source_len = src.len(),
        diagnostics = parsed.errors.len(),
        ok = parsed.expr.is_some(),
        "parse finished"
    );
    parsed
}

/// Immutable parse context; positions travel through return values.
pub(crate) struct Ctx<'a> {
    pub(crate) src: &'a str,
    pub(crate) env: &'a EnvRef,
    pub(crate) bindings: &'a BindingRegistry,
}

/// Result of one construct attempt. `next > index` means progress; the
/// expression may still be absent when the construct failed after
/// anchoring (errors explain why).
pub(crate) struct BlockRes {
    pub(crate) next: usize,
    pub(crate) expr: Option<Expr>,
    pub(crate) errors: Vec<SyntaxErrorData>,
}

impl BlockRes {
    pub(crate) fn no_advance(index: usize) -> Self {
        Self {
            next: index,
            expr: None,
            errors: Vec::new(),
        }
    }

    pub(crate) fn failed(index: usize, errors: Vec<SyntaxErrorData>) -> Self {
        Self {
            next: index,
            expr: None,
            errors,
        }
    }

    pub(crate) fn ok(next: usize, expr: Expr) -> Self {
        Self {
            next,
            expr: Some(expr),
            errors: Vec::new(),
        }
    }

    pub(crate) fn ok_with(next: usize, expr: Expr, errors: Vec<SyntaxErrorData>) -> Self {
        Self {
            next,
            expr: Some(expr),
            errors,
        }
    }

    pub(crate) fn progressed(&self, index: usize) -> bool {
        self.next > index
    }
}

impl<'a> Ctx<'a> {
    /// Resolves a symbol against the provider for parse-time binding.
    pub(crate) fn lookup(&self, symbol: &str) -> Option<Value> {
        self.env
            .get(&symbol.to_lowercase())
            .ok()
            .flatten()
    }

    /// A literal block holding the function bound to `symbol`, or a
    /// null literal when the provider does not define it (applying
    /// null reports the type error at evaluation time).
    pub(crate) fn bound_function(&self, symbol: &str, span: Span) -> Expr {
        let value = self.lookup(symbol).unwrap_or(Value::Null);
        Expr::new(ExprKind::Literal(value), span)
    }

    fn root_expression(&self) -> Parsed {
        let mut nodes = Vec::new();
        let mut errors = Vec::new();

        if let Some(start) = helpers::unterminated_block_comment(self.src) {
            errors.push(SyntaxErrorData::new(
                start,
                self.src.len() - start,
                "unterminated comment",
            ));
        }

        // A whole document may be a naked key-value collection
        // (`a: 1, b: 2`) before it is a plain expression.
        let kvc = self.kvc_expression(&mut nodes, true, 0);
        let body = if kvc.progressed(0) || !kvc.errors.is_empty() {
            errors.extend(kvc.errors);
            BlockRes {
                next: kvc.next,
                expr: kvc.expr,
                errors: Vec::new(),
            }
        } else {
            let expr = self.expression(&mut nodes, None, 0);
            errors.extend(expr.errors);
            BlockRes {
                next: expr.next,
                expr: expr.expr,
                errors: Vec::new(),
            }
        };

        let mut last = body.next;
        if body.expr.is_some() {
            last = self.skip_space(&mut nodes, last);
            if last < self.src.len() && errors.is_empty() {
                errors.push(SyntaxErrorData::new(
                    last,
                    self.src.len() - last,
                    "end of expression expected",
                ));
            }
        }

        let expr = if errors.is_empty() { body.expr } else { None };
        match expr {
            Some(mut expr) => {
                if expr.span.len == 0 {
                    expr.span = Span::new(0, last);
                }
                let root = ParseNode::new(ParseNodeType::RootExpression, 0, last, nodes);
                Parsed {
                    expr: Some(Arc::new(expr)),
                    root: Some(root),
                    errors,
                }
            }
            None => {
                if errors.is_empty() {
                    let first = self
                        .src
                        .char_indices()
                        .find(|(_, ch)| !ch.is_whitespace())
                        .map(|(idx, _)| idx)
                        .unwrap_or(0);
                    errors.push(SyntaxErrorData::new(first, 1, "expression expected"));
                }
                Parsed {
                    expr: None,
                    root: None,
                    errors,
                }
            }
        }
    }
}
