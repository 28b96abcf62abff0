//! Lists, key-value collections, and lambdas.
//!
//! Recovery policy: once a construct is anchored, a missing value gets
//! one diagnostic at the most specific failing token plus a null
//! placeholder so parsing continues into sibling and nested structures.
//! The root withholds the AST whenever diagnostics exist.

use std::sync::Arc;

use super::{BlockRes, Ctx};
use crate::ast::{Binding, Expr, ExprKind, RecordExpr, ReferenceMode};
use crate::cst::{ParseNode, ParseNodeType};
use crate::diagnostics::{Span, SyntaxErrorData};

pub(crate) struct KvcItem {
    /// `None` marks the designated `return` expression.
    key: Option<(String, String)>,
    expr: Expr,
}

pub(crate) struct ItemRes {
    next: usize,
    item: Option<KvcItem>,
    errors: Vec<SyntaxErrorData>,
}

impl ItemRes {
    fn no_advance(index: usize) -> Self {
        Self {
            next: index,
            item: None,
            errors: Vec::new(),
        }
    }

    fn failed(index: usize, errors: Vec<SyntaxErrorData>) -> Self {
        Self {
            next: index,
            item: None,
            errors,
        }
    }

    fn progressed(&self, index: usize) -> bool {
        self.next > index
    }
}

fn placeholder(at: usize) -> Expr {
    Expr::new(ExprKind::Null, Span::new(at, 0))
}

impl<'a> Ctx<'a> {
    pub(crate) fn list_expression(
        &self,
        nodes: &mut Vec<ParseNode>,
        ref_key: Option<&str>,
        index: usize,
    ) -> BlockRes {
        let mut buffer = Vec::new();
        let after_open = self.token(&mut buffer, ParseNodeType::OpenBrace, index, &["["]);
        if after_open == index {
            return BlockRes::no_advance(index);
        }
        let open_pos = buffer.last().map(|node| node.pos).unwrap_or(index);

        let mut errors = Vec::new();
        let mut items = Vec::new();
        let mut i = after_open;

        let first = self.expression(&mut buffer, ref_key, i);
        errors.extend(first.errors);
        if let Some(expr) = first.expr {
            items.push(expr);
            i = first.next;
            loop {
                let after_comma = self.token(&mut buffer, ParseNodeType::ListSeparator, i, &[","]);
                if after_comma == i {
                    break;
                }
                let next_item = self.expression(&mut buffer, ref_key, after_comma);
                let had_child_errors = !next_item.errors.is_empty();
                errors.extend(next_item.errors);
                match next_item.expr {
                    Some(expr) => items.push(expr),
                    None => {
                        if !had_child_errors {
                            errors.push(SyntaxErrorData::new(
                                after_comma.saturating_sub(1),
                                1,
                                "list item expected after ','",
                            ));
                        }
                        items.push(placeholder(after_comma));
                    }
                }
                i = next_item.next.max(after_comma);
            }
        } else if !errors.is_empty() {
            return BlockRes::failed(index, errors);
        }

        i = self.skip_space(&mut buffer, i);
        let after_close = self.token(&mut buffer, ParseNodeType::CloseBrace, i, &["]"]);
        if after_close == i {
            if !items.is_empty() && !self.at_end(i) {
                errors.push(SyntaxErrorData::new(
                    i,
                    1,
                    "list separator (',') expected between items",
                ));
            } else {
                errors.push(SyntaxErrorData::new(i, 1, "']' expected"));
            }
            return BlockRes::failed(index, errors);
        }
        i = after_close;

        let span = Span::new(open_pos, i - open_pos);
        nodes.push(ParseNode::new(ParseNodeType::List, open_pos, i - open_pos, buffer));
        BlockRes::ok_with(i, Expr::new(ExprKind::List(Arc::new(items)), span), errors)
    }

    /// A key-value collection. In naked mode (whole-document records)
    /// the braces are absent and an empty body means "not a record".
    pub(crate) fn kvc_expression(
        &self,
        nodes: &mut Vec<ParseNode>,
        naked: bool,
        index: usize,
    ) -> BlockRes {
        let mut buffer = Vec::new();
        let mut i = index;
        let mut open_pos = index;
        if !naked {
            let after_open = self.token(&mut buffer, ParseNodeType::OpenBrace, index, &["{"]);
            if after_open == index {
                return BlockRes::no_advance(index);
            }
            open_pos = buffer.last().map(|node| node.pos).unwrap_or(index);
            i = after_open;
        }

        let mut errors = Vec::new();
        let mut bindings: Vec<Binding> = Vec::new();
        let mut return_expr: Option<Expr> = None;

        loop {
            let item = self.kvc_item(&mut buffer, naked, i);
            if !item.progressed(i) {
                if !item.errors.is_empty() {
                    errors.extend(item.errors);
                    return BlockRes::failed(index, errors);
                }
                break;
            }
            errors.extend(item.errors);
            if let Some(item_value) = item.item {
                match item_value.key {
                    Some((key, key_lower)) => bindings.push(Binding {
                        key,
                        key_lower,
                        expr: item_value.expr,
                    }),
                    None => {
                        if return_expr.is_some() {
                            errors.push(SyntaxErrorData::new(
                                i,
                                item.next - i,
                                "duplicate return statement",
                            ));
                        } else {
                            return_expr = Some(item_value.expr);
                        }
                    }
                }
            }
            i = item.next;

            // The separator between entries is tolerated either way:
            // consume one when present, continue silently when absent.
            i = self.token(&mut buffer, ParseNodeType::ListSeparator, i, &[",", ";"]);
        }

        i = self.skip_space(&mut buffer, i);
        if !naked {
            let after_close = self.token(&mut buffer, ParseNodeType::CloseBrace, i, &["}"]);
            if after_close == i {
                errors.push(SyntaxErrorData::new(i, 1, "'}' expected"));
                return BlockRes::failed(index, errors);
            }
            i = after_close;
        } else if bindings.is_empty() && return_expr.is_none() {
            return BlockRes::no_advance(index);
        }

        let span = Span::new(open_pos, i - open_pos);
        let record = match RecordExpr::new(bindings, return_expr) {
            Ok(record) => record,
            Err(message) => {
                errors.push(SyntaxErrorData::new(open_pos, i - open_pos, message));
                return BlockRes::failed(index, errors);
            }
        };
        nodes.push(ParseNode::new(
            ParseNodeType::KeyValueCollection,
            open_pos,
            i - open_pos,
            buffer,
        ));
        BlockRes::ok_with(i, Expr::new(ExprKind::Record(Arc::new(record)), span), errors)
    }

    fn kvc_item(&self, nodes: &mut Vec<ParseNode>, naked: bool, index: usize) -> ItemRes {
        let pair = self.key_value_pair(nodes, index);
        if pair.progressed(index) || !pair.errors.is_empty() {
            return pair;
        }

        let ret = self.return_definition(nodes, index);
        if ret.progressed(index) || !ret.errors.is_empty() {
            return ret;
        }

        if naked {
            return ItemRes::no_advance(index);
        }

        // Shorthand entry: `{a}` binds `a` to the enclosing scope's
        // `a`, skipping the record's own siblings.
        let mut buffer = Vec::new();
        if let Some(iden) = self.identifier(&mut buffer, index) {
            nodes.extend(buffer);
            let expr = Expr::new(
                ExprKind::Reference {
                    name: iden.name.clone(),
                    name_lower: iden.lower.clone(),
                    mode: ReferenceMode::SkipSiblings,
                },
                Span::new(iden.start, iden.len),
            );
            return ItemRes {
                next: iden.next,
                item: Some(KvcItem {
                    key: Some((iden.name, iden.lower)),
                    expr,
                }),
                errors: Vec::new(),
            };
        }

        let mut string_errors = Vec::new();
        let mut string_buffer = Vec::new();
        if let Some(string) = self.simple_string(&mut string_buffer, index, &mut string_errors) {
            nodes.extend(string_buffer);
            let lower = string.value.to_lowercase();
            let expr = Expr::new(
                ExprKind::Reference {
                    name: string.value.clone(),
                    name_lower: lower.clone(),
                    mode: ReferenceMode::SkipSiblings,
                },
                Span::new(string.start, string.len),
            );
            return ItemRes {
                next: string.next,
                item: Some(KvcItem {
                    key: Some((string.value, lower)),
                    expr,
                }),
                errors: Vec::new(),
            };
        }

        ItemRes::no_advance(index)
    }

    fn key_value_pair(&self, nodes: &mut Vec<ParseNode>, index: usize) -> ItemRes {
        let mut buffer = Vec::new();

        let mut string_errors = Vec::new();
        let key = if let Some(string) = self.simple_string(&mut buffer, index, &mut string_errors) {
            Some((string.value.clone(), string.start, string.len, string.next))
        } else if !string_errors.is_empty() {
            return ItemRes::failed(index, string_errors);
        } else {
            self.identifier(&mut buffer, index)
                .map(|iden| (iden.name, iden.start, iden.len, iden.next))
        };
        let Some((name, key_start, key_len, after_key)) = key else {
            return ItemRes::no_advance(index);
        };

        let after_colon = self.token(&mut buffer, ParseNodeType::Colon, after_key, &[":"]);
        if after_colon == after_key {
            return ItemRes::no_advance(index);
        }

        // The key is now known to be a key, not an identifier.
        for node in buffer.iter_mut() {
            if node.pos == key_start
                && node.length == key_len
                && matches!(
                    node.node_type,
                    ParseNodeType::Identifier | ParseNodeType::LiteralString
                )
            {
                node.node_type = ParseNodeType::Key;
            }
        }

        let key_lower = name.to_lowercase();
        let mut errors = Vec::new();
        let value = self.expression(&mut buffer, Some(&key_lower), after_colon);
        let had_child_errors = !value.errors.is_empty();
        errors.extend(value.errors);
        let (value_expr, next) = match value.expr {
            Some(expr) => (expr, value.next),
            None => {
                // One diagnostic per failure site: when the value's own
                // parse already reported, do not stack the property
                // message on top of it.
                if !had_child_errors {
                    errors.push(SyntaxErrorData::new(
                        key_start,
                        key_len,
                        format!("value expression expected for property '{name}'"),
                    ));
                }
                (placeholder(after_colon), value.next.max(after_colon))
            }
        };

        let span_end = next.max(after_colon);
        nodes.push(ParseNode::new(
            ParseNodeType::KeyValuePair,
            key_start,
            span_end - key_start,
            buffer,
        ));
        ItemRes {
            next: span_end,
            item: Some(KvcItem {
                key: Some((name, key_lower)),
                expr: value_expr,
            }),
            errors,
        }
    }

    fn return_definition(&self, nodes: &mut Vec<ParseNode>, index: usize) -> ItemRes {
        let mut buffer = Vec::new();
        let after_kw = self.keyword(&mut buffer, index, "return");
        if after_kw == index {
            return ItemRes::no_advance(index);
        }
        let kw_pos = buffer.last().map(|node| node.pos).unwrap_or(index);

        let mut errors = Vec::new();
        let value = self.expression(&mut buffer, None, after_kw);
        let had_child_errors = !value.errors.is_empty();
        errors.extend(value.errors);
        let (expr, next) = match value.expr {
            Some(expr) => (expr, value.next),
            None => {
                if !had_child_errors {
                    errors.push(SyntaxErrorData::new(
                        kw_pos,
                        after_kw - kw_pos,
                        "value expression expected after 'return'",
                    ));
                }
                (placeholder(after_kw), value.next.max(after_kw))
            }
        };

        nodes.extend(buffer);
        ItemRes {
            next,
            item: Some(KvcItem { key: None, expr }),
            errors,
        }
    }

    /// `x => body` or `(a, b) => body`. No arrow means this is not a
    /// lambda at all; a missing body is diagnosed at the arrow.
    pub(crate) fn lambda_expression(&self, nodes: &mut Vec<ParseNode>, index: usize) -> BlockRes {
        let mut buffer = Vec::new();
        let params = match self.identifier_list(&mut buffer, index) {
            Some((params, next)) => Some((params, next)),
            None => {
                let mut single = Vec::new();
                self.identifier(&mut single, index).map(|iden| {
                    buffer.extend(single);
                    (vec![iden.name], iden.next)
                })
            }
        };
        let Some((params, after_params)) = params else {
            return BlockRes::no_advance(index);
        };

        let after_arrow = self.token(&mut buffer, ParseNodeType::LambdaArrow, after_params, &["=>"]);
        if after_arrow == after_params {
            return BlockRes::no_advance(index);
        }
        let arrow_pos = buffer.last().map(|node| node.pos).unwrap_or(after_params);
        let arrow_len = after_arrow - arrow_pos;

        let mut errors = Vec::new();
        let body = self.expression(&mut buffer, None, after_arrow);
        let had_child_errors = !body.errors.is_empty();
        errors.extend(body.errors);
        let (body_expr, next) = match body.expr {
            Some(expr) => (expr, body.next),
            None => {
                if !had_child_errors {
                    errors.push(SyntaxErrorData::new(
                        arrow_pos,
                        arrow_len,
                        "lambda body expected after '=>'",
                    ));
                }
                (placeholder(after_arrow), body.next.max(after_arrow))
            }
        };

        let start = buffer.first().map(|node| node.pos).unwrap_or(index);
        let span = Span::new(start, next - start);
        nodes.push(ParseNode::new(
            ParseNodeType::LambdaExpression,
            start,
            next - start,
            buffer,
        ));
        BlockRes::ok_with(
            next,
            Expr::new(
                ExprKind::Lambda {
                    params: Arc::new(params),
                    body: Arc::new(body_expr),
                },
                span,
            ),
            errors,
        )
    }

    fn identifier_list(
        &self,
        nodes: &mut Vec<ParseNode>,
        index: usize,
    ) -> Option<(Vec<String>, usize)> {
        let mut buffer = Vec::new();
        let after_open = self.token(&mut buffer, ParseNodeType::OpenBrace, index, &["("]);
        if after_open == index {
            return None;
        }
        let open_pos = buffer.last().map(|node| node.pos).unwrap_or(index);

        let mut params = Vec::new();
        let mut i = after_open;
        if let Some(first) = self.identifier(&mut buffer, i) {
            params.push(first.name);
            i = first.next;
            loop {
                let after_comma = self.token(&mut buffer, ParseNodeType::ListSeparator, i, &[","]);
                if after_comma == i {
                    break;
                }
                let next_param = self.identifier(&mut buffer, after_comma)?;
                params.push(next_param.name);
                i = next_param.next;
            }
        }

        let after_close = self.token(&mut buffer, ParseNodeType::CloseBrace, i, &[")"]);
        if after_close == i {
            return None;
        }
        i = after_close;

        nodes.push(ParseNode::new(
            ParseNodeType::IdentifierList,
            open_pos,
            i - open_pos,
            buffer,
        ));
        Some((params, i))
    }
}
