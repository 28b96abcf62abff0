//! Expression-level parsing: operator levels, general infix calls,
//! call/member/selector chains, and the unit alternatives.

use std::sync::Arc;

use super::{BlockRes, Ctx};
use crate::ast::{Expr, ExprKind, ReferenceMode};
use crate::cst::{ParseNode, ParseNodeType};
use crate::diagnostics::{Span, SyntaxErrorData};
use crate::func::CallStyle;
use crate::syntax;
use crate::value::Value;

struct OpRes {
    next: usize,
    symbol: &'static str,
    start: usize,
    len: usize,
}

impl<'a> Ctx<'a> {
    pub(crate) fn expression(
        &self,
        nodes: &mut Vec<ParseNode>,
        ref_key: Option<&str>,
        index: usize,
    ) -> BlockRes {
        let mut children = Vec::new();
        let top = syntax::OPERATOR_LEVELS.len() - 1;
        let result = self.infix_level(&mut children, ref_key, top, index);
        if result.progressed(index) {
            if children
                .iter()
                .any(|node| node.node_type == ParseNodeType::Operator)
            {
                nodes.push(ParseNode::new(
                    ParseNodeType::InfixExpression,
                    index,
                    result.next - index,
                    children,
                ));
            } else {
                nodes.extend(children);
            }
        }
        result
    }

    fn infix_level(
        &self,
        nodes: &mut Vec<ParseNode>,
        ref_key: Option<&str>,
        level: usize,
        index: usize,
    ) -> BlockRes {
        let operand = |nodes: &mut Vec<ParseNode>, at: usize| {
            if level == 0 {
                self.infix_function_call(nodes, ref_key, at)
            } else {
                self.infix_level(nodes, ref_key, level - 1, at)
            }
        };

        let first = operand(nodes, index);
        if !first.progressed(index) || first.expr.is_none() {
            return BlockRes::failed(index, first.errors);
        }
        let mut errors = first.errors;
        let mut current = first.expr.unwrap_or_else(|| unreachable!());
        let mut i = first.next;

        let candidates = syntax::OPERATOR_LEVELS[level];
        while let Some(first_op) = self.operator_token(nodes, candidates, i) {
            let mut op = first_op;
            i = op.next;
            let mut operands = vec![current];
            loop {
                let next_operand = operand(nodes, i);
                errors.extend(next_operand.errors);
                let Some(expr) = next_operand.expr else {
                    // Dangling operator.
                    errors.push(SyntaxErrorData::new(
                        op.start,
                        op.len,
                        format!("operand expected after '{}'", op.symbol),
                    ));
                    return BlockRes::failed(index, errors);
                };
                operands.push(expr);
                i = next_operand.next;

                // Collapse `a + b + c` into one n-ary call; a different
                // same-level operator folds what came before and starts
                // a new left-associated group.
                match self.operator_token(nodes, candidates, i) {
                    Some(repeat) if repeat.symbol == op.symbol => {
                        i = repeat.next;
                    }
                    Some(other) => {
                        let span = span_over(&operands);
                        let target =
                            self.bound_function(op.symbol, Span::new(op.start, op.len));
                        let folded = call_over(target, operands, span);
                        operands = vec![folded];
                        i = other.next;
                        op = other;
                    }
                    None => break,
                }
            }
            let span = span_over(&operands);
            let target = self.bound_function(op.symbol, Span::new(op.start, op.len));
            current = call_over(target, operands, span);
        }

        BlockRes::ok_with(i, current, errors)
    }

    fn operator_token(
        &self,
        nodes: &mut Vec<ParseNode>,
        candidates: &[&'static str],
        index: usize,
    ) -> Option<OpRes> {
        let mut buffer = Vec::new();
        let start = self.skip_space(&mut buffer, index);
        for symbol in candidates {
            let alphabetic = symbol
                .chars()
                .next()
                .is_some_and(syntax::is_identifier_first_char);
            let next = self.literal_match(start, &[symbol]);
            if next == start {
                continue;
            }
            if alphabetic {
                if let Some(ch) = self.rest(next).chars().next() {
                    if syntax::is_identifier_other_char(ch) {
                        continue;
                    }
                }
            }
            buffer.push(ParseNode::leaf(ParseNodeType::Operator, start, next - start));
            nodes.extend(buffer);
            return Some(OpRes {
                next,
                symbol,
                start,
                len: next - start,
            });
        }
        None
    }

    /// General infix form `a f b ~ c` for infix-capable functions.
    fn infix_function_call(
        &self,
        nodes: &mut Vec<ParseNode>,
        ref_key: Option<&str>,
        index: usize,
    ) -> BlockRes {
        let mut buffer = Vec::new();
        let first = self.call_and_member_access(&mut buffer, ref_key, index);
        let mut errors = first.errors;
        let Some(first_expr) = first.expr else {
            return BlockRes::failed(index, errors);
        };

        let mut probe = Vec::new();
        let function = self.identifier(&mut probe, first.next).and_then(|iden| {
            match self.lookup(&iden.lower) {
                Some(Value::Function(f)) if f.call_style() == CallStyle::Dual => Some((iden, f)),
                _ => None,
            }
        });
        let Some((iden, function)) = function else {
            nodes.extend(buffer);
            return BlockRes::ok_with(first.next, first_expr, errors);
        };
        buffer.extend(probe);

        let mut operands = vec![first_expr];
        let mut i = iden.next;
        let second = self.call_and_member_access(&mut buffer, ref_key, i);
        errors.extend(second.errors);
        let Some(second_expr) = second.expr else {
            errors.push(SyntaxErrorData::new(
                iden.start,
                iden.len,
                format!("right side operand expected for '{}'", iden.name),
            ));
            return BlockRes::failed(index, errors);
        };
        operands.push(second_expr);
        i = second.next;

        loop {
            let after_chain = self.token(&mut buffer, ParseNodeType::ThirdOperandSeparator, i, &["~"]);
            if after_chain == i {
                break;
            }
            let next_operand = self.call_and_member_access(&mut buffer, ref_key, after_chain);
            errors.extend(next_operand.errors);
            let Some(expr) = next_operand.expr else {
                break;
            };
            operands.push(expr);
            i = next_operand.next;
        }

        let span = span_over(&operands);
        let target = Expr::new(
            ExprKind::Literal(Value::Function(function)),
            Span::new(iden.start, iden.len),
        );
        let call = call_over(target, operands, Span::new(index, i.saturating_sub(index)));
        nodes.push(ParseNode::new(
            ParseNodeType::GeneralInfixExpression,
            span.pos,
            i.saturating_sub(span.pos),
            buffer,
        ));
        BlockRes::ok_with(i, call, errors)
    }

    /// A unit followed by any chain of calls, member accesses, and
    /// selector blocks.
    pub(crate) fn call_and_member_access(
        &self,
        nodes: &mut Vec<ParseNode>,
        ref_key: Option<&str>,
        index: usize,
    ) -> BlockRes {
        let unit = self.unit(nodes, ref_key, index);
        let mut errors = unit.errors;
        let Some(mut expr) = unit.expr else {
            return BlockRes::failed(index, errors);
        };
        let mut i = unit.next;

        loop {
            let call = self.call_params(nodes, &expr, ref_key, i);
            if !call.errors.is_empty() && call.expr.is_none() {
                errors.extend(call.errors);
                return BlockRes::failed(index, errors);
            }
            if let Some(next_expr) = call.expr {
                errors.extend(call.errors);
                expr = next_expr;
                i = call.next;
                continue;
            }

            let member = self.member_access(nodes, &expr, i);
            if !member.errors.is_empty() && member.expr.is_none() {
                errors.extend(member.errors);
                return BlockRes::failed(index, errors);
            }
            if let Some(next_expr) = member.expr {
                errors.extend(member.errors);
                expr = next_expr;
                i = member.next;
                continue;
            }

            let selector = self.kvc_expression(nodes, false, i);
            if !selector.errors.is_empty() && selector.expr.is_none() {
                errors.extend(selector.errors);
                return BlockRes::failed(index, errors);
            }
            if let Some(selector_expr) = selector.expr {
                if let ExprKind::Record(record) = selector_expr.kind {
                    let span = Span::new(expr.span.pos, selector.next - expr.span.pos);
                    expr = Expr::new(
                        ExprKind::Selector {
                            source: Arc::new(expr),
                            selector: record,
                        },
                        span,
                    );
                    i = selector.next;
                    continue;
                }
            }

            break;
        }

        BlockRes::ok_with(i, expr, errors)
    }

    fn unit(&self, nodes: &mut Vec<ParseNode>, ref_key: Option<&str>, index: usize) -> BlockRes {
        let template = self.string_template(nodes, ref_key, index);
        if template.progressed(index) || !template.errors.is_empty() {
            return template;
        }

        let binding = self.language_binding(nodes, index);
        if binding.progressed(index) || !binding.errors.is_empty() {
            return binding;
        }

        let mut string_errors = Vec::new();
        if let Some(string) = self.simple_string(nodes, index, &mut string_errors) {
            let span = Span::new(string.start, string.len);
            return BlockRes::ok(
                string.next,
                Expr::new(ExprKind::Literal(Value::Text(string.value)), span),
            );
        }
        if !string_errors.is_empty() {
            return BlockRes::failed(index, string_errors);
        }

        let mut number_errors = Vec::new();
        if let Some(number) = self.number(nodes, index, &mut number_errors) {
            let span = Span::new(number.start, number.len);
            return BlockRes::ok(
                number.next,
                Expr::new(ExprKind::Literal(number.value), span),
            );
        }
        if !number_errors.is_empty() {
            return BlockRes::failed(index, number_errors);
        }

        let list = self.list_expression(nodes, ref_key, index);
        if list.progressed(index) || !list.errors.is_empty() {
            return list;
        }

        let kvc = self.kvc_expression(nodes, false, index);
        if kvc.progressed(index) || !kvc.errors.is_empty() {
            return kvc;
        }

        let if_expr = self.if_then_else(nodes, ref_key, index);
        if if_expr.progressed(index) || !if_expr.errors.is_empty() {
            return if_expr;
        }

        let case_expr = self.keyword_call(nodes, ref_key, syntax::KW_CASE, index);
        if case_expr.progressed(index) || !case_expr.errors.is_empty() {
            return case_expr;
        }

        let switch_expr = self.keyword_call(nodes, ref_key, syntax::KW_SWITCH, index);
        if switch_expr.progressed(index) || !switch_expr.errors.is_empty() {
            return switch_expr;
        }

        let lambda = self.lambda_expression(nodes, index);
        if lambda.progressed(index) || !lambda.errors.is_empty() {
            return lambda;
        }

        if let Some(literal) = self.keyword_literal(nodes, index) {
            let span = Span::new(literal.start, literal.len);
            return BlockRes::ok(literal.next, Expr::new(ExprKind::Literal(literal.value), span));
        }

        // Before identifiers, or `not x` would scan as a reference to
        // `not` with a dangling operand.
        let prefix = self.prefix_operator(nodes, ref_key, index);
        if prefix.progressed(index) || !prefix.errors.is_empty() {
            return prefix;
        }

        if let Some(iden) = self.identifier(nodes, index) {
            let mode = match ref_key {
                Some(key) if key == iden.lower => ReferenceMode::ParentsThenSiblings,
                _ => ReferenceMode::Standard,
            };
            let span = Span::new(iden.start, iden.len);
            return BlockRes::ok(
                iden.next,
                Expr::new(
                    ExprKind::Reference {
                        name: iden.name,
                        name_lower: iden.lower,
                        mode,
                    },
                    span,
                ),
            );
        }

        self.paren_expression(nodes, ref_key, index)
    }

    fn paren_expression(
        &self,
        nodes: &mut Vec<ParseNode>,
        ref_key: Option<&str>,
        index: usize,
    ) -> BlockRes {
        let mut buffer = Vec::new();
        let after_open = self.token(&mut buffer, ParseNodeType::OpenBrace, index, &["("]);
        if after_open == index {
            return BlockRes::no_advance(index);
        }
        let open_pos = buffer
            .last()
            .map(|node| node.pos)
            .unwrap_or(index);

        let mut errors = Vec::new();
        let inner = self.expression(&mut buffer, ref_key, after_open);
        errors.extend(inner.errors);
        let mut i = inner.next;

        let after_close = self.token(&mut buffer, ParseNodeType::CloseBrace, i, &[")"]);
        if after_close == i {
            if errors.is_empty() {
                errors.push(SyntaxErrorData::new(i, 1, "')' expected"));
            }
            return BlockRes::failed(index, errors);
        }
        i = after_close;

        let expr = inner
            .expr
            .unwrap_or_else(|| Expr::new(ExprKind::Null, Span::new(open_pos, i - open_pos)));
        nodes.push(ParseNode::new(
            ParseNodeType::ExpressionInBrace,
            open_pos,
            i - open_pos,
            buffer,
        ));
        BlockRes::ok_with(i, expr, errors)
    }

    fn prefix_operator(
        &self,
        nodes: &mut Vec<ParseNode>,
        ref_key: Option<&str>,
        index: usize,
    ) -> BlockRes {
        let mut buffer = Vec::new();
        let mut matched: Option<(&str, &str, usize, usize)> = None;
        for (symbol, function_name) in syntax::PREFIX_OPERATORS {
            let alphabetic = symbol
                .chars()
                .next()
                .is_some_and(syntax::is_identifier_first_char);
            let next = if alphabetic {
                self.word_token(&mut buffer, ParseNodeType::Operator, index, symbol)
            } else {
                self.token(&mut buffer, ParseNodeType::Operator, index, &[symbol])
            };
            if next > index {
                let op_pos = buffer.last().map(|node| node.pos).unwrap_or(index);
                matched = Some((symbol, function_name, next, op_pos));
                break;
            }
        }
        let Some((symbol, function_name, after_op, op_pos)) = matched else {
            return BlockRes::no_advance(index);
        };
        let op_len = after_op - op_pos;

        let mut errors = Vec::new();
        let operand = self.call_and_member_access(&mut buffer, ref_key, after_op);
        errors.extend(operand.errors);
        let Some(operand_expr) = operand.expr else {
            errors.push(SyntaxErrorData::new(
                op_pos,
                op_len,
                format!("operand expected for '{symbol}'"),
            ));
            return BlockRes::failed(index, errors);
        };

        let span = Span::new(op_pos, operand.next - op_pos);
        let target = self.bound_function(function_name, Span::new(op_pos, op_len));
        let call = call_over(target, vec![operand_expr], span);
        nodes.push(ParseNode::new(
            ParseNodeType::PrefixOperatorExpression,
            op_pos,
            operand.next - op_pos,
            buffer,
        ));
        BlockRes::ok_with(operand.next, call, errors)
    }

    /// `if <cond> then <a> else <b>`, desugared to a call of the bound
    /// `if` function so branch evaluation stays lazy.
    fn if_then_else(
        &self,
        nodes: &mut Vec<ParseNode>,
        ref_key: Option<&str>,
        index: usize,
    ) -> BlockRes {
        let mut buffer = Vec::new();
        let after_if = self.keyword(&mut buffer, index, syntax::KW_IF);
        if after_if == index {
            return BlockRes::no_advance(index);
        }
        let kw_pos = buffer.last().map(|node| node.pos).unwrap_or(index);

        let mut errors = Vec::new();
        let condition = self.expression(&mut buffer, ref_key, after_if);
        errors.extend(condition.errors);
        let Some(condition_expr) = condition.expr else {
            // Bare `if` falls through to an ordinary reference.
            return BlockRes::no_advance(index);
        };
        let mut i = condition.next;

        let after_then = self.keyword(&mut buffer, i, syntax::KW_THEN);
        if after_then == i {
            if errors.is_empty() {
                errors.push(SyntaxErrorData::new(i, 1, "'then' expected"));
            }
            return BlockRes::failed(index, errors);
        }
        i = after_then;

        let then_value = self.expression(&mut buffer, ref_key, i);
        errors.extend(then_value.errors);
        let Some(then_expr) = then_value.expr else {
            if errors.is_empty() {
                errors.push(SyntaxErrorData::new(i, 1, "value expected after 'then'"));
            }
            return BlockRes::failed(index, errors);
        };
        i = then_value.next;

        let after_else = self.keyword(&mut buffer, i, syntax::KW_ELSE);
        if after_else == i {
            if errors.is_empty() {
                errors.push(SyntaxErrorData::new(i, 1, "'else' expected"));
            }
            return BlockRes::failed(index, errors);
        }
        i = after_else;

        let else_value = self.expression(&mut buffer, ref_key, i);
        errors.extend(else_value.errors);
        let Some(else_expr) = else_value.expr else {
            if errors.is_empty() {
                errors.push(SyntaxErrorData::new(i, 1, "value expected after 'else'"));
            }
            return BlockRes::failed(index, errors);
        };
        i = else_value.next;

        let kw_len = after_if - kw_pos;
        let target = Expr::new(
            ExprKind::Reference {
                name: syntax::KW_IF.to_string(),
                name_lower: syntax::KW_IF.to_string(),
                mode: ReferenceMode::Standard,
            },
            Span::new(kw_pos, kw_len),
        );
        let call = call_over(
            target,
            vec![condition_expr, then_expr, else_expr],
            Span::new(kw_pos, i - kw_pos),
        );
        nodes.push(ParseNode::new(
            ParseNodeType::IfExpression,
            kw_pos,
            i - kw_pos,
            buffer,
        ));
        BlockRes::ok_with(i, call, errors)
    }

    /// `case c1: v1, c2: v2, default` and `switch sel, m1: r1, default`
    /// share one shape: keyword, then colon-separated pairs with an
    /// optional trailing odd default argument.
    fn keyword_call(
        &self,
        nodes: &mut Vec<ParseNode>,
        ref_key: Option<&str>,
        keyword: &str,
        index: usize,
    ) -> BlockRes {
        let mut buffer = Vec::new();
        let after_kw = self.keyword(&mut buffer, index, keyword);
        if after_kw == index {
            return BlockRes::no_advance(index);
        }
        let kw_pos = buffer.last().map(|node| node.pos).unwrap_or(index);

        let mut errors = Vec::new();
        let mut parts = Vec::new();

        let head = self.expression(&mut buffer, ref_key, after_kw);
        errors.extend(head.errors);
        let Some(head_expr) = head.expr else {
            if errors.is_empty() {
                errors.push(SyntaxErrorData::new(
                    after_kw,
                    1,
                    format!("'{keyword}' condition expected"),
                ));
            }
            return BlockRes::failed(index, errors);
        };
        parts.push(head_expr);
        let mut i = head.next;

        // `case` pairs its head with a value; `switch` treats the head
        // as the selector and starts pairing afterwards.
        let mut expect_value = keyword == syntax::KW_CASE;
        loop {
            if expect_value {
                let after_colon = self.token(&mut buffer, ParseNodeType::Colon, i, &[":"]);
                if after_colon == i {
                    break;
                }
                let value = self.expression(&mut buffer, ref_key, after_colon);
                errors.extend(value.errors);
                let Some(value_expr) = value.expr else {
                    if errors.is_empty() {
                        errors.push(SyntaxErrorData::new(
                            after_colon,
                            1,
                            format!("'{keyword}' value expected"),
                        ));
                    }
                    return BlockRes::failed(index, errors);
                };
                parts.push(value_expr);
                i = value.next;
            }
            expect_value = true;

            let after_separator =
                self.token(&mut buffer, ParseNodeType::ListSeparator, i, &[",", ";"]);
            if after_separator == i {
                break;
            }
            let condition = self.expression(&mut buffer, ref_key, after_separator);
            errors.extend(condition.errors);
            let Some(condition_expr) = condition.expr else {
                break;
            };
            parts.push(condition_expr);
            i = condition.next;
        }

        let kw_len = after_kw - kw_pos;
        let target = self.bound_function(keyword, Span::new(kw_pos, kw_len));
        let call = call_over(target, parts, Span::new(kw_pos, i - kw_pos));
        nodes.push(ParseNode::new(
            ParseNodeType::CaseExpression,
            kw_pos,
            i - kw_pos,
            buffer,
        ));
        BlockRes::ok_with(i, call, errors)
    }

    fn member_access(&self, nodes: &mut Vec<ParseNode>, source: &Expr, index: usize) -> BlockRes {
        for symbol in [".", "?."] {
            let result = self.member_access_with(nodes, source, symbol, index);
            if result.progressed(index) || !result.errors.is_empty() {
                return result;
            }
        }
        BlockRes::no_advance(index)
    }

    fn member_access_with(
        &self,
        nodes: &mut Vec<ParseNode>,
        source: &Expr,
        symbol: &str,
        index: usize,
    ) -> BlockRes {
        let mut buffer = Vec::new();
        let after_op = self.token(&mut buffer, ParseNodeType::Operator, index, &[symbol]);
        if after_op == index {
            return BlockRes::no_advance(index);
        }
        let op_pos = buffer.last().map(|node| node.pos).unwrap_or(index);

        let Some(iden) = self.identifier(&mut buffer, after_op) else {
            return BlockRes::failed(
                index,
                vec![SyntaxErrorData::new(op_pos, after_op - op_pos, "member identifier expected")],
            );
        };

        let target = self.bound_function(symbol, Span::new(op_pos, after_op - op_pos));
        let member = Expr::new(
            ExprKind::Literal(Value::Text(iden.name.clone())),
            Span::new(iden.start, iden.len),
        );
        let span = Span::new(source.span.pos, iden.next - source.span.pos);
        let call = call_over(target, vec![source.clone(), member], span);
        nodes.push(ParseNode::new(
            ParseNodeType::MemberAccess,
            op_pos,
            iden.next - op_pos,
            buffer,
        ));
        BlockRes::ok(iden.next, call)
    }

    fn call_params(
        &self,
        nodes: &mut Vec<ParseNode>,
        function: &Expr,
        ref_key: Option<&str>,
        index: usize,
    ) -> BlockRes {
        for (open, close) in [("(", ")"), ("[", "]")] {
            let result = self.call_params_with(nodes, function, ref_key, open, close, index);
            if result.progressed(index) || !result.errors.is_empty() {
                return result;
            }
        }
        BlockRes::no_advance(index)
    }

    fn call_params_with(
        &self,
        nodes: &mut Vec<ParseNode>,
        function: &Expr,
        ref_key: Option<&str>,
        open: &str,
        close: &str,
        index: usize,
    ) -> BlockRes {
        let mut buffer = Vec::new();
        let after_open = self.token(&mut buffer, ParseNodeType::OpenBrace, index, &[open]);
        if after_open == index {
            return BlockRes::no_advance(index);
        }
        let open_pos = buffer.last().map(|node| node.pos).unwrap_or(index);

        let mut errors = Vec::new();
        let mut params = Vec::new();
        let mut i = after_open;

        let first = self.expression(&mut buffer, ref_key, i);
        errors.extend(first.errors);
        if let Some(expr) = first.expr {
            params.push(expr);
            i = first.next;
            loop {
                let after_comma =
                    self.token(&mut buffer, ParseNodeType::ListSeparator, i, &[","]);
                if after_comma == i {
                    break;
                }
                let next_param = self.expression(&mut buffer, ref_key, after_comma);
                errors.extend(next_param.errors);
                let Some(expr) = next_param.expr else {
                    if errors.is_empty() {
                        errors.push(SyntaxErrorData::new(
                            after_comma,
                            1,
                            "parameter for call expected",
                        ));
                    }
                    return BlockRes::failed(index, errors);
                };
                params.push(expr);
                i = next_param.next;
            }
        } else if !errors.is_empty() {
            return BlockRes::failed(index, errors);
        }

        let after_close = self.token(&mut buffer, ParseNodeType::CloseBrace, i, &[close]);
        if after_close == i {
            errors.push(SyntaxErrorData::new(i, 1, format!("'{close}' expected")));
            return BlockRes::failed(index, errors);
        }
        i = after_close;

        let span = Span::new(function.span.pos, i - function.span.pos);
        let args = Expr::new(
            ExprKind::List(Arc::new(params)),
            Span::new(open_pos, i - open_pos),
        );
        let call = Expr::new(
            ExprKind::Call {
                target: Arc::new(function.clone()),
                args: Arc::new(args),
            },
            span,
        );
        nodes.push(ParseNode::new(
            ParseNodeType::FunctionParameterList,
            open_pos,
            i - open_pos,
            buffer,
        ));
        BlockRes::ok_with(i, call, errors)
    }
}

fn span_over(operands: &[Expr]) -> Span {
    let start = operands.first().map(|expr| expr.span.pos).unwrap_or(0);
    let end = operands
        .last()
        .map(|expr| expr.span.end())
        .unwrap_or(start);
    Span::new(start, end.saturating_sub(start))
}

pub(super) fn call_over(target: Expr, operands: Vec<Expr>, span: Span) -> Expr {
    let args = Expr::new(ExprKind::List(Arc::new(operands)), span);
    Expr::new(
        ExprKind::Call {
            target: Arc::new(target),
            args: Arc::new(args),
        },
        span,
    )
}
