//! Literal scanning: strings, numbers, keyword literals, string
//! templates, and embedded foreign-code blocks.

use std::sync::Arc;

use super::{BlockRes, Ctx};
use crate::ast::{EmbeddingExpr, Expr, ExprKind};
use crate::cst::{ParseNode, ParseNodeType};
use crate::diagnostics::{Span, SyntaxErrorData};
use crate::syntax;
use crate::value::Value;

pub(crate) struct StrRes {
    pub(crate) next: usize,
    pub(crate) value: String,
    pub(crate) start: usize,
    pub(crate) len: usize,
}

pub(crate) struct NumRes {
    pub(crate) next: usize,
    pub(crate) value: Value,
    pub(crate) start: usize,
    pub(crate) len: usize,
}

pub(crate) struct LitRes {
    pub(crate) next: usize,
    pub(crate) value: Value,
    pub(crate) start: usize,
    pub(crate) len: usize,
}

impl<'a> Ctx<'a> {
    /// A quoted string with `\n \t \\ \uXXXX` and delimiter escapes.
    /// An unterminated string anchors its diagnostic at the opening
    /// quote and spans to the end of input.
    pub(crate) fn simple_string(
        &self,
        nodes: &mut Vec<ParseNode>,
        index: usize,
        errors: &mut Vec<SyntaxErrorData>,
    ) -> Option<StrRes> {
        let mut buffer = Vec::new();
        let start = self.skip_space(&mut buffer, index);
        let delim = match self.rest(start).chars().next() {
            Some(ch @ ('"' | '\'')) => ch,
            _ => return None,
        };

        let mut value = String::new();
        let mut i = start + 1;
        loop {
            let rest = self.rest(i);
            let Some(ch) = rest.chars().next() else {
                errors.push(SyntaxErrorData::new(
                    start,
                    self.src.len() - start,
                    "unterminated string literal",
                ));
                return None;
            };
            if ch == delim {
                i += 1;
                break;
            }
            if ch == '\\' {
                let mut escape = rest.chars();
                escape.next();
                match escape.next() {
                    Some('n') => {
                        value.push('\n');
                        i += 2;
                    }
                    Some('t') => {
                        value.push('\t');
                        i += 2;
                    }
                    Some('\\') => {
                        value.push('\\');
                        i += 2;
                    }
                    Some('u') => {
                        let digits = &self.src[(i + 2).min(self.src.len())..];
                        let code = digits
                            .get(..4)
                            .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                            .and_then(char::from_u32);
                        match code {
                            Some(ch) => {
                                value.push(ch);
                                i += 6;
                            }
                            None => {
                                value.push('\\');
                                i += 1;
                            }
                        }
                    }
                    Some(ch) if ch == delim => {
                        value.push(delim);
                        i += 2;
                    }
                    Some(ch) => {
                        value.push('\\');
                        value.push(ch);
                        i += 1 + ch.len_utf8();
                    }
                    None => {
                        value.push('\\');
                        i += 1;
                    }
                }
                continue;
            }
            value.push(ch);
            i += ch.len_utf8();
        }

        buffer.push(ParseNode::leaf(ParseNodeType::LiteralString, start, i - start));
        nodes.extend(buffer);
        Some(StrRes {
            next: i,
            value,
            start,
            len: i - start,
        })
    }

    /// A numeric literal. Digits may use `_` separators; a fraction or
    /// exponent makes the value a float; an `l`/`L` suffix makes an
    /// integer a long. Trailing identifier characters make the whole
    /// run an invalid-literal diagnostic.
    pub(crate) fn number(
        &self,
        nodes: &mut Vec<ParseNode>,
        index: usize,
        errors: &mut Vec<SyntaxErrorData>,
    ) -> Option<NumRes> {
        let mut buffer = Vec::new();
        let start = self.skip_space(&mut buffer, index);
        let mut i = self.digit_run(start)?;
        let mut is_float = false;
        let mut is_long = false;

        // Fraction only when a digit follows the dot; `1.x` stays an
        // integer followed by member access.
        if self.rest(i).starts_with('.') {
            if let Some(after) = self.digit_run(i + 1) {
                i = after;
                is_float = true;
            }
        }

        if matches!(self.rest(i).chars().next(), Some('e' | 'E')) {
            let mut probe = i + 1;
            if matches!(self.rest(probe).chars().next(), Some('+' | '-')) {
                probe += 1;
            }
            if let Some(after) = self.digit_run(probe) {
                i = after;
                is_float = true;
            }
        }

        if !is_float && matches!(self.rest(i).chars().next(), Some('l' | 'L')) {
            i += 1;
            is_long = true;
        }

        if let Some(ch) = self.rest(i).chars().next() {
            if syntax::is_identifier_other_char(ch) || ch == '.' && is_float {
                let mut end = i;
                for ch in self.rest(i).chars() {
                    if syntax::is_identifier_other_char(ch) || ch == '.' {
                        end += ch.len_utf8();
                    } else {
                        break;
                    }
                }
                errors.push(SyntaxErrorData::new(
                    start,
                    end - start,
                    format!("invalid numeric literal '{}'", &self.src[start..end]),
                ));
                return None;
            }
        }

        let raw: String = self.src[start..i]
            .chars()
            .filter(|ch| *ch != '_' && *ch != 'l' && *ch != 'L')
            .collect();
        let value = if is_float {
            match raw.parse::<f64>() {
                Ok(parsed) => Value::Float(parsed),
                Err(_) => {
                    errors.push(SyntaxErrorData::new(
                        start,
                        i - start,
                        format!("invalid numeric literal '{raw}'"),
                    ));
                    return None;
                }
            }
        } else if is_long {
            match raw.parse::<i64>() {
                Ok(parsed) => Value::Long(parsed),
                Err(_) => {
                    errors.push(SyntaxErrorData::new(
                        start,
                        i - start,
                        format!("invalid numeric literal '{raw}'"),
                    ));
                    return None;
                }
            }
        } else if let Ok(parsed) = raw.parse::<i32>() {
            Value::Int(parsed)
        } else if let Ok(parsed) = raw.parse::<i64>() {
            Value::Long(parsed)
        } else {
            match raw.parse::<f64>() {
                Ok(parsed) => Value::Float(parsed),
                Err(_) => {
                    errors.push(SyntaxErrorData::new(
                        start,
                        i - start,
                        format!("invalid numeric literal '{raw}'"),
                    ));
                    return None;
                }
            }
        };

        buffer.push(ParseNode::leaf(ParseNodeType::LiteralNumber, start, i - start));
        nodes.extend(buffer);
        Some(NumRes {
            next: i,
            value,
            start,
            len: i - start,
        })
    }

    fn digit_run(&self, index: usize) -> Option<usize> {
        let mut i = index;
        let mut previous_digit = false;
        for ch in self.rest(index).chars() {
            if ch.is_ascii_digit() {
                previous_digit = true;
                i += 1;
            } else if ch == '_' && previous_digit {
                previous_digit = false;
                i += 1;
            } else {
                break;
            }
        }
        if i == index {
            return None;
        }
        if !previous_digit {
            // A trailing underscore is not part of the run.
            i -= 1;
        }
        Some(i)
    }

    /// `null`, `true`, or `false` with a word boundary.
    pub(crate) fn keyword_literal(
        &self,
        nodes: &mut Vec<ParseNode>,
        index: usize,
    ) -> Option<LitRes> {
        let mut buffer = Vec::new();
        let start = self.skip_space(&mut buffer, index);
        let candidates: [(&str, Value); 3] = [
            ("null", Value::Null),
            ("true", Value::Bool(true)),
            ("false", Value::Bool(false)),
        ];
        for (word, value) in candidates {
            let next = self.literal_match(start, &[word]);
            if next == start {
                continue;
            }
            if let Some(ch) = self.rest(next).chars().next() {
                if syntax::is_identifier_other_char(ch) {
                    continue;
                }
            }
            buffer.push(ParseNode::leaf(ParseNodeType::KeyWord, start, next - start));
            nodes.extend(buffer);
            return Some(LitRes {
                next,
                value,
                start,
                len: next - start,
            });
        }
        None
    }

    /// String template: `f"head {expr} tail"`, also with `'` or `"""`
    /// delimiters. Desugars to a `strcat` call over the parts.
    pub(crate) fn string_template(
        &self,
        nodes: &mut Vec<ParseNode>,
        ref_key: Option<&str>,
        index: usize,
    ) -> BlockRes {
        for delim in ["\"\"\"", "\"", "'"] {
            let result = self.string_template_with(nodes, ref_key, delim, index);
            if result.progressed(index) || !result.errors.is_empty() {
                return result;
            }
        }
        BlockRes::no_advance(index)
    }

    fn string_template_with(
        &self,
        nodes: &mut Vec<ParseNode>,
        ref_key: Option<&str>,
        delim: &str,
        index: usize,
    ) -> BlockRes {
        let mut buffer = Vec::new();
        let start = self.skip_space(&mut buffer, index);
        let open = format!("f{delim}");
        let mut i = self.literal_match(start, &[&open]);
        if i == start {
            return BlockRes::no_advance(index);
        }

        let mut children = Vec::new();
        let mut errors = Vec::new();
        let mut parts: Vec<Expr> = Vec::new();
        let mut has_expressions = false;
        let mut chunk = String::new();
        let mut chunk_start = i;

        loop {
            if self.at_end(i) {
                errors.push(SyntaxErrorData::new(
                    start,
                    self.src.len() - start,
                    "unterminated string literal",
                ));
                return BlockRes::failed(index, errors);
            }
            let close = self.literal_match(i, &[delim]);
            if close > i {
                i = close;
                break;
            }
            let rest = self.rest(i);
            if let Some(escaped) = rest.strip_prefix('\\') {
                match escaped.chars().next() {
                    Some('n') => {
                        chunk.push('\n');
                        i += 2;
                        continue;
                    }
                    Some('t') => {
                        chunk.push('\t');
                        i += 2;
                        continue;
                    }
                    Some('\\') => {
                        chunk.push('\\');
                        i += 2;
                        continue;
                    }
                    Some('{') => {
                        chunk.push('{');
                        i += 2;
                        continue;
                    }
                    Some(ch) if delim.starts_with(ch) => {
                        chunk.push(ch);
                        i += 2;
                        continue;
                    }
                    _ => {}
                }
            }
            if rest.starts_with('{') {
                if !chunk.is_empty() {
                    children.push(ParseNode::leaf(
                        ParseNodeType::LiteralString,
                        chunk_start,
                        i - chunk_start,
                    ));
                    parts.push(Expr::new(
                        ExprKind::Literal(Value::Text(std::mem::take(&mut chunk))),
                        Span::new(chunk_start, i - chunk_start),
                    ));
                }
                children.push(ParseNode::leaf(ParseNodeType::OpenBrace, i, 1));
                let inner = self.expression(&mut children, ref_key, i + 1);
                errors.extend(inner.errors);
                let Some(expr) = inner.expr else {
                    errors.push(SyntaxErrorData::new(i, 1, "template expression expected"));
                    return BlockRes::failed(index, errors);
                };
                let after_close =
                    self.token(&mut children, ParseNodeType::CloseBrace, inner.next, &["}"]);
                if after_close == inner.next {
                    errors.push(SyntaxErrorData::new(inner.next, 1, "'}' expected"));
                    return BlockRes::failed(index, errors);
                }
                has_expressions = true;
                parts.push(expr);
                i = after_close;
                chunk_start = i;
                continue;
            }
            let ch = rest.chars().next().unwrap_or_default();
            chunk.push(ch);
            i += ch.len_utf8();
        }

        if !chunk.is_empty() || parts.is_empty() {
            children.push(ParseNode::leaf(
                ParseNodeType::LiteralString,
                chunk_start,
                i - chunk_start,
            ));
            parts.push(Expr::new(
                ExprKind::Literal(Value::Text(chunk)),
                Span::new(chunk_start, i.saturating_sub(chunk_start)),
            ));
        }

        buffer.push(ParseNode::new(
            ParseNodeType::StringTemplate,
            start,
            i - start,
            children,
        ));
        nodes.extend(buffer);

        let span = Span::new(start, i - start);
        let expr = if !has_expressions && parts.len() == 1 {
            parts.remove(0)
        } else {
            let target = self.bound_function(syntax::TEMPLATE_CONCAT, span);
            Expr::new(
                ExprKind::Call {
                    target: Arc::new(target),
                    args: Arc::new(Expr::new(ExprKind::List(Arc::new(parts)), span)),
                },
                span,
            )
        };
        BlockRes::ok_with(i, expr, errors)
    }

    /// Embedded foreign-code block: ```` ```lang … ``` ````.
    pub(crate) fn language_binding(&self, nodes: &mut Vec<ParseNode>, index: usize) -> BlockRes {
        let mut buffer = Vec::new();
        let start = self.skip_space(&mut buffer, index);
        let mut i = self.literal_match(start, &["```"]);
        if i == start {
            return BlockRes::no_advance(index);
        }

        let mut errors = Vec::new();
        let lang_start = i;
        for ch in self.rest(i).chars() {
            if syntax::is_identifier_other_char(ch) {
                i += ch.len_utf8();
            } else {
                break;
            }
        }
        if i == lang_start {
            errors.push(SyntaxErrorData::new(start, 3, "language identifier expected"));
            return BlockRes::failed(index, errors);
        }
        let language = self.src[lang_start..i].to_string();

        let code_start = match self.rest(i).chars().next() {
            Some('\n') => i + 1,
            _ => i,
        };
        let Some(close) = self.rest(code_start).find("```") else {
            errors.push(SyntaxErrorData::new(
                start,
                self.src.len() - start,
                "'```' expected",
            ));
            return BlockRes::failed(index, errors);
        };
        let code = self.src[code_start..code_start + close].to_string();
        let next = code_start + close + 3;
        let span = Span::new(start, next - start);

        let Some(binding) = self.bindings.get(&language) else {
            errors.push(SyntaxErrorData::new(
                lang_start,
                language.len(),
                format!("no language binding registered for '{language}'"),
            ));
            return BlockRes::failed(index, errors);
        };

        buffer.push(ParseNode::leaf(ParseNodeType::LanguageBinding, start, next - start));
        nodes.extend(buffer);
        let embedding = EmbeddingExpr::new(language, code, binding);
        BlockRes::ok(
            next,
            Expr::new(ExprKind::Embedding(Arc::new(embedding)), span),
        )
    }
}
