//! The exceptional failure channel.
//!
//! Value-level errors ([`crate::value::FsError`]) are ordinary data and
//! never appear here. `EvalError` covers the two cases the language
//! raises structurally: unparseable text at a call site that demanded a
//! parsed result, and internal evaluation faults such as a failing host
//! binding callback. Both carry the offending source span and, where
//! available, the offending line text for display.

use crate::diagnostics::{line_text, Span, SyntaxErrorData};

pub type EvalResult<T> = Result<T, EvalError>;

/// Parse failure raised by "evaluate this text" entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxFailure {
    pub errors: Vec<SyntaxErrorData>,
    pub location: usize,
    pub line: String,
}

impl SyntaxFailure {
    pub fn new(source: &str, errors: Vec<SyntaxErrorData>) -> Self {
        let location = errors.first().map(|err| err.location).unwrap_or(0);
        Self {
            errors,
            location,
            line: line_text(source, location).to_string(),
        }
    }

    pub fn message(&self) -> &str {
        self.errors
            .first()
            .map(|err| err.message.as_str())
            .unwrap_or("syntax error")
    }
}

impl std::fmt::Display for SyntaxFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at offset {}", self.message(), self.location)?;
        if !self.line.is_empty() {
            write!(f, " in '{}'", self.line)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("syntax error: {0}")]
    Syntax(SyntaxFailure),

    #[error("evaluation error: {message}{}", render_site(.span, .line))]
    Evaluation {
        message: String,
        span: Option<Span>,
        line: Option<String>,
    },
}

impl EvalError {
    pub fn fault(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
            span: None,
            line: None,
        }
    }

    pub fn fault_at(message: impl Into<String>, span: Span) -> Self {
        Self::Evaluation {
            message: message.into(),
            span: Some(span),
            line: None,
        }
    }

    /// Attaches the offending line text once the caller knows the source.
    pub fn with_source(self, source: &str) -> Self {
        match self {
            Self::Evaluation {
                message,
                span: Some(span),
                line: None,
            } => Self::Evaluation {
                message,
                span: Some(span),
                line: Some(line_text(source, span.pos).to_string()),
            },
            other => other,
        }
    }
}

fn render_site(span: &Option<Span>, line: &Option<String>) -> String {
    match (span, line) {
        (Some(span), Some(line)) => format!(" at offset {} in '{line}'", span.pos),
        (Some(span), None) => format!(" at offset {}", span.pos),
        _ => String::new(),
    }
}
