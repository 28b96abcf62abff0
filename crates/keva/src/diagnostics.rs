use serde::Serialize;

/// Half-open source region: byte offset plus width.
///
/// Offsets are UTF-8 byte offsets into the original source text, the
/// indexing hosts use for Rust string buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub pos: usize,
    pub len: usize,
}

impl Span {
    pub fn new(pos: usize, len: usize) -> Self {
        Self { pos, len }
    }

    pub fn end(&self) -> usize {
        self.pos + self.len
    }
}

/// One syntax diagnostic. `length` is always at least 1 so tooling can
/// render a non-empty highlight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxErrorData {
    pub location: usize,
    pub length: usize,
    pub message: String,
}

impl SyntaxErrorData {
    pub fn new(location: usize, length: usize, message: impl Into<String>) -> Self {
        Self {
            location,
            length: length.max(1),
            message: message.into(),
        }
    }

    pub fn span(&self) -> Span {
        Span::new(self.location, self.length)
    }
}

pub fn line_starts(src: &str) -> Vec<usize> {
    let mut starts = vec![0];
    for (idx, byte) in src.bytes().enumerate() {
        if byte == b'\n' {
            starts.push(idx + 1);
        }
    }
    starts
}

/// 1-based line and column for a byte offset.
pub fn line_and_column(starts: &[usize], pos: usize) -> (usize, usize) {
    let line_index = match starts.binary_search(&pos) {
        Ok(idx) => idx,
        Err(idx) => idx.saturating_sub(1),
    };
    (line_index + 1, pos - starts[line_index] + 1)
}

/// The full text of the line containing `pos`.
pub fn line_text(src: &str, pos: usize) -> &str {
    let pos = pos.min(src.len());
    let start = src[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = src[start..]
        .find('\n')
        .map(|i| start + i)
        .unwrap_or(src.len());
    &src[start..end]
}

/// Renders diagnostics with a caret/underline against the source text.
pub fn render_diagnostics(src: &str, diagnostics: &[SyntaxErrorData]) -> String {
    let starts = line_starts(src);
    let mut output = String::new();
    for (index, diagnostic) in diagnostics.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }
        let (line, column) = line_and_column(&starts, diagnostic.location);
        let text = line_text(src, diagnostic.location);
        output.push_str(&format!(
            "error {line}:{column} {}\n  {text}\n  {}{}",
            diagnostic.message,
            " ".repeat(column.saturating_sub(1)),
            "^".repeat(diagnostic.length.min(text.len().saturating_sub(column - 1)).max(1)),
        ));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_length_is_never_zero() {
        let diag = SyntaxErrorData::new(3, 0, "expected something");
        assert_eq!(diag.length, 1);
        assert_eq!(diag.span(), Span::new(3, 1));
    }

    #[test]
    fn line_and_column_are_one_based() {
        let src = "ab\ncd\nef";
        let starts = line_starts(src);
        assert_eq!(line_and_column(&starts, 0), (1, 1));
        assert_eq!(line_and_column(&starts, 3), (2, 1));
        assert_eq!(line_and_column(&starts, 4), (2, 2));
        assert_eq!(line_and_column(&starts, 7), (3, 2));
    }

    #[test]
    fn line_text_extracts_the_offending_line() {
        let src = "first\nsecond\nthird";
        assert_eq!(line_text(src, 0), "first");
        assert_eq!(line_text(src, 8), "second");
        assert_eq!(line_text(src, src.len()), "third");
    }

    #[test]
    fn render_points_at_the_span() {
        let src = "{a: }";
        let diags = vec![SyntaxErrorData::new(1, 1, "value expected for 'a'")];
        let rendered = render_diagnostics(src, &diags);
        assert!(rendered.contains("value expected for 'a'"));
        assert!(rendered.contains("^"));
    }
}
