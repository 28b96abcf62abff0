//! Low-level scanning: trivia, token matching, identifiers, keywords.

use super::Ctx;
use crate::cst::{ParseNode, ParseNodeType};
use crate::syntax;

/// Byte-level scan for a `/*` outside strings and line comments that
/// never closes. The trivia skipper tolerates such a comment so parsing
/// can continue; the root turns this into its own diagnostic.
pub(crate) fn unterminated_block_comment(src: &str) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            delim @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != delim {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                match bytes[i + 2..].windows(2).position(|pair| pair == b"*/") {
                    Some(close) => i += 2 + close + 2,
                    None => return Some(i),
                }
            }
            _ => i += 1,
        }
    }
    None
}

pub(crate) struct IdenRes {
    pub(crate) next: usize,
    pub(crate) name: String,
    pub(crate) lower: String,
    pub(crate) start: usize,
    pub(crate) len: usize,
}

impl<'a> Ctx<'a> {
    pub(crate) fn rest(&self, index: usize) -> &'a str {
        &self.src[index.min(self.src.len())..]
    }

    pub(crate) fn at_end(&self, index: usize) -> bool {
        index >= self.src.len()
    }

    /// Consumes whitespace and comments, recording each run as its own
    /// leaf so the node tree stays span-exact.
    pub(crate) fn skip_space(&self, nodes: &mut Vec<ParseNode>, index: usize) -> usize {
        let mut i = index;
        loop {
            let ws_start = i;
            while let Some(ch) = self.rest(i).chars().next() {
                if syntax::is_whitespace_char(ch) {
                    i += ch.len_utf8();
                } else {
                    break;
                }
            }
            if i > ws_start {
                nodes.push(ParseNode::leaf(ParseNodeType::WhiteSpace, ws_start, i - ws_start));
            }

            let after_comment = self.comment_block(nodes, i);
            if after_comment == i {
                return i;
            }
            i = after_comment;
        }
    }

    fn comment_block(&self, nodes: &mut Vec<ParseNode>, index: usize) -> usize {
        let rest = self.rest(index);
        if let Some(stripped) = rest.strip_prefix("//") {
            let body = stripped.find('\n').map(|i| i + 1).unwrap_or(stripped.len());
            let next = index + 2 + body;
            nodes.push(ParseNode::leaf(ParseNodeType::Comment, index, next - index));
            return next;
        }
        if let Some(stripped) = rest.strip_prefix("/*") {
            let body = stripped.find("*/").map(|i| i + 2).unwrap_or(stripped.len());
            let next = index + 2 + body;
            nodes.push(ParseNode::leaf(ParseNodeType::Comment, index, next - index));
            return next;
        }
        index
    }

    /// Case-insensitive match of any of `patterns` at `index`; returns
    /// the index after the first match, or `index` unchanged.
    pub(crate) fn literal_match(&self, index: usize, patterns: &[&str]) -> usize {
        let rest = self.rest(index);
        for pattern in patterns {
            if pattern.is_empty() {
                continue;
            }
            if rest.len() >= pattern.len()
                && rest.as_bytes()[..pattern.len()].eq_ignore_ascii_case(pattern.as_bytes())
            {
                return index + pattern.len();
            }
        }
        index
    }

    /// Skips trivia and matches one of `patterns`, adding a leaf node
    /// on success. Trivia nodes are only committed when the token
    /// matches.
    pub(crate) fn token(
        &self,
        nodes: &mut Vec<ParseNode>,
        node_type: ParseNodeType,
        index: usize,
        patterns: &[&str],
    ) -> usize {
        let mut buffer = Vec::new();
        let start = self.skip_space(&mut buffer, index);
        let next = self.literal_match(start, patterns);
        if next == start {
            return index;
        }
        buffer.push(ParseNode::leaf(node_type, start, next - start));
        nodes.extend(buffer);
        next
    }

    /// Like `token`, but requires a word boundary after the match so
    /// `in` does not swallow the start of `index`.
    pub(crate) fn word_token(
        &self,
        nodes: &mut Vec<ParseNode>,
        node_type: ParseNodeType,
        index: usize,
        word: &str,
    ) -> usize {
        let mut buffer = Vec::new();
        let start = self.skip_space(&mut buffer, index);
        let next = self.literal_match(start, &[word]);
        if next == start {
            return index;
        }
        if let Some(ch) = self.rest(next).chars().next() {
            if syntax::is_identifier_other_char(ch) {
                return index;
            }
        }
        buffer.push(ParseNode::leaf(node_type, start, next - start));
        nodes.extend(buffer);
        next
    }

    pub(crate) fn keyword(&self, nodes: &mut Vec<ParseNode>, index: usize, word: &str) -> usize {
        self.word_token(nodes, ParseNodeType::KeyWord, index, word)
    }

    /// An identifier that is not a reserved word.
    pub(crate) fn identifier(&self, nodes: &mut Vec<ParseNode>, index: usize) -> Option<IdenRes> {
        let mut buffer = Vec::new();
        let start = self.skip_space(&mut buffer, index);
        let mut chars = self.rest(start).chars();
        let first = chars.next()?;
        if !syntax::is_identifier_first_char(first) {
            return None;
        }
        let mut end = start + first.len_utf8();
        for ch in chars {
            if syntax::is_identifier_other_char(ch) {
                end += ch.len_utf8();
            } else {
                break;
            }
        }
        let name = self.src[start..end].to_string();
        if syntax::is_keyword(&name) {
            return None;
        }
        buffer.push(ParseNode::leaf(ParseNodeType::Identifier, start, end - start));
        nodes.extend(buffer);
        Some(IdenRes {
            next: end,
            lower: name.to_lowercase(),
            name,
            start,
            len: end - start,
        })
    }
}
