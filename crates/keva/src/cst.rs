//! The descriptive syntax tree.
//!
//! Built in lock-step with parsing and retained independently of the
//! AST so tooling (highlighters, folding, incremental analysis) can
//! consume spans without evaluating anything. Whitespace and comments
//! are leaf kinds of their own, which keeps the tree span-exact against
//! the original text.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::diagnostics::{Span, SyntaxErrorData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseNodeType {
    RootExpression,
    WhiteSpace,
    Comment,
    Identifier,
    Key,
    KeyWord,
    LiteralNumber,
    LiteralString,
    StringTemplate,
    Operator,
    PrefixOperatorExpression,
    InfixExpression,
    GeneralInfixExpression,
    ThirdOperandSeparator,
    FunctionParameterList,
    IdentifierList,
    MemberAccess,
    Selector,
    List,
    ListSeparator,
    KeyValuePair,
    KeyValueCollection,
    Colon,
    OpenBrace,
    CloseBrace,
    LambdaArrow,
    LambdaExpression,
    ExpressionInBrace,
    IfExpression,
    CaseExpression,
    LanguageBinding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseNode {
    pub node_type: ParseNodeType,
    pub pos: usize,
    pub length: usize,
    pub children: Vec<ParseNode>,
}

impl ParseNode {
    pub fn new(
        node_type: ParseNodeType,
        pos: usize,
        length: usize,
        children: Vec<ParseNode>,
    ) -> Self {
        Self {
            node_type,
            pos,
            length,
            children,
        }
    }

    pub fn leaf(node_type: ParseNodeType, pos: usize, length: usize) -> Self {
        Self::new(node_type, pos, length, Vec::new())
    }

    pub fn span(&self) -> Span {
        Span::new(self.pos, self.length)
    }

    pub fn end(&self) -> usize {
        self.pos + self.length
    }
}

/// Flattens a node tree into contiguous leaf runs for highlighting.
///
/// Gaps between children are attributed to the enclosing node's kind, so
/// the output covers the input span without holes.
pub fn color_nodes(node: &ParseNode) -> Vec<ParseNode> {
    if node.length == 0 {
        return Vec::new();
    }
    if node.children.is_empty() {
        return vec![node.clone()];
    }

    let mut out = Vec::new();
    let mut cursor = node.pos;
    for child in &node.children {
        if child.pos > cursor {
            out.push(ParseNode::leaf(node.node_type, cursor, child.pos - cursor));
        }
        out.extend(color_nodes(child));
        cursor = child.end().max(cursor);
    }
    if cursor < node.end() {
        out.push(ParseNode::leaf(node.node_type, cursor, node.end() - cursor));
    }
    out
}

/// Spans an editor can fold: record/list bodies and lambda expressions.
pub fn fold_regions(node: &ParseNode) -> Vec<Span> {
    let mut regions = Vec::new();
    collect_fold_regions(node, &mut regions);
    regions
}

fn collect_fold_regions(node: &ParseNode, out: &mut Vec<Span>) {
    match node.node_type {
        ParseNodeType::KeyValueCollection
        | ParseNodeType::List
        | ParseNodeType::LambdaExpression => out.push(node.span()),
        _ => {}
    }
    for child in &node.children {
        collect_fold_regions(child, out);
    }
}

/// One parse worth of tooling state.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub root: Option<ParseNode>,
    pub errors: Vec<SyntaxErrorData>,
}

/// Fingerprint of a document version, for cache keys.
pub fn fingerprint(src: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    src.hash(&mut hasher);
    hasher.finish()
}

/// Caches analyses keyed by document-version fingerprint so editors can
/// re-request tooling data without re-parsing unchanged text.
#[derive(Default)]
pub struct AnalysisCache {
    entries: Mutex<HashMap<u64, Arc<Analysis>>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, fingerprint: u64) -> Option<Arc<Analysis>> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(&fingerprint).cloned())
    }

    pub fn get_or_insert_with(
        &self,
        fingerprint: u64,
        build: impl FnOnce() -> Analysis,
    ) -> Arc<Analysis> {
        if let Some(found) = self.get(fingerprint) {
            return found;
        }
        let analysis = Arc::new(build());
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(fingerprint, analysis.clone());
        }
        analysis
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_nodes_cover_the_span_without_gaps() {
        let root = ParseNode::new(
            ParseNodeType::RootExpression,
            0,
            10,
            vec![
                ParseNode::leaf(ParseNodeType::Identifier, 0, 3),
                ParseNode::leaf(ParseNodeType::Operator, 5, 1),
                ParseNode::leaf(ParseNodeType::LiteralNumber, 8, 2),
            ],
        );
        let colored = color_nodes(&root);
        let mut cursor = 0;
        for node in &colored {
            assert_eq!(node.pos, cursor, "contiguous coverage");
            cursor = node.end();
        }
        assert_eq!(cursor, 10);
        assert!(colored
            .iter()
            .any(|n| n.node_type == ParseNodeType::RootExpression && n.pos == 3));
    }

    #[test]
    fn fold_regions_pick_container_nodes() {
        let root = ParseNode::new(
            ParseNodeType::RootExpression,
            0,
            12,
            vec![ParseNode::new(
                ParseNodeType::KeyValueCollection,
                0,
                12,
                vec![ParseNode::new(ParseNodeType::List, 4, 6, Vec::new())],
            )],
        );
        let regions = fold_regions(&root);
        assert_eq!(regions, vec![Span::new(0, 12), Span::new(4, 6)]);
    }

    #[test]
    fn analysis_cache_reuses_by_fingerprint() {
        let cache = AnalysisCache::new();
        let key = fingerprint("{a: 1}");
        let first = cache.get_or_insert_with(key, || Analysis {
            root: None,
            errors: Vec::new(),
        });
        let second = cache.get_or_insert_with(key, || unreachable!("cached"));
        assert!(Arc::ptr_eq(&first, &second));
        assert_ne!(key, fingerprint("{a: 2}"));
    }
}
