//! Operator tables, reserved words, and character classes shared by the
//! parser and the default binding provider.

/// Infix operator symbols grouped by binding level, tightest first.
/// Within a level, longer symbols come before their prefixes so the
/// matcher never stops early on `>` when `>=` is present.
pub const OPERATOR_LEVELS: &[&[&str]] = &[
    &["^"],
    &["*", "div", "/", "%"],
    &["+", "-"],
    &[">=", "<=", "!=", ">", "<", "in"],
    &["==", "=", "??", "?!", "?."],
    &["or", "and"],
];

/// Prefix operator symbol and the function name it binds to.
pub const PREFIX_OPERATORS: &[(&str, &str)] = &[("!", "!"), ("not", "not"), ("-", "negate")];

/// Words the grammar consumes; identifiers may not shadow them.
pub const KEYWORDS: &[&str] = &["return", "case", "switch", "then", "else"];

pub const KW_RETURN: &str = "return";
pub const KW_IF: &str = "if";
pub const KW_THEN: &str = "then";
pub const KW_ELSE: &str = "else";
pub const KW_CASE: &str = "case";
pub const KW_SWITCH: &str = "switch";

/// Symbol the string-template desugaring binds its parts to.
pub const TEMPLATE_CONCAT: &str = "strcat";

pub fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|kw| kw.eq_ignore_ascii_case(word))
}

pub fn is_identifier_first_char(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

pub fn is_identifier_other_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

pub fn is_whitespace_char(ch: char) -> bool {
    ch == ' ' || ch == '\t' || ch == '\r' || ch == '\n'
}
