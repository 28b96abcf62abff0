//! Value formatting: display text, re-parseable literal text, and the
//! JSON bridge.
//!
//! Containers render on one line while they fit and break into an
//! indented block when they grow past the wrap width. The literal form
//! of the scalar kinds parses back to an equal value.

use std::fmt::Write as _;

use crate::env::EnvRef;
use crate::error::EvalResult;
use crate::list::ListRef;
use crate::value::Value;

const WRAP_WIDTH: usize = 72;
const INDENT: &str = "  ";
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Human-facing text: a top-level string renders bare, everything else
/// as its literal form.
pub fn display(value: &Value) -> EvalResult<String> {
    match value {
        Value::Text(text) => Ok(text.clone()),
        other => literal(other),
    }
}

/// Source-shaped text. Scalars round-trip through the parser; lists and
/// records recurse, so containers of literals round-trip too.
pub fn literal(value: &Value) -> EvalResult<String> {
    let mut out = String::new();
    write_value(&mut out, value, 0)?;
    Ok(out)
}

fn write_value(out: &mut String, value: &Value, indent: usize) -> EvalResult<()> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Int(number) => {
            let _ = write!(out, "{number}");
        }
        Value::Long(number) => {
            let _ = write!(out, "{number}l");
        }
        Value::Float(number) => out.push_str(&float_text(*number)),
        Value::Text(text) => out.push_str(&quoted(text)),
        Value::DateTime(stamp) => {
            let _ = write!(out, "\"{}\"", stamp.format(DATE_TIME_FORMAT));
        }
        Value::Guid(guid) => {
            let _ = write!(out, "\"{guid}\"");
        }
        Value::Bytes(bytes) => out.push_str(&quoted(&hex_text(bytes))),
        Value::List(list) => write_list(out, list, indent)?,
        Value::Record(record) => write_record(out, record, indent)?,
        Value::Function(function) => {
            let _ = write!(out, "function '{}'", function.symbol());
        }
        Value::Error(error) => {
            let _ = write!(out, "error: {error}");
        }
    }
    Ok(())
}

fn write_list(out: &mut String, list: &ListRef, indent: usize) -> EvalResult<()> {
    let mut parts = Vec::with_capacity(list.len());
    for index in 0..list.len() {
        let mut part = String::new();
        write_value(&mut part, &list.item(index)?, indent + 1)?;
        parts.push(part);
    }
    write_joined(out, "[", parts, "]", indent);
    Ok(())
}

fn write_record(out: &mut String, record: &EnvRef, indent: usize) -> EvalResult<()> {
    let entries = record.entries()?;
    let mut parts = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        let mut part = String::new();
        let _ = write!(part, "{key}: ");
        write_value(&mut part, &value, indent + 1)?;
        parts.push(part);
    }
    write_joined(out, "{", parts, "}", indent);
    Ok(())
}

fn write_joined(out: &mut String, open: &str, parts: Vec<String>, close: &str, indent: usize) {
    if parts.is_empty() {
        out.push_str(open);
        out.push_str(close);
        return;
    }
    let flat_width: usize = parts.iter().map(|part| part.len() + 2).sum::<usize>() + 2;
    let multiline = flat_width > WRAP_WIDTH || parts.iter().any(|part| part.contains('\n'));
    if !multiline {
        out.push_str(open);
        out.push_str(&parts.join(", "));
        out.push_str(close);
        return;
    }

    out.push_str(open);
    for (index, part) in parts.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        out.push('\n');
        out.push_str(&INDENT.repeat(indent + 1));
        out.push_str(part);
    }
    out.push('\n');
    out.push_str(&INDENT.repeat(indent));
    out.push_str(close);
}

fn float_text(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    // Debug formatting is the shortest representation that parses back
    // to the same bits, and always keeps a fraction or exponent.
    format!("{value:?}")
}

fn quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            ch => out.push(ch),
        }
    }
    out.push('"');
    out
}

fn hex_text(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Converts into the serde_json model, forcing lazy containers.
pub fn to_json(value: &Value) -> EvalResult<serde_json::Value> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(flag) => serde_json::Value::Bool(*flag),
        Value::Int(number) => serde_json::Value::from(*number),
        Value::Long(number) => serde_json::Value::from(*number),
        Value::Float(number) => serde_json::Number::from_f64(*number)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(text) => serde_json::Value::from(text.as_str()),
        Value::DateTime(stamp) => {
            serde_json::Value::from(stamp.format(DATE_TIME_FORMAT).to_string())
        }
        Value::Guid(guid) => serde_json::Value::from(guid.to_string()),
        Value::Bytes(bytes) => serde_json::Value::from(hex_text(bytes)),
        Value::List(list) => {
            let mut items = Vec::with_capacity(list.len());
            for index in 0..list.len() {
                items.push(to_json(&list.item(index)?)?);
            }
            serde_json::Value::Array(items)
        }
        Value::Record(record) => {
            let mut object = serde_json::Map::new();
            for (key, value) in record.entries()? {
                object.insert(key, to_json(&value)?);
            }
            serde_json::Value::Object(object)
        }
        Value::Function(function) => {
            serde_json::Value::from(format!("function '{}'", function.symbol()))
        }
        Value::Error(error) => {
            let mut object = serde_json::Map::new();
            object.insert(
                "error".to_string(),
                serde_json::Value::from(error.error_type.as_str()),
            );
            object.insert(
                "message".to_string(),
                serde_json::Value::from(error.message.as_str()),
            );
            serde_json::Value::Object(object)
        }
    })
}

pub fn json_text(value: &Value) -> EvalResult<String> {
    Ok(to_json(value)?.to_string())
}

/// Normalizes host JSON into the closed value set. Integral numbers
/// land in the narrowest integer kind that holds them.
pub fn from_json(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(flag) => Value::Bool(*flag),
        serde_json::Value::Number(number) => match number.as_i64() {
            Some(integral) => match i32::try_from(integral) {
                Ok(small) => Value::Int(small),
                Err(_) => Value::Long(integral),
            },
            None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(text) => Value::Text(text.clone()),
        serde_json::Value::Array(items) => Value::list(items.iter().map(from_json).collect()),
        serde_json::Value::Object(map) => Value::record(
            map.iter()
                .map(|(key, value)| (key.clone(), from_json(value)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_literals_read_back_as_written() {
        assert_eq!(literal(&Value::Int(42)).unwrap(), "42");
        assert_eq!(literal(&Value::Long(42)).unwrap(), "42l");
        assert_eq!(literal(&Value::Float(2.0)).unwrap(), "2.0");
        assert_eq!(literal(&Value::Bool(false)).unwrap(), "false");
        assert_eq!(literal(&Value::Null).unwrap(), "null");
        assert_eq!(
            literal(&Value::Text("a \"b\"\nc".into())).unwrap(),
            "\"a \\\"b\\\"\\nc\""
        );
    }

    #[test]
    fn display_leaves_top_level_text_bare() {
        assert_eq!(display(&Value::Text("hello".into())).unwrap(), "hello");
        assert_eq!(
            display(&Value::list(vec![Value::Text("a".into())])).unwrap(),
            "[\"a\"]"
        );
    }

    #[test]
    fn short_containers_stay_on_one_line() {
        let record = Value::record(vec![
            ("a".to_string(), Value::Int(1)),
            ("b".to_string(), Value::list(vec![Value::Int(2), Value::Int(3)])),
        ]);
        assert_eq!(literal(&record).unwrap(), "{a: 1, b: [2, 3]}");
    }

    #[test]
    fn long_containers_break_into_an_indented_block() {
        let items = (0..12)
            .map(|index| Value::Text(format!("element number {index}")))
            .collect();
        let rendered = literal(&Value::list(items)).unwrap();
        assert!(rendered.starts_with("[\n"));
        assert!(rendered.contains("\n  \"element number 0\","));
        assert!(rendered.ends_with("\n]"));
    }

    #[test]
    fn json_bridge_narrows_and_widens_numbers() {
        let json = serde_json::json!({"small": 1, "big": 5_000_000_000i64, "frac": 0.5});
        let Value::Record(record) = from_json(&json) else {
            panic!("expected record");
        };
        assert_eq!(record.get("small").unwrap(), Some(Value::Int(1)));
        assert_eq!(record.get("big").unwrap(), Some(Value::Long(5_000_000_000)));
        assert_eq!(record.get("frac").unwrap(), Some(Value::Float(0.5)));
    }

    #[test]
    fn json_round_trip_preserves_structure() {
        let value = Value::record(vec![
            ("name".to_string(), Value::Text("keva".into())),
            ("tags".to_string(), Value::list(vec![Value::Int(1), Value::Bool(true)])),
        ]);
        let json = to_json(&value).unwrap();
        assert_eq!(from_json(&json), value);
    }

    #[test]
    fn errors_render_with_their_type() {
        let error = Value::error(crate::value::FsError::type_mismatch("bad operand"));
        let rendered = display(&error).unwrap();
        assert!(rendered.contains("bad operand"));
        assert!(rendered.contains("TYPE_MISMATCH"));
    }
}
