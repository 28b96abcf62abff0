//! The default binding provider.
//!
//! These are the functions the parser binds at parse time: the operator
//! table symbols, the `if`/`case`/`switch` keyword forms, member
//! access, and the string-template concatenation. Themed libraries
//! (text, date, OS and the like) stay outside the core; hosts layer
//! them over [`default_env`] the same way they layer data.
//!
//! Every function here observes the error-passthrough rule: a forced
//! argument that is already an error value is returned as-is, untouched.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::env::{merge, EnvRef, MapEnv};
use crate::error::EvalResult;
use crate::format;
use crate::func::{arg, CallStyle, Callable};
use crate::list::{collect_items, ListRef};
use crate::syntax;
use crate::value::{common_numeric, compare_values, values_equal, FsError, Value};

/// The provider expressions parse and evaluate against by default.
pub fn default_env() -> EnvRef {
    let pairs = BUILTINS
        .iter()
        .map(|builtin| {
            (
                builtin.symbol.to_string(),
                Value::Function(Arc::new(*builtin)),
            )
        })
        .collect();
    Arc::new(MapEnv::new(None, pairs))
}

#[derive(Clone, Copy)]
struct Builtin {
    symbol: &'static str,
    max_args: i32,
    func: fn(&str, &ListRef) -> EvalResult<Value>,
}

impl Callable for Builtin {
    fn symbol(&self) -> &str {
        self.symbol
    }

    // All defaults report Prefix even though the parser places the
    // operator symbols infix through its own tables. Reporting Dual
    // would route the alphabetic ones (`and`, `in`, ...) through the
    // general-infix probe, which binds ahead of operator precedence.
    fn call_style(&self) -> CallStyle {
        CallStyle::Prefix
    }

    fn max_args(&self) -> i32 {
        self.max_args
    }

    fn precedence(&self) -> i32 {
        operator_precedence(self.symbol)
    }

    fn eval(&self, args: &ListRef) -> EvalResult<Value> {
        if self.max_args >= 0 && args.len() > self.max_args as usize {
            return Ok(Value::error(FsError::invalid_parameter(format!(
                "'{}' takes at most {} parameters, {} given",
                self.symbol,
                self.max_args,
                args.len()
            ))));
        }
        (self.func)(self.symbol, args)
    }
}

const BUILTINS: &[Builtin] = &[
    Builtin { symbol: "+", max_args: -1, func: op_add },
    Builtin { symbol: "-", max_args: -1, func: op_subtract },
    Builtin { symbol: "*", max_args: -1, func: op_multiply },
    Builtin { symbol: "/", max_args: -1, func: op_divide },
    Builtin { symbol: "div", max_args: -1, func: op_int_divide },
    Builtin { symbol: "%", max_args: -1, func: op_remainder },
    Builtin { symbol: "^", max_args: -1, func: op_power },
    Builtin { symbol: ">", max_args: -1, func: op_greater },
    Builtin { symbol: "<", max_args: -1, func: op_less },
    Builtin { symbol: ">=", max_args: -1, func: op_greater_or_equal },
    Builtin { symbol: "<=", max_args: -1, func: op_less_or_equal },
    Builtin { symbol: "==", max_args: -1, func: op_equal },
    Builtin { symbol: "=", max_args: -1, func: op_equal },
    Builtin { symbol: "!=", max_args: -1, func: op_not_equal },
    Builtin { symbol: "in", max_args: 2, func: op_in },
    Builtin { symbol: "??", max_args: -1, func: op_coalesce },
    Builtin { symbol: "?!", max_args: 2, func: op_when_present },
    Builtin { symbol: "?.", max_args: 2, func: op_safe_member },
    Builtin { symbol: ".", max_args: 2, func: op_member },
    Builtin { symbol: "and", max_args: -1, func: op_and },
    Builtin { symbol: "or", max_args: -1, func: op_or },
    Builtin { symbol: "!", max_args: 1, func: op_not },
    Builtin { symbol: "not", max_args: 1, func: op_not },
    Builtin { symbol: "negate", max_args: 1, func: op_negate },
    Builtin { symbol: "if", max_args: 3, func: op_if },
    Builtin { symbol: "case", max_args: -1, func: op_case },
    Builtin { symbol: "switch", max_args: -1, func: op_switch },
    Builtin { symbol: "strcat", max_args: -1, func: op_strcat },
];

fn operator_precedence(symbol: &str) -> i32 {
    for (level, symbols) in syntax::OPERATOR_LEVELS.iter().enumerate() {
        if symbols.contains(&symbol) {
            return (syntax::OPERATOR_LEVELS.len() - level) as i32;
        }
    }
    0
}

fn forced(args: &ListRef, index: usize) -> EvalResult<Value> {
    arg(args.as_ref(), index)
}

fn mismatch(symbol: &str, left: &Value, right: &Value) -> Value {
    Value::error(FsError::type_mismatch(format!(
        "'{symbol}' is not defined between {} and {}",
        left.kind_name(),
        right.kind_name()
    )))
}

fn boolean_expected(symbol: &str, value: &Value) -> Value {
    Value::error(FsError::type_mismatch(format!(
        "'{symbol}' requires a boolean, not {}",
        value.kind_name()
    )))
}

/// Forces the arguments left to right and folds them pairwise, passing
/// error values straight through.
fn fold_pairs(
    symbol: &str,
    args: &ListRef,
    combine: fn(&str, Value, Value) -> EvalResult<Value>,
) -> EvalResult<Value> {
    let mut acc = forced(args, 0)?;
    if matches!(acc, Value::Error(_)) {
        return Ok(acc);
    }
    for index in 1..args.len() {
        let next = forced(args, index)?;
        if matches!(next, Value::Error(_)) {
            return Ok(next);
        }
        acc = combine(symbol, acc, next)?;
        if matches!(acc, Value::Error(_)) {
            break;
        }
    }
    Ok(acc)
}

fn numeric_pair(
    symbol: &str,
    left: &Value,
    right: &Value,
    ints: fn(i32, i32) -> i32,
    longs: fn(i64, i64) -> i64,
    floats: fn(f64, f64) -> f64,
) -> Value {
    match common_numeric(left, right) {
        Some((Value::Int(x), Value::Int(y))) => Value::Int(ints(x, y)),
        Some((Value::Long(x), Value::Long(y))) => Value::Long(longs(x, y)),
        Some((Value::Float(x), Value::Float(y))) => Value::Float(floats(x, y)),
        _ => mismatch(symbol, left, right),
    }
}

fn op_add(symbol: &str, args: &ListRef) -> EvalResult<Value> {
    fold_pairs(symbol, args, |symbol, left, right| {
        if left.is_numeric() && right.is_numeric() {
            return Ok(numeric_pair(
                symbol,
                &left,
                &right,
                i32::wrapping_add,
                i64::wrapping_add,
                |x, y| x + y,
            ));
        }
        match (left, right) {
            (Value::Text(mut text), other) => {
                text.push_str(&format::display(&other)?);
                Ok(Value::Text(text))
            }
            (Value::List(first), Value::List(second)) => {
                let mut items = collect_items(first.as_ref())?;
                items.extend(collect_items(second.as_ref())?);
                Ok(Value::list(items))
            }
            (Value::Record(first), Value::Record(second)) => merge(&first, &second),
            (left, right) => Ok(mismatch(symbol, &left, &right)),
        }
    })
}

fn op_subtract(symbol: &str, args: &ListRef) -> EvalResult<Value> {
    fold_pairs(symbol, args, |symbol, left, right| {
        Ok(numeric_pair(
            symbol,
            &left,
            &right,
            i32::wrapping_sub,
            i64::wrapping_sub,
            |x, y| x - y,
        ))
    })
}

fn op_multiply(symbol: &str, args: &ListRef) -> EvalResult<Value> {
    fold_pairs(symbol, args, |symbol, left, right| {
        Ok(numeric_pair(
            symbol,
            &left,
            &right,
            i32::wrapping_mul,
            i64::wrapping_mul,
            |x, y| x * y,
        ))
    })
}

fn division_by_zero(symbol: &str) -> Value {
    Value::error(FsError::invalid_parameter(format!("'{symbol}': division by zero")))
}

fn op_divide(symbol: &str, args: &ListRef) -> EvalResult<Value> {
    fold_pairs(symbol, args, |symbol, left, right| {
        Ok(match common_numeric(&left, &right) {
            Some((Value::Int(x), Value::Int(y))) => {
                if y == 0 {
                    division_by_zero(symbol)
                } else {
                    Value::Int(x.wrapping_div(y))
                }
            }
            Some((Value::Long(x), Value::Long(y))) => {
                if y == 0 {
                    division_by_zero(symbol)
                } else {
                    Value::Long(x.wrapping_div(y))
                }
            }
            Some((Value::Float(x), Value::Float(y))) => Value::Float(x / y),
            _ => mismatch(symbol, &left, &right),
        })
    })
}

fn op_int_divide(symbol: &str, args: &ListRef) -> EvalResult<Value> {
    fold_pairs(symbol, args, |symbol, left, right| {
        Ok(match common_numeric(&left, &right) {
            Some((Value::Int(x), Value::Int(y))) => {
                if y == 0 {
                    division_by_zero(symbol)
                } else {
                    Value::Int(x.wrapping_div(y))
                }
            }
            Some((Value::Long(x), Value::Long(y))) => {
                if y == 0 {
                    division_by_zero(symbol)
                } else {
                    Value::Long(x.wrapping_div(y))
                }
            }
            Some((Value::Float(x), Value::Float(y))) => {
                if y == 0.0 {
                    division_by_zero(symbol)
                } else {
                    Value::Long((x / y).trunc() as i64)
                }
            }
            _ => mismatch(symbol, &left, &right),
        })
    })
}

fn op_remainder(symbol: &str, args: &ListRef) -> EvalResult<Value> {
    fold_pairs(symbol, args, |symbol, left, right| {
        Ok(match common_numeric(&left, &right) {
            Some((Value::Int(x), Value::Int(y))) => {
                if y == 0 {
                    division_by_zero(symbol)
                } else {
                    Value::Int(x.wrapping_rem(y))
                }
            }
            Some((Value::Long(x), Value::Long(y))) => {
                if y == 0 {
                    division_by_zero(symbol)
                } else {
                    Value::Long(x.wrapping_rem(y))
                }
            }
            Some((Value::Float(x), Value::Float(y))) => Value::Float(x % y),
            _ => mismatch(symbol, &left, &right),
        })
    })
}

fn op_power(symbol: &str, args: &ListRef) -> EvalResult<Value> {
    fold_pairs(symbol, args, |symbol, left, right| {
        Ok(match common_numeric(&left, &right) {
            Some((Value::Int(x), Value::Int(y))) => Value::Float(f64::from(x).powf(f64::from(y))),
            Some((Value::Long(x), Value::Long(y))) => Value::Float((x as f64).powf(y as f64)),
            Some((Value::Float(x), Value::Float(y))) => Value::Float(x.powf(y)),
            _ => mismatch(symbol, &left, &right),
        })
    })
}

/// `a < b < c` collapses into one call; all adjacent pairs must hold.
fn chained_comparison(
    symbol: &str,
    args: &ListRef,
    accept: fn(Ordering) -> bool,
) -> EvalResult<Value> {
    let mut previous = forced(args, 0)?;
    if matches!(previous, Value::Error(_)) {
        return Ok(previous);
    }
    for index in 1..args.len() {
        let next = forced(args, index)?;
        if matches!(next, Value::Error(_)) {
            return Ok(next);
        }
        match compare_values(&previous, &next) {
            Some(ordering) if accept(ordering) => {}
            Some(_) => return Ok(Value::Bool(false)),
            None => return Ok(mismatch(symbol, &previous, &next)),
        }
        previous = next;
    }
    Ok(Value::Bool(true))
}

fn op_greater(symbol: &str, args: &ListRef) -> EvalResult<Value> {
    chained_comparison(symbol, args, |ordering| ordering == Ordering::Greater)
}

fn op_less(symbol: &str, args: &ListRef) -> EvalResult<Value> {
    chained_comparison(symbol, args, |ordering| ordering == Ordering::Less)
}

fn op_greater_or_equal(symbol: &str, args: &ListRef) -> EvalResult<Value> {
    chained_comparison(symbol, args, |ordering| ordering != Ordering::Less)
}

fn op_less_or_equal(symbol: &str, args: &ListRef) -> EvalResult<Value> {
    chained_comparison(symbol, args, |ordering| ordering != Ordering::Greater)
}

fn op_equal(_symbol: &str, args: &ListRef) -> EvalResult<Value> {
    let first = forced(args, 0)?;
    if matches!(first, Value::Error(_)) {
        return Ok(first);
    }
    for index in 1..args.len() {
        let next = forced(args, index)?;
        if matches!(next, Value::Error(_)) {
            return Ok(next);
        }
        if !values_equal(&first, &next)? {
            return Ok(Value::Bool(false));
        }
    }
    Ok(Value::Bool(true))
}

fn op_not_equal(_symbol: &str, args: &ListRef) -> EvalResult<Value> {
    let mut previous = forced(args, 0)?;
    if matches!(previous, Value::Error(_)) {
        return Ok(previous);
    }
    for index in 1..args.len() {
        let next = forced(args, index)?;
        if matches!(next, Value::Error(_)) {
            return Ok(next);
        }
        if values_equal(&previous, &next)? {
            return Ok(Value::Bool(false));
        }
        previous = next;
    }
    Ok(Value::Bool(true))
}

fn op_in(symbol: &str, args: &ListRef) -> EvalResult<Value> {
    let needle = forced(args, 0)?;
    if matches!(needle, Value::Error(_)) {
        return Ok(needle);
    }
    let haystack = forced(args, 1)?;
    match haystack {
        Value::Error(_) => Ok(haystack),
        Value::List(list) => {
            for index in 0..list.len() {
                if values_equal(&needle, &list.item(index)?)? {
                    return Ok(Value::Bool(true));
                }
            }
            Ok(Value::Bool(false))
        }
        Value::Text(text) => match needle {
            Value::Text(part) => Ok(Value::Bool(text.contains(&part))),
            other => Ok(mismatch(symbol, &other, &Value::Text(text))),
        },
        Value::Record(record) => match needle {
            Value::Text(key) => Ok(Value::Bool(record.is_defined(&key))),
            other => Ok(mismatch(symbol, &other, &Value::Record(record))),
        },
        other => Ok(mismatch(symbol, &needle, &other)),
    }
}

/// First non-null argument, forcing left to right.
fn op_coalesce(_symbol: &str, args: &ListRef) -> EvalResult<Value> {
    for index in 0..args.len() {
        let value = forced(args, index)?;
        if matches!(value, Value::Error(_)) || !value.is_null() {
            return Ok(value);
        }
    }
    Ok(Value::Null)
}

/// Null-propagating sequencing: null stays null, anything else yields
/// the right-hand value.
fn op_when_present(_symbol: &str, args: &ListRef) -> EvalResult<Value> {
    let first = forced(args, 0)?;
    if matches!(first, Value::Error(_)) || first.is_null() {
        return Ok(first);
    }
    forced(args, 1)
}

fn member_key(symbol: &str, args: &ListRef) -> EvalResult<Result<String, Value>> {
    Ok(match forced(args, 1)? {
        Value::Text(key) => Ok(key),
        error @ Value::Error(_) => Err(error),
        other => Err(Value::error(FsError::type_mismatch(format!(
            "'{symbol}' member name must be a string, not {}",
            other.kind_name()
        )))),
    })
}

fn op_member(symbol: &str, args: &ListRef) -> EvalResult<Value> {
    let target = forced(args, 0)?;
    match target {
        Value::Error(_) => Ok(target),
        Value::Record(record) => match member_key(symbol, args)? {
            Ok(key) => Ok(record.get(&key)?.unwrap_or(Value::Null)),
            Err(error) => Ok(error),
        },
        Value::Null => Ok(Value::error(FsError::type_mismatch(
            "member access on a null value",
        ))),
        other => Ok(Value::error(FsError::type_mismatch(format!(
            "'{symbol}' is not defined on {}",
            other.kind_name()
        )))),
    }
}

fn op_safe_member(symbol: &str, args: &ListRef) -> EvalResult<Value> {
    let target = forced(args, 0)?;
    match target {
        Value::Null | Value::Error(_) => Ok(target),
        Value::Record(record) => match member_key(symbol, args)? {
            Ok(key) => Ok(record.get(&key)?.unwrap_or(Value::Null)),
            Err(error) => Ok(error),
        },
        other => Ok(Value::error(FsError::type_mismatch(format!(
            "'{symbol}' is not defined on {}",
            other.kind_name()
        )))),
    }
}

fn op_and(symbol: &str, args: &ListRef) -> EvalResult<Value> {
    for index in 0..args.len() {
        match forced(args, index)? {
            Value::Bool(true) => {}
            Value::Bool(false) => return Ok(Value::Bool(false)),
            error @ Value::Error(_) => return Ok(error),
            other => return Ok(boolean_expected(symbol, &other)),
        }
    }
    Ok(Value::Bool(true))
}

fn op_or(symbol: &str, args: &ListRef) -> EvalResult<Value> {
    for index in 0..args.len() {
        match forced(args, index)? {
            Value::Bool(false) => {}
            Value::Bool(true) => return Ok(Value::Bool(true)),
            error @ Value::Error(_) => return Ok(error),
            other => return Ok(boolean_expected(symbol, &other)),
        }
    }
    Ok(Value::Bool(false))
}

fn op_not(symbol: &str, args: &ListRef) -> EvalResult<Value> {
    match forced(args, 0)? {
        Value::Bool(value) => Ok(Value::Bool(!value)),
        error @ Value::Error(_) => Ok(error),
        other => Ok(boolean_expected(symbol, &other)),
    }
}

fn op_negate(symbol: &str, args: &ListRef) -> EvalResult<Value> {
    match forced(args, 0)? {
        Value::Int(value) => Ok(Value::Int(value.wrapping_neg())),
        Value::Long(value) => Ok(Value::Long(value.wrapping_neg())),
        Value::Float(value) => Ok(Value::Float(-value)),
        error @ Value::Error(_) => Ok(error),
        other => Ok(Value::error(FsError::type_mismatch(format!(
            "'{symbol}' requires a number, not {}",
            other.kind_name()
        )))),
    }
}

/// Only the selected branch is ever forced; the argument list the
/// evaluator hands over is lazy.
fn op_if(symbol: &str, args: &ListRef) -> EvalResult<Value> {
    if args.len() < 2 {
        return Ok(Value::error(FsError::parameter_count(format!(
            "'{symbol}' expects a condition and at least one branch"
        ))));
    }
    match forced(args, 0)? {
        Value::Bool(true) => forced(args, 1),
        Value::Bool(false) => forced(args, 2),
        error @ Value::Error(_) => Ok(error),
        other => Ok(boolean_expected(symbol, &other)),
    }
}

/// `case c1: v1, c2: v2, default` — conditions force in order; a
/// trailing odd argument is the default.
fn op_case(symbol: &str, args: &ListRef) -> EvalResult<Value> {
    let len = args.len();
    let mut index = 0;
    while index < len {
        if index + 1 == len {
            return forced(args, index);
        }
        match forced(args, index)? {
            Value::Bool(true) => return forced(args, index + 1),
            Value::Bool(false) => {}
            error @ Value::Error(_) => return Ok(error),
            other => return Ok(boolean_expected(symbol, &other)),
        }
        index += 2;
    }
    Ok(Value::Null)
}

/// `switch selector, m1: r1, m2: r2, default` — the selector compares
/// against each match value under numeric promotion.
fn op_switch(_symbol: &str, args: &ListRef) -> EvalResult<Value> {
    let selector = forced(args, 0)?;
    if matches!(selector, Value::Error(_)) {
        return Ok(selector);
    }
    let len = args.len();
    let mut index = 1;
    while index < len {
        if index + 1 == len {
            return forced(args, index);
        }
        let candidate = forced(args, index)?;
        if matches!(candidate, Value::Error(_)) {
            return Ok(candidate);
        }
        if values_equal(&selector, &candidate)? {
            return forced(args, index + 1);
        }
        index += 2;
    }
    Ok(Value::Null)
}

fn op_strcat(_symbol: &str, args: &ListRef) -> EvalResult<Value> {
    let mut out = String::new();
    for index in 0..args.len() {
        let value = forced(args, index)?;
        if matches!(value, Value::Error(_)) {
            return Ok(value);
        }
        out.push_str(&format::display(&value)?);
    }
    Ok(Value::Text(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::ArrayList;
    use crate::value::{ERROR_INVALID_PARAMETER, ERROR_TYPE_MISMATCH};

    fn call(symbol: &str, items: Vec<Value>) -> Value {
        let env = default_env();
        let Some(Value::Function(function)) = env.get(symbol).unwrap() else {
            panic!("'{symbol}' must be bound in the default environment");
        };
        let args: ListRef = Arc::new(ArrayList::new(items));
        function.eval(&args).unwrap()
    }

    #[test]
    fn arithmetic_promotes_to_the_common_kind() {
        assert_eq!(call("+", vec![Value::Int(1), Value::Int(2), Value::Int(3)]), Value::Int(6));
        assert_eq!(call("+", vec![Value::Int(1), Value::Long(2)]), Value::Long(3));
        assert_eq!(call("*", vec![Value::Int(4), Value::Float(0.5)]), Value::Float(2.0));
        assert_eq!(call("-", vec![Value::Int(10), Value::Int(3), Value::Int(2)]), Value::Int(5));
    }

    #[test]
    fn division_by_integer_zero_is_an_error_value() {
        let Value::Error(error) = call("/", vec![Value::Int(1), Value::Int(0)]) else {
            panic!("expected error value");
        };
        assert_eq!(error.error_type, ERROR_INVALID_PARAMETER);
        assert_eq!(
            call("/", vec![Value::Float(1.0), Value::Float(0.0)]),
            Value::Float(f64::INFINITY)
        );
    }

    #[test]
    fn text_concatenation_and_list_concatenation_ride_plus() {
        assert_eq!(
            call("+", vec![Value::Text("a".into()), Value::Int(1)]),
            Value::Text("a1".into())
        );
        assert_eq!(
            call(
                "+",
                vec![
                    Value::list(vec![Value::Int(1)]),
                    Value::list(vec![Value::Int(2)])
                ]
            ),
            Value::list(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn plus_merges_records_deeply() {
        let left = Value::record(vec![(
            "inner".to_string(),
            Value::record(vec![("x".to_string(), Value::Int(1))]),
        )]);
        let right = Value::record(vec![(
            "inner".to_string(),
            Value::record(vec![("y".to_string(), Value::Int(2))]),
        )]);
        let Value::Record(merged) = call("+", vec![left, right]) else {
            panic!("expected record");
        };
        let Some(Value::Record(inner)) = merged.get("inner").unwrap() else {
            panic!("expected nested record");
        };
        assert!(inner.is_defined("x") && inner.is_defined("y"));
    }

    #[test]
    fn comparisons_chain_over_all_operands() {
        assert_eq!(
            call("<", vec![Value::Int(1), Value::Long(2), Value::Float(3.0)]),
            Value::Bool(true)
        );
        assert_eq!(
            call("<", vec![Value::Int(1), Value::Int(3), Value::Int(2)]),
            Value::Bool(false)
        );
        let Value::Error(error) = call(">", vec![Value::Int(1), Value::Bool(true)]) else {
            panic!("expected error value");
        };
        assert_eq!(error.error_type, ERROR_TYPE_MISMATCH);
    }

    #[test]
    fn equality_promotes_numerics() {
        assert_eq!(call("==", vec![Value::Int(2), Value::Long(2)]), Value::Bool(true));
        assert_eq!(call("=", vec![Value::Int(2), Value::Float(2.5)]), Value::Bool(false));
        assert_eq!(call("!=", vec![Value::Int(2), Value::Int(3)]), Value::Bool(true));
    }

    #[test]
    fn membership_covers_lists_text_and_records() {
        let list = Value::list(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(call("in", vec![Value::Long(2), list]), Value::Bool(true));
        assert_eq!(
            call("in", vec![Value::Text("ev".into()), Value::Text("keva".into())]),
            Value::Bool(true)
        );
        let record = Value::record(vec![("key".to_string(), Value::Null)]);
        assert_eq!(
            call("in", vec![Value::Text("KEY".into()), record]),
            Value::Bool(true)
        );
    }

    #[test]
    fn coalesce_picks_the_first_present_value() {
        assert_eq!(
            call("??", vec![Value::Null, Value::Null, Value::Int(3)]),
            Value::Int(3)
        );
        assert_eq!(call("??", vec![Value::Null, Value::Null]), Value::Null);
        assert_eq!(
            call("?!", vec![Value::Null, Value::Int(1)]),
            Value::Null
        );
        assert_eq!(
            call("?!", vec![Value::Int(0), Value::Int(1)]),
            Value::Int(1)
        );
    }

    #[test]
    fn member_access_distinguishes_null_safety() {
        let record = Value::record(vec![("name".to_string(), Value::Text("k".into()))]);
        assert_eq!(
            call(".", vec![record.clone(), Value::Text("name".into())]),
            Value::Text("k".into())
        );
        assert_eq!(
            call("?.", vec![Value::Null, Value::Text("name".into())]),
            Value::Null
        );
        let Value::Error(error) = call(".", vec![Value::Null, Value::Text("name".into())]) else {
            panic!("expected error value");
        };
        assert_eq!(error.error_type, ERROR_TYPE_MISMATCH);
        assert_eq!(
            call(".", vec![record, Value::Text("missing".into())]),
            Value::Null
        );
    }

    #[test]
    fn branching_forms_select_and_default() {
        assert_eq!(
            call("if", vec![Value::Bool(true), Value::Int(1), Value::Int(2)]),
            Value::Int(1)
        );
        assert_eq!(
            call("if", vec![Value::Bool(false), Value::Int(1)]),
            Value::Null
        );
        assert_eq!(
            call(
                "case",
                vec![
                    Value::Bool(false),
                    Value::Int(1),
                    Value::Bool(true),
                    Value::Int(2),
                    Value::Int(99)
                ]
            ),
            Value::Int(2)
        );
        assert_eq!(
            call("case", vec![Value::Bool(false), Value::Int(1), Value::Int(99)]),
            Value::Int(99)
        );
        assert_eq!(
            call(
                "switch",
                vec![
                    Value::Int(2),
                    Value::Long(2),
                    Value::Text("two".into()),
                    Value::Text("other".into())
                ]
            ),
            Value::Text("two".into())
        );
    }

    #[test]
    fn error_values_pass_through_untouched() {
        let error = Value::error(FsError::type_mismatch("boom"));
        let Value::Error(out) = call("+", vec![Value::Int(1), error]) else {
            panic!("expected passthrough");
        };
        assert_eq!(out.message, "boom");
    }

    #[test]
    fn operator_metadata_reflects_the_parse_tables() {
        let env = default_env();
        let Some(Value::Function(power)) = env.get("^").unwrap() else {
            panic!("'^' must be bound");
        };
        let Some(Value::Function(or)) = env.get("or").unwrap() else {
            panic!("'or' must be bound");
        };
        assert!(power.precedence() > or.precedence());
        assert_eq!(power.call_style(), CallStyle::Prefix);
    }
}
