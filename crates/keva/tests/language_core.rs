//! End-to-end coverage of the language semantics: operators, records,
//! scoping, laziness, and the depth guard.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use keva::{
    evaluate, evaluate_with, evaluate_with_options, Callable, EvalResult, ListRef, ParseOptions,
    Value, ERROR_EVALUATION_DEPTH_OVERFLOW,
};

struct Probe {
    calls: AtomicUsize,
}

impl Callable for Probe {
    fn symbol(&self) -> &str {
        "probe"
    }

    fn eval(&self, _args: &ListRef) -> EvalResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Int(99))
    }
}

fn env_with_probe() -> (keva::EnvRef, Arc<Probe>) {
    let probe = Arc::new(Probe {
        calls: AtomicUsize::new(0),
    });
    let env = keva::host_env(vec![(
        "probe".to_string(),
        Value::Function(probe.clone()),
    )]);
    (env, probe)
}

#[test]
fn arithmetic_and_precedence() {
    assert_eq!(evaluate("1+2*3").unwrap(), Value::Int(7));
    assert_eq!(evaluate("(1+2)*3").unwrap(), Value::Int(9));
    assert_eq!(evaluate("10 - 2 - 3").unwrap(), Value::Int(5));
    assert_eq!(evaluate("7 div 2").unwrap(), Value::Int(3));
    assert_eq!(evaluate("10 % 3").unwrap(), Value::Int(1));
    assert_eq!(evaluate("2^3").unwrap(), Value::Float(8.0));
    assert_eq!(evaluate("1.5 + 1").unwrap(), Value::Float(2.5));
    assert_eq!(evaluate("-3 + 5").unwrap(), Value::Int(2));
}

#[test]
fn comparisons_and_logic() {
    assert_eq!(evaluate("1 < 2 and 2 < 3").unwrap(), Value::Bool(true));
    assert_eq!(evaluate("1 < 2 and 3 < 2").unwrap(), Value::Bool(false));
    assert_eq!(evaluate("not (1 == 2)").unwrap(), Value::Bool(true));
    assert_eq!(evaluate("2 >= 2").unwrap(), Value::Bool(true));
    assert_eq!(evaluate("\"a\" < \"b\"").unwrap(), Value::Bool(true));
    assert_eq!(evaluate("2 in [1, 2, 3]").unwrap(), Value::Bool(true));
}

#[test]
fn branching_forms() {
    assert_eq!(
        evaluate("if 2 > 1 then \"yes\" else \"no\"").unwrap(),
        Value::Text("yes".into())
    );
    assert_eq!(
        evaluate("case 1 > 2: \"a\", 2 > 1: \"b\", \"c\"").unwrap(),
        Value::Text("b".into())
    );
    assert_eq!(
        evaluate("switch 2, 1: \"one\", 2: \"two\", \"other\"").unwrap(),
        Value::Text("two".into())
    );
    assert_eq!(
        evaluate("switch 9, 1: \"one\", \"fallback\"").unwrap(),
        Value::Text("fallback".into())
    );
}

#[test]
fn string_templates_concatenate() {
    assert_eq!(
        evaluate("f\"a{1+1}b\"").unwrap(),
        Value::Text("a2b".into())
    );
    assert_eq!(
        evaluate("f\"{1} and {true}\"").unwrap(),
        Value::Text("1 and true".into())
    );
}

#[test]
fn record_bindings_resolve_forward_and_mutually() {
    // P3: textual order of siblings does not matter.
    let Value::Record(record) = evaluate("{a: b + 1, b: 2}").unwrap() else {
        panic!("expected record");
    };
    assert_eq!(record.get("a").unwrap(), Some(Value::Int(3)));

    assert_eq!(
        evaluate("{even: n => if n == 0 then true else odd(n - 1), odd: n => if n == 0 then false else even(n - 1), return even(10)}")
            .unwrap(),
        Value::Bool(true)
    );
}

#[test]
fn record_bindings_are_lazy_and_recomputed() {
    // P2: an unread binding never runs.
    let (env, probe) = env_with_probe();
    let Value::Record(record) = evaluate_with(&env, "{a: probe(), b: 1}").unwrap() else {
        panic!("expected record");
    };
    assert_eq!(record.get("b").unwrap(), Some(Value::Int(1)));
    assert_eq!(probe.calls.load(Ordering::SeqCst), 0);

    // No memoization: each read evaluates again.
    assert_eq!(record.get("a").unwrap(), Some(Value::Int(99)));
    assert_eq!(record.get("a").unwrap(), Some(Value::Int(99)));
    assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn list_elements_are_lazy() {
    // Indexing forces only the selected element; the division by zero
    // in the middle never happens.
    assert_eq!(evaluate("[1, 1/0, 3](0)").unwrap(), Value::Int(1));
    let Value::Error(error) = evaluate("[1, 1/0, 3](1)").unwrap() else {
        panic!("expected error value");
    };
    assert!(error.message.contains("division by zero"));
}

#[test]
fn reference_modes_follow_the_binding_position() {
    // P4: the same name, three resolution policies.
    let env = keva::host_env(vec![("a".to_string(), Value::Int(10))]);

    // The value of `a` names its own key, so it prefers the ancestor.
    let Value::Record(record) = evaluate_with(&env, "{a: a + 1}").unwrap() else {
        panic!("expected record");
    };
    assert_eq!(record.get("a").unwrap(), Some(Value::Int(11)));

    // A sibling reference is innermost-first and sees the sibling.
    let Value::Record(record) = evaluate_with(&env, "{a: a + 1, b: a}").unwrap() else {
        panic!("expected record");
    };
    assert_eq!(record.get("b").unwrap(), Some(Value::Int(11)));

    // The shorthand skips siblings entirely.
    let Value::Record(record) = evaluate_with(&env, "{a}").unwrap() else {
        panic!("expected record");
    };
    assert_eq!(record.get("a").unwrap(), Some(Value::Int(10)));
}

#[test]
fn unresolved_names_are_absence() {
    assert_eq!(evaluate("nosuchname").unwrap(), Value::Null);
    assert_eq!(evaluate("nosuchname ?? 5").unwrap(), Value::Int(5));
}

#[test]
fn case_insensitive_keys_reject_duplicates() {
    // P6, both halves.
    let error = evaluate("{A: 1, a: 2}").unwrap_err();
    assert!(error.to_string().contains("duplicated"));

    let Value::Record(record) = evaluate("{Name: 1}").unwrap() else {
        panic!("expected record");
    };
    assert_eq!(record.get("name").unwrap(), record.get("NAME").unwrap());
}

#[test]
fn lambdas_close_over_their_scope() {
    assert_eq!(
        evaluate("{double: x => x * 2, return double(21)}").unwrap(),
        Value::Int(42)
    );
    assert_eq!(
        evaluate("{n: 10, f: x => x + n, return f(5)}").unwrap(),
        Value::Int(15)
    );
    let Value::Error(error) = evaluate("{f: (a, b) => a, return f(1)}").unwrap() else {
        panic!("expected error value");
    };
    assert_eq!(error.error_type, keva::ERROR_PARAMETER_COUNT_MISMATCH);
}

#[test]
fn selectors_project_records_and_lists() {
    let people = Value::list(vec![
        Value::record(vec![
            ("name".to_string(), Value::Text("ana".into())),
            ("age".to_string(), Value::Int(31)),
        ]),
        Value::record(vec![
            ("name".to_string(), Value::Text("bo".into())),
            ("age".to_string(), Value::Int(27)),
        ]),
        Value::Int(5),
    ]);
    let env = keva::host_env(vec![("people".to_string(), people)]);

    let Value::List(projected) = evaluate_with(&env, "people {name}").unwrap() else {
        panic!("expected list");
    };
    assert_eq!(projected.len(), 3);
    let Value::Record(first) = projected.item(0).unwrap() else {
        panic!("expected record element");
    };
    assert_eq!(first.get("name").unwrap(), Some(Value::Text("ana".into())));
    let own_keys: Vec<String> = first.entries().unwrap().into_iter().map(|(key, _)| key).collect();
    assert_eq!(own_keys, ["name"]);
    // A non-record element projects to nothing.
    assert_eq!(projected.item(2).unwrap(), Value::Null);

    // A single record applies once; a scalar source selects nothing.
    let env = keva::host_env(vec![(
        "point".to_string(),
        Value::record(vec![
            ("x".to_string(), Value::Int(1)),
            ("y".to_string(), Value::Int(2)),
        ]),
    )]);
    let Value::Record(moved) = evaluate_with(&env, "point {x: x + 10, y}").unwrap() else {
        panic!("expected record");
    };
    assert_eq!(moved.get("x").unwrap(), Some(Value::Int(11)));
    assert_eq!(moved.get("y").unwrap(), Some(Value::Int(2)));
    assert_eq!(evaluate("5 {x}").unwrap(), Value::Null);
}

#[test]
fn member_access_and_null_safety() {
    let env = keva::host_env(vec![(
        "point".to_string(),
        Value::record(vec![("x".to_string(), Value::Int(1))]),
    )]);
    assert_eq!(evaluate_with(&env, "point.x").unwrap(), Value::Int(1));
    assert_eq!(evaluate_with(&env, "point.y").unwrap(), Value::Null);
    assert_eq!(evaluate_with(&env, "missing?.x").unwrap(), Value::Null);
    let Value::Error(error) = evaluate_with(&env, "missing.x").unwrap() else {
        panic!("expected error value");
    };
    assert_eq!(error.error_type, keva::ERROR_TYPE_MISMATCH);
}

#[test]
fn error_values_flow_through_containers_and_calls() {
    let Value::Error(error) = evaluate("1/0 + 5").unwrap() else {
        panic!("expected error value");
    };
    assert!(error.message.contains("division by zero"));

    // Coalescing is about null, not errors.
    let Value::Error(_) = evaluate("(1/0) ?? 2").unwrap() else {
        panic!("errors must pass through '??'");
    };

    // Inside a list the error is just an element.
    let Value::List(list) = evaluate("[1/0, 2]").unwrap() else {
        panic!("expected list");
    };
    assert!(matches!(list.item(0).unwrap(), Value::Error(_)));
    assert_eq!(list.item(1).unwrap(), Value::Int(2));
}

#[test]
fn naked_documents_evaluate_like_braced_records() {
    assert_eq!(
        evaluate("a: 1, b: a + 1, return b * 2").unwrap(),
        Value::Int(4)
    );
}

#[test]
fn depth_overflow_is_a_value_not_a_crash() {
    // P1: static nesting beyond the limit.
    let mut src = String::new();
    for _ in 0..100 {
        src.push_str("1+(");
    }
    src.push('1');
    src.push_str(&")".repeat(100));

    let env = keva::default_env();
    let value = evaluate_with_options(&env, &src, &ParseOptions::default(), 64).unwrap();
    let Value::Error(error) = value else {
        panic!("expected depth overflow value, got {value:?}");
    };
    assert_eq!(error.error_type, ERROR_EVALUATION_DEPTH_OVERFLOW);

    // The guard unwound cleanly: the same source still overflows and a
    // shallow expression still evaluates.
    let again = evaluate_with_options(&env, &src, &ParseOptions::default(), 64).unwrap();
    assert!(matches!(again, Value::Error(_)));
    assert_eq!(evaluate_with(&env, "1+1").unwrap(), Value::Int(2));
}

#[test]
fn runaway_recursion_hits_the_guard() {
    let value = evaluate("{loop: n => loop(n + 1), return loop(0)}").unwrap();
    let Value::Error(error) = value else {
        panic!("expected depth overflow value");
    };
    assert_eq!(error.error_type, ERROR_EVALUATION_DEPTH_OVERFLOW);
}

#[test]
fn formatting_round_trips_literals() {
    // P7 for the scalar kinds and simple containers.
    let values = [
        Value::Int(42),
        Value::Long(5),
        Value::Float(2.5),
        Value::Float(3.0),
        Value::Bool(true),
        Value::Text("with \"quotes\" and\nnewline".into()),
        Value::list(vec![Value::Int(1), Value::Text("x".into())]),
    ];
    for value in values {
        let text = keva::literal(&value).unwrap();
        let reparsed = evaluate(&text).unwrap();
        assert_eq!(reparsed, value, "round trip of {text:?}");
    }
}

#[test]
fn shared_ast_evaluates_concurrently_against_independent_envs() {
    let env = keva::default_env();
    let parsed = keva::parse(&env, "{total: n * 2 + 1, return total}");
    let expr = parsed.expr.expect("clean parse");

    let mut handles = Vec::new();
    for n in 0..8i32 {
        let expr = expr.clone();
        handles.push(std::thread::spawn(move || {
            let env = keva::host_env(vec![("n".to_string(), Value::Int(n))]);
            let depth = Arc::new(keva::DepthCounter::default());
            keva::eval(&expr, &env, &depth).unwrap()
        }));
    }
    for (n, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), Value::Int(n as i32 * 2 + 1));
    }
}
