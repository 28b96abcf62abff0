//! The scoping capability: key-value collections with parent chains.
//!
//! Environments are immutable after construction; "updates" layer a new
//! instance over the old one. Keys are case-insensitive with a
//! lower-cased canonical form.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::EvalResult;
use crate::value::{FsError, Value};

pub type EnvRef = Arc<dyn Environment>;

pub trait Environment: Send + Sync {
    /// Looks the key up in this collection, then in ancestors. `None`
    /// is absence, distinct from an explicit `Null` binding.
    ///
    /// Lazy implementations may evaluate on demand, which is why this
    /// is fallible: a failing host callback surfaces here.
    fn get(&self, key: &str) -> EvalResult<Option<Value>>;

    /// True whenever `get` would find the key here or in an ancestor.
    fn is_defined(&self, key: &str) -> bool;

    fn parent(&self) -> Option<EnvRef>;

    /// This collection's own bindings in declaration order, evaluated.
    fn entries(&self) -> EvalResult<Vec<(String, Value)>>;
}

/// Flat ordered-pair collection. Duplicate keys overwrite in place,
/// keeping the first occurrence's position.
pub struct MapEnv {
    pairs: Vec<(String, Value)>,
    index: HashMap<String, usize>,
    parent: Option<EnvRef>,
}

impl MapEnv {
    pub fn new(parent: Option<EnvRef>, pairs: Vec<(String, Value)>) -> Self {
        let mut env = Self {
            pairs: Vec::with_capacity(pairs.len()),
            index: HashMap::with_capacity(pairs.len()),
            parent,
        };
        for (key, value) in pairs {
            env.put(key, value);
        }
        env
    }

    pub fn empty(parent: Option<EnvRef>) -> Self {
        Self::new(parent, Vec::new())
    }

    fn put(&mut self, key: String, value: Value) {
        let lower = key.to_lowercase();
        match self.index.get(&lower) {
            Some(&slot) => self.pairs[slot] = (key, value),
            None => {
                self.index.insert(lower, self.pairs.len());
                self.pairs.push((key, value));
            }
        }
    }
}

impl Environment for MapEnv {
    fn get(&self, key: &str) -> EvalResult<Option<Value>> {
        if let Some(&slot) = self.index.get(&key.to_lowercase()) {
            return Ok(Some(self.pairs[slot].1.clone()));
        }
        match &self.parent {
            Some(parent) => parent.get(key),
            None => Ok(None),
        }
    }

    fn is_defined(&self, key: &str) -> bool {
        self.index.contains_key(&key.to_lowercase())
            || self
                .parent
                .as_ref()
                .is_some_and(|parent| parent.is_defined(key))
    }

    fn parent(&self) -> Option<EnvRef> {
        self.parent.clone()
    }

    fn entries(&self) -> EvalResult<Vec<(String, Value)>> {
        Ok(self.pairs.clone())
    }
}

/// Two-level wrapper: answers from `front` when it defines the key,
/// falling back to `fallback`. Used for host-variable layering and for
/// selector projection scopes.
pub struct LayeredEnv {
    front: EnvRef,
    fallback: EnvRef,
}

impl LayeredEnv {
    pub fn new(front: EnvRef, fallback: EnvRef) -> Self {
        Self { front, fallback }
    }
}

impl Environment for LayeredEnv {
    fn get(&self, key: &str) -> EvalResult<Option<Value>> {
        if self.front.is_defined(key) {
            if let Some(value) = self.front.get(key)? {
                return Ok(Some(value));
            }
        }
        self.fallback.get(key)
    }

    fn is_defined(&self, key: &str) -> bool {
        self.front.is_defined(key) || self.fallback.is_defined(key)
    }

    fn parent(&self) -> Option<EnvRef> {
        Some(self.fallback.clone())
    }

    fn entries(&self) -> EvalResult<Vec<(String, Value)>> {
        self.front.entries()
    }
}

/// Merges two collections into one record value.
///
/// Nested records sharing a key merge recursively; any other collision
/// is right-biased. Collections rooted in different parent environments
/// cannot merge — the result's lookup chain would be ambiguous — so
/// that case reports an error value. The lineage check applies to the
/// two collections being combined, not to nested records, whose merged
/// copies detach from their defining scopes.
pub fn merge(left: &EnvRef, right: &EnvRef) -> EvalResult<Value> {
    if let (Some(first), Some(second)) = (left.parent(), right.parent()) {
        if !Arc::ptr_eq(&first, &second) {
            return Ok(Value::Error(Arc::new(FsError::invalid_parameter(
                "key value collections from different contexts can't be merged",
            ))));
        }
    }
    merge_entries(left, right, left.parent().or_else(|| right.parent()))
}

fn merge_entries(left: &EnvRef, right: &EnvRef, parent: Option<EnvRef>) -> EvalResult<Value> {
    let mut merged = MapEnv::empty(parent);
    for (key, value) in left.entries()? {
        merged.put(key, value);
    }
    for (key, value) in right.entries()? {
        let existing = merged
            .index
            .get(&key.to_lowercase())
            .map(|&slot| merged.pairs[slot].1.clone());
        match (existing, value) {
            (Some(Value::Record(a)), Value::Record(b)) => {
                let combined = merge_entries(&a, &b, None)?;
                merged.put(key, combined);
            }
            (_, value) => merged.put(key, value),
        }
    }
    Ok(Value::Record(Arc::new(merged)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: Vec<(&str, Value)>) -> EnvRef {
        Arc::new(MapEnv::new(
            None,
            pairs
                .into_iter()
                .map(|(key, value)| (key.to_string(), value))
                .collect(),
        ))
    }

    #[test]
    fn keys_are_case_insensitive() {
        let env = record(vec![("Alpha", Value::Int(1))]);
        assert_eq!(env.get("alpha").unwrap(), Some(Value::Int(1)));
        assert_eq!(env.get("ALPHA").unwrap(), Some(Value::Int(1)));
        assert!(env.is_defined("aLpHa"));
        assert_eq!(env.get("beta").unwrap(), None);
    }

    #[test]
    fn lookup_falls_back_to_the_parent_chain() {
        let root = record(vec![("x", Value::Int(10)), ("y", Value::Int(20))]);
        let child: EnvRef = Arc::new(MapEnv::new(
            Some(root),
            vec![("x".to_string(), Value::Int(1))],
        ));
        assert_eq!(child.get("x").unwrap(), Some(Value::Int(1)));
        assert_eq!(child.get("y").unwrap(), Some(Value::Int(20)));
        assert!(child.is_defined("y"));
    }

    #[test]
    fn layered_env_prefers_the_front_scope() {
        let ambient = record(vec![("a", Value::Int(1)), ("b", Value::Int(2))]);
        let projected = record(vec![("a", Value::Int(100))]);
        let layered = LayeredEnv::new(projected, ambient);
        assert_eq!(layered.get("a").unwrap(), Some(Value::Int(100)));
        assert_eq!(layered.get("b").unwrap(), Some(Value::Int(2)));
        assert_eq!(layered.entries().unwrap().len(), 1);
    }

    #[test]
    fn merge_is_right_biased_and_order_preserving() {
        let left = record(vec![("a", Value::Int(1)), ("b", Value::Int(2))]);
        let right = record(vec![("b", Value::Int(20)), ("c", Value::Int(30))]);
        let Value::Record(merged) = merge(&left, &right).unwrap() else {
            panic!("expected record");
        };
        let entries = merged.entries().unwrap();
        assert_eq!(
            entries,
            vec![
                ("a".to_string(), Value::Int(1)),
                ("b".to_string(), Value::Int(20)),
                ("c".to_string(), Value::Int(30)),
            ]
        );
    }

    #[test]
    fn merge_recurses_into_shared_record_keys() {
        let left = record(vec![(
            "inner",
            Value::Record(record(vec![("x", Value::Int(1)), ("y", Value::Int(2))])),
        )]);
        let right = record(vec![(
            "inner",
            Value::Record(record(vec![("y", Value::Int(20)), ("z", Value::Int(3))])),
        )]);
        let Value::Record(merged) = merge(&left, &right).unwrap() else {
            panic!("expected record");
        };
        let Some(Value::Record(inner)) = merged.get("inner").unwrap() else {
            panic!("expected nested record");
        };
        assert_eq!(inner.get("x").unwrap(), Some(Value::Int(1)));
        assert_eq!(inner.get("y").unwrap(), Some(Value::Int(20)));
        assert_eq!(inner.get("z").unwrap(), Some(Value::Int(3)));
    }

    #[test]
    fn merge_rejects_collections_with_different_parents() {
        let parent_a = record(vec![("p", Value::Int(1))]);
        let parent_b = record(vec![("p", Value::Int(2))]);
        let left: EnvRef = Arc::new(MapEnv::new(
            Some(parent_a),
            vec![("x".to_string(), Value::Int(1))],
        ));
        let right: EnvRef = Arc::new(MapEnv::new(
            Some(parent_b),
            vec![("y".to_string(), Value::Int(2))],
        ));
        let Value::Error(err) = merge(&left, &right).unwrap() else {
            panic!("expected error value");
        };
        assert!(err.message.contains("different contexts"));
    }
}
