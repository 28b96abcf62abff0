//! The lazy, indexable sequence capability.

use std::sync::Arc;

use crate::error::EvalResult;
use crate::value::Value;

pub type ListRef = Arc<dyn FsList>;

/// Sequence abstraction the evaluator and hosts share. Access is not
/// inherently memoized; a lazy realization re-evaluates on every call.
pub trait FsList: Send + Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The i-th element. Out-of-range access yields `Null`, not an error.
    fn item(&self, index: usize) -> EvalResult<Value>;
}

/// Eager array-backed realization.
pub struct ArrayList {
    items: Vec<Value>,
}

impl ArrayList {
    pub fn new(items: Vec<Value>) -> Self {
        Self { items }
    }
}

impl FsList for ArrayList {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn item(&self, index: usize) -> EvalResult<Value> {
        Ok(self.items.get(index).cloned().unwrap_or(Value::Null))
    }
}

/// Forces every element, in order.
pub fn collect_items(list: &dyn FsList) -> EvalResult<Vec<Value>> {
    let mut items = Vec::with_capacity(list.len());
    for index in 0..list.len() {
        items.push(list.item(index)?);
    }
    Ok(items)
}
