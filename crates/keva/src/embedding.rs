//! The foreign-language embedding capability.
//!
//! A binding compiles a code block once and evaluates the compiled form
//! against the host environment, converting its native values back into
//! the closed value set at the boundary. Bindings are registered in an
//! explicit registry handed to the parser — there is no process-global
//! registry.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::env::EnvRef;
use crate::error::EvalResult;
use crate::value::Value;

/// Opaque compiled form owned by the binding.
pub type Compiled = Arc<dyn Any + Send + Sync>;

pub trait LanguageBinding: Send + Sync {
    /// Compiles source text, or reports a compile error message.
    fn compile(&self, source: &str) -> Result<Compiled, String>;

    /// Evaluates a previously compiled form. The binding is responsible
    /// for exposing host bindings into its own scoping idiom.
    fn evaluate(&self, compiled: &Compiled, env: &EnvRef) -> EvalResult<Value>;
}

#[derive(Default, Clone)]
pub struct BindingRegistry {
    entries: HashMap<String, Arc<dyn LanguageBinding>>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, language: &str, binding: Arc<dyn LanguageBinding>) {
        self.entries.insert(language.to_lowercase(), binding);
    }

    pub fn get(&self, language: &str) -> Option<Arc<dyn LanguageBinding>> {
        self.entries.get(&language.to_lowercase()).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
