//! Registry of compiled module specifications.

use std::collections::HashMap;
use std::sync::Arc;

use crate::compile::compile;
use crate::error::{ConfigError, ConfigResult};
use crate::spec::{ParsedSpec, Spec};

/// Compiled specs keyed by module name. Built once at startup, then shared
/// read-only behind an `Arc`.
#[derive(Debug, Default)]
pub struct Registry {
    specs: Vec<Arc<ParsedSpec>>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and register a module's spec.
    pub fn register(&mut self, spec: Spec) -> ConfigResult<()> {
        if self.index.contains_key(&spec.module) {
            return Err(ConfigError::DuplicateModule(spec.module));
        }
        let parsed = compile(spec)?;
        tracing::info!(
            module = %parsed.module(),
            sections = parsed.sections.len(),
            arrays = parsed.array_fields.len(),
            "Config module registered"
        );
        self.index
            .insert(parsed.module().to_string(), self.specs.len());
        self.specs.push(Arc::new(parsed));
        Ok(())
    }

    /// Like [`register`](Self::register) but panics on failure. Startup only.
    pub fn must_register(&mut self, spec: Spec) {
        let module = spec.module.clone();
        if let Err(e) = self.register(spec) {
            panic!("failed to register config module {module}: {e}");
        }
    }

    pub fn get(&self, module: &str) -> Option<Arc<ParsedSpec>> {
        self.index.get(module).map(|&idx| Arc::clone(&self.specs[idx]))
    }

    pub(crate) fn require(&self, module: &str) -> ConfigResult<Arc<ParsedSpec>> {
        self.get(module)
            .ok_or_else(|| ConfigError::UnknownModule(module.to_string()))
    }

    /// All specs ordered by `order`, ties kept in registration order.
    pub fn list(&self) -> Vec<Arc<ParsedSpec>> {
        let mut specs = self.specs.clone();
        specs.sort_by_key(|s| s.spec.order);
        specs
    }

    /// Module names in registration order.
    pub fn modules(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.spec.module.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
