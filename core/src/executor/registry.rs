use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::ExecutorError;

use super::traits::{InterfaceMetadata, InterfaceResolver, Invocable};
use super::types::Params;

struct Entry {
    invocable: Arc<dyn Invocable>,
    calls_per_minute: Option<u32>,
}

/// In-process interface table: resolver and metadata provider in one.
#[derive(Default)]
pub struct InterfaceRegistry {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InterfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, name: impl Into<String>, f: F) -> &Self
    where
        F: Fn(&Params) -> anyhow::Result<serde_json::Value> + Send + Sync + 'static,
    {
        self.register_invocable(name, Arc::new(f), None)
    }

    /// Register with a calls-per-minute hint used to seed a rate limiter.
    pub fn register_limited<F>(&self, name: impl Into<String>, calls_per_minute: u32, f: F) -> &Self
    where
        F: Fn(&Params) -> anyhow::Result<serde_json::Value> + Send + Sync + 'static,
    {
        self.register_invocable(name, Arc::new(f), Some(calls_per_minute))
    }

    pub fn register_invocable(
        &self,
        name: impl Into<String>,
        invocable: Arc<dyn Invocable>,
        calls_per_minute: Option<u32>,
    ) -> &Self {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                name.into(),
                Entry {
                    invocable,
                    calls_per_minute,
                },
            );
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl InterfaceResolver for InterfaceRegistry {
    fn resolve(&self, interface_name: &str) -> Result<Arc<dyn Invocable>, ExecutorError> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(interface_name)
            .map(|e| e.invocable.clone())
            .ok_or_else(|| ExecutorError::InterfaceNotFound(interface_name.to_string()))
    }
}

impl InterfaceMetadata for InterfaceRegistry {
    fn calls_per_minute(&self, interface_name: &str) -> Option<u32> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(interface_name)
            .and_then(|e| e.calls_per_minute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_registered_interfaces() {
        let reg = InterfaceRegistry::new();
        reg.register("echo", |p: &Params| Ok(json!(p)))
            .register_limited("spot", 60, |_: &Params| Ok(json!([])));

        let mut params = Params::new();
        params.insert("symbol".into(), json!("600000"));
        let out = reg.resolve("echo").unwrap().invoke(&params).unwrap();
        assert_eq!(out, json!({"symbol": "600000"}));

        assert_eq!(reg.calls_per_minute("spot"), Some(60));
        assert_eq!(reg.calls_per_minute("echo"), None);
        assert_eq!(reg.names(), vec!["echo", "spot"]);
    }

    #[test]
    fn unknown_interface_is_not_found() {
        let reg = InterfaceRegistry::new();
        let err = reg.resolve("missing").err().unwrap();
        assert!(matches!(err, ExecutorError::InterfaceNotFound(ref n) if n == "missing"));
        assert!(!reg.contains("missing"));
    }
}
