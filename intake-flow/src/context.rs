use dashmap::DashMap;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{GraphError, Result};

/// Key/value scratch space shared by the tasks of a single turn.
///
/// A context lives only as long as the turn that created it. Callers seed it
/// from whatever state the client sent and read it back once the turn ends.
#[derive(Clone, Debug, Default)]
pub struct Context {
    data: Arc<DashMap<String, Value>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        self.set_sync(key, value)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_sync(key)
    }

    /// Synchronous write, for code that cannot await (builders, edge conditions).
    pub fn set_sync(&self, key: impl Into<String>, value: impl Serialize) -> Result<()> {
        let key = key.into();
        let value = serde_json::to_value(value)
            .map_err(|e| GraphError::ContextError(format!("cannot store {key}: {e}")))?;
        self.data.insert(key, value);
        Ok(())
    }

    /// Synchronous read. Missing keys and values of the wrong shape both read as `None`.
    pub fn get_sync<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Like [`Context::get`] but treats a missing key as an error.
    pub async fn require<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.get_sync(key)
            .ok_or_else(|| GraphError::ContextError(format!("{key} not found")))
    }

    pub async fn remove(&self, key: &str) -> Option<Value> {
        self.data.remove(key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn typed_roundtrip_and_missing_keys() {
        let context = Context::new();
        context.set("name", "Alex").await.unwrap();
        context.set("symptoms", vec!["cough", "fever"]).await.unwrap();

        let name: String = context.get("name").await.unwrap();
        assert_eq!(name, "Alex");
        let symptoms: Vec<String> = context.require("symptoms").await.unwrap();
        assert_eq!(symptoms, vec!["cough", "fever"]);

        assert!(context.get::<String>("age").await.is_none());
        assert!(matches!(
            context.require::<String>("age").await,
            Err(GraphError::ContextError(_))
        ));
    }

    #[tokio::test]
    async fn wrong_shape_reads_as_none() {
        let context = Context::new();
        context.set("severity", "seven").await.unwrap();
        assert!(context.get::<i64>("severity").await.is_none());

        assert!(context.remove("severity").await.is_some());
        assert!(!context.contains("severity"));
    }
}
