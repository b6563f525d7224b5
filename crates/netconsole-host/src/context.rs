//! Explicit service context: a keyed store of process-wide singletons passed
//! to the parts that need it instead of living behind hidden globals.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("service \"{0}\" is already registered")]
    AlreadyRegistered(String),
    #[error("service \"{0}\" is registered with a different type")]
    TypeMismatch(String),
    #[error("service \"{0}\" is not registered")]
    Missing(String),
}

/// Keyed singleton store. At most one instance per key for the process
/// lifetime; constructing twice for the same key is a wiring bug, so
/// `register` refuses duplicates instead of replacing.
#[derive(Default)]
pub struct ServiceContext {
    services: Mutex<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl ServiceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a fully constructed instance. Errors if the key is taken.
    pub fn register<T: Send + Sync + 'static>(
        &self,
        key: &str,
        instance: Arc<T>,
    ) -> Result<(), RegistryError> {
        let mut services = self.services.lock().expect("service map poisoned");
        if services.contains_key(key) {
            return Err(RegistryError::AlreadyRegistered(key.to_string()));
        }
        services.insert(key.to_string(), instance);
        Ok(())
    }

    /// Returns the existing instance or constructs-and-registers on first
    /// access. The factory runs under the map lock so a second lookup can
    /// never observe a half-registered entry or construct a duplicate;
    /// factories must not call back into the context.
    pub fn get_or_create<T, F>(&self, key: &str, factory: F) -> Result<Arc<T>, RegistryError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Arc<T>,
    {
        let mut services = self.services.lock().expect("service map poisoned");
        if let Some(existing) = services.get(key) {
            return existing
                .clone()
                .downcast::<T>()
                .map_err(|_| RegistryError::TypeMismatch(key.to_string()));
        }
        let instance = factory();
        services.insert(key.to_string(), instance.clone());
        Ok(instance)
    }

    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<Arc<T>> {
        let services = self.services.lock().expect("service map poisoned");
        services.get(key).and_then(|any| any.clone().downcast::<T>().ok())
    }

    /// Like `get`, but a missing or mistyped entry is a wiring bug worth an
    /// error instead of a silent `None`.
    pub fn require<T: Send + Sync + 'static>(&self, key: &str) -> Result<Arc<T>, RegistryError> {
        let services = self.services.lock().expect("service map poisoned");
        let entry = services
            .get(key)
            .ok_or_else(|| RegistryError::Missing(key.to_string()))?;
        entry
            .clone()
            .downcast::<T>()
            .map_err(|_| RegistryError::TypeMismatch(key.to_string()))
    }
}
