//! Process-wide payload type registry.
//!
//! Maps the type tag stored in each envelope to the function that rebuilds
//! the concrete value. Built once at startup with [`TypeRegistry::builder`],
//! installed with [`init_global`], read-only afterwards.

use std::collections::HashMap;
use std::sync::OnceLock;

use super::payload::{Payload, PersistentMessage};
use crate::event_sourcing::errors::{PersistenceError, Result};

/// Rebuilds a boxed payload from its JSON body.
pub type DecodeFn = fn(serde_json::Value) -> serde_json::Result<Box<dyn Payload>>;

/// Global registry, installed by `init_global` before any decode.
static GLOBAL_REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();

fn decode_as<T: PersistentMessage>(body: serde_json::Value) -> serde_json::Result<Box<dyn Payload>> {
    let value: T = serde_json::from_value(body)?;
    Ok(Box::new(value))
}

/// Immutable tag → decoder table.
#[derive(Debug, Default)]
pub struct TypeRegistry {
    decoders: HashMap<&'static str, DecodeFn>,
}

impl TypeRegistry {
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    pub fn resolve(&self, type_name: &str) -> Option<DecodeFn> {
        self.decoders.get(type_name).copied()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.decoders.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Registered tags, sorted.
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.decoders.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

/// Collects registrations during startup.
#[derive(Debug, Default)]
pub struct TypeRegistryBuilder {
    decoders: HashMap<&'static str, DecodeFn>,
}

impl TypeRegistryBuilder {
    /// Register `T` under `T::type_name()`. A repeated tag replaces the
    /// earlier registration.
    pub fn register<T: PersistentMessage>(mut self) -> Self {
        let type_name = T::type_name();
        if self.decoders.insert(type_name, decode_as::<T>).is_some() {
            tracing::warn!(type_name = %type_name, "Payload type registered twice, keeping the last registration");
        }
        self
    }

    pub fn build(self) -> TypeRegistry {
        TypeRegistry {
            decoders: self.decoders,
        }
    }
}

/// Install the process-wide registry. Call once at startup, before any
/// provider is built.
pub fn init_global(registry: TypeRegistry) -> Result<&'static TypeRegistry> {
    let count = registry.len();
    GLOBAL_REGISTRY
        .set(registry)
        .map_err(|_| PersistenceError::RegistryAlreadyInitialized)?;

    tracing::info!(registered_types = count, "Payload type registry initialized");
    global()
}

/// The process-wide registry.
pub fn global() -> Result<&'static TypeRegistry> {
    GLOBAL_REGISTRY.get().ok_or(PersistenceError::RegistryNotInitialized)
}

pub fn is_initialized() -> bool {
    GLOBAL_REGISTRY.get().is_some()
}
