//! In-memory blueprint registry with built-in blueprints.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use stencil_core::{
    application::{ApplicationError, ports::BlueprintRegistry},
    domain::{Blueprint, BlueprintId, DomainValidator},
    error::{StencilError, StencilResult},
};

use crate::builtin_blueprints;

/// Thread-safe in-memory blueprint registry.
///
/// Clones share storage, so one registry can back several services.
#[derive(Clone, Default)]
pub struct InMemoryRegistry {
    inner: Arc<RwLock<HashMap<BlueprintId, Blueprint>>>,
}

impl InMemoryRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with built-in blueprints loaded.
    pub fn with_builtin() -> StencilResult<Self> {
        let registry = Self::new();
        registry.load_builtin()?;
        Ok(registry)
    }

    /// Load built-in blueprints.
    pub fn load_builtin(&self) -> StencilResult<()> {
        for blueprint in builtin_blueprints::all_blueprints()? {
            self.insert(blueprint)?;
        }
        Ok(())
    }

    /// Get the number of blueprints.
    pub fn len(&self) -> usize {
        self.read().map(|inner| inner.len()).unwrap_or(0)
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all blueprints.
    pub fn clear(&self) -> StencilResult<()> {
        self.write()?.clear();
        Ok(())
    }

    fn read(&self) -> StencilResult<RwLockReadGuard<'_, HashMap<BlueprintId, Blueprint>>> {
        self.inner
            .read()
            .map_err(|_| ApplicationError::RegistryLockError.into())
    }

    fn write(&self) -> StencilResult<RwLockWriteGuard<'_, HashMap<BlueprintId, Blueprint>>> {
        self.inner
            .write()
            .map_err(|_| ApplicationError::RegistryLockError.into())
    }
}

impl BlueprintRegistry for InMemoryRegistry {
    fn get(&self, id: &BlueprintId) -> StencilResult<Blueprint> {
        self.read()?.get(id).cloned().ok_or_else(|| {
            ApplicationError::BlueprintNotFound {
                reference: id.to_string(),
            }
            .into()
        })
    }

    fn find_by_name(&self, name: &str) -> StencilResult<Vec<Blueprint>> {
        Ok(self
            .read()?
            .iter()
            .filter(|(id, _)| id.name() == name)
            .map(|(_, b)| b.clone())
            .collect())
    }

    fn list(&self) -> StencilResult<Vec<Blueprint>> {
        Ok(self.read()?.values().cloned().collect())
    }

    fn insert(&self, blueprint: Blueprint) -> StencilResult<()> {
        // Validate before insertion
        DomainValidator::validate_blueprint(&blueprint).map_err(|mut errors| {
            if errors.is_empty() {
                StencilError::Internal {
                    message: "blueprint validation failed without errors".into(),
                }
            } else {
                StencilError::Domain(errors.remove(0))
            }
        })?;

        let id = blueprint.id()?;
        self.write()?.insert(id, blueprint);
        Ok(())
    }

    fn remove(&self, id: &BlueprintId) -> StencilResult<()> {
        self.write()?.remove(id).map(|_| ()).ok_or_else(|| {
            ApplicationError::BlueprintNotFound {
                reference: id.to_string(),
            }
            .into()
        })
    }
}
