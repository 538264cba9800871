use serde::{Deserialize, Serialize};

use crate::descriptor::{CachedMaterializationDescriptor, MaterializationDescriptor};
use crate::plan::ExpandedPlan;
use crate::types::{DatasetConfig, ExternalReflection, ExternalReflectionId, Materialization, NamespaceKey};
use crate::AccelError;

/// Read-only dataset lookup. A missing dataset is `Ok(None)`; `Err` means the
/// catalog itself could not be reached.
pub trait CatalogAccessor: Send + Sync {
    fn dataset_config(&self, key: &NamespaceKey) -> Result<Option<DatasetConfig>, AccelError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExternalReflectionStatus {
    Ok,
    Invalid,
    OutOfSync,
}

pub trait ReflectionStatusOracle: Send + Sync {
    fn external_reflection_status(
        &self,
        id: &ExternalReflectionId,
    ) -> Result<ExternalReflectionStatus, AccelError>;
}

/// Source of truth for what should be cached, and the expansion
/// implementation. Expansion stays available even when the cache is disabled.
pub trait CacheHelper: Send + Sync {
    fn valid_materializations(&self) -> Result<Vec<Materialization>, AccelError>;

    fn external_reflections(&self) -> Result<Vec<ExternalReflection>, AccelError>;

    fn descriptor(
        &self,
        external_reflection: &ExternalReflection,
    ) -> Result<MaterializationDescriptor, AccelError>;

    /// `Ok(None)` when the stored plan cannot be deserialized.
    fn expand_descriptor(
        &self,
        descriptor: &MaterializationDescriptor,
    ) -> Result<Option<ExpandedPlan>, AccelError>;

    /// `Ok(None)` when the stored plan cannot be deserialized.
    fn expand(
        &self,
        materialization: &Materialization,
    ) -> Result<Option<CachedMaterializationDescriptor>, AccelError>;
}
