use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::collaborators::CatalogAccessor;
use crate::plan::ExpandedPlan;
use crate::types::{Materialization, NamespaceKey, RecordSchema, ReflectionId, ReflectionType};

/// Metadata describing one substitution candidate, before expansion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializationDescriptor {
    pub reflection_id: ReflectionId,
    // materialization id, or the external reflection id for external descriptors
    pub materialization_id: String,
    pub version: String,
    pub reflection_type: ReflectionType,
    pub path: NamespaceKey,
    pub dataset_path: NamespaceKey,
}

impl MaterializationDescriptor {
    pub fn from_materialization(materialization: &Materialization) -> Self {
        Self {
            reflection_id: materialization.reflection_id.clone(),
            materialization_id: materialization.id.as_str().to_string(),
            version: materialization.tag.clone(),
            reflection_type: materialization.reflection_type,
            path: materialization.storage_path(),
            dataset_path: materialization.dataset_path.clone(),
        }
    }
}

/// An expanded descriptor. Immutable once built and shared read-only with
/// planner threads through `Arc`.
#[derive(Clone)]
pub struct CachedMaterializationDescriptor {
    descriptor: MaterializationDescriptor,
    materialization: ExpandedPlan,
    catalog: Arc<dyn CatalogAccessor>,
}

impl CachedMaterializationDescriptor {
    pub fn new(
        descriptor: MaterializationDescriptor,
        materialization: ExpandedPlan,
        catalog: Arc<dyn CatalogAccessor>,
    ) -> Self {
        Self {
            descriptor,
            materialization,
            catalog,
        }
    }

    pub fn descriptor(&self) -> &MaterializationDescriptor {
        &self.descriptor
    }

    pub fn materialization(&self) -> &ExpandedPlan {
        &self.materialization
    }

    pub fn version(&self) -> &str {
        &self.descriptor.version
    }

    pub fn reflection_id(&self) -> &ReflectionId {
        &self.descriptor.reflection_id
    }

    pub fn schema(&self) -> &RecordSchema {
        self.materialization.schema()
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogAccessor> {
        &self.catalog
    }
}

impl fmt::Debug for CachedMaterializationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedMaterializationDescriptor")
            .field("descriptor", &self.descriptor)
            .field("materialization", &self.materialization)
            .finish_non_exhaustive()
    }
}
