mod cache;
mod collaborators;
mod config;
mod descriptor;
mod error;
mod hints;
mod plan;
mod planner;
mod provider;
mod staleness;
mod types;

pub use cache::{CacheKey, CacheSnapshot, CacheViewer, MaterializationCache, RefreshStats};
pub use collaborators::{
    CacheHelper, CatalogAccessor, ExternalReflectionStatus, ReflectionStatusOracle,
};
pub use config::AccelerationConfig;
pub use descriptor::{CachedMaterializationDescriptor, MaterializationDescriptor};
pub use error::{AccelError, ErrorCode};
pub use hints::{ReflectionHint, ReflectionHints};
pub use plan::{ExpandedPlan, RelNode, TableScan};
pub use planner::{
    referenced_relations, substitution_candidates, CandidateSummary, SubstitutionCandidate,
    SubstitutionCandidates,
};
pub use provider::MaterializationDescriptorProvider;
pub use types::{
    DatasetConfig, ExternalReflection, ExternalReflectionId, Field, Materialization,
    MaterializationId, NamespaceKey, RecordSchema, ReflectionId, ReflectionType,
    ACCELERATOR_STORAGE_PLUGIN,
};
