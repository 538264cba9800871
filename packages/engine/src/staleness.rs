use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::debug;

use crate::cache::CacheKey;
use crate::collaborators::{CacheHelper, CatalogAccessor, ExternalReflectionStatus, ReflectionStatusOracle};
use crate::descriptor::CachedMaterializationDescriptor;
use crate::plan::TableScan;
use crate::types::{ExternalReflection, Materialization, RecordSchema};
use crate::AccelError;

/// One authoritative entry the cache may hold. Both kinds share the mapping
/// but differ in how staleness is detected and how they expand.
#[derive(Debug, Clone, Copy)]
pub(crate) enum CacheSource<'a> {
    Materialization(&'a Materialization),
    External(&'a ExternalReflection),
}

impl CacheSource<'_> {
    pub(crate) fn cache_key(&self) -> CacheKey {
        match self {
            Self::Materialization(materialization) => {
                CacheKey::Materialization(materialization.id.clone())
            }
            Self::External(external) => CacheKey::External(external.id.clone()),
        }
    }

    pub(crate) fn is_stale(
        &self,
        cached: &CachedMaterializationDescriptor,
        status: &dyn ReflectionStatusOracle,
    ) -> Result<bool, AccelError> {
        match self {
            Self::Materialization(materialization) => {
                if cached.version() != materialization.tag {
                    return Ok(true);
                }
                schema_changed(cached, materialization)
            }
            Self::External(external) => {
                let out_of_sync = status.external_reflection_status(&external.id)?
                    == ExternalReflectionStatus::OutOfSync;
                Ok(out_of_sync || external_metadata_updated(cached)?)
            }
        }
    }

    /// Expands through the helper. Panics raised by the helper are reported as
    /// expansion errors.
    pub(crate) fn expand(
        &self,
        helper: &dyn CacheHelper,
        catalog: &Arc<dyn CatalogAccessor>,
    ) -> Result<Option<Arc<CachedMaterializationDescriptor>>, AccelError> {
        let outcome = catch_unwind(AssertUnwindSafe(|| match self {
            Self::Materialization(materialization) => helper.expand(materialization),
            Self::External(external) => {
                let descriptor = helper.descriptor(external)?;
                let Some(expanded) = helper.expand_descriptor(&descriptor)? else {
                    return Ok(None);
                };
                Ok(Some(CachedMaterializationDescriptor::new(
                    descriptor,
                    expanded,
                    Arc::clone(catalog),
                )))
            }
        }));

        match outcome {
            Ok(result) => result.map(|expanded| expanded.map(Arc::new)),
            Err(payload) => Err(AccelError::expansion(format!(
                "expansion of {} panicked: {}",
                self.cache_key(),
                panic_message(payload.as_ref())
            ))),
        }
    }
}

/// Compares the catalog's current schema for the materialization's storage
/// path with the schema recorded in the cached plan. A dataset missing from the
/// catalog, or a schema the catalog cannot hand back intact, counts as changed.
pub(crate) fn schema_changed(
    cached: &CachedMaterializationDescriptor,
    materialization: &Materialization,
) -> Result<bool, AccelError> {
    let key = materialization.storage_path();
    let Some(dataset) = cached.catalog().dataset_config(&key)? else {
        return Ok(true);
    };

    match RecordSchema::deserialize(&dataset.record_schema) {
        Ok(current) => Ok(&current != cached.schema()),
        Err(err) => {
            debug!(dataset = %key, error = %err, "unreadable record schema in catalog");
            Ok(true)
        }
    }
}

/// Walks every table scan of the cached plan. Catalog scans are compared with
/// the catalog's current tag; any other scan kind is assumed changed.
pub(crate) fn external_metadata_updated(
    cached: &CachedMaterializationDescriptor,
) -> Result<bool, AccelError> {
    let catalog = cached.catalog();
    let mut updated = false;
    for scan in cached.materialization().table_rel().table_scans() {
        let TableScan::Catalog { table, version } = scan else {
            updated = true;
            continue;
        };
        match catalog.dataset_config(table)? {
            None => updated = true,
            Some(dataset) if dataset.tag != *version => {
                debug!(
                    dataset = %table,
                    "dataset has new data; invalidating cache for external reflection"
                );
                updated = true;
            }
            Some(_) => {}
        }
    }
    Ok(updated)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
