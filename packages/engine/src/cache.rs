use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, info, instrument};

use crate::collaborators::{CacheHelper, CatalogAccessor, ReflectionStatusOracle};
use crate::descriptor::CachedMaterializationDescriptor;
use crate::staleness::CacheSource;
use crate::types::{ExternalReflectionId, Materialization, MaterializationId};
use crate::AccelError;

/// Materialization ids and external reflection ids come from different
/// generators; tagging the key keeps the two spaces from overwriting each
/// other in the shared mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "id")]
pub enum CacheKey {
    Materialization(MaterializationId),
    External(ExternalReflectionId),
}

impl From<MaterializationId> for CacheKey {
    fn from(value: MaterializationId) -> Self {
        Self::Materialization(value)
    }
}

impl From<ExternalReflectionId> for CacheKey {
    fn from(value: ExternalReflectionId) -> Self {
        Self::External(value)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Materialization(id) => write!(f, "materialization:{id}"),
            Self::External(id) => write!(f, "external:{id}"),
        }
    }
}

type DescriptorMap = HashMap<CacheKey, Arc<CachedMaterializationDescriptor>>;

/// Point-in-time view of the cache. The underlying mapping is never mutated,
/// so iterating a snapshot is safe while writers publish newer ones.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    entries: Arc<DescriptorMap>,
}

impl CacheSnapshot {
    pub fn get(&self, key: &CacheKey) -> Option<&Arc<CachedMaterializationDescriptor>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &CacheKey> {
        self.entries.keys()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<CachedMaterializationDescriptor>> {
        self.entries.values()
    }

    pub fn same_as(&self, other: &CacheSnapshot) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshStats {
    pub materialization_reuse: usize,
    pub materialization_expand: usize,
    pub materialization_error: usize,
    pub external_reuse: usize,
    pub external_expand: usize,
    pub external_error: usize,
    // publish attempts, 1 unless a concurrent writer won the race
    pub attempts: usize,
}

pub trait CacheViewer {
    fn is_cached(&self, id: &MaterializationId) -> bool;
}

/// Cache of expanded materialization descriptors, so planning does not have to
/// expand every stored plan for every query.
///
/// The live mapping is an immutable `HashMap` behind an [`ArcSwap`]. Writers
/// build a replacement and publish it with compare-and-swap; readers load the
/// current `Arc` and never block.
pub struct MaterializationCache {
    cached: ArcSwap<DescriptorMap>,
    helper: Arc<dyn CacheHelper>,
    status: Arc<dyn ReflectionStatusOracle>,
    catalog: Arc<dyn CatalogAccessor>,
}

impl MaterializationCache {
    pub fn new(
        helper: Arc<dyn CacheHelper>,
        status: Arc<dyn ReflectionStatusOracle>,
        catalog: Arc<dyn CatalogAccessor>,
    ) -> Self {
        Self {
            cached: ArcSwap::from_pointee(HashMap::new()),
            helper,
            status,
            catalog,
        }
    }

    /// Rebuilds the mapping from the helper's authoritative lists, reusing every
    /// entry that is still current, and publishes it.
    ///
    /// A lost publish race restarts from a fresh read of both lists rather than
    /// re-publishing the computed map. Under sustained high-frequency point
    /// writes this can spin indefinitely; callers drive refresh from a single
    /// periodic task so contention stays occasional.
    pub fn refresh(&self) -> Result<RefreshStats, AccelError> {
        // an always-open gate never skips, so the stats are always present
        self.refresh_if(|| true).map(Option::unwrap_or_default)
    }

    /// Like [`refresh`](Self::refresh), but consults `enabled` before every
    /// publish attempt and returns `Ok(None)` without publishing once it turns
    /// false. `reset_cache` replaces the live pointer, so a publish computed
    /// before a concurrent disable loses its race and hits the gate on retry.
    #[instrument(skip_all)]
    pub(crate) fn refresh_if(
        &self,
        enabled: impl Fn() -> bool,
    ) -> Result<Option<RefreshStats>, AccelError> {
        let mut attempts = 0;
        loop {
            if !enabled() {
                debug!(attempt = attempts, "materialization cache disabled; skipping refresh");
                return Ok(None);
            }
            attempts += 1;
            let old = self.cached.load_full();
            let (updated, mut stats) = self.updated_mapping(&old)?;
            if !enabled() {
                debug!(attempt = attempts, "materialization cache disabled during refresh; discarding");
                return Ok(None);
            }
            let previous = self.cached.compare_and_swap(&old, Arc::new(updated));
            if Arc::ptr_eq(&*previous, &old) {
                stats.attempts = attempts;
                return Ok(Some(stats));
            }
            debug!(attempt = attempts, "materialization cache changed during refresh; retrying");
        }
    }

    fn updated_mapping(&self, old: &DescriptorMap) -> Result<(DescriptorMap, RefreshStats), AccelError> {
        let materializations = self.helper.valid_materializations()?;
        let externals = self.helper.external_reflections()?;

        let mut updated = DescriptorMap::with_capacity(materializations.len() + externals.len());
        let mut stats = RefreshStats::default();

        for materialization in &materializations {
            let source = CacheSource::Materialization(materialization);
            let _span = debug_span!(
                "materialization_entry",
                reflection_id = %materialization.reflection_id,
                materialization_id = %materialization.id,
            )
            .entered();
            match self.reuse_or_expand(old, &mut updated, source)? {
                EntryOutcome::Reused => stats.materialization_reuse += 1,
                EntryOutcome::Expanded => stats.materialization_expand += 1,
                EntryOutcome::Failed => stats.materialization_error += 1,
            }
        }

        for external in &externals {
            let source = CacheSource::External(external);
            let _span = debug_span!(
                "external_reflection_entry",
                reflection_id = %external.id,
                name = %external.name,
                query_dataset_id = %external.query_dataset_id,
                target_dataset_id = %external.target_dataset_id,
            )
            .entered();
            match self.reuse_or_expand(old, &mut updated, source)? {
                EntryOutcome::Reused => stats.external_reuse += 1,
                EntryOutcome::Expanded => stats.external_expand += 1,
                EntryOutcome::Failed => stats.external_error += 1,
            }
        }

        info!(
            materialization_reuse = stats.materialization_reuse,
            materialization_expand = stats.materialization_expand,
            materialization_error = stats.materialization_error,
            external_reuse = stats.external_reuse,
            external_expand = stats.external_expand,
            external_error = stats.external_error,
            "materialization cache updated"
        );

        Ok((updated, stats))
    }

    fn reuse_or_expand(
        &self,
        old: &DescriptorMap,
        updated: &mut DescriptorMap,
        source: CacheSource<'_>,
    ) -> Result<EntryOutcome, AccelError> {
        let key = source.cache_key();
        if let Some(cached) = old.get(&key) {
            if !source.is_stale(cached, self.status.as_ref())? {
                updated.insert(key, Arc::clone(cached));
                return Ok(EntryOutcome::Reused);
            }
        }

        match source.expand(self.helper.as_ref(), &self.catalog) {
            Ok(Some(expanded)) => {
                updated.insert(key, expanded);
                Ok(EntryOutcome::Expanded)
            }
            Ok(None) => {
                debug!(entry = %key, "couldn't expand materialization: no plan");
                Ok(EntryOutcome::Failed)
            }
            Err(err) => {
                debug!(entry = %key, error = %err, "couldn't expand materialization");
                Ok(EntryOutcome::Failed)
            }
        }
    }

    /// Publishes an empty mapping. Always installs a fresh pointer, so any
    /// in-flight publish against the previous mapping fails its swap.
    pub fn reset_cache(&self) {
        self.cached.store(Arc::new(HashMap::new()));
    }

    pub fn invalidate(&self, id: &MaterializationId) {
        self.invalidate_key(&CacheKey::Materialization(id.clone()));
    }

    pub fn invalidate_external(&self, id: &ExternalReflectionId) {
        self.invalidate_key(&CacheKey::External(id.clone()));
    }

    fn invalidate_key(&self, key: &CacheKey) {
        loop {
            let old = self.cached.load_full();
            if !old.contains_key(key) {
                return;
            }
            let mut updated = DescriptorMap::clone(&old);
            updated.remove(key);
            let previous = self.cached.compare_and_swap(&old, Arc::new(updated));
            if Arc::ptr_eq(&*previous, &old) {
                return;
            }
        }
    }

    /// Expands `materialization` and publishes it. Expansion runs once, before
    /// the publish loop, so a slow expansion does not keep losing races against
    /// refresh. Returns `Ok(false)` when the helper produced no descriptor; the
    /// existing entry is left untouched in that case and on error.
    #[instrument(skip_all, fields(materialization_id = %materialization.id))]
    pub fn update(&self, materialization: &Materialization) -> Result<bool, AccelError> {
        let source = CacheSource::Materialization(materialization);
        let Some(descriptor) = source.expand(self.helper.as_ref(), &self.catalog)? else {
            return Ok(false);
        };
        let key = source.cache_key();
        loop {
            let old = self.cached.load_full();
            let mut updated = DescriptorMap::clone(&old);
            updated.insert(key.clone(), Arc::clone(&descriptor));
            let previous = self.cached.compare_and_swap(&old, Arc::new(updated));
            if Arc::ptr_eq(&*previous, &old) {
                return Ok(true);
            }
        }
    }

    pub fn get(&self, id: &MaterializationId) -> Option<Arc<CachedMaterializationDescriptor>> {
        self.cached
            .load()
            .get(&CacheKey::Materialization(id.clone()))
            .cloned()
    }

    pub fn get_external(&self, id: &ExternalReflectionId) -> Option<Arc<CachedMaterializationDescriptor>> {
        self.cached
            .load()
            .get(&CacheKey::External(id.clone()))
            .cloned()
    }

    pub fn contains(&self, id: &MaterializationId) -> bool {
        self.cached
            .load()
            .contains_key(&CacheKey::Materialization(id.clone()))
    }

    pub fn get_all(&self) -> CacheSnapshot {
        CacheSnapshot {
            entries: self.cached.load_full(),
        }
    }

    pub(crate) fn expand_uncached(
        &self,
        source: CacheSource<'_>,
    ) -> Result<Option<Arc<CachedMaterializationDescriptor>>, AccelError> {
        source.expand(self.helper.as_ref(), &self.catalog)
    }

    pub(crate) fn helper(&self) -> &dyn CacheHelper {
        self.helper.as_ref()
    }
}

impl CacheViewer for MaterializationCache {
    fn is_cached(&self, id: &MaterializationId) -> bool {
        self.contains(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryOutcome {
    Reused,
    Expanded,
    Failed,
}
