use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::{MaterializationCache, RefreshStats};
use crate::config::AccelerationConfig;
use crate::descriptor::CachedMaterializationDescriptor;
use crate::staleness::CacheSource;
use crate::types::MaterializationId;
use crate::AccelError;

/// Entry point the planner reads descriptors through. Serves from the cache
/// while it is enabled; otherwise expands the helper's current entries on
/// every call.
///
/// The provider never schedules itself: whoever owns it calls [`refresh`]
/// every [`AccelerationConfig::refresh_interval`].
///
/// [`refresh`]: MaterializationDescriptorProvider::refresh
pub struct MaterializationDescriptorProvider {
    cache: Arc<MaterializationCache>,
    config: AccelerationConfig,
    cache_enabled: AtomicBool,
}

impl MaterializationDescriptorProvider {
    pub fn new(cache: Arc<MaterializationCache>, config: AccelerationConfig) -> Self {
        let cache_enabled = AtomicBool::new(config.cache_enabled);
        Self {
            cache,
            config,
            cache_enabled,
        }
    }

    pub fn cache(&self) -> &Arc<MaterializationCache> {
        &self.cache
    }

    /// The configuration the provider was built with. `cache_enabled` here is
    /// the initial state only; [`is_cache_enabled`](Self::is_cache_enabled)
    /// reflects later calls to `set_cache_enabled`.
    pub fn config(&self) -> &AccelerationConfig {
        &self.config
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.cache_enabled.load(Ordering::SeqCst)
    }

    pub fn set_cache_enabled(&self, enabled: bool) {
        let was_enabled = self.cache_enabled.swap(enabled, Ordering::SeqCst);
        if was_enabled == enabled {
            return;
        }
        if !enabled {
            self.cache.reset_cache();
        }
        info!(enabled, "materialization cache toggled");
    }

    /// `Ok(None)` while the cache is disabled, including when it is disabled
    /// while this refresh is running; nothing is published in that case.
    pub fn refresh(&self) -> Result<Option<RefreshStats>, AccelError> {
        self.cache.refresh_if(|| self.is_cache_enabled())
    }

    pub fn get(
        &self,
        id: &MaterializationId,
    ) -> Result<Option<Arc<CachedMaterializationDescriptor>>, AccelError> {
        if self.is_cache_enabled() {
            return Ok(self.cache.get(id));
        }

        let materializations = self.cache.helper().valid_materializations()?;
        let Some(materialization) = materializations.iter().find(|m| &m.id == id) else {
            return Ok(None);
        };
        Ok(self.expand_or_skip(CacheSource::Materialization(materialization)))
    }

    pub fn get_all(&self) -> Result<Vec<Arc<CachedMaterializationDescriptor>>, AccelError> {
        if self.is_cache_enabled() {
            return Ok(self.cache.get_all().descriptors().cloned().collect());
        }

        let helper = self.cache.helper();
        let materializations = helper.valid_materializations()?;
        let externals = helper.external_reflections()?;

        let mut descriptors = Vec::with_capacity(materializations.len() + externals.len());
        let sources = materializations
            .iter()
            .map(CacheSource::Materialization)
            .chain(externals.iter().map(CacheSource::External));
        for source in sources {
            if let Some(descriptor) = self.expand_or_skip(source) {
                descriptors.push(descriptor);
            }
        }
        Ok(descriptors)
    }

    fn expand_or_skip(&self, source: CacheSource<'_>) -> Option<Arc<CachedMaterializationDescriptor>> {
        match self.cache.expand_uncached(source) {
            Ok(expanded) => expanded,
            Err(err) => {
                debug!(entry = %source.cache_key(), error = %err, "couldn't expand materialization");
                None
            }
        }
    }
}
