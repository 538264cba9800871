#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use accel_engine::{
    AccelError, AccelerationConfig, CacheHelper, CachedMaterializationDescriptor,
    CatalogAccessor, DatasetConfig, ExpandedPlan, ExternalReflection, ExternalReflectionId,
    ExternalReflectionStatus, Field, Materialization, MaterializationCache,
    MaterializationDescriptor, MaterializationDescriptorProvider, MaterializationId,
    NamespaceKey, RecordSchema, ReflectionId, ReflectionStatusOracle, ReflectionType, RelNode,
    TableScan,
};

pub fn init_tracing() {
    // RUST_LOG=accel_engine=debug shows per-entry expansion failures
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn schema(columns: &[&str]) -> RecordSchema {
    RecordSchema::new(
        columns
            .iter()
            .map(|name| Field::new(*name, "VARCHAR", true))
            .collect(),
    )
}

pub fn key(parts: &[&str]) -> NamespaceKey {
    NamespaceKey::from_parts(parts.iter().copied())
}

pub fn catalog_scan(parts: &[&str], version: &str) -> RelNode {
    RelNode::scan(TableScan::Catalog {
        table: key(parts),
        version: version.to_string(),
    })
}

pub fn materialization(id: &str, reflection_id: &str, tag: &str, dataset: &[&str]) -> Materialization {
    let plan = RelNode::Project {
        columns: vec!["a".to_string(), "b".to_string()],
        input: Box::new(catalog_scan(dataset, "dataset-v1")),
    };
    Materialization {
        id: MaterializationId::new(id),
        reflection_id: ReflectionId::new(reflection_id),
        tag: tag.to_string(),
        reflection_type: ReflectionType::Raw,
        dataset_path: key(dataset),
        schema: schema(&["a", "b"]),
        logical_plan: serde_json::to_vec(&plan).unwrap(),
    }
}

pub fn external_reflection(id: &str, name: &str) -> ExternalReflection {
    ExternalReflection {
        id: ExternalReflectionId::new(id),
        name: name.to_string(),
        query_dataset_id: format!("{id}-query"),
        target_dataset_id: format!("{id}-target"),
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    datasets: Mutex<HashMap<NamespaceKey, DatasetConfig>>,
    unavailable: AtomicBool,
    pub lookups: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn put(&self, key: NamespaceKey, tag: &str, schema: &RecordSchema) {
        self.datasets.lock().unwrap().insert(
            key.clone(),
            DatasetConfig {
                key,
                tag: tag.to_string(),
                record_schema: schema.serialize().unwrap(),
            },
        );
    }

    pub fn remove(&self, key: &NamespaceKey) {
        self.datasets.lock().unwrap().remove(key);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl CatalogAccessor for FakeCatalog {
    fn dataset_config(&self, key: &NamespaceKey) -> Result<Option<DatasetConfig>, AccelError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AccelError::catalog_unavailable("catalog is offline"));
        }
        self.lookups.lock().unwrap().push(key.to_string());
        Ok(self.datasets.lock().unwrap().get(key).cloned())
    }
}

#[derive(Default)]
pub struct FakeStatus {
    statuses: Mutex<HashMap<ExternalReflectionId, ExternalReflectionStatus>>,
}

impl FakeStatus {
    pub fn set(&self, id: &str, status: ExternalReflectionStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(ExternalReflectionId::new(id), status);
    }
}

impl ReflectionStatusOracle for FakeStatus {
    fn external_reflection_status(
        &self,
        id: &ExternalReflectionId,
    ) -> Result<ExternalReflectionStatus, AccelError> {
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(id)
            .copied()
            .unwrap_or(ExternalReflectionStatus::Ok))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Error,
    Panic,
    NoPlan,
}

type ListHook = Box<dyn FnMut() + Send>;

pub struct FakeHelper {
    catalog: Arc<FakeCatalog>,
    materializations: Mutex<Vec<Materialization>>,
    externals: Mutex<Vec<ExternalReflection>>,
    external_plans: Mutex<HashMap<ExternalReflectionId, (MaterializationDescriptor, ExpandedPlan)>>,
    failures: Mutex<HashMap<String, Failure>>,
    listing_unavailable: AtomicBool,
    on_list: Mutex<Option<ListHook>>,
    pub expand_calls: Mutex<Vec<String>>,
}

impl FakeHelper {
    pub fn new(catalog: Arc<FakeCatalog>) -> Self {
        Self {
            catalog,
            materializations: Mutex::new(Vec::new()),
            externals: Mutex::new(Vec::new()),
            external_plans: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            listing_unavailable: AtomicBool::new(false),
            on_list: Mutex::new(None),
            expand_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_materializations(&self, materializations: Vec<Materialization>) {
        *self.materializations.lock().unwrap() = materializations;
    }

    pub fn set_external(&self, external: ExternalReflection, table_rel: RelNode) {
        let descriptor = MaterializationDescriptor {
            reflection_id: ReflectionId::new(external.id.as_str()),
            materialization_id: external.id.as_str().to_string(),
            version: "0".to_string(),
            reflection_type: ReflectionType::External,
            path: key(&["external", external.target_dataset_id.as_str()]),
            dataset_path: key(&["external", external.query_dataset_id.as_str()]),
        };
        self.external_plans.lock().unwrap().insert(
            external.id.clone(),
            (descriptor, ExpandedPlan::new(table_rel, schema(&["a"]))),
        );
        let mut externals = self.externals.lock().unwrap();
        externals.retain(|existing| existing.id != external.id);
        externals.push(external);
    }

    pub fn remove_external(&self, id: &str) {
        let id = ExternalReflectionId::new(id);
        self.externals.lock().unwrap().retain(|existing| existing.id != id);
        self.external_plans.lock().unwrap().remove(&id);
    }

    pub fn fail(&self, id: &str, failure: Failure) {
        self.failures.lock().unwrap().insert(id.to_string(), failure);
    }

    pub fn heal(&self, id: &str) {
        self.failures.lock().unwrap().remove(id);
    }

    pub fn set_listing_unavailable(&self, unavailable: bool) {
        self.listing_unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Runs `hook` once, the next time the materialization list is read.
    pub fn on_next_list(&self, hook: impl FnMut() + Send + 'static) {
        *self.on_list.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn expand_count(&self, id: &str) -> usize {
        self.expand_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.as_str() == id)
            .count()
    }

    pub fn reset_calls(&self) {
        self.expand_calls.lock().unwrap().clear();
    }

    fn record_expansion(&self, id: &str) -> Result<bool, AccelError> {
        self.expand_calls.lock().unwrap().push(id.to_string());
        let failure = self.failures.lock().unwrap().get(id).copied();
        match failure {
            Some(Failure::Error) => Err(AccelError::expansion(format!("cannot deserialize {id}"))),
            Some(Failure::Panic) => panic!("plan validation assertion for {id}"),
            Some(Failure::NoPlan) => Ok(false),
            None => Ok(true),
        }
    }
}

impl CacheHelper for FakeHelper {
    fn valid_materializations(&self) -> Result<Vec<Materialization>, AccelError> {
        if self.listing_unavailable.load(Ordering::SeqCst) {
            return Err(AccelError::source_unavailable("reflection store is offline"));
        }
        let hook = self.on_list.lock().unwrap().take();
        if let Some(mut hook) = hook {
            hook();
        }
        Ok(self.materializations.lock().unwrap().clone())
    }

    fn external_reflections(&self) -> Result<Vec<ExternalReflection>, AccelError> {
        Ok(self.externals.lock().unwrap().clone())
    }

    fn descriptor(
        &self,
        external_reflection: &ExternalReflection,
    ) -> Result<MaterializationDescriptor, AccelError> {
        self.external_plans
            .lock()
            .unwrap()
            .get(&external_reflection.id)
            .map(|(descriptor, _)| descriptor.clone())
            .ok_or_else(|| AccelError::expansion("unknown external reflection"))
    }

    fn expand_descriptor(
        &self,
        descriptor: &MaterializationDescriptor,
    ) -> Result<Option<ExpandedPlan>, AccelError> {
        if !self.record_expansion(&descriptor.materialization_id)? {
            return Ok(None);
        }
        Ok(self
            .external_plans
            .lock()
            .unwrap()
            .get(&ExternalReflectionId::new(descriptor.materialization_id.as_str()))
            .map(|(_, plan)| plan.clone()))
    }

    fn expand(
        &self,
        materialization: &Materialization,
    ) -> Result<Option<CachedMaterializationDescriptor>, AccelError> {
        if !self.record_expansion(materialization.id.as_str())? {
            return Ok(None);
        }
        let plan =
            ExpandedPlan::from_serialized(&materialization.logical_plan, materialization.schema.clone())?;
        Ok(Some(CachedMaterializationDescriptor::new(
            MaterializationDescriptor::from_materialization(materialization),
            plan,
            Arc::clone(&self.catalog) as Arc<dyn CatalogAccessor>,
        )))
    }
}

pub struct Harness {
    pub catalog: Arc<FakeCatalog>,
    pub status: Arc<FakeStatus>,
    pub helper: Arc<FakeHelper>,
    pub cache: Arc<MaterializationCache>,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        let catalog = Arc::new(FakeCatalog::default());
        let status = Arc::new(FakeStatus::default());
        let helper = Arc::new(FakeHelper::new(Arc::clone(&catalog)));
        let cache = Arc::new(MaterializationCache::new(
            Arc::clone(&helper) as Arc<dyn CacheHelper>,
            Arc::clone(&status) as Arc<dyn ReflectionStatusOracle>,
            Arc::clone(&catalog) as Arc<dyn CatalogAccessor>,
        ));
        Self {
            catalog,
            status,
            helper,
            cache,
        }
    }

    /// Lists `materializations` as the valid set and registers each storage
    /// path in the catalog with the materialization's schema.
    pub fn publish(&self, materializations: Vec<Materialization>) {
        for materialization in &materializations {
            self.catalog
                .put(materialization.storage_path(), &materialization.tag, &materialization.schema);
        }
        self.helper.set_materializations(materializations);
    }

    pub fn provider(&self, config: AccelerationConfig) -> MaterializationDescriptorProvider {
        MaterializationDescriptorProvider::new(Arc::clone(&self.cache), config)
    }
}

pub fn ids(cache: &MaterializationCache) -> HashSet<String> {
    cache.get_all().keys().map(ToString::to_string).collect()
}
