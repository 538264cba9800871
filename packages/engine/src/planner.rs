use std::collections::BTreeSet;
use std::ops::ControlFlow;
use std::sync::Arc;

use serde::Serialize;
use sqlparser::ast::{ObjectName, ObjectNamePart, Statement, TableFactor, Visit, Visitor};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::descriptor::CachedMaterializationDescriptor;
use crate::hints::ReflectionHints;
use crate::provider::MaterializationDescriptorProvider;
use crate::AccelError;

#[derive(Debug, Clone)]
pub struct SubstitutionCandidate {
    pub descriptor: Arc<CachedMaterializationDescriptor>,
    // listed in `choose_reflections`
    pub preferred: bool,
}

#[derive(Debug, Clone)]
pub struct SubstitutionCandidates {
    pub hints: ReflectionHints,
    pub relations: BTreeSet<String>,
    pub candidates: Vec<SubstitutionCandidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateSummary {
    pub reflection_id: String,
    pub materialization_id: String,
    pub preferred: bool,
}

impl SubstitutionCandidates {
    pub fn summary(&self) -> Vec<CandidateSummary> {
        self.candidates
            .iter()
            .map(|candidate| CandidateSummary {
                reflection_id: candidate.descriptor.reflection_id().to_string(),
                materialization_id: candidate.descriptor.descriptor().materialization_id.clone(),
                preferred: candidate.preferred,
            })
            .collect()
    }
}

/// Picks the descriptors the substitution search may consider for `sql`:
/// reflection hints restrict the set, and with the prefilter enabled only
/// descriptors touching a relation the query reads are kept.
pub fn substitution_candidates(
    provider: &MaterializationDescriptorProvider,
    sql: &str,
) -> Result<SubstitutionCandidates, AccelError> {
    let hints = ReflectionHints::from_sql(sql)?;
    let statements = Parser::parse_sql(&GenericDialect {}, sql)
        .map_err(|err| AccelError::invalid_query(err.to_string()))?;
    let relations = referenced_relations(&statements);

    if hints.disables_reflections() {
        return Ok(SubstitutionCandidates {
            hints,
            relations,
            candidates: Vec::new(),
        });
    }

    let prefilter = provider.config().candidate_prefilter;
    let mut candidates: Vec<SubstitutionCandidate> = provider
        .get_all()?
        .into_iter()
        .filter(|descriptor| hints.allows(descriptor.reflection_id()))
        .filter(|descriptor| !prefilter || touches_any(descriptor, &relations))
        .map(|descriptor| SubstitutionCandidate {
            preferred: hints.prefers(descriptor.reflection_id()),
            descriptor,
        })
        .collect();

    candidates.sort_by(|left, right| {
        right.preferred.cmp(&left.preferred).then_with(|| {
            let left = left.descriptor.descriptor();
            let right = right.descriptor.descriptor();
            (&left.reflection_id, &left.materialization_id)
                .cmp(&(&right.reflection_id, &right.materialization_id))
        })
    });

    Ok(SubstitutionCandidates {
        hints,
        relations,
        candidates,
    })
}

/// Lower-cased, dot-joined names of every table the statements read.
pub fn referenced_relations(statements: &[Statement]) -> BTreeSet<String> {
    struct Collector {
        relations: BTreeSet<String>,
    }

    impl Visitor for Collector {
        type Break = ();

        fn pre_visit_table_factor(
            &mut self,
            table_factor: &TableFactor,
        ) -> ControlFlow<Self::Break> {
            if let TableFactor::Table { name, .. } = table_factor {
                if let Some(relation) = dotted_name(name) {
                    self.relations.insert(relation);
                }
            }
            ControlFlow::Continue(())
        }
    }

    let mut collector = Collector {
        relations: BTreeSet::new(),
    };
    for statement in statements {
        // the collector always continues
        if statement.visit(&mut collector).is_break() {
            break;
        }
    }
    collector.relations
}

fn dotted_name(name: &ObjectName) -> Option<String> {
    let parts: Option<Vec<String>> = name
        .0
        .iter()
        .map(|part| ObjectNamePart::as_ident(part).map(|ident| ident.value.to_ascii_lowercase()))
        .collect();
    parts.filter(|parts| !parts.is_empty()).map(|parts| parts.join("."))
}

fn touches_any(descriptor: &CachedMaterializationDescriptor, relations: &BTreeSet<String>) -> bool {
    let dataset_path = descriptor.descriptor().dataset_path.to_string();
    let scanned = descriptor
        .materialization()
        .table_rel()
        .scanned_tables()
        .into_iter()
        .map(ToString::to_string);

    std::iter::once(dataset_path).chain(scanned).any(|dataset| {
        let dataset = dataset.to_ascii_lowercase();
        relations
            .iter()
            .any(|relation| relation_matches(relation, &dataset))
    })
}

// an unqualified query relation matches the trailing components of a dataset path
fn relation_matches(relation: &str, dataset: &str) -> bool {
    dataset == relation
        || dataset
            .strip_suffix(relation)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
