use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{NamespaceKey, RecordSchema};
use crate::AccelError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum TableScan {
    /// Scan over a catalog dataset; `version` is the dataset tag frozen at
    /// expansion time.
    Catalog {
        table: NamespaceKey,
        version: String,
    },
    Other {
        scan_kind: String,
        table: NamespaceKey,
    },
}

impl TableScan {
    pub fn table(&self) -> &NamespaceKey {
        match self {
            Self::Catalog { table, .. } | Self::Other { table, .. } => table,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum RelNode {
    Scan(TableScan),
    Values {
        row_count: usize,
    },
    Project {
        input: Box<RelNode>,
        columns: Vec<String>,
    },
    Filter {
        input: Box<RelNode>,
        condition: String,
    },
    Aggregate {
        input: Box<RelNode>,
        group_by: Vec<String>,
        measures: Vec<String>,
    },
    Join {
        left: Box<RelNode>,
        right: Box<RelNode>,
        condition: String,
    },
    Union {
        inputs: Vec<RelNode>,
    },
}

impl RelNode {
    pub fn scan(scan: TableScan) -> Self {
        Self::Scan(scan)
    }

    pub fn children(&self) -> Vec<&RelNode> {
        match self {
            Self::Scan(_) | Self::Values { .. } => Vec::new(),
            Self::Project { input, .. }
            | Self::Filter { input, .. }
            | Self::Aggregate { input, .. } => vec![input.as_ref()],
            Self::Join { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Self::Union { inputs } => inputs.iter().collect(),
        }
    }

    /// Table scans in top-down, left-to-right order.
    pub fn table_scans(&self) -> Vec<&TableScan> {
        let mut scans = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if let Self::Scan(scan) = node {
                scans.push(scan);
                continue;
            }
            stack.extend(node.children().into_iter().rev());
        }
        scans
    }

    pub fn scanned_tables(&self) -> BTreeSet<&NamespaceKey> {
        self.table_scans()
            .into_iter()
            .map(TableScan::table)
            .collect()
    }
}

/// A stored plan resolved into a substitution-ready tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandedPlan {
    table_rel: RelNode,
    schema: RecordSchema,
}

impl ExpandedPlan {
    pub fn new(table_rel: RelNode, schema: RecordSchema) -> Self {
        Self { table_rel, schema }
    }

    pub fn from_serialized(logical_plan: &[u8], schema: RecordSchema) -> Result<Self, AccelError> {
        let table_rel: RelNode = serde_json::from_slice(logical_plan).map_err(|err| {
            AccelError::expansion(format!("stored logical plan is not a valid plan: {err}"))
        })?;
        Ok(Self::new(table_rel, schema))
    }

    pub fn table_rel(&self) -> &RelNode {
        &self.table_rel
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }
}
