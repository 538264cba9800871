use std::fmt;

use serde::{Deserialize, Serialize};

pub const ACCELERATOR_STORAGE_PLUGIN: &str = "__accelerator";

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(MaterializationId);
string_id!(ReflectionId);
string_id!(ExternalReflectionId);

/// Fully qualified dataset path, e.g. `["warehouse", "sales", "orders"]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamespaceKey(Vec<String>);

impl NamespaceKey {
    pub fn new(path: Vec<String>) -> Self {
        Self(path)
    }

    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn path(&self) -> &[String] {
        &self.0
    }

    pub fn leaf(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }
}

impl fmt::Display for NamespaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordSchema {
    pub fields: Vec<Field>,
}

impl RecordSchema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    pub fn serialize(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn deserialize(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

/// Catalog view of a dataset: its current version tag and the serialized
/// record schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub key: NamespaceKey,
    pub tag: String,
    pub record_schema: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReflectionType {
    Raw,
    Aggregation,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Materialization {
    pub id: MaterializationId,
    pub reflection_id: ReflectionId,
    // changes on every re-publish of the materialization
    pub tag: String,
    pub reflection_type: ReflectionType,
    pub dataset_path: NamespaceKey,
    pub schema: RecordSchema,
    pub logical_plan: Vec<u8>,
}

impl Materialization {
    pub fn storage_path(&self) -> NamespaceKey {
        NamespaceKey::from_parts([
            ACCELERATOR_STORAGE_PLUGIN,
            self.reflection_id.as_str(),
            self.id.as_str(),
        ])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalReflection {
    pub id: ExternalReflectionId,
    pub name: String,
    pub query_dataset_id: String,
    pub target_dataset_id: String,
}
