//! Resource inventory built from a state document.

use crate::error::{DocumentKind, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Name used for resources whose state entry carries no `name`.
pub const UNKNOWN_NAME: &str = "unknown";

/// Whether a resource is managed or a read-only data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum ResourceMode {
    /// Created and destroyed by the tool; also the mode of entries without one
    Managed,
    /// Read-only reference to existing infrastructure
    Data,
    /// Any other mode string, kept verbatim
    Other(String),
}

impl ResourceMode {
    /// A missing mode is managed.
    fn from_raw(mode: Option<&str>) -> Self {
        match mode {
            None | Some("managed") => Self::Managed,
            Some("data") => Self::Data,
            Some(other) => Self::Other(other.to_string()),
        }
    }

    /// The mode as written in the state document.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Managed => "managed",
            Self::Data => "data",
            Self::Other(mode) => mode,
        }
    }

    /// Whether the tool manages this resource's lifecycle.
    pub fn is_managed(&self) -> bool {
        matches!(self, Self::Managed)
    }
}

impl From<ResourceMode> for String {
    fn from(mode: ResourceMode) -> Self {
        match mode {
            ResourceMode::Other(mode) => mode,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for ResourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One resource from the state's `resources` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceRecord {
    resource_type: String,
    name: String,
    mode: ResourceMode,
}

impl ResourceRecord {
    /// Resource type, e.g. `aws_instance`.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Resource name, or [`UNKNOWN_NAME`] when the entry has none.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resource mode, [`ResourceMode::Managed`] when the entry has none.
    pub fn mode(&self) -> &ResourceMode {
        &self.mode
    }
}

/// Resources sharing one type, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceGroup {
    resource_type: String,
    resources: Vec<ResourceRecord>,
}

impl ResourceGroup {
    /// The shared resource type.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Resources in document order.
    pub fn resources(&self) -> &[ResourceRecord] {
        &self.resources
    }

    /// Number of resources of this type.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether the group has no resources.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Read-only view of a state file, grouped by resource type.
///
/// A state without resources is an empty model, not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StateModel {
    groups: Vec<ResourceGroup>,
}

impl StateModel {
    /// Build the model from a parsed state document.
    pub fn build(document: &Value) -> Result<Self> {
        if !document.is_object() {
            return Err(malformed("state document is not a JSON object"));
        }
        let state = StateDocument::deserialize(document)
            .map_err(|e| Error::malformed(DocumentKind::State, &e))?;

        let mut groups: Vec<ResourceGroup> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for entry in state.resources.unwrap_or_default() {
            if !entry.is_object() {
                return Err(malformed("resource is not a JSON object"));
            }
            let raw = RawResource::deserialize(&entry)
                .map_err(|e| Error::malformed(DocumentKind::State, &e))?;

            let record = ResourceRecord {
                name: raw
                    .name
                    .as_ref()
                    .and_then(Value::as_str)
                    .unwrap_or(UNKNOWN_NAME)
                    .to_string(),
                mode: ResourceMode::from_raw(raw.mode.as_ref().and_then(Value::as_str)),
                resource_type: raw.resource_type,
            };

            let slot = if let Some(&slot) = index.get(&record.resource_type) {
                slot
            } else {
                groups.push(ResourceGroup {
                    resource_type: record.resource_type.clone(),
                    resources: Vec::new(),
                });
                index.insert(record.resource_type.clone(), groups.len() - 1);
                groups.len() - 1
            };
            groups[slot].resources.push(record);
        }

        Ok(Self { groups })
    }

    /// Parse state JSON text and build the model.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| Error::malformed(DocumentKind::State, &e))?;
        Self::build(&value)
    }

    /// Parse state JSON bytes and build the model.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|e| Error::malformed(DocumentKind::State, &e))?;
        Self::build(&value)
    }

    /// Type groups in first-seen order.
    pub fn groups(&self) -> &[ResourceGroup] {
        &self.groups
    }

    /// The group for one resource type.
    pub fn group(&self, resource_type: &str) -> Option<&ResourceGroup> {
        self.groups
            .iter()
            .find(|g| g.resource_type == resource_type)
    }

    /// Total number of resources across all groups.
    pub fn resource_count(&self) -> usize {
        self.groups.iter().map(ResourceGroup::len).sum()
    }

    /// Whether the state holds no resources.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[derive(Deserialize)]
struct StateDocument {
    #[serde(default)]
    resources: Option<Vec<Value>>,
}

#[derive(Deserialize)]
struct RawResource {
    #[serde(rename = "type")]
    resource_type: String,
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    mode: Option<Value>,
}

fn malformed(message: &str) -> Error {
    Error::MalformedDocument {
        kind: DocumentKind::State,
        message: message.to_string(),
    }
}
