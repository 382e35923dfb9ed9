use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use super::OrderedTable;

/// A resource exposed through `resources/list` and `resources/read`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDefinition {
    pub uri: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Where the content comes from, e.g. `inline:<text>`.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

impl ResourceDefinition {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
            description: None,
            mime_type: None,
            source: None,
            config: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn to_resource_entry(&self) -> Value {
        let mut entry = json!({
            "uri": self.uri,
            "name": self.name.as_deref().unwrap_or(&self.uri),
        });
        if let Some(object) = entry.as_object_mut() {
            if let Some(description) = &self.description {
                object.insert("description".to_string(), json!(description));
            }
            if let Some(mime_type) = &self.mime_type {
                object.insert("mimeType".to_string(), json!(mime_type));
            }
        }
        entry
    }
}

#[derive(Debug, Deserialize)]
struct ResourceDocument {
    #[serde(default)]
    resources: Vec<ResourceDefinition>,
}

#[derive(Debug, Clone, Default)]
pub struct ResourceCatalog {
    table: OrderedTable<ResourceDefinition>,
}

impl ResourceCatalog {
    pub fn new(definitions: impl IntoIterator<Item = ResourceDefinition>) -> Self {
        Self {
            table: OrderedTable::build(definitions, |definition| &mut definition.uri),
        }
    }

    /// Parses a `{"resources": [...]}` document.
    pub fn from_json_str(document: &str) -> Result<Self, serde_json::Error> {
        let document: ResourceDocument = serde_json::from_str(document)?;
        Ok(Self::new(document.resources))
    }

    pub fn list(&self) -> &[ResourceDefinition] {
        self.table.list()
    }

    pub fn find_by_uri(&self, uri: &str) -> Option<&ResourceDefinition> {
        self.table.find(uri)
    }

    pub fn has_resource(&self, uri: &str) -> bool {
        self.find_by_uri(uri).is_some()
    }

    pub fn len(&self) -> usize {
        self.table.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.list().is_empty()
    }
}
