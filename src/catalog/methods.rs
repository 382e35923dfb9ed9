use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::OrderedTable;

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// A tool exposed through `tools/list` and invoked through `tools/call`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodDefinition {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "empty_object")]
    pub input_schema: Value,
    #[serde(default = "empty_object")]
    pub output_schema: Value,
    #[serde(default = "empty_object")]
    pub annotations: Value,
    #[serde(default, rename = "_meta")]
    pub meta: Option<Value>,
}

impl MethodDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            description: None,
            input_schema: empty_object(),
            output_schema: empty_object(),
            annotations: empty_object(),
            meta: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn title(&self) -> &str {
        self.title
            .as_deref()
            .filter(|title| !title.trim().is_empty())
            .unwrap_or(&self.name)
    }

    /// Argument names listed under `inputSchema.required`.
    pub fn required_arguments(&self) -> Vec<&str> {
        self.input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|required| required.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    pub fn to_tool_entry(&self) -> Value {
        let mut entry = json!({
            "name": self.name,
            "title": self.title(),
            "description": self.description.as_deref().unwrap_or_default(),
            "inputSchema": self.input_schema,
            "outputSchema": self.output_schema,
            "annotations": self.annotations,
        });
        if let (Some(meta), Some(object)) = (self.meta.as_ref(), entry.as_object_mut()) {
            object.insert("_meta".to_string(), meta.clone());
        }
        entry
    }
}

#[derive(Debug, Deserialize)]
struct MethodDocument {
    #[serde(default)]
    methods: Vec<MethodDefinition>,
}

#[derive(Debug, Clone, Default)]
pub struct MethodCatalog {
    table: OrderedTable<MethodDefinition>,
}

impl MethodCatalog {
    pub fn new(definitions: impl IntoIterator<Item = MethodDefinition>) -> Self {
        Self {
            table: OrderedTable::build(definitions, |definition| &mut definition.name),
        }
    }

    /// Parses a `{"methods": [...]}` document.
    pub fn from_json_str(document: &str) -> Result<Self, serde_json::Error> {
        let document: MethodDocument = serde_json::from_str(document)?;
        Ok(Self::new(document.methods))
    }

    pub fn list(&self) -> &[MethodDefinition] {
        self.table.list()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&MethodDefinition> {
        self.table.find(name)
    }

    pub fn len(&self) -> usize {
        self.table.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.list().is_empty()
    }
}
