//! Read-only method and resource catalogs
//!
//! Catalogs are built once, handed to the engine, and never mutated afterwards.
//! Each engine owns its own instances.

pub mod methods;
pub mod resources;

use std::collections::HashMap;

pub use methods::{MethodCatalog, MethodDefinition};
pub use resources::{ResourceCatalog, ResourceDefinition};

/// Insertion-ordered table keyed by a string identifier.
#[derive(Debug, Clone)]
struct OrderedTable<T> {
    entries: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> OrderedTable<T> {
    /// Keys are stored trimmed. Blank keys are skipped; a repeated key replaces
    /// the earlier entry in place.
    fn build<I, F>(definitions: I, key: F) -> Self
    where
        I: IntoIterator<Item = T>,
        F: Fn(&mut T) -> &mut String,
    {
        let mut entries: Vec<T> = Vec::new();
        let mut index = HashMap::new();
        for mut definition in definitions {
            let slot = key(&mut definition);
            let id = slot.trim().to_string();
            if id.is_empty() {
                continue;
            }
            if slot.len() != id.len() {
                *slot = id.clone();
            }
            match index.get(&id) {
                Some(&position) => entries[position] = definition,
                None => {
                    index.insert(id, entries.len());
                    entries.push(definition);
                }
            }
        }
        Self { entries, index }
    }

    fn list(&self) -> &[T] {
        &self.entries
    }

    fn find(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&position| &self.entries[position])
    }
}

impl<T> Default for OrderedTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}
