use std::collections::BTreeMap;
use std::sync::Arc;

use crate::contracts::{GeneratorDefinition, GeneratorError, NumberGenerator};
use crate::numbering::Generator;

/// Builds a fresh generator instance.
pub type GeneratorFactory = Arc<dyn Fn() -> Box<dyn NumberGenerator> + Send + Sync>;

struct Entry {
    definition: GeneratorDefinition,
    factory: GeneratorFactory,
}

/// Lookup table from generator id to definition and factory.
///
/// Holds no runtime state beyond the table itself; every `create_instance`
/// call builds a new generator.
#[derive(Default)]
pub struct GeneratorRegistry {
    entries: BTreeMap<String, Entry>,
}

impl GeneratorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the four built-in generators.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for generator in Generator::ALL {
            registry.entries.insert(
                generator.id().to_string(),
                Entry {
                    definition: generator.definition(),
                    factory: Arc::new(move || Box::new(generator) as Box<dyn NumberGenerator>),
                },
            );
        }
        registry
    }

    /// Registers every entry that validates and returns the rejected ones
    /// alongside the registry. A bad definition only disables itself.
    pub fn discover<I>(mut self, entries: I) -> (Self, Vec<GeneratorError>)
    where
        I: IntoIterator<Item = (GeneratorDefinition, GeneratorFactory)>,
    {
        let mut rejected = Vec::new();
        for (definition, factory) in entries {
            if let Err(e) = self.register_factory(definition, factory) {
                tracing::warn!(error = %e, "Rejected invoice number generator definition");
                rejected.push(e);
            }
        }
        (self, rejected)
    }

    /// Registers a generator under `definition.id`.
    pub fn register<F>(
        &mut self,
        definition: GeneratorDefinition,
        factory: F,
    ) -> Result<(), GeneratorError>
    where
        F: Fn() -> Box<dyn NumberGenerator> + Send + Sync + 'static,
    {
        self.register_factory(definition, Arc::new(factory))
    }

    fn register_factory(
        &mut self,
        definition: GeneratorDefinition,
        factory: GeneratorFactory,
    ) -> Result<(), GeneratorError> {
        for (property, value) in [("id", &definition.id), ("label", &definition.label)] {
            if value.trim().is_empty() {
                return Err(GeneratorError::MissingProperty {
                    generator: definition.id.clone(),
                    property,
                });
            }
        }
        if self.entries.contains_key(&definition.id) {
            return Err(GeneratorError::DuplicateId(definition.id));
        }

        tracing::debug!(generator = %definition.id, "Registered invoice number generator");
        self.entries
            .insert(definition.id.clone(), Entry { definition, factory });
        Ok(())
    }

    /// Returns all definitions keyed by id.
    pub fn definitions(&self) -> BTreeMap<String, GeneratorDefinition> {
        self.entries
            .iter()
            .map(|(id, entry)| (id.clone(), entry.definition.clone()))
            .collect()
    }

    pub fn definition(&self, id: &str) -> Option<&GeneratorDefinition> {
        self.entries.get(id).map(|entry| &entry.definition)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Instantiates the generator registered under `id`.
    pub fn create_instance(&self, id: &str) -> Result<Box<dyn NumberGenerator>, GeneratorError> {
        self.entries
            .get(id)
            .map(|entry| (entry.factory)())
            .ok_or_else(|| GeneratorError::NotFound(id.to_string()))
    }
}
