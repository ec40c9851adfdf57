use crate::actor::{ActorRef, Builder, Capability};
use crate::attributes::{
    register_builtins, AttributeOutcome, AttributeProcessor, AttributeRegistry,
    BuildingAttributeProcessor,
};
use crate::error::{InterpretError, InterpretResult};
use crate::macros::{self, MacroContext, MacroHandler};
use crate::state::ParserState;
use crate::tags::{TagHandler, TagProvider};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Process-wide registries: tags, attributes and macros.
///
/// Filled once at startup and read-only afterwards; an `Arc<Syntax>` can be
/// shared by any number of interpreters.
pub struct Syntax {
    tags: HashMap<String, Arc<dyn TagProvider>>,
    attributes: AttributeRegistry<dyn AttributeProcessor>,
    building_attributes: AttributeRegistry<dyn BuildingAttributeProcessor>,
    macros: HashMap<String, Arc<dyn MacroHandler>>,
}

impl Default for Syntax {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Syntax {
    /// Registries with nothing registered
    pub fn empty() -> Self {
        Self {
            tags: HashMap::new(),
            attributes: AttributeRegistry::new("attribute"),
            building_attributes: AttributeRegistry::new("building attribute"),
            macros: HashMap::new(),
        }
    }

    /// Built-in attributes (`id`, `style`, `skin`) and the default macro set
    pub fn with_defaults() -> Self {
        let mut syntax = Self::empty();
        register_builtins(&mut syntax.attributes, &mut syntax.building_attributes);
        macros::register_defaults(&mut syntax);
        syntax
    }

    // --- tags ---

    pub fn register_tag(&mut self, name: &str, provider: impl TagProvider + 'static) -> InterpretResult<()> {
        let key = name.to_ascii_lowercase();
        if self.tags.contains_key(&key) {
            return Err(InterpretError::DuplicateRegistration {
                kind: "tag",
                name: name.to_string(),
            });
        }
        debug!(tag = %name, "Registering tag provider");
        self.tags.insert(key, Arc::new(provider));
        Ok(())
    }

    pub fn tag_provider(&self, name: &str) -> Option<&Arc<dyn TagProvider>> {
        self.tags.get(&name.to_ascii_lowercase())
    }

    // --- attributes ---

    pub fn register_attribute<F>(&mut self, name: &str, capability: Capability, processor: F) -> InterpretResult<()>
    where
        F: Fn(&mut ParserState, &mut dyn TagHandler, &ActorRef, &str) -> InterpretResult<()> + Send + Sync + 'static,
    {
        self.attributes.register(name, capability, Arc::new(processor))
    }

    pub fn register_attribute_processor(
        &mut self,
        name: &str,
        capability: Capability,
        processor: Arc<dyn AttributeProcessor>,
    ) -> InterpretResult<()> {
        self.attributes.register(name, capability, processor)
    }

    pub fn register_building_attribute<F>(
        &mut self,
        name: &str,
        capability: Capability,
        processor: F,
    ) -> InterpretResult<()>
    where
        F: Fn(&mut ParserState, &mut dyn Builder, &str) -> InterpretResult<AttributeOutcome> + Send + Sync + 'static,
    {
        self.building_attributes.register(name, capability, Arc::new(processor))
    }

    pub fn register_building_attribute_processor(
        &mut self,
        name: &str,
        capability: Capability,
        processor: Arc<dyn BuildingAttributeProcessor>,
    ) -> InterpretResult<()> {
        self.building_attributes.register(name, capability, processor)
    }

    pub fn attributes(&self) -> &AttributeRegistry<dyn AttributeProcessor> {
        &self.attributes
    }

    pub fn building_attributes(&self) -> &AttributeRegistry<dyn BuildingAttributeProcessor> {
        &self.building_attributes
    }

    // --- macros ---

    pub fn register_macro(&mut self, name: &str, handler: impl MacroHandler + 'static) -> InterpretResult<()> {
        let key = name.to_ascii_lowercase();
        if self.macros.contains_key(&key) {
            return Err(InterpretError::DuplicateRegistration {
                kind: "macro",
                name: name.to_string(),
            });
        }
        self.macros.insert(key, Arc::new(handler));
        Ok(())
    }

    pub fn register_macro_fn<F>(&mut self, name: &str, handler: F) -> InterpretResult<()>
    where
        F: Fn(&mut MacroContext<'_, '_>) -> InterpretResult<()> + Send + Sync + 'static,
    {
        self.register_macro(name, handler)
    }

    pub fn replace_macro(&mut self, name: &str, handler: impl MacroHandler + 'static) {
        self.macros.insert(name.to_ascii_lowercase(), Arc::new(handler));
    }

    pub fn macro_handler(&self, name: &str) -> Option<Arc<dyn MacroHandler>> {
        self.macros.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn macro_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.macros.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for Syntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<_> = self.tags.keys().collect();
        tags.sort();
        f.debug_struct("Syntax")
            .field("tags", &tags)
            .field("attributes", &self.attributes)
            .field("building_attributes", &self.building_attributes)
            .field("macros", &self.macro_names())
            .finish()
    }
}
