use std::collections::HashMap;
use std::fmt;

/// Maps a plural relation key (`"orders"`) to the singular entity name the
/// registry stores it under (`"order"`).
///
/// Only array-valued relation keys go through the convention. Object-valued
/// keys name their entity directly.
pub trait NamingConvention: Send + Sync + fmt::Debug {
    /// Derives the entity name for an array-valued relation key.
    fn singularize(&self, relation_key: &str) -> String;
}

/// Strips exactly one trailing character: `orders` → `order`, `items` → `item`.
///
/// This is a convention, not a pluralizer. Irregular plurals need
/// [`NamingOverrides`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TrailingCharacter;

impl NamingConvention for TrailingCharacter {
    fn singularize(&self, relation_key: &str) -> String {
        let mut chars = relation_key.chars();
        chars.next_back();
        chars.as_str().to_string()
    }
}

/// An explicit table of irregular plurals in front of a fallback convention.
#[derive(Debug)]
pub struct NamingOverrides<C = TrailingCharacter> {
    overrides: HashMap<String, String>,
    fallback: C,
}

impl NamingOverrides<TrailingCharacter> {
    pub fn new() -> Self {
        Self::with_fallback(TrailingCharacter)
    }
}

impl Default for NamingOverrides<TrailingCharacter> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: NamingConvention> NamingOverrides<C> {
    pub fn with_fallback(fallback: C) -> Self {
        Self {
            overrides: HashMap::new(),
            fallback,
        }
    }

    /// Registers `plural → singular`, replacing any previous mapping.
    pub fn insert(mut self, plural: impl Into<String>, singular: impl Into<String>) -> Self {
        self.overrides.insert(plural.into(), singular.into());
        self
    }
}

impl<C: NamingConvention> NamingConvention for NamingOverrides<C> {
    fn singularize(&self, relation_key: &str) -> String {
        match self.overrides.get(relation_key) {
            Some(singular) => singular.clone(),
            None => self.fallback.singularize(relation_key),
        }
    }
}
