use crate::document::NodeKind;
use crate::error::{ModelError, ModelResult};
use crate::naming::{NamingConvention, TrailingCharacter};
use crate::schema::EntitySchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Serialized form of a registry (one entry per entity).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub entities: Vec<EntitySchema>,
}

/// A relation key resolved against the registry.
#[derive(Debug, Clone)]
pub struct ChildRelation {
    pub key: String,
    pub schema: Arc<EntitySchema>,
    /// Field on the child that stores the owner's identifier, when the
    /// owner is known.
    pub foreign_key: Option<String>,
}

/// Read-only map from entity name to schema. The engine never mutates it
/// once built.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Arc<EntitySchema>>,
    naming: Arc<dyn NamingConvention>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaRegistry {
    /// An empty registry using [`TrailingCharacter`] naming.
    pub fn new() -> Self {
        Self {
            schemas: BTreeMap::new(),
            naming: Arc::new(TrailingCharacter),
        }
    }

    /// Builds a registry, rejecting duplicate names and declared
    /// associations whose target is not registered.
    pub fn from_schemas(schemas: impl IntoIterator<Item = EntitySchema>) -> ModelResult<Self> {
        let mut registry = Self::new();
        for schema in schemas {
            if registry.schemas.contains_key(&schema.name) {
                return Err(ModelError::DuplicateEntity(schema.name));
            }
            registry = registry.register(schema);
        }
        registry.validate()?;
        Ok(registry)
    }

    pub fn from_document(document: SchemaDocument) -> ModelResult<Self> {
        Self::from_schemas(document.entities)
    }

    /// Adds or replaces a schema.
    pub fn register(mut self, schema: EntitySchema) -> Self {
        self.schemas.insert(schema.name.clone(), Arc::new(schema));
        self
    }

    /// Replaces the naming convention used for array-valued relation keys.
    pub fn with_naming(mut self, naming: impl NamingConvention + 'static) -> Self {
        self.naming = Arc::new(naming);
        self
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<EntitySchema>> {
        self.schemas.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn naming(&self) -> &dyn NamingConvention {
        self.naming.as_ref()
    }

    /// Registered entity names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Checks that every declared association targets a registered entity.
    pub fn validate(&self) -> ModelResult<()> {
        for schema in self.schemas.values() {
            for association in &schema.associations {
                if !self.schemas.contains_key(&association.entity) {
                    return Err(ModelError::UnknownAssociationTarget {
                        owner: schema.name.clone(),
                        key: association.key.clone(),
                        entity: association.entity.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Resolves the child entity behind a nested field.
    ///
    /// A declared association on `owner` wins. Otherwise array keys go
    /// through the naming convention and object keys are used as-is.
    /// Returns `None` for scalars and for names the registry does not know,
    /// so callers treat the field as an ordinary attribute.
    pub fn resolve_child(
        &self,
        owner: Option<&EntitySchema>,
        key: &str,
        kind: NodeKind,
    ) -> Option<ChildRelation> {
        let declared = owner.and_then(|o| o.association(key));
        let entity = match (declared, kind) {
            (_, NodeKind::Scalar) => return None,
            (Some(association), _) => association.entity.clone(),
            (None, NodeKind::Array) => self.naming.singularize(key),
            (None, NodeKind::Object) => key.to_string(),
        };
        let schema = self.lookup(&entity)?;
        let foreign_key = owner.map(|o| match declared {
            Some(association) => association.foreign_key_for(&o.name),
            None => format!("{}_id", o.name),
        });
        Some(ChildRelation {
            key: key.to_string(),
            schema,
            foreign_key,
        })
    }
}
