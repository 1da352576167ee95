use serde::{Deserialize, Serialize};

/// Default name of the identifier field on every entity.
pub const DEFAULT_PRIMARY_KEY: &str = "Id";

/// Describes one entity type: its identifier field and its declared
/// associations, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySchema {
    pub name: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default)]
    pub associations: Vec<Association>,
}

/// A relation key on the owning entity and the child entity it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    /// Field name in the owner's documents (e.g. `"contacts"`).
    pub key: String,
    /// Child entity name in the registry (e.g. `"contact"`).
    pub entity: String,
    /// Field on the child that stores the owner's identifier.
    /// Defaults to `<owner>_id` when not declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,
}

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

impl EntitySchema {
    /// A schema with the default primary key and no associations.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: default_primary_key(),
            associations: Vec::new(),
        }
    }

    /// Overrides the identifier field.
    pub fn with_primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_key = field.into();
        self
    }

    /// Declares `key → entity`. A later declaration for the same key wins.
    pub fn associate(mut self, key: impl Into<String>, entity: impl Into<String>) -> Self {
        self.push_association(Association::new(key, entity));
        self
    }

    /// Declares `key → entity` with an explicit foreign key on the child.
    pub fn associate_via(
        mut self,
        key: impl Into<String>,
        entity: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        self.push_association(Association::new(key, entity).with_foreign_key(foreign_key));
        self
    }

    fn push_association(&mut self, association: Association) {
        self.associations.retain(|a| a.key != association.key);
        self.associations.push(association);
    }

    /// Looks up the association declared for a relation key.
    pub fn association(&self, key: &str) -> Option<&Association> {
        self.associations.iter().find(|a| a.key == key)
    }
}

impl Association {
    pub fn new(key: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            entity: entity.into(),
            foreign_key: None,
        }
    }

    pub fn with_foreign_key(mut self, field: impl Into<String>) -> Self {
        self.foreign_key = Some(field.into());
        self
    }

    /// The child field that receives the owner's identifier.
    pub fn foreign_key_for(&self, owner: &str) -> String {
        match &self.foreign_key {
            Some(field) => field.clone(),
            None => format!("{owner}_id"),
        }
    }
}
