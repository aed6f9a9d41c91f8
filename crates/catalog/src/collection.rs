use serde::{Deserialize, Serialize};

use storefront_core::{CollectionId, DomainError, DomainResult, Entity};

/// Local collection (a named product grouping shared across products).
///
/// The name is the natural key for connect-or-create within the local catalog.
/// Provider-side identifiers are never stored here; they are resolved per shop
/// and per publish run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    pub name: String,
    pub description: String,
}

impl Collection {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("collection name cannot be empty"));
        }
        Ok(Self {
            id: CollectionId::new(),
            name,
            description: description.into(),
        })
    }
}

impl Entity for Collection {
    type Id = CollectionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
