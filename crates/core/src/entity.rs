//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Catalog records (products, collections, shops) are entities: two records
/// with the same id are the same record even when their fields differ, e.g. a
/// product before and after a pipeline step renamed it.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Whether `other` denotes the same entity, regardless of field values.
    fn same_entity(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}
