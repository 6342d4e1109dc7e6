//! Entities: submitted items paired with a bookkeeping id.

use std::fmt;

use crate::unique;

/// Opaque identifier of a submitted item. Never reused or interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityId(String);

impl EntityId {
    pub fn new() -> Self {
        Self(unique::id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A submitted item wrapped with its id.
#[derive(Debug, Clone)]
pub struct Entity<T> {
    id: EntityId,
    data: T,
}

impl<T> Entity<T> {
    /// Wrap `data` under a fresh id.
    pub fn new(data: T) -> Self {
        Self {
            id: EntityId::new(),
            data,
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn into_data(self) -> T {
        self.data
    }
}
