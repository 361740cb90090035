//! # Entity Handles
//!
//! An entity handle packs two parts:
//! - Lower 32 bits: id, unique within its store while alive
//! - Upper 32 bits: generation of the id slot, bumped on every delete
//!
//! Id `0` is reserved as the null handle. A handle kept past the deletion
//! of its entity never resolves again, even after the id is recycled.

use std::fmt;

use super::archetype::ArchetypeId;

/// Handle of an entity in an [`EntityStore`](crate::EntityStore).
///
/// Copying a handle does not keep the entity alive.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct Entity(u64);

impl Entity {
    /// Null handle, returned by lookups of absent entities.
    pub const NULL: Self = Self(0);

    /// Creates a handle from an id and a slot generation.
    #[inline]
    #[must_use]
    pub const fn new(id: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | id as u64)
    }

    /// Creates a first-generation handle from a raw id.
    #[inline]
    #[must_use]
    pub const fn from_id(id: u32) -> Self {
        Self::new(id, 0)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn id(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation of the id slot this handle was issued for.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Checks if this is the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.id() == 0
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.is_null(), self.generation()) {
            (true, _) => write!(f, "Entity(null)"),
            (false, 0) => write!(f, "Entity({})", self.id()),
            (false, generation) => write!(f, "Entity({}v{generation})", self.id()),
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "id: {}", self.id())
    }
}

/// Location of a live entity: archetype index and row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct EntityLocation {
    pub archetype: ArchetypeId,
    pub row: usize,
}

/// Per-id slot of the store's flat lookup table.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct EntityNode {
    pub location: Option<EntityLocation>,
    pub pid: i64,
    /// Generation of the next or current occupant of the id.
    pub generation: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_handle() {
        assert!(Entity::NULL.is_null());
        assert!(Entity::default().is_null());
        assert!(!Entity::from_id(1).is_null());
    }

    #[test]
    fn test_entity_id_roundtrip() {
        let entity = Entity::from_id(12345);
        assert_eq!(entity.id(), 12345);
        assert_eq!(format!("{entity:?}"), "Entity(12345)");
        assert_eq!(format!("{:?}", Entity::NULL), "Entity(null)");
    }

    #[test]
    fn test_generation_is_part_of_identity() {
        let first = Entity::from_id(7);
        let second = Entity::new(7, 1);
        assert_eq!(second.id(), 7);
        assert_eq!(second.generation(), 1);
        assert_ne!(first, second);
        assert!(!second.is_null());
        assert!(Entity::new(0, 3).is_null());
        assert_eq!(format!("{second:?}"), "Entity(7v1)");
        assert_eq!(second.to_string(), "id: 7");
    }
}
