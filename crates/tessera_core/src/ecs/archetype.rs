//! # Archetype Storage
//!
//! Entities with the same component set and tag set are stored together.
//!
//! ```text
//! Archetype [Position, Scale3] + [#Disabled]:
//!   Position[]: [P0, P1, P2, ...]
//!   Scale3[]:   [S0, S1, S2, ...]
//!   entities[]: [E0, E1, E2, ...]   <- row i across all arrays = one entity
//! ```
//!
//! Columns are kept in ascending component-index order, so the column of a
//! type is found by counting lower bits in the archetype's type set.
//!
//! Archetypes never shrink away: once created they live as long as the
//! store, even when empty. Row order is not stable; removal swaps the last
//! row into the hole.

use crate::bits::{ComponentTypes, Tags};
use crate::schema::{self, Component, ComponentType};

use super::entity::Entity;
use super::storage::{typed, typed_mut, Column};

/// Index of an archetype within its store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchetypeId(u32);

impl ArchetypeId {
    /// Position of the archetype in the store's archetype list.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub(crate) const fn new(index: u32) -> Self {
        Self(index)
    }
}

/// Identity of an archetype: its component set and tag set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ArchetypeKey {
    /// Component types stored by the archetype.
    pub components: ComponentTypes,
    /// Tags shared by all its entities.
    pub tags: Tags,
}

impl ArchetypeKey {
    /// Creates a key.
    #[inline]
    #[must_use]
    pub const fn new(components: ComponentTypes, tags: Tags) -> Self {
        Self { components, tags }
    }
}

/// Column-major storage for one component/tag combination.
pub struct Archetype {
    id: ArchetypeId,
    key: ArchetypeKey,
    /// One column per component type, ascending type index.
    columns: Vec<Box<dyn Column>>,
    /// Entity of each row.
    entities: Vec<Entity>,
}

impl Archetype {
    pub(crate) fn new(id: ArchetypeId, key: ArchetypeKey) -> Self {
        Self {
            id,
            key,
            columns: schema::new_columns(&key.components),
            entities: Vec::new(),
        }
    }

    /// Index of this archetype in its store.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ArchetypeId {
        self.id
    }

    /// Component and tag sets.
    #[inline]
    #[must_use]
    pub const fn key(&self) -> &ArchetypeKey {
        &self.key
    }

    /// Component types stored here.
    #[inline]
    #[must_use]
    pub const fn component_types(&self) -> &ComponentTypes {
        &self.key.components
    }

    /// Tags of every entity stored here.
    #[inline]
    #[must_use]
    pub const fn tags(&self) -> &Tags {
        &self.key.tags
    }

    /// Number of entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if the archetype holds no entities.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities in row order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// The column of `ty`.
    #[inline]
    #[must_use]
    pub fn column(&self, ty: ComponentType) -> Option<&dyn Column> {
        let pos = self.key.components.position(ty)?;
        Some(self.columns[pos].as_ref())
    }

    #[inline]
    pub(crate) fn column_mut(&mut self, ty: ComponentType) -> Option<&mut dyn Column> {
        let pos = self.key.components.position(ty)?;
        Some(self.columns[pos].as_mut())
    }

    /// All values of component `T` in row order.
    #[must_use]
    pub fn components<T: Component>(&self) -> Option<&[T]> {
        let column = self.column(schema::component_type::<T>())?;
        typed::<T>(column).map(|storage| storage.as_slice())
    }

    #[inline]
    pub(crate) fn get<T: Component>(&self, ty: ComponentType, row: usize) -> Option<&T> {
        typed::<T>(self.column(ty)?)?.get(row)
    }

    #[inline]
    pub(crate) fn get_mut<T: Component>(&mut self, ty: ComponentType, row: usize) -> Option<&mut T> {
        typed_mut::<T>(self.column_mut(ty)?)?.get_mut(row)
    }

    /// Columns and entity ids borrowed together for chunk iteration.
    #[inline]
    pub(crate) fn split_mut(&mut self) -> (&mut [Box<dyn Column>], &[Entity]) {
        (self.columns.as_mut_slice(), self.entities.as_slice())
    }

    /// Appends an entity id and returns its row.
    ///
    /// The caller must push one value onto every column.
    #[inline]
    pub(crate) fn push_entity(&mut self, entity: Entity) -> usize {
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// Pushes a value onto the column of `T`. No-op if the archetype lacks `T`.
    #[inline]
    pub(crate) fn push_value<T: Component>(&mut self, value: T) {
        if let Some(storage) = self
            .column_mut(schema::component_type::<T>())
            .and_then(typed_mut::<T>)
        {
            storage.push(value);
        }
    }

    /// Swap-removes `row`, dropping its values.
    ///
    /// Returns the entity that was moved into `row`, if any.
    pub(crate) fn remove_row(&mut self, row: usize) -> Option<Entity> {
        for column in &mut self.columns {
            column.swap_remove_drop(row);
        }
        self.entities.swap_remove(row);
        self.entities.get(row).copied()
    }

    /// Moves `row` into `dst`, keeping values of shared component types and
    /// dropping the rest.
    ///
    /// Columns of `dst` without a counterpart here are left one short; the
    /// caller pushes the added values.
    ///
    /// # Returns
    ///
    /// The new row in `dst` and the entity moved into `row` here, if any.
    pub(crate) fn move_row_to(&mut self, row: usize, dst: &mut Archetype) -> (usize, Option<Entity>) {
        let entity = self.entities[row];
        for (ty, column) in self.key.components.iter().zip(self.columns.iter_mut()) {
            match dst.key.components.position(ty) {
                Some(pos) => column.move_row(row, dst.columns[pos].as_mut()),
                None => column.swap_remove_drop(row),
            }
        }
        self.entities.swap_remove(row);
        let dst_row = dst.push_entity(entity);
        (dst_row, self.entities.get(row).copied())
    }

    /// Reserves space for `additional` rows in every column.
    pub(crate) fn reserve(&mut self, additional: usize) {
        self.entities.reserve(additional);
        for column in &mut self.columns {
            column.reserve(additional);
        }
    }

    /// Debug check that every column has one value per entity.
    #[inline]
    pub(crate) fn debug_check(&self) {
        debug_assert!(
            self.columns.iter().all(|c| c.len() == self.entities.len()),
            "archetype {:?} columns out of sync",
            self.key
        );
    }
}

impl std::fmt::Debug for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.id.0)
            .field("components", &self.key.components)
            .field("tags", &self.key.tags)
            .field("len", &self.entities.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::{Position, Scale3};

    fn push_position(arch: &mut Archetype, entity: Entity, pos: Position) {
        arch.push_entity(entity);
        let column = arch.column_mut(schema::component_type::<Position>()).unwrap();
        typed_mut::<Position>(column).unwrap().push(pos);
    }

    #[test]
    fn test_remove_row_swaps_last() {
        let key = ArchetypeKey::new(ComponentTypes::of::<Position>(), Tags::EMPTY);
        let mut arch = Archetype::new(ArchetypeId::new(1), key);
        for i in 1..=3 {
            push_position(&mut arch, Entity::from_id(i), Position::new(i as f32, 0.0, 0.0));
        }

        let moved = arch.remove_row(0);

        assert_eq!(moved, Some(Entity::from_id(3)));
        assert_eq!(arch.entities(), &[Entity::from_id(3), Entity::from_id(2)]);
        let xs: Vec<f32> = arch.components::<Position>().unwrap().iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![3.0, 2.0]);
        arch.debug_check();
    }

    #[test]
    fn test_remove_last_row_moves_nothing() {
        let key = ArchetypeKey::new(ComponentTypes::of::<Position>(), Tags::EMPTY);
        let mut arch = Archetype::new(ArchetypeId::new(1), key);
        push_position(&mut arch, Entity::from_id(1), Position::default());
        assert_eq!(arch.remove_row(0), None);
        assert!(arch.is_empty());
    }

    #[test]
    fn test_move_row_to_keeps_shared_values() {
        let src_key = ArchetypeKey::new(ComponentTypes::of::<Position>(), Tags::EMPTY);
        let dst_key = ArchetypeKey::new(ComponentTypes::of::<Position>().with::<Scale3>(), Tags::EMPTY);
        let mut src = Archetype::new(ArchetypeId::new(1), src_key);
        let mut dst = Archetype::new(ArchetypeId::new(2), dst_key);
        push_position(&mut src, Entity::from_id(7), Position::new(1.0, 2.0, 3.0));

        let (row, moved) = src.move_row_to(0, &mut dst);
        let scale = dst.column_mut(schema::component_type::<Scale3>()).unwrap();
        typed_mut::<Scale3>(scale).unwrap().push(Scale3::new(4.0, 5.0, 6.0));

        assert_eq!(row, 0);
        assert_eq!(moved, None);
        assert!(src.is_empty());
        assert_eq!(dst.entities(), &[Entity::from_id(7)]);
        assert_eq!(dst.components::<Position>().unwrap()[0], Position::new(1.0, 2.0, 3.0));
        assert_eq!(dst.components::<Scale3>().unwrap()[0], Scale3::new(4.0, 5.0, 6.0));
        dst.debug_check();
    }
}
