//! # Entity Store
//!
//! The central container for entities, their archetypes and change events.
//!
//! ```text
//! nodes[id] ──► (archetype, row) ──► archetypes[archetype].columns[..][row]
//! ```
//!
//! - Entity lookup is a flat table indexed by id
//! - Structural changes move one row between two archetypes
//! - Every structural change fires exactly one event, synchronously

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::bits::{ComponentTypes, Tags};
use crate::config::{PidType, StoreConfig};
use crate::error::{EcsError, EcsResult};
use crate::schema::{self, Component, ComponentType, Tag};

use super::archetype::{Archetype, ArchetypeId, ArchetypeKey};
use super::bundle::Bundle;
use super::entity::{Entity, EntityLocation, EntityNode};
use super::events::{ComponentChanged, ComponentChangedAction, ListenerId, Listeners, StoreEvent, TagsChanged};
use super::storage::{typed_mut, Column};

/// A store shared between system roots and queries on one thread.
pub type SharedStore = Rc<RefCell<EntityStore>>;

static NEXT_STORE_ID: AtomicU64 = AtomicU64::new(1);

/// Archetype of entities without components or tags.
const EMPTY_ARCHETYPE: ArchetypeId = ArchetypeId::new(0);

/// Owns all entities of a world.
///
/// # Example
///
/// ```rust,ignore
/// let mut store = EntityStore::new();
/// let entity = store.create_entity_with((Position::new(1.0, 2.0, 3.0),))?;
/// store.add_component(entity, Scale3::new(2.0, 2.0, 2.0));
/// assert!(store.has_component::<Scale3>(entity));
/// ```
pub struct EntityStore {
    id: u64,
    config: StoreConfig,
    archetypes: Vec<Archetype>,
    archetype_map: HashMap<ArchetypeKey, ArchetypeId>,
    /// Indexed by entity id. Slot 0 is the null entity and never used.
    nodes: Vec<EntityNode>,
    free_ids: Vec<u32>,
    next_id: u64,
    entity_count: usize,
    pid_map: HashMap<i64, u32>,
    rng: ChaCha8Rng,
    listeners: Listeners,
}

impl EntityStore {
    /// Creates a store with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(StoreConfig::default())
    }

    /// Creates a store with the given configuration.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the configuration fails validation.
    pub fn with_config(config: StoreConfig) -> EcsResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: StoreConfig) -> Self {
        let id = NEXT_STORE_ID.fetch_add(1, Ordering::Relaxed);
        let mut nodes = Vec::with_capacity(config.initial_capacity + 1);
        nodes.push(EntityNode::default());
        let empty_key = ArchetypeKey::default();
        let mut archetype_map = HashMap::new();
        archetype_map.insert(empty_key, EMPTY_ARCHETYPE);
        tracing::debug!(store = id, pid_type = ?config.pid_type, "created entity store");
        Self {
            id,
            rng: ChaCha8Rng::seed_from_u64(config.pid_seed),
            config,
            archetypes: vec![Archetype::new(EMPTY_ARCHETYPE, empty_key)],
            archetype_map,
            nodes,
            free_ids: Vec::new(),
            next_id: 1,
            entity_count: 0,
            pid_map: HashMap::new(),
            listeners: Listeners::default(),
        }
    }

    /// Wraps the store for sharing with system roots.
    #[must_use]
    pub fn into_shared(self) -> SharedStore {
        Rc::new(RefCell::new(self))
    }

    /// Process-unique id of this store.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// The configuration the store was created with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Number of live entities.
    #[inline]
    #[must_use]
    pub const fn entity_count(&self) -> usize {
        self.entity_count
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    #[inline]
    pub(crate) fn location(&self, entity: Entity) -> Option<EntityLocation> {
        if entity.is_null() {
            return None;
        }
        let node = self.nodes.get(entity.id() as usize)?;
        if node.generation != entity.generation() {
            return None;
        }
        node.location
    }

    #[inline]
    fn is_id_used(&self, id: u32) -> bool {
        self.nodes
            .get(id as usize)
            .is_some_and(|node| node.location.is_some())
    }

    /// Returns true if the entity exists.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.location(entity).is_some()
    }

    /// Returns the entity with `id`, or [`Entity::NULL`] if absent.
    #[inline]
    #[must_use]
    pub fn get_entity_by_id(&self, id: u32) -> Entity {
        match self.nodes.get(id as usize) {
            Some(node) if id != 0 && node.location.is_some() => Entity::new(id, node.generation),
            _ => Entity::NULL,
        }
    }

    /// Returns the entity with persistent id `pid`, or [`Entity::NULL`].
    #[must_use]
    pub fn get_entity_by_pid(&self, pid: i64) -> Entity {
        match self.config.pid_type {
            PidType::UsePidAsId => u32::try_from(pid).map_or(Entity::NULL, |id| self.get_entity_by_id(id)),
            PidType::RandomPids => self
                .pid_map
                .get(&pid)
                .map_or(Entity::NULL, |&id| self.get_entity_by_id(id)),
        }
    }

    /// Persistent id of a live entity.
    #[must_use]
    pub fn pid_of(&self, entity: Entity) -> Option<i64> {
        self.location(entity)?;
        self.nodes.get(entity.id() as usize).map(|node| node.pid)
    }

    /// All live entities, grouped by archetype.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.archetypes
            .iter()
            .flat_map(|archetype| archetype.entities().iter().copied())
    }

    /// All archetypes, in creation order.
    #[inline]
    #[must_use]
    pub fn archetypes(&self) -> &[Archetype] {
        &self.archetypes
    }

    #[inline]
    pub(crate) fn archetypes_mut(&mut self) -> &mut [Archetype] {
        &mut self.archetypes
    }

    /// Archetype holding `entity`.
    #[must_use]
    pub fn archetype_of(&self, entity: Entity) -> Option<&Archetype> {
        let location = self.location(entity)?;
        self.archetypes.get(location.archetype.index())
    }

    /// Archetype with exactly the given component and tag sets, if created.
    #[must_use]
    pub fn find_archetype(&self, key: &ArchetypeKey) -> Option<&Archetype> {
        let id = self.archetype_map.get(key)?;
        self.archetypes.get(id.index())
    }

    /// Component types of an entity. Empty for absent entities.
    #[must_use]
    pub fn entity_components(&self, entity: Entity) -> ComponentTypes {
        self.archetype_of(entity)
            .map_or(ComponentTypes::EMPTY, |a| *a.component_types())
    }

    /// Tags of an entity. Empty for absent entities.
    #[must_use]
    pub fn entity_tags(&self, entity: Entity) -> Tags {
        self.archetype_of(entity).map_or(Tags::EMPTY, |a| *a.tags())
    }

    /// Component `T` of an entity.
    #[must_use]
    pub fn get_component<T: Component>(&self, entity: Entity) -> Option<&T> {
        let location = self.location(entity)?;
        self.archetypes[location.archetype.index()].get::<T>(schema::component_type::<T>(), location.row)
    }

    /// Component `T` of an entity, mutably. Writes do not fire events.
    #[must_use]
    pub fn get_component_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        let location = self.location(entity)?;
        self.archetypes[location.archetype.index()].get_mut::<T>(schema::component_type::<T>(), location.row)
    }

    /// Returns true if the entity has component `T`.
    #[must_use]
    pub fn has_component<T: Component>(&self, entity: Entity) -> bool {
        self.entity_components(entity).has(schema::component_type::<T>())
    }

    /// Returns true if the entity has every tag of `tags`.
    #[must_use]
    pub fn has_tags(&self, entity: Entity, tags: &Tags) -> bool {
        self.is_alive(entity) && self.entity_tags(entity).contains_all(tags)
    }

    /// Returns true if the entity has tag `T`.
    #[must_use]
    pub fn has_tag<T: Tag>(&self, entity: Entity) -> bool {
        self.has_tags(entity, &Tags::of::<T>())
    }

    // =========================================================================
    // Id allocation
    // =========================================================================

    fn allocate_id(&mut self) -> EcsResult<u32> {
        if self.config.recycle_ids {
            while let Some(id) = self.free_ids.pop() {
                // Explicit creation may have claimed a freed id
                if !self.is_id_used(id) {
                    return Ok(id);
                }
            }
        }
        let max = self.config.max_entity_id;
        loop {
            if self.next_id > u64::from(max) {
                return Err(EcsError::IdSpaceExhausted { max });
            }
            let id = u32::try_from(self.next_id).map_err(|_| EcsError::IdSpaceExhausted { max })?;
            self.next_id += 1;
            if !self.is_id_used(id) {
                return Ok(id);
            }
        }
    }

    fn assign_pid(&mut self, id: u32) -> i64 {
        match self.config.pid_type {
            PidType::UsePidAsId => i64::from(id),
            PidType::RandomPids => loop {
                let pid = self.rng.gen_range(1..i64::MAX);
                if let std::collections::hash_map::Entry::Vacant(slot) = self.pid_map.entry(pid) {
                    slot.insert(id);
                    return pid;
                }
            },
        }
    }

    // =========================================================================
    // Creation / deletion
    // =========================================================================

    /// Creates an entity without components.
    ///
    /// # Errors
    ///
    /// `IdSpaceExhausted` when no id up to `max_entity_id` is free.
    pub fn create_entity(&mut self) -> EcsResult<Entity> {
        let id = self.allocate_id()?;
        Ok(self.spawn(id, EMPTY_ARCHETYPE, |_| {}))
    }

    /// Creates an entity with all components of `bundle`, placing it
    /// directly in its final archetype.
    ///
    /// # Errors
    ///
    /// `DuplicateComponent` if the bundle names a type twice,
    /// `IdSpaceExhausted` when no id is free.
    pub fn create_entity_with<B: Bundle>(&mut self, bundle: B) -> EcsResult<Entity> {
        let types = B::component_types();
        if types.len() != B::COUNT {
            return Err(EcsError::DuplicateComponent(format!("{types:?}")));
        }
        let id = self.allocate_id()?;
        let archetype = self.get_or_create_archetype(ArchetypeKey::new(types, Tags::EMPTY));
        Ok(self.spawn(id, archetype, |a| bundle.write(a)))
    }

    /// Creates an entity with an explicit id.
    ///
    /// # Errors
    ///
    /// `InvalidEntityId` for id 0 or ids above `max_entity_id`,
    /// `IdAlreadyInUse` if a live entity owns the id.
    pub fn create_entity_with_id(&mut self, id: u32) -> EcsResult<Entity> {
        if id == 0 || id > self.config.max_entity_id {
            return Err(EcsError::InvalidEntityId(id));
        }
        if self.is_id_used(id) {
            tracing::warn!(store = self.id, id, "explicit entity id already in use");
            return Err(EcsError::IdAlreadyInUse(id));
        }
        Ok(self.spawn(id, EMPTY_ARCHETYPE, |_| {}))
    }

    fn spawn(&mut self, id: u32, archetype: ArchetypeId, write: impl FnOnce(&mut Archetype)) -> Entity {
        let slot = id as usize;
        if self.nodes.len() <= slot {
            self.nodes.resize(slot + 1, EntityNode::default());
        }
        let generation = self.nodes[slot].generation;
        let entity = Entity::new(id, generation);
        let arch = &mut self.archetypes[archetype.index()];
        let row = arch.push_entity(entity);
        write(arch);
        arch.debug_check();

        let pid = self.assign_pid(id);
        self.nodes[slot] = EntityNode {
            location: Some(EntityLocation { archetype, row }),
            pid,
            generation,
        };
        self.entity_count += 1;
        self.dispatch(StoreEvent::EntityCreated(entity));
        entity
    }

    /// Deletes an entity and recycles its id.
    ///
    /// Listeners see the entity with all its components before removal.
    /// The id slot's generation is bumped, so `entity` and every copy of
    /// it stay dead even when the id is handed out again.
    ///
    /// # Returns
    ///
    /// `false` if the entity was already absent.
    pub fn delete_entity(&mut self, entity: Entity) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        self.dispatch(StoreEvent::EntityDeleted(entity));

        // Listeners only hold `&self`, so the location is unchanged
        let Some(location) = self.location(entity) else {
            return false;
        };
        let moved = self.archetypes[location.archetype.index()].remove_row(location.row);
        if let Some(moved) = moved {
            self.set_row(moved, location.row);
        }

        let slot = entity.id() as usize;
        let EntityNode { pid, generation, .. } = self.nodes[slot];
        self.nodes[slot] = EntityNode {
            generation: generation.wrapping_add(1),
            ..EntityNode::default()
        };
        if self.config.pid_type == PidType::RandomPids {
            self.pid_map.remove(&pid);
        }
        self.entity_count -= 1;
        if self.config.recycle_ids {
            self.free_ids.push(entity.id());
        }
        true
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Adds or overwrites component `T`.
    ///
    /// Fires `ComponentChanged` with `Add` when the entity moves to a new
    /// archetype, `Update` when an existing value is overwritten.
    ///
    /// # Returns
    ///
    /// `false` if the entity is absent.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) -> bool {
        let ty = schema::component_type::<T>();
        self.insert_component(entity, ty, move |column, row| {
            if let Some(storage) = typed_mut::<T>(column) {
                match row {
                    Some(row) => storage.set(row, value),
                    None => storage.push(value),
                }
            }
        })
    }

    /// Adds or overwrites a component from a boxed value of type `ty`.
    ///
    /// # Errors
    ///
    /// `ComponentTypeMismatch` if the value is not of the type registered
    /// for `ty`.
    pub fn add_component_boxed(&mut self, entity: Entity, ty: ComponentType, value: Box<dyn Any>) -> EcsResult<bool> {
        if schema::component_type_id(ty) != Some((*value).type_id()) {
            return Err(EcsError::ComponentTypeMismatch(schema::component_name(ty)));
        }
        Ok(self.insert_component(entity, ty, move |column, row| {
            let written = column.write_boxed(row, value);
            debug_assert!(written.is_ok(), "component type checked against the schema");
        }))
    }

    fn insert_component(
        &mut self,
        entity: Entity,
        ty: ComponentType,
        write: impl FnOnce(&mut dyn Column, Option<usize>),
    ) -> bool {
        let Some(location) = self.location(entity) else {
            return false;
        };
        let mut key = *self.archetypes[location.archetype.index()].key();

        let action = if key.components.has(ty) {
            if let Some(column) = self.archetypes[location.archetype.index()].column_mut(ty) {
                write(column, Some(location.row));
            }
            ComponentChangedAction::Update
        } else {
            key.components.add(ty);
            let target = self.get_or_create_archetype(key);
            self.migrate(entity, location, target);
            let arch = &mut self.archetypes[target.index()];
            if let Some(column) = arch.column_mut(ty) {
                write(column, None);
            }
            arch.debug_check();
            ComponentChangedAction::Add
        };

        self.dispatch(StoreEvent::ComponentChanged(ComponentChanged {
            entity,
            action,
            component: ty,
        }));
        true
    }

    /// Removes component `T`.
    ///
    /// # Returns
    ///
    /// `false` if the entity is absent or lacks `T`. No event fires then.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) -> bool {
        self.remove_component_type(entity, schema::component_type::<T>())
    }

    /// Removes the component of type `ty`.
    ///
    /// # Returns
    ///
    /// `false` if the entity is absent or lacks the component.
    pub fn remove_component_type(&mut self, entity: Entity, ty: ComponentType) -> bool {
        let Some(location) = self.location(entity) else {
            return false;
        };
        let mut key = *self.archetypes[location.archetype.index()].key();
        if !key.components.has(ty) {
            return false;
        }
        key.components.remove(ty);
        let target = self.get_or_create_archetype(key);
        self.migrate(entity, location, target);

        self.dispatch(StoreEvent::ComponentChanged(ComponentChanged {
            entity,
            action: ComponentChangedAction::Remove,
            component: ty,
        }));
        true
    }

    // =========================================================================
    // Tags
    // =========================================================================

    /// Adds tags. Tags already present are ignored.
    ///
    /// # Returns
    ///
    /// `true` if the tag set changed.
    pub fn add_tags(&mut self, entity: Entity, tags: &Tags) -> bool {
        self.change_tags(entity, |old| old.union(tags))
    }

    /// Removes tags. Tags not present are ignored.
    ///
    /// # Returns
    ///
    /// `true` if the tag set changed.
    pub fn remove_tags(&mut self, entity: Entity, tags: &Tags) -> bool {
        self.change_tags(entity, |old| old.difference(tags))
    }

    /// Adds tag `T`.
    pub fn add_tag<T: Tag>(&mut self, entity: Entity) -> bool {
        self.add_tags(entity, &Tags::of::<T>())
    }

    /// Removes tag `T`.
    pub fn remove_tag<T: Tag>(&mut self, entity: Entity) -> bool {
        self.remove_tags(entity, &Tags::of::<T>())
    }

    fn change_tags(&mut self, entity: Entity, apply: impl FnOnce(&Tags) -> Tags) -> bool {
        let Some(location) = self.location(entity) else {
            return false;
        };
        let key = *self.archetypes[location.archetype.index()].key();
        let tags = apply(&key.tags);
        if tags == key.tags {
            return false;
        }
        let target = self.get_or_create_archetype(ArchetypeKey::new(key.components, tags));
        self.migrate(entity, location, target);

        self.dispatch(StoreEvent::TagsChanged(TagsChanged {
            entity,
            tags,
            old_tags: key.tags,
        }));
        true
    }

    // =========================================================================
    // Archetypes
    // =========================================================================

    /// Returns the archetype for `key`, creating it on first use.
    pub fn get_or_create_archetype(&mut self, key: ArchetypeKey) -> ArchetypeId {
        if let Some(&id) = self.archetype_map.get(&key) {
            return id;
        }
        #[allow(clippy::cast_possible_truncation)]
        let id = ArchetypeId::new(self.archetypes.len() as u32);
        self.archetypes.push(Archetype::new(id, key));
        self.archetype_map.insert(key, id);
        tracing::debug!(store = self.id, archetype = id.index(), ?key, "created archetype");
        id
    }

    /// Reserves rows for `additional` entities in the archetype of `key`.
    pub fn reserve(&mut self, key: ArchetypeKey, additional: usize) {
        let id = self.get_or_create_archetype(key);
        self.archetypes[id.index()].reserve(additional);
    }

    /// Moves an entity's row to `target`, patching both affected locations.
    fn migrate(&mut self, entity: Entity, location: EntityLocation, target: ArchetypeId) -> usize {
        let (src, dst) = two_mut(&mut self.archetypes, location.archetype.index(), target.index());
        let (row, moved) = src.move_row_to(location.row, dst);
        if let Some(moved) = moved {
            self.set_row(moved, location.row);
        }
        self.nodes[entity.id() as usize].location = Some(EntityLocation {
            archetype: target,
            row,
        });
        row
    }

    #[inline]
    fn set_row(&mut self, entity: Entity, row: usize) {
        if let Some(location) = self.nodes[entity.id() as usize].location.as_mut() {
            location.row = row;
        }
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Subscribes to structural change events.
    ///
    /// The callback runs synchronously inside the mutating call.
    pub fn add_listener(&mut self, callback: impl FnMut(&EntityStore, &StoreEvent) + 'static) -> ListenerId {
        self.listeners.add(Box::new(callback))
    }

    /// Unsubscribes a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn dispatch(&mut self, event: StoreEvent) {
        if self.listeners.is_empty() {
            return;
        }
        let mut listeners = std::mem::take(&mut self.listeners);
        listeners.notify(self, &event);
        self.listeners = listeners;
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("id", &self.id)
            .field("entity_count", &self.entity_count)
            .field("archetypes", &self.archetypes.len())
            .finish_non_exhaustive()
    }
}

/// Borrows two distinct elements mutably.
fn two_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    debug_assert_ne!(a, b, "two_mut requires distinct indices");
    if a < b {
        let (lo, hi) = items.split_at_mut(b);
        (&mut lo[a], &mut hi[0])
    } else {
        let (lo, hi) = items.split_at_mut(a);
        (&mut hi[0], &mut lo[b])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::{Disabled, EntityName, Position, Rotation, Scale3};

    struct Selected;
    impl Tag for Selected {}

    #[test]
    fn test_create_and_lookup() {
        let mut store = EntityStore::new();
        let a = store.create_entity().unwrap();
        let b = store.create_entity().unwrap();

        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
        assert_eq!(store.entity_count(), 2);
        assert_eq!(store.get_entity_by_id(1), a);
        assert_eq!(store.get_entity_by_id(99), Entity::NULL);
        assert_eq!(store.get_entity_by_id(0), Entity::NULL);
    }

    #[test]
    fn test_delete_returns_null_handle() {
        let mut store = EntityStore::new();
        let entity = store.create_entity().unwrap();
        assert!(store.delete_entity(entity));
        assert_eq!(store.get_entity_by_id(entity.id()), Entity::NULL);
        assert!(!store.delete_entity(entity));
        assert_eq!(store.entity_count(), 0);
    }

    #[test]
    fn test_delete_patches_moved_row() {
        let mut store = EntityStore::new();
        let a = store.create_entity_with((Position::new(1.0, 0.0, 0.0),)).unwrap();
        let b = store.create_entity_with((Position::new(2.0, 0.0, 0.0),)).unwrap();
        let c = store.create_entity_with((Position::new(3.0, 0.0, 0.0),)).unwrap();

        store.delete_entity(a);

        assert_eq!(store.get_component::<Position>(b).unwrap().x, 2.0);
        assert_eq!(store.get_component::<Position>(c).unwrap().x, 3.0);
        store.add_component(c, Scale3::default());
        assert_eq!(store.get_component::<Position>(b).unwrap().x, 2.0);
        assert_eq!(store.get_component::<Position>(c).unwrap().x, 3.0);
    }

    #[test]
    fn test_ids_are_recycled() {
        let mut store = EntityStore::new();
        let a = store.create_entity().unwrap();
        store.create_entity().unwrap();
        store.delete_entity(a);
        let c = store.create_entity().unwrap();
        assert_eq!(c.id(), a.id());
    }

    #[test]
    fn test_stale_handle_after_recycle() {
        let mut store = EntityStore::new();
        let a = store.create_entity_with((Position::new(1.0, 0.0, 0.0),)).unwrap();
        store.delete_entity(a);
        let b = store.create_entity_with((Scale3::default(),)).unwrap();

        assert_eq!(b.id(), a.id());
        assert_ne!(b, a);
        assert!(!store.is_alive(a));
        assert_eq!(store.get_entity_by_id(a.id()), b);
        assert!(!store.has_component::<Scale3>(a));
        assert!(!store.add_component(a, Position::default()));
        assert!(!store.delete_entity(a));

        assert!(store.is_alive(b));
        assert!(!store.has_component::<Position>(b));
        assert_eq!(store.entity_count(), 1);
    }

    #[test]
    fn test_ids_not_recycled_when_disabled() {
        let config = StoreConfig::default().with_recycle_ids(false);
        let mut store = EntityStore::with_config(config).unwrap();
        let a = store.create_entity().unwrap();
        store.delete_entity(a);
        assert_eq!(store.create_entity().unwrap().id(), 2);
    }

    #[test]
    fn test_id_space_exhausted() {
        let config = StoreConfig::default().with_max_entity_id(2).with_recycle_ids(false);
        let mut store = EntityStore::with_config(config).unwrap();
        store.create_entity().unwrap();
        store.create_entity().unwrap();
        assert_eq!(store.create_entity(), Err(EcsError::IdSpaceExhausted { max: 2 }));
    }

    #[test]
    fn test_explicit_id_collision_fails() {
        let mut store = EntityStore::new();
        let entity = store.create_entity_with_id(42).unwrap();
        assert_eq!(entity.id(), 42);
        assert_eq!(store.create_entity_with_id(42), Err(EcsError::IdAlreadyInUse(42)));
        assert_eq!(store.create_entity_with_id(0), Err(EcsError::InvalidEntityId(0)));
        assert_eq!(store.entity_count(), 1);
    }

    #[test]
    fn test_sequential_allocation_skips_explicit_ids() {
        let mut store = EntityStore::new();
        store.create_entity_with_id(1).unwrap();
        store.create_entity_with_id(2).unwrap();
        assert_eq!(store.create_entity().unwrap().id(), 3);
    }

    #[test]
    fn test_add_then_remove_preserves_other_components() {
        let mut store = EntityStore::new();
        let entity = store
            .create_entity_with((Position::new(1.0, 2.0, 3.0), Rotation::new(0.1, 0.2, 0.3, 0.4)))
            .unwrap();

        store.add_component(entity, Scale3::new(4.0, 5.0, 6.0));
        store.remove_component::<Scale3>(entity);

        assert_eq!(store.get_component::<Position>(entity), Some(&Position::new(1.0, 2.0, 3.0)));
        assert_eq!(store.get_component::<Rotation>(entity), Some(&Rotation::new(0.1, 0.2, 0.3, 0.4)));
        assert!(!store.has_component::<Scale3>(entity));
    }

    #[test]
    fn test_add_existing_component_updates() {
        let mut store = EntityStore::new();
        let entity = store.create_entity_with((Position::new(1.0, 1.0, 1.0),)).unwrap();
        let archetypes = store.archetypes().len();

        store.add_component(entity, Position::new(9.0, 9.0, 9.0));

        assert_eq!(store.get_component::<Position>(entity).unwrap().x, 9.0);
        assert_eq!(store.archetypes().len(), archetypes);
    }

    #[test]
    fn test_component_events() {
        let mut store = EntityStore::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        store.add_listener(move |_, event| sink.borrow_mut().push(*event));

        let entity = store.create_entity().unwrap();
        store.add_component(entity, EntityName::new("hero"));
        store.add_component(entity, EntityName::new("villain"));
        store.remove_component::<EntityName>(entity);
        store.remove_component::<EntityName>(entity);

        let name = schema::component_type::<EntityName>();
        let actions: Vec<StoreEvent> = events.borrow().clone();
        assert_eq!(
            actions,
            vec![
                StoreEvent::EntityCreated(entity),
                StoreEvent::ComponentChanged(ComponentChanged {
                    entity,
                    action: ComponentChangedAction::Add,
                    component: name
                }),
                StoreEvent::ComponentChanged(ComponentChanged {
                    entity,
                    action: ComponentChangedAction::Update,
                    component: name
                }),
                StoreEvent::ComponentChanged(ComponentChanged {
                    entity,
                    action: ComponentChangedAction::Remove,
                    component: name
                }),
            ]
        );
    }

    #[test]
    fn test_listener_reads_deleted_entity() {
        let mut store = EntityStore::new();
        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        store.add_listener(move |store, event| {
            if let StoreEvent::EntityDeleted(entity) = event {
                *sink.borrow_mut() = store.get_component::<Position>(*entity).copied();
            }
        });

        let entity = store.create_entity_with((Position::new(5.0, 0.0, 0.0),)).unwrap();
        store.delete_entity(entity);

        assert_eq!(*seen.borrow(), Some(Position::new(5.0, 0.0, 0.0)));
    }

    #[test]
    fn test_remove_listener() {
        let mut store = EntityStore::new();
        let count = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&count);
        let id = store.add_listener(move |_, _| *sink.borrow_mut() += 1);
        store.create_entity().unwrap();
        assert!(store.remove_listener(id));
        store.create_entity().unwrap();
        assert_eq!(*count.borrow(), 1);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn test_remove_absent_tags_is_noop() {
        let mut store = EntityStore::new();
        let entity = store.create_entity().unwrap();
        store.add_tag::<Selected>(entity);
        let archetype = store.archetype_of(entity).unwrap().id();

        let events = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&events);
        store.add_listener(move |_, _| *sink.borrow_mut() += 1);

        assert!(!store.remove_tags(entity, &Tags::of::<Disabled>()));
        assert!(!store.add_tags(entity, &Tags::of::<Selected>()));
        assert_eq!(*events.borrow(), 0);
        assert_eq!(store.archetype_of(entity).unwrap().id(), archetype);
    }

    #[test]
    fn test_tags_changed_event() {
        let mut store = EntityStore::new();
        let entity = store.create_entity_with((Position::default(),)).unwrap();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        store.add_listener(move |_, event| {
            if let StoreEvent::TagsChanged(changed) = event {
                sink.borrow_mut().push(*changed);
            }
        });

        store.add_tags(entity, &Tags::of::<Disabled>().with::<Selected>());
        store.remove_tag::<Selected>(entity);

        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert!(events[0].has::<Disabled>());
        assert_eq!(events[1].removed(), Tags::of::<Selected>());
        assert!(store.has_tag::<Disabled>(entity));
        assert!(!store.has_tag::<Selected>(entity));
        assert!(store.has_component::<Position>(entity));
    }

    #[test]
    fn test_duplicate_bundle_rejected() {
        let mut store = EntityStore::new();
        let result = store.create_entity_with((Position::default(), Position::default()));
        assert!(matches!(result, Err(EcsError::DuplicateComponent(_))));
        assert_eq!(store.entity_count(), 0);
    }

    #[test]
    fn test_boxed_component_type_checked() {
        let mut store = EntityStore::new();
        let entity = store.create_entity().unwrap();
        let ty = schema::component_type::<Position>();

        let err = store.add_component_boxed(entity, ty, Box::new(1u32)).unwrap_err();
        assert!(matches!(err, EcsError::ComponentTypeMismatch(_)));

        assert_eq!(store.add_component_boxed(entity, ty, Box::new(Position::new(1.0, 0.0, 0.0))), Ok(true));
        assert_eq!(store.get_component::<Position>(entity).unwrap().x, 1.0);
    }

    #[test]
    fn test_random_pids() {
        let config = StoreConfig::default().with_pid_type(PidType::RandomPids);
        let mut store = EntityStore::with_config(config).unwrap();
        let entity = store.create_entity().unwrap();
        let pid = store.pid_of(entity).unwrap();

        assert!(pid > 0);
        assert_eq!(store.get_entity_by_pid(pid), entity);
        store.delete_entity(entity);
        assert_eq!(store.get_entity_by_pid(pid), Entity::NULL);
        assert_eq!(store.pid_of(entity), None);
    }

    #[test]
    fn test_pid_as_id() {
        let mut store = EntityStore::new();
        let entity = store.create_entity_with_id(7).unwrap();
        assert_eq!(store.pid_of(entity), Some(7));
        assert_eq!(store.get_entity_by_pid(7), entity);
        assert_eq!(store.get_entity_by_pid(-1), Entity::NULL);
    }

    #[test]
    fn test_get_component_mut_writes_in_place() {
        let mut store = EntityStore::new();
        let entity = store.create_entity_with((Position::default(),)).unwrap();
        store.get_component_mut::<Position>(entity).unwrap().y = 4.0;
        assert_eq!(store.get_component::<Position>(entity).unwrap().y, 4.0);
    }

    #[test]
    fn test_entities_iterates_all() {
        let mut store = EntityStore::new();
        let a = store.create_entity().unwrap();
        let b = store.create_entity_with((Position::default(),)).unwrap();
        let mut all: Vec<Entity> = store.entities().collect();
        all.sort();
        assert_eq!(all, vec![a, b]);
    }
}
