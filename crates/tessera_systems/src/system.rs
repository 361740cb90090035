//! # System Traits
//!
//! User logic plugs into the tree through three traits:
//!
//! - [`QuerySystem`] - runs once per bound store over the entities matching
//!   its component tuple
//! - [`System`] - runs once per tick, sees all bound stores
//! - [`GroupHooks`] - begin/end behavior of a custom group
//!
//! The tree stores each of them behind an object-safe `Behavior` trait.

use std::any::{type_name, Any};

use tessera_core::schema::short_type_name;
use tessera_core::{ArchetypeQuery, CommandBuffer, ComponentTypes, EntityStore, QueryData, QueryFilter, SharedStore};

use crate::error::SystemResult;

/// Time of the current tick, passed down the tree unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UpdateTick {
    /// Seconds since the previous tick.
    pub delta_time: f32,
    /// Seconds since start.
    pub time: f32,
}

impl UpdateTick {
    /// Creates a tick.
    #[must_use]
    pub const fn new(delta_time: f32, time: f32) -> Self {
        Self { delta_time, time }
    }
}

/// Context of group hooks and plain systems.
pub struct SystemContext<'a> {
    /// Stores bound to the root.
    pub stores: &'a [SharedStore],
    /// Current tick.
    pub tick: UpdateTick,
}

/// Context of one [`QuerySystem::on_update`] call, for one store.
///
/// The fields are public so they can be borrowed separately:
///
/// ```rust,ignore
/// fn on_update(&mut self, ctx: &mut QueryContext<'_, (Position,)>) {
///     let QueryContext { query, store, commands, .. } = ctx;
///     query.for_each_entity(store, |(pos,), entity| {
///         pos.x += 1.0;
///         commands.add_component(entity, Scale3::new(4.0, 5.0, 6.0));
///     });
/// }
/// ```
pub struct QueryContext<'a, Q: QueryData> {
    /// Query of this system over `store`.
    pub query: &'a mut ArchetypeQuery<Q>,
    /// The store being updated.
    pub store: &'a mut EntityStore,
    /// Played back against `store` after `on_update` returns.
    pub commands: &'a mut CommandBuffer,
    /// Current tick.
    pub tick: UpdateTick,
}

/// Leaf system iterating one query per bound store.
pub trait QuerySystem: 'static {
    /// Fetched component tuple, e.g. `(Position, Scale3)`.
    type Data: QueryData;

    /// Display name. Defaults to the type name without module path.
    fn name(&self) -> String {
        short_type_name(type_name::<Self>())
    }

    /// Archetype filter beyond the fetched components.
    fn filter(&self) -> QueryFilter {
        QueryFilter::default()
    }

    /// Called once per bound store per tick.
    fn on_update(&mut self, ctx: &mut QueryContext<'_, Self::Data>);

    /// Called by the parent group before any sibling updates.
    fn on_update_group_begin(&mut self, _ctx: &SystemContext<'_>) {}

    /// Called by the parent group after all siblings updated.
    fn on_update_group_end(&mut self, _ctx: &SystemContext<'_>) {}
}

/// Leaf system without a query.
pub trait System: 'static {
    /// Display name. Defaults to the type name without module path.
    fn name(&self) -> String {
        short_type_name(type_name::<Self>())
    }

    /// Called once per tick.
    fn on_update(&mut self, ctx: &SystemContext<'_>);

    /// Called by the parent group before any sibling updates.
    fn on_update_group_begin(&mut self, _ctx: &SystemContext<'_>) {}

    /// Called by the parent group after all siblings updated.
    fn on_update_group_end(&mut self, _ctx: &SystemContext<'_>) {}
}

/// Begin/end behavior of a custom group.
pub trait GroupHooks: 'static {
    /// Display name. Defaults to the type name without module path.
    fn name(&self) -> String {
        short_type_name(type_name::<Self>())
    }

    /// Called by the parent group before any sibling updates.
    fn on_update_group_begin(&mut self, _ctx: &SystemContext<'_>) {}

    /// Called by the parent group after all siblings updated.
    fn on_update_group_end(&mut self, _ctx: &SystemContext<'_>) {}
}

/// Type-erased system logic stored in the tree.
pub(crate) trait Behavior {
    /// The user value, for typed access.
    fn as_any(&self) -> &dyn Any;

    /// The user value, mutably.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Parent group is about to update its children.
    fn begin(&mut self, ctx: &SystemContext<'_>);

    /// Parent group finished updating its children.
    fn end(&mut self, ctx: &SystemContext<'_>);

    /// Runs leaf logic. Groups do nothing here.
    ///
    /// # Errors
    ///
    /// Command buffer playback failures.
    fn update(&mut self, _ctx: &SystemContext<'_>) -> SystemResult<()> {
        Ok(())
    }

    /// Creates the per-store state for `store`. No-op if already bound.
    fn bind_store(&mut self, _store: &SharedStore) {}

    /// Drops the per-store state of the store with `store_id`.
    fn unbind_store(&mut self, _store_id: u64) {}

    /// Number of bound stores holding a query.
    fn query_count(&self) -> usize {
        0
    }

    /// Entities matched across all bound stores.
    fn entity_count(&mut self) -> usize {
        0
    }

    /// Fetched component types, empty for non-query systems.
    fn component_types(&self) -> ComponentTypes {
        ComponentTypes::EMPTY
    }
}

struct StoreBinding<Q: QueryData> {
    store: SharedStore,
    query: ArchetypeQuery<Q>,
    commands: CommandBuffer,
}

/// Tree node wrapping a [`QuerySystem`].
pub(crate) struct QueryLeaf<S: QuerySystem> {
    system: S,
    bindings: Vec<StoreBinding<S::Data>>,
}

impl<S: QuerySystem> QueryLeaf<S> {
    pub(crate) fn new(system: S) -> Self {
        Self {
            system,
            bindings: Vec::new(),
        }
    }
}

impl<S: QuerySystem> Behavior for QueryLeaf<S> {
    fn as_any(&self) -> &dyn Any {
        &self.system
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut self.system
    }

    fn begin(&mut self, ctx: &SystemContext<'_>) {
        self.system.on_update_group_begin(ctx);
    }

    fn end(&mut self, ctx: &SystemContext<'_>) {
        self.system.on_update_group_end(ctx);
    }

    fn update(&mut self, ctx: &SystemContext<'_>) -> SystemResult<()> {
        for binding in &mut self.bindings {
            let mut store = binding.store.borrow_mut();
            let mut query_ctx = QueryContext {
                query: &mut binding.query,
                store: &mut *store,
                commands: &mut binding.commands,
                tick: ctx.tick,
            };
            self.system.on_update(&mut query_ctx);
            if !binding.commands.is_empty() {
                binding.commands.playback(&mut *store)?;
            }
        }
        Ok(())
    }

    fn bind_store(&mut self, store: &SharedStore) {
        let id = store.borrow().id();
        if self.bindings.iter().any(|b| b.query.store_id() == id) {
            return;
        }
        let (query, commands) = {
            let store = store.borrow();
            (
                store.query_filtered::<S::Data>(self.system.filter()),
                CommandBuffer::new(&store),
            )
        };
        self.bindings.push(StoreBinding {
            store: SharedStore::clone(store),
            query,
            commands,
        });
    }

    fn unbind_store(&mut self, store_id: u64) {
        self.bindings.retain(|b| b.query.store_id() != store_id);
    }

    fn query_count(&self) -> usize {
        self.bindings.len()
    }

    fn entity_count(&mut self) -> usize {
        self.bindings
            .iter_mut()
            .map(|b| b.query.entity_count(&b.store.borrow()))
            .sum()
    }

    fn component_types(&self) -> ComponentTypes {
        <S::Data as QueryData>::component_types()
    }
}

/// Tree node wrapping a [`System`].
pub(crate) struct PlainLeaf<S: System>(pub(crate) S);

impl<S: System> Behavior for PlainLeaf<S> {
    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut self.0
    }

    fn begin(&mut self, ctx: &SystemContext<'_>) {
        self.0.on_update_group_begin(ctx);
    }

    fn end(&mut self, ctx: &SystemContext<'_>) {
        self.0.on_update_group_end(ctx);
    }

    fn update(&mut self, ctx: &SystemContext<'_>) -> SystemResult<()> {
        self.0.on_update(ctx);
        Ok(())
    }
}

/// Group node with custom hooks.
pub(crate) struct HookGroup<H: GroupHooks>(pub(crate) H);

impl<H: GroupHooks> Behavior for HookGroup<H> {
    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        &mut self.0
    }

    fn begin(&mut self, ctx: &SystemContext<'_>) {
        self.0.on_update_group_begin(ctx);
    }

    fn end(&mut self, ctx: &SystemContext<'_>) {
        self.0.on_update_group_end(ctx);
    }
}
