//! # Command Buffer
//!
//! Structural changes recorded while a store is borrowed for iteration and
//! applied afterwards, in recorded order.
//!
//! ```rust,ignore
//! let mut commands = CommandBuffer::new(&store);
//! for (_, entity) in query.iter(&mut store) {
//!     commands.add_component(entity, Scale3::new(4.0, 5.0, 6.0));
//! }
//! commands.playback(&mut store)?;
//! ```

use std::any::Any;

use crate::bits::Tags;
use crate::error::{EcsError, EcsResult};
use crate::schema::{self, Component, ComponentType};

use super::entity::Entity;
use super::store::EntityStore;

/// Entity a recorded command applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandTarget {
    /// An existing entity.
    Entity(Entity),
    /// The n-th entity created by this buffer, resolved at playback.
    Pending(usize),
}

impl From<Entity> for CommandTarget {
    fn from(entity: Entity) -> Self {
        Self::Entity(entity)
    }
}

enum Command {
    CreateEntity,
    DeleteEntity(CommandTarget),
    AddComponent {
        target: CommandTarget,
        component: ComponentType,
        value: Box<dyn Any>,
    },
    RemoveComponent {
        target: CommandTarget,
        component: ComponentType,
    },
    AddTags {
        target: CommandTarget,
        tags: Tags,
    },
    RemoveTags {
        target: CommandTarget,
        tags: Tags,
    },
}

/// Append-only log of structural operations bound to one store.
pub struct CommandBuffer {
    store_id: u64,
    commands: Vec<Command>,
    pending: usize,
}

impl CommandBuffer {
    /// Creates an empty buffer bound to `store`.
    #[must_use]
    pub fn new(store: &EntityStore) -> Self {
        Self {
            store_id: store.id(),
            commands: Vec::new(),
            pending: 0,
        }
    }

    /// Id of the bound store.
    #[inline]
    #[must_use]
    pub const fn store_id(&self) -> u64 {
        self.store_id
    }

    /// Number of recorded commands.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if nothing is recorded.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Records an entity creation and returns a placeholder for it.
    pub fn create_entity(&mut self) -> CommandTarget {
        self.commands.push(Command::CreateEntity);
        self.pending += 1;
        CommandTarget::Pending(self.pending - 1)
    }

    /// Records a deletion.
    pub fn delete_entity(&mut self, target: impl Into<CommandTarget>) {
        self.commands.push(Command::DeleteEntity(target.into()));
    }

    /// Records adding or overwriting component `T`.
    pub fn add_component<T: Component>(&mut self, target: impl Into<CommandTarget>, value: T) {
        self.commands.push(Command::AddComponent {
            target: target.into(),
            component: schema::component_type::<T>(),
            value: Box::new(value),
        });
    }

    /// Records removing component `T`.
    pub fn remove_component<T: Component>(&mut self, target: impl Into<CommandTarget>) {
        self.commands.push(Command::RemoveComponent {
            target: target.into(),
            component: schema::component_type::<T>(),
        });
    }

    /// Records adding tags.
    pub fn add_tags(&mut self, target: impl Into<CommandTarget>, tags: Tags) {
        self.commands.push(Command::AddTags {
            target: target.into(),
            tags,
        });
    }

    /// Records removing tags.
    pub fn remove_tags(&mut self, target: impl Into<CommandTarget>, tags: Tags) {
        self.commands.push(Command::RemoveTags {
            target: target.into(),
            tags,
        });
    }

    /// Drops all recorded commands without applying them.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.pending = 0;
    }

    /// Applies and drains all commands in recorded order.
    ///
    /// Commands whose target no longer exists are skipped, including
    /// targets deleted earlier in the same buffer whose id was handed out
    /// again by a later `create_entity`.
    ///
    /// # Returns
    ///
    /// Entities created for [`CommandTarget::Pending`] placeholders, in
    /// creation order.
    ///
    /// # Errors
    ///
    /// `StoreMismatch` if `store` is not the bound store; the buffer is
    /// left untouched then. Id exhaustion while creating entities aborts
    /// playback and drops the remaining commands.
    pub fn playback(&mut self, store: &mut EntityStore) -> EcsResult<Vec<Entity>> {
        if store.id() != self.store_id {
            return Err(EcsError::StoreMismatch {
                expected: self.store_id,
                actual: store.id(),
            });
        }
        let commands = std::mem::take(&mut self.commands);
        let mut created = Vec::with_capacity(self.pending);
        self.pending = 0;
        tracing::trace!(store = self.store_id, count = commands.len(), "command buffer playback");

        for command in commands {
            match command {
                Command::CreateEntity => created.push(store.create_entity()?),
                Command::DeleteEntity(target) => {
                    if let Some(entity) = live_target(store, &created, target) {
                        store.delete_entity(entity);
                    }
                }
                Command::AddComponent { target, component, value } => {
                    if let Some(entity) = live_target(store, &created, target) {
                        store.add_component_boxed(entity, component, value)?;
                    }
                }
                Command::RemoveComponent { target, component } => {
                    if let Some(entity) = live_target(store, &created, target) {
                        store.remove_component_type(entity, component);
                    }
                }
                Command::AddTags { target, tags } => {
                    if let Some(entity) = live_target(store, &created, target) {
                        store.add_tags(entity, &tags);
                    }
                }
                Command::RemoveTags { target, tags } => {
                    if let Some(entity) = live_target(store, &created, target) {
                        store.remove_tags(entity, &tags);
                    }
                }
            }
        }
        Ok(created)
    }
}

impl std::fmt::Debug for CommandBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("store", &self.store_id)
            .field("commands", &self.commands.len())
            .finish()
    }
}

fn live_target(store: &EntityStore, created: &[Entity], target: CommandTarget) -> Option<Entity> {
    let entity = match target {
        CommandTarget::Entity(entity) => entity,
        CommandTarget::Pending(index) => *created.get(index)?,
    };
    if store.is_alive(entity) {
        Some(entity)
    } else {
        tracing::trace!(?entity, "skipping command for absent entity");
        None
    }
}
