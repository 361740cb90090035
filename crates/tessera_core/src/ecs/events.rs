//! # Store Events
//!
//! Structural changes are reported synchronously to listeners registered
//! on the store. A listener receives the store by shared reference, so it
//! can read component values but cannot mutate structure from inside the
//! notification. Mutations triggered by an event are recorded into a
//! [`CommandBuffer`](crate::CommandBuffer) and played back later.

use crate::bits::Tags;
use crate::schema::{self, ComponentType, Tag};

use super::entity::Entity;
use super::store::EntityStore;

/// Kind of component change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentChangedAction {
    /// Component added to an entity that did not have it.
    Add,
    /// Existing component overwritten.
    Update,
    /// Component removed.
    Remove,
}

/// A component was added, updated or removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentChanged {
    /// Affected entity.
    pub entity: Entity,
    /// What happened.
    pub action: ComponentChangedAction,
    /// Component type.
    pub component: ComponentType,
}

/// Tags of an entity changed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TagsChanged {
    /// Affected entity.
    pub entity: Entity,
    /// Tags after the change.
    pub tags: Tags,
    /// Tags before the change.
    pub old_tags: Tags,
}

impl TagsChanged {
    /// Tags that were added.
    #[must_use]
    pub fn added(&self) -> Tags {
        self.tags.difference(&self.old_tags)
    }

    /// Tags that were removed.
    #[must_use]
    pub fn removed(&self) -> Tags {
        self.old_tags.difference(&self.tags)
    }

    /// Tags that were added or removed.
    #[must_use]
    pub fn changed(&self) -> Tags {
        self.added().union(&self.removed())
    }

    /// Returns true if tag `T` was added or removed.
    #[must_use]
    pub fn has<T: Tag>(&self) -> bool {
        self.changed().has(schema::tag_type::<T>())
    }
}

/// Structural change notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    /// Entity created; fired after it is placed in its archetype.
    EntityCreated(Entity),
    /// Entity about to be deleted; its components are still readable.
    EntityDeleted(Entity),
    /// Component added, updated or removed.
    ComponentChanged(ComponentChanged),
    /// Tags added or removed.
    TagsChanged(TagsChanged),
}

impl StoreEvent {
    /// Entity the event refers to.
    #[must_use]
    pub const fn entity(&self) -> Entity {
        match self {
            Self::EntityCreated(e) | Self::EntityDeleted(e) => *e,
            Self::ComponentChanged(c) => c.entity,
            Self::TagsChanged(t) => t.entity,
        }
    }
}

/// Handle returned by [`EntityStore::add_listener`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Box<dyn FnMut(&EntityStore, &StoreEvent)>;

struct Listener {
    id: ListenerId,
    callback: Callback,
}

/// Observer list of a store.
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    list: Vec<Listener>,
}

impl Listeners {
    pub fn add(&mut self, callback: Callback) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.list.push(Listener { id, callback });
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.list.len();
        self.list.retain(|l| l.id != id);
        self.list.len() != before
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// Calls every listener in subscription order.
    pub fn notify(&mut self, store: &EntityStore, event: &StoreEvent) {
        for listener in &mut self.list {
            (listener.callback)(store, event);
        }
    }
}
