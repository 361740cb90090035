//! # Tessera Core
//!
//! Archetype-based entity store for simulation and editor tooling:
//! - Structure-of-arrays storage, one archetype per component/tag set
//! - Cached queries with chunked, slice-based iteration
//! - Synchronous change events and deferred command buffers
//!
//! ## Architecture Rules
//!
//! 1. **One borrow, one mutation path** - structural changes go through the
//!    store or a [`CommandBuffer`], never through a live query
//! 2. **Dense columns** - components of an archetype are contiguous `Vec`s
//! 3. **Explicit registration** - component keys and tags live in a
//!    process-wide [`schema`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_core::{EntityStore, Position, Scale3};
//!
//! let mut store = EntityStore::new();
//! let entity = store.create_entity_with((Position::new(1.0, 2.0, 3.0),))?;
//!
//! let mut query = store.query::<(Position,)>();
//! query.for_each_entity(&mut store, |(pos,), _| pos.x += 1.0);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod bits;
pub mod config;
pub mod ecs;
pub mod error;
pub mod schema;

pub use bits::{ComponentTypes, Tags, MAX_TYPES};
pub use config::{PidType, StoreConfig};
pub use ecs::{
    as_bytes, Archetype, ArchetypeId, ArchetypeKey, ArchetypeQuery, Bundle, Chunk, Chunks, CommandBuffer,
    CommandTarget, ComponentChanged, ComponentChangedAction, Disabled, Entity, EntityData, EntityName,
    EntityStore, ListenerId, Position, QueryData, QueryFilter, QueryIter, Rotation, RotationEuler, Scale3,
    SharedStore, StoreEvent, TagsChanged, Transform,
};
pub use error::{EcsError, EcsResult};
pub use schema::{Component, ComponentDesc, ComponentInfo, ComponentType, Tag, TagInfo, TagType};
