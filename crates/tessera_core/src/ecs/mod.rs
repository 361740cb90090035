//! # Entity Component System
//!
//! Archetype-based entity storage.
//!
//! ## Layout
//!
//! - Entities sharing a component set and tag set live in one [`Archetype`]
//! - Components are stored in dense per-type columns
//! - Entity ids are plain indices into a flat location table
//! - Queries cache their matching archetypes and hand out column slices

pub mod archetype;
pub mod bundle;
pub mod command;
pub mod component;
pub mod data;
pub mod entity;
pub mod events;
pub mod query;
pub mod storage;
pub mod store;

pub use archetype::{Archetype, ArchetypeId, ArchetypeKey};
pub use bundle::Bundle;
pub use command::{CommandBuffer, CommandTarget};
pub use component::{as_bytes, Disabled, EntityName, Position, Rotation, RotationEuler, Scale3, Transform};
pub use data::EntityData;
pub use entity::Entity;
pub use events::{ComponentChanged, ComponentChangedAction, ListenerId, StoreEvent, TagsChanged};
pub use query::{ArchetypeQuery, Chunk, Chunks, QueryData, QueryFilter, QueryIter, Rows};
pub use storage::{Column, ComponentStorage};
pub use store::{EntityStore, SharedStore};
