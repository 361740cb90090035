//! Error types for the entity store.

use thiserror::Error;

/// Errors raised by store, query and command buffer operations.
///
/// Lookups of unknown entities are not errors: they return
/// [`Entity::NULL`](crate::Entity::NULL) or `false`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// All entity ids up to the configured maximum are in use.
    #[error("entity id space exhausted: max id {max}")]
    IdSpaceExhausted {
        /// Highest id the store may allocate.
        max: u32,
    },

    /// An explicit id was requested that already belongs to a live entity.
    #[error("entity id {0} already in use")]
    IdAlreadyInUse(u32),

    /// An explicit id outside `1..=max_entity_id`.
    #[error("invalid entity id: {0}")]
    InvalidEntityId(u32),

    /// A bundle named the same component type twice.
    #[error("duplicate component in bundle: {0}")]
    DuplicateComponent(String),

    /// More component or tag types registered than a bitset can hold.
    #[error("schema capacity exceeded: {kind} limit is {limit}")]
    SchemaCapacity {
        /// `"component"` or `"tag"`.
        kind: &'static str,
        /// Maximum number of types of that kind.
        limit: usize,
    },

    /// A persistence key already claimed by another component type.
    #[error("component key '{0}' already registered")]
    DuplicateComponentKey(String),

    /// A boxed value does not match the component type it was added as.
    #[error("value type does not match component '{0}'")]
    ComponentTypeMismatch(String),

    /// A persistence key that no registered component uses.
    #[error("unknown component key: {0}")]
    UnknownComponentKey(String),

    /// A tag name that no registered tag uses.
    #[error("unknown tag name: {0}")]
    UnknownTagName(String),

    /// Converting a component to or from its key-value form failed.
    #[error("serialization failed for component '{key}': {reason}")]
    Serialization {
        /// Persistence key of the component.
        key: String,
        /// Underlying serde message.
        reason: String,
    },

    /// A command buffer was played back against a store it was not recorded for.
    #[error("command buffer bound to store {expected} played back on store {actual}")]
    StoreMismatch {
        /// Store the buffer was created for.
        expected: u64,
        /// Store passed to playback.
        actual: u64,
    },

    /// A configuration file could not be parsed or holds invalid values.
    #[error("invalid store config: {0}")]
    InvalidConfig(String),
}

/// Result type for store operations.
pub type EcsResult<T> = Result<T, EcsError>;
