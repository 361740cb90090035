//! # System Tree Error Types

use thiserror::Error;

use tessera_core::EcsError;

/// Errors raised by system tree mutations and updates.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SystemError {
    /// Insert position outside `-1..=child_count`.
    #[error("invalid index: {0}")]
    InvalidIndex(i32),

    /// The system is not attached to a group.
    #[error("System '{0}' has no parent")]
    NoParent(String),

    /// A group would become its own descendant.
    #[error("cannot move '{system}' into its own subtree '{target}'")]
    CycleDetected {
        /// Name of the moved system.
        system: String,
        /// Name of the target group.
        target: String,
    },

    /// The system already has a parent; use `move_system_to` instead.
    #[error("System '{0}' already has a parent")]
    AlreadyAttached(String),

    /// A group operation targeted a leaf system.
    #[error("System '{0}' is not a group")]
    NotAGroup(String),

    /// The id does not refer to a live system.
    #[error("system not found: {0}")]
    SystemNotFound(u32),

    /// A persisted tree names a type the registry does not know.
    #[error("unknown system type: {0}")]
    UnknownSystemType(String),

    /// A configuration file could not be parsed or holds invalid values.
    #[error("invalid systems config: {0}")]
    InvalidConfig(String),

    /// A persisted system tree could not be parsed or written.
    #[error("invalid system tree: {0}")]
    InvalidTree(String),

    /// Command buffer playback failed.
    #[error(transparent)]
    Store(#[from] EcsError),
}

/// Result type for system tree operations.
pub type SystemResult<T> = Result<T, SystemError>;
