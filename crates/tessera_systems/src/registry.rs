//! # System Type Registry
//!
//! Maps stable type keys ("Namespace.Name") to factories, so persisted
//! trees can be rebuilt. Every registered type must be `Default`.
//!
//! ```rust,ignore
//! let mut registry = SystemTypeRegistry::new();
//! registry
//!     .register_query_system::<MoveSystem>("Game.MoveSystem")
//!     .register_group::<PhysicsGroup>("Game.PhysicsGroup");
//!
//! let id = registry.create(&mut root, "MoveSystem")?; // class-name fallback
//! ```

use std::any::type_name;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::error::{SystemError, SystemResult};
use crate::root::{SystemId, SystemRoot};
use crate::system::{GroupHooks, QuerySystem, System};

/// Type key of plain groups.
pub const GROUP_TYPE_KEY: &str = "SystemGroup";

/// Default type key of `T`: its path with `.` separators.
#[must_use]
pub fn type_key_of<T: ?Sized>() -> String {
    type_name::<T>().replace("::", ".")
}

/// Creates a detached system in a root.
pub type SystemFactory = fn(&mut SystemRoot) -> SystemId;

fn make_group(root: &mut SystemRoot) -> SystemId {
    root.create_group(GROUP_TYPE_KEY)
}

fn make_query_system<S: QuerySystem + Default>(root: &mut SystemRoot) -> SystemId {
    root.create_system(S::default())
}

fn make_plain_system<S: System + Default>(root: &mut SystemRoot) -> SystemId {
    root.create_plain(S::default())
}

fn make_hook_group<H: GroupHooks + Default>(root: &mut SystemRoot) -> SystemId {
    root.create_group_with(H::default())
}

/// Factories keyed by type key.
#[derive(Clone)]
pub struct SystemTypeRegistry {
    factories: BTreeMap<String, SystemFactory>,
}

impl SystemTypeRegistry {
    /// Creates a registry knowing only plain groups.
    #[must_use]
    pub fn new() -> Self {
        let mut factories: BTreeMap<String, SystemFactory> = BTreeMap::new();
        factories.insert(GROUP_TYPE_KEY.to_owned(), make_group);
        Self { factories }
    }

    /// Process-wide registry.
    pub fn global() -> &'static RwLock<Self> {
        static GLOBAL: OnceLock<RwLock<SystemTypeRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| RwLock::new(Self::new()))
    }

    fn register(&mut self, key: String, factory: SystemFactory) -> &mut Self {
        if self.factories.insert(key.clone(), factory).is_some() {
            tracing::warn!(key = %key, "system type registered twice, keeping the latest");
        }
        self
    }

    /// Registers a query system type.
    pub fn register_query_system<S: QuerySystem + Default>(&mut self, key: impl Into<String>) -> &mut Self {
        self.register(key.into(), make_query_system::<S>)
    }

    /// Registers a plain system type.
    pub fn register_system<S: System + Default>(&mut self, key: impl Into<String>) -> &mut Self {
        self.register(key.into(), make_plain_system::<S>)
    }

    /// Registers a custom group type.
    pub fn register_group<H: GroupHooks + Default>(&mut self, key: impl Into<String>) -> &mut Self {
        self.register(key.into(), make_hook_group::<H>)
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Looks up a factory by exact key, then by class name (the segment
    /// after the last `.`). An ambiguous class name matches nothing.
    #[must_use]
    pub fn find(&self, type_key: &str) -> Option<(&str, SystemFactory)> {
        if let Some((key, &factory)) = self.factories.get_key_value(type_key) {
            return Some((key.as_str(), factory));
        }
        let class = class_name(type_key);
        let mut matches = self.factories.iter().filter(|(key, _)| class_name(key) == class);
        let (key, &factory) = matches.next()?;
        if matches.next().is_some() {
            tracing::warn!(type_key, "ambiguous system class name");
            return None;
        }
        Some((key.as_str(), factory))
    }

    /// Creates a detached system of the given type. Its type key is the
    /// registered key.
    ///
    /// # Errors
    ///
    /// `UnknownSystemType` if neither the key nor its class name is known.
    pub fn create(&self, root: &mut SystemRoot, type_key: &str) -> SystemResult<SystemId> {
        let (key, factory) = self
            .find(type_key)
            .ok_or_else(|| SystemError::UnknownSystemType(type_key.to_owned()))?;
        let id = factory(root);
        root.node_mut(id)?.type_key = key.to_owned();
        Ok(id)
    }
}

impl Default for SystemTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SystemTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.keys()).finish()
    }
}

fn class_name(key: &str) -> &str {
    key.rsplit('.').next().unwrap_or(key)
}
