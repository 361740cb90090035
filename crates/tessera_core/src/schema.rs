//! # Schema Registry
//!
//! Process-wide registry mapping component and tag types to stable indices
//! and metadata.
//!
//! Types are registered explicitly at startup (`register_component`,
//! `register_serde_component`, `register_tag`) or implicitly on first use
//! with default metadata. Indices never change once assigned; an explicit
//! registration after implicit use only fills in metadata.
//!
//! Built-in components (`Position`, `Rotation`, ...) and the `Disabled` tag
//! are registered when the registry is first touched, so `Disabled` always
//! has tag index 0.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::bits::{ComponentTypes, MAX_TYPES};
use crate::ecs::component::register_builtins;
use crate::ecs::storage::{typed, Column, ComponentStorage};
use crate::error::{EcsError, EcsResult};

// ============================================================================
// TRAITS
// ============================================================================

/// Marker trait for component value types.
///
/// Components are plain values stored by the entity store. They may hold
/// handles to externally owned objects; the store never manages those.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Debug)]
/// struct Health(u32);
///
/// impl Component for Health {}
/// ```
pub trait Component: 'static {}

/// Marker trait for zero-size tag types.
pub trait Tag: 'static {}

// ============================================================================
// TYPE HANDLES
// ============================================================================

/// Stable index of a registered component type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentType(u16);

impl ComponentType {
    /// Index used in [`ComponentTypes`](crate::ComponentTypes) bitsets.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index as u16)
    }
}

/// Stable index of a registered tag type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TagType(u16);

impl TagType {
    /// Index used in [`Tags`](crate::Tags) bitsets.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) const fn from_index(index: usize) -> Self {
        Self(index as u16)
    }
}

// ============================================================================
// METADATA
// ============================================================================

/// Registration options for a component type.
#[derive(Clone, Debug, Default)]
pub struct ComponentDesc {
    key: Option<String>,
    symbol: Option<String>,
    color: Option<[u8; 3]>,
}

impl ComponentDesc {
    /// Options with no key, symbol or color.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the persistence key (defaults to the short type name).
    #[must_use]
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the display symbol.
    #[must_use]
    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Sets the display color.
    #[must_use]
    pub const fn color(mut self, r: u8, g: u8, b: u8) -> Self {
        self.color = Some([r, g, b]);
        self
    }
}

/// Metadata of a registered component type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentInfo {
    /// Stable index.
    pub ty: ComponentType,
    /// Short type name, e.g. `Position`.
    pub name: String,
    /// Fully qualified Rust type name.
    pub type_name: &'static str,
    /// Persistence key used by the key-value bridge.
    pub key: String,
    /// Optional display symbol.
    pub symbol: Option<String>,
    /// Optional display color.
    pub color: Option<[u8; 3]>,
    /// Whether the key-value bridge can read and write this component.
    pub serializable: bool,
}

/// Metadata of a registered tag type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagInfo {
    /// Stable index.
    pub ty: TagType,
    /// Short type name, e.g. `Disabled`.
    pub name: String,
    /// Fully qualified Rust type name.
    pub type_name: &'static str,
}

type ToValueFn = fn(&dyn Column, usize) -> Result<toml::Value, String>;
type FromValueFn = fn(toml::Value) -> Result<Box<dyn Any>, String>;

struct ComponentEntry {
    info: ComponentInfo,
    type_id: TypeId,
    new_column: fn() -> Box<dyn Column>,
    to_value: Option<ToValueFn>,
    from_value: Option<FromValueFn>,
}

struct TagEntry {
    info: TagInfo,
}

// ============================================================================
// REGISTRY
// ============================================================================

/// The registry contents. Only reachable through the module functions.
pub(crate) struct Schema {
    components: Vec<ComponentEntry>,
    component_by_type: HashMap<TypeId, ComponentType>,
    component_by_key: HashMap<String, ComponentType>,
    tags: Vec<TagEntry>,
    tag_by_type: HashMap<TypeId, TagType>,
    tag_by_name: HashMap<String, TagType>,
}

impl Schema {
    fn with_builtins() -> Self {
        let mut schema = Self {
            components: Vec::new(),
            component_by_type: HashMap::new(),
            component_by_key: HashMap::new(),
            tags: Vec::new(),
            tag_by_type: HashMap::new(),
            tag_by_name: HashMap::new(),
        };
        register_builtins(&mut schema);
        schema
    }

    /// Inserts or updates a component entry.
    pub(crate) fn insert_component<T: Component>(
        &mut self,
        desc: ComponentDesc,
        serde_fns: Option<(ToValueFn, FromValueFn)>,
    ) -> EcsResult<ComponentType> {
        let name = short_type_name(type_name::<T>());
        let explicit_key = desc.key.is_some();
        let mut key = desc.key.unwrap_or_else(|| name.clone());

        if let Some(&owner) = self.component_by_key.get(&key) {
            if self.component_by_type.get(&TypeId::of::<T>()) != Some(&owner) {
                if explicit_key {
                    return Err(EcsError::DuplicateComponentKey(key));
                }
                // Same short name in another module
                key = type_name::<T>().to_owned();
            }
        }

        if let Some(&ty) = self.component_by_type.get(&TypeId::of::<T>()) {
            let entry = &mut self.components[ty.index()];
            self.component_by_key.remove(&entry.info.key);
            entry.info.key.clone_from(&key);
            entry.info.symbol = desc.symbol;
            entry.info.color = desc.color;
            if let Some((to_value, from_value)) = serde_fns {
                entry.info.serializable = true;
                entry.to_value = Some(to_value);
                entry.from_value = Some(from_value);
            }
            self.component_by_key.insert(key, ty);
            return Ok(ty);
        }

        if self.components.len() >= MAX_TYPES {
            return Err(EcsError::SchemaCapacity {
                kind: "component",
                limit: MAX_TYPES,
            });
        }

        let ty = ComponentType::from_index(self.components.len());
        self.components.push(ComponentEntry {
            info: ComponentInfo {
                ty,
                name,
                type_name: type_name::<T>(),
                key: key.clone(),
                symbol: desc.symbol,
                color: desc.color,
                serializable: serde_fns.is_some(),
            },
            type_id: TypeId::of::<T>(),
            new_column: ComponentStorage::<T>::boxed,
            to_value: serde_fns.map(|(to, _)| to),
            from_value: serde_fns.map(|(_, from)| from),
        });
        self.component_by_type.insert(TypeId::of::<T>(), ty);
        self.component_by_key.insert(key, ty);
        tracing::debug!(component = type_name::<T>(), index = ty.index(), "registered component type");
        Ok(ty)
    }

    /// Inserts a serializable component entry.
    pub(crate) fn insert_serde_component<T>(&mut self, desc: ComponentDesc) -> EcsResult<ComponentType>
    where
        T: Component + Serialize + DeserializeOwned,
    {
        self.insert_component::<T>(desc, Some((to_value::<T>, from_value::<T>)))
    }

    /// Inserts a tag entry, returning the existing index if already present.
    pub(crate) fn insert_tag<T: Tag>(&mut self) -> EcsResult<TagType> {
        if let Some(&ty) = self.tag_by_type.get(&TypeId::of::<T>()) {
            return Ok(ty);
        }
        if self.tags.len() >= MAX_TYPES {
            return Err(EcsError::SchemaCapacity {
                kind: "tag",
                limit: MAX_TYPES,
            });
        }
        let ty = TagType::from_index(self.tags.len());
        let mut name = short_type_name(type_name::<T>());
        if self.tag_by_name.contains_key(&name) {
            name = type_name::<T>().to_owned();
        }
        self.tags.push(TagEntry {
            info: TagInfo {
                ty,
                name: name.clone(),
                type_name: type_name::<T>(),
            },
        });
        self.tag_by_type.insert(TypeId::of::<T>(), ty);
        self.tag_by_name.insert(name, ty);
        tracing::debug!(tag = type_name::<T>(), index = ty.index(), "registered tag type");
        Ok(ty)
    }
}

static SCHEMA: OnceLock<RwLock<Schema>> = OnceLock::new();

fn schema() -> &'static RwLock<Schema> {
    SCHEMA.get_or_init(|| RwLock::new(Schema::with_builtins()))
}

fn to_value<T: Component + Serialize>(column: &dyn Column, row: usize) -> Result<toml::Value, String> {
    let value = typed::<T>(column)
        .and_then(|storage| storage.get(row))
        .ok_or_else(|| format!("no value at row {row}"))?;
    toml::Value::try_from(value).map_err(|e| e.to_string())
}

fn from_value<T: Component + DeserializeOwned>(value: toml::Value) -> Result<Box<dyn Any>, String> {
    let value: T = value.try_into().map_err(|e: toml::de::Error| e.to_string())?;
    Ok(Box::new(value))
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Registers component `T` with the given metadata.
///
/// Re-registering keeps the index and replaces key, symbol and color.
///
/// # Errors
///
/// `DuplicateComponentKey` if another type owns the key,
/// `SchemaCapacity` if the component limit is reached.
pub fn register_component<T: Component>(desc: ComponentDesc) -> EcsResult<ComponentType> {
    schema().write().insert_component::<T>(desc, None)
}

/// Registers component `T` and enables the key-value bridge for it.
///
/// # Errors
///
/// Same as [`register_component`].
pub fn register_serde_component<T>(desc: ComponentDesc) -> EcsResult<ComponentType>
where
    T: Component + Serialize + DeserializeOwned,
{
    schema().write().insert_serde_component::<T>(desc)
}

/// Registers tag `T`.
///
/// # Errors
///
/// `SchemaCapacity` if the tag limit is reached.
pub fn register_tag<T: Tag>() -> EcsResult<TagType> {
    schema().write().insert_tag::<T>()
}

/// Returns the index of component `T`, registering it with defaults on first use.
///
/// # Panics
///
/// Panics if the component limit is reached during implicit registration.
#[must_use]
pub fn component_type<T: Component>() -> ComponentType {
    if let Some(&ty) = schema().read().component_by_type.get(&TypeId::of::<T>()) {
        return ty;
    }
    let mut guard = schema().write();
    if let Some(&ty) = guard.component_by_type.get(&TypeId::of::<T>()) {
        return ty;
    }
    match guard.insert_component::<T>(ComponentDesc::new(), None) {
        Ok(ty) => ty,
        Err(err) => panic!("cannot register component {}: {err}", type_name::<T>()),
    }
}

/// Returns the index of tag `T`, registering it on first use.
///
/// # Panics
///
/// Panics if the tag limit is reached during implicit registration.
#[must_use]
pub fn tag_type<T: Tag>() -> TagType {
    if let Some(&ty) = schema().read().tag_by_type.get(&TypeId::of::<T>()) {
        return ty;
    }
    let mut guard = schema().write();
    match guard.insert_tag::<T>() {
        Ok(ty) => ty,
        Err(err) => panic!("cannot register tag {}: {err}", type_name::<T>()),
    }
}

/// Metadata of a component type.
#[must_use]
pub fn component_info(ty: ComponentType) -> Option<ComponentInfo> {
    schema().read().components.get(ty.index()).map(|e| e.info.clone())
}

/// Metadata of a tag type.
#[must_use]
pub fn tag_info(ty: TagType) -> Option<TagInfo> {
    schema().read().tags.get(ty.index()).map(|e| e.info.clone())
}

/// Short name of a component type, `?` if unknown.
#[must_use]
pub fn component_name(ty: ComponentType) -> String {
    schema()
        .read()
        .components
        .get(ty.index())
        .map_or_else(|| "?".to_owned(), |e| e.info.name.clone())
}

/// Short name of a tag type, `?` if unknown.
#[must_use]
pub fn tag_name(ty: TagType) -> String {
    schema()
        .read()
        .tags
        .get(ty.index())
        .map_or_else(|| "?".to_owned(), |e| e.info.name.clone())
}

/// Looks up a component type by persistence key.
#[must_use]
pub fn component_by_key(key: &str) -> Option<ComponentType> {
    schema().read().component_by_key.get(key).copied()
}

/// Looks up a tag type by short name.
#[must_use]
pub fn tag_by_name(name: &str) -> Option<TagType> {
    schema().read().tag_by_name.get(name).copied()
}

/// All registered components, ordered by index.
#[must_use]
pub fn components() -> Vec<ComponentInfo> {
    schema().read().components.iter().map(|e| e.info.clone()).collect()
}

/// All registered tags, ordered by index.
#[must_use]
pub fn tags() -> Vec<TagInfo> {
    schema().read().tags.iter().map(|e| e.info.clone()).collect()
}

/// Rust type id of a registered component.
pub(crate) fn component_type_id(ty: ComponentType) -> Option<TypeId> {
    schema().read().components.get(ty.index()).map(|e| e.type_id)
}

/// Creates one empty column per type, in ascending index order.
pub(crate) fn new_columns(types: &ComponentTypes) -> Vec<Box<dyn Column>> {
    let guard = schema().read();
    types.iter().map(|ty| (guard.components[ty.index()].new_column)()).collect()
}

/// Converts the value at `row` of `column` to its key-value form.
///
/// `Ok(None)` if the component is not serializable.
pub(crate) fn column_value(ty: ComponentType, column: &dyn Column, row: usize) -> EcsResult<Option<(String, toml::Value)>> {
    let (key, convert) = {
        let guard = schema().read();
        let Some(entry) = guard.components.get(ty.index()) else {
            return Ok(None);
        };
        (entry.info.key.clone(), entry.to_value)
    };
    let Some(convert) = convert else {
        return Ok(None);
    };
    let value = convert(column, row).map_err(|reason| EcsError::Serialization {
        key: key.clone(),
        reason,
    })?;
    Ok(Some((key, value)))
}

/// Converts a key-value entry back into a boxed component value.
pub(crate) fn value_to_component(key: &str, value: toml::Value) -> EcsResult<(ComponentType, Box<dyn Any>)> {
    let (ty, convert) = {
        let guard = schema().read();
        let ty = *guard
            .component_by_key
            .get(key)
            .ok_or_else(|| EcsError::UnknownComponentKey(key.to_owned()))?;
        (ty, guard.components[ty.index()].from_value)
    };
    let convert = convert.ok_or_else(|| EcsError::Serialization {
        key: key.to_owned(),
        reason: "component is not serializable".to_owned(),
    })?;
    let boxed = convert(value).map_err(|reason| EcsError::Serialization {
        key: key.to_owned(),
        reason,
    })?;
    Ok((ty, boxed))
}

/// Strips module paths from every path segment of a type name.
///
/// `tessera_core::ecs::component::Position` becomes `Position`,
/// `alloc::vec::Vec<my::Item>` becomes `Vec<Item>`.
#[must_use]
pub fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0;
    let mut chars = full.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                out.truncate(segment_start);
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | ';' | '&' => {
                out.push(c);
                segment_start = out.len();
            }
            _ => out.push(c),
        }
    }
    out
}
