//! # Built-in Components
//!
//! Transform-related components shared by most hosts, plus the `Disabled`
//! tag honored by every query.
//!
//! The math components are `#[repr(C)]` plain old data, so a column of them
//! can be handed to an external consumer as raw bytes via [`as_bytes`].

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::schema::{Component, ComponentDesc, Schema, Tag};

/// Position component.
///
/// Represents a 3D position in world space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
pub struct Position {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
    /// Z coordinate.
    pub z: f32,
}

impl Component for Position {}

impl Position {
    /// Creates a new position.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Returns the squared distance to another position.
    #[inline]
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }
}

/// Rotation component as a quaternion.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
pub struct Rotation {
    /// X part.
    pub x: f32,
    /// Y part.
    pub y: f32,
    /// Z part.
    pub z: f32,
    /// W (scalar) part.
    pub w: f32,
}

impl Component for Rotation {}

impl Rotation {
    /// Creates a rotation from quaternion parts.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// The identity rotation.
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);
}

impl Default for Rotation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Non-uniform scale component.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
pub struct Scale3 {
    /// X scale.
    pub x: f32,
    /// Y scale.
    pub y: f32,
    /// Z scale.
    pub z: f32,
}

impl Component for Scale3 {}

impl Scale3 {
    /// Creates a scale.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl Default for Scale3 {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0)
    }
}

/// Rotation component in euler angles (degrees).
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
pub struct RotationEuler {
    /// Rotation around X.
    pub x: f32,
    /// Rotation around Y.
    pub y: f32,
    /// Rotation around Z.
    pub z: f32,
}

impl Component for RotationEuler {}

/// Column-major 4x4 transform matrix.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
pub struct Transform {
    /// Matrix elements, column-major.
    pub m: [f32; 16],
}

impl Component for Transform {}

impl Transform {
    /// The identity matrix.
    pub const IDENTITY: Self = Self {
        m: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Display name of an entity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityName {
    /// The name.
    pub value: String,
}

impl Component for EntityName {}

impl EntityName {
    /// Creates a name component.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into() }
    }
}

/// Tag excluding an entity from queries unless they opt in with
/// [`QueryFilter::with_disabled`](crate::QueryFilter::with_disabled).
#[derive(Clone, Copy, Debug, Default)]
pub struct Disabled;

impl Tag for Disabled {}

/// Views a slice of plain-old-data components as bytes.
///
/// # Example
///
/// ```rust,ignore
/// for chunk in query.chunks(&mut store) {
///     let (positions,) = chunk.components;
///     upload(as_bytes(positions));
/// }
/// ```
#[inline]
#[must_use]
pub fn as_bytes<T: Pod>(values: &[T]) -> &[u8] {
    bytemuck::cast_slice(values)
}

/// Registers the built-in types. `Disabled` must be the first tag.
pub(crate) fn register_builtins(schema: &mut Schema) {
    let results = [
        schema.insert_tag::<Disabled>().map(|_| ()),
        schema
            .insert_serde_component::<Position>(ComponentDesc::new().key("pos").symbol("P").color(0, 170, 0))
            .map(|_| ()),
        schema
            .insert_serde_component::<Rotation>(ComponentDesc::new().key("rot").symbol("Rℍ"))
            .map(|_| ()),
        schema
            .insert_serde_component::<Scale3>(ComponentDesc::new().key("scl3").symbol("S"))
            .map(|_| ()),
        schema
            .insert_serde_component::<RotationEuler>(ComponentDesc::new().key("rot3"))
            .map(|_| ()),
        schema
            .insert_serde_component::<Transform>(ComponentDesc::new().key("trans"))
            .map(|_| ()),
        schema
            .insert_serde_component::<EntityName>(ComponentDesc::new().key("name").symbol("N"))
            .map(|_| ()),
    ];
    for result in results {
        if let Err(err) = result {
            tracing::warn!(%err, "failed to register built-in type");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_size() {
        assert_eq!(std::mem::size_of::<Position>(), 12);
        assert_eq!(std::mem::size_of::<Transform>(), 64);
    }

    #[test]
    fn test_as_bytes() {
        let positions = [Position::new(1.0, 2.0, 3.0), Position::new(4.0, 5.0, 6.0)];
        let bytes = as_bytes(&positions);
        assert_eq!(bytes.len(), 24);
        assert_eq!(&bytes[0..4], &1.0f32.to_ne_bytes());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Scale3::default(), Scale3::new(1.0, 1.0, 1.0));
        assert_eq!(Rotation::default(), Rotation::IDENTITY);
        assert_eq!(Transform::default().m[15], 1.0);
    }

    #[test]
    fn test_distance_squared() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(1.0, 2.0, 2.0);
        assert!((a.distance_squared(b) - 9.0).abs() < f32::EPSILON);
    }
}
