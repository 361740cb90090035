//! # Component Storage
//!
//! Dense, type-erased component columns.
//!
//! Each archetype owns one column per component type. Columns are plain
//! `Vec<C>` wrapped behind the object-safe [`Column`] trait so the archetype
//! can move rows between columns without knowing their element types:
//!
//! - push / overwrite: O(1) amortized
//! - swap-remove: O(1)
//! - row move between archetypes: O(1), value moved not cloned

use std::any::Any;

use crate::schema::Component;

/// Type-erased operations on a single component column.
///
/// Implemented only by [`ComponentStorage`]. All row indices must be in
/// bounds; the owning archetype guarantees this.
pub trait Column: Any {
    /// Number of rows.
    fn len(&self) -> usize;

    /// Returns true if the column has no rows.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes `row` by swapping in the last row and drops the value.
    fn swap_remove_drop(&mut self, row: usize);

    /// Swap-removes `row` and pushes its value onto `dst`.
    ///
    /// `dst` must store the same component type.
    fn move_row(&mut self, row: usize, dst: &mut dyn Column);

    /// Pushes (`row == None`) or overwrites `row` with a boxed value.
    ///
    /// Returns the value back if its type does not match the column.
    fn write_boxed(&mut self, row: Option<usize>, value: Box<dyn Any>) -> Result<(), Box<dyn Any>>;

    /// Reserves room for `additional` rows.
    fn reserve(&mut self, additional: usize);

    /// Creates an empty column of the same component type.
    fn new_empty(&self) -> Box<dyn Column>;

    /// Upcast for typed access.
    fn as_any(&self) -> &dyn Any;

    /// Upcast for typed mutable access.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Dense storage for a single component type.
///
/// # Type Parameters
///
/// * `C` - The component type to store
pub struct ComponentStorage<C: Component> {
    data: Vec<C>,
}

impl<C: Component> ComponentStorage<C> {
    /// Creates an empty column.
    #[must_use]
    pub const fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Creates a boxed empty column. Stored as the schema's column factory.
    #[must_use]
    pub fn boxed() -> Box<dyn Column> {
        Box::new(Self::new())
    }

    /// Gets the component at `row`.
    #[inline]
    #[must_use]
    pub fn get(&self, row: usize) -> Option<&C> {
        self.data.get(row)
    }

    /// Gets the component at `row` mutably.
    #[inline]
    #[must_use]
    pub fn get_mut(&mut self, row: usize) -> Option<&mut C> {
        self.data.get_mut(row)
    }

    /// Appends a value.
    #[inline]
    pub fn push(&mut self, value: C) {
        self.data.push(value);
    }

    /// Overwrites the value at `row`.
    #[inline]
    pub fn set(&mut self, row: usize, value: C) {
        self.data[row] = value;
    }

    /// All values as a slice.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[C] {
        &self.data
    }

    /// All values as a mutable slice.
    #[inline]
    #[must_use]
    pub fn as_mut_slice(&mut self) -> &mut [C] {
        &mut self.data
    }
}

impl<C: Component> Default for ComponentStorage<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Component> Column for ComponentStorage<C> {
    #[inline]
    fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    fn swap_remove_drop(&mut self, row: usize) {
        self.data.swap_remove(row);
    }

    #[inline]
    fn move_row(&mut self, row: usize, dst: &mut dyn Column) {
        let value = self.data.swap_remove(row);
        if let Some(dst) = dst.as_any_mut().downcast_mut::<Self>() {
            dst.data.push(value);
        } else {
            debug_assert!(false, "column type mismatch on row move");
        }
    }

    fn write_boxed(&mut self, row: Option<usize>, value: Box<dyn Any>) -> Result<(), Box<dyn Any>> {
        let value = value.downcast::<C>()?;
        match row {
            Some(row) => self.data[row] = *value,
            None => self.data.push(*value),
        }
        Ok(())
    }

    fn reserve(&mut self, additional: usize) {
        self.data.reserve(additional);
    }

    fn new_empty(&self) -> Box<dyn Column> {
        Self::boxed()
    }

    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }

    #[inline]
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Downcasts a column to its typed storage.
#[inline]
pub(crate) fn typed<C: Component>(column: &dyn Column) -> Option<&ComponentStorage<C>> {
    column.as_any().downcast_ref::<ComponentStorage<C>>()
}

/// Downcasts a column to its typed storage mutably.
#[inline]
pub(crate) fn typed_mut<C: Component>(column: &mut dyn Column) -> Option<&mut ComponentStorage<C>> {
    column.as_any_mut().downcast_mut::<ComponentStorage<C>>()
}
