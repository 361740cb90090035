//! # Type Bitsets
//!
//! Fixed-size bitsets identifying component and tag combinations.
//!
//! ```text
//! ComponentTypes: [w0, w1, w2, w3]   bit i = component index i present
//! Tags:           [w0, w1, w2, w3]   bit i = tag index i present
//! ```
//!
//! An archetype is keyed by one `ComponentTypes` and one `Tags` value.
//! Both are `Copy`, hashable and cheap to compare.

use std::fmt;

use crate::schema::{self, Component, ComponentType, Tag, TagType};

/// Maximum number of distinct component types (and, separately, tag types).
pub const MAX_TYPES: usize = 256;

const WORDS: usize = MAX_TYPES / 64;

// ============================================================================
// RAW BITSET
// ============================================================================

/// A 256-bit set.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BitSet {
    words: [u64; WORDS],
}

impl BitSet {
    /// The empty set.
    pub const EMPTY: Self = Self { words: [0; WORDS] };

    /// Sets bit `index`.
    #[inline]
    pub fn set(&mut self, index: usize) {
        debug_assert!(index < MAX_TYPES, "bit index out of range");
        self.words[index / 64] |= 1u64 << (index % 64);
    }

    /// Clears bit `index`.
    #[inline]
    pub fn clear(&mut self, index: usize) {
        debug_assert!(index < MAX_TYPES, "bit index out of range");
        self.words[index / 64] &= !(1u64 << (index % 64));
    }

    /// Returns true if bit `index` is set.
    #[inline]
    #[must_use]
    pub fn has(&self, index: usize) -> bool {
        index < MAX_TYPES && (self.words[index / 64] >> (index % 64)) & 1 == 1
    }

    /// Returns true if every bit of `other` is also set in `self`.
    #[inline]
    #[must_use]
    pub fn contains_all(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(a, b)| a & b == *b)
    }

    /// Returns true if `self` and `other` share at least one bit.
    #[inline]
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(a, b)| a & b != 0)
    }

    /// Returns the union of both sets.
    #[inline]
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut words = self.words;
        for (w, o) in words.iter_mut().zip(other.words.iter()) {
            *w |= o;
        }
        Self { words }
    }

    /// Returns the bits of `self` not set in `other`.
    #[inline]
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        let mut words = self.words;
        for (w, o) in words.iter_mut().zip(other.words.iter()) {
            *w &= !o;
        }
        Self { words }
    }

    /// Returns true if no bit is set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Number of set bits.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Number of set bits strictly below `index`.
    ///
    /// Used to map a type index to its column position inside an archetype,
    /// since columns are stored in ascending type-index order.
    #[inline]
    #[must_use]
    pub fn rank(&self, index: usize) -> usize {
        let word = index / 64;
        let mut rank: usize = self.words[..word]
            .iter()
            .map(|w| w.count_ones() as usize)
            .sum();
        let bit = index % 64;
        if bit > 0 {
            rank += (self.words[word] & ((1u64 << bit) - 1)).count_ones() as usize;
        }
        rank
    }

    /// Iterates set bit indices in ascending order.
    #[inline]
    #[must_use]
    pub fn iter(&self) -> BitIter {
        BitIter {
            words: self.words,
            word: 0,
        }
    }
}

impl fmt::Debug for BitSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Iterator over set bits of a [`BitSet`].
pub struct BitIter {
    words: [u64; WORDS],
    word: usize,
}

impl Iterator for BitIter {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        while self.word < WORDS {
            let bits = self.words[self.word];
            if bits != 0 {
                let bit = bits.trailing_zeros() as usize;
                // Clear lowest set bit
                self.words[self.word] = bits & (bits - 1);
                return Some(self.word * 64 + bit);
            }
            self.word += 1;
        }
        None
    }
}

// ============================================================================
// COMPONENT TYPES
// ============================================================================

/// Set of component types.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ComponentTypes(BitSet);

impl ComponentTypes {
    /// The empty set.
    pub const EMPTY: Self = Self(BitSet::EMPTY);

    /// Set containing component `T`, registering it on first use.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self::EMPTY.with::<T>()
    }

    /// Returns a copy with component `T` added.
    #[must_use]
    pub fn with<T: Component>(mut self) -> Self {
        self.add(schema::component_type::<T>());
        self
    }

    /// Adds a component type.
    #[inline]
    pub fn add(&mut self, ty: ComponentType) {
        self.0.set(ty.index());
    }

    /// Removes a component type.
    #[inline]
    pub fn remove(&mut self, ty: ComponentType) {
        self.0.clear(ty.index());
    }

    /// Returns true if the set contains `ty`.
    #[inline]
    #[must_use]
    pub fn has(&self, ty: ComponentType) -> bool {
        self.0.has(ty.index())
    }

    /// Returns true if every type of `other` is in `self`.
    #[inline]
    #[must_use]
    pub fn contains_all(&self, other: &Self) -> bool {
        self.0.contains_all(&other.0)
    }

    /// Returns true if any type of `other` is in `self`.
    #[inline]
    #[must_use]
    pub fn contains_any(&self, other: &Self) -> bool {
        self.0.intersects(&other.0)
    }

    /// Union of both sets.
    #[inline]
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0))
    }

    /// Number of component types.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.count()
    }

    /// Returns true if the set is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Column position of `ty` within an archetype holding this set.
    #[inline]
    #[must_use]
    pub fn position(&self, ty: ComponentType) -> Option<usize> {
        self.has(ty).then(|| self.0.rank(ty.index()))
    }

    /// Iterates component types in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = ComponentType> {
        self.0.iter().map(ComponentType::from_index)
    }
}

impl FromIterator<ComponentType> for ComponentTypes {
    fn from_iter<I: IntoIterator<Item = ComponentType>>(iter: I) -> Self {
        let mut types = Self::EMPTY;
        for ty in iter {
            types.add(ty);
        }
        types
    }
}

impl fmt::Debug for ComponentTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Components: [")?;
        for (n, ty) in self.iter().enumerate() {
            if n > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", schema::component_name(ty))?;
        }
        write!(f, "]")
    }
}

// ============================================================================
// TAGS
// ============================================================================

/// Set of tag types.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Tags(BitSet);

impl Tags {
    /// The empty set.
    pub const EMPTY: Self = Self(BitSet::EMPTY);

    /// Set containing tag `T`, registering it on first use.
    #[must_use]
    pub fn of<T: Tag>() -> Self {
        Self::EMPTY.with::<T>()
    }

    /// Returns a copy with tag `T` added.
    #[must_use]
    pub fn with<T: Tag>(mut self) -> Self {
        self.add(schema::tag_type::<T>());
        self
    }

    /// Adds a tag type.
    #[inline]
    pub fn add(&mut self, ty: TagType) {
        self.0.set(ty.index());
    }

    /// Removes a tag type.
    #[inline]
    pub fn remove(&mut self, ty: TagType) {
        self.0.clear(ty.index());
    }

    /// Returns true if the set contains `ty`.
    #[inline]
    #[must_use]
    pub fn has(&self, ty: TagType) -> bool {
        self.0.has(ty.index())
    }

    /// Returns true if the set contains tag `T`.
    #[must_use]
    pub fn has_tag<T: Tag>(&self) -> bool {
        self.has(schema::tag_type::<T>())
    }

    /// Returns true if every tag of `other` is in `self`.
    #[inline]
    #[must_use]
    pub fn contains_all(&self, other: &Self) -> bool {
        self.0.contains_all(&other.0)
    }

    /// Returns true if any tag of `other` is in `self`.
    #[inline]
    #[must_use]
    pub fn contains_any(&self, other: &Self) -> bool {
        self.0.intersects(&other.0)
    }

    /// Union of both sets.
    #[inline]
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self(self.0.union(&other.0))
    }

    /// Tags of `self` not in `other`.
    #[inline]
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        Self(self.0.difference(&other.0))
    }

    /// Number of tags.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.count()
    }

    /// Returns true if the set is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates tag types in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = TagType> {
        self.0.iter().map(TagType::from_index)
    }
}

impl FromIterator<TagType> for Tags {
    fn from_iter<I: IntoIterator<Item = TagType>>(iter: I) -> Self {
        let mut tags = Self::EMPTY;
        for ty in iter {
            tags.add(ty);
        }
        tags
    }
}

impl fmt::Debug for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tags: [")?;
        for (n, ty) in self.iter().enumerate() {
            if n > 0 {
                write!(f, ", ")?;
            }
            write!(f, "#{}", schema::tag_name(ty))?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitset_set_clear() {
        let mut bits = BitSet::EMPTY;
        bits.set(3);
        bits.set(130);
        assert!(bits.has(3));
        assert!(bits.has(130));
        assert!(!bits.has(4));
        assert_eq!(bits.count(), 2);

        bits.clear(3);
        assert!(!bits.has(3));
        assert_eq!(bits.count(), 1);
    }

    #[test]
    fn test_bitset_iter_ascending() {
        let mut bits = BitSet::EMPTY;
        for i in [200, 5, 64, 63, 0] {
            bits.set(i);
        }
        let collected: Vec<usize> = bits.iter().collect();
        assert_eq!(collected, vec![0, 5, 63, 64, 200]);
    }

    #[test]
    fn test_bitset_rank() {
        let mut bits = BitSet::EMPTY;
        for i in [1, 7, 70, 140] {
            bits.set(i);
        }
        assert_eq!(bits.rank(1), 0);
        assert_eq!(bits.rank(7), 1);
        assert_eq!(bits.rank(70), 2);
        assert_eq!(bits.rank(140), 3);
        assert_eq!(bits.rank(255), 4);
    }

    #[test]
    fn test_bitset_contains_and_intersects() {
        let mut a = BitSet::EMPTY;
        a.set(1);
        a.set(2);
        let mut b = BitSet::EMPTY;
        b.set(2);

        assert!(a.contains_all(&b));
        assert!(!b.contains_all(&a));
        assert!(a.intersects(&b));
        assert!(a.contains_all(&BitSet::EMPTY));
        assert!(!a.intersects(&BitSet::EMPTY));
        assert_eq!(a.difference(&b).count(), 1);
        assert_eq!(b.union(&a), a);
    }
}
