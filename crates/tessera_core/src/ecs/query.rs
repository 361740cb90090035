//! # Archetype Queries
//!
//! A query caches the archetypes matching its filter and yields their
//! columns as slices. One chunk is produced per matching non-empty
//! archetype:
//!
//! ```text
//! query (Position, Scale3)
//!   chunk 0: Position[..n0] Scale3[..n0] entities[..n0]   <- [P, S]
//!   chunk 1: Position[..n1] Scale3[..n1] entities[..n1]   <- [P, S, N]
//! ```
//!
//! Archetypes created after the query are picked up on the next call; only
//! the new ones are checked.

use std::marker::PhantomData;
use std::slice::IterMut;

use crate::bits::{ComponentTypes, Tags};
use crate::schema::Component;

use super::archetype::{Archetype, ArchetypeId};
use super::component::Disabled;
use super::entity::Entity;
use super::storage::{Column, ComponentStorage};
use super::store::EntityStore;

/// Component tuple fetched by a query.
///
/// Implemented for tuples of one to five distinct component types.
pub trait QueryData: 'static {
    /// Number of elements in the tuple.
    const COUNT: usize;

    /// One mutable slice per component, e.g. `(&mut [Position], &mut [Scale3])`.
    type Slices<'a>;

    /// One mutable reference per component for a single row.
    type Item<'a>;

    /// Row iterator over a chunk's slices.
    type Iter<'a>: Iterator<Item = Self::Item<'a>>;

    /// Component types the query requires.
    fn component_types() -> ComponentTypes;

    /// Borrows the query's columns out of an archetype's column list.
    fn fetch(columns: &mut [Box<dyn Column>]) -> Option<Self::Slices<'_>>;

    /// Turns a chunk's slices into a row iterator.
    fn rows(slices: Self::Slices<'_>) -> Self::Iter<'_>;
}

/// Zips the row iterators of a tuple of slices.
pub struct Rows<I>(I);

macro_rules! impl_query_data {
    ($($T:ident $v:ident),+) => {
        impl<$($T: Component),+> QueryData for ($($T,)+) {
            const COUNT: usize = [$(stringify!($T)),+].len();

            type Slices<'a> = ($(&'a mut [$T],)+);
            type Item<'a> = ($(&'a mut $T,)+);
            type Iter<'a> = Rows<($(IterMut<'a, $T>,)+)>;

            fn component_types() -> ComponentTypes {
                ComponentTypes::EMPTY$(.with::<$T>())+
            }

            fn fetch(columns: &mut [Box<dyn Column>]) -> Option<Self::Slices<'_>> {
                $(let mut $v = None;)+
                for column in columns.iter_mut() {
                    let any = column.as_any_mut();
                    $(
                        if $v.is_none() && any.is::<ComponentStorage<$T>>() {
                            $v = any
                                .downcast_mut::<ComponentStorage<$T>>()
                                .map(ComponentStorage::as_mut_slice);
                            continue;
                        }
                    )+
                }
                Some(($($v?,)+))
            }

            fn rows(slices: Self::Slices<'_>) -> Self::Iter<'_> {
                let ($($v,)+) = slices;
                Rows(($($v.iter_mut(),)+))
            }
        }

        impl<'a, $($T: Component),+> Iterator for Rows<($(IterMut<'a, $T>,)+)> {
            type Item = ($(&'a mut $T,)+);

            #[inline]
            fn next(&mut self) -> Option<Self::Item> {
                let ($($v,)+) = &mut self.0;
                Some(($($v.next()?,)+))
            }
        }
    };
}

impl_query_data!(A a);
impl_query_data!(A a, B b);
impl_query_data!(A a, B b, C c);
impl_query_data!(A a, B b, C c, D d);
impl_query_data!(A a, B b, C c, D d, E e);

/// Archetype filter beyond the fetched components.
///
/// Archetypes tagged [`Disabled`] are excluded unless
/// [`with_disabled`](Self::with_disabled) is set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueryFilter {
    all_components: ComponentTypes,
    without_components: ComponentTypes,
    all_tags: Tags,
    without_tags: Tags,
    include_disabled: bool,
}

impl QueryFilter {
    /// Filter that only applies the default `Disabled` exclusion.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires components that are not fetched.
    #[must_use]
    pub fn all_components(mut self, types: ComponentTypes) -> Self {
        self.all_components = types;
        self
    }

    /// Excludes archetypes having any of `types`.
    #[must_use]
    pub fn without_any_components(mut self, types: ComponentTypes) -> Self {
        self.without_components = types;
        self
    }

    /// Requires every tag of `tags`.
    #[must_use]
    pub fn all_tags(mut self, tags: Tags) -> Self {
        self.all_tags = tags;
        self
    }

    /// Excludes archetypes having any of `tags`.
    #[must_use]
    pub fn without_any_tags(mut self, tags: Tags) -> Self {
        self.without_tags = tags;
        self
    }

    /// Includes archetypes tagged `Disabled`.
    #[must_use]
    pub fn with_disabled(mut self) -> Self {
        self.include_disabled = true;
        self
    }

    /// Returns true if disabled entities are included.
    #[must_use]
    pub const fn includes_disabled(&self) -> bool {
        self.include_disabled
    }

    fn matches(&self, required: &ComponentTypes, archetype: &Archetype) -> bool {
        let components = archetype.component_types();
        let tags = archetype.tags();
        components.contains_all(required)
            && !components.contains_any(&self.without_components)
            && tags.contains_all(&self.all_tags)
            && !tags.contains_any(&self.without_tags)
            && (self.include_disabled || !tags.has_tag::<Disabled>())
    }
}

/// Cached query over one store.
///
/// # Example
///
/// ```rust,ignore
/// let mut query = store.query::<(Position, Scale3)>();
/// for chunk in query.chunks(&mut store) {
///     let (positions, scales) = chunk.components;
///     for (pos, scale) in positions.iter_mut().zip(scales.iter()) {
///         pos.x *= scale.x;
///     }
/// }
/// ```
pub struct ArchetypeQuery<Q: QueryData> {
    store_id: u64,
    filter: QueryFilter,
    required: ComponentTypes,
    /// Ascending archetype ids.
    matched: Vec<ArchetypeId>,
    /// Archetypes already tested against the filter.
    checked: usize,
    /// A query naming a type twice can never fetch disjoint slices.
    valid: bool,
    _marker: PhantomData<fn() -> Q>,
}

impl<Q: QueryData> ArchetypeQuery<Q> {
    /// Creates a query bound to `store`.
    #[must_use]
    pub fn new(store: &EntityStore, filter: QueryFilter) -> Self {
        let types = Q::component_types();
        let valid = types.len() == Q::COUNT;
        if !valid {
            tracing::warn!(?types, "query names a component twice and matches nothing");
        }
        let mut query = Self {
            store_id: store.id(),
            filter,
            required: types.union(&filter.all_components),
            matched: Vec::new(),
            checked: 0,
            valid,
            _marker: PhantomData,
        };
        query.refresh(store);
        query
    }

    /// Id of the store the query belongs to.
    #[inline]
    #[must_use]
    pub const fn store_id(&self) -> u64 {
        self.store_id
    }

    /// The query's filter.
    #[inline]
    #[must_use]
    pub const fn filter(&self) -> &QueryFilter {
        &self.filter
    }

    /// Fetched component types.
    #[must_use]
    pub fn component_types(&self) -> ComponentTypes {
        Q::component_types()
    }

    /// Tests archetypes created since the last refresh.
    ///
    /// # Panics
    ///
    /// If `store` is not the store the query was created for.
    pub fn refresh(&mut self, store: &EntityStore) {
        assert_eq!(
            self.store_id,
            store.id(),
            "query of store {} used with store {}",
            self.store_id,
            store.id()
        );
        let archetypes = store.archetypes();
        if !self.valid {
            self.checked = archetypes.len();
            return;
        }
        for archetype in &archetypes[self.checked..] {
            if self.filter.matches(&self.required, archetype) {
                self.matched.push(archetype.id());
            }
        }
        self.checked = archetypes.len();
    }

    /// Chunks of all matching non-empty archetypes.
    ///
    /// # Panics
    ///
    /// If `store` is not the query's store.
    pub fn chunks<'a>(&'a mut self, store: &'a mut EntityStore) -> Chunks<'a, Q> {
        self.refresh(store);
        Chunks {
            archetypes: store.archetypes_mut().iter_mut().enumerate(),
            matched: self.matched.iter(),
            _marker: PhantomData,
        }
    }

    /// Every matching entity with mutable references to its components.
    pub fn iter<'a>(&'a mut self, store: &'a mut EntityStore) -> QueryIter<'a, Q> {
        QueryIter {
            chunks: self.chunks(store),
            current: None,
        }
    }

    /// Calls `f` for every matching entity.
    pub fn for_each_entity<'a, F>(&'a mut self, store: &'a mut EntityStore, mut f: F)
    where
        F: FnMut(Q::Item<'a>, Entity),
    {
        for (item, entity) in self.iter(store) {
            f(item, entity);
        }
    }

    /// Number of entities currently matching.
    pub fn entity_count(&mut self, store: &EntityStore) -> usize {
        self.refresh(store);
        let archetypes = store.archetypes();
        self.matched.iter().map(|id| archetypes[id.index()].len()).sum()
    }

    /// All matching archetypes, including empty ones.
    pub fn matching_archetypes<'a>(&'a mut self, store: &'a EntityStore) -> impl Iterator<Item = &'a Archetype> + 'a {
        self.refresh(store);
        let archetypes = store.archetypes();
        self.matched.iter().map(move |id| &archetypes[id.index()])
    }
}

impl<Q: QueryData> std::fmt::Debug for ArchetypeQuery<Q> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchetypeQuery")
            .field("store", &self.store_id)
            .field("components", &self.required)
            .field("archetypes", &self.matched.len())
            .finish_non_exhaustive()
    }
}

/// Columns of one archetype.
pub struct Chunk<'a, Q: QueryData> {
    /// One slice per query component, all of length [`len`](Self::len).
    pub components: Q::Slices<'a>,
    /// Entity of each row.
    pub entities: &'a [Entity],
}

impl<Q: QueryData> Chunk<'_, Q> {
    /// Number of rows.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Chunks are never empty; provided for completeness.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Iterator over the chunks of a query.
pub struct Chunks<'a, Q: QueryData> {
    archetypes: std::iter::Enumerate<IterMut<'a, Archetype>>,
    matched: std::slice::Iter<'a, ArchetypeId>,
    _marker: PhantomData<fn() -> Q>,
}

impl<'a, Q: QueryData> Iterator for Chunks<'a, Q> {
    type Item = Chunk<'a, Q>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let target = self.matched.next()?.index();
            let archetype = loop {
                let (index, archetype) = self.archetypes.next()?;
                if index == target {
                    break archetype;
                }
            };
            if archetype.is_empty() {
                continue;
            }
            let (columns, entities) = archetype.split_mut();
            let Some(components) = Q::fetch(columns) else {
                continue;
            };
            return Some(Chunk { components, entities });
        }
    }
}

/// Flattened row iterator of a query.
pub struct QueryIter<'a, Q: QueryData> {
    chunks: Chunks<'a, Q>,
    current: Option<(Q::Iter<'a>, std::slice::Iter<'a, Entity>)>,
}

impl<'a, Q: QueryData> Iterator for QueryIter<'a, Q> {
    type Item = (Q::Item<'a>, Entity);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((rows, entities)) = &mut self.current {
                if let (Some(item), Some(&entity)) = (rows.next(), entities.next()) {
                    return Some((item, entity));
                }
            }
            let chunk = self.chunks.next()?;
            self.current = Some((Q::rows(chunk.components), chunk.entities.iter()));
        }
    }
}

impl EntityStore {
    /// Creates a query over this store with the default filter.
    #[must_use]
    pub fn query<Q: QueryData>(&self) -> ArchetypeQuery<Q> {
        ArchetypeQuery::new(self, QueryFilter::default())
    }

    /// Creates a query over this store with `filter`.
    #[must_use]
    pub fn query_filtered<Q: QueryData>(&self, filter: QueryFilter) -> ArchetypeQuery<Q> {
        ArchetypeQuery::new(self, filter)
    }
}
