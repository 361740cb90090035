//! Component bundles: tuples of components written in one step.

use crate::bits::ComponentTypes;
use crate::schema::Component;

use super::archetype::Archetype;

/// A set of components an entity is created with.
///
/// Implemented for tuples of up to six components. A bundle naming the
/// same type twice is rejected by
/// [`EntityStore::create_entity_with`](crate::EntityStore::create_entity_with).
pub trait Bundle {
    /// Number of elements in the tuple.
    const COUNT: usize;

    /// Component types of the bundle.
    fn component_types() -> ComponentTypes;

    /// Pushes every value onto its column in `archetype`.
    fn write(self, archetype: &mut Archetype);
}

macro_rules! impl_bundle {
    ($($T:ident $v:ident),+) => {
        impl<$($T: Component),+> Bundle for ($($T,)+) {
            const COUNT: usize = [$(stringify!($T)),+].len();

            fn component_types() -> ComponentTypes {
                ComponentTypes::EMPTY$(.with::<$T>())+
            }

            fn write(self, archetype: &mut Archetype) {
                let ($($v,)+) = self;
                $(archetype.push_value($v);)+
            }
        }
    };
}

impl_bundle!(A a);
impl_bundle!(A a, B b);
impl_bundle!(A a, B b, C c);
impl_bundle!(A a, B b, C c, D d);
impl_bundle!(A a, B b, C c, D d, E e);
impl_bundle!(A a, B b, C c, D d, E e, F f);
