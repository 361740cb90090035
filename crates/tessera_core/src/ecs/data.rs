//! Key-value form of an entity, for persistence layers.
//!
//! Components are keyed by their persistence key and stored as TOML values;
//! tags by name. Only components registered with
//! [`register_serde_component`](crate::schema::register_serde_component)
//! take part.

use serde::{Deserialize, Serialize};

use crate::bits::{ComponentTypes, Tags};
use crate::error::{EcsError, EcsResult};
use crate::schema;

use super::entity::Entity;
use super::store::EntityStore;

/// Serializable snapshot of one entity.
///
/// ```toml
/// id = 12
/// tags = ["Disabled"]
///
/// [components]
/// pos = { x = 1.0, y = 2.0, z = 3.0 }
/// name = "hero"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityData {
    /// Entity id.
    pub id: u32,
    /// Component values keyed by component key.
    #[serde(default)]
    pub components: toml::Table,
    /// Tag names.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl EntityStore {
    /// Exports an entity's serializable components and its tags.
    ///
    /// Returns `Ok(None)` for absent entities.
    ///
    /// # Errors
    ///
    /// `Serialization` if a component value cannot be represented as TOML.
    pub fn read_entity_data(&self, entity: Entity) -> EcsResult<Option<EntityData>> {
        let Some(location) = self.location(entity) else {
            return Ok(None);
        };
        let archetype = &self.archetypes()[location.archetype.index()];

        let mut components = toml::Table::new();
        for ty in archetype.component_types().iter() {
            let Some(column) = archetype.column(ty) else {
                continue;
            };
            if let Some((key, value)) = schema::column_value(ty, column, location.row)? {
                components.insert(key, value);
            }
        }

        Ok(Some(EntityData {
            id: entity.id(),
            components,
            tags: archetype.tags().iter().map(schema::tag_name).collect(),
        }))
    }

    /// Creates or overwrites the entity `data.id` from its key-value form.
    ///
    /// Components missing from `data` are removed unless listed in
    /// `preserve`. Tags are replaced by `data.tags`.
    ///
    /// # Errors
    ///
    /// `UnknownComponentKey`, `UnknownTagName` or `Serialization` if `data`
    /// cannot be converted. Conversion happens before any change, so the
    /// store is untouched on error.
    pub fn write_entity_data(&mut self, data: &EntityData, preserve: &ComponentTypes) -> EcsResult<Entity> {
        let values = data
            .components
            .iter()
            .map(|(key, value)| schema::value_to_component(key, value.clone()))
            .collect::<EcsResult<Vec<_>>>()?;
        let tags = data
            .tags
            .iter()
            .map(|name| schema::tag_by_name(name).ok_or_else(|| EcsError::UnknownTagName(name.clone())))
            .collect::<EcsResult<Tags>>()?;

        let mut entity = self.get_entity_by_id(data.id);
        if entity.is_null() {
            entity = self.create_entity_with_id(data.id)?;
        }

        let mut keep = *preserve;
        for (ty, value) in values {
            keep.add(ty);
            self.add_component_boxed(entity, ty, value)?;
        }
        for ty in self.entity_components(entity).iter() {
            if !keep.has(ty) {
                self.remove_component_type(entity, ty);
            }
        }

        let current = self.entity_tags(entity);
        self.remove_tags(entity, &current.difference(&tags));
        self.add_tags(entity, &tags.difference(&current));
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::{Disabled, EntityName, Position, Scale3};
    use crate::schema::Component;

    struct Scratch(#[allow(dead_code)] u8);
    impl Component for Scratch {}

    #[test]
    fn test_read_entity_data() {
        let mut store = EntityStore::new();
        let entity = store
            .create_entity_with((Position::new(1.0, 2.0, 3.0), EntityName::new("hero"), Scratch(1)))
            .unwrap();
        store.add_tag::<Disabled>(entity);

        let data = store.read_entity_data(entity).unwrap().unwrap();

        assert_eq!(data.id, entity.id());
        assert_eq!(data.components.len(), 2);
        assert_eq!(data.components["name"].as_str(), Some("hero"));
        assert_eq!(data.components["pos"]["y"].as_float(), Some(2.0));
        assert_eq!(data.tags, vec!["Disabled".to_owned()]);
    }

    #[test]
    fn test_copy_between_stores() {
        let mut source = EntityStore::new();
        let entity = source
            .create_entity_with((Position::new(4.0, 5.0, 6.0), Scale3::new(2.0, 2.0, 2.0)))
            .unwrap();
        let data = source.read_entity_data(entity).unwrap().unwrap();

        let mut target = EntityStore::new();
        let copy = target.write_entity_data(&data, &ComponentTypes::EMPTY).unwrap();

        assert_eq!(copy.id(), entity.id());
        assert_eq!(target.get_component::<Position>(copy), Some(&Position::new(4.0, 5.0, 6.0)));
        assert_eq!(target.get_component::<Scale3>(copy), Some(&Scale3::new(2.0, 2.0, 2.0)));
    }

    #[test]
    fn test_write_removes_unlisted_unless_preserved() {
        let mut store = EntityStore::new();
        let entity = store
            .create_entity_with((Position::default(), Scale3::default(), EntityName::new("old")))
            .unwrap();
        store.add_tag::<Disabled>(entity);

        let mut data = EntityData {
            id: entity.id(),
            ..EntityData::default()
        };
        data.components
            .insert("name".to_owned(), toml::Value::String("new".to_owned()));

        store
            .write_entity_data(&data, &ComponentTypes::of::<Scale3>())
            .unwrap();

        assert_eq!(store.get_component::<EntityName>(entity), Some(&EntityName::new("new")));
        assert!(store.has_component::<Scale3>(entity));
        assert!(!store.has_component::<Position>(entity));
        assert!(!store.has_tag::<Disabled>(entity));
    }

    #[test]
    fn test_unknown_key_leaves_store_untouched() {
        let mut store = EntityStore::new();
        let mut data = EntityData {
            id: 9,
            ..EntityData::default()
        };
        data.components
            .insert("no-such-key".to_owned(), toml::Value::Integer(1));

        let err = store.write_entity_data(&data, &ComponentTypes::EMPTY).unwrap_err();

        assert_eq!(err, EcsError::UnknownComponentKey("no-such-key".to_owned()));
        assert_eq!(store.entity_count(), 0);
    }

    #[test]
    fn test_unknown_tag_name() {
        let mut store = EntityStore::new();
        let data = EntityData {
            id: 3,
            components: toml::Table::new(),
            tags: vec!["NoSuchTag".to_owned()],
        };
        let err = store.write_entity_data(&data, &ComponentTypes::EMPTY).unwrap_err();
        assert_eq!(err, EcsError::UnknownTagName("NoSuchTag".to_owned()));
    }

    #[test]
    fn test_absent_entity_reads_none() {
        let store = EntityStore::new();
        assert_eq!(store.read_entity_data(Entity::from_id(5)), Ok(None));
    }
}
