//! TOML persistence of a system tree.
//!
//! ```toml
//! type = "SystemGroup"
//! name = "Systems"
//!
//! [[children]]
//! type = "SystemGroup"
//! name = "Update"
//!
//! [[children.children]]
//! type = "Game.MoveSystem"
//! name = "MoveSystem"
//! enabled = false
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{SystemError, SystemResult};
use crate::registry::SystemTypeRegistry;
use crate::root::{SystemId, SystemRoot};

const fn enabled_default() -> bool {
    true
}

/// Persisted form of a system and its subtree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemTree {
    /// Registry key of the system type.
    #[serde(rename = "type")]
    pub type_key: String,
    /// Display name.
    pub name: String,
    /// Whether the system takes part in updates.
    #[serde(default = "enabled_default")]
    pub enabled: bool,
    /// Children of a group, in update order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SystemTree>,
}

impl SystemTree {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// `InvalidTree` on parse errors.
    pub fn from_toml_str(source: &str) -> SystemResult<Self> {
        toml::from_str(source).map_err(|e| SystemError::InvalidTree(e.to_string()))
    }

    /// Renders the tree as a TOML document.
    ///
    /// # Errors
    ///
    /// `InvalidTree` if serialization fails.
    pub fn to_toml_string(&self) -> SystemResult<String> {
        toml::to_string(self).map_err(|e| SystemError::InvalidTree(e.to_string()))
    }
}

impl SystemRoot {
    /// Snapshot of the whole tree.
    #[must_use]
    pub fn write_tree(&self) -> SystemTree {
        self.write_subtree(SystemId::ROOT).unwrap_or_else(|| SystemTree {
            type_key: String::new(),
            name: String::new(),
            enabled: true,
            children: Vec::new(),
        })
    }

    fn write_subtree(&self, id: SystemId) -> Option<SystemTree> {
        let node = self.node(id).ok()?;
        Some(SystemTree {
            type_key: node.type_key.clone(),
            name: node.name.clone(),
            enabled: node.enabled,
            children: node.children.iter().filter_map(|&child| self.write_subtree(child)).collect(),
        })
    }

    /// Replaces the root's subtree with `tree`. The root takes the name and
    /// enabled flag of `tree`; its previous children are destroyed.
    ///
    /// Systems of unknown type are skipped together with their children.
    ///
    /// # Errors
    ///
    /// Only internal tree errors; unknown types are logged, not returned.
    pub fn read_tree(&mut self, tree: &SystemTree, registry: &SystemTypeRegistry) -> SystemResult<()> {
        let old: Vec<SystemId> = self.child_systems(SystemId::ROOT)?.to_vec();
        for child in old {
            self.destroy(child)?;
        }

        self.set_name(SystemId::ROOT, tree.name.clone())?;
        self.set_enabled(SystemId::ROOT, tree.enabled)?;

        for child in &tree.children {
            if let Some(id) = self.read_subtree(child, registry)? {
                self.add(SystemId::ROOT, id)?;
            }
        }
        tracing::debug!(systems = self.system_count(), "system tree loaded");
        Ok(())
    }

    fn read_subtree(&mut self, tree: &SystemTree, registry: &SystemTypeRegistry) -> SystemResult<Option<SystemId>> {
        let id = match registry.create(self, &tree.type_key) {
            Ok(id) => id,
            Err(SystemError::UnknownSystemType(key)) => {
                tracing::warn!(type_key = %key, name = %tree.name, "skipping system of unknown type");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let node = self.node_mut(id)?;
        node.name.clone_from(&tree.name);
        node.enabled = tree.enabled;
        let is_group = node.is_group;

        if !is_group && !tree.children.is_empty() {
            tracing::warn!(name = %tree.name, "ignoring children of a leaf system");
            return Ok(Some(id));
        }
        for child in &tree.children {
            if let Some(child_id) = self.read_subtree(child, registry)? {
                self.add(id, child_id)?;
            }
        }
        Ok(Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_defaults_to_true() {
        let tree = SystemTree::from_toml_str(
            r#"
            type = "SystemGroup"
            name = "Systems"

            [[children]]
            type = "SystemGroup"
            name = "Update"
            "#,
        )
        .unwrap();
        assert!(tree.enabled);
        assert!(tree.children[0].enabled);
        assert!(tree.children[0].children.is_empty());
    }

    #[test]
    fn test_groups_roundtrip() {
        let mut root = SystemRoot::new("Systems");
        let update = root.add_group(SystemId::ROOT, "Update").unwrap();
        root.add_group(update, "Physics").unwrap();
        root.set_enabled(update, false).unwrap();

        let text = root.write_tree().to_toml_string().unwrap();
        let tree = SystemTree::from_toml_str(&text).unwrap();

        let mut copy = SystemRoot::new("other");
        copy.read_tree(&tree, &SystemTypeRegistry::new()).unwrap();

        assert_eq!(copy.write_tree(), root.write_tree());
        assert_eq!(copy.name(SystemId::ROOT), Ok("Systems"));
        let update = copy.find_group("Update", false).unwrap();
        assert_eq!(copy.enabled(update), Ok(false));
    }

    #[test]
    fn test_unknown_type_skipped() {
        let tree = SystemTree {
            type_key: "SystemGroup".to_owned(),
            name: "Systems".to_owned(),
            enabled: true,
            children: vec![
                SystemTree {
                    type_key: "Game.Gone".to_owned(),
                    name: "Gone".to_owned(),
                    enabled: true,
                    children: Vec::new(),
                },
                SystemTree {
                    type_key: "SystemGroup".to_owned(),
                    name: "Kept".to_owned(),
                    enabled: true,
                    children: Vec::new(),
                },
            ],
        };
        let mut root = SystemRoot::new("base");
        root.read_tree(&tree, &SystemTypeRegistry::new()).unwrap();

        assert_eq!(root.child_systems(SystemId::ROOT).unwrap().len(), 1);
        assert!(root.find_group("Kept", false).is_some());
    }

    #[test]
    fn test_read_tree_reports_root_changes() {
        let tree = SystemTree {
            type_key: "SystemGroup".to_owned(),
            name: "Systems".to_owned(),
            enabled: true,
            children: vec![SystemTree {
                type_key: "SystemGroup".to_owned(),
                name: "Update".to_owned(),
                enabled: true,
                children: Vec::new(),
            }],
        };
        let mut root = SystemRoot::new("base");
        root.set_enabled(SystemId::ROOT, false).unwrap();
        let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = std::rc::Rc::clone(&log);
        root.on_system_changed(move |changed| sink.borrow_mut().push(changed.to_string()));

        root.read_tree(&tree, &SystemTypeRegistry::new()).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                "Update - Group 'Systems' field: name, value: Systems".to_owned(),
                "Update - Group 'Systems' field: enabled, value: true".to_owned(),
                "Add - Group 'Update' to 'Systems'".to_owned(),
            ]
        );

        log.borrow_mut().clear();
        root.read_tree(&tree, &SystemTypeRegistry::new()).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                "Remove - Group 'Update' from 'Systems'".to_owned(),
                "Add - Group 'Update' to 'Systems'".to_owned(),
            ]
        );
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            SystemTree::from_toml_str("type = "),
            Err(SystemError::InvalidTree(_))
        ));
    }
}
