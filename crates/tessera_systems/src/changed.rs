//! Notifications about system tree mutations.

use std::fmt;

use crate::root::SystemId;

/// Kind of tree mutation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SystemChangedAction {
    /// System attached to a group.
    Add,
    /// System detached from its group.
    Remove,
    /// System moved to another position or group.
    Move,
    /// A field of the system changed.
    Update,
}

impl fmt::Display for SystemChangedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Add => "Add",
            Self::Remove => "Remove",
            Self::Move => "Move",
            Self::Update => "Update",
        };
        f.write_str(label)
    }
}

/// A tree mutation, fired synchronously by the [`SystemRoot`](crate::SystemRoot).
///
/// Its `Display` form is stable and used for logs and undo labels:
///
/// ```text
/// Add - Group 'group1' to 'base'
/// Remove - System 'TestSystem1' from 'base'
/// Move - Group 'group1' from 'base' to 'group3'
/// Update - System 'TestSystem1' field: enabled, value: false
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemChanged {
    /// What happened.
    pub action: SystemChangedAction,
    /// Affected system.
    pub system: SystemId,
    /// Name of the affected system.
    pub name: String,
    /// Whether the affected system is a group.
    pub is_group: bool,
    /// Parent group after the change, or the group it was removed from.
    pub group: Option<String>,
    /// Previous parent group of a moved system.
    pub old_group: Option<String>,
    /// Changed field of an `Update`.
    pub field: Option<&'static str>,
    /// New value of an `Update`.
    pub value: Option<String>,
}

impl SystemChanged {
    pub(crate) fn new(action: SystemChangedAction, system: SystemId, name: &str, is_group: bool) -> Self {
        Self {
            action,
            system,
            name: name.to_owned(),
            is_group,
            group: None,
            old_group: None,
            field: None,
            value: None,
        }
    }

    pub(crate) fn with_group(mut self, group: &str) -> Self {
        self.group = Some(group.to_owned());
        self
    }

    pub(crate) fn with_old_group(mut self, group: &str) -> Self {
        self.old_group = Some(group.to_owned());
        self
    }

    pub(crate) fn with_field(mut self, field: &'static str, value: impl ToString) -> Self {
        self.field = Some(field);
        self.value = Some(value.to_string());
        self
    }
}

impl fmt::Display for SystemChanged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_group { "Group" } else { "System" };
        let group = self.group.as_deref().unwrap_or("");
        write!(f, "{} - {kind} '{}'", self.action, self.name)?;
        match self.action {
            SystemChangedAction::Add => write!(f, " to '{group}'"),
            SystemChangedAction::Remove => write!(f, " from '{group}'"),
            SystemChangedAction::Move => {
                let old = self.old_group.as_deref().unwrap_or("");
                write!(f, " from '{old}' to '{group}'")
            }
            SystemChangedAction::Update => write!(
                f,
                " field: {}, value: {}",
                self.field.unwrap_or(""),
                self.value.as_deref().unwrap_or("")
            ),
        }
    }
}

/// Handle returned by [`SystemRoot::on_system_changed`](crate::SystemRoot::on_system_changed).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChangedListenerId(u64);

type Callback = Box<dyn FnMut(&SystemChanged)>;

/// Observer list of a root.
#[derive(Default)]
pub(crate) struct ChangedListeners {
    next_id: u64,
    list: Vec<(ChangedListenerId, Callback)>,
}

impl ChangedListeners {
    pub fn add(&mut self, callback: Callback) -> ChangedListenerId {
        self.next_id += 1;
        let id = ChangedListenerId(self.next_id);
        self.list.push((id, callback));
        id
    }

    pub fn remove(&mut self, id: ChangedListenerId) -> bool {
        let before = self.list.len();
        self.list.retain(|(l, _)| *l != id);
        self.list.len() != before
    }

    pub fn notify(&mut self, changed: &SystemChanged) {
        for (_, callback) in &mut self.list {
            callback(changed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_formats() {
        let id = SystemId::ROOT;
        let add = SystemChanged::new(SystemChangedAction::Add, id, "group1", true).with_group("base");
        assert_eq!(add.to_string(), "Add - Group 'group1' to 'base'");

        let remove = SystemChanged::new(SystemChangedAction::Remove, id, "TestSystem1", false).with_group("base");
        assert_eq!(remove.to_string(), "Remove - System 'TestSystem1' from 'base'");

        let moved = SystemChanged::new(SystemChangedAction::Move, id, "group1", true)
            .with_group("group3")
            .with_old_group("base");
        assert_eq!(moved.to_string(), "Move - Group 'group1' from 'base' to 'group3'");

        let update = SystemChanged::new(SystemChangedAction::Update, id, "TestSystem1", false).with_field("enabled", false);
        assert_eq!(update.to_string(), "Update - System 'TestSystem1' field: enabled, value: false");
    }
}
