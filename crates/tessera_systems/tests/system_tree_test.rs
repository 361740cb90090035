//! Integration tests for system tree mutations and their events.

use std::cell::RefCell;
use std::rc::Rc;

use tessera_core::{EntityStore, Position};
use tessera_systems::{QueryContext, QuerySystem, SystemError, SystemId, SystemRoot};

#[derive(Default)]
struct TestSystem1;

impl QuerySystem for TestSystem1 {
    type Data = (Position,);

    fn on_update(&mut self, _ctx: &mut QueryContext<'_, Self::Data>) {}
}

fn record_events(root: &mut SystemRoot) -> Rc<RefCell<Vec<String>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    root.on_system_changed(move |changed| sink.borrow_mut().push(changed.to_string()));
    log
}

#[test]
fn test_move_groups() {
    let mut root = SystemRoot::new("base");
    let log = record_events(&mut root);

    let group1 = root.add_group(SystemId::ROOT, "group1").unwrap();
    let group2 = root.add_group(SystemId::ROOT, "group2").unwrap();
    let group3 = root.add_group(SystemId::ROOT, "group3").unwrap();

    assert_eq!(root.move_system_to(group1, group3, -1), Ok(0));
    assert_eq!(root.move_system_to(group2, group3, 1), Ok(1));
    assert_eq!(root.move_system_to(group1, group3, 2), Ok(1));

    assert_eq!(root.child_systems(SystemId::ROOT), Ok(&[group3][..]));
    assert_eq!(root.child_systems(group3), Ok(&[group2, group1][..]));

    assert_eq!(
        *log.borrow(),
        vec![
            "Add - Group 'group1' to 'base'".to_owned(),
            "Add - Group 'group2' to 'base'".to_owned(),
            "Add - Group 'group3' to 'base'".to_owned(),
            "Move - Group 'group1' from 'base' to 'group3'".to_owned(),
            "Move - Group 'group2' from 'base' to 'group3'".to_owned(),
            "Move - Group 'group1' from 'group3' to 'group3'".to_owned(),
        ]
    );
}

#[test]
fn test_move_returns_actual_index() {
    let mut root = SystemRoot::new("base");
    let ids: Vec<SystemId> = (0..4)
        .map(|i| root.add_group(SystemId::ROOT, format!("g{i}")).unwrap())
        .collect();

    let index = root.move_system_to(ids[0], SystemId::ROOT, 3).unwrap();
    assert_eq!(root.child_systems(SystemId::ROOT).unwrap()[index], ids[0]);
    assert_eq!(root.child_systems(SystemId::ROOT), Ok(&[ids[1], ids[2], ids[0], ids[3]][..]));

    let index = root.move_system_to(ids[3], SystemId::ROOT, 0).unwrap();
    assert_eq!(index, 0);
    assert_eq!(root.child_systems(SystemId::ROOT), Ok(&[ids[3], ids[1], ids[2], ids[0]][..]));
}

#[test]
fn test_move_errors() {
    let mut root = SystemRoot::new("base");
    let group1 = root.add_group(SystemId::ROOT, "group1").unwrap();
    let group2 = root.create_group("group2");

    let err = root.move_system_to(group1, SystemId::ROOT, -2).unwrap_err();
    assert_eq!(err.to_string(), "invalid index: -2");

    let err = root.move_system_to(group1, SystemId::ROOT, 2).unwrap_err();
    assert_eq!(err.to_string(), "invalid index: 2");

    let err = root.move_system_to(group2, SystemId::ROOT, -1).unwrap_err();
    assert_eq!(err.to_string(), "System 'group2' has no parent");

    let leaf = root.add_system(group1, TestSystem1).unwrap();
    assert_eq!(
        root.move_system_to(group1, leaf, -1),
        Err(SystemError::NotAGroup("TestSystem1".to_owned()))
    );
}

#[test]
fn test_remove_system_event() {
    let mut root = SystemRoot::new("base");
    let system = root.add_system(SystemId::ROOT, TestSystem1).unwrap();
    let log = record_events(&mut root);

    root.remove(system).unwrap();

    assert_eq!(*log.borrow(), vec!["Remove - System 'TestSystem1' from 'base'".to_owned()]);
    assert!(root.parent(system).is_none());
    assert!(matches!(root.remove(system), Err(SystemError::NoParent(_))));
}

#[test]
fn test_update_event_fields() {
    let mut root = SystemRoot::new("base");
    let system = root.add_system(SystemId::ROOT, TestSystem1).unwrap();
    let log = record_events(&mut root);

    root.set_enabled(system, false).unwrap();

    assert_eq!(
        *log.borrow(),
        vec!["Update - System 'TestSystem1' field: enabled, value: false".to_owned()]
    );
}

#[test]
fn test_removed_listener_not_called() {
    let mut root = SystemRoot::new("base");
    let calls = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&calls);
    let listener = root.on_system_changed(move |_| *sink.borrow_mut() += 1);

    root.add_group(SystemId::ROOT, "first").unwrap();
    assert!(root.remove_system_changed(listener));
    root.add_group(SystemId::ROOT, "second").unwrap();

    assert_eq!(*calls.borrow(), 1);
    assert!(!root.remove_system_changed(listener));
}

#[test]
fn test_detach_unbinds_and_reattach_binds() {
    let store = EntityStore::new().into_shared();
    let mut root = SystemRoot::with_store("base", &store);
    let group = root.add_group(SystemId::ROOT, "group").unwrap();
    let system = root.add_system(group, TestSystem1).unwrap();
    assert_eq!(root.query_count(system), Ok(1));

    root.remove(group).unwrap();
    assert_eq!(root.query_count(system), Ok(0));

    root.add(SystemId::ROOT, group).unwrap();
    assert_eq!(root.query_count(system), Ok(1));

    let detached = root.create_group("detached");
    root.move_system_to(system, detached, -1).unwrap();
    assert_eq!(root.query_count(system), Ok(0));
    assert!(!root.is_attached(system));
}
