//! # System Root
//!
//! The system tree lives in an arena owned by [`SystemRoot`]:
//!
//! ```text
//! nodes[0] root "Systems"         children: [1, 4]
//! nodes[1]   group "Update"       children: [2, 3]
//! nodes[2]     MoveSystem         (one query + command buffer per store)
//! nodes[3]     ScaleSystem
//! nodes[4]   group "LateUpdate"   children: []
//! ```
//!
//! Nodes refer to each other by [`SystemId`] only. Destroying a system frees
//! its slot for the next one created; the slot's generation is bumped so the
//! old id stays dead. Systems are created
//! detached and become part of the update cycle once attached below the
//! root. Only attached query systems are bound to the root's stores.

use std::time::Instant;

use tessera_core::{ComponentTypes, SharedStore};

use crate::changed::{ChangedListenerId, ChangedListeners, SystemChanged, SystemChangedAction};
use crate::config::SystemsConfig;
use crate::error::{SystemError, SystemResult};
use crate::perf::SystemPerf;
use crate::registry::{type_key_of, GROUP_TYPE_KEY};
use crate::system::{Behavior, GroupHooks, HookGroup, PlainLeaf, QueryLeaf, QuerySystem, System, SystemContext, UpdateTick};

/// Id of a system within its root: arena slot plus slot generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SystemId {
    slot: u32,
    generation: u32,
}

impl SystemId {
    /// The root group.
    pub const ROOT: Self = Self::new(0, 0);

    const fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    /// Arena slot of the system.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.slot as usize
    }

    /// Raw id (the arena slot).
    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        self.slot
    }

    /// How many systems occupied the slot before this one.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    const fn next_generation(self) -> Self {
        Self::new(self.slot, self.generation.wrapping_add(1))
    }
}

pub(crate) struct Node {
    pub generation: u32,
    pub name: String,
    pub type_key: String,
    pub enabled: bool,
    pub is_group: bool,
    pub parent: Option<SystemId>,
    pub children: Vec<SystemId>,
    /// `None` for plain groups.
    pub behavior: Option<Box<dyn Behavior>>,
    pub perf: SystemPerf,
    pub tick: UpdateTick,
}

/// Owner of a system tree and the stores it updates.
///
/// # Example
///
/// ```rust,ignore
/// let store = EntityStore::new().into_shared();
/// let mut root = SystemRoot::with_store("Systems", &store);
/// let update = root.add_group(SystemId::ROOT, "Update")?;
/// root.add_system(update, MoveSystem::default())?;
///
/// root.update(&UpdateTick::new(0.016, 1.0))?;
/// ```
pub struct SystemRoot {
    /// Destroyed systems leave `None` until the slot is handed out again.
    nodes: Vec<Option<Node>>,
    /// Ids for freed slots, generation already bumped. Reused LIFO.
    free: Vec<SystemId>,
    stores: Vec<SharedStore>,
    config: SystemsConfig,
    listeners: ChangedListeners,
}

impl SystemRoot {
    /// Creates a root with the default configuration and no stores.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), SystemsConfig::default())
    }

    /// Creates a root with the given configuration.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the configuration fails validation.
    pub fn with_config(name: impl Into<String>, config: SystemsConfig) -> SystemResult<Self> {
        config.validate()?;
        Ok(Self::build(name.into(), config))
    }

    /// Creates a root bound to `store`.
    #[must_use]
    pub fn with_store(name: impl Into<String>, store: &SharedStore) -> Self {
        let mut root = Self::new(name);
        root.add_store(store);
        root
    }

    fn build(name: String, config: SystemsConfig) -> Self {
        let root = Node {
            generation: 0,
            name,
            type_key: GROUP_TYPE_KEY.to_owned(),
            enabled: true,
            is_group: true,
            parent: None,
            children: Vec::new(),
            behavior: None,
            perf: SystemPerf::new(config.perf_history),
            tick: UpdateTick::default(),
        };
        Self {
            nodes: vec![Some(root)],
            free: Vec::new(),
            stores: Vec::new(),
            config,
            listeners: ChangedListeners::default(),
        }
    }

    /// Scheduler configuration.
    #[must_use]
    pub const fn config(&self) -> &SystemsConfig {
        &self.config
    }

    /// Number of live systems, including the root.
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.nodes.iter().flatten().count()
    }

    // =========================================================================
    // Creation
    // =========================================================================

    fn insert(&mut self, name: String, type_key: String, is_group: bool, behavior: Option<Box<dyn Behavior>>) -> SystemId {
        #[allow(clippy::cast_possible_truncation)]
        let id = self.free.pop().unwrap_or(SystemId::new(self.nodes.len() as u32, 0));
        if id.index() == self.nodes.len() {
            self.nodes.push(None);
        }
        self.nodes[id.index()] = Some(Node {
            generation: id.generation,
            name,
            type_key,
            enabled: true,
            is_group,
            parent: None,
            children: Vec::new(),
            behavior,
            perf: SystemPerf::new(self.config.perf_history),
            tick: UpdateTick::default(),
        });
        id
    }

    /// Creates a detached plain group.
    pub fn create_group(&mut self, name: impl Into<String>) -> SystemId {
        self.insert(name.into(), GROUP_TYPE_KEY.to_owned(), true, None)
    }

    /// Creates a detached group with custom begin/end hooks.
    pub fn create_group_with<H: GroupHooks>(&mut self, hooks: H) -> SystemId {
        let name = hooks.name();
        self.insert(name, type_key_of::<H>(), true, Some(Box::new(HookGroup(hooks))))
    }

    /// Creates a detached query system.
    pub fn create_system<S: QuerySystem>(&mut self, system: S) -> SystemId {
        let name = system.name();
        self.insert(name, type_key_of::<S>(), false, Some(Box::new(QueryLeaf::new(system))))
    }

    /// Creates a detached plain system.
    pub fn create_plain<S: System>(&mut self, system: S) -> SystemId {
        let name = system.name();
        self.insert(name, type_key_of::<S>(), false, Some(Box::new(PlainLeaf(system))))
    }

    /// Creates a plain group and appends it to `parent`.
    ///
    /// # Errors
    ///
    /// See [`add`](Self::add).
    pub fn add_group(&mut self, parent: SystemId, name: impl Into<String>) -> SystemResult<SystemId> {
        let id = self.create_group(name);
        self.add(parent, id)?;
        Ok(id)
    }

    /// Creates a query system and appends it to `parent`.
    ///
    /// # Errors
    ///
    /// See [`add`](Self::add).
    pub fn add_system<S: QuerySystem>(&mut self, parent: SystemId, system: S) -> SystemResult<SystemId> {
        let id = self.create_system(system);
        self.add(parent, id)?;
        Ok(id)
    }

    // =========================================================================
    // Tree mutation
    // =========================================================================

    /// Appends a detached system to `parent`.
    ///
    /// Query systems below the root are bound to every root store.
    ///
    /// # Errors
    ///
    /// - `NotAGroup` if `parent` is a leaf
    /// - `AlreadyAttached` if `child` has a parent or is the root
    /// - `CycleDetected` if `parent` lies inside `child`'s subtree
    pub fn add(&mut self, parent: SystemId, child: SystemId) -> SystemResult<()> {
        let parent_node = self.node(parent)?;
        if !parent_node.is_group {
            return Err(SystemError::NotAGroup(parent_node.name.clone()));
        }
        let child_node = self.node(child)?;
        if child == SystemId::ROOT || child_node.parent.is_some() {
            return Err(SystemError::AlreadyAttached(child_node.name.clone()));
        }
        if child == parent || self.is_ancestor_of(child, parent) {
            return Err(self.cycle_error(child, parent));
        }

        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        if self.is_attached(parent) {
            self.bind_subtree(child);
        }

        let changed = self.changed(SystemChangedAction::Add, child)?.with_group(&self.node(parent)?.name);
        self.emit(&changed);
        Ok(())
    }

    /// Detaches a system from its parent. It keeps its children.
    ///
    /// # Errors
    ///
    /// `NoParent` if the system is detached (or is the root).
    pub fn remove(&mut self, child: SystemId) -> SystemResult<()> {
        let node = self.node(child)?;
        let Some(parent) = node.parent else {
            return Err(SystemError::NoParent(node.name.clone()));
        };
        if self.is_attached(child) {
            self.unbind_subtree(child);
        }
        self.node_mut(parent)?.children.retain(|&c| c != child);
        self.node_mut(child)?.parent = None;

        let changed = self.changed(SystemChangedAction::Remove, child)?.with_group(&self.node(parent)?.name);
        self.emit(&changed);
        Ok(())
    }

    /// Detaches a system and frees it together with its whole subtree.
    ///
    /// # Errors
    ///
    /// `NoParent` for the root, `SystemNotFound` for stale ids.
    pub fn destroy(&mut self, id: SystemId) -> SystemResult<()> {
        let node = self.node(id)?;
        if id == SystemId::ROOT {
            return Err(SystemError::NoParent(node.name.clone()));
        }
        if node.parent.is_some() {
            self.remove(id)?;
        }
        let mut subtree = vec![id];
        let mut cursor = 0;
        while let Some(&current) = subtree.get(cursor) {
            if let Ok(node) = self.node(current) {
                subtree.extend_from_slice(&node.children);
            }
            cursor += 1;
        }
        tracing::debug!(system = id.id(), count = subtree.len(), "destroying systems");
        for current in subtree {
            self.nodes[current.index()] = None;
            self.free.push(current.next_generation());
        }
        Ok(())
    }

    /// Moves an attached system into `target` at `index`.
    ///
    /// `index` is the insert position before removal; `-1` appends. When
    /// moving later within the same group the position shifts down by one.
    ///
    /// # Returns
    ///
    /// The actual index of the system in `target`.
    ///
    /// # Errors
    ///
    /// - `NotAGroup` if `target` is a leaf
    /// - `InvalidIndex` unless `-1 <= index <= child_count(target)`
    /// - `NoParent` if the system is detached
    /// - `CycleDetected` if `target` is the system or one of its descendants
    pub fn move_system_to(&mut self, system: SystemId, target: SystemId, index: i32) -> SystemResult<usize> {
        let target_node = self.node(target)?;
        if !target_node.is_group {
            return Err(SystemError::NotAGroup(target_node.name.clone()));
        }
        let child_count = i32::try_from(target_node.children.len()).unwrap_or(i32::MAX);
        if index < -1 || index > child_count {
            return Err(SystemError::InvalidIndex(index));
        }
        let node = self.node(system)?;
        let Some(old_parent) = node.parent else {
            return Err(SystemError::NoParent(node.name.clone()));
        };
        if system == target || self.is_ancestor_of(system, target) {
            return Err(self.cycle_error(system, target));
        }

        let was_attached = self.is_attached(system);
        let old_children = &mut self.node_mut(old_parent)?.children;
        let old_index = old_children.iter().position(|&c| c == system);
        old_children.retain(|&c| c != system);

        let children = &mut self.node_mut(target)?.children;
        let actual = match usize::try_from(index) {
            Ok(mut index) => {
                if old_parent == target && old_index.is_some_and(|old| old < index) {
                    index -= 1;
                }
                children.insert(index, system);
                index
            }
            Err(_) => {
                children.push(system);
                children.len() - 1
            }
        };
        self.node_mut(system)?.parent = Some(target);

        match (was_attached, self.is_attached(system)) {
            (true, false) => self.unbind_subtree(system),
            (false, true) => self.bind_subtree(system),
            _ => {}
        }

        let changed = self
            .changed(SystemChangedAction::Move, system)?
            .with_group(&self.node(target)?.name)
            .with_old_group(&self.node(old_parent)?.name);
        self.emit(&changed);
        Ok(actual)
    }

    /// Returns true if `group` is a strict ancestor of `system`.
    #[must_use]
    pub fn is_ancestor_of(&self, group: SystemId, system: SystemId) -> bool {
        let mut current = self.parent(system);
        while let Some(id) = current {
            if id == group {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Returns true if the system is the root or a descendant of it.
    #[must_use]
    pub fn is_attached(&self, system: SystemId) -> bool {
        system == SystemId::ROOT || self.is_ancestor_of(SystemId::ROOT, system)
    }

    fn cycle_error(&self, system: SystemId, target: SystemId) -> SystemError {
        SystemError::CycleDetected {
            system: self.name(system).unwrap_or_default().to_owned(),
            target: self.name(target).unwrap_or_default().to_owned(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub(crate) fn node(&self, id: SystemId) -> SystemResult<&Node> {
        self.nodes
            .get(id.index())
            .and_then(Option::as_ref)
            .filter(|node| node.generation == id.generation)
            .ok_or(SystemError::SystemNotFound(id.slot))
    }

    pub(crate) fn node_mut(&mut self, id: SystemId) -> SystemResult<&mut Node> {
        live_node_mut(&mut self.nodes, id).ok_or(SystemError::SystemNotFound(id.slot))
    }

    /// Children of a group in update order. Empty for leaves.
    ///
    /// # Errors
    ///
    /// `SystemNotFound` for stale ids.
    pub fn child_systems(&self, id: SystemId) -> SystemResult<&[SystemId]> {
        Ok(&self.node(id)?.children)
    }

    /// Parent group of a system.
    #[must_use]
    pub fn parent(&self, id: SystemId) -> Option<SystemId> {
        self.node(id).ok()?.parent
    }

    /// Display name.
    ///
    /// # Errors
    ///
    /// `SystemNotFound` for stale ids.
    pub fn name(&self, id: SystemId) -> SystemResult<&str> {
        Ok(&self.node(id)?.name)
    }

    /// Renames a system, firing an `Update` event if the name changed.
    ///
    /// # Errors
    ///
    /// `SystemNotFound` for stale ids.
    pub fn set_name(&mut self, id: SystemId, name: impl Into<String>) -> SystemResult<()> {
        let name = name.into();
        let node = self.node_mut(id)?;
        if node.name == name {
            return Ok(());
        }
        node.name.clone_from(&name);
        let changed = self.changed(SystemChangedAction::Update, id)?.with_field("name", name);
        self.emit(&changed);
        Ok(())
    }

    /// Whether the system takes part in updates.
    ///
    /// # Errors
    ///
    /// `SystemNotFound` for stale ids.
    pub fn enabled(&self, id: SystemId) -> SystemResult<bool> {
        Ok(self.node(id)?.enabled)
    }

    /// Enables or disables a system and its subtree, firing an `Update`
    /// event if the flag changed.
    ///
    /// # Errors
    ///
    /// `SystemNotFound` for stale ids.
    pub fn set_enabled(&mut self, id: SystemId, enabled: bool) -> SystemResult<()> {
        let node = self.node_mut(id)?;
        if node.enabled == enabled {
            return Ok(());
        }
        node.enabled = enabled;
        let changed = self.changed(SystemChangedAction::Update, id)?.with_field("enabled", enabled);
        self.emit(&changed);
        Ok(())
    }

    /// Whether the system is a group.
    ///
    /// # Errors
    ///
    /// `SystemNotFound` for stale ids.
    pub fn is_group(&self, id: SystemId) -> SystemResult<bool> {
        Ok(self.node(id)?.is_group)
    }

    /// Persistence type key of a system.
    ///
    /// # Errors
    ///
    /// `SystemNotFound` for stale ids.
    pub fn type_key(&self, id: SystemId) -> SystemResult<&str> {
        Ok(&self.node(id)?.type_key)
    }

    /// Tick passed to the last update of the system.
    ///
    /// # Errors
    ///
    /// `SystemNotFound` for stale ids.
    pub fn last_tick(&self, id: SystemId) -> SystemResult<UpdateTick> {
        Ok(self.node(id)?.tick)
    }

    /// Finds a group by name below the root.
    ///
    /// Only direct children are searched unless `recursive` is set.
    #[must_use]
    pub fn find_group(&self, name: &str, recursive: bool) -> Option<SystemId> {
        self.find(SystemId::ROOT, recursive, &|node| node.is_group && node.name == name)
    }

    /// Finds any system by name below the root.
    #[must_use]
    pub fn find_system(&self, name: &str, recursive: bool) -> Option<SystemId> {
        self.find(SystemId::ROOT, recursive, &|node| node.name == name)
    }

    fn find(&self, group: SystemId, recursive: bool, pred: &dyn Fn(&Node) -> bool) -> Option<SystemId> {
        let children = self.node(group).ok()?.children.as_slice();
        for &child in children {
            if self.node(child).is_ok_and(pred) {
                return Some(child);
            }
        }
        if recursive {
            return children.iter().find_map(|&child| self.find(child, true, pred));
        }
        None
    }

    /// Typed access to the user value of a system or custom group.
    #[must_use]
    pub fn get_system<S: 'static>(&self, id: SystemId) -> Option<&S> {
        self.node(id).ok()?.behavior.as_ref()?.as_any().downcast_ref::<S>()
    }

    /// Typed mutable access to the user value of a system or custom group.
    #[must_use]
    pub fn get_system_mut<S: 'static>(&mut self, id: SystemId) -> Option<&mut S> {
        self.node_mut(id).ok()?.behavior.as_mut()?.as_any_mut().downcast_mut::<S>()
    }

    /// Number of stores a query system holds a query for.
    ///
    /// # Errors
    ///
    /// `SystemNotFound` for stale ids.
    pub fn query_count(&self, id: SystemId) -> SystemResult<usize> {
        Ok(self.node(id)?.behavior.as_ref().map_or(0, |b| b.query_count()))
    }

    /// Entities matched by a query system across its stores.
    ///
    /// # Errors
    ///
    /// `SystemNotFound` for stale ids.
    pub fn entity_count(&mut self, id: SystemId) -> SystemResult<usize> {
        Ok(self.node_mut(id)?.behavior.as_mut().map_or(0, |b| b.entity_count()))
    }

    /// Component types fetched by a query system.
    ///
    /// # Errors
    ///
    /// `SystemNotFound` for stale ids.
    pub fn component_types(&self, id: SystemId) -> SystemResult<ComponentTypes> {
        Ok(self
            .node(id)?
            .behavior
            .as_ref()
            .map_or(ComponentTypes::EMPTY, |b| b.component_types()))
    }

    // =========================================================================
    // Stores
    // =========================================================================

    /// Stores updated by this root.
    #[must_use]
    pub fn stores(&self) -> &[SharedStore] {
        &self.stores
    }

    /// Binds a store to every attached query system.
    ///
    /// Returns `false` if the store was already bound.
    ///
    /// # Panics
    ///
    /// If the store is mutably borrowed.
    pub fn add_store(&mut self, store: &SharedStore) -> bool {
        let id = store.borrow().id();
        if self.stores.iter().any(|s| s.borrow().id() == id) {
            return false;
        }
        self.stores.push(SharedStore::clone(store));
        let mut leaves = Vec::new();
        self.collect_leaves(SystemId::ROOT, &mut leaves);
        for leaf in leaves {
            if let Some(behavior) = self.behavior_mut(leaf) {
                behavior.bind_store(store);
            }
        }
        tracing::debug!(store = id, "store added to system root");
        true
    }

    /// Unbinds a store from every query system.
    ///
    /// Returns `false` if the store was not bound.
    pub fn remove_store(&mut self, store: &SharedStore) -> bool {
        let id = store.borrow().id();
        let before = self.stores.len();
        self.stores.retain(|s| s.borrow().id() != id);
        if self.stores.len() == before {
            return false;
        }
        let mut leaves = Vec::new();
        self.collect_leaves(SystemId::ROOT, &mut leaves);
        for leaf in leaves {
            if let Some(behavior) = self.behavior_mut(leaf) {
                behavior.unbind_store(id);
            }
        }
        tracing::debug!(store = id, "store removed from system root");
        true
    }

    fn behavior_mut(&mut self, id: SystemId) -> Option<&mut Box<dyn Behavior>> {
        live_node_mut(&mut self.nodes, id)?.behavior.as_mut()
    }

    fn collect_leaves(&self, id: SystemId, out: &mut Vec<SystemId>) {
        let Ok(node) = self.node(id) else {
            return;
        };
        if !node.is_group {
            out.push(id);
        }
        for &child in &node.children {
            self.collect_leaves(child, out);
        }
    }

    fn bind_subtree(&mut self, id: SystemId) {
        let mut leaves = Vec::new();
        self.collect_leaves(id, &mut leaves);
        for leaf in leaves {
            let stores = &self.stores;
            if let Some(behavior) = live_node_mut(&mut self.nodes, leaf).and_then(|n| n.behavior.as_mut()) {
                for store in stores {
                    behavior.bind_store(store);
                }
            }
        }
    }

    fn unbind_subtree(&mut self, id: SystemId) {
        let mut leaves = Vec::new();
        self.collect_leaves(id, &mut leaves);
        let ids: Vec<u64> = self.stores.iter().map(|s| s.borrow().id()).collect();
        for leaf in leaves {
            if let Some(behavior) = self.behavior_mut(leaf) {
                for &store_id in &ids {
                    behavior.unbind_store(store_id);
                }
            }
        }
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Updates the whole tree.
    ///
    /// # Errors
    ///
    /// The first command buffer playback failure; the rest of the tick is
    /// skipped.
    pub fn update(&mut self, tick: &UpdateTick) -> SystemResult<()> {
        self.run(SystemId::ROOT, *tick)
    }

    /// Updates one subtree, e.g. a lifecycle group found with
    /// [`find_group`](Self::find_group). The system's own hooks are not called.
    ///
    /// # Errors
    ///
    /// `SystemNotFound` for stale ids, otherwise as [`update`](Self::update).
    pub fn update_system(&mut self, id: SystemId, tick: &UpdateTick) -> SystemResult<()> {
        self.run(id, *tick)
    }

    fn run(&mut self, id: SystemId, tick: UpdateTick) -> SystemResult<()> {
        let node = self.node(id)?;
        if !node.enabled {
            return Ok(());
        }
        let is_group = node.is_group;
        let start = self.config.monitor_perf.then(Instant::now);

        if is_group {
            self.update_children(id, tick)?;
        } else {
            let stores = &self.stores;
            if let Some(behavior) = live_node_mut(&mut self.nodes, id).and_then(|n| n.behavior.as_mut()) {
                behavior.update(&SystemContext { stores, tick })?;
            }
        }

        let node = self.node_mut(id)?;
        node.tick = tick;
        if let Some(start) = start {
            node.perf.record(start.elapsed().as_secs_f64() * 1000.0);
        }
        tracing::trace!(system = id.id(), name = %node.name, "system updated");
        Ok(())
    }

    fn update_children(&mut self, group: SystemId, tick: UpdateTick) -> SystemResult<()> {
        let children: Vec<SystemId> = self
            .node(group)?
            .children
            .iter()
            .copied()
            .filter(|&child| self.node(child).is_ok_and(|n| n.enabled))
            .collect();

        self.call_hooks(&children, tick, true);
        for &child in &children {
            self.run(child, tick)?;
        }
        self.call_hooks(&children, tick, false);
        Ok(())
    }

    fn call_hooks(&mut self, children: &[SystemId], tick: UpdateTick, begin: bool) {
        let ctx = SystemContext {
            stores: &self.stores,
            tick,
        };
        for &child in children {
            let behavior = live_node_mut(&mut self.nodes, child).and_then(|n| n.behavior.as_mut());
            match (behavior, begin) {
                (Some(behavior), true) => behavior.begin(&ctx),
                (Some(behavior), false) => behavior.end(&ctx),
                (None, _) => {}
            }
        }
    }

    // =========================================================================
    // Perf
    // =========================================================================

    /// Enables or disables update duration recording.
    pub fn set_monitor_perf(&mut self, enabled: bool) {
        self.config.monitor_perf = enabled;
    }

    /// Whether update durations are recorded.
    #[must_use]
    pub const fn monitor_perf(&self) -> bool {
        self.config.monitor_perf
    }

    /// Update duration history of a system.
    ///
    /// # Errors
    ///
    /// `SystemNotFound` for stale ids.
    pub fn perf(&self, id: SystemId) -> SystemResult<&SystemPerf> {
        Ok(&self.node(id)?.perf)
    }

    /// Text report of a subtree: name, enabled flag, matched entities,
    /// last and average (last 10 updates) duration and update count.
    ///
    /// ```text
    /// system                          enabled  entities   last ms    avg ms  updates
    /// Systems                            true               0.052     0.049      120
    ///   Update                           true               0.050     0.047      120
    ///     MoveSystem                     true      1000     0.048     0.046      120
    /// ```
    ///
    /// # Errors
    ///
    /// `SystemNotFound` for stale ids.
    pub fn perf_log(&mut self, id: SystemId) -> SystemResult<String> {
        let mut out = format!(
            "{:<32} {:>7} {:>9} {:>9} {:>9} {:>8}\n",
            "system", "enabled", "entities", "last ms", "avg ms", "updates"
        );
        self.write_perf_line(id, 0, &mut out)?;
        Ok(out)
    }

    fn write_perf_line(&mut self, id: SystemId, depth: usize, out: &mut String) -> SystemResult<()> {
        let entities = if self.node(id)?.is_group {
            String::new()
        } else {
            self.entity_count(id)?.to_string()
        };
        let node = self.node(id)?;
        let label = format!("{}{}", "  ".repeat(depth), node.name);
        out.push_str(&format!(
            "{label:<32} {:>7} {entities:>9} {:>9} {:>9} {:>8}\n",
            node.enabled,
            format_ms(node.perf.last_ms()),
            format_ms(node.perf.last_avg_ms(10)),
            node.perf.update_count(),
        ));
        let children = node.children.clone();
        for child in children {
            self.write_perf_line(child, depth + 1, out)?;
        }
        Ok(())
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Subscribes to tree mutations.
    pub fn on_system_changed(&mut self, callback: impl FnMut(&SystemChanged) + 'static) -> ChangedListenerId {
        self.listeners.add(Box::new(callback))
    }

    /// Unsubscribes a listener. Returns `false` if it was not registered.
    pub fn remove_system_changed(&mut self, id: ChangedListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn changed(&self, action: SystemChangedAction, id: SystemId) -> SystemResult<SystemChanged> {
        let node = self.node(id)?;
        Ok(SystemChanged::new(action, id, &node.name, node.is_group))
    }

    fn emit(&mut self, changed: &SystemChanged) {
        tracing::debug!(%changed, "system tree changed");
        self.listeners.notify(changed);
    }
}

impl std::fmt::Debug for SystemRoot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemRoot")
            .field("name", &self.name(SystemId::ROOT).unwrap_or_default())
            .field("systems", &self.system_count())
            .field("stores", &self.stores.len())
            .finish()
    }
}

fn format_ms(ms: f64) -> String {
    if ms < 0.0 {
        "-.---".to_owned()
    } else {
        format!("{ms:.3}")
    }
}

/// Node behind `id`, if the slot still holds that generation.
fn live_node_mut(nodes: &mut [Option<Node>], id: SystemId) -> Option<&mut Node> {
    nodes
        .get_mut(id.index())?
        .as_mut()
        .filter(|node| node.generation == id.generation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_is_attached_group() {
        let root = SystemRoot::new("base");
        assert!(root.is_attached(SystemId::ROOT));
        assert_eq!(root.is_group(SystemId::ROOT), Ok(true));
        assert_eq!(root.name(SystemId::ROOT), Ok("base"));
        assert_eq!(root.system_count(), 1);
    }

    #[test]
    fn test_add_rejects_cycles_and_reattach() {
        let mut root = SystemRoot::new("base");
        let outer = root.create_group("outer");
        let inner = root.create_group("inner");
        root.add(outer, inner).unwrap();

        assert!(matches!(root.add(inner, outer), Err(SystemError::CycleDetected { .. })));
        assert_eq!(root.add(SystemId::ROOT, inner), Err(SystemError::AlreadyAttached("inner".to_owned())));
        assert!(matches!(root.add(outer, outer), Err(SystemError::CycleDetected { .. })));
        assert!(!root.is_attached(inner));

        root.add(SystemId::ROOT, outer).unwrap();
        assert!(root.is_attached(inner));
        assert!(root.is_ancestor_of(SystemId::ROOT, inner));
        assert!(!root.is_ancestor_of(inner, outer));
    }

    #[test]
    fn test_move_into_descendant_rejected() {
        let mut root = SystemRoot::new("base");
        let outer = root.add_group(SystemId::ROOT, "outer").unwrap();
        let inner = root.add_group(outer, "inner").unwrap();

        let err = root.move_system_to(outer, inner, -1).unwrap_err();
        assert_eq!(
            err,
            SystemError::CycleDetected {
                system: "outer".to_owned(),
                target: "inner".to_owned()
            }
        );
        assert_eq!(root.child_systems(SystemId::ROOT), Ok(&[outer][..]));
    }

    #[test]
    fn test_destroy_frees_subtree() {
        let mut root = SystemRoot::new("base");
        let outer = root.add_group(SystemId::ROOT, "outer").unwrap();
        let inner = root.add_group(outer, "inner").unwrap();

        root.destroy(outer).unwrap();

        assert_eq!(root.system_count(), 1);
        assert_eq!(root.name(inner), Err(SystemError::SystemNotFound(inner.id())));
        assert!(root.child_systems(SystemId::ROOT).unwrap().is_empty());
        assert!(matches!(root.destroy(SystemId::ROOT), Err(SystemError::NoParent(_))));
    }

    #[test]
    fn test_destroyed_slots_are_reused() {
        let mut root = SystemRoot::new("base");
        let first = root.add_group(SystemId::ROOT, "first").unwrap();

        for round in 0..16 {
            let group = root.add_group(SystemId::ROOT, format!("g{round}")).unwrap();
            root.destroy(group).unwrap();
        }
        assert_eq!(root.nodes.len(), 3);

        let stale = root.add_group(SystemId::ROOT, "stale").unwrap();
        root.destroy(stale).unwrap();
        let fresh = root.add_group(SystemId::ROOT, "fresh").unwrap();

        assert_eq!(fresh.index(), stale.index());
        assert_ne!(fresh, stale);
        assert_eq!(fresh.generation(), stale.generation() + 1);
        assert_eq!(root.name(stale), Err(SystemError::SystemNotFound(stale.id())));
        assert!(matches!(root.destroy(stale), Err(SystemError::SystemNotFound(_))));
        assert!(root.set_enabled(stale, false).is_err());
        assert_eq!(root.name(fresh), Ok("fresh"));
        assert_eq!(root.enabled(fresh), Ok(true));
        assert_eq!(root.child_systems(SystemId::ROOT), Ok(&[first, fresh][..]));
        assert_eq!(root.system_count(), 3);
    }

    #[test]
    fn test_find_group() {
        let mut root = SystemRoot::new("base");
        let update = root.add_group(SystemId::ROOT, "Update").unwrap();
        let nested = root.add_group(update, "Physics").unwrap();

        assert_eq!(root.find_group("Update", false), Some(update));
        assert_eq!(root.find_group("Physics", false), None);
        assert_eq!(root.find_group("Physics", true), Some(nested));
        assert_eq!(root.find_system("Missing", true), None);
    }

    #[test]
    fn test_set_enabled_fires_once() {
        let mut root = SystemRoot::new("base");
        let group = root.add_group(SystemId::ROOT, "group").unwrap();
        let log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = std::rc::Rc::clone(&log);
        root.on_system_changed(move |changed| sink.borrow_mut().push(changed.to_string()));

        root.set_enabled(group, false).unwrap();
        root.set_enabled(group, false).unwrap();
        root.set_name(group, "renamed").unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                "Update - Group 'group' field: enabled, value: false".to_owned(),
                "Update - Group 'renamed' field: name, value: renamed".to_owned(),
            ]
        );
    }

    #[test]
    fn test_format_ms() {
        assert_eq!(format_ms(-1.0), "-.---");
        assert_eq!(format_ms(0.12345), "0.123");
    }
}
