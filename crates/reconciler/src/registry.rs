//! Live component instances, owned by one application.

use crate::tree::Mounted;
use std::collections::{HashMap, HashSet};
use vdom::{Component, InstanceId, NodePath, Props, State, Updater, merge_state};

/// Lifecycle phase of an instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Terminal: `before_unmount` has run.
    Unmounted,
    Mounted,
    /// Transient, while the instance is being re-rendered.
    Updating,
}

/// Persistent per-identity state of a mounted component.
#[derive(Debug)]
pub struct ComponentInstance {
    pub id: InstanceId,
    pub component: Component,
    /// Tree position, refreshed whenever the instance is visited.
    pub path: NodePath,
    pub props: Props,
    pub state: State,
    pub phase: Phase,
    /// Last rendered output.
    pub rendered: Option<Mounted>,
    /// Shallow-merged updates waiting for the next visit.
    pub pending_state: Option<State>,
    /// Render calls made for this instance so far.
    pub renders: u64,
    pub updater: Updater,
}

#[derive(Debug, Default)]
pub struct InstanceRegistry {
    instances: HashMap<InstanceId, ComponentInstance>,
    pending: HashSet<InstanceId>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, instance: ComponentInstance) {
        if instance.pending_state.is_some() {
            self.pending.insert(instance.id);
        }
        self.instances.insert(instance.id, instance);
    }

    /// Take an instance out, for an update or for good.
    pub fn remove(&mut self, id: InstanceId) -> Option<ComponentInstance> {
        self.pending.remove(&id);
        self.instances.remove(&id)
    }

    #[inline]
    pub fn get(&self, id: InstanceId) -> Option<&ComponentInstance> {
        self.instances.get(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Merge `partial` into the instance's pending state. Returns `false` when
    /// the instance no longer exists and the update was dropped.
    pub fn queue_pending(&mut self, id: InstanceId, partial: State) -> bool {
        let Some(instance) = self.instances.get_mut(&id) else {
            return false;
        };
        merge_state(instance.pending_state.get_or_insert_with(State::new), partial);
        self.pending.insert(id);
        true
    }

    /// Whether any instance still has pending state.
    #[inline]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::rc::Rc;
    use vdom::{NodeKey, into_state};

    fn instance(id: u64) -> ComponentInstance {
        let component = Component::builder("Widget").build();
        ComponentInstance {
            id: InstanceId(id),
            component,
            path: NodePath::root(),
            props: Props::new(),
            state: State::new(),
            phase: Phase::Mounted,
            rendered: Some(Mounted::Empty { host: NodeKey(id) }),
            pending_state: None,
            renders: 1,
            updater: Updater::new(InstanceId(id), Rc::new(|_, _| {})),
        }
    }

    #[test]
    fn pending_updates_merge_and_track() {
        let mut registry = InstanceRegistry::new();
        registry.insert(instance(1));
        assert!(!registry.has_pending());
        assert!(registry.queue_pending(InstanceId(1), into_state(json!({ "a": 1, "b": 1 }))));
        assert!(registry.queue_pending(InstanceId(1), into_state(json!({ "b": 2 }))));
        assert!(registry.has_pending());
        let pending = registry.get(InstanceId(1)).and_then(|entry| entry.pending_state.clone());
        assert_eq!(pending, Some(into_state(json!({ "a": 1, "b": 2 }))));
    }

    #[test]
    fn updates_for_missing_instances_are_dropped() {
        let mut registry = InstanceRegistry::new();
        assert!(!registry.queue_pending(InstanceId(5), State::new()));
        registry.insert(instance(5));
        registry.queue_pending(InstanceId(5), State::new());
        let removed = registry.remove(InstanceId(5));
        assert!(removed.is_some());
        assert!(!registry.has_pending());
        assert!(registry.is_empty());
    }
}
