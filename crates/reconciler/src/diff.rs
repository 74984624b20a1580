//! Tree diffing and the component instance lifecycle.
//!
//! The differ walks the realised tree and the new virtual tree side by side,
//! level by level. It produces an ordered patch sequence, updates the instance
//! registry and records the after-hooks to run once the patches are applied.
//!
//! Sibling identity: a child with an explicit key is matched by key; any other
//! child is matched by its absolute position among its siblings, keyed or not.
//! A matched pair of different shape (kind, tag or component) is replaced in
//! place. Matching is a single hash-indexed pass per level, so move counts are
//! not minimal.

use crate::registry::{ComponentInstance, InstanceRegistry, Phase};
use crate::telemetry::PassStats;
use crate::tree::Mounted;
use core::mem;
use log::{debug, trace, warn};
use std::collections::HashMap;
use std::rc::Rc;
use vdom::{
    Attributes, ComponentNode, Element, InstanceId, KeyAllocator, NodeKey, NodePath, Patch,
    PathSegment, Props, State, Updater, VirtualNode, merge_state,
};

/// Where every instance's `send` delivers its partial states.
pub type StateSink = Rc<dyn Fn(InstanceId, State)>;

/// A hook call deferred until the patches of the pass are on the host.
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    AfterMount(InstanceId),
    AfterUpdate {
        instance: InstanceId,
        prev_props: Props,
        prev_state: State,
    },
}

/// Output of one diff pass.
#[derive(Debug, Default)]
pub struct Reconciliation {
    pub patches: Vec<Patch>,
    /// In post-order: children before their parents.
    pub effects: Vec<Effect>,
    pub stats: PassStats,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Identity {
    Key(String),
    Index(usize),
}

impl Identity {
    fn of(key: Option<&str>, index: usize) -> Self {
        key.map_or(Self::Index(index), |name| Self::Key(name.to_owned()))
    }
}

pub struct Differ<'engine> {
    registry: &'engine mut InstanceRegistry,
    keys: &'engine mut KeyAllocator,
    sink: &'engine StateSink,
    patches: Vec<Patch>,
    effects: Vec<Effect>,
    stats: PassStats,
}

impl<'engine> Differ<'engine> {
    pub fn new(
        registry: &'engine mut InstanceRegistry,
        keys: &'engine mut KeyAllocator,
        sink: &'engine StateSink,
    ) -> Self {
        Self {
            registry,
            keys,
            sink,
            patches: Vec::new(),
            effects: Vec::new(),
            stats: PassStats::default(),
        }
    }

    /// Reconcile the application root. `None` on either side means nothing is
    /// rendered there.
    pub fn reconcile(
        &mut self,
        old: Option<Mounted>,
        new: Option<&VirtualNode>,
    ) -> Option<Mounted> {
        let root = NodePath::root();
        match (old, new) {
            (None, None) => None,
            (None, Some(node)) => {
                let created = self.create(node, &root);
                self.patches.push(Patch::AttachRoot { node: created.host() });
                Some(created)
            }
            (Some(previous), Some(node)) => Some(self.diff(previous, node, &root)),
            (Some(previous), None) => {
                let host = previous.host();
                self.destroy(previous);
                self.patches.push(Patch::DetachRoot { node: host });
                self.patches.push(Patch::RemoveElement { node: host });
                None
            }
        }
    }

    pub fn finish(self) -> Reconciliation {
        Reconciliation {
            patches: self.patches,
            effects: self.effects,
            stats: self.stats,
        }
    }

    /// Realise a virtual node as detached host nodes.
    fn create(&mut self, node: &VirtualNode, path: &NodePath) -> Mounted {
        match node {
            VirtualNode::Text(text) => {
                let host = self.keys.node();
                self.patches.push(Patch::CreateText {
                    node: host,
                    text: text.clone(),
                });
                Mounted::Text {
                    host,
                    text: text.clone(),
                }
            }
            VirtualNode::Empty => {
                let host = self.keys.node();
                self.patches.push(Patch::CreateText {
                    node: host,
                    text: String::new(),
                });
                Mounted::Empty { host }
            }
            VirtualNode::Element(element) => self.create_element(element, path),
            VirtualNode::Component(component) => self.mount_component(component, path),
        }
    }

    fn create_element(&mut self, element: &Element, path: &NodePath) -> Mounted {
        let host = self.keys.node();
        self.patches.push(Patch::CreateElement {
            node: host,
            tag: element.tag().to_owned(),
        });
        for (name, value) in element.attributes().iter() {
            self.patches.push(Patch::SetAttribute {
                node: host,
                name: name.clone(),
                value: value.clone(),
            });
        }
        let mut children = Vec::with_capacity(element.children().len());
        for (index, child) in element.children().iter().enumerate() {
            let child_path = path.child(PathSegment::for_child(child.key(), index));
            let created = self.create(child, &child_path);
            self.patches.push(Patch::InsertChild {
                parent: host,
                child: created.host(),
                index,
            });
            children.push(created);
        }
        Mounted::Element {
            host,
            tag: element.tag().to_owned(),
            attributes: element.attributes().clone(),
            key: element.key().map(str::to_owned),
            children,
        }
    }

    fn mount_component(&mut self, node: &ComponentNode, path: &NodePath) -> Mounted {
        let component = node.component().clone();
        let id = self.keys.instance();
        let props = node.props().clone();
        let state = component.initial_state(&props);
        debug!(target: "reconciler", "mount {} {id} at {path}", component.name());

        component.before_mount(&props, &state);
        let output = component.render(&props, &state);
        self.stats.renders = self.stats.renders.saturating_add(1);

        let outer = mem::take(&mut self.patches);
        let rendered = self.create(&output, &path.child(PathSegment::Index(0)));
        let nested = mem::replace(&mut self.patches, outer);
        self.patches.push(Patch::MountComponent {
            instance: id,
            name: component.name().to_owned(),
            patches: nested,
        });

        let host = rendered.host();
        self.registry.insert(ComponentInstance {
            id,
            component: component.clone(),
            path: path.clone(),
            props,
            state,
            phase: Phase::Mounted,
            rendered: Some(rendered),
            pending_state: None,
            renders: 1,
            updater: Updater::new(id, Rc::clone(self.sink)),
        });
        self.stats.mounts = self.stats.mounts.saturating_add(1);
        self.effects.push(Effect::AfterMount(id));
        Mounted::Component {
            instance: id,
            component,
            key: node.key().map(str::to_owned),
            host,
        }
    }

    /// Tear down the instances under a realised node, parents first. Emits no
    /// host removal; the caller discards the host subtree.
    fn destroy(&mut self, old: Mounted) {
        match old {
            Mounted::Element { children, .. } => {
                for child in children {
                    self.destroy(child);
                }
            }
            Mounted::Component { instance, .. } => {
                let Some(mut entry) = self.registry.remove(instance) else {
                    warn!(target: "reconciler", "unmounting unknown instance {instance}");
                    return;
                };
                debug!(target: "reconciler", "unmount {} {instance}", entry.component.name());
                entry.component.before_unmount(&entry.props, &entry.state);
                entry.phase = Phase::Unmounted;
                self.stats.unmounts = self.stats.unmounts.saturating_add(1);
                self.patches.push(Patch::UnmountComponent {
                    instance,
                    name: entry.component.name().to_owned(),
                });
                if let Some(rendered) = entry.rendered.take() {
                    self.destroy(rendered);
                }
            }
            Mounted::Text { .. } | Mounted::Empty { .. } => {}
        }
    }

    /// Unmount `old` completely, then mount `new` in its place.
    fn replace(&mut self, old: Mounted, new: &VirtualNode, path: &NodePath) -> Mounted {
        let old_host = old.host();
        trace!(target: "reconciler", "replace {:?} at {path} with {:?}", old.kind(), new.kind());
        self.destroy(old);
        let created = self.create(new, path);
        self.patches.push(Patch::ReplaceElement {
            old: old_host,
            new: created.host(),
        });
        created
    }

    /// Diff one matched pair.
    fn diff(&mut self, old: Mounted, new: &VirtualNode, path: &NodePath) -> Mounted {
        if old.key() != new.key() {
            return self.replace(old, new, path);
        }
        match (old, new) {
            (Mounted::Text { host, text }, VirtualNode::Text(next)) => {
                if text != *next {
                    self.patches.push(Patch::UpdateText {
                        node: host,
                        text: next.clone(),
                    });
                }
                Mounted::Text {
                    host,
                    text: next.clone(),
                }
            }
            (Mounted::Empty { host }, VirtualNode::Empty) => Mounted::Empty { host },
            (
                Mounted::Element {
                    host,
                    tag,
                    attributes,
                    children,
                    key,
                },
                VirtualNode::Element(element),
            ) if tag == element.tag() => {
                self.diff_attributes(host, &attributes, element.attributes());
                let children = self.diff_children(host, children, element.children(), path);
                Mounted::Element {
                    host,
                    tag,
                    attributes: element.attributes().clone(),
                    key,
                    children,
                }
            }
            (
                Mounted::Component {
                    instance,
                    component,
                    key,
                    host,
                },
                VirtualNode::Component(node),
            ) if component == *node.component() => {
                self.update_component(instance, host, key, Some(node.props()), path)
            }
            (stale, next) => self.replace(stale, next, path),
        }
    }

    fn diff_attributes(&mut self, host: NodeKey, old: &Attributes, new: &Attributes) {
        for (name, value) in new.iter() {
            let unchanged = old
                .iter()
                .any(|(existing, current)| existing == name && current == value);
            if !unchanged {
                self.patches.push(Patch::SetAttribute {
                    node: host,
                    name: name.clone(),
                    value: value.clone(),
                });
            }
        }
        for (name, _) in old.iter() {
            if !new.iter().any(|(kept, _)| kept == name) {
                self.patches.push(Patch::RemoveAttribute {
                    node: host,
                    name: name.clone(),
                });
            }
        }
    }

    /// Reconcile a child list. Removals come first (highest index first), then
    /// one pass in new order emits moves, nested diffs and insertions, so every
    /// index is valid for the host state left by the previous patch.
    fn diff_children(
        &mut self,
        parent: NodeKey,
        old: Vec<Mounted>,
        new: &[VirtualNode],
        path: &NodePath,
    ) -> Vec<Mounted> {
        let mut by_identity: HashMap<Identity, usize> = HashMap::with_capacity(old.len());
        for (index, child) in old.iter().enumerate() {
            by_identity.entry(Identity::of(child.key(), index)).or_insert(index);
        }
        let old_hosts: Vec<NodeKey> = old.iter().map(Mounted::host).collect();
        let mut old_slots: Vec<Option<Mounted>> = old.into_iter().map(Some).collect();

        // A duplicate identity in the new list finds nothing and is created fresh.
        let mut matched: Vec<Option<Mounted>> = new
            .iter()
            .enumerate()
            .map(|(index, child)| {
                by_identity
                    .remove(&Identity::of(child.key(), index))
                    .and_then(|slot| old_slots.get_mut(slot).and_then(Option::take))
            })
            .collect();

        // Host children as they stand after the removals, in old order.
        let mut current = Vec::with_capacity(new.len());
        let mut removed = Vec::new();
        for ((index, slot), host) in old_slots.iter_mut().enumerate().zip(old_hosts) {
            if let Some(stale) = slot.take() {
                self.destroy(stale);
                removed.push(index);
            } else {
                current.push(host);
            }
        }
        for index in removed.iter().rev() {
            self.patches.push(Patch::RemoveChild {
                parent,
                index: *index,
            });
        }

        let mut children = Vec::with_capacity(new.len());
        for (target, (child, previous)) in new.iter().zip(matched.iter_mut()).enumerate() {
            let child_path = path.child(PathSegment::for_child(child.key(), target));
            let Some(existing) = previous.take() else {
                let created = self.create(child, &child_path);
                self.patches.push(Patch::InsertChild {
                    parent,
                    child: created.host(),
                    index: target,
                });
                current.insert(target.min(current.len()), created.host());
                children.push(created);
                continue;
            };

            let host = existing.host();
            let from = current
                .iter()
                .skip(target)
                .position(|candidate| *candidate == host)
                .map_or(target, |offset| offset + target);
            if from != target {
                self.patches.push(Patch::MoveChild {
                    parent,
                    from,
                    to: target,
                });
                current.remove(from);
                current.insert(target, host);
            }

            let updated = self.diff(existing, child, &child_path);
            if let Some(slot) = current.get_mut(target) {
                *slot = updated.host();
            }
            children.push(updated);
        }
        children
    }

    /// Visit a component instance that is still at its identity.
    ///
    /// `next_props` is `None` when the parent did not re-render and the
    /// instance is only visited for pending state.
    fn update_component(
        &mut self,
        id: InstanceId,
        host: NodeKey,
        key: Option<String>,
        next_props: Option<&Props>,
        path: &NodePath,
    ) -> Mounted {
        let Some(mut entry) = self.registry.remove(id) else {
            warn!(target: "reconciler", "update of unknown instance {id}");
            return Mounted::Empty { host };
        };
        entry.path = path.clone();
        let pending = entry.pending_state.take();
        let props_changed = next_props.is_some_and(|props| *props != entry.props);

        if !props_changed && pending.is_none() {
            if self.registry.has_pending()
                && let Some(rendered) = entry.rendered.take()
            {
                entry.rendered = Some(self.refresh(rendered, &path.child(PathSegment::Index(0))));
            }
            return self.reinsert(entry, key, host);
        }

        let incoming = next_props.cloned().unwrap_or_else(|| entry.props.clone());
        let mut next_state = entry.state.clone();
        if let Some(partial) = pending {
            merge_state(&mut next_state, partial);
        }

        entry.phase = Phase::Updating;
        if !entry
            .component
            .should_update(&entry.props, &entry.state, &incoming, &next_state)
        {
            debug!(target: "reconciler", "{} {id} skipped its update", entry.component.name());
            entry.props = incoming;
            entry.state = next_state;
            entry.phase = Phase::Mounted;
            self.stats.skipped = self.stats.skipped.saturating_add(1);
            // The output is kept, but descendants with pending state still update.
            if self.registry.has_pending()
                && let Some(rendered) = entry.rendered.take()
            {
                entry.rendered = Some(self.refresh(rendered, &path.child(PathSegment::Index(0))));
            }
            return self.reinsert(entry, key, host);
        }

        entry
            .component
            .before_update(&entry.props, &entry.state, &incoming, &next_state);
        let prev_props = mem::replace(&mut entry.props, incoming);
        let prev_state = mem::replace(&mut entry.state, next_state);
        let output = entry.component.render(&entry.props, &entry.state);
        entry.renders = entry.renders.saturating_add(1);
        self.stats.renders = self.stats.renders.saturating_add(1);
        debug!(
            target: "reconciler",
            "update {} {id} (render #{})",
            entry.component.name(),
            entry.renders
        );

        let outer = mem::take(&mut self.patches);
        let output_path = path.child(PathSegment::Index(0));
        let rendered = match entry.rendered.take() {
            Some(previous) => self.diff(previous, &output, &output_path),
            None => self.create(&output, &output_path),
        };
        let nested = mem::replace(&mut self.patches, outer);
        self.patches.push(Patch::UpdateComponent {
            instance: id,
            name: entry.component.name().to_owned(),
            patches: nested,
        });
        entry.rendered = Some(rendered);
        entry.phase = Phase::Mounted;
        self.effects.push(Effect::AfterUpdate {
            instance: id,
            prev_props,
            prev_state,
        });
        self.reinsert(entry, key, host)
    }

    fn reinsert(
        &mut self,
        entry: ComponentInstance,
        key: Option<String>,
        fallback: NodeKey,
    ) -> Mounted {
        let host = entry.rendered.as_ref().map_or(fallback, Mounted::host);
        let mounted = Mounted::Component {
            instance: entry.id,
            component: entry.component.clone(),
            key,
            host,
        };
        self.registry.insert(entry);
        mounted
    }

    /// Walk an unchanged subtree, visiting instances that have pending state.
    fn refresh(&mut self, node: Mounted, path: &NodePath) -> Mounted {
        match node {
            Mounted::Element {
                host,
                tag,
                attributes,
                key,
                children,
            } => {
                let children = children
                    .into_iter()
                    .enumerate()
                    .map(|(index, child)| {
                        let child_path = path.child(PathSegment::for_child(child.key(), index));
                        self.refresh(child, &child_path)
                    })
                    .collect();
                Mounted::Element {
                    host,
                    tag,
                    attributes,
                    key,
                    children,
                }
            }
            Mounted::Component {
                instance, key, host, ..
            } => self.update_component(instance, host, key, None, path),
            leaf @ (Mounted::Text { .. } | Mounted::Empty { .. }) => leaf,
        }
    }
}
