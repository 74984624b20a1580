use anyhow::{Result, anyhow, bail};
use indextree::{Arena, Node, NodeId};
use log::trace;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use vdom::{HostRenderer, NodeKey};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NodeKind {
    /// The externally supplied container the application renders into.
    #[default]
    MountPoint,
    Element { tag: String },
    Text { text: String },
}

#[derive(Debug, Clone, Default)]
pub struct DomNode {
    pub kind: NodeKind,
    pub attrs: SmallVec<(String, String), 4>,
    /// Reconciler key; `None` only for the mount point.
    pub key: Option<NodeKey>,
}

/// Arena-backed DOM with a single mount point.
#[derive(Debug)]
pub struct DomTree {
    pub(crate) arena: Arena<DomNode>,
    pub(crate) mount_point: NodeId,
    nodes: HashMap<NodeKey, NodeId>,
    operations: u64,
    fail_after: Option<u64>,
}

impl DomTree {
    pub fn new() -> Self {
        let mut arena = Arena::new();
        Self {
            mount_point: arena.new_node(DomNode::default()),
            arena,
            nodes: HashMap::new(),
            operations: 0,
            fail_after: None,
        }
    }

    /// Number of live keyed nodes, attached or detached.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of successful host operations so far.
    pub fn operations(&self) -> u64 {
        self.operations
    }

    /// Make every operation after the next `remaining` ones fail.
    pub fn fail_after(&mut self, remaining: Option<u64>) {
        self.fail_after = remaining;
    }

    /// Node data for a key, if the key is live.
    pub fn node(&self, key: NodeKey) -> Option<&DomNode> {
        let id = self.nodes.get(&key)?;
        self.arena.get(*id).map(Node::get)
    }

    /// Keys of the children of `key`, in order.
    pub fn children_of(&self, key: NodeKey) -> Vec<NodeKey> {
        self.nodes
            .get(&key)
            .map(|id| self.keys_under(*id))
            .unwrap_or_default()
    }

    /// Keys of the nodes attached directly to the mount point.
    pub fn root_children(&self) -> Vec<NodeKey> {
        self.keys_under(self.mount_point)
    }

    fn keys_under(&self, id: NodeId) -> Vec<NodeKey> {
        id.children(&self.arena)
            .filter_map(|child| self.arena.get(child).and_then(|node| node.get().key))
            .collect()
    }

    fn resolve(&self, key: NodeKey) -> Result<NodeId> {
        self.nodes
            .get(&key)
            .copied()
            .ok_or_else(|| anyhow!("unknown host node {key}"))
    }

    fn record(&mut self) -> Result<()> {
        if let Some(remaining) = self.fail_after.as_mut() {
            if *remaining == 0 {
                bail!("injected host failure after {} operations", self.operations);
            }
            *remaining -= 1;
        }
        self.operations = self.operations.saturating_add(1);
        Ok(())
    }

    fn create(&mut self, key: NodeKey, kind: NodeKind) -> Result<()> {
        if self.nodes.contains_key(&key) {
            bail!("host node {key} already exists");
        }
        let id = self.arena.new_node(DomNode {
            kind,
            attrs: SmallVec::new(),
            key: Some(key),
        });
        self.nodes.insert(key, id);
        Ok(())
    }

    fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id).and_then(Node::parent)
    }

    fn ensure_detached(&self, id: NodeId, key: NodeKey) -> Result<()> {
        if self.parent_of(id).is_some() {
            bail!("host node {key} is already attached");
        }
        Ok(())
    }

    /// Remove a node and everything below it, forgetting their keys.
    fn discard(&mut self, id: NodeId) {
        let keys: Vec<NodeKey> = id
            .descendants(&self.arena)
            .filter_map(|node| self.arena.get(node).and_then(|entry| entry.get().key))
            .collect();
        for key in keys {
            self.nodes.remove(&key);
        }
        id.remove_subtree(&mut self.arena);
    }

    fn child_at(&self, parent: NodeId, index: usize) -> Result<NodeId> {
        parent
            .children(&self.arena)
            .nth(index)
            .ok_or_else(|| anyhow!("no child at index {index}"))
    }

    fn attach_at(&mut self, parent: NodeId, child: NodeId, index: usize) -> Result<()> {
        let count = parent.children(&self.arena).count();
        if index == count {
            parent
                .checked_append(child, &mut self.arena)
                .map_err(|err| anyhow!("append failed: {err}"))
        } else if index < count {
            let sibling = self.child_at(parent, index)?;
            sibling
                .checked_insert_before(child, &mut self.arena)
                .map_err(|err| anyhow!("insert failed: {err}"))
        } else {
            bail!("index {index} out of range for {count} children")
        }
    }

    fn node_mut(&mut self, key: NodeKey) -> Result<&mut DomNode> {
        let id = self.resolve(key)?;
        self.arena
            .get_mut(id)
            .map(Node::get_mut)
            .ok_or_else(|| anyhow!("host node {key} was removed"))
    }

    fn element_mut(&mut self, key: NodeKey) -> Result<&mut DomNode> {
        let node = self.node_mut(key)?;
        if matches!(node.kind, NodeKind::Element { .. }) {
            Ok(node)
        } else {
            bail!("host node {key} is not an element")
        }
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRenderer for DomTree {
    fn create_element(&mut self, node: NodeKey, tag: &str) -> Result<()> {
        self.record()?;
        trace!(target: "host_dom", "create <{tag}> as {node}");
        self.create(node, NodeKind::Element { tag: tag.to_owned() })
    }

    fn create_text(&mut self, node: NodeKey, text: &str) -> Result<()> {
        self.record()?;
        self.create(node, NodeKind::Text { text: text.to_owned() })
    }

    fn remove_element(&mut self, node: NodeKey) -> Result<()> {
        self.record()?;
        let id = self.resolve(node)?;
        trace!(target: "host_dom", "remove {node}");
        self.discard(id);
        Ok(())
    }

    fn replace_element(&mut self, old: NodeKey, new: NodeKey) -> Result<()> {
        self.record()?;
        let old_id = self.resolve(old)?;
        let new_id = self.resolve(new)?;
        self.ensure_detached(new_id, new)?;
        if self.parent_of(old_id).is_none() {
            bail!("cannot replace detached host node {old}");
        }
        old_id
            .checked_insert_before(new_id, &mut self.arena)
            .map_err(|err| anyhow!("replace failed: {err}"))?;
        trace!(target: "host_dom", "replace {old} with {new}");
        self.discard(old_id);
        Ok(())
    }

    fn set_attribute(&mut self, node: NodeKey, name: &str, value: &str) -> Result<()> {
        self.record()?;
        let element = self.element_mut(node)?;
        if let Some(slot) = element.attrs.iter_mut().find(|(existing, _)| existing == name) {
            value.clone_into(&mut slot.1);
        } else {
            element.attrs.push((name.to_owned(), value.to_owned()));
        }
        Ok(())
    }

    fn remove_attribute(&mut self, node: NodeKey, name: &str) -> Result<()> {
        self.record()?;
        let element = self.element_mut(node)?;
        element.attrs.retain(|(existing, _)| existing != name);
        Ok(())
    }

    fn insert_child(&mut self, parent: NodeKey, child: NodeKey, index: usize) -> Result<()> {
        self.record()?;
        let parent_id = self.resolve(parent)?;
        let child_id = self.resolve(child)?;
        self.ensure_detached(child_id, child)?;
        self.attach_at(parent_id, child_id, index)
    }

    fn remove_child(&mut self, parent: NodeKey, index: usize) -> Result<()> {
        self.record()?;
        let parent_id = self.resolve(parent)?;
        let child_id = self.child_at(parent_id, index)?;
        self.discard(child_id);
        Ok(())
    }

    fn move_child(&mut self, parent: NodeKey, from: usize, to: usize) -> Result<()> {
        self.record()?;
        let parent_id = self.resolve(parent)?;
        let child_id = self.child_at(parent_id, from)?;
        child_id.detach(&mut self.arena);
        self.attach_at(parent_id, child_id, to)
    }

    fn update_text(&mut self, node: NodeKey, text: &str) -> Result<()> {
        self.record()?;
        match &mut self.node_mut(node)?.kind {
            NodeKind::Text { text: current } => {
                text.clone_into(current);
                Ok(())
            }
            NodeKind::Element { .. } | NodeKind::MountPoint => {
                bail!("host node {node} is not a text node")
            }
        }
    }

    fn attach_root(&mut self, node: NodeKey) -> Result<()> {
        self.record()?;
        let id = self.resolve(node)?;
        self.ensure_detached(id, node)?;
        self.mount_point
            .checked_append(id, &mut self.arena)
            .map_err(|err| anyhow!("attach failed: {err}"))
    }

    fn detach_root(&mut self, node: NodeKey) -> Result<()> {
        self.record()?;
        let id = self.resolve(node)?;
        if self.parent_of(id) != Some(self.mount_point) {
            bail!("host node {node} is not attached to the mount point");
        }
        id.detach(&mut self.arena);
        Ok(())
    }
}

/// Shared handle to a [`DomTree`], so tests can keep reading the output
/// after handing the host to the reconciler.
#[derive(Debug, Clone, Default)]
pub struct MemoryDom {
    inner: Rc<RefCell<DomTree>>,
}

impl MemoryDom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialized children of the mount point, like `innerHTML`.
    pub fn inner_html(&self) -> String {
        self.inner.borrow().inner_html()
    }

    /// Deterministic JSON snapshot of the mount point.
    pub fn to_json_value(&self) -> serde_json::Value {
        self.inner.borrow().to_json_value()
    }

    pub fn node_count(&self) -> usize {
        self.inner.borrow().node_count()
    }

    pub fn operations(&self) -> u64 {
        self.inner.borrow().operations()
    }

    pub fn root_children(&self) -> Vec<NodeKey> {
        self.inner.borrow().root_children()
    }

    pub fn children_of(&self, key: NodeKey) -> Vec<NodeKey> {
        self.inner.borrow().children_of(key)
    }

    pub fn node(&self, key: NodeKey) -> Option<DomNode> {
        self.inner.borrow().node(key).cloned()
    }

    pub fn fail_after(&self, remaining: Option<u64>) {
        self.inner.borrow_mut().fail_after(remaining);
    }
}

impl HostRenderer for MemoryDom {
    fn create_element(&mut self, node: NodeKey, tag: &str) -> Result<()> {
        self.inner.borrow_mut().create_element(node, tag)
    }

    fn create_text(&mut self, node: NodeKey, text: &str) -> Result<()> {
        self.inner.borrow_mut().create_text(node, text)
    }

    fn remove_element(&mut self, node: NodeKey) -> Result<()> {
        self.inner.borrow_mut().remove_element(node)
    }

    fn replace_element(&mut self, old: NodeKey, new: NodeKey) -> Result<()> {
        self.inner.borrow_mut().replace_element(old, new)
    }

    fn set_attribute(&mut self, node: NodeKey, name: &str, value: &str) -> Result<()> {
        self.inner.borrow_mut().set_attribute(node, name, value)
    }

    fn remove_attribute(&mut self, node: NodeKey, name: &str) -> Result<()> {
        self.inner.borrow_mut().remove_attribute(node, name)
    }

    fn insert_child(&mut self, parent: NodeKey, child: NodeKey, index: usize) -> Result<()> {
        self.inner.borrow_mut().insert_child(parent, child, index)
    }

    fn remove_child(&mut self, parent: NodeKey, index: usize) -> Result<()> {
        self.inner.borrow_mut().remove_child(parent, index)
    }

    fn move_child(&mut self, parent: NodeKey, from: usize, to: usize) -> Result<()> {
        self.inner.borrow_mut().move_child(parent, from, to)
    }

    fn update_text(&mut self, node: NodeKey, text: &str) -> Result<()> {
        self.inner.borrow_mut().update_text(node, text)
    }

    fn attach_root(&mut self, node: NodeKey) -> Result<()> {
        self.inner.borrow_mut().attach_root(node)
    }

    fn detach_root(&mut self, node: NodeKey) -> Result<()> {
        self.inner.borrow_mut().detach_root(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(dom: &mut MemoryDom, items: &[&str]) -> Result<NodeKey> {
        let parent = NodeKey(100);
        dom.create_element(parent, "ul")?;
        for (index, item) in items.iter().enumerate() {
            let li = NodeKey(200 + index as u64);
            let text = NodeKey(300 + index as u64);
            dom.create_element(li, "li")?;
            dom.create_text(text, item)?;
            dom.insert_child(li, text, 0)?;
            dom.insert_child(parent, li, index)?;
        }
        dom.attach_root(parent)?;
        Ok(parent)
    }

    #[test]
    fn builds_and_prints_a_subtree() -> Result<()> {
        let mut dom = MemoryDom::new();
        dom.create_element(NodeKey(1), "span")?;
        dom.set_attribute(NodeKey(1), "class", "yup")?;
        dom.create_text(NodeKey(2), "Hello World")?;
        dom.insert_child(NodeKey(1), NodeKey(2), 0)?;
        assert_eq!(dom.inner_html(), "");
        dom.attach_root(NodeKey(1))?;
        assert_eq!(dom.inner_html(), r#"<span class="yup">Hello World</span>"#);
        Ok(())
    }

    #[test]
    fn move_child_lands_at_target_index() -> Result<()> {
        let mut dom = MemoryDom::new();
        let parent = list(&mut dom, &["a", "b", "c"])?;
        dom.move_child(parent, 2, 0)?;
        assert_eq!(dom.inner_html(), "<ul><li>c</li><li>a</li><li>b</li></ul>");
        dom.move_child(parent, 0, 2)?;
        assert_eq!(dom.inner_html(), "<ul><li>a</li><li>b</li><li>c</li></ul>");
        Ok(())
    }

    #[test]
    fn remove_child_forgets_the_whole_subtree() -> Result<()> {
        let mut dom = MemoryDom::new();
        let parent = list(&mut dom, &["a", "b"])?;
        assert_eq!(dom.node_count(), 5);
        dom.remove_child(parent, 0)?;
        assert_eq!(dom.inner_html(), "<ul><li>b</li></ul>");
        assert_eq!(dom.node_count(), 3);
        assert!(dom.node(NodeKey(300)).is_none());
        Ok(())
    }

    #[test]
    fn replace_works_at_the_mount_point() -> Result<()> {
        let mut dom = MemoryDom::new();
        let parent = list(&mut dom, &["a"])?;
        dom.create_element(NodeKey(9), "div")?;
        dom.replace_element(parent, NodeKey(9))?;
        assert_eq!(dom.inner_html(), "<div></div>");
        assert_eq!(dom.node_count(), 1);
        assert_eq!(dom.root_children(), [NodeKey(9)]);
        Ok(())
    }

    #[test]
    fn detach_then_remove_empties_the_mount_point() -> Result<()> {
        let mut dom = MemoryDom::new();
        let parent = list(&mut dom, &["a"])?;
        dom.detach_root(parent)?;
        assert_eq!(dom.inner_html(), "");
        dom.remove_element(parent)?;
        assert_eq!(dom.node_count(), 0);
        Ok(())
    }

    fn rejected(outcome: &Result<()>) -> bool {
        outcome.is_err()
    }

    #[test]
    fn invalid_operations_are_errors() -> Result<()> {
        let mut dom = MemoryDom::new();
        assert!(rejected(&dom.remove_element(NodeKey(42))));
        dom.create_text(NodeKey(1), "x")?;
        assert!(rejected(&dom.set_attribute(NodeKey(1), "id", "nope")));
        assert!(rejected(&dom.create_text(NodeKey(1), "again")));
        dom.create_element(NodeKey(2), "p")?;
        assert!(rejected(&dom.insert_child(NodeKey(2), NodeKey(1), 3)));
        assert!(rejected(&dom.update_text(NodeKey(2), "text")));
        Ok(())
    }

    #[test]
    fn injected_failure_stops_operations() -> Result<()> {
        let mut dom = MemoryDom::new();
        dom.fail_after(Some(1));
        dom.create_element(NodeKey(1), "p")?;
        assert!(rejected(&dom.create_element(NodeKey(2), "p")));
        assert_eq!(dom.operations(), 1);
        Ok(())
    }
}
