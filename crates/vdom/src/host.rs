//! Interface every output surface implements.

use crate::keys::NodeKey;
use crate::patch::Patch;
use anyhow::Result;

/// Primitive host operations, called by the patch applier in patch order.
///
/// Keys are minted by the reconciler; a host keeps its own mapping from key
/// to native node. Errors abort the running flush and are not rolled back.
pub trait HostRenderer {
    /// Create a detached element.
    fn create_element(&mut self, node: NodeKey, tag: &str) -> Result<()>;
    /// Create a detached text node.
    fn create_text(&mut self, node: NodeKey, text: &str) -> Result<()>;
    /// Discard a node and its subtree, attached or not.
    fn remove_element(&mut self, node: NodeKey) -> Result<()>;
    /// Put detached `new` in place of `old` and discard `old`.
    fn replace_element(&mut self, old: NodeKey, new: NodeKey) -> Result<()>;
    fn set_attribute(&mut self, node: NodeKey, name: &str, value: &str) -> Result<()>;
    fn remove_attribute(&mut self, node: NodeKey, name: &str) -> Result<()>;
    /// Attach detached `child` so that it ends up at `index` under `parent`.
    fn insert_child(&mut self, parent: NodeKey, child: NodeKey, index: usize) -> Result<()>;
    /// Detach and discard the child at `index`.
    fn remove_child(&mut self, parent: NodeKey, index: usize) -> Result<()>;
    fn move_child(&mut self, parent: NodeKey, from: usize, to: usize) -> Result<()>;
    fn update_text(&mut self, node: NodeKey, text: &str) -> Result<()>;
    /// Attach the application's output to the externally supplied mount point.
    fn attach_root(&mut self, node: NodeKey) -> Result<()>;
    /// Detach the application's output from the mount point.
    fn detach_root(&mut self, node: NodeKey) -> Result<()>;

    /// Apply a single host patch. Component boundaries are no-ops here; the
    /// applier walks their nested patches.
    fn apply_patch(&mut self, patch: &Patch) -> Result<()> {
        match patch {
            Patch::CreateElement { node, tag } => self.create_element(*node, tag),
            Patch::CreateText { node, text } => self.create_text(*node, text),
            Patch::RemoveElement { node } => self.remove_element(*node),
            Patch::ReplaceElement { old, new } => self.replace_element(*old, *new),
            Patch::SetAttribute { node, name, value } => self.set_attribute(*node, name, value),
            Patch::RemoveAttribute { node, name } => self.remove_attribute(*node, name),
            Patch::InsertChild { parent, child, index } => {
                self.insert_child(*parent, *child, *index)
            }
            Patch::RemoveChild { parent, index } => self.remove_child(*parent, *index),
            Patch::MoveChild { parent, from, to } => self.move_child(*parent, *from, *to),
            Patch::UpdateText { node, text } => self.update_text(*node, text),
            Patch::AttachRoot { node } => self.attach_root(*node),
            Patch::DetachRoot { node } => self.detach_root(*node),
            Patch::MountComponent { .. }
            | Patch::UpdateComponent { .. }
            | Patch::UnmountComponent { .. } => Ok(()),
        }
    }
}
