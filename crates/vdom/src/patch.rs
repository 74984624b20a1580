//! Patch protocol between the diff engine and host renderers.
//!
//! Invariants:
//! - Patches are applied in order; indices in child operations are valid for
//!   the state produced by every earlier patch of the same sequence.
//! - Created nodes start detached and are attached by `InsertChild`,
//!   `ReplaceElement` or `AttachRoot`.
//! - `RemoveChild`, `ReplaceElement` and `RemoveElement` discard the affected
//!   subtree; its keys are invalid for the rest of the sequence.
//! - Component variants mark instance boundaries. They carry the patches of
//!   the instance's own subtree and have no host effect of their own.

use crate::keys::{InstanceId, NodeKey};
use serde::Serialize;

/// One host mutation instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "op")]
pub enum Patch {
    CreateElement { node: NodeKey, tag: String },
    CreateText { node: NodeKey, text: String },
    RemoveElement { node: NodeKey },
    /// Put the detached `new` node where `old` sits and discard `old`.
    ReplaceElement { old: NodeKey, new: NodeKey },
    SetAttribute { node: NodeKey, name: String, value: String },
    RemoveAttribute { node: NodeKey, name: String },
    InsertChild { parent: NodeKey, child: NodeKey, index: usize },
    RemoveChild { parent: NodeKey, index: usize },
    /// Detach the child at `from` and reinsert it so it ends up at `to`.
    MoveChild { parent: NodeKey, from: usize, to: usize },
    UpdateText { node: NodeKey, text: String },
    /// Attach a detached node as the application's output at the mount point.
    AttachRoot { node: NodeKey },
    /// Detach the application's output from the mount point without discarding it.
    DetachRoot { node: NodeKey },
    MountComponent { instance: InstanceId, name: String, patches: Vec<Patch> },
    UpdateComponent { instance: InstanceId, name: String, patches: Vec<Patch> },
    UnmountComponent { instance: InstanceId, name: String },
}

impl Patch {
    /// Number of host operations in this patch, counting nested component patches.
    #[must_use]
    pub fn host_operations(&self) -> usize {
        match self {
            Self::MountComponent { patches, .. } | Self::UpdateComponent { patches, .. } => {
                patches.iter().map(Self::host_operations).sum()
            }
            Self::UnmountComponent { .. } => 0,
            _ => 1,
        }
    }
}

/// Flatten a patch sequence into host operations in application order.
#[must_use]
pub fn host_operations(patches: &[Patch]) -> Vec<&Patch> {
    let mut flat = Vec::with_capacity(patches.len());
    collect(patches, &mut flat);
    flat
}

fn collect<'patch>(patches: &'patch [Patch], flat: &mut Vec<&'patch Patch>) {
    for patch in patches {
        match patch {
            Patch::MountComponent { patches: nested, .. }
            | Patch::UpdateComponent { patches: nested, .. } => collect(nested, flat),
            Patch::UnmountComponent { .. } => {}
            other => flat.push(other),
        }
    }
}
