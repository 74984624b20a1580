//! The realised tree: what is currently on the host, addressed by node keys.

use crate::registry::InstanceRegistry;
use vdom::{Attributes, Component, InstanceId, NodeKey, NodeKind};

/// One rendered node together with the host node it produced.
///
/// Component entries only point at their instance; the instance owns the
/// rendered subtree. `host` is the root host node of that subtree.
#[derive(Clone, Debug)]
pub enum Mounted {
    Text {
        host: NodeKey,
        text: String,
    },
    /// Realised as an empty text node.
    Empty {
        host: NodeKey,
    },
    Element {
        host: NodeKey,
        tag: String,
        attributes: Attributes,
        key: Option<String>,
        children: Vec<Mounted>,
    },
    Component {
        instance: InstanceId,
        component: Component,
        key: Option<String>,
        host: NodeKey,
    },
}

impl Mounted {
    /// Root host node of this entry.
    #[inline]
    pub const fn host(&self) -> NodeKey {
        match self {
            Self::Text { host, .. }
            | Self::Empty { host }
            | Self::Element { host, .. }
            | Self::Component { host, .. } => *host,
        }
    }

    #[inline]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Element { key, .. } | Self::Component { key, .. } => key.as_deref(),
            Self::Text { .. } | Self::Empty { .. } => None,
        }
    }

    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::Text { .. } => NodeKind::Text,
            Self::Empty { .. } => NodeKind::Empty,
            Self::Element { .. } => NodeKind::Element,
            Self::Component { .. } => NodeKind::Component,
        }
    }
}

/// What is currently rendered: the realised root plus the instances behind it.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub tree: Option<Mounted>,
    pub registry: InstanceRegistry,
}

impl Snapshot {
    /// Instance ids in the order a depth-first walk meets them.
    pub fn instances_in_order(&self) -> Vec<InstanceId> {
        let mut found = Vec::new();
        if let Some(tree) = &self.tree {
            self.collect_instances(tree, &mut found);
        }
        found
    }

    fn collect_instances(&self, node: &Mounted, found: &mut Vec<InstanceId>) {
        match node {
            Mounted::Element { children, .. } => {
                for child in children {
                    self.collect_instances(child, found);
                }
            }
            Mounted::Component { instance, .. } => {
                found.push(*instance);
                let rendered = self
                    .registry
                    .get(*instance)
                    .and_then(|entry| entry.rendered.as_ref());
                if let Some(rendered) = rendered {
                    self.collect_instances(rendered, found);
                }
            }
            Mounted::Text { .. } | Mounted::Empty { .. } => {}
        }
    }
}
