//! Stable identities shared between the reconciler and host renderers.

use core::fmt;
use serde::Serialize;

/// A 64-bit stable key for host nodes.
///
/// Keys are minted by the reconciler when it emits a create patch; hosts keep
/// their own mapping from key to native node.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord, Serialize)]
pub struct NodeKey(pub u64);

/// Identity of a live component instance. Never reused within one key space.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord, Serialize)]
pub struct InstanceId(pub u64);

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Per-application counters minting node keys and instance ids.
#[derive(Debug, Clone)]
pub struct KeyAllocator {
    next_node: u64,
    next_instance: u64,
}

impl KeyAllocator {
    /// Create an allocator. Zero is never handed out so it can act as a sentinel.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_node: 1,
            next_instance: 1,
        }
    }

    /// Mint a fresh host node key.
    #[inline]
    pub fn node(&mut self) -> NodeKey {
        let key = NodeKey(self.next_node);
        self.next_node = self.next_node.wrapping_add(1);
        key
    }

    /// Mint a fresh component instance id.
    #[inline]
    pub fn instance(&mut self) -> InstanceId {
        let id = InstanceId(self.next_instance);
        self.next_instance = self.next_instance.wrapping_add(1);
        id
    }
}

impl Default for KeyAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// One step from a parent to a child in the virtual tree.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// Unkeyed child, addressed by its position among siblings.
    Index(usize),
    /// Child carrying an explicit sibling key.
    Key(String),
}

impl PathSegment {
    /// Segment for a child with an optional explicit key at `index`.
    #[inline]
    #[must_use]
    pub fn for_child(key: Option<&str>, index: usize) -> Self {
        key.map_or(Self::Index(index), |explicit| Self::Key(explicit.to_owned()))
    }
}

/// Position of a node in the tree, from the root down.
///
/// Component instances store their path as a back-reference to where they are
/// mounted; the tree itself never points back at instances.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<PathSegment>);

impl NodePath {
    /// The path of the application root.
    #[inline]
    #[must_use]
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Path of a child of this node.
    #[must_use]
    pub fn child(&self, segment: PathSegment) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.0 {
            match segment {
                PathSegment::Index(index) => write!(f, "/{index}")?,
                PathSegment::Key(key) => write!(f, "/k:{key}")?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_never_hands_out_zero() {
        let mut keys = KeyAllocator::new();
        assert_eq!(keys.node(), NodeKey(1));
        assert_eq!(keys.node(), NodeKey(2));
        assert_eq!(keys.instance(), InstanceId(1));
    }

    #[test]
    fn path_display_mixes_keys_and_indices() {
        let path = NodePath::root()
            .child(PathSegment::Index(0))
            .child(PathSegment::for_child(Some("row-3"), 2))
            .child(PathSegment::for_child(None, 1));
        assert_eq!(path.to_string(), "/0/k:row-3/1");
        assert_eq!(NodePath::root().to_string(), "/");
    }
}
