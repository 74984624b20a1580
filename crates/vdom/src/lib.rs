//! Shared model for the reconciler and its host renderers.
//!
//! This crate centralizes the types every subsystem talks through: the
//! immutable [`VirtualNode`] description of a UI tree, component definitions,
//! the stable keys used to address host nodes and component instances, the
//! [`Patch`] protocol produced by diffing, and the [`HostRenderer`] trait that
//! output surfaces implement.

#![allow(
    clippy::module_name_repetitions,
    reason = "Names like ComponentNode read better than Node inside component"
)]

pub mod component;
pub mod error;
pub mod host;
pub mod keys;
pub mod node;
pub mod patch;
pub mod props;

pub use component::{Component, ComponentBuilder, HookContext, Updater};
pub use error::NodeError;
pub use host::HostRenderer;
pub use keys::{InstanceId, KeyAllocator, NodeKey, NodePath, PathSegment};
pub use node::{Attributes, ComponentNode, Element, ElementBuilder, NodeKind, VirtualNode};
pub use patch::{Patch, host_operations};
pub use props::{Props, State, into_state, merge_state, value_text};
