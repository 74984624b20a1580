//! In-memory host renderer.
//!
//! An arena DOM with one mount point, driven entirely through the
//! [`vdom::HostRenderer`] interface. It serializes its output as HTML or as a
//! deterministic JSON snapshot, which makes it the reference output surface
//! for reconciler tests.

#![allow(
    clippy::missing_errors_doc,
    reason = "Host errors are described once on the HostRenderer trait"
)]

pub mod dom;
mod printing;

pub use dom::{DomNode, DomTree, MemoryDom, NodeKind};
