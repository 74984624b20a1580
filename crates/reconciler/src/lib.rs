//! Component reconciliation engine.
//!
//! Applications describe their UI as [`vdom::VirtualNode`] trees. An [`App`]
//! diffs every new tree against what is currently rendered, drives the
//! lifecycle hooks of the component instances it finds, and applies the
//! resulting patches to a [`vdom::HostRenderer`]. State updates sent by
//! components are batched so that each affected instance renders at most once
//! per flush.

#![allow(
    clippy::module_name_repetitions,
    reason = "Types are re-exported at the crate root under their full names"
)]
#![allow(
    clippy::missing_errors_doc,
    reason = "Errors are host errors, documented on the public entry points"
)]

pub mod app;
pub mod applier;
pub mod config;
pub mod diff;
pub mod frames;
pub mod registry;
pub mod scheduler;
pub mod telemetry;
pub mod tree;

pub use app::{App, InstanceSummary, RenderHandle};
pub use applier::PatchApplier;
pub use config::{Mode, ReconcilerConfig, RenderOptions};
pub use diff::{Differ, Effect, Reconciliation, StateSink};
pub use frames::{
    FrameCallback, FrameId, FrameLoop, FrameScheduler, ManualFrames, TokioFrames, frame_channel,
};
pub use registry::{ComponentInstance, InstanceRegistry, Phase};
pub use scheduler::{Request, Scheduler};
pub use telemetry::{FlushCounters, PassStats};
pub use tree::{Mounted, Snapshot};
