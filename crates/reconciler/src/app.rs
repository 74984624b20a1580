//! Application surface: mounting a root, rendering into a host and flushing.
//!
//! One [`App`] owns one snapshot, one scheduler and at most one host. Flushes
//! never overlap: a request made while a flush runs (from a hook, say) is
//! folded into that flush or into the next one.

use crate::applier::PatchApplier;
use crate::config::RenderOptions;
use crate::diff::{Differ, Effect, StateSink};
use crate::frames::FrameScheduler;
use crate::registry::Phase;
use crate::scheduler::{Request, Scheduler};
use crate::telemetry::{FlushCounters, maybe_emit};
use crate::tree::Snapshot;
use anyhow::{Result, bail};
use core::cell::{Cell, RefCell};
use log::{debug, error, warn};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::info_span;
use vdom::{HookContext, HostRenderer, InstanceId, KeyAllocator, NodePath, State, VirtualNode};

/// Upper bound on back-to-back passes of one immediate flush.
const MAX_PASSES: u32 = 32;

/// Everything that only exists while the application is rendered.
struct Engine {
    host: Box<dyn HostRenderer>,
    keys: KeyAllocator,
    snapshot: Snapshot,
    sink: StateSink,
}

impl Engine {
    /// One diff + patch pass against `root`.
    fn flush(
        &mut self,
        root: Option<&VirtualNode>,
        mailbox: HashMap<InstanceId, State>,
        counters: &mut FlushCounters,
    ) -> Result<()> {
        for (instance, partial) in mailbox {
            if !self.snapshot.registry.queue_pending(instance, partial) {
                debug!(target: "reconciler", "dropping state sent to unmounted {instance}");
            }
        }

        let old = self.snapshot.tree.take();
        let mut differ = Differ::new(&mut self.snapshot.registry, &mut self.keys, &self.sink);
        let tree = differ.reconcile(old, root);
        let outcome = differ.finish();
        self.snapshot.tree = tree;

        let mut applier = PatchApplier::new(self.host.as_mut());
        let applied = applier.apply_all(&outcome.patches);
        let mut stats = outcome.stats;
        stats.patches = applier.applied();
        counters.record(&stats);
        applied?;

        debug!(
            target: "reconciler",
            "flush applied {} patches, {} renders, {} hooks",
            stats.patches,
            stats.renders,
            outcome.effects.len()
        );
        self.run_effects(&outcome.effects);
        Ok(())
    }

    fn run_effects(&self, effects: &[Effect]) {
        for effect in effects {
            let (id, previous) = match effect {
                Effect::AfterMount(id) => (*id, None),
                Effect::AfterUpdate {
                    instance,
                    prev_props,
                    prev_state,
                } => (*instance, Some((prev_props, prev_state))),
            };
            let Some(entry) = self.snapshot.registry.get(id) else {
                continue;
            };
            let Some(rendered) = entry.rendered.as_ref() else {
                continue;
            };
            let context = HookContext {
                instance: id,
                host: rendered.host(),
                props: &entry.props,
                state: &entry.state,
                previous,
                send: &entry.updater,
            };
            match effect {
                Effect::AfterMount(_) => entry.component.after_mount(&context),
                Effect::AfterUpdate { .. } => entry.component.after_update(&context),
            }
        }
    }
}

struct Shared {
    root: RefCell<Option<VirtualNode>>,
    scheduler: RefCell<Scheduler>,
    engine: RefCell<Option<Engine>>,
    frames: RefCell<Option<Rc<dyn FrameScheduler>>>,
    counters: Cell<FlushCounters>,
    telemetry: Cell<bool>,
    flushing: Cell<bool>,
    rerun: Cell<bool>,
    removal_requested: Cell<bool>,
}

impl Shared {
    fn dispatch(self: &Rc<Self>, request: Request) -> Result<()> {
        match request {
            Request::FlushNow => self.flush(),
            Request::ScheduleFrame => {
                self.schedule_frame();
                Ok(())
            }
            Request::Absorbed | Request::Ignored => Ok(()),
        }
    }

    fn schedule_frame(self: &Rc<Self>) {
        let frames = self.frames.borrow().as_ref().map(Rc::clone);
        let Some(frames) = frames else {
            return;
        };
        let weak = Rc::downgrade(self);
        let id = frames.request_frame(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.run_frame();
            }
        }));
        self.scheduler.borrow_mut().frame_scheduled(id);
    }

    fn run_frame(self: &Rc<Self>) {
        let due = self.scheduler.borrow_mut().frame_fired();
        if due && let Err(err) = self.flush() {
            error!(target: "reconciler", "scheduled flush failed: {err:#}");
        }
    }

    fn cancel_pending_frame(&self) {
        let pending = self.scheduler.borrow_mut().take_pending_frame();
        if let Some(id) = pending
            && let Some(frames) = self.frames.borrow().as_ref()
        {
            frames.cancel_frame(id);
        }
    }

    fn flush(self: &Rc<Self>) -> Result<()> {
        if self.flushing.replace(true) {
            self.rerun.set(true);
            return Ok(());
        }
        let result = self.flush_passes();
        self.flushing.set(false);
        if self.removal_requested.replace(false) {
            let removed = self.remove_now();
            return result.and(removed);
        }
        result
    }

    fn flush_passes(&self) -> Result<()> {
        for pass in 1..=MAX_PASSES {
            self.rerun.set(false);
            let mailbox = self.scheduler.borrow_mut().begin_flush();
            let Some(mailbox) = mailbox else {
                return Ok(());
            };
            let root = self.root.borrow().clone();
            let span = info_span!("flush", pass);
            let _entered = span.enter();
            {
                let mut slot = self.engine.borrow_mut();
                let Some(engine) = slot.as_mut() else {
                    return Ok(());
                };
                let mut counters = self.counters.get();
                let result = engine.flush(root.as_ref(), mailbox, &mut counters);
                self.counters.set(counters);
                result?;
            }
            self.emit_telemetry();
            let again = self.rerun.get() || self.scheduler.borrow().needs_another_pass();
            if !again {
                return Ok(());
            }
        }
        warn!(
            target: "reconciler",
            "updates still pending after {MAX_PASSES} passes; leaving them for the next flush"
        );
        Ok(())
    }

    fn emit_telemetry(&self) {
        let mut counters = self.counters.get();
        counters.coalesced = self.scheduler.borrow().coalesced();
        maybe_emit(self.telemetry.get(), &counters);
    }

    /// Cancel pending work, tear down every instance and clear the host.
    fn remove_now(&self) -> Result<()> {
        let pending = self.scheduler.borrow_mut().tear_down();
        let frames = self.frames.borrow_mut().take();
        if let Some(id) = pending
            && let Some(frames) = frames
        {
            frames.cancel_frame(id);
        }
        let engine = self.engine.borrow_mut().take();
        let Some(mut engine) = engine else {
            return Ok(());
        };
        debug!(target: "reconciler", "removing rendered output");
        self.flushing.set(true);
        let mut counters = self.counters.get();
        let result = engine.flush(None, HashMap::new(), &mut counters);
        self.counters.set(counters);
        self.flushing.set(false);
        result
    }
}

/// A mountable application.
///
/// Clones share the same application.
#[derive(Clone)]
pub struct App {
    shared: Rc<Shared>,
}

impl App {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Rc::new(Shared {
                root: RefCell::new(None),
                scheduler: RefCell::new(Scheduler::detached()),
                engine: RefCell::new(None),
                frames: RefCell::new(None),
                counters: Cell::new(FlushCounters::default()),
                telemetry: Cell::new(false),
                flushing: Cell::new(false),
                rerun: Cell::new(false),
                removal_requested: Cell::new(false),
            }),
        }
    }

    /// Replace the root node. Flushes now in immediate mode, otherwise on the
    /// next frame.
    ///
    /// # Errors
    /// Fails if the node is malformed, or if an immediate flush fails.
    pub fn mount(&self, node: VirtualNode) -> Result<()> {
        node.validate()?;
        *self.shared.root.borrow_mut() = Some(node);
        let request = self.shared.scheduler.borrow_mut().mark_dirty();
        self.shared.dispatch(request)
    }

    /// Clear the root: every instance is torn down and the host output is
    /// detached before this returns.
    ///
    /// # Errors
    /// Returns the host error if removing the output fails.
    pub fn unmount(&self) -> Result<()> {
        *self.shared.root.borrow_mut() = None;
        let request = self.shared.scheduler.borrow_mut().mark_dirty();
        if request == Request::Ignored {
            return Ok(());
        }
        self.shared.cancel_pending_frame();
        self.shared.flush()
    }

    /// Bind the application to a host and run the first flush synchronously.
    ///
    /// # Errors
    /// Fails if the application is already rendered or the first flush fails.
    pub fn render(
        &self,
        host: impl HostRenderer + 'static,
        frames: Rc<dyn FrameScheduler>,
        options: RenderOptions,
    ) -> Result<RenderHandle> {
        let rendered = self.shared.engine.try_borrow().map(|engine| engine.is_some());
        if !matches!(rendered, Ok(false)) {
            bail!("application is already rendered");
        }

        let weak = Rc::downgrade(&self.shared);
        let sink: StateSink = Rc::new(move |instance, partial| {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let request = shared.scheduler.borrow_mut().queue_state(instance, partial);
            if let Err(err) = shared.dispatch(request) {
                error!(target: "reconciler", "flush after state update failed: {err:#}");
            }
        });
        *self.shared.engine.borrow_mut() = Some(Engine {
            host: Box::new(host),
            keys: KeyAllocator::new(),
            snapshot: Snapshot::default(),
            sink,
        });
        *self.shared.frames.borrow_mut() = Some(frames);
        self.shared.telemetry.set(options.telemetry);
        self.shared.scheduler.borrow_mut().attach(options.mode);
        debug!(target: "reconciler", "rendering in {:?} mode", options.mode);

        self.shared.flush()?;
        Ok(RenderHandle {
            shared: Rc::clone(&self.shared),
        })
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of one live instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceSummary {
    pub id: InstanceId,
    pub name: String,
    pub path: NodePath,
    pub phase: Phase,
    pub renders: u64,
}

/// Handle returned by [`App::render`].
pub struct RenderHandle {
    shared: Rc<Shared>,
}

impl RenderHandle {
    /// Detach the output, tear down every instance and cancel pending flushes.
    /// Later mutation requests are ignored.
    ///
    /// # Errors
    /// Returns the host error if clearing the output fails.
    pub fn remove(&self) -> Result<()> {
        if self.shared.flushing.get() {
            self.shared.removal_requested.set(true);
            return Ok(());
        }
        self.shared.remove_now()
    }

    /// Flush pending work now, in either mode.
    ///
    /// # Errors
    /// Returns the first host error of the flush.
    pub fn flush(&self) -> Result<()> {
        self.shared.cancel_pending_frame();
        self.shared.flush()
    }

    /// Running totals over every flush of this application.
    pub fn counters(&self) -> FlushCounters {
        let mut counters = self.shared.counters.get();
        if let Ok(scheduler) = self.shared.scheduler.try_borrow() {
            counters.coalesced = scheduler.coalesced();
        }
        counters
    }

    /// Live instances in tree order. Empty while a flush is running.
    pub fn instances(&self) -> Vec<InstanceId> {
        self.shared
            .engine
            .try_borrow()
            .ok()
            .and_then(|engine| engine.as_ref().map(|live| live.snapshot.instances_in_order()))
            .unwrap_or_default()
    }

    /// Where `id` is mounted and how often it has rendered. `None` for
    /// unknown instances and while a flush is running.
    pub fn instance(&self, id: InstanceId) -> Option<InstanceSummary> {
        let engine = self.shared.engine.try_borrow().ok()?;
        let entry = engine.as_ref()?.snapshot.registry.get(id)?;
        Some(InstanceSummary {
            id,
            name: entry.component.name().to_owned(),
            path: entry.path.clone(),
            phase: entry.phase,
            renders: entry.renders,
        })
    }

    /// Whether [`RenderHandle::remove`] has taken effect.
    pub fn is_removed(&self) -> bool {
        self.shared
            .scheduler
            .try_borrow()
            .is_ok_and(|scheduler| scheduler.is_torn_down())
    }

    /// The application this handle renders.
    pub fn app(&self) -> App {
        App {
            shared: Rc::clone(&self.shared),
        }
    }
}
