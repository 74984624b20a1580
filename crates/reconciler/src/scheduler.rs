use crate::config::Mode;
use crate::frames::FrameId;
use core::mem;
use std::collections::HashMap;
use vdom::{InstanceId, State, merge_state};

/// What the caller has to do after recording a mutation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Request {
    /// Immediate mode: run a flush before returning.
    FlushNow,
    /// Batched mode and no frame pending yet: register one.
    ScheduleFrame,
    /// Covered by a flush that is already pending or not yet possible.
    Absorbed,
    /// The application was torn down.
    Ignored,
}

/// Per-application flush bookkeeping: the dirty flag, the pending frame and
/// the state updates sent since the last flush.
///
/// The scheduler never renders; it only tells its owner when to.
#[derive(Debug)]
pub struct Scheduler {
    mode: Mode,
    attached: bool,
    torn_down: bool,
    dirty: bool,
    frame_requested: bool,
    pending_frame: Option<FrameId>,
    mailbox: HashMap<InstanceId, State>,
    coalesced: u64,
}

impl Scheduler {
    /// A scheduler for an application that has no host yet. Requests are
    /// recorded and picked up by the first flush.
    pub fn detached() -> Self {
        Self {
            mode: Mode::Batched,
            attached: false,
            torn_down: false,
            dirty: false,
            frame_requested: false,
            pending_frame: None,
            mailbox: HashMap::new(),
            coalesced: 0,
        }
    }

    /// Start serving a freshly rendered application.
    pub fn attach(&mut self, mode: Mode) {
        self.mode = mode;
        self.attached = true;
        self.torn_down = false;
        self.frame_requested = false;
        self.pending_frame = None;
    }

    #[inline]
    pub const fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Requests absorbed into an already pending flush.
    #[inline]
    pub const fn coalesced(&self) -> u64 {
        self.coalesced
    }

    /// Record that the root node changed.
    pub fn mark_dirty(&mut self) -> Request {
        if self.torn_down {
            return Request::Ignored;
        }
        let was_dirty = mem::replace(&mut self.dirty, true);
        if !self.attached {
            return Request::Absorbed;
        }
        match self.mode {
            Mode::Immediate => Request::FlushNow,
            Mode::Batched if self.frame_requested => {
                if was_dirty {
                    self.coalesced = self.coalesced.saturating_add(1);
                }
                Request::Absorbed
            }
            Mode::Batched => {
                self.frame_requested = true;
                Request::ScheduleFrame
            }
        }
    }

    /// Merge a partial state into the instance's mailbox entry and mark the
    /// application dirty.
    pub fn queue_state(&mut self, instance: InstanceId, partial: State) -> Request {
        if self.torn_down {
            return Request::Ignored;
        }
        merge_state(self.mailbox.entry(instance).or_default(), partial);
        self.mark_dirty()
    }

    /// Remember the frame registered after [`Request::ScheduleFrame`].
    pub fn frame_scheduled(&mut self, id: FrameId) {
        self.pending_frame = Some(id);
    }

    /// Forget the pending frame, returning it so it can be cancelled.
    pub fn take_pending_frame(&mut self) -> Option<FrameId> {
        self.frame_requested = false;
        self.pending_frame.take()
    }

    /// The pending frame fired. Returns whether there is anything to flush.
    pub fn frame_fired(&mut self) -> bool {
        self.frame_requested = false;
        self.pending_frame = None;
        self.dirty && !self.torn_down
    }

    /// Whether a running flush must go around again before returning.
    pub const fn needs_another_pass(&self) -> bool {
        self.dirty && !self.torn_down && matches!(self.mode, Mode::Immediate)
    }

    /// Clear the dirty flag and hand over the state updates collected so far.
    /// `None` once torn down.
    pub fn begin_flush(&mut self) -> Option<HashMap<InstanceId, State>> {
        if self.torn_down {
            return None;
        }
        self.dirty = false;
        Some(mem::take(&mut self.mailbox))
    }

    /// Stop accepting requests. Returns the pending frame to cancel.
    pub fn tear_down(&mut self) -> Option<FrameId> {
        self.torn_down = true;
        self.attached = false;
        self.dirty = false;
        self.mailbox.clear();
        self.take_pending_frame()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::detached()
    }
}
