//! Frame scheduling primitives used by batched flushing.
//!
//! A [`FrameScheduler`] runs each registered callback at most once, on a later
//! tick, in request order. Callbacks registered while a tick is running land
//! in the following tick.

use core::cell::{Cell, RefCell};
use core::mem;
use core::time::Duration;
use log::debug;
use std::collections::VecDeque;
use std::rc::Rc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};

/// Work to run on a future frame.
pub type FrameCallback = Box<dyn FnOnce()>;

/// Handle of a registered frame callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameId(pub u64);

/// Schedule a callback on the next tick.
pub trait FrameScheduler {
    fn request_frame(&self, callback: FrameCallback) -> FrameId;
    /// Drop a callback that has not run yet. Unknown or spent ids are ignored.
    fn cancel_frame(&self, id: FrameId);
}

#[derive(Default)]
struct ManualQueue {
    next_id: u64,
    queue: VecDeque<(FrameId, FrameCallback)>,
}

/// Deterministic frames advanced explicitly with [`ManualFrames::tick`].
///
/// Clones share the same queue, so a test can keep one handle and give the
/// other to the application.
#[derive(Clone, Default)]
pub struct ManualFrames {
    inner: Rc<RefCell<ManualQueue>>,
}

impl ManualFrames {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every callback queued before this call. Returns how many ran.
    pub fn tick(&self) -> usize {
        let batch = mem::take(&mut self.inner.borrow_mut().queue);
        let count = batch.len();
        for (_, callback) in batch {
            callback();
        }
        count
    }

    /// Number of callbacks waiting for the next tick.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.borrow().queue.len()
    }
}

impl FrameScheduler for ManualFrames {
    fn request_frame(&self, callback: FrameCallback) -> FrameId {
        let mut inner = self.inner.borrow_mut();
        inner.next_id = inner.next_id.saturating_add(1);
        let id = FrameId(inner.next_id);
        inner.queue.push_back((id, callback));
        id
    }

    fn cancel_frame(&self, id: FrameId) {
        self.inner.borrow_mut().queue.retain(|(queued, _)| *queued != id);
    }
}

enum FrameMessage {
    Request(FrameId, FrameCallback),
    Cancel(FrameId),
}

/// Sending half of a tokio-driven frame loop.
#[derive(Clone)]
pub struct TokioFrames {
    sender: UnboundedSender<FrameMessage>,
    next_id: Rc<Cell<u64>>,
}

/// Receiving half: owns the timer and runs the callbacks.
///
/// Callbacks are not `Send`; drive the loop from the task that owns the
/// application (for example the body of a current-thread test).
pub struct FrameLoop {
    receiver: UnboundedReceiver<FrameMessage>,
    period: Duration,
    interval: Option<Interval>,
    queued: Vec<(FrameId, FrameCallback)>,
    closed: bool,
}

/// Create a connected frame scheduler and frame loop ticking every `period`.
#[must_use]
pub fn frame_channel(period: Duration) -> (TokioFrames, FrameLoop) {
    let (sender, receiver) = unbounded_channel();
    (
        TokioFrames {
            sender,
            next_id: Rc::new(Cell::new(0)),
        },
        FrameLoop {
            receiver,
            period: period.max(Duration::from_millis(1)),
            interval: None,
            queued: Vec::new(),
            closed: false,
        },
    )
}

impl FrameScheduler for TokioFrames {
    fn request_frame(&self, callback: FrameCallback) -> FrameId {
        let id = FrameId(self.next_id.get().saturating_add(1));
        self.next_id.set(id.0);
        if self.sender.send(FrameMessage::Request(id, callback)).is_err() {
            debug!(target: "reconciler", "frame loop is gone, dropping frame {}", id.0);
        }
        id
    }

    fn cancel_frame(&self, id: FrameId) {
        // A closed loop will never run the callback anyway.
        let _ignored = self.sender.send(FrameMessage::Cancel(id));
    }
}

impl FrameLoop {
    /// Wait for the next tick and run every callback requested before it.
    /// Returns how many callbacks ran.
    pub async fn next_frame(&mut self) -> usize {
        let period = self.period;
        let interval = self.interval.get_or_insert_with(|| {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            timer
        });
        interval.tick().await;
        self.drain();
        let batch = mem::take(&mut self.queued);
        let count = batch.len();
        for (_, callback) in batch {
            callback();
        }
        count
    }

    /// Tick until every scheduler handle is dropped and nothing is queued.
    pub async fn run(mut self) {
        while !self.closed || !self.queued.is_empty() {
            self.next_frame().await;
        }
    }

    /// Whether every [`TokioFrames`] handle has been dropped.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    fn drain(&mut self) {
        loop {
            match self.receiver.try_recv() {
                Ok(FrameMessage::Request(id, callback)) => self.queued.push((id, callback)),
                Ok(FrameMessage::Cancel(id)) => self.queued.retain(|(queued, _)| *queued != id),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
    }
}
