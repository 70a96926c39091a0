//! Deferred task queue.
//!
//! Work that must not run inside the call that scheduled it (view post-render
//! hooks, for one) is posted here and drained later, in posting order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::Result;

/// A unique identifier for a deferred task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Get the raw u64 value of this task ID.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

fn next_task_id() -> TaskId {
    TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
}

/// A boxed task closure.
pub type DeferredTask = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

struct TaskData {
    id: TaskId,
    task: DeferredTask,
}

/// FIFO queue of deferred tasks.
pub struct DeferredQueue {
    tasks: VecDeque<TaskData>,
    /// Maximum number of tasks run by one batch.
    batch_size: usize,
}

impl DeferredQueue {
    /// Default number of tasks run per batch.
    pub const DEFAULT_BATCH_SIZE: usize = 10;

    /// Create an empty queue.
    pub fn new() -> Self {
        Self::with_batch_size(Self::DEFAULT_BATCH_SIZE)
    }

    /// Create an empty queue with a custom batch size (at least one).
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            tasks: VecDeque::new(),
            batch_size: batch_size.max(1),
        }
    }

    /// Post a task. Returns an ID that can be used to cancel it.
    pub fn post<F>(&mut self, task: F) -> TaskId
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let id = next_task_id();
        self.tasks.push_back(TaskData {
            id,
            task: Box::new(task),
        });
        tracing::trace!(target: "lateralus::deferred", task = id.as_u64(), pending = self.tasks.len(), "task posted");
        id
    }

    /// Cancel a pending task. Returns `true` if it was still queued.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        match self.tasks.iter().position(|t| t.id == id) {
            Some(pos) => {
                self.tasks.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Whether any task is queued.
    pub fn has_pending(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Number of queued tasks.
    pub fn pending_count(&self) -> usize {
        self.tasks.len()
    }

    /// Remove the oldest task without running it.
    pub fn pop_next(&mut self) -> Option<(TaskId, DeferredTask)> {
        self.tasks.pop_front().map(|t| (t.id, t.task))
    }

    /// Maximum number of tasks run by one batch.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Set the batch size (at least one).
    pub fn set_batch_size(&mut self, size: usize) {
        self.batch_size = size.max(1);
    }
}

impl Default for DeferredQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// A lockable [`DeferredQueue`] that never holds its lock while a task runs.
///
/// Tasks may post further tasks; those run in the same drain if it has not
/// reached its limit.
#[derive(Default)]
pub struct SharedDeferredQueue {
    inner: Mutex<DeferredQueue>,
}

impl SharedDeferredQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty queue with a custom batch size.
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            inner: Mutex::new(DeferredQueue::with_batch_size(batch_size)),
        }
    }

    /// Post a task.
    pub fn post<F>(&self, task: F) -> TaskId
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.inner.lock().post(task)
    }

    /// Cancel a pending task.
    pub fn cancel(&self, id: TaskId) -> bool {
        self.inner.lock().cancel(id)
    }

    /// Whether any task is queued.
    pub fn has_pending(&self) -> bool {
        self.inner.lock().has_pending()
    }

    /// Number of queued tasks.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending_count()
    }

    /// Set the batch size.
    pub fn set_batch_size(&self, size: usize) {
        self.inner.lock().set_batch_size(size);
    }

    /// Drop every queued task without running it.
    pub fn clear(&self) -> usize {
        let mut queue = self.inner.lock();
        let count = queue.tasks.len();
        queue.tasks.clear();
        count
    }

    /// Run up to one batch of tasks. Returns how many ran.
    ///
    /// Stops at the first failing task; tasks after it stay queued.
    pub fn process_batch(&self) -> Result<usize> {
        let limit = self.inner.lock().batch_size();
        self.drain(limit)
    }

    /// Run tasks until the queue is empty. Returns how many ran.
    pub fn process_all(&self) -> Result<usize> {
        self.drain(usize::MAX)
    }

    fn drain(&self, limit: usize) -> Result<usize> {
        let mut ran = 0;
        while ran < limit {
            // Lock released before the task runs.
            let next = self.inner.lock().pop_next();
            let Some((id, task)) = next else {
                break;
            };
            tracing::trace!(target: "lateralus::deferred", task = id.as_u64(), "running deferred task");
            task()?;
            ran += 1;
        }
        Ok(ran)
    }
}
