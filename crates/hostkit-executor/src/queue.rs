//! Priority queue of deferred tasks.
//!
//! Tasks are ordered by `(priority, sequence)`: a larger priority always
//! runs first, and among equal priorities the task with the smaller
//! sequence number (posted earlier) runs first.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

use hostkit_core::guard::catch_panic;
use hostkit_core::result::AppResult;

/// Boxed task body. Consumed exactly once.
pub type TaskFn = Box<dyn FnOnce() -> AppResult<()> + Send + 'static>;

/// A queued unit of work.
pub struct Task {
    /// Scheduling priority (larger runs first).
    pub priority: i32,
    /// Insertion sequence number (smaller runs first among equal priorities).
    pub sequence: u64,
    body: TaskFn,
}

impl Task {
    /// Creates a task.
    pub fn new(priority: i32, sequence: u64, body: TaskFn) -> Self {
        Self {
            priority,
            sequence,
            body,
        }
    }

    /// Runs the task body, converting a panic into an error.
    pub fn run(self) -> AppResult<()> {
        catch_panic("task", self.body)
    }

    /// Returns `true` if `self` would run before `other`.
    pub fn runs_before(&self, other: &Task) -> bool {
        self.cmp(other) == Ordering::Greater
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("priority", &self.priority)
            .field("sequence", &self.sequence)
            .field("body", &"<closure>")
            .finish()
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl Eq for Task {}

impl PartialOrd for Task {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Task {
    // Max-heap order: "greater" means "runs first".
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Ordered multiset of pending tasks.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    heap: BinaryHeap<Task>,
}

impl PriorityQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a task.
    pub fn push(&mut self, task: Task) {
        self.heap.push(task);
    }

    /// The task that would run next.
    pub fn peek(&self) -> Option<&Task> {
        self.heap.peek()
    }

    /// Priority of the task that would run next.
    pub fn top_priority(&self) -> Option<i32> {
        self.heap.peek().map(|t| t.priority)
    }

    /// Removes and returns the task that would run next.
    pub fn pop(&mut self) -> Option<Task> {
        self.heap.pop()
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drops every pending task without running it.
    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn recording(log: &Arc<Mutex<Vec<u32>>>, id: u32) -> TaskFn {
        let log = Arc::clone(log);
        Box::new(move || -> AppResult<()> {
            log.lock().push(id);
            Ok(())
        })
    }

    #[test]
    fn test_priority_then_fifo() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = PriorityQueue::new();
        queue.push(Task::new(50, 0, recording(&log, 1)));
        queue.push(Task::new(50, 1, recording(&log, 2)));
        queue.push(Task::new(100, 2, recording(&log, 3)));
        queue.push(Task::new(i32::MIN, 3, recording(&log, 4)));
        queue.push(Task::new(10, 4, recording(&log, 5)));
        queue.push(Task::new(10, 5, recording(&log, 6)));

        while let Some(task) = queue.pop() {
            task.run().unwrap();
        }
        assert_eq!(*log.lock(), vec![3, 1, 2, 5, 6, 4]);
    }

    #[test]
    fn test_clear_never_runs_tasks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut queue = PriorityQueue::new();
        queue.push(Task::new(1, 0, recording(&log, 1)));
        queue.push(Task::new(2, 1, recording(&log, 2)));
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.pop().is_none());
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_runs_before() {
        let a = Task::new(10, 7, Box::new(|| -> AppResult<()> { Ok(()) }));
        let b = Task::new(10, 8, Box::new(|| -> AppResult<()> { Ok(()) }));
        let c = Task::new(11, 9, Box::new(|| -> AppResult<()> { Ok(()) }));
        assert!(a.runs_before(&b));
        assert!(c.runs_before(&a));
        assert!(!b.runs_before(&a));
    }

    #[test]
    fn test_panicking_task_reports_error() {
        let task = Task::new(1, 0, Box::new(|| -> AppResult<()> { panic!("bad task") }));
        let err = task.run().unwrap_err();
        assert!(err.is_panic());
    }
}
