//! Bounded, priority-ordered task queue for the Index Engine.
//!
//! A `BinaryHeap` gives cheap priority ordering; a `HashSet` of queued paths
//! lets `submit` coalesce an already-queued path into a no-op instead of
//! scheduling the same reindex twice within `coalesce_window` submissions.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use crate::error::{IndexError, IndexResult};
use crate::model::{IndexTask, TaskKind, TaskState};

#[derive(Debug, Clone)]
struct QueuedTask {
    task: IndexTask,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.task.priority == other.task.priority
            && self.task.submitted_seq == other.task.submitted_seq
    }
}
impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    /// Higher priority first; among equal priorities, earlier submission
    /// first (FIFO), hence the reversed comparison on `submitted_seq`.
    fn cmp(&self, other: &Self) -> Ordering {
        self.task
            .priority
            .cmp(&other.task.priority)
            .then_with(|| other.task.submitted_seq.cmp(&self.task.submitted_seq))
    }
}

pub struct TaskQueue {
    heap: BinaryHeap<QueuedTask>,
    queued_paths: HashSet<String>,
    capacity: usize,
    coalesce_window: usize,
    next_seq: u64,
    submissions_since_last_coalesce_check: usize,
}

impl TaskQueue {
    pub fn new(capacity: usize, coalesce_window: usize) -> Self {
        Self {
            heap: BinaryHeap::new(),
            queued_paths: HashSet::new(),
            capacity,
            coalesce_window,
            next_seq: 0,
            submissions_since_last_coalesce_check: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Submits a task. Returns `Ok(true)` if it was queued, `Ok(false)` if it
    /// was coalesced into an already-queued task for the same path, and
    /// `Err(QueueFull)` if the queue is at capacity.
    pub fn submit(
        &mut self,
        target_path: String,
        kind: TaskKind,
        priority: i32,
        id: String,
    ) -> IndexResult<bool> {
        self.submissions_since_last_coalesce_check += 1;
        if self.submissions_since_last_coalesce_check <= self.coalesce_window
            && self.queued_paths.contains(&target_path)
        {
            return Ok(false);
        }

        if self.heap.len() >= self.capacity {
            return Err(IndexError::QueueFull {
                path: target_path.into(),
                capacity: self.capacity,
            });
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.queued_paths.insert(target_path.clone());

        self.heap.push(QueuedTask {
            task: IndexTask {
                id,
                target_path,
                kind,
                priority,
                submitted_seq: seq,
                state: TaskState::Queued,
                error: None,
            },
        });
        if self.submissions_since_last_coalesce_check > self.coalesce_window {
            self.submissions_since_last_coalesce_check = 0;
        }
        Ok(true)
    }

    pub fn pop(&mut self) -> Option<IndexTask> {
        let queued = self.heap.pop()?;
        self.queued_paths.remove(&queued.task.target_path);
        Some(queued.task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_priority_tasks_pop_first() {
        let mut queue = TaskQueue::new(16, 4);
        queue
            .submit("a.rs".into(), TaskKind::IndexFile, 1, "1".into())
            .unwrap();
        queue
            .submit("b.rs".into(), TaskKind::IndexFile, 5, "2".into())
            .unwrap();
        let first = queue.pop().unwrap();
        assert_eq!(first.target_path, "b.rs");
    }

    #[test]
    fn equal_priority_is_fifo() {
        let mut queue = TaskQueue::new(16, 4);
        queue
            .submit("a.rs".into(), TaskKind::IndexFile, 1, "1".into())
            .unwrap();
        queue
            .submit("b.rs".into(), TaskKind::IndexFile, 1, "2".into())
            .unwrap();
        assert_eq!(queue.pop().unwrap().target_path, "a.rs");
        assert_eq!(queue.pop().unwrap().target_path, "b.rs");
    }

    #[test]
    fn duplicate_path_within_window_is_coalesced() {
        let mut queue = TaskQueue::new(16, 4);
        queue
            .submit("a.rs".into(), TaskKind::IndexFile, 1, "1".into())
            .unwrap();
        let coalesced = queue
            .submit("a.rs".into(), TaskKind::Reindex, 1, "2".into())
            .unwrap();
        assert!(!coalesced);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn full_queue_rejects_submissions() {
        let mut queue = TaskQueue::new(1, 4);
        queue
            .submit("a.rs".into(), TaskKind::IndexFile, 1, "1".into())
            .unwrap();
        let err = queue
            .submit("b.rs".into(), TaskKind::IndexFile, 1, "2".into())
            .unwrap_err();
        assert!(matches!(err, IndexError::QueueFull { .. }));
    }
}
