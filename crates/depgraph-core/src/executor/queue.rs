//! Shared queue of scheduled nodes.
//!
//! Two global injectors: nodes scheduled because some of their outputs
//! became unused go to the priority lane, so memory held by their inputs is
//! released early. Everything else goes to the normal lane. Once an
//! evaluation runs on several threads, every worker batches normal work into
//! its own deque and steals from the others when it runs dry.

use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_deque::{Injector, Steal, Stealer, Worker};

use crate::graph::NodeId;

pub(crate) struct TaskQueue {
    priority: Injector<NodeId>,
    normal: Injector<NodeId>,
    /// Nodes queued or running. Zero means the round is drained.
    pending: AtomicUsize,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            priority: Injector::new(),
            normal: Injector::new(),
            pending: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, node: NodeId, is_priority: bool) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        if is_priority {
            self.priority.push(node);
        } else {
            self.normal.push(node);
        }
    }

    /// Approximate number of queued nodes.
    pub fn len(&self) -> usize {
        self.priority.len() + self.normal.len()
    }

    /// True when nothing is queued and nothing runs.
    pub fn is_idle(&self) -> bool {
        self.pending.load(Ordering::Acquire) == 0
    }

    /// Pops from the global lanes, priority lane first.
    ///
    /// Every `Some` has to be paired with a [`finish`](Self::finish) call.
    pub fn try_pop(&self) -> Option<NodeId> {
        steal_one(&self.priority).or_else(|| steal_one(&self.normal))
    }

    /// Creates the local deques of `count` workers and their stealers.
    pub fn workers(count: usize) -> (Vec<Worker<NodeId>>, Vec<Stealer<NodeId>>) {
        let workers: Vec<Worker<NodeId>> = (0..count).map(|_| Worker::new_fifo()).collect();
        let stealers = workers.iter().map(Worker::stealer).collect();
        (workers, stealers)
    }

    /// Finds the next node for worker `worker_id`.
    ///
    /// Order: the priority lane, the local deque, a batch from the normal
    /// lane, then the other workers' deques. Returns `None` when all of them
    /// look empty; the caller checks [`is_idle`](Self::is_idle) to tell a
    /// drained round from work still running elsewhere.
    ///
    /// Every `Some` has to be paired with a [`finish`](Self::finish) call.
    pub fn pop_for(&self, local: &Worker<NodeId>, stealers: &[Stealer<NodeId>], worker_id: usize) -> Option<NodeId> {
        if let Some(node) = steal_one(&self.priority) {
            return Some(node);
        }
        if let Some(node) = local.pop() {
            return Some(node);
        }
        loop {
            match self.normal.steal_batch_and_pop(local) {
                Steal::Success(node) => return Some(node),
                Steal::Empty => break,
                Steal::Retry => {}
            }
        }
        let count = stealers.len();
        for offset in 1..count {
            if let Some(node) = steal_from(&stealers[(worker_id + offset) % count]) {
                return Some(node);
            }
        }
        None
    }

    pub fn finish(&self) {
        let previous = self.pending.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "finished more nodes than were queued");
    }
}

fn steal_one(injector: &Injector<NodeId>) -> Option<NodeId> {
    loop {
        match injector.steal() {
            Steal::Success(node) => return Some(node),
            Steal::Empty => return None,
            Steal::Retry => {}
        }
    }
}

fn steal_from(stealer: &Stealer<NodeId>) -> Option<NodeId> {
    loop {
        match stealer.steal() {
            Steal::Success(node) => return Some(node),
            Steal::Empty => return None,
            Steal::Retry => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_lane_is_served_first() {
        let queue = TaskQueue::new();
        queue.push(NodeId(2), false);
        queue.push(NodeId(3), true);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.try_pop(), Some(NodeId(3)));
        assert_eq!(queue.try_pop(), Some(NodeId(2)));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn test_idle_after_every_node_finished() {
        let queue = TaskQueue::new();
        assert!(queue.is_idle());
        queue.push(NodeId(4), false);
        let node = queue.try_pop();
        assert_eq!(node, Some(NodeId(4)));
        // Popped but still running.
        assert!(!queue.is_idle());
        queue.finish();
        assert!(queue.is_idle());
    }

    #[test]
    fn test_worker_batches_normal_lane() {
        let queue = TaskQueue::new();
        for i in 10..14 {
            queue.push(NodeId(i), false);
        }
        let (workers, stealers) = TaskQueue::workers(2);

        assert_eq!(queue.pop_for(&workers[0], &stealers, 0), Some(NodeId(10)));
        // The rest of the batch is reachable from the other worker.
        let mut seen = Vec::new();
        while let Some(node) = queue.pop_for(&workers[1], &stealers, 1) {
            seen.push(node);
        }
        while let Some(node) = queue.pop_for(&workers[0], &stealers, 0) {
            seen.push(node);
        }
        seen.sort_by_key(|node| node.0);
        assert_eq!(seen, vec![NodeId(11), NodeId(12), NodeId(13)]);
    }

    #[test]
    fn test_priority_lane_preempts_local_deque() {
        let queue = TaskQueue::new();
        queue.push(NodeId(1), false);
        queue.push(NodeId(2), false);
        let (workers, stealers) = TaskQueue::workers(1);
        assert_eq!(queue.pop_for(&workers[0], &stealers, 0), Some(NodeId(1)));

        queue.push(NodeId(9), true);
        assert_eq!(queue.pop_for(&workers[0], &stealers, 0), Some(NodeId(9)));
        assert_eq!(queue.pop_for(&workers[0], &stealers, 0), Some(NodeId(2)));
    }

    #[test]
    fn test_workers_drain_work_scheduled_while_running() {
        let queue = TaskQueue::new();
        queue.push(NodeId(5), false);
        let (workers, stealers) = TaskQueue::workers(2);
        let first = queue.pop_for(&workers[0], &stealers, 0);
        assert_eq!(first, Some(NodeId(5)));

        // A running node schedules another one before it finishes.
        queue.push(NodeId(6), false);
        queue.finish();
        assert!(!queue.is_idle());
        assert_eq!(queue.pop_for(&workers[1], &stealers, 1), Some(NodeId(6)));
        queue.finish();
        assert!(queue.is_idle());
    }
}
