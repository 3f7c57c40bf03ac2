use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::executor::types::CallTask;

#[derive(Debug, PartialEq, Eq)]
struct Slot {
    priority: i32,
    seq: u64,
    task_id: String,
}

impl Ord for Slot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of tasks, highest `priority` first.
///
/// Order among equal priorities is not part of the contract.
#[derive(Debug, Default)]
pub struct TaskQueue {
    heap: BinaryHeap<Slot>,
    /// Live task per id, tagged with the seq of its current slot.
    tasks: HashMap<String, (u64, CallTask)>,
    next_seq: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(&mut self, task: CallTask) -> String {
        let task_id = task.task_id.clone();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Slot {
            priority: task.priority,
            seq,
            task_id: task_id.clone(),
        });
        // A resubmitted id replaces the queued task; its old slot goes stale.
        self.tasks.insert(task_id.clone(), (seq, task));
        task_id
    }

    /// Pop the most urgent task, or `None` when empty.
    pub fn get_task(&mut self) -> Option<CallTask> {
        while let Some(slot) = self.heap.pop() {
            let live = matches!(self.tasks.get(&slot.task_id), Some((seq, _)) if *seq == slot.seq);
            if live {
                return self.tasks.remove(&slot.task_id).map(|(_, task)| task);
            }
        }
        None
    }

    /// Look up a queued task without removing it.
    pub fn get(&self, task_id: &str) -> Option<&CallTask> {
        self.tasks.get(task_id).map(|(_, task)| task)
    }

    /// Remove every task, in dequeue order.
    pub fn drain(&mut self) -> Vec<CallTask> {
        std::iter::from_fn(|| self.get_task()).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.tasks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::types::Params;

    fn task(priority: i32) -> CallTask {
        CallTask::new("x", Params::new()).with_priority(priority)
    }

    #[test]
    fn dequeues_highest_priority_first() {
        let mut q = TaskQueue::new();
        q.add_task(task(1));
        q.add_task(task(10));
        q.add_task(task(-3));
        q.add_task(task(5));

        let order: Vec<i32> = q.drain().into_iter().map(|t| t.priority).collect();
        assert_eq!(order, vec![10, 5, 1, -3]);
        assert!(q.is_empty());
    }

    #[test]
    fn side_table_tracks_queued_tasks() {
        let mut q = TaskQueue::new();
        let id = q.add_task(task(1));
        assert_eq!(q.get(&id).map(|t| t.priority), Some(1));
        assert_eq!(q.len(), 1);

        let popped = q.get_task().unwrap();
        assert_eq!(popped.task_id, id);
        assert!(q.get(&id).is_none());
        assert!(q.get_task().is_none());
    }

    #[test]
    fn clear_empties_queue() {
        let mut q = TaskQueue::new();
        q.add_task(task(1));
        q.add_task(task(2));
        q.clear();
        assert_eq!(q.len(), 0);
        assert!(q.get_task().is_none());
    }

    #[test]
    fn resubmitted_task_is_returned_once() {
        let mut q = TaskQueue::new();
        let t = task(1);
        q.add_task(t.clone());
        q.add_task(t);
        assert_eq!(q.len(), 1);
        assert!(q.get_task().is_some());
        assert!(q.get_task().is_none());
    }

    #[test]
    fn resubmission_takes_the_new_priority() {
        let mut q = TaskQueue::new();
        let urgent = task(10);
        let id = q.add_task(urgent.clone());
        q.add_task(task(5));
        q.add_task(urgent.with_priority(1));

        let first = q.get_task().unwrap();
        assert_eq!(first.priority, 5);
        let second = q.get_task().unwrap();
        assert_eq!((second.task_id.as_str(), second.priority), (id.as_str(), 1));
        assert!(q.get_task().is_none());
    }
}
