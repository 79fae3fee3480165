//! Task Queue
//!
//! Pending backlog split into one FIFO band per priority. A pure data structure:
//! it orders tasks but never runs them.

use std::collections::VecDeque;

use uuid::Uuid;

use super::task::{Priority, Task};

#[derive(Debug, Default)]
pub struct TaskQueue {
    /// Indexed by `Priority::band`
    bands: [VecDeque<Task>; 4],
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the tail of the task's priority band.
    ///
    /// Used both for new submissions and for retries, so a retried task queues
    /// behind same-priority work that arrived while it was running.
    pub fn push_back(&mut self, task: Task) {
        self.bands[task.priority.band()].push_back(task);
    }

    /// Returns a task to the head of its priority band, ahead of everything
    /// that was queued behind it.
    pub fn push_front(&mut self, task: Task) {
        self.bands[task.priority.band()].push_front(task);
    }

    /// Removes and returns the first task, highest band first and oldest first
    /// within a band, for which `accept` holds.
    pub fn take_first<F>(&mut self, mut accept: F) -> Option<Task>
    where
        F: FnMut(&Task) -> bool,
    {
        for priority in Priority::DESCENDING {
            let band = &mut self.bands[priority.band()];
            if let Some(index) = band.iter().position(&mut accept) {
                return band.remove(index);
            }
        }
        None
    }

    pub fn get(&self, id: &Uuid) -> Option<&Task> {
        self.iter().find(|task| task.id == *id)
    }

    /// Tasks in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        Priority::DESCENDING
            .into_iter()
            .flat_map(move |priority| self.bands[priority.band()].iter())
    }

    pub fn len(&self) -> usize {
        self.bands.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.iter().all(VecDeque::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn task(kind: &str, priority: Priority) -> Task {
        Task::new(kind, json!(null), priority, 1, 10)
    }

    #[test]
    fn test_priority_then_fifo_order() {
        let mut queue = TaskQueue::new();
        let low = task("a", Priority::Low);
        let critical = task("b", Priority::Critical);
        let medium1 = task("c", Priority::Medium);
        let medium2 = task("d", Priority::Medium);
        let ids = [critical.id, medium1.id, medium2.id, low.id];

        queue.push_back(low);
        queue.push_back(critical);
        queue.push_back(medium1);
        queue.push_back(medium2);

        let order: Vec<Uuid> = std::iter::from_fn(|| queue.take_first(|_| true))
            .map(|t| t.id)
            .collect();
        assert_eq!(order, ids);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_take_first_skips_rejected() {
        let mut queue = TaskQueue::new();
        queue.push_back(task("gpu", Priority::Critical));
        queue.push_back(task("cpu", Priority::Low));

        let taken = queue.take_first(|t| t.kind == "cpu").unwrap();
        assert_eq!(taken.kind, "cpu");
        assert_eq!(queue.len(), 1);
        assert!(queue.take_first(|t| t.kind == "io").is_none());
    }

    #[test]
    fn test_requeue_goes_to_band_tail() {
        let mut queue = TaskQueue::new();
        let first = task("a", Priority::High);
        let second = task("b", Priority::High);
        let first_id = first.id;
        let second_id = second.id;
        queue.push_back(first);
        queue.push_back(second);

        let retried = queue.take_first(|_| true).unwrap();
        assert_eq!(retried.id, first_id);
        queue.push_back(retried);

        assert_eq!(queue.take_first(|_| true).unwrap().id, second_id);
        assert_eq!(queue.take_first(|_| true).unwrap().id, first_id);
    }

    #[test]
    fn test_push_front_keeps_place_in_band() {
        let mut queue = TaskQueue::new();
        let first = task("a", Priority::Medium);
        let second = task("b", Priority::Medium);
        let first_id = first.id;
        queue.push_back(first);
        queue.push_back(second);
        queue.push_back(task("c", Priority::High));

        assert_eq!(queue.take_first(|_| true).unwrap().kind, "c");
        let taken = queue.take_first(|_| true).unwrap();
        assert_eq!(taken.id, first_id);
        queue.push_front(taken);

        assert_eq!(queue.get(&first_id).unwrap().kind, "a");
        let order: Vec<String> = queue.iter().map(|t| t.kind.clone()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }
}
