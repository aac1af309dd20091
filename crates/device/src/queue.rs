//! Job Queue
//!
//! A bounded FIFO of `QueuedPoint`, guarded by its own lock, separate from
//! the machine-state lock (spec §3 "Job queue", §4.4 "Queue contract", §5
//! "Always acquire queue lock without holding state lock").

use std::collections::VecDeque;

use thiserror::Error;

/// One submitted target, accepted either as a position or as lengths
/// directly (spec §3 "QueuedPoint").
#[derive(Debug, Clone, Copy)]
pub enum Target {
    Position { x: f64, y: f64 },
    Lengths { l1: f64, l2: f64 },
}

#[derive(Debug, Clone, Copy)]
pub struct QueuedPoint {
    pub target: Target,
    pub pen_down: bool,
    pub speed: u32,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is full")]
    Full,
}

/// The bounded FIFO plus the `executing`/`end_of_job` flags the scheduler
/// reads and writes alongside it (spec §4.4). All operations are atomic
/// under whatever lock wraps this struct (a `parking_lot::Mutex` at the call
/// site, as with `klipper-host`'s `PrinterState`).
pub struct JobQueue {
    points: VecDeque<QueuedPoint>,
    capacity: usize,
    executing: bool,
    end_of_job: bool,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::new(),
            capacity,
            executing: false,
            end_of_job: false,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_executing(&self) -> bool {
        self.executing
    }

    pub fn set_executing(&mut self, executing: bool) {
        self.executing = executing;
    }

    pub fn end_of_job(&self) -> bool {
        self.end_of_job
    }

    pub fn set_end_of_job(&mut self, end_of_job: bool) {
        self.end_of_job = end_of_job;
    }

    /// Appends `points` if doing so would not exceed `capacity`; otherwise
    /// rejects the whole batch and enqueues nothing (spec §4.4, §8 property
    /// 7 "Queue cap").
    pub fn enqueue_many(
        &mut self,
        points: impl IntoIterator<Item = QueuedPoint>,
    ) -> Result<usize, QueueError> {
        let points: Vec<QueuedPoint> = points.into_iter().collect();
        if self.points.len() + points.len() > self.capacity {
            return Err(QueueError::Full);
        }
        let accepted = points.len();
        self.points.extend(points);
        Ok(accepted)
    }

    pub fn pop_front(&mut self) -> Option<QueuedPoint> {
        self.points.pop_front()
    }

    /// Clears the queue and its flags (spec §4.5 `/api/cancel`, `reset`).
    pub fn clear(&mut self) {
        self.points.clear();
        self.executing = false;
        self.end_of_job = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point() -> QueuedPoint {
        QueuedPoint {
            target: Target::Position { x: 0.0, y: 0.0 },
            pen_down: true,
            speed: 1000,
        }
    }

    #[test]
    fn rejects_batch_that_would_exceed_capacity() {
        let mut q = JobQueue::new(3);
        assert_eq!(q.enqueue_many(vec![point(), point()]).unwrap(), 2);
        assert_eq!(q.enqueue_many(vec![point(), point()]), Err(QueueError::Full));
        assert_eq!(q.len(), 2); // rejected batch enqueued nothing
    }

    #[test]
    fn fifo_order_is_preserved() {
        let mut q = JobQueue::new(10);
        for i in 0..5 {
            q.enqueue_many(vec![QueuedPoint {
                target: Target::Position {
                    x: i as f64,
                    y: 0.0,
                },
                pen_down: true,
                speed: 1000,
            }])
            .unwrap();
        }
        for i in 0..5 {
            let p = q.pop_front().unwrap();
            match p.target {
                Target::Position { x, .. } => assert_eq!(x, i as f64),
                _ => panic!("expected position target"),
            }
        }
        assert!(q.pop_front().is_none());
    }

    #[test]
    fn clear_resets_flags_and_drops_points() {
        let mut q = JobQueue::new(10);
        q.enqueue_many(vec![point()]).unwrap();
        q.set_executing(true);
        q.set_end_of_job(true);
        q.clear();
        assert_eq!(q.len(), 0);
        assert!(!q.is_executing());
        assert!(!q.end_of_job());
    }
}
