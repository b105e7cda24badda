use std::collections::VecDeque;

/// Fixed-capacity FIFO of request outcomes (`true` = upstream error).
///
/// Keeps a running error count so the ratio is O(1).
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    outcomes: VecDeque<bool>,
    capacity: usize,
    errors: usize,
}

impl SlidingWindow {
    /// A zero capacity is bumped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            capacity,
            errors: 0,
        }
    }

    /// Append an outcome, evicting the oldest one when full.
    /// Returns the evicted outcome, if any.
    pub fn push(&mut self, is_error: bool) -> Option<bool> {
        let evicted = if self.outcomes.len() == self.capacity {
            self.outcomes.pop_front()
        } else {
            None
        };
        if evicted == Some(true) {
            self.errors -= 1;
        }

        self.outcomes.push_back(is_error);
        if is_error {
            self.errors += 1;
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.outcomes.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    /// `errors / len`, or `None` for an empty window
    pub fn error_rate(&self) -> Option<f64> {
        if self.outcomes.is_empty() {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.errors as f64 / self.outcomes.len() as f64;
        Some(rate)
    }

    /// Outcomes from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.outcomes.iter().copied()
    }
}
