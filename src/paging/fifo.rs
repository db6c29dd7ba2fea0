use std::collections::VecDeque;

use super::{PageRef, PageReplacementPolicy};

/// Evicts pages in admission order. Hits never reorder the queue.
#[derive(Clone, Debug, Default)]
pub struct Fifo {
    queue: VecDeque<PageRef>,
}

impl Fifo {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    pub fn queue(&self) -> impl Iterator<Item = &PageRef> {
        self.queue.iter()
    }
}

impl PageReplacementPolicy for Fifo {
    fn on_admit(&mut self, page: PageRef, _now: u64) {
        self.queue.push_back(page);
    }

    fn on_access(&mut self, _page: PageRef, _now: u64) {}

    fn select_victim(&mut self) -> Option<PageRef> {
        self.queue.front().copied()
    }

    fn on_evict(&mut self, page: PageRef) {
        if self.queue.front() == Some(&page) {
            self.queue.pop_front();
        } else if let Some(idx) = self.queue.iter().position(|p| *p == page) {
            self.queue.remove(idx);
        }
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn clear(&mut self) {
        self.queue.clear();
    }
}
