use super::{PageRef, PageReplacementPolicy};

#[derive(Clone, Copy, Debug)]
struct LruEntry {
    page: PageRef,
    stamp: u64,
    // admission sequence, breaks ties between equal stamps
    seq: u64,
}

/// Evicts the resident page with the oldest access stamp, system-wide.
#[derive(Clone, Debug, Default)]
pub struct Lru {
    entries: Vec<LruEntry>,
    next_seq: u64,
}

impl Lru {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn stamp(&self, page: PageRef) -> Option<u64> {
        self.entries
            .iter()
            .find(|e| e.page == page)
            .map(|e| e.stamp)
    }
}

impl PageReplacementPolicy for Lru {
    fn on_admit(&mut self, page: PageRef, now: u64) {
        self.entries.push(LruEntry {
            page,
            stamp: now,
            seq: self.next_seq,
        });
        self.next_seq += 1;
    }

    fn on_access(&mut self, page: PageRef, now: u64) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.page == page) {
            entry.stamp = now;
        }
    }

    fn select_victim(&mut self) -> Option<PageRef> {
        self.entries
            .iter()
            .min_by_key(|e| (e.stamp, e.seq))
            .map(|e| e.page)
    }

    fn on_evict(&mut self, page: PageRef) {
        self.entries.retain(|e| e.page != page);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.next_seq = 0;
    }
}
