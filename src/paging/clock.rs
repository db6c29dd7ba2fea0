use super::{PageRef, PageReplacementPolicy};

#[derive(Clone, Copy, Debug)]
struct ClockEntry {
    page: PageRef,
    referenced: bool,
}

/// Second-chance replacement over a circular list of resident pages.
///
/// The hand rests on the last victim. Evicting that entry leaves the hand on
/// its successor, and the next admission is inserted just behind the hand so
/// it is examined last.
#[derive(Clone, Debug, Default)]
pub struct Clock {
    entries: Vec<ClockEntry>,
    hand: usize,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            hand: 0,
        }
    }

    pub fn hand(&self) -> usize {
        if self.hand >= self.entries.len() {
            0
        } else {
            self.hand
        }
    }

    pub fn reference_bits(&self) -> Vec<bool> {
        self.entries.iter().map(|e| e.referenced).collect()
    }

    pub fn pages(&self) -> Vec<PageRef> {
        self.entries.iter().map(|e| e.page).collect()
    }

    fn inc(&mut self) {
        self.hand += 1;
        if self.hand >= self.entries.len() {
            self.hand = 0;
        }
    }
}

impl PageReplacementPolicy for Clock {
    fn on_admit(&mut self, page: PageRef, _now: u64) {
        let pos = self.hand.min(self.entries.len());
        self.entries.insert(
            pos,
            ClockEntry {
                page,
                referenced: true,
            },
        );
        self.hand = pos + 1;
    }

    fn on_access(&mut self, page: PageRef, _now: u64) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.page == page) {
            entry.referenced = true;
        }
    }

    fn select_victim(&mut self) -> Option<PageRef> {
        if self.entries.is_empty() {
            return None;
        }
        if self.hand >= self.entries.len() {
            self.hand = 0;
        }
        // Every visited entry is cleared, so this ends within one rotation
        // plus one step.
        loop {
            let entry = &mut self.entries[self.hand];
            if !entry.referenced {
                return Some(entry.page);
            }
            entry.referenced = false;
            self.inc();
        }
    }

    fn on_evict(&mut self, page: PageRef) {
        let Some(idx) = self.entries.iter().position(|e| e.page == page) else {
            return;
        };
        self.entries.remove(idx);
        if idx < self.hand {
            self.hand -= 1;
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.hand = 0;
    }
}
