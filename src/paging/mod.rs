use std::{fmt, str::FromStr};

use crate::{
    error::{Result, VmError},
    process::Pid,
};

mod clock;
mod fifo;
mod lru;

pub use clock::Clock;
pub use fifo::Fifo;
pub use lru::Lru;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Vpn(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Pfn(pub usize);

impl fmt::Display for Vpn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Pfn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A virtual page of a specific process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PageRef {
    pub pid: Pid,
    pub vpn: Vpn,
}

impl PageRef {
    pub fn new(pid: Pid, vpn: Vpn) -> Self {
        Self { pid, vpn }
    }
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}:{}", self.pid, self.vpn)
    }
}

#[derive(Clone)]
pub struct PageTable {
    pub entries: Vec<PageTableEntry>,
}
impl PageTable {
    pub fn new(page_count: usize) -> Self {
        Self {
            entries: vec![PageTableEntry::new(); page_count],
        }
    }

    pub fn page_count(&self) -> usize {
        self.entries.len()
    }

    pub fn lookup(&self, vpn: Vpn) -> Result<&PageTableEntry> {
        self.entries.get(vpn.0).ok_or(VmError::InvalidPage {
            vpn,
            page_count: self.entries.len(),
        })
    }

    fn entry_mut(&mut self, vpn: Vpn) -> Result<&mut PageTableEntry> {
        let page_count = self.entries.len();
        self.entries
            .get_mut(vpn.0)
            .ok_or(VmError::InvalidPage { vpn, page_count })
    }

    /// Makes `vpn` resident in `pfn`. The reference and dirty bits start
    /// cleared.
    pub fn map_to(&mut self, vpn: Vpn, pfn: Pfn, now: u64) -> Result<()> {
        let pte = self.entry_mut(vpn)?;
        if pte.present {
            return Err(VmError::PageAlreadyMapped(vpn));
        }
        pte.pfn = pfn;
        pte.present = true;
        pte.referenced = false;
        pte.modified = false;
        pte.last_access = now;
        Ok(())
    }

    /// Returns the entry as it was before unmapping.
    pub fn unmap(&mut self, vpn: Vpn) -> Result<PageTableEntry> {
        let pte = self.entry_mut(vpn)?;
        if !pte.present {
            return Err(VmError::PageNotMapped(vpn));
        }
        let old = pte.clone();
        *pte = PageTableEntry::new();
        Ok(old)
    }

    pub fn mark_accessed(&mut self, vpn: Vpn, is_write: bool, now: u64) -> Result<()> {
        let pte = self.entry_mut(vpn)?;
        pte.last_access = now;
        pte.referenced = true;
        if is_write {
            pte.modified = true;
        }
        Ok(())
    }

    pub fn mark_dirty(&mut self, vpn: Vpn) -> Result<()> {
        self.entry_mut(vpn)?.modified = true;
        Ok(())
    }

    pub fn resident(&self) -> impl Iterator<Item = (Vpn, Pfn)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, pte)| pte.present)
            .map(|(vpn, pte)| (Vpn(vpn), pte.pfn))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageTableEntry {
    pub pfn: Pfn,
    pub present: bool,
    pub referenced: bool,
    pub modified: bool,
    pub last_access: u64,
}
impl PageTableEntry {
    pub fn new() -> Self {
        Self {
            pfn: Pfn(0),
            present: false,
            referenced: false,
            modified: false,
            last_access: 0,
        }
    }

    pub fn frame(&self) -> Option<Pfn> {
        self.present.then_some(self.pfn)
    }
}

impl Default for PageTableEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// Capability shared by all replacement algorithms.
///
/// Every resident page is admitted exactly once and evicted exactly once.
/// `select_victim` only nominates a page; the entry is dropped by the
/// matching `on_evict`.
pub trait PageReplacementPolicy {
    fn on_admit(&mut self, page: PageRef, now: u64);
    fn on_access(&mut self, page: PageRef, now: u64);
    fn select_victim(&mut self) -> Option<PageRef>;
    fn on_evict(&mut self, page: PageRef);

    /// Number of tracked pages.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Algorithm {
    Fifo,
    Lru,
    Clock,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [Algorithm::Fifo, Algorithm::Lru, Algorithm::Clock];

    pub(crate) fn index(self) -> usize {
        match self {
            Algorithm::Fifo => 0,
            Algorithm::Lru => 1,
            Algorithm::Clock => 2,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Algorithm::Fifo => "FIFO",
            Algorithm::Lru => "LRU",
            Algorithm::Clock => "Clock",
        };
        f.write_str(name)
    }
}

impl FromStr for Algorithm {
    type Err = VmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(Algorithm::Fifo),
            "lru" => Ok(Algorithm::Lru),
            "clock" => Ok(Algorithm::Clock),
            _ => Err(VmError::InvalidArgument(format!(
                "unknown replacement algorithm `{}`",
                s
            ))),
        }
    }
}

/// The active replacement policy of an engine.
#[derive(Clone, Debug)]
pub enum Policy {
    Fifo(Fifo),
    Lru(Lru),
    Clock(Clock),
}

impl Policy {
    pub fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Fifo => Policy::Fifo(Fifo::new()),
            Algorithm::Lru => Policy::Lru(Lru::new()),
            Algorithm::Clock => Policy::Clock(Clock::new()),
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        match self {
            Policy::Fifo(_) => Algorithm::Fifo,
            Policy::Lru(_) => Algorithm::Lru,
            Policy::Clock(_) => Algorithm::Clock,
        }
    }

    fn inner(&self) -> &dyn PageReplacementPolicy {
        match self {
            Policy::Fifo(p) => p,
            Policy::Lru(p) => p,
            Policy::Clock(p) => p,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn PageReplacementPolicy {
        match self {
            Policy::Fifo(p) => p,
            Policy::Lru(p) => p,
            Policy::Clock(p) => p,
        }
    }
}

impl PageReplacementPolicy for Policy {
    fn on_admit(&mut self, page: PageRef, now: u64) {
        self.inner_mut().on_admit(page, now)
    }

    fn on_access(&mut self, page: PageRef, now: u64) {
        self.inner_mut().on_access(page, now)
    }

    fn select_victim(&mut self) -> Option<PageRef> {
        self.inner_mut().select_victim()
    }

    fn on_evict(&mut self, page: PageRef) {
        self.inner_mut().on_evict(page)
    }

    fn len(&self) -> usize {
        self.inner().len()
    }

    fn clear(&mut self) {
        self.inner_mut().clear()
    }
}
