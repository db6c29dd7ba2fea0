use log::{debug, error};

use crate::{
    error::{Result, VmError},
    hardware::mmu::{Mmu, Operation},
    paging::{Algorithm, PageRef, PageReplacementPolicy, Pfn, Policy},
    process::{Process, ProcessManager},
};

pub const DEFAULT_FRAME_COUNT: usize = 8;
pub const DEFAULT_PAGE_SIZE: usize = 4096;

fn fatal(err: VmError) -> VmError {
    error!("Memory manager invariant violated: {}", err);
    err
}

/// Owns physical memory: the frame table, the MMU and the active replacement
/// policy. Page tables stay with their processes and are passed in.
#[derive(Clone)]
pub struct MemoryManager {
    pub frame_table: FrameTable,
    pub mmu: Mmu,
    policy: Policy,
    pub stats: MemoryStats,
}
impl MemoryManager {
    pub fn new(frame_count: usize, page_size: usize, algorithm: Algorithm) -> Self {
        Self {
            frame_table: FrameTable::new(frame_count),
            mmu: Mmu::new(page_size),
            policy: Policy::new(algorithm),
            stats: MemoryStats::new(),
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn algorithm(&self) -> Algorithm {
        self.policy.algorithm()
    }

    /// Puts back a policy taken with [`MemoryManager::policy`], undoing a
    /// switch made by an operation that then failed.
    pub fn restore_policy(&mut self, policy: Policy) {
        debug!(
            "Restoring replacement policy {} -> {}",
            self.policy.algorithm(),
            policy.algorithm()
        );
        self.policy = policy;
    }

    /// Replaces the active policy with a fresh one seeded from the current
    /// residents in frame order. No history carries over.
    pub fn switch_policy(&mut self, algorithm: Algorithm, now: u64) {
        debug!(
            "Switching replacement policy {} -> {} ({} resident pages)",
            self.policy.algorithm(),
            algorithm,
            self.frame_table.occupied_count()
        );
        let mut policy = Policy::new(algorithm);
        for owner in self.frame_table.entries.iter().filter_map(|fte| fte.owner) {
            policy.on_admit(owner, now);
        }
        self.policy = policy;
    }

    pub fn record_access(&mut self, page: PageRef, now: u64) {
        self.policy.on_access(page, now);
    }

    pub fn allocate_frame(
        &mut self,
        owner: PageRef,
        now: u64,
        pm: &mut ProcessManager,
    ) -> Result<Pfn> {
        if self.frame_table.is_full() {
            let victim = self
                .policy
                .select_victim()
                .ok_or(VmError::NoVictim)
                .map_err(fatal)?;
            self.evict_page(victim, pm)?;
        }
        self.frame_table.allocate(owner, now).map_err(fatal)
    }

    /// Unmaps `victim` from its owner, drops it from the policy and frees its
    /// frame. Both sides of the mapping are checked before anything changes.
    pub fn evict_page(&mut self, victim: PageRef, pm: &mut ProcessManager) -> Result<Pfn> {
        let pfn = pm
            .get_pte(victim)
            .and_then(|pte| pte.frame())
            .ok_or(VmError::PageNotMapped(victim.vpn))
            .map_err(fatal)?;
        if self.frame_table.owner(pfn) != Some(victim) {
            return Err(fatal(VmError::InvalidFrame(pfn)));
        }

        let process = pm
            .get_mut_process(victim.pid)
            .ok_or(VmError::UnknownProcess(victim.pid))
            .map_err(fatal)?;
        let old = process.page_table.unmap(victim.vpn).map_err(fatal)?;
        self.policy.on_evict(victim);
        self.frame_table.free(pfn).map_err(fatal)?;

        self.stats.evictions += 1;
        if old.modified {
            self.stats.writebacks += 1;
        }
        debug!(
            "Evicted page {} from frame {}{}",
            victim,
            pfn,
            if old.modified { " (dirty)" } else { "" }
        );
        Ok(pfn)
    }

    /// Brings `page` into memory, evicting if needed. The page must belong to
    /// a live process and be non-resident. A write fault leaves it dirty.
    pub fn handle_page_fault(
        &mut self,
        page: PageRef,
        operation: Operation,
        now: u64,
        pm: &mut ProcessManager,
    ) -> Result<Pfn> {
        match pm.get_pte(page) {
            Some(pte) if pte.present => {
                return Err(fatal(VmError::PageAlreadyMapped(page.vpn)));
            }
            Some(_) => {}
            None => return Err(VmError::UnknownProcess(page.pid)),
        }

        let pfn = self.allocate_frame(page, now, pm)?;

        let process = pm
            .get_mut_process(page.pid)
            .ok_or(VmError::UnknownProcess(page.pid))
            .map_err(fatal)?;
        process.page_table.map_to(page.vpn, pfn, now).map_err(fatal)?;
        if operation.is_write() {
            process.page_table.mark_dirty(page.vpn).map_err(fatal)?;
        }
        self.policy.on_admit(page, now);

        debug!("Loaded page {} into frame {}", page, pfn);
        Ok(pfn)
    }

    /// Frees every frame held by `process` and forgets its pages in the
    /// policy. Returns the number of frames released.
    pub fn release_process(&mut self, process: &Process) -> Result<usize> {
        let resident: Vec<_> = process.page_table.resident().collect();
        for &(vpn, pfn) in &resident {
            if self.frame_table.owner(pfn) != Some(PageRef::new(process.pid, vpn)) {
                return Err(fatal(VmError::InvalidFrame(pfn)));
            }
        }

        for &(vpn, pfn) in &resident {
            self.policy.on_evict(PageRef::new(process.pid, vpn));
            self.frame_table.free(pfn).map_err(fatal)?;
        }
        Ok(resident.len())
    }

    pub fn reset(&mut self, algorithm: Algorithm) {
        self.frame_table.clear();
        self.policy = Policy::new(algorithm);
        self.stats = MemoryStats::new();
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub evictions: u64,
    /// Evicted pages that were dirty.
    pub writebacks: u64,
}
impl MemoryStats {
    fn new() -> Self {
        Self {
            evictions: 0,
            writebacks: 0,
        }
    }
}

/// Frame allocator. Free frames are handed out lowest index first.
#[derive(Clone)]
pub struct FrameTable {
    pub entries: Vec<FrameTableEntry>,
    allocation_bitmap: Vec<bool>,
    free_count: usize,
}
impl FrameTable {
    pub fn new(frame_count: usize) -> Self {
        Self {
            entries: vec![FrameTableEntry::new(); frame_count],
            allocation_bitmap: vec![false; frame_count],
            free_count: frame_count,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.entries.len()
    }

    pub fn free_count(&self) -> usize {
        self.free_count
    }

    pub fn occupied_count(&self) -> usize {
        self.entries.len() - self.free_count
    }

    pub fn is_full(&self) -> bool {
        self.free_count == 0
    }

    pub fn get_unassigned(&self) -> Option<Pfn> {
        self.allocation_bitmap
            .iter()
            .position(|&occupied| !occupied)
            .map(Pfn)
    }

    pub fn allocate(&mut self, owner: PageRef, now: u64) -> Result<Pfn> {
        let pfn = self.get_unassigned().ok_or(VmError::OutOfMemory)?;
        self.allocation_bitmap[pfn.0] = true;
        self.entries[pfn.0].assign(owner, now);
        self.free_count -= 1;
        Ok(pfn)
    }

    /// Returns the previous owner. Freeing a free or nonexistent frame is an
    /// error.
    pub fn free(&mut self, pfn: Pfn) -> Result<PageRef> {
        match self.allocation_bitmap.get(pfn.0) {
            Some(true) => {}
            _ => return Err(VmError::InvalidFrame(pfn)),
        }
        let owner = self.entries[pfn.0]
            .owner
            .ok_or(VmError::InvalidFrame(pfn))?;
        self.allocation_bitmap[pfn.0] = false;
        self.entries[pfn.0].clear();
        self.free_count += 1;
        Ok(owner)
    }

    pub fn owner(&self, pfn: Pfn) -> Option<PageRef> {
        self.entries.get(pfn.0).and_then(|fte| fte.owner)
    }

    pub fn allocation_bitmap(&self) -> &[bool] {
        &self.allocation_bitmap
    }

    pub fn free_list(&self) -> Vec<Pfn> {
        self.allocation_bitmap
            .iter()
            .enumerate()
            .filter(|(_, occupied)| !**occupied)
            .map(|(idx, _)| Pfn(idx))
            .collect()
    }

    pub fn clear(&mut self) {
        for fte in &mut self.entries {
            fte.clear();
        }
        self.allocation_bitmap.fill(false);
        self.free_count = self.entries.len();
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FrameTableEntry {
    pub owner: Option<PageRef>,
    pub loaded_at: u64,
}
impl FrameTableEntry {
    pub fn new() -> Self {
        FrameTableEntry {
            owner: None,
            loaded_at: 0,
        }
    }

    pub fn is_free(&self) -> bool {
        self.owner.is_none()
    }

    pub fn clear(&mut self) {
        self.owner = None;
        self.loaded_at = 0;
    }

    pub fn assign(&mut self, owner: PageRef, now: u64) {
        self.owner = Some(owner);
        self.loaded_at = now;
    }
}
