use log::{info, trace};

use crate::{
    config::EngineConfig,
    error::{Result, VmError},
    hardware::mmu::{Operation, TranslationResult},
    memory::MemoryManager,
    paging::{Algorithm, PageRef, Pfn, Vpn},
    process::{Pid, Process, ProcessManager},
};

/// The simulation engine.
///
/// Owns the frame table (through [`MemoryManager`]) and every process page
/// table (through [`ProcessManager`]). Each public operation either completes
/// or returns an error without changing observable state.
#[derive(Clone)]
pub struct Kernel {
    pub mm: MemoryManager,
    pub pm: ProcessManager,
    config: EngineConfig,
    clock: u64,
    counters: AccessCounters,
    per_algorithm: [AccessCounters; 3],
}

impl Kernel {
    pub fn new(frame_count: usize, page_size: usize) -> Result<Self> {
        Self::with_config(EngineConfig::new(frame_count, page_size))
    }

    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            mm: MemoryManager::new(config.frame_count, config.page_size, config.algorithm),
            pm: ProcessManager::new(),
            config,
            clock: 0,
            counters: AccessCounters::default(),
            per_algorithm: [AccessCounters::default(); 3],
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn algorithm(&self) -> Algorithm {
        self.mm.algorithm()
    }

    /// Logical clock; advances once per successful access.
    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn create_process(&mut self, pid: Pid, page_count: usize) -> Result<ProcessInfo> {
        if page_count == 0 {
            return Err(VmError::InvalidArgument(
                "page count must be positive".to_string(),
            ));
        }
        if page_count.checked_mul(self.config.page_size).is_none() {
            return Err(VmError::InvalidArgument(format!(
                "{} pages of {} bytes exceed the virtual address space",
                page_count, self.config.page_size
            )));
        }
        if self.pm.contains(pid) {
            return Err(VmError::DuplicateProcess(pid));
        }

        let process = Process::new(pid, page_count);
        let process_info = ProcessInfo::from(&process);
        self.pm.spawn_process(process);

        info!("Created process {} with {} pages", pid, page_count);
        Ok(process_info)
    }

    /// Creates a process under the smallest free pid.
    pub fn spawn_process(&mut self, page_count: usize) -> Result<Pid> {
        let pid = self.pm.next_free_pid();
        self.create_process(pid, page_count)?;
        Ok(pid)
    }

    /// Returns the number of frames that were released.
    pub fn terminate_process(&mut self, pid: Pid) -> Result<usize> {
        let process = self
            .pm
            .get_process(pid)
            .ok_or(VmError::UnknownProcess(pid))?;
        let released = self.mm.release_process(process)?;
        self.pm.remove_process(pid);

        info!("Terminated process {}, released {} frames", pid, released);
        Ok(released)
    }

    /// Makes `algorithm` the active policy, rebuilt from current residents.
    pub fn set_algorithm(&mut self, algorithm: Algorithm) {
        if algorithm != self.mm.algorithm() {
            self.mm.switch_policy(algorithm, self.clock);
        }
    }

    pub fn access_memory(
        &mut self,
        pid: Pid,
        virtual_address: usize,
        operation: Operation,
        algorithm: Algorithm,
    ) -> Result<AccessOutcome> {
        let (vpn, offset) = self.checked_split(pid, virtual_address)?;

        let previous = (algorithm != self.mm.algorithm()).then(|| self.mm.policy().clone());
        self.set_algorithm(algorithm);

        let now = self.clock + 1;
        let (pfn, was_fault) = match self.resolve(PageRef::new(pid, vpn), operation, now) {
            Ok(resolved) => resolved,
            Err(err) => {
                if let Some(policy) = previous {
                    self.mm.restore_policy(policy);
                }
                return Err(err);
            }
        };

        self.clock = now;
        self.counters.record(was_fault);
        self.per_algorithm[algorithm.index()].record(was_fault);

        let physical_address = self.mm.mmu.physical_address(pfn, offset);
        trace!(
            "{} P{} va={} -> pa={} ({})",
            algorithm,
            pid,
            virtual_address,
            physical_address,
            if was_fault { "fault" } else { "hit" }
        );

        Ok(AccessOutcome {
            physical_address,
            frame: pfn,
            was_fault,
        })
    }

    /// Translates `page`, handling the fault on a miss. Returns the frame and
    /// whether the access faulted.
    fn resolve(&mut self, page: PageRef, operation: Operation, now: u64) -> Result<(Pfn, bool)> {
        let process = self
            .pm
            .get_mut_process(page.pid)
            .ok_or(VmError::UnknownProcess(page.pid))?;
        let translation = self
            .mm
            .mmu
            .translate(&mut process.page_table, page.vpn, operation, now)?;

        match translation {
            TranslationResult::Success(pfn) => {
                self.mm.record_access(page, now);
                Ok((pfn, false))
            }
            TranslationResult::PageFault => {
                let pfn = self
                    .mm
                    .handle_page_fault(page, operation, now, &mut self.pm)?;
                Ok((pfn, true))
            }
        }
    }

    /// Pure lookup. Never triggers fault handling.
    pub fn translate_address(&self, pid: Pid, virtual_address: usize) -> Result<usize> {
        let (vpn, offset) = self.checked_split(pid, virtual_address)?;
        let process = self
            .pm
            .get_process(pid)
            .ok_or(VmError::UnknownProcess(pid))?;
        let pfn = process
            .page_table
            .lookup(vpn)?
            .frame()
            .ok_or(VmError::PageNotResident { pid, vpn })?;
        Ok(self.mm.mmu.physical_address(pfn, offset))
    }

    fn checked_split(&self, pid: Pid, virtual_address: usize) -> Result<(Vpn, usize)> {
        let process = self
            .pm
            .get_process(pid)
            .ok_or(VmError::UnknownProcess(pid))?;
        let (vpn, offset) = self.mm.mmu.split(virtual_address);
        if vpn.0 >= process.page_count {
            return Err(VmError::InvalidAddress {
                pid,
                address: virtual_address,
            });
        }
        Ok((vpn, offset))
    }

    pub fn reset(&mut self) {
        self.pm.clear();
        self.mm.reset(self.config.algorithm);
        self.clock = 0;
        self.counters = AccessCounters::default();
        self.per_algorithm = [AccessCounters::default(); 3];
        info!("Simulation reset");
    }

    /// Zeroes counters and the logical clock while keeping every resident
    /// page. The active policy is reseeded from the residents.
    pub fn reset_statistics(&mut self) {
        self.clock = 0;
        self.counters = AccessCounters::default();
        self.per_algorithm = [AccessCounters::default(); 3];
        self.mm.stats = Default::default();
        self.mm.switch_policy(self.mm.algorithm(), 0);
    }

    pub fn statistics(&self) -> Statistics {
        let frame_table = &self.mm.frame_table;
        Statistics {
            accesses: self.counters.accesses,
            hits: self.counters.hits,
            faults: self.counters.faults,
            evictions: self.mm.stats.evictions,
            writebacks: self.mm.stats.writebacks,
            hit_ratio: self.counters.hit_ratio(),
            utilization: frame_table.occupied_count() as f64 / frame_table.frame_count() as f64,
        }
    }

    /// Counters of the accesses issued with `algorithm`.
    pub fn algorithm_statistics(&self, algorithm: Algorithm) -> AccessCounters {
        self.per_algorithm[algorithm.index()]
    }

    pub fn processes(&self) -> Vec<ProcessInfo> {
        self.pm.processes().map(ProcessInfo::from).collect()
    }

    pub fn page_table(&self, pid: Pid) -> Result<Vec<PageInfo>> {
        let process = self
            .pm
            .get_process(pid)
            .ok_or(VmError::UnknownProcess(pid))?;
        Ok(process
            .page_table
            .entries
            .iter()
            .enumerate()
            .map(|(vpn, pte)| PageInfo {
                vpn: Vpn(vpn),
                resident: pte.present,
                frame: pte.frame(),
                referenced: pte.referenced,
                modified: pte.modified,
                last_access: pte.last_access,
            })
            .collect())
    }

    pub fn frames(&self) -> Vec<FrameInfo> {
        self.mm
            .frame_table
            .entries
            .iter()
            .enumerate()
            .map(|(idx, fte)| {
                let pte = fte.owner.and_then(|owner| self.pm.get_pte(owner));
                FrameInfo {
                    frame: Pfn(idx),
                    occupied: !fte.is_free(),
                    owner: fte.owner,
                    loaded_at: fte.loaded_at,
                    last_access: pte.map_or(0, |pte| pte.last_access),
                    referenced: pte.is_some_and(|pte| pte.referenced),
                    modified: pte.is_some_and(|pte| pte.modified),
                }
            })
            .collect()
    }

    pub fn memory_map(&self) -> MemoryMap {
        MemoryMap {
            frames: self.frames(),
            allocation_bitmap: self.mm.frame_table.allocation_bitmap().to_vec(),
            free_list: self.mm.frame_table.free_list(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AccessOutcome {
    pub physical_address: usize,
    pub frame: Pfn,
    pub was_fault: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AccessCounters {
    pub accesses: u64,
    pub hits: u64,
    pub faults: u64,
}

impl AccessCounters {
    fn record(&mut self, was_fault: bool) {
        self.accesses += 1;
        if was_fault {
            self.faults += 1;
        } else {
            self.hits += 1;
        }
    }

    pub fn hit_ratio(&self) -> f64 {
        if self.accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.accesses as f64
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Statistics {
    pub accesses: u64,
    pub hits: u64,
    pub faults: u64,
    pub evictions: u64,
    pub writebacks: u64,
    /// hits / accesses, 0 before the first access.
    pub hit_ratio: f64,
    /// occupied frames / total frames.
    pub utilization: f64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ProcessInfo {
    pub pid: Pid,
    pub page_count: usize,
    pub resident_pages: usize,
}

impl From<&Process> for ProcessInfo {
    fn from(process: &Process) -> Self {
        Self {
            pid: process.pid,
            page_count: process.page_count,
            resident_pages: process.resident_count(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PageInfo {
    pub vpn: Vpn,
    pub resident: bool,
    pub frame: Option<Pfn>,
    pub referenced: bool,
    pub modified: bool,
    pub last_access: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FrameInfo {
    pub frame: Pfn,
    pub occupied: bool,
    pub owner: Option<PageRef>,
    pub loaded_at: u64,
    pub last_access: u64,
    pub referenced: bool,
    pub modified: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MemoryMap {
    pub frames: Vec<FrameInfo>,
    pub allocation_bitmap: Vec<bool>,
    pub free_list: Vec<Pfn>,
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng, rngs::StdRng};

    use super::*;
    use crate::paging::PageReplacementPolicy;

    const PAGE: usize = 4096;

    fn kernel(frames: usize) -> Kernel {
        Kernel::new(frames, PAGE).unwrap()
    }

    fn read(k: &mut Kernel, pid: usize, vpn: usize, algorithm: Algorithm) -> AccessOutcome {
        k.access_memory(Pid(pid), vpn * PAGE, Operation::Read, algorithm)
            .unwrap()
    }

    /// Frame table, page tables and policy all describe the same resident set.
    fn check_integrity(k: &Kernel) {
        let mut mapped = 0;
        for process in k.pm.processes() {
            for (vpn, pfn) in process.page_table.resident() {
                assert_eq!(
                    k.mm.frame_table.owner(pfn),
                    Some(PageRef::new(process.pid, vpn)),
                    "frame {} does not point back to P{}:{}",
                    pfn,
                    process.pid,
                    vpn
                );
                mapped += 1;
            }
        }
        assert_eq!(mapped, k.mm.frame_table.occupied_count());
        assert_eq!(k.mm.policy().len(), mapped);
        for (idx, fte) in k.mm.frame_table.entries.iter().enumerate() {
            assert_eq!(fte.is_free(), !k.mm.frame_table.allocation_bitmap()[idx]);
            if let Some(owner) = fte.owner {
                assert_eq!(k.pm.get_pte(owner).and_then(|p| p.frame()), Some(Pfn(idx)));
            }
        }
    }

    #[test]
    fn rejects_bad_construction() {
        assert!(matches!(
            Kernel::new(0, PAGE),
            Err(VmError::InvalidArgument(_))
        ));
        assert!(matches!(Kernel::new(4, 0), Err(VmError::InvalidArgument(_))));
    }

    #[test]
    fn rejects_unaddressable_config() {
        assert!(matches!(
            Kernel::new(3, usize::MAX / 2),
            Err(VmError::InvalidArgument(_))
        ));

        // the largest accepted layout still yields every physical address
        let mut k = Kernel::new(2, usize::MAX / 2).unwrap();
        for pid in 1..=2 {
            k.create_process(Pid(pid), 1).unwrap();
        }
        let last = k
            .access_memory(Pid(2), 5, Operation::Read, Algorithm::Fifo)
            .unwrap();
        assert_eq!(last.frame, Pfn(0));
        let outcome = k
            .access_memory(Pid(1), 5, Operation::Read, Algorithm::Fifo)
            .unwrap();
        assert_eq!(outcome.frame, Pfn(1));
        assert_eq!(outcome.physical_address, usize::MAX / 2 + 5);
    }

    #[test]
    fn rejects_unaddressable_process() {
        let mut k = Kernel::new(2, usize::MAX / 2).unwrap();
        assert!(matches!(
            k.create_process(Pid(1), 3),
            Err(VmError::InvalidArgument(_))
        ));
        assert!(k.processes().is_empty());
        assert!(k.create_process(Pid(1), 2).is_ok());
    }

    #[test]
    fn configured_algorithm_survives_reset() {
        let config = EngineConfig::new(2, 64).with_algorithm(Algorithm::Lru);
        let mut k = Kernel::with_config(config).unwrap();
        assert_eq!(k.algorithm(), Algorithm::Lru);

        k.create_process(Pid(1), 2).unwrap();
        k.access_memory(Pid(1), 0, Operation::Read, Algorithm::Clock)
            .unwrap();
        assert_eq!(k.algorithm(), Algorithm::Clock);

        k.reset();
        assert_eq!(k.algorithm(), Algorithm::Lru);
    }

    #[test]
    fn create_process_starts_non_resident() {
        let mut k = kernel(4);
        let info = k.create_process(Pid(1), 5).unwrap();
        assert_eq!(info.page_count, 5);
        assert_eq!(info.resident_pages, 0);

        let pages = k.page_table(Pid(1)).unwrap();
        assert_eq!(pages.len(), 5);
        assert!(pages.iter().all(|p| !p.resident && p.frame.is_none()));
    }

    #[test]
    fn create_process_errors() {
        let mut k = kernel(4);
        k.create_process(Pid(1), 2).unwrap();
        assert_eq!(
            k.create_process(Pid(1), 3),
            Err(VmError::DuplicateProcess(Pid(1)))
        );
        assert!(matches!(
            k.create_process(Pid(2), 0),
            Err(VmError::InvalidArgument(_))
        ));
        assert_eq!(k.processes().len(), 1);
        assert_eq!(k.processes()[0].page_count, 2);
    }

    #[test]
    fn spawn_process_assigns_unused_pid() {
        let mut k = kernel(4);
        k.create_process(Pid(0), 1).unwrap();
        assert_eq!(k.spawn_process(2), Ok(Pid(1)));
        assert_eq!(k.spawn_process(2), Ok(Pid(2)));
    }

    #[test]
    fn access_errors_leave_state_untouched() {
        let mut k = kernel(2);
        k.create_process(Pid(1), 2).unwrap();

        assert_eq!(
            k.access_memory(Pid(9), 0, Operation::Read, Algorithm::Fifo),
            Err(VmError::UnknownProcess(Pid(9)))
        );
        assert_eq!(
            k.access_memory(Pid(1), 2 * PAGE, Operation::Read, Algorithm::Lru),
            Err(VmError::InvalidAddress {
                pid: Pid(1),
                address: 2 * PAGE
            })
        );
        assert_eq!(k.statistics().accesses, 0);
        assert_eq!(k.clock(), 0);
        assert_eq!(k.algorithm(), Algorithm::Fifo);
    }

    #[test]
    fn failed_fault_restores_previous_policy() {
        let mut k = kernel(1);
        k.create_process(Pid(1), 1).unwrap();
        // a frame owned by a page no process maps
        k.mm.frame_table
            .allocate(PageRef::new(Pid(7), Vpn(0)), 0)
            .unwrap();

        let err = k
            .access_memory(Pid(1), 0, Operation::Read, Algorithm::Lru)
            .unwrap_err();
        assert!(err.is_fatal());
        assert_eq!(k.algorithm(), Algorithm::Fifo);
        assert!(k.mm.policy().is_empty());
        assert_eq!(k.statistics().accesses, 0);
        assert_eq!(k.clock(), 0);
        assert!(!k.page_table(Pid(1)).unwrap()[0].resident);
        assert_eq!(
            k.mm.frame_table.owner(Pfn(0)),
            Some(PageRef::new(Pid(7), Vpn(0)))
        );
    }

    #[test]
    fn hit_returns_physical_address() {
        let mut k = kernel(4);
        k.create_process(Pid(1), 4).unwrap();

        let first = k
            .access_memory(Pid(1), PAGE + 12, Operation::Read, Algorithm::Fifo)
            .unwrap();
        assert!(first.was_fault);
        assert_eq!(first.frame, Pfn(0));
        assert_eq!(first.physical_address, 12);

        let second = k
            .access_memory(Pid(1), PAGE + 100, Operation::Write, Algorithm::Fifo)
            .unwrap();
        assert!(!second.was_fault);
        assert_eq!(second.physical_address, 100);

        let page = &k.page_table(Pid(1)).unwrap()[1];
        assert!(page.referenced);
        assert!(page.modified);
    }

    #[test]
    fn write_fault_marks_page_dirty() {
        let mut k = kernel(1);
        k.create_process(Pid(1), 2).unwrap();
        k.access_memory(Pid(1), 0, Operation::Write, Algorithm::Fifo)
            .unwrap();
        assert!(k.page_table(Pid(1)).unwrap()[0].modified);

        read(&mut k, 1, 1, Algorithm::Fifo);
        let stats = k.statistics();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.writebacks, 1);
    }

    #[test]
    fn fifo_scenario_two_frames_three_pages() {
        let mut k = kernel(2);
        k.create_process(Pid(1), 3).unwrap();

        assert!(read(&mut k, 1, 0, Algorithm::Fifo).was_fault);
        assert!(read(&mut k, 1, 1, Algorithm::Fifo).was_fault);
        assert_eq!(k.statistics().utilization, 1.0);

        let third = read(&mut k, 1, 2, Algorithm::Fifo);
        assert!(third.was_fault);
        assert_eq!(third.frame, Pfn(0));
        assert!(!k.page_table(Pid(1)).unwrap()[0].resident);

        let fourth = read(&mut k, 1, 0, Algorithm::Fifo);
        assert!(fourth.was_fault);
        assert_eq!(fourth.frame, Pfn(1));
        assert!(!k.page_table(Pid(1)).unwrap()[1].resident);

        let stats = k.statistics();
        assert_eq!(stats.accesses, 4);
        assert_eq!(stats.faults, 4);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.hit_ratio, 0.0);
        check_integrity(&k);
    }

    #[test]
    fn fifo_ignores_hits_on_oldest_page() {
        let mut k = kernel(3);
        k.create_process(Pid(1), 4).unwrap();
        for vpn in 0..3 {
            read(&mut k, 1, vpn, Algorithm::Fifo);
        }
        read(&mut k, 1, 0, Algorithm::Fifo);
        read(&mut k, 1, 0, Algorithm::Fifo);

        read(&mut k, 1, 3, Algorithm::Fifo);
        assert!(!k.page_table(Pid(1)).unwrap()[0].resident);
        assert_eq!(k.translate_address(Pid(1), 3 * PAGE), Ok(0));
    }

    #[test]
    fn lru_evicts_least_recent_and_follows_hits() {
        let mut k = kernel(3);
        k.create_process(Pid(1), 5).unwrap();
        for vpn in 0..3 {
            read(&mut k, 1, vpn, Algorithm::Lru);
        }

        // page 0 is least recently used
        read(&mut k, 1, 3, Algorithm::Lru);
        assert!(!k.page_table(Pid(1)).unwrap()[0].resident);

        // touching page 1 moves the next victim to page 2
        assert!(!read(&mut k, 1, 1, Algorithm::Lru).was_fault);
        read(&mut k, 1, 4, Algorithm::Lru);
        let pages = k.page_table(Pid(1)).unwrap();
        assert!(pages[1].resident);
        assert!(!pages[2].resident);
        check_integrity(&k);
    }

    #[test]
    fn lru_is_global_across_processes() {
        let mut k = kernel(2);
        k.create_process(Pid(1), 2).unwrap();
        k.create_process(Pid(2), 2).unwrap();
        read(&mut k, 1, 0, Algorithm::Lru);
        read(&mut k, 2, 0, Algorithm::Lru);
        read(&mut k, 1, 0, Algorithm::Lru);

        let outcome = read(&mut k, 1, 1, Algorithm::Lru);
        assert_eq!(outcome.frame, Pfn(1));
        assert!(!k.page_table(Pid(2)).unwrap()[0].resident);
        check_integrity(&k);
    }

    #[test]
    fn clock_gives_second_chance() {
        let mut k = kernel(3);
        k.create_process(Pid(1), 5).unwrap();
        for vpn in 0..3 {
            read(&mut k, 1, vpn, Algorithm::Clock);
        }

        // all bits set: full sweep, page 0 goes
        read(&mut k, 1, 3, Algorithm::Clock);
        assert!(!k.page_table(Pid(1)).unwrap()[0].resident);

        // page 1 referenced again, so page 2 is the next victim
        read(&mut k, 1, 1, Algorithm::Clock);
        read(&mut k, 1, 4, Algorithm::Clock);
        let pages = k.page_table(Pid(1)).unwrap();
        assert!(pages[1].resident);
        assert!(!pages[2].resident);
        check_integrity(&k);
    }

    #[test]
    fn switching_algorithm_rebuilds_policy() {
        let mut k = kernel(2);
        k.create_process(Pid(1), 3).unwrap();
        read(&mut k, 1, 0, Algorithm::Fifo);
        read(&mut k, 1, 1, Algorithm::Fifo);
        read(&mut k, 1, 0, Algorithm::Fifo);

        // LRU starts without history, so residents tie and frame order decides
        read(&mut k, 1, 2, Algorithm::Lru);
        assert_eq!(k.algorithm(), Algorithm::Lru);
        assert!(!k.page_table(Pid(1)).unwrap()[0].resident);
        assert_eq!(k.algorithm_statistics(Algorithm::Fifo).accesses, 3);
        assert_eq!(k.algorithm_statistics(Algorithm::Lru).accesses, 1);
        check_integrity(&k);
    }

    #[test]
    fn translate_is_read_only() {
        let mut k = kernel(2);
        k.create_process(Pid(1), 2).unwrap();

        assert_eq!(
            k.translate_address(Pid(1), 5),
            Err(VmError::PageNotResident {
                pid: Pid(1),
                vpn: Vpn(0)
            })
        );
        assert_eq!(k.statistics().accesses, 0);
        assert_eq!(k.statistics().faults, 0);

        read(&mut k, 1, 1, Algorithm::Fifo);
        let before = k.page_table(Pid(1)).unwrap();
        assert_eq!(k.translate_address(Pid(1), PAGE + 7), Ok(7));
        assert_eq!(k.page_table(Pid(1)).unwrap(), before);
        assert_eq!(k.statistics().accesses, 1);
        assert!(matches!(
            k.translate_address(Pid(1), 2 * PAGE),
            Err(VmError::InvalidAddress { .. })
        ));
        assert!(matches!(
            k.translate_address(Pid(3), 0),
            Err(VmError::UnknownProcess(_))
        ));
    }

    #[test]
    fn terminate_frees_frames_and_policy_entries() {
        let mut k = kernel(3);
        k.create_process(Pid(1), 2).unwrap();
        k.create_process(Pid(2), 2).unwrap();
        read(&mut k, 1, 0, Algorithm::Fifo);
        read(&mut k, 2, 0, Algorithm::Fifo);
        read(&mut k, 1, 1, Algorithm::Fifo);

        assert_eq!(k.terminate_process(Pid(1)), Ok(2));
        assert!(k.processes().iter().all(|p| p.pid != Pid(1)));
        let frames = k.frames();
        assert!(!frames[0].occupied);
        assert!(frames[1].occupied);
        assert!(!frames[2].occupied);
        check_integrity(&k);

        assert_eq!(
            k.terminate_process(Pid(1)),
            Err(VmError::UnknownProcess(Pid(1)))
        );

        // freed frames are reused without eviction
        read(&mut k, 2, 1, Algorithm::Fifo);
        assert_eq!(k.statistics().evictions, 0);
    }

    #[test]
    fn reset_clears_everything() {
        let mut k = kernel(2);
        k.create_process(Pid(1), 3).unwrap();
        for vpn in [0, 1, 2, 0] {
            read(&mut k, 1, vpn, Algorithm::Clock);
        }
        k.reset();

        assert!(k.processes().is_empty());
        assert!(k.frames().iter().all(|f| !f.occupied && f.owner.is_none()));
        let stats = k.statistics();
        assert_eq!((stats.accesses, stats.hits, stats.faults), (0, 0, 0));
        assert_eq!(stats.utilization, 0.0);
        assert_eq!(k.clock(), 0);
        assert_eq!(k.algorithm(), Algorithm::Fifo);
        assert!(k.mm.policy().is_empty());
        assert_eq!(k.algorithm_statistics(Algorithm::Clock), AccessCounters::default());
    }

    #[test]
    fn reset_statistics_keeps_residents() {
        let mut k = kernel(2);
        k.create_process(Pid(1), 2).unwrap();
        read(&mut k, 1, 0, Algorithm::Lru);
        read(&mut k, 1, 0, Algorithm::Lru);
        k.reset_statistics();

        assert_eq!(k.statistics().accesses, 0);
        assert_eq!(k.clock(), 0);
        assert_eq!(k.processes()[0].resident_pages, 1);
        assert!(!read(&mut k, 1, 0, Algorithm::Lru).was_fault);
        check_integrity(&k);
    }

    #[test]
    fn memory_map_reports_bitmap_and_free_list() {
        let mut k = kernel(3);
        k.create_process(Pid(4), 3).unwrap();
        read(&mut k, 4, 2, Algorithm::Fifo);
        k.access_memory(Pid(4), PAGE, Operation::Write, Algorithm::Fifo)
            .unwrap();

        let map = k.memory_map();
        assert_eq!(map.allocation_bitmap, vec![true, true, false]);
        assert_eq!(map.free_list, vec![Pfn(2)]);
        assert_eq!(map.frames[0].owner, Some(PageRef::new(Pid(4), Vpn(2))));
        assert_eq!(map.frames[0].loaded_at, 1);
        assert!(map.frames[1].modified);
        assert_eq!(map.frames[1].loaded_at, 2);
    }

    #[test]
    fn random_workload_keeps_invariants() {
        let mut rng = StdRng::seed_from_u64(7);
        for algorithm in Algorithm::ALL {
            let mut k = kernel(4);
            k.create_process(Pid(0), 6).unwrap();
            k.create_process(Pid(1), 3).unwrap();
            k.create_process(Pid(2), 8).unwrap();

            for step in 0..500 {
                let pid = rng.random_range(0..3);
                let vpn = rng.random_range(0..3);
                let operation = Operation::from(rng.random_bool(0.3));
                k.access_memory(Pid(pid), vpn * PAGE + step % PAGE, operation, algorithm)
                    .unwrap();
                if step % 97 == 0 {
                    check_integrity(&k);
                }
            }

            let stats = k.statistics();
            assert_eq!(stats.hits + stats.faults, stats.accesses);
            assert!((0.0..=1.0).contains(&stats.hit_ratio));
            check_integrity(&k);

            k.terminate_process(Pid(1)).unwrap();
            check_integrity(&k);
        }
    }
}
