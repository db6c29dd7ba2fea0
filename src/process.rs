use std::{collections::BTreeMap, fmt};

use crate::paging::{PageRef, PageTable, PageTableEntry};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Pid(pub usize);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Live processes, kept ordered by pid.
#[derive(Clone, Default)]
pub struct ProcessManager {
    processes: BTreeMap<Pid, Process>,
}
impl ProcessManager {
    pub fn new() -> Self {
        Self {
            processes: BTreeMap::new(),
        }
    }

    pub fn spawn_process(&mut self, process: Process) {
        self.processes.insert(process.pid, process);
    }

    pub fn remove_process(&mut self, pid: Pid) -> Option<Process> {
        self.processes.remove(&pid)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.processes.contains_key(&pid)
    }

    /// Smallest pid that is not currently live.
    pub fn next_free_pid(&self) -> Pid {
        let mut candidate = 0;
        for pid in self.processes.keys() {
            if pid.0 != candidate {
                break;
            }
            candidate += 1;
        }
        Pid(candidate)
    }

    pub fn get_process(&self, pid: Pid) -> Option<&Process> {
        self.processes.get(&pid)
    }

    pub fn get_mut_process(&mut self, pid: Pid) -> Option<&mut Process> {
        self.processes.get_mut(&pid)
    }

    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.processes.values()
    }

    pub fn get_pte(&self, page: PageRef) -> Option<&PageTableEntry> {
        self.processes
            .get(&page.pid)
            .and_then(|p| p.page_table.entries.get(page.vpn.0))
    }

    pub fn clear(&mut self) {
        self.processes.clear();
    }
}

#[derive(Clone)]
pub struct Process {
    pub pid: Pid,
    pub page_table: PageTable,
    pub page_count: usize,
}

impl Process {
    pub fn new(pid: Pid, page_count: usize) -> Self {
        Self {
            pid,
            page_table: PageTable::new(page_count),
            page_count,
        }
    }

    pub fn resident_count(&self) -> usize {
        self.page_table.resident().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paging::Vpn;

    #[test]
    fn next_free_pid_fills_gaps() {
        let mut pm = ProcessManager::new();
        assert_eq!(pm.next_free_pid(), Pid(0));

        pm.spawn_process(Process::new(Pid(0), 1));
        pm.spawn_process(Process::new(Pid(1), 1));
        pm.spawn_process(Process::new(Pid(3), 1));
        assert_eq!(pm.next_free_pid(), Pid(2));

        pm.remove_process(Pid(0));
        assert_eq!(pm.next_free_pid(), Pid(0));
    }

    #[test]
    fn processes_iterate_in_pid_order() {
        let mut pm = ProcessManager::new();
        pm.spawn_process(Process::new(Pid(7), 2));
        pm.spawn_process(Process::new(Pid(2), 3));

        let pids: Vec<_> = pm.processes().map(|p| p.pid).collect();
        assert_eq!(pids, vec![Pid(2), Pid(7)]);
    }

    #[test]
    fn get_pte_checks_bounds() {
        let mut pm = ProcessManager::new();
        pm.spawn_process(Process::new(Pid(1), 2));

        assert!(pm.get_pte(PageRef::new(Pid(1), Vpn(1))).is_some());
        assert!(pm.get_pte(PageRef::new(Pid(1), Vpn(2))).is_none());
        assert!(pm.get_pte(PageRef::new(Pid(9), Vpn(0))).is_none());
    }
}
