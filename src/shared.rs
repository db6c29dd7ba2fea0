use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    config::EngineConfig,
    error::Result,
    hardware::mmu::Operation,
    kernel::{AccessCounters, AccessOutcome, FrameInfo, Kernel, MemoryMap, PageInfo, ProcessInfo, Statistics},
    paging::Algorithm,
    process::Pid,
};

/// Cloneable handle that serializes every mutation of one [`Kernel`].
///
/// Mutations take the write lock for their whole duration; inspection takes
/// the read lock, so readers never see a half-applied fault.
#[derive(Clone)]
pub struct SharedKernel {
    inner: Arc<RwLock<Kernel>>,
}

impl SharedKernel {
    pub fn new(kernel: Kernel) -> Self {
        Self {
            inner: Arc::new(RwLock::new(kernel)),
        }
    }

    pub fn with_config(config: EngineConfig) -> Result<Self> {
        Ok(Self::new(Kernel::with_config(config)?))
    }

    pub fn create_process(&self, pid: Pid, page_count: usize) -> Result<ProcessInfo> {
        self.inner.write().create_process(pid, page_count)
    }

    pub fn spawn_process(&self, page_count: usize) -> Result<Pid> {
        self.inner.write().spawn_process(page_count)
    }

    pub fn terminate_process(&self, pid: Pid) -> Result<usize> {
        self.inner.write().terminate_process(pid)
    }

    pub fn access_memory(
        &self,
        pid: Pid,
        virtual_address: usize,
        operation: Operation,
        algorithm: Algorithm,
    ) -> Result<AccessOutcome> {
        self.inner
            .write()
            .access_memory(pid, virtual_address, operation, algorithm)
    }

    pub fn reset(&self) {
        self.inner.write().reset()
    }

    pub fn translate_address(&self, pid: Pid, virtual_address: usize) -> Result<usize> {
        self.inner.read().translate_address(pid, virtual_address)
    }

    pub fn statistics(&self) -> Statistics {
        self.inner.read().statistics()
    }

    pub fn algorithm_statistics(&self, algorithm: Algorithm) -> AccessCounters {
        self.inner.read().algorithm_statistics(algorithm)
    }

    pub fn processes(&self) -> Vec<ProcessInfo> {
        self.inner.read().processes()
    }

    pub fn page_table(&self, pid: Pid) -> Result<Vec<PageInfo>> {
        self.inner.read().page_table(pid)
    }

    pub fn frames(&self) -> Vec<FrameInfo> {
        self.inner.read().frames()
    }

    pub fn memory_map(&self) -> MemoryMap {
        self.inner.read().memory_map()
    }

    /// Copy of the current engine state.
    pub fn snapshot(&self) -> Kernel {
        self.inner.read().clone()
    }
}
