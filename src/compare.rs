use log::{info, warn};

use crate::{
    kernel::{AccessCounters, Kernel, MemoryMap, Statistics},
    paging::Algorithm,
    workload::AccessRequest,
};

#[derive(Clone, Debug)]
pub struct ComparisonResult {
    pub algorithm: Algorithm,
    pub statistics: Statistics,
    pub counters: AccessCounters,
    /// Accesses rejected by the engine (unknown process, bad address).
    pub failed: usize,
    pub final_memory: MemoryMap,
}

/// Runs `batch` once per algorithm, each time on a fresh copy of `kernel`
/// with zeroed statistics. `kernel` itself is not modified.
pub fn compare_algorithms(kernel: &Kernel, batch: &[AccessRequest]) -> Vec<ComparisonResult> {
    Algorithm::ALL
        .iter()
        .map(|&algorithm| run_batch(kernel, batch, algorithm))
        .collect()
}

pub fn run_batch(kernel: &Kernel, batch: &[AccessRequest], algorithm: Algorithm) -> ComparisonResult {
    let mut sim = kernel.clone();
    sim.set_algorithm(algorithm);
    sim.reset_statistics();

    let mut failed = 0;
    for (i, request) in batch.iter().enumerate() {
        if let Err(err) = sim.access_memory(
            request.pid,
            request.virtual_address,
            request.operation,
            algorithm,
        ) {
            warn!("{} batch access {} failed: {}", algorithm, i + 1, err);
            failed += 1;
        }
    }

    let statistics = sim.statistics();
    info!(
        "{}: {} accesses, {} faults, hit ratio {:.2}",
        algorithm, statistics.accesses, statistics.faults, statistics.hit_ratio
    );

    ComparisonResult {
        algorithm,
        statistics,
        counters: sim.algorithm_statistics(algorithm),
        failed,
        final_memory: sim.memory_map(),
    }
}
