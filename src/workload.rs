use std::collections::BTreeMap;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{hardware::mmu::Operation, kernel::Kernel, process::Pid};

const WORKING_SET_HIT_RATE: f64 = 0.9;
const READ_RATE: f64 = 0.8;

/// Process used by the sample patterns; it needs at least
/// `SAMPLE_PAGE_COUNT` pages.
pub const SAMPLE_PID: Pid = Pid(1);
pub const SAMPLE_PAGE_COUNT: usize = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AccessRequest {
    pub pid: Pid,
    pub virtual_address: usize,
    pub operation: Operation,
}

impl AccessRequest {
    pub fn read(pid: Pid, virtual_address: usize) -> Self {
        Self {
            pid,
            virtual_address,
            operation: Operation::Read,
        }
    }
}

/// Generates random accesses against the live processes of a [`Kernel`].
///
/// Each process gets a working set that most accesses fall into; the set is
/// redrawn after `working_set_lifespan` accesses of that process.
pub struct AccessGenerator {
    rng: StdRng,
    working_set_size: usize,
    working_set_lifespan: usize,
    working_sets: BTreeMap<Pid, WorkingSet>,
}

impl AccessGenerator {
    pub fn new(seed: u64, working_set_size: usize, working_set_lifespan: usize) -> Self {
        Self::with_rng(
            StdRng::seed_from_u64(seed),
            working_set_size,
            working_set_lifespan,
        )
    }

    pub fn from_entropy(working_set_size: usize, working_set_lifespan: usize) -> Self {
        Self::with_rng(
            StdRng::from_rng(&mut rand::rng()),
            working_set_size,
            working_set_lifespan,
        )
    }

    fn with_rng(rng: StdRng, working_set_size: usize, working_set_lifespan: usize) -> Self {
        Self {
            rng,
            working_set_size: working_set_size.max(1),
            working_set_lifespan: working_set_lifespan.max(1),
            working_sets: BTreeMap::new(),
        }
    }

    /// Next access, or `None` when the kernel has no processes.
    pub fn next_request(&mut self, kernel: &Kernel) -> Option<AccessRequest> {
        let processes = kernel.processes();
        if processes.is_empty() {
            return None;
        }
        self.working_sets
            .retain(|pid, _| processes.iter().any(|p| p.pid == *pid));

        let process = &processes[self.rng.random_range(..processes.len())];
        let page_count = process.page_count;

        let working_set = self
            .working_sets
            .entry(process.pid)
            .or_insert_with(|| WorkingSet::new(self.working_set_size));
        if working_set.vpns.is_empty() || working_set.age >= self.working_set_lifespan {
            working_set.scramble(page_count, &mut self.rng);
        }
        working_set.age += 1;

        let vpn = if self.rng.random_bool(WORKING_SET_HIT_RATE) {
            working_set.vpns[self.rng.random_range(..working_set.vpns.len())]
        } else {
            self.rng.random_range(..page_count)
        };

        let operation = if self.rng.random_bool(READ_RATE) {
            Operation::Read
        } else {
            Operation::Write
        };

        let page_size = kernel.config().page_size;
        Some(AccessRequest {
            pid: process.pid,
            virtual_address: vpn * page_size + self.rng.random_range(..page_size),
            operation,
        })
    }

    pub fn batch(&mut self, kernel: &Kernel, len: usize) -> Vec<AccessRequest> {
        (0..len)
            .map_while(|_| self.next_request(kernel))
            .collect()
    }
}

struct WorkingSet {
    size: usize,
    vpns: Vec<usize>,
    age: usize,
}

impl WorkingSet {
    fn new(size: usize) -> Self {
        Self {
            size,
            vpns: Vec::with_capacity(size),
            age: 0,
        }
    }

    fn scramble(&mut self, page_count: usize, rng: &mut StdRng) {
        self.vpns.clear();
        self.age = 0;
        for _ in 0..self.size {
            self.vpns.push(rng.random_range(..page_count));
        }
    }
}

#[derive(Clone, Debug)]
pub struct SamplePattern {
    pub name: &'static str,
    pub description: &'static str,
    pub accesses: Vec<AccessRequest>,
}

/// Canned read patterns over [`SAMPLE_PID`] that separate the algorithms
/// once they touch more pages than there are frames.
pub fn sample_patterns(page_size: usize) -> Vec<SamplePattern> {
    let pattern = |name, description, vpns: &[usize]| SamplePattern {
        name,
        description,
        accesses: vpns
            .iter()
            .map(|vpn| AccessRequest::read(SAMPLE_PID, vpn * page_size))
            .collect(),
    };

    vec![
        pattern(
            "Basic Sequential + Revisit",
            "revisits early pages",
            &[0, 1, 2, 3, 4, 5, 6, 7, 8, 0, 1],
        ),
        pattern(
            "LRU-Friendly Pattern",
            "recent page reuse",
            &[0, 1, 2, 3, 4, 5, 6, 7, 8, 8, 7, 6, 9, 10],
        ),
        pattern(
            "FIFO-Friendly Pattern",
            "old page reuse",
            &[0, 1, 2, 3, 4, 5, 6, 7, 8, 0, 1, 2, 9, 10],
        ),
        pattern(
            "Working Set Pattern",
            "tight locality, then expansion",
            &[0, 1, 2, 0, 1, 2, 3, 4, 5, 6, 7, 0, 1, 2],
        ),
        pattern(
            "Mixed Access Pattern",
            "varied reuse",
            &[0, 1, 2, 3, 4, 5, 6, 7, 0, 8, 1, 9, 2, 10, 0],
        ),
    ]
}
