use std::process;

use log::error;
use vm_sim::{
    EngineConfig, Kernel, Result,
    compare::{ComparisonResult, compare_algorithms},
    workload::{AccessGenerator, SAMPLE_PAGE_COUNT, SAMPLE_PID, sample_patterns},
};

struct SimConfig {
    frame_count: usize,
    page_size: usize,
    process_count: usize,
    pages_per_process: usize,
    working_set_size: usize,
    working_set_lifespan: usize,
    duration: usize,
    seed: u64,
}

const CONFIG: SimConfig = SimConfig {
    frame_count: 8,
    page_size: 4096,
    process_count: 4,
    pages_per_process: 64,
    working_set_size: 3,
    working_set_lifespan: 256,
    duration: 10_000,
    seed: 0x5EED,
};

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        error!("Simulation failed: {}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    print_header();

    let engine_config = EngineConfig::new(CONFIG.frame_count, CONFIG.page_size);

    for pattern in sample_patterns(CONFIG.page_size) {
        let mut kernel = Kernel::with_config(engine_config)?;
        kernel.create_process(SAMPLE_PID, SAMPLE_PAGE_COUNT)?;

        println!("# Pattern `{}` ({})\n", pattern.name, pattern.description);
        for result in compare_algorithms(&kernel, &pattern.accesses) {
            print_report(&result);
        }
    }

    let mut kernel = Kernel::with_config(engine_config)?;
    for _ in 0..CONFIG.process_count {
        kernel.spawn_process(CONFIG.pages_per_process)?;
    }
    let mut generator = AccessGenerator::new(
        CONFIG.seed,
        CONFIG.working_set_size,
        CONFIG.working_set_lifespan,
    );
    let batch = generator.batch(&kernel, CONFIG.duration);

    println!("# Random workload\n");
    for result in compare_algorithms(&kernel, &batch) {
        print_report(&result);
    }

    Ok(())
}

fn print_header() {
    println!("# Virtual memory simulation\n");
    print_row_header("## Conditions");
    print_row("Frame count", &CONFIG.frame_count);
    print_row("Page size", &CONFIG.page_size);
    print_row("Process count", &CONFIG.process_count);
    print_row("Pages per process", &CONFIG.pages_per_process);
    print_row("Working set size", &CONFIG.working_set_size);
    print_row("Random accesses", &CONFIG.duration);
    println!();
}

fn print_report(result: &ComparisonResult) {
    let stats = &result.statistics;
    print_row_header(&format!("## Stats for the `{}` policy", result.algorithm));
    print_row("Memory accesses", &stats.accesses);
    print_row("Page hits", &stats.hits);
    print_row("Page faults", &stats.faults);
    print_row("Evictions", &stats.evictions);
    print_row("Dirty write-backs", &stats.writebacks);
    print_row("Failed accesses", &result.failed);
    print_row("Hit rate", &format!("{:.2}%", stats.hit_ratio * 100.0));
    print_row("Utilization", &format!("{:.2}%", stats.utilization * 100.0));
    println!();
}

fn print_row_header(title: &str) {
    println!("{}", title);
    println!("| {:<20} | {:<20} |", "Metric", "Value");
    println!("| {:-<20} | {:-<20} |", "-", "-");
}

fn print_row(label: &str, value: &dyn std::fmt::Display) {
    println!("| {:<20} | {:<20} |", label, value);
}
