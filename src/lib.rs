pub mod compare;
pub mod config;
pub mod error;
pub mod hardware;
pub mod kernel;
pub mod memory;
pub mod paging;
pub mod process;
pub mod shared;
pub mod workload;

pub use config::EngineConfig;
pub use error::{Result, VmError};
pub use kernel::{AccessOutcome, Kernel, Statistics};
pub use shared::SharedKernel;
