use crate::{
    error::{Result, VmError},
    memory::{DEFAULT_FRAME_COUNT, DEFAULT_PAGE_SIZE},
    paging::Algorithm,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EngineConfig {
    pub frame_count: usize,
    pub page_size: usize,
    /// Policy active after construction and after `reset`.
    pub algorithm: Algorithm,
}

impl EngineConfig {
    pub fn new(frame_count: usize, page_size: usize) -> Self {
        Self {
            frame_count,
            page_size,
            ..Self::default()
        }
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_count == 0 {
            return Err(VmError::InvalidArgument(
                "frame count must be positive".to_string(),
            ));
        }
        if self.page_size == 0 {
            return Err(VmError::InvalidArgument(
                "page size must be positive".to_string(),
            ));
        }
        if self.frame_count.checked_mul(self.page_size).is_none() {
            return Err(VmError::InvalidArgument(format!(
                "{} frames of {} bytes exceed the physical address space",
                self.frame_count, self.page_size
            )));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_count: DEFAULT_FRAME_COUNT,
            page_size: DEFAULT_PAGE_SIZE,
            algorithm: Algorithm::Fifo,
        }
    }
}
