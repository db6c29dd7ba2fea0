use thiserror::Error;

use crate::{
    paging::{Pfn, Vpn},
    process::Pid,
};

pub type Result<T> = std::result::Result<T, VmError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Process {0} does not exist")]
    UnknownProcess(Pid),

    #[error("Process {0} already exists")]
    DuplicateProcess(Pid),

    #[error("Virtual address {address} out of bounds for process {pid}")]
    InvalidAddress { pid: Pid, address: usize },

    #[error("Page {vpn} out of range (page count {page_count})")]
    InvalidPage { vpn: Vpn, page_count: usize },

    #[error("Page {vpn} of process {pid} is not resident")]
    PageNotResident { pid: Pid, vpn: Vpn },

    // Internal invariant violations below. None of these are reachable through
    // correct use of the public API.
    #[error("No free frame available")]
    OutOfMemory,

    #[error("Frame {0} is invalid or already free")]
    InvalidFrame(Pfn),

    #[error("Page {0} is already mapped")]
    PageAlreadyMapped(Vpn),

    #[error("Page {0} is not mapped")]
    PageNotMapped(Vpn),

    #[error("Replacement policy has no victim while memory is full")]
    NoVictim,
}

impl VmError {
    /// Whether this error signals a broken engine invariant rather than bad
    /// caller input.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::OutOfMemory
                | Self::InvalidFrame(_)
                | Self::PageAlreadyMapped(_)
                | Self::PageNotMapped(_)
                | Self::NoVictim
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caller_errors_are_not_fatal() {
        assert!(!VmError::UnknownProcess(Pid(1)).is_fatal());
        assert!(!VmError::InvalidArgument("x".into()).is_fatal());
        assert!(
            !VmError::PageNotResident {
                pid: Pid(1),
                vpn: Vpn(0)
            }
            .is_fatal()
        );
    }

    #[test]
    fn invariant_errors_are_fatal() {
        assert!(VmError::OutOfMemory.is_fatal());
        assert!(VmError::InvalidFrame(Pfn(3)).is_fatal());
        assert!(VmError::NoVictim.is_fatal());
    }

    #[test]
    fn messages_name_the_process() {
        let err = VmError::InvalidAddress {
            pid: Pid(2),
            address: 9000,
        };
        assert_eq!(
            err.to_string(),
            "Virtual address 9000 out of bounds for process 2"
        );
    }
}
