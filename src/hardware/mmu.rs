use crate::{
    error::Result,
    paging::{PageTable, Pfn, Vpn},
};

#[derive(Clone, Copy, Debug)]
pub struct Mmu {
    page_size: usize,
}

impl Mmu {
    pub fn new(page_size: usize) -> Self {
        Self { page_size }
    }

    /// Splits a virtual address into its page number and in-page offset.
    pub fn split(&self, virtual_address: usize) -> (Vpn, usize) {
        (
            Vpn(virtual_address / self.page_size),
            virtual_address % self.page_size,
        )
    }

    pub fn physical_address(&self, pfn: Pfn, offset: usize) -> usize {
        pfn.0 * self.page_size + offset
    }

    /// Hit path of an access. Marks a present page referenced (and dirty on
    /// writes); a missing page is reported without touching the table.
    pub fn translate(
        &self,
        page_table: &mut PageTable,
        vpn: Vpn,
        operation: Operation,
        now: u64,
    ) -> Result<TranslationResult> {
        let pfn = match page_table.lookup(vpn)?.frame() {
            Some(pfn) => pfn,
            None => return Ok(TranslationResult::PageFault),
        };

        page_table.mark_accessed(vpn, operation.is_write(), now)?;

        Ok(TranslationResult::Success(pfn))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Operation {
    Read,
    Write,
}

impl Operation {
    pub fn is_write(self) -> bool {
        matches!(self, Operation::Write)
    }
}

impl From<bool> for Operation {
    fn from(is_write: bool) -> Self {
        if is_write {
            Operation::Write
        } else {
            Operation::Read
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TranslationResult {
    Success(Pfn),
    PageFault,
}
