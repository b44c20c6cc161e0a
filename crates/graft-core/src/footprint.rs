//! Heap cost estimation.

/// Estimated overhead of one heap instance (header + allocator slack).
pub const INSTANCE_OVERHEAD: usize = 16;
/// Size of one reference slot.
pub const REFERENCE_SIZE: usize = 8;
/// Bookkeeping cost of one field entry on a node.
pub const ENTRY_SIZE: usize = 4;

/// Running total of a node's (or a graph's) estimated heap cost.
///
/// Fields report what they hold; [`MemoryFootprint::total`] turns the
/// counts into bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryFootprint {
    pub instances: usize,
    pub references: usize,
    pub entries: usize,
    pub bytes: usize,
}

impl MemoryFootprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report_instance(&mut self) {
        self.instances += 1;
    }

    pub fn report_reference(&mut self) {
        self.references += 1;
    }

    pub fn report_entry(&mut self) {
        self.entries += 1;
    }

    pub fn report_bytes(&mut self, n: usize) {
        self.bytes += n;
    }

    pub fn total(&self) -> usize {
        self.instances * INSTANCE_OVERHEAD
            + self.references * REFERENCE_SIZE
            + self.entries * ENTRY_SIZE
            + self.bytes
    }
}
