/// Insert/delete counters of one gated collection.
///
/// Both counters saturate at `u64::MAX` instead of wrapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionStats {
    insert_count: u64,
    delete_count: u64,
}

impl CollectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_insert(&mut self) {
        self.insert_count = self.insert_count.saturating_add(1);
    }

    pub fn record_delete(&mut self) {
        self.delete_count = self.delete_count.saturating_add(1);
    }

    pub fn insert_count(&self) -> u64 {
        self.insert_count
    }

    pub fn delete_count(&self) -> u64 {
        self.delete_count
    }

    /// Items currently held: `insert_count - delete_count`.
    pub fn live_count(&self) -> u64 {
        self.insert_count.saturating_sub(self.delete_count)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
