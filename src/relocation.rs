//! Relocation table used to patch references during a sliding compaction.

/// Describes how far one compacted object moved.
///
/// `src` is the pre-compaction slot index (`(body - base) / SLOT_SIZE`) of
/// the object; `diff` is the slot distance it moved towards the base.
/// Entries are appended in strictly ascending `src` order within one flush,
/// which is what makes binary-search lookup valid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Relocation {
    pub src: u32,
    pub diff: u32,
}

/// Fixed-capacity, append-only table of relocations for one compaction
/// flush. The capacity is derived from heap size (`RELOCATION_GRANULARITY`);
/// when it fills, the collector performs a partial fixup and clears the
/// table to keep compacting (see `crate::collect`).
pub struct RelocationTable {
    entries: Vec<Relocation>,
    capacity: usize,
}

impl RelocationTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    /// Appends a relocation. `src` must be strictly greater than every
    /// previously appended `src` in this table's current lifetime.
    pub fn push(&mut self, entry: Relocation) {
        debug_assert!(self.entries.last().map_or(true, |last| last.src < entry.src));
        debug_assert!(!self.is_full(), "relocation table overflow");
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Locates the relocation with the greatest `src <= slot`, if any. The
    /// empty table is short-circuited explicitly rather than relying on
    /// unsigned wraparound of a `hi = mid - 1` binary search.
    pub fn find(&self, slot: u32) -> Option<Relocation> {
        if self.entries.is_empty() {
            return None;
        }
        let mut lo = 0usize;
        let mut hi = self.entries.len(); // exclusive upper bound
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.entries[mid].src <= slot {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        if lo == 0 {
            None
        } else {
            Some(self.entries[lo - 1])
        }
    }

    /// Applies the table to `body`, returning the relocated address, or
    /// `body` unchanged if no relocation applies (object wasn't moved by
    /// this flush).
    pub fn apply(&self, base: usize, body: usize) -> usize {
        let slot = ((body - base) / crate::globals::SLOT_SIZE) as u32;
        match self.find(slot) {
            Some(r) => body - (r.diff as usize) * crate::globals::SLOT_SIZE,
            None => body,
        }
    }

    pub fn entries(&self) -> &[Relocation] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_finds_nothing() {
        let t = RelocationTable::new(8);
        assert_eq!(t.find(0), None);
        assert_eq!(t.find(1000), None);
    }

    #[test]
    fn finds_greatest_src_leq_query() {
        let mut t = RelocationTable::new(8);
        t.push(Relocation { src: 2, diff: 1 });
        t.push(Relocation { src: 5, diff: 3 });
        t.push(Relocation { src: 9, diff: 4 });

        assert_eq!(t.find(0), None);
        assert_eq!(t.find(2), Some(Relocation { src: 2, diff: 1 }));
        assert_eq!(t.find(4), Some(Relocation { src: 2, diff: 1 }));
        assert_eq!(t.find(5), Some(Relocation { src: 5, diff: 3 }));
        assert_eq!(t.find(100), Some(Relocation { src: 9, diff: 4 }));
    }

    #[test]
    fn apply_uses_slot_granularity() {
        let mut t = RelocationTable::new(4);
        let base = 0x10000;
        let slot = crate::globals::SLOT_SIZE;
        t.push(Relocation { src: 4, diff: 2 });
        let body = base + 4 * slot;
        assert_eq!(t.apply(base, body), body - 2 * slot);
        assert_eq!(t.apply(base, base + slot), base + slot);
    }
}
