//! The big-object table: descriptors for objects above the inline size
//! threshold, allocated individually by OS mapping and never moved.
//!
//! A flat, sorted vector of descriptors searched by binary search, guarded
//! by a raw mutex even though (per this runtime's single-threaded-per-context
//! model) there is never real contention.

use crate::mmap::Mapping;
use parking_lot::lock_api::RawMutex as _;
use parking_lot::RawMutex;

/// One big object: its backing mapping plus the same reference-layout
/// metadata an inline header would carry.
pub struct BigObject {
    mapping: Mapping,
    pub scan_offset: u32,
    pub scan_size: u32,
    pub mark: bool,
}

impl BigObject {
    #[inline(always)]
    pub fn body(&self) -> usize {
        self.mapping.start() as usize
    }

    #[inline(always)]
    pub fn size(&self) -> usize {
        self.mapping.size()
    }
}

/// Descriptors are kept sorted by body address so the mark phase can test a
/// candidate pointer for big-object membership with a binary search.
pub struct BigObjectTable {
    mutex: RawMutex,
    objects: Vec<BigObject>,
    sorted: bool,
}

impl BigObjectTable {
    pub fn new() -> Self {
        Self {
            mutex: RawMutex::INIT,
            objects: Vec::new(),
            sorted: true,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Total bytes currently mapped for big objects.
    pub fn total_bytes(&self) -> usize {
        self.objects.iter().map(BigObject::size).sum()
    }

    /// Maps a new big object body of `size` bytes. Returns `None` if the OS
    /// mapping fails; the caller drives the collect/resize/abort escalation
    /// ladder described in `crate::heap`.
    pub fn allocate(&mut self, size: usize, scan_offset: u32, scan_size: u32) -> Option<usize> {
        self.mutex.lock();
        let mapping = Mapping::new(size);
        let result = mapping.map(|mapping| {
            let body = mapping.start() as usize;
            self.objects.push(BigObject {
                mapping,
                scan_offset,
                scan_size,
                mark: false,
            });
            self.sorted = false;
            body
        });
        unsafe { self.mutex.unlock() };
        result
    }

    /// Sorts descriptors by body address; must be called before
    /// [`BigObjectTable::find`] after any insertion.
    pub fn prepare_for_mark(&mut self) {
        self.objects.sort_by_key(BigObject::body);
        self.sorted = true;
        for obj in &mut self.objects {
            obj.mark = false;
        }
    }

    /// Looks up the big object whose body equals `addr`, if any. Requires
    /// [`BigObjectTable::prepare_for_mark`] to have been called since the
    /// last insertion.
    pub fn find(&self, addr: usize) -> Option<usize> {
        debug_assert!(self.sorted);
        self.objects
            .binary_search_by_key(&addr, BigObject::body)
            .ok()
    }

    pub fn get(&self, index: usize) -> &BigObject {
        &self.objects[index]
    }

    pub fn mark(&mut self, index: usize) -> bool {
        let obj = &mut self.objects[index];
        if obj.mark {
            return false;
        }
        obj.mark = true;
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &BigObject> {
        self.objects.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BigObject> {
        self.objects.iter_mut()
    }

    /// Unmaps every unmarked object and clears the mark bit on survivors.
    /// Returns the number of objects freed.
    pub fn sweep(&mut self) -> usize {
        let before = self.objects.len();
        self.objects.retain(|obj| obj.mark);
        for obj in &mut self.objects {
            obj.mark = false;
        }
        before - self.objects.len()
    }
}

impl Default for BigObjectTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_find_sweep() {
        let mut table = BigObjectTable::new();
        let a = table.allocate(8192, 0, 4).unwrap();
        let b = table.allocate(8192, 0, 4).unwrap();
        table.prepare_for_mark();

        assert!(table.find(a).is_some());
        assert!(table.find(b).is_some());
        assert!(table.find(a + 1).is_none());

        let ia = table.find(a).unwrap();
        table.mark(ia);
        let freed = table.sweep();
        assert_eq!(freed, 1);
        table.prepare_for_mark();
        assert!(table.find(a).is_some());
        assert!(table.find(b).is_none());
    }
}
