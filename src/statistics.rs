//! Heap statistics snapshot and its human-readable report.
//!
//! Same `FormattedSize` byte-scaling `Display` helper as other heap
//! reporting in this family of runtimes, with fields for this heap's own
//! inline/big-object split instead of immix blocks.

pub struct HeapStatistics {
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub heap_size: u64,
    pub big_object_bytes: u64,
    pub big_object_count: usize,
    pub collections_run: usize,
}

struct FormattedSize {
    size: u64,
}

impl std::fmt::Display for FormattedSize {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let ksize = (self.size as f64) / 1024f64;
        if ksize < 1f64 {
            return write!(f, "{}B", self.size);
        }
        let msize = ksize / 1024f64;
        if msize < 1f64 {
            return write!(f, "{:.1}K", ksize);
        }
        let gsize = msize / 1024f64;
        if gsize < 1f64 {
            write!(f, "{:.1}M", msize)
        } else {
            write!(f, "{:.1}G", gsize)
        }
    }
}

fn formatted_size(size: u64) -> FormattedSize {
    FormattedSize { size }
}

impl std::fmt::Display for HeapStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Heap statistics:")?;
        writeln!(
            f,
            "  Inline heap: {} used of {}",
            formatted_size(self.used_bytes),
            formatted_size(self.heap_size)
        )?;
        writeln!(f, "  Inline heap free: {}", formatted_size(self.free_bytes))?;
        writeln!(
            f,
            "  Big objects: {} ({})",
            self.big_object_count,
            formatted_size(self.big_object_bytes)
        )?;
        writeln!(
            f,
            "  Total memory in use: {}",
            formatted_size(self.used_bytes + self.big_object_bytes)
        )?;
        writeln!(f, "  Collection cycles run: {}", self.collections_run)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_byte_scale_boundaries() {
        assert_eq!(formatted_size(512).to_string(), "512B");
        assert_eq!(formatted_size(2048).to_string(), "2.0K");
        assert_eq!(formatted_size(3 * 1024 * 1024).to_string(), "3.0M");
        assert_eq!(formatted_size(5 * 1024 * 1024 * 1024).to_string(), "5.0G");
    }

    #[test]
    fn display_includes_key_figures() {
        let stats = HeapStatistics {
            used_bytes: 1024,
            free_bytes: 4096,
            heap_size: 5120,
            big_object_bytes: 0,
            big_object_count: 0,
            collections_run: 3,
        };
        let rendered = stats.to_string();
        assert!(rendered.contains("Collection cycles run: 3"));
        assert!(rendered.contains("1.0K"));
    }
}
