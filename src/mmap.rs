//! Anonymous, page-granular virtual memory mapping.
//!
//! The reserved heap range and every big-object body go through this module.
//! Each [`Mapping`] owns exactly one `mmap` region and releases it on
//! `Drop`, so every mapping site has exactly one release site as required by
//! the resource discipline in the runtime's concurrency model.

#[cfg(unix)]
mod _unix {
    use std::ptr::null_mut;

    pub struct Mapping {
        start: *mut u8,
        size: usize,
    }

    impl Mapping {
        pub fn new(size: usize) -> Option<Self> {
            unsafe {
                let map = libc::mmap(
                    null_mut(),
                    size,
                    libc::PROT_READ | libc::PROT_WRITE,
                    libc::MAP_PRIVATE | libc::MAP_ANON,
                    -1,
                    0,
                );
                if map == libc::MAP_FAILED {
                    return None;
                }
                Some(Self {
                    start: map as *mut u8,
                    size,
                })
            }
        }

        pub fn start(&self) -> *mut u8 {
            self.start
        }

        pub const fn size(&self) -> usize {
            self.size
        }
    }

    impl Drop for Mapping {
        fn drop(&mut self) {
            unsafe {
                libc::munmap(self.start as *mut _, self.size);
            }
        }
    }
}

#[cfg(not(unix))]
mod _unsupported {
    /// Non-POSIX targets have no mapping backend; the runtime must refuse to
    /// start there rather than silently fabricate one.
    pub struct Mapping;

    impl Mapping {
        pub fn new(_size: usize) -> Option<Self> {
            None
        }

        pub fn start(&self) -> *mut u8 {
            unreachable!("Mapping::new always fails on this platform")
        }

        pub const fn size(&self) -> usize {
            0
        }
    }
}

#[cfg(unix)]
pub use _unix::Mapping;
#[cfg(not(unix))]
pub use _unsupported::Mapping;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn mapping_is_zeroed_and_writable() {
        let size = 64 * 1024;
        let mapping = Mapping::new(size).expect("mmap should succeed");
        assert_eq!(mapping.size(), size);
        unsafe {
            let base = mapping.start();
            assert_eq!(*base, 0);
            *base = 0xff;
            assert_eq!(*base, 0xff);
        }
    }
}
