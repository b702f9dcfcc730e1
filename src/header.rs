//! The 8-byte header that precedes every inline object body.

use crate::globals::HEADER_SIZE;

/// Precedes every object body in the inline heap.
///
/// `size == 0` marks a padding-only slot emitted to keep the following
/// header 16-byte aligned; padding headers carry no body and are skipped by
/// every walk.
///
/// Some mark-sweep runtimes link their mark worklist through a `mark_next`
/// field overlaid onto these same bits. This one keeps the worklist as an
/// explicit `Vec<u32>` owned by the collector (see `DESIGN.md`) instead of
/// reusing header storage, so no `mark_next` field appears here; nothing in
/// this crate reinterprets header bytes outside of this struct's own
/// fields.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    /// Body size in words (`crate::value` word width), or 0 for padding.
    pub size: u32,
    /// Word offset into the body where the reference region starts.
    pub scan_offset: u16,
    /// Number of reference-shaped words in the reference region.
    pub scan_size: u16,
}

const _ASSERT_HEADER_IS_EIGHT_BYTES: [u8; 8] = [0; core::mem::size_of::<Header>()];

impl Header {
    pub const PADDING: Header = Header {
        size: 0,
        scan_offset: 0,
        scan_size: 0,
    };

    #[inline(always)]
    pub fn is_padding(&self) -> bool {
        self.size == 0
    }

    /// Body size in bytes.
    #[inline(always)]
    pub fn body_bytes(&self) -> usize {
        self.size as usize * crate::globals::WORD_SIZE
    }

    /// Total size in bytes, including this header, of the slot this object
    /// occupies.
    #[inline(always)]
    pub fn total_bytes(&self) -> usize {
        HEADER_SIZE + self.body_bytes()
    }

    /// Pointer to this header's body, given a pointer to the header itself.
    ///
    /// # Safety
    /// `header` must point at a valid `Header` inside the live heap region.
    #[inline(always)]
    pub unsafe fn body_of(header: *mut Header) -> *mut u8 {
        header.add(1) as *mut u8
    }

    /// Recovers the header pointer from a body pointer produced by
    /// [`Header::body_of`].
    ///
    /// # Safety
    /// `body` must have been returned by `body_of` for a live header.
    #[inline(always)]
    pub unsafe fn header_of(body: *mut u8) -> *mut Header {
        (body as *mut Header).offset(-1)
    }
}
