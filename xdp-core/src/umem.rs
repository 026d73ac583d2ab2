//! The UMEM: the user-allocated, kernel-registered region of equal-sized
//! frames addressed by byte offset. Owned exclusively by the socket that
//! registered it, mapped shared with the kernel.

use crate::mmap::OwnedMmap;
use std::io;

pub struct Umem {
    mmap: OwnedMmap,
    frame_size: u32,
    num_frames: u32,
}

impl Umem {
    /// Allocates `num_frames * frame_size` bytes of private, anonymous,
    /// pre-populated memory suitable for UMEM registration.
    pub fn allocate(num_frames: u32, frame_size: u32, huge_page: Option<bool>) -> io::Result<Self> {
        debug_assert!(frame_size.is_power_of_two());
        let mmap = OwnedMmap::mmap(num_frames as usize * frame_size as usize, huge_page)?;
        Ok(Umem {
            mmap,
            frame_size,
            num_frames,
        })
    }

    pub fn frame_size(&self) -> u32 {
        self.frame_size
    }

    pub fn num_frames(&self) -> u32 {
        self.num_frames
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    pub fn base_ptr(&self) -> *mut libc::c_void {
        self.mmap.as_void_ptr()
    }

    /// Byte offset of the `index`-th frame. Invariant: `addr mod
    /// frame_size == 0` and `addr + frame_size <= len`.
    pub fn frame_addr(&self, index: u32) -> u64 {
        debug_assert!(index < self.num_frames);
        index as u64 * self.frame_size as u64
    }

    /// An immutable view of `len` bytes starting at UMEM offset `addr`.
    ///
    /// # Safety
    /// `addr + len` must not exceed the UMEM length; callers only ever
    /// pass descriptors the kernel or this crate produced, which upholds
    /// that bound.
    pub unsafe fn frame(&self, addr: u64, len: usize) -> &[u8] {
        unsafe {
            let base = self.mmap.as_void_ptr() as *const u8;
            std::slice::from_raw_parts(base.add(addr as usize), len)
        }
    }

    /// A mutable view of `len` bytes starting at UMEM offset `addr`.
    ///
    /// # Safety
    /// Same bound as [`Umem::frame`]; additionally the caller must not
    /// alias this range with another live reference.
    pub unsafe fn frame_mut(&self, addr: u64, len: usize) -> &mut [u8] {
        unsafe {
            let base = self.mmap.as_void_ptr() as *mut u8;
            std::slice::from_raw_parts_mut(base.add(addr as usize), len)
        }
    }
}
