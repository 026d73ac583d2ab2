//! # AF_XDP ring buffers
//!
//! ## Purpose
//!
//! The four SPSC rings shared between user space and the kernel: Fill,
//! RX, TX, Completion. Each ring is a power-of-two circular buffer with
//! a producer index and a consumer index, one side owned by the kernel
//! and one by us, exposed through `libc`'s `xdp_mmap_offsets`.
//!
//! ## How it works
//!
//! `Ring<T>` wraps the mapped memory for one ring and the local copy of
//! whichever index this side owns. `submit` publishes entries on the
//! producer side (Fill, TX); `drain` consumes entries on the consumer
//! side (RX, Completion). Both respect the ring's free/readable space
//! and pair a release store of the local index with an acquire load of
//! the peer's.
//!
//! ## Main components
//!
//! - `Ring<T>`: the generic SPSC ring half.
//! - `RingMmap<T>`: the raw pointers into the mapped region.
//! - `XdpDesc`: the 16-byte RX/TX descriptor.
//! - `RingType`: selects offsets and socket options per ring.

use crate::mmap::OwnedMmap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::{io, mem::size_of, ptr};

/// Holds the raw memory-mapped components of a ring buffer.
pub struct RingMmap<T> {
    /// The memory-mapped region owned by this struct.
    pub mmap: OwnedMmap,
    /// A pointer to the atomic producer index of the ring.
    pub producer: *mut AtomicU32,
    /// A pointer to the atomic consumer index of the ring.
    pub consumer: *mut AtomicU32,
    /// A pointer to the beginning of the descriptor array.
    pub desc: *mut T,
    /// A pointer to the atomic flags field of the ring.
    pub flags: *mut AtomicU32,
}

// Safety: see `OwnedMmap`'s `Send` impl; the extra pointers here address
// the same mapped region and carry the same reasoning.
unsafe impl<T> Send for RingMmap<T> {}

impl<T> Default for RingMmap<T> {
    fn default() -> Self {
        RingMmap {
            mmap: OwnedMmap(ptr::null_mut(), 0),
            producer: ptr::null_mut(),
            consumer: ptr::null_mut(),
            desc: ptr::null_mut(),
            flags: ptr::null_mut(),
        }
    }
}

/// An XDP descriptor, used in the TX and RX rings. Corresponds to
/// `struct xdp_desc` in the kernel: a single packet buffer in the UMEM.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XdpDesc {
    /// The address of the packet data within the UMEM.
    pub addr: u64,
    /// The length of the packet data.
    pub len: u32,
    /// Options for the descriptor, currently unused.
    pub options: u32,
}

impl XdpDesc {
    pub fn new(addr: u64, len: u32, options: u32) -> Self {
        XdpDesc { addr, len, options }
    }
}

/// Which side of the ring this process owns. Producer-owned rings
/// (Fill, TX) publish entries and advance the producer index; the
/// kernel advances the consumer index. Consumer-owned rings (RX,
/// Completion) are the mirror image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Side {
    Producer,
    Consumer,
}

/// A generic, safe wrapper for one half of an AF_XDP SPSC ring.
pub struct Ring<T> {
    mmap: RingMmap<T>,
    len: usize,
    mod_mask: u32,
    side: Side,
    /// This side's own index, cached locally and published with a
    /// release store each time it advances.
    local: u32,
}

impl<T> Default for Ring<T> {
    fn default() -> Self {
        Ring {
            mmap: RingMmap::default(),
            len: 0,
            mod_mask: 0,
            side: Side::Producer,
            local: 0,
        }
    }
}

impl<T> Ring<T>
where
    T: Copy,
{
    fn mmap_as(
        fd: i32,
        len: usize,
        ring_type: u64,
        offsets: &libc::xdp_ring_offset,
        side: Side,
    ) -> Result<Self, io::Error> {
        debug_assert!(len.is_power_of_two());
        Ok(Ring {
            mmap: mmap_ring(fd, len * size_of::<T>(), offsets, ring_type)?,
            len,
            mod_mask: len as u32 - 1,
            side,
            local: 0,
        })
    }

    /// Number of entries this ring can hold.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reads the `XDP_RING_NEED_WAKEUP` and related flags published by the kernel.
    pub fn flags(&self) -> u32 {
        if self.mmap.flags.is_null() {
            return 0;
        }
        unsafe { (*self.mmap.flags).load(Ordering::Relaxed) }
    }

    fn peer_producer(&self) -> u32 {
        unsafe { (*self.mmap.producer).load(Ordering::Acquire) }
    }

    fn peer_consumer(&self) -> u32 {
        unsafe { (*self.mmap.consumer).load(Ordering::Acquire) }
    }

    /// Producer-side operation: publishes up to `items.len()` entries,
    /// bounded by the ring's free space, and advances the producer
    /// index with release ordering. Returns the number accepted.
    pub fn submit(&mut self, items: &[T]) -> usize {
        debug_assert_eq!(self.side, Side::Producer);
        let consumer = self.peer_consumer();
        let free = self.len as u32 - self.local.wrapping_sub(consumer);
        let n = items.len().min(free as usize);
        for item in items.iter().take(n) {
            let idx = (self.local & self.mod_mask) as usize;
            unsafe {
                *self.mmap.desc.add(idx) = *item;
            }
            self.local = self.local.wrapping_add(1);
        }
        if n > 0 {
            unsafe {
                (*self.mmap.producer).store(self.local, Ordering::Release);
            }
        }
        n
    }

    /// Consumer-side operation: copies up to `out.len()` entries,
    /// bounded by the readable count, and advances the consumer index
    /// with release ordering after reading the peer's producer index
    /// with acquire ordering. Returns the number copied.
    pub fn drain(&mut self, out: &mut [T]) -> usize {
        debug_assert_eq!(self.side, Side::Consumer);
        let producer = self.peer_producer();
        let available = producer.wrapping_sub(self.local);
        let n = out.len().min(available as usize);
        for slot in out.iter_mut().take(n) {
            let idx = (self.local & self.mod_mask) as usize;
            *slot = unsafe { *self.mmap.desc.add(idx) };
            self.local = self.local.wrapping_add(1);
        }
        if n > 0 {
            unsafe {
                (*self.mmap.consumer).store(self.local, Ordering::Release);
            }
        }
        n
    }
}

/// A low-level function to memory-map a single AF_XDP ring.
pub fn mmap_ring<T>(
    fd: i32,
    size: usize,
    offsets: &libc::xdp_ring_offset,
    ring_type: u64,
) -> Result<RingMmap<T>, io::Error> {
    let map_size = (offsets.desc as usize).saturating_add(size);
    let map_addr = unsafe {
        libc::mmap(
            ptr::null_mut(),
            map_size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED | libc::MAP_POPULATE,
            fd,
            ring_type as i64,
        )
    };
    if map_addr == libc::MAP_FAILED {
        return Err(io::Error::last_os_error());
    }
    let producer = unsafe { map_addr.add(offsets.producer as usize) as *mut AtomicU32 };
    let consumer = unsafe { map_addr.add(offsets.consumer as usize) as *mut AtomicU32 };
    let desc = unsafe { map_addr.add(offsets.desc as usize) as *mut T };
    let flags = unsafe { map_addr.add(offsets.flags as usize) as *mut AtomicU32 };
    Ok(RingMmap {
        mmap: OwnedMmap(map_addr, map_size),
        producer,
        consumer,
        desc,
        flags,
    })
}

/// Selects the `setsockopt`/offset/mmap specifics for each of the four rings.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RingType {
    Tx,
    Rx,
    Fill,
    Completion,
}

impl RingType {
    fn as_sockopt(&self) -> libc::c_int {
        match self {
            RingType::Tx => libc::XDP_TX_RING,
            RingType::Rx => libc::XDP_RX_RING,
            RingType::Fill => libc::XDP_UMEM_FILL_RING,
            RingType::Completion => libc::XDP_UMEM_COMPLETION_RING,
        }
    }

    fn as_mmap_offset(&self) -> u64 {
        match self {
            RingType::Tx => libc::XDP_PGOFF_TX_RING as u64,
            RingType::Rx => libc::XDP_PGOFF_RX_RING as u64,
            RingType::Fill => libc::XDP_UMEM_PGOFF_FILL_RING,
            RingType::Completion => libc::XDP_UMEM_PGOFF_COMPLETION_RING,
        }
    }

    fn side(&self) -> Side {
        match self {
            RingType::Fill | RingType::Tx => Side::Producer,
            RingType::Rx | RingType::Completion => Side::Consumer,
        }
    }

    /// Sets the size of a specific ring via `setsockopt`. Fill and
    /// Completion must be sized at least 1 even when the direction
    /// they back is unused, since the kernel rejects a zero-sized
    /// UMEM-side ring outright.
    pub fn set_size(self, raw_fd: libc::c_int, mut ring_size: usize) -> io::Result<()> {
        if ring_size == 0 && matches!(self, RingType::Fill | RingType::Completion) {
            ring_size = 1;
        }
        unsafe {
            if libc::setsockopt(
                raw_fd,
                libc::SOL_XDP,
                self.as_sockopt(),
                &ring_size as *const _ as *const libc::c_void,
                size_of::<u32>() as libc::socklen_t,
            ) < 0
            {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(())
    }

    /// Memory-maps a ring of this type, selecting the matching
    /// offsets out of the kernel-reported `xdp_mmap_offsets`.
    pub fn mmap<T: Copy>(
        self,
        raw_fd: libc::c_int,
        offsets: &libc::xdp_mmap_offsets,
        ring_size: usize,
    ) -> io::Result<Ring<T>> {
        let ring_offs = match self {
            RingType::Tx => &offsets.tx,
            RingType::Rx => &offsets.rx,
            RingType::Fill => &offsets.fr,
            RingType::Completion => &offsets.cr,
        };
        Ring::<T>::mmap_as(raw_fd, ring_size, self.as_mmap_offset(), ring_offs, self.side())
    }
}
