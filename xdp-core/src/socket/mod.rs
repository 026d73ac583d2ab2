//! # AF_XDP socket runtime
//!
//! ## Purpose
//!
//! Owns one AF_XDP socket bound to `(ifindex, queue_id)`: its UMEM, its
//! four rings, and a free-frame allocator used by the `send_packets`/
//! `receive_packets` conveniences. Construction follows the kernel
//! protocol step for step; every intermediate resource (`OwnedFd`,
//! `OwnedMmap`) is RAII, so an early `?` return during construction
//! unwinds and releases exactly the resources created so far, in
//! reverse order, without any manual cleanup code.
//!
//! ## Main components
//!
//! - `SocketOptions`: UMEM and ring sizing knobs.
//! - `Socket`: the bound socket plus its rings and frame allocator.

mod poll;

pub use poll::PollError;

use crate::error::RingError;
use crate::ring::{Ring, RingType, XdpDesc};
use crate::umem::Umem;
use std::io;
use std::mem::size_of;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

/// Sizing and behavior knobs for one socket's UMEM and rings.
#[derive(Debug, Clone, Copy)]
pub struct SocketOptions {
    pub num_frames: u32,
    pub frame_size: u32,
    pub fill_ring_num_descs: u32,
    pub completion_ring_num_descs: u32,
    pub rx_ring_num_descs: u32,
    pub tx_ring_num_descs: u32,
    pub huge_page: Option<bool>,
    pub zero_copy: Option<bool>,
    pub need_wakeup: Option<bool>,
}

/// A bound AF_XDP socket: UMEM, its four rings (RX/TX optional), and a
/// stack of frame addresses not currently held by any ring.
pub struct Socket {
    fd: OwnedFd,
    umem: Umem,
    fill: Ring<u64>,
    completion: Ring<u64>,
    rx: Option<Ring<XdpDesc>>,
    tx: Option<Ring<XdpDesc>>,
    ifindex: u32,
    queue_id: u32,
    free_frames: Vec<u64>,
}

impl Socket {
    /// Opens an AF_XDP socket, allocates and registers UMEM, sizes and
    /// maps the rings, and binds to `(ifindex, queue_id)`.
    pub fn bind(ifindex: u32, queue_id: u32, options: SocketOptions) -> Result<Self, RingError> {
        if options.rx_ring_num_descs == 0 && options.tx_ring_num_descs == 0 {
            return Err(RingError::MissingRing);
        }

        let raw_fd = unsafe { libc::socket(libc::AF_XDP, libc::SOCK_RAW | libc::SOCK_CLOEXEC, 0) };
        if raw_fd < 0 {
            return Err(RingError::SocketCreationFailed(io::Error::last_os_error()));
        }
        let fd = unsafe { OwnedFd::from_raw_fd(raw_fd) };

        let umem = Umem::allocate(options.num_frames, options.frame_size, options.huge_page)
            .map_err(RingError::SocketCreationFailed)?;

        register_umem(raw_fd, &umem).map_err(RingError::SyscallFailed)?;

        RingType::Fill
            .set_size(raw_fd, options.fill_ring_num_descs as usize)
            .map_err(RingError::SyscallFailed)?;
        RingType::Completion
            .set_size(raw_fd, options.completion_ring_num_descs as usize)
            .map_err(RingError::SyscallFailed)?;
        if options.rx_ring_num_descs > 0 {
            RingType::Rx
                .set_size(raw_fd, options.rx_ring_num_descs as usize)
                .map_err(RingError::SyscallFailed)?;
        }
        if options.tx_ring_num_descs > 0 {
            RingType::Tx
                .set_size(raw_fd, options.tx_ring_num_descs as usize)
                .map_err(RingError::SyscallFailed)?;
        }

        let offsets = ring_offsets(raw_fd).map_err(RingError::SyscallFailed)?;

        let fill: Ring<u64> = RingType::Fill
            .mmap(raw_fd, &offsets, options.fill_ring_num_descs.max(1) as usize)
            .map_err(RingError::SyscallFailed)?;
        let completion: Ring<u64> = RingType::Completion
            .mmap(raw_fd, &offsets, options.completion_ring_num_descs.max(1) as usize)
            .map_err(RingError::SyscallFailed)?;
        let rx = if options.rx_ring_num_descs > 0 {
            Some(
                RingType::Rx
                    .mmap(raw_fd, &offsets, options.rx_ring_num_descs as usize)
                    .map_err(RingError::SyscallFailed)?,
            )
        } else {
            None
        };
        let tx = if options.tx_ring_num_descs > 0 {
            Some(
                RingType::Tx
                    .mmap(raw_fd, &offsets, options.tx_ring_num_descs as usize)
                    .map_err(RingError::SyscallFailed)?,
            )
        } else {
            None
        };

        bind_socket(raw_fd, ifindex, queue_id, &options).map_err(RingError::SyscallFailed)?;

        let free_frames = (0..options.num_frames as u64)
            .map(|i| i * options.frame_size as u64)
            .collect();

        Ok(Socket {
            fd,
            umem,
            fill,
            completion,
            rx,
            tx,
            ifindex,
            queue_id,
            free_frames,
        })
    }

    pub fn ifindex(&self) -> u32 {
        self.ifindex
    }

    pub fn queue_id(&self) -> u32 {
        self.queue_id
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Submits frame addresses to the Fill ring. Returns the number accepted.
    pub fn fill(&mut self, addresses: &[u64]) -> usize {
        self.fill.submit(addresses)
    }

    /// Drains addresses from the Completion ring. Returns the number drained.
    pub fn complete(&mut self, out: &mut [u64]) -> usize {
        self.completion.drain(out)
    }

    /// Drains descriptors from the RX ring, or 0 if this socket has no
    /// RX ring configured.
    pub fn rx(&mut self, out: &mut [XdpDesc]) -> usize {
        match &mut self.rx {
            Some(ring) => ring.drain(out),
            None => 0,
        }
    }

    /// Submits descriptors to the TX ring, or 0 if this socket has no
    /// TX ring configured.
    pub fn tx(&mut self, descs: &[XdpDesc]) -> usize {
        match &mut self.tx {
            Some(ring) => ring.submit(descs),
            None => 0,
        }
    }

    /// Non-blocking `sendto` used solely to nudge the kernel to
    /// dequeue TX and Fill entries.
    pub fn kick(&self) -> Result<(), RingError> {
        let res = unsafe { libc::sendto(self.fd.as_raw_fd(), std::ptr::null(), 0, libc::MSG_DONTWAIT, std::ptr::null(), 0) };
        if res < 0 {
            let err = io::Error::last_os_error();
            if matches!(err.raw_os_error(), Some(libc::EAGAIN) | Some(libc::EWOULDBLOCK)) {
                return Ok(());
            }
            return Err(RingError::KickFailed(err));
        }
        Ok(())
    }

    /// Waits for the socket to become readable, bounded by `timeout`.
    pub fn poll_readable(&self, timeout: Duration) -> Result<bool, PollError> {
        poll::wait_readable(self.fd.as_raw_fd(), timeout)
    }

    /// A zero-copy immutable view of the UMEM bytes `desc` names.
    ///
    /// # Safety
    /// `desc` must be a descriptor this socket's RX ring actually
    /// produced (or a frame address this socket owns); the caller must
    /// not hold another live mutable view over an overlapping range.
    pub unsafe fn frame(&self, desc: XdpDesc) -> &[u8] {
        unsafe { self.umem.frame(desc.addr, desc.len as usize) }
    }

    /// A zero-copy mutable view of the UMEM bytes `desc` names, used to
    /// build a `Packet` directly over the received frame without
    /// copying it. Takes `&self`, not `&mut self`: the kernel handed
    /// this frame to us via RX, so nothing else may be reading or
    /// writing the same bytes through another path for the scope of
    /// one pipeline pass, which the worker loop upholds by constructing
    /// at most one `Packet` per drained descriptor.
    ///
    /// # Safety
    /// Same bound as [`Socket::frame`], plus exclusivity: the caller
    /// must not construct two overlapping mutable views at once.
    pub unsafe fn frame_mut(&self, desc: XdpDesc) -> &mut [u8] {
        unsafe { self.umem.frame_mut(desc.addr, desc.len as usize) }
    }

    /// Returns up to one free frame address, or `None` if every frame
    /// is currently held by a ring.
    pub fn reserve_frame(&mut self) -> Option<u64> {
        self.free_frames.pop()
    }

    /// Returns a frame address to the free pool, making it eligible
    /// for reuse by `send_packets` or `fill`.
    pub fn release_frame(&mut self, addr: u64) {
        self.free_frames.push(addr);
    }

    /// Reclaims completed TX frames into the free pool. Callers
    /// typically run this before `send_packets` to replenish it.
    pub fn reclaim_completions(&mut self) -> usize {
        let mut buf = [0u64; 64];
        let mut total = 0;
        loop {
            let n = self.completion.drain(&mut buf);
            for addr in &buf[..n] {
                self.free_frames.push(*addr);
            }
            total += n;
            if n < buf.len() {
                break;
            }
        }
        total
    }

    /// Copies each slice into a free UMEM frame, submits the resulting
    /// descriptors to TX, and wakes the kernel. Returns the number
    /// queued, which may be less than `slices.len()` if the TX ring or
    /// the free-frame pool is exhausted.
    pub fn send_packets(&mut self, slices: &[&[u8]]) -> Result<usize, RingError> {
        self.reclaim_completions();
        let mut descs = Vec::with_capacity(slices.len());
        for slice in slices {
            let Some(addr) = self.reserve_frame() else { break };
            if slice.len() > self.umem.frame_size() as usize {
                self.release_frame(addr);
                return Err(RingError::BufferTooSmall);
            }
            unsafe {
                self.umem.frame_mut(addr, slice.len()).copy_from_slice(slice);
            }
            descs.push(XdpDesc::new(addr, slice.len() as u32, 0));
        }
        let submitted = self.tx(&descs);
        for desc in &descs[submitted..] {
            self.release_frame(desc.addr);
        }
        if submitted > 0 {
            self.kick()?;
        }
        Ok(submitted)
    }

    /// Drains RX and copies each frame into the matching caller buffer,
    /// shrinking the output slice to the frame's actual length. Fails
    /// with `BufferTooSmall` if any buffer is shorter than its frame.
    pub fn receive_packets<'a>(&mut self, buffers: &mut [&'a mut [u8]]) -> Result<usize, RingError> {
        let mut descs = vec![XdpDesc::default(); buffers.len()];
        let n = self.rx(&mut descs);
        for (desc, buffer) in descs.iter().zip(buffers.iter_mut()).take(n) {
            let len = desc.len as usize;
            if buffer.len() < len {
                return Err(RingError::BufferTooSmall);
            }
            let frame = unsafe { self.umem.frame(desc.addr, len) };
            buffer[..len].copy_from_slice(frame);
        }
        Ok(n)
    }
}

fn register_umem(raw_fd: libc::c_int, umem: &Umem) -> io::Result<()> {
    let reg = unsafe {
        libc::xdp_umem_reg {
            addr: umem.base_ptr() as u64,
            len: umem.len() as u64,
            chunk_size: umem.frame_size(),
            ..std::mem::zeroed()
        }
    };
    unsafe {
        if libc::setsockopt(
            raw_fd,
            libc::SOL_XDP,
            libc::XDP_UMEM_REG,
            &reg as *const _ as *const libc::c_void,
            size_of::<libc::xdp_umem_reg>() as libc::socklen_t,
        ) < 0
        {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn ring_offsets(raw_fd: libc::c_int) -> io::Result<libc::xdp_mmap_offsets> {
    let mut offsets: libc::xdp_mmap_offsets = unsafe { std::mem::zeroed() };
    let mut optlen = size_of::<libc::xdp_mmap_offsets>() as libc::socklen_t;
    unsafe {
        if libc::getsockopt(
            raw_fd,
            libc::SOL_XDP,
            libc::XDP_MMAP_OFFSETS,
            &mut offsets as *mut _ as *mut libc::c_void,
            &mut optlen,
        ) < 0
        {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(offsets)
}

fn bind_socket(raw_fd: libc::c_int, ifindex: u32, queue_id: u32, options: &SocketOptions) -> io::Result<()> {
    let zero_copy = match options.zero_copy {
        Some(true) => libc::XDP_ZEROCOPY,
        Some(false) => libc::XDP_COPY,
        None => 0,
    };
    let need_wakeup = if options.need_wakeup.unwrap_or(true) {
        libc::XDP_USE_NEED_WAKEUP
    } else {
        0
    };
    let sxdp = libc::sockaddr_xdp {
        sxdp_family: libc::AF_XDP as libc::sa_family_t,
        sxdp_flags: need_wakeup | zero_copy,
        sxdp_ifindex: ifindex,
        sxdp_queue_id: queue_id,
        sxdp_shared_umem_fd: 0,
    };
    unsafe {
        if libc::bind(
            raw_fd,
            &sxdp as *const _ as *const libc::sockaddr,
            size_of::<libc::sockaddr_xdp>() as libc::socklen_t,
        ) < 0
        {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_ring_rejected_before_any_syscall() {
        let options = SocketOptions {
            num_frames: 64,
            frame_size: 2048,
            fill_ring_num_descs: 64,
            completion_ring_num_descs: 64,
            rx_ring_num_descs: 0,
            tx_ring_num_descs: 0,
            huge_page: Some(false),
            zero_copy: None,
            need_wakeup: None,
        };
        assert!(matches!(Socket::bind(1, 0, options), Err(RingError::MissingRing)));
    }
}
