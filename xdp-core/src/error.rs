//! # Error taxonomy
//!
//! One enum per layer, matching the failure kinds each component is
//! responsible for. Nothing here is retried internally; every error is
//! propagated to the caller and, at the worker loop, counted and the
//! current batch abandoned rather than the process aborted.

use std::io;

/// Errors from the packet codecs and the `Packet` view.
#[derive(Debug)]
pub enum PacketError {
    /// The byte slice is too short to hold the header being parsed.
    PacketTooShort,
    /// A `modify()` call would write past the end of the frame.
    ModificationOutOfBounds,
}

impl std::fmt::Display for PacketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketError::PacketTooShort => write!(f, "packet too short for requested header"),
            PacketError::ModificationOutOfBounds => {
                write!(f, "modification would exceed frame length")
            }
        }
    }
}

impl std::error::Error for PacketError {}

/// Errors from ring and socket operations.
#[derive(Debug)]
pub enum RingError {
    /// Socket construction could not open an AF_XDP socket.
    SocketCreationFailed(io::Error),
    /// A `setsockopt`/`getsockopt`/`bind` call on the socket failed.
    SyscallFailed(io::Error),
    /// Neither RX nor TX ring was configured with nonzero size.
    MissingRing,
    /// An operation was attempted on a socket with no valid file descriptor.
    InvalidFileDescriptor,
    /// A caller-provided buffer is shorter than the frame being copied into it.
    BufferTooSmall,
    /// `send_packets` failed to wake the kernel for a reason other than
    /// `EAGAIN`/`EWOULDBLOCK`.
    SendFailed(io::Error),
    /// `kick()` failed to wake the kernel.
    KickFailed(io::Error),
}

impl std::fmt::Display for RingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RingError::SocketCreationFailed(e) => write!(f, "socket creation failed: {e}"),
            RingError::SyscallFailed(e) => write!(f, "syscall failed: {e}"),
            RingError::MissingRing => write!(f, "neither RX nor TX ring was configured"),
            RingError::InvalidFileDescriptor => write!(f, "invalid socket file descriptor"),
            RingError::BufferTooSmall => write!(f, "buffer too small for frame"),
            RingError::SendFailed(e) => write!(f, "send failed: {e}"),
            RingError::KickFailed(e) => write!(f, "kick failed: {e}"),
        }
    }
}

impl std::error::Error for RingError {}

/// Errors from the redirect program and its control plane.
#[derive(Debug)]
pub enum ProgramError {
    /// One of the two maps could not be created.
    MapCreateFailed(String),
    /// `register`/`unregister` failed to update a map entry.
    MapUpdateFailed(String),
    /// The BPF object failed to load into the kernel.
    BpfLoadFailed(String),
    /// `attach()` failed; the interface is left unattached.
    AttachFailed(String),
    /// `detach()` failed. Callers log and swallow this per service policy.
    DetachFailed(String),
    /// A netlink request failed or the kernel returned a nonzero errno.
    NetlinkError(io::Error),
    /// `unregister()` was called for a queue id with no registration.
    UnregisteredQueue,
}

impl std::fmt::Display for ProgramError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgramError::MapCreateFailed(e) => write!(f, "map creation failed: {e}"),
            ProgramError::MapUpdateFailed(e) => write!(f, "map update failed: {e}"),
            ProgramError::BpfLoadFailed(e) => write!(f, "BPF program load failed: {e}"),
            ProgramError::AttachFailed(e) => write!(f, "XDP attach failed: {e}"),
            ProgramError::DetachFailed(e) => write!(f, "XDP detach failed: {e}"),
            ProgramError::NetlinkError(e) => write!(f, "netlink error: {e}"),
            ProgramError::UnregisteredQueue => write!(f, "queue id has no registration"),
        }
    }
}

impl std::error::Error for ProgramError {}

/// Errors from pipeline construction and execution.
#[derive(Debug)]
pub enum PipelineError {
    /// `add_stage` was called on a pipeline already holding `max_stages` processors.
    TooManyStages,
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::TooManyStages => write!(f, "pipeline already has max_stages processors"),
        }
    }
}

impl std::error::Error for PipelineError {}

/// Errors from the service's lifecycle.
#[derive(Debug)]
pub enum ServiceError {
    /// `start()` was called on a service that is already running.
    AlreadyRunning,
    Ring(RingError),
    Program(ProgramError),
    Pipeline(PipelineError),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::AlreadyRunning => write!(f, "service is already running"),
            ServiceError::Ring(e) => write!(f, "{e}"),
            ServiceError::Program(e) => write!(f, "{e}"),
            ServiceError::Pipeline(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<RingError> for ServiceError {
    fn from(e: RingError) -> Self {
        ServiceError::Ring(e)
    }
}

impl From<ProgramError> for ServiceError {
    fn from(e: ProgramError) -> Self {
        ServiceError::Program(e)
    }
}

impl From<PipelineError> for ServiceError {
    fn from(e: PipelineError) -> Self {
        ServiceError::Pipeline(e)
    }
}
