//! # Protocol codecs
//!
//! Hand-rolled, allocation-free parse/write for the headers this
//! library needs to look inside a frame: Ethernet, IPv4 (with
//! checksum), TCP, UDP, ICMP, ARP. Every codec exposes `parse(bytes)`
//! returning `Err(PacketTooShort)` on a short slice, and `write(buf)`
//! returning the number of bytes written or the same error if `buf` is
//! too small. Layouts follow RFC 791, 793, 768, 826, 792; all integer
//! fields are big-endian on the wire, and bit-packed fields are masked
//! and shifted explicitly rather than read through a packed struct.

pub mod arp;
pub mod ethernet;
pub mod icmp;
pub mod ipv4;
pub mod tcp;
pub mod udp;

pub use arp::ArpHeader;
pub use ethernet::{EtherType, EthernetHeader};
pub use icmp::IcmpHeader;
pub use ipv4::Ipv4Header;
pub use tcp::TcpHeader;
pub use udp::UdpHeader;

use crate::error::PacketError;

pub(crate) fn require(bytes: &[u8], len: usize) -> Result<(), PacketError> {
    if bytes.len() < len {
        Err(PacketError::PacketTooShort)
    } else {
        Ok(())
    }
}
