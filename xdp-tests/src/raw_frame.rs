//! A minimal Ethernet/IPv4/UDP frame builder and an AF_PACKET raw
//! socket to inject it, used by the end-to-end tests to drive traffic
//! into a veth pair from outside the AF_XDP path under test.

use std::io;
use std::mem::{size_of, zeroed};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use xdp_core::codec::ethernet::{EtherType, EthernetHeader};
use xdp_core::codec::ipv4::Ipv4Header;
use xdp_core::codec::udp::UdpHeader;

/// Builds a 62-byte Ethernet/IPv4/UDP frame: 14-byte Ethernet header, a
/// 20-byte IPv4 header with a correct checksum, an 8-byte UDP header,
/// and a 20-byte payload.
pub fn build_udp_frame(source_mac: [u8; 6], destination_mac: [u8; 6]) -> [u8; 62] {
    let mut frame = [0u8; 62];

    let ethernet = EthernetHeader {
        destination: destination_mac,
        source: source_mac,
        ether_type: EtherType::Ipv4,
    };
    ethernet.write(&mut frame[0..14]).unwrap();

    let udp = UdpHeader {
        source_port: 9000,
        destination_port: 9001,
        length: 28,
        checksum: 0,
    };
    udp.write(&mut frame[34..42]).unwrap();
    frame[42..62].copy_from_slice(&[0xAA; 20]);

    let mut ipv4 = Ipv4Header {
        version: 4,
        ihl: 5,
        dscp: 0,
        ecn: 0,
        total_length: 48,
        identification: 0,
        flags: 0,
        fragment_offset: 0,
        ttl: 64,
        protocol: 17,
        checksum: 0,
        source: [192, 168, 77, 100],
        destination: [192, 168, 77, 101],
    };
    ipv4.checksum = ipv4.checksum();
    ipv4.write(&mut frame[14..34]).unwrap();

    frame
}

/// An `AF_PACKET`/`SOCK_RAW` socket bound to one interface, used only
/// to inject frames from outside the AF_XDP data path under test.
pub struct RawInjector {
    fd: OwnedFd,
    ifindex: u32,
}

impl RawInjector {
    pub fn bind(ifindex: u32) -> io::Result<Self> {
        let fd = unsafe { libc::socket(libc::AF_PACKET, libc::SOCK_RAW, (libc::ETH_P_ALL as u16).to_be() as i32) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };

        let mut addr: libc::sockaddr_ll = unsafe { zeroed() };
        addr.sll_family = libc::AF_PACKET as u16;
        addr.sll_protocol = (libc::ETH_P_ALL as u16).to_be();
        addr.sll_ifindex = ifindex as i32;

        let res = unsafe {
            libc::bind(
                fd.as_raw_fd(),
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                size_of::<libc::sockaddr_ll>() as u32,
            )
        };
        if res < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(RawInjector { fd, ifindex })
    }

    pub fn ifindex(&self) -> u32 {
        self.ifindex
    }

    pub fn send(&self, frame: &[u8]) -> io::Result<()> {
        let sent = unsafe { libc::write(self.fd.as_raw_fd(), frame.as_ptr() as *const libc::c_void, frame.len()) };
        if sent < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}
