//! End-to-end scenario: binding a socket on `lo` queue 0 with 64
//! frames of 2048 bytes succeeds and the Fill ring accepts exactly 64
//! addresses on the initial pre-fill.
//!
//! Needs `CAP_NET_RAW`/`CAP_BPF` to open the AF_XDP socket; no veth
//! pair is required since `lo` always exists.

use std::io::Result;
use xdp_core::{Socket, SocketOptions};

fn main() -> Result<()> {
    nettest::command::setup(&[
        caps::Capability::CAP_NET_ADMIN,
        caps::Capability::CAP_NET_RAW,
        caps::Capability::CAP_BPF,
    ])?;

    let ifindex = xdp_util::ifindex_by_name("lo")?;

    let options = SocketOptions {
        num_frames: 64,
        frame_size: 2048,
        fill_ring_num_descs: 64,
        completion_ring_num_descs: 64,
        rx_ring_num_descs: 64,
        tx_ring_num_descs: 64,
        huge_page: Some(false),
        zero_copy: Some(false),
        need_wakeup: Some(false),
    };

    let mut socket = Socket::bind(ifindex, 0, options)
        .map_err(|e| std::io::Error::other(format!("bind failed: {e}")))?;

    let addresses: Vec<u64> = (0..64).map(|i| i as u64 * 2048).collect();
    let accepted = socket.fill(&addresses);

    assert_eq!(accepted, 64, "Fill ring must accept all 64 pre-filled addresses");
    log::info!("loopback_capture: bound lo/0, pre-filled {accepted} frames");
    Ok(())
}
