//! A demo `receive`-style CLI consumer: binds a single socket, runs a
//! one-stage pipeline that counts packets, and prints a summary when it
//! has seen enough of them. Interface name resolution is delegated to
//! `xdp-util`, an external collaborator; the CLI surface itself lives
//! only here, not in the library.

use std::io::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use xdp_core::program::AttachFlags;
use xdp_core::service::{InterfaceConfig, Service, ServiceConfig};
use xdp_core::socket::SocketOptions;
use xdp_core::{Action, Packet, Pipeline, PipelineConfig, Processor};

#[derive(Parser, Debug)]
struct Args {
    /// Interface to capture on.
    #[clap(long)]
    interface: String,

    /// Queue id to bind.
    #[clap(long, default_value_t = 0)]
    queue: u32,

    /// Stop after this many packets.
    #[clap(long, default_value_t = 10)]
    num_packets: u64,

    /// How often to check whether enough packets have arrived, like
    /// `100ms` or `1s`.
    #[clap(long)]
    poll_interval: Option<String>,
}

struct CountAndPass {
    seen: Arc<AtomicU64>,
}

impl Processor for CountAndPass {
    fn process(&mut self, packet: &mut Packet<'_>) -> Action {
        self.seen.fetch_add(1, Ordering::Relaxed);
        log::debug!("captured {} bytes on {:?}", packet.len(), packet.origin());
        Action::Pass
    }
}

fn main() -> Result<()> {
    nettest::command::setup(&[
        caps::Capability::CAP_NET_ADMIN,
        caps::Capability::CAP_NET_RAW,
        caps::Capability::CAP_BPF,
    ])?;

    let args = Args::parse();
    let ifindex = xdp_util::ifindex_by_name(&args.interface)?;
    let poll_interval = args
        .poll_interval
        .as_ref()
        .map_or(Ok(Duration::from_millis(100)), |s| {
            humantime::parse_duration(s).map_err(|_| std::io::Error::other("invalid poll interval format"))
        })?;

    let seen = Arc::new(AtomicU64::new(0));
    let mut pipeline = Pipeline::new(PipelineConfig::default());
    pipeline
        .add_stage(Box::new(CountAndPass { seen: seen.clone() }))
        .map_err(|e| std::io::Error::other(format!("{e}")))?;

    let config = ServiceConfig {
        interfaces: vec![InterfaceConfig { ifindex, queues: vec![args.queue] }],
        socket_options: SocketOptions {
            num_frames: 1024,
            frame_size: 2048,
            fill_ring_num_descs: 1024,
            completion_ring_num_descs: 1024,
            rx_ring_num_descs: 1024,
            tx_ring_num_descs: 1024,
            huge_page: None,
            zero_copy: None,
            need_wakeup: None,
        },
        xdp_flags: AttachFlags::default(),
        batch_size: 64,
        collect_stats: true,
        poll_timeout_ms: 200,
    };

    let mut service = Service::new(config, vec![pipeline])
        .map_err(|e| std::io::Error::other(format!("service construction failed: {e}")))?;
    service
        .start()
        .map_err(|e| std::io::Error::other(format!("service start failed: {e}")))?;

    while seen.load(Ordering::Relaxed) < args.num_packets {
        std::thread::sleep(poll_interval);
    }

    let snapshot = service.stats().snapshot();
    service.stop();

    println!(
        "captured {} packets ({} bytes), {} dropped, {} errors",
        snapshot.packets_received, snapshot.bytes_received, snapshot.packets_dropped, snapshot.errors
    );
    Ok(())
}
