//! End-to-end scenario: a `Service` bound to one end of a veth pair
//! observes a frame injected via a raw socket on the other end within
//! one second, and its processor's own counter advances alongside the
//! stats collector.

mod raw_frame;

use std::io::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use xdp_core::program::AttachFlags;
use xdp_core::service::{InterfaceConfig, Service, ServiceConfig};
use xdp_core::socket::SocketOptions;
use xdp_core::{Action, Packet, Pipeline, PipelineConfig, Processor};

struct CountingPass {
    count: Arc<AtomicUsize>,
}

impl Processor for CountingPass {
    fn process(&mut self, _packet: &mut Packet<'_>) -> Action {
        self.count.fetch_add(1, Ordering::Relaxed);
        Action::Pass
    }
}

fn socket_options() -> SocketOptions {
    SocketOptions {
        num_frames: 64,
        frame_size: 2048,
        fill_ring_num_descs: 64,
        completion_ring_num_descs: 64,
        rx_ring_num_descs: 64,
        tx_ring_num_descs: 64,
        huge_page: Some(false),
        zero_copy: Some(false),
        need_wakeup: Some(false),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    nettest::command::setup(&[
        caps::Capability::CAP_NET_ADMIN,
        caps::Capability::CAP_NET_RAW,
        caps::Capability::CAP_BPF,
    ])?;

    nettest::run_test_with_pair(|host_pair| async move {
        let a_index = host_pair.host0.if_index()?;
        let b_index = host_pair.host1.if_index()?;

        let counter = Arc::new(AtomicUsize::new(0));
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        pipeline
            .add_stage(Box::new(CountingPass { count: counter.clone() }))
            .map_err(|e| std::io::Error::other(format!("{e}")))?;

        let config = ServiceConfig {
            interfaces: vec![InterfaceConfig { ifindex: a_index, queues: vec![0] }],
            socket_options: socket_options(),
            xdp_flags: AttachFlags::default(),
            batch_size: 32,
            collect_stats: true,
            poll_timeout_ms: 100,
        };

        let mut service = Service::new(config, vec![pipeline])
            .map_err(|e| std::io::Error::other(format!("service construction failed: {e}")))?;
        service
            .start()
            .map_err(|e| std::io::Error::other(format!("service start failed: {e}")))?;

        let mac_a = xdp_util::mac_by_ifindex(a_index)?;
        let mac_b = xdp_util::mac_by_ifindex(b_index)?;
        let injector = raw_frame::RawInjector::bind(b_index)?;
        let frame = raw_frame::build_udp_frame(mac_b, mac_a);

        let deadline = Instant::now() + Duration::from_secs(1);
        let mut received = 0;
        while Instant::now() < deadline {
            injector.send(&frame)?;
            received = service.stats().snapshot().packets_received;
            if received >= 1 && counter.load(Ordering::Relaxed) >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        service.stop();

        assert!(received >= 1, "expected at least one received packet, got {received}");
        assert!(
            counter.load(Ordering::Relaxed) >= 1,
            "expected the processor to see at least one packet"
        );
        log::info!("broadcast_frame: observed {received} received packets");
        Ok(())
    })
    .await
}
