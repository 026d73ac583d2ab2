//! End-to-end scenario: a `Service` bound to both ends of a veth pair
//! forwards every packet it sees on one side to the other, and the
//! stats collector on each worker records at least one transmit and
//! no errors.

mod raw_frame;

use std::io::Result;
use std::time::{Duration, Instant};

use xdp_core::program::AttachFlags;
use xdp_core::service::{InterfaceConfig, Service, ServiceConfig};
use xdp_core::socket::SocketOptions;
use xdp_core::{Action, Packet, Pipeline, PipelineConfig, Processor};

struct CrossForward {
    self_ifindex: u32,
    peer_ifindex: u32,
}

impl Processor for CrossForward {
    fn process(&mut self, packet: &mut Packet<'_>) -> Action {
        let target = if packet.origin().0 == self.self_ifindex {
            self.peer_ifindex
        } else {
            self.self_ifindex
        };
        Action::Transmit { ifindex: target, queue_id: 0 }
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

        let mut pipeline_a = Pipeline::new(PipelineConfig::default());
        pipeline_a
            .add_stage(Box::new(CrossForward { self_ifindex: a_index, peer_ifindex: b_index }))
            .map_err(|e| std::io::Error::other(format!("{e}")))?;
        let mut pipeline_b = Pipeline::new(PipelineConfig::default());
        pipeline_b
            .add_stage(Box::new(CrossForward { self_ifindex: b_index, peer_ifindex: a_index }))
            .map_err(|e| std::io::Error::other(format!("{e}")))?;

        let config = ServiceConfig {
            interfaces: vec![
                InterfaceConfig { ifindex: a_index, queues: vec![0] },
                InterfaceConfig { ifindex: b_index, queues: vec![0] },
            ],
            socket_options: socket_options(),
            xdp_flags: AttachFlags::default(),
            batch_size: 32,
            collect_stats: true,
            poll_timeout_ms: 100,
        };

        let mut service = Service::new(config, vec![pipeline_a, pipeline_b])
            .map_err(|e| std::io::Error::other(format!("service construction failed: {e}")))?;
        service
            .start()
            .map_err(|e| std::io::Error::other(format!("service start failed: {e}")))?;

        let mac_a = xdp_util::mac_by_ifindex(a_index)?;
        let mac_b = xdp_util::mac_by_ifindex(b_index)?;
        let injector_into_a = raw_frame::RawInjector::bind(a_index)?;
        let injector_into_b = raw_frame::RawInjector::bind(b_index)?;
        let frame_for_a = raw_frame::build_udp_frame(mac_b, mac_a);
        let frame_for_b = raw_frame::build_udp_frame(mac_a, mac_b);

        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            for _ in 0..5 {
                injector_into_a.send(&frame_for_a)?;
                injector_into_b.send(&frame_for_b)?;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let snapshot = service.stats().snapshot();
        service.stop();

        assert!(
            snapshot.packets_transmitted >= 1,
            "expected at least one transmit, got {}",
            snapshot.packets_transmitted
        );
        assert_eq!(snapshot.errors, 0, "forwarder recorded unexpected errors");
        log::info!(
            "l2_forwarder: {} transmitted, {} received, {} errors",
            snapshot.packets_transmitted,
            snapshot.packets_received,
            snapshot.errors
        );
        Ok(())
    })
    .await
}
