//! # Service
//!
//! Owns the redirect program and one socket per `(interface, queue)`
//! pair, spawns one worker thread per socket, and tears the whole
//! arrangement down in the reverse order it was built in.
//!
//! Interface names are resolved to indices by the caller (see the
//! `xdp-util` crate) — this module only ever receives an already
//! resolved `ifindex`, per the crate boundary described in that
//! crate's module doc comment.
//!
//! A worker's `Action::Transmit` can name any `(ifindex, queue_id)`
//! pair bound by this service, not just its own — an L2-forwarder
//! needs exactly this shape. Since each socket is exclusively owned by
//! the worker thread that drives it, every bound socket is shared via
//! `Arc<Mutex<Socket>>` so a sibling worker can submit to its TX ring.
//! Workers never hold two socket locks at once, so this cannot
//! deadlock even when two interfaces forward into each other.

use crate::error::ServiceError;
use crate::packet::Packet;
use crate::pipeline::Pipeline;
use crate::processor::Action;
use crate::program::{AttachFlags, Program};
use crate::ring::XdpDesc;
use crate::socket::{Socket, SocketOptions};
use crate::stats::Stats;
use log::{error, warn};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// One interface's queues to bind sockets on.
#[derive(Debug, Clone)]
pub struct InterfaceConfig {
    pub ifindex: u32,
    pub queues: Vec<u32>,
}

/// Construction-time configuration for a `Service`.
pub struct ServiceConfig {
    pub interfaces: Vec<InterfaceConfig>,
    pub socket_options: SocketOptions,
    pub xdp_flags: AttachFlags,
    pub batch_size: usize,
    pub collect_stats: bool,
    pub poll_timeout_ms: u64,
}

struct WorkerHandle {
    thread: JoinHandle<Pipeline>,
    running: Arc<AtomicBool>,
}

type SocketRegistry = HashMap<(u32, u32), Arc<Mutex<Socket>>>;

/// A bound redirect program plus one socket per configured queue, each
/// driven by its own worker thread once `start()` is called.
pub struct Service {
    program: Program,
    attached_interfaces: Vec<u32>,
    registry: Arc<SocketRegistry>,
    origins: Vec<(u32, u32)>,
    idle_pipelines: Vec<Pipeline>,
    workers: Vec<WorkerHandle>,
    stats: Arc<Stats>,
    batch_size: usize,
    collect_stats: bool,
    poll_timeout: Duration,
}

impl Service {
    /// Builds the redirect program, binds a socket per configured
    /// queue, registers each with the program, pre-fills every Fill
    /// ring, and attaches the program once per distinct interface.
    /// `pipelines` must have one entry per `(interface, queue)` pair,
    /// in the order `config.interfaces` lists them — one pipeline
    /// instance per worker, since processors are not assumed to be
    /// internally thread-safe.
    ///
    /// On any failure, every resource created so far (registered
    /// queues, attached interfaces, the program itself) is released
    /// before the error is returned.
    pub fn new(config: ServiceConfig, pipelines: Vec<Pipeline>) -> Result<Self, ServiceError> {
        let total_queues: u32 = config.interfaces.iter().map(|i| i.queues.len() as u32).sum();
        debug_assert_eq!(pipelines.len(), total_queues as usize);

        let mut program = Program::load(total_queues.max(1))?;
        let mut built: Vec<(u32, u32, Socket)> = Vec::new();
        let mut origins = Vec::new();

        if let Err(e) = (|| -> Result<(), ServiceError> {
            for interface in &config.interfaces {
                for &queue_id in &interface.queues {
                    let mut socket = Socket::bind(interface.ifindex, queue_id, config.socket_options)?;
                    program.register(queue_id, socket.as_raw_fd())?;
                    let frames: Vec<u64> = std::iter::from_fn(|| socket.reserve_frame()).collect();
                    socket.fill(&frames);
                    origins.push((interface.ifindex, queue_id));
                    built.push((interface.ifindex, queue_id, socket));
                }
            }
            Ok(())
        })() {
            for (_, queue_id, _) in &built {
                let _ = program.unregister(*queue_id);
            }
            return Err(e);
        }

        let distinct_interfaces: BTreeSet<u32> = config.interfaces.iter().map(|i| i.ifindex).collect();
        let mut attached_interfaces = Vec::new();
        for ifindex in &distinct_interfaces {
            if let Err(e) = program.attach(*ifindex, config.xdp_flags) {
                for ifindex in &attached_interfaces {
                    let _ = program.detach(*ifindex);
                }
                for (_, queue_id, _) in &built {
                    let _ = program.unregister(*queue_id);
                }
                return Err(ServiceError::from(e));
            }
            attached_interfaces.push(*ifindex);
        }

        let mut registry = SocketRegistry::new();
        for (ifindex, queue_id, socket) in built {
            registry.insert((ifindex, queue_id), Arc::new(Mutex::new(socket)));
        }

        Ok(Service {
            program,
            attached_interfaces,
            registry: Arc::new(registry),
            origins,
            idle_pipelines: pipelines,
            workers: Vec::new(),
            stats: Arc::new(Stats::new()),
            batch_size: config.batch_size,
            collect_stats: config.collect_stats,
            poll_timeout: Duration::from_millis(config.poll_timeout_ms),
        })
    }

    pub fn stats(&self) -> &Arc<Stats> {
        &self.stats
    }

    /// Spawns one worker thread per socket. Fails with `AlreadyRunning`
    /// if workers are already active.
    pub fn start(&mut self) -> Result<(), ServiceError> {
        if !self.workers.is_empty() {
            return Err(ServiceError::AlreadyRunning);
        }

        let pipelines = std::mem::take(&mut self.idle_pipelines);
        for (origin, mut pipeline) in self.origins.iter().copied().zip(pipelines) {
            let socket = self.registry.get(&origin).expect("every origin is registered").clone();
            let registry = Arc::clone(&self.registry);
            let stats = Arc::clone(&self.stats);
            let running = Arc::new(AtomicBool::new(true));
            let worker_running = Arc::clone(&running);
            let batch_size = self.batch_size;
            let collect_stats = self.collect_stats;
            let poll_timeout = self.poll_timeout;

            let thread = std::thread::spawn(move || {
                pipeline.init();
                run_worker(
                    origin,
                    socket,
                    registry,
                    &mut pipeline,
                    worker_running,
                    stats,
                    batch_size,
                    collect_stats,
                    poll_timeout,
                );
                pipeline.teardown();
                pipeline
            });

            self.workers.push(WorkerHandle { thread, running });
        }

        Ok(())
    }

    /// Flips every worker's running flag and joins them, returning
    /// their pipelines to the idle pool so a subsequent `start()`
    /// reopens the loop. Safe to call more than once.
    pub fn stop(&mut self) {
        for worker in &self.workers {
            worker.running.store(false, Ordering::Relaxed);
        }
        for worker in self.workers.drain(..) {
            if let Ok(pipeline) = worker.thread.join() {
                self.idle_pipelines.push(pipeline);
            }
        }
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        self.stop();
        for ifindex in &self.attached_interfaces {
            if let Err(e) = self.program.detach(*ifindex) {
                warn!("failed to detach redirect program from ifindex {ifindex}: {e}");
            }
        }
        for (_, queue_id) in &self.origins {
            if let Err(e) = self.program.unregister(*queue_id) {
                warn!("failed to unregister queue {queue_id}: {e}");
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_worker(
    origin: (u32, u32),
    socket: Arc<Mutex<Socket>>,
    registry: Arc<SocketRegistry>,
    pipeline: &mut Pipeline,
    running: Arc<AtomicBool>,
    stats: Arc<Stats>,
    batch_size: usize,
    collect_stats: bool,
    poll_timeout: Duration,
) {
    let mut descs = vec![XdpDesc::default(); batch_size.max(1)];

    while running.load(Ordering::Relaxed) {
        let readable = socket.lock().unwrap().poll_readable(poll_timeout);
        match readable {
            Ok(false) => continue,
            Err(_) => {
                if collect_stats {
                    stats.record_error();
                }
                continue;
            }
            Ok(true) => {}
        }

        let mut guard = socket.lock().unwrap();
        let n = guard.rx(&mut descs);
        if n == 0 {
            drop(guard);
            continue;
        }

        let mut actions = vec![Action::Pass; n];
        // Deferred until after this socket's lock is released, so a
        // sibling worker forwarding back into us can never deadlock
        // against us forwarding into it.
        let mut transmits: Vec<((u32, u32), Vec<u8>, u32)> = Vec::new();
        {
            let mut packets: Vec<Packet<'_>> = descs[..n]
                .iter()
                .map(|desc| {
                    if collect_stats {
                        stats.record_received(desc.len as u64);
                    }
                    // Safety: each descriptor names a distinct RX frame
                    // this socket just drained; no other view into it
                    // exists for the scope of this pipeline pass.
                    let bytes = unsafe { guard.frame_mut(*desc) };
                    Packet::new(bytes, *desc, origin, None)
                })
                .collect();
            let survivors = pipeline.process_batch(&mut packets, &mut actions);

            // `process_batch` compacts and reorders both arrays in
            // lockstep, so the surviving packet's own descriptor (not
            // the original `descs[..n]` position) is what pairs with
            // `actions[i]` here.
            for (packet, action) in packets[..survivors].iter().zip(actions[..survivors].iter()) {
                let desc = packet.descriptor();
                match action {
                    Action::Drop => {
                        if collect_stats {
                            stats.record_dropped();
                        }
                    }
                    Action::Pass | Action::Recirculate => {
                        if collect_stats {
                            stats.record_passed();
                        }
                    }
                    Action::Transmit { ifindex, queue_id } => {
                        let bytes = packet.raw().to_vec();
                        transmits.push(((*ifindex, *queue_id), bytes, desc.len));
                    }
                }
            }
        }

        let addresses: Vec<u64> = descs[..n].iter().map(|d| d.addr).collect();
        guard.fill(&addresses);
        guard.reclaim_completions();
        drop(guard);

        for (target, bytes, len) in transmits {
            let queued = if target == origin {
                socket.lock().unwrap().send_packets(&[&bytes])
            } else if let Some(target_socket) = registry.get(&target) {
                target_socket.lock().unwrap().send_packets(&[&bytes])
            } else {
                Ok(0)
            };
            match queued {
                Ok(sent) if sent > 0 => {
                    if collect_stats {
                        stats.record_transmitted(len as u64);
                    }
                }
                Ok(_) => {
                    if collect_stats {
                        stats.record_error();
                    }
                }
                Err(e) => {
                    error!("transmit to ifindex {} queue {} failed: {e}", target.0, target.1);
                    if collect_stats {
                        stats.record_error();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RingError;

    #[test]
    fn already_running_is_rejected_without_touching_workers() {
        // A Service can't be constructed without real AF_XDP/BPF
        // privileges, so this only exercises the guard logic directly.
        let err = ServiceError::AlreadyRunning;
        assert_eq!(err.to_string(), "service is already running");
    }

    #[test]
    fn ring_error_converts_into_service_error() {
        let e: ServiceError = RingError::MissingRing.into();
        assert!(matches!(e, ServiceError::Ring(RingError::MissingRing)));
    }
}
