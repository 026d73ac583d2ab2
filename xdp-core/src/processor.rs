//! # Processor interface
//!
//! The unit of user logic a `Pipeline` runs over each `Packet`. A
//! processor inspects and optionally rewrites a packet, then returns an
//! `Action` telling the pipeline what should happen to it next.

use crate::packet::Packet;

/// What a `Pipeline` should do with a packet after a stage has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Discard the packet; its frame is returned to the Fill ring.
    Drop,
    /// Stop processing and let the packet continue to the next stage,
    /// or leave the pipeline if this was the last one.
    Pass,
    /// Transmit the packet on the named interface/queue instead of
    /// continuing through the pipeline.
    Transmit { ifindex: u32, queue_id: u32 },
    /// Re-enter the pipeline from its first stage. Bounded by the
    /// pipeline's `max_stages` to prevent infinite loops.
    Recirculate,
}

/// A single stage of packet processing.
///
/// `process` is the only required method. `process_batch` defaults to
/// calling `process` once per packet; override it when a stage can do
/// better with the whole batch in hand (e.g. a single table lookup
/// amortized across packets). `init`/`teardown` bracket the stage's
/// lifetime within a `Service` and default to no-ops.
pub trait Processor: Send {
    fn process(&mut self, packet: &mut Packet<'_>) -> Action;

    fn process_batch(&mut self, packets: &mut [Packet<'_>], actions: &mut [Action]) {
        for (packet, action) in packets.iter_mut().zip(actions.iter_mut()) {
            *action = self.process(packet);
        }
    }

    fn init(&mut self) {}

    fn teardown(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingProcessor {
        seen: usize,
    }

    impl Processor for CountingProcessor {
        fn process(&mut self, _packet: &mut Packet<'_>) -> Action {
            self.seen += 1;
            Action::Pass
        }
    }

    fn frame() -> [u8; 14] {
        [0u8; 14]
    }

    #[test]
    fn default_process_batch_calls_process_per_packet() {
        let mut bytes_a = frame();
        let mut bytes_b = frame();
        let desc = crate::ring::XdpDesc::default();
        let mut packets = [
            Packet::new(&mut bytes_a, desc, (0, 0), None),
            Packet::new(&mut bytes_b, desc, (0, 1), None),
        ];
        let mut actions = [Action::Drop; 2];
        let mut processor = CountingProcessor { seen: 0 };

        processor.process_batch(&mut packets, &mut actions);

        assert_eq!(processor.seen, 2);
        assert_eq!(actions, [Action::Pass, Action::Pass]);
    }
}
