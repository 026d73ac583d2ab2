//! # Pipeline
//!
//! Runs a batch of packets through an ordered sequence of `Processor`
//! stages, dispatching each packet's final `Action` and compacting the
//! batch in place as packets drop out along the way.

use crate::error::PipelineError;
use crate::packet::Packet;
use crate::processor::{Action, Processor};

/// Tuning knobs for a `Pipeline`.
#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Stop running remaining stages on a packet as soon as one stage
    /// returns `Action::Drop` (it never proceeds to a later stage).
    pub stop_on_drop: bool,
    /// Whether stages are permitted to call `Packet::modify`. Reserved
    /// for future enforcement; currently advisory only.
    pub allow_modification: bool,
    /// Upper bound on how many times a single packet may recirculate
    /// through the pipeline before it is coerced to `Action::Drop`.
    pub max_stages: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            stop_on_drop: true,
            allow_modification: true,
            max_stages: 16,
        }
    }
}

/// An ordered sequence of processing stages applied to every packet
/// that passes through a `Service` worker.
pub struct Pipeline {
    stages: Vec<Box<dyn Processor>>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Pipeline {
            stages: Vec::new(),
            config,
        }
    }

    /// Appends a stage. Rejected once the pipeline already holds
    /// `max_stages` processors.
    pub fn add_stage(&mut self, stage: Box<dyn Processor>) -> Result<(), PipelineError> {
        if self.stages.len() >= self.config.max_stages {
            return Err(PipelineError::TooManyStages);
        }
        self.stages.push(stage);
        Ok(())
    }

    pub fn init(&mut self) {
        for stage in &mut self.stages {
            stage.init();
        }
    }

    pub fn teardown(&mut self) {
        for stage in &mut self.stages {
            stage.teardown();
        }
    }

    /// Runs one packet through the pipeline's stages in order, honoring
    /// recirculation up to `max_stages` passes.
    pub fn process(&mut self, packet: &mut Packet<'_>) -> Action {
        let mut action = Action::Pass;
        for _pass in 0..self.config.max_stages {
            let mut recirculate = false;
            for stage in &mut self.stages {
                action = stage.process(packet);
                match action {
                    Action::Drop if self.config.stop_on_drop => return Action::Drop,
                    Action::Transmit { .. } => return action,
                    Action::Recirculate => {
                        recirculate = true;
                        break;
                    }
                    _ => {}
                }
            }
            if !recirculate {
                return action;
            }
        }
        Action::Drop
    }

    /// Runs a batch through the pipeline. Each stage's batch operation
    /// only ever sees the *active* prefix — the packets still alive and
    /// still undecided after every earlier stage — and after each stage
    /// the active prefix is compacted in place, preserving relative
    /// order. A stage that drops a packet with `stop_on_drop` unset does
    /// not finalize it — the next stage still gets a chance to override
    /// the verdict. `Recirculate` is resolved immediately via
    /// [`Pipeline::process`], which restarts that one packet from the
    /// first stage under the usual `max_stages` recirculation bound.
    /// `Transmit` finalizes a packet the same way it does outside batch
    /// mode: it is excluded from every later stage, but it is still a
    /// survivor, not a drop, so it remains in the returned count and in
    /// `packets[..n]`/`actions[..n]` in its original relative position.
    pub fn process_batch(&mut self, packets: &mut [Packet<'_>], actions: &mut [Action]) -> usize {
        debug_assert_eq!(packets.len(), actions.len());
        let n = packets.len();
        for action in actions.iter_mut() {
            *action = Action::Pass;
        }

        // `order[p]` is the original index of whichever entry currently
        // sits at position `p`; kept in lockstep with every swap below so
        // packets finalized in different stages can be restored to their
        // original relative order at the end.
        let mut order: Vec<usize> = (0..n).collect();
        let mut eliminated = vec![false; n];

        let mut active = n;
        for stage_idx in 0..self.stages.len() {
            if active == 0 {
                break;
            }
            self.stages[stage_idx].process_batch(&mut packets[..active], &mut actions[..active]);

            let mut write = 0;
            for read in 0..active {
                if matches!(actions[read], Action::Recirculate) {
                    actions[read] = self.process(&mut packets[read]);
                }
                let keep = matches!(actions[read], Action::Pass)
                    || (matches!(actions[read], Action::Drop) && !self.config.stop_on_drop);
                if !keep && matches!(actions[read], Action::Drop) {
                    eliminated[order[read]] = true;
                }
                if keep {
                    if write != read {
                        packets.swap(write, read);
                        actions.swap(write, read);
                        order.swap(write, read);
                    }
                    write += 1;
                }
            }
            active = write;
        }

        let survivor_indices: Vec<usize> = (0..n).filter(|&i| !eliminated[i]).collect();
        let survivors = survivor_indices.len();

        let mut pos_of = vec![0usize; n];
        for (pos, &orig) in order.iter().enumerate() {
            pos_of[orig] = pos;
        }
        for (target_pos, &orig_idx) in survivor_indices.iter().enumerate() {
            let current_pos = pos_of[orig_idx];
            if current_pos != target_pos {
                packets.swap(target_pos, current_pos);
                actions.swap(target_pos, current_pos);
                let moved_orig = order[target_pos];
                order.swap(target_pos, current_pos);
                pos_of[orig_idx] = target_pos;
                pos_of[moved_orig] = current_pos;
            }
        }

        survivors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::XdpDesc;

    struct DropEverything;
    impl Processor for DropEverything {
        fn process(&mut self, _packet: &mut Packet<'_>) -> Action {
            Action::Drop
        }
    }

    struct AlwaysRecirculate {
        passes: usize,
    }
    impl Processor for AlwaysRecirculate {
        fn process(&mut self, _packet: &mut Packet<'_>) -> Action {
            self.passes += 1;
            Action::Recirculate
        }
    }

    struct TagTransmit;
    impl Processor for TagTransmit {
        fn process(&mut self, _packet: &mut Packet<'_>) -> Action {
            Action::Transmit { ifindex: 2, queue_id: 0 }
        }
    }

    fn packet(bytes: &mut [u8]) -> Packet<'_> {
        Packet::new(bytes, XdpDesc::default(), (0, 0), None)
    }

    #[test]
    fn add_stage_rejects_past_max_stages() {
        let mut pipeline = Pipeline::new(PipelineConfig { max_stages: 1, ..Default::default() });
        assert!(pipeline.add_stage(Box::new(DropEverything)).is_ok());
        assert!(matches!(
            pipeline.add_stage(Box::new(DropEverything)),
            Err(PipelineError::TooManyStages)
        ));
    }

    #[test]
    fn stop_on_drop_short_circuits_later_stages() {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        pipeline.add_stage(Box::new(DropEverything)).unwrap();
        pipeline.add_stage(Box::new(TagTransmit)).unwrap();

        let mut bytes = [0u8; 14];
        let mut p = packet(&mut bytes);
        assert_eq!(pipeline.process(&mut p), Action::Drop);
    }

    #[test]
    fn recirculation_is_bounded_by_max_stages() {
        let mut pipeline = Pipeline::new(PipelineConfig { max_stages: 3, ..Default::default() });
        pipeline.add_stage(Box::new(AlwaysRecirculate { passes: 0 })).unwrap();

        let mut bytes = [0u8; 14];
        let mut p = packet(&mut bytes);
        assert_eq!(pipeline.process(&mut p), Action::Drop);
    }

    #[test]
    fn transmit_short_circuits_remaining_stages() {
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        pipeline.add_stage(Box::new(TagTransmit)).unwrap();
        pipeline.add_stage(Box::new(DropEverything)).unwrap();

        let mut bytes = [0u8; 14];
        let mut p = packet(&mut bytes);
        assert_eq!(pipeline.process(&mut p), Action::Transmit { ifindex: 2, queue_id: 0 });
    }

    struct CountingStage(usize);
    impl Processor for CountingStage {
        fn process(&mut self, _packet: &mut Packet<'_>) -> Action {
            self.0 += 1;
            Action::Pass
        }
    }

    struct DropEvenIndex;
    impl Processor for DropEvenIndex {
        fn process(&mut self, packet: &mut Packet<'_>) -> Action {
            if packet.descriptor().options % 2 == 0 {
                Action::Drop
            } else {
                Action::Pass
            }
        }
    }

    struct RecordingForwarder {
        seen: std::sync::Arc<std::sync::Mutex<Vec<u32>>>,
    }
    impl Processor for RecordingForwarder {
        fn process(&mut self, packet: &mut Packet<'_>) -> Action {
            self.seen.lock().unwrap().push(packet.descriptor().options);
            Action::Transmit { ifindex: 9, queue_id: 0 }
        }
    }

    #[test]
    fn batch_compaction_preserves_survivor_order() {
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut pipeline = Pipeline::new(PipelineConfig::default());
        pipeline.add_stage(Box::new(CountingStage(0))).unwrap();
        pipeline.add_stage(Box::new(DropEvenIndex)).unwrap();
        pipeline
            .add_stage(Box::new(RecordingForwarder { seen: seen.clone() }))
            .unwrap();

        let mut storage: Vec<[u8; 14]> = (0..8).map(|_| [0u8; 14]).collect();
        let mut packets: Vec<Packet<'_>> = storage
            .iter_mut()
            .enumerate()
            .map(|(i, bytes)| Packet::new(bytes, XdpDesc::new(0, 14, i as u32), (0, 0), None))
            .collect();
        let mut actions = vec![Action::Pass; 8];

        let survivors = pipeline.process_batch(&mut packets, &mut actions);

        assert_eq!(survivors, 4);
        let surviving_indices: Vec<u32> = packets[..survivors]
            .iter()
            .map(|p| p.descriptor().options)
            .collect();
        assert_eq!(surviving_indices, vec![1, 3, 5, 7]);
        assert_eq!(*seen.lock().unwrap(), vec![1, 3, 5, 7]);
        for action in &actions[..survivors] {
            assert_eq!(*action, Action::Transmit { ifindex: 9, queue_id: 0 });
        }
    }
}
