use fnv::FnvHashMap;
use smallvec::SmallVec;

use crate::buffer::NodeOutput;
use crate::error::VerifyScheduleError;

/// Post-compile schedule checks.
///
/// Output slots are reference-counted and interiorly mutable, so the borrow
/// checker cannot prove that a compiled schedule never hands the same buffer
/// to two writers or processes a node before its inputs exist. This is
/// probably expensive, but the check stays until we are very confident in
/// the stability and soundness of the graph compiler — it runs once per
/// preparation, never on the audio thread.
pub(crate) struct Verifier {
    buffer_owners: FnvHashMap<crate::buffer::DebugBufferID, usize>,
}

impl Verifier {
    pub fn new() -> Self {
        let mut buffer_owners = FnvHashMap::default();
        buffer_owners.reserve(256);

        Verifier { buffer_owners }
    }

    pub fn verify_schedule(
        &mut self,
        names: &[&'static str],
        outputs: &[NodeOutput],
        gating: &[SmallVec<[usize; 4]>],
        order: &[u32],
    ) -> Result<(), VerifyScheduleError> {
        self.buffer_owners.clear();

        // Every buffer belongs to exactly one node's output slot.
        for (id, output) in outputs.iter().enumerate() {
            for buffer_id in output.debug_ids() {
                if let Some(&owner) = self.buffer_owners.get(&buffer_id) {
                    if owner == id {
                        return Err(VerifyScheduleError::BufferAppearsTwiceInSameNode {
                            buffer_id,
                            node: names[id],
                        });
                    }
                    return Err(VerifyScheduleError::BufferSharedBetweenNodes {
                        buffer_id,
                        first: names[owner],
                        second: names[id],
                    });
                }
                self.buffer_owners.insert(buffer_id, id);
            }
        }

        // No node reads one of its own output buffers as an input. Implied
        // by unique ownership, but cheap and kept explicit.
        for (id, inputs) in gating.iter().enumerate() {
            let own: SmallVec<[crate::buffer::DebugBufferID; 4]> = outputs[id].debug_ids();
            for &u in inputs.iter() {
                for buffer_id in outputs[u].debug_ids() {
                    if own.contains(&buffer_id) {
                        return Err(VerifyScheduleError::InputAliasesOutput {
                            buffer_id,
                            node: names[id],
                        });
                    }
                }
            }
        }

        // The driving order places every node after all of its gating
        // upstreams.
        let mut position = vec![0usize; order.len()];
        for (i, &id) in order.iter().enumerate() {
            position[id as usize] = i;
        }
        for (id, inputs) in gating.iter().enumerate() {
            for &u in inputs.iter() {
                if position[u] >= position[id] {
                    return Err(VerifyScheduleError::UpstreamProcessedAfterDownstream {
                        upstream: names[u],
                        downstream: names[id],
                    });
                }
            }
        }

        Ok(())
    }
}
