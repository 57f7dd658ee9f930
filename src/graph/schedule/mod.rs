use smallvec::SmallVec;

use crate::buffer::NodeOutput;
use crate::node::{AudioNode, NodeProperties, ProcInfo};
use crate::status::{RtWarning, StatusSender};

pub(crate) mod delay_comp;

/// One node of a prepared graph together with its scheduling state.
pub(crate) struct ScheduledNode {
    pub node: Box<dyn AudioNode>,
    pub name: &'static str,
    pub properties: NodeProperties,

    /// The output slot exclusively owned by this node. Consumers hold
    /// cloned handles and borrow read-only.
    pub output: NodeOutput,

    /// The nodes that must complete the current block before this one may
    /// run: the direct upstreams plus, for a return, every send node on its
    /// bus.
    pub gating: SmallVec<[u32; 4]>,

    pub processed: bool,
}

/// The compiled, immutable execution plan of a graph.
///
/// The topological order computed at preparation is the preferred driving
/// order, but readiness is still checked per node so that a future fork-join
/// executor can run disjoint branches in parallel; each sweep processes
/// whatever has become ready, and the block is done once the root has
/// processed.
pub(crate) struct ProcessorSchedule {
    nodes: Vec<ScheduledNode>,
    order: Vec<u32>,
    root: u32,
    event_capacity: usize,
    status: StatusSender,
}

impl ProcessorSchedule {
    pub fn new(
        nodes: Vec<ScheduledNode>,
        order: Vec<u32>,
        root: u32,
        event_capacity: usize,
        status: StatusSender,
    ) -> Self {
        Self { nodes, order, root, event_capacity, status }
    }

    pub fn root_output(&self) -> &NodeOutput {
        &self.nodes[self.root as usize].output
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn push_warning(&mut self, warning: RtWarning) {
        self.status.push(warning);
    }

    /// Whether every gating upstream of the node has completed this block.
    fn is_ready(&self, id: usize) -> bool {
        self.nodes[id].gating.iter().all(|&u| self.nodes[u as usize].processed)
    }

    /// Drive one block: clear every node's processed flag, then sweep the
    /// driving order invoking every node that has become ready, until the
    /// root has processed.
    pub fn process_block(&mut self, proc_info: &ProcInfo) {
        for node in self.nodes.iter_mut() {
            node.processed = false;
        }

        let root = self.root as usize;

        while !self.nodes[root].processed {
            let mut progressed = false;

            for i in 0..self.order.len() {
                let id = self.order[i] as usize;

                if self.nodes[id].processed || !self.is_ready(id) {
                    continue;
                }

                let entry = &mut self.nodes[id];
                entry.node.process(proc_info, &entry.output);
                entry.processed = true;
                progressed = true;

                if let Some(events) = self.nodes[id].output.events() {
                    if events.borrow().len() > self.event_capacity {
                        self.status.push(RtWarning::EventOverflow {
                            node: crate::node::NodeId(id as u32),
                        });
                    }
                }
            }

            if !progressed {
                // Unreachable on a verified schedule; abandon the block as
                // silence rather than spin.
                debug_assert!(false, "audio graph schedule stalled");
                self.status.push(RtWarning::ScheduleStall);
                let root = &self.nodes[root];
                root.output.clear_audio(proc_info.frames);
                root.output.clear_events();
                break;
            }
        }
    }
}

impl std::fmt::Debug for ProcessorSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = String::new();

        s.push_str("ProcessorSchedule {\n");

        for &id in self.order.iter() {
            let node = &self.nodes[id as usize];
            s.push_str(&format!(
                "    {}: \"{}\" ch={} lat={} out: {:?} after: {:?},\n",
                id,
                node.name,
                node.properties.num_channels,
                node.properties.latency,
                node.output,
                node.gating
            ));
        }

        s.push('}');

        write!(f, "{}", s)
    }
}
