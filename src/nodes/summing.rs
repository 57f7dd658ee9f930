use smallvec::SmallVec;

use crate::buffer::NodeOutput;
use crate::node::{AudioNode, NodeProperties, PrepareContext, ProcInfo, PropertyContext};

/// Sums any number of upstreams into one stream.
///
/// Summing is where branches with different path lengths converge, so
/// preparation wraps every upstream whose latency is below the maximum among
/// its peers in a compensating [`LatencyNode`](crate::nodes::LatencyNode).
/// After that, samples that originated from the same source frame land on
/// the same output frame.
pub struct SummingNode {
    upstreams: Vec<Box<dyn AudioNode>>,
    compensate: bool,
    inputs: SmallVec<[NodeOutput; 4]>,
}

impl SummingNode {
    pub fn new(upstreams: Vec<Box<dyn AudioNode>>) -> Self {
        Self { upstreams, compensate: true, inputs: SmallVec::new() }
    }

    /// A plain mix: branches land as they arrive, without latency
    /// compensation. Branches of unequal path length will smear.
    pub fn uncompensated(upstreams: Vec<Box<dyn AudioNode>>) -> Self {
        Self { upstreams, compensate: false, inputs: SmallVec::new() }
    }
}

impl AudioNode for SummingNode {
    fn name(&self) -> &'static str {
        "summing"
    }

    fn equalizes_input_latency(&self) -> bool {
        self.compensate
    }

    fn take_upstreams(&mut self) -> SmallVec<[Box<dyn AudioNode>; 2]> {
        self.upstreams.drain(..).collect()
    }

    fn properties(&self, upstreams: &[NodeProperties], _cx: &PropertyContext) -> NodeProperties {
        let mut props =
            NodeProperties { num_channels: 0, has_audio: false, has_midi: false, latency: 0 };

        for upstream in upstreams {
            props = props.merged_with(*upstream);
        }

        props
    }

    fn prepare(&mut self, cx: &PrepareContext) {
        self.inputs = cx.inputs.iter().cloned().collect();
    }

    fn process(&mut self, proc_info: &ProcInfo, output: &NodeOutput) {
        output.clear_audio(proc_info.frames);
        output.clear_events();

        // Upstream channels beyond the output's channel count are clipped;
        // output channels with no contributor stay silent.
        for input in self.inputs.iter() {
            output.add_audio_from(input, proc_info.frames);
            output.extend_events_from(input);
        }

        output.sort_events();
    }
}
