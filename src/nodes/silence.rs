use crate::buffer::NodeOutput;
use crate::node::{AudioNode, NodeProperties, PrepareContext, ProcInfo, PropertyContext};

/// A source producing silence on a fixed number of channels.
///
/// Useful as the direct input of a return track that should only carry its
/// bus signal.
pub struct SilenceNode {
    num_channels: usize,
}

impl SilenceNode {
    pub fn new(num_channels: usize) -> Self {
        Self { num_channels }
    }
}

impl AudioNode for SilenceNode {
    fn name(&self) -> &'static str {
        "silence"
    }

    fn properties(&self, _upstreams: &[NodeProperties], _cx: &PropertyContext) -> NodeProperties {
        NodeProperties {
            num_channels: self.num_channels,
            has_audio: true,
            has_midi: false,
            latency: 0,
        }
    }

    fn prepare(&mut self, _cx: &PrepareContext) {}

    fn process(&mut self, proc_info: &ProcInfo, output: &NodeOutput) {
        output.clear_audio(proc_info.frames);
    }
}
