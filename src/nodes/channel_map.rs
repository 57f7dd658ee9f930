use smallvec::{smallvec, SmallVec};

use crate::buffer::NodeOutput;
use crate::node::{AudioNode, NodeProperties, PrepareContext, ProcInfo, PropertyContext};

/// Rearranges the channels of its upstream through a list of
/// `(source, destination)` pairs.
///
/// One source may feed several destinations (mono widened to a multichannel
/// bed) and several sources may feed one destination, in which case they are
/// summed (stereo folded down to mono). Unmapped destination channels stay
/// silent, unmapped source channels are dropped. MIDI passes through.
pub struct ChannelMapNode {
    upstream: Option<Box<dyn AudioNode>>,
    map: Vec<(usize, usize)>,

    input: Option<NodeOutput>,
}

impl ChannelMapNode {
    pub fn new(upstream: Box<dyn AudioNode>, map: Vec<(usize, usize)>) -> Self {
        Self { upstream: Some(upstream), map, input: None }
    }
}

impl AudioNode for ChannelMapNode {
    fn name(&self) -> &'static str {
        "channel-map"
    }

    fn take_upstreams(&mut self) -> SmallVec<[Box<dyn AudioNode>; 2]> {
        smallvec![self.upstream.take().unwrap()]
    }

    fn properties(&self, upstreams: &[NodeProperties], _cx: &PropertyContext) -> NodeProperties {
        let num_channels = self.map.iter().map(|&(_, dst)| dst + 1).max().unwrap_or(0);

        NodeProperties {
            num_channels,
            has_audio: upstreams[0].has_audio && num_channels > 0,
            has_midi: upstreams[0].has_midi,
            latency: upstreams[0].latency,
        }
    }

    fn prepare(&mut self, cx: &PrepareContext) {
        self.input = Some(cx.inputs[0].clone());
    }

    fn process(&mut self, proc_info: &ProcInfo, output: &NodeOutput) {
        let input = self.input.as_ref().unwrap();

        output.clear_audio(proc_info.frames);

        for &(src_ch, dst_ch) in self.map.iter() {
            let (Some(src), Some(dst)) = (input.audio(src_ch), output.audio(dst_ch)) else {
                continue;
            };
            let src = src.borrow();
            let mut dst = dst.borrow_mut();

            for i in 0..proc_info.frames {
                dst[i] += src[i];
            }
        }

        output.clear_events();
        output.extend_events_from(input);
    }
}
