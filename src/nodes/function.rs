use smallvec::{smallvec, SmallVec};

use crate::buffer::NodeOutput;
use crate::node::{AudioNode, NodeProperties, PrepareContext, ProcInfo, PropertyContext};

/// Applies a per-sample function to its upstream's audio.
///
/// Covers gain, inversion and muting in one node; MIDI passes through
/// untouched.
pub struct FunctionNode {
    upstream: Option<Box<dyn AudioNode>>,
    func: Box<dyn FnMut(f32) -> f32 + Send>,

    input: Option<NodeOutput>,
}

impl FunctionNode {
    pub fn new(
        upstream: Box<dyn AudioNode>,
        func: impl FnMut(f32) -> f32 + Send + 'static,
    ) -> Self {
        Self { upstream: Some(upstream), func: Box::new(func), input: None }
    }

    /// A fixed-gain transform.
    pub fn gain(upstream: Box<dyn AudioNode>, gain: f32) -> Self {
        Self::new(upstream, move |s| s * gain)
    }
}

impl AudioNode for FunctionNode {
    fn name(&self) -> &'static str {
        "function"
    }

    fn take_upstreams(&mut self) -> SmallVec<[Box<dyn AudioNode>; 2]> {
        smallvec![self.upstream.take().unwrap()]
    }

    fn properties(&self, upstreams: &[NodeProperties], _cx: &PropertyContext) -> NodeProperties {
        upstreams[0]
    }

    fn prepare(&mut self, cx: &PrepareContext) {
        self.input = Some(cx.inputs[0].clone());
    }

    fn process(&mut self, proc_info: &ProcInfo, output: &NodeOutput) {
        let input = self.input.as_ref().unwrap();

        for ch in 0..output.num_channels() {
            let Some(src) = input.audio(ch) else {
                continue;
            };
            let src = src.borrow();
            let dst = output.audio(ch).unwrap();
            let mut dst = dst.borrow_mut();

            for i in 0..proc_info.frames {
                dst[i] = (self.func)(src[i]);
            }
        }

        output.clear_events();
        output.extend_events_from(input);
    }
}
