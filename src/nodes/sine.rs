use crate::buffer::NodeOutput;
use crate::node::{AudioNode, NodeProperties, PrepareContext, ProcInfo, PropertyContext};

/// A unity-gain sine source, the same signal in every channel.
pub struct SinNode {
    freq: f32,
    num_channels: usize,

    phase: f32,
    inc: f32,
}

impl SinNode {
    pub fn new(freq: f32) -> Self {
        Self::with_channels(freq, 1)
    }

    pub fn with_channels(freq: f32, num_channels: usize) -> Self {
        Self { freq, num_channels, phase: 0.0, inc: 0.0 }
    }
}

impl AudioNode for SinNode {
    fn name(&self) -> &'static str {
        "sin"
    }

    fn properties(&self, _upstreams: &[NodeProperties], _cx: &PropertyContext) -> NodeProperties {
        NodeProperties {
            num_channels: self.num_channels,
            has_audio: true,
            has_midi: false,
            latency: 0,
        }
    }

    fn prepare(&mut self, cx: &PrepareContext) {
        self.inc = self.freq / cx.sample_rate.as_f32();
        self.phase = 0.0;
    }

    fn process(&mut self, proc_info: &ProcInfo, output: &NodeOutput) {
        let start_phase = self.phase;

        for ch in 0..self.num_channels {
            let buf = output.audio(ch).unwrap();
            let mut buf = buf.borrow_mut();

            self.phase = start_phase;
            for s in buf[0..proc_info.frames].iter_mut() {
                *s = (self.phase * std::f32::consts::TAU).sin();
                self.phase = (self.phase + self.inc).fract();
            }
        }
    }
}
