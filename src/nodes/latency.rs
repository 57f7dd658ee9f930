use smallvec::{smallvec, SmallVec};

use crate::buffer::NodeOutput;
use crate::graph::schedule::delay_comp::{DelayRing, MidiDelayQueue};
use crate::node::{AudioNode, NodeProperties, PrepareContext, ProcInfo, PropertyContext};

/// Delays its upstream by a fixed number of samples.
///
/// Audio goes through a primed delay ring; MIDI events are held back by the
/// same number of samples. A delay of zero is legal and acts as a copy.
///
/// Preparation also creates detached instances of this node to equalize the
/// branches converging on summing junctions and returns.
pub struct LatencyNode {
    upstream: Option<Box<dyn AudioNode>>,
    delay: u32,

    input: Option<NodeOutput>,
    ring: Option<DelayRing>,
    midi: Option<MidiDelayQueue>,
}

impl LatencyNode {
    pub fn new(upstream: Box<dyn AudioNode>, delay: u32) -> Self {
        Self { upstream: Some(upstream), delay, input: None, ring: None, midi: None }
    }

    /// A compensator with no owned upstream; preparation wires its input
    /// edge directly.
    pub(crate) fn compensator(delay: u32) -> Self {
        Self { upstream: None, delay, input: None, ring: None, midi: None }
    }

    pub fn delay(&self) -> u32 {
        self.delay
    }
}

impl AudioNode for LatencyNode {
    fn name(&self) -> &'static str {
        "latency"
    }

    fn take_upstreams(&mut self) -> SmallVec<[Box<dyn AudioNode>; 2]> {
        match self.upstream.take() {
            Some(upstream) => smallvec![upstream],
            None => SmallVec::new(),
        }
    }

    fn properties(&self, upstreams: &[NodeProperties], _cx: &PropertyContext) -> NodeProperties {
        let mut props = upstreams[0];
        props.latency += self.delay;
        props
    }

    fn prepare(&mut self, cx: &PrepareContext) {
        self.input = Some(cx.inputs[0].clone());
        self.ring = Some(DelayRing::new(
            cx.properties.num_channels,
            self.delay,
            cx.max_block_size,
        ));
        if cx.properties.has_midi {
            self.midi = Some(MidiDelayQueue::new(self.delay, cx.event_capacity));
        }
    }

    fn process(&mut self, proc_info: &ProcInfo, output: &NodeOutput) {
        let input = self.input.as_ref().unwrap();
        let ring = self.ring.as_mut().unwrap();

        ring.write(input, proc_info.frames);

        output.clear_audio(proc_info.frames);
        ring.read_adding(output, proc_info.frames);

        output.clear_events();
        if let Some(midi) = &mut self.midi {
            midi.write_from(input);
            midi.read_into(output, proc_info.frames);
        }
    }
}
