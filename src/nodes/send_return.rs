use smallvec::{smallvec, SmallVec};

use crate::buffer::NodeOutput;
use crate::graph::schedule::delay_comp::{DelayRing, MidiDelayQueue};
use crate::node::{
    AudioNode, BusRole, NodeProperties, PrepareContext, ProcInfo, PropertyContext,
};

/// Taps its upstream onto a named bus and passes it through unchanged.
///
/// A send never gates on the existence of a receiver: with no matching
/// return on the bus, the tapped data is silently discarded (a warning is
/// logged at preparation) and the pass-through output still flows.
pub struct SendNode {
    upstream: Option<Box<dyn AudioNode>>,
    bus: u32,

    input: Option<NodeOutput>,
}

impl SendNode {
    pub fn new(upstream: Box<dyn AudioNode>, bus: u32) -> Self {
        Self { upstream: Some(upstream), bus, input: None }
    }

    pub fn bus(&self) -> u32 {
        self.bus
    }
}

impl AudioNode for SendNode {
    fn name(&self) -> &'static str {
        "send"
    }

    fn bus_role(&self) -> Option<BusRole> {
        Some(BusRole::Send(self.bus))
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

        output.copy_audio_from(input, proc_info.frames);

        output.clear_events();
        output.extend_events_from(input);
    }
}

/// One virtual input of a return node: a sender's output slot, delayed where
/// the sender's path is shorter than the return's total latency.
struct BusConnection {
    source: NodeOutput,
    ring: Option<DelayRing>,
    midi: Option<MidiDelayQueue>,
}

/// Merges its direct upstream with the output of every send node sharing its
/// bus id.
///
/// The senders live in otherwise-disjoint subgraphs; the bus gives the
/// return a scheduling dependency on each of them, and the return only runs
/// once every sender has produced its block. Delivery is in-block: the
/// return sees what the senders produced for the *same* block.
///
/// Latency alignment is symmetric to a summing junction, applied across the
/// virtual edges: preparation delays the direct upstream to the return's
/// total latency, and each sender's contribution goes through an internal
/// ring covering the remainder of its path.
pub struct ReturnNode {
    upstream: Option<Box<dyn AudioNode>>,
    bus: u32,

    direct: Option<NodeOutput>,
    bus_connections: SmallVec<[BusConnection; 2]>,
}

impl ReturnNode {
    pub fn new(upstream: Box<dyn AudioNode>, bus: u32) -> Self {
        Self { upstream: Some(upstream), bus, direct: None, bus_connections: SmallVec::new() }
    }

    pub fn bus(&self) -> u32 {
        self.bus
    }
}

impl AudioNode for ReturnNode {
    fn name(&self) -> &'static str {
        "return"
    }

    fn bus_role(&self) -> Option<BusRole> {
        Some(BusRole::Return(self.bus))
    }

    fn equalizes_input_latency(&self) -> bool {
        true
    }

    fn take_upstreams(&mut self) -> SmallVec<[Box<dyn AudioNode>; 2]> {
        smallvec![self.upstream.take().unwrap()]
    }

    fn properties(&self, upstreams: &[NodeProperties], cx: &PropertyContext) -> NodeProperties {
        let mut props = upstreams[0];

        for sender in cx.bus_send_properties(self.bus) {
            props = props.merged_with(sender);
        }

        props
    }

    fn prepare(&mut self, cx: &PrepareContext) {
        self.direct = Some(cx.inputs[0].clone());

        self.bus_connections = cx
            .bus_inputs(self.bus)
            .iter()
            .map(|bus_input| {
                let delay = cx.properties.latency - bus_input.properties.latency;

                let ring = (delay > 0).then(|| {
                    DelayRing::new(
                        bus_input.properties.num_channels,
                        delay,
                        cx.max_block_size,
                    )
                });
                let midi = (delay > 0 && bus_input.properties.has_midi)
                    .then(|| MidiDelayQueue::new(delay, cx.event_capacity));

                BusConnection { source: bus_input.output.clone(), ring, midi }
            })
            .collect();
    }

    fn process(&mut self, proc_info: &ProcInfo, output: &NodeOutput) {
        let direct = self.direct.as_ref().unwrap();

        output.clear_audio(proc_info.frames);
        output.clear_events();

        output.add_audio_from(direct, proc_info.frames);
        output.extend_events_from(direct);

        for connection in self.bus_connections.iter_mut() {
            match &mut connection.ring {
                Some(ring) => {
                    ring.write(&connection.source, proc_info.frames);
                    ring.read_adding(output, proc_info.frames);
                }
                None => output.add_audio_from(&connection.source, proc_info.frames),
            }

            match &mut connection.midi {
                Some(midi) => {
                    midi.write_from(&connection.source);
                    midi.read_into(output, proc_info.frames);
                }
                None => output.extend_events_from(&connection.source),
            }
        }

        output.sort_events();
    }
}
