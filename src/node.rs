use fnv::FnvHashMap;
use smallvec::SmallVec;

use crate::buffer::NodeOutput;
use crate::graph::registry::SendRegistry;

/// The sample rate of a prepared graph in Hz.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRate(f64);

impl SampleRate {
    pub fn new(rate: f64) -> Self {
        Self(rate)
    }

    pub fn as_f64(&self) -> f64 {
        self.0
    }

    pub fn as_f32(&self) -> f32 {
        self.0 as f32
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        Self(44_100.0)
    }
}

/// Identifies a node within a prepared graph.
///
/// Ids are assigned during preparation and are only meaningful for the graph
/// that assigned them (diagnostics, status messages).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub(crate) fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// The properties a node declares for the stream it produces.
///
/// Derived once during preparation, in topological order over the graph, and
/// immutable afterwards. `latency` is the total sample delay between any
/// source in the node's upstream cone and the node's own output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeProperties {
    pub num_channels: usize,
    pub has_audio: bool,
    pub has_midi: bool,
    pub latency: u32,
}

impl NodeProperties {
    /// Combine with the properties of another contributing stream, the way
    /// summing junctions and returns do.
    pub fn merged_with(self, other: NodeProperties) -> NodeProperties {
        NodeProperties {
            num_channels: self.num_channels.max(other.num_channels),
            has_audio: self.has_audio | other.has_audio,
            has_midi: self.has_midi | other.has_midi,
            latency: self.latency.max(other.latency),
        }
    }
}

/// The bus registration a node declares, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusRole {
    /// Produce onto the bus with this id.
    Send(u32),
    /// Consume the mixed output of every sender on the bus with this id.
    Return(u32),
}

/// Per-block context passed to every process call.
pub struct ProcInfo {
    /// A steady sample time counter. Increases by `frames` every block.
    pub steady_time: i64,

    /// The number of frames to process. All buffers in a prepared graph are
    /// guaranteed to be at least this length.
    pub frames: usize,

    /// The sample rate the graph was prepared with.
    pub sample_rate: SampleRate,
}

/// Resolver handed to [`AudioNode::properties`] during preparation.
///
/// Preparation evaluates properties in topological order (virtual bus edges
/// included), so the properties of every sender on a bus are final by the
/// time the bus's returns are asked for theirs.
pub struct PropertyContext<'a> {
    pub(crate) registry: &'a SendRegistry,
    pub(crate) resolved: &'a [Option<NodeProperties>],
}

impl<'a> PropertyContext<'a> {
    /// The finalized properties of every send node registered on `bus`.
    pub fn bus_send_properties(&self, bus: u32) -> SmallVec<[NodeProperties; 2]> {
        self.registry
            .senders_of(bus)
            .iter()
            .map(|id| self.resolved[id.as_usize()].unwrap())
            .collect()
    }
}

/// A virtual (bus) input handed to a return node during preparation.
pub struct BusInput {
    /// The sending node's output slot.
    pub output: NodeOutput,
    /// The sending node's finalized properties.
    pub properties: NodeProperties,
}

/// Everything a node needs to finalize itself before the first process call:
/// its own derived properties, its direct upstreams' output slots, and (for
/// returns) the slots of every sender on its bus.
pub struct PrepareContext<'a> {
    pub sample_rate: SampleRate,
    pub max_block_size: usize,
    pub event_capacity: usize,

    /// This node's own derived properties.
    pub properties: NodeProperties,

    /// Output slots of the direct upstreams, in the order the node yielded
    /// them from [`AudioNode::take_upstreams`].
    pub inputs: &'a [NodeOutput],

    /// Properties matching `inputs`.
    pub input_properties: &'a [NodeProperties],

    pub(crate) bus_inputs: &'a FnvHashMap<u32, Vec<BusInput>>,
}

impl<'a> PrepareContext<'a> {
    /// The virtual inputs contributed by every sender on `bus`.
    pub fn bus_inputs(&self, bus: u32) -> &[BusInput] {
        self.bus_inputs.get(&bus).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

/// An audio/MIDI processing unit.
///
/// Nodes are constructed bottom-up: a node takes ownership of its direct
/// upstreams at construction, and the finished root is handed to
/// [`AudioGraph::prepare`](crate::AudioGraph::prepare). Preparation flattens
/// the ownership tree, derives properties, installs latency compensation and
/// allocates every output slot; after that the graph is immutable and
/// `process` runs once per node per block with no allocation.
pub trait AudioNode: Send {
    /// A short static name used in diagnostics and error messages.
    fn name(&self) -> &'static str;

    /// The bus this node produces onto or consumes from, if any.
    fn bus_role(&self) -> Option<BusRole> {
        None
    }

    /// Whether preparation should delay this node's slower direct upstreams
    /// so that all of them arrive with equal latency (summing junctions and
    /// returns).
    fn equalizes_input_latency(&self) -> bool {
        false
    }

    /// Yield ownership of the direct upstreams to the preparation pass.
    ///
    /// Called exactly once per node. Leaves return an empty list.
    fn take_upstreams(&mut self) -> SmallVec<[Box<dyn AudioNode>; 2]> {
        SmallVec::new()
    }

    /// Derive this node's properties from its direct upstreams' finalized
    /// properties (same order as `take_upstreams` yielded them). Returns
    /// additionally consult `cx` for the senders on their bus.
    fn properties(&self, upstreams: &[NodeProperties], cx: &PropertyContext) -> NodeProperties;

    /// Capture input slot handles and allocate internal state (delay rings,
    /// event queues, oscillator increments). Called once, after property
    /// derivation, in topological order.
    fn prepare(&mut self, cx: &PrepareContext) {
        let _ = cx;
    }

    /// Process one block: write exactly `proc_info.frames` frames of audio
    /// and this block's events into `output`, clearing any residue from the
    /// previous block first. Must not allocate and must not read from
    /// anything downstream.
    fn process(&mut self, proc_info: &ProcInfo, output: &NodeOutput);
}
