use fnv::FnvHashMap;
use smallvec::{smallvec, SmallVec};

use crate::buffer::{DebugBufferID, DebugBufferType, NodeOutput, SharedBuffer};
use crate::error::{GraphWarning, PrepareError};
use crate::node::{
    AudioNode, BusInput, BusRole, NodeId, NodeProperties, PrepareContext, PropertyContext,
};
use crate::nodes::LatencyNode;
use crate::status::StatusSender;

use super::registry::SendRegistry;
use super::schedule::{ProcessorSchedule, ScheduledNode};
use super::verifier::Verifier;
use super::GraphSettings;

struct NodeEntry {
    node: Box<dyn AudioNode>,
    upstreams: SmallVec<[usize; 2]>,
}

pub(crate) struct CompiledGraph {
    pub schedule: ProcessorSchedule,
    pub root_properties: NodeProperties,
    pub warnings: Vec<GraphWarning>,
}

/// Turn an ownership tree of nodes into a verified, fully-allocated
/// schedule.
///
/// In order: flatten the tree, register bus roles, check acyclicity over
/// direct and bus-derived edges, derive properties in topological order,
/// splice compensating latency nodes onto converging edges, allocate every
/// output slot, let each node capture its inputs, and verify the result.
pub(crate) fn compile_graph(
    root: Box<dyn AudioNode>,
    settings: &GraphSettings,
    coll_handle: &basedrop::Handle,
    status: StatusSender,
) -> Result<CompiledGraph, PrepareError> {
    // -- 1. Flatten the ownership tree into a flat node table. ------------

    let mut entries: Vec<NodeEntry> = Vec::new();
    let root_id = flatten_into(root, &mut entries);

    // -- 2. Bus discovery. ------------------------------------------------

    let mut registry = SendRegistry::new();
    for (id, entry) in entries.iter().enumerate() {
        if let Some(role) = entry.node.bus_role() {
            registry.register(NodeId(id as u32), role);
        }
    }

    let warnings = registry.warnings();
    for warning in warnings.iter() {
        log::warn!("{}", warning);
    }

    // -- 3. Acyclicity over direct + virtual edges. ------------------------

    let gating = build_gating(&entries, &registry);
    let order = topological_order(&gating, &entries)?;

    // -- 4. Property derivation in topological order, so each node sees
    //       finalized upstream properties (bus senders included). ---------

    let mut resolved: Vec<Option<NodeProperties>> = vec![None; entries.len()];
    for &id in order.iter() {
        let id = id as usize;

        let upstream_props: SmallVec<[NodeProperties; 2]> =
            entries[id].upstreams.iter().map(|&u| resolved[u].unwrap()).collect();

        let props = {
            let cx = PropertyContext { registry: &registry, resolved: &resolved };
            entries[id].node.properties(&upstream_props, &cx)
        };

        if props.has_audio && props.num_channels == 0 {
            return Err(PrepareError::ZeroChannelsWithAudio { node: entries[id].node.name() });
        }

        resolved[id] = Some(props);
    }
    let mut props: Vec<NodeProperties> = resolved.into_iter().map(|p| p.unwrap()).collect();

    // -- 5. Latency balancing: wrap every upstream of an equalizing node
    //       whose latency falls short of the node's own in a compensator. --

    let base_len = entries.len();
    for id in 0..base_len {
        if !entries[id].node.equalizes_input_latency() {
            continue;
        }

        let target = props[id].latency;
        for k in 0..entries[id].upstreams.len() {
            let u = entries[id].upstreams[k];
            let deficit = target - props[u].latency;
            if deficit == 0 {
                continue;
            }

            log::trace!(
                "inserting {} samples of latency compensation between \"{}\" and \"{}\"",
                deficit,
                entries[u].node.name(),
                entries[id].node.name(),
            );

            let comp_id = entries.len();
            entries.push(NodeEntry {
                node: Box::new(LatencyNode::compensator(deficit)),
                upstreams: smallvec![u],
            });
            props.push(NodeProperties { latency: target, ..props[u] });
            entries[id].upstreams[k] = comp_id;
        }
    }

    // Splices rewired edges; rebuild the dependency picture.
    let gating = build_gating(&entries, &registry);
    let order = topological_order(&gating, &entries)?;

    // -- 6. Slot allocation: one buffer per channel per node, plus an event
    //       buffer for nodes that carry MIDI. ------------------------------

    let mut next_buffer_index = 0u32;
    let outputs: Vec<NodeOutput> = props
        .iter()
        .map(|p| {
            let audio: SmallVec<[SharedBuffer<f32>; 2]> = (0..p.num_channels)
                .map(|_| {
                    let debug_id = DebugBufferID {
                        index: next_buffer_index,
                        buffer_type: DebugBufferType::Audio32,
                    };
                    next_buffer_index += 1;
                    SharedBuffer::new(settings.max_block_size, debug_id, coll_handle)
                })
                .collect();

            let events = p.has_midi.then(|| {
                let debug_id = DebugBufferID {
                    index: next_buffer_index,
                    buffer_type: DebugBufferType::Event,
                };
                next_buffer_index += 1;
                SharedBuffer::with_capacity(settings.event_capacity, debug_id, coll_handle)
            });

            NodeOutput::new(audio, events)
        })
        .collect();

    // -- 7. Node preparation: hand every node its inputs (bus inputs
    //       included) and let it allocate rings and scratch state. ---------

    let mut bus_inputs: FnvHashMap<u32, Vec<BusInput>> = FnvHashMap::default();
    for (bus, state) in registry.iter() {
        bus_inputs.insert(
            bus,
            state
                .senders
                .iter()
                .map(|s| BusInput {
                    output: outputs[s.as_usize()].clone(),
                    properties: props[s.as_usize()],
                })
                .collect(),
        );
    }

    for &id in order.iter() {
        let id = id as usize;

        let inputs: SmallVec<[NodeOutput; 2]> =
            entries[id].upstreams.iter().map(|&u| outputs[u].clone()).collect();
        let input_properties: SmallVec<[NodeProperties; 2]> =
            entries[id].upstreams.iter().map(|&u| props[u]).collect();

        let cx = PrepareContext {
            sample_rate: settings.sample_rate,
            max_block_size: settings.max_block_size,
            event_capacity: settings.event_capacity,
            properties: props[id],
            inputs: &inputs,
            input_properties: &input_properties,
            bus_inputs: &bus_inputs,
        };

        entries[id].node.prepare(&cx);
    }

    // -- 8. Verification + assembly. ---------------------------------------

    let names: Vec<&'static str> = entries.iter().map(|e| e.node.name()).collect();
    Verifier::new().verify_schedule(&names, &outputs, &gating, &order)?;

    let mut nodes: Vec<ScheduledNode> = Vec::with_capacity(entries.len());
    for (id, entry) in entries.into_iter().enumerate() {
        let name = entry.node.name();
        nodes.push(ScheduledNode {
            node: entry.node,
            name,
            properties: props[id],
            output: outputs[id].clone(),
            gating: gating[id].iter().map(|&u| u as u32).collect(),
            processed: false,
        });
    }

    log::debug!(
        "compiled audio graph: {} nodes, {} buffers, root latency {} samples",
        nodes.len(),
        next_buffer_index,
        props[root_id].latency,
    );

    let schedule = ProcessorSchedule::new(
        nodes,
        order,
        root_id as u32,
        settings.event_capacity,
        status,
    );

    Ok(CompiledGraph { schedule, root_properties: props[root_id], warnings })
}

fn flatten_into(mut node: Box<dyn AudioNode>, entries: &mut Vec<NodeEntry>) -> usize {
    let upstreams = node.take_upstreams();

    let mut upstream_ids: SmallVec<[usize; 2]> = SmallVec::with_capacity(upstreams.len());
    for upstream in upstreams {
        upstream_ids.push(flatten_into(upstream, entries));
    }

    let id = entries.len();
    entries.push(NodeEntry { node, upstreams: upstream_ids });
    id
}

/// The per-node "must run first" sets: direct upstreams plus, for returns,
/// every sender on the node's bus.
fn build_gating(entries: &[NodeEntry], registry: &SendRegistry) -> Vec<SmallVec<[usize; 4]>> {
    entries
        .iter()
        .map(|entry| {
            let mut gating: SmallVec<[usize; 4]> = entry.upstreams.iter().copied().collect();
            if let Some(BusRole::Return(bus)) = entry.node.bus_role() {
                for sender in registry.senders_of(bus) {
                    gating.push(sender.as_usize());
                }
            }
            gating
        })
        .collect()
}

fn topological_order(
    gating: &[SmallVec<[usize; 4]>],
    entries: &[NodeEntry],
) -> Result<Vec<u32>, PrepareError> {
    let n = gating.len();

    let mut dependents: Vec<SmallVec<[usize; 4]>> = vec![SmallVec::new(); n];
    let mut in_degree = vec![0usize; n];
    for (id, upstreams) in gating.iter().enumerate() {
        for &u in upstreams.iter() {
            dependents[u].push(id);
            in_degree[id] += 1;
        }
    }

    let mut stack: Vec<usize> = (0..n).filter(|&id| in_degree[id] == 0).collect();
    let mut order: Vec<u32> = Vec::with_capacity(n);
    let mut placed = vec![false; n];

    while let Some(u) = stack.pop() {
        order.push(u as u32);
        placed[u] = true;
        for &v in dependents[u].iter() {
            in_degree[v] -= 1;
            if in_degree[v] == 0 {
                stack.push(v);
            }
        }
    }

    if order.len() != n {
        let node =
            (0..n).find(|&id| !placed[id]).map(|id| entries[id].node.name()).unwrap_or("unknown");
        return Err(PrepareError::CycleDetected { node });
    }

    Ok(order)
}
