use fnv::FnvHashMap;

use crate::error::GraphWarning;
use crate::node::{BusRole, NodeId};

/// Everything registered on one bus id.
pub(crate) struct BusState {
    pub senders: Vec<NodeId>,
    pub returns: Vec<NodeId>,
}

/// The graph-local mapping from bus ids to the send and return nodes bound
/// to them.
///
/// Two nodes refer to the same bus iff they carry the same integer id. The
/// registry never owns nodes; it holds their graph-local ids so preparation
/// can add the hidden sender → return scheduling edges and hand every return
/// the output slots of its senders. Membership is frozen once preparation
/// completes.
pub(crate) struct SendRegistry {
    buses: FnvHashMap<u32, BusState>,
}

impl SendRegistry {
    pub fn new() -> Self {
        Self { buses: FnvHashMap::default() }
    }

    pub fn register(&mut self, node: NodeId, role: BusRole) {
        let (bus, is_send) = match role {
            BusRole::Send(bus) => (bus, true),
            BusRole::Return(bus) => (bus, false),
        };

        let state = self
            .buses
            .entry(bus)
            .or_insert_with(|| BusState { senders: Vec::new(), returns: Vec::new() });

        if is_send {
            state.senders.push(node);
        } else {
            state.returns.push(node);
        }
    }

    /// Every send node registered on `bus`, in registration order.
    pub fn senders_of(&self, bus: u32) -> &[NodeId] {
        self.buses.get(&bus).map(|state| state.senders.as_slice()).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &BusState)> {
        self.buses.iter().map(|(&bus, state)| (bus, state))
    }

    /// Buses with senders but no returns (or the reverse) are legal but
    /// usually a patching mistake; surface them.
    pub fn warnings(&self) -> Vec<GraphWarning> {
        let mut warnings = Vec::new();

        let mut buses: Vec<u32> = self.buses.keys().copied().collect();
        buses.sort_unstable();

        for bus in buses {
            let state = &self.buses[&bus];
            if state.returns.is_empty() {
                warnings.push(GraphWarning::SendWithoutReturn { bus });
            }
            if state.senders.is_empty() {
                warnings.push(GraphWarning::ReturnWithoutSend { bus });
            }
        }

        warnings
    }
}
