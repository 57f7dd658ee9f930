use std::error::Error;

use crate::buffer::DebugBufferID;

/// A fatal configuration error detected during graph preparation.
///
/// No processing may occur after preparation fails.
#[derive(Debug, Clone)]
pub enum PrepareError {
    /// The graph, with send/return bus edges added, contains a cycle.
    CycleDetected { node: &'static str },

    /// A node claims to produce audio but declares zero channels.
    ZeroChannelsWithAudio { node: &'static str },

    /// The settings handed to `prepare` are unusable.
    InvalidSettings { reason: &'static str },

    /// The compiled schedule failed post-compile verification.
    ScheduleVerification(VerifyScheduleError),
}

impl Error for PrepareError {}

impl std::fmt::Display for PrepareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            PrepareError::CycleDetected { node } => {
                write!(
                    f,
                    "Could not prepare audio graph: a cycle through node \"{}\" was detected (send/return bus edges included)",
                    node
                )
            }
            PrepareError::ZeroChannelsWithAudio { node } => {
                write!(
                    f,
                    "Could not prepare audio graph: node \"{}\" declares audio output with zero channels",
                    node
                )
            }
            PrepareError::InvalidSettings { reason } => {
                write!(f, "Could not prepare audio graph: {}", reason)
            }
            PrepareError::ScheduleVerification(e) => {
                write!(f, "Could not prepare audio graph: {}", e)
            }
        }
    }
}

impl From<VerifyScheduleError> for PrepareError {
    fn from(e: VerifyScheduleError) -> Self {
        PrepareError::ScheduleVerification(e)
    }
}

/// A non-fatal condition noticed during preparation.
///
/// Warnings are logged and retained on the graph; preparation still
/// succeeds. A send with no matching return keeps passing its input through
/// (the bus side is discarded), and a return with no matching send only
/// observes its direct upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphWarning {
    SendWithoutReturn { bus: u32 },
    ReturnWithoutSend { bus: u32 },
}

impl std::fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            GraphWarning::SendWithoutReturn { bus } => {
                write!(f, "Send bus {} has no matching return; its output will be discarded", bus)
            }
            GraphWarning::ReturnWithoutSend { bus } => {
                write!(f, "Return bus {} has no matching send; only its direct input will be heard", bus)
            }
        }
    }
}

/// A defect found in a compiled schedule.
///
/// These indicate a bug in the graph compiler rather than in the embedder's
/// graph, but the check stays on until we are very confident in the
/// stability and soundness of the compiler.
#[derive(Debug, Clone)]
pub enum VerifyScheduleError {
    /// The same buffer is assigned twice within a single node's slots.
    BufferAppearsTwiceInSameNode { buffer_id: DebugBufferID, node: &'static str },

    /// The same buffer is owned by the output slots of two different nodes.
    BufferSharedBetweenNodes { buffer_id: DebugBufferID, first: &'static str, second: &'static str },

    /// A node reads one of its own output buffers as an input.
    InputAliasesOutput { buffer_id: DebugBufferID, node: &'static str },

    /// The driving order would process a node before one of its upstreams.
    UpstreamProcessedAfterDownstream { upstream: &'static str, downstream: &'static str },
}

impl Error for VerifyScheduleError {}

impl std::fmt::Display for VerifyScheduleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self {
            VerifyScheduleError::BufferAppearsTwiceInSameNode { buffer_id, node } => {
                write!(
                    f,
                    "Error detected in compiled audio graph: buffer {:?} appears more than once in the slots of node \"{}\"",
                    buffer_id, node
                )
            }
            VerifyScheduleError::BufferSharedBetweenNodes { buffer_id, first, second } => {
                write!(
                    f,
                    "Error detected in compiled audio graph: buffer {:?} is owned by both node \"{}\" and node \"{}\"",
                    buffer_id, first, second
                )
            }
            VerifyScheduleError::InputAliasesOutput { buffer_id, node } => {
                write!(
                    f,
                    "Error detected in compiled audio graph: node \"{}\" reads its own output buffer {:?} as an input",
                    node, buffer_id
                )
            }
            VerifyScheduleError::UpstreamProcessedAfterDownstream { upstream, downstream } => {
                write!(
                    f,
                    "Error detected in compiled audio graph: the driving order schedules \"{}\" after its dependent \"{}\"",
                    upstream, downstream
                )
            }
        }
    }
}
