//! An audio processing graph runtime: a DAG of audio/MIDI nodes driven per
//! block at a fixed sample rate, with automatic sample-accurate latency
//! compensation across summing junctions and named send/return buses.

mod buffer;
mod error;
mod event;
mod graph;
mod node;
mod status;

pub mod nodes;

pub use buffer::{DebugBufferID, DebugBufferType, NodeOutput, SharedBuffer};
pub use error::{GraphWarning, PrepareError, VerifyScheduleError};
pub use event::MidiEvent;
pub use graph::{AudioGraph, GraphSettings};
pub use node::{
    AudioNode, BusInput, BusRole, NodeId, NodeProperties, PrepareContext, ProcInfo,
    PropertyContext, SampleRate,
};
pub use status::{RtWarning, StatusReceiver};
