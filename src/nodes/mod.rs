mod channel_map;
mod function;
mod latency;
mod midi;
mod send_return;
mod silence;
mod sine;
mod summing;

pub use channel_map::ChannelMapNode;
pub use function::FunctionNode;
pub use latency::LatencyNode;
pub use midi::MidiSequenceNode;
pub use send_return::{ReturnNode, SendNode};
pub use silence::SilenceNode;
pub use sine::SinNode;
pub use summing::SummingNode;
