use crate::buffer::NodeOutput;
use crate::event::MidiEvent;
use crate::node::{AudioNode, NodeProperties, PrepareContext, ProcInfo, PropertyContext};

struct SequencedEvent {
    /// Absolute sample time, resolved from seconds at preparation.
    time: u64,
    bytes: [u8; 3],
}

/// Plays back a fixed, time-stamped MIDI sequence.
///
/// Event times are given in seconds at construction and resolved to absolute
/// sample positions once the sample rate is known.
pub struct MidiSequenceNode {
    sequence_seconds: Vec<(f64, [u8; 3])>,

    sequence: Vec<SequencedEvent>,
    cursor: usize,
}

impl MidiSequenceNode {
    pub fn new(sequence: impl IntoIterator<Item = (f64, [u8; 3])>) -> Self {
        let mut sequence_seconds: Vec<(f64, [u8; 3])> = sequence.into_iter().collect();
        sequence_seconds.sort_by(|a, b| a.0.total_cmp(&b.0));

        Self { sequence_seconds, sequence: Vec::new(), cursor: 0 }
    }
}

impl AudioNode for MidiSequenceNode {
    fn name(&self) -> &'static str {
        "midi-sequence"
    }

    fn properties(&self, _upstreams: &[NodeProperties], _cx: &PropertyContext) -> NodeProperties {
        NodeProperties { num_channels: 0, has_audio: false, has_midi: true, latency: 0 }
    }

    fn prepare(&mut self, cx: &PrepareContext) {
        let sample_rate = cx.sample_rate.as_f64();

        self.sequence = self
            .sequence_seconds
            .iter()
            .map(|&(seconds, bytes)| SequencedEvent {
                time: (seconds * sample_rate).round() as u64,
                bytes,
            })
            .collect();
        self.cursor = 0;
    }

    fn process(&mut self, proc_info: &ProcInfo, output: &NodeOutput) {
        output.clear_events();

        let block_start = proc_info.steady_time as u64;
        let block_end = block_start + proc_info.frames as u64;

        while let Some(event) = self.sequence.get(self.cursor) {
            if event.time >= block_end {
                break;
            }
            if event.time >= block_start {
                output.push_event(MidiEvent::new(
                    (event.time - block_start) as u32,
                    &event.bytes,
                ));
            }
            self.cursor += 1;
        }
    }
}
