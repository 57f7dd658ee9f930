use std::mem::ManuallyDrop;

use crate::error::{GraphWarning, PrepareError};
use crate::event::MidiEvent;
use crate::node::{AudioNode, NodeProperties, ProcInfo, SampleRate};
use crate::status::{status_channel, RtWarning, StatusReceiver};

pub(crate) mod compiler;
pub(crate) mod registry;
pub(crate) mod schedule;
pub(crate) mod verifier;

use compiler::compile_graph;
use schedule::ProcessorSchedule;

/// The settings a graph is prepared with.
#[derive(Debug, Clone, Copy)]
pub struct GraphSettings {
    /// The sample rate of the stream.
    ///
    /// Default is `44100.0`.
    pub sample_rate: SampleRate,

    /// The maximum number of frames (samples in a single audio channel)
    /// that can be in a single process cycle.
    ///
    /// Default is `1024`.
    pub max_block_size: usize,

    /// The pre-allocated capacity of every event buffer in the graph.
    ///
    /// Default is `256`.
    pub event_capacity: usize,

    /// The pre-allocated capacity of the realtime status channel.
    ///
    /// Default is `256`.
    pub status_capacity: usize,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            sample_rate: SampleRate::default(),
            max_block_size: 1024,
            event_capacity: 256,
            status_capacity: 256,
        }
    }
}

/// A prepared, immutable audio processing graph.
///
/// Construct the node tree bottom-up, hand the root to [`AudioGraph::prepare`],
/// then call [`AudioGraph::process`] once per block from the driver. The
/// graph cannot be mutated between preparation and teardown; dropping it
/// releases every slot through the graph's own collector.
pub struct AudioGraph {
    schedule: ManuallyDrop<ProcessorSchedule>,
    properties: NodeProperties,
    warnings: Vec<GraphWarning>,
    settings: GraphSettings,
    steady_time: i64,
    collector: basedrop::Collector,
}

impl AudioGraph {
    /// Prepare `root` and its upstream tree for processing.
    ///
    /// Walks the graph, checks acyclicity (send/return edges included),
    /// derives every node's properties, installs compensating delays where
    /// branches of unequal latency converge, and allocates all buffers.
    /// Returns the prepared graph together with the receiving end of the
    /// realtime status channel.
    pub fn prepare(
        root: Box<dyn AudioNode>,
        settings: &GraphSettings,
    ) -> Result<(AudioGraph, StatusReceiver), PrepareError> {
        if settings.max_block_size == 0 {
            return Err(PrepareError::InvalidSettings { reason: "max_block_size must not be 0" });
        }
        if !(settings.sample_rate.as_f64() > 0.0) {
            return Err(PrepareError::InvalidSettings { reason: "sample rate must be positive" });
        }

        let mut collector = basedrop::Collector::new();
        let (status_tx, status_rx) = status_channel(settings.status_capacity.max(16));

        let compiled = match compile_graph(root, settings, &collector.handle(), status_tx) {
            Ok(compiled) => compiled,
            Err(e) => {
                // Anything allocated before the failure was already dropped;
                // sweep it so a failed preparation leaves nothing behind.
                collector.collect();
                return Err(e);
            }
        };

        let graph = AudioGraph {
            schedule: ManuallyDrop::new(compiled.schedule),
            properties: compiled.root_properties,
            warnings: compiled.warnings,
            settings: *settings,
            steady_time: 0,
            collector,
        };

        Ok((graph, status_rx))
    }

    /// The root node's derived properties.
    pub fn properties(&self) -> &NodeProperties {
        &self.properties
    }

    /// The total latency of the graph in samples.
    pub fn latency(&self) -> u32 {
        self.properties.latency
    }

    /// The number of audio channels the root produces.
    pub fn num_output_channels(&self) -> usize {
        self.properties.num_channels
    }

    /// Non-fatal conditions noticed during preparation.
    pub fn warnings(&self) -> &[GraphWarning] {
        &self.warnings
    }

    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    pub fn num_nodes(&self) -> usize {
        self.schedule.num_nodes()
    }

    /// Process one block of `frames <= max_block_size` frames.
    ///
    /// The root's audio is copied into `audio_out` (non-interleaved, one
    /// slice per channel; channels the root does not produce are filled with
    /// silence) and the root's events are appended to `midi_out` with
    /// block-relative sample offsets.
    pub fn process(
        &mut self,
        frames: usize,
        audio_out: &mut [&mut [f32]],
        midi_out: &mut Vec<MidiEvent>,
    ) {
        if frames == 0 {
            return;
        }

        if frames > self.settings.max_block_size {
            debug_assert!(false, "process() called with more frames than the prepared maximum");
            self.schedule.push_warning(RtWarning::FrameCountExceedsMax {
                requested: frames,
                max: self.settings.max_block_size,
            });
            for channel in audio_out.iter_mut() {
                channel.fill(0.0);
            }
            return;
        }

        let proc_info = ProcInfo {
            steady_time: self.steady_time,
            frames,
            sample_rate: self.settings.sample_rate,
        };

        self.schedule.process_block(&proc_info);

        let root = self.schedule.root_output();
        for (ch, channel) in audio_out.iter_mut().enumerate() {
            let len = frames.min(channel.len());
            match root.audio(ch) {
                Some(src) => channel[0..len].copy_from_slice(&src.borrow()[0..len]),
                None => channel[0..len].fill(0.0),
            }
        }

        if let Some(events) = root.events() {
            midi_out.extend_from_slice(&events.borrow());
        }

        self.steady_time += frames as i64;
    }

    /// Process an arbitrary span of interleaved output, split internally
    /// into blocks of at most `max_block_size` frames.
    ///
    /// Event offsets in `midi_out` are relative to the start of the span.
    pub fn process_interleaved(
        &mut self,
        audio_out: &mut [f32],
        num_channels: usize,
        midi_out: &mut Vec<MidiEvent>,
    ) {
        if num_channels == 0 {
            return;
        }

        let total_frames = audio_out.len() / num_channels;
        let mut processed_frames = 0;

        while processed_frames < total_frames {
            let frames = (total_frames - processed_frames).min(self.settings.max_block_size);

            let proc_info = ProcInfo {
                steady_time: self.steady_time,
                frames,
                sample_rate: self.settings.sample_rate,
            };

            self.schedule.process_block(&proc_info);

            let root = self.schedule.root_output();
            for ch in 0..num_channels {
                match root.audio(ch) {
                    Some(src) => {
                        let src = src.borrow();
                        for i in 0..frames {
                            audio_out[((processed_frames + i) * num_channels) + ch] = src[i];
                        }
                    }
                    None => {
                        for i in 0..frames {
                            audio_out[((processed_frames + i) * num_channels) + ch] = 0.0;
                        }
                    }
                }
            }

            if let Some(events) = root.events() {
                for event in events.borrow().iter() {
                    midi_out.push(event.with_time(event.time + processed_frames as u32));
                }
            }

            self.steady_time += frames as i64;
            processed_frames += frames;
        }
    }
}

impl Drop for AudioGraph {
    fn drop(&mut self) {
        // Drop the schedule (and with it the last handle to every buffer)
        // before the collector sweeps, so release leaves nothing behind.
        // Safe: the schedule is never touched again after this.
        unsafe { ManuallyDrop::drop(&mut self.schedule) };
        self.collector.collect();
    }
}

impl std::fmt::Debug for AudioGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(&*self.schedule, f)
    }
}
