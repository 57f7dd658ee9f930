#![allow(dead_code)]

use bluestem::{AudioGraph, AudioNode, GraphSettings, GraphWarning, MidiEvent, SampleRate};

/// One cell of the test matrix: a sample rate, a block size, and whether the
/// driver feeds the graph evenly-sized or randomly-sized blocks.
#[derive(Debug, Clone, Copy)]
pub struct TestSetup {
    pub sample_rate: f64,
    pub block_size: usize,
    pub randomize_blocks: bool,
}

/// The full matrix every scenario runs against.
pub fn setups() -> Vec<TestSetup> {
    let mut setups = Vec::new();
    for sample_rate in [44_100.0, 48_000.0] {
        for block_size in [64, 256, 512, 1024] {
            for randomize_blocks in [false, true] {
                setups.push(TestSetup { sample_rate, block_size, randomize_blocks });
            }
        }
    }
    setups
}

pub struct RenderResult {
    pub channels: Vec<Vec<f32>>,
    /// Root events with absolute sample times.
    pub events: Vec<(u64, MidiEvent)>,
    pub latency: u32,
    pub warnings: Vec<GraphWarning>,
}

/// Drive a graph offline for `seconds`, block by block, collecting the
/// root's audio and events.
pub fn render(
    root: Box<dyn AudioNode>,
    num_channels: usize,
    seconds: f64,
    setup: &TestSetup,
) -> RenderResult {
    let settings = GraphSettings {
        sample_rate: SampleRate::new(setup.sample_rate),
        max_block_size: setup.block_size,
        ..GraphSettings::default()
    };

    let (mut graph, _status) =
        AudioGraph::prepare(root, &settings).expect("graph preparation failed");

    let latency = graph.latency();
    let warnings = graph.warnings().to_vec();

    let total_frames = (seconds * setup.sample_rate).round() as usize;
    let mut channels = vec![vec![0.0f32; total_frames]; num_channels];
    let mut events: Vec<(u64, MidiEvent)> = Vec::new();
    let mut block_events: Vec<MidiEvent> = Vec::new();

    let mut rng = XorShift::new(0x5eed ^ setup.block_size as u64);
    let mut position = 0;

    while position < total_frames {
        let frames = if setup.randomize_blocks {
            1 + rng.next() as usize % setup.block_size
        } else {
            setup.block_size
        }
        .min(total_frames - position);

        let mut slices: Vec<&mut [f32]> =
            channels.iter_mut().map(|ch| &mut ch[position..position + frames]).collect();

        block_events.clear();
        graph.process(frames, &mut slices, &mut block_events);

        for event in block_events.iter() {
            events.push((position as u64 + u64::from(event.time), *event));
        }
        position += frames;
    }

    RenderResult { channels, events, latency, warnings }
}

pub fn magnitude(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|s| f64::from(s * s)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// Assert peak and RMS level over a span of samples.
pub fn expect_levels(samples: &[f32], expected_magnitude: f32, expected_rms: f32, tolerance: f32) {
    let m = magnitude(samples);
    let r = rms(samples);
    assert!(
        (m - expected_magnitude).abs() <= tolerance,
        "magnitude {} is not within {} of {}",
        m,
        tolerance,
        expected_magnitude
    );
    assert!(
        (r - expected_rms).abs() <= tolerance,
        "rms {} is not within {} of {}",
        r,
        tolerance,
        expected_rms
    );
}

/// Assert levels separately before and after a split point (the point where
/// latency kicks in).
pub fn expect_split_levels(
    samples: &[f32],
    split: usize,
    expected_magnitude_1: f32,
    expected_rms_1: f32,
    expected_magnitude_2: f32,
    expected_rms_2: f32,
    tolerance: f32,
) {
    expect_levels(&samples[..split], expected_magnitude_1, expected_rms_1, tolerance);
    expect_levels(&samples[split..], expected_magnitude_2, expected_rms_2, tolerance);
}

/// A deterministic test MIDI sequence: note-ons spread over `seconds`.
pub fn note_sequence(seconds: f64) -> Vec<(f64, [u8; 3])> {
    let mut sequence = Vec::new();
    let mut t = 0.05;
    let mut key = 36u8;
    while t < seconds - 0.1 {
        sequence.push((t, [0x90, key, 100]));
        t += 0.123;
        key = 36 + (key + 7) % 48;
    }
    sequence
}

/// The absolute sample times a sequence should come out at after `delay`
/// samples of latency.
pub fn expected_event_times(
    sequence: &[(f64, [u8; 3])],
    sample_rate: f64,
    delay: u64,
) -> Vec<(u64, [u8; 3])> {
    sequence
        .iter()
        .map(|&(seconds, bytes)| ((seconds * sample_rate).round() as u64 + delay, bytes))
        .collect()
}

/// Assert that the rendered events match `expected` exactly (times and
/// bytes).
pub fn expect_events(rendered: &[(u64, MidiEvent)], expected: &[(u64, [u8; 3])]) {
    assert_eq!(
        rendered.len(),
        expected.len(),
        "event count mismatch: rendered {:?}, expected {:?}",
        rendered,
        expected
    );
    for ((time, event), (expected_time, expected_bytes)) in rendered.iter().zip(expected.iter()) {
        assert_eq!(time, expected_time, "event time mismatch for {:?}", event);
        assert_eq!(event.bytes(), &expected_bytes[..], "event bytes mismatch at {}", time);
    }
}

struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self {
        Self(seed | 1)
    }

    fn next(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        (x >> 32) as u32
    }
}
