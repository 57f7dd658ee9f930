use bluestem::nodes::{FunctionNode, LatencyNode, ReturnNode, SendNode, SinNode, SummingNode};
use bluestem::{AudioGraph, AudioNode, GraphSettings, SampleRate};
use log::LevelFilter;

const SAMPLE_RATE: f64 = 48_000.0;
const BLOCK_SIZE: usize = 512;
const SECONDS: f64 = 2.0;

fn main() {
    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!("[{}][{}] {}", record.target(), record.level(), message))
        })
        .level(LevelFilter::Debug)
        .chain(std::io::stdout())
        .apply()
        .unwrap();

    // Track 1: a sine through 480 samples of latency, attenuated, sent onto
    // bus 1 and then muted. Track 2: an attenuated sine plus the bus.
    let track1 = Box::new(SinNode::new(480.0));
    let track1 = Box::new(LatencyNode::new(track1, 480));
    let track1 = Box::new(FunctionNode::gain(track1, 0.5));
    let track1 = Box::new(SendNode::new(track1, 1));
    let track1 = Box::new(FunctionNode::new(track1, |_| 0.0));

    let track2 = Box::new(FunctionNode::gain(Box::new(SinNode::new(480.0)), 0.5));
    let track2 = Box::new(ReturnNode::new(track2, 1));

    let root = Box::new(SummingNode::new(vec![
        track1 as Box<dyn AudioNode>,
        track2 as Box<dyn AudioNode>,
    ]));

    let settings = GraphSettings {
        sample_rate: SampleRate::new(SAMPLE_RATE),
        max_block_size: BLOCK_SIZE,
        ..GraphSettings::default()
    };

    let (mut graph, _status) = AudioGraph::prepare(root, &settings).unwrap();

    log::info!(
        "prepared graph: {} nodes, {} output channel(s), {} samples of latency",
        graph.num_nodes(),
        graph.num_output_channels(),
        graph.latency(),
    );
    for warning in graph.warnings() {
        log::warn!("{}", warning);
    }

    let total_frames = (SECONDS * SAMPLE_RATE) as usize;
    let mut rendered = vec![0.0f32; total_frames];
    let mut midi_out = Vec::new();

    let mut position = 0;
    while position < total_frames {
        let frames = BLOCK_SIZE.min(total_frames - position);
        let mut channel = &mut rendered[position..position + frames];
        graph.process(frames, std::slice::from_mut(&mut channel), &mut midi_out);
        position += frames;
    }

    let peak = rendered.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    let power: f64 = rendered.iter().map(|s| f64::from(s * s)).sum();
    let rms = (power / rendered.len() as f64).sqrt();

    log::info!("rendered {:.1}s: peak {:.3}, rms {:.3}", SECONDS, peak, rms);
}
