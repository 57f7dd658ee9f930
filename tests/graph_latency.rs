use bluestem::nodes::{FunctionNode, LatencyNode, SinNode, SummingNode};
use bluestem::AudioNode;

mod common;

use common::{expect_split_levels, render, setups, TestSetup};

const TOLERANCE: f32 = 1e-3;

/// The frequency and half-period delay used by the cancellation scenarios:
/// `sr / 100` Hz gives exactly 100 samples per cycle at any rate, so half a
/// period is exactly 50 samples.
fn half_period_setup(setup: &TestSetup) -> (f32, u32) {
    let freq = setup.sample_rate / 100.0;
    let samples_per_cycle = setup.sample_rate / freq;
    let latency = (samples_per_cycle / 2.0).round() as u32;
    (freq as f32, latency)
}

#[test]
fn uncompensated_sum_of_delayed_sine_cancels() {
    for setup in setups() {
        let (freq, latency) = half_period_setup(&setup);

        let nodes: Vec<Box<dyn AudioNode>> = vec![
            Box::new(SinNode::new(freq)),
            Box::new(LatencyNode::new(Box::new(SinNode::new(freq)), latency)),
        ];
        let root = Box::new(SummingNode::uncompensated(nodes));

        let result = render(root, 1, 5.0, &setup);

        // The live sine plays alone for half a period, then its delayed,
        // phase-inverted copy arrives and cancels it.
        expect_split_levels(
            &result.channels[0],
            latency as usize,
            1.0,
            0.707,
            0.0,
            0.0,
            TOLERANCE,
        );
    }
}

#[test]
fn compensated_sum_of_delayed_sine_doubles() {
    for setup in setups() {
        let (freq, latency) = half_period_setup(&setup);

        let nodes: Vec<Box<dyn AudioNode>> = vec![
            Box::new(FunctionNode::gain(Box::new(SinNode::new(freq)), 0.5)),
            Box::new(LatencyNode::new(
                Box::new(FunctionNode::gain(Box::new(SinNode::new(freq)), 0.5)),
                latency,
            )),
        ];
        let root = Box::new(SummingNode::new(nodes));

        let result = render(root, 1, 5.0, &setup);
        assert_eq!(result.latency, latency);

        // The undelayed branch is held back to match, so instead of
        // cancelling the two halves now interfere constructively.
        expect_split_levels(
            &result.channels[0],
            latency as usize,
            0.0,
            0.0,
            1.0,
            0.707,
            TOLERANCE,
        );
    }
}

#[test]
fn latency_node_shifts_the_stream_exactly() {
    for setup in setups() {
        let delay = 37u32;

        let plain = render(Box::new(SinNode::new(220.0)), 1, 1.0, &setup);
        let delayed = render(
            Box::new(LatencyNode::new(Box::new(SinNode::new(220.0)), delay)),
            1,
            1.0,
            &setup,
        );

        assert_eq!(delayed.latency, delay);

        let plain = &plain.channels[0];
        let delayed = &delayed.channels[0];
        for i in 0..delayed.len() {
            let expected = if i < delay as usize { 0.0 } else { plain[i - delay as usize] };
            assert_eq!(delayed[i], expected, "sample {}", i);
        }
    }
}

#[test]
fn zero_delay_latency_node_is_a_copy() {
    for setup in setups() {
        let plain = render(Box::new(SinNode::new(220.0)), 1, 1.0, &setup);
        let copied = render(
            Box::new(LatencyNode::new(Box::new(SinNode::new(220.0)), 0)),
            1,
            1.0,
            &setup,
        );

        assert_eq!(copied.latency, 0);
        assert_eq!(plain.channels[0], copied.channels[0]);
    }
}

#[test]
fn chained_latency_accumulates() {
    let setup = TestSetup { sample_rate: 44_100.0, block_size: 256, randomize_blocks: false };

    let inner = Box::new(LatencyNode::new(Box::new(SinNode::new(220.0)), 30));
    let root = Box::new(LatencyNode::new(inner, 12));

    let result = render(root, 1, 1.0, &setup);
    assert_eq!(result.latency, 42);

    let plain = render(Box::new(SinNode::new(220.0)), 1, 1.0, &setup);
    for i in 0..result.channels[0].len() {
        let expected = if i < 42 { 0.0 } else { plain.channels[0][i - 42] };
        assert_eq!(result.channels[0][i], expected, "sample {}", i);
    }
}
