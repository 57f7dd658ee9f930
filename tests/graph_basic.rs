use bluestem::nodes::{ChannelMapNode, FunctionNode, SinNode, SummingNode};
use bluestem::AudioNode;

mod common;

use common::{expect_levels, render, setups};

const TOLERANCE: f32 = 1e-3;

#[test]
fn sine_identity() {
    for setup in setups() {
        let root = Box::new(SinNode::new(220.0));

        let result = render(root, 1, 5.0, &setup);
        expect_levels(&result.channels[0], 1.0, 0.707, TOLERANCE);
    }
}

#[test]
fn inverted_sine_cancels() {
    for setup in setups() {
        let nodes: Vec<Box<dyn AudioNode>> = vec![
            Box::new(SinNode::new(220.0)),
            Box::new(FunctionNode::new(Box::new(SinNode::new(220.0)), |s| -s)),
        ];
        let root = Box::new(SummingNode::new(nodes));

        let result = render(root, 1, 5.0, &setup);
        expect_levels(&result.channels[0], 0.0, 0.0, TOLERANCE);
    }
}

#[test]
fn octave_sum_scaled_by_half() {
    for setup in setups() {
        let nodes: Vec<Box<dyn AudioNode>> =
            vec![Box::new(SinNode::new(220.0)), Box::new(SinNode::new(440.0))];
        let sum = Box::new(SummingNode::new(nodes));
        let root = Box::new(FunctionNode::gain(sum, 0.5));

        let result = render(root, 1, 5.0, &setup);
        // Peak of (sin x + sin 2x) / 2 is 0.8801; the two partials carry
        // 0.25 of power each.
        expect_levels(&result.channels[0], 0.880, 0.5, TOLERANCE);
    }
}

#[test]
fn stereo_sine() {
    for setup in setups() {
        let root = Box::new(SinNode::with_channels(220.0, 2));

        let result = render(root, 2, 5.0, &setup);
        for channel in [0, 1] {
            expect_levels(&result.channels[channel], 1.0, 0.707, TOLERANCE);
        }
    }
}

#[test]
fn two_mono_sines_summed_to_stereo() {
    for setup in setups() {
        let left = Box::new(SinNode::new(220.0));
        let right =
            Box::new(ChannelMapNode::new(Box::new(SinNode::new(220.0)), vec![(0, 1)]));

        let root = Box::new(SummingNode::new(vec![
            left as Box<dyn AudioNode>,
            right as Box<dyn AudioNode>,
        ]));

        let result = render(root, 2, 5.0, &setup);
        for channel in [0, 1] {
            expect_levels(&result.channels[channel], 1.0, 0.707, TOLERANCE);
        }
    }
}

#[test]
fn stereo_sine_folded_to_mono() {
    for setup in setups() {
        // A stereo sine at 0.5 folded down to mono produces a unity mono sine.
        let stereo = Box::new(SinNode::with_channels(220.0, 2));
        let scaled = Box::new(FunctionNode::gain(stereo, 0.5));
        let root = Box::new(ChannelMapNode::new(scaled, vec![(0, 0), (1, 0)]));

        let result = render(root, 1, 5.0, &setup);
        expect_levels(&result.channels[0], 1.0, 0.707, TOLERANCE);
    }
}

#[test]
fn twin_mono_fold_down_cancels() {
    for setup in setups() {
        let left = Box::new(SinNode::new(220.0));
        let right = Box::new(ChannelMapNode::new(
            Box::new(FunctionNode::new(Box::new(SinNode::new(220.0)), |s| -s)),
            vec![(0, 1)],
        ));
        let stereo = Box::new(SummingNode::new(vec![
            left as Box<dyn AudioNode>,
            right as Box<dyn AudioNode>,
        ]));
        let root = Box::new(ChannelMapNode::new(stereo, vec![(0, 0), (1, 0)]));

        let result = render(root, 1, 5.0, &setup);
        expect_levels(&result.channels[0], 0.0, 0.0, TOLERANCE);
    }
}

#[test]
fn mono_sine_widened_to_six_channels() {
    for setup in setups() {
        let mono = Box::new(SinNode::new(220.0));
        let root = Box::new(ChannelMapNode::new(
            mono,
            vec![(0, 0), (0, 1), (0, 2), (0, 3), (0, 4), (0, 5)],
        ));

        let result = render(root, 6, 5.0, &setup);
        for channel in 0..6 {
            expect_levels(&result.channels[channel], 1.0, 0.707, TOLERANCE);
        }
    }
}
