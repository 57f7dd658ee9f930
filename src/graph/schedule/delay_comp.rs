use smallvec::SmallVec;

use crate::buffer::NodeOutput;

/// A fixed-latency, multi-channel FIFO of audio frames.
///
/// Every block writes and reads the same number of frames, so after priming
/// with `delay` silent frames the fill level always returns to `delay` at
/// the end of a process call. Reads *add* into the destination rather than
/// overwrite: delay rings always feed slots that were zeroed at the start of
/// the block, which saves an intermediate copy.
pub(crate) struct DelayRing {
    channels: SmallVec<[Vec<f32>; 2]>,
    capacity: usize,
    read_pos: usize,
    write_pos: usize,
    ready: usize,
}

impl DelayRing {
    /// A ring delaying `delay` samples, able to absorb one block of up to
    /// `max_block_size` frames per call. Primed with `delay` silent frames.
    pub fn new(num_channels: usize, delay: u32, max_block_size: usize) -> Self {
        let capacity = delay as usize + max_block_size + 1;

        let mut ring = Self {
            channels: (0..num_channels).map(|_| vec![0.0; capacity]).collect(),
            capacity,
            read_pos: 0,
            write_pos: 0,
            ready: 0,
        };

        ring.write_silence(delay as usize);
        debug_assert_eq!(ring.ready_frames(), delay as usize);

        ring
    }

    /// The number of frames between the read and write positions.
    pub fn ready_frames(&self) -> usize {
        self.ready
    }

    /// Append `frames` of silence.
    pub fn write_silence(&mut self, frames: usize) {
        debug_assert!(self.ready + frames <= self.capacity);

        let first_len = frames.min(self.capacity - self.write_pos);
        let second_len = frames - first_len;

        for buf in self.channels.iter_mut() {
            buf[self.write_pos..self.write_pos + first_len].fill(0.0);
            buf[0..second_len].fill(0.0);
        }

        self.advance_write(frames);
    }

    /// Append `frames` from the matching channels of `input`. Channels the
    /// input does not have are written as silence.
    pub fn write(&mut self, input: &NodeOutput, frames: usize) {
        debug_assert!(self.ready + frames <= self.capacity);

        let first_len = frames.min(self.capacity - self.write_pos);
        let second_len = frames - first_len;

        for (ch, buf) in self.channels.iter_mut().enumerate() {
            if let Some(src) = input.audio(ch) {
                let src = src.borrow();
                buf[self.write_pos..self.write_pos + first_len].copy_from_slice(&src[0..first_len]);
                buf[0..second_len].copy_from_slice(&src[first_len..frames]);
            } else {
                buf[self.write_pos..self.write_pos + first_len].fill(0.0);
                buf[0..second_len].fill(0.0);
            }
        }

        self.advance_write(frames);
    }

    /// Consume `frames` from the head and add them into the matching
    /// channels of `output`. Ring channels beyond the output's channel count
    /// are consumed and dropped.
    pub fn read_adding(&mut self, output: &NodeOutput, frames: usize) {
        debug_assert!(self.ready >= frames);
        if self.ready < frames {
            // Underrun. The destination keeps its (silent) contents for this
            // block and the stream continues.
            return;
        }

        let first_len = frames.min(self.capacity - self.read_pos);
        let second_len = frames - first_len;

        for (ch, buf) in self.channels.iter().enumerate() {
            let Some(dst) = output.audio(ch) else {
                continue;
            };
            let mut dst = dst.borrow_mut();

            for i in 0..first_len {
                dst[i] += buf[self.read_pos + i];
            }
            for i in 0..second_len {
                dst[first_len + i] += buf[i];
            }
        }

        self.read_pos += frames;
        if self.read_pos >= self.capacity {
            self.read_pos -= self.capacity;
        }
        self.ready -= frames;
    }

    fn advance_write(&mut self, frames: usize) {
        self.write_pos += frames;
        if self.write_pos >= self.capacity {
            self.write_pos -= self.capacity;
        }
        self.ready += frames;
    }
}

/// The event counterpart of [`DelayRing`]: holds MIDI events back by a fixed
/// number of samples.
///
/// Incoming events are enqueued at `time + delay` relative to the current
/// block start; each read emits the events whose delayed time falls inside
/// the block and ages the remainder by the block length.
pub(crate) struct MidiDelayQueue {
    delay: u32,
    pending: Vec<crate::event::MidiEvent>,
}

impl MidiDelayQueue {
    pub fn new(delay: u32, capacity: usize) -> Self {
        Self { delay, pending: Vec::with_capacity(capacity) }
    }

    /// Enqueue all events of `input`, shifted by the configured delay.
    pub fn write_from(&mut self, input: &NodeOutput) {
        if let Some(events) = input.events() {
            for event in events.borrow().iter() {
                self.pending.push(event.with_time(event.time + self.delay));
            }
        }
    }

    /// Emit every pending event that falls inside the current block into
    /// `output` and age the rest by `frames`.
    pub fn read_into(&mut self, output: &NodeOutput, frames: usize) {
        let frames = frames as u32;

        // Pending events are in non-decreasing time order: leftovers from
        // previous blocks are always earlier than anything enqueued this
        // block, so the emittable events form a prefix.
        let emit = self.pending.partition_point(|e| e.time < frames);
        for event in self.pending.drain(0..emit) {
            output.push_event(event);
        }
        for event in self.pending.iter_mut() {
            event.time -= frames;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{DebugBufferID, DebugBufferType, SharedBuffer};
    use crate::event::MidiEvent;
    use smallvec::smallvec;

    fn audio_slot(coll: &basedrop::Handle, num_channels: usize, frames: usize) -> NodeOutput {
        let audio = (0..num_channels)
            .map(|i| {
                SharedBuffer::new(
                    frames,
                    DebugBufferID { index: i as u32, buffer_type: DebugBufferType::Audio32 },
                    coll,
                )
            })
            .collect();
        NodeOutput::new(audio, None)
    }

    fn event_slot(coll: &basedrop::Handle, capacity: usize) -> NodeOutput {
        let events = SharedBuffer::with_capacity(
            capacity,
            DebugBufferID { index: 0, buffer_type: DebugBufferType::Event },
            coll,
        );
        NodeOutput::new(smallvec![], Some(events))
    }

    #[test]
    fn ring_delays_by_configured_amount_across_uneven_blocks() {
        let collector = basedrop::Collector::new();
        let max_block = 8;
        let delay = 5u32;

        let input = audio_slot(&collector.handle(), 1, max_block);
        let output = audio_slot(&collector.handle(), 1, max_block);
        let mut ring = DelayRing::new(1, delay, max_block);

        let mut written: Vec<f32> = Vec::new();
        let mut read: Vec<f32> = Vec::new();

        let mut sample = 0.0f32;
        for &frames in &[3usize, 8, 1, 7, 8, 2, 5] {
            {
                let mut buf = input.audio(0).unwrap().borrow_mut();
                for s in buf[0..frames].iter_mut() {
                    *s = sample;
                    written.push(sample);
                    sample += 1.0;
                }
            }

            output.clear_audio(frames);
            ring.write(&input, frames);
            ring.read_adding(&output, frames);
            assert_eq!(ring.ready_frames(), delay as usize);

            let buf = output.audio(0).unwrap().borrow();
            read.extend_from_slice(&buf[0..frames]);
        }

        for (i, &value) in read.iter().enumerate() {
            let expected =
                if i < delay as usize { 0.0 } else { written[i - delay as usize] };
            assert_eq!(value, expected, "output frame {}", i);
        }
    }

    #[test]
    fn midi_queue_shifts_events_across_block_boundaries() {
        let collector = basedrop::Collector::new();

        let input = event_slot(&collector.handle(), 16);
        let output = event_slot(&collector.handle(), 16);
        let mut queue = MidiDelayQueue::new(10, 16);

        // Event at frame 6 of an 8-frame block: delayed time 16, which lands
        // at frame 0 of the block after next (8 + 8).
        input.push_event(MidiEvent::new(6, &[0x90, 60, 100]));

        queue.write_from(&input);
        queue.read_into(&output, 8);
        assert!(output.events().unwrap().borrow().is_empty());

        input.clear_events();
        queue.write_from(&input);
        queue.read_into(&output, 8);
        assert_eq!(output.events().unwrap().borrow().len(), 1);
        assert_eq!(output.events().unwrap().borrow()[0].time, 0);
        assert_eq!(output.events().unwrap().borrow()[0].bytes(), &[0x90, 60, 100]);
    }
}
