use atomic_refcell::{AtomicRef, AtomicRefCell, AtomicRefMut};
use basedrop::Shared;
use smallvec::SmallVec;
use std::fmt::{Debug, Formatter};

use crate::event::MidiEvent;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum DebugBufferType {
    Audio32,
    Event,
}

impl Debug for DebugBufferType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DebugBufferType::Audio32 => f.write_str("f32"),
            DebugBufferType::Event => f.write_str("event"),
        }
    }
}

/// Used for debugging and verifying purposes.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct DebugBufferID {
    pub index: u32,
    pub buffer_type: DebugBufferType,
}

impl Debug for DebugBufferID {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}({})", self.buffer_type, self.index)
    }
}

struct Buffer<T: Clone + Copy + Send + Sync + 'static> {
    data: AtomicRefCell<Vec<T>>,
    debug_info: DebugBufferID,
}

/// A reference-counted buffer shared between the schedule and the nodes that
/// read from it.
///
/// All of a buffer's capacity is allocated during graph preparation. The
/// `basedrop` collector owned by the graph deallocates it once every handle
/// is gone, so dropping a schedule never frees memory on the audio thread.
pub struct SharedBuffer<T: Clone + Copy + Send + Sync + 'static> {
    buffer: Shared<Buffer<T>>,
}

impl<T: Clone + Copy + Send + Sync + 'static> SharedBuffer<T> {
    pub(crate) fn with_capacity(
        capacity: usize,
        debug_info: DebugBufferID,
        coll_handle: &basedrop::Handle,
    ) -> Self {
        Self {
            buffer: Shared::new(
                coll_handle,
                Buffer { data: AtomicRefCell::new(Vec::with_capacity(capacity)), debug_info },
            ),
        }
    }

    #[inline]
    pub fn borrow(&self) -> AtomicRef<'_, Vec<T>> {
        self.buffer.data.borrow()
    }

    #[inline]
    pub fn borrow_mut(&self) -> AtomicRefMut<'_, Vec<T>> {
        self.buffer.data.borrow_mut()
    }

    #[inline]
    pub fn id(&self) -> DebugBufferID {
        self.buffer.debug_info
    }

    pub fn truncate(&self) {
        self.borrow_mut().truncate(0)
    }
}

impl<T: Clone + Copy + Send + Sync + 'static + Default> SharedBuffer<T> {
    pub(crate) fn new(
        max_frames: usize,
        debug_info: DebugBufferID,
        coll_handle: &basedrop::Handle,
    ) -> Self {
        Self {
            buffer: Shared::new(
                coll_handle,
                Buffer {
                    data: AtomicRefCell::new(vec![T::default(); max_frames]),
                    debug_info,
                },
            ),
        }
    }
}

impl<T: Clone + Copy + Send + Sync + 'static> Clone for SharedBuffer<T> {
    fn clone(&self) -> Self {
        Self { buffer: Shared::clone(&self.buffer) }
    }
}

impl<T: Clone + Copy + Send + Sync + 'static> Debug for SharedBuffer<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.buffer.debug_info.fmt(f)
    }
}

/// A node's reusable output slot: one buffer per audio channel plus an event
/// buffer when the node carries MIDI.
///
/// The slot is allocated during preparation and exclusively owned by the
/// schedule entry of the node it belongs to. Consumers hold cloned handles
/// and only ever borrow the contents read-only during their own process
/// call; the owning node is the only writer.
pub struct NodeOutput {
    audio: SmallVec<[SharedBuffer<f32>; 2]>,
    events: Option<SharedBuffer<MidiEvent>>,
}

impl NodeOutput {
    pub(crate) fn new(
        audio: SmallVec<[SharedBuffer<f32>; 2]>,
        events: Option<SharedBuffer<MidiEvent>>,
    ) -> Self {
        Self { audio, events }
    }

    /// The number of audio channels in this slot.
    pub fn num_channels(&self) -> usize {
        self.audio.len()
    }

    /// Borrow handle to one audio channel.
    pub fn audio(&self, channel: usize) -> Option<&SharedBuffer<f32>> {
        self.audio.get(channel)
    }

    /// The event buffer, if this node carries MIDI.
    pub fn events(&self) -> Option<&SharedBuffer<MidiEvent>> {
        self.events.as_ref()
    }

    /// Fill the first `frames` of every channel with silence.
    pub fn clear_audio(&self, frames: usize) {
        for buf in self.audio.iter() {
            let mut buf = buf.borrow_mut();
            let frames = frames.min(buf.len());
            buf[0..frames].fill(0.0);
        }
    }

    /// Empty the event buffer.
    pub fn clear_events(&self) {
        if let Some(events) = &self.events {
            events.truncate();
        }
    }

    /// Copy `frames` from the matching channels of `src`.
    ///
    /// Channels present here but not in `src` are untouched (callers clear
    /// first), channels present in `src` but not here are dropped.
    pub fn copy_audio_from(&self, src: &NodeOutput, frames: usize) {
        for (dst, src) in self.audio.iter().zip(src.audio.iter()) {
            let src = src.borrow();
            let mut dst = dst.borrow_mut();
            let frames = frames.min(src.len()).min(dst.len());
            dst[0..frames].copy_from_slice(&src[0..frames]);
        }
    }

    /// Add `frames` from the matching channels of `src` into this slot.
    pub fn add_audio_from(&self, src: &NodeOutput, frames: usize) {
        for (dst, src) in self.audio.iter().zip(src.audio.iter()) {
            let src = src.borrow();
            let mut dst = dst.borrow_mut();
            let frames = frames.min(src.len()).min(dst.len());
            for i in 0..frames {
                dst[i] += src[i];
            }
        }
    }

    /// Scale the first `frames` of every channel.
    pub fn apply_gain(&self, gain: f32, frames: usize) {
        for buf in self.audio.iter() {
            let mut buf = buf.borrow_mut();
            let frames = frames.min(buf.len());
            for s in buf[0..frames].iter_mut() {
                *s *= gain;
            }
        }
    }

    /// Peak absolute sample value of one channel over `frames`.
    pub fn magnitude(&self, channel: usize, frames: usize) -> f32 {
        self.audio.get(channel).map_or(0.0, |buf| {
            let buf = buf.borrow();
            buf[0..frames.min(buf.len())].iter().fold(0.0f32, |m, s| m.max(s.abs()))
        })
    }

    /// Root-mean-square level of one channel over `frames`.
    pub fn rms(&self, channel: usize, frames: usize) -> f32 {
        self.audio.get(channel).map_or(0.0, |buf| {
            let buf = buf.borrow();
            let frames = frames.min(buf.len());
            if frames == 0 {
                return 0.0;
            }
            // Accumulate in f64; f32 drifts over long spans.
            let sum: f64 = buf[0..frames].iter().map(|s| f64::from(s * s)).sum();
            (sum / frames as f64).sqrt() as f32
        })
    }

    /// Append one event. Keeping the buffer in time order is the caller's
    /// responsibility.
    pub fn push_event(&self, event: MidiEvent) {
        if let Some(events) = &self.events {
            events.borrow_mut().push(event);
        }
    }

    /// Append all of `src`'s events.
    pub fn extend_events_from(&self, src: &NodeOutput) {
        if let (Some(dst), Some(src)) = (&self.events, &src.events) {
            dst.borrow_mut().extend_from_slice(&src.borrow());
        }
    }

    /// Restore non-decreasing time order after merging several streams.
    pub fn sort_events(&self) {
        if let Some(events) = &self.events {
            events.borrow_mut().sort_unstable_by_key(|e| e.time);
        }
    }

    pub(crate) fn debug_ids(&self) -> SmallVec<[DebugBufferID; 4]> {
        let mut ids: SmallVec<[DebugBufferID; 4]> =
            self.audio.iter().map(|b| b.id()).collect();
        if let Some(events) = &self.events {
            ids.push(events.id());
        }
        ids
    }
}

impl Clone for NodeOutput {
    fn clone(&self) -> Self {
        Self { audio: self.audio.clone(), events: self.events.clone() }
    }
}

impl Debug for NodeOutput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.debug_ids()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(coll: &basedrop::Handle, num_channels: usize, frames: usize) -> NodeOutput {
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

    #[test]
    fn block_primitives() {
        let collector = basedrop::Collector::new();
        let a = slot(&collector.handle(), 2, 8);
        let b = slot(&collector.handle(), 2, 8);

        for ch in 0..2 {
            let buf = a.audio(ch).unwrap();
            for (i, s) in buf.borrow_mut().iter_mut().enumerate() {
                *s = (i + 1) as f32;
            }
        }

        b.clear_audio(8);
        b.copy_audio_from(&a, 8);
        b.add_audio_from(&a, 8);
        b.apply_gain(0.5, 8);

        // (i + 1) * 2 * 0.5 == i + 1 again.
        assert_eq!(b.audio(0).unwrap().borrow()[3], 4.0);
        assert_eq!(b.magnitude(0, 8), 8.0);

        let expected_rms = ((1..=8).map(|i| (i * i) as f64).sum::<f64>() / 8.0).sqrt() as f32;
        assert!((b.rms(1, 8) - expected_rms).abs() < 1e-6);

        b.clear_audio(8);
        assert_eq!(b.magnitude(0, 8), 0.0);
        assert_eq!(b.rms(0, 8), 0.0);
    }
}
