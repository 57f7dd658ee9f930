/// A single timestamped MIDI message.
///
/// `time` is the sample offset of the event within the current block. Nodes
/// that delay or merge event streams keep the offsets in non-decreasing
/// order within a block.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    /// Sample offset within the current block.
    pub time: u32,

    data: [u8; 3],
    len: u8,
}

impl MidiEvent {
    /// Create an event from up to 3 raw MIDI bytes.
    ///
    /// Longer messages (sysex) are truncated; the graph core only routes
    /// events, it never interprets them.
    pub fn new(time: u32, bytes: &[u8]) -> Self {
        let mut data = [0; 3];
        let len = bytes.len().min(3);
        data[..len].copy_from_slice(&bytes[..len]);

        Self { time, data, len: len as u8 }
    }

    /// The raw bytes of this message.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..usize::from(self.len)]
    }

    /// The same message stamped with a different block offset.
    pub fn with_time(mut self, time: u32) -> Self {
        self.time = time;
        self
    }
}

impl std::fmt::Debug for MidiEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MidiEvent(t={}, {:02x?})", self.time, self.bytes())
    }
}
