use crate::node::NodeId;

/// A condition the realtime path degraded around instead of surfacing.
///
/// The audio thread never logs or returns errors; it latches one of these
/// onto a wait-free channel and produces silence (or drops events) for the
/// offending block. The embedder polls the [`StatusReceiver`] from a
/// non-realtime thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtWarning {
    /// `process` was called with more frames than the prepared maximum. The
    /// block was not processed and the output is silent.
    FrameCountExceedsMax { requested: usize, max: usize },

    /// A node pushed more events in one block than the prepared capacity,
    /// forcing the event buffer to grow on the audio thread.
    EventOverflow { node: NodeId },

    /// A full sweep over the schedule processed no node. This cannot happen
    /// on a verified schedule; the block is abandoned as silence.
    ScheduleStall,
}

/// The receiving end of the realtime status channel.
pub struct StatusReceiver {
    rx: rtrb::Consumer<RtWarning>,
}

impl StatusReceiver {
    /// Pop the next latched warning, if any. Non-blocking.
    pub fn poll(&mut self) -> Option<RtWarning> {
        self.rx.pop().ok()
    }
}

pub(crate) struct StatusSender {
    tx: rtrb::Producer<RtWarning>,
}

impl StatusSender {
    /// Push a warning. If the channel is full the warning is dropped; the
    /// audio thread never waits.
    pub fn push(&mut self, warning: RtWarning) {
        let _ = self.tx.push(warning);
    }
}

pub(crate) fn status_channel(capacity: usize) -> (StatusSender, StatusReceiver) {
    let (tx, rx) = rtrb::RingBuffer::new(capacity);
    (StatusSender { tx }, StatusReceiver { rx })
}
