//! MIDI from any thread into the graph

use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::midi::MidiEvent;
use crate::node::{Node, ProcessContext, RenderIo};
use crate::port::PortLayout;

/// Sending end of a [`MidiBridge`]. Owned by whatever thread receives the
/// events (a network listener, a UI, a sequencer).
pub struct MidiBridgeSender {
    sender: Producer<MidiEvent>,
}

impl MidiBridgeSender {
    /// Queue an event for the next rendered block. Its `frame` is kept if it
    /// falls inside that block and moved to the last frame otherwise.
    ///
    /// Returns the event back if the queue is full.
    pub fn send(&mut self, event: MidiEvent) -> Result<(), MidiEvent> {
        self.sender.push(event).map_err(|PushError::Full(e)| e)
    }

    /// Free space in the queue.
    pub fn slots(&self) -> usize {
        self.sender.slots()
    }
}

/// Protocol-bridge node: merges events pushed through a [`MidiBridgeSender`]
/// into the MIDI passing through it.
///
/// The MIDI input is copied to the output first, then queued events are
/// inserted in frame order. Events that do not fit into the output buffer stay
/// queued for the next block.
pub struct MidiBridge {
    receiver: Consumer<MidiEvent>,
}

impl MidiBridge {
    /// A bridge and its sender, queueing up to `capacity` events.
    pub fn new(capacity: usize) -> (MidiBridge, MidiBridgeSender) {
        let (sender, receiver) = RingBuffer::new(capacity.max(1));
        (MidiBridge { receiver }, MidiBridgeSender { sender })
    }
}

impl Node for MidiBridge {
    type Message = ();

    fn ports(&self) -> PortLayout {
        PortLayout::new().midi_input().midi_output()
    }

    fn render(&mut self, _ctx: &ProcessContext, _messages: impl Iterator<Item = ()>, io: &mut RenderIo<'_>) {
        let last_frame = io.frames().saturating_sub(1) as u32;
        let input = io.midi_input(0);
        let Some(out) = io.midi_output(0) else {
            return;
        };
        out.copy_from(input);

        while let Ok(event) = self.receiver.peek() {
            if out.insert(event.at(event.frame.min(last_frame))).is_err() {
                break;
            }
            let _ = self.receiver.pop();
        }
    }
}
