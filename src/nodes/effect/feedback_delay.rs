//! One-block delay for closing feedback loops

use crate::node::{Node, ProcessContext, RenderIo};
use crate::port::PortLayout;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Signal {
    Audio(usize),
    Midi,
}

/// Passes its inputs through one block late.
///
/// The delay itself comes from the engine: connections into this node are
/// never part of the render order and always read the value written during
/// the previous block. That makes it the way to route a signal back to an
/// earlier node; a loop of direct audio or control connections is rejected.
pub struct FeedbackDelay {
    signal: Signal,
}

impl FeedbackDelay {
    /// Delay `channels` audio channels.
    pub fn audio(channels: usize) -> Self {
        Self {
            signal: Signal::Audio(channels),
        }
    }

    /// Delay a stream of MIDI events.
    pub fn midi() -> Self {
        Self { signal: Signal::Midi }
    }
}

impl Node for FeedbackDelay {
    type Message = ();

    fn ports(&self) -> PortLayout {
        match self.signal {
            Signal::Audio(channels) => PortLayout::new()
                .audio_inputs(channels)
                .audio_outputs(channels),
            Signal::Midi => PortLayout::new().midi_input().midi_output(),
        }
    }

    fn render(&mut self, _ctx: &ProcessContext, _messages: impl Iterator<Item = ()>, io: &mut RenderIo<'_>) {
        match self.signal {
            Signal::Audio(channels) => {
                for ch in 0..channels {
                    let input = io.audio_input(ch);
                    if let Some(out) = io.audio_output(ch) {
                        out.copy_from_slice(input);
                    }
                }
            }
            Signal::Midi => {
                let input = io.midi_input(0);
                if let Some(out) = io.midi_output(0) {
                    out.copy_from(input);
                }
            }
        }
    }

    fn is_feedback_delay(&self) -> bool {
        true
    }
}
