//! Core node trait and context types.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::midi::MidiBuffer;
use crate::port::{PortKind, PortLayout};
use crate::sequence::Routes;

/// Information available during audio processing.
///
/// Passed to every [`Node::render`] call.
#[derive(Clone, Copy, Debug)]
pub struct ProcessContext {
    /// Sample rate of the graph in Hz (e.g., 44100, 48000)
    pub sample_rate: u32,
    /// Number of frames in the block being rendered. Never larger than the
    /// `max_block_size` the node was prepared with.
    pub buffer_size: usize,
}

/// Everything a node may size itself for, handed to [`Node::prepare`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PrepareContext {
    pub sample_rate: u32,
    pub max_block_size: usize,
    /// Capacity of every MIDI buffer the node will be handed.
    pub midi_capacity: usize,
}

/// Returned by [`Node::prepare`] when a node cannot run with the given context.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PrepareError {
    reason: String,
}

impl PrepareError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub(crate) fn into_reason(self) -> String {
        self.reason
    }
}

impl fmt::Display for PrepareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Unique identifier for a node within a graph.
///
/// Ids are handed out in increasing order and never reused, so the lowest id
/// is always the oldest node. The builder relies on that to break ties.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The core trait for graph nodes.
///
/// Implement this trait to create custom nodes. Nodes can be:
/// - **Sources**: generate signal or events (no inputs) - oscillators, bridges
/// - **Effects**: process inputs into outputs - gain, mixers
/// - **Sinks**: consume inputs only - meters, recorders
///
/// # Threading
///
/// [`ports`](Self::ports), [`prepare`](Self::prepare) and
/// [`release`](Self::release) run on the control thread while the node is not
/// part of any published render sequence. [`render`](Self::render) runs on the
/// audio thread and must not allocate, lock or block.
///
/// # Message-Based Parameters
///
/// Instead of shared mutable state, nodes receive parameter updates via
/// messages sent through a [`Handle`](crate::Handle). Handle them at the start
/// of `render()`:
///
/// ```
/// use klingt_graph::{Node, PortLayout, ProcessContext, RenderIo};
///
/// enum ToneMessage {
///     SetLevel(f32),
/// }
///
/// struct Tone {
///     level: f32,
/// }
///
/// impl Node for Tone {
///     type Message = ToneMessage;
///
///     fn ports(&self) -> PortLayout {
///         PortLayout::new().audio_outputs(1)
///     }
///
///     fn render(
///         &mut self,
///         _ctx: &ProcessContext,
///         messages: impl Iterator<Item = ToneMessage>,
///         io: &mut RenderIo<'_>,
///     ) {
///         for msg in messages {
///             match msg {
///                 ToneMessage::SetLevel(l) => self.level = l,
///             }
///         }
///         if let Some(out) = io.audio_output(0) {
///             out.fill(self.level);
///         }
///     }
/// }
/// ```
pub trait Node: Send + 'static {
    /// Message type for parameter updates.
    ///
    /// Use a custom enum for nodes with parameters, or `()` for nodes without.
    type Message: Send + 'static;

    /// The port layout. Read when the node is added and after every successful
    /// [`prepare`](Self::prepare).
    fn ports(&self) -> PortLayout;

    /// Allocate whatever `render` needs for the given rate and block size.
    ///
    /// Returning an error leaves the node in the graph, disabled.
    fn prepare(&mut self, _ctx: &PrepareContext) -> Result<(), PrepareError> {
        Ok(())
    }

    /// Render one block.
    ///
    /// 1. Drain and handle all pending messages
    /// 2. Read from the inputs of `io`
    /// 3. Write to the outputs of `io` (they start out silent / empty)
    fn render(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = Self::Message>,
        io: &mut RenderIo<'_>,
    );

    /// Free what `prepare` allocated.
    fn release(&mut self) {}

    /// Whether this node is an explicit one-block delay.
    ///
    /// Connections into such a node do not order the graph and always arrive
    /// one block late, which is the only way to close a feedback loop over
    /// audio or control connections.
    fn is_feedback_delay(&self) -> bool {
        false
    }
}

/// Buffers of one node for one block.
///
/// Inputs are addressed by kind and channel. Unconnected inputs read as
/// silence (or an empty MIDI buffer). Outputs are cleared before `render`.
pub struct RenderIo<'a> {
    pub(crate) frames: usize,
    pub(crate) signals: &'a [Vec<f32>],
    pub(crate) midi: &'a [MidiBuffer],
    pub(crate) inputs: &'a Routes<Option<usize>>,
    pub(crate) audio_out: &'a mut [Vec<f32>],
    pub(crate) control_out: &'a mut [Vec<f32>],
    pub(crate) midi_out: &'a mut [MidiBuffer],
}

impl<'a> RenderIo<'a> {
    /// Number of frames in this block.
    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    #[inline]
    fn signal(&self, route: Option<&Option<usize>>) -> &'a [f32] {
        let signals = self.signals;
        let slot = route.copied().flatten().unwrap_or(0);
        &signals[slot][..self.frames]
    }

    /// Audio input `channel`, silent when unconnected.
    #[inline]
    pub fn audio_input(&self, channel: usize) -> &'a [f32] {
        self.signal(self.inputs.audio.get(channel))
    }

    /// Control input `channel`, the sum of all its sources, silent when unconnected.
    #[inline]
    pub fn control_input(&self, channel: usize) -> &'a [f32] {
        self.signal(self.inputs.control.get(channel))
    }

    /// MIDI input `channel`, all sources merged in frame order.
    #[inline]
    pub fn midi_input(&self, channel: usize) -> &'a MidiBuffer {
        let midi = self.midi;
        let slot = self.inputs.midi.get(channel).copied().flatten().unwrap_or(0);
        &midi[slot]
    }

    /// Whether any connection feeds the given input.
    pub fn is_input_connected(&self, kind: PortKind, channel: usize) -> bool {
        self.inputs.of(kind).get(channel).map_or(false, Option::is_some)
    }

    #[inline]
    pub fn audio_output(&mut self, channel: usize) -> Option<&mut [f32]> {
        let frames = self.frames;
        self.audio_out.get_mut(channel).map(|b| &mut b[..frames])
    }

    /// All audio outputs in channel order.
    pub fn audio_outputs(&mut self) -> impl Iterator<Item = &mut [f32]> + '_ {
        let frames = self.frames;
        self.audio_out.iter_mut().map(move |b| &mut b[..frames])
    }

    #[inline]
    pub fn control_output(&mut self, channel: usize) -> Option<&mut [f32]> {
        let frames = self.frames;
        self.control_out.get_mut(channel).map(|b| &mut b[..frames])
    }

    #[inline]
    pub fn midi_output(&mut self, channel: usize) -> Option<&mut MidiBuffer> {
        self.midi_out.get_mut(channel)
    }

    #[inline]
    pub fn num_audio_inputs(&self) -> usize {
        self.inputs.audio.len()
    }

    #[inline]
    pub fn num_audio_outputs(&self) -> usize {
        self.audio_out.len()
    }

    #[inline]
    pub fn num_control_inputs(&self) -> usize {
        self.inputs.control.len()
    }

    #[inline]
    pub fn num_midi_outputs(&self) -> usize {
        self.midi_out.len()
    }
}
