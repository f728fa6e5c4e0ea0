//! Compiled render sequences.
//!
//! A [`RenderSequence`] is the immutable plan the audio thread executes: one
//! [`RenderStep`] per node in dependency order, each naming the scratch slots
//! its ports read and write. It is built on the control thread by the
//! [`builder`](crate::builder) and shared with the audio thread via `Arc`, so
//! the audio thread sees either a complete plan or the previous one.
//!
//! Slot indices refer to two separate spaces of the scratch pool: signal slots
//! (audio and control ports) and MIDI slots. Slot 0 of each space is never
//! written and always reads as silence.

use alloc::vec::Vec;

use crate::node::NodeId;
use crate::port::PortKind;

/// The always-silent slot in both slot spaces.
pub(crate) const SILENT_SLOT: usize = 0;

/// Per-kind port routing, indexed by channel.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Routes<T> {
    pub audio: Vec<T>,
    pub control: Vec<T>,
    pub midi: Vec<T>,
}

impl<T> Routes<T> {
    pub fn of(&self, kind: PortKind) -> &[T] {
        match kind {
            PortKind::Audio => &self.audio,
            PortKind::Control => &self.control,
            PortKind::Midi => &self.midi,
        }
    }

    pub(crate) fn of_mut(&mut self, kind: PortKind) -> &mut Vec<T> {
        match kind {
            PortKind::Audio => &mut self.audio,
            PortKind::Control => &mut self.control,
            PortKind::Midi => &mut self.midi,
        }
    }
}

/// What the audio thread does for a step.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StepAction {
    /// Call the node in the given slot of the processor's node table.
    Render { slot: usize },
    /// Copy inputs to outputs by channel, without calling the node.
    Bypass,
    /// Clear the outputs. Used for disabled nodes and nodes that failed to prepare.
    Silence,
    /// Read the host's audio channels into the outputs.
    AudioIn,
    /// Read the host's MIDI events into the output.
    MidiIn,
    /// Inputs are written to the host's audio channels after the last step.
    AudioOut,
    /// Inputs are written to the host's MIDI buffer after the last step.
    MidiOut,
}

/// Slot space a merge or capture operates in.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SlotSpace {
    Signal,
    Midi,
}

impl From<PortKind> for SlotSpace {
    fn from(kind: PortKind) -> Self {
        if kind.is_signal() {
            SlotSpace::Signal
        } else {
            SlotSpace::Midi
        }
    }
}

/// Combine several sources into one input slot before the step runs.
/// Signals are summed, MIDI events merged in frame order.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Merge {
    pub space: SlotSpace,
    pub dest: usize,
    pub sources: Vec<usize>,
}

/// Copy an output into a persistent feedback slot once every step has run,
/// where its consumers read it during the next block.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Capture {
    pub space: SlotSpace,
    pub from: usize,
    pub to: usize,
    /// Node and port producing the value.
    pub source: NodeId,
    pub port: usize,
}

impl Capture {
    /// Whether `other` fills the same persistent slot from the same output.
    pub fn same_owner(&self, other: &Capture) -> bool {
        self.space == other.space && self.to == other.to && self.source == other.source && self.port == other.port
    }
}

/// One node's entry in the render order.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RenderStep {
    pub(crate) node: NodeId,
    pub(crate) action: StepAction,
    pub(crate) merges: Vec<Merge>,
    pub(crate) inputs: Routes<Option<usize>>,
    pub(crate) outputs: Routes<usize>,
}

impl RenderStep {
    #[inline]
    pub fn node(&self) -> NodeId {
        self.node
    }

    #[inline]
    pub fn action(&self) -> StepAction {
        self.action
    }

    /// Input slot per channel; `None` for unconnected inputs.
    pub fn inputs(&self) -> &Routes<Option<usize>> {
        &self.inputs
    }

    pub fn outputs(&self) -> &Routes<usize> {
        &self.outputs
    }

    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }
}

/// Largest per-kind output counts of any step, used to size staging storage.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct StagingShape {
    pub audio: usize,
    pub control: usize,
    pub midi: usize,
}

/// Immutable compiled plan of the graph.
///
/// Never mutated after creation. The audio thread sees complete state or
/// nothing - no partial updates.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RenderSequence {
    pub(crate) generation: u64,
    pub(crate) sample_rate: u32,
    pub(crate) steps: Vec<RenderStep>,
    /// Signal slots required, including the silent and persistent ones.
    pub(crate) signal_slots: usize,
    pub(crate) midi_slots: usize,
    pub(crate) staging: StagingShape,
    /// Feedback copies, applied after the last step.
    pub(crate) captures: Vec<Capture>,
    /// Persistent slots whose producer differs from the previous sequence.
    /// They are cleared when this sequence is published.
    pub(crate) fresh: Vec<(SlotSpace, usize)>,
    /// Indices of `AudioOut` / `MidiOut` steps, written to the host after the last step.
    pub(crate) host_outputs: Vec<usize>,
}

impl RenderSequence {
    /// The sequence a processor starts with: no steps, only the silent slots.
    pub(crate) fn empty(sample_rate: u32) -> Self {
        Self {
            generation: 0,
            sample_rate,
            steps: Vec::new(),
            signal_slots: 1,
            midi_slots: 1,
            staging: StagingShape::default(),
            captures: Vec::new(),
            fresh: Vec::new(),
            host_outputs: Vec::new(),
        }
    }

    /// Monotonic build counter of the engine that produced this sequence.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn steps(&self) -> &[RenderStep] {
        &self.steps
    }

    /// Node ids in render order.
    pub fn order(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.steps.iter().map(|s| s.node)
    }

    pub fn step_of(&self, node: NodeId) -> Option<&RenderStep> {
        self.steps.iter().find(|s| s.node == node)
    }

    #[inline]
    pub fn signal_slots(&self) -> usize {
        self.signal_slots
    }

    #[inline]
    pub fn midi_slots(&self) -> usize {
        self.midi_slots
    }

    #[inline]
    pub fn staging(&self) -> StagingShape {
        self.staging
    }

    /// Outputs copied into persistent slots at the end of every block.
    pub fn captures(&self) -> &[Capture] {
        &self.captures
    }

    /// Persistent slots that start out silent under this sequence.
    pub fn fresh_slots(&self) -> &[(SlotSpace, usize)] {
        &self.fresh
    }
}
