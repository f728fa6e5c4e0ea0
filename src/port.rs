//! Port descriptors.
//!
//! Every node declares its endpoints up front as a [`PortLayout`]: an ordered
//! list of typed, directional [`Port`]s. Connections address ports by their
//! index in that list; at render time nodes address them by kind and channel.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// The signal a port carries.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum PortKind {
    /// Audio-rate sample stream.
    Audio,
    /// Timestamped MIDI events.
    Midi,
    /// Audio-rate modulation signal. Multiple control sources into one input are summed.
    Control,
}

impl PortKind {
    /// Audio and control ports share the sample-buffer slot space.
    #[inline]
    pub(crate) fn is_signal(self) -> bool {
        !matches!(self, PortKind::Midi)
    }
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortKind::Audio => f.write_str("audio"),
            PortKind::Midi => f.write_str("midi"),
            PortKind::Control => f.write_str("control"),
        }
    }
}

/// Data flow direction, seen from the owning node.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Direction {
    Input,
    Output,
}

/// A single typed endpoint on a node.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Port {
    kind: PortKind,
    direction: Direction,
    channel: usize,
    name: String,
    display_name: String,
}

impl Port {
    #[inline]
    pub fn kind(&self) -> PortKind {
        self.kind
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Index of this port among the node's ports of the same kind and direction.
    #[inline]
    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Stable symbol, e.g. `midi_in`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human readable label, e.g. `MIDI In`.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[inline]
    pub fn is_input(&self) -> bool {
        self.direction == Direction::Input
    }

    #[inline]
    pub fn is_output(&self) -> bool {
        self.direction == Direction::Output
    }
}

/// Ordered port list of a node.
///
/// Channels are assigned densely per (kind, direction) in declaration order,
/// so the third audio input declared is always audio input channel 2.
///
/// ```
/// use klingt_graph::{PortLayout, PortKind, Direction};
///
/// let layout = PortLayout::new()
///     .audio_inputs(2)
///     .audio_outputs(2)
///     .midi_input();
///
/// assert_eq!(layout.count(PortKind::Audio, Direction::Input), 2);
/// assert_eq!(layout.index_of(PortKind::Midi, Direction::Input, 0), Some(4));
/// ```
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct PortLayout {
    ports: Vec<Port>,
}

impl PortLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a port. Its channel is the number of ports of the same kind and
    /// direction declared before it.
    pub fn with(
        mut self,
        kind: PortKind,
        direction: Direction,
        name: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        let channel = self.count(kind, direction);
        self.ports.push(Port {
            kind,
            direction,
            channel,
            name: name.into(),
            display_name: display_name.into(),
        });
        self
    }

    pub fn input(self, kind: PortKind, name: impl Into<String>, display_name: impl Into<String>) -> Self {
        self.with(kind, Direction::Input, name, display_name)
    }

    pub fn output(self, kind: PortKind, name: impl Into<String>, display_name: impl Into<String>) -> Self {
        self.with(kind, Direction::Output, name, display_name)
    }

    /// Append `n` audio inputs named `audio_in_1`, `audio_in_2`, ...
    pub fn audio_inputs(self, n: usize) -> Self {
        self.numbered(PortKind::Audio, Direction::Input, n)
    }

    /// Append `n` audio outputs named `audio_out_1`, `audio_out_2`, ...
    pub fn audio_outputs(self, n: usize) -> Self {
        self.numbered(PortKind::Audio, Direction::Output, n)
    }

    pub fn control_inputs(self, n: usize) -> Self {
        self.numbered(PortKind::Control, Direction::Input, n)
    }

    pub fn control_outputs(self, n: usize) -> Self {
        self.numbered(PortKind::Control, Direction::Output, n)
    }

    pub fn midi_input(self) -> Self {
        self.input(PortKind::Midi, "midi_in", "MIDI In")
    }

    pub fn midi_output(self) -> Self {
        self.output(PortKind::Midi, "midi_out", "MIDI Out")
    }

    fn numbered(mut self, kind: PortKind, direction: Direction, n: usize) -> Self {
        let (symbol, label) = match (kind, direction) {
            (PortKind::Audio, Direction::Input) => ("audio_in", "Audio In"),
            (PortKind::Audio, Direction::Output) => ("audio_out", "Audio Out"),
            (PortKind::Control, Direction::Input) => ("control_in", "Control In"),
            (PortKind::Control, Direction::Output) => ("control_out", "Control Out"),
            (PortKind::Midi, Direction::Input) => ("midi_in", "MIDI In"),
            (PortKind::Midi, Direction::Output) => ("midi_out", "MIDI Out"),
        };
        for _ in 0..n {
            let number = self.count(kind, direction) + 1;
            self = self.with(
                kind,
                direction,
                alloc::format!("{}_{}", symbol, number),
                alloc::format!("{} {}", label, number),
            );
        }
        self
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Port> {
        self.ports.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Port> + '_ {
        self.ports.iter()
    }

    /// Number of ports of the given kind and direction.
    pub fn count(&self, kind: PortKind, direction: Direction) -> usize {
        self.ports
            .iter()
            .filter(|p| p.kind == kind && p.direction == direction)
            .count()
    }

    /// Port list index of the given (kind, direction, channel).
    pub fn index_of(&self, kind: PortKind, direction: Direction, channel: usize) -> Option<usize> {
        self.ports
            .iter()
            .position(|p| p.kind == kind && p.direction == direction && p.channel == channel)
    }
}
