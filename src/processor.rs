//! Audio-thread half of the engine.
//!
//! [`GraphProcessor`] owns the live nodes, the current render sequence and the
//! scratch pool. Everything it receives arrives through the command queue and
//! everything it replaces leaves through the return queue, so nothing is
//! allocated or freed inside [`process`](GraphProcessor::process).

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::mem;

use rtrb::{Consumer, Producer};

use crate::midi::MidiBuffer;
use crate::node::{Node, NodeId, PrepareContext, PrepareError, ProcessContext, RenderIo};
use crate::pool::ScratchPool;
use crate::port::{PortKind, PortLayout};
use crate::sequence::{Capture, Merge, RenderSequence, RenderStep, SlotSpace, StepAction};

// Type-erased wrapper so we can store heterogeneous nodes
pub(crate) trait ErasedNode: Send {
    fn ports(&self) -> PortLayout;
    fn prepare(&mut self, ctx: &PrepareContext) -> Result<(), PrepareError>;
    fn render_erased(&mut self, ctx: &ProcessContext, io: &mut RenderIo<'_>);
    fn release(&mut self);
    fn is_feedback_delay(&self) -> bool;
}

pub(crate) struct NodeWrapper<N: Node> {
    pub node: N,
    pub receiver: Consumer<N::Message>,
}

impl<N: Node> ErasedNode for NodeWrapper<N> {
    fn ports(&self) -> PortLayout {
        self.node.ports()
    }

    fn prepare(&mut self, ctx: &PrepareContext) -> Result<(), PrepareError> {
        self.node.prepare(ctx)
    }

    fn render_erased(&mut self, ctx: &ProcessContext, io: &mut RenderIo<'_>) {
        // Split borrow to avoid conflict between receiver and node
        let receiver = &mut self.receiver;
        let node = &mut self.node;

        // Drain the message queue lazily, no allocation
        let messages = core::iter::from_fn(|| receiver.pop().ok());
        node.render(ctx, messages, io);
    }

    fn release(&mut self) {
        self.node.release()
    }

    fn is_feedback_delay(&self) -> bool {
        self.node.is_feedback_delay()
    }
}

/// A node sitting in the processor's node table.
pub(crate) struct LiveNode {
    pub id: NodeId,
    pub node: Box<dyn ErasedNode>,
}

/// Control thread -> audio thread.
pub(crate) enum Command {
    /// Put a prepared node into a slot of the node table.
    Insert {
        slot: usize,
        id: NodeId,
        node: Box<dyn ErasedNode>,
    },
    /// Hand the node in `slot` back, if it is still `id`.
    Take { slot: usize, id: NodeId },
    /// Swap the current render sequence.
    Publish(Arc<RenderSequence>),
    /// Swap the scratch pool, carrying its contents over.
    ReplacePool(Box<ScratchPool>),
    /// Swap the node table for a longer, empty one, moving the nodes over.
    GrowNodeTable(Vec<Option<LiveNode>>),
}

/// Audio thread -> control thread. Everything in here is dropped or released
/// on the control thread.
pub(crate) enum Returned {
    Node { id: NodeId, node: Box<dyn ErasedNode> },
    Sequence(Arc<RenderSequence>),
    Pool(Box<ScratchPool>),
    NodeTable(Vec<Option<LiveNode>>),
}

/// The audio-thread end of a graph, created by
/// [`GraphEngine::new`](crate::GraphEngine::new).
///
/// Move it into the audio callback and call [`process`](Self::process) once
/// per hardware period.
pub struct GraphProcessor {
    commands: Consumer<Command>,
    returns: Producer<Returned>,
    nodes: Vec<Option<LiveNode>>,
    sequence: Arc<RenderSequence>,
    pool: Box<ScratchPool>,
}

impl GraphProcessor {
    pub(crate) fn new(
        commands: Consumer<Command>,
        returns: Producer<Returned>,
        nodes: Vec<Option<LiveNode>>,
        sequence: Arc<RenderSequence>,
        pool: Box<ScratchPool>,
    ) -> Self {
        Self {
            commands,
            returns,
            nodes,
            sequence,
            pool,
        }
    }

    /// Generation of the render sequence currently executed. Zero until the
    /// first sequence has been published.
    pub fn generation(&self) -> u64 {
        self.sequence.generation()
    }

    /// Largest number of frames rendered in one pass. Longer host blocks are
    /// split into sub-blocks of this size.
    pub fn max_block_size(&self) -> usize {
        self.pool.block_size
    }

    /// Render one host period.
    ///
    /// `audio` holds non-interleaved channels, processed in place: host audio
    /// input nodes read them, host audio output nodes write them (they are
    /// zeroed when the graph has no output node). The frame count is the
    /// length of the shortest channel. `midi` carries the host's input events
    /// in and is replaced with the graph's MIDI output, truncated to its
    /// capacity.
    pub fn process(&mut self, audio: &mut [&mut [f32]], midi: &mut MidiBuffer) {
        self.apply_commands();

        let Self {
            nodes, sequence, pool, ..
        } = self;
        let block = pool.block_size;
        let frames = audio.iter().map(|c| c.len()).min().unwrap_or(block);
        pool.host_midi_out.clear();

        let mut offset = 0;
        while offset < frames {
            let len = block.min(frames - offset);
            let last = offset + len >= frames;

            pool.host_midi_in.clear();
            for event in midi.iter() {
                let frame = event.frame as usize;
                if frame >= offset && (frame < offset + len || last) {
                    let local = (frame - offset).min(len - 1) as u32;
                    let _ = pool.host_midi_in.insert(event.at(local));
                }
            }

            render_block(nodes.as_mut_slice(), sequence.as_ref(), pool.as_mut(), audio, offset, len);
            offset += len;
        }

        midi.copy_from(&pool.host_midi_out);
    }

    /// Apply queued commands, as long as every reply has room in the return queue.
    fn apply_commands(&mut self) {
        while self.returns.slots() > 0 {
            let Ok(command) = self.commands.pop() else {
                break;
            };
            if let Some(reply) = self.apply(command) {
                let pushed = self.returns.push(reply);
                debug_assert!(pushed.is_ok());
            }
        }
    }

    fn apply(&mut self, command: Command) -> Option<Returned> {
        match command {
            Command::Insert { slot, id, node } => match self.nodes.get_mut(slot) {
                Some(entry) => entry
                    .replace(LiveNode { id, node })
                    .map(|displaced| Returned::Node {
                        id: displaced.id,
                        node: displaced.node,
                    }),
                None => Some(Returned::Node { id, node }),
            },
            Command::Take { slot, id } => match self.nodes.get_mut(slot) {
                Some(entry) if entry.as_ref().map_or(false, |live| live.id == id) => {
                    entry.take().map(|live| Returned::Node {
                        id: live.id,
                        node: live.node,
                    })
                }
                _ => None,
            },
            Command::Publish(sequence) => {
                clear_fresh(&mut self.pool, &sequence);
                Some(Returned::Sequence(mem::replace(&mut self.sequence, sequence)))
            }
            Command::ReplacePool(mut pool) => {
                pool.absorb(&self.pool);
                Some(Returned::Pool(mem::replace(&mut self.pool, pool)))
            }
            Command::GrowNodeTable(mut table) => {
                for (new, old) in table.iter_mut().zip(self.nodes.iter_mut()) {
                    *new = old.take();
                }
                Some(Returned::NodeTable(mem::replace(&mut self.nodes, table)))
            }
        }
    }
}

fn render_block(
    nodes: &mut [Option<LiveNode>],
    sequence: &RenderSequence,
    pool: &mut ScratchPool,
    audio: &mut [&mut [f32]],
    offset: usize,
    len: usize,
) {
    let ctx = ProcessContext {
        sample_rate: sequence.sample_rate,
        buffer_size: len,
    };

    for step in &sequence.steps {
        match step.action {
            StepAction::Render { slot } => {
                merge_inputs(pool, &step.merges, len);
                match nodes.get_mut(slot).and_then(Option::as_mut) {
                    Some(live) => render_node(live.node.as_mut(), &ctx, pool, step, len),
                    None => silence(pool, step, len),
                }
            }
            StepAction::Bypass => {
                merge_inputs(pool, &step.merges, len);
                bypass(pool, step, len);
            }
            StepAction::Silence => silence(pool, step, len),
            StepAction::AudioIn => {
                for (channel, &slot) in step.outputs.audio.iter().enumerate() {
                    let out = &mut pool.signals[slot][..len];
                    match audio.get(channel) {
                        Some(host) => out.copy_from_slice(&host[offset..offset + len]),
                        None => out.fill(0.0),
                    }
                }
            }
            StepAction::MidiIn => {
                for &slot in &step.outputs.midi {
                    pool.midi[slot].copy_from(&pool.host_midi_in);
                }
            }
            StepAction::AudioOut | StepAction::MidiOut => merge_inputs(pool, &step.merges, len),
        }
    }

    for capture in &sequence.captures {
        apply_capture(pool, capture, len);
    }
    write_host_outputs(sequence, pool, audio, offset, len);
}

fn render_node(
    node: &mut dyn ErasedNode,
    ctx: &ProcessContext,
    pool: &mut ScratchPool,
    step: &RenderStep,
    len: usize,
) {
    let ScratchPool {
        signals,
        midi,
        staging,
        ..
    } = pool;

    // Move the outputs aside so the inputs can stay borrowed from the pool.
    for &slot in &step.outputs.audio {
        let mut buffer = mem::take(&mut signals[slot]);
        buffer[..len].fill(0.0);
        staging.audio.push(buffer);
    }
    for &slot in &step.outputs.control {
        let mut buffer = mem::take(&mut signals[slot]);
        buffer[..len].fill(0.0);
        staging.control.push(buffer);
    }
    for &slot in &step.outputs.midi {
        let mut buffer = mem::take(&mut midi[slot]);
        buffer.clear();
        staging.midi.push(buffer);
    }

    let mut io = RenderIo {
        frames: len,
        signals: signals.as_slice(),
        midi: midi.as_slice(),
        inputs: &step.inputs,
        audio_out: staging.audio.as_mut_slice(),
        control_out: staging.control.as_mut_slice(),
        midi_out: staging.midi.as_mut_slice(),
    };
    node.render_erased(ctx, &mut io);

    for (buffer, &slot) in staging.audio.drain(..).zip(&step.outputs.audio) {
        signals[slot] = buffer;
    }
    for (buffer, &slot) in staging.control.drain(..).zip(&step.outputs.control) {
        signals[slot] = buffer;
    }
    for (buffer, &slot) in staging.midi.drain(..).zip(&step.outputs.midi) {
        midi[slot] = buffer;
    }
}

fn merge_inputs(pool: &mut ScratchPool, merges: &[Merge], len: usize) {
    for merge in merges {
        match merge.space {
            SlotSpace::Signal => {
                let mut dest = mem::take(&mut pool.signals[merge.dest]);
                let dest_frames = &mut dest[..len];
                dest_frames.fill(0.0);
                for &source in &merge.sources {
                    for (d, s) in dest_frames.iter_mut().zip(&pool.signals[source][..len]) {
                        *d += s;
                    }
                }
                pool.signals[merge.dest] = dest;
            }
            SlotSpace::Midi => {
                let mut dest = mem::take(&mut pool.midi[merge.dest]);
                dest.clear();
                for &source in &merge.sources {
                    dest.merge_from(&pool.midi[source]);
                }
                pool.midi[merge.dest] = dest;
            }
        }
    }
}

fn silence(pool: &mut ScratchPool, step: &RenderStep, len: usize) {
    for &slot in step.outputs.audio.iter().chain(&step.outputs.control) {
        pool.signals[slot][..len].fill(0.0);
    }
    for &slot in &step.outputs.midi {
        pool.midi[slot].clear();
    }
}

/// Copy inputs to outputs of the same kind and channel. Outputs without a
/// matching connected input are cleared.
fn bypass(pool: &mut ScratchPool, step: &RenderStep, len: usize) {
    for kind in [PortKind::Audio, PortKind::Control] {
        let inputs = step.inputs.of(kind);
        for (channel, &out) in step.outputs.of(kind).iter().enumerate() {
            match inputs.get(channel).copied().flatten() {
                Some(source) => {
                    let (from, to) = pair_mut(&mut pool.signals, source, out);
                    to[..len].copy_from_slice(&from[..len]);
                }
                None => pool.signals[out][..len].fill(0.0),
            }
        }
    }
    for (channel, &out) in step.outputs.midi.iter().enumerate() {
        match step.inputs.midi.get(channel).copied().flatten() {
            Some(source) => {
                let (from, to) = pair_mut(&mut pool.midi, source, out);
                to.copy_from(from);
            }
            None => pool.midi[out].clear(),
        }
    }
}

/// Persistent slots taken over by a new producer start silent.
fn clear_fresh(pool: &mut ScratchPool, sequence: &RenderSequence) {
    for &(space, slot) in &sequence.fresh {
        match space {
            SlotSpace::Signal => {
                if let Some(signal) = pool.signals.get_mut(slot) {
                    signal.fill(0.0);
                }
            }
            SlotSpace::Midi => {
                if let Some(midi) = pool.midi.get_mut(slot) {
                    midi.clear();
                }
            }
        }
    }
}

fn apply_capture(pool: &mut ScratchPool, capture: &Capture, len: usize) {
    match capture.space {
        SlotSpace::Signal => {
            let (from, to) = pair_mut(&mut pool.signals, capture.from, capture.to);
            to[..len].copy_from_slice(&from[..len]);
        }
        SlotSpace::Midi => {
            let (from, to) = pair_mut(&mut pool.midi, capture.from, capture.to);
            to.copy_from(from);
        }
    }
}

fn write_host_outputs(
    sequence: &RenderSequence,
    pool: &mut ScratchPool,
    audio: &mut [&mut [f32]],
    offset: usize,
    len: usize,
) {
    for channel in audio.iter_mut() {
        channel[offset..offset + len].fill(0.0);
    }

    for &index in &sequence.host_outputs {
        let step = &sequence.steps[index];
        match step.action {
            StepAction::AudioOut => {
                for (route, channel) in step.inputs.audio.iter().zip(audio.iter_mut()) {
                    if let Some(slot) = *route {
                        let out = &mut channel[offset..offset + len];
                        for (o, s) in out.iter_mut().zip(&pool.signals[slot][..len]) {
                            *o += s;
                        }
                    }
                }
            }
            StepAction::MidiOut => {
                for &slot in step.inputs.midi.iter().flatten() {
                    for event in pool.midi[slot].iter() {
                        let _ = pool.host_midi_out.insert(event.at(event.frame + offset as u32));
                    }
                }
            }
            _ => {}
        }
    }
}

/// Shared access to `read` and exclusive access to `write`, which must differ.
fn pair_mut<T>(items: &mut [T], read: usize, write: usize) -> (&T, &mut T) {
    debug_assert_ne!(read, write);
    if read < write {
        let (head, tail) = items.split_at_mut(write);
        (&head[read], &mut tail[0])
    } else {
        let (head, tail) = items.split_at_mut(read);
        (&tail[0], &mut head[write])
    }
}
