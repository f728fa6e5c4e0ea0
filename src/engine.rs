//! Control-thread half of the engine.
//!
//! [`GraphEngine`] owns the topology: nodes, their ports and state, and the
//! connection set. Every mutation validates, rebuilds the render sequence and
//! queues it for the [`GraphProcessor`] without waiting for the audio thread.
//!
//! Ordering of the command queue carries the safety argument:
//! - a node is inserted before any sequence that renders it is published,
//! - a sequence that no longer renders a node is published before the node is
//!   taken back,
//! - nodes are only prepared or released while they sit on this side.

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet, VecDeque};
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::mem;

use rtrb::{Consumer, Producer, PushError, RingBuffer};
use tracing::{debug, info, warn};

use crate::builder::{self, BuildNode};
use crate::config::EngineConfig;
use crate::connection::{Connection, ConnectionSet};
use crate::error::{ConfigurationError, CycleError, GraphError};
use crate::node::{Node, NodeId, PrepareContext};
use crate::pool::{PoolShape, ScratchPool};
use crate::port::PortLayout;
use crate::processor::{Command, ErasedNode, GraphProcessor, NodeWrapper, Returned};
use crate::sequence::{RenderSequence, StepAction};

/// Handle for sending messages to a node
pub struct Handle<M: Send + 'static> {
    id: NodeId,
    sender: Producer<M>,
}

impl<M: Send + 'static> Handle<M> {
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Send a message to the node, handled at the start of its next render.
    ///
    /// Returns the message back if the queue is full.
    pub fn send(&mut self, msg: M) -> Result<(), M> {
        self.sender.push(msg).map_err(|PushError::Full(m)| m)
    }
}

/// Control-thread view of a node.
#[derive(Clone, Debug)]
pub struct NodeInfo {
    id: NodeId,
    name: String,
    ports: PortLayout,
    enabled: bool,
    bypassed: bool,
    render_index: Option<usize>,
    feedback_delay: bool,
    configuration_error: Option<ConfigurationError>,
}

impl NodeInfo {
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Type name of the node, or the kind of host endpoint.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ports(&self) -> &PortLayout {
        &self.ports
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    /// Position in the published render order.
    #[inline]
    pub fn render_index(&self) -> Option<usize> {
        self.render_index
    }

    #[inline]
    pub fn is_feedback_delay(&self) -> bool {
        self.feedback_delay
    }

    /// Why the last `prepare` failed, while the node is disabled because of it.
    pub fn configuration_error(&self) -> Option<&ConfigurationError> {
        self.configuration_error.as_ref()
    }
}

/// Endpoints binding the graph to the buffers passed to
/// [`GraphProcessor::process`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum HostIo {
    AudioIn,
    AudioOut,
    MidiIn,
    MidiOut,
}

impl HostIo {
    fn action(self) -> StepAction {
        match self {
            HostIo::AudioIn => StepAction::AudioIn,
            HostIo::AudioOut => StepAction::AudioOut,
            HostIo::MidiIn => StepAction::MidiIn,
            HostIo::MidiOut => StepAction::MidiOut,
        }
    }

    fn name(self) -> &'static str {
        match self {
            HostIo::AudioIn => "Audio Input",
            HostIo::AudioOut => "Audio Output",
            HostIo::MidiIn => "MIDI Input",
            HostIo::MidiOut => "MIDI Output",
        }
    }
}

/// Where a node's implementation currently is.
enum Location {
    Host(HostIo),
    /// On the control thread: not prepared, or its prepare failed.
    Local(Box<dyn ErasedNode>),
    /// In the processor's node table.
    Live { slot: usize },
    /// Asked back from the audio thread; prepared again once it arrives.
    Recalling,
}

struct Unit {
    info: NodeInfo,
    location: Location,
    /// Disabled by a failed prepare rather than by the user.
    auto_disabled: bool,
}

impl Unit {
    fn action(&self) -> StepAction {
        let info = &self.info;
        match self.location {
            Location::Host(io) if info.enabled => io.action(),
            Location::Host(_) => StepAction::Silence,
            Location::Live { slot } if info.enabled && !info.bypassed => StepAction::Render { slot },
            _ if info.enabled && info.bypassed => StepAction::Bypass,
            _ => StepAction::Silence,
        }
    }
}

/// The control-thread end of a graph.
///
/// ```
/// use klingt_graph::nodes::source::Sine;
/// use klingt_graph::{Connection, EngineConfig, GraphEngine, MidiBuffer};
///
/// let (mut engine, mut processor) = GraphEngine::new(EngineConfig::new(48_000));
/// let sine = engine.add_node(Sine::new(440.0));
/// let out = engine.add_audio_output(1);
/// engine.connect(Connection::new(sine.id(), 1, out, 0)).unwrap();
///
/// // on the audio thread
/// let mut left = [0.0f32; 256];
/// processor.process(&mut [&mut left[..]], &mut MidiBuffer::with_capacity(16));
/// assert!(left.iter().any(|s| *s != 0.0));
/// ```
pub struct GraphEngine {
    config: EngineConfig,
    units: BTreeMap<NodeId, Unit>,
    connections: ConnectionSet,
    published: Option<Arc<RenderSequence>>,
    generation: u64,
    next_id: u32,

    commands: Producer<Command>,
    returns: Consumer<Returned>,
    /// Commands that did not fit into the command queue, oldest first.
    backlog: VecDeque<Command>,

    free_slots: BTreeSet<usize>,
    next_slot: usize,
    table_len: usize,
    pool: PoolShape,

    /// Failures of nodes re-prepared in `maintain`, not yet reported.
    errors: Vec<ConfigurationError>,
}

impl GraphEngine {
    /// Create an empty graph and the processor that renders it.
    pub fn new(config: EngineConfig) -> (GraphEngine, GraphProcessor) {
        let (commands, command_rx) = RingBuffer::new(config.command_queue_size());
        let (return_tx, returns) = RingBuffer::new(config.command_queue_size());

        let pool = PoolShape::empty(config.max_block_size(), config.midi_capacity());
        let processor = GraphProcessor::new(
            command_rx,
            return_tx,
            (0..config.node_capacity()).map(|_| None).collect(),
            Arc::new(RenderSequence::empty(config.sample_rate())),
            Box::new(ScratchPool::new(pool)),
        );

        info!(
            sample_rate = config.sample_rate(),
            max_block_size = config.max_block_size(),
            "created graph engine"
        );

        let engine = GraphEngine {
            table_len: config.node_capacity(),
            config,
            units: BTreeMap::new(),
            connections: ConnectionSet::new(),
            published: None,
            generation: 0,
            next_id: 0,
            commands,
            returns,
            backlog: VecDeque::new(),
            free_slots: BTreeSet::new(),
            next_slot: 0,
            pool,
            errors: Vec::new(),
        };
        (engine, processor)
    }

    /// Add a node, returns a handle for sending messages
    ///
    /// The node is prepared first. If that fails it stays in the graph,
    /// disabled, with the reason in [`NodeInfo::configuration_error`].
    pub fn add_node<N: Node>(&mut self, node: N) -> Handle<N::Message> {
        self.add_node_with_queue_size(node, self.config.message_queue_size())
    }

    /// Add a node with a custom message queue size
    pub fn add_node_with_queue_size<N: Node>(&mut self, node: N, queue_size: usize) -> Handle<N::Message> {
        self.poll();

        let (sender, receiver) = RingBuffer::new(queue_size.max(1));
        let node: Box<dyn ErasedNode> = Box::new(NodeWrapper { node, receiver });
        let ports = node.ports();
        let feedback_delay = node.is_feedback_delay();
        let id = self.insert_unit(short_type_name::<N>().to_string(), ports, feedback_delay, Location::Local(node));

        if self.prepare_local(id).is_ok() {
            self.go_live(id);
        }
        self.republish();

        Handle { id, sender }
    }

    /// A node reading `channels` host input channels.
    pub fn add_audio_input(&mut self, channels: usize) -> NodeId {
        self.add_host(HostIo::AudioIn, PortLayout::new().audio_outputs(channels))
    }

    /// A node writing `channels` host output channels. Several output nodes
    /// are summed.
    pub fn add_audio_output(&mut self, channels: usize) -> NodeId {
        self.add_host(HostIo::AudioOut, PortLayout::new().audio_inputs(channels))
    }

    pub fn add_midi_input(&mut self) -> NodeId {
        self.add_host(HostIo::MidiIn, PortLayout::new().midi_output())
    }

    pub fn add_midi_output(&mut self) -> NodeId {
        self.add_host(HostIo::MidiOut, PortLayout::new().midi_input())
    }

    fn add_host(&mut self, io: HostIo, ports: PortLayout) -> NodeId {
        self.poll();
        let id = self.insert_unit(io.name().to_string(), ports, false, Location::Host(io));
        self.republish();
        id
    }

    fn insert_unit(&mut self, name: String, ports: PortLayout, feedback_delay: bool, location: Location) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        debug!(node = %id, %name, ports = ports.len(), "adding node");
        self.units.insert(
            id,
            Unit {
                info: NodeInfo {
                    id,
                    name,
                    ports,
                    enabled: true,
                    bypassed: false,
                    render_index: None,
                    feedback_delay,
                    configuration_error: None,
                },
                location,
                auto_disabled: false,
            },
        );
        id
    }

    /// Remove a node and every connection touching it.
    ///
    /// The node is released once the audio thread has handed it back, during
    /// a later [`maintain`](Self::maintain).
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        self.remove_nodes(&[id])
    }

    /// Remove several nodes with a single rebuild. Fails without removing
    /// anything if one of them does not exist.
    pub fn remove_nodes(&mut self, ids: &[NodeId]) -> Result<(), GraphError> {
        self.poll();
        if let Some(&missing) = ids.iter().find(|id| !self.units.contains_key(id)) {
            return Err(GraphError::NotFound(missing));
        }

        let mut removed = Vec::with_capacity(ids.len());
        for &id in ids {
            let Some(unit) = self.units.remove(&id) else {
                continue;
            };
            let arcs = self.connections.remove_node(id);
            debug!(node = %id, connections = arcs.len(), "removing node");
            removed.push((id, unit));
        }

        // publish first, the old sequence may still render these nodes
        self.republish();

        for (id, unit) in removed {
            match unit.location {
                Location::Live { slot } => {
                    self.free_slots.insert(slot);
                    self.send(Command::Take { slot, id });
                }
                Location::Local(mut node) => node.release(),
                Location::Host(_) | Location::Recalling => {}
            }
        }
        Ok(())
    }

    /// Add a connection. A connection closing a cycle of audio or control
    /// connections is rolled back and the published sequence stays as it was.
    pub fn connect(&mut self, connection: Connection) -> Result<(), GraphError> {
        self.poll();
        let units = &self.units;
        self.connections
            .try_add(connection, |id| units.get(&id).map(|u| &u.info.ports))?;

        if let Err(error) = self.rebuild() {
            self.connections.remove(&connection);
            debug!(%connection, %error, "connection rejected");
            return Err(error.into());
        }
        Ok(())
    }

    /// Remove a connection. Returns whether it existed.
    pub fn disconnect(&mut self, connection: Connection) -> bool {
        self.poll();
        if !self.connections.remove(&connection) {
            return false;
        }
        self.republish();
        true
    }

    /// Remove and add several connections with a single rebuild.
    ///
    /// Either every change is applied or, on the first error, none is.
    pub fn rewire(&mut self, remove: &[Connection], add: &[Connection]) -> Result<(), GraphError> {
        self.poll();
        let snapshot = self.connections.clone();

        for connection in remove {
            self.connections.remove(connection);
        }
        let units = &self.units;
        for &connection in add {
            if let Err(error) = self
                .connections
                .try_add(connection, |id| units.get(&id).map(|u| &u.info.ports))
            {
                self.connections = snapshot;
                return Err(error.into());
            }
        }

        if let Err(error) = self.rebuild() {
            self.connections = snapshot;
            return Err(error.into());
        }
        Ok(())
    }

    /// A bypassed node is not rendered; its inputs are copied to its outputs.
    pub fn set_bypassed(&mut self, id: NodeId, bypassed: bool) -> Result<(), GraphError> {
        self.poll();
        let unit = self.units.get_mut(&id).ok_or(GraphError::NotFound(id))?;
        if unit.info.bypassed != bypassed {
            unit.info.bypassed = bypassed;
            self.republish();
        }
        Ok(())
    }

    /// A disabled node is not rendered and its outputs are silent.
    ///
    /// Enabling a node whose prepare failed prepares it again; if that fails
    /// too the node stays disabled and the error is returned.
    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> Result<(), GraphError> {
        self.poll();
        let unit = self.units.get_mut(&id).ok_or(GraphError::NotFound(id))?;

        if !enabled {
            unit.auto_disabled = false;
            if mem::replace(&mut unit.info.enabled, false) {
                self.republish();
            }
            return Ok(());
        }

        if matches!(unit.location, Location::Local(_)) {
            self.prepare_local(id)?;
            self.go_live(id);
        }
        if let Some(unit) = self.units.get_mut(&id) {
            unit.info.enabled = true;
            unit.auto_disabled = false;
        }
        self.republish();
        Ok(())
    }

    /// Change the stream format.
    ///
    /// Every node on the audio thread is called back and prepared again once
    /// it arrives (it is silent meanwhile). Nodes disabled by a failed prepare
    /// are retried right away. Returns the failures known so far; the rest
    /// are reported by later calls to [`maintain`](Self::maintain).
    pub fn reconfigure(&mut self, sample_rate: u32, max_block_size: usize) -> Vec<ConfigurationError> {
        self.poll();
        self.config.set_stream(sample_rate, max_block_size);
        info!(
            sample_rate,
            max_block_size = self.config.max_block_size(),
            "reconfiguring graph"
        );

        let live: Vec<(NodeId, usize)> = self
            .units
            .iter()
            .filter_map(|(&id, unit)| match unit.location {
                Location::Live { slot } => Some((id, slot)),
                _ => None,
            })
            .collect();
        for &(id, _) in &live {
            if let Some(unit) = self.units.get_mut(&id) {
                unit.location = Location::Recalling;
            }
        }

        let retry: Vec<NodeId> = self
            .units
            .iter()
            .filter(|(_, unit)| unit.auto_disabled && matches!(unit.location, Location::Local(_)))
            .map(|(&id, _)| id)
            .collect();
        for id in retry {
            match self.prepare_local(id) {
                Ok(()) => self.go_live(id),
                Err(error) => self.errors.push(error),
            }
        }

        // The recalled slots stay out of the free list until a sequence that
        // no longer renders them is queued.
        self.republish();
        for (id, slot) in live {
            self.send(Command::Take { slot, id });
            self.free_slots.insert(slot);
        }
        self.maintain()
    }

    /// Housekeeping: drop what the audio thread handed back, release removed
    /// nodes, re-prepare recalled ones and flush held back commands.
    ///
    /// Every mutation does this first; call it periodically when the graph is
    /// otherwise left alone. Returns prepare failures of recalled nodes.
    pub fn maintain(&mut self) -> Vec<ConfigurationError> {
        self.poll();
        mem::take(&mut self.errors)
    }

    /// Whether every command reached the audio thread and no node is on its way back.
    pub fn is_settled(&self) -> bool {
        self.backlog.is_empty()
            && !self
                .units
                .values()
                .any(|unit| matches!(unit.location, Location::Recalling))
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeInfo> {
        self.units.get(&id).map(|unit| &unit.info)
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeInfo> + '_ {
        self.units.values().map(|unit| &unit.info)
    }

    pub fn connections(&self) -> &ConnectionSet {
        &self.connections
    }

    /// The last published sequence. `None` before the first mutation.
    pub fn render_sequence(&self) -> Option<&Arc<RenderSequence>> {
        self.published.as_ref()
    }

    pub fn render_order(&self) -> Vec<NodeId> {
        self.published
            .as_ref()
            .map(|sequence| sequence.order().collect())
            .unwrap_or_default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn prepare_context(&self) -> PrepareContext {
        PrepareContext {
            sample_rate: self.config.sample_rate(),
            max_block_size: self.config.max_block_size(),
            midi_capacity: self.config.midi_capacity(),
        }
    }

    /// Prepare a node held on this side and refresh its ports.
    fn prepare_local(&mut self, id: NodeId) -> Result<(), ConfigurationError> {
        let ctx = self.prepare_context();
        let Some(unit) = self.units.get_mut(&id) else {
            return Ok(());
        };
        let Location::Local(node) = &mut unit.location else {
            return Ok(());
        };

        match node.prepare(&ctx) {
            Ok(()) => {
                unit.info.ports = node.ports();
                unit.info.configuration_error = None;
                if unit.auto_disabled {
                    unit.auto_disabled = false;
                    unit.info.enabled = true;
                }
                self.drop_stale_connections(id);
                Ok(())
            }
            Err(error) => {
                let error = ConfigurationError {
                    node: id,
                    reason: error.into_reason(),
                };
                warn!(
                    node = %id,
                    name = %unit.info.name,
                    sample_rate = ctx.sample_rate,
                    max_block_size = ctx.max_block_size,
                    reason = %error.reason,
                    "prepare failed, node disabled"
                );
                unit.info.enabled = false;
                unit.auto_disabled = true;
                unit.info.configuration_error = Some(error.clone());
                Err(error)
            }
        }
    }

    fn drop_stale_connections(&mut self, id: NodeId) {
        let units = &self.units;
        let dropped = self
            .connections
            .retain(|c| !c.touches(id) || connection_fits(units, c));
        for connection in dropped {
            warn!(%connection, "port no longer exists, connection dropped");
        }
    }

    /// Ship a prepared node to the audio thread.
    fn go_live(&mut self, id: NodeId) {
        let node = match self.units.get_mut(&id) {
            Some(unit) => match mem::replace(&mut unit.location, Location::Recalling) {
                Location::Local(node) => node,
                other => {
                    unit.location = other;
                    return;
                }
            },
            None => return,
        };

        let slot = self.alloc_slot();
        if let Some(unit) = self.units.get_mut(&id) {
            unit.location = Location::Live { slot };
        }
        self.send(Command::Insert { slot, id, node });
    }

    fn alloc_slot(&mut self) -> usize {
        if let Some(slot) = self.free_slots.pop_first() {
            return slot;
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        if slot >= self.table_len {
            let len = (self.table_len * 2).max(slot + 1);
            debug!(len, "growing node table");
            self.send(Command::GrowNodeTable((0..len).map(|_| None).collect()));
            self.table_len = len;
        }
        slot
    }

    /// Build and publish a sequence for the current topology.
    fn rebuild(&mut self) -> Result<(), CycleError> {
        let nodes: Vec<BuildNode<'_>> = self
            .units
            .iter()
            .map(|(&id, unit)| BuildNode {
                id,
                ports: &unit.info.ports,
                action: unit.action(),
                feedback_delay: unit.info.feedback_delay,
            })
            .collect();
        let sequence = builder::build(
            &nodes,
            &self.connections,
            self.published.as_deref(),
            self.config.sample_rate(),
            self.generation + 1,
        )?;
        self.generation = sequence.generation();

        for unit in self.units.values_mut() {
            unit.info.render_index = None;
        }
        for (index, step) in sequence.steps().iter().enumerate() {
            if let Some(unit) = self.units.get_mut(&step.node()) {
                unit.info.render_index = Some(index);
            }
        }

        let block_size = self.config.max_block_size();
        let midi_capacity = self.config.midi_capacity();
        if !self.pool.fits(&sequence, block_size, midi_capacity) {
            self.pool = self.pool.grown_for(&sequence, block_size, midi_capacity);
            debug!(
                signal_slots = self.pool.signal_slots,
                midi_slots = self.pool.midi_slots,
                block_size,
                "replacing scratch pool"
            );
            self.send(Command::ReplacePool(Box::new(ScratchPool::new(self.pool))));
        }

        let sequence = Arc::new(sequence);
        self.send(Command::Publish(Arc::clone(&sequence)));
        debug!(generation = self.generation, "published render sequence");
        self.published = Some(sequence);
        Ok(())
    }

    /// Rebuild after a change that cannot introduce a cycle.
    fn republish(&mut self) {
        if let Err(error) = self.rebuild() {
            tracing::error!(%error, "render sequence rebuild failed, previous sequence stays active");
        }
    }

    fn send(&mut self, command: Command) {
        if !self.backlog.is_empty() {
            self.backlog.push_back(command);
            return;
        }
        if let Err(PushError::Full(command)) = self.commands.push(command) {
            debug!("command queue full, holding commands until maintain");
            self.backlog.push_back(command);
        }
    }

    fn flush(&mut self) {
        while let Some(command) = self.backlog.pop_front() {
            if let Err(PushError::Full(command)) = self.commands.push(command) {
                self.backlog.push_front(command);
                break;
            }
        }
    }

    fn poll(&mut self) {
        let mut revived = false;
        while let Ok(returned) = self.returns.pop() {
            match returned {
                Returned::Node { id, mut node } => {
                    let recalled = self
                        .units
                        .get_mut(&id)
                        .filter(|unit| matches!(unit.location, Location::Recalling));
                    match recalled {
                        Some(unit) => {
                            unit.location = Location::Local(node);
                            match self.prepare_local(id) {
                                Ok(()) => self.go_live(id),
                                Err(error) => self.errors.push(error),
                            }
                            revived = true;
                        }
                        None => {
                            node.release();
                            debug!(node = %id, "released node");
                        }
                    }
                }
                Returned::Sequence(sequence) => {
                    debug!(generation = sequence.generation(), "retired render sequence");
                }
                Returned::Pool(_) | Returned::NodeTable(_) => {}
            }
        }
        if revived {
            self.republish();
        }
        self.flush();
    }
}

impl Drop for GraphEngine {
    fn drop(&mut self) {
        while let Ok(returned) = self.returns.pop() {
            if let Returned::Node { mut node, .. } = returned {
                node.release();
            }
        }
        for command in self.backlog.drain(..) {
            if let Command::Insert { mut node, .. } = command {
                node.release();
            }
        }
        for unit in self.units.values_mut() {
            if let Location::Local(node) = &mut unit.location {
                node.release();
            }
        }
    }
}

fn connection_fits(units: &BTreeMap<NodeId, Unit>, c: &Connection) -> bool {
    let port = |node: NodeId, index: usize| units.get(&node).and_then(|u| u.info.ports.get(index));
    match (port(c.source, c.source_port), port(c.dest, c.dest_port)) {
        (Some(source), Some(dest)) => source.is_output() && dest.is_input() && source.kind() == dest.kind(),
        _ => false,
    }
}

fn short_type_name<N>() -> &'static str {
    let full = core::any::type_name::<N>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MidiBuffer;
    use crate::node::{PrepareError, ProcessContext, RenderIo};

    struct Thru;

    impl Node for Thru {
        type Message = ();

        fn ports(&self) -> PortLayout {
            PortLayout::new().audio_inputs(1).audio_outputs(1)
        }

        fn render(&mut self, _: &ProcessContext, _: impl Iterator<Item = ()>, io: &mut RenderIo<'_>) {
            let input = io.audio_input(0);
            if let Some(out) = io.audio_output(0) {
                out.copy_from_slice(input);
            }
        }
    }

    struct Picky;

    impl Node for Picky {
        type Message = ();

        fn ports(&self) -> PortLayout {
            PortLayout::new().audio_outputs(1)
        }

        fn prepare(&mut self, ctx: &PrepareContext) -> Result<(), PrepareError> {
            if ctx.max_block_size > 1024 {
                return Err(PrepareError::new("block too large"));
            }
            Ok(())
        }

        fn render(&mut self, _: &ProcessContext, _: impl Iterator<Item = ()>, _: &mut RenderIo<'_>) {}
    }

    fn engine() -> (GraphEngine, GraphProcessor) {
        GraphEngine::new(EngineConfig::new(48_000).with_max_block_size(64))
    }

    fn run(processor: &mut GraphProcessor) {
        let mut left = [0.0f32; 64];
        processor.process(&mut [&mut left[..]], &mut MidiBuffer::with_capacity(8));
    }

    #[test]
    fn ids_are_never_reused() {
        let (mut engine, _processor) = engine();
        let a = engine.add_node(Thru).id();
        engine.remove_node(a).unwrap();
        let b = engine.add_node(Thru).id();
        assert!(b > a);
        assert_eq!(engine.remove_node(a), Err(GraphError::NotFound(a)));
    }

    #[test]
    fn names_come_from_the_type() {
        let (mut engine, _processor) = engine();
        let a = engine.add_node(Thru).id();
        let out = engine.add_audio_output(2);
        assert_eq!(engine.node(a).unwrap().name(), "Thru");
        assert_eq!(engine.node(out).unwrap().name(), "Audio Output");
    }

    #[test]
    fn batch_removal_checks_every_id_first() {
        let (mut engine, _processor) = engine();
        let a = engine.add_node(Thru).id();
        let missing = NodeId(99);
        assert_eq!(engine.remove_nodes(&[a, missing]), Err(GraphError::NotFound(missing)));
        assert!(engine.node(a).is_some());
    }

    #[test]
    fn rewire_rolls_back_on_error() {
        let (mut engine, _processor) = engine();
        let a = engine.add_node(Thru).id();
        let b = engine.add_node(Thru).id();
        let c = engine.add_node(Thru).id();
        let ab = Connection::new(a, 1, b, 0);
        let bc = Connection::new(b, 1, c, 0);
        engine.connect(ab).unwrap();
        engine.connect(bc).unwrap();
        let before = engine.render_sequence().cloned();

        // drops a -> b, closes a cycle b -> c -> b
        let result = engine.rewire(&[ab], &[Connection::new(c, 1, b, 0)]);
        assert!(matches!(result, Err(GraphError::Cycle(_))));
        assert!(engine.connections().contains(&ab));
        assert_eq!(engine.connections().len(), 2);
        assert_eq!(engine.render_sequence().cloned(), before);
    }

    #[test]
    fn rewire_reorders_in_one_publish() {
        let (mut engine, _processor) = engine();
        let a = engine.add_node(Thru).id();
        let b = engine.add_node(Thru).id();
        let c = engine.add_node(Thru).id();
        engine.connect(Connection::new(a, 1, b, 0)).unwrap();
        engine.connect(Connection::new(b, 1, c, 0)).unwrap();
        let generation = engine.render_sequence().unwrap().generation();

        engine
            .rewire(
                &[Connection::new(a, 1, b, 0), Connection::new(b, 1, c, 0)],
                &[Connection::new(a, 1, c, 0), Connection::new(c, 1, b, 0)],
            )
            .unwrap();
        assert_eq!(engine.render_order(), vec![a, c, b]);
        assert_eq!(engine.render_sequence().unwrap().generation(), generation + 1);
    }

    #[test]
    fn failed_prepare_disables_and_retry_reports() {
        let (mut engine, _processor) = GraphEngine::new(EngineConfig::new(48_000).with_max_block_size(2048));
        let picky = engine.add_node(Picky).id();
        let info = engine.node(picky).unwrap();
        assert!(!info.is_enabled());
        assert_eq!(info.configuration_error().unwrap().node, picky);
        assert!(info.render_index().is_some());

        assert!(matches!(
            engine.set_enabled(picky, true),
            Err(GraphError::Configuration(_))
        ));
        assert!(!engine.node(picky).unwrap().is_enabled());
    }

    #[test]
    fn reconfigure_retries_auto_disabled_nodes() {
        let (mut engine, mut processor) = GraphEngine::new(EngineConfig::new(48_000).with_max_block_size(2048));
        let picky = engine.add_node(Picky).id();
        let thru = engine.add_node(Thru).id();
        run(&mut processor);

        let errors = engine.reconfigure(48_000, 512);
        assert!(errors.is_empty());
        assert!(engine.node(picky).unwrap().is_enabled());
        assert!(engine.node(picky).unwrap().configuration_error().is_none());

        // the live node comes back through the audio thread
        assert!(!engine.is_settled());
        run(&mut processor);
        assert!(engine.maintain().is_empty());
        assert!(engine.is_settled());
        assert!(engine.node(thru).unwrap().is_enabled());
    }

    #[test]
    fn reconfigure_frees_recalled_slots_after_republishing() {
        let (mut engine, _processor) = GraphEngine::new(EngineConfig::new(48_000).with_max_block_size(2048));
        let thru = engine.add_node(Thru).id();
        let picky = engine.add_node(Picky).id();
        let Location::Live { slot: recalled } = engine.units[&thru].location else {
            panic!("thru is not live");
        };

        assert!(engine.reconfigure(48_000, 512).is_empty());
        let Location::Live { slot } = engine.units[&picky].location else {
            panic!("picky did not go live");
        };
        assert_ne!(slot, recalled);
        assert!(engine.free_slots.contains(&recalled));
        assert!(matches!(engine.units[&thru].location, Location::Recalling));
    }

    #[test]
    fn small_command_queue_holds_back_commands() {
        let (mut engine, mut processor) = GraphEngine::new(
            EngineConfig::new(48_000)
                .with_max_block_size(64)
                .with_command_queue_size(2)
                .with_node_capacity(1),
        );
        for _ in 0..4 {
            engine.add_node(Thru);
        }
        assert!(!engine.is_settled());
        for _ in 0..16 {
            run(&mut processor);
            engine.maintain();
        }
        assert!(engine.is_settled());
        assert_eq!(processor.generation(), engine.render_sequence().unwrap().generation());
    }

    #[test]
    fn disconnect_is_idempotent() {
        let (mut engine, _processor) = engine();
        let a = engine.add_node(Thru).id();
        let b = engine.add_node(Thru).id();
        let c = Connection::new(a, 1, b, 0);
        engine.connect(c).unwrap();
        assert!(engine.disconnect(c));
        assert!(!engine.disconnect(c));
    }
}
