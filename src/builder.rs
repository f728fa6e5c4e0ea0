//! Render sequence builder.
//!
//! Turns the node set and connection set into a [`RenderSequence`]:
//!
//! 1. **Ordering** - Kahn's algorithm over audio and control connections
//!    ("hard" edges) and MIDI connections ("soft" edges). The ready set is
//!    ordered by node id, so identical topologies always produce identical
//!    sequences. When only soft edges block progress, the lowest-id node
//!    without pending hard edges on a cycle nothing else still feeds is
//!    started, and its pending MIDI inputs arrive one block late. Connections into a feedback delay node never order
//!    anything.
//! 2. **Cycle diagnosis** - when hard edges block progress the build fails
//!    with a [`CycleError`] naming the nodes on hard cycles (strongly connected
//!    components).
//! 3. **Buffer planning** - liveness analysis: a slot is live from the step
//!    that writes it to the last step that reads it, then returns to the free
//!    list. Values read one block late get persistent slots, filled by
//!    captures after the last step.

use alloc::collections::BTreeSet;
use alloc::vec;
use alloc::vec::Vec;

use hashbrown::HashMap;
use itertools::Itertools;
use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;

use crate::connection::{Connection, ConnectionSet};
use crate::error::CycleError;
use crate::node::NodeId;
use crate::port::{PortKind, PortLayout};
use crate::sequence::{
    Capture, Merge, RenderSequence, RenderStep, Routes, SlotSpace, StagingShape, StepAction,
    SILENT_SLOT,
};

/// A node as seen by the builder.
pub(crate) struct BuildNode<'a> {
    pub id: NodeId,
    pub ports: &'a PortLayout,
    pub action: StepAction,
    pub feedback_delay: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Edge {
    /// Audio or control: the destination must run after the source.
    Hard,
    /// MIDI: ordered when possible, broken to resolve MIDI-only cycles.
    Soft,
    /// Into a feedback delay node: always one block late.
    Feedback,
}

struct Link {
    connection: Connection,
    src: usize,
    dst: usize,
    kind: PortKind,
    edge: Edge,
}

/// Build a render sequence. `nodes` must be sorted by id. Persistent slots
/// that `previous` filled from a different output are listed as fresh.
pub(crate) fn build(
    nodes: &[BuildNode<'_>],
    connections: &ConnectionSet,
    previous: Option<&RenderSequence>,
    sample_rate: u32,
    generation: u64,
) -> Result<RenderSequence, CycleError> {
    debug_assert!(nodes.windows(2).all(|w| w[0].id < w[1].id));

    let index: HashMap<NodeId, usize> = nodes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();
    let arcs = classify(nodes, &index, connections);

    let (order, broken) = sort(nodes, &arcs)?;

    let mut rank = vec![0usize; nodes.len()];
    for (step, &pos) in order.iter().enumerate() {
        rank[pos] = step;
    }

    let mut sequence = plan(nodes, &arcs, &broken, &order, &rank, sample_rate, generation);
    sequence.fresh = sequence
        .captures
        .iter()
        .filter(|capture| {
            previous.map_or(true, |previous| {
                !previous.captures.iter().any(|old| old.same_owner(capture))
            })
        })
        .map(|capture| (capture.space, capture.to))
        .collect();

    tracing::debug!(
        generation,
        steps = sequence.steps.len(),
        signal_slots = sequence.signal_slots,
        midi_slots = sequence.midi_slots,
        "built render sequence"
    );
    tracing::trace!(order = %sequence.order().join(" -> "), "render order");

    Ok(sequence)
}

fn classify(nodes: &[BuildNode<'_>], index: &HashMap<NodeId, usize>, connections: &ConnectionSet) -> Vec<Link> {
    connections
        .iter()
        .filter_map(|c| {
            let src = *index.get(&c.source)?;
            let dst = *index.get(&c.dest)?;
            let kind = nodes[src].ports.get(c.source_port)?.kind();
            let edge = if nodes[dst].feedback_delay {
                Edge::Feedback
            } else if kind == PortKind::Midi {
                Edge::Soft
            } else {
                Edge::Hard
            };
            Some(Link {
                connection: *c,
                src,
                dst,
                kind,
                edge,
            })
        })
        .collect()
}

/// Kahn's algorithm with lowest-id tie-breaking. Returns the order (as node
/// positions) and, per arc, whether it was broken to resolve a MIDI cycle.
fn sort(nodes: &[BuildNode<'_>], arcs: &[Link]) -> Result<(Vec<usize>, Vec<bool>), CycleError> {
    let n = nodes.len();
    let mut hard_in = vec![0usize; n];
    let mut soft_in = vec![0usize; n];
    let mut out_arcs: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut soft_in_arcs: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (a, arc) in arcs.iter().enumerate() {
        match arc.edge {
            Edge::Hard => hard_in[arc.dst] += 1,
            Edge::Soft => {
                soft_in[arc.dst] += 1;
                soft_in_arcs[arc.dst].push(a);
            }
            Edge::Feedback => continue,
        }
        out_arcs[arc.src].push(a);
    }

    // Positions are in id order, so the smallest position is the lowest id.
    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| hard_in[i] == 0 && soft_in[i] == 0).collect();
    let mut placed = vec![false; n];
    let mut broken = vec![false; arcs.len()];
    let mut order = Vec::with_capacity(n);

    while order.len() < n {
        let next = match ready.pop_first() {
            Some(next) => next,
            None => {
                let entry = on_entry_cycle(n, arcs, &placed, &broken);
                let Some(stuck) = (0..n).find(|&i| entry[i] && !placed[i] && hard_in[i] == 0) else {
                    return Err(cycle_error(nodes, arcs, &placed));
                };
                for &a in &soft_in_arcs[stuck] {
                    if !placed[arcs[a].src] && !broken[a] {
                        broken[a] = true;
                    }
                }
                soft_in[stuck] = 0;
                tracing::debug!(node = %nodes[stuck].id, "midi cycle: inputs delayed by one block");
                stuck
            }
        };

        placed[next] = true;
        order.push(next);

        for &a in &out_arcs[next] {
            if broken[a] {
                continue;
            }
            let dst = arcs[a].dst;
            match arcs[a].edge {
                Edge::Hard => hard_in[dst] -= 1,
                Edge::Soft => soft_in[dst] -= 1,
                Edge::Feedback => {}
            }
            if !placed[dst] && hard_in[dst] == 0 && soft_in[dst] == 0 {
                ready.insert(dst);
            }
        }
    }

    Ok((order, broken))
}

/// Per node position, whether it lies on a cycle of pending ordering arcs
/// that no other pending arc feeds from outside the cycle.
fn on_entry_cycle(n: usize, arcs: &[Link], placed: &[bool], broken: &[bool]) -> Vec<bool> {
    let mut graph = DiGraph::<usize, ()>::new();
    let vertices: Vec<_> = (0..n).map(|i| graph.add_node(i)).collect();
    let pending: Vec<&Link> = arcs
        .iter()
        .enumerate()
        .filter(|&(a, arc)| arc.edge != Edge::Feedback && !broken[a] && !placed[arc.src] && !placed[arc.dst])
        .map(|(_, arc)| arc)
        .collect();
    for arc in &pending {
        graph.add_edge(vertices[arc.src], vertices[arc.dst], ());
    }

    let sccs = tarjan_scc(&graph);
    let mut component = vec![0usize; n];
    for (c, scc) in sccs.iter().enumerate() {
        for &v in scc {
            component[graph[v]] = c;
        }
    }
    let mut fed = vec![false; sccs.len()];
    for arc in &pending {
        if component[arc.src] != component[arc.dst] {
            fed[component[arc.dst]] = true;
        }
    }

    let mut entry = vec![false; n];
    for (c, scc) in sccs.iter().enumerate() {
        let cyclic = scc.len() > 1 || graph.find_edge(scc[0], scc[0]).is_some();
        if cyclic && !fed[c] {
            for &v in scc {
                entry[graph[v]] = true;
            }
        }
    }
    entry
}

/// Nodes of the unplaced remainder that sit on a hard cycle.
fn cycle_error(nodes: &[BuildNode<'_>], arcs: &[Link], placed: &[bool]) -> CycleError {
    let mut graph = DiGraph::<usize, ()>::new();
    let vertices: Vec<_> = (0..nodes.len()).map(|i| graph.add_node(i)).collect();
    for arc in arcs.iter().filter(|a| a.edge == Edge::Hard) {
        graph.add_edge(vertices[arc.src], vertices[arc.dst], ());
    }

    let mut involved: Vec<NodeId> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.find_edge(scc[0], scc[0]).is_some())
        .flatten()
        .map(|v| graph[v])
        .filter(|&pos| !placed[pos])
        .map(|pos| nodes[pos].id)
        .collect();

    if involved.is_empty() {
        involved = (0..nodes.len()).filter(|&i| !placed[i]).map(|i| nodes[i].id).collect();
    }
    involved.sort();

    tracing::debug!(nodes = %involved.iter().join(", "), "render sequence rejected: cycle");
    CycleError { nodes: involved }
}

/// Free-list allocator for one slot space.
struct Slots {
    free: BTreeSet<usize>,
    next: usize,
    live: Vec<(usize, usize)>,
}

impl Slots {
    fn new(first: usize) -> Self {
        Self {
            free: BTreeSet::new(),
            next: first,
            live: Vec::new(),
        }
    }

    /// Return every slot whose last reader ran before `step`.
    fn release_before(&mut self, step: usize) {
        let free = &mut self.free;
        self.live.retain(|&(last_use, slot)| {
            if last_use < step {
                free.insert(slot);
                false
            } else {
                true
            }
        });
    }

    fn alloc(&mut self, last_use: usize) -> usize {
        let slot = self.free.pop_first().unwrap_or_else(|| {
            let slot = self.next;
            self.next += 1;
            slot
        });
        self.live.push((last_use, slot));
        slot
    }
}

#[derive(Clone, Copy, Default)]
struct Value {
    last_use: Option<usize>,
    persistent: Option<usize>,
    slot: usize,
}

fn plan(
    nodes: &[BuildNode<'_>],
    arcs: &[Link],
    broken: &[bool],
    order: &[usize],
    rank: &[usize],
    sample_rate: u32,
    generation: u64,
) -> RenderSequence {
    let end = order.len();
    let mut values: HashMap<(usize, usize), Value> = HashMap::new();
    let mut incoming: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    let mut persistent_signal = 0;
    let mut persistent_midi = 0;

    for (a, arc) in arcs.iter().enumerate() {
        let value = values.entry((arc.src, arc.connection.source_port)).or_default();
        let delayed = arc.edge == Edge::Feedback || broken[a];
        if delayed {
            // captured after the last step
            value.last_use = Some(end);
            if value.persistent.is_none() {
                // Persistent slots sit right after the silent slot.
                let counter = if arc.kind.is_signal() {
                    &mut persistent_signal
                } else {
                    &mut persistent_midi
                };
                *counter += 1;
                value.persistent = Some(*counter);
            }
        } else {
            let read_at = match nodes[arc.dst].action {
                StepAction::AudioOut | StepAction::MidiOut => end,
                _ => rank[arc.dst],
            };
            value.last_use = Some(value.last_use.map_or(read_at, |l| l.max(read_at)));
        }
        incoming.entry((arc.dst, arc.connection.dest_port)).or_default().push(a);
    }

    let mut signal = Slots::new(1 + persistent_signal);
    let mut midi = Slots::new(1 + persistent_midi);
    let mut staging = StagingShape::default();
    let mut host_outputs = Vec::new();
    let mut steps = Vec::with_capacity(order.len());
    let mut captures = Vec::new();

    for (step, &pos) in order.iter().enumerate() {
        signal.release_before(step);
        midi.release_before(step);

        let node = &nodes[pos];
        let host_output = matches!(node.action, StepAction::AudioOut | StepAction::MidiOut);
        let mut inputs: Routes<Option<usize>> = Routes::default();
        let mut outputs: Routes<usize> = Routes::default();
        let mut merges = Vec::new();

        for (port_index, port) in node.ports.iter().enumerate() {
            let space = SlotSpace::from(port.kind());
            let slots = match space {
                SlotSpace::Signal => &mut signal,
                SlotSpace::Midi => &mut midi,
            };

            if port.is_input() {
                let sources: Vec<usize> = incoming
                    .get(&(pos, port_index))
                    .into_iter()
                    .flatten()
                    .map(|&a| {
                        let arc = &arcs[a];
                        let value = values[&(arc.src, arc.connection.source_port)];
                        if arc.edge == Edge::Feedback || broken[a] {
                            value.persistent.unwrap_or(SILENT_SLOT)
                        } else {
                            value.slot
                        }
                    })
                    .collect();

                let route = match sources.len() {
                    0 => None,
                    1 => Some(sources[0]),
                    _ => {
                        // Host outputs are read after the last step.
                        let dest = slots.alloc(if host_output { end } else { step });
                        merges.push(Merge { space, dest, sources });
                        Some(dest)
                    }
                };
                inputs.of_mut(port.kind()).push(route);
            } else {
                let value = values.entry((pos, port_index)).or_default();
                let slot = slots.alloc(value.last_use.unwrap_or(step).max(step));
                value.slot = slot;
                if let Some(to) = value.persistent {
                    captures.push(Capture {
                        space,
                        from: slot,
                        to,
                        source: node.id,
                        port: port_index,
                    });
                }
                outputs.of_mut(port.kind()).push(slot);
            }
        }

        staging.audio = staging.audio.max(outputs.audio.len());
        staging.control = staging.control.max(outputs.control.len());
        staging.midi = staging.midi.max(outputs.midi.len());

        if host_output {
            host_outputs.push(step);
        }

        steps.push(RenderStep {
            node: node.id,
            action: node.action,
            merges,
            inputs,
            outputs,
        });
    }

    RenderSequence {
        generation,
        sample_rate,
        steps,
        signal_slots: signal.next,
        midi_slots: midi.next,
        staging,
        captures,
        fresh: Vec::new(),
        host_outputs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        layouts: Vec<(NodeId, PortLayout, StepAction, bool)>,
        connections: ConnectionSet,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                layouts: Vec::new(),
                connections: ConnectionSet::new(),
            }
        }

        fn node(&mut self, layout: PortLayout) -> NodeId {
            self.node_with(layout, false)
        }

        fn node_with(&mut self, layout: PortLayout, feedback_delay: bool) -> NodeId {
            let id = NodeId(self.layouts.len() as u32);
            self.layouts
                .push((id, layout, StepAction::Render { slot: id.0 as usize }, feedback_delay));
            id
        }

        fn host_out(&mut self, channels: usize) -> NodeId {
            let id = NodeId(self.layouts.len() as u32);
            self.layouts
                .push((id, PortLayout::new().audio_inputs(channels), StepAction::AudioOut, false));
            id
        }

        fn connect(&mut self, from: NodeId, from_port: usize, to: NodeId, to_port: usize) {
            let layouts = &self.layouts;
            self.connections
                .try_add(Connection::new(from, from_port, to, to_port), |id| {
                    layouts.iter().find(|l| l.0 == id).map(|l| &l.1)
                })
                .unwrap();
        }

        fn build(&self) -> Result<RenderSequence, CycleError> {
            self.build_after(None)
        }

        fn build_after(&self, previous: Option<&RenderSequence>) -> Result<RenderSequence, CycleError> {
            let nodes: Vec<_> = self
                .layouts
                .iter()
                .map(|(id, ports, action, fb)| BuildNode {
                    id: *id,
                    ports,
                    action: *action,
                    feedback_delay: *fb,
                })
                .collect();
            build(&nodes, &self.connections, previous, 48_000, 1)
        }
    }

    fn source() -> PortLayout {
        PortLayout::new().audio_outputs(1)
    }

    fn effect() -> PortLayout {
        PortLayout::new().audio_inputs(1).audio_outputs(1)
    }

    fn order(seq: &RenderSequence) -> Vec<u32> {
        seq.order().map(NodeId::index).collect()
    }

    #[test]
    fn source_effect_mixer_scenario() {
        let mut f = Fixture::new();
        let a = f.node(source());
        let b = f.node(effect());
        let c = f.node(PortLayout::new().audio_inputs(2).audio_outputs(1));
        f.connect(a, 0, b, 0);
        f.connect(b, 1, c, 0);
        f.connect(a, 0, c, 1);

        let seq = f.build().unwrap();
        assert_eq!(order(&seq), vec![0, 1, 2]);

        let a_out = seq.steps()[0].outputs().audio[0];
        let b_out = seq.steps()[1].outputs().audio[0];
        assert_eq!(seq.steps()[1].inputs().audio, vec![Some(a_out)]);
        assert_eq!(seq.steps()[2].inputs().audio, vec![Some(b_out), Some(a_out)]);
        assert_ne!(a_out, b_out);
    }

    #[test]
    fn ties_break_on_lowest_id() {
        let mut f = Fixture::new();
        let sink = f.node(PortLayout::new().audio_inputs(2));
        let older = f.node(source());
        let newer = f.node(source());
        f.connect(newer, 0, sink, 0);
        f.connect(older, 0, sink, 1);
        assert_eq!(order(&f.build().unwrap()), vec![1, 2, 0]);
    }

    #[test]
    fn identical_topologies_give_identical_sequences() {
        let mut f = Fixture::new();
        let a = f.node(source());
        let b = f.node(effect());
        let c = f.node(effect());
        f.connect(a, 0, c, 0);
        f.connect(c, 1, b, 0);
        let first = f.build().unwrap();
        let second = f.build().unwrap();
        assert_eq!(first, second);
        assert_eq!(order(&first), vec![0, 2, 1]);
    }

    #[test]
    fn every_node_runs_after_its_signal_sources() {
        let mut f = Fixture::new();
        let ids: Vec<_> = (0..6).map(|_| f.node(PortLayout::new().audio_inputs(2).audio_outputs(1))).collect();
        f.connect(ids[5], 2, ids[0], 0);
        f.connect(ids[3], 2, ids[5], 0);
        f.connect(ids[4], 2, ids[3], 1);
        f.connect(ids[1], 2, ids[4], 0);
        f.connect(ids[2], 2, ids[0], 1);
        let seq = f.build().unwrap();
        let pos = |id: NodeId| seq.order().position(|n| n == id).unwrap();
        for c in f.connections.iter() {
            assert!(pos(c.source) < pos(c.dest), "{} out of order", c);
        }
    }

    #[test]
    fn audio_cycle_is_reported() {
        let mut f = Fixture::new();
        let a = f.node(effect());
        let b = f.node(effect());
        let downstream = f.node(effect());
        f.connect(a, 1, b, 0);
        f.connect(b, 1, a, 0);
        f.connect(b, 1, downstream, 0);
        assert_eq!(f.build(), Err(CycleError { nodes: vec![a, b] }));
    }

    #[test]
    fn audio_self_loop_is_a_cycle() {
        let mut f = Fixture::new();
        let a = f.node(effect());
        f.connect(a, 1, a, 0);
        assert_eq!(f.build(), Err(CycleError { nodes: vec![a] }));
    }

    #[test]
    fn midi_cycle_is_delayed_not_rejected() {
        let mut f = Fixture::new();
        let layout = || PortLayout::new().midi_input().midi_output();
        let a = f.node(layout());
        let b = f.node(layout());
        f.connect(a, 1, b, 0);
        f.connect(b, 1, a, 0);

        let seq = f.build().unwrap();
        assert_eq!(order(&seq), vec![0, 1]);
        // b -> a arrives one block late through a persistent slot
        assert_eq!(seq.captures().len(), 1);
        let capture = seq.captures()[0];
        assert_eq!(capture.from, seq.steps()[1].outputs().midi[0]);
        assert_eq!(seq.steps()[0].inputs().midi, vec![Some(capture.to)]);
        // a -> b is a plain forward route
        assert_eq!(seq.steps()[1].inputs().midi, vec![Some(seq.steps()[0].outputs().midi[0])]);
    }

    #[test]
    fn feedback_delay_closes_audio_loop() {
        let mut f = Fixture::new();
        let a = f.node(effect());
        let delay = f.node_with(effect(), true);
        f.connect(a, 1, delay, 0);
        f.connect(delay, 1, a, 0);

        let seq = f.build().unwrap();
        assert_eq!(order(&seq), vec![1, 0]);
        let a_step = seq.step_of(a).unwrap();
        assert_eq!(seq.captures().len(), 1);
        assert_eq!(seq.captures()[0].from, a_step.outputs().audio[0]);
        assert_eq!(
            seq.step_of(delay).unwrap().inputs().audio,
            vec![Some(seq.captures()[0].to)]
        );
    }

    #[test]
    fn feedback_slot_previously_holding_another_output_is_fresh() {
        let mut f = Fixture::new();
        let a = f.node(source());
        let delay = f.node_with(effect(), true);
        let out = f.host_out(2);
        f.connect(a, 0, out, 0);
        f.connect(delay, 1, out, 1);
        let first = f.build().unwrap();
        assert!(first.fresh_slots().is_empty());

        let b = f.node(source());
        f.connect(b, 0, delay, 0);
        let second = f.build_after(Some(&first)).unwrap();
        let capture = second.captures()[0];
        assert_eq!((capture.source, capture.port), (b, 0));
        // the slot held `a`'s output under the previous sequence
        assert_eq!(first.step_of(a).unwrap().outputs().audio[0], capture.to);
        assert_eq!(second.fresh_slots(), &[(SlotSpace::Signal, capture.to)]);

        let third = f.build_after(Some(&second)).unwrap();
        assert!(third.fresh_slots().is_empty());
    }

    #[test]
    fn midi_only_downstream_of_a_midi_loop_is_not_delayed() {
        let mut f = Fixture::new();
        let tail = f.node(PortLayout::new().midi_input());
        let layout = || PortLayout::new().midi_input().midi_output();
        let a = f.node(layout());
        let b = f.node(layout());
        f.connect(a, 1, b, 0);
        f.connect(b, 1, a, 0);
        f.connect(b, 1, tail, 0);

        let seq = f.build().unwrap();
        assert_eq!(order(&seq), vec![a.0, b.0, tail.0]);
        assert_eq!(seq.captures().len(), 1);
        assert_eq!(seq.captures()[0].source, b);
        let b_out = seq.step_of(b).unwrap().outputs().midi[0];
        assert_eq!(seq.step_of(tail).unwrap().inputs().midi, vec![Some(b_out)]);
    }

    #[test]
    fn linear_chain_ping_pongs_two_slots() {
        let mut f = Fixture::new();
        let mut prev = f.node(source());
        let mut prev_port = 0;
        for _ in 0..10 {
            let next = f.node(effect());
            f.connect(prev, prev_port, next, 0);
            prev = next;
            prev_port = 1;
        }
        let seq = f.build().unwrap();
        // silent slot + two scratch slots
        assert_eq!(seq.signal_slots(), 3);
        for step in seq.steps() {
            if let Some(Some(input)) = step.inputs().audio.first() {
                assert_ne!(*input, step.outputs().audio[0]);
            }
        }
    }

    #[test]
    fn control_fan_in_is_merged() {
        let mut f = Fixture::new();
        let lfo1 = f.node(PortLayout::new().control_outputs(1));
        let lfo2 = f.node(PortLayout::new().control_outputs(1));
        let target = f.node(PortLayout::new().control_inputs(1));
        f.connect(lfo1, 0, target, 0);
        f.connect(lfo2, 0, target, 0);

        let seq = f.build().unwrap();
        let step = seq.step_of(target).unwrap();
        assert_eq!(step.merges().len(), 1);
        let merge = &step.merges()[0];
        assert_eq!(merge.space, SlotSpace::Signal);
        assert_eq!(merge.sources.len(), 2);
        assert_eq!(step.inputs().control, vec![Some(merge.dest)]);
        assert!(!merge.sources.contains(&merge.dest));
    }

    #[test]
    fn host_output_inputs_stay_live_to_the_end() {
        let mut f = Fixture::new();
        let src = f.node(source());
        let out = f.host_out(1);
        let mut prev = f.node(source());
        let mut prev_port = 0;
        for _ in 0..4 {
            let next = f.node(effect());
            f.connect(prev, prev_port, next, 0);
            prev = next;
            prev_port = 1;
        }
        f.connect(src, 0, out, 0);

        let seq = f.build().unwrap();
        let held = seq.step_of(out).unwrap().inputs().audio[0].unwrap();
        let out_rank = seq.order().position(|n| n == out).unwrap();
        for step in &seq.steps()[out_rank + 1..] {
            assert!(!step.outputs().audio.contains(&held));
        }
        assert_eq!(seq.host_outputs, vec![out_rank]);
    }

    #[test]
    fn unconnected_inputs_route_to_nothing() {
        let mut f = Fixture::new();
        let id = f.node(PortLayout::new().audio_inputs(2).midi_input());
        let seq = f.build().unwrap();
        let step = seq.step_of(id).unwrap();
        assert_eq!(step.inputs().audio, vec![None, None]);
        assert_eq!(step.inputs().midi, vec![None]);
        assert_eq!(seq.signal_slots(), 1);
        assert_eq!(seq.midi_slots(), 1);
    }
}
