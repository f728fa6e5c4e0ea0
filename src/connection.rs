//! Connections between node ports.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::fmt;

use crate::error::ConnectionError;
use crate::node::NodeId;
use crate::port::{PortKind, PortLayout};

/// A directed arc from an output port of `source` to an input port of `dest`.
///
/// Ports are indices into the node's [`PortLayout`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Connection {
    pub source: NodeId,
    pub source_port: usize,
    pub dest: NodeId,
    pub dest_port: usize,
}

impl Connection {
    pub fn new(source: NodeId, source_port: usize, dest: NodeId, dest_port: usize) -> Self {
        Self {
            source,
            source_port,
            dest,
            dest_port,
        }
    }

    /// Whether either end is on `node`.
    #[inline]
    pub fn touches(&self, node: NodeId) -> bool {
        self.source == node || self.dest == node
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.source, self.source_port, self.dest, self.dest_port
        )
    }
}

/// The validated set of connections of a graph.
///
/// Iteration order is the derived `Ord` of [`Connection`] (source, then
/// destination), which keeps render sequence building deterministic.
#[derive(Clone, Debug, Default)]
pub struct ConnectionSet {
    arcs: BTreeSet<Connection>,
}

impl ConnectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and insert a connection.
    ///
    /// `ports` looks up the port layout of a node, `None` if the node does not exist.
    pub fn try_add<'p>(
        &mut self,
        connection: Connection,
        ports: impl Fn(NodeId) -> Option<&'p PortLayout>,
    ) -> Result<(), ConnectionError> {
        let invalid = |reason| ConnectionError::InvalidPort { connection, reason };

        let source_port = ports(connection.source)
            .ok_or_else(|| invalid("source node does not exist"))?
            .get(connection.source_port)
            .ok_or_else(|| invalid("source port does not exist"))?;
        let dest_port = ports(connection.dest)
            .ok_or_else(|| invalid("destination node does not exist"))?
            .get(connection.dest_port)
            .ok_or_else(|| invalid("destination port does not exist"))?;

        if !source_port.is_output() {
            return Err(invalid("source port is not an output"));
        }
        if !dest_port.is_input() {
            return Err(invalid("destination port is not an input"));
        }
        if source_port.kind() != dest_port.kind() {
            return Err(ConnectionError::TypeMismatch {
                connection,
                source_kind: source_port.kind(),
                dest_kind: dest_port.kind(),
            });
        }
        if self.arcs.contains(&connection) {
            return Err(ConnectionError::DuplicateConnection(connection));
        }
        if dest_port.kind() == PortKind::Audio {
            if let Some(existing) = self.driver_of(connection.dest, connection.dest_port) {
                return Err(ConnectionError::InputAlreadyDriven { connection, existing });
            }
        }

        self.arcs.insert(connection);
        Ok(())
    }

    /// Remove a connection. Removing a connection that does not exist is a no-op.
    pub fn remove(&mut self, connection: &Connection) -> bool {
        self.arcs.remove(connection)
    }

    /// Remove every connection touching `node` and return them.
    pub fn remove_node(&mut self, node: NodeId) -> Vec<Connection> {
        let touching: Vec<Connection> = self.arcs.iter().filter(|c| c.touches(node)).copied().collect();
        for c in &touching {
            self.arcs.remove(c);
        }
        touching
    }

    /// Keep only connections for which `keep` returns true, returning the others.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&Connection) -> bool) -> Vec<Connection> {
        let dropped: Vec<Connection> = self.arcs.iter().filter(|c| !keep(c)).copied().collect();
        for c in &dropped {
            self.arcs.remove(c);
        }
        dropped
    }

    #[inline]
    pub fn contains(&self, connection: &Connection) -> bool {
        self.arcs.contains(connection)
    }

    /// The connection feeding a given input port, if any.
    pub fn driver_of(&self, dest: NodeId, dest_port: usize) -> Option<Connection> {
        self.incoming(dest).find(|c| c.dest_port == dest_port)
    }

    /// Connections arriving at `node`.
    pub fn incoming(&self, node: NodeId) -> impl Iterator<Item = Connection> + '_ {
        self.arcs.iter().filter(move |c| c.dest == node).copied()
    }

    /// Connections leaving `node`.
    pub fn outgoing(&self, node: NodeId) -> impl Iterator<Item = Connection> + '_ {
        self.arcs.iter().filter(move |c| c.source == node).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> + '_ {
        self.arcs.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashMap;

    fn layouts() -> HashMap<NodeId, PortLayout> {
        let mut map = HashMap::new();
        map.insert(NodeId(0), PortLayout::new().audio_outputs(1).midi_output());
        map.insert(NodeId(1), PortLayout::new().audio_outputs(1));
        map.insert(
            NodeId(2),
            PortLayout::new().audio_inputs(1).midi_input().control_inputs(1).audio_outputs(1),
        );
        map
    }

    fn add(set: &mut ConnectionSet, map: &HashMap<NodeId, PortLayout>, c: Connection) -> Result<(), ConnectionError> {
        set.try_add(c, |id| map.get(&id))
    }

    #[test]
    fn accepts_matching_ports() {
        let map = layouts();
        let mut set = ConnectionSet::new();
        add(&mut set, &map, Connection::new(NodeId(0), 0, NodeId(2), 0)).unwrap();
        add(&mut set, &map, Connection::new(NodeId(0), 1, NodeId(2), 1)).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.incoming(NodeId(2)).count(), 2);
        assert_eq!(set.outgoing(NodeId(0)).count(), 2);
    }

    #[test]
    fn rejects_missing_nodes_and_ports() {
        let map = layouts();
        let mut set = ConnectionSet::new();
        let missing_node = Connection::new(NodeId(9), 0, NodeId(2), 0);
        assert!(matches!(
            add(&mut set, &map, missing_node),
            Err(ConnectionError::InvalidPort { .. })
        ));
        let missing_port = Connection::new(NodeId(0), 5, NodeId(2), 0);
        assert!(matches!(
            add(&mut set, &map, missing_port),
            Err(ConnectionError::InvalidPort { .. })
        ));
        assert!(set.is_empty());
    }

    #[test]
    fn rejects_wrong_direction() {
        let map = layouts();
        let mut set = ConnectionSet::new();
        // input port used as source
        let backwards = Connection::new(NodeId(2), 0, NodeId(2), 0);
        assert!(matches!(
            add(&mut set, &map, backwards),
            Err(ConnectionError::InvalidPort { reason: "source port is not an output", .. })
        ));
    }

    #[test]
    fn rejects_kind_mismatch() {
        let map = layouts();
        let mut set = ConnectionSet::new();
        let c = Connection::new(NodeId(0), 1, NodeId(2), 0);
        assert_eq!(
            add(&mut set, &map, c),
            Err(ConnectionError::TypeMismatch {
                connection: c,
                source_kind: PortKind::Midi,
                dest_kind: PortKind::Audio,
            })
        );
    }

    #[test]
    fn rejects_duplicates_and_second_audio_driver() {
        let map = layouts();
        let mut set = ConnectionSet::new();
        let first = Connection::new(NodeId(0), 0, NodeId(2), 0);
        add(&mut set, &map, first).unwrap();
        assert_eq!(
            add(&mut set, &map, first),
            Err(ConnectionError::DuplicateConnection(first))
        );
        let second = Connection::new(NodeId(1), 0, NodeId(2), 0);
        assert_eq!(
            add(&mut set, &map, second),
            Err(ConnectionError::InputAlreadyDriven {
                connection: second,
                existing: first,
            })
        );
    }

    #[test]
    fn remove_is_idempotent() {
        let map = layouts();
        let mut set = ConnectionSet::new();
        let c = Connection::new(NodeId(0), 0, NodeId(2), 0);
        add(&mut set, &map, c).unwrap();
        assert!(set.remove(&c));
        assert!(!set.remove(&c));
        assert!(set.is_empty());
    }

    #[test]
    fn remove_node_drops_every_touching_arc() {
        let map = layouts();
        let mut set = ConnectionSet::new();
        add(&mut set, &map, Connection::new(NodeId(0), 0, NodeId(2), 0)).unwrap();
        add(&mut set, &map, Connection::new(NodeId(0), 1, NodeId(2), 1)).unwrap();
        let removed = set.remove_node(NodeId(2));
        assert_eq!(removed.len(), 2);
        assert!(set.iter().all(|c| !c.touches(NodeId(2))));
    }
}
