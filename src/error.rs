//! Errors returned by control-thread mutations.
//!
//! Nothing in here is ever produced by [`GraphProcessor::process`](crate::GraphProcessor::process):
//! every check happens before a render sequence is published.

use alloc::string::String;
use alloc::vec::Vec;

use itertools::Itertools;
use thiserror::Error;

use crate::connection::Connection;
use crate::node::NodeId;
use crate::port::PortKind;

/// Why a connection was rejected by the connection set.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// A node or port index does not exist, or the port points the wrong way
    /// (the source must be an output, the destination an input).
    #[error("invalid port reference in {connection}: {reason}")]
    InvalidPort {
        connection: Connection,
        reason: &'static str,
    },
    #[error("port kinds differ in {connection}: {source_kind} -> {dest_kind}")]
    TypeMismatch {
        connection: Connection,
        source_kind: PortKind,
        dest_kind: PortKind,
    },
    #[error("connection {0} already exists")]
    DuplicateConnection(Connection),
    /// An audio input is already fed by `existing`.
    #[error("audio input of {connection} is already driven by {existing}")]
    InputAlreadyDriven {
        connection: Connection,
        existing: Connection,
    },
}

/// The topology contains a cycle of audio or control connections.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("cycle between nodes [{}]", .nodes.iter().join(", "))]
pub struct CycleError {
    /// Nodes that lie on a cycle, in ascending id order.
    pub nodes: Vec<NodeId>,
}

/// A node refused the sample rate or block size it was prepared with.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("node {node} cannot be prepared: {reason}")]
pub struct ConfigurationError {
    pub node: NodeId,
    pub reason: String,
}

/// Any error a [`GraphEngine`](crate::GraphEngine) mutation can return.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Cycle(#[from] CycleError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("node {0} not found")]
    NotFound(NodeId),
}
