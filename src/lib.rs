//! klingt-graph - real-time audio/MIDI node graph
//!
//! Design principles:
//! - The control thread owns the topology; the audio thread only executes
//!   compiled [`RenderSequence`]s
//! - Nodes receive parameters via message ring buffers, not shared state
//! - No locks and no allocation on the audio thread: everything it uses is
//!   built on the control thread and handed over through `rtrb` queues
//! - Rejected mutations never reach the audio thread
//!
//! ```
//! use klingt_graph::nodes::effect::{Gain, GainMessage};
//! use klingt_graph::nodes::source::Sine;
//! use klingt_graph::{Connection, EngineConfig, GraphEngine, MidiBuffer};
//!
//! let (mut engine, mut processor) = GraphEngine::new(EngineConfig::new(48_000));
//!
//! let sine = engine.add_node(Sine::new(220.0));
//! let mut gain = engine.add_node(Gain::new(0.5));
//! let out = engine.add_audio_output(2);
//!
//! engine.connect(Connection::new(sine.id(), 1, gain.id(), 0)).unwrap();
//! engine.connect(Connection::new(gain.id(), 3, out, 0)).unwrap();
//! engine.connect(Connection::new(gain.id(), 4, out, 1)).unwrap();
//! gain.send(GainMessage::SetGain(0.25)).unwrap();
//!
//! // audio callback
//! let (mut left, mut right) = ([0.0f32; 128], [0.0f32; 128]);
//! let mut midi = MidiBuffer::with_capacity(64);
//! processor.process(&mut [&mut left[..], &mut right[..]], &mut midi);
//!
//! // control thread, from time to time
//! engine.maintain();
//! ```

extern crate alloc;

mod builder;
mod config;
mod connection;
mod engine;
mod error;
mod midi;
mod node;
mod pool;
mod port;
mod processor;
mod sequence;

pub mod nodes;

pub use config::EngineConfig;
pub use connection::{Connection, ConnectionSet};
pub use engine::{GraphEngine, Handle, NodeInfo};
pub use error::{ConfigurationError, ConnectionError, CycleError, GraphError};
pub use midi::{MidiBuffer, MidiBufferFull, MidiEvent};
pub use node::{Node, NodeId, PrepareContext, PrepareError, ProcessContext, RenderIo};
pub use port::{Direction, Port, PortKind, PortLayout};
pub use processor::GraphProcessor;
pub use sequence::{Capture, Merge, RenderSequence, RenderStep, Routes, SlotSpace, StagingShape, StepAction};
