//! Bridge nodes: events produced outside the graph, delivered on the audio thread

mod midi_bridge;

pub use midi_bridge::{MidiBridge, MidiBridgeSender};
