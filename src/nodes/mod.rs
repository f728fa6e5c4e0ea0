//! Built-in nodes
//!
//! Nodes are organized into three categories:
//! - `source`: Generate audio (no audio inputs) - oscillators
//! - `effect`: Process inputs into outputs - gain, mixing, feedback delay
//! - `bridge`: Feed events from outside the graph into it - MIDI from other threads

pub mod bridge;
pub mod effect;
pub mod source;

// Re-export common types at the top level for convenience
pub use bridge::{MidiBridge, MidiBridgeSender};
pub use effect::{FeedbackDelay, Gain, GainMessage, Mixer, MixerMessage};
pub use source::{Sine, SineMessage};
