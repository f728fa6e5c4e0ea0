//! Source nodes (generators with no audio inputs)

mod sine;

pub use sine::{Sine, SineMessage};
