//! Effect nodes (processors with inputs and outputs)

mod feedback_delay;
mod gain;
mod mixer;

pub use feedback_delay::FeedbackDelay;
pub use gain::{Gain, GainMessage};
pub use mixer::{Mixer, MixerMessage, MAX_VOLUME_DB, MIN_VOLUME_DB};
