//! Gain/volume control effect

use crate::node::{Node, PrepareContext, PrepareError, ProcessContext, RenderIo};
use crate::port::{PortKind, PortLayout};

/// Messages to control gain
#[derive(Clone, Copy, Debug)]
pub enum GainMessage {
    /// Set the gain multiplier (1.0 = unity, 0.0 = silence)
    SetGain(f32),
}

/// A gain (volume) control that passes audio through with amplitude scaling
///
/// Each input channel maps to the corresponding output; an unconnected input
/// falls back to input 0, so a mono source fills every output. When control
/// input 0 is connected its samples multiply the gain.
pub struct Gain {
    channels: usize,
    gain: f32,
    /// Smoothing to prevent clicks on rapid gain changes
    smoothed_gain: f32,
    /// Smoothing coefficient (0.0 = instant, 1.0 = no change)
    smooth_coeff: f32,
    smoothing_ms: Option<f32>,
}

impl Gain {
    /// Create a new stereo gain node with the specified gain value
    pub fn new(gain: f32) -> Self {
        Self::with_channels(gain, 2)
    }

    pub fn with_channels(gain: f32, channels: usize) -> Self {
        Self {
            channels: channels.max(1),
            gain,
            smoothed_gain: gain,
            smooth_coeff: 0.995, // ~7ms at 48kHz
            smoothing_ms: None,
        }
    }

    /// Set the smoothing time in milliseconds, applied at the graph's sample rate
    pub fn with_smoothing_ms(mut self, ms: f32) -> Self {
        self.smoothing_ms = Some(ms);
        self
    }

    /// Disable smoothing for instant gain changes
    pub fn without_smoothing(mut self) -> Self {
        self.smooth_coeff = 0.0;
        self.smoothing_ms = None;
        self
    }

    #[inline]
    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl Node for Gain {
    type Message = GainMessage;

    fn ports(&self) -> PortLayout {
        PortLayout::new()
            .audio_inputs(self.channels)
            .control_inputs(1)
            .audio_outputs(self.channels)
    }

    fn prepare(&mut self, ctx: &PrepareContext) -> Result<(), PrepareError> {
        if let Some(ms) = self.smoothing_ms {
            // Time constant: after `ms` milliseconds, we've reached ~63% of target
            let samples = (ms / 1000.0) * ctx.sample_rate as f32;
            self.smooth_coeff = if samples > 0.0 { (-1.0 / samples).exp() } else { 0.0 };
        }
        Ok(())
    }

    fn render(
        &mut self,
        _ctx: &ProcessContext,
        messages: impl Iterator<Item = GainMessage>,
        io: &mut RenderIo<'_>,
    ) {
        // Update target gain from messages
        for msg in messages {
            match msg {
                GainMessage::SetGain(g) => self.gain = g,
            }
        }

        let modulation = io
            .is_input_connected(PortKind::Control, 0)
            .then(|| io.control_input(0));
        let smooth_coeff = self.smooth_coeff;
        let target_gain = self.gain;
        let start_gain = self.smoothed_gain;
        let mut end_gain = start_gain;

        for ch in 0..io.num_audio_outputs() {
            let source = if io.is_input_connected(PortKind::Audio, ch) { ch } else { 0 };
            let input = io.audio_input(source);
            let Some(out) = io.audio_output(ch) else {
                continue;
            };

            // Every channel starts from the same gain so they track together
            let mut gain = start_gain;
            for (i, (out_sample, &in_sample)) in out.iter_mut().zip(input).enumerate() {
                gain = target_gain + smooth_coeff * (gain - target_gain);
                let scale = modulation.map_or(gain, |m| gain * m[i]);
                *out_sample = in_sample * scale;
            }
            end_gain = gain;
        }

        self.smoothed_gain = end_gain;
    }
}
