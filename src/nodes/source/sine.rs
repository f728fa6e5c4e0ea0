//! Sine wave oscillator

use crate::node::{Node, ProcessContext, RenderIo};
use crate::port::PortLayout;

/// Messages to control a Sine oscillator
#[derive(Clone, Copy, Debug)]
pub enum SineMessage {
    SetFrequency(f32),
    SetAmplitude(f32),
}

/// A sine wave oscillator (mono source)
///
/// Connecting control input 0 adds its value, in Hz, to the frequency.
pub struct Sine {
    frequency: f32,
    phase: f32,
    amplitude: f32,
}

impl Sine {
    pub fn new(frequency: f32) -> Self {
        Self {
            frequency,
            phase: 0.0,
            amplitude: 0.25, // -12dB, safe default
        }
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    #[inline]
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    #[inline]
    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }
}

impl Node for Sine {
    type Message = SineMessage;

    fn ports(&self) -> PortLayout {
        PortLayout::new()
            .control_inputs(1)
            .audio_outputs(1)
    }

    fn render(
        &mut self,
        ctx: &ProcessContext,
        messages: impl Iterator<Item = SineMessage>,
        io: &mut RenderIo<'_>,
    ) {
        // Handle messages first
        for msg in messages {
            match msg {
                SineMessage::SetFrequency(f) => self.frequency = f.max(0.0),
                SineMessage::SetAmplitude(a) => self.amplitude = a.clamp(0.0, 1.0),
            }
        }

        let modulation = io.control_input(0);
        let rate = ctx.sample_rate as f32;
        let frequency = self.frequency;
        let amplitude = self.amplitude;
        let Some(out) = io.audio_output(0) else {
            return;
        };

        for (sample, fm) in out.iter_mut().zip(modulation) {
            *sample = (self.phase * core::f32::consts::TAU).sin() * amplitude;

            self.phase += (frequency + fm).max(0.0) / rate;
            // Branchless phase wrap (phase is always positive)
            self.phase -= (self.phase >= 1.0) as u32 as f32;
        }
    }
}
