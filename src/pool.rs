//! Pre-sized scratch storage the processor renders into.

use alloc::vec;
use alloc::vec::Vec;

use crate::midi::MidiBuffer;
use crate::sequence::{RenderSequence, StagingShape};

/// Dimensions of a [`ScratchPool`], tracked on the control thread so it knows
/// when a new render sequence needs a bigger pool.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) struct PoolShape {
    pub block_size: usize,
    pub midi_capacity: usize,
    pub signal_slots: usize,
    pub midi_slots: usize,
    pub staging: StagingShape,
}

impl PoolShape {
    /// Just the silent slots.
    pub fn empty(block_size: usize, midi_capacity: usize) -> Self {
        Self {
            block_size,
            midi_capacity,
            signal_slots: 1,
            midi_slots: 1,
            staging: StagingShape::default(),
        }
    }

    /// Whether `sequence` can run against a pool of this shape.
    pub fn fits(&self, sequence: &RenderSequence, block_size: usize, midi_capacity: usize) -> bool {
        let staging = sequence.staging();
        self.block_size == block_size
            && self.midi_capacity == midi_capacity
            && self.signal_slots >= sequence.signal_slots()
            && self.midi_slots >= sequence.midi_slots()
            && self.staging.audio >= staging.audio
            && self.staging.control >= staging.control
            && self.staging.midi >= staging.midi
    }

    /// A shape able to run `sequence` as well as anything this one could run.
    ///
    /// The old sequence keeps running against the new pool until the new
    /// sequence is published, so slot counts never shrink.
    pub fn grown_for(&self, sequence: &RenderSequence, block_size: usize, midi_capacity: usize) -> Self {
        let staging = sequence.staging();
        Self {
            block_size,
            midi_capacity,
            signal_slots: self.signal_slots.max(sequence.signal_slots()),
            midi_slots: self.midi_slots.max(sequence.midi_slots()),
            staging: StagingShape {
                audio: self.staging.audio.max(staging.audio),
                control: self.staging.control.max(staging.control),
                midi: self.staging.midi.max(staging.midi),
            },
        }
    }
}

/// Buffers the audio thread renders into.
///
/// Allocated on the control thread and moved to the audio thread whole.
pub(crate) struct ScratchPool {
    pub block_size: usize,
    pub signals: Vec<Vec<f32>>,
    pub midi: Vec<MidiBuffer>,
    pub staging: Staging,
    /// Host MIDI input of the current sub-block, rebased to frame 0.
    pub host_midi_in: MidiBuffer,
    /// Graph MIDI output of the whole callback, handed to the host at the end.
    pub host_midi_out: MidiBuffer,
}

/// Holds the output buffers of the step being rendered while its inputs stay
/// borrowed from the pool. Never filled past its initial capacity.
pub(crate) struct Staging {
    pub audio: Vec<Vec<f32>>,
    pub control: Vec<Vec<f32>>,
    pub midi: Vec<MidiBuffer>,
}

impl ScratchPool {
    pub fn new(shape: PoolShape) -> Self {
        let midi_buffer = || MidiBuffer::with_capacity(shape.midi_capacity);
        Self {
            block_size: shape.block_size,
            signals: vec![vec![0.0; shape.block_size]; shape.signal_slots.max(1)],
            midi: (0..shape.midi_slots.max(1)).map(|_| midi_buffer()).collect(),
            staging: Staging {
                audio: Vec::with_capacity(shape.staging.audio),
                control: Vec::with_capacity(shape.staging.control),
                midi: Vec::with_capacity(shape.staging.midi),
            },
            host_midi_in: midi_buffer(),
            host_midi_out: midi_buffer(),
        }
    }

    /// Carry slot contents over from the pool being replaced, so values read
    /// one block late survive the swap. Runs on the audio thread.
    pub fn absorb(&mut self, old: &ScratchPool) {
        for (new, old) in self.signals.iter_mut().zip(&old.signals) {
            let n = new.len().min(old.len());
            new[..n].copy_from_slice(&old[..n]);
        }
        for (new, old) in self.midi.iter_mut().zip(&old.midi) {
            new.copy_from(old);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MidiEvent;

    fn sequence(signal_slots: usize, midi_slots: usize, staging: StagingShape) -> RenderSequence {
        RenderSequence {
            signal_slots,
            midi_slots,
            staging,
            ..RenderSequence::empty(48_000)
        }
    }

    #[test]
    fn sized_from_shape() {
        let seq = sequence(4, 2, StagingShape { audio: 2, control: 1, midi: 1 });
        let shape = PoolShape::empty(128, 16).grown_for(&seq, 128, 16);
        let pool = ScratchPool::new(shape);
        assert_eq!(pool.signals.len(), 4);
        assert!(pool.signals.iter().all(|s| s.len() == 128));
        assert_eq!(pool.midi.len(), 2);
        assert!(pool.staging.audio.capacity() >= 2);
        assert!(shape.fits(&seq, 128, 16));
        assert!(!shape.fits(&seq, 256, 16));
        assert!(!shape.fits(&sequence(5, 2, StagingShape::default()), 128, 16));
    }

    #[test]
    fn grown_shape_keeps_old_high_water_marks() {
        let big = sequence(6, 3, StagingShape { audio: 4, control: 0, midi: 1 });
        let small = sequence(2, 1, StagingShape { audio: 1, control: 2, midi: 0 });
        let shape = PoolShape::empty(64, 8).grown_for(&big, 64, 8).grown_for(&small, 64, 8);
        assert!(shape.fits(&big, 64, 8));
        assert!(shape.fits(&small, 64, 8));
    }

    #[test]
    fn absorb_copies_overlapping_slots() {
        let mut old = ScratchPool::new(PoolShape {
            signal_slots: 3,
            midi_slots: 2,
            ..PoolShape::empty(4, 4)
        });
        old.signals[2].copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        old.midi[1].push(MidiEvent::note_on(1, 0, 60, 100)).unwrap();

        let mut new = ScratchPool::new(PoolShape {
            signal_slots: 4,
            midi_slots: 2,
            ..PoolShape::empty(8, 4)
        });
        new.absorb(&old);
        assert_eq!(&new.signals[2][..4], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(new.signals[2][4], 0.0);
        assert_eq!(new.midi[1].len(), 1);
    }
}
