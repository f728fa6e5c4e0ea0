//! MIDI event storage for the render path.
//!
//! [`MidiBuffer`] has a fixed capacity chosen on the control thread. Pushing
//! into a full buffer fails instead of reallocating, so buffers can be filled
//! and merged on the audio thread.

use alloc::vec::Vec;

/// A short (at most three byte) MIDI message at a frame offset within a block.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MidiEvent {
    /// Frame offset from the start of the block.
    pub frame: u32,
    bytes: [u8; 3],
    len: u8,
}

impl MidiEvent {
    /// Build an event from raw bytes. Returns `None` for empty or oversized messages.
    pub fn new(frame: u32, data: &[u8]) -> Option<Self> {
        if data.is_empty() || data.len() > 3 {
            return None;
        }
        let mut bytes = [0u8; 3];
        bytes[..data.len()].copy_from_slice(data);
        Some(Self {
            frame,
            bytes,
            len: data.len() as u8,
        })
    }

    pub fn note_on(frame: u32, channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            frame,
            bytes: [0x90 | (channel & 0x0f), note & 0x7f, velocity & 0x7f],
            len: 3,
        }
    }

    pub fn note_off(frame: u32, channel: u8, note: u8) -> Self {
        Self {
            frame,
            bytes: [0x80 | (channel & 0x0f), note & 0x7f, 0],
            len: 3,
        }
    }

    pub fn control_change(frame: u32, channel: u8, controller: u8, value: u8) -> Self {
        Self {
            frame,
            bytes: [0xb0 | (channel & 0x0f), controller & 0x7f, value & 0x7f],
            len: 3,
        }
    }

    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    #[inline]
    pub fn status(&self) -> u8 {
        self.bytes[0]
    }

    /// The same message moved to another frame.
    #[inline]
    pub fn at(mut self, frame: u32) -> Self {
        self.frame = frame;
        self
    }
}

/// Returned when a [`MidiBuffer`] has no room left. Carries the rejected event.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct MidiBufferFull(pub MidiEvent);

/// Fixed capacity list of [`MidiEvent`]s, kept in frame order by the engine.
#[derive(Debug, Default)]
pub struct MidiBuffer {
    events: Vec<MidiEvent>,
}

// `Vec::clone` only keeps the length, the capacity is the buffer's limit.
impl Clone for MidiBuffer {
    fn clone(&self) -> Self {
        let mut buffer = Self::with_capacity(self.capacity());
        buffer.copy_from(self);
        buffer
    }
}

impl MidiBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.events.capacity()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Append an event without reordering.
    #[inline]
    pub fn push(&mut self, event: MidiEvent) -> Result<(), MidiBufferFull> {
        if self.events.len() == self.events.capacity() {
            return Err(MidiBufferFull(event));
        }
        self.events.push(event);
        Ok(())
    }

    /// Insert an event after every event with a frame less than or equal to its own.
    pub fn insert(&mut self, event: MidiEvent) -> Result<(), MidiBufferFull> {
        if self.events.len() == self.events.capacity() {
            return Err(MidiBufferFull(event));
        }
        let at = self.events.partition_point(|e| e.frame <= event.frame);
        self.events.insert(at, event);
        Ok(())
    }

    /// Merge `other` into this buffer in frame order. Events of equal frame keep
    /// their relative order, with events already present first. Events that do
    /// not fit are dropped; the number dropped is returned.
    pub fn merge_from(&mut self, other: &MidiBuffer) -> usize {
        let mut dropped = 0;
        for event in other.iter() {
            if self.insert(*event).is_err() {
                dropped += 1;
            }
        }
        dropped
    }

    /// Replace the contents with a copy of `other`, truncated to capacity.
    pub fn copy_from(&mut self, other: &MidiBuffer) {
        self.events.clear();
        let n = other.events.len().min(self.events.capacity());
        self.events.extend_from_slice(&other.events[..n]);
    }

    pub fn iter(&self) -> impl Iterator<Item = &MidiEvent> + '_ {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[MidiEvent] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_fails_when_full() {
        let mut buf = MidiBuffer::with_capacity(1);
        let cap = buf.capacity();
        for i in 0..cap {
            buf.push(MidiEvent::note_on(i as u32, 0, 60, 100)).unwrap();
        }
        let rejected = MidiEvent::note_off(7, 0, 60);
        assert_eq!(buf.push(rejected), Err(MidiBufferFull(rejected)));
        assert_eq!(buf.capacity(), cap);
    }

    #[test]
    fn clone_keeps_room_for_more_events() {
        let mut buf = MidiBuffer::with_capacity(8);
        buf.push(MidiEvent::note_on(3, 0, 60, 100)).unwrap();

        let mut copy = buf.clone();
        assert_eq!(copy.as_slice(), buf.as_slice());
        assert!(copy.capacity() >= buf.capacity());
        copy.push(MidiEvent::note_off(4, 0, 60)).unwrap();
        assert_eq!(copy.len(), 2);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn merge_keeps_frame_order_and_is_stable() {
        let mut a = MidiBuffer::with_capacity(8);
        a.push(MidiEvent::note_on(0, 0, 60, 100)).unwrap();
        a.push(MidiEvent::note_on(10, 0, 62, 100)).unwrap();

        let mut b = MidiBuffer::with_capacity(8);
        b.push(MidiEvent::note_off(0, 1, 40)).unwrap();
        b.push(MidiEvent::note_off(5, 1, 41)).unwrap();

        assert_eq!(a.merge_from(&b), 0);
        let frames: Vec<_> = a.iter().map(|e| (e.frame, e.status())).collect();
        assert_eq!(frames, vec![(0, 0x90), (0, 0x81), (5, 0x81), (10, 0x90)]);
    }

    #[test]
    fn merge_reports_dropped_events() {
        let mut a = MidiBuffer::with_capacity(1);
        let cap = a.capacity();
        let mut b = MidiBuffer::with_capacity(cap + 2);
        for i in 0..cap + 2 {
            b.push(MidiEvent::note_on(i as u32, 0, 1, 1)).unwrap();
        }
        assert_eq!(a.merge_from(&b), b.len() - cap);
        assert_eq!(a.len(), cap);
    }

    #[test]
    fn raw_event_bounds() {
        assert!(MidiEvent::new(0, &[]).is_none());
        assert!(MidiEvent::new(0, &[0xf8, 0, 0, 0]).is_none());
        assert_eq!(MidiEvent::new(3, &[0xf8]).unwrap().data(), &[0xf8]);
        assert_eq!(MidiEvent::control_change(0, 2, 7, 127).data(), &[0xb2, 7, 127]);
    }
}
