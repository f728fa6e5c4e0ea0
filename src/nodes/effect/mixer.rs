//! Stereo track mixer

use alloc::format;
use alloc::vec::Vec;

use crate::node::{Node, ProcessContext, RenderIo};
use crate::port::{Direction, PortKind, PortLayout};

/// Lowest master volume in dB; at or below it the master is silent.
pub const MIN_VOLUME_DB: f32 = -120.0;
/// Highest master volume in dB.
pub const MAX_VOLUME_DB: f32 = 12.0;

/// Messages to control a Mixer
#[derive(Clone, Copy, Debug)]
pub enum MixerMessage {
    /// Linear gain of one track
    SetTrackGain { track: usize, gain: f32 },
    SetTrackMute { track: usize, mute: bool },
    /// Master volume in dB, clamped to [`MIN_VOLUME_DB`]..=[`MAX_VOLUME_DB`]
    SetMasterVolume(f32),
    SetMasterMute(bool),
}

#[derive(Clone, Copy, Debug)]
struct Track {
    gain: f32,
    last_gain: f32,
    mute: bool,
}

impl Track {
    fn target(&self) -> f32 {
        if self.mute {
            0.0
        } else {
            self.gain
        }
    }
}

/// Sums stereo tracks into a stereo master.
///
/// Ports: two audio inputs per track (left, right), then the two master
/// outputs. Gain changes ramp linearly across one block to avoid clicks.
pub struct Mixer {
    tracks: Vec<Track>,
    volume_db: f32,
    master_mute: bool,
    last_master: f32,
}

impl Mixer {
    pub fn new(tracks: usize) -> Self {
        Self {
            tracks: (0..tracks)
                .map(|_| Track {
                    gain: 1.0,
                    last_gain: 1.0,
                    mute: false,
                })
                .collect(),
            volume_db: 0.0,
            master_mute: false,
            last_master: 1.0,
        }
    }

    #[inline]
    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    #[inline]
    pub fn volume_db(&self) -> f32 {
        self.volume_db
    }

    fn master_target(&self) -> f32 {
        if self.master_mute {
            0.0
        } else {
            db_to_gain(self.volume_db)
        }
    }
}

fn db_to_gain(db: f32) -> f32 {
    if db <= MIN_VOLUME_DB {
        0.0
    } else {
        10f32.powf(db / 20.0)
    }
}

/// Add `input` scaled by a ramp from `start` to `end` onto `out`.
fn add_with_ramp(out: &mut [f32], input: &[f32], start: f32, end: f32) {
    let step = (end - start) / out.len().max(1) as f32;
    let mut gain = start;
    for (o, &i) in out.iter_mut().zip(input) {
        *o += i * gain;
        gain += step;
    }
}

impl Node for Mixer {
    type Message = MixerMessage;

    fn ports(&self) -> PortLayout {
        let mut layout = PortLayout::new();
        for track in 1..=self.tracks.len() {
            layout = layout
                .with(
                    PortKind::Audio,
                    Direction::Input,
                    format!("track_{track}_left"),
                    format!("Track {track} Left"),
                )
                .with(
                    PortKind::Audio,
                    Direction::Input,
                    format!("track_{track}_right"),
                    format!("Track {track} Right"),
                );
        }
        layout
            .output(PortKind::Audio, "master_left", "Master Left")
            .output(PortKind::Audio, "master_right", "Master Right")
    }

    fn render(
        &mut self,
        _ctx: &ProcessContext,
        messages: impl Iterator<Item = MixerMessage>,
        io: &mut RenderIo<'_>,
    ) {
        for msg in messages {
            match msg {
                MixerMessage::SetTrackGain { track, gain } => {
                    if let Some(t) = self.tracks.get_mut(track) {
                        t.gain = gain.max(0.0);
                    }
                }
                MixerMessage::SetTrackMute { track, mute } => {
                    if let Some(t) = self.tracks.get_mut(track) {
                        t.mute = mute;
                    }
                }
                MixerMessage::SetMasterVolume(db) => {
                    self.volume_db = db.clamp(MIN_VOLUME_DB, MAX_VOLUME_DB)
                }
                MixerMessage::SetMasterMute(mute) => self.master_mute = mute,
            }
        }

        for (index, track) in self.tracks.iter_mut().enumerate() {
            let target = track.target();
            for side in 0..2 {
                let channel = index * 2 + side;
                if !io.is_input_connected(PortKind::Audio, channel) {
                    continue;
                }
                let input = io.audio_input(channel);
                if let Some(out) = io.audio_output(side) {
                    add_with_ramp(out, input, track.last_gain, target);
                }
            }
            track.last_gain = target;
        }

        let start = self.last_master;
        let end = self.master_target();
        for out in io.audio_outputs() {
            let step = (end - start) / out.len().max(1) as f32;
            let mut gain = start;
            for sample in out.iter_mut() {
                *sample *= gain;
                gain += step;
            }
        }
        self.last_master = end;
    }
}
