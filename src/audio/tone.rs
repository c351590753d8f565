use std::f32::consts::TAU;

use super::ring_buffer::SampleProducer;
use crate::controller::diff::InputEvent;
use crate::controller::profile::{LogicalButton, Stick};

const BASE_FREQUENCY: f32 = 440.0;
const AMPLITUDE: f32 = 0.2;
// Samples for the gain to travel from closed to open, avoids clicks
const RAMP_SAMPLES: f32 = 64.0;

/// Sine tone standing in for an emulation core's audio output
///
/// Produces one burst of stereo frames per display frame. Button `a` gates the
/// tone, the left stick's Y axis bends the pitch by up to one octave.
#[derive(Debug)]
pub struct ToneGenerator {
    sample_rate: u32,
    frames_per_burst: usize,
    phase: f32,
    gain: f32,
    gate: bool,
    bend: f32,
    burst: Vec<f32>,
}

impl ToneGenerator {
    pub fn new(sample_rate: u32, frame_rate: u32) -> Self {
        let frames_per_burst = (sample_rate / frame_rate.max(1)) as usize;
        Self {
            sample_rate,
            frames_per_burst,
            phase: 0.0,
            gain: 0.0,
            gate: false,
            bend: 0.0,
            burst: Vec::with_capacity(2 * frames_per_burst),
        }
    }

    pub fn frames_per_burst(&self) -> usize {
        self.frames_per_burst
    }

    pub fn set_gate(&mut self, open: bool) {
        self.gate = open;
    }

    pub fn is_gated(&self) -> bool {
        self.gate
    }

    /// Stick position in `[-1, 1]`; pushing up (negative) raises the pitch
    pub fn set_bend(&mut self, y: f32) {
        self.bend = y.clamp(-1.0, 1.0);
    }

    pub fn frequency(&self) -> f32 {
        BASE_FREQUENCY * 2f32.powf(-self.bend)
    }

    /// Applies a controller event; returns whether it affected the tone
    pub fn apply(&mut self, event: &InputEvent) -> bool {
        match event {
            InputEvent::Press {
                button: LogicalButton::A,
                ..
            } => self.set_gate(true),
            InputEvent::Release {
                button: LogicalButton::A,
                ..
            } => self.set_gate(false),
            InputEvent::Move {
                stick: Stick::Left,
                axes,
            } => self.set_bend(axes.y),
            _ => return false,
        }
        true
    }

    /// Renders one burst and pushes it; returns the number of dropped samples
    pub fn produce(&mut self, producer: &mut SampleProducer) -> usize {
        let step = self.frequency() / self.sample_rate as f32;
        let target = if self.gate { 1.0 } else { 0.0 };

        self.burst.clear();
        for _ in 0..self.frames_per_burst {
            let ramp = (target - self.gain).clamp(-1.0 / RAMP_SAMPLES, 1.0 / RAMP_SAMPLES);
            self.gain += ramp;

            let sample = (self.phase * TAU).sin() * AMPLITUDE * self.gain;
            self.burst.push(sample);
            self.burst.push(sample);

            self.phase = (self.phase + step).fract();
        }

        producer.push_slice(&self.burst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ring_buffer::ring_buffer;
    use crate::controller::snapshot::{ButtonData, StickAxes};

    #[test]
    fn burst_matches_frame_rate() {
        let (mut producer, consumer) = ring_buffer(4096).expect("buffer");
        let mut tone = ToneGenerator::new(44100, 60);

        tone.produce(&mut producer);

        assert_eq!(tone.frames_per_burst(), 735);
        assert_eq!(consumer.available(), 2 * 735);
    }

    #[test]
    fn closed_gate_is_silent() {
        let (mut producer, mut consumer) = ring_buffer(4096).expect("buffer");
        let mut tone = ToneGenerator::new(48000, 60);

        tone.produce(&mut producer);

        let samples = consumer.dequeue_batch(1600).expect("burst");
        assert!(samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn open_gate_is_audible_and_stereo() {
        let (mut producer, mut consumer) = ring_buffer(4096).expect("buffer");
        let mut tone = ToneGenerator::new(48000, 60);
        tone.set_gate(true);

        tone.produce(&mut producer);

        let samples = consumer.dequeue_batch(1600).expect("burst");
        assert!(samples.iter().any(|&s| s.abs() > 0.1));
        assert!(samples.iter().all(|&s| s.abs() <= AMPLITUDE));
        assert!(samples.chunks_exact(2).all(|frame| frame[0] == frame[1]));
    }

    #[test]
    fn events_drive_gate_and_pitch() {
        let mut tone = ToneGenerator::new(48000, 60);
        let data = ButtonData {
            pressed: true,
            touched: false,
            value: 1.0,
        };

        assert!(tone.apply(&InputEvent::Press {
            button: LogicalButton::A,
            data
        }));
        assert!(tone.is_gated());

        assert!(tone.apply(&InputEvent::Move {
            stick: Stick::Left,
            axes: StickAxes { x: 0.0, y: -1.0 }
        }));
        assert!((tone.frequency() - 880.0).abs() < 1e-3);

        assert!(!tone.apply(&InputEvent::Press {
            button: LogicalButton::B,
            data
        }));
        assert!(tone.apply(&InputEvent::Release {
            button: LogicalButton::A,
            data: ButtonData::default()
        }));
        assert!(!tone.is_gated());
    }
}
