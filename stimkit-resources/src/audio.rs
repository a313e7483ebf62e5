use std::sync::{Arc, Mutex};

use crate::PlaybackError;

/// Decoded PCM: interleaved `f32` samples in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl AudioBuffer {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 * 1000.0 / self.sample_rate as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(pub u64);

/// The shared audio output context. Owned by the resource manager.
pub trait AudioOutput: Send + std::fmt::Debug {
    fn play(&mut self, buffer: Arc<AudioBuffer>, gain: f32) -> Result<VoiceId, PlaybackError>;
    fn stop(&mut self, voice: VoiceId) -> Result<(), PlaybackError>;
    fn is_playing(&self, voice: VoiceId) -> bool;
    /// Stops every voice and refuses further playback.
    fn close(&mut self);
    fn is_closed(&self) -> bool;
    /// Reopens a closed context.
    fn reset(&mut self);
}

/// Output context shared between the render loop and the device callback.
pub type SharedAudio = Arc<Mutex<dyn AudioOutput>>;

pub fn shared_audio(output: impl AudioOutput + 'static) -> SharedAudio {
    Arc::new(Mutex::new(output))
}

#[derive(Debug)]
struct Voice {
    id: VoiceId,
    buffer: Arc<AudioBuffer>,
    gain: f32,
    /// Read head in source frames.
    position: f64,
    /// Source frames consumed per output frame.
    step: f64,
}

impl Voice {
    fn finished(&self) -> bool {
        self.position as usize >= self.buffer.frames()
    }

    /// Linearly interpolated sample of `channel` at the read head.
    fn sample(&self, channel: usize) -> f32 {
        let src_ch = self.buffer.channels.max(1) as usize;
        let last = self.buffer.frames() - 1;
        let index = (self.position as usize).min(last);
        let next = (index + 1).min(last);
        let frac = (self.position - index as f64) as f32;
        let a = self.buffer.samples[index * src_ch + channel % src_ch];
        let b = self.buffer.samples[next * src_ch + channel % src_ch];
        a + (b - a) * frac
    }
}

/// Additive mixer. A device callback pulls interleaved output via [`mix`].
///
/// Buffers at another rate are resampled linearly on the fly.
///
/// [`mix`]: SoftwareMixer::mix
#[derive(Debug)]
pub struct SoftwareMixer {
    sample_rate: u32,
    channels: u16,
    voices: Vec<Voice>,
    next_id: u64,
    closed: bool,
}

impl SoftwareMixer {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            voices: Vec::new(),
            next_id: 0,
            closed: false,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Fills `out` (interleaved, mixer channel count) and retires finished voices.
    pub fn mix(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        let out_ch = self.channels as usize;
        for voice in &mut self.voices {
            for frame in out.chunks_mut(out_ch) {
                if voice.finished() {
                    break;
                }
                for (c, sample) in frame.iter_mut().enumerate() {
                    *sample += voice.sample(c) * voice.gain;
                }
                voice.position += voice.step;
            }
        }
        self.voices.retain(|v| !v.finished());
        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
}

impl Default for SoftwareMixer {
    fn default() -> Self {
        Self::new(48_000, 2)
    }
}

impl AudioOutput for SoftwareMixer {
    fn play(&mut self, buffer: Arc<AudioBuffer>, gain: f32) -> Result<VoiceId, PlaybackError> {
        if self.closed {
            return Err(PlaybackError::ContextClosed);
        }
        if buffer.frames() == 0 {
            return Err(PlaybackError::EmptyBuffer);
        }
        if buffer.sample_rate == 0 {
            return Err(PlaybackError::EmptyBuffer);
        }
        if buffer.sample_rate != self.sample_rate {
            tracing::debug!(
                buffer = buffer.sample_rate,
                output = self.sample_rate,
                "resampling voice"
            );
        }
        let step = buffer.sample_rate as f64 / self.sample_rate.max(1) as f64;
        let id = VoiceId(self.next_id);
        self.next_id += 1;
        self.voices.push(Voice {
            id,
            buffer,
            gain: gain.clamp(0.0, 1.0),
            position: 0.0,
            step,
        });
        Ok(id)
    }

    fn stop(&mut self, voice: VoiceId) -> Result<(), PlaybackError> {
        let before = self.voices.len();
        self.voices.retain(|v| v.id != voice);
        if self.voices.len() == before {
            return Err(PlaybackError::AlreadyStopped(voice));
        }
        Ok(())
    }

    fn is_playing(&self, voice: VoiceId) -> bool {
        self.voices.iter().any(|v| v.id == voice)
    }

    fn close(&mut self) {
        self.voices.clear();
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn reset(&mut self) {
        self.voices.clear();
        self.closed = false;
    }
}
