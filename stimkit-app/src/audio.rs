use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig, SupportedStreamConfig};
use stimkit_resources::SoftwareMixer;

const PERIOD: Duration = Duration::from_millis(10);

/// Keeps the mixer draining. Drop to stop audio.
pub enum AudioSink {
    Device { _stream: Stream },
    /// No usable output device; voices still advance in real time.
    Silent(AudioPump),
}

/// Opens the default output device and returns a mixer running at its
/// rate and channel count. Falls back to a silent pump without a device.
pub fn open_output() -> Result<(Arc<Mutex<SoftwareMixer>>, AudioSink)> {
    match open_device() {
        Ok(opened) => Ok(opened),
        Err(err) => {
            tracing::warn!(%err, "no audio output, sound stimuli will be silent");
            let mixer = Arc::new(Mutex::new(SoftwareMixer::default()));
            let pump = AudioPump::spawn(Arc::clone(&mixer)).context("starting the audio pump")?;
            Ok((mixer, AudioSink::Silent(pump)))
        }
    }
}

fn open_device() -> Result<(Arc<Mutex<SoftwareMixer>>, AudioSink)> {
    let device = cpal::default_host()
        .default_output_device()
        .context("no default output device")?;
    let supported = f32_config(&device)?;
    let config: StreamConfig = supported.config();

    let mixer = Arc::new(Mutex::new(SoftwareMixer::new(
        config.sample_rate.0,
        config.channels,
    )));
    let stream = build_output_stream(&device, &config, Arc::clone(&mixer))?;
    stream.play().context("starting the output stream")?;

    tracing::info!(
        device = device.name().unwrap_or_default(),
        sample_rate = config.sample_rate.0,
        channels = config.channels,
        "audio output started"
    );
    Ok((mixer, AudioSink::Device { _stream: stream }))
}

/// The device default when it is `f32`, otherwise the first `f32` config
/// at its highest rate.
fn f32_config(device: &cpal::Device) -> Result<SupportedStreamConfig> {
    let default = device
        .default_output_config()
        .context("querying the default output config")?;
    if default.sample_format() == SampleFormat::F32 {
        return Ok(default);
    }
    device
        .supported_output_configs()
        .context("querying output configs")?
        .find(|c| c.sample_format() == SampleFormat::F32)
        .map(|c| c.with_max_sample_rate())
        .with_context(|| format!("device has no f32 output (default is {:?})", default.sample_format()))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mixer: Arc<Mutex<SoftwareMixer>>,
) -> Result<Stream> {
    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                mixer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .mix(data);
            },
            |err| tracing::error!(%err, "audio stream error"),
            None,
        )
        .context("building the output stream")?;
    Ok(stream)
}

/// Pulls the mixer at its real-time rate and discards the samples, so
/// voices advance and retire on schedule without a sound device attached.
pub struct AudioPump {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl AudioPump {
    pub fn spawn(mixer: Arc<Mutex<SoftwareMixer>>) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("audio-pump".into())
            .spawn(move || {
                let (rate, channels) = {
                    let mixer = mixer.lock().unwrap_or_else(PoisonError::into_inner);
                    (mixer.sample_rate(), mixer.channels())
                };
                let frames = (rate as u128 * PERIOD.as_millis() / 1000) as usize;
                let mut buffer = vec![0.0f32; frames * channels as usize];
                while !flag.load(Ordering::Relaxed) {
                    mixer
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .mix(&mut buffer);
                    thread::sleep(PERIOD);
                }
            })?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for AudioPump {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use stimkit_resources::{AudioBuffer, AudioOutput};

    use super::*;

    #[test]
    fn silent_pump_retires_voices_in_real_time() {
        let mixer = Arc::new(Mutex::new(SoftwareMixer::new(48_000, 2)));
        // 20 ms
        let buffer = Arc::new(AudioBuffer {
            sample_rate: 48_000,
            channels: 1,
            samples: vec![0.1; 960],
        });
        let voice = mixer.lock().unwrap().play(buffer, 1.0).unwrap();
        let pump = AudioPump::spawn(Arc::clone(&mixer)).unwrap();
        thread::sleep(Duration::from_millis(200));
        drop(pump);
        assert!(!mixer.lock().unwrap().is_playing(voice));
    }
}
