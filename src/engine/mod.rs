//! Audio-device façade.
//!
//! `create_synth` opens the default output device and moves a `MonoSynth`
//! into the cpal callback; the returned `Synth` keeps the stream alive and
//! forwards control calls through a lock-free queue.

mod handle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::{
    synth::settings::{SettingsPatch, SynthSettings},
    MAX_BLOCK_SIZE,
};

pub use handle::{create_offline, create_offline_with, SynthHandle};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no output device available")]
    NoOutputDevice,
    #[error("failed to fetch default output config")]
    Config(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build output stream")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("failed to start output stream")]
    PlayStream(#[from] cpal::PlayStreamError),
    #[error("control queue full, message dropped")]
    QueueFull,
    #[error("synth has been disposed")]
    Disposed,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Capacity of the control-to-render queue.
    pub queue_capacity: usize,
    /// Seed for the noise generators.
    pub seed: u64,
    /// Request this rate instead of the device default.
    pub sample_rate: Option<u32>,
    pub settings: SynthSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            seed: 0x5eed,
            sample_rate: None,
            settings: SynthSettings::default(),
        }
    }
}

/// A running synth on the default output device.
pub struct Synth {
    handle: SynthHandle,
    stream: cpal::Stream,
    sample_rate: u32,
}

pub fn create_synth() -> Result<Synth, EngineError> {
    create_synth_with(EngineConfig::default())
}

pub fn create_synth_with(config: EngineConfig) -> Result<Synth, EngineError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(EngineError::NoOutputDevice)?;
    let supported = device.default_output_config()?;

    let mut stream_config: cpal::StreamConfig = supported.into();
    if let Some(rate) = config.sample_rate {
        stream_config.sample_rate = cpal::SampleRate(rate);
    }
    let sample_rate = stream_config.sample_rate.0;
    let channels = stream_config.channels as usize;

    let (handle, mut synth) = create_offline_with(sample_rate as f32, &config);
    let mut left = vec![0.0f32; MAX_BLOCK_SIZE];
    let mut right = vec![0.0f32; MAX_BLOCK_SIZE];

    let stream = device.build_output_stream(
        &stream_config,
        move |data: &mut [f32], _| {
            let total_frames = data.len() / channels.max(1);
            let mut frames_written = 0;

            while frames_written < total_frames {
                let frames = (total_frames - frames_written).min(MAX_BLOCK_SIZE);
                let (l, r) = (&mut left[..frames], &mut right[..frames]);
                synth.render_block(l, r);

                let offset = frames_written * channels;
                for (i, (&ls, &rs)) in l.iter().zip(r.iter()).enumerate() {
                    let frame = &mut data[offset + i * channels..offset + (i + 1) * channels];
                    match frame {
                        [mono] => *mono = 0.5 * (ls + rs),
                        [fl, fr, rest @ ..] => {
                            *fl = ls;
                            *fr = rs;
                            rest.fill(0.0);
                        }
                        [] => {}
                    }
                }

                frames_written += frames;
            }
        },
        |err| tracing::error!(%err, "audio stream error"),
        None,
    )?;
    stream.play()?;

    tracing::info!(sample_rate, channels, "synth started");
    Ok(Synth {
        handle,
        stream,
        sample_rate,
    })
}

impl Synth {
    pub fn note_on(&mut self, note: &str) -> Result<(), EngineError> {
        self.handle.note_on(note)
    }

    pub fn note_off(&mut self, note: &str) -> Result<(), EngineError> {
        self.handle.note_off(note)
    }

    pub fn update_settings(&mut self, patch: &SettingsPatch) -> Result<(), EngineError> {
        self.handle.update_settings(patch)
    }

    pub fn handle_note_transition(&mut self, from: &str, to: &str) -> Result<(), EngineError> {
        self.handle.handle_note_transition(from, to)
    }

    pub fn handle(&mut self) -> &mut SynthHandle {
        &mut self.handle
    }

    /// Output clip indicator, updated once per rendered block.
    pub fn is_overloaded(&self) -> bool {
        self.handle.is_overloaded()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Release any held note and stop the device stream.
    pub fn dispose(mut self) {
        if let Err(err) = self.handle.all_notes_off() {
            tracing::warn!(%err, "could not release notes on dispose");
        }
        if let Err(err) = self.stream.pause() {
            tracing::warn!(%err, "failed to pause output stream");
        }
        tracing::info!("synth disposed");
    }
}
