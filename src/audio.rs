//! Article narration.
//!
//! Speech comes back from the AI service as base64 little-endian 16-bit mono
//! PCM at 24 kHz. [`decode_pcm16`] turns it into an [`AudioBuffer`] which is
//! handed to an [`AudioSink`]. [`Narrator`] owns the single active playback.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::ai::GeminiClient;
use crate::model::Article;

pub const SAMPLE_RATE: u32 = 24_000;

#[derive(Debug, Error)]
pub enum NarrationError {
    #[error("נכשלה השמעת הכתבה.")]
    NoAudio,
    #[error("Audio payload is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("Audio output failed: {0}")]
    Sink(String),
}

/// Mono samples in `[-1.0, 1.0)`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}

/// Decode base64 PCM16 LE into a 24 kHz mono buffer. A trailing odd byte is
/// dropped.
pub fn decode_pcm16(data: &str) -> Result<AudioBuffer, NarrationError> {
    let bytes = STANDARD.decode(data.trim())?;
    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect();
    Ok(AudioBuffer {
        samples,
        sample_rate: SAMPLE_RATE,
    })
}

/// An in-flight playback. Dropping the handle stops it.
pub struct PlaybackHandle {
    task: Option<JoinHandle<()>>,
}

impl PlaybackHandle {
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Wait for playback to complete on its own.
    pub async fn finished(&mut self) {
        if let Some(task) = self.task.as_mut() {
            let _ = task.await;
        }
        self.task = None;
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub trait AudioSink: Send + Sync {
    fn play(&self, buffer: AudioBuffer) -> Result<PlaybackHandle, NarrationError>;
}

/// Plays nothing audible; completes after the buffer's duration.
#[derive(Debug, Default)]
pub struct TimedSink;

impl AudioSink for TimedSink {
    fn play(&self, buffer: AudioBuffer) -> Result<PlaybackHandle, NarrationError> {
        let duration = buffer.duration();
        tracing::debug!(secs = duration.as_secs_f32(), "Timed playback started");
        Ok(PlaybackHandle::new(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
        })))
    }
}

/// Writes the narration to a 16-bit mono WAV file and completes at once.
#[derive(Debug)]
pub struct WavSink {
    path: PathBuf,
}

impl WavSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn write(&self, buffer: &AudioBuffer) -> Result<(), hound::Error> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: buffer.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&self.path, spec)?;
        for &sample in &buffer.samples {
            let scaled = (sample * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32);
            writer.write_sample(scaled as i16)?;
        }
        writer.finalize()
    }
}

impl AudioSink for WavSink {
    fn play(&self, buffer: AudioBuffer) -> Result<PlaybackHandle, NarrationError> {
        self.write(&buffer)
            .map_err(|e| NarrationError::Sink(e.to_string()))?;
        tracing::info!(path = %self.path.display(), samples = buffer.samples.len(), "Narration written");
        Ok(PlaybackHandle::new(tokio::spawn(async {})))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NarrationState {
    Idle,
    Loading,
    Playing { article_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationOutcome {
    Started,
    Stopped,
}

/// Single-playback narration state machine.
pub struct Narrator {
    ai: GeminiClient,
    sink: Arc<dyn AudioSink>,
    state: NarrationState,
    playback: Option<PlaybackHandle>,
}

impl Narrator {
    pub fn new(ai: GeminiClient, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            ai,
            sink,
            state: NarrationState::Idle,
            playback: None,
        }
    }

    /// Current state. A playback that ran to completion reads as idle.
    pub fn state(&mut self) -> &NarrationState {
        if self.playback.as_ref().is_some_and(PlaybackHandle::is_finished) {
            self.playback = None;
            self.state = NarrationState::Idle;
        }
        &self.state
    }

    pub fn is_playing(&mut self) -> bool {
        matches!(self.state(), NarrationState::Playing { .. })
    }

    /// Stop if playing, otherwise fetch and start narrating `article`.
    ///
    /// Failures leave the narrator idle and are not retried.
    pub async fn toggle(&mut self, article: &Article) -> Result<NarrationOutcome, NarrationError> {
        if self.is_playing() {
            self.stop();
            return Ok(NarrationOutcome::Stopped);
        }

        self.state = NarrationState::Loading;
        let text = format!("{}. {}", article.title, article.content);
        match self.start(&text).await {
            Ok(playback) => {
                self.playback = Some(playback);
                self.state = NarrationState::Playing {
                    article_id: article.id.clone(),
                };
                tracing::info!(id = %article.id, "Narration started");
                Ok(NarrationOutcome::Started)
            }
            Err(e) => {
                self.state = NarrationState::Idle;
                tracing::error!(id = %article.id, error = %e, "Narration failed");
                Err(e)
            }
        }
    }

    async fn start(&self, text: &str) -> Result<PlaybackHandle, NarrationError> {
        let audio = self.ai.text_to_speech(text).await.ok_or(NarrationError::NoAudio)?;
        let buffer = decode_pcm16(&audio)?;
        self.sink.play(buffer)
    }

    pub fn stop(&mut self) {
        if let Some(mut playback) = self.playback.take() {
            playback.stop();
            tracing::debug!("Narration stopped");
        }
        self.state = NarrationState::Idle;
    }

    /// Wait until the active playback finishes by itself.
    pub async fn wait(&mut self) {
        if let Some(playback) = self.playback.as_mut() {
            playback.finished().await;
        }
        self.playback = None;
        self.state = NarrationState::Idle;
    }
}
