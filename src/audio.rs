/*
 * @file audio.rs
 * @brief WAV decoding and CPAL playback for voxtutor
 * @author Kevin Thomas
 * @date 2025
 *
 * MIT License
 *
 * Copyright (c) 2025 Kevin Thomas
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

//! Audio playback functionality.
//!
//! This module decodes WAV containers with hound and plays them on the
//! default output device using CPAL.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig, StreamError};
use hound::WavReader;
use tracing::{debug, error};

use crate::playback::{AudioOutput, AudioResource, PlaybackHandle};

/// Interval at which the playback thread checks for stop or completion.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Extra time the stream stays open after the last sample is queued.
///
/// Lets the device flush its final buffer instead of clipping the tail.
const DRAIN_TAIL: Duration = Duration::from_millis(150);

/// Mono audio decoded from a WAV container.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedAudio {
    /// Samples normalized to [-1.0, 1.0].
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Playback length of the decoded samples.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }
}

/// Parses a WAV container into normalized mono samples.
///
/// # Parameters
/// * `bytes` - A complete RIFF/WAVE file.
///
/// # Returns
/// The decoded audio downmixed to mono.
///
/// # Errors
/// Returns an error when the bytes are not a WAV container (for example raw
/// PCM without a header) or the sample data is truncated.
pub fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio> {
    let mut reader =
        WavReader::new(Cursor::new(bytes)).context("Audio is not a WAV container")?;
    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        anyhow::bail!(
            "WAV header declares {} channels at {} Hz",
            spec.channels,
            spec.sample_rate
        );
    }
    let interleaved = read_samples(&mut reader)?;
    Ok(DecodedAudio {
        samples: downmix(interleaved, spec.channels),
        sample_rate: spec.sample_rate,
    })
}

/// Reads every sample as f32, whatever the stored encoding.
///
/// # Errors
/// Returns an error for truncated or unsupported sample data.
fn read_samples(reader: &mut WavReader<Cursor<&[u8]>>) -> Result<Vec<f32>> {
    let spec = reader.spec();
    match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read float WAV samples"),
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 / scale))
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read integer WAV samples")
        }
    }
}

/// Averages interleaved channels into a single mono channel.
fn downmix(samples: Vec<f32>, channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples;
    }
    let channels = usize::from(channels);
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Resamples audio from one rate to another using linear interpolation.
///
/// # Parameters
/// * `input` - Mono samples at `from_rate`.
/// * `from_rate` - Source rate in Hz.
/// * `to_rate` - Device rate in Hz.
///
/// # Returns
/// Samples at `to_rate`; the input unchanged when the rates already match.
pub fn resample(input: Vec<f32>, from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || input.is_empty() {
        return input;
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (input.len() as f64 / ratio) as usize;
    (0..output_len)
        .map(|i| sample_at_position(&input, i as f64 * ratio))
        .collect()
}

/// Interpolates between the two samples surrounding `pos`.
fn sample_at_position(input: &[f32], pos: f64) -> f32 {
    let idx = pos as usize;
    if idx + 1 < input.len() {
        let frac = (pos - idx as f64) as f32;
        input[idx] * (1.0 - frac) + input[idx + 1] * frac
    } else if idx < input.len() {
        input[idx]
    } else {
        0.0
    }
}

/// Read position over the samples queued for the device.
struct SampleCursor {
    samples: Vec<f32>,
    position: usize,
}

impl SampleCursor {
    fn next_sample(&mut self) -> Option<f32> {
        let sample = self.samples.get(self.position).copied();
        if sample.is_some() {
            self.position += 1;
        }
        sample
    }
}

/// Plays WAV resources on the default CPAL output device.
#[derive(Default)]
pub struct CpalOutput;

impl CpalOutput {
    pub fn new() -> Self {
        Self
    }
}

impl AudioOutput for CpalOutput {
    type Handle = CpalPlayback;

    fn start(&mut self, resource: &AudioResource) -> Result<CpalPlayback> {
        let audio = decode_wav(resource.bytes())?;
        debug!(
            samples = audio.samples.len(),
            sample_rate = audio.sample_rate,
            duration_ms = audio.duration().as_millis() as u64,
            "decoded {} resource",
            resource.mime()
        );
        CpalPlayback::spawn(audio)
    }
}

/// Handle to audio playing on a dedicated thread.
///
/// The CPAL stream lives on that thread; dropping the handle stops it.
pub struct CpalPlayback {
    stop: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CpalPlayback {
    /// Starts the playback thread and waits until the stream is running.
    ///
    /// # Errors
    /// Returns device and stream construction errors from the thread.
    fn spawn(audio: DecodedAudio) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread_stop = stop.clone();
        let thread_finished = finished.clone();
        let thread = std::thread::Builder::new()
            .name("voxtutor-playback".to_string())
            .spawn(move || run_stream(audio, thread_stop, thread_finished, ready_tx))
            .context("Failed to spawn playback thread")?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                stop,
                finished,
                thread: Some(thread),
            }),
            Ok(Err(err)) => {
                let _ = thread.join();
                Err(err)
            }
            Err(_) => {
                let _ = thread.join();
                anyhow::bail!("Playback thread exited before the stream started")
            }
        }
    }
}

impl PlaybackHandle for CpalPlayback {
    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Playback thread panicked");
            }
        }
    }

    fn is_active(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
            && !self.finished.load(Ordering::SeqCst)
    }
}

impl Drop for CpalPlayback {
    fn drop(&mut self) {
        PlaybackHandle::stop(self);
    }
}

/// Body of the playback thread: open the stream, report, then wait.
fn run_stream(
    audio: DecodedAudio,
    stop: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    ready: mpsc::Sender<Result<()>>,
) {
    let stream = match open_stream(audio, finished.clone()) {
        Ok(stream) => stream,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    while !stop.load(Ordering::SeqCst) && !finished.load(Ordering::SeqCst) {
        std::thread::sleep(POLL_INTERVAL);
    }
    if !stop.load(Ordering::SeqCst) {
        std::thread::sleep(DRAIN_TAIL);
    }
    drop(stream);
}

/// Opens the default output device and starts streaming `audio`.
///
/// # Errors
/// Returns an error when no output device exists or the stream cannot be
/// built or started.
fn open_stream(audio: DecodedAudio, finished: Arc<AtomicBool>) -> Result<Stream> {
    let device = default_output_device()?;
    let supported = device
        .default_output_config()
        .context("Failed to query output config")?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.config();

    let samples = resample(audio.samples, audio.sample_rate, config.sample_rate.0);
    let cursor = Arc::new(Mutex::new(SampleCursor {
        samples,
        position: 0,
    }));

    let stream = match sample_format {
        SampleFormat::F32 => build_output_stream::<f32>(&device, &config, cursor, finished)?,
        SampleFormat::I16 => build_output_stream::<i16>(&device, &config, cursor, finished)?,
        SampleFormat::U16 => build_output_stream::<u16>(&device, &config, cursor, finished)?,
        other => anyhow::bail!("Unsupported output sample format: {:?}", other),
    };
    stream.play().context("Failed to start output stream")?;
    Ok(stream)
}

/// Locates the system default output device.
///
/// # Errors
/// Returns an error when the host has no output device.
fn default_output_device() -> Result<Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("No output device"))
}

/// Builds an output stream that copies the mono cursor to every channel.
///
/// # Errors
/// Returns any stream-construction issues wrapped in [`anyhow::Error`].
fn build_output_stream<T>(
    device: &Device,
    config: &StreamConfig,
    cursor: Arc<Mutex<SampleCursor>>,
    finished: Arc<AtomicBool>,
) -> Result<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(config.channels);
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                fill_frames(&cursor, &finished, data, channels)
            },
            log_stream_error,
            None,
        )
        .map_err(|err| anyhow::anyhow!(err))
}

/// Writes the next samples into an interleaved device buffer.
///
/// Pads with silence and raises `finished` once the cursor is exhausted.
fn fill_frames<T>(
    cursor: &Mutex<SampleCursor>,
    finished: &AtomicBool,
    data: &mut [T],
    channels: usize,
) where
    T: Sample + FromSample<f32>,
{
    let mut cursor = cursor.lock().unwrap();
    for frame in data.chunks_mut(channels.max(1)) {
        let value = match cursor.next_sample() {
            Some(sample) => sample.clamp(-1.0, 1.0),
            None => {
                finished.store(true, Ordering::SeqCst);
                0.0
            }
        };
        for slot in frame.iter_mut() {
            *slot = T::from_sample(value);
        }
    }
}

/// Logs recoverable stream errors emitted by CPAL.
fn log_stream_error(err: StreamError) {
    error!("Audio stream error: {}", err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wav::{wrap_pcm, PcmFormat};

    fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn decode_wav_reads_synthesized_container() {
        let bytes = wrap_pcm(&PcmFormat::default(), &pcm_bytes(&[0, 16_384, -16_384])).unwrap();
        let audio = decode_wav(&bytes).unwrap();
        assert_eq!(audio.sample_rate, 24_000);
        assert_eq!(audio.samples, vec![0.0, 0.5, -0.5]);
    }

    #[test]
    fn decode_wav_rejects_raw_pcm() {
        assert!(decode_wav(&pcm_bytes(&[1, 2, 3, 4, 5])).is_err());
        assert!(decode_wav(&[]).is_err());
    }

    #[test]
    fn decode_wav_downmixes_stereo() {
        let bytes = wrap_pcm(
            &PcmFormat::new(16_000, 2, 16),
            &pcm_bytes(&[16_384, 0, -16_384, -16_384]),
        )
        .unwrap();
        let audio = decode_wav(&bytes).unwrap();
        assert_eq!(audio.samples, vec![0.25, -0.5]);
    }

    #[test]
    fn decoded_duration_follows_rate() {
        let audio = DecodedAudio {
            samples: vec![0.0; 12_000],
            sample_rate: 24_000,
        };
        assert_eq!(audio.duration(), Duration::from_millis(500));
    }

    #[test]
    fn resample_doubles_length_when_upsampling() {
        let output = resample(vec![0.0, 1.0, 0.0, -1.0], 24_000, 48_000);
        assert_eq!(output.len(), 8);
        assert_eq!(output[0], 0.0);
        assert!((output[1] - 0.5).abs() < 1e-6);
        assert_eq!(output[2], 1.0);
    }

    #[test]
    fn resample_is_identity_at_same_rate() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(input.clone(), 24_000, 24_000), input);
    }

    #[test]
    fn fill_frames_duplicates_mono_and_pads_silence() {
        let cursor = Mutex::new(SampleCursor {
            samples: vec![0.5, -0.5],
            position: 0,
        });
        let finished = AtomicBool::new(false);
        let mut data = [1.0_f32; 6];
        fill_frames(&cursor, &finished, &mut data, 2);
        assert_eq!(data, [0.5, 0.5, -0.5, -0.5, 0.0, 0.0]);
        assert!(finished.load(Ordering::SeqCst));
    }

    #[test]
    fn fill_frames_converts_to_integer_formats() {
        let cursor = Mutex::new(SampleCursor {
            samples: vec![1.0, 0.0],
            position: 0,
        });
        let finished = AtomicBool::new(false);
        let mut data = [0_i16; 2];
        fill_frames(&cursor, &finished, &mut data, 1);
        assert!(data[0] > 32_000);
        assert_eq!(data[1], 0);
        assert!(!finished.load(Ordering::SeqCst));
    }
}
