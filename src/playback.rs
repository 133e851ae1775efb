/*
 * @file playback.rs
 * @brief Speech payload playback resolver for voxtutor
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

//! Audio response playback with container recovery.
//!
//! Speech payloads arrive as base64 text whose bytes are either a complete
//! WAV file or bare PCM samples. [`PlaybackResolver`] tries each
//! [`Strategy`] in order and keeps exactly one live [`PlaybackHandle`].

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::speech::SpeechSynthesis;
use crate::wav::{self, HeaderError, PcmFormat};

/// How an [`AudioResource`] was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceOrigin {
    /// Payload bytes passed through untouched.
    Direct,
    /// Payload bytes wrapped in a synthesized WAV header.
    Synthesized,
}

/// Bytes handed to an [`AudioOutput`] for playback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioResource {
    origin: ResourceOrigin,
    bytes: Vec<u8>,
}

impl AudioResource {
    /// Wraps bytes that should already form a playable container.
    pub fn direct(bytes: Vec<u8>) -> Self {
        Self {
            origin: ResourceOrigin::Direct,
            bytes,
        }
    }

    /// Wraps a container whose header was synthesized locally.
    pub fn synthesized(bytes: Vec<u8>) -> Self {
        Self {
            origin: ResourceOrigin::Synthesized,
            bytes,
        }
    }

    /// MIME type announced for the resource.
    pub fn mime(&self) -> &'static str {
        "audio/wav"
    }

    /// Whether the bytes were passed through or wrapped.
    pub fn origin(&self) -> ResourceOrigin {
        self.origin
    }

    /// Container bytes to hand to the host.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size of the container in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` when the container holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A resource that is currently audible.
pub trait PlaybackHandle {
    /// Silences the resource. Calling it twice is harmless.
    fn stop(&mut self);

    /// Returns `true` while samples are still being played.
    fn is_active(&self) -> bool;
}

/// Host facility that turns an [`AudioResource`] into sound.
pub trait AudioOutput {
    type Handle: PlaybackHandle;

    /// Starts playback, or rejects resources the host cannot decode.
    fn start(&mut self, resource: &AudioResource) -> anyhow::Result<Self::Handle>;
}

/// Failure of a single playback strategy.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// The payload could not be played as a self-describing container.
    #[error("payload is not a playable container: {0}")]
    UnplayableDirect(String),

    /// Even with a synthesized header the host refused the resource.
    #[error("synthesized container was rejected: {0}")]
    UnplayableSynthesized(String),

    /// The payload text is not valid base64.
    #[error("payload is not valid base64: {0}")]
    MalformedBase64(#[from] base64::DecodeError),

    /// The payload cannot be described by a WAV header.
    #[error(transparent)]
    Header(#[from] HeaderError),
}

/// Every strategy failed; nothing is playing.
#[derive(Debug, Error)]
#[error("audio payload could not be played ({})", summarize(.attempts))]
pub struct PlaybackError {
    /// Strategy failures in the order they were attempted.
    pub attempts: Vec<(Strategy, StrategyError)>,
}

fn summarize(attempts: &[(Strategy, StrategyError)]) -> String {
    attempts
        .iter()
        .map(|(strategy, err)| format!("{}: {}", strategy, err))
        .collect::<Vec<_>>()
        .join("; ")
}

/// One way of turning a base64 payload into an [`AudioResource`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Treat the decoded bytes as a complete WAV file.
    Direct,
    /// Treat the decoded bytes as headerless PCM in the given format.
    SynthesizedContainer(PcmFormat),
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Direct => f.write_str("direct"),
            Strategy::SynthesizedContainer(_) => f.write_str("synthesized-container"),
        }
    }
}

impl Strategy {
    /// Builds the resource this strategy would play.
    ///
    /// # Errors
    /// [`StrategyError::UnplayableDirect`] when the direct path cannot decode
    /// the text, [`StrategyError::MalformedBase64`] or
    /// [`StrategyError::Header`] for the synthesized path.
    pub fn prepare(&self, payload: &str) -> Result<AudioResource, StrategyError> {
        match self {
            Strategy::Direct => decode_payload(payload)
                .map(AudioResource::direct)
                .map_err(|err| StrategyError::UnplayableDirect(err.to_string())),
            Strategy::SynthesizedContainer(format) => {
                let pcm = decode_payload(payload)?;
                let container = wav::wrap_pcm(format, &pcm)?;
                Ok(AudioResource::synthesized(container))
            }
        }
    }

    /// Classifies a host rejection of a resource this strategy prepared.
    fn rejected(&self, err: anyhow::Error) -> StrategyError {
        match self {
            Strategy::Direct => StrategyError::UnplayableDirect(format!("{:#}", err)),
            Strategy::SynthesizedContainer(_) => {
                StrategyError::UnplayableSynthesized(format!("{:#}", err))
            }
        }
    }

    fn attempt<O: AudioOutput>(
        &self,
        payload: &str,
        output: &mut O,
    ) -> Result<O::Handle, StrategyError> {
        let resource = self.prepare(payload)?;
        debug!(
            strategy = %self,
            bytes = resource.len(),
            "starting audio resource"
        );
        output.start(&resource).map_err(|err| self.rejected(err))
    }
}

/// Decodes standard base64, ignoring surrounding whitespace.
pub fn decode_payload(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(payload.trim())
}

/// Plays speech payloads, recovering headerless PCM when needed.
///
/// Owns the only live [`PlaybackHandle`]; every new attempt silences the
/// previous one and any native speech first.
pub struct PlaybackResolver<O: AudioOutput> {
    output: O,
    speech: Arc<dyn SpeechSynthesis>,
    strategies: Vec<Strategy>,
    current: Option<O::Handle>,
}

impl<O: AudioOutput> PlaybackResolver<O> {
    /// Creates a resolver that tries direct playback, then a synthesized
    /// header for `format`.
    pub fn new(output: O, speech: Arc<dyn SpeechSynthesis>, format: PcmFormat) -> Self {
        Self::with_strategies(
            output,
            speech,
            vec![Strategy::Direct, Strategy::SynthesizedContainer(format)],
        )
    }

    /// Creates a resolver with an explicit strategy order.
    pub fn with_strategies(
        output: O,
        speech: Arc<dyn SpeechSynthesis>,
        strategies: Vec<Strategy>,
    ) -> Self {
        Self {
            output,
            speech,
            strategies,
            current: None,
        }
    }

    /// Plays a base64 payload. `None` or an empty string does nothing.
    ///
    /// # Errors
    /// [`PlaybackError`] when every strategy fails; no handle is kept then.
    pub fn play(&mut self, payload: Option<&str>) -> Result<(), PlaybackError> {
        let payload = match payload {
            Some(text) if !text.trim().is_empty() => text,
            _ => return Ok(()),
        };

        self.stop();

        let mut attempts = Vec::new();
        for strategy in &self.strategies {
            match strategy.attempt(payload, &mut self.output) {
                Ok(handle) => {
                    info!(strategy = %strategy, "audio playback started");
                    self.current = Some(handle);
                    return Ok(());
                }
                Err(err) => {
                    warn!(strategy = %strategy, error = %err, "playback strategy failed");
                    attempts.push((*strategy, err));
                }
            }
        }
        Err(PlaybackError { attempts })
    }

    /// Stops current playback and cancels native speech in progress.
    pub fn stop(&mut self) {
        if let Some(mut handle) = self.current.take() {
            debug!("stopping previous audio playback");
            handle.stop();
        }
        self.speech.cancel();
    }

    /// Returns `true` while the recorded handle is still audible.
    pub fn is_playing(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|handle| handle.is_active())
    }

    /// Returns `true` when a handle is recorded, finished or not.
    pub fn has_handle(&self) -> bool {
        self.current.is_some()
    }

    /// The host output, for inspection.
    pub fn output(&self) -> &O {
        &self.output
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use base64::Engine as _;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub(crate) enum Event {
        Started(usize, ResourceOrigin),
        Stopped(usize),
    }

    /// Output that accepts anything `hound` can parse, like a real decoder.
    #[derive(Default)]
    pub(crate) struct FakeOutput {
        pub events: Rc<RefCell<Vec<Event>>>,
        pub resources: Vec<AudioResource>,
        pub reject_all: bool,
        pub next_id: usize,
    }

    pub(crate) struct FakeHandle {
        id: usize,
        active: bool,
        events: Rc<RefCell<Vec<Event>>>,
    }

    impl PlaybackHandle for FakeHandle {
        fn stop(&mut self) {
            if self.active {
                self.active = false;
                self.events.borrow_mut().push(Event::Stopped(self.id));
            }
        }

        fn is_active(&self) -> bool {
            self.active
        }
    }

    impl FakeOutput {
        pub(crate) fn active_count(&self) -> isize {
            self.events.borrow().iter().fold(0, |count, event| match event {
                Event::Started(..) => count + 1,
                Event::Stopped(_) => count - 1,
            })
        }
    }

    impl AudioOutput for FakeOutput {
        type Handle = FakeHandle;

        fn start(&mut self, resource: &AudioResource) -> anyhow::Result<FakeHandle> {
            self.resources.push(resource.clone());
            if self.reject_all {
                anyhow::bail!("output device unavailable");
            }
            hound::WavReader::new(std::io::Cursor::new(resource.bytes().to_vec()))?;
            assert_eq!(self.active_count(), 0, "two resources playing at once");
            self.next_id += 1;
            self.events
                .borrow_mut()
                .push(Event::Started(self.next_id, resource.origin()));
            Ok(FakeHandle {
                id: self.next_id,
                active: true,
                events: self.events.clone(),
            })
        }
    }

    #[derive(Default)]
    pub(crate) struct CountingSpeech {
        pub cancels: AtomicUsize,
        pub spoken: std::sync::Mutex<Vec<String>>,
    }

    impl SpeechSynthesis for CountingSpeech {
        fn speak(&self, text: &str) -> anyhow::Result<()> {
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn resolver() -> (PlaybackResolver<FakeOutput>, Arc<CountingSpeech>) {
        let speech = Arc::new(CountingSpeech::default());
        let resolver = PlaybackResolver::new(
            FakeOutput::default(),
            speech.clone(),
            PcmFormat::default(),
        );
        (resolver, speech)
    }

    fn raw_pcm_base64(len: usize) -> (Vec<u8>, String) {
        let pcm: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        let encoded = STANDARD.encode(&pcm);
        (pcm, encoded)
    }

    fn wav_base64() -> String {
        let pcm: Vec<u8> = [0i16, 512, -512, 1024]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        STANDARD.encode(wav::wrap_pcm(&PcmFormat::new(16_000, 1, 16), &pcm).unwrap())
    }

    #[test]
    fn headered_payload_plays_directly() {
        let (mut resolver, _) = resolver();
        resolver.play(Some(&wav_base64())).unwrap();
        assert!(resolver.is_playing());
        assert_eq!(resolver.output().resources.len(), 1);
        assert_eq!(
            resolver.output().resources[0].origin(),
            ResourceOrigin::Direct
        );
        assert_eq!(resolver.output().active_count(), 1);
    }

    #[test]
    fn raw_pcm_falls_back_to_synthesized_header() {
        let (mut resolver, _) = resolver();
        let (pcm, encoded) = raw_pcm_base64(480);
        resolver.play(Some(&encoded)).unwrap();

        let resources = &resolver.output().resources;
        assert_eq!(resources.len(), 2);
        assert_eq!(resources[0].origin(), ResourceOrigin::Direct);
        assert_eq!(resources[1].origin(), ResourceOrigin::Synthesized);

        let mut expected = wav::build_header(24_000, 1, 16, 480).unwrap().to_vec();
        expected.extend_from_slice(&pcm);
        assert_eq!(resources[1].bytes(), expected.as_slice());
        assert!(resolver.is_playing());
    }

    #[test]
    fn ten_raw_bytes_produce_fifty_four_byte_blob() {
        let (mut resolver, _) = resolver();
        let (_, encoded) = raw_pcm_base64(10);
        resolver.play(Some(&encoded)).unwrap();
        let blob = resolver.output().resources.last().unwrap();
        assert_eq!(blob.len(), 54);
        assert_eq!(&blob.bytes()[40..44], &10u32.to_le_bytes());
    }

    #[test]
    fn second_play_stops_first_handle() {
        let (mut resolver, speech) = resolver();
        resolver.play(Some(&wav_base64())).unwrap();
        resolver.play(Some(&wav_base64())).unwrap();

        let events = resolver.output().events.borrow().clone();
        assert_eq!(
            events,
            vec![
                Event::Started(1, ResourceOrigin::Direct),
                Event::Stopped(1),
                Event::Started(2, ResourceOrigin::Direct),
            ]
        );
        assert_eq!(speech.cancels.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn empty_or_missing_payload_is_noop() {
        let (mut resolver, speech) = resolver();
        resolver.play(None).unwrap();
        resolver.play(Some("")).unwrap();
        assert!(resolver.output().resources.is_empty());
        assert!(!resolver.has_handle());
        assert_eq!(speech.cancels.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn total_failure_reports_every_attempt() {
        let speech = Arc::new(CountingSpeech::default());
        let output = FakeOutput {
            reject_all: true,
            ..FakeOutput::default()
        };
        let mut resolver = PlaybackResolver::new(output, speech, PcmFormat::default());
        let (_, encoded) = raw_pcm_base64(10);

        let err = resolver.play(Some(&encoded)).unwrap_err();
        assert_eq!(err.attempts.len(), 2);
        assert!(matches!(err.attempts[0].1, StrategyError::UnplayableDirect(_)));
        assert!(matches!(
            err.attempts[1].1,
            StrategyError::UnplayableSynthesized(_)
        ));
        assert!(!resolver.has_handle());
        assert!(err.to_string().contains("synthesized-container"));
    }

    #[test]
    fn malformed_base64_fails_both_strategies() {
        let (mut resolver, _) = resolver();
        let err = resolver.play(Some("not base64 at all!")).unwrap_err();
        assert!(matches!(err.attempts[0].1, StrategyError::UnplayableDirect(_)));
        assert!(matches!(err.attempts[1].1, StrategyError::MalformedBase64(_)));
        assert!(resolver.output().resources.is_empty());
        assert!(!resolver.has_handle());
    }

    #[test]
    fn failed_play_still_silences_previous_handle() {
        let (mut resolver, _) = resolver();
        resolver.play(Some(&wav_base64())).unwrap();
        assert!(resolver.play(Some("%%%")).is_err());
        assert_eq!(resolver.output().active_count(), 0);
        assert!(!resolver.is_playing());
    }

    #[test]
    fn explicit_stop_releases_handle_and_cancels_speech() {
        let (mut resolver, speech) = resolver();
        resolver.play(Some(&wav_base64())).unwrap();
        resolver.stop();
        assert!(!resolver.has_handle());
        assert_eq!(resolver.output().active_count(), 0);
        assert_eq!(speech.cancels.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn strategy_order_is_configurable() {
        let speech = Arc::new(CountingSpeech::default());
        let mut resolver = PlaybackResolver::with_strategies(
            FakeOutput::default(),
            speech,
            vec![Strategy::SynthesizedContainer(PcmFormat::new(16_000, 1, 16))],
        );
        let (_, encoded) = raw_pcm_base64(32);
        resolver.play(Some(&encoded)).unwrap();
        let resources = &resolver.output().resources;
        assert_eq!(resources.len(), 1);
        assert_eq!(&resources[0].bytes()[24..28], &16_000u32.to_le_bytes());
    }

    #[test]
    fn unrepresentable_format_fails_with_header_error() {
        let speech = Arc::new(CountingSpeech::default());
        let mut resolver = PlaybackResolver::with_strategies(
            FakeOutput::default(),
            speech,
            vec![Strategy::SynthesizedContainer(PcmFormat::new(
                u32::MAX,
                u16::MAX,
                64,
            ))],
        );
        let (_, encoded) = raw_pcm_base64(10);

        let err = resolver.play(Some(&encoded)).unwrap_err();
        assert_eq!(err.attempts.len(), 1);
        assert!(matches!(
            err.attempts[0].1,
            StrategyError::Header(HeaderError::FormatOverflow(_))
        ));
        assert!(resolver.output().resources.is_empty());
        assert!(!resolver.has_handle());
    }

    #[test]
    fn decode_payload_trims_whitespace() {
        assert_eq!(decode_payload("  AQID\n").unwrap(), vec![1, 2, 3]);
    }
}
