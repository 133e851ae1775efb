/*
 * @file assistant.rs
 * @brief Implementation of voxtutor's conversational runtime
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

//! Conversational assistant orchestration module.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use crate::ai::{ChatSession, GeminiClient};
use crate::audio::CpalOutput;
use crate::commands::{self, Command};
use crate::config::{load_app_config, AppConfig};
use crate::lessons::LessonLibrary;
use crate::playback::{AudioOutput, PlaybackResolver};
use crate::speech::{NativeSpeech, SpeechSynthesis};
use crate::tts::SpeechGenerator;

/// Prompt printed before each line of input.
const PROMPT: &str = "you> ";

/// How a piece of text ended up being voiced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeechOutcome {
    /// Generated audio is playing.
    Generated,
    /// The native synthesizer is speaking.
    Native,
    /// Nothing could voice the text.
    Silent,
}

/// Runs the chat loop on stdin until the user quits or input ends.
///
/// The loop reads a line, dispatches commands, sends everything else to the
/// chat model, prints the reply and speaks it.
///
/// # Returns
/// `Ok(())` when the user issues a quit command or stdin closes.
///
/// # Errors
/// Returns an error if the API key is missing, the native speech command is
/// invalid, or stdin cannot be read.
pub async fn run_assistant() -> Result<()> {
    let config = load_app_config();
    let client = GeminiClient::from_env(&config)?;
    let speech: Arc<dyn SpeechSynthesis> =
        Arc::new(NativeSpeech::from_command_line(&config.native_speech_command)?);
    let runtime = AssistantRuntime::new(&config, client, CpalOutput::new(), speech);
    info!(
        chat_model = %config.chat_model,
        tts_model = %config.tts_model,
        lessons = runtime.lessons.list().len(),
        "assistant ready"
    );
    runtime.run_loop().await
}

/// Runtime container that owns the clients, playback and lessons.
///
/// # Details
/// Keeps the chat history, the last reply (for replay and saving), and the
/// single playback resolver across the whole session.
pub struct AssistantRuntime<O: AudioOutput> {
    chat: ChatSession,
    tts: SpeechGenerator,
    resolver: PlaybackResolver<O>,
    speech: Arc<dyn SpeechSynthesis>,
    lessons: LessonLibrary,
    last_reply: Option<String>,
    speak_replies: bool,
}

impl<O: AudioOutput> AssistantRuntime<O> {
    /// Creates a runtime from configuration and its collaborators.
    pub fn new(
        config: &AppConfig,
        client: GeminiClient,
        output: O,
        speech: Arc<dyn SpeechSynthesis>,
    ) -> Self {
        Self {
            chat: ChatSession::new(client.clone(), config),
            tts: SpeechGenerator::new(client, config),
            resolver: PlaybackResolver::new(output, speech.clone(), config.pcm),
            speech,
            lessons: load_lessons_with_fallback(&config.lessons_path),
            last_reply: None,
            speak_replies: config.speak_replies,
        }
    }

    /// Reads stdin line by line until quit or end of input.
    ///
    /// # Errors
    /// Bubbles up stdin read errors.
    pub async fn run_loop(mut self) -> Result<()> {
        println!("{}", commands::generate_command_list());
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            announce_prompt();
            let Some(line) = lines.next_line().await? else {
                break;
            };
            if !self.process_line(&line).await {
                break;
            }
        }
        self.resolver.stop();
        Ok(())
    }

    /// Handles one line of input.
    ///
    /// # Returns
    /// * `true` to keep looping, `false` to exit.
    pub async fn process_line(&mut self, line: &str) -> bool {
        match commands::parse(line) {
            Command::Quit => return false,
            Command::Empty => {}
            Command::Help => println!("{}", commands::generate_command_list()),
            Command::Stop => self.resolver.stop(),
            Command::Clear => {
                self.chat.clear();
                println!("Conversation cleared.");
            }
            Command::Replay => match self.last_reply.clone() {
                Some(reply) => {
                    self.speak_text(&reply).await;
                }
                None => println!("Nothing to replay yet."),
            },
            Command::Save(title) => self.save_last_reply(&title),
            Command::Lessons => self.print_lessons(),
            Command::Lesson(id) => {
                let content = self.lessons.get(id).map(|lesson| {
                    println!("#{} {}\n{}", lesson.id, lesson.title, lesson.content);
                    lesson.content.clone()
                });
                match content {
                    Some(content) => {
                        self.speak_text(&content).await;
                    }
                    None => println!("No lesson #{}.", id),
                }
            }
            Command::Delete(id) => self.delete_lesson(id),
            Command::Say(text) => {
                self.speak_text(&text).await;
            }
            Command::Chat(text) => self.handle_chat(&text).await,
            Command::Invalid(input) => {
                println!("Unknown command `{}`. Type /help for the list.", input)
            }
        }
        true
    }

    /// Sends a message to the chat model, prints and speaks the reply.
    async fn handle_chat(&mut self, user_text: &str) {
        match self.chat.send(user_text).await {
            Ok(reply) => {
                println!("tutor> {}", reply);
                self.last_reply = Some(reply.clone());
                if self.speak_replies {
                    self.speak_text(&reply).await;
                }
            }
            Err(err) => {
                error!("Chat error: {:#}", err);
                println!("(the tutor could not answer: {})", err);
            }
        }
    }

    /// Voices `text` with generated audio, falling back to native speech.
    pub async fn speak_text(&mut self, text: &str) -> SpeechOutcome {
        let synthesized = self.tts.synthesize(text).await;
        self.deliver_speech(text, synthesized)
    }

    /// Plays a synthesis result, or speaks `text` natively when it fails.
    ///
    /// # Details
    /// A missing or blank payload, a synthesis error, and a
    /// [`crate::playback::PlaybackError`] all lead to the native synthesizer being given the original text.
    pub fn deliver_speech(&mut self, text: &str, synthesized: Result<Option<String>>) -> SpeechOutcome {
        match synthesized {
            Ok(Some(payload)) if !payload.trim().is_empty() => {
                match self.resolver.play(Some(&payload)) {
                    Ok(()) => return SpeechOutcome::Generated,
                    Err(err) => warn!("Generated audio unplayable, using native speech: {}", err),
                }
            }
            Ok(_) => info!("Speech model returned no audio, using native speech"),
            Err(err) => warn!("Speech synthesis failed, using native speech: {:#}", err),
        }
        self.resolver.stop();
        match self.speech.speak(text) {
            Ok(()) => SpeechOutcome::Native,
            Err(err) => {
                error!("Native speech error: {:#}", err);
                SpeechOutcome::Silent
            }
        }
    }

    /// Saves the last reply as a lesson and persists the library.
    fn save_last_reply(&mut self, title: &str) {
        let Some(reply) = self.last_reply.as_deref() else {
            println!("Nothing to save yet.");
            return;
        };
        match self.lessons.add(title, reply) {
            Ok(lesson) => println!("Saved lesson #{}: {}", lesson.id, lesson.title),
            Err(err) => {
                println!("Could not save lesson: {}", err);
                return;
            }
        }
        self.persist_lessons();
    }

    fn delete_lesson(&mut self, id: u64) {
        if self.lessons.remove(id) {
            println!("Deleted lesson #{}.", id);
            self.persist_lessons();
        } else {
            println!("No lesson #{}.", id);
        }
    }

    fn print_lessons(&self) {
        if self.lessons.is_empty() {
            println!("No saved lessons.");
            return;
        }
        for lesson in self.lessons.list() {
            println!(
                "  #{:<3} {}  ({})",
                lesson.id,
                lesson.title,
                lesson.saved_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    fn persist_lessons(&self) {
        if let Err(err) = self.lessons.persist() {
            error!("Lessons persist error: {:#}", err);
        }
    }

    pub fn lessons(&self) -> &LessonLibrary {
        &self.lessons
    }

    pub fn resolver(&self) -> &PlaybackResolver<O> {
        &self.resolver
    }
}

/// Loads the lessons library, starting empty when the file is unusable.
///
/// # Details
/// A corrupt file is logged and left in place; it is only overwritten by the
/// next successful save.
fn load_lessons_with_fallback(path: &Path) -> LessonLibrary {
    match LessonLibrary::load(path) {
        Ok(library) => library,
        Err(err) => {
            error!("Lessons load error: {:#}", err);
            LessonLibrary::empty(path)
        }
    }
}

/// Prints the input prompt without a trailing newline.
fn announce_prompt() {
    print!("{}", PROMPT);
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ChatMessage;
    use crate::playback::tests::{CountingSpeech, FakeOutput};
    use crate::playback::ResourceOrigin;
    use crate::wav::{wrap_pcm, PcmFormat};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    struct Fixture {
        runtime: AssistantRuntime<FakeOutput>,
        speech: Arc<CountingSpeech>,
        _dir: tempfile::TempDir,
    }

    fn fixture(output: FakeOutput) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            lessons_path: dir.path().join("lessons.json"),
            ..AppConfig::default()
        };
        let client =
            GeminiClient::new("test-key", "http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let speech = Arc::new(CountingSpeech::default());
        let runtime = AssistantRuntime::new(&config, client, output, speech.clone());
        Fixture {
            runtime,
            speech,
            _dir: dir,
        }
    }

    fn spoken(speech: &CountingSpeech) -> Vec<String> {
        speech.spoken.lock().unwrap().clone()
    }

    #[test]
    fn raw_pcm_payload_plays_generated_audio() {
        let mut fx = fixture(FakeOutput::default());
        let payload = STANDARD.encode([0u8; 48]);
        let outcome = fx.runtime.deliver_speech("hola", Ok(Some(payload)));
        assert_eq!(outcome, SpeechOutcome::Generated);
        let resources = &fx.runtime.resolver().output().resources;
        assert_eq!(resources.last().unwrap().origin(), ResourceOrigin::Synthesized);
        assert!(spoken(&fx.speech).is_empty());
    }

    #[test]
    fn headered_payload_plays_directly() {
        let mut fx = fixture(FakeOutput::default());
        let wav = wrap_pcm(&PcmFormat::default(), &[0u8; 8]).unwrap();
        let outcome = fx
            .runtime
            .deliver_speech("hola", Ok(Some(STANDARD.encode(wav))));
        assert_eq!(outcome, SpeechOutcome::Generated);
        assert_eq!(fx.runtime.resolver().output().resources.len(), 1);
    }

    #[test]
    fn unplayable_audio_falls_back_to_native_speech() {
        let output = FakeOutput {
            reject_all: true,
            ..FakeOutput::default()
        };
        let mut fx = fixture(output);
        let outcome = fx
            .runtime
            .deliver_speech("buenas noches", Ok(Some(STANDARD.encode([1u8; 10]))));
        assert_eq!(outcome, SpeechOutcome::Native);
        assert_eq!(spoken(&fx.speech), vec!["buenas noches".to_string()]);
        assert!(!fx.runtime.resolver().has_handle());
    }

    #[test]
    fn missing_audio_or_synthesis_error_uses_native_speech() {
        let mut fx = fixture(FakeOutput::default());
        assert_eq!(
            fx.runtime.deliver_speech("uno", Ok(None)),
            SpeechOutcome::Native
        );
        assert_eq!(
            fx.runtime
                .deliver_speech("dos", Err(anyhow::anyhow!("network down"))),
            SpeechOutcome::Native
        );
        assert_eq!(spoken(&fx.speech), vec!["uno".to_string(), "dos".to_string()]);
        assert!(fx.runtime.resolver().output().resources.is_empty());
    }

    #[test]
    fn blank_payload_is_spoken_natively() {
        let mut fx = fixture(FakeOutput::default());
        assert_eq!(
            fx.runtime.deliver_speech("hola", Ok(Some(String::new()))),
            SpeechOutcome::Native
        );
        assert_eq!(
            fx.runtime.deliver_speech("adiós", Ok(Some("  \n ".to_string()))),
            SpeechOutcome::Native
        );
        assert_eq!(
            spoken(&fx.speech),
            vec!["hola".to_string(), "adiós".to_string()]
        );
        assert!(fx.runtime.resolver().output().resources.is_empty());
        assert!(!fx.runtime.resolver().has_handle());
    }

    #[test]
    fn native_fallback_silences_previous_playback() {
        let mut fx = fixture(FakeOutput::default());
        let wav = wrap_pcm(&PcmFormat::default(), &[0u8; 8]).unwrap();
        fx.runtime
            .deliver_speech("first", Ok(Some(STANDARD.encode(wav))));
        assert!(fx.runtime.resolver().is_playing());
        fx.runtime.deliver_speech("second", Ok(None));
        assert!(!fx.runtime.resolver().has_handle());
        assert_eq!(fx.runtime.resolver().output().active_count(), 0);
    }

    #[tokio::test]
    async fn save_and_delete_lessons_persist_to_disk() {
        let mut fx = fixture(FakeOutput::default());
        fx.runtime.last_reply = Some("Ser is for permanent traits.".to_string());

        assert!(fx.runtime.process_line("/save Ser vs estar").await);
        let path = fx.runtime.lessons().path().to_path_buf();
        let stored = LessonLibrary::load(&path).unwrap();
        assert_eq!(stored.list().len(), 1);
        assert_eq!(stored.list()[0].title, "Ser vs estar");

        assert!(fx.runtime.process_line("/delete 1").await);
        assert!(LessonLibrary::load(&path).unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_without_reply_does_nothing() {
        let mut fx = fixture(FakeOutput::default());
        assert!(fx.runtime.process_line("/save").await);
        assert!(fx.runtime.lessons().is_empty());
    }

    #[tokio::test]
    async fn quit_and_stop_commands() {
        let mut fx = fixture(FakeOutput::default());
        assert!(fx.runtime.process_line("/stop").await);
        assert_eq!(fx.speech.cancels.load(Ordering::SeqCst), 1);
        assert!(fx.runtime.process_line("").await);
        assert!(fx.runtime.process_line("/nonsense").await);
        assert!(!fx.runtime.process_line("goodbye").await);
    }

    #[tokio::test]
    async fn clear_command_forgets_conversation() {
        let mut fx = fixture(FakeOutput::default());
        fx.runtime.chat.history.push(ChatMessage::user("hola"));
        fx.runtime.chat.history.push(ChatMessage::model("¡Hola!"));
        assert_eq!(fx.runtime.chat.history().len(), 2);

        assert!(fx.runtime.process_line("/clear").await);
        assert!(fx.runtime.chat.history().is_empty());
    }
}
