//! Speech synthesis through the generative-AI backend.
//!
//! The speech model answers with base64 audio inside `inlineData`. The bytes
//! are usually bare 24 kHz PCM, which is why playback goes through
//! [`crate::playback::PlaybackResolver`].

use anyhow::Result;
use tracing::debug;

use crate::ai::{
    Content, GeminiClient, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    PrebuiltVoiceConfig, SpeechConfig, VoiceConfig,
};
use crate::config::AppConfig;

/// Requests spoken audio for text replies.
#[derive(Clone)]
pub struct SpeechGenerator {
    client: GeminiClient,
    model: String,
    voice: String,
}

impl SpeechGenerator {
    pub fn new(client: GeminiClient, config: &AppConfig) -> Self {
        Self {
            client,
            model: config.tts_model.clone(),
            voice: config.tts_voice.clone(),
        }
    }

    /// Synthesizes `text` and returns the base64 audio, if any.
    ///
    /// # Returns
    /// `Ok(None)` when the text is blank or the model sent no audio.
    ///
    /// # Errors
    /// Returns network and API errors from the backend.
    pub async fn synthesize(&self, text: &str) -> Result<Option<String>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let request = speech_request(text, &self.voice);
        let response = self.client.generate(&self.model, &request).await?;
        let audio = extract_audio(&response);
        debug!(
            model = %self.model,
            base64_len = audio.as_ref().map_or(0, String::len),
            "speech synthesis finished"
        );
        Ok(audio)
    }
}

fn speech_request(text: &str, voice: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content::text(Some("user"), text)],
        system_instruction: None,
        generation_config: Some(GenerationConfig {
            response_modalities: vec!["AUDIO".to_string()],
            speech_config: Some(SpeechConfig {
                voice_config: VoiceConfig {
                    prebuilt_voice_config: PrebuiltVoiceConfig {
                        voice_name: voice.to_string(),
                    },
                },
            }),
        }),
    }
}

/// First non-empty inline audio payload of the first candidate.
fn extract_audio(response: &GenerateContentResponse) -> Option<String> {
    response
        .first_parts()
        .iter()
        .filter_map(|part| part.inline_data.as_ref())
        .map(|inline| inline.data.trim())
        .find(|data| !data.is_empty())
        .map(str::to_string)
}
