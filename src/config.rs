/*
 * @file config.rs
 * @brief Runtime configuration loading for voxtutor
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

//! Application configuration loaded from `config.json`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::speech::NativeSpeech;
use crate::wav::PcmFormat;

/// Default path of the JSON configuration file.
pub const CONFIG_PATH: &str = "config.json";

/// Environment variable that overrides [`CONFIG_PATH`].
pub const CONFIG_PATH_VAR: &str = "VOXTUTOR_CONFIG";

/// Environment variable that overrides the chat model.
pub const CHAT_MODEL_VAR: &str = "VOXTUTOR_CHAT_MODEL";

/// Strongly typed representation of `config.json`.
///
/// # Details
/// Every field carries a serde default so a partial file only overrides
/// what it names.
#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    /// Model used for text replies.
    #[serde(default = "fallback_chat_model")]
    pub chat_model: String,
    /// Model used for speech synthesis.
    #[serde(default = "fallback_tts_model")]
    pub tts_model: String,
    /// Prebuilt voice requested from the speech model.
    #[serde(default = "fallback_tts_voice")]
    pub tts_voice: String,
    /// Base URL of the generative-AI REST API.
    #[serde(default = "fallback_api_base_url")]
    pub api_base_url: String,
    /// Per-request HTTP timeout in seconds.
    #[serde(default = "fallback_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// System instruction sent with every chat request.
    #[serde(default = "fallback_system_instruction")]
    pub system_instruction: String,
    /// Command line of the native speech fallback.
    #[serde(default = "fallback_native_speech_command")]
    pub native_speech_command: String,
    /// JSON file holding the lessons library.
    #[serde(default = "fallback_lessons_path")]
    pub lessons_path: PathBuf,
    /// Whether chat replies are spoken automatically.
    #[serde(default = "fallback_speak_replies")]
    pub speak_replies: bool,
    /// Layout assumed for headerless speech payloads.
    #[serde(default)]
    pub pcm: PcmFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chat_model: fallback_chat_model(),
            tts_model: fallback_tts_model(),
            tts_voice: fallback_tts_voice(),
            api_base_url: fallback_api_base_url(),
            request_timeout_secs: fallback_request_timeout_secs(),
            system_instruction: fallback_system_instruction(),
            native_speech_command: fallback_native_speech_command(),
            lessons_path: fallback_lessons_path(),
            speak_replies: fallback_speak_replies(),
            pcm: PcmFormat::default(),
        }
    }
}

impl AppConfig {
    /// HTTP timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Applies environment overrides on top of file values.
    fn apply_env(mut self) -> Self {
        if let Ok(model) = env::var(CHAT_MODEL_VAR) {
            if !model.trim().is_empty() {
                self.chat_model = model.trim().to_string();
            }
        }
        self
    }
}

/// Loads configuration, falling back to baked defaults when missing.
///
/// # Details
/// Reads the file named by `VOXTUTOR_CONFIG`, or `config.json`. A missing or
/// invalid file is logged and replaced by [`AppConfig::default`].
///
/// # Returns
/// * `AppConfig` - The loaded or default configuration.
pub fn load_app_config() -> AppConfig {
    let path = env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| CONFIG_PATH.to_string());
    load_app_config_from(Path::new(&path)).apply_env()
}

/// Loads configuration from an explicit path without environment overrides.
pub fn load_app_config_from(path: &Path) -> AppConfig {
    match fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!("Config parse error ({}): {}", path.display(), err);
                AppConfig::default()
            }
        },
        Err(err) => {
            warn!("Config load error ({}): {}", path.display(), err);
            AppConfig::default()
        }
    }
}

fn fallback_chat_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn fallback_tts_model() -> String {
    "gemini-2.5-flash-preview-tts".to_string()
}

fn fallback_tts_voice() -> String {
    "Kore".to_string()
}

fn fallback_api_base_url() -> String {
    crate::ai::DEFAULT_API_BASE.to_string()
}

fn fallback_request_timeout_secs() -> u64 {
    60
}

fn fallback_system_instruction() -> String {
    "You are a patient language tutor. Keep replies short and conversational, \
     correct mistakes gently, and give one example sentence when it helps."
        .to_string()
}

fn fallback_native_speech_command() -> String {
    NativeSpeech::default_command().to_string()
}

fn fallback_lessons_path() -> PathBuf {
    PathBuf::from("lessons.json")
}

fn fallback_speak_replies() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_app_config_from(&dir.path().join("absent.json"));
        assert_eq!(config.chat_model, "gemini-2.5-flash");
        assert_eq!(config.pcm, PcmFormat::default());
        assert!(config.speak_replies);
    }

    #[test]
    fn partial_file_overrides_named_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"tts_voice": "Puck", "speak_replies": false, "pcm": {{"sample_rate": 16000}}}}"#
        )
        .unwrap();
        let config = load_app_config_from(file.path());
        assert_eq!(config.tts_voice, "Puck");
        assert!(!config.speak_replies);
        assert_eq!(config.pcm, PcmFormat::new(16_000, 1, 16));
        assert_eq!(config.tts_model, "gemini-2.5-flash-preview-tts");
    }

    #[test]
    fn invalid_json_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let config = load_app_config_from(file.path());
        assert_eq!(config.lessons_path, PathBuf::from("lessons.json"));
    }

    #[test]
    fn request_timeout_is_never_zero() {
        let config = AppConfig {
            request_timeout_secs: 0,
            ..AppConfig::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }
}
