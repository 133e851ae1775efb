/*
 * @file lessons.rs
 * @brief Locally persisted lessons library for voxtutor
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

//! Lessons library persisted as a JSON file.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of words used when a lesson title is derived from its content.
const DERIVED_TITLE_WORDS: usize = 6;

/// A saved piece of tutor output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    /// Stable identifier shown to the user.
    pub id: u64,
    /// Short human-readable title.
    pub title: String,
    /// Full lesson text.
    pub content: String,
    /// When the lesson was saved.
    pub saved_at: DateTime<Utc>,
}

/// In-memory lessons list bound to its JSON file.
///
/// # Details
/// Mutations only touch memory; call [`LessonLibrary::persist`] to write
/// them back.
#[derive(Debug)]
pub struct LessonLibrary {
    path: PathBuf,
    lessons: Vec<Lesson>,
}

impl LessonLibrary {
    /// Creates an empty library that will persist to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lessons: Vec::new(),
        }
    }

    /// Loads the library stored at `path`.
    ///
    /// # Details
    /// A missing or blank file yields an empty library.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self::empty(path));
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if contents.trim().is_empty() {
            return Ok(Self::empty(path));
        }
        let lessons: Vec<Lesson> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(Self { path, lessons })
    }

    /// Writes the library as pretty-printed JSON, overwriting the file.
    ///
    /// # Errors
    /// Returns an error if serialization fails or the file cannot be written.
    pub fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.lessons)
            .with_context(|| format!("Failed to serialize {}", self.path.display()))?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    /// Adds a lesson and returns it.
    ///
    /// # Arguments
    /// * `title` - Title to show; derived from `content` when blank.
    /// * `content` - Lesson body.
    ///
    /// # Errors
    /// Returns an error when `content` is blank.
    pub fn add(&mut self, title: &str, content: &str) -> Result<&Lesson> {
        let content = content.trim();
        if content.is_empty() {
            anyhow::bail!("Cannot save an empty lesson");
        }
        let title = match title.trim() {
            "" => derive_title(content),
            given => given.to_string(),
        };
        let id = self.lessons.iter().map(|l| l.id).max().unwrap_or(0) + 1;
        self.lessons.push(Lesson {
            id,
            title,
            content: content.to_string(),
            saved_at: Utc::now(),
        });
        Ok(&self.lessons[self.lessons.len() - 1])
    }

    pub fn get(&self, id: u64) -> Option<&Lesson> {
        self.lessons.iter().find(|lesson| lesson.id == id)
    }

    /// Removes the lesson with `id`, returning whether it existed.
    pub fn remove(&mut self, id: u64) -> bool {
        let before = self.lessons.len();
        self.lessons.retain(|lesson| lesson.id != id);
        self.lessons.len() != before
    }

    pub fn list(&self) -> &[Lesson] {
        &self.lessons
    }

    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Builds a title from the first words of `content`.
fn derive_title(content: &str) -> String {
    let words: Vec<&str> = content.split_whitespace().collect();
    let mut title = words
        .iter()
        .take(DERIVED_TITLE_WORDS)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    if words.len() > DERIVED_TITLE_WORDS {
        title.push('…');
    }
    title
}
