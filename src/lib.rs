/*
 * @file lib.rs
 * @brief voxtutor library root
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

//! voxtutor - a terminal language tutor that talks back.
//!
//! This library provides a conversational assistant that uses:
//! - Gemini chat models for replies
//! - Gemini speech models for spoken audio
//! - A playback resolver that recovers headerless PCM by synthesizing a
//!   WAV header before falling back to the platform speech command
//! - A small lessons library persisted as JSON
//!
//! # Example
//! ```no_run
//! use anyhow::Result;
//! use voxtutor::assistant;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     dotenv::dotenv().ok();
//!     assistant::run_assistant().await
//! }
//! ```

pub mod ai;
pub mod assistant;
pub mod audio;
pub mod commands;
pub mod config;
pub mod lessons;
pub mod playback;
pub mod speech;
pub mod tts;
pub mod wav;
