/*
 * @file commands.rs
 * @brief Chat command parsing for voxtutor
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

//! Slash-command parsing for the chat prompt.

/// Words that end the session when typed as a plain message.
const QUIT_WORDS: [&str; 4] = ["quit", "exit", "goodbye", "bye"];

/// A parsed line of user input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Leave the session.
    Quit,
    /// Print the command list.
    Help,
    /// Stop playback and native speech.
    Stop,
    /// Forget the conversation history.
    Clear,
    /// Speak the last reply again.
    Replay,
    /// Save the last reply as a lesson, with an optional title.
    Save(String),
    /// List saved lessons.
    Lessons,
    /// Show and speak one lesson.
    Lesson(u64),
    /// Delete one lesson.
    Delete(u64),
    /// Speak text without asking the model.
    Say(String),
    /// Send text to the chat model.
    Chat(String),
    /// Nothing to do (blank line).
    Empty,
    /// A slash command that could not be understood.
    Invalid(String),
}

/// Static description of a slash command for the help text.
struct CommandHelp {
    usage: &'static str,
    description: &'static str,
}

const COMMAND_HELP: [CommandHelp; 10] = [
    CommandHelp { usage: "/help", description: "show this list" },
    CommandHelp { usage: "/stop", description: "stop speaking" },
    CommandHelp { usage: "/clear", description: "start a fresh conversation" },
    CommandHelp { usage: "/replay", description: "speak the last reply again" },
    CommandHelp { usage: "/save [title]", description: "save the last reply as a lesson" },
    CommandHelp { usage: "/lessons", description: "list saved lessons" },
    CommandHelp { usage: "/lesson <id>", description: "show and speak a lesson" },
    CommandHelp { usage: "/delete <id>", description: "delete a lesson" },
    CommandHelp { usage: "/say <text>", description: "speak text without asking the tutor" },
    CommandHelp { usage: "/quit", description: "leave" },
];

/// Parses one line of input.
///
/// # Details
/// Lines starting with `/` are commands; anything else is chat, except a
/// bare quit phrase which ends the session.
///
/// # Arguments
/// * `line` - Raw line read from the prompt.
///
/// # Returns
/// * `Command` - The action to perform.
pub fn parse(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        if is_quit_command(line) {
            return Command::Quit;
        }
        return Command::Chat(line.to_string());
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (rest, ""),
    };
    match name.to_lowercase().as_str() {
        "quit" | "exit" => Command::Quit,
        "help" | "?" => Command::Help,
        "stop" => Command::Stop,
        "clear" | "reset" => Command::Clear,
        "replay" => Command::Replay,
        "save" => Command::Save(arg.to_string()),
        "lessons" => Command::Lessons,
        "lesson" => parse_id(arg, Command::Lesson, line),
        "delete" => parse_id(arg, Command::Delete, line),
        "say" if !arg.is_empty() => Command::Say(arg.to_string()),
        _ => Command::Invalid(line.to_string()),
    }
}

fn parse_id(arg: &str, build: fn(u64) -> Command, line: &str) -> Command {
    arg.parse()
        .map(build)
        .unwrap_or_else(|_| Command::Invalid(line.to_string()))
}

/// Checks whether a plain message is a request to leave.
///
/// # Arguments
/// * `text` - The user's input text.
///
/// # Returns
/// `true` when the whole message is one of the quit words, ignoring case and
/// trailing punctuation.
pub fn is_quit_command(text: &str) -> bool {
    let normalized = text
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .to_lowercase();
    QUIT_WORDS.contains(&normalized.as_str())
}

/// Generates the help text listing every command.
pub fn generate_command_list() -> String {
    let mut result = String::from("Available commands:\n");
    for cmd in &COMMAND_HELP {
        result.push_str(&format!("  {:<14} {}\n", cmd.usage, cmd.description));
    }
    result
}
