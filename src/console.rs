//! Interactive input and output
//!
//! Queries are read through an [`InputSource`]; banners, answers and error
//! lines go through a [`Console`]. Diagnostics never go here; they are
//! logged with `tracing` on stderr.

use std::collections::VecDeque;
use std::io::Write;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::error::Result;

/// Prompt shown before each query.
pub const QUERY_PROMPT: &str = "\nQuery: ";

/// Source of user query lines.
pub trait InputSource {
    /// Reads one line. `Ok(None)` ends the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying terminal fails.
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;
}

/// Line editor backed by rustyline, with in-memory history.
pub struct ReadlineInput {
    editor: DefaultEditor,
}

impl ReadlineInput {
    /// Creates the editor.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be initialised.
    pub fn new() -> Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl InputSource for ReadlineInput {
    fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted) => {
                tracing::debug!("Input interrupted");
                Ok(None)
            }
            Err(ReadlineError::Eof) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Fixed list of lines, for tests and piped input.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    lines: VecDeque<String>,
    prompts: usize,
}

impl ScriptedInput {
    /// Creates a source that yields `lines` then end of input.
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            prompts: 0,
        }
    }

    /// Number of times a line was requested.
    pub fn prompts(&self) -> usize {
        self.prompts
    }

    /// Lines not yet consumed.
    pub fn remaining(&self) -> usize {
        self.lines.len()
    }
}

impl InputSource for ScriptedInput {
    fn read_line(&mut self, _prompt: &str) -> Result<Option<String>> {
        self.prompts += 1;
        Ok(self.lines.pop_front())
    }
}

/// User-facing output sink.
pub struct Console {
    out: Box<dyn Write + Send>,
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console").finish_non_exhaustive()
    }
}

impl Console {
    /// Writes to `out`.
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out }
    }

    /// Writes to standard output.
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text).and_then(|_| self.out.flush()) {
            tracing::debug!("Console write failed: {}", e);
        }
    }

    /// Lists the tools found on connect.
    pub fn connected(&mut self, tools: &[String]) {
        let quoted: Vec<String> = tools.iter().map(|t| format!("'{}'", t)).collect();
        self.line(&format!(
            "\nConnected to server with tools: [{}]",
            quoted.join(", ")
        ));
    }

    /// Prints the start banner.
    pub fn banner(&mut self) {
        self.line(&format!("\n{}", "MCP Client Started!".green().bold()));
        self.line("Type your queries or 'quit' to exit.");
    }

    /// Prints a final answer.
    pub fn answer(&mut self, text: &str) {
        self.line(&format!("\n{}", text));
    }

    /// Prints `err` as a single `Error: ...` line.
    pub fn error(&mut self, err: &anyhow::Error) {
        let message = err.to_string().replace(['\r', '\n'], " ");
        self.line(&format!("\n{}", format!("Error: {}", message).red()));
    }
}
