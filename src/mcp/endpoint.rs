//! Server endpoint resolution
//!
//! Turns a server script path into the interpreter command, argument list
//! and environment used to launch it. Nothing is spawned here, so an
//! unsupported script is rejected before any process exists.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::McpConfig;
use crate::error::{McpAgentError, Result};

/// Interpreter family selected from the script's file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    /// `.py` scripts, run with the Python interpreter
    Python,
    /// `.js` scripts, run with Node
    JavaScript,
}

impl ScriptKind {
    /// Selects the kind from the path suffix.
    ///
    /// # Errors
    ///
    /// Returns [`McpAgentError::UnsupportedScriptKind`] for any suffix other
    /// than `.py` or `.js`, including none.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("py") => Ok(ScriptKind::Python),
            Some("js") => Ok(ScriptKind::JavaScript),
            _ => Err(McpAgentError::UnsupportedScriptKind(path.display().to_string()).into()),
        }
    }

    /// Interpreter command configured for this kind.
    pub fn interpreter<'a>(&self, config: &'a McpConfig) -> &'a str {
        match self {
            ScriptKind::Python => &config.python_command,
            ScriptKind::JavaScript => &config.node_command,
        }
    }
}

#[cfg(not(windows))]
const INHERITED_ENV_VARS: &[&str] = &["HOME", "LOGNAME", "PATH", "SHELL", "TERM", "USER"];

#[cfg(windows)]
const INHERITED_ENV_VARS: &[&str] = &[
    "APPDATA",
    "HOMEDRIVE",
    "HOMEPATH",
    "LOCALAPPDATA",
    "PATH",
    "PROCESSOR_ARCHITECTURE",
    "SYSTEMDRIVE",
    "SYSTEMROOT",
    "TEMP",
    "USERNAME",
    "USERPROFILE",
];

/// The subset of the parent environment a server inherits.
pub fn default_environment() -> HashMap<String, String> {
    INHERITED_ENV_VARS
        .iter()
        .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
        // exported shell functions
        .filter(|(_, value)| !value.starts_with("()"))
        .collect()
}

/// Everything needed to launch one MCP server process.
#[derive(Debug, Clone)]
pub struct ServerEndpoint {
    /// Kind derived from the script suffix
    pub kind: ScriptKind,
    /// Interpreter executable
    pub command: String,
    /// Script passed as the interpreter's only argument
    pub script: PathBuf,
    /// Variables layered over [`default_environment`]
    pub env_overrides: HashMap<String, String>,
}

impl ServerEndpoint {
    /// Resolves the endpoint for `script` using the configured interpreters.
    ///
    /// # Errors
    ///
    /// Returns [`McpAgentError::UnsupportedScriptKind`] when the suffix is
    /// not recognised.
    pub fn resolve(script: &Path, config: &McpConfig) -> Result<Self> {
        let kind = ScriptKind::from_path(script)?;
        Ok(Self {
            kind,
            command: kind.interpreter(config).to_string(),
            script: script.to_path_buf(),
            env_overrides: config.env.clone(),
        })
    }

    /// Arguments passed to the interpreter.
    pub fn args(&self) -> Vec<String> {
        vec![self.script.to_string_lossy().into_owned()]
    }

    /// Full environment of the child process.
    pub fn environment(&self) -> HashMap<String, String> {
        let mut env = default_environment();
        env.extend(
            self.env_overrides
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        env
    }

    /// Human-readable command line used in logs and errors.
    pub fn display_command(&self) -> String {
        format!("{} {}", self.command, self.script.display())
    }
}
