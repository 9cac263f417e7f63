//! Declarative command contract: `${VAR}` expansion followed by shell-style splitting.

use std::collections::HashMap;

use super::error::ProcessError;

/// Per-process environment overrides.
///
/// Values here take precedence over the ambient environment, both when expanding
/// the command template and in the spawned child's environment.
pub type Environment = HashMap<String, String>;

/// A resolved command line: program plus arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Expands `template` against `env` (then the ambient environment) and splits it.
    pub fn resolve(template: &str, env: &Environment) -> Result<Self, ProcessError> {
        let expanded = expand(template, env);
        Self::parse(&expanded)
    }

    /// Splits an already expanded command string the way a POSIX shell would.
    pub fn parse(command: &str) -> Result<Self, ProcessError> {
        let mut parts = shell_words::split(command).map_err(|e| ProcessError::InvalidCommand {
            reason: e.to_string(),
        })?;

        if parts.is_empty() {
            return Err(ProcessError::EmptyCommand);
        }

        let program = parts.remove(0);
        Ok(Self {
            program,
            args: parts,
        })
    }

    /// Renders the command line back into a single display string.
    pub fn display(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        shell_words::join(words)
    }
}

/// Replaces `${VAR}` and `$VAR` placeholders.
///
/// Lookup order is the override map, then the ambient process environment.
/// Unknown variables expand to an empty string.
pub fn expand(template: &str, env: &Environment) -> String {
    shellexpand::env_with_context_no_errors(template, |var: &str| {
        Some(
            env.get(var)
                .cloned()
                .or_else(|| std::env::var(var).ok())
                .unwrap_or_default(),
        )
    })
    .into_owned()
}
