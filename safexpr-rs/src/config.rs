//! Init-file loader.
//!
//! An init file is read line by line before any command-line expression:
//!
//! | Line | Action |
//! |------|--------|
//! | `/set <name>=<value>` or `/set <name> <value>` | set an interpreter option |
//! | Lines starting with `;` | comment, ignored |
//! | Any other `/command` | silently skipped |
//! | Anything else | evaluated (assignment, definition or expression) |
//!
//! Options: `max_depth` and `max_steps` (positive integers) and `quiet`
//! (`on`/`off`, `1`/`0`, `true`/`false`).

use std::path::Path;

use crate::script::{Interpreter, Limits};

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal error encountered while loading an init file.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Parsed init file: interpreter options plus the lines to evaluate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub limits: Limits,
    pub quiet: bool,
    /// `(line number, text)` of every line to evaluate, in file order.
    pub lines: Vec<(usize, String)>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an init file's contents.
    ///
    /// Returns the config and a list of errors on `/set` lines.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut config = Config::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with(';') {
                continue;
            }

            let Some(rest) = line.strip_prefix('/') else {
                config.lines.push((lineno, line.to_owned()));
                continue;
            };

            let (cmd, args_str) = rest
                .split_once(|c: char| c.is_ascii_whitespace())
                .unwrap_or((rest, ""));

            if cmd == "set" {
                let tokens = split_args(args_str.trim());
                if let Err(message) = parse_set(&tokens, &mut config) {
                    errors.push(ConfigError { line: lineno, message });
                }
            }
        }

        (config, errors)
    }

    /// Read and parse an init file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    /// Configure `interp` and evaluate every line in order.  A failing line
    /// is reported and loading continues.
    pub fn apply(&self, interp: &mut Interpreter) -> Vec<ConfigError> {
        interp.set_limits(self.limits);
        interp.set_suppress_errors(self.quiet);
        self.lines
            .iter()
            .filter_map(|(line, text)| {
                interp.evaluate(text).err().map(|e| ConfigError {
                    line: *line,
                    message: e.to_string(),
                })
            })
            .collect()
    }
}

// ── Argument tokenizer ────────────────────────────────────────────────────────

/// Split `s` into whitespace-delimited tokens, honouring double-quoted strings
/// and `\"` escapes within them.
fn split_args(s: &str) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = s.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => in_quotes = !in_quotes,
            '\\' if in_quotes => {
                if let Some(escaped) = chars.next() {
                    cur.push(escaped);
                }
            }
            c if c.is_ascii_whitespace() && !in_quotes => {
                if !cur.is_empty() {
                    args.push(std::mem::take(&mut cur));
                }
            }
            c => cur.push(c),
        }
    }
    if !cur.is_empty() {
        args.push(cur);
    }
    args
}

// ── /set ─────────────────────────────────────────────────────────────────────

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" | "yes" => Some(true),
        "off" | "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

fn parse_limit(name: &str, value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("/set: {name} must be a positive integer, got '{value}'")),
    }
}

/// Parse `/set <name>=<value>` or `/set <name> <value>`.
fn parse_set(tokens: &[String], config: &mut Config) -> Result<(), String> {
    if tokens.is_empty() {
        return Err("/set: requires an argument".into());
    }

    let (name, value) = if let Some((name, value)) = tokens[0].split_once('=') {
        (name.to_owned(), value.to_owned())
    } else if tokens.len() >= 2 {
        (tokens[0].clone(), tokens[1..].join(" "))
    } else {
        return Err(format!("/set: missing value for '{}'", tokens[0]));
    };

    match name.as_str() {
        "max_depth" => config.limits.max_depth = parse_limit(&name, &value)?,
        "max_steps" => config.limits.max_steps = parse_limit(&name, &value)?,
        "quiet" => {
            config.quiet = parse_flag(&value)
                .ok_or_else(|| format!("/set: quiet expects on or off, got '{value}'"))?;
        }
        "" => return Err("/set: option name cannot be empty".into()),
        other => return Err(format!("/set: unknown option '{other}'")),
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
