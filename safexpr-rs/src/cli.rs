//! Command-line argument parsing.
//!
//! Usage:
//!   safexpr [-qd] [-f[<file>]] [-c<expr>]... [<expr>...]
//!
//! `-c` expressions and positional expressions are evaluated in the order
//! given.  Use `--` before an expression that starts with `-`.

use std::path::PathBuf;

use directories::{BaseDirs, ProjectDirs};

// ── Public types ──────────────────────────────────────────────────────────────

/// Parsed command-line arguments.
#[derive(Debug, Default)]
pub struct CliArgs {
    /// Which init file to load.
    pub config: ConfigFile,
    /// Expressions to evaluate instead of reading stdin.
    pub exprs: Vec<String>,
    /// Don't log evaluation failures (`-q`).
    pub quiet: bool,
    /// Debug logging (`-d`).
    pub debug: bool,
}

/// How to choose the init file.
#[derive(Debug, Default)]
pub enum ConfigFile {
    /// Search the standard locations (default).
    #[default]
    Search,
    /// `-f` with no file argument: skip the init file.
    Skip,
    /// `-f<file>`: load this specific file.
    Explicit(PathBuf),
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `std::env::args()` and return [`CliArgs`] or an error message.
pub fn parse_args() -> Result<CliArgs, String> {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    parse_argv(&raw)
}

/// Parse a slice of argument strings (exposed for testing).
pub fn parse_argv(argv: &[String]) -> Result<CliArgs, String> {
    let mut args = CliArgs::default();
    let mut i = 0;

    while i < argv.len() {
        let arg = argv[i].as_str();

        // `--` ends flag processing.
        if arg == "--" {
            args.exprs.extend(argv[i + 1..].iter().cloned());
            break;
        }

        if !arg.starts_with('-') || arg == "-" {
            args.exprs.push(arg.to_owned());
            i += 1;
            continue;
        }

        // Flag cluster: iterate over characters after the leading `-`.
        let chars: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < chars.len() {
            match chars[j] {
                'd' => args.debug = true,
                'q' => args.quiet = true,

                // -f[<file>]; the file name must be attached.
                'f' => {
                    args.config = if j + 1 < chars.len() {
                        ConfigFile::Explicit(PathBuf::from(chars[j + 1..].iter().collect::<String>()))
                    } else {
                        ConfigFile::Skip
                    };
                    j = chars.len();
                }

                // -c<expr> or -c <expr>
                'c' => {
                    let expr = if j + 1 < chars.len() {
                        let s: String = chars[j + 1..].iter().collect();
                        j = chars.len();
                        s
                    } else if i + 1 < argv.len() {
                        i += 1;
                        argv[i].clone()
                    } else {
                        return Err("-c requires an expression argument".to_owned());
                    };
                    args.exprs.push(expr);
                }

                c => return Err(format!("unknown option: -{c}")),
            }
            j += 1;
        }
        i += 1;
    }

    Ok(args)
}

// ── Path helpers ──────────────────────────────────────────────────────────────

/// Candidate init files, most specific first.
pub fn config_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(dirs) = ProjectDirs::from("", "", "safexpr") {
        paths.push(dirs.config_dir().join("init.sx"));
    }
    if let Some(base) = BaseDirs::new() {
        paths.push(base.home_dir().join(".safexprrc"));
    }
    paths.push(PathBuf::from("./.safexprrc"));
    paths
}

/// Search for the init file in the standard locations.
/// Returns the first path that exists, or `None`.
pub fn find_user_config() -> Option<PathBuf> {
    config_candidates().into_iter().find(|p| p.exists())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
