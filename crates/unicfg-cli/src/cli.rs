//! Command-line argument parsing for the `unicfg` binary.
//!
//! Options come first, then the subcommand, then its operands — getopt
//! discipline, parsed by hand.

use std::path::PathBuf;
use std::str::FromStr;

use unicfg_core::{Error, Result};

// ─── Exit Codes ──────────────────────────────────────────────────────────────

/// Standardized exit codes for the unicfg CLI.
pub mod exit_code {
    /// Success.
    pub const OK: i32 = 0;
    /// Operational failure (load, parse, commit error).
    pub const FAILURE: i32 = 1;
    /// Unknown subcommand or unusable invocation; usage is printed.
    pub const USAGE: i32 = 255;
}

// ─── Command ─────────────────────────────────────────────────────────────────

/// Top-level subcommands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliCommand {
    Show,
    Export,
    Import,
    Changes,
    Commit,
    Revert,
    Get,
    Set,
    Del,
    Rename,
    Add,
    Help,
    Batch,
}

impl CliCommand {
    /// All valid command names for the usage text.
    pub const ALL_NAMES: &'static [&'static str] = &[
        "show", "export", "import", "changes", "commit", "revert", "get", "set", "del", "rename",
        "add", "help", "batch",
    ];
}

impl FromStr for CliCommand {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "show" => Ok(Self::Show),
            "export" => Ok(Self::Export),
            "import" => Ok(Self::Import),
            "changes" => Ok(Self::Changes),
            "commit" => Ok(Self::Commit),
            "revert" => Ok(Self::Revert),
            "get" => Ok(Self::Get),
            "set" => Ok(Self::Set),
            "del" | "delete" => Ok(Self::Del),
            "rename" => Ok(Self::Rename),
            "add" => Ok(Self::Add),
            "help" => Ok(Self::Help),
            "batch" => Ok(Self::Batch),
            _ => Err(()),
        }
    }
}

// ─── Parsed input ────────────────────────────────────────────────────────────

/// Parsed invocation: global options plus one command and its operands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliInput {
    pub command: CliCommand,
    /// Operands following the command token.
    pub args: Vec<String>,
    /// `-c`: config directory override.
    pub confdir: Option<PathBuf>,
    /// `-p`: additional delta search paths, in order.
    pub delta_paths: Vec<PathBuf>,
    /// `-P`: alternate savedir; implies the old savedir becomes a search
    /// path and commits are suppressed.
    pub savedir: Option<PathBuf>,
    /// `-m`: merge on import.
    pub merge: bool,
    /// `-s` / `-S`: strict parsing (default on).
    pub strict: bool,
    /// `-n` / `-N`: emit generated names for anonymous sections.
    pub export_name: bool,
    /// `-q`: suppress error messages.
    pub quiet: bool,
    /// `-f`: read from this file instead of stdin.
    pub input_file: Option<PathBuf>,
}

impl Default for CliInput {
    fn default() -> Self {
        Self {
            command: CliCommand::Help,
            args: Vec::new(),
            confdir: None,
            delta_paths: Vec::new(),
            savedir: None,
            merge: false,
            strict: true,
            export_name: false,
            quiet: false,
            input_file: None,
        }
    }
}

/// Parse argv (without the program name).
///
/// # Errors
///
/// `Inval` on a malformed or unknown option, or a missing option value.
/// An unknown *command* is not an error here — the caller turns `None`
/// into usage + exit 255.
pub fn parse_cli_args<I, S>(args: I) -> Result<Option<CliInput>>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let tokens: Vec<String> = args.into_iter().map(Into::into).collect();
    let mut input = CliInput::default();
    let mut idx = 0;

    // Options first.
    while idx < tokens.len() {
        let tok = tokens[idx].as_str();
        if !tok.starts_with('-') || tok.len() < 2 {
            break;
        }
        match tok {
            "-c" => {
                input.confdir = Some(PathBuf::from(expect_value(&tokens, idx, "-c")?));
                idx += 2;
            }
            "-p" => {
                input
                    .delta_paths
                    .push(PathBuf::from(expect_value(&tokens, idx, "-p")?));
                idx += 2;
            }
            "-P" => {
                input.savedir = Some(PathBuf::from(expect_value(&tokens, idx, "-P")?));
                idx += 2;
            }
            "-f" => {
                input.input_file = Some(PathBuf::from(expect_value(&tokens, idx, "-f")?));
                idx += 2;
            }
            "-m" => {
                input.merge = true;
                idx += 1;
            }
            "-s" => {
                input.strict = true;
                idx += 1;
            }
            "-S" => {
                input.strict = false;
                idx += 1;
            }
            "-n" => {
                input.export_name = true;
                idx += 1;
            }
            "-N" => {
                input.export_name = false;
                idx += 1;
            }
            "-q" => {
                input.quiet = true;
                idx += 1;
            }
            other => {
                return Err(Error::Inval(format!("unknown option: {other}")));
            }
        }
    }

    let Some(command_tok) = tokens.get(idx) else {
        return Ok(None);
    };
    let Ok(command) = CliCommand::from_str(command_tok) else {
        return Ok(None);
    };
    input.command = command;
    input.args = tokens[idx + 1..].to_vec();
    Ok(Some(input))
}

fn expect_value<'t>(tokens: &'t [String], idx: usize, flag: &str) -> Result<&'t str> {
    tokens
        .get(idx + 1)
        .map(String::as_str)
        .ok_or_else(|| Error::Inval(format!("option {flag} requires a value")))
}

/// The usage text printed on `help` and on unknown commands.
#[must_use]
pub fn usage(program: &str) -> String {
    format!(
        "Usage: {program} [<options>] <command> [<arguments>]\n\
         \n\
         Commands:\n\
         \tshow       [<config>[.<section>[.<option>]]]\n\
         \texport     [<config>]\n\
         \timport     [<config>]\n\
         \tchanges    [<config>]\n\
         \tcommit     [<config>]\n\
         \trevert     <config>[.<section>[.<option>]]\n\
         \tget        <config>.<section>[.<option>]\n\
         \tset        <config>.<section>[.<option>]=<value>\n\
         \tdel        <config>.<section>[.<option>]\n\
         \trename     <config>.<section>[.<option>]=<name>\n\
         \tadd        <config> <section-type>\n\
         \tbatch\n\
         \thelp\n\
         \n\
         Options:\n\
         \t-c <path>  set the search path for config files (default: /etc/config)\n\
         \t-p <path>  add a search path for config change files\n\
         \t-P <path>  like -p, but also set the save directory and disable committing\n\
         \t-f <file>  use <file> as input instead of stdin\n\
         \t-m         when importing, merge data into an existing package\n\
         \t-s         force strict mode (default)\n\
         \t-S         disable strict mode\n\
         \t-n         name unnamed sections on export\n\
         \t-N         do not name unnamed sections\n\
         \t-q         quiet mode (do not print error messages)\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Option<CliInput> {
        parse_cli_args(args.iter().copied()).expect("parse")
    }

    #[test]
    fn bare_command() {
        let input = parse(&["show"]).expect("input");
        assert_eq!(input.command, CliCommand::Show);
        assert!(input.args.is_empty());
        assert!(input.strict);
        assert!(!input.export_name);
    }

    #[test]
    fn command_with_operands() {
        let input = parse(&["set", "net.lan.ipaddr=10.0.0.1"]).expect("input");
        assert_eq!(input.command, CliCommand::Set);
        assert_eq!(input.args, ["net.lan.ipaddr=10.0.0.1"]);
    }

    #[test]
    fn options_before_command() {
        let input = parse(&["-c", "/tmp/cfg", "-S", "-q", "show"]).expect("input");
        assert_eq!(input.confdir.as_deref(), Some(std::path::Path::new("/tmp/cfg")));
        assert!(!input.strict);
        assert!(input.quiet);
    }

    #[test]
    fn delta_paths_accumulate_in_order() {
        let input = parse(&["-p", "/a", "-p", "/b", "changes"]).expect("input");
        assert_eq!(
            input.delta_paths,
            [PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }

    #[test]
    fn savedir_flag() {
        let input = parse(&["-P", "/tmp/alt", "commit"]).expect("input");
        assert_eq!(input.savedir.as_deref(), Some(std::path::Path::new("/tmp/alt")));
    }

    #[test]
    fn name_flags_toggle() {
        assert!(parse(&["-n", "export"]).expect("input").export_name);
        assert!(!parse(&["-n", "-N", "export"]).expect("input").export_name);
    }

    #[test]
    fn unknown_command_is_none() {
        assert!(parse(&["frobnicate"]).is_none());
        assert!(parse(&[]).is_none());
    }

    #[test]
    fn unknown_option_is_an_error() {
        assert!(parse_cli_args(["-z", "show"]).is_err());
    }

    #[test]
    fn option_missing_value_is_an_error() {
        assert!(parse_cli_args(["-c"]).is_err());
    }

    #[test]
    fn delete_alias() {
        assert_eq!(parse(&["delete", "a.b"]).expect("input").command, CliCommand::Del);
    }
}
