//! Delta log line codec and replay.
//!
//! One recorded mutation serializes to one save-file line:
//!
//! ```text
//! [prefix]package.section[.option][=value]
//! ```
//!
//! with prefixes `-` (remove), `@` (rename), `|` (list-add), `+` (add) and
//! no prefix for a change. Values that would not survive tokenization bare
//! (whitespace, quotes, comment or separator characters) are written in the
//! exporter's quoting dialect, so every line reads back as exactly one
//! tokenizer argument.
//!
//! Replay is always lenient: a malformed or inapplicable line is logged and
//! skipped, preserving as much of the log as possible.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::export::quote;
use crate::model::{Delta, DeltaCommand, Package};
use crate::tokenizer::single_args;
use crate::validate::{validate_name, validate_text};

/// Serialize one delta as a save-file line (no trailing newline).
#[must_use]
pub fn format_line(package: &str, delta: &Delta) -> String {
    let prefix = match delta.command {
        DeltaCommand::Change => "",
        DeltaCommand::Remove => "-",
        DeltaCommand::Rename => "@",
        DeltaCommand::ListAdd => "|",
        DeltaCommand::Add => "+",
    };
    let mut line = format!("{prefix}{package}.{}", delta.section);
    if let Some(opt) = &delta.option {
        line.push('.');
        line.push_str(opt);
    }
    if delta.command != DeltaCommand::Remove
        && let Some(value) = &delta.value
    {
        line.push('=');
        line.push_str(&encode_value(value));
    }
    line
}

/// Quote a value only when tokenization would otherwise split or alter it.
fn encode_value(value: &str) -> String {
    let needs_quoting = value.is_empty()
        || value
            .bytes()
            .any(|b| matches!(b, b' ' | b'\t' | b'\'' | b'"' | b'#' | b';' | b'\\'));
    if needs_quoting {
        quote(value)
    } else {
        value.to_owned()
    }
}

/// Parse one decoded save-file argument into a delta for `package`.
///
/// # Errors
///
/// `Parse` when the line is malformed or addressed to another package.
pub fn parse_line(package: &str, line_no: u32, arg: &str) -> Result<Delta> {
    let err = |reason: &str| Error::Parse {
        line: line_no,
        byte: 0,
        reason: reason.into(),
    };

    let (command, rest) = match arg.as_bytes().first() {
        Some(b'-') => (DeltaCommand::Remove, &arg[1..]),
        Some(b'@') => (DeltaCommand::Rename, &arg[1..]),
        Some(b'|') => (DeltaCommand::ListAdd, &arg[1..]),
        Some(b'+') => (DeltaCommand::Add, &arg[1..]),
        _ => (DeltaCommand::Change, arg),
    };

    let (path, value) = match rest.split_once('=') {
        Some((p, v)) => (p, Some(v.to_owned())),
        None => (rest, None),
    };
    let mut parts = path.splitn(4, '.');
    let pkg_name = parts.next().unwrap_or_default();
    let section = parts.next().ok_or_else(|| err("missing section"))?;
    let option = parts.next().map(str::to_owned);
    if parts.next().is_some() {
        return Err(err("too many components"));
    }

    if pkg_name != package {
        return Err(err("entry for foreign package"));
    }
    if !validate_name(section) {
        return Err(err("invalid section name"));
    }
    if let Some(opt) = option.as_deref()
        && !validate_name(opt)
    {
        return Err(err("invalid option name"));
    }

    // Per-command value discipline; a remove carries none.
    let value = match command {
        DeltaCommand::Remove => None,
        DeltaCommand::Rename | DeltaCommand::Add => {
            let v = value.ok_or_else(|| err("missing value"))?;
            if !validate_name(&v) {
                return Err(err("invalid value"));
            }
            Some(v)
        }
        DeltaCommand::Change => {
            let v = value.ok_or_else(|| err("missing value"))?;
            let valid = if option.is_some() {
                validate_text(&v)
            } else {
                validate_name(&v)
            };
            if !valid {
                return Err(err("invalid value"));
            }
            Some(v)
        }
        DeltaCommand::ListAdd => {
            let v = value.ok_or_else(|| err("missing value"))?;
            if option.is_none() || !validate_text(&v) {
                return Err(err("invalid value"));
            }
            Some(v)
        }
    };

    Ok(Delta {
        command,
        section: section.to_owned(),
        option,
        value,
    })
}

/// Apply one delta to a package through the unlogged mutation layer.
pub fn apply(pkg: &mut Package, delta: &Delta) -> Result<()> {
    let value = delta.value.as_deref();
    match delta.command {
        DeltaCommand::Change => {
            pkg.set(&delta.section, delta.option.as_deref(), value.unwrap_or(""), false)
        }
        DeltaCommand::Remove => pkg.delete(&delta.section, delta.option.as_deref(), false),
        DeltaCommand::Rename => {
            pkg.rename(&delta.section, delta.option.as_deref(), value.unwrap_or(""), false)
        }
        DeltaCommand::ListAdd => {
            let Some(opt) = delta.option.as_deref() else {
                return Err(Error::inval("list-add without option".to_owned()));
            };
            pkg.add_list(&delta.section, opt, value.unwrap_or(""), false)
        }
        DeltaCommand::Add => {
            pkg.set(&delta.section, None, value.unwrap_or(""), false)?;
            if let Some(sec) = pkg.section_mut(&delta.section) {
                sec.anonymous = true;
            }
            pkg.reserve_anon_counter(&delta.section);
            Ok(())
        }
    }
}

/// Replay a whole save-file buffer into `pkg`, skipping malformed or
/// inapplicable lines. When `record` is set, each applied delta is appended
/// to the package's saved list so it can be shown and reverted later.
///
/// Returns the number of applied entries.
pub fn replay(pkg: &mut Package, input: &str, record: bool) -> usize {
    let mut applied = 0;
    for entry in single_args(input) {
        let (line_no, text) = match entry {
            Ok(pair) => pair,
            Err(e) => {
                warn!(package = %pkg.name, error = %e, "skipping malformed delta line");
                continue;
            }
        };
        let delta = match parse_line(&pkg.name, line_no, &text) {
            Ok(d) => d,
            Err(e) => {
                warn!(package = %pkg.name, error = %e, "skipping malformed delta line");
                continue;
            }
        };
        if let Err(e) = apply(pkg, &delta) {
            warn!(package = %pkg.name, line = line_no, error = %e, "skipping inapplicable delta");
            continue;
        }
        if record {
            pkg.saved_deltas.push(delta);
        }
        applied += 1;
    }
    debug!(package = %pkg.name, applied, "replayed delta log");
    applied
}

/// Serialize a slice of deltas as save-file content.
#[must_use]
pub fn render(package: &str, deltas: &[Delta]) -> String {
    let mut out = String::new();
    for d in deltas {
        out.push_str(&format_line(package, d));
        out.push('\n');
    }
    out
}

/// True when a delta is addressed by `section` (and `option`, if given).
/// Used by revert to select entries for removal.
#[must_use]
pub fn matches(delta: &Delta, section: &str, option: Option<&str>) -> bool {
    if delta.section != section {
        return false;
    }
    match option {
        None => true,
        Some(opt) => delta.option.as_deref() == Some(opt),
    }
}

// ─── Save-file I/O ──────────────────────────────────────────────────────────

use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::backend::{open_locked, read_text};
use crate::context::Options;

/// Per-package save-file location under a delta directory.
#[must_use]
pub fn save_file_path(dir: &Path, package: &str) -> PathBuf {
    dir.join(package)
}

/// Replay one delta file into `pkg`. A missing file is not an error; an
/// unreadable one is skipped with a warning (best-effort preservation).
fn replay_file(path: &Path, pkg: &mut Package, record: bool) -> Result<()> {
    let mut file = match open_locked(path, false, false) {
        Ok(f) => f,
        Err(Error::NotFound(_)) => return Ok(()),
        Err(e) => return Err(e),
    };
    match read_text(&mut file) {
        Ok(text) => {
            replay(pkg, &text, record);
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unreadable delta file");
        }
    }
    Ok(())
}

/// Load-time replay: the read-only delta search paths in order, then the
/// savedir's file. Entries are recorded on the package when `saved_history`
/// is set so they can be listed and reverted.
pub(crate) fn load_all(opts: &Options, pkg: &mut Package) -> Result<()> {
    for dir in &opts.delta_paths {
        replay_file(&save_file_path(dir, &pkg.name), pkg, opts.saved_history)?;
    }
    replay_file(
        &save_file_path(&opts.savedir, &pkg.name),
        pkg,
        opts.saved_history,
    )?;
    Ok(())
}

/// Append the package's pending deltas to its save file under an exclusive
/// lock, then move them to the saved list. Appending keeps the operation
/// cheap; a torn tail line is skipped by the lenient replayer.
pub(crate) fn save_pending(opts: &Options, pkg: &mut Package) -> Result<()> {
    if pkg.pending_deltas.is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(&opts.savedir)?;
    let path = save_file_path(&opts.savedir, &pkg.name);
    let mut file = open_locked(&path, true, true)?;
    file.seek(SeekFrom::End(0))?;
    let text = render(&pkg.name, &pkg.pending_deltas);
    file.write_all(text.as_bytes())?;
    let drained: Vec<Delta> = pkg.pending_deltas.drain(..).collect();
    pkg.saved_deltas.extend(drained);
    debug!(package = %pkg.name, path = %path.display(), "flushed pending deltas");
    Ok(())
}

/// Commit-time merge: replay the read-only search paths, then consume the
/// savedir's file — replay its contents and truncate it under the held
/// exclusive lock.
pub(crate) fn flush_into(opts: &Options, pkg: &mut Package) -> Result<()> {
    for dir in &opts.delta_paths {
        replay_file(&save_file_path(dir, &pkg.name), pkg, false)?;
    }
    let path = save_file_path(&opts.savedir, &pkg.name);
    let mut file = match open_locked(&path, true, false) {
        Ok(f) => f,
        Err(Error::NotFound(_)) => return Ok(()),
        Err(e) => return Err(e),
    };
    match read_text(&mut file) {
        Ok(text) => {
            replay(pkg, &text, false);
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "discarding unreadable delta file");
        }
    }
    file.set_len(0)?;
    Ok(())
}

/// Drop any saved deltas on disk without applying them.
pub(crate) fn truncate_save(opts: &Options, package: &str) -> Result<()> {
    let path = save_file_path(&opts.savedir, package);
    match open_locked(&path, true, false) {
        Ok(file) => {
            file.set_len(0)?;
            Ok(())
        }
        Err(Error::NotFound(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Rewrite the save file to contain exactly the package's saved deltas.
/// Used by revert after filtering.
pub(crate) fn rewrite_saved(opts: &Options, pkg: &Package) -> Result<()> {
    let path = save_file_path(&opts.savedir, &pkg.name);
    if pkg.saved_deltas.is_empty() && !path.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(&opts.savedir)?;
    let mut file = open_locked(&path, true, true)?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(render(&pkg.name, &pkg.saved_deltas).as_bytes())?;
    Ok(())
}
