//! Importer: builds packages from tokenized config text.
//!
//! Directives are dispatched one logical line at a time. In strict mode the
//! first error aborts the import; in lenient mode the offending line is
//! discarded, a diagnostic is recorded, and parsing resumes — if a section
//! was still accumulating, it is discarded with the line, so a half-parsed
//! section never survives.
//!
//! In merge mode the directives are applied to an existing package through
//! the mutation layer, so a merge import shows up in the delta log like any
//! other edit.

use tracing::warn;

use crate::error::{Error, ParseDiagnostic, Result};
use crate::model::{OptionValue, Package, Section};
use crate::tokenizer::{Arg, LogicalLine, Tokenizer};
use crate::validate::validate_name;

/// Importer configuration and state. Construct with [`Importer::new`],
/// drive with [`Importer::run`], consume with [`Importer::finish`].
pub struct Importer {
    strict: bool,
    perror: bool,
    /// Single-package mode: `package` directives are ignored.
    single: bool,
    merge: bool,
    /// Default package name when the stream carries no `package` line.
    name: Option<String>,
    /// Root-set names, checked for duplicates when a package is created.
    existing: Vec<String>,
    packages: Vec<Package>,
    current: Option<Package>,
    current_section: Option<usize>,
    /// True while a freshly parsed section is still accumulating options.
    section_open: bool,
    diagnostics: Vec<ParseDiagnostic>,
}

/// What an import produced: completed packages in stream order, plus any
/// diagnostics recorded during lenient recovery.
#[derive(Debug)]
pub struct ImportOutcome {
    pub packages: Vec<Package>,
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl Importer {
    #[must_use]
    pub fn new(strict: bool, perror: bool) -> Self {
        Self {
            strict,
            perror,
            single: false,
            merge: false,
            name: None,
            existing: Vec::new(),
            packages: Vec::new(),
            current: None,
            current_section: None,
            section_open: false,
            diagnostics: Vec::new(),
        }
    }

    /// Name the package when the stream has no `package` directive; also
    /// enables single-package mode (later `package` lines are ignored).
    #[must_use]
    pub fn single(mut self, name: &str) -> Self {
        self.name = Some(name.to_owned());
        self.single = true;
        self
    }

    /// Merge into an existing package instead of building a fresh tree.
    /// Implies single-package mode.
    #[must_use]
    pub fn merge_into(mut self, pkg: Package) -> Self {
        self.name = Some(pkg.name.clone());
        self.single = true;
        self.merge = true;
        self.current = Some(pkg);
        self
    }

    /// Package names already attached to the context, for duplicate
    /// detection.
    #[must_use]
    pub fn existing(mut self, names: Vec<String>) -> Self {
        self.existing = names;
        self
    }

    /// Parse the whole input.
    ///
    /// # Errors
    ///
    /// In strict mode, the first parse error. In either mode, non-parse
    /// errors (duplicate package, I/O) abort immediately.
    pub fn run(&mut self, input: &str) -> Result<()> {
        let mut tok = Tokenizer::new(input);
        loop {
            match tok.next_line() {
                Ok(None) => break,
                Ok(Some(line)) => {
                    if let Err(e) = self.dispatch(&line) {
                        self.recover_or_abort(e)?;
                    }
                }
                Err(e) => {
                    self.recover_or_abort(e)?;
                    tok.recover();
                }
            }
        }
        self.finalize_section();

        // A named stream with no directives still yields an (empty)
        // package, so freshly created config files are loadable.
        if self.current.is_none()
            && !self.merge
            && let Some(name) = self.name.clone()
        {
            self.switch_package(&name, 0, 0)?;
        }
        if let Some(pkg) = self.current.take() {
            self.packages.push(pkg);
        }
        Ok(())
    }

    pub fn finish(self) -> ImportOutcome {
        ImportOutcome {
            packages: self.packages,
            diagnostics: self.diagnostics,
        }
    }

    // ─── Line dispatch ───────────────────────────────────────────────────

    fn dispatch(&mut self, line: &LogicalLine) -> Result<()> {
        match line.args[0].text.as_str() {
            "p" | "package" => self.cmd_package(line),
            "c" | "config" => self.cmd_config(line),
            "o" | "option" => self.cmd_option(line),
            "l" | "list" => self.cmd_list(line),
            _ => Err(parse_err(line, line.args[0].offset, "invalid command")),
        }
    }

    fn cmd_package(&mut self, line: &LogicalLine) -> Result<()> {
        let name = required_name(line, 1)?;
        assert_eol(self.strict, line, 2)?;
        if self.single {
            return Ok(());
        }
        self.finalize_section();
        self.switch_package(&name.text, line.line, name.offset)
    }

    fn cmd_config(&mut self, line: &LogicalLine) -> Result<()> {
        self.finalize_section();
        if self.current.is_none() {
            let Some(name) = self.name.clone() else {
                return Err(parse_err(
                    line,
                    line.args[0].offset,
                    "attempting to import a file without a package name",
                ));
            };
            self.switch_package(&name, line.line, line.args[0].offset)?;
        }

        let ty = required_name(line, 1)?.text.clone();
        let name = optional_name(line, 2)?.map(|a| a.text.clone());
        assert_eol(self.strict, line, if name.is_some() { 3 } else { 2 })?;

        let Some(pkg) = self.current.as_mut() else {
            return Err(Error::Unknown);
        };
        if self.merge {
            let section = match name.as_deref().filter(|n| !n.is_empty()) {
                Some(n) => {
                    pkg.set(n, None, &ty, true)?;
                    n.to_owned()
                }
                None => pkg.add_anonymous(&ty, true)?,
            };
            self.current_section = pkg.section_index(&section);
        } else {
            let idx = pkg.add_section(Section::new(ty, name.as_deref()));
            self.current_section = Some(idx);
            self.section_open = true;
        }
        Ok(())
    }

    fn cmd_option(&mut self, line: &LogicalLine) -> Result<()> {
        let (section, line_no) = self.body_target(line)?;
        let name = required_name(line, 1)?.text.clone();
        let value = required(line, 2)?.text.clone();
        assert_eol(self.strict, line, 3)?;

        let Some(pkg) = self.current.as_mut() else {
            return Err(Error::Unknown);
        };
        if self.merge {
            let section_name = pkg.sections[section].name.clone();
            pkg.set(&section_name, Some(&name), &value, true)?;
        } else {
            let sec = &mut pkg.sections[section];
            if let Some(existing) = sec.option(&name)
                && matches!(existing.value, OptionValue::List(_))
            {
                return Err(Error::Parse {
                    line: line_no,
                    byte: line.args[1].offset,
                    reason: "scalar option collides with a list".into(),
                });
            }
            sec.set_scalar(&name, value);
        }
        Ok(())
    }

    fn cmd_list(&mut self, line: &LogicalLine) -> Result<()> {
        let (section, _) = self.body_target(line)?;
        let name = required_name(line, 1)?.text.clone();
        let value = required(line, 2)?.text.clone();
        assert_eol(self.strict, line, 3)?;

        let Some(pkg) = self.current.as_mut() else {
            return Err(Error::Unknown);
        };
        if self.merge {
            let section_name = pkg.sections[section].name.clone();
            pkg.add_list(&section_name, &name, &value, true)?;
        } else {
            pkg.sections[section].push_list_item(&name, value);
        }
        Ok(())
    }

    /// The section an option/list line applies to.
    fn body_target(&self, line: &LogicalLine) -> Result<(usize, u32)> {
        match self.current_section {
            Some(idx) => Ok((idx, line.line)),
            None => Err(parse_err(
                line,
                line.args[0].offset,
                "option/list command found before the first section",
            )),
        }
    }

    // ─── Package and section lifecycle ───────────────────────────────────

    fn switch_package(&mut self, name: &str, line: u32, byte: usize) -> Result<()> {
        if !validate_name(name) {
            return Err(Error::Parse {
                line,
                byte,
                reason: "invalid character in field".into(),
            });
        }
        let taken = self.existing.iter().any(|n| n == name)
            || self.packages.iter().any(|p| p.name == name)
            || self.current.as_ref().is_some_and(|p| p.name == name);
        if taken {
            return Err(Error::Duplicate(name.to_owned()));
        }
        if let Some(done) = self.current.take() {
            self.packages.push(done);
        }
        self.current = Some(Package::new(name));
        self.current_section = None;
        self.section_open = false;
        Ok(())
    }

    /// Close the section under construction, generating its name if it is
    /// anonymous. Called before a new `config`, a `package` switch, and at
    /// end of input.
    fn finalize_section(&mut self) {
        if self.section_open
            && let (Some(pkg), Some(idx)) = (self.current.as_mut(), self.current_section)
        {
            pkg.fixup_section(idx);
        }
        self.section_open = false;
        self.current_section = None;
    }

    /// Lenient recovery: record the diagnostic and discard the section the
    /// failed line belonged to. Anything non-recoverable propagates.
    fn recover_or_abort(&mut self, err: Error) -> Result<()> {
        if self.strict || !err.is_parse() {
            return Err(err);
        }
        if let Error::Parse { line, byte, reason } = &err {
            let diag = ParseDiagnostic {
                line: *line,
                byte: *byte,
                reason: reason.clone(),
            };
            if self.perror {
                warn!(line = diag.line, byte = diag.byte, reason = %diag.reason, "config parse error");
            }
            self.diagnostics.push(diag);
        }
        if self.section_open
            && !self.merge
            && let (Some(pkg), Some(idx)) = (self.current.as_mut(), self.current_section)
        {
            pkg.sections.remove(idx);
        }
        self.section_open = false;
        self.current_section = None;
        Ok(())
    }
}

// ─── Argument helpers ───────────────────────────────────────────────────────

fn parse_err(line: &LogicalLine, byte: usize, reason: &str) -> Error {
    Error::Parse {
        line: line.line,
        byte,
        reason: reason.into(),
    }
}

fn line_end(line: &LogicalLine) -> usize {
    line.args.last().map_or(0, |a| a.offset + a.text.len())
}

fn required(line: &LogicalLine, idx: usize) -> Result<&Arg> {
    line.args
        .get(idx)
        .ok_or_else(|| parse_err(line, line_end(line), "insufficient arguments"))
}

fn required_name(line: &LogicalLine, idx: usize) -> Result<&Arg> {
    let arg = required(line, idx)?;
    if !validate_name(&arg.text) {
        return Err(parse_err(line, arg.offset, "invalid character in field"));
    }
    Ok(arg)
}

/// An optional name argument: absent is fine, present-but-invalid is not.
/// An empty token counts as absent (anonymous section).
fn optional_name(line: &LogicalLine, idx: usize) -> Result<Option<&Arg>> {
    match line.args.get(idx) {
        None => Ok(None),
        Some(arg) if arg.text.is_empty() => Ok(None),
        Some(arg) => {
            if !validate_name(&arg.text) {
                return Err(parse_err(line, arg.offset, "invalid character in field"));
            }
            Ok(Some(arg))
        }
    }
}

fn assert_eol(strict: bool, line: &LogicalLine, expected: usize) -> Result<()> {
    if strict && line.args.len() > expected {
        return Err(parse_err(
            line,
            line.args[expected].offset,
            "too many arguments",
        ));
    }
    Ok(())
}
