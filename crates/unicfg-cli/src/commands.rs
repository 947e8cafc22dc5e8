//! Subcommand execution over a configured [`Context`].

use std::io::Read;
use std::path::PathBuf;

use unicfg_core::pointer::section_index;
use unicfg_core::{Context, Error, Pointer, Result};

use crate::cli::{CliCommand, CliInput, exit_code};

/// One CLI invocation: a context wired from the global options plus the
/// bits of invocation state the commands need.
pub struct App {
    ctx: Context,
    quiet: bool,
    merge: bool,
    /// Set by `-P`: record changes in the alternate savedir, never touch
    /// the canonical files.
    no_commit: bool,
    input_file: Option<PathBuf>,
}

impl App {
    #[must_use]
    pub fn new(input: &CliInput) -> Self {
        let mut ctx = Context::new();
        if let Some(dir) = &input.confdir {
            ctx.set_confdir(dir.clone());
        }
        for path in &input.delta_paths {
            ctx.add_delta_path(path.clone());
        }
        let mut no_commit = false;
        if let Some(dir) = &input.savedir {
            // The previous savedir stays visible as a read-only search
            // path, the new one takes the writes.
            let old = ctx.options().savedir.clone();
            ctx.add_delta_path(old);
            ctx.set_savedir(dir.clone());
            no_commit = true;
        }
        ctx.set_strict(input.strict);
        ctx.set_export_name(input.export_name);
        ctx.set_perror(!input.quiet);

        Self {
            ctx,
            quiet: input.quiet,
            merge: input.merge,
            no_commit,
            input_file: input.input_file.clone(),
        }
    }

    /// Execute the parsed invocation, returning the process exit code.
    pub fn run(&mut self, input: &CliInput) -> i32 {
        match self.dispatch(input.command, &input.args) {
            Ok(()) => exit_code::OK,
            Err(e) => {
                self.report(command_name(input.command), &e);
                exit_code::FAILURE
            }
        }
    }

    fn dispatch(&mut self, command: CliCommand, args: &[String]) -> Result<()> {
        match command {
            CliCommand::Show => self.cmd_show(args),
            CliCommand::Export => self.cmd_export(args),
            CliCommand::Import => self.cmd_import(args),
            CliCommand::Changes => self.cmd_changes(args),
            CliCommand::Commit => self.cmd_commit(args),
            CliCommand::Revert => self.cmd_revert(args),
            CliCommand::Get => self.cmd_get(args),
            CliCommand::Set => self.cmd_set(args),
            CliCommand::Del => self.cmd_del(args),
            CliCommand::Rename => self.cmd_rename(args),
            CliCommand::Add => self.cmd_add(args),
            CliCommand::Help => {
                print!("{}", crate::cli::usage("unicfg"));
                Ok(())
            }
            CliCommand::Batch => self.cmd_batch(),
        }
    }

    fn report(&self, function: &str, err: &Error) {
        if !self.quiet {
            eprintln!("unicfg: {function}: {err}");
        }
    }

    fn ensure_loaded(&mut self, name: &str) -> Result<()> {
        if self.ctx.package(name).is_none() {
            self.ctx.load(name)?;
        }
        Ok(())
    }

    fn read_input(&self) -> Result<String> {
        match &self.input_file {
            Some(path) => Ok(std::fs::read_to_string(path)?),
            None => {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                Ok(buf)
            }
        }
    }

    // ─── Read commands ───────────────────────────────────────────────────

    fn cmd_show(&mut self, args: &[String]) -> Result<()> {
        let Some(spec) = args.first() else {
            for name in self.ctx.list_configs()? {
                self.show_package(&name, None)?;
            }
            return Ok(());
        };
        let ptr = Pointer::parse(spec)?;
        self.show_package(&ptr.package, Some(&ptr))
    }

    fn show_package(&mut self, name: &str, filter: Option<&Pointer>) -> Result<()> {
        self.ensure_loaded(name)?;
        let pkg = self
            .ctx
            .package(name)
            .ok_or_else(|| Error::NotFound(name.to_owned()))?;

        let section_filter = match filter.and_then(|p| p.section.as_deref()) {
            None => None,
            Some(spec) => {
                let extended = filter.is_some_and(|p| p.extended);
                Some(section_index(pkg, spec, extended)?)
            }
        };
        let option_filter = filter.and_then(|p| p.option.as_deref());

        for (idx, sec) in pkg.sections.iter().enumerate() {
            if section_filter.is_some_and(|s| s != idx) {
                continue;
            }
            if option_filter.is_none() {
                println!("{name}.{}={}", sec.name, sec.ty);
            }
            for opt in &sec.options {
                if option_filter.is_some_and(|o| o != opt.name) {
                    continue;
                }
                println!("{name}.{}.{}={}", sec.name, opt.name, opt.value.render());
            }
        }
        Ok(())
    }

    fn cmd_export(&mut self, args: &[String]) -> Result<()> {
        let names = match args.first() {
            Some(name) => vec![name.clone()],
            None => self.ctx.list_configs()?,
        };
        for name in names {
            let text = self.ctx.export(&name, true)?;
            print!("{text}");
        }
        Ok(())
    }

    fn cmd_get(&mut self, args: &[String]) -> Result<()> {
        let spec = args
            .first()
            .ok_or_else(|| Error::Inval("missing argument".to_owned()))?;
        let ptr = Pointer::parse(spec)?;
        let value = self.ctx.get(&ptr)?;
        println!("{value}");
        Ok(())
    }

    fn cmd_changes(&mut self, args: &[String]) -> Result<()> {
        let names = match args.first() {
            Some(name) => vec![name.clone()],
            None => self.ctx.list_configs()?,
        };
        for name in names {
            for line in self.ctx.changes(&name)? {
                println!("{line}");
            }
        }
        Ok(())
    }

    // ─── Mutation commands ───────────────────────────────────────────────

    fn cmd_set(&mut self, args: &[String]) -> Result<()> {
        let spec = args
            .first()
            .ok_or_else(|| Error::Inval("missing argument".to_owned()))?;
        let ptr = Pointer::parse(spec)?;
        self.ctx.set(&ptr)?;
        self.ctx.save(&ptr.package)
    }

    fn cmd_del(&mut self, args: &[String]) -> Result<()> {
        let spec = args
            .first()
            .ok_or_else(|| Error::Inval("missing argument".to_owned()))?;
        let ptr = Pointer::parse(spec)?;
        self.ctx.delete(&ptr)?;
        self.ctx.save(&ptr.package)
    }

    fn cmd_rename(&mut self, args: &[String]) -> Result<()> {
        let spec = args
            .first()
            .ok_or_else(|| Error::Inval("missing argument".to_owned()))?;
        let ptr = Pointer::parse(spec)?;
        self.ctx.rename(&ptr)?;
        self.ctx.save(&ptr.package)
    }

    fn cmd_add(&mut self, args: &[String]) -> Result<()> {
        let (Some(package), Some(ty)) = (args.first(), args.get(1)) else {
            return Err(Error::Inval("usage: add <config> <section-type>".to_owned()));
        };
        let name = self.ctx.add_section(package, ty)?;
        println!("{name}");
        self.ctx.save(package)
    }

    fn cmd_revert(&mut self, args: &[String]) -> Result<()> {
        let spec = args
            .first()
            .ok_or_else(|| Error::Inval("missing argument".to_owned()))?;
        let ptr = Pointer::parse(spec)?;
        self.ctx.revert(&ptr)
    }

    // ─── Import / commit ─────────────────────────────────────────────────

    fn cmd_import(&mut self, args: &[String]) -> Result<()> {
        let name = args.first().map(String::as_str);
        if self.merge && name.is_none() {
            return Err(Error::Inval("merging requires a package name".to_owned()));
        }
        let text = self.read_input()?;

        let imported: Vec<String> = if self.merge {
            let name = name.unwrap_or_default().to_owned();
            self.ensure_loaded(&name)?;
            self.ctx.import_merge(&text, &name)?;
            vec![name]
        } else {
            self.ctx.import(&text, name)?
        };

        if self.no_commit {
            return Ok(());
        }
        for pkg in imported {
            self.ctx.commit(&pkg, true)?;
        }
        Ok(())
    }

    fn cmd_commit(&mut self, args: &[String]) -> Result<()> {
        if self.no_commit {
            return Ok(());
        }
        let names = match args.first() {
            Some(name) => vec![name.clone()],
            None => self.ctx.list_configs()?,
        };
        for name in names {
            self.ensure_loaded(&name)?;
            self.ctx.commit(&name, false)?;
        }
        Ok(())
    }

    // ─── Batch REPL ──────────────────────────────────────────────────────

    /// Run pointer commands line by line from the input stream, using the
    /// config tokenizer (quoting, comments and `;` separators apply).
    /// Errors are reported per line; processing continues.
    fn cmd_batch(&mut self) -> Result<()> {
        let text = self.read_input()?;
        let mut tok = unicfg_core::Tokenizer::new(&text);
        let mut failed = false;
        loop {
            let line = match tok.next_line() {
                Ok(None) => break,
                Ok(Some(line)) => line,
                Err(e) => {
                    self.report("batch", &e);
                    failed = true;
                    tok.recover();
                    continue;
                }
            };
            let keyword = &line.args[0].text;
            let command = match keyword.parse::<CliCommand>() {
                Ok(CliCommand::Batch | CliCommand::Help) | Err(()) => {
                    self.report(
                        "batch",
                        &Error::Inval(format!("unknown batch command: {keyword}")),
                    );
                    failed = true;
                    continue;
                }
                Ok(cmd) => cmd,
            };
            let args: Vec<String> = line.args[1..].iter().map(|a| a.text.clone()).collect();
            if let Err(e) = self.dispatch(command, &args) {
                self.report(command_name(command), &e);
                failed = true;
            }
        }
        if failed {
            Err(Error::Unknown)
        } else {
            Ok(())
        }
    }
}

const fn command_name(command: CliCommand) -> &'static str {
    match command {
        CliCommand::Show => "show",
        CliCommand::Export => "export",
        CliCommand::Import => "import",
        CliCommand::Changes => "changes",
        CliCommand::Commit => "commit",
        CliCommand::Revert => "revert",
        CliCommand::Get => "get",
        CliCommand::Set => "set",
        CliCommand::Del => "del",
        CliCommand::Rename => "rename",
        CliCommand::Add => "add",
        CliCommand::Help => "help",
        CliCommand::Batch => "batch",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn app(root: &TempDir, extra: &[&str]) -> App {
        let confdir = root.path().join("config");
        let savedir = root.path().join("save");
        fs::create_dir_all(&confdir).expect("mkdir");
        let mut argv = vec![
            "-c".to_owned(),
            confdir.display().to_string(),
            "-P".to_owned(),
            savedir.display().to_string(),
        ];
        argv.extend(extra.iter().map(|s| (*s).to_owned()));
        argv.push("help".to_owned());
        let input = crate::cli::parse_cli_args(argv).expect("parse").expect("input");
        App::new(&input)
    }

    fn seed(root: &TempDir, name: &str, text: &str) {
        let confdir = root.path().join("config");
        fs::create_dir_all(&confdir).expect("mkdir");
        fs::write(confdir.join(name), text).expect("seed");
    }

    #[test]
    fn set_then_get_through_app() {
        let tmp = TempDir::new().expect("tempdir");
        seed(&tmp, "net", "config interface 'lan'\n");
        let mut app = app(&tmp, &[]);
        app.dispatch(CliCommand::Set, &["net.lan.ipaddr=10.0.0.1".to_owned()])
            .expect("set");
        app.dispatch(CliCommand::Get, &["net.lan.ipaddr".to_owned()])
            .expect("get");
        // The edit went to the alternate savedir, not the canonical file.
        let canonical = fs::read_to_string(tmp.path().join("config").join("net")).expect("read");
        assert!(!canonical.contains("ipaddr"));
        let save = fs::read_to_string(tmp.path().join("save").join("net")).expect("save file");
        assert_eq!(save, "net.lan.ipaddr=10.0.0.1\n");
    }

    #[test]
    fn no_commit_mode_suppresses_commit() {
        let tmp = TempDir::new().expect("tempdir");
        seed(&tmp, "net", "config interface 'lan'\n");
        let mut app = app(&tmp, &[]);
        app.dispatch(CliCommand::Set, &["net.lan.x=1".to_owned()]).expect("set");
        app.dispatch(CliCommand::Commit, &[]).expect("commit is a no-op");
        let canonical = fs::read_to_string(tmp.path().join("config").join("net")).expect("read");
        assert!(!canonical.contains("'x'"));
    }

    #[test]
    fn add_requires_two_args() {
        let tmp = TempDir::new().expect("tempdir");
        let mut app = app(&tmp, &[]);
        assert!(app.dispatch(CliCommand::Add, &["net".to_owned()]).is_err());
    }

    #[test]
    fn merge_import_requires_name() {
        let tmp = TempDir::new().expect("tempdir");
        seed(&tmp, "net", "config interface 'lan'\n");
        let mut app = app(&tmp, &["-m"]);
        assert!(app.cmd_import(&[]).is_err());
    }
}
