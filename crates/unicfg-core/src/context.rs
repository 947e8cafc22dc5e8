//! The context: per-instance state and the public mutation API.
//!
//! A context owns its root set of packages, its registered backends, and
//! the directory/flag configuration. Contexts are independent of each
//! other; nothing here is process-global. A single context is not thread
//! safe — every call is synchronous and completes or fails before
//! returning.
//!
//! Public mutations log one delta each; the internal layer they sit on
//! takes `log = false` when a mutation is re-entered from replay or merge,
//! so implementation-level edits never show up in the change log.

use std::path::PathBuf;

use tracing::debug;

use crate::backend::{Backend, FileBackend};
use crate::delta;
use crate::error::{Error, ParseDiagnostic, Result};
use crate::export::package_to_string;
use crate::import::Importer;
use crate::model::{Delta, Package};
use crate::pointer::{self, Pointer};

/// Directory and flag configuration carried by a context and consulted by
/// the backends and the delta engine.
#[derive(Debug, Clone)]
pub struct Options {
    /// Managed config directory; bare names resolve here.
    pub confdir: PathBuf,
    /// Save-file directory for the delta log.
    pub savedir: PathBuf,
    /// Additional read-only delta directories, consulted before `savedir`.
    pub delta_paths: Vec<PathBuf>,
    /// Abort imports on the first parse error instead of recovering.
    pub strict: bool,
    /// Report lenient-recovery errors as they happen.
    pub perror: bool,
    /// Emit generated names for anonymous sections on export.
    pub export_name: bool,
    /// Record replayed save-file entries on the package at load time.
    pub saved_history: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            confdir: PathBuf::from("/etc/config"),
            savedir: PathBuf::from("/tmp/.uci"),
            delta_paths: Vec::new(),
            strict: true,
            perror: false,
            export_name: false,
            saved_history: true,
        }
    }
}

/// The unit of isolation: root package set, backends, options, and the
/// diagnostic record of the most recent imports.
pub struct Context {
    options: Options,
    packages: Vec<Package>,
    backends: Vec<Box<dyn Backend>>,
    current_backend: usize,
    diagnostics: Vec<ParseDiagnostic>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A context with the file backend registered and default directories.
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: Options::default(),
            packages: Vec::new(),
            backends: vec![Box::new(FileBackend)],
            current_backend: 0,
            diagnostics: Vec::new(),
        }
    }

    // ─── Configuration ───────────────────────────────────────────────────

    #[must_use]
    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn set_confdir(&mut self, dir: impl Into<PathBuf>) {
        self.options.confdir = dir.into();
    }

    pub fn set_savedir(&mut self, dir: impl Into<PathBuf>) {
        self.options.savedir = dir.into();
    }

    /// Add a read-only delta search path, consulted before the savedir.
    pub fn add_delta_path(&mut self, dir: impl Into<PathBuf>) {
        self.options.delta_paths.push(dir.into());
    }

    pub fn set_strict(&mut self, strict: bool) {
        self.options.strict = strict;
    }

    pub fn set_perror(&mut self, perror: bool) {
        self.options.perror = perror;
    }

    pub fn set_export_name(&mut self, export_name: bool) {
        self.options.export_name = export_name;
    }

    pub fn set_saved_history(&mut self, saved_history: bool) {
        self.options.saved_history = saved_history;
    }

    /// Register an additional backend.
    pub fn add_backend(&mut self, backend: Box<dyn Backend>) {
        self.backends.push(backend);
    }

    /// Select the default backend by name.
    ///
    /// # Errors
    ///
    /// `NotFound` when no backend of that name is registered.
    pub fn set_backend(&mut self, name: &str) -> Result<()> {
        let idx = self
            .backends
            .iter()
            .position(|b| b.name() == name)
            .ok_or_else(|| Error::not_found(format!("backend {name}")))?;
        self.current_backend = idx;
        Ok(())
    }

    // ─── Introspection ───────────────────────────────────────────────────

    #[must_use]
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    #[must_use]
    pub fn package(&self, name: &str) -> Option<&Package> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Diagnostics accumulated by lenient imports since construction.
    #[must_use]
    pub fn diagnostics(&self) -> &[ParseDiagnostic] {
        &self.diagnostics
    }

    #[must_use]
    pub fn last_diagnostic(&self) -> Option<&ParseDiagnostic> {
        self.diagnostics.last()
    }

    // ─── Load / unload / import / export ─────────────────────────────────

    /// Load a config through the default backend and replay its delta log.
    ///
    /// # Errors
    ///
    /// `Duplicate` when a package of the same name is already loaded;
    /// otherwise whatever the backend reports.
    pub fn load(&mut self, name: &str) -> Result<&Package> {
        let idx = self.load_internal(name)?;
        Ok(&self.packages[idx])
    }

    fn load_internal(&mut self, name: &str) -> Result<usize> {
        let backend = self
            .backends
            .get(self.current_backend)
            .ok_or(Error::Unknown)?;
        let (mut pkg, diags) = backend.load(&self.options, name)?;
        self.diagnostics.extend(diags);
        if self.packages.iter().any(|p| p.name == pkg.name) {
            return Err(Error::Duplicate(pkg.name));
        }
        if pkg.has_delta_log {
            delta::load_all(&self.options, &mut pkg)?;
        }
        self.packages.push(pkg);
        Ok(self.packages.len() - 1)
    }

    /// Drop a loaded package from the root set. In-memory only; pending
    /// deltas that were never saved are lost.
    ///
    /// # Errors
    ///
    /// `NotFound` when no such package is loaded.
    pub fn unload(&mut self, name: &str) -> Result<()> {
        let before = self.packages.len();
        self.packages.retain(|p| p.name != name);
        if self.packages.len() == before {
            return Err(Error::not_found(name.to_owned()));
        }
        Ok(())
    }

    /// Import packages from config text. With `name`, the stream is a
    /// single package of that name and `package` directives are ignored;
    /// without, `package` directives delimit multiple packages.
    ///
    /// Returns the names of the packages attached to the root set.
    ///
    /// # Errors
    ///
    /// `Parse` in strict mode, `Duplicate` on a package name collision.
    pub fn import(&mut self, input: &str, name: Option<&str>) -> Result<Vec<String>> {
        let existing: Vec<String> = self.packages.iter().map(|p| p.name.clone()).collect();
        let mut importer = Importer::new(self.options.strict, self.options.perror);
        if let Some(n) = name {
            importer = importer.single(n);
        }
        let mut importer = importer.existing(existing);
        importer.run(input)?;
        let outcome = importer.finish();
        self.diagnostics.extend(outcome.diagnostics);
        let names = outcome.packages.iter().map(|p| p.name.clone()).collect();
        self.packages.extend(outcome.packages);
        Ok(names)
    }

    /// Merge config text into an already-loaded package. The merge goes
    /// through the logged mutation layer, so it shows up in `changes`. On
    /// error the package is left exactly as it was.
    ///
    /// # Errors
    ///
    /// `NotFound` when the package is not loaded; `Parse` in strict mode.
    pub fn import_merge(&mut self, input: &str, name: &str) -> Result<()> {
        let idx = self
            .packages
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| Error::not_found(name.to_owned()))?;
        // Work on a copy so a strict abort rolls back cleanly.
        let mut importer = Importer::new(self.options.strict, self.options.perror)
            .merge_into(self.packages[idx].clone());
        importer.run(input)?;
        let mut outcome = importer.finish();
        self.diagnostics.extend(outcome.diagnostics);
        let merged = outcome.packages.pop().ok_or(Error::Unknown)?;
        self.packages[idx] = merged;
        Ok(())
    }

    /// Serialize a package (loading it if needed). `header` controls the
    /// `package '<name>'` line.
    ///
    /// # Errors
    ///
    /// Backend errors from auto-loading.
    pub fn export(&mut self, name: &str, header: bool) -> Result<String> {
        let idx = self.ensure_loaded(name)?;
        Ok(package_to_string(
            &self.packages[idx],
            header,
            self.options.export_name,
        ))
    }

    /// Enumerate configs visible to the default backend.
    ///
    /// # Errors
    ///
    /// `NotFound` when the storage location does not exist.
    pub fn list_configs(&self) -> Result<Vec<String>> {
        let backend = self
            .backends
            .get(self.current_backend)
            .ok_or(Error::Unknown)?;
        backend.list_configs(&self.options)
    }

    // ─── Pointer operations ──────────────────────────────────────────────

    /// Read through a pointer: an option pointer yields its value (lists
    /// space-joined), a section pointer yields the section type.
    ///
    /// # Errors
    ///
    /// `Inval` for a package-only pointer, `NotFound` when the target does
    /// not exist.
    pub fn get(&mut self, ptr: &Pointer) -> Result<String> {
        let idx = self.ensure_loaded(&ptr.package)?;
        let pkg = &self.packages[idx];
        let section = ptr.require_section()?;
        let sidx = pointer::section_index(pkg, section, ptr.extended)?;
        match ptr.option.as_deref() {
            None => Ok(pkg.sections[sidx].ty.clone()),
            Some(opt) => pkg.sections[sidx]
                .option(opt)
                .map(|o| o.value.render())
                .ok_or_else(|| {
                    Error::not_found(format!("{}.{}.{opt}", pkg.name, pkg.sections[sidx].name))
                }),
        }
    }

    /// Apply a `set` pointer: `pkg.section=type` creates or retypes a
    /// section, `pkg.section.option=value` creates or updates an option.
    ///
    /// # Errors
    ///
    /// `Inval` when the pointer carries no section or value; `NotFound`
    /// when an option is set on a missing section.
    pub fn set(&mut self, ptr: &Pointer) -> Result<()> {
        let value = ptr.require_value()?.to_owned();
        let idx = self.ensure_loaded(&ptr.package)?;
        let section = self.target_section(idx, ptr)?;
        self.packages[idx].set(&section, ptr.option.as_deref(), &value, true)
    }

    /// Append a list item through a `pkg.section.option=value` pointer.
    ///
    /// # Errors
    ///
    /// `Inval` without section, option and value; `NotFound` for a missing
    /// section.
    pub fn add_list(&mut self, ptr: &Pointer) -> Result<()> {
        let value = ptr.require_value()?.to_owned();
        let option = ptr
            .option
            .clone()
            .ok_or_else(|| Error::inval("pointer has no option".to_owned()))?;
        let idx = self.ensure_loaded(&ptr.package)?;
        let section = self.target_section(idx, ptr)?;
        self.packages[idx].add_list(&section, &option, &value, true)
    }

    /// Delete the option or section a pointer names.
    ///
    /// # Errors
    ///
    /// `Inval` for a package-only pointer, `NotFound` when the target does
    /// not exist.
    pub fn delete(&mut self, ptr: &Pointer) -> Result<()> {
        ptr.require_section()?;
        let idx = self.ensure_loaded(&ptr.package)?;
        let section = self.target_section(idx, ptr)?;
        self.packages[idx].delete(&section, ptr.option.as_deref(), true)
    }

    /// Rename the option or section a pointer names to `ptr.value`.
    ///
    /// # Errors
    ///
    /// `Inval` without a section or value, or when the new name is not
    /// name-safe; `NotFound` when the target does not exist.
    pub fn rename(&mut self, ptr: &Pointer) -> Result<()> {
        let new_name = ptr.require_value()?.to_owned();
        ptr.require_section()?;
        let idx = self.ensure_loaded(&ptr.package)?;
        let section = self.target_section(idx, ptr)?;
        self.packages[idx].rename(&section, ptr.option.as_deref(), &new_name, true)
    }

    /// Create an anonymous section of `ty` in `package`, returning the
    /// generated name.
    ///
    /// # Errors
    ///
    /// `Inval` for a bad type; backend errors from auto-loading.
    pub fn add_section(&mut self, package: &str, ty: &str) -> Result<String> {
        let idx = self.ensure_loaded(package)?;
        self.packages[idx].add_anonymous(ty, true)
    }

    // ─── Save / commit / revert ──────────────────────────────────────────

    /// Flush pending deltas to the package's save file. For packages
    /// outside the managed config dir there is no save file; the real file
    /// is updated directly instead.
    ///
    /// # Errors
    ///
    /// `NotFound` when the package is not loaded; I/O errors from the save
    /// file.
    pub fn save(&mut self, name: &str) -> Result<()> {
        let idx = self
            .packages
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| Error::not_found(name.to_owned()))?;
        if !self.packages[idx].has_delta_log {
            return self.commit(name, false);
        }
        let Self {
            packages, options, ..
        } = self;
        delta::save_pending(options, &mut packages[idx])
    }

    /// Commit the package to its canonical file. Without `overwrite`, the
    /// canonical file is re-read under the exclusive lock and the merged
    /// save file is replayed first, so concurrent writers are observed;
    /// with it, the in-memory tree wins and any recorded deltas are
    /// discarded.
    ///
    /// # Errors
    ///
    /// `NotFound` when the package is not loaded; backend errors
    /// otherwise. On failure the canonical file is left untouched.
    pub fn commit(&mut self, name: &str, overwrite: bool) -> Result<()> {
        let Self {
            packages, backends, options, current_backend, ..
        } = self;
        let pkg = packages
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| Error::not_found(name.to_owned()))?;
        let backend = backends
            .iter()
            .find(|b| b.name() == pkg.backend)
            .or_else(|| backends.get(*current_backend))
            .ok_or(Error::Unknown)?;
        backend.commit(options, pkg, overwrite)
    }

    /// Discard recorded changes matching the pointer (`pkg`, `pkg.section`
    /// or `pkg.section.option`) and restore the affected state from disk.
    /// Pending edits outside the pointer survive, still pending.
    ///
    /// # Errors
    ///
    /// `Inval` on a package without a delta log; backend errors from the
    /// reload.
    pub fn revert(&mut self, ptr: &Pointer) -> Result<()> {
        let idx = self.ensure_loaded(&ptr.package)?;
        if !self.packages[idx].has_delta_log {
            return Err(Error::inval(format!(
                "package {} has no delta log",
                ptr.package
            )));
        }
        let target = match ptr.section.as_deref() {
            None => None,
            Some(_) => Some((self.target_section(idx, ptr)?, ptr.option.clone())),
        };

        {
            let Self {
                packages, options, ..
            } = &mut *self;
            let pkg = &mut packages[idx];
            let survives = |d: &Delta| match &target {
                None => false,
                Some((section, option)) => !delta::matches(d, section, option.as_deref()),
            };
            pkg.pending_deltas.retain(survives);
            pkg.saved_deltas.retain(survives);
            delta::rewrite_saved(options, pkg)?;
        }

        // Re-read the canonical file and replay what survived; pending
        // edits are re-applied unlogged but stay pending.
        let pending = std::mem::take(&mut self.packages[idx].pending_deltas);
        let name = self.packages[idx].name.clone();
        let backend = self
            .backends
            .get(self.current_backend)
            .ok_or(Error::Unknown)?;
        let (mut fresh, diags) = backend.load(&self.options, &name)?;
        delta::load_all(&self.options, &mut fresh)?;
        for d in &pending {
            if let Err(e) = delta::apply(&mut fresh, d) {
                debug!(package = %name, error = %e, "pending delta no longer applies after revert");
            }
        }
        fresh.pending_deltas = pending;
        self.diagnostics.extend(diags);
        self.packages[idx] = fresh;
        Ok(())
    }

    /// Recorded changes for one package, rendered in save-file form, saved
    /// entries first.
    ///
    /// # Errors
    ///
    /// Backend errors from auto-loading.
    pub fn changes(&mut self, name: &str) -> Result<Vec<String>> {
        let idx = self.ensure_loaded(name)?;
        let pkg = &self.packages[idx];
        Ok(pkg
            .saved_deltas
            .iter()
            .chain(&pkg.pending_deltas)
            .map(|d| delta::format_line(&pkg.name, d))
            .collect())
    }

    // ─── Internals ───────────────────────────────────────────────────────

    /// Index of a loaded package, auto-loading through the backend when it
    /// is not in the root set yet.
    fn ensure_loaded(&mut self, name: &str) -> Result<usize> {
        if let Some(idx) = self.packages.iter().position(|p| p.name == name) {
            return Ok(idx);
        }
        self.load_internal(name)
    }

    /// Resolve a pointer's section component to a concrete section name.
    fn target_section(&self, idx: usize, ptr: &Pointer) -> Result<String> {
        let section = ptr.require_section()?;
        if !ptr.extended {
            return Ok(section.to_owned());
        }
        let pkg = &self.packages[idx];
        let sidx = pointer::section_index(pkg, section, true)?;
        Ok(pkg.sections[sidx].name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn scratch() -> (TempDir, Context) {
        let tmp = TempDir::new().expect("tempdir");
        let mut ctx = Context::new();
        ctx.set_confdir(tmp.path().join("config"));
        ctx.set_savedir(tmp.path().join("save"));
        fs::create_dir_all(tmp.path().join("config")).expect("mkdir");
        (tmp, ctx)
    }

    fn seed(ctx: &Context, name: &str, text: &str) {
        fs::write(ctx.options().confdir.join(name), text).expect("seed config");
    }

    fn ptr(s: &str) -> Pointer {
        Pointer::parse(s).expect("pointer")
    }

    #[test]
    fn load_get_roundtrip() {
        let (_tmp, mut ctx) = scratch();
        seed(&ctx, "net", "config interface 'lan'\n\toption ipaddr '192.168.1.1'\n");
        ctx.load("net").expect("load");
        assert_eq!(ctx.get(&ptr("net.lan.ipaddr")).expect("get"), "192.168.1.1");
        assert_eq!(ctx.get(&ptr("net.lan")).expect("get section"), "interface");
    }

    #[test]
    fn get_autoloads() {
        let (_tmp, mut ctx) = scratch();
        seed(&ctx, "net", "config interface 'lan'\n\toption proto 'dhcp'\n");
        assert_eq!(ctx.get(&ptr("net.lan.proto")).expect("get"), "dhcp");
        assert!(ctx.package("net").is_some());
    }

    #[test]
    fn double_load_is_duplicate() {
        let (_tmp, mut ctx) = scratch();
        seed(&ctx, "net", "config interface 'lan'\n");
        ctx.load("net").expect("load");
        assert!(matches!(ctx.load("net"), Err(Error::Duplicate(_))));
    }

    #[test]
    fn unload_then_reload() {
        let (_tmp, mut ctx) = scratch();
        seed(&ctx, "net", "config interface 'lan'\n");
        ctx.load("net").expect("load");
        ctx.unload("net").expect("unload");
        assert!(ctx.package("net").is_none());
        ctx.load("net").expect("reload");
    }

    #[test]
    fn set_save_reload_preserves_edit() {
        let (_tmp, mut ctx) = scratch();
        seed(&ctx, "net", "config interface 'lan'\n\toption ipaddr '192.168.1.1'\n");
        ctx.set(&ptr("net.lan.ipaddr=10.0.0.1")).expect("set");
        ctx.save("net").expect("save");

        let save = fs::read_to_string(ctx.options().savedir.join("net")).expect("save file");
        assert_eq!(save, "net.lan.ipaddr=10.0.0.1\n");

        ctx.unload("net").expect("unload");
        assert_eq!(ctx.get(&ptr("net.lan.ipaddr")).expect("get"), "10.0.0.1");
    }

    #[test]
    fn set_on_missing_package_is_not_found() {
        let (_tmp, mut ctx) = scratch();
        assert!(matches!(
            ctx.set(&ptr("ghost.s.o=1")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn extended_pointer_mutation() {
        let (_tmp, mut ctx) = scratch();
        seed(
            &ctx,
            "net",
            "config interface 'lan'\nconfig interface 'wan'\n",
        );
        ctx.set(&ptr("net.@interface[-1].proto=dhcp")).expect("set");
        assert_eq!(ctx.get(&ptr("net.wan.proto")).expect("get"), "dhcp");
    }

    #[test]
    fn delete_and_rename() {
        let (_tmp, mut ctx) = scratch();
        seed(
            &ctx,
            "net",
            "config interface 'lan'\n\toption proto 'static'\n\toption mtu '1500'\n",
        );
        ctx.delete(&ptr("net.lan.mtu")).expect("delete option");
        assert!(ctx.get(&ptr("net.lan.mtu")).is_err());

        ctx.rename(&ptr("net.lan=local")).expect("rename section");
        assert_eq!(ctx.get(&ptr("net.local")).expect("get"), "interface");
        assert!(ctx.get(&ptr("net.lan")).is_err());
    }

    #[test]
    fn add_section_returns_generated_name() {
        let (_tmp, mut ctx) = scratch();
        seed(&ctx, "net", "");
        let name = ctx.add_section("net", "rule").expect("add");
        assert!(name.starts_with("cfg"));
        assert_eq!(ctx.get(&Pointer::parse(&format!("net.{name}")).expect("ptr")).expect("get"), "rule");
    }

    #[test]
    fn changes_lists_saved_then_pending() {
        let (_tmp, mut ctx) = scratch();
        seed(&ctx, "net", "config interface 'lan'\n");
        ctx.set(&ptr("net.lan.a=1")).expect("set");
        ctx.save("net").expect("save");
        ctx.set(&ptr("net.lan.b=2")).expect("set");
        assert_eq!(
            ctx.changes("net").expect("changes"),
            vec!["net.lan.a=1", "net.lan.b=2"]
        );
    }

    #[test]
    fn commit_clears_changes_and_persists() {
        let (_tmp, mut ctx) = scratch();
        seed(&ctx, "net", "config interface 'lan'\n\toption ipaddr '192.168.1.1'\n");
        ctx.set(&ptr("net.lan.ipaddr=10.0.0.1")).expect("set");
        ctx.commit("net", false).expect("commit");

        assert!(ctx.changes("net").expect("changes").is_empty());
        let text = fs::read_to_string(ctx.options().confdir.join("net")).expect("read");
        assert!(text.contains("option 'ipaddr' '10.0.0.1'"));
    }

    #[test]
    fn save_outside_confdir_commits_directly() {
        let (tmp, mut ctx) = scratch();
        let outside = tmp.path().join("standalone");
        fs::write(&outside, "config t 's'\n\toption a '1'\n").expect("write");

        let path = outside.to_str().expect("utf8").to_owned();
        ctx.load(&path).expect("load");
        ctx.set(&ptr("standalone.s.a=2")).expect("set");
        ctx.save("standalone").expect("save");

        let text = fs::read_to_string(&outside).expect("read");
        assert!(text.contains("option 'a' '2'"));
        assert!(!ctx.options().savedir.join("standalone").exists());
    }

    #[test]
    fn import_multiple_packages() {
        let (_tmp, mut ctx) = scratch();
        let names = ctx
            .import("package 'a'\nconfig t 's'\npackage 'b'\nconfig t 's'\n", None)
            .expect("import");
        assert_eq!(names, ["a", "b"]);
        assert!(ctx.package("a").is_some());
        assert!(ctx.package("b").is_some());
    }

    #[test]
    fn import_merge_logs_changes() {
        let (_tmp, mut ctx) = scratch();
        seed(&ctx, "net", "config interface 'lan'\n\toption proto 'static'\n");
        ctx.load("net").expect("load");
        ctx.import_merge("config interface 'lan'\n\toption proto 'dhcp'\n", "net")
            .expect("merge");
        assert_eq!(ctx.get(&ptr("net.lan.proto")).expect("get"), "dhcp");
        assert!(!ctx.changes("net").expect("changes").is_empty());
    }

    #[test]
    fn revert_option_restores_disk_state() {
        let (_tmp, mut ctx) = scratch();
        seed(&ctx, "net", "config interface 'lan'\n\toption ipaddr '192.168.1.1'\n");
        ctx.set(&ptr("net.lan.ipaddr=10.0.0.1")).expect("set");
        ctx.save("net").expect("save");
        ctx.revert(&ptr("net.lan.ipaddr")).expect("revert");

        assert_eq!(ctx.get(&ptr("net.lan.ipaddr")).expect("get"), "192.168.1.1");
        assert!(ctx.changes("net").expect("changes").is_empty());
        let save = fs::read_to_string(ctx.options().savedir.join("net")).expect("save file");
        assert!(save.is_empty());
    }

    #[test]
    fn revert_keeps_unrelated_pending_edits() {
        let (_tmp, mut ctx) = scratch();
        seed(
            &ctx,
            "net",
            "config interface 'lan'\n\toption ipaddr '192.168.1.1'\n\toption mtu '1500'\n",
        );
        ctx.set(&ptr("net.lan.ipaddr=10.0.0.1")).expect("set");
        ctx.set(&ptr("net.lan.mtu=9000")).expect("set");
        ctx.revert(&ptr("net.lan.ipaddr")).expect("revert");

        assert_eq!(ctx.get(&ptr("net.lan.ipaddr")).expect("get"), "192.168.1.1");
        assert_eq!(ctx.get(&ptr("net.lan.mtu")).expect("get"), "9000");
        assert_eq!(ctx.changes("net").expect("changes"), vec!["net.lan.mtu=9000"]);
    }

    #[test]
    fn revert_whole_package() {
        let (_tmp, mut ctx) = scratch();
        seed(&ctx, "net", "config interface 'lan'\n");
        ctx.set(&ptr("net.lan.a=1")).expect("set");
        ctx.set(&ptr("net.wan=interface")).expect("set");
        ctx.save("net").expect("save");
        ctx.revert(&ptr("net")).expect("revert");

        assert!(ctx.changes("net").expect("changes").is_empty());
        assert!(ctx.get(&ptr("net.wan")).is_err());
    }

    #[test]
    fn list_configs_through_context() {
        let (_tmp, mut ctx) = scratch();
        seed(&ctx, "net", "");
        seed(&ctx, "dhcp", "");
        assert_eq!(ctx.list_configs().expect("list"), ["dhcp", "net"]);
        ctx.set_backend("file").expect("known backend");
        assert!(ctx.set_backend("shm").is_err());
    }

    #[test]
    fn export_includes_header_on_request() {
        let (_tmp, mut ctx) = scratch();
        seed(&ctx, "net", "config interface 'lan'\n");
        let text = ctx.export("net", true).expect("export");
        assert!(text.starts_with("package 'net'\n"));
    }
}
