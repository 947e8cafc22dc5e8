//! Storage backends: how a package name becomes a byte stream and back.
//!
//! The default (and only shipped) backend is the file backend: bare names
//! resolve against the managed config directory and get the save-file
//! delta mechanism; absolute (`/…`) and explicit relative (`./…`) paths
//! bypass the managed directory and commit directly.
//!
//! All stream access goes through [`open_locked`], which takes a shared
//! advisory lock for reads and an exclusive one for writes. The lock rides
//! on the file handle, so dropping the handle — on success or on any error
//! path — releases it.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::context::Options;
use crate::delta;
use crate::error::{Error, ParseDiagnostic, Result};
use crate::export::package_to_string;
use crate::import::Importer;
use crate::model::Package;
use crate::validate::validate_name;

/// Name under which the file backend registers itself.
pub const FILE_BACKEND: &str = "file";

/// A pluggable storage adapter. Load produces a parsed package plus any
/// lenient-mode diagnostics; commit flushes a package back to stable
/// storage; `list_configs` enumerates loadable names.
pub trait Backend {
    fn name(&self) -> &str;

    /// Discover and parse the config for `name` into a fresh package.
    ///
    /// # Errors
    ///
    /// `NotFound` when no such config exists, `Parse` on malformed content
    /// in strict mode, `Io` on stream or lock failures.
    fn load(&self, opts: &Options, name: &str) -> Result<(Package, Vec<ParseDiagnostic>)>;

    /// Write the package back to stable storage. See the file backend for
    /// the delta-merge semantics of `overwrite = false`.
    ///
    /// # Errors
    ///
    /// `Inval` when the package has no storage location and `overwrite` is
    /// off; `Io`/`Parse` from the underlying streams.
    fn commit(&self, opts: &Options, pkg: &mut Package, overwrite: bool) -> Result<()>;

    /// Enumerate config names, sorted.
    ///
    /// # Errors
    ///
    /// `NotFound` when the storage location does not exist.
    fn list_configs(&self, opts: &Options) -> Result<Vec<String>>;
}

/// Open a file and take the matching advisory lock: shared for reads,
/// exclusive for writes. Read opens require an existing regular file.
///
/// Lock acquisition failures on filesystems without lock support are
/// ignored, matching the advisory nature of the protocol.
pub(crate) fn open_locked(path: &Path, write: bool, create: bool) -> Result<File> {
    if !write {
        let meta =
            fs::metadata(path).map_err(|_| Error::not_found(path.display().to_string()))?;
        if !meta.is_file() {
            return Err(Error::not_found(path.display().to_string()));
        }
    }
    let file = OpenOptions::new()
        .read(true)
        .write(write)
        .create(create && write)
        .open(path)
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::not_found(path.display().to_string())
            } else {
                Error::Io(e)
            }
        })?;
    let locked = if write {
        file.lock_exclusive()
    } else {
        file.lock_shared()
    };
    if let Err(e) = locked
        && e.kind() != std::io::ErrorKind::Unsupported
    {
        return Err(e.into());
    }
    Ok(file)
}

/// Read a whole locked stream as UTF-8 text.
pub(crate) fn read_text(file: &mut File) -> Result<String> {
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    String::from_utf8(bytes).map_err(|_| Error::Parse {
        line: 0,
        byte: 0,
        reason: "invalid UTF-8".into(),
    })
}

/// The default filesystem backend.
#[derive(Debug, Default)]
pub struct FileBackend;

/// How a config name maps onto the filesystem.
struct Location {
    path: PathBuf,
    /// The package name (last path component for explicit paths).
    name: String,
    /// True iff the file lives in the managed config dir.
    managed: bool,
}

impl FileBackend {
    fn locate(opts: &Options, name: &str) -> Result<Location> {
        let explicit = name.starts_with('/') || name.starts_with("./");
        if explicit {
            let short = name
                .rsplit('/')
                .next()
                .filter(|s| !s.is_empty())
                .ok_or_else(|| Error::not_found(name.to_owned()))?;
            if !validate_name(short) {
                return Err(Error::inval(format!("invalid package name: {short}")));
            }
            return Ok(Location {
                path: PathBuf::from(name),
                name: short.to_owned(),
                managed: false,
            });
        }
        if name.starts_with('.') {
            return Err(Error::not_found(name.to_owned()));
        }
        if !validate_name(name) {
            return Err(Error::inval(format!("invalid package name: {name}")));
        }
        Ok(Location {
            path: opts.confdir.join(name),
            name: name.to_owned(),
            managed: true,
        })
    }
}

impl Backend for FileBackend {
    fn name(&self) -> &str {
        FILE_BACKEND
    }

    fn load(&self, opts: &Options, name: &str) -> Result<(Package, Vec<ParseDiagnostic>)> {
        let loc = Self::locate(opts, name)?;
        let mut file = open_locked(&loc.path, false, false)?;
        let text = read_text(&mut file)?;
        drop(file);

        let mut importer = Importer::new(opts.strict, opts.perror).single(&loc.name);
        importer.run(&text)?;
        let outcome = importer.finish();
        let mut packages = outcome.packages;
        let mut pkg = packages.pop().ok_or(Error::Unknown)?;
        pkg.path = Some(loc.path);
        pkg.has_delta_log = loc.managed;
        pkg.backend = FILE_BACKEND.to_owned();
        debug!(package = %pkg.name, sections = pkg.sections.len(), managed = loc.managed, "loaded config");
        Ok((pkg, outcome.diagnostics))
    }

    fn commit(&self, opts: &Options, pkg: &mut Package, overwrite: bool) -> Result<()> {
        let path = match &pkg.path {
            Some(p) => p.clone(),
            None if overwrite => opts.confdir.join(&pkg.name),
            None => {
                return Err(Error::inval(format!(
                    "package {} has no storage path",
                    pkg.name
                )));
            }
        };

        // Lock the canonical file first; everything below happens under it.
        let mut file = open_locked(&path, true, true)?;

        if pkg.has_delta_log {
            if overwrite {
                delta::truncate_save(opts, &pkg.name)?;
                pkg.pending_deltas.clear();
                pkg.saved_deltas.clear();
            } else {
                // Flush our own pending edits, then re-read the canonical
                // file so concurrent writers' commits are observed, and
                // replay the merged save file on top.
                delta::save_pending(opts, pkg)?;

                file.seek(SeekFrom::Start(0))?;
                let text = read_text(&mut file)?;
                let mut importer = Importer::new(opts.strict, opts.perror).single(&pkg.name);
                importer.run(&text)?;
                let mut fresh = importer
                    .finish()
                    .packages
                    .pop()
                    .ok_or(Error::Unknown)?;
                delta::flush_into(opts, &mut fresh)?;

                fresh.path = Some(path.clone());
                fresh.has_delta_log = true;
                fresh.backend = pkg.backend.clone();
                *pkg = fresh;
            }
        }

        // The re-read succeeded; only now is the canonical file touched.
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(package_to_string(pkg, false, opts.export_name).as_bytes())?;

        pkg.path = Some(path);
        pkg.pending_deltas.clear();
        pkg.saved_deltas.clear();
        debug!(package = %pkg.name, overwrite, "committed config");
        Ok(())
    }

    fn list_configs(&self, opts: &Options) -> Result<Vec<String>> {
        let entries = fs::read_dir(&opts.confdir)
            .map_err(|_| Error::not_found(opts.confdir.display().to_string()))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str()
                && validate_name(name)
            {
                names.push(name.to_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}
