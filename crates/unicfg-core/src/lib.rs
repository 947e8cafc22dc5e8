//! Core library for unicfg, a small human-editable configuration store in
//! the UCI tradition.
//!
//! Config files parse into packages of typed sections holding scalar or
//! list options. Point mutations are recorded in an append-only delta log
//! that survives process exit in per-package save files; `commit` merges
//! the log back into the canonical file under an exclusive advisory lock.
//!
//! The [`Context`] is the entry point: it owns the loaded packages, the
//! registered backends, and the directory/flag configuration. Textual
//! references into the tree use [`Pointer`] syntax
//! (`package[.section[.option]][=value]`, with `@type[idx]` selecting
//! sections positionally).
//!
//! ```no_run
//! use unicfg_core::{Context, Pointer};
//!
//! # fn main() -> unicfg_core::Result<()> {
//! let mut ctx = Context::new();
//! ctx.load("network")?;
//! let ptr = Pointer::parse("network.lan.ipaddr=10.0.0.1")?;
//! ctx.set(&ptr)?;
//! ctx.save("network")?;
//! ctx.commit("network", false)?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod context;
pub mod delta;
pub mod error;
pub mod export;
pub mod import;
pub mod model;
pub mod pointer;
pub mod tokenizer;
pub mod validate;

pub use backend::{Backend, FILE_BACKEND, FileBackend};
pub use context::{Context, Options};
pub use delta::format_line as format_delta_line;
pub use error::{Error, ParseDiagnostic, Result};
pub use export::{package_to_string, quote};
pub use import::{ImportOutcome, Importer};
pub use model::{ConfigOption, Delta, DeltaCommand, OptionValue, Package, Section};
pub use pointer::{ExtendedSelector, Pointer};
pub use tokenizer::{Arg, LINEBUF_MAX, LogicalLine, Tokenizer};
pub use validate::{djb_hash, validate_name, validate_text, validate_type};
