//! Implementation crate for the `unicfg` binary: argument parsing,
//! subcommand execution, and tracing subscriber wiring. Split out of
//! `main.rs` so the pieces are unit-testable.

pub mod cli;
pub mod commands;
pub mod tracing_setup;

pub use cli::{CliCommand, CliInput, exit_code, parse_cli_args, usage};
pub use commands::App;
pub use tracing_setup::{Verbosity, init_subscriber};
