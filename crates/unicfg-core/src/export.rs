//! Canonical text emission.
//!
//! Everything is emitted single-quoted; a quote inside a value closes the
//! string, emits an escaped quote, and reopens (`'` becomes `'\''`), which
//! the tokenizer folds back together on re-import. Anonymous section names
//! are only emitted when the caller asks for them, so a plain export of an
//! unedited file round-trips without leaking generated names.

use crate::model::{OptionValue, Package};

/// Wrap a string in single quotes, escaping embedded quotes.
#[must_use]
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Render one package in canonical form.
///
/// `header` controls the leading `package '<name>'` line; `export_name`
/// forces generated names onto anonymous `config` lines.
#[must_use]
pub fn package_to_string(pkg: &Package, header: bool, export_name: bool) -> String {
    let mut out = String::new();
    if header {
        out.push_str("package ");
        out.push_str(&quote(&pkg.name));
        out.push('\n');
    }
    for section in &pkg.sections {
        out.push_str("\nconfig ");
        out.push_str(&quote(&section.ty));
        if !section.anonymous || export_name {
            out.push(' ');
            out.push_str(&quote(&section.name));
        }
        out.push('\n');
        for opt in &section.options {
            match &opt.value {
                OptionValue::Scalar(v) => {
                    out.push_str("\toption ");
                    out.push_str(&quote(&opt.name));
                    out.push(' ');
                    out.push_str(&quote(v));
                    out.push('\n');
                }
                OptionValue::List(items) => {
                    for item in items {
                        out.push_str("\tlist ");
                        out.push_str(&quote(&opt.name));
                        out.push(' ');
                        out.push_str(&quote(item));
                        out.push('\n');
                    }
                }
            }
        }
    }
    out.push('\n');
    out
}
