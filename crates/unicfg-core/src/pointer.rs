//! Textual references into the configuration tree.
//!
//! A pointer has the form `package[.section[.option]][=value]`. The section
//! component may use the extended form `@type[idx]`, selecting the idx-th
//! section of the given type: indices are 0-based, negative indices count
//! from the end, and an empty type matches sections of any type.

use crate::error::{Error, Result};
use crate::model::Package;
use crate::validate::{validate_name, validate_text};

/// A parsed pointer. Which fields are populated tells how deep the
/// reference goes; `extended` marks a section component that must be
/// resolved positionally rather than by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pointer {
    pub package: String,
    pub section: Option<String>,
    pub option: Option<String>,
    /// Text after `=`, if any.
    pub value: Option<String>,
    /// True when the section component is not a plain name and must be
    /// parsed as `@type[idx]`.
    pub extended: bool,
}

impl Pointer {
    /// Parse a pointer string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Inval`] when the package or option name contains
    /// illegal characters, the value fails text validation, or more than
    /// three dot-separated components are present.
    pub fn parse(input: &str) -> Result<Self> {
        let (path, value) = match input.split_once('=') {
            Some((p, v)) => (p, Some(v.to_owned())),
            None => (input, None),
        };

        let mut parts = path.splitn(4, '.');
        let package = parts
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| Error::inval(format!("empty pointer: {input}")))?
            .to_owned();
        let section = parts.next().map(str::to_owned);
        let option = parts.next().map(str::to_owned);
        if parts.next().is_some() {
            return Err(Error::inval(format!("too many components in pointer: {input}")));
        }

        if !validate_name(&package) {
            return Err(Error::inval(format!("invalid package name: {package}")));
        }
        let extended = section.as_deref().is_some_and(|s| !validate_name(s));
        if let Some(opt) = option.as_deref()
            && !validate_name(opt)
        {
            return Err(Error::inval(format!("invalid option name: {opt}")));
        }
        if let Some(v) = value.as_deref()
            && !validate_text(v)
        {
            return Err(Error::inval("invalid characters in value".to_owned()));
        }

        Ok(Self {
            package,
            section,
            option,
            value,
            extended,
        })
    }

    /// The value, or `Inval` if the pointer has none. For commands that
    /// require an `=value` suffix.
    pub fn require_value(&self) -> Result<&str> {
        self.value
            .as_deref()
            .ok_or_else(|| Error::inval("pointer has no value".to_owned()))
    }

    /// The section component, or `Inval` if the pointer stops at the
    /// package.
    pub fn require_section(&self) -> Result<&str> {
        self.section
            .as_deref()
            .ok_or_else(|| Error::inval("pointer has no section".to_owned()))
    }
}

/// A parsed `@type[idx]` selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedSelector {
    /// Section type filter; empty matches any type.
    pub ty: String,
    /// 0-based index; negative counts from the end of the filtered set.
    pub index: i64,
}

impl ExtendedSelector {
    /// Parse the `@type[idx]` form. The leading `@`, the brackets and an
    /// integer index are all required; trailing garbage is rejected.
    pub fn parse(input: &str) -> Result<Self> {
        let err = || Error::inval(format!("invalid section selector: {input}"));
        let rest = input.strip_prefix('@').ok_or_else(err)?;
        let (ty, rest) = rest.split_once('[').ok_or_else(err)?;
        let idx = rest.strip_suffix(']').ok_or_else(err)?;
        if idx.is_empty() || !ty.is_empty() && !validate_name(ty) {
            return Err(err());
        }
        let index: i64 = idx.parse().map_err(|_| err())?;
        Ok(Self {
            ty: ty.to_owned(),
            index,
        })
    }
}

/// Resolve a pointer's section component to an index into `pkg.sections`.
///
/// Named components resolve by lookup; extended components filter by type
/// and index into the filtered set.
///
/// # Errors
///
/// `NotFound` when no section matches; `Inval` for a malformed extended
/// selector.
pub fn section_index(pkg: &Package, section: &str, extended: bool) -> Result<usize> {
    if !extended {
        return pkg
            .section_index(section)
            .ok_or_else(|| Error::not_found(format!("{}.{section}", pkg.name)));
    }

    let sel = ExtendedSelector::parse(section)?;
    let matches: Vec<usize> = pkg
        .sections
        .iter()
        .enumerate()
        .filter(|(_, s)| sel.ty.is_empty() || s.ty == sel.ty)
        .map(|(i, _)| i)
        .collect();

    let count = matches.len() as i64;
    let effective = if sel.index < 0 {
        count + sel.index
    } else {
        sel.index
    };
    if effective < 0 || effective >= count {
        return Err(Error::not_found(format!("{}.{section}", pkg.name)));
    }
    Ok(matches[usize::try_from(effective).unwrap_or_default()])
}
