//! In-memory data model: packages, sections, options, and delta records.
//!
//! Ownership is strictly tree-shaped — a package owns its sections, a
//! section its options, a list option its items. Children live in `Vec`s in
//! file order; that order is user-visible and preserved across export and
//! commit. Lookups are linear scans by name, which is fine at the sibling
//! counts this format sees in practice.

use std::path::PathBuf;

use crate::error::Error;
use crate::validate::{anonymous_name, section_hash, validate_name, validate_text, validate_type};

/// The value shape of an option: a single text string or an ordered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Scalar(String),
    List(Vec<String>),
}

impl OptionValue {
    /// Render for `get`/`show`: scalars verbatim, lists space-joined.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Scalar(v) => v.clone(),
            Self::List(items) => items.join(" "),
        }
    }
}

/// A named option attached to a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigOption {
    pub name: String,
    pub value: OptionValue,
}

/// A typed, ordered collection of options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// User-supplied identifier, or a generated `cfgCCHHHH` name. Empty
    /// only transiently, between allocation and fixup.
    pub name: String,
    /// Section type, e.g. `interface`.
    pub ty: String,
    /// True iff the name was generated rather than user-supplied.
    pub anonymous: bool,
    pub options: Vec<ConfigOption>,
}

impl Section {
    #[must_use]
    pub fn new(ty: impl Into<String>, name: Option<&str>) -> Self {
        // An empty name means anonymous, same as no name at all.
        let name = name.filter(|n| !n.is_empty());
        Self {
            name: name.unwrap_or_default().to_owned(),
            ty: ty.into(),
            anonymous: name.is_none(),
            options: Vec::new(),
        }
    }

    #[must_use]
    pub fn option(&self, name: &str) -> Option<&ConfigOption> {
        self.options.iter().find(|o| o.name == name)
    }

    pub fn option_mut(&mut self, name: &str) -> Option<&mut ConfigOption> {
        self.options.iter_mut().find(|o| o.name == name)
    }

    /// Set `name` to a scalar value, replacing any existing option of that
    /// name (including a list). Returns true if an option already existed.
    pub fn set_scalar(&mut self, name: &str, value: impl Into<String>) -> bool {
        let value = OptionValue::Scalar(value.into());
        if let Some(opt) = self.option_mut(name) {
            opt.value = value;
            true
        } else {
            self.options.push(ConfigOption {
                name: name.to_owned(),
                value,
            });
            false
        }
    }

    /// Append a scalar without looking for an existing option. Used by the
    /// importer, which has already checked for collisions.
    pub fn push_scalar(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.options.push(ConfigOption {
            name: name.into(),
            value: OptionValue::Scalar(value.into()),
        });
    }

    /// Append one item to the list option `name`, creating the list if
    /// absent and promoting a pre-existing scalar (its value becomes the
    /// first item).
    pub fn push_list_item(&mut self, name: &str, item: impl Into<String>) {
        if let Some(opt) = self.option_mut(name) {
            match &mut opt.value {
                OptionValue::List(items) => items.push(item.into()),
                OptionValue::Scalar(old) => {
                    let first = std::mem::take(old);
                    opt.value = OptionValue::List(vec![first, item.into()]);
                }
            }
        } else {
            self.options.push(ConfigOption {
                name: name.to_owned(),
                value: OptionValue::List(vec![item.into()]),
            });
        }
    }

    /// Remove the named option; true if it existed.
    pub fn remove_option(&mut self, name: &str) -> bool {
        let before = self.options.len();
        self.options.retain(|o| o.name != name);
        self.options.len() != before
    }
}

/// One recorded mutation, serializable as a save-file line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaCommand {
    /// A new section; the value carries its type.
    Add,
    /// A scalar set, or a section type change when no option is named.
    Change,
    /// Section or option removal.
    Remove,
    /// Section or option rename; the value carries the new name.
    Rename,
    /// One item appended to a list option.
    ListAdd,
}

/// A recorded mutation against one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    pub command: DeltaCommand,
    /// Target section name (a generated name for anonymous sections).
    pub section: String,
    pub option: Option<String>,
    pub value: Option<String>,
}

/// A named configuration file's contents; the unit of load, save, commit.
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    /// Filesystem origin; present iff loaded from disk.
    pub path: Option<PathBuf>,
    pub sections: Vec<Section>,
    /// True iff the package lives in the managed config dir and uses the
    /// save-file mechanism.
    pub has_delta_log: bool,
    /// Name of the backend that owns this package.
    pub backend: String,
    /// Mutations not yet flushed to the save file.
    pub pending_deltas: Vec<Delta>,
    /// Mutations replayed from the save file at load time.
    pub saved_deltas: Vec<Delta>,
    anon_counter: u32,
}

impl Package {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            sections: Vec::new(),
            has_delta_log: false,
            backend: String::new(),
            pending_deltas: Vec::new(),
            saved_deltas: Vec::new(),
            anon_counter: 0,
        }
    }

    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.name == name)
    }

    #[must_use]
    pub fn section_index(&self, name: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.name == name)
    }

    /// Append a section and return its index.
    pub fn add_section(&mut self, section: Section) -> usize {
        self.sections.push(section);
        self.sections.len() - 1
    }

    /// Remove the named section with all its options; true if it existed.
    pub fn remove_section(&mut self, name: &str) -> bool {
        let before = self.sections.len();
        self.sections.retain(|s| s.name != name);
        self.sections.len() != before
    }

    /// Assign a generated name to an anonymous section that does not have
    /// one yet. No-op for named sections. Called when the parser finishes a
    /// section and when a section is added through the mutation API.
    pub fn fixup_section(&mut self, index: usize) {
        let Some(section) = self.sections.get(index) else {
            return;
        };
        if !section.name.is_empty() {
            return;
        }
        let hash = section_hash(section);
        self.anon_counter += 1;
        let name = anonymous_name(self.anon_counter, hash);
        self.sections[index].name = name;
    }

    /// True when nothing is waiting to be flushed or committed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.pending_deltas.is_empty() && self.saved_deltas.is_empty()
    }

    fn log(&mut self, log: bool, command: DeltaCommand, section: &str, option: Option<&str>, value: Option<&str>) {
        if log && self.has_delta_log {
            self.pending_deltas.push(Delta {
                command,
                section: section.to_owned(),
                option: option.map(str::to_owned),
                value: value.map(str::to_owned),
            });
        }
    }

    /// Keep the anonymous-name counter ahead of a replayed generated name,
    /// so names minted later in this session cannot collide with it.
    pub(crate) fn reserve_anon_counter(&mut self, name: &str) {
        if let Some(hex) = name.strip_prefix("cfg").and_then(|r| r.get(..2))
            && let Ok(counter) = u32::from_str_radix(hex, 16)
        {
            self.anon_counter = self.anon_counter.max(counter);
        }
    }
}

// ─── Mutation layer ─────────────────────────────────────────────────────────
//
// Every mutation takes an explicit `log` flag: public API wrappers pass
// true, delta replay and other internal callers pass false. Deltas are only
// recorded for packages backed by the save-file mechanism.

impl Package {
    /// Set a scalar option, a section type, or create the missing target.
    ///
    /// With an option name: sets the option in `section`, creating it if
    /// absent; a list option is replaced by the scalar. Without an option
    /// name: sets the type of `section`, creating a named section of type
    /// `value` if absent. Setting a scalar to its current value is a no-op
    /// and logs nothing.
    ///
    /// # Errors
    ///
    /// `Inval` on malformed names or values; `NotFound` when an option is
    /// given but the section does not exist.
    pub fn set(&mut self, section: &str, option: Option<&str>, value: &str, log: bool) -> Result<(), Error> {
        if !validate_name(section) {
            return Err(Error::inval(format!("invalid section name: {section}")));
        }
        match option {
            Some(opt) => {
                if !validate_name(opt) {
                    return Err(Error::inval(format!("invalid option name: {opt}")));
                }
                if !validate_text(value) {
                    return Err(Error::inval("invalid characters in value".to_owned()));
                }
                let Some(sec) = self.section_mut(section) else {
                    return Err(Error::not_found(format!("{}.{section}", self.name)));
                };
                // Suppress no-op scalar writes.
                if let Some(existing) = sec.option(opt)
                    && existing.value == OptionValue::Scalar(value.to_owned())
                {
                    return Ok(());
                }
                sec.set_scalar(opt, value);
                self.log(log, DeltaCommand::Change, section, Some(opt), Some(value));
            }
            None => {
                if !validate_type(value) {
                    return Err(Error::inval(format!("invalid section type: {value}")));
                }
                if let Some(sec) = self.section_mut(section) {
                    sec.ty = value.to_owned();
                } else {
                    self.add_section(Section::new(value, Some(section)));
                }
                self.log(log, DeltaCommand::Change, section, None, Some(value));
            }
        }
        Ok(())
    }

    /// Delete an option, or a whole section when no option is named.
    ///
    /// # Errors
    ///
    /// `NotFound` when the target does not exist.
    pub fn delete(&mut self, section: &str, option: Option<&str>, log: bool) -> Result<(), Error> {
        match option {
            Some(opt) => {
                let Some(sec) = self.section_mut(section) else {
                    return Err(Error::not_found(format!("{}.{section}", self.name)));
                };
                if !sec.remove_option(opt) {
                    return Err(Error::not_found(format!("{}.{section}.{opt}", self.name)));
                }
            }
            None => {
                if !self.remove_section(section) {
                    return Err(Error::not_found(format!("{}.{section}", self.name)));
                }
            }
        }
        self.log(log, DeltaCommand::Remove, section, option, None);
        Ok(())
    }

    /// Rename a section or an option. A renamed section stops being
    /// anonymous.
    ///
    /// # Errors
    ///
    /// `Inval` when the new name fails validation, `NotFound` when the
    /// target does not exist.
    pub fn rename(&mut self, section: &str, option: Option<&str>, name: &str, log: bool) -> Result<(), Error> {
        if !validate_name(name) {
            return Err(Error::inval(format!("invalid name: {name}")));
        }
        let Some(sec) = self.section_mut(section) else {
            return Err(Error::not_found(format!("{}.{section}", self.name)));
        };
        match option {
            Some(opt) => {
                let Some(o) = sec.option_mut(opt) else {
                    return Err(Error::not_found(format!("{}.{section}.{opt}", self.name)));
                };
                o.name = name.to_owned();
            }
            None => {
                sec.name = name.to_owned();
                sec.anonymous = false;
            }
        }
        self.log(log, DeltaCommand::Rename, section, option, Some(name));
        Ok(())
    }

    /// Append one item to a list option, creating the list (or promoting a
    /// scalar) as needed.
    ///
    /// # Errors
    ///
    /// `Inval` on malformed names or values; `NotFound` when the section
    /// does not exist.
    pub fn add_list(&mut self, section: &str, option: &str, value: &str, log: bool) -> Result<(), Error> {
        if !validate_name(option) {
            return Err(Error::inval(format!("invalid option name: {option}")));
        }
        if !validate_text(value) {
            return Err(Error::inval("invalid characters in value".to_owned()));
        }
        let Some(sec) = self.section_mut(section) else {
            return Err(Error::not_found(format!("{}.{section}", self.name)));
        };
        sec.push_list_item(option, value);
        self.log(log, DeltaCommand::ListAdd, section, Some(option), Some(value));
        Ok(())
    }

    /// Create an anonymous section of the given type and return its
    /// generated name.
    ///
    /// # Errors
    ///
    /// `Inval` when the type fails validation.
    pub fn add_anonymous(&mut self, ty: &str, log: bool) -> Result<String, Error> {
        if !validate_type(ty) {
            return Err(Error::inval(format!("invalid section type: {ty}")));
        }
        let idx = self.add_section(Section::new(ty, None));
        self.fixup_section(idx);
        let name = self.sections[idx].name.clone();
        self.log(log, DeltaCommand::Add, &name, None, Some(ty));
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{HASH_SEED, djb_hash};

    #[test]
    fn section_order_is_append_order() {
        let mut pkg = Package::new("net");
        pkg.add_section(Section::new("interface", Some("lan")));
        pkg.add_section(Section::new("interface", Some("wan")));
        pkg.add_section(Section::new("route", Some("default")));
        let names: Vec<&str> = pkg.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["lan", "wan", "default"]);
    }

    #[test]
    fn lookup_returns_first_match() {
        let mut pkg = Package::new("net");
        pkg.add_section(Section::new("interface", Some("lan")));
        assert!(pkg.section("lan").is_some());
        assert!(pkg.section("wan").is_none());
        assert_eq!(pkg.section_index("lan"), Some(0));
    }

    #[test]
    fn empty_name_is_anonymous() {
        let a = Section::new("interface", None);
        let b = Section::new("interface", Some(""));
        assert!(a.anonymous && a.name.is_empty());
        assert!(b.anonymous && b.name.is_empty());
        let named = Section::new("interface", Some("lan"));
        assert!(!named.anonymous);
    }

    #[test]
    fn fixup_generates_expected_name() {
        let mut pkg = Package::new("net");
        let idx = pkg.add_section(Section::new("interface", None));
        pkg.sections[idx].push_scalar("proto", "static");
        pkg.sections[idx].push_scalar("ipaddr", "1.2.3.4");
        pkg.fixup_section(idx);

        let mut h = djb_hash(HASH_SEED, "interface");
        for part in ["proto", "static", "ipaddr", "1.2.3.4"] {
            h = djb_hash(h, part);
        }
        let expected = format!("cfg01{:04x}", h & 0xFFFF);
        assert_eq!(pkg.sections[idx].name, expected);
        assert!(pkg.sections[idx].anonymous);
    }

    #[test]
    fn fixup_is_stable_and_counter_distinguishes_twins() {
        let mut pkg = Package::new("net");
        let a = pkg.add_section(Section::new("rule", None));
        pkg.sections[a].push_scalar("target", "ACCEPT");
        pkg.fixup_section(a);
        let b = pkg.add_section(Section::new("rule", None));
        pkg.sections[b].push_scalar("target", "ACCEPT");
        pkg.fixup_section(b);

        let (na, nb) = (pkg.sections[a].name.clone(), pkg.sections[b].name.clone());
        assert_ne!(na, nb);
        // Same hash suffix, different counter prefix.
        assert_eq!(na[5..], nb[5..]);
        assert_eq!(&na[3..5], "01");
        assert_eq!(&nb[3..5], "02");
    }

    #[test]
    fn fixup_ignores_named_sections() {
        let mut pkg = Package::new("net");
        let idx = pkg.add_section(Section::new("interface", Some("lan")));
        pkg.fixup_section(idx);
        assert_eq!(pkg.sections[idx].name, "lan");
    }

    #[test]
    fn scalar_promotes_to_list() {
        let mut s = Section::new("s", Some("x"));
        s.push_scalar("foo", "a");
        s.push_list_item("foo", "b");
        assert_eq!(
            s.option("foo").map(|o| &o.value),
            Some(&OptionValue::List(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn list_items_keep_append_order() {
        let mut s = Section::new("s", Some("x"));
        for item in ["one", "two", "three"] {
            s.push_list_item("l", item);
        }
        assert_eq!(
            s.option("l").map(|o| o.value.render()),
            Some("one two three".to_owned())
        );
    }

    #[test]
    fn set_scalar_replaces_list() {
        let mut s = Section::new("s", Some("x"));
        s.push_list_item("foo", "a");
        assert!(s.set_scalar("foo", "b"));
        assert_eq!(s.option("foo").map(|o| o.value.render()), Some("b".to_owned()));
    }

    #[test]
    fn remove_option_and_section() {
        let mut pkg = Package::new("net");
        let idx = pkg.add_section(Section::new("interface", Some("lan")));
        pkg.sections[idx].push_scalar("proto", "static");
        assert!(pkg.sections[idx].remove_option("proto"));
        assert!(!pkg.sections[idx].remove_option("proto"));
        assert!(pkg.remove_section("lan"));
        assert!(!pkg.remove_section("lan"));
    }

    fn logged(name: &str) -> Package {
        let mut pkg = Package::new(name);
        pkg.has_delta_log = true;
        pkg
    }

    #[test]
    fn set_creates_section_and_option_with_change_deltas() {
        let mut pkg = logged("net");
        pkg.set("lan", None, "interface", true).expect("create section");
        pkg.set("lan", Some("ipaddr"), "10.0.0.1", true).expect("set option");

        assert_eq!(pkg.section("lan").map(|s| s.ty.as_str()), Some("interface"));
        assert_eq!(pkg.pending_deltas.len(), 2);
        assert_eq!(pkg.pending_deltas[0].command, DeltaCommand::Change);
        assert_eq!(pkg.pending_deltas[1].option.as_deref(), Some("ipaddr"));
    }

    #[test]
    fn set_on_missing_section_with_option_is_not_found() {
        let mut pkg = logged("net");
        assert!(pkg.set("lan", Some("ipaddr"), "10.0.0.1", true).is_err());
        assert!(pkg.pending_deltas.is_empty());
    }

    #[test]
    fn noop_scalar_set_is_suppressed() {
        let mut pkg = logged("net");
        pkg.set("lan", None, "interface", false).expect("create");
        pkg.set("lan", Some("proto"), "static", false).expect("set");
        pkg.set("lan", Some("proto"), "static", true).expect("noop");
        assert!(pkg.pending_deltas.is_empty());
    }

    #[test]
    fn unlogged_mutations_leave_no_deltas() {
        let mut pkg = logged("net");
        pkg.set("lan", None, "interface", false).expect("create");
        pkg.set("lan", Some("proto"), "static", false).expect("set");
        pkg.delete("lan", Some("proto"), false).expect("delete");
        assert!(pkg.pending_deltas.is_empty());
    }

    #[test]
    fn delta_log_gated_on_managed_packages() {
        let mut pkg = Package::new("net");
        pkg.set("lan", None, "interface", true).expect("create");
        assert!(pkg.pending_deltas.is_empty(), "unmanaged packages log nothing");
    }

    #[test]
    fn delete_section_logs_single_remove() {
        let mut pkg = logged("net");
        pkg.set("lan", None, "interface", false).expect("create");
        pkg.set("lan", Some("proto"), "static", false).expect("set");
        pkg.delete("lan", None, true).expect("delete");
        assert_eq!(pkg.pending_deltas.len(), 1);
        assert_eq!(pkg.pending_deltas[0].command, DeltaCommand::Remove);
        assert!(pkg.pending_deltas[0].option.is_none());
        assert!(pkg.section("lan").is_none());
    }

    #[test]
    fn rename_section_clears_anonymous() {
        let mut pkg = logged("net");
        let generated = pkg.add_anonymous("interface", false).expect("add");
        pkg.rename(&generated, None, "lan", true).expect("rename");
        let sec = pkg.section("lan").expect("renamed section");
        assert!(!sec.anonymous);
        assert_eq!(pkg.pending_deltas.len(), 1);
        assert_eq!(pkg.pending_deltas[0].command, DeltaCommand::Rename);
        assert_eq!(pkg.pending_deltas[0].section, generated);
    }

    #[test]
    fn rename_rejects_bad_names() {
        let mut pkg = logged("net");
        pkg.set("lan", None, "interface", false).expect("create");
        assert!(pkg.rename("lan", None, "bad name", true).is_err());
    }

    #[test]
    fn add_anonymous_logs_add_with_type() {
        let mut pkg = logged("net");
        let name = pkg.add_anonymous("rule", true).expect("add");
        assert!(name.starts_with("cfg01"));
        assert_eq!(pkg.pending_deltas.len(), 1);
        assert_eq!(pkg.pending_deltas[0].command, DeltaCommand::Add);
        assert_eq!(pkg.pending_deltas[0].value.as_deref(), Some("rule"));
    }

    #[test]
    fn add_list_logs_each_item() {
        let mut pkg = logged("net");
        pkg.set("lan", None, "interface", false).expect("create");
        pkg.add_list("lan", "dns", "1.1.1.1", true).expect("append");
        pkg.add_list("lan", "dns", "9.9.9.9", true).expect("append");
        assert_eq!(pkg.pending_deltas.len(), 2);
        assert!(pkg.pending_deltas.iter().all(|d| d.command == DeltaCommand::ListAdd));
    }

    #[test]
    fn reserve_anon_counter_skips_replayed_names() {
        let mut pkg = logged("net");
        pkg.reserve_anon_counter("cfg05abcd");
        let name = pkg.add_anonymous("rule", false).expect("add");
        assert!(name.starts_with("cfg06"));
    }
}
