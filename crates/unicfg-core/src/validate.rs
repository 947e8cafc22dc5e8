//! Byte-class validators and the anonymous-section naming scheme.
//!
//! Names (packages, sections, options, types) are restricted to ASCII
//! alphanumerics and `_` for shell compatibility. Values may be any text
//! byte that is TAB or `>= 0x20`, excluding CR and LF. Anonymous sections
//! are named from a djb2 hash of their content plus a per-package counter,
//! so an unchanged file re-parses to byte-identical names while two
//! structurally identical sections still get distinct ones.

use crate::model::{OptionValue, Section};

/// Non-empty, every byte ASCII alphanumeric or `_`.
#[must_use]
pub fn validate_name(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Section types use the same character class as names.
#[must_use]
pub fn validate_type(s: &str) -> bool {
    validate_name(s)
}

/// Every byte is TAB or `>= 0x20`, and neither CR nor LF.
///
/// Empty values are legal.
#[must_use]
pub fn validate_text(s: &str) -> bool {
    s.bytes()
        .all(|b| b == b'\t' || (b >= 0x20 && b != b'\r'))
}

/// Sentinel passed as the initial hash state; replaced by the djb2 seed on
/// first use so chained calls can be written without special-casing.
pub const HASH_SEED: u32 = u32::MAX;

/// One round of the djb2 string hash, masked to 31 bits.
///
/// Pass [`HASH_SEED`] to start a chain; feed the previous result to continue
/// it. The mask is applied once per call, after the whole string.
#[must_use]
pub fn djb_hash(hash: u32, s: &str) -> u32 {
    let mut h = if hash == HASH_SEED { 5381 } else { hash };
    for b in s.bytes() {
        h = h.wrapping_shl(5).wrapping_add(h).wrapping_add(u32::from(b));
    }
    h & 0x7FFF_FFFF
}

/// Hash a section's content for anonymous naming: the type, then for each
/// option its name, then its value if scalar. List options contribute only
/// their name, which keeps generated names stable when list items change.
#[must_use]
pub fn section_hash(section: &Section) -> u32 {
    let mut h = djb_hash(HASH_SEED, &section.ty);
    for opt in &section.options {
        h = djb_hash(h, &opt.name);
        if let OptionValue::Scalar(v) = &opt.value {
            h = djb_hash(h, v);
        }
    }
    h
}

/// Format a generated section name from the per-package counter and the
/// 16-bit content hash.
#[must_use]
pub fn anonymous_name(counter: u32, hash: u32) -> String {
    format!("cfg{:02x}{:04x}", counter, hash & 0xFFFF)
}
