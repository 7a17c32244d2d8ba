//! Storage key handling: filename sanitizing and key issuance.
//!
//! Every uploaded PDF lands under `pdfs/<millis>_<sanitized name>`. The
//! millisecond stamp is the only thing that tells two uploads of the same
//! name apart, so [`KeyGenerator`] never hands out the same stamp twice.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Prefix reserved for uploaded documents.
pub const KEY_PREFIX: &str = "pdfs/";

/// Separator between the timestamp stamp and the sanitized filename.
pub const STAMP_SEPARATOR: char = '_';

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '!' | '-' | '_' | '.' | '*' | '\'' | '(' | ')')
}

/// Strip every character outside the storage-safe allow-list.
///
/// Only deletes; surviving characters keep their order. A name made
/// entirely of disallowed characters comes back empty.
pub fn sanitize_key(raw: &str) -> String {
    raw.chars().filter(|c| is_allowed(*c)).collect()
}

/// Sanitize a `/`-separated key segment by segment.
///
/// Keys issued by [`KeyGenerator`] contain a `/`, which [`sanitize_key`]
/// would drop. Empty segments are skipped and `.`/`..` are refused so a
/// key can never climb out of its prefix on the local backend.
pub fn sanitize_key_path(raw: &str) -> Option<String> {
    let mut segments = Vec::new();
    for segment in raw.split('/') {
        let clean = sanitize_key(segment);
        match clean.as_str() {
            "" => continue,
            "." | ".." => return None,
            _ => segments.push(clean),
        }
    }

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

/// Derive the human-facing name shown in listings from a storage key.
///
/// Takes everything after the last stamp separator and drops the `.pdf`
/// extension; falls back to `"arquivo"` when nothing is left.
pub fn display_name(key: &str) -> String {
    let tail = key.rsplit(STAMP_SEPARATOR).next().unwrap_or(key);
    let name = tail.replacen(".pdf", "", 1);
    if name.is_empty() {
        "arquivo".to_string()
    } else {
        name
    }
}

/// Issues storage keys with a strictly increasing millisecond stamp.
#[derive(Debug, Default)]
pub struct KeyGenerator {
    last_stamp: AtomicI64,
}

impl KeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a key for `original_name` stamped with the current time.
    pub fn next_key(&self, original_name: &str) -> String {
        self.next_key_at(Utc::now().timestamp_millis(), original_name)
    }

    /// Issue a key using `now_millis` as the clock reading.
    ///
    /// If the clock has not moved past the last issued stamp (same
    /// millisecond, or the clock stepped back) the stamp is bumped to
    /// `last + 1`.
    pub fn next_key_at(&self, now_millis: i64, original_name: &str) -> String {
        let stamp = self.reserve_stamp(now_millis);
        format!(
            "{}{}{}{}",
            KEY_PREFIX,
            stamp,
            STAMP_SEPARATOR,
            sanitize_key(original_name)
        )
    }

    fn reserve_stamp(&self, now_millis: i64) -> i64 {
        let mut current = self.last_stamp.load(Ordering::Relaxed);
        loop {
            let next = if now_millis > current {
                now_millis
            } else {
                current + 1
            };
            match self.last_stamp.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(observed) => current = observed,
            }
        }
    }
}
