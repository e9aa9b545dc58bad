//! Filename sanitization for captured payloads.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::info;

static INVALID_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_.\- ]").expect("static regex"));
static WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// Maximum file name length in bytes.
const MAX_NAME_LEN: usize = 255;

/// Windows reserved device names; never usable as file names, with or
/// without an extension.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Makes a URL basename safe to use as a file name.
///
/// Empty or extension-less input gets a synthesized `file_<millis>` name;
/// a name whose extension is empty gets `ext` appended. The result contains
/// only `[A-Za-z0-9_.\-]`, is at most 255 bytes, and never names a Windows
/// reserved device (those are replaced with a name derived from
/// `fallback_seed`). `ext` is expected to be dotted (classification
/// guarantees at least `.bin`); re-sanitizing a safe name returns it
/// unchanged.
pub fn safe_name(raw_basename: &str, ext: &str, fallback_seed: &str) -> String {
    let candidate = if raw_basename.is_empty() || !raw_basename.contains('.') {
        format!("file_{}{}", Utc::now().timestamp_millis(), ext)
    } else if raw_basename.rsplit_once('.').is_some_and(|(_, e)| e.is_empty()) {
        format!("{raw_basename}{ext}")
    } else {
        raw_basename.to_string()
    };

    let replaced = INVALID_CHARS.replace_all(candidate.trim(), "_");
    let mut name = WHITESPACE_RUNS.replace_all(&replaced, "_").into_owned();
    truncate_name(&mut name);

    if is_unusable(&name) {
        let renamed = format!("file_{}{}", short_hash(fallback_seed), ext);
        info!(from = %name, to = %renamed, "replaced reserved or empty file name");
        return renamed;
    }
    name
}

/// Empty, dots-only, or a reserved device name (bare or with an extension).
fn is_unusable(name: &str) -> bool {
    if name.is_empty() || name.chars().all(|c| c == '.') {
        return true;
    }
    let stem = name.split_once('.').map_or(name, |(stem, _)| stem);
    let upper = stem.to_ascii_uppercase();
    RESERVED_NAMES.contains(&upper.as_str())
}

/// Truncates to [`MAX_NAME_LEN`] bytes, preserving the extension so the
/// result still carries one. The name is ASCII after sanitization, so byte
/// truncation cannot split a character.
fn truncate_name(name: &mut String) {
    if name.len() <= MAX_NAME_LEN {
        return;
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() && ext.len() + 1 < MAX_NAME_LEN => {
            let keep = (MAX_NAME_LEN - ext.len() - 1).min(stem.len());
            *name = format!("{}.{ext}", &stem[..keep]);
        }
        _ => name.truncate(MAX_NAME_LEN),
    }
}

/// First 12 hex chars of the seed's SHA-256 digest.
fn short_hash(seed: &str) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    digest.iter().take(6).map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_through_already_safe_names() {
        assert_eq!(safe_name("photo.jpg", ".jpg", "seed"), "photo.jpg");
        assert_eq!(safe_name("a-b_c.d.png", ".png", "seed"), "a-b_c.d.png");
    }

    #[test]
    fn replaces_invalid_characters_and_whitespace() {
        assert_eq!(safe_name("we?ird*na:me.png", ".png", "s"), "we_ird_na_me.png");
        assert_eq!(safe_name("two  words here.gif", ".gif", "s"), "two_words_here.gif");
    }

    #[test]
    fn synthesizes_name_for_empty_or_extensionless_input() {
        let name = safe_name("", ".jpg", "https://example.com/a");
        assert!(name.starts_with("file_"));
        assert!(name.ends_with(".jpg"));

        let name = safe_name("noext", ".png", "seed");
        assert!(name.starts_with("file_"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn appends_extension_when_missing_after_dot() {
        assert_eq!(safe_name("trailing.", ".webp", "s"), "trailing..webp");
    }

    #[test]
    fn replaces_reserved_device_names() {
        let out = safe_name("CON.jpg", ".jpg", "https://example.com/x");
        assert!(out.starts_with("file_"), "got {out}");
        assert!(out.ends_with(".jpg"));

        let out = safe_name("com1.wav", ".wav", "seed");
        assert!(out.starts_with("file_"));

        // Names merely containing a reserved word are fine.
        assert_eq!(safe_name("CONTENT.jpg", ".jpg", "s"), "CONTENT.jpg");
    }

    #[test]
    fn replaces_dots_only_names() {
        let out = safe_name(" . ", ".bin", "seed");
        assert!(out.starts_with("file_"), "got {out}");
        assert!(out.ends_with(".bin"));
    }

    #[test]
    fn truncates_long_names_keeping_extension() {
        let long = format!("{}.jpg", "a".repeat(300));
        let out = safe_name(&long, ".jpg", "seed");
        assert_eq!(out.len(), MAX_NAME_LEN);
        assert!(out.ends_with(".jpg"));
    }

    #[test]
    fn idempotent_for_safe_output() {
        for raw in [
            "photo.jpg",
            "we?ird*na:me.png",
            "two  words.gif",
            "trailing.",
            "",
            "noext",
            "CON.jpg",
            &format!("{}.jpg", "a".repeat(300)),
        ] {
            let once = safe_name(raw, ".jpg", "seed");
            let twice = safe_name(&once, ".jpg", "seed");
            assert_eq!(once, twice, "input {raw:?}");
        }
    }

    #[test]
    fn short_hash_is_stable_12_hex() {
        let h = short_hash("abc");
        assert_eq!(h.len(), 12);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(h, short_hash("abc"));
    }
}
