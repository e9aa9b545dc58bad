//! Atomic persistence of response bodies.
//!
//! Bodies are written to a temp file in the save directory and renamed into
//! place, so a reader can never observe a partially written file. Name
//! collisions get `_1`, `_2`, ... suffixes; the rename refuses to clobber,
//! so concurrent writers racing for one name settle on different suffixes.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{error, info};

use weir_core::SaveOutcome;

/// Upper bound on collision suffix probing.
const MAX_SUFFIX_ATTEMPTS: u32 = 1000;

/// Writes response bodies into a fixed save directory.
#[derive(Debug, Clone)]
pub struct AtomicWriter {
    save_dir: PathBuf,
}

impl AtomicWriter {
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
        }
    }

    /// Persists `body` at `target` (absolute, or relative to the save
    /// directory). Any path resolving outside the save directory is refused
    /// without touching the filesystem.
    pub fn save(&self, body: &[u8], target: &Path) -> SaveOutcome {
        let dir = match self.prepare_dir() {
            Ok(dir) => dir,
            Err(error) => return SaveOutcome::error(format!("save directory unusable: {error}")),
        };

        let Some(resolved) = resolve_within(&dir, target) else {
            error!(target = %target.display(), "path traversal attempt blocked");
            return SaveOutcome::refused(format!(
                "path traversal attempt blocked: {}",
                target.display()
            ));
        };

        match write_atomic(body, &dir, &resolved) {
            Ok(final_path) => {
                info!(path = %final_path.display(), bytes = body.len(), "saved");
                SaveOutcome::saved(final_path, format!("{} B written", body.len()))
            }
            Err(error) => {
                error!(%error, target = %resolved.display(), "save failed");
                SaveOutcome::error(format!("save failed: {error}"))
            }
        }
    }

    fn prepare_dir(&self) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.save_dir)?;
        self.save_dir.canonicalize()
    }
}

/// Writes to a temp file in `dir` and renames it onto `target`, probing
/// `_1`, `_2`, ... suffixes while the name is taken. The temp file is
/// removed on every failure path (NamedTempFile deletes itself on drop).
fn write_atomic(body: &[u8], dir: &Path, target: &Path) -> std::io::Result<PathBuf> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(body)?;
    tmp.flush()?;

    let mut candidate = target.to_path_buf();
    for counter in 1..=MAX_SUFFIX_ATTEMPTS {
        match tmp.persist_noclobber(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                tmp = e.file;
                candidate = suffixed(target, counter);
            }
            Err(e) => return Err(e.error),
        }
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("no free name for {} after {MAX_SUFFIX_ATTEMPTS} attempts", target.display()),
    ))
}

/// `name.ext` becomes `name_<n>.ext`.
fn suffixed(target: &Path, n: u32) -> PathBuf {
    let stem = target
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("file");
    let renamed = match target.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_{n}.{ext}"),
        None => format!("{stem}_{n}"),
    };
    target.with_file_name(renamed)
}

/// Lexically resolves `target` against `dir`, rejecting anything that would
/// land outside it (or on it).
fn resolve_within(dir: &Path, target: &Path) -> Option<PathBuf> {
    let relative = if target.is_absolute() {
        target.strip_prefix(dir).ok()?.to_path_buf()
    } else {
        target.to_path_buf()
    };

    let mut resolved = dir.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => resolved.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
                if !resolved.starts_with(dir) {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if resolved == dir || !resolved.starts_with(dir) {
        return None;
    }
    Some(resolved)
}
