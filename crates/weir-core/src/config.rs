//! Capture policy configuration.
//!
//! The policy is loaded from a YAML file into an immutable [`Config`]
//! snapshot. Readers grab the current snapshot lock-free; a reload builds
//! and validates a whole new value and installs it with an atomic swap, so
//! a handler call that started before the reload finishes against the old,
//! still-consistent snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use directories::ProjectDirs;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{info, warn};

use crate::error::{ConfigError, Result};
use crate::mime;

/// A domain pattern: a regex when it compiles, a literal substring match
/// otherwise. Serialized as the plain pattern string.
#[derive(Debug, Clone)]
pub struct DomainPattern {
    raw: String,
    regex: Option<Regex>,
}

impl DomainPattern {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let regex = Regex::new(&raw).ok();
        if regex.is_none() {
            warn!(pattern = %raw, "domain pattern is not a valid regex, matching as substring");
        }
        Self { raw, regex }
    }

    /// Whether the pattern matches the host.
    pub fn matches(&self, host: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(host),
            None => host.contains(self.raw.as_str()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for DomainPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl From<&str> for DomainPattern {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl Serialize for DomainPattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for DomainPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Self::new(String::deserialize(deserializer)?))
    }
}

/// File size bounds filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSizeFilter {
    pub enabled: bool,
    pub min_bytes: u64,
    pub max_bytes: u64,
}

impl Default for FileSizeFilter {
    fn default() -> Self {
        Self {
            enabled: true,
            min_bytes: 10 * 1024,
            max_bytes: 150 * 1024 * 1024,
        }
    }
}

/// Image pixel dimension bounds filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PixelDimensionFilter {
    pub enabled: bool,
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for PixelDimensionFilter {
    fn default() -> Self {
        Self {
            enabled: true,
            min_width: 301,
            min_height: 301,
            max_width: 12_000,
            max_height: 12_000,
        }
    }
}

/// The capture policy.
///
/// Missing keys in the backing file fall back to these defaults; unknown
/// keys are ignored at the deserialization boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory captured files are written to. Made absolute and created
    /// during validation.
    pub save_dir: PathBuf,
    /// MIME groups eligible for saving; empty means nothing is saved.
    pub allowed_mime_groups: Vec<String>,
    /// When non-empty, only hosts matching some pattern are eligible.
    pub whitelist: Vec<DomainPattern>,
    /// Hosts matching any pattern are never saved, whitelisted or not.
    pub blacklist: Vec<DomainPattern>,
    pub filter_file_size: FileSizeFilter,
    pub filter_pixel_dimensions: PixelDimensionFilter,
    pub log_level: String,
    pub auto_reload_config: bool,
    pub enable_persistent_dedup: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
            allowed_mime_groups: Vec::new(),
            whitelist: Vec::new(),
            blacklist: vec![
                DomainPattern::new(r"ads\..*"),
                DomainPattern::new(r".*\.doubleclick\.net"),
            ],
            filter_file_size: FileSizeFilter::default(),
            filter_pixel_dimensions: PixelDimensionFilter::default(),
            log_level: "info".to_string(),
            auto_reload_config: true,
            enable_persistent_dedup: false,
        }
    }
}

impl Config {
    /// Validates and coerces the config in place.
    ///
    /// Sub-field problems are downgraded to warnings with the offending
    /// entries dropped or clamped; an unusable `save_dir` is the only hard
    /// error. Creates `save_dir` if absent.
    pub fn validate(&mut self) -> Result<()> {
        if self.save_dir.is_relative() {
            self.save_dir =
                std::path::absolute(&self.save_dir).map_err(|source| ConfigError::SaveDir {
                    path: self.save_dir.clone(),
                    source,
                })?;
        }
        std::fs::create_dir_all(&self.save_dir).map_err(|source| ConfigError::SaveDir {
            path: self.save_dir.clone(),
            source,
        })?;

        self.allowed_mime_groups.retain(|group| {
            let known = mime::is_known_group(group);
            if !known {
                warn!(group = %group, "ignoring unknown MIME group");
            }
            known
        });

        let sizes = &mut self.filter_file_size;
        if sizes.max_bytes < sizes.min_bytes {
            warn!(
                min = sizes.min_bytes,
                max = sizes.max_bytes,
                "max_bytes below min_bytes, clamping"
            );
            sizes.max_bytes = sizes.min_bytes;
        }

        let dims = &mut self.filter_pixel_dimensions;
        if dims.max_width < dims.min_width {
            warn!(min = dims.min_width, max = dims.max_width, "max_width below min_width, clamping");
            dims.max_width = dims.min_width;
        }
        if dims.max_height < dims.min_height {
            warn!(
                min = dims.min_height,
                max = dims.max_height,
                "max_height below min_height, clamping"
            );
            dims.max_height = dims.min_height;
        }

        let level = self.log_level.to_ascii_lowercase();
        if matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
            self.log_level = level;
        } else {
            warn!(level = %self.log_level, "unknown log level, using info");
            self.log_level = "info".to_string();
        }

        Ok(())
    }
}

/// Default save directory under the user data dir.
pub fn default_save_dir() -> PathBuf {
    ProjectDirs::from("com", "weir", "weir")
        .map(|dirs| dirs.data_dir().join("captures"))
        .unwrap_or_else(|| PathBuf::from("captures"))
}

/// Default config file path under the user config dir.
pub fn default_config_path() -> PathBuf {
    ProjectDirs::from("com", "weir", "weir")
        .map(|dirs| dirs.config_dir().join("weir.yaml"))
        .unwrap_or_else(|| PathBuf::from("weir.yaml"))
}

/// Loads, validates, persists, and hot-swaps the capture policy.
pub struct ConfigStore {
    path: PathBuf,
    current: ArcSwap<Config>,
}

impl ConfigStore {
    /// Creates a store backed by the given file, starting from defaults.
    /// Call [`load`](Self::load) to pick up the file's contents.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: ArcSwap::from_pointee(Config::default()),
        }
    }

    /// Creates a store at the platform default config path.
    pub fn at_default_path() -> Self {
        Self::new(default_config_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current snapshot. Lock-free; safe on the hot path.
    pub fn current(&self) -> Arc<Config> {
        self.current.load_full()
    }

    /// Reads the backing file if present, merges recognized keys over
    /// defaults, validates, and installs the result as the current snapshot.
    ///
    /// On error the previous snapshot stays installed.
    pub fn load(&self) -> Result<Arc<Config>> {
        let mut config = if self.path.exists() {
            let raw = std::fs::read_to_string(&self.path)?;
            if raw.trim().is_empty() {
                Config::default()
            } else {
                serde_yaml::from_str(&raw)?
            }
        } else {
            info!(path = %self.path.display(), "config file missing, using defaults");
            Config::default()
        };
        config.validate()?;

        let snapshot = Arc::new(config);
        self.current.store(Arc::clone(&snapshot));
        info!(
            path = %self.path.display(),
            save_dir = %snapshot.save_dir.display(),
            "config loaded"
        );
        Ok(snapshot)
    }

    /// Validates and serializes `config` to the backing file, then installs
    /// it as the current snapshot.
    pub fn save(&self, config: &Config) -> Result<()> {
        let mut config = config.clone();
        config.validate()?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_yaml::to_string(&config)?)?;
        self.current.store(Arc::new(config));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config(dir: &tempfile::TempDir) -> Config {
        Config {
            save_dir: dir.path().join("captures"),
            ..Config::default()
        }
    }

    #[test]
    fn domain_pattern_regex_and_substring() {
        let regex = DomainPattern::new(r".*\.doubleclick\.net");
        assert!(regex.matches("stats.doubleclick.net"));
        assert!(!regex.matches("example.com"));

        // Substring semantics and regex semantics agree here.
        let plain = DomainPattern::new("example.com");
        assert!(plain.matches("cdn.example.com"));
        assert!(!plain.matches("evil.com"));

        // An invalid regex degrades to substring matching.
        let broken = DomainPattern::new("img[");
        assert!(broken.matches("img[.host"));
        assert!(!broken.matches("img.host"));
    }

    #[test]
    fn validate_drops_unknown_mime_groups() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = temp_config(&dir);
        config.allowed_mime_groups =
            vec!["image".to_string(), "hologram".to_string(), "video".to_string()];
        config.validate().unwrap();
        assert_eq!(config.allowed_mime_groups, vec!["image", "video"]);
    }

    #[test]
    fn validate_clamps_inverted_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = temp_config(&dir);
        config.filter_file_size.min_bytes = 100;
        config.filter_file_size.max_bytes = 10;
        config.filter_pixel_dimensions.min_width = 500;
        config.filter_pixel_dimensions.max_width = 100;
        config.validate().unwrap();
        assert_eq!(config.filter_file_size.max_bytes, 100);
        assert_eq!(config.filter_pixel_dimensions.max_width, 500);
    }

    #[test]
    fn validate_coerces_log_level() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = temp_config(&dir);
        config.log_level = "WARN".to_string();
        config.validate().unwrap();
        assert_eq!(config.log_level, "warn");

        config.log_level = "loud".to_string();
        config.validate().unwrap();
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn validate_creates_save_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = temp_config(&dir);
        assert!(!config.save_dir.exists());
        config.validate().unwrap();
        assert!(config.save_dir.is_dir());
        assert!(config.save_dir.is_absolute());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("weir.yaml"));

        let mut config = temp_config(&dir);
        config.allowed_mime_groups = vec!["image".to_string()];
        config.whitelist = vec![DomainPattern::new("example.com")];
        config.filter_file_size.min_bytes = 1;
        config.enable_persistent_dedup = true;
        store.save(&config).unwrap();

        let loaded = store.load().unwrap();
        config.validate().unwrap();
        assert_eq!(*loaded, config);
    }

    #[test]
    fn load_ignores_unknown_keys_and_defaults_missing_ones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weir.yaml");
        let save_dir = dir.path().join("captures");
        std::fs::write(
            &path,
            format!(
                "save_dir: {}\nallowed_mime_groups: [image]\nfrobnicate: true\n",
                save_dir.display()
            ),
        )
        .unwrap();

        let store = ConfigStore::new(&path);
        let loaded = store.load().unwrap();
        assert_eq!(loaded.allowed_mime_groups, vec!["image"]);
        // Missing keys keep their defaults.
        assert!(loaded.filter_file_size.enabled);
        assert!(loaded.auto_reload_config);
    }

    #[test]
    fn failed_load_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weir.yaml");
        let store = ConfigStore::new(&path);

        let mut config = temp_config(&dir);
        config.allowed_mime_groups = vec!["image".to_string()];
        store.save(&config).unwrap();
        let before = store.current();

        std::fs::write(&path, "save_dir: [unterminated").unwrap();
        assert!(store.load().is_err());
        assert_eq!(*store.current(), *before);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        // Point save_dir somewhere writable by overriding after load would
        // defeat the purpose; defaults may point at the user data dir, so
        // only check that load succeeds or fails on save_dir alone.
        let store = ConfigStore::new(dir.path().join("absent.yaml"));
        match store.load() {
            Ok(loaded) => assert!(loaded.whitelist.is_empty()),
            Err(ConfigError::SaveDir { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
}
