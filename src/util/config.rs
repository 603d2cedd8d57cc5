//! Configuration file support for jniforge.
//!
//! Two locations are recognized:
//! - Global: `~/.jniforge/config.toml` - user-wide defaults
//! - Project: `jniforge.toml` in the working directory
//!
//! A project file takes precedence over the global one; environment
//! variables and CLI flags override both.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::executor::ProjectLayout;
use crate::core::profile::{SanitizerOptions, SecurityProfile};

/// jniforge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildSettings,

    /// Sanitizer toggles
    pub sanitizers: SanitizerOptions,

    /// Filesystem layout and toolchain location
    pub paths: PathSettings,
}

/// Build settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Minimum Android API level to compile against.
    pub api_level: u32,

    /// Security profile applied to every target.
    pub profile: SecurityProfile,

    /// Targets built in parallel.
    pub jobs: usize,

    /// Per-subprocess timeout in seconds (0 disables the deadline).
    pub timeout_secs: u64,
}

impl Default for BuildSettings {
    fn default() -> Self {
        BuildSettings {
            api_level: 21,
            profile: SecurityProfile::default(),
            jobs: 1,
            timeout_secs: 0,
        }
    }
}

/// Filesystem layout and toolchain location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// NDK root. When absent, discovery falls back to ANDROID_NDK_HOME,
    /// ANDROID_NDK_ROOT, then `ndk-build` on PATH.
    pub ndk: Option<PathBuf>,

    /// The one JNI compilation unit.
    pub source: PathBuf,

    /// Directory of per-architecture prebuilt dependency archives.
    pub deps_dir: PathBuf,

    /// Archive file name under `deps_dir/{arch}/`.
    pub dep_archive: String,

    /// Root for intermediate objects.
    pub build_dir: PathBuf,

    /// Root for final artifacts.
    pub dist_dir: PathBuf,

    /// Output shared-object file name.
    pub lib_name: String,

    /// Extra include directories beyond the NDK sysroot.
    pub include_dirs: Vec<PathBuf>,
}

impl Default for PathSettings {
    fn default() -> Self {
        PathSettings {
            ndk: None,
            source: PathBuf::from("jni/sodiumjni.c"),
            deps_dir: PathBuf::from("deps"),
            dep_archive: "libsodium.a".to_string(),
            build_dir: PathBuf::from("build"),
            dist_dir: PathBuf::from("dist"),
            lib_name: "libsodiumjni.so".to_string(),
            include_dirs: vec![PathBuf::from("deps/include")],
        }
    }
}

/// Path of the global config file, if a home directory exists.
pub fn global_config_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".jniforge").join("config.toml"))
}

/// Path of the project config file under `dir`.
pub fn project_config_path(dir: &Path) -> PathBuf {
    dir.join("jniforge.toml")
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file is missing
    /// or unparseable.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("ignoring config {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Load the effective configuration for a project directory: the
    /// project file when present, otherwise the global file, otherwise
    /// defaults.
    pub fn load_layered(project_dir: &Path) -> Self {
        let project = project_config_path(project_dir);
        if project.exists() {
            return Self::load_or_default(&project);
        }
        if let Some(global) = global_config_path() {
            if global.exists() {
                return Self::load_or_default(&global);
            }
        }
        Self::default()
    }

    /// Apply recognized environment overrides on top of file settings.
    pub fn apply_env(&mut self) {
        if let Ok(value) = std::env::var("JNIFORGE_API_LEVEL") {
            match value.parse() {
                Ok(level) => self.build.api_level = level,
                Err(_) => tracing::warn!("ignoring non-numeric JNIFORGE_API_LEVEL={value}"),
            }
        }
        if let Ok(value) = std::env::var("JNIFORGE_PROFILE") {
            match value.parse() {
                Ok(profile) => self.build.profile = profile,
                Err(e) => tracing::warn!("ignoring JNIFORGE_PROFILE: {e}"),
            }
        }
    }

    /// The filesystem layout this configuration describes.
    pub fn layout(&self) -> ProjectLayout {
        ProjectLayout {
            source: self.paths.source.clone(),
            deps_dir: self.paths.deps_dir.clone(),
            dep_archive: self.paths.dep_archive.clone(),
            build_dir: self.paths.build_dir.clone(),
            dist_dir: self.paths.dist_dir.clone(),
            lib_name: self.paths.lib_name.clone(),
            include_dirs: self.paths.include_dirs.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.build.api_level, 21);
        assert_eq!(config.build.profile, SecurityProfile::Hardened);
        assert_eq!(config.build.jobs, 1);
        assert!(!config.sanitizers.undefined);
        assert!(!config.sanitizers.address);
        assert_eq!(config.paths.lib_name, "libsodiumjni.so");
    }

    #[test]
    fn test_parse_partial_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("jniforge.toml");
        std::fs::write(
            &path,
            "[build]\napi_level = 26\nprofile = \"minimal\"\n\n[sanitizers]\nundefined = true\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.build.api_level, 26);
        assert_eq!(config.build.profile, SecurityProfile::Minimal);
        assert!(config.sanitizers.undefined);
        // Unspecified sections keep their defaults
        assert_eq!(config.paths.dep_archive, "libsodium.a");
    }

    #[test]
    fn test_load_or_default_on_bad_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("jniforge.toml");
        std::fs::write(&path, "this is not toml [[[").unwrap();

        let config = Config::load_or_default(&path);
        assert_eq!(config.build.api_level, 21);
    }

    #[test]
    fn test_load_layered_prefers_project_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            project_config_path(tmp.path()),
            "[build]\napi_level = 30\n",
        )
        .unwrap();

        let config = Config::load_layered(tmp.path());
        assert_eq!(config.build.api_level, 30);
    }

    #[test]
    fn test_layout_mirrors_path_settings() {
        let config = Config::default();
        let layout = config.layout();
        assert_eq!(layout.source, PathBuf::from("jni/sodiumjni.c"));
        assert_eq!(layout.dist_dir, PathBuf::from("dist"));
    }
}
