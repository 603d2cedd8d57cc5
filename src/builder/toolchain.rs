//! Android NDK toolchain location and command synthesis.
//!
//! The NDK root itself is configuration: it must exist before a run starts,
//! and a missing root is a startup failure rather than a per-target one.
//! Everything below the root (per-target clang drivers, sysroot includes)
//! is derived lazily and checked per target by the executor.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::target::TargetSpec;

/// Host tag used by the NDK's `toolchains/llvm/prebuilt` directory.
pub fn host_tag() -> &'static str {
    if cfg!(target_os = "macos") {
        // The NDK ships a single universal binary directory on macOS.
        "darwin-x86_64"
    } else if cfg!(target_os = "windows") {
        "windows-x86_64"
    } else {
        "linux-x86_64"
    }
}

/// A command to execute: program plus ordered arguments.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }
}

/// Input for the compile phase.
#[derive(Debug, Clone)]
pub struct CompileInput {
    pub source: PathBuf,
    pub output: PathBuf,
    pub include_dirs: Vec<PathBuf>,
    pub cflags: Vec<String>,
}

/// Input for the link phase.
#[derive(Debug, Clone)]
pub struct LinkInput {
    pub object: PathBuf,
    pub output: PathBuf,
    /// Prebuilt static archives, linked as-is.
    pub archives: Vec<PathBuf>,
    pub ldflags: Vec<String>,
}

/// Locates cross-compilers inside one NDK installation.
#[derive(Debug, Clone)]
pub struct NdkToolchain {
    root: PathBuf,
    api_level: u32,
}

impl NdkToolchain {
    /// Create a toolchain rooted at an existing NDK installation.
    pub fn new(root: impl Into<PathBuf>, api_level: u32) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            bail!(
                "NDK root is not a directory: {}\n\
                 set `paths.ndk` in jniforge.toml or export ANDROID_NDK_HOME",
                root.display()
            );
        }
        Ok(NdkToolchain { root, api_level })
    }

    /// Locate the NDK, preferring an explicit path over the environment.
    ///
    /// Order: explicit argument, `ANDROID_NDK_HOME`, `ANDROID_NDK_ROOT`,
    /// then the directory containing `ndk-build` on PATH.
    pub fn discover(explicit: Option<PathBuf>, api_level: u32) -> Result<Self> {
        if let Some(root) = explicit {
            return Self::new(root, api_level);
        }

        for var in ["ANDROID_NDK_HOME", "ANDROID_NDK_ROOT"] {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    return Self::new(PathBuf::from(value), api_level)
                        .with_context(|| format!("from ${var}"));
                }
            }
        }

        if let Ok(ndk_build) = which::which("ndk-build") {
            if let Some(root) = ndk_build.parent() {
                tracing::debug!("NDK located via ndk-build on PATH: {}", root.display());
                return Self::new(root, api_level);
            }
        }

        bail!(
            "no Android NDK found\n\
             \n\
             jniforge needs an NDK installation. Pass --ndk, set `paths.ndk`\n\
             in jniforge.toml, or export ANDROID_NDK_HOME."
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn api_level(&self) -> u32 {
        self.api_level
    }

    fn prebuilt_dir(&self) -> PathBuf {
        self.root
            .join("toolchains")
            .join("llvm")
            .join("prebuilt")
            .join(host_tag())
    }

    /// Effective API level for one target: the configured level clamped up
    /// to the target's minimum.
    pub fn effective_api(&self, target: &TargetSpec) -> u32 {
        self.api_level.max(target.min_api)
    }

    /// Per-target clang driver, e.g. `aarch64-linux-android21-clang`.
    pub fn clang_for(&self, target: &TargetSpec) -> PathBuf {
        let mut name = format!("{}{}-clang", target.triple, self.effective_api(target));
        if cfg!(windows) {
            name.push_str(".cmd");
        }
        self.prebuilt_dir().join("bin").join(name)
    }

    pub fn sysroot(&self) -> PathBuf {
        self.prebuilt_dir().join("sysroot")
    }

    /// Include directories the compiler needs for this target: the shared
    /// sysroot headers plus the triple-specific ones.
    pub fn include_dirs(&self, target: &TargetSpec) -> Vec<PathBuf> {
        let usr = self.sysroot().join("usr").join("include");
        let triple_dir = usr.join(target.triple);
        vec![usr, triple_dir]
    }

    /// Generate the compile command for one source unit.
    pub fn compile_command(&self, target: &TargetSpec, input: &CompileInput) -> CommandSpec {
        let mut spec = CommandSpec::new(self.clang_for(target));
        for dir in &input.include_dirs {
            spec = spec.arg(format!("-I{}", dir.display()));
        }
        spec.args(input.cflags.iter().cloned())
            .arg("-c")
            .arg(input.source.display().to_string())
            .arg("-o")
            .arg(input.output.display().to_string())
    }

    /// Generate the link command producing the shared object.
    pub fn link_command(&self, target: &TargetSpec, input: &LinkInput) -> CommandSpec {
        let mut spec = CommandSpec::new(self.clang_for(target))
            .arg(input.object.display().to_string());
        for archive in &input.archives {
            spec = spec.arg(archive.display().to_string());
        }
        spec.args(input.ldflags.iter().cloned())
            .arg("-o")
            .arg(input.output.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::target;
    use tempfile::TempDir;

    fn toolchain(api: u32) -> (TempDir, NdkToolchain) {
        let tmp = TempDir::new().unwrap();
        let tc = NdkToolchain::new(tmp.path(), api).unwrap();
        (tmp, tc)
    }

    #[test]
    fn test_new_rejects_missing_root() {
        let err = NdkToolchain::new("/nonexistent/ndk-r26", 21).unwrap_err();
        assert!(err.to_string().contains("NDK root"));
    }

    #[test]
    fn test_clang_name_includes_triple_and_api() {
        let (_tmp, tc) = toolchain(24);
        let arm64 = target::resolve("arm64-v8a").unwrap();
        let clang = tc.clang_for(&arm64);
        let name = clang.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("aarch64-linux-android24-clang"));
    }

    #[test]
    fn test_api_level_clamps_to_target_minimum() {
        let (_tmp, tc) = toolchain(19);
        let arm64 = target::resolve("arm64-v8a").unwrap();
        let v7 = target::resolve("armeabi-v7a").unwrap();
        assert_eq!(tc.effective_api(&arm64), 21);
        assert_eq!(tc.effective_api(&v7), 19);
    }

    #[test]
    fn test_include_dirs_cover_triple() {
        let (_tmp, tc) = toolchain(21);
        let x86 = target::resolve("x86").unwrap();
        let dirs = tc.include_dirs(&x86);
        assert_eq!(dirs.len(), 2);
        assert!(dirs[1].ends_with("i686-linux-android"));
    }

    #[test]
    fn test_compile_command_shape() {
        let (_tmp, tc) = toolchain(21);
        let arm64 = target::resolve("arm64-v8a").unwrap();
        let spec = tc.compile_command(
            &arm64,
            &CompileInput {
                source: PathBuf::from("jni/lib.c"),
                output: PathBuf::from("build/arm64-v8a/lib.o"),
                include_dirs: vec![PathBuf::from("deps/include")],
                cflags: vec!["-fPIC".to_string(), "-O2".to_string()],
            },
        );

        assert_eq!(
            spec.args,
            vec!["-Ideps/include", "-fPIC", "-O2", "-c", "jni/lib.c", "-o", "build/arm64-v8a/lib.o"]
        );
    }

    #[test]
    fn test_link_command_orders_object_before_archives() {
        let (_tmp, tc) = toolchain(21);
        let arm64 = target::resolve("arm64-v8a").unwrap();
        let spec = tc.link_command(
            &arm64,
            &LinkInput {
                object: PathBuf::from("build/arm64-v8a/lib.o"),
                output: PathBuf::from("dist/arm64-v8a/libsodiumjni.so"),
                archives: vec![PathBuf::from("deps/aarch64/libsodium.a")],
                ldflags: vec!["-shared".to_string(), "-llog".to_string()],
            },
        );

        assert_eq!(spec.args[0], "build/arm64-v8a/lib.o");
        assert_eq!(spec.args[1], "deps/aarch64/libsodium.a");
        assert_eq!(spec.args.last().unwrap(), "dist/arm64-v8a/libsodiumjni.so");
    }

    #[test]
    fn test_host_tag_is_known() {
        assert!(["linux-x86_64", "darwin-x86_64", "windows-x86_64"].contains(&host_tag()));
    }
}
