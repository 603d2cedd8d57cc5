//! Per-target build execution.
//!
//! The executor runs the two-phase compile-then-link pipeline for a single
//! target. Preconditions (cross-compiler present, dependency archive
//! present) and subprocess failures each map to a distinct stage so the
//! orchestrator can report precisely what went wrong. A failed target is
//! returned as data, never as a propagated error: isolation across targets
//! is the orchestrator's contract, and the executor upholds it by design.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::builder::toolchain::{CommandSpec, CompileInput, LinkInput, NdkToolchain};
use crate::core::profile::FlagSet;
use crate::core::target::TargetSpec;
use crate::util::fs::{ensure_dir, is_executable};
use crate::util::process::ProcessBuilder;

/// Pipeline stage at which a target failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    ToolchainMissing,
    DependencyMissing,
    CompileFailed,
    LinkFailed,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::ToolchainMissing => "toolchain missing",
            FailureStage::DependencyMissing => "dependency missing",
            FailureStage::CompileFailed => "compile failed",
            FailureStage::LinkFailed => "link failed",
        }
    }
}

/// A per-target build failure, carrying the captured diagnostic output.
#[derive(Debug, Clone, Error, Serialize)]
#[error("{}: {message}", .stage.as_str())]
pub struct BuildError {
    pub stage: FailureStage,
    pub message: String,
}

impl BuildError {
    fn new(stage: FailureStage, message: impl Into<String>) -> Self {
        BuildError {
            stage,
            message: message.into(),
        }
    }
}

/// Final artifact produced for one target.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub target: String,
    pub path: PathBuf,
}

/// Outcome of one target's pipeline.
pub type BuildResult = Result<Artifact, BuildError>;

/// Filesystem layout for one pipeline run.
///
/// All derived paths are keyed by target identifier, so re-running a build
/// overwrites in place and two targets never share a file.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    /// The one JNI compilation unit.
    pub source: PathBuf,
    /// Directory holding per-architecture prebuilt dependency archives.
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

impl ProjectLayout {
    /// The static dependency archive for a target's architecture.
    pub fn dep_archive_for(&self, target: &TargetSpec) -> PathBuf {
        self.deps_dir.join(target.arch).join(&self.dep_archive)
    }

    /// The intermediate object path for a target.
    pub fn object_for(&self, target: &TargetSpec) -> PathBuf {
        let stem = self
            .source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "module".to_string());
        self.build_dir.join(target.id).join(format!("{stem}.o"))
    }

    /// The final artifact path for a target.
    pub fn artifact_for(&self, target: &TargetSpec) -> PathBuf {
        self.dist_dir.join(target.id).join(&self.lib_name)
    }
}

/// Runs the compile/link pipeline for single targets.
pub struct BuildExecutor<'a> {
    toolchain: &'a NdkToolchain,
    layout: &'a ProjectLayout,
    timeout: Option<Duration>,
}

impl<'a> BuildExecutor<'a> {
    pub fn new(toolchain: &'a NdkToolchain, layout: &'a ProjectLayout) -> Self {
        BuildExecutor {
            toolchain,
            layout,
            timeout: None,
        }
    }

    /// Bound each compile/link subprocess; a hang becomes a stage failure.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run compile then link for one target.
    ///
    /// Both phases always run in order; neither is skipped. No retries: a
    /// failure is recorded and the caller moves on to the next target.
    pub fn build(&self, target: &TargetSpec, flags: &FlagSet) -> BuildResult {
        let clang = self.toolchain.clang_for(target);
        if !is_executable(&clang) {
            return Err(BuildError::new(
                FailureStage::ToolchainMissing,
                format!("cross-compiler not found: {}", clang.display()),
            ));
        }

        let archive = self.layout.dep_archive_for(target);
        if !archive.is_file() {
            return Err(BuildError::new(
                FailureStage::DependencyMissing,
                format!("static dependency not found: {}", archive.display()),
            ));
        }

        let object = self.layout.object_for(target);
        self.compile(target, flags, &object)?;

        let artifact_path = self.layout.artifact_for(target);
        self.link(target, flags, &object, &archive, &artifact_path)?;

        Ok(Artifact {
            target: target.id.to_string(),
            path: artifact_path,
        })
    }

    fn compile(
        &self,
        target: &TargetSpec,
        flags: &FlagSet,
        object: &PathBuf,
    ) -> Result<(), BuildError> {
        if let Some(parent) = object.parent() {
            ensure_dir(parent)
                .map_err(|e| BuildError::new(FailureStage::CompileFailed, format!("{e:#}")))?;
        }

        let mut include_dirs = self.toolchain.include_dirs(target);
        include_dirs.extend(self.layout.include_dirs.iter().cloned());

        let spec = self.toolchain.compile_command(
            target,
            &CompileInput {
                source: self.layout.source.clone(),
                output: object.clone(),
                include_dirs,
                cflags: flags.cflags.clone(),
            },
        );

        tracing::debug!(
            "compiling {} -> {} ({})",
            self.layout.source.display(),
            object.display(),
            target.id
        );

        self.run_stage(spec, FailureStage::CompileFailed)
    }

    fn link(
        &self,
        target: &TargetSpec,
        flags: &FlagSet,
        object: &PathBuf,
        archive: &PathBuf,
        output: &PathBuf,
    ) -> Result<(), BuildError> {
        if let Some(parent) = output.parent() {
            ensure_dir(parent)
                .map_err(|e| BuildError::new(FailureStage::LinkFailed, format!("{e:#}")))?;
        }

        let spec = self.toolchain.link_command(
            target,
            &LinkInput {
                object: object.clone(),
                output: output.clone(),
                archives: vec![archive.clone()],
                ldflags: flags.ldflags.clone(),
            },
        );

        tracing::debug!("linking {} ({})", output.display(), target.id);

        self.run_stage(spec, FailureStage::LinkFailed)
    }

    fn run_stage(&self, spec: CommandSpec, stage: FailureStage) -> Result<(), BuildError> {
        let cmd = ProcessBuilder::new(&spec.program).args(&spec.args);

        let output = cmd
            .exec_bounded(self.timeout)
            .map_err(|e| BuildError::new(stage, format!("{e:#}")))?;

        if output.timed_out {
            return Err(BuildError::new(
                stage,
                format!(
                    "`{}` timed out after {:.0?}",
                    cmd.display_command(),
                    self.timeout.unwrap_or_default()
                ),
            ));
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BuildError::new(
                stage,
                format!("`{}` failed\n{}", cmd.display_command(), stderr.trim_end()),
            ));
        }

        Ok(())
    }
}
