//! Full pipeline orchestration.
//!
//! One run resolves every requested target, composes policy flags, builds,
//! and verifies. Per-target failures are isolated: they are recorded in the
//! summary and never abort the loop. Only configuration errors (unknown
//! target, unusable worker pool) abort before any target starts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;

use crate::builder::executor::{BuildExecutor, FailureStage, ProjectLayout};
use crate::builder::toolchain::NdkToolchain;
use crate::core::profile::{self, SanitizerOptions, SecurityProfile};
use crate::core::target::{self, TargetSpec};
use crate::verify::{self, VerificationReport};

/// Cooperative cancellation for an in-flight run.
///
/// Cancelling stops new target pipelines from launching; pipelines already
/// running finish and are recorded. The resulting summary is marked
/// incomplete.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options for one orchestrated run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub profile: SecurityProfile,
    pub sanitizers: SanitizerOptions,
    /// Bounded parallelism across targets. 1 reproduces a fully sequential
    /// run; targets share no mutable state either way.
    pub jobs: usize,
    /// Per-subprocess deadline; a hang becomes a stage failure.
    pub timeout: Option<Duration>,
    pub cancel: CancelToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            profile: SecurityProfile::default(),
            sanitizers: SanitizerOptions::default(),
            jobs: 1,
            timeout: None,
            cancel: CancelToken::new(),
        }
    }
}

/// Build outcome for one requested target.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildOutcome {
    Success { artifact: std::path::PathBuf },
    Failure { stage: FailureStage, message: String },
}

/// Verification outcome for one built artifact.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationOutcome {
    Verified { report: VerificationReport },
    Unreadable { message: String },
}

/// Everything recorded for one requested target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetOutcome {
    pub target: String,
    pub build: BuildOutcome,
    /// Present only when the build succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationOutcome>,
}

impl TargetOutcome {
    pub fn built(&self) -> bool {
        matches!(self.build, BuildOutcome::Success { .. })
    }

    /// True when the target built and every hardening check fully passed.
    pub fn hardening_clean(&self) -> bool {
        matches!(
            &self.verification,
            Some(VerificationOutcome::Verified { report }) if report.all_pass()
        )
    }
}

/// Aggregated results of one run: exactly one entry per requested target,
/// in request order, unless the run was cancelled part-way.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub profile: SecurityProfile,
    pub outcomes: Vec<TargetOutcome>,
    /// False when cancellation stopped the run before every requested
    /// target was processed.
    pub complete: bool,
}

impl RunSummary {
    pub fn built(&self) -> usize {
        self.outcomes.iter().filter(|o| o.built()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.built()
    }

    /// Built targets whose verification did not come back fully clean.
    pub fn hardening_warnings(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.built() && !o.hardening_clean())
            .count()
    }

    pub fn all_built(&self) -> bool {
        self.complete && self.failed() == 0
    }
}

/// Run the full pipeline for the given targets.
pub fn run(
    target_ids: &[String],
    toolchain: &NdkToolchain,
    layout: &ProjectLayout,
    opts: &RunOptions,
) -> Result<RunSummary> {
    run_with_progress(target_ids, toolchain, layout, opts, |_| {})
}

/// Like [`run`], invoking `progress` once per completed target.
pub fn run_with_progress(
    target_ids: &[String],
    toolchain: &NdkToolchain,
    layout: &ProjectLayout,
    opts: &RunOptions,
    progress: impl Fn(&TargetOutcome) + Sync,
) -> Result<RunSummary> {
    // Configuration errors abort before any target starts.
    let targets = target_ids
        .iter()
        .map(|id| target::resolve(id))
        .collect::<Result<Vec<_>, _>>()?;

    let executor = BuildExecutor::new(toolchain, layout).timeout(opts.timeout);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs.max(1))
        .build()
        .context("failed to build worker pool")?;

    tracing::info!(
        "building {} target(s), profile {}, {} job(s)",
        targets.len(),
        opts.profile,
        opts.jobs.max(1)
    );

    let outcomes: Vec<Option<TargetOutcome>> = pool.install(|| {
        targets
            .par_iter()
            .map(|target| {
                if opts.cancel.is_cancelled() {
                    tracing::warn!("cancelled before {} started", target.id);
                    return None;
                }
                let outcome = run_target(&executor, target, opts);
                progress(&outcome);
                Some(outcome)
            })
            .collect()
    });

    let complete = outcomes.iter().all(Option::is_some);
    let outcomes: Vec<TargetOutcome> = outcomes.into_iter().flatten().collect();

    Ok(RunSummary {
        profile: opts.profile,
        outcomes,
        complete,
    })
}

fn run_target(executor: &BuildExecutor, target: &TargetSpec, opts: &RunOptions) -> TargetOutcome {
    let flags = profile::compile(opts.profile, target, opts.sanitizers);

    match executor.build(target, &flags) {
        Ok(artifact) => {
            let verification = match verify::verify(&artifact.path) {
                Ok(report) => {
                    if !report.all_pass() {
                        tracing::warn!(
                            "{}: hardening checks not clean: {}",
                            target.id,
                            report.findings().join(", ")
                        );
                    }
                    VerificationOutcome::Verified { report }
                }
                Err(e) => VerificationOutcome::Unreadable {
                    message: e.to_string(),
                },
            };
            TargetOutcome {
                target: target.id.to_string(),
                build: BuildOutcome::Success {
                    artifact: artifact.path,
                },
                verification: Some(verification),
            }
        }
        Err(e) => {
            tracing::warn!("{}: {}", target.id, e);
            TargetOutcome {
                target: target.id.to_string(),
                build: BuildOutcome::Failure {
                    stage: e.stage,
                    message: e.message,
                },
                verification: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn layout(root: &Path) -> ProjectLayout {
        ProjectLayout {
            source: root.join("jni/sodiumjni.c"),
            deps_dir: root.join("deps"),
            dep_archive: "libsodium.a".to_string(),
            build_dir: root.join("build"),
            dist_dir: root.join("dist"),
            lib_name: "libsodiumjni.so".to_string(),
            include_dirs: vec![],
        }
    }

    fn all_ids() -> Vec<String> {
        target::all().iter().map(|t| t.id.to_string()).collect()
    }

    #[test]
    fn test_unknown_target_aborts_before_any_build() {
        let tmp = TempDir::new().unwrap();
        let tc = NdkToolchain::new(tmp.path(), 21).unwrap();
        let layout = layout(tmp.path());

        let err = run(
            &["arm64-v8a".to_string(), "sparc".to_string()],
            &tc,
            &layout,
            &RunOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown target"));
    }

    #[test]
    fn test_missing_toolchain_isolated_per_target() {
        let tmp = TempDir::new().unwrap();
        let tc = NdkToolchain::new(tmp.path(), 21).unwrap();
        let layout = layout(tmp.path());

        let summary = run(&all_ids(), &tc, &layout, &RunOptions::default()).unwrap();

        // Every target gets an entry, in request order, no exceptions thrown.
        assert!(summary.complete);
        assert_eq!(summary.outcomes.len(), 4);
        assert_eq!(summary.built(), 0);
        assert_eq!(summary.failed(), 4);
        let ids: Vec<_> = summary.outcomes.iter().map(|o| o.target.as_str()).collect();
        assert_eq!(ids, ["arm64-v8a", "armeabi-v7a", "x86_64", "x86"]);
        for outcome in &summary.outcomes {
            match &outcome.build {
                BuildOutcome::Failure { stage, .. } => {
                    assert_eq!(*stage, FailureStage::ToolchainMissing)
                }
                other => panic!("expected failure, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_pre_cancelled_run_is_marked_incomplete() {
        let tmp = TempDir::new().unwrap();
        let tc = NdkToolchain::new(tmp.path(), 21).unwrap();
        let layout = layout(tmp.path());

        let opts = RunOptions::default();
        opts.cancel.cancel();

        let summary = run(&all_ids(), &tc, &layout, &opts).unwrap();
        assert!(!summary.complete);
        assert!(summary.outcomes.is_empty());
        assert!(!summary.all_built());
    }

    #[cfg(unix)]
    fn install_fake_ndk(root: &Path, api: u32) {
        use std::os::unix::fs::PermissionsExt;

        let bin = root
            .join("toolchains/llvm/prebuilt")
            .join(crate::builder::toolchain::host_tag())
            .join("bin");
        fs::create_dir_all(&bin).unwrap();
        let script = "#!/bin/sh\n\
            out=\"\"\n\
            while [ $# -gt 0 ]; do\n\
              if [ \"$1\" = \"-o\" ]; then out=\"$2\"; shift; fi\n\
              shift\n\
            done\n\
            [ -n \"$out\" ] && : > \"$out\"\n\
            exit 0\n";
        for spec in target::all() {
            let clang = bin.join(format!("{}{}-clang", spec.triple, api.max(spec.min_api)));
            fs::write(&clang, script).unwrap();
            fs::set_permissions(&clang, fs::Permissions::from_mode(0o755)).unwrap();
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_one_missing_dependency_does_not_poison_the_run() {
        let tmp = TempDir::new().unwrap();
        install_fake_ndk(tmp.path(), 21);

        let layout = layout(tmp.path());
        fs::create_dir_all(layout.source.parent().unwrap()).unwrap();
        fs::write(&layout.source, "/* jni */").unwrap();

        // Dependency archives for every architecture except x86's.
        for spec in target::all() {
            if spec.arch == "i686" {
                continue;
            }
            let archive = layout.dep_archive_for(spec);
            fs::create_dir_all(archive.parent().unwrap()).unwrap();
            fs::write(&archive, "!<arch>\n").unwrap();
        }

        let tc = NdkToolchain::new(tmp.path(), 21).unwrap();
        let summary = run(&all_ids(), &tc, &layout, &RunOptions::default()).unwrap();

        assert!(summary.complete);
        assert_eq!(summary.outcomes.len(), 4);
        assert_eq!(summary.built(), 3);
        assert_eq!(summary.failed(), 1);

        let x86 = summary
            .outcomes
            .iter()
            .find(|o| o.target == "x86")
            .unwrap();
        match &x86.build {
            BuildOutcome::Failure { stage, .. } => {
                assert_eq!(*stage, FailureStage::DependencyMissing)
            }
            other => panic!("expected dependency failure, got {other:?}"),
        }

        // Built targets were verified; the stub artifacts are not real ELFs,
        // which must surface as unreadable rather than abort the run.
        for outcome in summary.outcomes.iter().filter(|o| o.built()) {
            assert!(matches!(
                outcome.verification,
                Some(VerificationOutcome::Unreadable { .. })
            ));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_parallel_run_preserves_request_order() {
        let tmp = TempDir::new().unwrap();
        install_fake_ndk(tmp.path(), 21);

        let layout = layout(tmp.path());
        fs::create_dir_all(layout.source.parent().unwrap()).unwrap();
        fs::write(&layout.source, "/* jni */").unwrap();
        for spec in target::all() {
            let archive = layout.dep_archive_for(spec);
            fs::create_dir_all(archive.parent().unwrap()).unwrap();
            fs::write(&archive, "!<arch>\n").unwrap();
        }

        let tc = NdkToolchain::new(tmp.path(), 21).unwrap();
        let opts = RunOptions {
            jobs: 4,
            ..RunOptions::default()
        };
        let requested = vec![
            "x86".to_string(),
            "arm64-v8a".to_string(),
            "x86_64".to_string(),
        ];
        let summary = run(&requested, &tc, &layout, &opts).unwrap();

        let ids: Vec<_> = summary.outcomes.iter().map(|o| o.target.as_str()).collect();
        assert_eq!(ids, ["x86", "arm64-v8a", "x86_64"]);
        assert_eq!(summary.built(), 3);
    }
}
