//! `jniforge build` command

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::cli::BuildArgs;
use jniforge::core::profile::SanitizerOptions;
use jniforge::core::target;
use jniforge::ops::report::render_summary;
use jniforge::ops::run::{run_with_progress, CancelToken, RunOptions};
use jniforge::util::Config;
use jniforge::NdkToolchain;

pub fn execute(args: BuildArgs) -> Result<()> {
    let mut config = Config::load_layered(Path::new("."));
    config.apply_env();

    // CLI flags override config and environment
    if let Some(api) = args.api_level {
        config.build.api_level = api;
    }
    let profile = match &args.profile {
        Some(name) => name.parse()?,
        None => config.build.profile,
    };
    let sanitizers = SanitizerOptions {
        undefined: args.ubsan || config.sanitizers.undefined,
        address: args.asan || config.sanitizers.address,
    };
    let jobs = args.jobs.unwrap_or(config.build.jobs);
    let timeout_secs = args.timeout.unwrap_or(config.build.timeout_secs);
    let timeout = (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs));

    // A missing NDK is fatal before any target starts.
    let ndk = args.ndk.clone().or_else(|| config.paths.ndk.clone());
    let toolchain = NdkToolchain::discover(ndk, config.build.api_level)?;
    let layout = config.layout();

    let target_ids: Vec<String> = if args.targets.is_empty() {
        target::all().iter().map(|t| t.id.to_string()).collect()
    } else {
        args.targets.clone()
    };

    let opts = RunOptions {
        profile,
        sanitizers,
        jobs,
        timeout,
        cancel: CancelToken::new(),
    };

    let pb = if args.json {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(target_ids.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb
    };

    let summary = run_with_progress(&target_ids, &toolchain, &layout, &opts, |outcome| {
        pb.set_message(outcome.target.clone());
        pb.inc(1);
    })?;
    pb.finish_and_clear();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render_summary(&summary));
    }

    // Verification findings are advisory; only build failures flip the
    // exit status.
    if !summary.all_built() {
        bail!("{} target(s) failed to build", summary.failed());
    }

    Ok(())
}
