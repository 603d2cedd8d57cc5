//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// jniforge - hardened cross-compilation and verification for Android JNI libraries
#[derive(Parser)]
#[command(name = "jniforge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build and verify the library for all (or selected) targets
    Build(BuildArgs),

    /// Inspect an existing shared object for hardening measures
    Verify(VerifyArgs),

    /// List supported targets
    Targets(TargetsArgs),

    /// Show the composed compiler/linker flags for a target
    Flags(FlagsArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Targets to build (defaults to all supported targets)
    #[arg(long = "target")]
    pub targets: Vec<String>,

    /// Security profile (hardened, minimal)
    #[arg(long)]
    pub profile: Option<String>,

    /// Android NDK root (overrides config and environment)
    #[arg(long)]
    pub ndk: Option<PathBuf>,

    /// Minimum Android API level
    #[arg(long)]
    pub api_level: Option<u32>,

    /// Enable the undefined-behavior sanitizer
    #[arg(long)]
    pub ubsan: bool,

    /// Enable the address sanitizer
    #[arg(long)]
    pub asan: bool,

    /// Number of targets to build in parallel
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Per-subprocess timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Emit the run summary as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Shared object to inspect
    pub artifact: PathBuf,

    /// Emit the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct TargetsArgs {
    /// Emit the target list as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct FlagsArgs {
    /// Target to show flags for
    pub target: String,

    /// Security profile (hardened, minimal)
    #[arg(long)]
    pub profile: Option<String>,

    /// Include the undefined-behavior sanitizer
    #[arg(long)]
    pub ubsan: bool,

    /// Include the address sanitizer
    #[arg(long)]
    pub asan: bool,

    /// Show compile flags only
    #[arg(long)]
    pub compile: bool,

    /// Show link flags only
    #[arg(long)]
    pub link: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
