//! Cross-compilation pipeline.
//!
//! This module locates the NDK toolchain and drives the per-target
//! compile/link phases.

pub mod executor;
pub mod toolchain;

pub use executor::{Artifact, BuildError, BuildExecutor, BuildResult, FailureStage, ProjectLayout};
pub use toolchain::{CommandSpec, NdkToolchain};
