//! jniforge - hardened cross-compilation and verification for Android JNI
//! libraries.
//!
//! This crate builds one JNI compilation unit for every supported Android
//! ABI, applies a named hardening profile at compile and link time, and
//! then verifies the produced shared objects by ELF introspection rather
//! than trusting the flags that were passed.

pub mod builder;
pub mod core;
pub mod ops;
pub mod util;
pub mod verify;

pub use crate::builder::{BuildError, BuildExecutor, FailureStage, NdkToolchain, ProjectLayout};
pub use crate::core::profile::{SanitizerOptions, SecurityProfile};
pub use crate::core::target::TargetSpec;
pub use crate::ops::run::{CancelToken, RunOptions, RunSummary};
pub use crate::util::Config;
pub use crate::verify::{CheckStatus, VerificationReport};
