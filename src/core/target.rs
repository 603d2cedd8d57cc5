//! The registry of supported Android ABI targets.
//!
//! The set is fixed: each target maps to exactly one architecture identifier
//! (which keys the prebuilt dependency directory) and one toolchain triple
//! (which keys the cross-compiler executable). Lookups are pure and total
//! over the supported set.

use serde::Serialize;
use thiserror::Error;

/// Error returned when a target identifier is not in the supported set.
#[derive(Debug, Clone, Error)]
#[error("unknown target `{requested}`\navailable targets: {available}")]
pub struct UnknownTarget {
    pub requested: String,
    pub available: String,
}

/// One supported hardware/ABI variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TargetSpec {
    /// ABI name, as it appears under an APK's `lib/` directory.
    pub id: &'static str,
    /// Architecture identifier; keys the prebuilt dependency directory.
    pub arch: &'static str,
    /// Toolchain triple; keys the cross-compiler executable.
    pub triple: &'static str,
    /// Lowest Android API level this ABI supports. The effective API level
    /// for a build is the configured level clamped up to this.
    pub min_api: u32,
}

/// All supported targets, in the order a full run builds them.
pub const TARGETS: &[TargetSpec] = &[
    TargetSpec {
        id: "arm64-v8a",
        arch: "aarch64",
        triple: "aarch64-linux-android",
        min_api: 21,
    },
    TargetSpec {
        id: "armeabi-v7a",
        arch: "armv7",
        triple: "armv7a-linux-androideabi",
        min_api: 19,
    },
    TargetSpec {
        id: "x86_64",
        arch: "x86_64",
        triple: "x86_64-linux-android",
        min_api: 21,
    },
    TargetSpec {
        id: "x86",
        arch: "i686",
        triple: "i686-linux-android",
        min_api: 19,
    },
];

/// All supported targets.
pub fn all() -> &'static [TargetSpec] {
    TARGETS
}

/// Resolve a target identifier to its spec.
pub fn resolve(id: &str) -> Result<TargetSpec, UnknownTarget> {
    TARGETS
        .iter()
        .find(|t| t.id == id)
        .copied()
        .ok_or_else(|| UnknownTarget {
            requested: id.to_string(),
            available: TARGETS
                .iter()
                .map(|t| t.id)
                .collect::<Vec<_>>()
                .join(", "),
        })
}
