//! Security profiles and flag composition.
//!
//! A profile turns into one ordered compiler flag list and one ordered
//! linker flag list per target. Composition is pure data assembly: it is
//! deterministic, never touches the filesystem, and never fails at runtime.
//! Stack protection and fortified bounds checks are the floor every profile
//! ships with; `Hardened` layers warnings-as-errors, visibility restriction,
//! section GC, and full RELRO on top. Architecture-conditional flags live in
//! an override table that runs after every profile-level rule, so new
//! per-arch exceptions never touch the baseline logic.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::target::TargetSpec;

/// Page-size alignment requested from the linker for every artifact.
/// Compatibility requirement for 16 KiB-page devices, independent of the
/// security profile.
pub const PAGE_SIZE: u64 = 16384;

/// Error returned for a profile name outside the supported set.
#[derive(Debug, Clone, Error)]
#[error("unknown profile `{0}`\navailable profiles: hardened, minimal")]
pub struct UnknownProfile(pub String);

/// Named hardening level applied to every target in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityProfile {
    /// Full hardening: warnings escalated, hidden visibility, section GC,
    /// full RELRO, non-executable stack, debug stripping.
    #[default]
    Hardened,
    /// Only the mandatory floor: stack protector and fortified functions.
    Minimal,
}

impl SecurityProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityProfile::Hardened => "hardened",
            SecurityProfile::Minimal => "minimal",
        }
    }
}

impl fmt::Display for SecurityProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityProfile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hardened" => Ok(SecurityProfile::Hardened),
            "minimal" => Ok(SecurityProfile::Minimal),
            other => Err(UnknownProfile(other.to_string())),
        }
    }
}

/// Independent sanitizer toggles. Additive on top of a profile, never on by
/// default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizerOptions {
    /// Undefined-behavior sanitizer.
    pub undefined: bool,
    /// Address sanitizer.
    pub address: bool,
}

/// Ordered compiler and linker flags for one target build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagSet {
    pub cflags: Vec<String>,
    pub ldflags: Vec<String>,
}

/// Flag families where composing two members silently drops one protection.
/// Checked at policy-construction time; use sites never re-validate.
const EXCLUSIVE_PREFIXES: &[&str] = &["-D_FORTIFY_SOURCE=", "-fstack-protector", "-std=", "-O"];

impl FlagSet {
    /// Families from [`EXCLUSIVE_PREFIXES`] that appear more than once in
    /// the compiler flags.
    fn exclusive_conflicts(&self) -> Vec<&'static str> {
        EXCLUSIVE_PREFIXES
            .iter()
            .filter(|prefix| {
                self.cflags
                    .iter()
                    .filter(|f| f.starts_with(*prefix))
                    .count()
                    > 1
            })
            .copied()
            .collect()
    }
}

/// Architecture-conditional additions, applied after every profile rule.
struct ArchOverride {
    applies: fn(&TargetSpec) -> bool,
    cflags: &'static [&'static str],
    ldflags: &'static [&'static str],
}

/// aarch64 is the only supported architecture with PAC/BTI, so branch
/// protection is an override rather than a baseline flag.
const ARCH_OVERRIDES: &[ArchOverride] = &[ArchOverride {
    applies: |t| t.arch == "aarch64",
    cflags: &["-mbranch-protection=standard"],
    ldflags: &[],
}];

/// Compose the ordered compiler and linker flags for one target under the
/// given profile and sanitizer toggles.
pub fn compile(
    profile: SecurityProfile,
    target: &TargetSpec,
    sanitizers: SanitizerOptions,
) -> FlagSet {
    let mut cflags: Vec<String> = [
        // Baseline, every profile
        "-fPIC",
        "-std=c11",
        "-O2",
        "-DNDEBUG",
        "-DSODIUM_STATIC=1",
        // Mandatory floor: a profile may add to this, never remove it
        "-fstack-protector-strong",
        "-D_FORTIFY_SOURCE=2",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let mut ldflags: Vec<String> = vec!["-shared".to_string(), "-llog".to_string()];

    if profile == SecurityProfile::Hardened {
        cflags.extend(
            [
                "-Wall",
                "-Wextra",
                "-Werror",
                "-Wformat",
                "-Wformat-security",
                "-Werror=format-security",
                "-fvisibility=hidden",
                "-ffunction-sections",
                "-fdata-sections",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
    }

    // Sanitizer runtimes must be present at link time as well.
    if sanitizers.undefined {
        cflags.push("-fsanitize=undefined".to_string());
        ldflags.push("-fsanitize=undefined".to_string());
    }
    if sanitizers.address {
        cflags.push("-fsanitize=address".to_string());
        ldflags.push("-fsanitize=address".to_string());
    }

    // Not gated by profile: 16 KiB page compatibility, not a security knob.
    ldflags.push(format!("-Wl,-z,max-page-size={PAGE_SIZE}"));
    ldflags.push(format!("-Wl,-z,common-page-size={PAGE_SIZE}"));

    if profile == SecurityProfile::Hardened {
        ldflags.extend(
            [
                "-Wl,-z,relro",
                "-Wl,-z,now",
                "-Wl,-z,noexecstack",
                "-Wl,-z,separate-code",
                "-Wl,--no-undefined",
                "-Wl,--gc-sections",
                // --strip-debug keeps the symbol table, so __stack_chk_fail
                // stays visible to post-build verification.
                "-Wl,--strip-debug",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
    }

    // Override layer runs last.
    for ov in ARCH_OVERRIDES {
        if (ov.applies)(target) {
            cflags.extend(ov.cflags.iter().map(|s| s.to_string()));
            ldflags.extend(ov.ldflags.iter().map(|s| s.to_string()));
        }
    }

    let set = FlagSet { cflags, ldflags };
    debug_assert!(
        set.exclusive_conflicts().is_empty(),
        "conflicting flag families: {:?}",
        set.exclusive_conflicts()
    );
    set
}
