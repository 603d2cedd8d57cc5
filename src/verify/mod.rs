//! Post-build hardening verification.
//!
//! Compiler and linker flags are not trustworthy evidence that a protection
//! landed: toolchain defaults, flag ordering, and silent incompatibilities
//! can all drop one on the floor. This module closes the loop by reading the
//! produced ELF's own metadata. Checks consult nothing but the artifact
//! bytes, so a binary built by any pipeline yields the same report, and
//! verifying the same file twice is guaranteed to agree with itself.

use std::fs;
use std::path::{Path, PathBuf};

use goblin::elf::dynamic::{DF_1_NOW, DF_BIND_NOW, DT_BIND_NOW, DT_FLAGS, DT_FLAGS_1};
use goblin::elf::program_header::{PF_X, PT_GNU_RELRO, PT_GNU_STACK, PT_LOAD};
use goblin::elf::Elf;
use serde::Serialize;
use thiserror::Error;

/// The artifact could not be inspected at all: missing, unreadable, or not
/// a well-formed ELF. Individual check failures never produce this; they
/// are recorded in the report instead.
#[derive(Debug, Error)]
#[error("unreadable artifact {}: {reason}", .path.display())]
pub struct ArtifactUnreadable {
    pub path: PathBuf,
    pub reason: String,
}

impl ArtifactUnreadable {
    fn new(path: &Path, reason: impl ToString) -> Self {
        ArtifactUnreadable {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Outcome of a single hardening check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    /// Only the RELRO check uses this: the read-only segment exists but the
    /// dynamic section does not request immediate binding.
    PartialPass,
    Fail,
}

impl CheckStatus {
    fn from_bool(ok: bool) -> Self {
        if ok {
            CheckStatus::Pass
        } else {
            CheckStatus::Fail
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, CheckStatus::Pass)
    }
}

/// Hardening facts read from one artifact. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    /// At least one `__stack_chk*` symbol is present.
    pub stack_canary: CheckStatus,
    /// At least one compiler-inserted `__*_chk` bounds-checked function is
    /// present (outside the stack-check family).
    pub fortified_functions: CheckStatus,
    /// `PT_GNU_RELRO` segment plus immediate binding.
    pub relro: CheckStatus,
    /// `PT_GNU_STACK` exists and is not executable.
    pub noexec_stack: CheckStatus,
    /// Alignment of the first loadable segment. Informational: reported for
    /// the 16 KiB page-size requirement, not judged pass/fail.
    pub load_alignment: Option<u64>,
}

impl VerificationReport {
    /// True when every pass/fail check passed outright (PartialPass does
    /// not count).
    pub fn all_pass(&self) -> bool {
        self.stack_canary.is_pass()
            && self.fortified_functions.is_pass()
            && self.relro.is_pass()
            && self.noexec_stack.is_pass()
    }

    /// Names of checks that did not fully pass.
    pub fn findings(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if !self.stack_canary.is_pass() {
            out.push("stack canary");
        }
        if !self.fortified_functions.is_pass() {
            out.push("fortified functions");
        }
        if !self.relro.is_pass() {
            out.push("relro");
        }
        if !self.noexec_stack.is_pass() {
            out.push("noexec stack");
        }
        out
    }
}

/// Inspect one shared object and report which hardening measures landed.
pub fn verify(path: &Path) -> Result<VerificationReport, ArtifactUnreadable> {
    let data = fs::read(path).map_err(|e| ArtifactUnreadable::new(path, e))?;
    let elf = Elf::parse(&data).map_err(|e| ArtifactUnreadable::new(path, e))?;

    Ok(VerificationReport {
        stack_canary: CheckStatus::from_bool(any_symbol(&elf, |n| n.starts_with("__stack_chk"))),
        fortified_functions: CheckStatus::from_bool(any_symbol(&elf, |n| {
            n.starts_with("__") && n.ends_with("_chk") && !n.starts_with("__stack_chk")
        })),
        relro: relro_status(&elf),
        noexec_stack: noexec_stack_status(&elf),
        load_alignment: load_alignment(&elf),
    })
}

/// True when any symbol in the symbol table or dynamic symbol table
/// satisfies the predicate.
fn any_symbol(elf: &Elf, pred: impl Fn(&str) -> bool) -> bool {
    elf.syms
        .iter()
        .filter_map(|sym| elf.strtab.get_at(sym.st_name))
        .any(|name| pred(name))
        || elf
            .dynsyms
            .iter()
            .filter_map(|sym| elf.dynstrtab.get_at(sym.st_name))
            .any(|name| pred(name))
}

fn relro_status(elf: &Elf) -> CheckStatus {
    let has_segment = elf
        .program_headers
        .iter()
        .any(|ph| ph.p_type == PT_GNU_RELRO);
    if !has_segment {
        return CheckStatus::Fail;
    }
    if binds_now(elf) {
        CheckStatus::Pass
    } else {
        CheckStatus::PartialPass
    }
}

/// Immediate binding can be requested three ways depending on linker
/// vintage: DT_BIND_NOW, DF_BIND_NOW in DT_FLAGS, or DF_1_NOW in DT_FLAGS_1.
fn binds_now(elf: &Elf) -> bool {
    let Some(dynamic) = &elf.dynamic else {
        return false;
    };
    dynamic.dyns.iter().any(|dyn_entry| {
        dyn_entry.d_tag == DT_BIND_NOW
            || (dyn_entry.d_tag == DT_FLAGS && dyn_entry.d_val & DF_BIND_NOW != 0)
            || (dyn_entry.d_tag == DT_FLAGS_1 && dyn_entry.d_val & DF_1_NOW != 0)
    })
}

fn noexec_stack_status(elf: &Elf) -> CheckStatus {
    let ok = elf
        .program_headers
        .iter()
        .find(|ph| ph.p_type == PT_GNU_STACK)
        .map(|ph| ph.p_flags & PF_X == 0)
        .unwrap_or(false);
    CheckStatus::from_bool(ok)
}

fn load_alignment(elf: &Elf) -> Option<u64> {
    elf.program_headers
        .iter()
        .find(|ph| ph.p_type == PT_LOAD)
        .map(|ph| ph.p_align)
}
