//! Human-readable rendering of run summaries and verification reports.
//!
//! Summaries and reports are plain data; everything here is presentation
//! and can be swapped without touching the pipeline.

use std::fmt::Write;

use crate::ops::run::{BuildOutcome, RunSummary, TargetOutcome, VerificationOutcome};
use crate::verify::{CheckStatus, VerificationReport};

fn status_label(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "pass",
        CheckStatus::PartialPass => "partial",
        CheckStatus::Fail => "FAIL",
    }
}

/// Render one verification report as indented check lines.
pub fn render_report(report: &VerificationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "    stack canary         {}",
        status_label(report.stack_canary)
    );
    let _ = writeln!(
        out,
        "    fortified functions  {}",
        status_label(report.fortified_functions)
    );
    let _ = writeln!(out, "    relro                {}", status_label(report.relro));
    let _ = writeln!(
        out,
        "    noexec stack         {}",
        status_label(report.noexec_stack)
    );
    match report.load_alignment {
        Some(align) => {
            let _ = writeln!(out, "    load alignment       {align}");
        }
        None => {
            let _ = writeln!(out, "    load alignment       (no loadable segment)");
        }
    }
    out
}

fn render_outcome(out: &mut String, outcome: &TargetOutcome) {
    match &outcome.build {
        BuildOutcome::Success { artifact } => {
            let _ = writeln!(out, "{:<12} built   {}", outcome.target, artifact.display());
            match &outcome.verification {
                Some(VerificationOutcome::Verified { report }) => {
                    out.push_str(&render_report(report));
                }
                Some(VerificationOutcome::Unreadable { message }) => {
                    let _ = writeln!(out, "    verification failed: {message}");
                }
                None => {}
            }
        }
        BuildOutcome::Failure { message, .. } => {
            let _ = writeln!(out, "{:<12} failed  {message}", outcome.target);
        }
    }
}

/// Render a whole run, one block per target plus the aggregate tail line.
pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    for outcome in &summary.outcomes {
        render_outcome(&mut out, outcome);
    }

    if !summary.complete {
        let _ = writeln!(out, "run cancelled before all targets were processed");
    }

    let _ = writeln!(
        out,
        "{} built, {} failed, {} hardening warning(s) [profile: {}]",
        summary.built(),
        summary.failed(),
        summary.hardening_warnings(),
        summary.profile
    );

    out
}
