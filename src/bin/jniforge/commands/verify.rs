//! `jniforge verify` command
//!
//! Verification is read-only introspection: any ELF shared object can be
//! inspected, whether or not jniforge built it.

use anyhow::Result;

use crate::cli::VerifyArgs;
use jniforge::ops::report::render_report;
use jniforge::verify::verify;

pub fn execute(args: VerifyArgs) -> Result<()> {
    let report = verify(&args.artifact)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", args.artifact.display());
        print!("{}", render_report(&report));
        if !report.all_pass() {
            eprintln!(
                "warning: hardening checks not clean: {}",
                report.findings().join(", ")
            );
        }
    }

    // Findings are advisory, matching `build`: report, don't fail.
    Ok(())
}
