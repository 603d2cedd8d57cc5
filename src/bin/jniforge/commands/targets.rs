//! `jniforge targets` command

use anyhow::Result;

use crate::cli::TargetsArgs;
use jniforge::core::target;

pub fn execute(args: TargetsArgs) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(target::all())?);
        return Ok(());
    }

    for spec in target::all() {
        println!(
            "{:<12} arch: {:<8} triple: {:<26} min api: {}",
            spec.id, spec.arch, spec.triple, spec.min_api
        );
    }

    Ok(())
}
