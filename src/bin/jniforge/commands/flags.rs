//! `jniforge flags` command

use anyhow::Result;

use crate::cli::FlagsArgs;
use jniforge::core::profile::{self, SanitizerOptions, SecurityProfile};
use jniforge::core::target;

pub fn execute(args: FlagsArgs) -> Result<()> {
    let spec = target::resolve(&args.target)?;
    let profile = match &args.profile {
        Some(name) => name.parse()?,
        None => SecurityProfile::default(),
    };
    let sanitizers = SanitizerOptions {
        undefined: args.ubsan,
        address: args.asan,
    };

    let flags = profile::compile(profile, &spec, sanitizers);

    if !args.link {
        println!("# Compile flags for `{}` ({}):", spec.id, profile);
        for flag in &flags.cflags {
            println!("  {flag}");
        }
    }

    if !args.compile && !args.link {
        println!();
    }

    if !args.compile {
        println!("# Link flags for `{}` ({}):", spec.id, profile);
        for flag in &flags.ldflags {
            println!("  {flag}");
        }
    }

    Ok(())
}
