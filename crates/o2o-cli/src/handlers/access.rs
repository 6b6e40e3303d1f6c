//! IP access control policy management.

use anyhow::Result;
use o2o_core::AccessMode;

use crate::bootstrap::CliContext;
use crate::commands::AccessModeArg;

pub fn show(ctx: &CliContext) -> Result<()> {
    let policy = ctx.state.access.snapshot();
    println!("mode = {:?}", policy.mode);
    println!("whitelist = {:?}", policy.whitelist);
    println!("blacklist = {:?}", policy.blacklist);
    Ok(())
}

pub fn set_mode(ctx: &CliContext, mode: AccessModeArg) -> Result<()> {
    let mode = match mode {
        AccessModeArg::Disabled => AccessMode::Disabled,
        AccessModeArg::Whitelist => AccessMode::Whitelist,
        AccessModeArg::Blacklist => AccessMode::Blacklist,
    };
    ctx.state.access.set_mode(mode);
    println!("Access mode set to {mode:?}");
    Ok(())
}

pub fn allow(ctx: &CliContext, entry: &str) -> Result<()> {
    ctx.state.access.add_whitelist_entry(entry.to_string());
    println!("Added {entry} to the whitelist");
    Ok(())
}

pub fn deny(ctx: &CliContext, entry: &str) -> Result<()> {
    ctx.state.access.add_blacklist_entry(entry.to_string());
    println!("Added {entry} to the blacklist");
    Ok(())
}
