//! Backend credential management: add, import, list, toggle and probe.

use std::io::Read;

use anyhow::{Context, Result};

use crate::bootstrap::CliContext;
use crate::presentation::{print_separator, truncate_string};

pub fn add(ctx: &CliContext, raw: &str) -> Result<()> {
    let outcome = ctx
        .state
        .credentials
        .add_key(raw, &ctx.config.ollama_base_url)
        .context("failed to add credential")?;

    if outcome.duplicate {
        println!("Already present: {} ({})", outcome.credential.id, outcome.credential.base_url);
    } else {
        println!("Added credential {} ({})", outcome.credential.id, outcome.credential.base_url);
    }
    Ok(())
}

pub fn import(ctx: &CliContext) -> Result<()> {
    let mut text = String::new();
    std::io::stdin().read_to_string(&mut text).context("failed to read stdin")?;

    let outcome = ctx.state.credentials.batch_import(&text, &ctx.config.ollama_base_url);
    println!("Added {} credential(s), {} duplicate(s), {} error(s)", outcome.added.len(), outcome.duplicates.len(), outcome.errors.len());
    for err in &outcome.errors {
        println!("  error: {err}");
    }
    Ok(())
}

pub fn list(ctx: &CliContext) -> Result<()> {
    let keys = ctx.state.credentials.get_all_keys();
    if keys.is_empty() {
        println!("No credentials configured.");
        return Ok(());
    }

    println!("{:<10} {:<24} {:<8} {:<8} {:<8} {:<8} Base URL", "ID", "Name", "Key", "Enabled", "Healthy", "Failed");
    print_separator(100);
    for key in keys.iter() {
        println!(
            "{:<10} {:<24} {:<8} {:<8} {:<8} {:<8} {}",
            truncate_string(&key.id, 9),
            truncate_string(&key.name, 23),
            key.masked_key,
            key.enabled,
            key.healthy,
            key.failed_requests,
            key.base_url,
        );
    }
    Ok(())
}

pub fn remove(ctx: &CliContext, id: &str) -> Result<()> {
    if ctx.state.credentials.remove_key(id) {
        println!("Removed credential {id}");
    } else {
        println!("No credential with id {id}");
    }
    Ok(())
}

pub fn toggle(ctx: &CliContext, id: &str) -> Result<()> {
    match ctx.state.credentials.toggle_key(id) {
        Some(credential) => println!("Credential {id} is now {}", if credential.enabled { "enabled" } else { "disabled" }),
        None => println!("No credential with id {id}"),
    }
    Ok(())
}

pub async fn check_health(ctx: &CliContext) -> Result<()> {
    ctx.state.credentials.check_all_health().await;
    list(ctx)
}

pub fn reset_health(ctx: &CliContext) -> Result<()> {
    ctx.state.credentials.reset_health();
    println!("Every credential marked healthy.");
    Ok(())
}

pub fn clear(ctx: &CliContext) -> Result<()> {
    ctx.state.credentials.clear_all();
    println!("Removed every credential.");
    Ok(())
}
