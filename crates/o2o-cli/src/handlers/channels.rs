//! Channel management. Channels are optional; adding the first one
//! switches the selector from the flat round-robin regime into the
//! channel regime for every subsequent request.

use std::collections::HashMap;

use anyhow::Result;
use o2o_core::Channel;
use o2o_registry::ids::registry_id;

use crate::bootstrap::CliContext;
use crate::presentation::print_separator;

pub fn add(ctx: &CliContext, name: &str, credentials: &str, max_concurrent: u32) -> Result<()> {
    let credential_ids: Vec<String> = credentials.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect();

    let channel = Channel {
        id: registry_id(),
        name: name.to_string(),
        base_url: String::new(),
        enabled: true,
        healthy: true,
        credential_ids,
        models: Vec::new(),
        model_mapping: HashMap::new(),
        priority: 0,
        weight: 10,
        max_concurrent,
        current_concurrent: 0,
        total_requests: 0,
        failed_requests: 0,
        cursor: 0,
    };

    println!("Added channel {} ({})", channel.id, channel.name);
    ctx.state.channels.add(channel);
    Ok(())
}

pub fn list(ctx: &CliContext) -> Result<()> {
    let channels = ctx.state.channels.all();
    if channels.is_empty() {
        println!("No channels configured (flat credential pool is in effect).");
        return Ok(());
    }

    println!("{:<18} {:<20} {:<8} {:<8} {:<12} Credentials", "ID", "Name", "Enabled", "Healthy", "Concurrency");
    print_separator(100);
    for channel in &channels {
        println!(
            "{:<18} {:<20} {:<8} {:<8} {:<12} {}",
            channel.id,
            channel.name,
            channel.enabled,
            channel.healthy,
            format!("{}/{}", channel.current_concurrent, channel.max_concurrent),
            channel.credential_ids.join(","),
        );
    }
    Ok(())
}

pub fn remove(ctx: &CliContext, id: &str) -> Result<()> {
    if ctx.state.channels.remove(id) {
        println!("Removed channel {id}");
    } else {
        println!("No channel with id {id}");
    }
    Ok(())
}
