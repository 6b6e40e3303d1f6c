//! Bearer token management. `create` is the only command that ever
//! prints a token's plaintext value — every later listing masks it.

use anyhow::Result;
use o2o_core::domain::credential::mask_key;
use o2o_registry::CreateTokenOptions;

use crate::bootstrap::CliContext;
use crate::presentation::print_separator;

pub fn create(ctx: &CliContext, name: &str, monthly_quota: Option<u64>, models: Option<&str>) -> Result<()> {
    let allowed_models = models
        .map(|csv| csv.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();

    let token = ctx.state.tokens.create_token(CreateTokenOptions {
        name: name.to_string(),
        monthly_quota,
        allowed_models,
        ..CreateTokenOptions::default()
    });

    println!("Created token {} ({})", token.id, token.name);
    println!("Value: {}", token.token);
    println!("This is the only time the value is printed in full.");
    Ok(())
}

pub fn list(ctx: &CliContext) -> Result<()> {
    let tokens = ctx.state.tokens.all();
    if tokens.is_empty() {
        println!("No tokens issued.");
        return Ok(());
    }

    println!("{:<18} {:<20} {:<10} {:<8} {:<10} Quota used", "ID", "Name", "Token", "Enabled", "Requests");
    print_separator(100);
    for token in &tokens {
        println!(
            "{:<18} {:<20} {:<10} {:<8} {:<10} {}",
            token.id,
            token.name,
            mask_key(&token.token),
            token.enabled,
            token.total_requests,
            token
                .monthly_quota
                .map(|quota| format!("{}/{quota}", token.quota_used))
                .unwrap_or_else(|| "unlimited".to_string()),
        );
    }
    Ok(())
}

pub fn revoke(ctx: &CliContext, id: &str) -> Result<()> {
    if ctx.state.tokens.remove(id) {
        println!("Revoked token {id}");
    } else {
        println!("No token with id {id}");
    }
    Ok(())
}
